//! Process-level hardening
//!
//! Disables core dumps before the secret is ever allocated, via both
//! `prctl(PR_SET_DUMPABLE, 0)` (also blocks ptrace attachment from
//! unprivileged processes) and `setrlimit(RLIMIT_CORE, 0)`. Both are
//! best-effort: the daemon keeps running where they are unavailable,
//! it just says so in the log.

use std::sync::OnceLock;

/// Outcome of the one-time hardening attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardStatus {
    /// `prctl(PR_SET_DUMPABLE, 0)` succeeded
    pub prctl: bool,
    /// `setrlimit(RLIMIT_CORE, 0)` succeeded
    pub rlimit: bool,
}

impl GuardStatus {
    /// True when at least one dump suppression took effect.
    pub fn is_protected(&self) -> bool {
        self.prctl || self.rlimit
    }
}

static STATUS: OnceLock<GuardStatus> = OnceLock::new();

/// Disable core dumps for the process. Idempotent; the syscalls run on
/// the first call only and the cached result is returned afterwards.
pub fn disable_core_dumps() -> GuardStatus {
    *STATUS.get_or_init(|| GuardStatus {
        prctl: prctl_set_not_dumpable(),
        rlimit: setrlimit_core_zero(),
    })
}

#[cfg(target_os = "linux")]
fn prctl_set_not_dumpable() -> bool {
    unsafe { libc::prctl(libc::PR_SET_DUMPABLE, 0, 0, 0, 0) == 0 }
}

#[cfg(not(target_os = "linux"))]
fn prctl_set_not_dumpable() -> bool {
    // prctl is Linux-only
    false
}

#[cfg(unix)]
fn setrlimit_core_zero() -> bool {
    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    unsafe { libc::setrlimit(libc::RLIMIT_CORE, &limit) == 0 }
}

#[cfg(not(unix))]
fn setrlimit_core_zero() -> bool {
    false
}
