//! Page-backed allocation for the secret
//!
//! The secret lives in its own anonymous mapping rather than on the
//! heap: the pages are `mlock`ed so they cannot be swapped out, marked
//! `MADV_DONTDUMP` so they are skipped by core dumps, and kept
//! `PROT_READ` while at rest. Writes flip the pages to
//! `PROT_READ|PROT_WRITE` for the duration of the update only.
//!
//! Locking is best-effort: a failed `mlock` (e.g. `RLIMIT_MEMLOCK`
//! exhausted, or an unsupported platform) downgrades to an unlocked
//! mapping, which the caller may log. Protection flips are not
//! best-effort; a failed `mprotect` is surfaced so the cell can treat
//! it as fatal.

use std::ptr;

use zeroize::Zeroize;

use crate::error::PageError;

/// An anonymous private mapping holding the secret's backing bytes.
///
/// The mapping is zero-filled on creation (guaranteed by `MAP_ANONYMOUS`)
/// and zeroized again before it is unmapped.
pub struct LockedPage {
    ptr: *mut u8,
    /// Bytes exposed to the caller
    len: usize,
    /// Bytes actually mapped (page multiple)
    mapped_len: usize,
    locked: bool,
    disposed: bool,
}

// The raw pointer is owned exclusively by this struct; access is gated
// by the SecureCell's mutex.
unsafe impl Send for LockedPage {}

impl LockedPage {
    /// Map, lock, and dump-protect `len` bytes. The mapping starts
    /// readable and writable; call [`protect`](Self::protect) once the
    /// initial state is in place.
    pub fn new(len: usize) -> Result<Self, PageError> {
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        let page_size = if page_size > 0 { page_size as usize } else { 4096 };
        let mapped_len = len.max(1).div_ceil(page_size) * page_size;

        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                mapped_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(PageError::Map);
        }
        let ptr = ptr as *mut u8;

        let locked = unsafe { libc::mlock(ptr as *const libc::c_void, mapped_len) } == 0;

        // Keep these pages out of core dumps even if process-level
        // dump suppression was unavailable.
        #[cfg(target_os = "linux")]
        unsafe {
            libc::madvise(ptr as *mut libc::c_void, mapped_len, libc::MADV_DONTDUMP);
        }

        Ok(Self {
            ptr,
            len,
            mapped_len,
            locked,
            disposed: false,
        })
    }

    /// Whether `mlock` succeeded for this mapping.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Make the mapping read-only.
    pub fn protect(&mut self) -> Result<(), PageError> {
        self.mprotect(libc::PROT_READ).map_err(|_| PageError::Protect)
    }

    /// Make the mapping readable and writable.
    pub fn unprotect(&mut self) -> Result<(), PageError> {
        self.mprotect(libc::PROT_READ | libc::PROT_WRITE)
            .map_err(|_| PageError::Unprotect)
    }

    fn mprotect(&mut self, prot: libc::c_int) -> Result<(), ()> {
        let rc = unsafe { libc::mprotect(self.ptr as *mut libc::c_void, self.mapped_len, prot) };
        if rc == 0 {
            Ok(())
        } else {
            Err(())
        }
    }

    /// View the exposed bytes.
    ///
    /// # Safety
    ///
    /// The page must not have been disposed.
    pub unsafe fn as_slice(&self) -> &[u8] {
        debug_assert!(!self.disposed);
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    /// Mutably view the exposed bytes.
    ///
    /// # Safety
    ///
    /// The page must not have been disposed and must currently be
    /// unprotected, otherwise the write faults.
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        debug_assert!(!self.disposed);
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }

    /// Zeroize and unmap. Idempotent; also runs on drop.
    ///
    /// Zeroization needs the pages writable; if that flip fails the
    /// bytes are abandoned still-mapped-readonly rather than risking a
    /// fault, and the unmap proceeds.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if self.mprotect(libc::PROT_READ | libc::PROT_WRITE).is_ok() {
            let whole = unsafe { std::slice::from_raw_parts_mut(self.ptr, self.mapped_len) };
            whole.zeroize();
        }

        unsafe {
            if self.locked {
                libc::munlock(self.ptr as *const libc::c_void, self.mapped_len);
            }
            libc::munmap(self.ptr as *mut libc::c_void, self.mapped_len);
        }
    }
}

impl Drop for LockedPage {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_page_is_zeroed() {
        let page = LockedPage::new(64).unwrap();
        assert!(unsafe { page.as_slice() }.iter().all(|&b| b == 0));
        assert_eq!(unsafe { page.as_slice() }.len(), 64);
    }

    #[test]
    fn test_write_then_read_back() {
        let mut page = LockedPage::new(16).unwrap();
        (unsafe { page.as_mut_slice() })[..3].copy_from_slice(b"abc");
        assert_eq!(&unsafe { page.as_slice() }[..3], b"abc");
    }

    #[test]
    fn test_protect_round_trip() {
        let mut page = LockedPage::new(16).unwrap();
        page.protect().unwrap();
        // Reads stay legal under PROT_READ
        assert_eq!(unsafe { page.as_slice() }[0], 0);
        page.unprotect().unwrap();
        (unsafe { page.as_mut_slice() })[0] = 7;
        page.protect().unwrap();
        assert_eq!(unsafe { page.as_slice() }[0], 7);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut page = LockedPage::new(16).unwrap();
        page.dispose();
        page.dispose();
    }
}
