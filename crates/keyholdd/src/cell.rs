//! The secure cell holding the one stored secret
//!
//! A fixed-capacity, mutex-serialized container over a [`LockedPage`].
//! The cell is `Immutable` (pages read-only) except inside a write
//! sequence: mark `Mutable` → unprotect → zeroize → copy → reprotect →
//! mark `Immutable`. No stale byte of a superseded secret survives an
//! overwrite, and readers can never observe a half-written value.
//!
//! Any failure inside the write sequence leaves the cell marked
//! `Mutable`, which every later operation reports as an error. Callers
//! treat those errors as fatal: a cell that failed mid-transition has
//! no trustworthy state left to serve.

use std::fmt;
use std::sync::Mutex;

use zeroize::{Zeroize, Zeroizing};

use crate::error::CellError;
use crate::page::LockedPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellState {
    /// No secret stored; reads yield nothing
    Empty,
    /// Holds a value; readable, pages read-only
    Immutable,
    /// Write sequence in flight; not externally readable
    Mutable,
}

struct CellInner {
    /// Taken on destroy
    page: Option<LockedPage>,
    len: usize,
    state: CellState,
}

/// In-memory container for the single stored secret.
pub struct SecureCell {
    inner: Mutex<CellInner>,
    capacity: usize,
}

impl SecureCell {
    /// Allocate an empty cell able to hold up to `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self, CellError> {
        let mut page = LockedPage::new(capacity)?;
        if !page.is_locked() {
            tracing::warn!("secret memory could not be locked and may be swappable");
        }
        page.protect()?;

        Ok(Self {
            inner: Mutex::new(CellInner {
                page: Some(page),
                len: 0,
                state: CellState::Empty,
            }),
            capacity,
        })
    }

    /// Maximum secret size this cell can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Return the stored secret with trailing NUL padding trimmed, or
    /// an empty value if nothing is stored. Serializes behind an
    /// in-flight write; errors only when the cell is untrustworthy.
    pub fn read(&self) -> Result<Zeroizing<Vec<u8>>, CellError> {
        let inner = self.inner.lock().map_err(|_| CellError::Poisoned)?;
        if inner.state == CellState::Mutable {
            return Err(CellError::Poisoned);
        }

        let Some(page) = inner.page.as_ref() else {
            // Destroyed during teardown; an empty read is still safe
            return Ok(Zeroizing::new(Vec::new()));
        };
        if inner.len == 0 {
            return Ok(Zeroizing::new(Vec::new()));
        }

        let bytes = unsafe { page.as_slice() };
        let mut end = inner.len;
        while end > 0 && bytes[end - 1] == 0 {
            end -= 1;
        }
        Ok(Zeroizing::new(bytes[..end].to_vec()))
    }

    /// Replace the stored secret.
    ///
    /// The previous contents are zeroized before the new value lands.
    /// Every error from this method is fatal to the caller's process:
    /// on failure the cell stays marked `Mutable` and refuses further
    /// reads and writes.
    pub fn write(&self, value: &[u8]) -> Result<(), CellError> {
        if value.len() > self.capacity {
            return Err(CellError::TooLong {
                len: value.len(),
                capacity: self.capacity,
            });
        }

        let mut inner = self.inner.lock().map_err(|_| CellError::Poisoned)?;
        if inner.state == CellState::Mutable {
            return Err(CellError::Poisoned);
        }
        let CellInner { page, len, state } = &mut *inner;
        let Some(page) = page.as_mut() else {
            return Err(CellError::Destroyed);
        };

        *state = CellState::Mutable;
        page.unprotect()?;

        let buf = unsafe { page.as_mut_slice() };
        buf.zeroize();
        buf[..value.len()].copy_from_slice(value);
        *len = value.len();

        page.protect()?;
        *state = if value.is_empty() {
            CellState::Empty
        } else {
            CellState::Immutable
        };
        Ok(())
    }

    /// Zeroize and release the backing memory. Idempotent; safe to call
    /// during teardown even if the cell was never written, and even if
    /// a failed write left the cell untrustworthy.
    pub fn destroy(&self) {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(mut page) = inner.page.take() {
            page.dispose();
        }
        inner.len = 0;
        inner.state = CellState::Empty;
    }
}

impl fmt::Debug for SecureCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never expose contents through Debug
        write!(f, "SecureCell(capacity: {})", self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_read_before_write_is_empty() {
        let cell = SecureCell::with_capacity(16).unwrap();
        assert!(cell.read().unwrap().is_empty());
    }

    #[test]
    fn test_write_read_round_trip() {
        let cell = SecureCell::with_capacity(16).unwrap();
        cell.write(b"hunter2").unwrap();
        assert_eq!(&*cell.read().unwrap(), b"hunter2");
    }

    #[test]
    fn test_overwrite_replaces_whole_value() {
        let cell = SecureCell::with_capacity(16).unwrap();
        cell.write(b"a-long-first-key").unwrap();
        cell.write(b"tiny").unwrap();
        // No tail of the longer first value bleeds through
        assert_eq!(&*cell.read().unwrap(), b"tiny");
    }

    #[test]
    fn test_full_capacity_value() {
        let cell = SecureCell::with_capacity(8).unwrap();
        cell.write(b"12345678").unwrap();
        assert_eq!(&*cell.read().unwrap(), b"12345678");
    }

    #[test]
    fn test_empty_write_reads_empty() {
        let cell = SecureCell::with_capacity(8).unwrap();
        cell.write(b"secret").unwrap();
        cell.write(b"").unwrap();
        assert!(cell.read().unwrap().is_empty());
    }

    #[test]
    fn test_trailing_nuls_trimmed() {
        let cell = SecureCell::with_capacity(8).unwrap();
        cell.write(b"abc\0\0").unwrap();
        assert_eq!(&*cell.read().unwrap(), b"abc");
    }

    #[test]
    fn test_interior_nuls_preserved() {
        let cell = SecureCell::with_capacity(8).unwrap();
        cell.write(b"a\0b").unwrap();
        assert_eq!(&*cell.read().unwrap(), b"a\0b");
    }

    #[test]
    fn test_oversized_write_rejected() {
        let cell = SecureCell::with_capacity(4).unwrap();
        match cell.write(b"too big") {
            Err(CellError::TooLong { len, capacity }) => {
                assert_eq!(len, 7);
                assert_eq!(capacity, 4);
            }
            other => panic!("expected TooLong, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let cell = SecureCell::with_capacity(8).unwrap();
        cell.write(b"secret").unwrap();
        cell.destroy();
        cell.destroy();
        assert!(cell.read().unwrap().is_empty());
        assert!(matches!(cell.write(b"again"), Err(CellError::Destroyed)));
    }

    #[test]
    fn test_destroy_without_write() {
        let cell = SecureCell::with_capacity(8).unwrap();
        cell.destroy();
    }

    #[test]
    fn test_no_torn_reads_under_contention() {
        let cell = Arc::new(SecureCell::with_capacity(32).unwrap());
        let a = [b'a'; 32];
        let b = [b'b'; 32];

        let mut handles = Vec::new();
        for pattern in [a, b] {
            let cell = Arc::clone(&cell);
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    cell.write(&pattern).unwrap();
                }
            }));
        }
        for _ in 0..4 {
            let cell = Arc::clone(&cell);
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    let value = cell.read().unwrap();
                    assert!(
                        value.is_empty() || *value == a[..] || *value == b[..],
                        "observed a half-written secret"
                    );
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
