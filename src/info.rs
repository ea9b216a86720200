//! Collective-I/O hints.
//!
//! [`Hints`] wraps an `MPI_Info` object holding key-value strings that are
//! handed to the container driver whenever a file is created or opened
//! (e.g. `cb_buffer_size`, `romio_cb_write`). A handle owns exactly one
//! hints object for its whole lifetime; the underlying `MPI_Info` is freed
//! when the handle is finalized.
//!
//! # Example
//!
//! ```no_run
//! # fn demo(handle: &restartio::Handle) -> restartio::Result<()> {
//! handle.hints().set("romio_cb_write", "enable")?;
//! # Ok(())
//! # }
//! ```

use std::ffi::CString;

use mpi_sys::{MPI_Info, MPI_Info_create, MPI_Info_free, MPI_Info_set};

use crate::error::{raise, Result, Status};

/// Key-value hints applied to collective file access.
pub struct Hints {
    raw: MPI_Info,
    owned: bool,
}

impl Hints {
    /// Create an empty hints object.
    pub(crate) fn new() -> Result<Self> {
        // Zero is never a live info object on any MPI implementation we
        // target; MPI_Info_create overwrites it on success.
        let mut raw: MPI_Info = unsafe { std::mem::zeroed() };
        if unsafe { MPI_Info_create(&mut raw) } != 0 {
            raise!(Status::EFailed, "MPI_Info_create failed");
        }
        Ok(Hints { raw, owned: true })
    }

    /// Set a hint, replacing any previous value for `key`.
    ///
    /// Hints take effect at the next file create or open; they do not
    /// retroactively apply to an already-open file.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let Ok(c_key) = CString::new(key) else {
            raise!(Status::EInval, "hint key contains a null byte");
        };
        let Ok(c_value) = CString::new(value) else {
            raise!(Status::EInval, "hint value contains a null byte");
        };
        if unsafe { MPI_Info_set(self.raw, c_key.as_ptr(), c_value.as_ptr()) } != 0 {
            raise!(Status::EFailed, "MPI_Info_set failed");
        }
        Ok(())
    }

    /// The raw `MPI_Info` for passing to the container driver.
    pub(crate) fn raw(&self) -> MPI_Info {
        self.raw
    }
}

impl Drop for Hints {
    fn drop(&mut self) {
        if self.owned {
            self.owned = false;
            // SAFETY: raw was produced by MPI_Info_create and has not
            // been freed yet.
            unsafe {
                MPI_Info_free(&mut self.raw);
            }
        }
    }
}
