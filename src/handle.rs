//! Per-process handle and collective file lifecycle.
//!
//! A [`Handle`] binds a duplicated communicator to at most one open
//! restart file. Callers drive it through an explicit lifecycle:
//!
//! ```text
//! initialize -> [create|open] -> (read|write|flush)* -> close -> ...
//! ```
//!
//! `file_create`, `file_open`, `file_flush`, and `file_close` are
//! collective: every rank in the handle's communicator must make the same
//! call with consistent arguments. The handle itself is process-local and
//! not thread-safe.

use std::ffi::CString;
use std::marker::PhantomData;

use hdf5_sys::h5f::{
    H5F_scope_t, H5Fclose, H5Fcreate, H5Fflush, H5Fopen, H5F_ACC_EXCL, H5F_ACC_RDONLY,
    H5F_ACC_RDWR, H5F_ACC_TRUNC,
};
use hdf5_sys::h5fd::H5Pset_fapl_mpio;
use hdf5_sys::h5i::hid_t;
use hdf5_sys::h5p::{H5P_CLS_FILE_ACCESS, H5P_DEFAULT, H5Pcreate};
use mpi::traits::{AsRaw, Communicator};

use crate::comm::DupComm;
use crate::error::{raise, Result, Status};
use crate::hid::{ensure_library_init, PropertyList};
use crate::info::Hints;
use crate::layout;

/// Per-process context for collective restart-file I/O.
///
/// Exclusively owned by the caller; dropping it force-closes any open file
/// and releases the duplicated communicator and hints, so an explicit
/// [`finalize`](Handle::finalize) is optional.
pub struct Handle {
    comm: DupComm,
    hints: Hints,
    file_id: Option<hid_t>,
    layout_tag: usize,
    /// The handle is single-threaded; keep it off other threads.
    _marker: PhantomData<*const ()>,
}

impl Handle {
    /// Create a handle over `comm`.
    ///
    /// Collective over `comm`: duplicates it (preserving its name),
    /// caches rank and size, and creates an empty hints object. No file
    /// is open and the active write layout is tag 0.
    pub fn initialize<C>(comm: &C) -> Result<Handle>
    where
        C: Communicator + AsRaw<Raw = mpi_sys::MPI_Comm>,
    {
        // SAFETY: a live rsmpi communicator is a valid raw communicator.
        unsafe { Handle::initialize_raw(comm.as_raw()) }
    }

    /// Create a handle over a raw communicator.
    ///
    /// # Safety
    ///
    /// `comm` must be a valid communicator for the duration of the call;
    /// the handle works on its own duplicate afterwards.
    pub unsafe fn initialize_raw(comm: mpi_sys::MPI_Comm) -> Result<Handle> {
        ensure_library_init();
        let comm = DupComm::duplicate(comm)?;
        let hints = Hints::new()?;
        Ok(Handle {
            comm,
            hints,
            file_id: None,
            layout_tag: 0,
            _marker: PhantomData,
        })
    }

    /// Rank of the calling process in the handle's communicator.
    pub fn rank(&self) -> i32 {
        self.comm.rank()
    }

    /// Number of processes in the handle's communicator.
    pub fn size(&self) -> i32 {
        self.comm.size()
    }

    /// The collective-I/O hints applied at the next create or open.
    pub fn hints(&self) -> &Hints {
        &self.hints
    }

    /// The layout tag used when creating new fields.
    pub fn layout_get(&self) -> usize {
        self.layout_tag
    }

    /// Set the layout tag used when creating new fields.
    ///
    /// Reading always honors the tag stored in a field's metadata, so
    /// this setting never affects reads.
    pub fn layout_set(&mut self, tag: usize) -> Result<()> {
        if tag >= layout::layout_count() {
            raise!(
                Status::EInval,
                "layout tag {tag} out of range [0, {})",
                layout::layout_count()
            );
        }
        self.layout_tag = tag;
        Ok(())
    }

    /// Identifier of the open file, or `EInval` when none is open.
    pub(crate) fn require_file(&self) -> Result<hid_t> {
        match self.file_id {
            Some(id) => Ok(id),
            None => raise!(Status::EInval, "no file currently open"),
        }
    }

    fn collective_fapl(&self) -> Result<PropertyList> {
        let fapl = PropertyList(unsafe { H5Pcreate(*H5P_CLS_FILE_ACCESS) });
        if fapl.id() < 0 {
            raise!(Status::ESanity, "unable to create file access list");
        }
        if unsafe { H5Pset_fapl_mpio(fapl.id(), self.comm.raw(), self.hints.raw()) } < 0 {
            raise!(
                Status::ESanity,
                "unable to store collective details in access list"
            );
        }
        Ok(fapl)
    }

    /// Collectively create the restart file at `path`.
    ///
    /// With `overwrite` set, an existing file is truncated; otherwise an
    /// existing file makes the call fail with `EFailed`. Fails with
    /// `EInval` when a file is already open on this handle.
    pub fn file_create(&mut self, path: &str, overwrite: bool) -> Result<()> {
        if self.file_id.is_some() {
            raise!(
                Status::EInval,
                "cannot create file because previous file not closed"
            );
        }
        let Ok(c_path) = CString::new(path) else {
            raise!(Status::EInval, "path contains a null byte");
        };

        let fapl = self.collective_fapl()?;
        let flags = if overwrite {
            H5F_ACC_TRUNC
        } else {
            H5F_ACC_EXCL
        };
        let file_id = unsafe { H5Fcreate(c_path.as_ptr(), flags, H5P_DEFAULT, fapl.id()) };
        if file_id < 0 {
            if overwrite {
                raise!(Status::EFailed, "unable to create file '{path}'");
            }
            raise!(Status::EFailed, "file '{path}' already exists");
        }

        self.file_id = Some(file_id);
        Ok(())
    }

    /// Collectively open the restart file at `path`.
    ///
    /// `readwrite` selects between read-write and read-only access. Fails
    /// with `EInval` when a file is already open on this handle.
    pub fn file_open(&mut self, path: &str, readwrite: bool) -> Result<()> {
        if self.file_id.is_some() {
            raise!(
                Status::EInval,
                "cannot open new file because previous file not closed"
            );
        }
        let Ok(c_path) = CString::new(path) else {
            raise!(Status::EInval, "path contains a null byte");
        };

        let fapl = self.collective_fapl()?;
        let flags = if readwrite {
            H5F_ACC_RDWR
        } else {
            H5F_ACC_RDONLY
        };
        let file_id = unsafe { H5Fopen(c_path.as_ptr(), flags, fapl.id()) };
        if file_id < 0 {
            raise!(Status::EFailed, "unable to open existing file '{path}'");
        }

        self.file_id = Some(file_id);
        Ok(())
    }

    /// Collectively commit all buffered data for the open file to disk
    /// without closing it.
    pub fn file_flush(&self) -> Result<()> {
        let file_id = self.require_file()?;
        if unsafe { H5Fflush(file_id, H5F_scope_t::H5F_SCOPE_GLOBAL) } < 0 {
            raise!(Status::EFailed, "unable to flush file");
        }
        Ok(())
    }

    /// Collectively close the open file.
    ///
    /// Closing when no file is open is a silent success, so `close; close`
    /// is safe; a subsequent create or open starts a fresh cycle.
    pub fn file_close(&mut self) -> Result<()> {
        let Some(file_id) = self.file_id else {
            return Ok(());
        };
        if unsafe { H5Fclose(file_id) } < 0 {
            raise!(Status::EFailed, "unable to close file");
        }
        self.file_id = None;
        Ok(())
    }

    /// Tear the handle down.
    ///
    /// Force-closes any still-open file (reporting but otherwise ignoring
    /// failures), then releases the hints and the duplicated communicator.
    /// Equivalent to dropping the handle.
    pub fn finalize(mut self) -> Result<()> {
        let _ = self.file_close();
        Ok(())
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        // Best-effort force close; DupComm and Hints release themselves.
        let _ = self.file_close();
    }
}

#[cfg(test)]
mod tests {
    // Handle construction and every file operation are collective and
    // need a running MPI environment. Lifecycle coverage lives in the
    // mpiexec-driven programs:
    //   cargo build --examples && mpiexec -n 2 ./target/debug/examples/basic
}
