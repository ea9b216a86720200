//! Owned, duplicated MPI communicator.
//!
//! A [`Handle`](crate::Handle) never holds the caller's communicator
//! directly: it duplicates it on initialization, preserving any name the
//! caller attached, and frees the duplicate on drop. Collective file and
//! field operations then run on the private duplicate so library traffic
//! cannot interleave with the caller's own messages.

use std::os::raw::{c_char, c_int};

use mpi_sys::{
    MPI_Comm, MPI_Comm_dup, MPI_Comm_free, MPI_Comm_get_name, MPI_Comm_rank, MPI_Comm_set_name,
    MPI_Comm_size, RSMPI_COMM_NULL,
};

use crate::error::{raise, Result, Status};

const NAME_BUF_LEN: usize = 256;

/// A duplicated communicator owned by a handle.
///
/// Not `Send`/`Sync`: the duplicate must be used and freed from the thread
/// that created it, matching the single-threaded handle contract.
pub(crate) struct DupComm {
    raw: MPI_Comm,
    rank: i32,
    size: i32,
}

impl DupComm {
    /// Duplicate `comm`, carrying over its name when one is set.
    ///
    /// Collective over `comm`.
    pub(crate) fn duplicate(comm: MPI_Comm) -> Result<Self> {
        if comm == unsafe { RSMPI_COMM_NULL } {
            raise!(Status::EInval, "comm must not be the null communicator");
        }

        let mut size: c_int = 0;
        if unsafe { MPI_Comm_size(comm, &mut size) } != 0 {
            raise!(Status::EFailed, "MPI_Comm_size failed");
        }
        let mut rank: c_int = 0;
        if unsafe { MPI_Comm_rank(comm, &mut rank) } != 0 {
            raise!(Status::EFailed, "MPI_Comm_rank failed");
        }

        let mut name = [0 as c_char; NAME_BUF_LEN];
        let mut name_len: c_int = 0;
        if unsafe { MPI_Comm_get_name(comm, name.as_mut_ptr(), &mut name_len) } != 0 {
            raise!(Status::EFailed, "MPI_Comm_get_name failed");
        }

        let mut dup: MPI_Comm = unsafe { RSMPI_COMM_NULL };
        if unsafe { MPI_Comm_dup(comm, &mut dup) } != 0 {
            raise!(Status::EFailed, "MPI_Comm_dup failed");
        }

        if name_len > 0 && unsafe { MPI_Comm_set_name(dup, name.as_ptr()) } != 0 {
            unsafe { MPI_Comm_free(&mut dup) };
            raise!(Status::EFailed, "MPI_Comm_set_name failed");
        }

        Ok(DupComm {
            raw: dup,
            rank,
            size,
        })
    }

    /// The raw duplicated communicator, for passing to the substrates.
    pub(crate) fn raw(&self) -> MPI_Comm {
        self.raw
    }

    /// Rank of the calling process within the duplicate.
    pub(crate) fn rank(&self) -> i32 {
        self.rank
    }

    /// Number of processes in the duplicate.
    pub(crate) fn size(&self) -> i32 {
        self.size
    }
}

impl Drop for DupComm {
    fn drop(&mut self) {
        // SAFETY: raw was produced by MPI_Comm_dup and has not been freed;
        // MPI_Comm_free resets it to the null communicator.
        unsafe {
            if self.raw != RSMPI_COMM_NULL {
                MPI_Comm_free(&mut self.raw);
            }
        }
    }
}
