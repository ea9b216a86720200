//! # restartio
//!
//! Collective HDF5 restart-file I/O for distributed MPI simulations.
//!
//! This crate lets every rank of an MPI job contribute its local slab of
//! a large multi-dimensional array to a single shared, self-describing
//! restart file, providing:
//! - A per-process [`Handle`] binding a duplicated communicator to at
//!   most one open file
//! - Collective 3D field, 2D plane, and 1D line transfers with strided
//!   in-memory sub-blocks
//! - Scalar/vector/string attributes on the file root
//! - Pluggable on-disk layouts recorded per field, so files stay
//!   readable under any future default
//! - Indexed restart-file rotation ([`restart_rename`])
//!
//! ## Supported Element Types
//!
//! All transfers are generic over [`Element`]: `f64`, `f32`, `i32`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mpi::traits::Communicator;
//! use restartio::{Decomposition, Handle};
//!
//! fn main() -> restartio::Result<()> {
//!     let universe = mpi::initialize().unwrap();
//!     let world = universe.world();
//!
//!     let mut handle = Handle::initialize(&world)?;
//!     handle.file_create("restart.h5", true)?;
//!
//!     // Each rank writes its own span of the fastest direction.
//!     let rank = world.rank() as usize;
//!     let size = world.size() as usize;
//!     let local: Vec<f64> = (0..8).map(|i| (rank * 8 + i) as f64).collect();
//!     handle.field_write(
//!         "u",
//!         &local,
//!         Decomposition::new(1, 0, 1),
//!         Decomposition::new(1, 0, 1),
//!         Decomposition::new(8 * size, 8 * rank, 8),
//!     )?;
//!
//!     handle.file_close()?;
//!     handle.finalize()
//! }
//! ```
//!
//! ## Collective Semantics
//!
//! File lifecycle calls and every read or write are collective: all ranks
//! in the handle's communicator must participate with globally-consistent
//! arguments. Between collective calls ranks may diverge freely. A handle
//! is process-local and not thread-safe.
//!
//! ## Error Handling
//!
//! Operations return [`Result`] and additionally report through a
//! process-wide hook whose default prints and aborts; see
//! [`set_error_handler_off`] for the inspect-return-codes style.

#![warn(missing_docs)]
#![warn(clippy::all)]
// Allow certain pedantic lints for existing code
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::similar_names)]

mod attribute;
mod comm;
mod datatype;
mod error;
mod field;
mod handle;
mod hid;
mod info;
mod layout;
mod line;
mod metadata;
mod plane;
mod restart;

pub use datatype::Element;
pub use error::{
    restore_default_error_handler, set_error_handler, set_error_handler_off, Error, ErrorHandler,
    ErrorReport, Result, Status,
};
pub use field::Decomposition;
pub use handle::Handle;
pub use info::Hints;
pub use layout::layout_count;
pub use restart::{next_index, restart_rename};

/// Parse a decimal version component from the build environment.
const fn parse_version(s: &str) -> u32 {
    let bytes = s.as_bytes();
    let mut value = 0u32;
    let mut i = 0;
    while i < bytes.len() {
        value = value * 10 + (bytes[i] - b'0') as u32;
        i += 1;
    }
    value
}

/// Major version recorded in every field's metadata.
pub const VERSION_MAJOR: u32 = parse_version(env!("CARGO_PKG_VERSION_MAJOR"));
/// Minor version recorded in every field's metadata.
pub const VERSION_MINOR: u32 = parse_version(env!("CARGO_PKG_VERSION_MINOR"));
/// Patch version recorded in every field's metadata.
pub const VERSION_PATCH: u32 = parse_version(env!("CARGO_PKG_VERSION_PATCH"));

#[cfg(test)]
mod tests {
    // Collective behavior requires mpiexec; see demos/.
    //   cargo build --examples && mpiexec -n 2 ./target/debug/examples/field_roundtrip

    #[test]
    fn version_components_parse() {
        assert_eq!(super::parse_version("0"), 0);
        assert_eq!(super::parse_version("12"), 12);
        let triple = (
            super::VERSION_MAJOR,
            super::VERSION_MINOR,
            super::VERSION_PATCH,
        );
        assert!(triple.0 < 100 && triple.1 < 100 && triple.2 < 100);
    }
}
