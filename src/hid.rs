//! RAII guards for container identifiers.
//!
//! The container driver hands out integer identifiers that must be
//! released exactly once on every exit path. Each guard here owns one
//! identifier class and closes it on drop, which keeps the transfer
//! kernel's error handling flat.

use std::sync::Once;

use hdf5_sys::h5::H5open;
use hdf5_sys::h5a::H5Aclose;
use hdf5_sys::h5d::H5Dclose;
use hdf5_sys::h5i::hid_t;
use hdf5_sys::h5p::H5Pclose;
use hdf5_sys::h5s::H5Sclose;
use hdf5_sys::h5t::H5Tclose;

/// Ensure the container library's global state (native type identifiers,
/// default property lists) is initialized before first use.
pub(crate) fn ensure_library_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // SAFETY: H5open is idempotent and safe to call before any other
        // library entry point.
        unsafe {
            H5open();
        }
    });
}

macro_rules! id_guard {
    ($(#[$meta:meta])* $name:ident, $close:ident) => {
        $(#[$meta])*
        pub(crate) struct $name(pub(crate) hid_t);

        impl $name {
            pub(crate) fn id(&self) -> hid_t {
                self.0
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                // SAFETY: the guard owns a valid identifier of its class.
                unsafe {
                    if self.0 >= 0 {
                        $close(self.0);
                    }
                }
            }
        }
    };
}

id_guard!(
    /// An owned property list identifier.
    PropertyList,
    H5Pclose
);

id_guard!(
    /// An owned dataspace identifier.
    Dataspace,
    H5Sclose
);

id_guard!(
    /// An owned dataset identifier.
    Dataset,
    H5Dclose
);

id_guard!(
    /// An owned datatype identifier (copies and array types only; native
    /// type identifiers are never wrapped).
    Datatype,
    H5Tclose
);

id_guard!(
    /// An owned attribute identifier.
    Attribute,
    H5Aclose
);
