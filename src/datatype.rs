//! Element-type trait and vector datatype construction.
//!
//! This module provides the [`Element`] trait, a sealed trait mapping the
//! Rust types a restart file may hold to the container's native element
//! types, plus the helpers the transfer engine uses to build vector
//! (fixed-length array) element types and to recover a stored type's
//! component count.
//!
//! # Supported Types
//!
//! | Rust Type | Stored As          |
//! |-----------|--------------------|
//! | `f64`     | native double      |
//! | `f32`     | native float       |
//! | `i32`     | native int         |

use hdf5_sys::h5i::hid_t;
use hdf5_sys::h5t::{
    H5T_class_t, H5T_NATIVE_DOUBLE, H5T_NATIVE_FLOAT, H5T_NATIVE_INT, H5Tarray_create2, H5Tcopy,
    H5Tget_array_dims2, H5Tget_array_ndims, H5Tget_class,
};

use crate::error::{raise, Result, Status};
use crate::hid::Datatype;

/// Internal module to seal the trait against external implementations.
mod sealed {
    pub trait Sealed {}
}

/// Trait for scalar types that can be stored in a restart file.
///
/// This is a **sealed trait**; the supported types are [`f64`], [`f32`],
/// and [`i32`].
pub trait Element: sealed::Sealed + Copy + Default + 'static {
    /// The container's native type identifier for this type.
    ///
    /// Borrowed from the library's global table; never closed by callers.
    #[doc(hidden)]
    fn native_type() -> hid_t;
}

macro_rules! impl_element {
    ($ty:ty, $native:expr) => {
        impl sealed::Sealed for $ty {}
        impl Element for $ty {
            fn native_type() -> hid_t {
                crate::hid::ensure_library_init();
                // SAFETY: library initialization above makes the global
                // native type identifiers valid.
                unsafe { $native }
            }
        }
    };
}

impl_element!(f64, *H5T_NATIVE_DOUBLE);
impl_element!(f32, *H5T_NATIVE_FLOAT);
impl_element!(i32, *H5T_NATIVE_INT);

/// Build the element type used for a transfer: a copy of the scalar native
/// type when `ncomponents == 1`, otherwise a one-dimensional array type of
/// `ncomponents` scalars.
///
/// The returned guard owns the identifier either way, so the caller can
/// release it uniformly.
pub(crate) fn element_type<T: Element>(ncomponents: usize) -> Result<Datatype> {
    let native = T::native_type();
    let id = if ncomponents == 1 {
        unsafe { H5Tcopy(native) }
    } else {
        let dims = [ncomponents as hdf5_sys::h5::hsize_t];
        unsafe { H5Tarray_create2(native, 1, dims.as_ptr()) }
    };
    if id < 0 {
        raise!(Status::ESanity, "unable to construct element type");
    }
    Ok(Datatype(id))
}

/// Number of scalar components in a stored element type: 1 for scalar
/// classes, the array length for one-dimensional array types.
pub(crate) fn type_ncomponents(type_id: hid_t) -> Result<usize> {
    match unsafe { H5Tget_class(type_id) } {
        H5T_class_t::H5T_FLOAT | H5T_class_t::H5T_INTEGER | H5T_class_t::H5T_ENUM => Ok(1),
        H5T_class_t::H5T_ARRAY => {
            if unsafe { H5Tget_array_ndims(type_id) } != 1 {
                raise!(
                    Status::ESanity,
                    "stored array element type is not one-dimensional"
                );
            }
            let mut dims = [0 as hdf5_sys::h5::hsize_t];
            if unsafe { H5Tget_array_dims2(type_id, dims.as_mut_ptr()) } < 0 {
                raise!(Status::ESanity, "unable to query array element extent");
            }
            Ok(dims[0] as usize)
        }
        other => raise!(
            Status::ESanity,
            "unsupported stored element type class {other:?}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trait_is_implemented() {
        fn assert_element<T: Element>() {}
        assert_element::<f64>();
        assert_element::<f32>();
        assert_element::<i32>();
    }

    #[test]
    fn native_types_are_distinct() {
        let d = f64::native_type();
        let f = f32::native_type();
        let i = i32::native_type();
        assert!(d >= 0 && f >= 0 && i >= 0);
        assert_ne!(d, f);
        assert_ne!(d, i);
        assert_ne!(f, i);
    }

    #[test]
    fn scalar_and_vector_component_counts() {
        let scalar = element_type::<f64>(1).unwrap();
        assert_eq!(type_ncomponents(scalar.id()).unwrap(), 1);
        let vector = element_type::<f64>(3).unwrap();
        assert_eq!(type_ncomponents(vector.id()).unwrap(), 3);
    }
}
