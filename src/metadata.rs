//! Field metadata codec.
//!
//! Every field dataset carries an 8-integer attribute named
//! `esio_metadata`: the library version triple, the on-disk layout tag,
//! the three global extents, and the component count. The tuple, not the
//! caller, is the source of truth for a stored field's shape; the transfer
//! engine re-probes it from storage on every write rather than caching it
//! in memory.
//!
//! Probing doubles as the existence check for a field, so
//! [`read`] never reports through the error hook and silences the
//! container's own error printing for the probe's duration.

use std::ffi::CString;
use std::os::raw::c_void;
use std::ptr;

use hdf5_sys::h5a::{H5Aclose, H5Acreate2, H5Aopen, H5Aread, H5Awrite};
use hdf5_sys::h5e::{H5E_auto2_t, H5Eget_auto2, H5Eset_auto2, H5E_DEFAULT};
use hdf5_sys::h5i::hid_t;
use hdf5_sys::h5o::{H5Oclose, H5Oopen};
use hdf5_sys::h5p::H5P_DEFAULT;
use hdf5_sys::h5s::H5Screate_simple;
use hdf5_sys::h5t::H5T_NATIVE_INT;

use crate::error::{raise, Result, Status};
use crate::hid::Dataspace;
use crate::layout;

/// Attribute name holding the metadata tuple. Fixed on disk; changing it
/// would orphan every existing restart file.
const ATTRIBUTE_NAME: &str = "esio_metadata";

/// Number of integers in the metadata tuple.
const TUPLE_LEN: usize = 8;

/// Sentinel placed one past the tuple to detect format drift on read.
const SENTINEL: i32 = i32::MIN + 999_983;

/// Shape information stored with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldMetadata {
    pub layout_tag: usize,
    pub cglobal: usize,
    pub bglobal: usize,
    pub aglobal: usize,
    pub ncomponents: usize,
}

/// Scoped suppression of the container driver's error auto-printing.
///
/// Saves the current error sink on construction and restores it on drop,
/// so the sink comes back on every exit path including unwinds.
struct SilenceContainerErrors {
    func: H5E_auto2_t,
    data: *mut c_void,
}

impl SilenceContainerErrors {
    fn new() -> Self {
        let mut func: H5E_auto2_t = None;
        let mut data: *mut c_void = ptr::null_mut();
        // SAFETY: querying and replacing the default error stack's sink is
        // always valid; the saved pair is restored in drop.
        unsafe {
            H5Eget_auto2(H5E_DEFAULT, &mut func, &mut data);
            H5Eset_auto2(H5E_DEFAULT, None, ptr::null_mut());
        }
        SilenceContainerErrors { func, data }
    }
}

impl Drop for SilenceContainerErrors {
    fn drop(&mut self) {
        // SAFETY: restores the exact sink captured in new.
        unsafe {
            H5Eset_auto2(H5E_DEFAULT, self.func, self.data);
        }
    }
}

/// Attach the metadata tuple to the dataset `name` under `loc_id`.
///
/// Layout decisions freeze here: the attribute is written once, when the
/// dataset is created, and never rewritten.
pub(crate) fn write(
    loc_id: hid_t,
    name: &str,
    layout_tag: usize,
    cglobal: usize,
    bglobal: usize,
    aglobal: usize,
    ncomponents: usize,
) -> Result<()> {
    let tuple: [i32; TUPLE_LEN] = [
        crate::VERSION_MAJOR as i32,
        crate::VERSION_MINOR as i32,
        crate::VERSION_PATCH as i32,
        layout_tag as i32,
        cglobal as i32,
        bglobal as i32,
        aglobal as i32,
        ncomponents as i32,
    ];

    let Ok(c_name) = CString::new(name) else {
        raise!(Status::EInval, "dataset name contains a null byte");
    };
    let Ok(c_attr) = CString::new(ATTRIBUTE_NAME) else {
        raise!(Status::ESanity, "attribute name contains a null byte");
    };

    let dims = [TUPLE_LEN as hdf5_sys::h5::hsize_t];
    let space = Dataspace(unsafe { H5Screate_simple(1, dims.as_ptr(), ptr::null()) });
    if space.id() < 0 {
        raise!(Status::ESanity, "unable to create metadata dataspace");
    }

    // SAFETY: loc_id is an open container, c strings are null-terminated,
    // and the attribute dataspace matches the tuple length.
    let status = unsafe {
        let obj = H5Oopen(loc_id, c_name.as_ptr(), H5P_DEFAULT);
        if obj < 0 {
            raise!(Status::EFailed, "unable to open dataset '{name}'");
        }
        let attr = H5Acreate2(
            obj,
            c_attr.as_ptr(),
            *H5T_NATIVE_INT,
            space.id(),
            H5P_DEFAULT,
            H5P_DEFAULT,
        );
        if attr < 0 {
            H5Oclose(obj);
            raise!(Status::EFailed, "unable to create metadata for '{name}'");
        }
        let status = H5Awrite(attr, *H5T_NATIVE_INT, tuple.as_ptr().cast::<c_void>());
        H5Aclose(attr);
        H5Oclose(obj);
        status
    };
    if status < 0 {
        raise!(Status::EFailed, "unable to save metadata for '{name}'");
    }
    Ok(())
}

/// Probe the metadata tuple for the dataset `name` under `loc_id`.
///
/// Returns `Ok(None)` when the dataset or its metadata attribute does not
/// exist. Absence is an expected outcome, so this path never touches the
/// error hook; only a clobbered sentinel or an unknown stored layout tag
/// is reported, as those indicate corruption rather than absence.
pub(crate) fn read(loc_id: hid_t, name: &str) -> Result<Option<FieldMetadata>> {
    let Ok(c_name) = CString::new(name) else {
        return Ok(None);
    };
    let Ok(c_attr) = CString::new(ATTRIBUTE_NAME) else {
        return Ok(None);
    };

    let mut tuple = [0i32; TUPLE_LEN + 1];
    tuple[TUPLE_LEN] = SENTINEL;

    let status = {
        let _silence = SilenceContainerErrors::new();
        // SAFETY: identifiers are closed before the silence guard drops;
        // the read buffer holds TUPLE_LEN + 1 integers, one past what a
        // well-formed attribute provides.
        unsafe {
            let obj = H5Oopen(loc_id, c_name.as_ptr(), H5P_DEFAULT);
            if obj < 0 {
                return Ok(None);
            }
            let attr = H5Aopen(obj, c_attr.as_ptr(), H5P_DEFAULT);
            if attr < 0 {
                H5Oclose(obj);
                return Ok(None);
            }
            let status = H5Aread(attr, *H5T_NATIVE_INT, tuple.as_mut_ptr().cast::<c_void>());
            H5Aclose(attr);
            H5Oclose(obj);
            status
        }
    };

    if tuple[TUPLE_LEN] != SENTINEL {
        raise!(
            Status::ESanity,
            "metadata read for '{name}' overran its buffer"
        );
    }
    if status < 0 {
        return Ok(None);
    }

    let layout_tag = tuple[3];
    if layout_tag < 0 || layout_tag as usize >= layout::layout_count() {
        raise!(
            Status::ESanity,
            "metadata for '{name}' names unknown layout tag {layout_tag}"
        );
    }

    Ok(Some(FieldMetadata {
        layout_tag: layout_tag as usize,
        cglobal: tuple[4] as usize,
        bglobal: tuple[5] as usize,
        aglobal: tuple[6] as usize,
        ncomponents: tuple[7] as usize,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_far_from_plausible_values() {
        assert!(SENTINEL < -2_000_000_000);
    }

    #[test]
    fn tuple_layout_is_fixed() {
        // Versions occupy the first three slots, shape the last five; the
        // on-disk format depends on this ordering.
        assert_eq!(TUPLE_LEN, 8);
        assert_eq!(ATTRIBUTE_NAME, "esio_metadata");
    }
}
