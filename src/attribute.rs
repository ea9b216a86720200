//! Scalar, vector, and string attributes on the container root.
//!
//! Attributes are the zero-dimensional members of the object family:
//! small named values attached directly to the open file rather than to a
//! dataset. Unlike fields they carry no layout or decomposition, but they
//! remain collective because they modify the shared container's metadata.

use std::ffi::CString;
use std::os::raw::c_void;
use std::ptr;

use hdf5_sys::h5a::{H5Acreate2, H5Adelete, H5Aexists, H5Aget_space, H5Aget_type, H5Aopen, H5Aread, H5Awrite};
use hdf5_sys::h5i::hid_t;
use hdf5_sys::h5p::H5P_DEFAULT;
use hdf5_sys::h5s::{H5S_class_t, H5Screate, H5Screate_simple, H5Sget_simple_extent_npoints};
use hdf5_sys::h5t::{
    H5T_class_t, H5T_C_S1, H5Tcopy, H5Tget_class, H5Tget_size, H5Tis_variable_str, H5Tset_size,
};

use crate::datatype::Element;
use crate::error::{raise, Result, Status};
use crate::handle::Handle;
use crate::hid::{Attribute, Dataspace, Datatype};

fn attr_name(name: &str) -> Result<CString> {
    match CString::new(name) {
        Ok(c) if !name.is_empty() => Ok(c),
        _ => raise!(Status::EInval, "attribute name must be a non-empty string"),
    }
}

/// Drop any existing attribute `name` so a rewrite can change its type or
/// extent.
fn delete_existing(file_id: hid_t, c_name: &CString) -> Result<()> {
    let exists = unsafe { H5Aexists(file_id, c_name.as_ptr()) };
    if exists < 0 {
        raise!(Status::EFailed, "unable to probe for existing attribute");
    }
    if exists > 0 && unsafe { H5Adelete(file_id, c_name.as_ptr()) } < 0 {
        raise!(Status::EFailed, "unable to replace existing attribute");
    }
    Ok(())
}

fn open_attr(file_id: hid_t, c_name: &CString, name: &str) -> Result<Attribute> {
    let attr = Attribute(unsafe { H5Aopen(file_id, c_name.as_ptr(), H5P_DEFAULT) });
    if attr.id() < 0 {
        raise!(Status::EFailed, "unable to open attribute '{name}'");
    }
    Ok(attr)
}

impl Handle {
    /// Collectively write a scalar numeric attribute, overwriting any
    /// previous value.
    pub fn attribute_write<T: Element>(&self, name: &str, value: T) -> Result<()> {
        self.attribute_writev(name, &[value])
    }

    /// Collectively read a scalar numeric attribute.
    pub fn attribute_read<T: Element>(&self, name: &str) -> Result<T> {
        let mut value = [T::default()];
        self.attribute_readv(name, &mut value)?;
        Ok(value[0])
    }

    /// Collectively write a vector numeric attribute, overwriting any
    /// previous value.
    pub fn attribute_writev<T: Element>(&self, name: &str, value: &[T]) -> Result<()> {
        let file_id = self.require_file()?;
        let c_name = attr_name(name)?;
        if value.is_empty() {
            raise!(Status::EInval, "attribute value must not be empty");
        }
        delete_existing(file_id, &c_name)?;

        let dims = [value.len() as hdf5_sys::h5::hsize_t];
        let space = Dataspace(unsafe { H5Screate_simple(1, dims.as_ptr(), ptr::null()) });
        if space.id() < 0 {
            raise!(Status::ESanity, "unable to create attribute dataspace");
        }
        // SAFETY: the dataspace extent equals the buffer length and the
        // native type matches T.
        let status = unsafe {
            let attr = Attribute(H5Acreate2(
                file_id,
                c_name.as_ptr(),
                T::native_type(),
                space.id(),
                H5P_DEFAULT,
                H5P_DEFAULT,
            ));
            if attr.id() < 0 {
                raise!(Status::EFailed, "unable to create attribute '{name}'");
            }
            H5Awrite(attr.id(), T::native_type(), value.as_ptr().cast::<c_void>())
        };
        if status < 0 {
            raise!(Status::EFailed, "unable to write attribute '{name}'");
        }
        Ok(())
    }

    /// Collectively read a vector numeric attribute. The stored component
    /// count must equal `value.len()`.
    pub fn attribute_readv<T: Element>(&self, name: &str, value: &mut [T]) -> Result<()> {
        let file_id = self.require_file()?;
        let c_name = attr_name(name)?;
        let attr = open_attr(file_id, &c_name, name)?;

        let space = Dataspace(unsafe { H5Aget_space(attr.id()) });
        if space.id() < 0 {
            raise!(Status::EFailed, "unable to query attribute extent");
        }
        let npoints = unsafe { H5Sget_simple_extent_npoints(space.id()) };
        if npoints < 0 || npoints as usize != value.len() {
            raise!(
                Status::EInval,
                "attribute '{name}' holds {npoints} components, not {}",
                value.len()
            );
        }

        if unsafe { H5Aread(attr.id(), T::native_type(), value.as_mut_ptr().cast::<c_void>()) } < 0
        {
            raise!(Status::EFailed, "unable to read attribute '{name}'");
        }
        Ok(())
    }

    /// Number of components in the stored numeric attribute `name`;
    /// scalars report 1.
    pub fn attribute_sizev(&self, name: &str) -> Result<usize> {
        let file_id = self.require_file()?;
        let c_name = attr_name(name)?;
        let attr = open_attr(file_id, &c_name, name)?;
        let space = Dataspace(unsafe { H5Aget_space(attr.id()) });
        if space.id() < 0 {
            raise!(Status::EFailed, "unable to query attribute extent");
        }
        let npoints = unsafe { H5Sget_simple_extent_npoints(space.id()) };
        if npoints < 0 {
            raise!(Status::EFailed, "unable to query attribute extent");
        }
        Ok(npoints as usize)
    }

    /// Collectively set a string-valued attribute, overwriting any
    /// previous value.
    pub fn string_set(&self, name: &str, value: &str) -> Result<()> {
        let file_id = self.require_file()?;
        let c_name = attr_name(name)?;
        let Ok(c_value) = CString::new(value) else {
            raise!(Status::EInval, "string value contains a null byte");
        };
        delete_existing(file_id, &c_name)?;

        // Fixed-size, null-terminated string type sized to this value.
        let s_type = Datatype(unsafe { H5Tcopy(*H5T_C_S1) });
        if s_type.id() < 0 {
            raise!(Status::ESanity, "unable to copy string type");
        }
        if unsafe { H5Tset_size(s_type.id(), c_value.as_bytes_with_nul().len()) } < 0 {
            raise!(Status::ESanity, "unable to size string type");
        }
        let space = Dataspace(unsafe { H5Screate(H5S_class_t::H5S_SCALAR) });
        if space.id() < 0 {
            raise!(Status::ESanity, "unable to create scalar dataspace");
        }

        let status = unsafe {
            let attr = Attribute(H5Acreate2(
                file_id,
                c_name.as_ptr(),
                s_type.id(),
                space.id(),
                H5P_DEFAULT,
                H5P_DEFAULT,
            ));
            if attr.id() < 0 {
                raise!(Status::EFailed, "unable to create attribute '{name}'");
            }
            H5Awrite(attr.id(), s_type.id(), c_value.as_ptr().cast::<c_void>())
        };
        if status < 0 {
            raise!(Status::EFailed, "unable to write attribute '{name}'");
        }
        Ok(())
    }

    /// Fetch the string-valued attribute `name`.
    pub fn string_get(&self, name: &str) -> Result<String> {
        let file_id = self.require_file()?;
        let c_name = attr_name(name)?;
        let attr = open_attr(file_id, &c_name, name)?;

        let s_type = Datatype(unsafe { H5Aget_type(attr.id()) });
        if s_type.id() < 0 {
            raise!(Status::EFailed, "unable to query attribute type");
        }
        if unsafe { H5Tget_class(s_type.id()) } != H5T_class_t::H5T_STRING {
            raise!(Status::EInval, "attribute '{name}' is not a string");
        }
        if unsafe { H5Tis_variable_str(s_type.id()) } > 0 {
            raise!(
                Status::EInval,
                "variable-length string attribute '{name}' is not supported"
            );
        }

        let size = unsafe { H5Tget_size(s_type.id()) };
        if size == 0 {
            raise!(Status::EFailed, "unable to query string length");
        }
        let mut buf = vec![0u8; size];
        if unsafe { H5Aread(attr.id(), s_type.id(), buf.as_mut_ptr().cast::<c_void>()) } < 0 {
            raise!(Status::EFailed, "unable to read attribute '{name}'");
        }
        let end = buf.iter().position(|&byte| byte == 0).unwrap_or(buf.len());
        buf.truncate(end);
        match String::from_utf8(buf) {
            Ok(text) => Ok(text),
            Err(_) => raise!(Status::EFailed, "attribute '{name}' is not valid UTF-8"),
        }
    }
}
