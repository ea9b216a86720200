//! Distributed 3D field transfers.
//!
//! A field is a distributed three-dimensional dataset with directions
//! labeled C (slowest), B, and A (fastest). Each rank contributes one
//! [`Decomposition`] per direction describing its local sub-block and the
//! stride of that sub-block within its memory buffer; the engine maps the
//! union of sub-blocks onto a single globally-contiguous dataset through a
//! collective transfer.
//!
//! Shape compatibility is always judged against the metadata stored with
//! the dataset, never against what the caller supplied on an earlier
//! call: the engine re-probes storage on every operation.

use std::ffi::CString;
use std::ptr;

use hdf5_sys::h5::hsize_t;
use hdf5_sys::h5d::{H5Dcreate2, H5Dget_type, H5Dopen2};
use hdf5_sys::h5i::hid_t;
use hdf5_sys::h5p::H5P_DEFAULT;
use hdf5_sys::h5t::{H5T_cdata_t, H5Tfind};

use crate::datatype::{element_type, Element};
use crate::error::{raise, Result, Status};
use crate::handle::Handle;
use crate::hid::{Dataset, Datatype};
use crate::layout::{self, SubBlock};
use crate::metadata::{self, FieldMetadata};

/// One direction of a rank's contribution to a distributed transfer.
///
/// `stride` is measured in scalar elements within the caller's buffer; a
/// stride of zero means contiguous, i.e. the tight product of the faster
/// directions' local extents and the component count. Across ranks the
/// half-open ranges `[start, start + local)` must tile `[0, global)`
/// exactly; the engine assumes this and does not verify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decomposition {
    /// Global extent along this direction.
    pub global: usize,
    /// Zero-based offset of this rank's first element.
    pub start: usize,
    /// Number of elements this rank contributes (>= 1).
    pub local: usize,
    /// Spacing between adjacent positions in the caller's buffer, in
    /// scalars; 0 selects the contiguous default.
    pub stride: usize,
}

impl Decomposition {
    /// A contiguous contribution of `local` elements starting at `start`.
    pub fn new(global: usize, start: usize, local: usize) -> Self {
        Decomposition {
            global,
            start,
            local,
            stride: 0,
        }
    }

    /// Replace the stride (in scalars) of this contribution.
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// The whole of a direction, held by every rank. Used when a lower
    /// dimensional object is pushed through the 3D engine.
    pub(crate) fn degenerate() -> Self {
        Decomposition::new(1, 0, 1)
    }
}

/// Strides resolved to whole elements, ready for layout dispatch.
fn resolve_subblocks(
    c: Decomposition,
    b: Decomposition,
    a: Decomposition,
    ncomponents: usize,
) -> Result<(SubBlock, SubBlock, SubBlock)> {
    if ncomponents < 1 {
        raise!(Status::EInval, "ncomponents must be at least 1");
    }
    for (dir, d) in [("c", &c), ("b", &b), ("a", &a)] {
        if d.local < 1 {
            raise!(Status::EInval, "{dir} local count must be at least 1");
        }
        if d.stride != 0 && d.stride % ncomponents != 0 {
            raise!(
                Status::EInval,
                "{dir} stride must be a multiple of ncomponents"
            );
        }
    }

    // Element-unit strides, innermost outward; zero means tight.
    let astride = if a.stride == 0 {
        1
    } else {
        a.stride / ncomponents
    };
    let bstride = if b.stride == 0 {
        a.local * astride
    } else {
        b.stride / ncomponents
    };
    let cstride = if c.stride == 0 {
        b.local * bstride
    } else {
        c.stride / ncomponents
    };
    if bstride < a.local * astride {
        raise!(Status::EInval, "b stride too small for the local a extent");
    }
    if cstride < b.local * bstride {
        raise!(Status::EInval, "c stride too small for the local b extent");
    }

    let sub = |d: &Decomposition, stride: usize| SubBlock {
        start: d.start as hsize_t,
        local: d.local as hsize_t,
        stride: stride as hsize_t,
    };
    Ok((sub(&c, cstride), sub(&b, bstride), sub(&a, astride)))
}

/// Scalars the caller's buffer must hold to cover the resolved sub-block.
fn required_scalars(c: &SubBlock, b: &SubBlock, a: &SubBlock, ncomponents: usize) -> usize {
    let last = (c.local - 1) * c.stride + (b.local - 1) * b.stride + (a.local - 1) * a.stride;
    (last as usize + 1) * ncomponents
}

fn check_against_stored(
    meta: &FieldMetadata,
    name: &str,
    c: &Decomposition,
    b: &Decomposition,
    a: &Decomposition,
    ncomponents: usize,
) -> Result<()> {
    if c.global != meta.cglobal {
        raise!(
            Status::EInval,
            "request cglobal mismatch with existing field '{name}'"
        );
    }
    if b.global != meta.bglobal {
        raise!(
            Status::EInval,
            "request bglobal mismatch with existing field '{name}'"
        );
    }
    if a.global != meta.aglobal {
        raise!(
            Status::EInval,
            "request aglobal mismatch with existing field '{name}'"
        );
    }
    if ncomponents != meta.ncomponents {
        raise!(
            Status::EInval,
            "request ncomponents mismatch with existing field '{name}'"
        );
    }
    Ok(())
}

/// Fail unless the caller's element type can be converted to the type the
/// dataset was created with.
fn ensure_convertible(src_type: hid_t, dset_id: hid_t) -> Result<()> {
    let stored = Datatype(unsafe { H5Dget_type(dset_id) });
    if stored.id() < 0 {
        raise!(Status::EFailed, "unable to query stored element type");
    }
    let mut cdata: *mut H5T_cdata_t = ptr::null_mut();
    let converter = unsafe { H5Tfind(src_type, stored.id(), &mut cdata) };
    if converter.is_none() {
        raise!(
            Status::EInval,
            "request type not convertible to existing field type"
        );
    }
    Ok(())
}

fn open_dataset(file_id: hid_t, name: &str) -> Result<Dataset> {
    let Ok(c_name) = CString::new(name) else {
        raise!(Status::EInval, "dataset name contains a null byte");
    };
    let dset = Dataset(unsafe { H5Dopen2(file_id, c_name.as_ptr(), H5P_DEFAULT) });
    if dset.id() < 0 {
        raise!(Status::EFailed, "unable to open dataset '{name}'");
    }
    Ok(dset)
}

/// Create the dataset for a new field with the handle's active layout and
/// stamp its metadata.
fn create_field(
    handle: &Handle,
    file_id: hid_t,
    name: &str,
    type_id: hid_t,
    c: &Decomposition,
    b: &Decomposition,
    a: &Decomposition,
    ncomponents: usize,
) -> Result<(Dataset, usize)> {
    let tag = handle.layout_get();
    let ops = &layout::LAYOUTS[tag];
    if ops.tag != tag {
        raise!(Status::ESanity, "layout registry inconsistent with tag {tag}");
    }

    let filespace = (ops.filespace)(
        c.global as hsize_t,
        b.global as hsize_t,
        a.global as hsize_t,
    )?;

    let Ok(c_name) = CString::new(name) else {
        raise!(Status::EInval, "dataset name contains a null byte");
    };
    let dset = Dataset(unsafe {
        H5Dcreate2(
            file_id,
            c_name.as_ptr(),
            type_id,
            filespace.id(),
            H5P_DEFAULT,
            H5P_DEFAULT,
            H5P_DEFAULT,
        )
    });
    if dset.id() < 0 {
        raise!(Status::EFailed, "unable to create dataset '{name}'");
    }

    metadata::write(
        file_id, name, tag, c.global, b.global, a.global, ncomponents,
    )?;

    Ok((dset, tag))
}

impl Handle {
    /// Collectively write a scalar 3D field.
    ///
    /// Creates the dataset with the handle's active layout when `name`
    /// does not yet exist; otherwise the stored shape must match and the
    /// stored layout governs the transfer.
    pub fn field_write<T: Element>(
        &self,
        name: &str,
        field: &[T],
        c: Decomposition,
        b: Decomposition,
        a: Decomposition,
    ) -> Result<()> {
        self.field_writev(name, field, c, b, a, 1)
    }

    /// Collectively write a vector 3D field of `ncomponents` scalars per
    /// point. Strides must be multiples of `ncomponents`.
    pub fn field_writev<T: Element>(
        &self,
        name: &str,
        field: &[T],
        c: Decomposition,
        b: Decomposition,
        a: Decomposition,
        ncomponents: usize,
    ) -> Result<()> {
        let file_id = self.require_file()?;
        if name.is_empty() {
            raise!(Status::EInval, "field name must not be empty");
        }
        let (sc, sb, sa) = resolve_subblocks(c, b, a, ncomponents)?;
        let required = required_scalars(&sc, &sb, &sa, ncomponents);
        if field.len() < required {
            raise!(
                Status::EInval,
                "buffer holds {} scalars but the sub-block spans {required}",
                field.len()
            );
        }
        let type_id = element_type::<T>(ncomponents)?;
        let buf = field.as_ptr().cast();

        match metadata::read(file_id, name)? {
            None => {
                let (dset, tag) =
                    create_field(self, file_id, name, type_id.id(), &c, &b, &a, ncomponents)?;
                (layout::LAYOUTS[tag].write)(dset.id(), type_id.id(), sc, sb, sa, buf)?;
            }
            Some(meta) => {
                check_against_stored(&meta, name, &c, &b, &a, ncomponents)?;
                let dset = open_dataset(file_id, name)?;
                ensure_convertible(type_id.id(), dset.id())?;
                (layout::LAYOUTS[meta.layout_tag].write)(
                    dset.id(),
                    type_id.id(),
                    sc,
                    sb,
                    sa,
                    buf,
                )?;
            }
        }
        Ok(())
    }

    /// Collectively read a scalar 3D field into `field`.
    ///
    /// The field must exist and the supplied globals must equal the
    /// stored shape exactly. The layout stored in the field's metadata
    /// governs the transfer regardless of the handle's active tag.
    pub fn field_read<T: Element>(
        &self,
        name: &str,
        field: &mut [T],
        c: Decomposition,
        b: Decomposition,
        a: Decomposition,
    ) -> Result<()> {
        self.field_readv(name, field, c, b, a, 1)
    }

    /// Collectively read a vector 3D field of `ncomponents` scalars per
    /// point. Strides must be multiples of `ncomponents`.
    pub fn field_readv<T: Element>(
        &self,
        name: &str,
        field: &mut [T],
        c: Decomposition,
        b: Decomposition,
        a: Decomposition,
        ncomponents: usize,
    ) -> Result<()> {
        let file_id = self.require_file()?;
        if name.is_empty() {
            raise!(Status::EInval, "field name must not be empty");
        }
        let (sc, sb, sa) = resolve_subblocks(c, b, a, ncomponents)?;
        let required = required_scalars(&sc, &sb, &sa, ncomponents);
        if field.len() < required {
            raise!(
                Status::EInval,
                "buffer holds {} scalars but the sub-block spans {required}",
                field.len()
            );
        }

        let Some(meta) = metadata::read(file_id, name)? else {
            raise!(Status::EFailed, "unable to read metadata for field '{name}'");
        };
        check_against_stored(&meta, name, &c, &b, &a, ncomponents)?;

        let type_id = element_type::<T>(ncomponents)?;
        let dset = open_dataset(file_id, name)?;
        ensure_convertible(type_id.id(), dset.id())?;

        (layout::LAYOUTS[meta.layout_tag].read)(
            dset.id(),
            type_id.id(),
            sc,
            sb,
            sa,
            field.as_mut_ptr().cast(),
        )?;
        Ok(())
    }

    /// Global extents `(C, B, A)` of the stored field `name`.
    pub fn field_size(&self, name: &str) -> Result<(usize, usize, usize)> {
        let (c, b, a, _) = self.field_sizev(name)?;
        Ok((c, b, a))
    }

    /// Global extents and component count `(C, B, A, ncomponents)` of the
    /// stored field `name`.
    pub fn field_sizev(&self, name: &str) -> Result<(usize, usize, usize, usize)> {
        let file_id = self.require_file()?;
        let Some(meta) = metadata::read(file_id, name)? else {
            raise!(Status::EFailed, "unable to read metadata for field '{name}'");
        };
        Ok((meta.cglobal, meta.bglobal, meta.aglobal, meta.ncomponents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(global: usize, start: usize, local: usize) -> Decomposition {
        Decomposition::new(global, start, local)
    }

    #[test]
    fn contiguous_strides_resolve_to_tight_products() {
        let (c, b, a) = resolve_subblocks(d(4, 0, 4), d(3, 0, 3), d(2, 0, 2), 1).unwrap();
        assert_eq!(a.stride, 1);
        assert_eq!(b.stride, 2);
        assert_eq!(c.stride, 6);
        assert_eq!(required_scalars(&c, &b, &a, 1), 24);
    }

    #[test]
    fn vector_strides_are_counted_in_scalars() {
        let (c, b, a) = resolve_subblocks(d(1, 0, 1), d(1, 0, 1), d(8, 0, 4), 2).unwrap();
        assert_eq!(a.stride, 1);
        assert_eq!(b.stride, 4);
        assert_eq!(c.stride, 4);
        assert_eq!(required_scalars(&c, &b, &a, 2), 8);
    }

    #[test]
    fn explicit_strides_are_divided_by_ncomponents() {
        let (c, b, a) = resolve_subblocks(
            d(2, 0, 2).with_stride(24),
            d(2, 0, 2).with_stride(12),
            d(2, 0, 2).with_stride(6),
            3,
        )
        .unwrap();
        assert_eq!(a.stride, 2);
        assert_eq!(b.stride, 4);
        assert_eq!(c.stride, 8);
        // One trailing element beyond the last stride gap.
        assert_eq!(required_scalars(&c, &b, &a, 3), (8 + 4 + 2 + 1) * 3);
    }

    #[test]
    fn zero_local_count_is_rejected() {
        let err = resolve_subblocks(d(4, 0, 0), d(3, 0, 3), d(2, 0, 2), 1).unwrap_err();
        assert_eq!(err.status(), Status::EInval);
    }

    #[test]
    fn misaligned_vector_stride_is_rejected() {
        let err =
            resolve_subblocks(d(1, 0, 1), d(1, 0, 1), d(4, 0, 4).with_stride(3), 2).unwrap_err();
        assert_eq!(err.status(), Status::EInval);
    }

    #[test]
    fn overlapping_strides_are_rejected() {
        // b advances by less than one full a-run.
        let err =
            resolve_subblocks(d(1, 0, 1), d(2, 0, 2).with_stride(3), d(4, 0, 4), 1).unwrap_err();
        assert_eq!(err.status(), Status::EInval);
    }

    #[test]
    fn degenerate_direction_is_a_single_slot() {
        let whole = Decomposition::degenerate();
        assert_eq!(whole, d(1, 0, 1));
        let (c, b, a) =
            resolve_subblocks(whole, whole, d(8, 4, 4), 1).unwrap();
        assert_eq!((c.start, c.local), (0, 1));
        assert_eq!((b.start, b.local), (0, 1));
        assert_eq!((a.start, a.local), (4, 4));
        assert_eq!(required_scalars(&c, &b, &a, 1), 4);
    }
}
