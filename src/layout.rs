//! On-disk layout registry and the layout-0 transfer kernel.
//!
//! A layout is a pluggable arrangement strategy for field data on disk,
//! identified by a small non-negative tag. The registry is a fixed table
//! of function-pointer entries; the transfer engine dispatches through it
//! without knowing how any particular layout arranges bytes. New fields
//! use the handle's active tag; existing fields are always transferred
//! with the tag recorded in their metadata, so files remain readable under
//! any active setting.

use std::os::raw::c_void;
use std::ptr;

use hdf5_sys::h5::hsize_t;
use hdf5_sys::h5d::{H5Dget_space, H5Dread, H5Dwrite};
use hdf5_sys::h5fd::{H5FD_mpio_xfer_t, H5Pset_dxpl_mpio};
use hdf5_sys::h5i::hid_t;
use hdf5_sys::h5p::{H5P_CLS_DATASET_XFER, H5Pcreate};
use hdf5_sys::h5s::{H5S_seloper_t, H5Screate_simple, H5Sselect_hyperslab, H5Sselect_none};

use crate::error::{raise, Result, Status};
use crate::hid::{Dataspace, PropertyList};

/// One direction of a rank's local sub-block, with the stride already
/// resolved to whole elements.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SubBlock {
    /// Zero-based offset of the first element this rank holds.
    pub start: hsize_t,
    /// Number of elements this rank holds.
    pub local: hsize_t,
    /// Spacing between adjacent positions in the caller's buffer.
    pub stride: hsize_t,
}

/// Constructor for the on-disk dataspace of a new field.
pub(crate) type FilespaceFn =
    fn(cglobal: hsize_t, bglobal: hsize_t, aglobal: hsize_t) -> Result<Dataspace>;

/// Collective writer for one rank's sub-block.
pub(crate) type WriteFn = fn(
    dset_id: hid_t,
    type_id: hid_t,
    c: SubBlock,
    b: SubBlock,
    a: SubBlock,
    buf: *const c_void,
) -> Result<()>;

/// Collective reader for one rank's sub-block.
pub(crate) type ReadFn = fn(
    dset_id: hid_t,
    type_id: hid_t,
    c: SubBlock,
    b: SubBlock,
    a: SubBlock,
    buf: *mut c_void,
) -> Result<()>;

/// One entry in the layout registry.
pub(crate) struct LayoutOps {
    pub tag: usize,
    pub filespace: FilespaceFn,
    pub write: WriteFn,
    pub read: ReadFn,
}

/// The closed, process-wide registry. Read-only after program start.
pub(crate) static LAYOUTS: [LayoutOps; 1] = [LayoutOps {
    tag: 0,
    filespace: layout0_filespace,
    write: layout0_write,
    read: layout0_read,
}];

/// Number of layouts this build understands; valid tags are
/// `0..layout_count()`.
pub fn layout_count() -> usize {
    LAYOUTS.len()
}

/// Layout 0: the field is a single contiguous 3D dataset in (C, B, A)
/// order.
fn layout0_filespace(cglobal: hsize_t, bglobal: hsize_t, aglobal: hsize_t) -> Result<Dataspace> {
    let dims = [cglobal, bglobal, aglobal];
    let space = Dataspace(unsafe { H5Screate_simple(3, dims.as_ptr(), ptr::null()) });
    if space.id() < 0 {
        raise!(Status::ESanity, "unable to create field filespace");
    }
    Ok(space)
}

fn layout0_write(
    dset_id: hid_t,
    type_id: hid_t,
    c: SubBlock,
    b: SubBlock,
    a: SubBlock,
    buf: *const c_void,
) -> Result<()> {
    layout0_transfer(dset_id, type_id, c, b, a, Transfer::Write(buf))
}

fn layout0_read(
    dset_id: hid_t,
    type_id: hid_t,
    c: SubBlock,
    b: SubBlock,
    a: SubBlock,
    buf: *mut c_void,
) -> Result<()> {
    layout0_transfer(dset_id, type_id, c, b, a, Transfer::Read(buf))
}

enum Transfer {
    Write(*const c_void),
    Read(*mut c_void),
}

/// Per-rank realization of a collective transfer against a layout-0
/// dataset.
///
/// The memory side is a strided hyperslab union over a one-dimensional
/// dataspace of `c.local * c.stride` elements; the file side is one
/// contiguous block at `(c.start, b.start, a.start)` of extent
/// `(c.local, b.local, a.local)`. A rank holding no data still
/// participates with an empty selection, since the collective transfer
/// requires every rank.
fn layout0_transfer(
    dset_id: hid_t,
    type_id: hid_t,
    c: SubBlock,
    b: SubBlock,
    a: SubBlock,
    buf: Transfer,
) -> Result<()> {
    let dxpl = PropertyList(unsafe { H5Pcreate(*H5P_CLS_DATASET_XFER) });
    if dxpl.id() < 0 {
        raise!(Status::ESanity, "unable to create transfer property list");
    }
    if unsafe { H5Pset_dxpl_mpio(dxpl.id(), H5FD_mpio_xfer_t::H5FD_MPIO_COLLECTIVE) } < 0 {
        raise!(Status::EFailed, "setting collective transfer mode failed");
    }

    let empty = c.local == 0 || b.local == 0 || a.local == 0;

    // Memory selection: the buffer as a 1-D element region, one strided
    // run per (k, j) pair.
    let nelems = (c.local * c.stride).max(1);
    let memspace = Dataspace(unsafe { H5Screate_simple(1, &nelems, ptr::null()) });
    if memspace.id() < 0 {
        raise!(Status::ESanity, "unable to create memory dataspace");
    }
    if unsafe { H5Sselect_none(memspace.id()) } < 0 {
        raise!(Status::EFailed, "clearing memory selection failed");
    }
    if !empty {
        for k in 0..c.local {
            for j in 0..b.local {
                let start = k * c.stride + j * b.stride;
                let stride = a.stride;
                let count = a.local;
                if unsafe {
                    H5Sselect_hyperslab(
                        memspace.id(),
                        H5S_seloper_t::H5S_SELECT_OR,
                        &start,
                        &stride,
                        &count,
                        ptr::null(),
                    )
                } < 0
                {
                    raise!(Status::EFailed, "selecting memory hyperslab failed");
                }
            }
        }
    }

    // File selection: one contiguous block of the dataset.
    let filespace = Dataspace(unsafe { H5Dget_space(dset_id) });
    if filespace.id() < 0 {
        raise!(Status::EFailed, "unable to query dataset dataspace");
    }
    if empty {
        if unsafe { H5Sselect_none(filespace.id()) } < 0 {
            raise!(Status::EFailed, "clearing file selection failed");
        }
    } else {
        let start = [c.start, b.start, a.start];
        let count = [c.local, b.local, a.local];
        if unsafe {
            H5Sselect_hyperslab(
                filespace.id(),
                H5S_seloper_t::H5S_SELECT_SET,
                start.as_ptr(),
                ptr::null(),
                count.as_ptr(),
                ptr::null(),
            )
        } < 0
        {
            raise!(Status::EFailed, "selecting file hyperslab failed");
        }
    }

    let status = match buf {
        Transfer::Write(data) => unsafe {
            H5Dwrite(
                dset_id,
                type_id,
                memspace.id(),
                filespace.id(),
                dxpl.id(),
                data,
            )
        },
        Transfer::Read(data) => unsafe {
            H5Dread(
                dset_id,
                type_id,
                memspace.id(),
                filespace.id(),
                dxpl.id(),
                data,
            )
        },
    };
    if status < 0 {
        raise!(Status::EFailed, "collective transfer failed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_tags_match_positions() {
        for (index, ops) in LAYOUTS.iter().enumerate() {
            assert_eq!(ops.tag, index);
        }
    }

    #[test]
    fn count_covers_registry() {
        assert_eq!(layout_count(), LAYOUTS.len());
        assert!(layout_count() >= 1);
    }
}
