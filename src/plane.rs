//! Distributed 2D plane transfers.
//!
//! A plane is a field with the slowest direction held at extent one, so
//! every operation here is a thin projection onto the 3D engine: B is the
//! slower of the two remaining directions, A the faster. Planes therefore
//! share the field metadata, the layout dispatch, and the collective
//! transfer path unchanged.

use crate::datatype::Element;
use crate::error::{raise, Result, Status};
use crate::field::Decomposition;
use crate::handle::Handle;

impl Handle {
    /// Collectively write a scalar 2D plane.
    pub fn plane_write<T: Element>(
        &self,
        name: &str,
        plane: &[T],
        b: Decomposition,
        a: Decomposition,
    ) -> Result<()> {
        self.field_write(name, plane, Decomposition::degenerate(), b, a)
    }

    /// Collectively write a vector 2D plane of `ncomponents` scalars per
    /// point.
    pub fn plane_writev<T: Element>(
        &self,
        name: &str,
        plane: &[T],
        b: Decomposition,
        a: Decomposition,
        ncomponents: usize,
    ) -> Result<()> {
        self.field_writev(name, plane, Decomposition::degenerate(), b, a, ncomponents)
    }

    /// Collectively read a scalar 2D plane.
    pub fn plane_read<T: Element>(
        &self,
        name: &str,
        plane: &mut [T],
        b: Decomposition,
        a: Decomposition,
    ) -> Result<()> {
        self.field_read(name, plane, Decomposition::degenerate(), b, a)
    }

    /// Collectively read a vector 2D plane of `ncomponents` scalars per
    /// point.
    pub fn plane_readv<T: Element>(
        &self,
        name: &str,
        plane: &mut [T],
        b: Decomposition,
        a: Decomposition,
        ncomponents: usize,
    ) -> Result<()> {
        self.field_readv(name, plane, Decomposition::degenerate(), b, a, ncomponents)
    }

    /// Global extents `(B, A)` of the stored plane `name`.
    pub fn plane_size(&self, name: &str) -> Result<(usize, usize)> {
        let (b, a, _) = self.plane_sizev(name)?;
        Ok((b, a))
    }

    /// Global extents and component count `(B, A, ncomponents)` of the
    /// stored plane `name`.
    pub fn plane_sizev(&self, name: &str) -> Result<(usize, usize, usize)> {
        let (c, b, a, ncomponents) = self.field_sizev(name)?;
        if c != 1 {
            raise!(Status::EInval, "'{name}' is not a plane");
        }
        Ok((b, a, ncomponents))
    }
}
