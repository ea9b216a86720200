//! Distributed 1D line transfers.
//!
//! A line holds both slower directions at extent one and distributes only
//! the fastest direction A. Like planes, lines reuse the 3D engine and
//! its layout dispatch unchanged.

use crate::datatype::Element;
use crate::error::{raise, Result, Status};
use crate::field::Decomposition;
use crate::handle::Handle;

impl Handle {
    /// Collectively write a scalar 1D line.
    pub fn line_write<T: Element>(&self, name: &str, line: &[T], a: Decomposition) -> Result<()> {
        self.field_write(
            name,
            line,
            Decomposition::degenerate(),
            Decomposition::degenerate(),
            a,
        )
    }

    /// Collectively write a vector 1D line of `ncomponents` scalars per
    /// point.
    pub fn line_writev<T: Element>(
        &self,
        name: &str,
        line: &[T],
        a: Decomposition,
        ncomponents: usize,
    ) -> Result<()> {
        self.field_writev(
            name,
            line,
            Decomposition::degenerate(),
            Decomposition::degenerate(),
            a,
            ncomponents,
        )
    }

    /// Collectively read a scalar 1D line.
    pub fn line_read<T: Element>(
        &self,
        name: &str,
        line: &mut [T],
        a: Decomposition,
    ) -> Result<()> {
        self.field_read(
            name,
            line,
            Decomposition::degenerate(),
            Decomposition::degenerate(),
            a,
        )
    }

    /// Collectively read a vector 1D line of `ncomponents` scalars per
    /// point.
    pub fn line_readv<T: Element>(
        &self,
        name: &str,
        line: &mut [T],
        a: Decomposition,
        ncomponents: usize,
    ) -> Result<()> {
        self.field_readv(
            name,
            line,
            Decomposition::degenerate(),
            Decomposition::degenerate(),
            a,
            ncomponents,
        )
    }

    /// Global extent of the stored line `name`.
    pub fn line_size(&self, name: &str) -> Result<usize> {
        let (a, _) = self.line_sizev(name)?;
        Ok(a)
    }

    /// Global extent and component count `(A, ncomponents)` of the stored
    /// line `name`.
    pub fn line_sizev(&self, name: &str) -> Result<(usize, usize)> {
        let (c, b, a, ncomponents) = self.field_sizev(name)?;
        if c != 1 || b != 1 {
            raise!(Status::EInval, "'{name}' is not a line");
        }
        Ok((a, ncomponents))
    }
}
