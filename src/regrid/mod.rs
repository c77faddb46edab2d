//! Regridding between two partitioned meshes.
//!
//! The geometric work (finding which source triangle holds a destination
//! point, weights, nearest nodes) belongs to an [`Interpolator`]. This module
//! only fixes the boundary to it and builds on top:
//!
//! - [`engine`]: the dual-path stitch of a primary and a fallback operator
//! - [`local`]: a serial reference interpolator
//! - [`hotstart`]: regridding a whole hotstart record

pub mod engine;
pub mod hotstart;
pub mod local;

use crate::mesh_error::MeshRegridError;
use crate::topology::partition::MeshPartition;

pub use engine::{DualPathRegridEngine, RegridMask};
pub use hotstart::regrid_hotstart;
pub use local::LocalInterpolator;

/// Interpolation method requested from an [`Interpolator`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegridMethod {
    /// Local geometric interpolation inside source elements.
    Bilinear,
    /// Value of the closest source node.
    Nearest,
}

/// What an operator does with destination points it cannot reach.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedPolicy {
    /// Leave them at an operator-defined sentinel; the caller masks them out.
    #[default]
    Ignore,
    /// Fail operator construction.
    Error,
}

/// A precomputed source → destination mapping for one geometry pair.
pub trait RegridOperator {
    /// Map present-ordered source values to one value per owned destination
    /// node, in the destination's owned order. Only owned source slots are
    /// meaningful.
    fn apply(&self, source: &[f64]) -> Result<Vec<f64>, MeshRegridError>;
}

/// Builds [`RegridOperator`]s. Failures are reported as
/// [`MeshRegridError::RegridFailed`].
pub trait Interpolator {
    type Operator: RegridOperator;

    fn build_operator(
        &self,
        source: &MeshPartition,
        destination: &MeshPartition,
        method: RegridMethod,
        unmapped: UnmappedPolicy,
    ) -> Result<Self::Operator, MeshRegridError>;
}

impl<O: RegridOperator + ?Sized> RegridOperator for Box<O> {
    fn apply(&self, source: &[f64]) -> Result<Vec<f64>, MeshRegridError> {
        (**self).apply(source)
    }
}
