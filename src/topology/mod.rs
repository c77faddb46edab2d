//! Top-level module for distributed mesh topology.
//!
//! - [`catalog`]: the global node → owning-rank table
//! - [`ownership`]: checking upstream ownership hints against the catalog
//! - [`partition`]: the immutable per-rank view of the mesh
//!
//! Most users build one [`MeshPartition`] per rank and pass it to the
//! consolidation and regrid layers.

pub mod catalog;
pub mod ownership;
pub mod partition;

pub use catalog::PartitionCatalog;
pub use ownership::OwnershipPolicy;
pub use partition::MeshPartition;
