#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-regrid
//!
//! mesh-regrid moves scalar fields (bathymetry, water-surface elevation,
//! velocity) between two unstructured triangular meshes that are each
//! partitioned across many ranks, as done when a coastal ocean model is
//! restarted on a different resolution.
//!
//! ## Features
//! - A partition catalog and an immutable per-rank [`MeshPartition`] with
//!   global ids, ownership and the owned → present index map
//! - Collective gather of per-rank owned values into global-id order on a
//!   root rank, with the root re-deriving the ordering from partition files
//! - A dual-path regrid engine that stitches a primary (bilinear) and a
//!   fallback (nearest) interpolation through a resolved/unresolved mask
//! - A fixed 8-byte-record binary hotstart codec
//! - Pluggable communicators (serial, in-process threads, MPI)
//!
//! ## Collectives
//!
//! Gathers block every rank until all have contributed and carry no per-call
//! id: every rank must call them in the same order. A rank that fails must
//! bring the whole job down (see `MpiComm::abort`) rather than leave peers
//! waiting.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! mesh-regrid = "0.1"
//! # features = ["mpi-support"]
//! ```

pub mod algs;
pub mod config;
pub mod debug_invariants;
pub mod io;
pub mod mesh_error;
pub mod regrid;
pub mod topology;

pub use debug_invariants::DebugInvariants;
pub use topology::partition::MeshPartition;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, NoComm, ThreadComm, Wait};
    pub use crate::algs::consolidate::{Consolidator, PresentNodeSource};
    pub use crate::config::RegridConfig;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::io::hotstart::{HotstartCodec, HotstartHeader, HotstartRecord};
    pub use crate::io::layout::{HotstartScope, PartitionLayout};
    pub use crate::io::mesh::PresentMeshTable;
    pub use crate::mesh_error::MeshRegridError;
    pub use crate::regrid::{
        DualPathRegridEngine, Interpolator, LocalInterpolator, RegridMask, RegridMethod,
        RegridOperator, UnmappedPolicy, regrid_hotstart,
    };
    pub use crate::topology::catalog::PartitionCatalog;
    pub use crate::topology::ownership::OwnershipPolicy;
    pub use crate::topology::partition::MeshPartition;
}
