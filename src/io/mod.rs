//! File formats of a partitioned run.
//!
//! - [`mesh`]: per-partition mesh tables and the partition catalog (ASCII)
//! - [`hotstart`]: fixed 8-byte-record simulation state (binary)
//! - [`layout`]: where those files live for each rank

pub mod hotstart;
pub mod layout;
pub mod mesh;

pub use hotstart::{HotstartCodec, HotstartHeader, HotstartRecord};
pub use layout::{HotstartScope, PartitionLayout};
pub use mesh::PresentMeshTable;
