//! Per-rank view of a distributed triangular mesh.
//!
//! A [`MeshPartition`] holds every node and element *present* on a rank
//! (owned entities plus halo copies), their global ids, each present node's
//! owning rank, and the map from the k-th owned node to its present index.
//!
//! The order of `owned_to_present_index` is the order owned nodes appear in
//! the rank's mesh table. That scan order is the canonical per-rank owned
//! order: collectives ship owned values in it, and the root re-derives it
//! from the same table when it re-maps gathered values to global order.

use crate::debug_invariants::DebugInvariants;
use crate::io::mesh::PresentMeshTable;
use crate::mesh_error::MeshRegridError;
use crate::topology::catalog::PartitionCatalog;
use crate::topology::ownership::{OwnershipPolicy, reconcile_sign_hints};
use hashbrown::HashMap;

/// Immutable per-rank mesh partition. Connectivity is stored 0-based.
#[derive(Clone, Debug)]
pub struct MeshPartition {
    rank: usize,
    size: usize,
    present_node_global_id: Vec<u32>,
    present_element_global_id: Vec<u32>,
    node_coordinates: Vec<[f64; 2]>,
    node_depth: Vec<f64>,
    element_connectivity: Vec<[u32; 3]>,
    node_owner_rank: Vec<u32>,
    owned_to_present_index: Vec<u32>,
    present_index: HashMap<u32, u32>,
}

impl MeshPartition {
    /// Build the partition of `rank` (out of `size`) from its mesh table.
    ///
    /// Ownership comes from `catalog`; the sign hints in `table` are checked
    /// against it according to `policy`.
    pub fn build(
        rank: usize,
        size: usize,
        catalog: &PartitionCatalog,
        table: &PresentMeshTable,
        policy: OwnershipPolicy,
    ) -> Result<Self, MeshRegridError> {
        if rank >= size {
            return Err(MeshRegridError::RankOutOfRange { rank, size });
        }

        let present_node_global_id = table.node_global_ids()?;
        let present_element_global_id = table.element_global_ids()?;
        let mut present_index = HashMap::with_capacity(present_node_global_id.len());
        for (idx, &gid) in present_node_global_id.iter().enumerate() {
            if present_index.insert(gid, idx as u32).is_some() {
                return Err(MeshRegridError::DuplicateGlobalId(gid));
            }
        }

        let mut node_owner_rank = Vec::with_capacity(present_node_global_id.len());
        for &gid in &present_node_global_id {
            let owner = catalog.owner_of(gid)?;
            if owner >= size {
                return Err(MeshRegridError::PartitionMismatch(format!(
                    "catalog assigns node {gid} to rank {owner}, but only {size} ranks exist"
                )));
            }
            node_owner_rank.push(owner as u32);
        }

        let signed: Vec<i64> = table.nodes.iter().map(|n| n.signed_id).collect();
        let report = reconcile_sign_hints(rank, &signed, &node_owner_rank, policy)?;

        let owned_to_present_index: Vec<u32> = node_owner_rank
            .iter()
            .enumerate()
            .filter(|(_, owner)| **owner as usize == rank)
            .map(|(idx, _)| idx as u32)
            .collect();

        let present = present_node_global_id.len();
        let mut element_connectivity = Vec::with_capacity(table.elements.len());
        for (elem, &element) in table.elements.iter().zip(&present_element_global_id) {
            let mut local = [0u32; 3];
            for (slot, &corner) in local.iter_mut().zip(&elem.corners) {
                if corner == 0 || corner as usize > present {
                    return Err(MeshRegridError::ConnectivityOutOfRange {
                        element,
                        index: corner as usize,
                        present,
                    });
                }
                *slot = corner - 1;
            }
            element_connectivity.push(local);
        }

        log::debug!(
            "rank {rank}/{size}: {} present nodes ({} owned, {} hinted owned), {} elements",
            present,
            owned_to_present_index.len(),
            report.positive,
            element_connectivity.len()
        );

        let partition = Self {
            rank,
            size,
            present_node_global_id,
            present_element_global_id,
            node_coordinates: table.nodes.iter().map(|n| [n.x, n.y]).collect(),
            node_depth: table.nodes.iter().map(|n| n.depth).collect(),
            element_connectivity,
            node_owner_rank,
            owned_to_present_index,
            present_index,
        };
        crate::debug_invariants!(partition.validate_invariants(), "MeshPartition::build");
        Ok(partition)
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn num_present_nodes(&self) -> usize {
        self.present_node_global_id.len()
    }

    pub fn num_owned_nodes(&self) -> usize {
        self.owned_to_present_index.len()
    }

    pub fn num_present_elements(&self) -> usize {
        self.present_element_global_id.len()
    }

    pub fn present_node_global_id(&self) -> &[u32] {
        &self.present_node_global_id
    }

    pub fn present_element_global_id(&self) -> &[u32] {
        &self.present_element_global_id
    }

    pub fn node_coordinates(&self) -> &[[f64; 2]] {
        &self.node_coordinates
    }

    /// Bathymetric depth per present node.
    pub fn node_depth(&self) -> &[f64] {
        &self.node_depth
    }

    /// Triangles as 0-based indices into the present-node arrays.
    pub fn element_connectivity(&self) -> &[[u32; 3]] {
        &self.element_connectivity
    }

    pub fn node_owner_rank(&self) -> &[u32] {
        &self.node_owner_rank
    }

    pub fn owned_to_present_index(&self) -> &[u32] {
        &self.owned_to_present_index
    }

    /// True if present node `idx` is owned by this rank.
    pub fn is_owned(&self, idx: usize) -> bool {
        self.node_owner_rank
            .get(idx)
            .is_some_and(|&owner| owner as usize == self.rank)
    }

    /// Present index of a global node id, if the node is present here.
    pub fn present_index_of(&self, global_id: u32) -> Option<usize> {
        self.present_index.get(&global_id).map(|&idx| idx as usize)
    }

    /// Global ids of owned nodes, in owned (scan) order.
    pub fn owned_global_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.owned_to_present_index
            .iter()
            .map(|&idx| self.present_node_global_id[idx as usize])
    }

    /// Pick the owned values out of a present-ordered array.
    pub fn restrict_to_owned<T: Copy>(&self, present: &[T]) -> Result<Vec<T>, MeshRegridError> {
        if present.len() != self.num_present_nodes() {
            return Err(MeshRegridError::FieldLengthMismatch {
                expected: self.num_present_nodes(),
                found: present.len(),
            });
        }
        Ok(self
            .owned_to_present_index
            .iter()
            .map(|&idx| present[idx as usize])
            .collect())
    }

    /// Scatter owned values into a present-ordered array; halo slots get `fill`.
    pub fn extend_to_present<T: Copy>(
        &self,
        owned: &[T],
        fill: T,
    ) -> Result<Vec<T>, MeshRegridError> {
        if owned.len() != self.num_owned_nodes() {
            return Err(MeshRegridError::FieldLengthMismatch {
                expected: self.num_owned_nodes(),
                found: owned.len(),
            });
        }
        let mut present = vec![fill; self.num_present_nodes()];
        for (&idx, &value) in self.owned_to_present_index.iter().zip(owned) {
            present[idx as usize] = value;
        }
        Ok(present)
    }
}

impl DebugInvariants for MeshPartition {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "MeshPartition");
    }

    fn validate_invariants(&self) -> Result<(), MeshRegridError> {
        let n = self.num_present_nodes();
        for len in [
            self.node_coordinates.len(),
            self.node_depth.len(),
            self.node_owner_rank.len(),
        ] {
            if len != n {
                return Err(MeshRegridError::FieldLengthMismatch {
                    expected: n,
                    found: len,
                });
            }
        }
        if self.element_connectivity.len() != self.present_element_global_id.len() {
            return Err(MeshRegridError::FieldLengthMismatch {
                expected: self.present_element_global_id.len(),
                found: self.element_connectivity.len(),
            });
        }
        let owned_count = self
            .node_owner_rank
            .iter()
            .filter(|&&owner| owner as usize == self.rank)
            .count();
        if owned_count != self.owned_to_present_index.len() {
            return Err(MeshRegridError::PartitionMismatch(format!(
                "rank {} owns {owned_count} present nodes but maps {}",
                self.rank,
                self.owned_to_present_index.len()
            )));
        }
        for &idx in &self.owned_to_present_index {
            if !self.is_owned(idx as usize) {
                return Err(MeshRegridError::PartitionMismatch(format!(
                    "owned map points at present node {idx}, which rank {} does not own",
                    self.rank
                )));
            }
        }
        for (e, tri) in self.element_connectivity.iter().enumerate() {
            if let Some(&bad) = tri.iter().find(|&&c| c as usize >= n) {
                return Err(MeshRegridError::ConnectivityOutOfRange {
                    element: self.present_element_global_id[e],
                    index: bad as usize + 1,
                    present: n,
                });
            }
        }
        Ok(())
    }
}
