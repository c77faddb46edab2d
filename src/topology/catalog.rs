//! Global node → owning-rank assignment.
//!
//! The [`PartitionCatalog`] is the single authoritative source of node
//! ownership. Every rank loads the same catalog, so ownership questions have
//! the same answer everywhere without communication.

use crate::mesh_error::MeshRegridError;

/// Zero-based owning rank for each global node, indexed by `global_id - 1`.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PartitionCatalog {
    owners: Vec<u32>,
}

impl PartitionCatalog {
    /// Build from zero-based owners, one per global node in id order.
    pub fn from_owners(owners: Vec<u32>) -> Self {
        Self { owners }
    }

    /// Build from 1-based rank labels as they appear in a catalog file.
    ///
    /// Fails with [`MeshRegridError::MalformedPartitionFile`] if the number of
    /// labels differs from `declared_nodes` or a label is zero.
    pub fn from_one_based(labels: &[u32], declared_nodes: usize) -> Result<Self, MeshRegridError> {
        if labels.len() != declared_nodes {
            return Err(MeshRegridError::MalformedPartitionFile(format!(
                "expected {declared_nodes} rank labels, found {}",
                labels.len()
            )));
        }
        let owners = labels
            .iter()
            .enumerate()
            .map(|(idx, &label)| {
                label.checked_sub(1).ok_or_else(|| {
                    MeshRegridError::MalformedPartitionFile(format!(
                        "rank label for node {} must be 1-based, found 0",
                        idx + 1
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { owners })
    }

    /// Number of global nodes described.
    pub fn global_node_count(&self) -> usize {
        self.owners.len()
    }

    /// Smallest rank count able to hold every owner in the catalog.
    pub fn rank_count(&self) -> usize {
        self.owners.iter().max().map_or(0, |&max| max as usize + 1)
    }

    /// Owning rank of a 1-based global node id.
    pub fn owner_of(&self, global_id: u32) -> Result<usize, MeshRegridError> {
        global_id
            .checked_sub(1)
            .and_then(|idx| self.owners.get(idx as usize))
            .map(|&owner| owner as usize)
            .ok_or(MeshRegridError::GlobalIdOutOfRange {
                id: global_id,
                count: self.owners.len(),
            })
    }

    /// Global ids owned by `rank`, ascending.
    pub fn owned_by(&self, rank: usize) -> impl Iterator<Item = u32> + '_ {
        self.owners
            .iter()
            .enumerate()
            .filter(move |(_, owner)| **owner as usize == rank)
            .map(|(idx, _)| idx as u32 + 1)
    }

    /// Number of nodes owned by each of `size` ranks.
    ///
    /// Fails with [`MeshRegridError::PartitionMismatch`] if the catalog names
    /// a rank `>= size`.
    pub fn owned_counts(&self, size: usize) -> Result<Vec<usize>, MeshRegridError> {
        let mut counts = vec![0usize; size];
        for (idx, &owner) in self.owners.iter().enumerate() {
            let slot = counts.get_mut(owner as usize).ok_or_else(|| {
                MeshRegridError::PartitionMismatch(format!(
                    "node {} is assigned to rank {owner}, but only {size} ranks exist",
                    idx + 1
                ))
            })?;
            *slot += 1;
        }
        Ok(counts)
    }
}

/// Exclusive prefix sum of `counts`.
pub fn displacements(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .scan(0usize, |acc, &n| {
            let start = *acc;
            *acc += n;
            Some(start)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_based_labels_become_zero_based() {
        let cat = PartitionCatalog::from_one_based(&[1, 2, 1, 2], 4).unwrap();
        assert_eq!(cat.owner_of(1).unwrap(), 0);
        assert_eq!(cat.owner_of(4).unwrap(), 1);
        assert_eq!(cat.rank_count(), 2);
        assert_eq!(cat.owned_by(0).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn count_mismatch_is_malformed() {
        let err = PartitionCatalog::from_one_based(&[1, 2], 3).unwrap_err();
        assert!(matches!(err, MeshRegridError::MalformedPartitionFile(_)));
    }

    #[test]
    fn zero_label_is_malformed() {
        let err = PartitionCatalog::from_one_based(&[1, 0], 2).unwrap_err();
        assert!(matches!(err, MeshRegridError::MalformedPartitionFile(_)));
    }

    #[test]
    fn out_of_range_ids() {
        let cat = PartitionCatalog::from_owners(vec![0, 0]);
        assert!(matches!(
            cat.owner_of(0),
            Err(MeshRegridError::GlobalIdOutOfRange { id: 0, count: 2 })
        ));
        assert!(cat.owner_of(3).is_err());
    }

    #[test]
    fn counts_and_displacements() {
        let cat = PartitionCatalog::from_owners(vec![0, 1, 0, 2, 2, 2]);
        let counts = cat.owned_counts(3).unwrap();
        assert_eq!(counts, vec![2, 1, 3]);
        assert_eq!(displacements(&counts), vec![0, 2, 3]);
        assert!(matches!(
            cat.owned_counts(2),
            Err(MeshRegridError::PartitionMismatch(_))
        ));
    }
}
