//! Cross-rank consolidation of node fields into global-id order.
//!
//! Every rank holds values for the nodes it owns, in its owned scan order
//! (see [`MeshPartition::owned_to_present_index`]). [`Consolidator::gather`]
//! moves those slices to a root rank, laid out "by rank, then by scan order",
//! and the root then re-maps them into "by global id, ascending" by replaying
//! each rank's ownership scan from its present-node table. No index map is
//! shipped; the root re-derives it from the catalog and the tables.
//!
//! # Lockstep contract
//! Every operation here is **collective**: each rank must call it once per
//! logical field, in the same relative order as every other rank. Messages
//! carry no per-call id, so a rank that skips or reorders a call deadlocks
//! the group or receives another field's data. This is a caller obligation;
//! nothing here can detect it.
//!
//! If an operation returns an error on one rank, its peers may be left
//! waiting; the driver is expected to abort the whole job.

use crate::algs::communicator::{Communicator, ConsolidateTags, Wait};
use crate::algs::wire::{cast_slice, decode_into, expect_exact_len};
use crate::debug_invariants::DebugInvariants;
use crate::io::hotstart::{HotstartHeader, HotstartRecord, count_record};
use crate::mesh_error::MeshRegridError;
use crate::topology::catalog::{PartitionCatalog, displacements};
use crate::topology::partition::MeshPartition;
use bytemuck::Pod;

/// Present-node ids of any rank, in mesh-table order. Only the root asks.
pub trait PresentNodeSource {
    fn present_node_ids(&self, rank: usize) -> Result<Vec<u32>, MeshRegridError>;
}

impl PresentNodeSource for [Vec<u32>] {
    fn present_node_ids(&self, rank: usize) -> Result<Vec<u32>, MeshRegridError> {
        self.get(rank).cloned().ok_or(MeshRegridError::RankOutOfRange {
            rank,
            size: self.len(),
        })
    }
}

impl PresentNodeSource for Vec<Vec<u32>> {
    fn present_node_ids(&self, rank: usize) -> Result<Vec<u32>, MeshRegridError> {
        self.as_slice().present_node_ids(rank)
    }
}

impl<T: PresentNodeSource + ?Sized> PresentNodeSource for &T {
    fn present_node_ids(&self, rank: usize) -> Result<Vec<u32>, MeshRegridError> {
        (**self).present_node_ids(rank)
    }
}

/// Gathers per-rank owned values into a global array on one root rank.
pub struct Consolidator<'a, C, S> {
    comm: &'a C,
    catalog: &'a PartitionCatalog,
    source: S,
    root: usize,
    tags: ConsolidateTags,
}

impl<'a, C, S> Consolidator<'a, C, S>
where
    C: Communicator,
    S: PresentNodeSource,
{
    pub fn new(
        comm: &'a C,
        catalog: &'a PartitionCatalog,
        source: S,
        root: usize,
    ) -> Result<Self, MeshRegridError> {
        if root >= comm.size() {
            return Err(MeshRegridError::RankOutOfRange {
                rank: root,
                size: comm.size(),
            });
        }
        Ok(Self {
            comm,
            catalog,
            source,
            root,
            tags: ConsolidateTags::default(),
        })
    }

    /// Use explicit message tags instead of the defaults.
    pub fn with_tags(mut self, tags: ConsolidateTags) -> Self {
        self.tags = tags;
        self
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn is_root(&self) -> bool {
        self.comm.rank() == self.root
    }

    pub fn global_node_count(&self) -> usize {
        self.catalog.global_node_count()
    }

    /// Collective: gather owned values (in owned scan order) to the root.
    ///
    /// Returns `Some(global)` on the root, indexed by `global_id - 1`, and
    /// `None` everywhere else.
    pub fn gather<T: Pod>(&self, local_owned: &[T]) -> Result<Option<Vec<T>>, MeshRegridError> {
        let rank = self.comm.rank();
        let size = self.comm.size();
        let tag = self.tags.gather.as_u16();

        if rank != self.root {
            let _ = self.comm.isend(self.root, tag, cast_slice(local_owned)).wait();
            return Ok(None);
        }

        // Receive from every peer before reporting anything, so no sender is
        // left with an unmatched message.
        let counts = match self.catalog.owned_counts(size) {
            Ok(counts) => counts,
            Err(e) => {
                for peer in (0..size).filter(|&p| p != rank) {
                    let _ = self.comm.irecv(peer, tag, &mut []).wait();
                }
                return Err(e);
            }
        };
        let displs = displacements(&counts);
        let total: usize = counts.iter().sum();
        let mut staged = vec![T::zeroed(); total];

        let mut maybe_err = None;
        if local_owned.len() == counts[rank] {
            staged[displs[rank]..displs[rank] + counts[rank]].copy_from_slice(local_owned);
        } else {
            maybe_err = Some(MeshRegridError::FieldLengthMismatch {
                expected: counts[rank],
                found: local_owned.len(),
            });
        }
        for peer in (0..size).filter(|&p| p != rank) {
            let expected = counts[peer] * std::mem::size_of::<T>();
            // One spare byte so an oversized message shows up as a length error.
            let mut buf = vec![0u8; expected + 1];
            let received = self.comm.irecv(peer, tag, &mut buf).wait();
            let outcome = match received {
                Some(bytes) => decode_into(
                    &bytes,
                    &mut staged[displs[peer]..displs[peer] + counts[peer]],
                    peer,
                ),
                None => Err(MeshRegridError::CommError {
                    neighbor: peer,
                    source: format!("no contribution received from rank {peer}").into(),
                }),
            };
            if let Err(e) = outcome {
                maybe_err.get_or_insert(e);
            }
        }
        if let Some(e) = maybe_err {
            return Err(e);
        }

        let mut global = vec![T::zeroed(); self.catalog.global_node_count()];
        for peer in 0..size {
            let mut cursor = displs[peer];
            let end = cursor + counts[peer];
            for gid in self.source.present_node_ids(peer)? {
                if self.catalog.owner_of(gid)? != peer {
                    continue;
                }
                if cursor == end {
                    return Err(MeshRegridError::PartitionMismatch(format!(
                        "rank {peer}'s mesh table lists more owned nodes than the {} the catalog assigns",
                        counts[peer]
                    )));
                }
                global[(gid - 1) as usize] = staged[cursor];
                cursor += 1;
            }
            if cursor != end {
                return Err(MeshRegridError::PartitionMismatch(format!(
                    "rank {peer}'s mesh table lists {} owned nodes, the catalog assigns {}",
                    cursor - displs[peer],
                    counts[peer]
                )));
            }
        }
        log::debug!(
            "gathered {} values from {size} ranks on root {}",
            total,
            self.root
        );
        Ok(Some(global))
    }

    /// Collective: like [`gather`](Self::gather) for a present-ordered array.
    pub fn gather_present<T: Pod>(
        &self,
        partition: &MeshPartition,
        present: &[T],
    ) -> Result<Option<Vec<T>>, MeshRegridError> {
        let owned = partition.restrict_to_owned(present)?;
        self.gather(&owned)
    }

    /// Collective: consolidate a per-rank hotstart into the global record on
    /// the root, node arrays and wet/dry codes indexed by global id.
    ///
    /// Elements carry no catalog ownership, so the consolidated record has no
    /// element array (`elements == 0`); `global_elements` and the scalars are
    /// copied from `local`. All ranks must pass the same `model_flag`.
    pub fn gather_hotstart(
        &self,
        partition: &MeshPartition,
        local: &HotstartRecord,
    ) -> Result<Option<HotstartRecord>, MeshRegridError> {
        local.validate_invariants()?;
        if local.node_count() != partition.num_present_nodes() {
            return Err(MeshRegridError::FieldLengthMismatch {
                expected: partition.num_present_nodes(),
                found: local.node_count(),
            });
        }
        let mut arrays = Vec::with_capacity(6);
        for (_, array) in local.node_arrays() {
            arrays.push(self.gather_present(partition, array)?);
        }
        let node_code = self.gather_present(partition, &local.node_code)?;
        let (Some(arrays), Some(node_code)) =
            (arrays.into_iter().collect::<Option<Vec<_>>>(), node_code)
        else {
            return Ok(None);
        };

        let n = self.global_node_count();
        let mut global = HotstartRecord::zeroed(HotstartHeader {
            global_nodes: count_record(n, "global node")?,
            nodes: count_record(n, "node")?,
            elements: 0,
            ..local.header
        });
        for (slot, values) in global.node_arrays_mut().into_iter().zip(arrays) {
            *slot = values;
        }
        global.node_code = node_code;
        global.trailing = local.trailing;
        crate::debug_invariants!(global.validate_invariants(), "gather_hotstart");
        Ok(Some(global))
    }

    /// Collective: gather owned values, send the global array back to every
    /// rank, and return this rank's present-ordered view of it.
    ///
    /// Fills halo slots with the values computed by their owners.
    pub fn gather_to_present<T: Pod>(
        &self,
        partition: &MeshPartition,
        local_owned: &[T],
    ) -> Result<Vec<T>, MeshRegridError> {
        if partition.rank() != self.comm.rank() || partition.size() != self.comm.size() {
            return Err(MeshRegridError::PartitionMismatch(format!(
                "partition of rank {}/{} used on rank {}/{}",
                partition.rank(),
                partition.size(),
                self.comm.rank(),
                self.comm.size()
            )));
        }
        let n = self.global_node_count();
        let tag = self.tags.scatter.as_u16();
        let global = match self.gather(local_owned)? {
            Some(global) => {
                for peer in (0..self.comm.size()).filter(|&p| p != self.root) {
                    let _ = self.comm.isend(peer, tag, cast_slice(&global)).wait();
                }
                global
            }
            None => {
                let expected = n * std::mem::size_of::<T>();
                let mut buf = vec![0u8; expected + 1];
                let bytes = self
                    .comm
                    .irecv(self.root, tag, &mut buf)
                    .wait()
                    .ok_or_else(|| MeshRegridError::CommError {
                        neighbor: self.root,
                        source: "no global array received from root".into(),
                    })?;
                expect_exact_len(bytes.len(), expected, self.root)?;
                let mut global = vec![T::zeroed(); n];
                decode_into(&bytes, &mut global, self.root)?;
                global
            }
        };
        partition
            .present_node_global_id()
            .iter()
            .map(|&gid| {
                global
                    .get((gid as usize).wrapping_sub(1))
                    .copied()
                    .ok_or(MeshRegridError::GlobalIdOutOfRange { id: gid, count: n })
            })
            .collect()
    }
}
