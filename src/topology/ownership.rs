//! Reconciling upstream ownership hints with the partition catalog.
//!
//! Per-partition mesh tables carry a sign on every node id: positive means
//! the upstream partitioner placed the node on this rank, negative marks a
//! halo copy. The catalog is authoritative; the sign is only checked against
//! it, and [`OwnershipPolicy`] decides what a disagreement means.

use crate::mesh_error::MeshRegridError;

/// What to do when a node's sign hint disagrees with the catalog.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipPolicy {
    /// Fail with [`MeshRegridError::PartitionMismatch`].
    #[default]
    Strict,
    /// Log each disagreement and keep the catalog's answer.
    Warn,
    /// Discard the sign without looking at it.
    Ignore,
}

/// Summary of a sign/catalog comparison on one rank.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SignReport {
    /// Nodes with a strictly positive id (owned according to the hint).
    pub positive: usize,
    /// Nodes whose hint and catalog owner disagree.
    pub disagreements: usize,
}

/// Compare sign hints to catalog owners for the present nodes of `my_rank`.
///
/// `signed_ids` and `owners` are parallel to the present-node order.
pub fn reconcile_sign_hints(
    my_rank: usize,
    signed_ids: &[i64],
    owners: &[u32],
    policy: OwnershipPolicy,
) -> Result<SignReport, MeshRegridError> {
    if signed_ids.len() != owners.len() {
        return Err(MeshRegridError::FieldLengthMismatch {
            expected: signed_ids.len(),
            found: owners.len(),
        });
    }
    let mut report = SignReport::default();
    if policy == OwnershipPolicy::Ignore {
        return Ok(report);
    }
    for (&signed, &owner) in signed_ids.iter().zip(owners) {
        let hinted_owned = signed > 0;
        if hinted_owned {
            report.positive += 1;
        }
        let catalog_owned = owner as usize == my_rank;
        if hinted_owned == catalog_owned {
            continue;
        }
        report.disagreements += 1;
        match policy {
            OwnershipPolicy::Strict => {
                return Err(MeshRegridError::PartitionMismatch(format!(
                    "node {} on rank {my_rank}: mesh table says {}, catalog says rank {owner}",
                    signed.unsigned_abs(),
                    if hinted_owned { "owned" } else { "halo" },
                )));
            }
            OwnershipPolicy::Warn => {
                log::warn!(
                    "rank {my_rank}: ownership hint for node {} disagrees with catalog owner {owner}",
                    signed.unsigned_abs()
                );
            }
            OwnershipPolicy::Ignore => {}
        }
    }
    Ok(report)
}
