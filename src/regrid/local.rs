//! Serial reference implementation of the [`Interpolator`] boundary.
//!
//! Searches are brute force over the source partition, which is fine for
//! tests and small single-rank meshes. Only source nodes owned by the source
//! rank carry valid values, so triangles touching a halo node are skipped and
//! nearest-node searches consider owned nodes only.

use crate::mesh_error::MeshRegridError;
use crate::regrid::{Interpolator, RegridMethod, RegridOperator, UnmappedPolicy};
use crate::topology::partition::MeshPartition;

/// Value given to destination points the operator cannot reach.
pub const UNMAPPED_SENTINEL: f64 = 0.0;

/// Barycentric coordinates below `-BARYCENTRIC_SLACK` mean "outside".
const BARYCENTRIC_SLACK: f64 = 1e-12;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Stencil {
    Triangle { nodes: [u32; 3], weights: [f64; 3] },
    Node(u32),
    Unmapped,
}

/// Brute-force barycentric / nearest-node interpolator.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalInterpolator;

/// Operator produced by [`LocalInterpolator`].
#[derive(Clone, Debug)]
pub struct LocalOperator {
    source_len: usize,
    stencils: Vec<Stencil>,
}

impl LocalOperator {
    /// Number of destination points the operator could not reach.
    pub fn unmapped_count(&self) -> usize {
        self.stencils
            .iter()
            .filter(|s| matches!(s, Stencil::Unmapped))
            .count()
    }
}

impl RegridOperator for LocalOperator {
    fn apply(&self, source: &[f64]) -> Result<Vec<f64>, MeshRegridError> {
        if source.len() != self.source_len {
            return Err(MeshRegridError::RegridFailed(format!(
                "operator built for {} source nodes, applied to {}",
                self.source_len,
                source.len()
            )));
        }
        Ok(self
            .stencils
            .iter()
            .map(|stencil| match *stencil {
                Stencil::Triangle { nodes, weights } => nodes
                    .iter()
                    .zip(weights)
                    .map(|(&n, w)| w * source[n as usize])
                    .sum::<f64>(),
                Stencil::Node(n) => source[n as usize],
                Stencil::Unmapped => UNMAPPED_SENTINEL,
            })
            .collect())
    }
}

impl Interpolator for LocalInterpolator {
    type Operator = LocalOperator;

    fn build_operator(
        &self,
        source: &MeshPartition,
        destination: &MeshPartition,
        method: RegridMethod,
        unmapped: UnmappedPolicy,
    ) -> Result<LocalOperator, MeshRegridError> {
        let coords = source.node_coordinates();
        let targets = destination
            .owned_to_present_index()
            .iter()
            .map(|&idx| destination.node_coordinates()[idx as usize]);

        let stencils: Vec<Stencil> = match method {
            RegridMethod::Bilinear => {
                let valid: Vec<[u32; 3]> = source
                    .element_connectivity()
                    .iter()
                    .copied()
                    .filter(|tri| tri.iter().all(|&n| source.is_owned(n as usize)))
                    .collect();
                targets
                    .map(|p| {
                        valid
                            .iter()
                            .find_map(|&tri| {
                                barycentric(p, tri.map(|n| coords[n as usize])).map(|weights| {
                                    Stencil::Triangle {
                                        nodes: tri,
                                        weights,
                                    }
                                })
                            })
                            .unwrap_or(Stencil::Unmapped)
                    })
                    .collect()
            }
            RegridMethod::Nearest => {
                let owned = source.owned_to_present_index();
                if owned.is_empty() {
                    return Err(MeshRegridError::RegridFailed(
                        "nearest-node regrid requires at least one owned source node".into(),
                    ));
                }
                targets
                    .map(|p| {
                        let mut best: Option<(f64, u32)> = None;
                        for &idx in owned {
                            let dist = squared_distance(coords[idx as usize], p);
                            match best {
                                Some((best_dist, _)) if dist >= best_dist => {}
                                _ => best = Some((dist, idx)),
                            }
                        }
                        best.map_or(Stencil::Unmapped, |(_, idx)| Stencil::Node(idx))
                    })
                    .collect()
            }
        };

        let op = LocalOperator {
            source_len: source.num_present_nodes(),
            stencils,
        };
        if unmapped == UnmappedPolicy::Error && op.unmapped_count() > 0 {
            return Err(MeshRegridError::RegridFailed(format!(
                "{} destination nodes lie outside the source mesh",
                op.unmapped_count()
            )));
        }
        Ok(op)
    }
}

fn squared_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Barycentric weights of `p` in triangle `t`, or `None` if outside or degenerate.
fn barycentric(p: [f64; 2], t: [[f64; 2]; 3]) -> Option<[f64; 3]> {
    let [a, b, c] = t;
    let det = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
    if det.abs() <= f64::EPSILON * (a[0].abs() + b[0].abs() + c[0].abs() + 1.0) {
        return None;
    }
    let l1 = ((b[1] - c[1]) * (p[0] - c[0]) + (c[0] - b[0]) * (p[1] - c[1])) / det;
    let l2 = ((c[1] - a[1]) * (p[0] - c[0]) + (a[0] - c[0]) * (p[1] - c[1])) / det;
    let l3 = 1.0 - l1 - l2;
    (l1 >= -BARYCENTRIC_SLACK && l2 >= -BARYCENTRIC_SLACK && l3 >= -BARYCENTRIC_SLACK)
        .then_some([l1, l2, l3])
}
