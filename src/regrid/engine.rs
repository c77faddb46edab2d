//! Masked stitching of a primary and a fallback regrid operator.
//!
//! A local method (bilinear) cannot extrapolate past the source mesh, so
//! destination points outside it get nothing useful. The engine runs the
//! primary operator once on an all-ones probe field: where the result is 1
//! (within tolerance) the point is *resolved*. Every later field takes the
//! primary value at resolved points and the fallback (nearest) value
//! elsewhere.
//!
//! The mask depends only on the mesh pair, so it is built once in
//! [`DualPathRegridEngine::new`] and reused for every field.

use crate::mesh_error::MeshRegridError;
use crate::regrid::{Interpolator, RegridMethod, RegridOperator, UnmappedPolicy};
use crate::topology::partition::MeshPartition;

/// Per owned destination node: did the primary method produce a value?
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegridMask {
    resolved: Vec<bool>,
}

impl RegridMask {
    /// Threshold a primary-operator result on an all-ones field.
    pub fn from_probe(probe: &[f64], tolerance: f64) -> Self {
        Self {
            // NaN compares false, so it lands on the fallback path.
            resolved: probe.iter().map(|&p| (p - 1.0).abs() < tolerance).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    pub fn is_resolved(&self, idx: usize) -> bool {
        self.resolved.get(idx).copied().unwrap_or(false)
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.resolved
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved.iter().filter(|&&r| r).count()
    }

    pub fn unresolved_count(&self) -> usize {
        self.len() - self.resolved_count()
    }
}

/// Regrids owned source fields onto owned destination nodes.
pub struct DualPathRegridEngine<'a, P, F> {
    source: &'a MeshPartition,
    destination: &'a MeshPartition,
    primary: P,
    fallback: F,
    mask: RegridMask,
    source_buffer: Vec<f64>,
}

impl<'a, I> DualPathRegridEngine<'a, I, I>
where
    I: RegridOperator,
{
    /// Build bilinear and nearest operators with `interpolator`, then the mask.
    pub fn build<Interp>(
        interpolator: &Interp,
        source: &'a MeshPartition,
        destination: &'a MeshPartition,
        tolerance: f64,
    ) -> Result<Self, MeshRegridError>
    where
        Interp: Interpolator<Operator = I>,
    {
        let primary = interpolator.build_operator(
            source,
            destination,
            RegridMethod::Bilinear,
            UnmappedPolicy::Ignore,
        )?;
        let fallback = interpolator.build_operator(
            source,
            destination,
            RegridMethod::Nearest,
            UnmappedPolicy::Ignore,
        )?;
        Self::new(source, destination, primary, fallback, tolerance)
    }
}

impl<'a, P, F> DualPathRegridEngine<'a, P, F>
where
    P: RegridOperator,
    F: RegridOperator,
{
    /// Wrap prepared operators and compute the resolved mask.
    pub fn new(
        source: &'a MeshPartition,
        destination: &'a MeshPartition,
        primary: P,
        fallback: F,
        tolerance: f64,
    ) -> Result<Self, MeshRegridError> {
        let probe = vec![1.0; source.num_present_nodes()];
        let mapped = primary.apply(&probe)?;
        check_len(destination.num_owned_nodes(), mapped.len())?;
        let mask = RegridMask::from_probe(&mapped, tolerance);
        log::info!(
            "rank {}: regrid mask built, {} resolved / {} unresolved destination nodes",
            destination.rank(),
            mask.resolved_count(),
            mask.unresolved_count()
        );
        Ok(Self {
            source,
            destination,
            primary,
            fallback,
            mask,
            source_buffer: vec![0.0; source.num_present_nodes()],
        })
    }

    pub fn source(&self) -> &'a MeshPartition {
        self.source
    }

    pub fn destination(&self) -> &'a MeshPartition {
        self.destination
    }

    pub fn mask(&self) -> &RegridMask {
        &self.mask
    }

    /// Regrid one field given as owned source values (owned scan order).
    ///
    /// Returns one value per owned destination node.
    pub fn stitch(&mut self, src_owned: &[f64]) -> Result<Vec<f64>, MeshRegridError> {
        check_len(self.source.num_owned_nodes(), src_owned.len())?;
        self.source_buffer.fill(0.0);
        for (&idx, &value) in self
            .source
            .owned_to_present_index()
            .iter()
            .zip(src_owned)
        {
            self.source_buffer[idx as usize] = value;
        }

        let mapped = self.primary.apply(&self.source_buffer)?;
        let unmapped = self.fallback.apply(&self.source_buffer)?;
        let n = self.destination.num_owned_nodes();
        check_len(n, mapped.len())?;
        check_len(n, unmapped.len())?;

        Ok(self
            .mask
            .as_slice()
            .iter()
            .zip(mapped.into_iter().zip(unmapped))
            .map(|(&resolved, (m, u))| if resolved { m } else { u })
            .collect())
    }

    /// Like [`stitch`](Self::stitch) for a present-ordered source field.
    pub fn stitch_present(&mut self, src_present: &[f64]) -> Result<Vec<f64>, MeshRegridError> {
        let owned = self.source.restrict_to_owned(src_present)?;
        self.stitch(&owned)
    }
}

fn check_len(expected: usize, found: usize) -> Result<(), MeshRegridError> {
    if expected == found {
        Ok(())
    } else {
        Err(MeshRegridError::FieldLengthMismatch { expected, found })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::mesh::{NodeRecord, PresentMeshTable};
    use crate::topology::catalog::PartitionCatalog;
    use crate::topology::ownership::OwnershipPolicy;

    /// Returns a fixed vector scaled by the first source value.
    struct Scaled(Vec<f64>);

    impl RegridOperator for Scaled {
        fn apply(&self, source: &[f64]) -> Result<Vec<f64>, MeshRegridError> {
            Ok(self.0.iter().map(|w| w * source[0]).collect())
        }
    }

    struct Failing;

    impl RegridOperator for Failing {
        fn apply(&self, _source: &[f64]) -> Result<Vec<f64>, MeshRegridError> {
            Err(MeshRegridError::RegridFailed("no weights".into()))
        }
    }

    fn points(n: usize) -> MeshPartition {
        let table = PresentMeshTable {
            title: String::new(),
            nodes: (1..=n as i64)
                .map(|signed_id| NodeRecord {
                    signed_id,
                    x: 0.0,
                    y: 0.0,
                    depth: 0.0,
                })
                .collect(),
            elements: Vec::new(),
        };
        let cat = PartitionCatalog::from_owners(vec![0; n]);
        MeshPartition::build(0, 1, &cat, &table, OwnershipPolicy::Strict).unwrap()
    }

    #[test]
    fn mask_thresholds_probe() {
        let mask = RegridMask::from_probe(&[1.0, 1.0 + 1e-10, 0.0, f64::NAN, 0.999], 1e-8);
        assert_eq!(mask.as_slice(), &[true, true, false, false, false]);
        assert_eq!(mask.resolved_count(), 2);
        assert_eq!(mask.unresolved_count(), 3);
        assert!(!mask.is_resolved(99));
    }

    #[test]
    fn stitch_picks_per_mask() {
        let src = points(2);
        let dst = points(3);
        let mut engine = DualPathRegridEngine::new(
            &src,
            &dst,
            Scaled(vec![1.0, 0.0, 1.0]),
            Scaled(vec![7.0, 8.0, 9.0]),
            1e-8,
        )
        .unwrap();
        assert_eq!(engine.mask().as_slice(), &[true, false, true]);
        let out = engine.stitch(&[2.0, 5.0]).unwrap();
        assert_eq!(out, vec![2.0, 16.0, 2.0]);
    }

    #[test]
    fn operator_failures_surface() {
        let src = points(1);
        let dst = points(1);
        let err = DualPathRegridEngine::new(&src, &dst, Failing, Failing, 1e-8)
            .err()
            .unwrap();
        assert!(matches!(err, MeshRegridError::RegridFailed(_)));

        let mut engine =
            DualPathRegridEngine::new(&src, &dst, Scaled(vec![1.0]), Failing, 1e-8).unwrap();
        assert!(matches!(
            engine.stitch(&[1.0]),
            Err(MeshRegridError::RegridFailed(_))
        ));
    }

    #[test]
    fn wrong_lengths_are_rejected() {
        let src = points(2);
        let dst = points(3);
        assert!(matches!(
            DualPathRegridEngine::new(&src, &dst, Scaled(vec![1.0]), Scaled(vec![1.0]), 1e-8)
                .err()
                .unwrap(),
            MeshRegridError::FieldLengthMismatch { expected: 3, found: 1 }
        ));
        let mut engine = DualPathRegridEngine::new(
            &src,
            &dst,
            Scaled(vec![1.0; 3]),
            Scaled(vec![1.0; 3]),
            1e-8,
        )
        .unwrap();
        assert!(engine.stitch(&[1.0]).is_err());
    }
}
