//! Run configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use crate::mesh_error::MeshRegridError;
use crate::topology::ownership::OwnershipPolicy;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Knobs shared by every rank of a regrid run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegridConfig {
    /// Rank that materializes consolidated arrays.
    pub root_rank: usize,
    /// Handling of mesh-table sign hints that disagree with the catalog.
    pub ownership_policy: OwnershipPolicy,
    /// A destination node is resolved when its probe value is within this of 1.
    pub mask_tolerance: f64,
    /// Regridded wet/dry codes at or above this become wet.
    pub wet_threshold: f64,
    /// Also write a text dump next to every hotstart.
    pub text_dump: bool,
}

impl Default for RegridConfig {
    fn default() -> Self {
        Self {
            root_rank: 0,
            ownership_policy: OwnershipPolicy::Strict,
            mask_tolerance: 1e-8,
            wet_threshold: 0.5,
            text_dump: false,
        }
    }
}

impl RegridConfig {
    pub fn from_json_str(s: &str) -> Result<Self, MeshRegridError> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| MeshRegridError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, MeshRegridError> {
        let config: Self =
            serde_json::from_reader(reader).map_err(|e| MeshRegridError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MeshRegridError> {
        if !(self.mask_tolerance.is_finite() && self.mask_tolerance > 0.0) {
            return Err(MeshRegridError::Config(format!(
                "mask_tolerance must be positive and finite, got {}",
                self.mask_tolerance
            )));
        }
        if !self.wet_threshold.is_finite() {
            return Err(MeshRegridError::Config(format!(
                "wet_threshold must be finite, got {}",
                self.wet_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        assert_eq!(RegridConfig::from_json_str("{}").unwrap(), RegridConfig::default());
    }

    #[test]
    fn fields_override_defaults() {
        let cfg = RegridConfig::from_json_str(
            r#"{ "root_rank": 2, "ownership_policy": "ignore", "text_dump": true }"#,
        )
        .unwrap();
        assert_eq!(cfg.root_rank, 2);
        assert_eq!(cfg.ownership_policy, OwnershipPolicy::Ignore);
        assert!(cfg.text_dump);
        assert_eq!(cfg.mask_tolerance, 1e-8);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            RegridConfig::from_json_str(r#"{ "mask_tolerance": -1.0 }"#),
            Err(MeshRegridError::Config(_))
        ));
        assert!(RegridConfig::from_json_str(r#"{ "root": 0 }"#).is_err());
        assert!(RegridConfig::from_json_reader("not json".as_bytes()).is_err());
    }
}
