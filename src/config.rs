//! Validation configuration

use crate::error::{FhirShapeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tuning knobs shared by every schema built from one cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationConfig {
    /// Maximum object nesting depth during validation (default: 100)
    pub max_recursion_depth: usize,
    /// Reject objects carrying more than one member of a polymorphic
    /// `value[x]` group (default: false)
    pub enforce_choice_exclusivity: bool,
    /// Build every known shape when the cache is created (default: false)
    pub eager_warm_up: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: 100,
            enforce_choice_exclusivity: false,
            eager_warm_up: false,
        }
    }
}

impl ValidationConfig {
    /// Strict profile: choice groups must hold at most one member
    pub fn strict() -> Self {
        Self {
            enforce_choice_exclusivity: true,
            ..Self::default()
        }
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn with_choice_exclusivity(mut self, enabled: bool) -> Self {
        self.enforce_choice_exclusivity = enabled;
        self
    }

    pub fn with_eager_warm_up(mut self, enabled: bool) -> Self {
        self.eager_warm_up = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_recursion_depth == 0 {
            return Err(FhirShapeError::config(
                "max_recursion_depth must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Load configuration from a YAML or JSON file (chosen by extension)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FhirShapeError::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: ValidationConfig = if is_json(path) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML or JSON file (chosen by extension)
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            serde_yaml::to_string(self)?
        };

        std::fs::write(path, content)?;
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_default() {
        let config = ValidationConfig::default();
        assert_eq!(config.max_recursion_depth, 100);
        assert!(!config.enforce_choice_exclusivity);
        assert!(!config.eager_warm_up);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let config = ValidationConfig::default().with_max_recursion_depth(0);
        assert!(matches!(
            config.validate(),
            Err(FhirShapeError::Config { .. })
        ));
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fhirshape.yaml");

        let config = ValidationConfig::strict().with_max_recursion_depth(12);
        config.save_to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("maxRecursionDepth: 12"));

        let loaded = ValidationConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fhirshape.json");
        std::fs::write(&path, r#"{ "enforceChoiceExclusivity": true }"#).unwrap();

        let loaded = ValidationConfig::load_from_file(&path).unwrap();
        assert!(loaded.enforce_choice_exclusivity);
        assert_eq!(loaded.max_recursion_depth, 100);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let result = ValidationConfig::load_from_file(&dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(FhirShapeError::Config { .. })));
    }
}
