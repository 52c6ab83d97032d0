use crate::core::fusion::{FusionError, MethodWeights};
use crate::core::planner::PlannerConfig;
use crate::core::rules::RuleConfig;
use crate::core::scanner::DEFAULT_EXTENSIONS;
use crate::core::tags::TagConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Weights(#[from] FusionError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionSettings {
    pub weights: MethodWeights,
    /// Confidence factor for a parent synthesized from a subcategory.
    pub parent_discount: f64,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            weights: MethodWeights::default(),
            parent_discount: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingSettings {
    pub normalized_size: u32,
    pub workers: usize,
}

impl Default for HashingSettings {
    fn default() -> Self {
        Self {
            normalized_size: 64,
            workers: num_cpus::get(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateSettings {
    pub similarity_threshold: f64,
}

impl Default for DuplicateSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerSettings {
    pub extensions: Vec<String>,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Every tunable of the engine. Missing sections fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fusion: FusionSettings,
    pub rules: RuleConfig,
    pub tags: TagConfig,
    pub hashing: HashingSettings,
    pub duplicates: DuplicateSettings,
    pub planner: PlannerConfig,
    pub scanner: ScannerSettings,
}

impl EngineConfig {
    /// `<config dir>/sortrs/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sortrs").join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` when given, else the default path when it exists, else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(default) if default.is_file() => Self::load(&default),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fusion.weights.validate()?;

        let discount = self.fusion.parent_discount;
        if !(discount > 0.0 && discount <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "fusion.parent_discount must be in (0, 1], got {discount}"
            )));
        }
        let threshold = self.duplicates.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "duplicates.similarity_threshold must be in [0, 1], got {threshold}"
            )));
        }
        for (name, value) in [
            ("rules.high_quality", self.rules.high_quality),
            ("rules.low_quality", self.rules.low_quality),
            ("tags.filename_confidence", self.tags.filename_confidence),
            ("tags.time_confidence", self.tags.time_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if self.hashing.normalized_size == 0 || self.hashing.workers == 0 {
            return Err(ConfigError::Invalid(
                "hashing.normalized_size and hashing.workers must be positive".to_string(),
            ));
        }
        if self.planner.duplicates_folder.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "planner.duplicates_folder must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fusion::SourceMethod;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fusion.parent_discount, 0.8);
        assert_eq!(config.duplicates.similarity_threshold, 0.95);
        assert_eq!(config.planner.primary_count, 5);
        assert!(config.tags.enabled);
        assert!(config.hashing.workers >= 1);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [duplicates]
            similarity_threshold = 0.9

            [planner]
            storage_root = "/srv/photos"
            "#,
        )
        .unwrap();

        assert_eq!(config.duplicates.similarity_threshold, 0.9);
        assert_eq!(config.planner.storage_root, PathBuf::from("/srv/photos"));
        assert_eq!(config.planner.large_collection, 1000);
        assert_eq!(config.fusion.weights, MethodWeights::default());
    }

    #[test]
    fn test_weight_table_from_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            [fusion.weights]
            version = 2

            [fusion.weights.weights]
            rule_based = 0.5
            ai_classification = 1.0
            "#,
        )
        .unwrap();

        assert_eq!(config.fusion.weights.version, 2);
        assert_eq!(config.fusion.weights.weight(SourceMethod::RuleBased).unwrap(), 0.5);
        assert!(config.fusion.weights.weight(SourceMethod::ObjectDetection).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("[duplicates]\nsimilarity_threshold = 1.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[fusion]\nparent_discount = 0.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str(
                "[fusion.weights]\nversion = 1\n[fusion.weights.weights]\nrule_based = -1.0"
            ),
            Err(ConfigError::Weights(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[tags]\ntime_confidence = 1.2"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[duplicates]\nsimilarity_threshold = \"high\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[hashing]\nnormalized_size = 32\nworkers = 2\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.hashing.normalized_size, 32);
        assert_eq!(config.hashing.workers, 2);

        assert!(matches!(
            EngineConfig::load(&temp_dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
        assert!(EngineConfig::resolve(Some(&path)).is_ok());
    }
}
