use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use schemalink_core::{InferenceConfig, NormalizePolicy};
use schemalink_introspect::{DiscoverOptions, SamplingOptions};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "schemalink.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Settings file layout. Every section and field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemalinkConfig {
    pub normalize: NormalizePolicy,
    pub inference: InferenceConfig,
    pub sampling: SamplingOptions,
}

impl SchemalinkConfig {
    /// Load `path`, or `schemalink.toml` when it exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !candidate.is_file() {
                    return Ok((Self::default(), None));
                }
                candidate
            }
        };

        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = Self::parse(&raw).map_err(|source| ConfigError::Toml {
            path: path.clone(),
            source,
        })?;
        Ok((config, Some(path)))
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn discover_options(&self) -> DiscoverOptions {
        DiscoverOptions {
            normalize: self.normalize.clone(),
            inference: self.inference.clone(),
            sampling: self.sampling.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemalink_core::FoldRule;

    #[test]
    fn partial_files_keep_defaults() {
        let config = SchemalinkConfig::parse(
            r#"
            [normalize]
            fold = "upper"
            default_schema = "dbo"

            [inference]
            min_confidence = 0.7

            [inference.weights]
            sampling = 0.3

            [sampling]
            timeout_ms = 250
            "#,
        )
        .expect("parse config");

        assert_eq!(config.normalize.fold, FoldRule::Upper);
        assert_eq!(config.normalize.default_schema.as_deref(), Some("dbo"));
        assert!(config.normalize.unquote);
        assert_eq!(config.inference.min_confidence, 0.7);
        assert_eq!(config.inference.weights.sampling, 0.3);
        assert_eq!(config.inference.weights.name, 0.6);
        assert_eq!(config.sampling.timeout_ms, 250);
        assert_eq!(config.sampling.limit, 1000);
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(
            SchemalinkConfig::parse("").expect("parse"),
            SchemalinkConfig::default()
        );
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(SchemalinkConfig::parse("[rendering]\nquote = \"none\"").is_err());
    }
}
