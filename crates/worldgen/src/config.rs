use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const SEED_ENV_VAR: &str = "WAYFARER_SEED";
pub const MIN_GRID_SIZE: u32 = 5;

/// Tunables for world generation. Every field has a default so a partial
/// `world.json` only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    pub seed: u64,
    pub grid_size: u32,
    pub home_zone: (i32, i32),
    pub surface_edge_open_chance: f64,
    pub underground_edge_open_chance: f64,
    pub vertical_link_chance: f64,
    pub connection_retry_budget: u32,
    pub structure_retry_budget: u32,
    pub cistern_chance: f64,
    pub special_item_chance: f64,
    pub zones_per_level_unlock: u32,
    pub bomb_fuse_actions: u32,
    pub pitfall_survival_turns: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            grid_size: 9,
            home_zone: (0, 0),
            surface_edge_open_chance: 0.65,
            underground_edge_open_chance: 0.55,
            vertical_link_chance: 0.25,
            connection_retry_budget: 20,
            structure_retry_budget: 20,
            cistern_chance: 0.08,
            special_item_chance: 0.15,
            zones_per_level_unlock: 3,
            bomb_fuse_actions: 2,
            pitfall_survival_turns: 20,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read world config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse world config {path} at {json_path}: {message}")]
    Parse {
        path: PathBuf,
        json_path: String,
        message: String,
    },
    #[error("invalid world config field {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
    #[error("{var}='{value}' is not an unsigned integer seed")]
    EnvSeed { var: &'static str, value: String },
}

impl WorldConfig {
    /// Reads `path` if it exists, falls back to defaults otherwise, then
    /// applies the seed override from the environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.is_file() {
            let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Self::parse(path, &raw)?
        } else {
            Self::default()
        };

        if let Ok(value) = env::var(SEED_ENV_VAR) {
            config.seed = value.trim().parse::<u64>().map_err(|_| ConfigError::EnvSeed {
                var: SEED_ENV_VAR,
                value: value.clone(),
            })?;
        }

        config.validate()?;
        info!(
            seed = config.seed,
            grid_size = config.grid_size,
            from_file = path.is_file(),
            "world_config_loaded"
        );
        Ok(config)
    }

    pub fn parse(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize::<_, Self>(&mut deserializer).map_err(|error| {
            let json_path = error.path().to_string();
            ConfigError::Parse {
                path: path.to_path_buf(),
                json_path,
                message: error.into_inner().to_string(),
            }
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size < MIN_GRID_SIZE {
            return Err(ConfigError::Invalid {
                field: "grid_size",
                message: format!("must be at least {MIN_GRID_SIZE}, got {}", self.grid_size),
            });
        }
        for (field, value) in [
            ("surface_edge_open_chance", self.surface_edge_open_chance),
            ("underground_edge_open_chance", self.underground_edge_open_chance),
            ("vertical_link_chance", self.vertical_link_chance),
            ("cistern_chance", self.cistern_chance),
            ("special_item_chance", self.special_item_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    field,
                    message: format!("probability must be within 0..=1, got {value}"),
                });
            }
        }
        if self.zones_per_level_unlock == 0 {
            return Err(ConfigError::Invalid {
                field: "zones_per_level_unlock",
                message: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().expect("temp");
        let config = WorldConfig::parse(&temp.path().join("world.json"), "{}").expect("parse");
        assert_eq!(config, WorldConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let config =
            WorldConfig::parse(Path::new("world.json"), r#"{"seed": 7, "grid_size": 11}"#)
                .expect("parse");
        assert_eq!(config.seed, 7);
        assert_eq!(config.grid_size, 11);
        assert_eq!(config.connection_retry_budget, 20);
    }

    #[test]
    fn parse_errors_carry_json_path() {
        let err = WorldConfig::parse(Path::new("world.json"), r#"{"cistern_chance": "often"}"#)
            .expect_err("err");
        match err {
            ConfigError::Parse { json_path, .. } => assert_eq!(json_path, "cistern_chance"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validation_rejects_tiny_grids_and_bad_probabilities() {
        let tiny = WorldConfig {
            grid_size: 3,
            ..WorldConfig::default()
        };
        assert!(matches!(
            tiny.validate(),
            Err(ConfigError::Invalid { field: "grid_size", .. })
        ));
        let odd = WorldConfig {
            cistern_chance: 1.5,
            ..WorldConfig::default()
        };
        assert!(matches!(
            odd.validate(),
            Err(ConfigError::Invalid { field: "cistern_chance", .. })
        ));
    }
}
