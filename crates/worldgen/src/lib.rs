use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod board;
pub mod config;
pub mod connections;
pub mod content;
pub mod coord;
pub mod flags;
pub mod generator;
pub mod live;
pub mod orchestrator;
pub mod persistence;
pub mod repository;
pub mod session;
pub mod state;
pub mod tile;
pub mod zone;

#[cfg(test)]
mod test_support;

pub use board::{
    convert_board_to_grid, load_manifest, BoardError, BoardFile, BoardKind, BoardSource,
    BoardStore, FsBoardSource, MemoryBoardSource, PreloadSummary,
};
pub use config::{ConfigError, WorldConfig};
pub use connections::{ConnectionGraph, ZoneExits};
pub use content::{
    load_content_dir, Activation, ContentCategory, ContentDefinition, ContentErrorCode,
    ContentLoadError, ContentRegistry, EffectContext, EffectError, EffectKind, EffectOutcome,
    ItemEffect, PlayerVitals, RegistryError, RegistryStats, SpawnRule,
};
pub use coord::{Dimension, Side, ZoneCoordinate, ZoneKeyError};
pub use flags::{BoardClaim, WorldFlags};
pub use generator::{
    GenerationContext, GenerationError, GenerationOutcome, GenerationRequest, ZoneGenerator,
};
pub use live::{BombBlast, LivePlayer, LiveZone, NpcInstance};
pub use orchestrator::{
    EmergencePatch, ZoneEntry, ZoneEntryRequest, ZoneLoadError, ZoneOrchestrator, ZoneSource,
};
pub use persistence::{load_session, save_session, SaveError, SAVE_FORMAT_VERSION};
pub use repository::{DefeatedEnemySet, ZoneRepository};
pub use session::{GameSession, TurnReport};
pub use state::{
    ChargeSelection, PitfallStatus, TransitionDescriptor, TransitionSource, ZoneStateManager,
};
pub use tile::{PortKind, StructureKind, Tile};
pub use zone::{EnemyId, EnemySpawn, Grid, Presentation, ReturnPoint, TilePos, ZoneData};

pub const ROOT_ENV_VAR: &str = "WAYFARER_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub content_dir: PathBuf,
    pub boards_dir: PathBuf,
    pub saves_dir: PathBuf,
}

impl AppPaths {
    pub fn from_root(root: &Path) -> Self {
        let assets = root.join("assets");
        Self {
            root: root.to_path_buf(),
            content_dir: assets.join("content"),
            boards_dir: assets.join("boards"),
            saves_dir: root.join("saves"),
        }
    }

    pub fn board_manifest(&self) -> PathBuf {
        self.boards_dir.join("boards.json")
    }

    pub fn world_config(&self) -> PathBuf {
        self.root.join("world.json")
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create saves directory at {path}: {source}")]
    CreateSavesDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "{env_var} is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and an assets/ directory."
    )]
    InvalidEnvRoot { path: PathBuf, env_var: &'static str },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/wayfarer\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    let paths = AppPaths::from_root(&root);

    fs::create_dir_all(&paths.saves_dir).map_err(|source| StartupError::CreateSavesDir {
        path: paths.saves_dir.clone(),
        source,
    })?;

    Ok(paths)
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(&PathBuf::from(value));
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot {
                    path: normalized,
                    env_var: ROOT_ENV_VAR,
                })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            exe_dir
                .ancestors()
                .find(|candidate| is_repo_marker(candidate))
                .map(normalize_path)
                .ok_or_else(|| StartupError::RootNotFound {
                    start_dir: normalize_path(&exe_dir),
                    env_var: ROOT_ENV_VAR,
                })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && path.join("assets").is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn repo_marker_requires_cargo_toml_and_assets() {
        let temp = TempDir::new().expect("temp");
        assert!(!is_repo_marker(temp.path()));
        fs::create_dir_all(temp.path().join("assets")).expect("assets");
        assert!(!is_repo_marker(temp.path()));
        fs::write(temp.path().join("Cargo.toml"), "[workspace]").expect("cargo");
        assert!(is_repo_marker(temp.path()));
    }

    #[test]
    fn paths_hang_off_root() {
        let paths = AppPaths::from_root(Path::new("/tmp/wayfarer"));
        assert!(paths.boards_dir.ends_with(Path::new("assets").join("boards")));
        assert!(paths.board_manifest().ends_with("boards.json"));
        assert!(paths.saves_dir.ends_with("saves"));
    }
}
