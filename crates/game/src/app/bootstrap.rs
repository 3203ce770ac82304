use std::env;

use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use worldgen::{
    load_content_dir, load_manifest, resolve_app_paths, AppPaths, BoardError, BoardStore,
    ConfigError, ContentLoadError, ContentRegistry, FsBoardSource, GameSession, StartupError,
    WorldConfig, ZoneOrchestrator,
};

use super::script::{parse_script, ScriptError, Step};

const WALK_ENV_VAR: &str = "WAYFARER_WALK";
const NEW_GAME_ENV_VAR: &str = "WAYFARER_NEW_GAME";
const DEFAULT_WALK: &str = "door,door,e,e,s,dig,wait:3,climb,w,n,random:6";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("content definitions failed to load: {0}")]
    Content(#[from] ContentLoadError),
    #[error(transparent)]
    Boards(#[from] BoardError),
    #[error("WAYFARER_WALK: {0}")]
    Script(#[from] ScriptError),
}

pub(crate) struct AppWiring {
    pub(crate) paths: AppPaths,
    pub(crate) registry: ContentRegistry,
    pub(crate) boards: BoardStore,
    pub(crate) session: GameSession,
    pub(crate) orchestrator: ZoneOrchestrator,
    pub(crate) script: Vec<Step>,
    pub(crate) resume: bool,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Wayfarer Startup ===");

    let paths = resolve_app_paths()?;
    let config = WorldConfig::load(&paths.world_config())?;

    let mut registry = ContentRegistry::new();
    load_content_dir(&paths.content_dir, &mut registry)?;
    registry.mark_initialized();

    let mut boards = BoardStore::new(FsBoardSource::new(&paths.boards_dir));
    let registered = load_manifest(&paths.board_manifest(), &mut boards)?;
    let preload = boards.preload_all();
    if preload.failed > 0 {
        warn!(
            registered,
            failed = preload.failed,
            "boards_unavailable_at_startup"
        );
    }

    let raw_walk = env::var(WALK_ENV_VAR).unwrap_or_else(|_| DEFAULT_WALK.to_string());
    let script = parse_script(&raw_walk)?;
    let resume = env::var(NEW_GAME_ENV_VAR).is_err();
    info!(
        root = %paths.root.display(),
        steps = script.len(),
        resume,
        "app_wired"
    );

    Ok(AppWiring {
        paths,
        registry,
        boards,
        session: GameSession::new(config),
        orchestrator: ZoneOrchestrator::default(),
        script,
        resume,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
