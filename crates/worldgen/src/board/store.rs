use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::coord::{Dimension, ZoneCoordinate};

use super::format::{BoardError, BoardFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardKind {
    /// Shipped with the game; procedural generation must never stand in.
    Canon,
    Custom,
}

/// Where raw board JSON comes from.
pub trait BoardSource {
    fn fetch(&self, name: &str) -> Result<String, BoardError>;
}

#[derive(Debug, Clone)]
pub struct FsBoardSource {
    dir: PathBuf,
}

impl FsBoardSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl BoardSource for FsBoardSource {
    fn fetch(&self, name: &str) -> Result<String, BoardError> {
        let path = self.path_for(name);
        fs::read_to_string(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => BoardError::NotFound {
                name: name.to_string(),
            },
            _ => BoardError::Io {
                name: name.to_string(),
                path,
                source,
            },
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBoardSource {
    boards: BTreeMap<String, String>,
}

impl MemoryBoardSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_board(mut self, name: impl Into<String>, raw: impl Into<String>) -> Self {
        self.boards.insert(name.into(), raw.into());
        self
    }
}

impl BoardSource for MemoryBoardSource {
    fn fetch(&self, name: &str) -> Result<String, BoardError> {
        self.boards
            .get(name)
            .cloned()
            .ok_or_else(|| BoardError::NotFound {
                name: name.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Registration {
    name: String,
    kind: BoardKind,
}

#[derive(Debug)]
enum LoadState {
    Loaded(BoardFile),
    Failed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadSummary {
    pub loaded: usize,
    pub failed: usize,
}

/// Registered board coordinates plus a load cache. Each board name is
/// fetched at most once per store; both outcomes are remembered.
pub struct BoardStore {
    source: Box<dyn BoardSource>,
    registrations: BTreeMap<ZoneCoordinate, Registration>,
    states: BTreeMap<String, LoadState>,
    fetch_count: usize,
}

impl BoardStore {
    pub fn new(source: impl BoardSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            registrations: BTreeMap::new(),
            states: BTreeMap::new(),
            fetch_count: 0,
        }
    }

    /// Declares that a coordinate is authored. Underground registrations
    /// address depth 1.
    pub fn register_board(
        &mut self,
        x: i32,
        y: i32,
        dimension: Dimension,
        name: &str,
        kind: BoardKind,
    ) {
        self.register_board_at(ZoneCoordinate::new(x, y, dimension, 1), name, kind);
    }

    pub fn register_board_at(&mut self, coord: ZoneCoordinate, name: &str, kind: BoardKind) {
        let registration = Registration {
            name: name.to_string(),
            kind,
        };
        match self.registrations.insert(coord, registration.clone()) {
            Some(previous) if previous != registration => {
                warn!(
                    zone = %coord,
                    previous = %previous.name,
                    board = name,
                    "board_registration_replaced"
                );
            }
            Some(_) => {}
            None => debug!(zone = %coord, board = name, kind = ?kind, "board_registered"),
        }
    }

    pub fn has_board(&self, coord: &ZoneCoordinate) -> bool {
        self.registrations.contains_key(coord)
    }

    pub fn board_at(&self, coord: &ZoneCoordinate) -> Option<(&str, BoardKind)> {
        self.registrations
            .get(coord)
            .map(|registration| (registration.name.as_str(), registration.kind))
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// Returns the parsed board, fetching it on first request. A failed load
    /// is logged once and every later request gets `Unavailable` without
    /// touching the source again.
    pub fn load_board(&mut self, name: &str) -> Result<&BoardFile, BoardError> {
        if !self.states.contains_key(name) {
            self.fetch_count += 1;
            let state = match self
                .source
                .fetch(name)
                .and_then(|raw| BoardFile::parse(name, &raw))
            {
                Ok(board) => {
                    debug!(board = name, "board_loaded");
                    LoadState::Loaded(board)
                }
                Err(err) => {
                    error!(board = name, error = %err, "board_load_failed");
                    let reason = err.to_string();
                    self.states.insert(name.to_string(), LoadState::Failed(reason));
                    return Err(err);
                }
            };
            self.states.insert(name.to_string(), state);
        }

        match self.states.get(name) {
            Some(LoadState::Loaded(board)) => Ok(board),
            Some(LoadState::Failed(reason)) => Err(BoardError::Unavailable {
                name: name.to_string(),
                reason: reason.clone(),
            }),
            None => Err(BoardError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Cached board only; never fetches.
    pub fn get_board_sync(&self, name: &str) -> Option<&BoardFile> {
        match self.states.get(name) {
            Some(LoadState::Loaded(board)) => Some(board),
            Some(LoadState::Failed(_)) | None => None,
        }
    }

    pub fn is_failed(&self, name: &str) -> bool {
        matches!(self.states.get(name), Some(LoadState::Failed(_)))
    }

    /// Number of times the source was actually asked for a board.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count
    }

    /// Loads every registered board up front so zone entry never waits on
    /// the source.
    pub fn preload_all(&mut self) -> PreloadSummary {
        let names = self
            .registrations
            .values()
            .map(|registration| registration.name.clone())
            .collect::<BTreeSet<_>>();
        let mut summary = PreloadSummary::default();
        for name in names {
            match self.load_board(&name) {
                Ok(_) => summary.loaded += 1,
                Err(_) => summary.failed += 1,
            }
        }
        info!(
            loaded = summary.loaded,
            failed = summary.failed,
            "boards_preloaded"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use tempfile::TempDir;

    use super::*;

    const TINY: &str = r#"{"name":"tiny","size":[1,1],"terrain":["floor"]}"#;

    struct CountingSource {
        inner: MemoryBoardSource,
        calls: Rc<Cell<usize>>,
    }

    impl BoardSource for CountingSource {
        fn fetch(&self, name: &str) -> Result<String, BoardError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.fetch(name)
        }
    }

    #[test]
    fn repeated_loads_hit_the_cache() {
        let calls = Rc::new(Cell::new(0));
        let mut store = BoardStore::new(CountingSource {
            inner: MemoryBoardSource::new().with_board("tiny", TINY),
            calls: Rc::clone(&calls),
        });
        assert!(store.get_board_sync("tiny").is_none());
        store.load_board("tiny").expect("first");
        store.load_board("tiny").expect("second");
        assert_eq!(calls.get(), 1);
        assert!(store.get_board_sync("tiny").is_some());
    }

    #[test]
    fn failures_are_cached_and_reported_as_unavailable() {
        let mut store = BoardStore::new(MemoryBoardSource::new());
        assert!(matches!(
            store.load_board("ghost"),
            Err(BoardError::NotFound { .. })
        ));
        assert!(matches!(
            store.load_board("ghost"),
            Err(BoardError::Unavailable { .. })
        ));
        assert!(store.is_failed("ghost"));
        assert_eq!(store.fetch_count(), 1);
    }

    #[test]
    fn registration_is_per_coordinate() {
        let mut store = BoardStore::new(MemoryBoardSource::new());
        store.register_board(0, 0, Dimension::Interior, "home", BoardKind::Canon);
        assert!(store.has_board(&ZoneCoordinate::interior(0, 0)));
        assert!(!store.has_board(&ZoneCoordinate::surface(0, 0)));
        assert_eq!(
            store.board_at(&ZoneCoordinate::interior(0, 0)),
            Some(("home", BoardKind::Canon))
        );
    }

    #[test]
    fn preload_counts_each_board_once() {
        let mut store = BoardStore::new(MemoryBoardSource::new().with_board("tiny", TINY));
        store.register_board(0, 0, Dimension::Interior, "tiny", BoardKind::Canon);
        store.register_board(1, 0, Dimension::Interior, "tiny", BoardKind::Custom);
        store.register_board(2, 0, Dimension::Interior, "missing", BoardKind::Custom);
        let summary = store.preload_all();
        assert_eq!(summary, PreloadSummary { loaded: 1, failed: 1 });
    }

    #[test]
    fn filesystem_source_reads_name_dot_json() {
        let temp = TempDir::new().expect("temp");
        fs::write(temp.path().join("tiny.json"), TINY).expect("write");
        let mut store = BoardStore::new(FsBoardSource::new(temp.path()));
        assert_eq!(store.load_board("tiny").expect("tiny").name, "tiny");
        assert!(matches!(
            store.load_board("absent"),
            Err(BoardError::NotFound { .. })
        ));
    }
}
