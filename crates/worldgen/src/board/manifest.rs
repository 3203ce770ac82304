use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::coord::{Dimension, ZoneCoordinate};

use super::format::BoardError;
use super::store::{BoardKind, BoardStore};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BoardManifest {
    boards: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestEntry {
    name: String,
    x: i32,
    y: i32,
    dimension: Dimension,
    #[serde(default = "default_depth")]
    depth: u32,
    kind: BoardKind,
}

fn default_depth() -> u32 {
    1
}

/// Registers every board listed in `boards.json`. A missing manifest means
/// no authored boards; a malformed one is a hard error.
pub fn load_manifest(path: &Path, store: &mut BoardStore) -> Result<usize, BoardError> {
    if !path.is_file() {
        info!(path = %path.display(), "board_manifest_absent");
        return Ok(0);
    }
    let raw = fs::read_to_string(path).map_err(|source| BoardError::Manifest {
        path: path.to_path_buf(),
        message: source.to_string(),
    })?;
    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    let manifest: BoardManifest =
        serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
            BoardError::Manifest {
                path: path.to_path_buf(),
                message: format!("{}: {}", error.path(), error.inner()),
            }
        })?;

    for entry in &manifest.boards {
        let coord = ZoneCoordinate::new(entry.x, entry.y, entry.dimension, entry.depth);
        store.register_board_at(coord, &entry.name, entry.kind);
    }
    info!(
        path = %path.display(),
        boards = manifest.boards.len(),
        "board_manifest_loaded"
    );
    Ok(manifest.boards.len())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::board::MemoryBoardSource;

    #[test]
    fn registers_listed_boards() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("boards.json");
        fs::write(
            &path,
            r#"{"boards":[
                {"name":"home","x":0,"y":0,"dimension":"interior","kind":"canon"},
                {"name":"crypt","x":2,"y":1,"dimension":"underground","depth":3,"kind":"custom"}
            ]}"#,
        )
        .expect("write");
        let mut store = BoardStore::new(MemoryBoardSource::new());
        assert_eq!(load_manifest(&path, &mut store).expect("manifest"), 2);
        assert!(store.has_board(&ZoneCoordinate::interior(0, 0)));
        assert!(store.has_board(&ZoneCoordinate::underground(2, 1, 3)));
    }

    #[test]
    fn absent_manifest_registers_nothing() {
        let temp = TempDir::new().expect("temp");
        let mut store = BoardStore::new(MemoryBoardSource::new());
        let count = load_manifest(&temp.path().join("boards.json"), &mut store).expect("ok");
        assert_eq!(count, 0);
    }

    #[test]
    fn malformed_manifest_names_the_field() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("boards.json");
        fs::write(
            &path,
            r#"{"boards":[{"name":"home","x":0,"y":0,"dimension":"attic","kind":"canon"}]}"#,
        )
        .expect("write");
        let mut store = BoardStore::new(MemoryBoardSource::new());
        match load_manifest(&path, &mut store).expect_err("bad dimension") {
            BoardError::Manifest { message, .. } => {
                assert!(message.starts_with("boards[0].dimension"), "{message}")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
