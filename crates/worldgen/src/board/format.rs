use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::tile::Tile;
use crate::zone::{parse_pos_key, TilePos};

const VALID_ROTATIONS: [u16; 4] = [0, 90, 180, 270];

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("no board named '{name}' is known to the board source")]
    NotFound { name: String },
    #[error("failed to read board '{name}' from {path}: {source}")]
    Io {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse board '{name}' at {json_path}: {message}")]
    Parse {
        name: String,
        json_path: String,
        message: String,
    },
    #[error("board '{name}' is invalid: {message}")]
    Invalid { name: String, message: String },
    #[error("board '{name}' failed to load earlier: {reason}")]
    Unavailable { name: String, reason: String },
    #[error("failed to read board manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },
}

/// A terrain cell as authored: either a bare tag (`"wall"`) or a full
/// record (`{"type": "bomb", "actions_since_placed": 0}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTile {
    Tag(String),
    Record(Tile),
}

impl RawTile {
    pub fn to_tile(&self) -> Tile {
        match self {
            Self::Tag(tag) => Tile::from_tag(tag),
            Self::Record(tile) => tile.clone(),
        }
    }
}

/// Hand-authored zone layout as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardFile {
    pub name: String,
    pub size: [u32; 2],
    pub terrain: Vec<RawTile>,
    #[serde(default)]
    pub overlays: BTreeMap<String, String>,
    #[serde(default)]
    pub features: BTreeMap<String, String>,
    #[serde(default)]
    pub rotations: BTreeMap<String, u16>,
    #[serde(default)]
    pub overlay_rotations: BTreeMap<String, u16>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl BoardFile {
    /// Parses and validates in one step; a board is either entirely usable
    /// or rejected.
    pub fn parse(name: &str, raw: &str) -> Result<Self, BoardError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let board: Self =
            serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
                let json_path = error.path().to_string();
                BoardError::Parse {
                    name: name.to_string(),
                    json_path,
                    message: error.into_inner().to_string(),
                }
            })?;
        board.validate()?;
        Ok(board)
    }

    pub fn width(&self) -> u32 {
        self.size[0]
    }

    pub fn height(&self) -> u32 {
        self.size[1]
    }

    pub fn validate(&self) -> Result<(), BoardError> {
        let [width, height] = self.size;
        if width == 0 || height == 0 {
            return Err(self.invalid(format!("size must be non-zero, got {width}x{height}")));
        }
        let expected = width as usize * height as usize;
        if self.terrain.len() != expected {
            return Err(self.invalid(format!(
                "terrain has {} tiles but size {width}x{height} needs {expected}",
                self.terrain.len()
            )));
        }

        for (field, keys) in [
            ("overlays", self.overlays.keys().collect::<Vec<_>>()),
            ("features", self.features.keys().collect()),
            ("rotations", self.rotations.keys().collect()),
            ("overlayRotations", self.overlay_rotations.keys().collect()),
        ] {
            for key in keys {
                self.position_in_bounds(field, key)?;
            }
        }

        for (field, map) in [
            ("rotations", &self.rotations),
            ("overlayRotations", &self.overlay_rotations),
        ] {
            if let Some((key, degrees)) = map
                .iter()
                .find(|(_, degrees)| !VALID_ROTATIONS.contains(degrees))
            {
                return Err(self.invalid(format!(
                    "{field}[\"{key}\"] = {degrees} is not one of 0/90/180/270"
                )));
            }
        }

        if self.metadata.contains_key("playerSpawn") && self.authored_spawn().is_none() {
            return Err(self.invalid("metadata.playerSpawn must be an in-bounds [x, y] pair"));
        }
        Ok(())
    }

    fn position_in_bounds(&self, field: &str, key: &str) -> Result<TilePos, BoardError> {
        let pos = parse_pos_key(key)
            .ok_or_else(|| self.invalid(format!("{field} key '{key}' is not an \"x,y\" pair")))?;
        if pos.x >= self.width() || pos.y >= self.height() {
            return Err(self.invalid(format!("{field} key '{key}' is outside the board")));
        }
        Ok(pos)
    }

    fn invalid(&self, message: impl Into<String>) -> BoardError {
        BoardError::Invalid {
            name: self.name.clone(),
            message: message.into(),
        }
    }

    /// `metadata.playerSpawn` as an in-bounds position.
    pub fn authored_spawn(&self) -> Option<TilePos> {
        let pair = self.metadata.get("playerSpawn")?.as_array()?;
        let [x, y] = pair.as_slice() else {
            return None;
        };
        let pos = TilePos::new(
            u32::try_from(x.as_u64()?).ok()?,
            u32::try_from(y.as_u64()?).ok()?,
        );
        (pos.x < self.width() && pos.y < self.height()).then_some(pos)
    }

    pub fn authored_level(&self) -> Option<u8> {
        self.metadata
            .get("level")
            .and_then(Value::as_u64)
            .and_then(|level| u8::try_from(level).ok())
    }
}
