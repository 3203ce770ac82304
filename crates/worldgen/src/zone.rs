use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coord::{Side, ZoneCoordinate};
use crate::tile::Tile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub x: u32,
    pub y: u32,
}

impl TilePos {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn key(&self) -> String {
        pos_key(self.x, self.y)
    }

    pub fn chebyshev(&self, other: TilePos) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

pub fn pos_key(x: u32, y: u32) -> String {
    format!("{x},{y}")
}

/// Parses an `"x,y"` key. Negative or non-numeric parts yield `None`.
pub fn parse_pos_key(key: &str) -> Option<TilePos> {
    let (x, y) = key.split_once(',')?;
    Some(TilePos::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid expects {expected} tiles for its size, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
    #[error("grid dimensions must be non-zero, got {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },
}

/// Row-major tile grid; `index = y * width + x`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGrid")]
pub struct Grid {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

#[derive(Deserialize)]
struct RawGrid {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl TryFrom<RawGrid> for Grid {
    type Error = GridError;

    fn try_from(raw: RawGrid) -> Result<Self, Self::Error> {
        Grid::from_tiles(raw.width, raw.height, raw.tiles)
    }
}

impl Grid {
    pub fn filled(width: u32, height: u32, fill: Tile) -> Self {
        Self {
            width,
            height,
            tiles: vec![fill; width as usize * height as usize],
        }
    }

    pub fn from_tiles(width: u32, height: u32, tiles: Vec<Tile>) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::EmptyDimensions { width, height });
        }
        let expected = width as usize * height as usize;
        if tiles.len() != expected {
            return Err(GridError::TileCountMismatch {
                expected,
                actual: tiles.len(),
            });
        }
        Ok(Self {
            width,
            height,
            tiles,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    pub fn get(&self, pos: TilePos) -> Option<&Tile> {
        self.index_of(pos.x, pos.y)
            .and_then(|index| self.tiles.get(index))
    }

    pub fn get_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        self.index_of(pos.x, pos.y)
            .and_then(|index| self.tiles.get_mut(index))
    }

    pub fn set(&mut self, pos: TilePos, tile: Tile) -> bool {
        match self.get_mut(pos) {
            Some(slot) => {
                *slot = tile;
                true
            }
            None => false,
        }
    }

    pub fn row(&self, y: u32) -> &[Tile] {
        let start = y as usize * self.width as usize;
        self.tiles
            .get(start..start + self.width as usize)
            .unwrap_or(&[])
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn positions(&self) -> impl Iterator<Item = TilePos> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| TilePos::new(x, y)))
    }

    pub fn center(&self) -> TilePos {
        TilePos::new(self.width / 2, self.height / 2)
    }

    pub fn is_edge(&self, pos: TilePos) -> bool {
        pos.x == 0 || pos.y == 0 || pos.x + 1 == self.width || pos.y + 1 == self.height
    }

    /// Edge tile on `side`, `offset` tiles along that edge.
    pub fn edge_tile(&self, side: Side, offset: u32) -> TilePos {
        match side {
            Side::North => TilePos::new(offset.min(self.width - 1), 0),
            Side::South => TilePos::new(offset.min(self.width - 1), self.height - 1),
            Side::West => TilePos::new(0, offset.min(self.height - 1)),
            Side::East => TilePos::new(self.width - 1, offset.min(self.height - 1)),
        }
    }

    /// The tile one step inward from an edge tile.
    pub fn inward_of(&self, side: Side, edge: TilePos) -> TilePos {
        match side {
            Side::North => TilePos::new(edge.x, (edge.y + 1).min(self.height - 1)),
            Side::South => TilePos::new(edge.x, edge.y.saturating_sub(1)),
            Side::West => TilePos::new((edge.x + 1).min(self.width - 1), edge.y),
            Side::East => TilePos::new(edge.x.saturating_sub(1), edge.y),
        }
    }

    pub fn neighbors4(&self, pos: TilePos) -> impl Iterator<Item = TilePos> + '_ {
        [(0i64, -1i64), (0, 1), (1, 0), (-1, 0)]
            .into_iter()
            .map(move |(dx, dy)| (pos.x as i64 + dx, pos.y as i64 + dy))
            .filter(|(x, y)| self.contains(*x, *y))
            .map(|(x, y)| TilePos::new(x as u32, y as u32))
    }

    pub fn count_matching(&self, predicate: impl Fn(&Tile) -> bool) -> usize {
        self.tiles.iter().filter(|tile| predicate(tile)).count()
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.height {
            let line = self
                .row(y)
                .iter()
                .map(glyph)
                .collect::<String>();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

fn glyph(tile: &Tile) -> char {
    match tile {
        Tile::Floor => '.',
        Tile::Grass => ',',
        Tile::Wall => '#',
        Tile::Rock => 'o',
        Tile::Shrub => '*',
        Tile::Tree => 'T',
        Tile::Water => '~',
        Tile::Exit => 'E',
        Tile::Port { .. } => '>',
        Tile::Structure { .. } => 'S',
        Tile::Item { .. } => 'i',
        Tile::Npc { .. } => '@',
        Tile::Bomb { .. } => 'b',
        Tile::Custom { .. } => '?',
    }
}

/// Presentation layer for a zone, keyed by `"x,y"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    #[serde(default)]
    pub terrain_textures: BTreeMap<String, String>,
    #[serde(default)]
    pub overlay_textures: BTreeMap<String, String>,
    #[serde(default)]
    pub rotations: BTreeMap<String, u16>,
    #[serde(default)]
    pub overlay_rotations: BTreeMap<String, u16>,
}

impl Presentation {
    pub fn from_grid(grid: &Grid) -> Self {
        let terrain_textures = grid
            .positions()
            .filter_map(|pos| grid.get(pos).map(|tile| (pos.key(), tile.texture_id())))
            .collect();
        Self {
            terrain_textures,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnemyId(pub String);

impl EnemyId {
    pub fn for_spawn(zone: &ZoneCoordinate, kind: &str, pos: TilePos) -> Self {
        Self(format!("{}#{kind}@{},{}", zone.key(), pos.x, pos.y))
    }
}

impl fmt::Display for EnemyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemySpawn {
    pub id: EnemyId,
    pub kind: String,
    pub pos: TilePos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub zone_x: i32,
    pub zone_y: i32,
    pub pos: TilePos,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneData {
    pub grid: Grid,
    /// `None` marks a legacy cache entry written before presentation maps
    /// were stored; board-backed zones get it re-derived on load.
    #[serde(default)]
    pub presentation: Option<Presentation>,
    #[serde(default)]
    pub enemies: Vec<EnemySpawn>,
    #[serde(default)]
    pub player_spawn: Option<TilePos>,
    #[serde(default)]
    pub return_to_surface: Option<ReturnPoint>,
    #[serde(default)]
    pub return_to_interior: Option<ReturnPoint>,
    #[serde(default = "default_level")]
    pub level: u8,
}

fn default_level() -> u8 {
    1
}

impl ZoneData {
    pub fn new(grid: Grid, level: u8) -> Self {
        Self {
            presentation: Some(Presentation::from_grid(&grid)),
            grid,
            enemies: Vec::new(),
            player_spawn: None,
            return_to_surface: None,
            return_to_interior: None,
            level,
        }
    }

    /// The safe fallback zone: all floor, nothing in it.
    pub fn blank(size: u32) -> Self {
        let size = size.max(1);
        let mut zone = Self::new(Grid::filled(size, size, Tile::Floor), 1);
        zone.player_spawn = Some(zone.grid.center());
        zone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_tiles_rejects_wrong_count() {
        let err = Grid::from_tiles(2, 2, vec![Tile::Floor; 3]).expect_err("err");
        assert_eq!(
            err,
            GridError::TileCountMismatch {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn index_is_row_major() {
        let mut grid = Grid::filled(3, 2, Tile::Floor);
        assert!(grid.set(TilePos::new(2, 1), Tile::Wall));
        assert_eq!(grid.tiles()[5], Tile::Wall);
        assert_eq!(grid.row(1)[2], Tile::Wall);
        assert!(!grid.set(TilePos::new(3, 0), Tile::Wall));
    }

    #[test]
    fn edge_helpers_point_inward() {
        let grid = Grid::filled(9, 9, Tile::Floor);
        let edge = grid.edge_tile(Side::East, 3);
        assert_eq!(edge, TilePos::new(8, 3));
        assert_eq!(grid.inward_of(Side::East, edge), TilePos::new(7, 3));
        assert!(grid.is_edge(edge));
        assert_eq!(grid.center(), TilePos::new(4, 4));
    }

    #[test]
    fn blank_zone_is_all_floor_without_enemies() {
        let zone = ZoneData::blank(9);
        assert_eq!(zone.grid.count_matching(|tile| *tile == Tile::Floor), 81);
        assert!(zone.enemies.is_empty());
        assert!(zone.presentation.is_some());
    }

    #[test]
    fn pos_keys_parse() {
        assert_eq!(parse_pos_key("4,4"), Some(TilePos::new(4, 4)));
        assert_eq!(parse_pos_key("-1,4"), None);
        assert_eq!(parse_pos_key("4"), None);
    }
}
