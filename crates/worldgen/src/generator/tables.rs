use rand::Rng;

use crate::config::WorldConfig;
use crate::content::ContentDefinition;
use crate::coord::ZoneCoordinate;
use crate::tile::{StructureKind, Tile};

pub const MAX_LEVEL: u8 = 4;

/// Distance bands around the home zone. Each band caps the zone level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Region {
    Home,
    Woods,
    Wilds,
    Frontier,
}

impl Region {
    pub fn for_distance(distance: u32) -> Self {
        match distance {
            0..=1 => Self::Home,
            2..=3 => Self::Woods,
            4..=6 => Self::Wilds,
            _ => Self::Frontier,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Self::Home => 1,
            Self::Woods => 2,
            Self::Wilds => 3,
            Self::Frontier => 4,
        }
    }
}

/// Surface level: the region cap, further held back until the player has
/// explored enough zones to unlock it.
pub fn surface_level(coord: &ZoneCoordinate, config: &WorldConfig, zones_visited: u32) -> u8 {
    let (home_x, home_y) = config.home_zone;
    let region = Region::for_distance(coord.chebyshev_distance(home_x, home_y));
    let unlocked = 1 + zones_visited / config.zones_per_level_unlock.max(1);
    let unlocked = u8::try_from(unlocked).unwrap_or(MAX_LEVEL);
    region.level().min(unlocked).clamp(1, MAX_LEVEL)
}

pub fn underground_level(depth: u32) -> u8 {
    u8::try_from(depth.saturating_add(1))
        .unwrap_or(MAX_LEVEL)
        .clamp(1, MAX_LEVEL)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelTable {
    pub enemy_chance: f64,
    pub max_enemies: u32,
    pub food_chance: f64,
    pub water_chance: f64,
    pub npc_chance: f64,
    pub ruins_chance: f64,
}

/// A structure that exists at most once per world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueStructure {
    pub kind: StructureKind,
    pub level: u8,
    pub flag: &'static str,
    /// Interior board that the structure's door leads into.
    pub interior_board: Option<&'static str>,
    /// Placing it wakes the world: activation-gated content becomes eligible.
    pub activates_world: bool,
}

pub const UNIQUE_STRUCTURES: [UniqueStructure; 2] = [
    UniqueStructure {
        kind: StructureKind::Shack,
        level: 3,
        flag: "wilds_shack",
        interior_board: Some("shack"),
        activates_world: false,
    },
    UniqueStructure {
        kind: StructureKind::Well,
        level: 4,
        flag: "frontier_well",
        interior_board: None,
        activates_world: true,
    },
];

/// Per-dimension probability tables, indexed by level 1..=4.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnTables {
    levels: [LevelTable; MAX_LEVEL as usize],
    pub decoration_density: f64,
    pub decorations: Vec<(Tile, u32)>,
}

impl SpawnTables {
    pub fn surface() -> Self {
        Self {
            levels: [
                LevelTable {
                    enemy_chance: 0.15,
                    max_enemies: 1,
                    food_chance: 0.5,
                    water_chance: 0.5,
                    npc_chance: 0.1,
                    ruins_chance: 0.0,
                },
                LevelTable {
                    enemy_chance: 0.4,
                    max_enemies: 2,
                    food_chance: 0.4,
                    water_chance: 0.35,
                    npc_chance: 0.08,
                    ruins_chance: 0.15,
                },
                LevelTable {
                    enemy_chance: 0.6,
                    max_enemies: 3,
                    food_chance: 0.3,
                    water_chance: 0.25,
                    npc_chance: 0.05,
                    ruins_chance: 0.2,
                },
                LevelTable {
                    enemy_chance: 0.8,
                    max_enemies: 4,
                    food_chance: 0.2,
                    water_chance: 0.2,
                    npc_chance: 0.03,
                    ruins_chance: 0.25,
                },
            ],
            decoration_density: 0.18,
            decorations: vec![
                (Tile::Tree, 5),
                (Tile::Shrub, 4),
                (Tile::Rock, 2),
                (Tile::Water, 1),
            ],
        }
    }

    pub fn underground() -> Self {
        Self {
            levels: [
                LevelTable {
                    enemy_chance: 0.3,
                    max_enemies: 1,
                    food_chance: 0.2,
                    water_chance: 0.4,
                    npc_chance: 0.0,
                    ruins_chance: 0.1,
                },
                LevelTable {
                    enemy_chance: 0.5,
                    max_enemies: 2,
                    food_chance: 0.2,
                    water_chance: 0.35,
                    npc_chance: 0.0,
                    ruins_chance: 0.1,
                },
                LevelTable {
                    enemy_chance: 0.7,
                    max_enemies: 3,
                    food_chance: 0.15,
                    water_chance: 0.3,
                    npc_chance: 0.02,
                    ruins_chance: 0.15,
                },
                LevelTable {
                    enemy_chance: 0.85,
                    max_enemies: 4,
                    food_chance: 0.1,
                    water_chance: 0.25,
                    npc_chance: 0.02,
                    ruins_chance: 0.15,
                },
            ],
            decoration_density: 0.1,
            decorations: vec![(Tile::Rock, 4), (Tile::Water, 1)],
        }
    }

    pub fn level(&self, level: u8) -> &LevelTable {
        let index = usize::from(level.clamp(1, MAX_LEVEL) - 1);
        &self.levels[index]
    }
}

/// Draws one definition with probability proportional to `spawn_weight`.
/// Zero-weight definitions never win; an empty or all-zero set yields `None`.
/// Candidates are consumed in the order given, so a sorted input and a seeded
/// rng reproduce the same pick.
pub fn weighted_pick<'a, R: Rng + ?Sized>(
    candidates: &[&'a ContentDefinition],
    rng: &mut R,
) -> Option<&'a ContentDefinition> {
    let total = candidates
        .iter()
        .map(|def| u64::from(def.spawn_weight))
        .sum::<u64>();
    if total == 0 {
        return None;
    }
    let mut roll = rng.gen_range(0..total);
    for def in candidates {
        let weight = u64::from(def.spawn_weight);
        if roll < weight {
            return Some(*def);
        }
        roll -= weight;
    }
    None
}

/// Weighted pick over a static palette.
pub fn pick_weighted_tile<R: Rng + ?Sized>(palette: &[(Tile, u32)], rng: &mut R) -> Option<Tile> {
    let total = palette.iter().map(|(_, weight)| u64::from(*weight)).sum::<u64>();
    if total == 0 {
        return None;
    }
    let mut roll = rng.gen_range(0..total);
    for (tile, weight) in palette {
        let weight = u64::from(*weight);
        if roll < weight {
            return Some(tile.clone());
        }
        roll -= weight;
    }
    None
}
