use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::board::BoardKind;
use crate::content::Activation;
use crate::coord::{Dimension, ZoneCoordinate};
use crate::tile::StructureKind;

/// A board registration produced by generation rather than by startup
/// wiring, e.g. the interior that belongs to a freshly placed shack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardClaim {
    pub x: i32,
    pub y: i32,
    pub dimension: Dimension,
    pub board: String,
    pub kind: BoardKind,
}

impl BoardClaim {
    pub fn coord(&self) -> ZoneCoordinate {
        ZoneCoordinate::new(self.x, self.y, self.dimension, 1)
    }
}

/// Monotonic world state that generation reads and writes. Saved with the
/// zone cache so a reloaded world does not place a unique structure twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldFlags {
    zones_visited: u32,
    unique: BTreeSet<String>,
    structure_counts: BTreeMap<StructureKind, u32>,
    activation: Activation,
    board_claims: Vec<BoardClaim>,
}

impl WorldFlags {
    pub fn zones_visited(&self) -> u32 {
        self.zones_visited
    }

    pub fn record_zone_visit(&mut self) -> u32 {
        self.zones_visited = self.zones_visited.saturating_add(1);
        self.zones_visited
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.unique.contains(flag)
    }

    /// Sets a flag for the rest of the world's lifetime. Returns `false` if
    /// it was already set.
    pub fn set_flag(&mut self, flag: &str) -> bool {
        let inserted = self.unique.insert(flag.to_string());
        if inserted {
            info!(flag, "world_flag_set");
        }
        inserted
    }

    pub fn record_structure(&mut self, kind: StructureKind) {
        *self.structure_counts.entry(kind).or_default() += 1;
    }

    pub fn structure_count(&self, kind: StructureKind) -> u32 {
        self.structure_counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn activate(&mut self) {
        if self.activation != Activation::Active {
            info!("world_activated");
        }
        self.activation = Activation::Active;
    }

    pub fn record_claim(&mut self, claim: BoardClaim) {
        if !self.board_claims.contains(&claim) {
            self.board_claims.push(claim);
        }
    }

    pub fn board_claims(&self) -> &[BoardClaim] {
        &self.board_claims
    }
}
