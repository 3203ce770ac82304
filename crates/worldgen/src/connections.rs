use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::WorldConfig;
use crate::coord::{Dimension, Side, ZoneCoordinate};
use crate::zone::TilePos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeState {
    pub open: bool,
    /// Tile index along the shared edge; both zones put their exit here.
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerticalLink {
    pub pos: TilePos,
}

/// Open sides of one zone as seen from inside it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneExits {
    pub north: Option<u32>,
    pub south: Option<u32>,
    pub east: Option<u32>,
    pub west: Option<u32>,
    pub down: Option<TilePos>,
    pub up: Option<TilePos>,
}

impl ZoneExits {
    pub fn side(&self, side: Side) -> Option<u32> {
        match side {
            Side::North => self.north,
            Side::South => self.south,
            Side::East => self.east,
            Side::West => self.west,
        }
    }

    fn set_side(&mut self, side: Side, offset: Option<u32>) {
        match side {
            Side::North => self.north = offset,
            Side::South => self.south = offset,
            Side::East => self.east = offset,
            Side::West => self.west = offset,
        }
    }

    pub fn open_sides(&self) -> Vec<(Side, u32)> {
        Side::ALL
            .into_iter()
            .filter_map(|side| self.side(side).map(|offset| (side, offset)))
            .collect()
    }

    pub fn has_horizontal_exit(&self) -> bool {
        !self.open_sides().is_empty()
    }
}

/// Undirected adjacency between zones. Every edge is stored once under a
/// canonical key, so deciding A→B decides B→A in the same write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionGraph {
    edges: BTreeMap<String, EdgeState>,
    vertical: BTreeMap<String, Option<VerticalLink>>,
    materialized: BTreeSet<String>,
    /// Edges opened after the fact. The zone across may already be cached
    /// without an exit on that side.
    #[serde(default)]
    forced: BTreeSet<String>,
}

fn edge_key(a: ZoneCoordinate, b: ZoneCoordinate) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{}|{}", low.key(), high.key())
}

impl ConnectionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.edges.clear();
        self.vertical.clear();
        self.materialized.clear();
        self.forced.clear();
    }

    pub fn is_materialized(&self, coord: ZoneCoordinate) -> bool {
        self.materialized.contains(&coord.key())
    }

    pub fn edge(&self, coord: ZoneCoordinate, side: Side) -> Option<EdgeState> {
        self.edges
            .get(&edge_key(coord, coord.neighbor(side)))
            .copied()
    }

    /// Decides every still-undecided edge around `coord`. Freshly rolled
    /// edges are re-rolled up to the retry budget until at least one side is
    /// open; edges decided earlier by a neighbor are never changed.
    pub fn generate_chunk_connections<R: Rng + ?Sized>(
        &mut self,
        coord: ZoneCoordinate,
        config: &WorldConfig,
        rng: &mut R,
    ) {
        if coord.dimension == Dimension::Interior || self.is_materialized(coord) {
            return;
        }
        let open_chance = match coord.dimension {
            Dimension::Underground => config.underground_edge_open_chance,
            Dimension::Surface | Dimension::Interior => config.surface_edge_open_chance,
        };
        let span = config.grid_size.max(3);

        let mut fresh = Vec::<Side>::new();
        for side in Side::ALL {
            let key = edge_key(coord, coord.neighbor(side));
            if self.edges.contains_key(&key) {
                continue;
            }
            let state = EdgeState {
                open: rng.gen_bool(open_chance),
                offset: rng.gen_range(1..span - 1),
            };
            self.edges.insert(key, state);
            fresh.push(side);
        }

        let mut attempts = 0u32;
        while !self.has_open_side(coord) && !fresh.is_empty() {
            if attempts >= config.connection_retry_budget {
                warn!(
                    zone = %coord,
                    attempts,
                    "connection_retry_budget_exhausted"
                );
                break;
            }
            attempts += 1;
            let side = fresh[rng.gen_range(0..fresh.len())];
            let key = edge_key(coord, coord.neighbor(side));
            let open = rng.gen_bool(open_chance);
            if let Some(state) = self.edges.get_mut(&key) {
                state.open = open;
            }
        }
        if fresh.is_empty() && !self.has_open_side(coord) {
            warn!(zone = %coord, "zone_enclosed_by_decided_edges");
        }

        if coord.dimension == Dimension::Underground {
            let key = coord.key();
            if !self.vertical.contains_key(&key) {
                let link = rng.gen_bool(config.vertical_link_chance).then(|| VerticalLink {
                    pos: TilePos::new(rng.gen_range(1..span - 1), rng.gen_range(1..span - 1)),
                });
                self.vertical.insert(key, link);
            }
        }

        self.materialized.insert(coord.key());
        debug!(zone = %coord, rerolls = attempts, "chunk_connections_materialized");
    }

    fn has_open_side(&self, coord: ZoneCoordinate) -> bool {
        Side::ALL
            .into_iter()
            .any(|side| self.edge(coord, side).is_some_and(|state| state.open))
    }

    /// Open exits of a materialized zone; `None` if it was never materialized.
    pub fn exits(&self, coord: ZoneCoordinate) -> Option<ZoneExits> {
        if coord.dimension != Dimension::Interior && !self.is_materialized(coord) {
            return None;
        }
        let mut exits = ZoneExits::default();
        for side in Side::ALL {
            let offset = self
                .edge(coord, side)
                .filter(|state| state.open)
                .map(|state| state.offset);
            exits.set_side(side, offset);
        }
        if coord.dimension == Dimension::Underground {
            exits.down = self.vertical.get(&coord.key()).copied().flatten().map(|l| l.pos);
            if coord.depth > 1 {
                let above = ZoneCoordinate::underground(coord.x, coord.y, coord.depth - 1);
                exits.up = self.vertical.get(&above.key()).copied().flatten().map(|l| l.pos);
            }
        }
        Some(exits)
    }

    /// Opens an edge regardless of earlier rolls. Used when a zone would
    /// otherwise have no way out.
    pub fn force_open(&mut self, coord: ZoneCoordinate, side: Side, offset: u32) {
        let key = edge_key(coord, coord.neighbor(side));
        self.edges.insert(key.clone(), EdgeState { open: true, offset });
        self.forced.insert(key);
        debug!(zone = %coord, side = ?side, offset, "connection_forced_open");
    }

    /// Sides of `coord` that were forced open, with their edge offsets.
    pub fn forced_sides(&self, coord: ZoneCoordinate) -> Vec<(Side, u32)> {
        Side::ALL
            .into_iter()
            .filter_map(|side| {
                let key = edge_key(coord, coord.neighbor(side));
                if !self.forced.contains(&key) {
                    return None;
                }
                self.edges
                    .get(&key)
                    .filter(|state| state.open)
                    .map(|state| (side, state.offset))
            })
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
