mod interior;
mod placement;
mod surface;
mod tables;
mod underground;

use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::board::BoardStore;
use crate::config::{WorldConfig, MIN_GRID_SIZE};
use crate::connections::ConnectionGraph;
use crate::content::ContentRegistry;
use crate::coord::{Dimension, Side, ZoneCoordinate};
use crate::flags::{BoardClaim, WorldFlags};
use crate::repository::ZoneRepository;
use crate::zone::{TilePos, ZoneData};

pub use placement::{entry_position, nearest_open_tile, open_arrival, reopen_exits};
pub use tables::{
    surface_level, underground_level, weighted_pick, LevelTable, Region, SpawnTables,
    UniqueStructure, MAX_LEVEL, UNIQUE_STRUCTURES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest {
    pub coord: ZoneCoordinate,
    /// Side of the new zone the player walks in through.
    pub incoming: Option<Side>,
}

/// Everything a handler reads or advances while building one zone.
pub struct GenerationContext<'a> {
    pub config: &'a WorldConfig,
    pub registry: &'a ContentRegistry,
    pub repository: &'a ZoneRepository,
    pub boards: &'a BoardStore,
    pub connections: &'a mut ConnectionGraph,
    pub flags: &'a mut WorldFlags,
    pub rng: &'a mut ChaCha8Rng,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub zone: ZoneData,
    /// Arrival tile for the requested incoming side.
    pub entry: TilePos,
    /// Boards that should now back other coordinates.
    pub claims: Vec<BoardClaim>,
    /// Set when the handler failed and the blank fallback was returned.
    pub degraded: bool,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("content registry was used before initialization finished")]
    RegistryNotReady,
    #[error("connections for zone {zone} were never materialized")]
    MissingConnections { zone: ZoneCoordinate },
    #[error("canon interior {zone} (board '{board}') reached procedural generation")]
    CanonInterior { zone: ZoneCoordinate, board: String },
    #[error("grid size {size} is below the minimum of {min}")]
    GridTooSmall { size: u32, min: u32 },
}

#[derive(Debug, Clone)]
pub struct ZoneGenerator {
    surface: SpawnTables,
    underground: SpawnTables,
}

impl Default for ZoneGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneGenerator {
    pub fn new() -> Self {
        Self {
            surface: SpawnTables::surface(),
            underground: SpawnTables::underground(),
        }
    }

    /// Builds a zone. Never fails: any handler error is logged and answered
    /// with a blank floor zone.
    pub fn generate(
        &self,
        request: &GenerationRequest,
        ctx: &mut GenerationContext<'_>,
    ) -> GenerationOutcome {
        match self.try_generate(request, ctx) {
            Ok(outcome) => {
                debug!(
                    zone = %request.coord,
                    level = outcome.zone.level,
                    enemies = outcome.zone.enemies.len(),
                    "zone_generated"
                );
                outcome
            }
            Err(err) => {
                match &err {
                    GenerationError::CanonInterior { .. } => error!(
                        zone = %request.coord,
                        error = %err,
                        "canon_interior_generated_procedurally"
                    ),
                    _ => warn!(zone = %request.coord, error = %err, "zone_generation_degraded"),
                }
                let zone = ZoneData::blank(ctx.config.grid_size.max(MIN_GRID_SIZE));
                let entry = entry_position(&zone.grid, None, None, zone.player_spawn);
                GenerationOutcome {
                    zone,
                    entry,
                    claims: Vec::new(),
                    degraded: true,
                }
            }
        }
    }

    fn try_generate(
        &self,
        request: &GenerationRequest,
        ctx: &mut GenerationContext<'_>,
    ) -> Result<GenerationOutcome, GenerationError> {
        if !ctx.registry.is_initialized() {
            return Err(GenerationError::RegistryNotReady);
        }
        if ctx.config.grid_size < MIN_GRID_SIZE {
            return Err(GenerationError::GridTooSmall {
                size: ctx.config.grid_size,
                min: MIN_GRID_SIZE,
            });
        }
        match request.coord.dimension {
            Dimension::Surface => surface::generate(&self.surface, request, ctx),
            Dimension::Interior => interior::generate(request, ctx),
            Dimension::Underground => underground::generate(&self.underground, request, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::board::{BoardKind, MemoryBoardSource};
    use crate::content::{Activation, ContentCategory, ContentDefinition, SpawnRule};
    use crate::test_support::test_registry;
    use crate::tile::{PortKind, StructureKind, Tile};

    struct Harness {
        config: WorldConfig,
        registry: ContentRegistry,
        repository: ZoneRepository,
        boards: BoardStore,
        connections: ConnectionGraph,
        flags: WorldFlags,
        rng: ChaCha8Rng,
    }

    impl Harness {
        fn new(seed: u64) -> Self {
            Self {
                config: WorldConfig::default(),
                registry: test_registry(),
                repository: ZoneRepository::new(),
                boards: BoardStore::new(MemoryBoardSource::new()),
                connections: ConnectionGraph::new(),
                flags: WorldFlags::default(),
                rng: ChaCha8Rng::seed_from_u64(seed),
            }
        }

        fn generate(&mut self, coord: ZoneCoordinate, incoming: Option<Side>) -> GenerationOutcome {
            self.connections
                .generate_chunk_connections(coord, &self.config, &mut self.rng);
            let mut ctx = GenerationContext {
                config: &self.config,
                registry: &self.registry,
                repository: &self.repository,
                boards: &self.boards,
                connections: &mut self.connections,
                flags: &mut self.flags,
                rng: &mut self.rng,
            };
            ZoneGenerator::new().generate(&GenerationRequest { coord, incoming }, &mut ctx)
        }
    }

    #[test]
    fn home_zone_gets_the_house_and_no_enemies() {
        let mut harness = Harness::new(1);
        let outcome = harness.generate(ZoneCoordinate::surface(0, 0), None);
        let grid = &outcome.zone.grid;
        assert_eq!(
            grid.get(grid.center()),
            Some(&Tile::structure(StructureKind::House))
        );
        assert!(outcome.zone.enemies.is_empty());
        assert_eq!(outcome.zone.level, 1);
        assert_eq!(harness.flags.zones_visited(), 0);
    }

    #[test]
    fn first_level_three_zone_forces_the_shack_and_suppresses_the_rest() {
        let mut harness = Harness::new(2);
        for _ in 0..5 {
            harness.flags.record_zone_visit();
        }
        let coord = ZoneCoordinate::surface(5, 0);
        let outcome = harness.generate(coord, Some(Side::West));
        let zone = &outcome.zone;
        let grid = &zone.grid;

        assert_eq!(zone.level, 3);
        assert_eq!(
            grid.get(grid.center()),
            Some(&Tile::structure(StructureKind::Shack))
        );
        assert!(zone.enemies.is_empty());
        assert_eq!(grid.count_matching(|tile| matches!(tile, Tile::Structure { .. })), 1);
        assert_eq!(grid.count_matching(|tile| matches!(tile, Tile::Item { .. } | Tile::Npc { .. })), 0);
        assert_eq!(
            grid.count_matching(|tile| matches!(tile, Tile::Tree | Tile::Shrub | Tile::Rock)),
            0
        );
        assert!(harness.flags.has_flag("wilds_shack"));
        assert_eq!(
            outcome.claims,
            vec![BoardClaim {
                x: 5,
                y: 0,
                dimension: Dimension::Interior,
                board: "shack".to_string(),
                kind: BoardKind::Canon,
            }]
        );
    }

    #[test]
    fn unique_structures_appear_at_most_once() {
        let mut harness = Harness::new(3);
        for _ in 0..20 {
            harness.flags.record_zone_visit();
        }
        let mut shacks = 0;
        let mut wells = 0;
        for x in 4..=12 {
            for y in -2..=2 {
                let outcome = harness.generate(ZoneCoordinate::surface(x, y), None);
                let grid = &outcome.zone.grid;
                shacks += grid.count_matching(|t| *t == Tile::structure(StructureKind::Shack));
                wells += grid.count_matching(|t| *t == Tile::structure(StructureKind::Well));
            }
        }
        assert_eq!(shacks, 1);
        assert_eq!(wells, 1);
        assert_eq!(harness.flags.structure_count(StructureKind::Well), 1);
    }

    #[test]
    fn placing_the_well_unlocks_activation_gated_content() {
        let mut harness = Harness::new(11);
        let mut registry = ContentRegistry::new();
        registry
            .register_item(
                ContentDefinition::new("old_letter", ContentCategory::Item)
                    .with_tag("special")
                    .with_rule(SpawnRule {
                        requires_activation: true,
                        ..SpawnRule::default()
                    }),
            )
            .expect("letter");
        registry.mark_initialized();
        harness.registry = registry;
        harness.config.special_item_chance = 1.0;
        for _ in 0..20 {
            harness.flags.record_zone_visit();
        }
        harness.flags.set_flag("wilds_shack");
        let letter = Tile::item("old_letter");

        let before = harness.generate(ZoneCoordinate::surface(4, 0), None);
        assert_eq!(before.zone.level, 3);
        assert_eq!(before.zone.grid.count_matching(|tile| *tile == letter), 0);
        assert_eq!(harness.flags.activation(), Activation::Dormant);

        let well = harness.generate(ZoneCoordinate::surface(7, 0), None);
        let grid = &well.zone.grid;
        assert_eq!(
            grid.get(grid.center()),
            Some(&Tile::structure(StructureKind::Well))
        );
        assert_eq!(harness.flags.activation(), Activation::Active);

        let after = harness.generate(ZoneCoordinate::surface(8, 0), None);
        assert_eq!(after.zone.level, 4);
        assert_eq!(after.zone.grid.count_matching(|tile| *tile == letter), 1);
    }

    #[test]
    fn every_generated_zone_has_an_exit() {
        let mut harness = Harness::new(4);
        harness.config.surface_edge_open_chance = 0.0;
        harness.config.connection_retry_budget = 0;
        for x in 1..6 {
            let outcome = harness.generate(ZoneCoordinate::surface(x, 3), None);
            assert!(outcome.zone.grid.count_matching(|tile| *tile == Tile::Exit) >= 1);
        }
    }

    #[test]
    fn uninitialized_registry_degrades_to_blank_zone() {
        let mut harness = Harness::new(5);
        harness.registry = ContentRegistry::new();
        let outcome = harness.generate(ZoneCoordinate::surface(2, 2), None);
        assert!(outcome.degraded);
        assert_eq!(outcome.zone, ZoneData::blank(9));
    }

    #[test]
    fn canon_interior_never_gets_procedural_rooms() {
        let mut harness = Harness::new(6);
        harness
            .boards
            .register_board(4, 4, Dimension::Interior, "shack", BoardKind::Canon);
        let outcome = harness.generate(ZoneCoordinate::interior(4, 4), None);
        assert!(outcome.degraded);
        assert!(outcome.zone.enemies.is_empty());

        let home = harness.generate(ZoneCoordinate::interior(0, 0), None);
        assert!(home.degraded);

        let plain = harness.generate(ZoneCoordinate::interior(2, 7), None);
        assert!(!plain.degraded);
        let grid = &plain.zone.grid;
        assert_eq!(grid.count_matching(|tile| *tile == Tile::port(PortKind::Door)), 1);
    }

    #[test]
    fn underground_only_spawns_underground_enemies() {
        let mut harness = Harness::new(7);
        for depth in 1..=4 {
            for x in 0..6 {
                let outcome = harness.generate(ZoneCoordinate::underground(x, 0, depth), None);
                assert!(!outcome.degraded);
                assert!(outcome.zone.enemies.iter().all(|enemy| enemy.kind == "bat"));
                assert_eq!(outcome.zone.level, underground_level(depth));
            }
        }
    }

    #[test]
    fn same_seed_same_zone() {
        let first = Harness::new(8).generate(ZoneCoordinate::surface(3, 1), Some(Side::North));
        let second = Harness::new(8).generate(ZoneCoordinate::surface(3, 1), Some(Side::North));
        assert_eq!(first, second);
    }

    #[test]
    fn entry_is_open_ground() {
        let mut harness = Harness::new(9);
        for side in Side::ALL {
            let outcome = harness.generate(ZoneCoordinate::surface(2, -3), Some(side));
            assert!(outcome
                .zone
                .grid
                .get(outcome.entry)
                .is_some_and(Tile::is_open_ground));
        }
    }
}
