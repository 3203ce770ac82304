use rand::Rng;
use tracing::{info, warn};

use crate::board::BoardKind;
use crate::coord::Dimension;
use crate::flags::BoardClaim;
use crate::tile::{PortKind, StructureKind, Tile};
use crate::zone::{Grid, ZoneData};

use super::placement::{
    ensure_exit_access, entry_position, fit_structure, place_centered, populate,
    scatter_decorations, FreeTiles, PopulateInput,
};
use super::tables::{surface_level, SpawnTables, UNIQUE_STRUCTURES};
use super::{GenerationContext, GenerationError, GenerationOutcome, GenerationRequest};

pub(super) fn generate(
    tables: &SpawnTables,
    request: &GenerationRequest,
    ctx: &mut GenerationContext<'_>,
) -> Result<GenerationOutcome, GenerationError> {
    let coord = request.coord;
    let size = ctx.config.grid_size;
    let mut grid = Grid::filled(size, size, Tile::Grass);
    let mut enemies = Vec::new();
    let mut claims = Vec::new();

    let (level, spawn_hint) = if (coord.x, coord.y) == ctx.config.home_zone {
        let front = place_centered(&mut grid, StructureKind::House, Tile::Grass);
        ctx.flags.record_structure(StructureKind::House);
        (1, Some(front))
    } else {
        let visited = ctx.flags.record_zone_visit();
        let level = surface_level(&coord, ctx.config, visited);
        scatter_decorations(&mut grid, tables, ctx.rng);

        let unique = UNIQUE_STRUCTURES
            .iter()
            .copied()
            .find(|unique| unique.level == level && !ctx.flags.has_flag(unique.flag));
        match unique {
            Some(unique) => {
                let front = place_centered(&mut grid, unique.kind, Tile::Grass);
                ctx.flags.set_flag(unique.flag);
                ctx.flags.record_structure(unique.kind);
                if unique.activates_world {
                    ctx.flags.activate();
                }
                if let Some(board) = unique.interior_board {
                    claims.push(BoardClaim {
                        x: coord.x,
                        y: coord.y,
                        dimension: Dimension::Interior,
                        board: board.to_string(),
                        kind: BoardKind::Canon,
                    });
                }
                info!(
                    zone = %coord,
                    structure = unique.kind.as_token(),
                    level,
                    "unique_structure_placed"
                );
                (level, Some(front))
            }
            None => {
                let table = tables.level(level);
                if level >= 2 && ctx.rng.gen_bool(table.ruins_chance) {
                    place_ruins(&mut grid, ctx);
                }
                if ctx.rng.gen_bool(ctx.config.cistern_chance) {
                    let mut free = FreeTiles::scan(&grid);
                    if let Some(pos) = free.take(ctx.rng) {
                        grid.set(pos, Tile::port(PortKind::Cistern));
                    }
                }
                let mut free = FreeTiles::scan(&grid);
                let input = PopulateInput {
                    coord,
                    level,
                    table,
                    registry: ctx.registry,
                    activation: ctx.flags.activation(),
                    special_item_chance: ctx.config.special_item_chance,
                    strict_dimension: false,
                };
                enemies = populate(&mut grid, &mut free, &input, ctx.rng);
                (level, None)
            }
        }
    };

    let hub = spawn_hint.unwrap_or_else(|| grid.center());
    let exits = ensure_exit_access(
        &mut grid,
        coord,
        ctx.connections,
        ctx.repository,
        hub,
        ctx.rng,
    )?;
    let entry = entry_position(&grid, request.incoming, Some(&exits), spawn_hint);
    let spawn = entry_position(&grid, None, None, spawn_hint);

    let mut zone = ZoneData::new(grid, level);
    zone.enemies = enemies;
    zone.player_spawn = Some(spawn);
    Ok(GenerationOutcome {
        zone,
        entry,
        claims,
        degraded: false,
    })
}

fn place_ruins(grid: &mut Grid, ctx: &mut GenerationContext<'_>) {
    match fit_structure(
        grid,
        StructureKind::Ruins,
        ctx.config.structure_retry_budget,
        ctx.rng,
    ) {
        Some(_) => ctx.flags.record_structure(StructureKind::Ruins),
        None => warn!(
            budget = ctx.config.structure_retry_budget,
            "structure_placement_exhausted"
        ),
    }
}
