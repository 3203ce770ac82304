use rand::Rng;
use tracing::warn;

use crate::tile::{PortKind, StructureKind, Tile};
use crate::zone::{Grid, TilePos, ZoneData};

use super::placement::{
    carve_cavern, carve_path, ensure_exit_access, entry_position, fit_structure, hub_goal,
    populate, scatter_decorations, FreeTiles, PopulateInput,
};
use super::tables::{underground_level, SpawnTables};
use super::{GenerationContext, GenerationError, GenerationOutcome, GenerationRequest};

const PITFALL_CHANCE: f64 = 0.06;

pub(super) fn generate(
    tables: &SpawnTables,
    request: &GenerationRequest,
    ctx: &mut GenerationContext<'_>,
) -> Result<GenerationOutcome, GenerationError> {
    let coord = request.coord;
    let size = ctx.config.grid_size;
    let level = underground_level(coord.depth);
    let mut grid = Grid::filled(size, size, Tile::Rock);
    carve_cavern(&mut grid, size * size * 2 / 3, ctx.rng);
    scatter_decorations(&mut grid, tables, ctx.rng);

    // Vertical ports go in before content so nothing is dropped on them.
    let exits_before = ctx
        .connections
        .exits(coord)
        .ok_or(GenerationError::MissingConnections { zone: coord })?;
    let mut vertical = Vec::new();
    if let Some(pos) = exits_before.down {
        vertical.push(place_port(&mut grid, pos, PortKind::StairDown));
    }
    if let Some(pos) = exits_before.up {
        vertical.push(place_port(&mut grid, pos, PortKind::StairUp));
    }

    let table = tables.level(level);
    if ctx.rng.gen_bool(table.ruins_chance)
        && fit_structure(
            &mut grid,
            StructureKind::Ruins,
            ctx.config.structure_retry_budget,
            ctx.rng,
        )
        .is_none()
    {
        warn!(zone = %coord, "structure_placement_exhausted");
    }
    if ctx.rng.gen_bool(PITFALL_CHANCE) {
        let mut free = FreeTiles::scan(&grid);
        if let Some(pos) = free.take(ctx.rng) {
            grid.set(pos, Tile::port(PortKind::Pitfall));
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
        strict_dimension: true,
    };
    let enemies = populate(&mut grid, &mut free, &input, ctx.rng);

    let hub = grid.center();
    let exits = ensure_exit_access(
        &mut grid,
        coord,
        ctx.connections,
        ctx.repository,
        hub,
        ctx.rng,
    )?;
    let hub_area = hub_goal(&grid, hub);
    for port in vertical {
        if !carve_path(&mut grid, port, |pos| hub_area.contains(&pos)) {
            warn!(zone = %coord, x = port.x, y = port.y, "vertical_port_unreachable");
        }
    }

    let entry = entry_position(&grid, request.incoming, Some(&exits), None);
    let mut zone = ZoneData::new(grid, level);
    zone.enemies = enemies;
    zone.player_spawn = Some(entry_position(&zone.grid, None, None, None));
    Ok(GenerationOutcome {
        zone,
        entry,
        claims: Vec::new(),
        degraded: false,
    })
}

/// Vertical links are rolled inside the edge, but a smaller grid than the
/// one the link was rolled for could still put it on the rim.
fn place_port(grid: &mut Grid, pos: TilePos, kind: PortKind) -> TilePos {
    let max_x = grid.width().saturating_sub(2).max(1);
    let max_y = grid.height().saturating_sub(2).max(1);
    let pos = TilePos::new(pos.x.clamp(1, max_x), pos.y.clamp(1, max_y));
    grid.set(pos, Tile::port(kind));
    pos
}
