use crate::board::BoardKind;
use crate::coord::Side;
use crate::tile::{PortKind, Tile};
use crate::zone::{Grid, ZoneData};

use super::{GenerationContext, GenerationError, GenerationOutcome, GenerationRequest};

/// Plain walled room with a door on the south wall. Only non-canon
/// interiors ever get here; canon ones are served from boards.
pub(super) fn generate(
    request: &GenerationRequest,
    ctx: &mut GenerationContext<'_>,
) -> Result<GenerationOutcome, GenerationError> {
    let coord = request.coord;
    if let Some((board, BoardKind::Canon)) = ctx.boards.board_at(&coord) {
        return Err(GenerationError::CanonInterior {
            zone: coord,
            board: board.to_string(),
        });
    }
    if (coord.x, coord.y) == ctx.config.home_zone {
        return Err(GenerationError::CanonInterior {
            zone: coord,
            board: "home".to_string(),
        });
    }

    let size = ctx.config.grid_size;
    let mut grid = Grid::filled(size, size, Tile::Floor);
    let rim = grid.positions().filter(|pos| grid.is_edge(*pos)).collect::<Vec<_>>();
    for pos in rim {
        grid.set(pos, Tile::Wall);
    }
    let door = grid.edge_tile(Side::South, size / 2);
    grid.set(door, Tile::port(PortKind::Door));
    let spawn = grid.inward_of(Side::South, door);

    let mut zone = ZoneData::new(grid, 1);
    zone.player_spawn = Some(spawn);
    Ok(GenerationOutcome {
        zone,
        entry: spawn,
        claims: Vec::new(),
        degraded: false,
    })
}
