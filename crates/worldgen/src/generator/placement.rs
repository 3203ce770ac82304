use std::collections::{BTreeSet, VecDeque};

use rand::Rng;
use tracing::{debug, warn};

use crate::connections::{ConnectionGraph, ZoneExits};
use crate::content::{Activation, ContentCategory, ContentDefinition, ContentRegistry};
use crate::coord::{Side, ZoneCoordinate};
use crate::repository::ZoneRepository;
use crate::tile::{PortKind, StructureKind, Tile};
use crate::zone::{EnemyId, EnemySpawn, Grid, TilePos};

use super::tables::{pick_weighted_tile, weighted_pick, LevelTable, SpawnTables};
use super::GenerationError;

/// Non-edge tiles content may still be dropped on.
pub(super) struct FreeTiles {
    tiles: Vec<TilePos>,
}

impl FreeTiles {
    pub(super) fn scan(grid: &Grid) -> Self {
        let tiles = grid
            .positions()
            .filter(|pos| !grid.is_edge(*pos))
            .filter(|pos| grid.get(*pos).is_some_and(Tile::is_open_ground))
            .collect();
        Self { tiles }
    }

    pub(super) fn take<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<TilePos> {
        if self.tiles.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.tiles.len());
        Some(self.tiles.swap_remove(index))
    }
}

pub(super) fn scatter_decorations<R: Rng + ?Sized>(
    grid: &mut Grid,
    tables: &SpawnTables,
    rng: &mut R,
) {
    let candidates = grid
        .positions()
        .filter(|pos| !grid.is_edge(*pos))
        .collect::<Vec<_>>();
    for pos in candidates {
        if !grid.get(pos).is_some_and(Tile::is_open_ground) {
            continue;
        }
        if rng.gen_bool(tables.decoration_density) {
            if let Some(tile) = pick_weighted_tile(&tables.decorations, rng) {
                grid.set(pos, tile);
            }
        }
    }
}

fn has_door(kind: StructureKind) -> bool {
    matches!(kind, StructureKind::House | StructureKind::Shack)
}

/// Wipes the zone to bare ground and puts `kind` in the middle. Structures
/// with an interior get a door on the tile south of them. Returns the tile
/// the player should stand on to use the structure.
pub(super) fn place_centered(grid: &mut Grid, kind: StructureKind, ground: Tile) -> TilePos {
    let positions = grid.positions().collect::<Vec<_>>();
    for pos in positions {
        grid.set(pos, ground.clone());
    }
    let center = grid.center();
    grid.set(center, Tile::structure(kind));
    let front = TilePos::new(center.x, center.y + 1);
    if has_door(kind) {
        grid.set(front, Tile::port(PortKind::Door));
        TilePos::new(center.x, center.y + 2)
    } else {
        front
    }
}

/// Generic structure fitting: random interior spots that are open ground
/// and do not touch another structure or port. Gives up after `budget`
/// attempts.
pub(super) fn fit_structure<R: Rng + ?Sized>(
    grid: &mut Grid,
    kind: StructureKind,
    budget: u32,
    rng: &mut R,
) -> Option<TilePos> {
    let (width, height) = (grid.width(), grid.height());
    if width < 3 || height < 3 {
        return None;
    }
    for _ in 0..budget {
        let pos = TilePos::new(rng.gen_range(1..width - 1), rng.gen_range(1..height - 1));
        let open = grid.get(pos).is_some_and(Tile::is_open_ground);
        let crowded = grid.neighbors4(pos).any(|neighbor| {
            matches!(
                grid.get(neighbor),
                Some(Tile::Structure { .. } | Tile::Port { .. })
            )
        });
        if open && !crowded {
            grid.set(pos, Tile::structure(kind));
            return Some(pos);
        }
    }
    None
}

pub(super) struct PopulateInput<'a> {
    pub coord: ZoneCoordinate,
    pub level: u8,
    pub table: &'a LevelTable,
    pub registry: &'a ContentRegistry,
    pub activation: Activation,
    pub special_item_chance: f64,
    /// Only content whose rule names this dimension explicitly.
    pub strict_dimension: bool,
}

impl PopulateInput<'_> {
    fn candidates(&self, category: ContentCategory, tag: Option<&str>) -> Vec<&ContentDefinition> {
        let dimension = self.coord.dimension;
        let defs = match tag {
            Some(tag) => {
                self.registry
                    .eligible_tagged(category, tag, self.level, dimension, self.activation)
            }
            None => self
                .registry
                .eligible(category, self.level, dimension, self.activation),
        };
        if self.strict_dimension {
            defs.into_iter()
                .filter(|def| def.spawn_rule.dimensions.contains(&dimension))
                .collect()
        } else {
            defs
        }
    }
}

/// Rolls enemies, food, water, special items and NPCs for one zone.
/// Items and NPCs are written into the grid; enemies are returned.
pub(super) fn populate<R: Rng + ?Sized>(
    grid: &mut Grid,
    free: &mut FreeTiles,
    input: &PopulateInput<'_>,
    rng: &mut R,
) -> Vec<EnemySpawn> {
    let mut enemies = Vec::new();
    if rng.gen_bool(input.table.enemy_chance) && input.table.max_enemies > 0 {
        let count = rng.gen_range(1..=input.table.max_enemies);
        let candidates = input.candidates(ContentCategory::Enemy, None);
        for _ in 0..count {
            let Some(def) = weighted_pick(&candidates, rng) else {
                break;
            };
            let Some(pos) = free.take(rng) else {
                break;
            };
            enemies.push(EnemySpawn {
                id: EnemyId::for_spawn(&input.coord, &def.id, pos),
                kind: def.id.clone(),
                pos,
            });
        }
    }

    let item_rolls = [
        (input.table.food_chance, "food"),
        (input.table.water_chance, "water"),
        (input.special_item_chance, "special"),
    ];
    for (chance, tag) in item_rolls {
        if !rng.gen_bool(chance) {
            continue;
        }
        let candidates = input.candidates(ContentCategory::Item, Some(tag));
        place_content(grid, free, &candidates, rng);
    }

    if rng.gen_bool(input.table.npc_chance) {
        let candidates = input.candidates(ContentCategory::Npc, None);
        place_content(grid, free, &candidates, rng);
    }

    debug!(
        zone = %input.coord,
        level = input.level,
        enemies = enemies.len(),
        "zone_populated"
    );
    enemies
}

fn place_content<R: Rng + ?Sized>(
    grid: &mut Grid,
    free: &mut FreeTiles,
    candidates: &[&ContentDefinition],
    rng: &mut R,
) -> Option<TilePos> {
    let def = weighted_pick(candidates, rng)?;
    let pos = free.take(rng)?;
    grid.set(pos, def.tile.clone());
    Some(pos)
}

/// Tiles that carving may walk through and flatten.
fn carvable(tile: &Tile) -> bool {
    tile.is_passable() || tile.is_clearable() || *tile == Tile::Water
}

/// Clears a walkable path from `from` to the first tile satisfying `goal`,
/// flattening obstacles on the way. Returns `false` if no path exists even
/// through clearable tiles.
pub(super) fn carve_path(grid: &mut Grid, from: TilePos, goal: impl Fn(TilePos) -> bool) -> bool {
    let width = grid.width() as usize;
    let mut previous = vec![None::<TilePos>; grid.tiles().len()];
    let mut seen = vec![false; grid.tiles().len()];
    let mut queue = VecDeque::from([from]);
    let Some(start) = grid.index_of(from.x, from.y) else {
        return false;
    };
    seen[start] = true;

    let mut reached = None;
    while let Some(pos) = queue.pop_front() {
        if goal(pos) {
            reached = Some(pos);
            break;
        }
        let neighbors = grid.neighbors4(pos).collect::<Vec<_>>();
        for next in neighbors {
            let index = next.y as usize * width + next.x as usize;
            if seen[index] || grid.is_edge(next) || !grid.get(next).is_some_and(carvable) {
                continue;
            }
            seen[index] = true;
            previous[index] = Some(pos);
            queue.push_back(next);
        }
    }

    let Some(mut cursor) = reached else {
        return false;
    };
    loop {
        if let Some(tile) = grid.get_mut(cursor) {
            if tile.is_clearable() || *tile == Tile::Water {
                *tile = Tile::Floor;
            }
        }
        match previous[cursor.y as usize * width + cursor.x as usize] {
            Some(prev) => cursor = prev,
            None => break,
        }
    }
    true
}

/// Writes the zone's exits into the grid and makes sure each one can reach
/// the middle of the zone. A zone with no exit at all gets one forced open,
/// preferring a neighbor that has not been generated yet so its layout can
/// still match.
pub(super) fn ensure_exit_access<R: Rng + ?Sized>(
    grid: &mut Grid,
    coord: ZoneCoordinate,
    connections: &mut ConnectionGraph,
    repository: &ZoneRepository,
    hub: TilePos,
    rng: &mut R,
) -> Result<ZoneExits, GenerationError> {
    let mut exits = connections
        .exits(coord)
        .ok_or(GenerationError::MissingConnections { zone: coord })?;

    if !exits.has_horizontal_exit() {
        let fresh = Side::ALL
            .into_iter()
            .filter(|side| !repository.has(&coord.neighbor(*side)))
            .collect::<Vec<_>>();
        let pool = if fresh.is_empty() {
            Side::ALL.to_vec()
        } else {
            fresh
        };
        let side = pool[rng.gen_range(0..pool.len())];
        let offset = match side {
            Side::North | Side::South => grid.width() / 2,
            Side::East | Side::West => grid.height() / 2,
        };
        warn!(
            zone = %coord,
            side = ?side,
            neighbor_generated = repository.has(&coord.neighbor(side)),
            "zone_exit_forced"
        );
        connections.force_open(coord, side, offset);
        exits = connections
            .exits(coord)
            .ok_or(GenerationError::MissingConnections { zone: coord })?;
    }

    let hub_area = hub_goal(grid, hub);
    for (side, offset) in exits.open_sides() {
        if !open_exit(grid, side, offset, &hub_area) {
            warn!(zone = %coord, side = ?side, "exit_path_blocked");
        }
    }
    Ok(exits)
}

/// Marks the exit tile and carves from it into `hub_area`.
fn open_exit(grid: &mut Grid, side: Side, offset: u32, hub_area: &BTreeSet<TilePos>) -> bool {
    let edge = grid.edge_tile(side, offset);
    grid.set(edge, Tile::Exit);
    let start = grid.inward_of(side, edge);
    if let Some(tile) = grid.get_mut(start) {
        if tile.is_clearable() || *tile == Tile::Water {
            *tile = Tile::Floor;
        }
    }
    carve_path(grid, start, |pos| hub_area.contains(&pos))
}

/// Cuts the given exits into an already built grid, skipping sides that
/// already show one. Returns the sides that had to be cut.
pub fn reopen_exits(grid: &mut Grid, sides: &[(Side, u32)]) -> Vec<Side> {
    let hub_area = hub_goal(grid, grid.center());
    let mut reopened = Vec::new();
    for (side, offset) in sides.iter().copied() {
        let edge = grid.edge_tile(side, offset);
        if grid.get(edge) == Some(&Tile::Exit) {
            continue;
        }
        if !open_exit(grid, side, offset, &hub_area) {
            warn!(side = ?side, offset, "reopened_exit_path_blocked");
        }
        reopened.push(side);
    }
    reopened
}

/// The hub itself if it can be walked on, else the tiles around it.
pub(super) fn hub_goal(grid: &Grid, hub: TilePos) -> BTreeSet<TilePos> {
    if grid.get(hub).is_some_and(carvable) {
        return BTreeSet::from([hub]);
    }
    grid.neighbors4(hub)
        .filter(|pos| grid.get(*pos).is_some_and(carvable))
        .collect()
}

/// Makes `pos` standable and links it to the middle of the zone. Vertical
/// arrivals land wherever the tile above was, which generation never saw.
pub fn open_arrival(grid: &mut Grid, pos: TilePos) -> bool {
    match grid.get(pos) {
        Some(tile) if tile.is_open_ground() => {}
        Some(Tile::Port { .. } | Tile::Exit) | None => return false,
        Some(_) => {
            grid.set(pos, Tile::Floor);
        }
    }
    let hub_area = hub_goal(grid, grid.center());
    carve_path(grid, pos, |candidate| hub_area.contains(&candidate))
}

/// Nearest open-ground tile to `preferred`, searching outward in rings.
pub fn nearest_open_tile(grid: &Grid, preferred: TilePos) -> Option<TilePos> {
    if grid.get(preferred).is_some_and(Tile::is_open_ground) {
        return Some(preferred);
    }
    let max_radius = grid.width().max(grid.height());
    for radius in 1..=max_radius {
        let found = grid
            .positions()
            .filter(|pos| pos.chebyshev(preferred) == radius)
            .find(|pos| grid.get(*pos).is_some_and(Tile::is_open_ground));
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Where a player arriving through `incoming` first stands: one tile inside
/// that side's exit. Without an incoming side the fallback (or the center)
/// is used.
pub fn entry_position(
    grid: &Grid,
    incoming: Option<Side>,
    exits: Option<&ZoneExits>,
    fallback: Option<TilePos>,
) -> TilePos {
    let preferred = match incoming {
        Some(side) => {
            let offset = exits.and_then(|exits| exits.side(side)).unwrap_or(match side {
                Side::North | Side::South => grid.width() / 2,
                Side::East | Side::West => grid.height() / 2,
            });
            grid.inward_of(side, grid.edge_tile(side, offset))
        }
        None => fallback.unwrap_or_else(|| grid.center()),
    };
    nearest_open_tile(grid, preferred).unwrap_or(preferred)
}

/// Random-walk cave carving used underground.
pub(super) fn carve_cavern<R: Rng + ?Sized>(grid: &mut Grid, steps: u32, rng: &mut R) {
    let (width, height) = (grid.width(), grid.height());
    if width < 3 || height < 3 {
        return;
    }
    let mut cursor = grid.center();
    grid.set(cursor, Tile::Floor);
    for _ in 0..steps {
        let side = Side::ALL[rng.gen_range(0..Side::ALL.len())];
        let (dx, dy) = side.delta();
        let x = (cursor.x as i64 + i64::from(dx)).clamp(1, i64::from(width) - 2);
        let y = (cursor.y as i64 + i64::from(dy)).clamp(1, i64::from(height) - 2);
        cursor = TilePos::new(x as u32, y as u32);
        grid.set(cursor, Tile::Floor);
    }
}
