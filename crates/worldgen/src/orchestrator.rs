use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::board::{convert_board_to_grid, presentation_from_board, BoardStore};
use crate::connections::ZoneExits;
use crate::content::ContentRegistry;
use crate::coord::{Dimension, Side, ZoneCoordinate};
use crate::generator::{
    entry_position, nearest_open_tile, open_arrival, reopen_exits, GenerationContext,
    GenerationRequest, ZoneGenerator,
};
use crate::live::{LivePlayer, LiveZone};
use crate::session::GameSession;
use crate::state::{TransitionDescriptor, TransitionSource};
use crate::tile::{PortKind, Tile};
use crate::zone::{Grid, Presentation, ReturnPoint, TilePos, ZoneData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneEntryRequest {
    pub coord: ZoneCoordinate,
    /// Side of the target zone the player walks in through.
    pub incoming: Option<Side>,
    /// Explicit arrival tile, e.g. a stored return point.
    pub arrival: Option<TilePos>,
}

impl ZoneEntryRequest {
    pub fn new(coord: ZoneCoordinate) -> Self {
        Self {
            coord,
            incoming: None,
            arrival: None,
        }
    }

    /// Target derived from the player's world position.
    pub fn from_player(x: i32, y: i32, dimension: Dimension, depth: u32) -> Self {
        Self::new(ZoneCoordinate::new(x, y, dimension, depth))
    }

    /// Walking off `side` of `from` into its neighbor.
    pub fn crossing(from: ZoneCoordinate, side: Side) -> Self {
        Self::new(from.neighbor(side)).through(side.opposite())
    }

    pub fn back_to_surface(point: ReturnPoint) -> Self {
        Self::new(ZoneCoordinate::surface(point.zone_x, point.zone_y)).arriving_at(point.pos)
    }

    pub fn back_to_interior(point: ReturnPoint) -> Self {
        Self::new(ZoneCoordinate::interior(point.zone_x, point.zone_y)).arriving_at(point.pos)
    }

    pub fn through(mut self, side: Side) -> Self {
        self.incoming = Some(side);
        self
    }

    pub fn arriving_at(mut self, pos: TilePos) -> Self {
        self.arrival = Some(pos);
        self
    }
}

/// Where the entered zone's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneSource {
    Cache,
    /// Cached, with presentation re-derived from its board.
    Repaired,
    Board,
    Generated,
    /// Generation failed; a blank zone was installed and not cached.
    Degraded,
    /// The entry itself failed; see `enter_zone_or_fallback`.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmergencePatch {
    NotNeeded,
    Applied { pos: TilePos, port: PortKind },
    Skipped { pos: TilePos, found: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneEntry {
    pub coord: ZoneCoordinate,
    pub source: ZoneSource,
    pub level: u8,
    pub player: LivePlayer,
    pub transition: Option<TransitionDescriptor>,
    pub emergence: EmergencePatch,
}

#[derive(Debug, Error)]
pub enum ZoneLoadError {
    #[error("content registry is not initialized; zones cannot be entered yet")]
    RegistryNotReady,
    #[error("zone {zone} was missing from the cache but storing it was refused")]
    CacheConflict { zone: ZoneCoordinate },
    #[error("arrival tile {x},{y} is outside zone {zone}")]
    ArrivalOutOfBounds { zone: ZoneCoordinate, x: u32, y: u32 },
}

struct Resolved {
    zone: ZoneData,
    source: ZoneSource,
    /// Arrival computed by the generator for the requested incoming side.
    entry: Option<TilePos>,
}

/// Single entry point for moving the player into a zone. Owns no state of
/// its own; everything it reads or writes lives in the session, the board
/// store and the registry.
#[derive(Debug, Clone, Default)]
pub struct ZoneOrchestrator {
    generator: ZoneGenerator,
}

impl ZoneOrchestrator {
    pub fn new(generator: ZoneGenerator) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &ZoneGenerator {
        &self.generator
    }

    /// Resolves the target zone through cache, board and generator, installs
    /// it as the live zone and places the player.
    ///
    /// The arrival bounds check runs after resolution, so a freshly built
    /// zone is cached even when the request is then rejected.
    pub fn enter_zone(
        &self,
        session: &mut GameSession,
        registry: &ContentRegistry,
        boards: &mut BoardStore,
        request: ZoneEntryRequest,
    ) -> Result<ZoneEntry, ZoneLoadError> {
        if !registry.is_initialized() {
            return Err(ZoneLoadError::RegistryNotReady);
        }
        let coord = request.coord;
        // Only read here; the descriptor is consumed once the zone is installed
        // so a refused entry can be retried with it.
        let transition = session.state.pending_transition().copied();
        session
            .connections
            .generate_chunk_connections(coord, &session.config, &mut session.rng);

        let resolved = match session.repository.get(&coord).cloned() {
            Some(cached) => resolve_cached(session, boards, coord, cached),
            None => self.resolve_miss(session, registry, boards, &request, transition.as_ref())?,
        };
        if let Some(arrival) = request.arrival {
            if resolved.zone.grid.get(arrival).is_none() {
                return Err(ZoneLoadError::ArrivalOutOfBounds {
                    zone: coord,
                    x: arrival.x,
                    y: arrival.y,
                });
            }
        }

        session.state.take_pending_transition();
        session.state.on_zone_transition();

        let mut live = LiveZone::install(coord, &resolved.zone, &session.defeated);
        reopen_forced_exits(&mut live, &session.connections.forced_sides(coord));
        let fresh = session.take_fresh_start();
        let exits = session.connections.exits(coord);
        live.player = place_player(
            &live.grid,
            &resolved,
            &request,
            transition.as_ref(),
            fresh,
            exits.as_ref(),
        );

        let emergence = patch_emergence(
            &mut live.grid,
            Some(&mut live.presentation),
            transition.as_ref(),
        );
        if let EmergencePatch::Skipped { pos, found } = &emergence {
            warn!(zone = %coord, x = pos.x, y = pos.y, found = %found, "emergence_patch_skipped");
        }
        relocate_if_blocked(&mut live);

        let entry = ZoneEntry {
            coord,
            source: resolved.source,
            level: live.level,
            player: live.player,
            transition,
            emergence,
        };
        info!(
            zone = %coord,
            source = ?entry.source,
            level = entry.level,
            enemies = live.enemies.len(),
            cached_zones = session.repository.len(),
            "zone_entered"
        );
        session.live = Some(live);
        Ok(entry)
    }

    /// Like `enter_zone`, but never leaves the player without a zone: on
    /// error a blank zone is installed. The blank zone is not cached.
    pub fn enter_zone_or_fallback(
        &self,
        session: &mut GameSession,
        registry: &ContentRegistry,
        boards: &mut BoardStore,
        request: ZoneEntryRequest,
    ) -> ZoneEntry {
        match self.enter_zone(session, registry, boards, request) {
            Ok(entry) => entry,
            Err(err) => {
                error!(zone = %request.coord, error = %err, "zone_entry_failed_using_fallback");
                let zone = ZoneData::blank(session.config.grid_size);
                let live = LiveZone::install(request.coord, &zone, &session.defeated);
                let entry = ZoneEntry {
                    coord: request.coord,
                    source: ZoneSource::Fallback,
                    level: live.level,
                    player: live.player,
                    transition: None,
                    emergence: EmergencePatch::NotNeeded,
                };
                session.live = Some(live);
                entry
            }
        }
    }

    fn resolve_miss(
        &self,
        session: &mut GameSession,
        registry: &ContentRegistry,
        boards: &mut BoardStore,
        request: &ZoneEntryRequest,
        transition: Option<&TransitionDescriptor>,
    ) -> Result<Resolved, ZoneLoadError> {
        let coord = request.coord;
        let board_name = boards.board_at(&coord).map(|(name, _)| name.to_string());
        let from_board = board_name.and_then(|name| {
            match boards
                .load_board(&name)
                .and_then(|board| convert_board_to_grid(board, &coord))
            {
                Ok(zone) => Some(zone),
                Err(err) => {
                    error!(zone = %coord, board = %name, error = %err, "board_fallback_to_procedural");
                    None
                }
            }
        });

        let mut resolved = match from_board {
            Some(zone) => Resolved {
                zone,
                source: ZoneSource::Board,
                entry: None,
            },
            None => self.generate(session, registry, boards, request, transition),
        };

        attach_return_point(&mut resolved.zone, transition);
        // A fresh entry records its emergence port; revisits only patch the live copy.
        let zone = &mut resolved.zone;
        patch_emergence(&mut zone.grid, zone.presentation.as_mut(), transition);

        if resolved.source == ZoneSource::Degraded {
            return Ok(resolved);
        }
        if !session.repository.set(&coord, resolved.zone.clone()) {
            return Err(ZoneLoadError::CacheConflict { zone: coord });
        }
        debug!(zone = %coord, source = ?resolved.source, "zone_cached");
        Ok(resolved)
    }

    fn generate(
        &self,
        session: &mut GameSession,
        registry: &ContentRegistry,
        boards: &mut BoardStore,
        request: &ZoneEntryRequest,
        transition: Option<&TransitionDescriptor>,
    ) -> Resolved {
        let coord = request.coord;
        let outcome = {
            let mut ctx = GenerationContext {
                config: &session.config,
                registry,
                repository: &session.repository,
                boards: &*boards,
                connections: &mut session.connections,
                flags: &mut session.flags,
                rng: &mut session.rng,
            };
            self.generator.generate(
                &GenerationRequest {
                    coord,
                    incoming: request.incoming,
                },
                &mut ctx,
            )
        };
        for claim in &outcome.claims {
            boards.register_board_at(claim.coord(), &claim.board, claim.kind);
            session.flags.record_claim(claim.clone());
        }

        let mut zone = outcome.zone;
        if let Some(descriptor) = transition.filter(|t| t.from.emergence_port().is_some()) {
            let pos = clamp_to_grid(&zone.grid, descriptor.pos());
            if !open_arrival(&mut zone.grid, pos) {
                warn!(zone = %coord, x = pos.x, y = pos.y, "vertical_arrival_unreachable");
            }
            zone.enemies.retain(|enemy| enemy.pos != pos);
            zone.presentation = Some(Presentation::from_grid(&zone.grid));
        }
        Resolved {
            zone,
            source: if outcome.degraded {
                ZoneSource::Degraded
            } else {
                ZoneSource::Generated
            },
            entry: Some(outcome.entry),
        }
    }
}

/// Cache hit. A board-backed entry without presentation maps is refilled
/// from its board; tiles, enemies and spawn stay exactly as cached.
fn resolve_cached(
    session: &mut GameSession,
    boards: &mut BoardStore,
    coord: ZoneCoordinate,
    mut cached: ZoneData,
) -> Resolved {
    let hit = |zone| Resolved {
        zone,
        source: ZoneSource::Cache,
        entry: None,
    };
    if cached.presentation.is_some() {
        return hit(cached);
    }
    let Some(name) = boards.board_at(&coord).map(|(name, _)| name.to_string()) else {
        return hit(cached);
    };
    match boards.load_board(&name) {
        Ok(board) => {
            cached.presentation = Some(presentation_from_board(board));
            session.repository.replace_repaired(&coord, cached.clone());
            info!(zone = %coord, board = %name, "zone_presentation_repaired");
            Resolved {
                zone: cached,
                source: ZoneSource::Repaired,
                entry: None,
            }
        }
        Err(err) => {
            warn!(zone = %coord, board = %name, error = %err, "zone_repair_skipped");
            hit(cached)
        }
    }
}

fn attach_return_point(zone: &mut ZoneData, transition: Option<&TransitionDescriptor>) {
    let Some(descriptor) = transition else {
        return;
    };
    let (Some(zone_x), Some(zone_y)) = (descriptor.zone_x, descriptor.zone_y) else {
        return;
    };
    let point = ReturnPoint {
        zone_x,
        zone_y,
        pos: descriptor.pos(),
    };
    match descriptor.from_dimension {
        Some(Dimension::Surface) => zone.return_to_surface = Some(point),
        Some(Dimension::Interior) => zone.return_to_interior = Some(point),
        Some(Dimension::Underground) | None => {}
    }
}

fn place_player(
    grid: &Grid,
    resolved: &Resolved,
    request: &ZoneEntryRequest,
    transition: Option<&TransitionDescriptor>,
    fresh: bool,
    exits: Option<&ZoneExits>,
) -> LivePlayer {
    let spawn = resolved.zone.player_spawn;
    if let Some(arrival) = request.arrival {
        return LivePlayer::at(arrival);
    }
    if let Some(descriptor) = transition {
        return match descriptor.from {
            TransitionSource::Interior => LivePlayer::at(spawn.unwrap_or_else(|| grid.center())),
            _ => LivePlayer::at(clamp_to_grid(grid, descriptor.pos())),
        };
    }
    if fresh {
        return slide_in(grid, spawn.unwrap_or_else(|| grid.center()));
    }
    let pos = resolved
        .entry
        .unwrap_or_else(|| entry_position(grid, request.incoming, exits, spawn));
    LivePlayer::at(pos)
}

/// New-game placement: one tile beyond the grid edge closest to the spawn,
/// sliding in towards it.
fn slide_in(grid: &Grid, spawn: TilePos) -> LivePlayer {
    let (width, height) = (grid.width() as i32, grid.height() as i32);
    let (x, y) = (spawn.x as i32, spawn.y as i32);
    let distance = |side: Side| match side {
        Side::West => x,
        Side::East => width - 1 - x,
        Side::North => y,
        Side::South => height - 1 - y,
    };
    let side = Side::ALL
        .into_iter()
        .min_by_key(|side| distance(*side))
        .unwrap_or(Side::South);
    let position = match side {
        Side::West => (-1, y),
        Side::East => (width, y),
        Side::North => (x, -1),
        Side::South => (x, height),
    };
    LivePlayer {
        position,
        slide_target: Some(spawn),
    }
}

fn clamp_to_grid(grid: &Grid, pos: TilePos) -> TilePos {
    TilePos::new(
        pos.x.min(grid.width().saturating_sub(1)),
        pos.y.min(grid.height().saturating_sub(1)),
    )
}

/// Puts the return port under a vertical arrival. Only bare ground or the
/// matching port is accepted; anything else is left alone.
fn patch_emergence(
    grid: &mut Grid,
    presentation: Option<&mut Presentation>,
    transition: Option<&TransitionDescriptor>,
) -> EmergencePatch {
    let Some(descriptor) = transition else {
        return EmergencePatch::NotNeeded;
    };
    let Some(port) = descriptor.from.emergence_port() else {
        return EmergencePatch::NotNeeded;
    };
    let pos = clamp_to_grid(grid, descriptor.pos());
    let wanted = Tile::port(port);
    match grid.get(pos) {
        Some(tile) if *tile == wanted => {}
        Some(tile) if tile.is_open_ground() => {
            grid.set(pos, wanted.clone());
        }
        Some(tile) => {
            return EmergencePatch::Skipped {
                pos,
                found: tile.texture_id(),
            }
        }
        None => {
            return EmergencePatch::Skipped {
                pos,
                found: String::new(),
            }
        }
    }
    if let Some(presentation) = presentation {
        presentation
            .terrain_textures
            .insert(pos.key(), wanted.texture_id());
    }
    EmergencePatch::Applied { pos, port }
}

/// An edge forced open after this zone was cached has no exit in the cached
/// grid. The live copy gets it cut in; the cache entry stays as stored.
fn reopen_forced_exits(live: &mut LiveZone, forced: &[(Side, u32)]) {
    if forced.is_empty() || live.coord.dimension == Dimension::Interior {
        return;
    }
    let before = live.grid.clone();
    let reopened = reopen_exits(&mut live.grid, forced);
    if reopened.is_empty() {
        return;
    }
    for pos in live.grid.positions().collect::<Vec<_>>() {
        if let Some(tile) = live.grid.get(pos).filter(|tile| before.get(pos) != Some(*tile)) {
            live.presentation
                .terrain_textures
                .insert(pos.key(), tile.texture_id());
        }
    }
    info!(zone = %live.coord, sides = ?reopened, "forced_exits_reopened");
}

fn relocate_if_blocked(live: &mut LiveZone) {
    let Some(tile) = live.player.tile() else {
        return;
    };
    if live.grid.get(tile).is_some_and(Tile::is_passable) {
        return;
    }
    if let Some(open) = nearest_open_tile(&live.grid, tile) {
        debug!(zone = %live.coord, x = open.x, y = open.y, "arrival_relocated");
        live.player = LivePlayer::at(open);
    }
}
