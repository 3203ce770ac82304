use std::process::ExitCode;

use serde::Serialize;
use tracing::{error, info, warn};
use worldgen::{
    load_session, save_session, Dimension, EffectKind, PortKind, Side, Tile, TilePos,
    TransitionDescriptor, TransitionSource, ZoneCoordinate, ZoneEntry, ZoneEntryRequest,
};

use super::bootstrap::AppWiring;
use super::script::{expand_wander, Step};

const SAVE_FILE_NAME: &str = "session.json";

#[derive(Debug, Serialize)]
struct RunSummary {
    seed: u64,
    final_zone: String,
    level: u8,
    zones_cached: usize,
    defeated: usize,
    steps_taken: usize,
    steps_skipped: usize,
    hearts: u32,
}

pub(crate) fn run(mut app: AppWiring) -> ExitCode {
    let save_path = app.paths.saves_dir.join(SAVE_FILE_NAME);
    let (home_x, home_y) = app.session.config.home_zone;
    let mut start = ZoneCoordinate::surface(home_x, home_y);
    if app.resume && save_path.is_file() {
        match load_session(&mut app.session, &mut app.boards, &save_path) {
            Ok(current) => start = current.unwrap_or(start),
            Err(err) => {
                warn!(error = %err, "save_unreadable_starting_new_game");
                let seed = app.session.config.seed;
                app.session.new_game(seed);
            }
        }
    }
    enter(&mut app, ZoneEntryRequest::new(start));

    let steps = expand_wander(&app.script, app.session.seed());
    let mut skipped = 0usize;
    for step in &steps {
        if !perform(&mut app, *step) {
            skipped += 1;
        }
    }

    if let Err(err) = save_session(&app.session, &save_path) {
        error!(error = %err, "save_failed");
        return ExitCode::FAILURE;
    }

    let (final_zone, level) = app
        .session
        .live
        .as_ref()
        .map(|live| (live.coord.key(), live.level))
        .unwrap_or_default();
    let summary = RunSummary {
        seed: app.session.seed(),
        final_zone,
        level,
        zones_cached: app.session.repository.len(),
        defeated: app.session.defeated.len(),
        steps_taken: steps.len() - skipped,
        steps_skipped: skipped,
        hearts: app.session.vitals.hearts,
    };
    match serde_json::to_string_pretty(&summary) {
        Ok(text) => println!("{text}"),
        Err(err) => warn!(error = %err, "run_summary_encode_failed"),
    }
    ExitCode::SUCCESS
}

fn enter(app: &mut AppWiring, request: ZoneEntryRequest) -> ZoneEntry {
    let entry = app.orchestrator.enter_zone_or_fallback(
        &mut app.session,
        &app.registry,
        &mut app.boards,
        request,
    );
    // no renderer: slide-in entrances finish immediately
    if let Some(live) = app.session.live.as_mut() {
        live.player.settle();
    }
    entry
}

/// Runs one step. Returns `false` when the step could not apply where the
/// player stands.
fn perform(app: &mut AppWiring, step: Step) -> bool {
    let Some(live) = app.session.live.as_ref() else {
        return false;
    };
    let coord = live.coord;
    let Some(player) = live.player.tile() else {
        return false;
    };

    match step {
        Step::Walk(side) => walk(app, coord, side),
        Step::Dig => match app.session.use_item(&EffectKind::Shovel, None) {
            Ok(_) => match coord.below() {
                Some(below) => {
                    enter(app, ZoneEntryRequest::new(below));
                    true
                }
                None => false,
            },
            Err(err) => {
                warn!(zone = %coord, error = %err, "dig_failed");
                false
            }
        },
        Step::Climb => climb(app, coord, player),
        Step::Door => door(app, coord, player),
        Step::Wait { turns } => {
            for _ in 0..turns {
                let report = app.session.advance_turn();
                for blast in &report.blasts {
                    info!(
                        zone = %coord,
                        defeated = blast.defeated.len(),
                        player_hit = blast.player_hit,
                        "turn_blast"
                    );
                }
            }
            true
        }
        // expanded before the run starts
        Step::Wander { .. } => false,
    }
}

fn walk(app: &mut AppWiring, coord: ZoneCoordinate, side: Side) -> bool {
    if coord.dimension == Dimension::Interior {
        warn!(zone = %coord, "walk_blocked_indoors");
        return false;
    }
    let open = app
        .session
        .connections
        .exits(coord)
        .is_some_and(|exits| exits.side(side).is_some());
    if !open || coord.checked_neighbor(side).is_none() {
        warn!(zone = %coord, ?side, "edge_closed");
        return false;
    }
    enter(app, ZoneEntryRequest::crossing(coord, side));
    true
}

fn climb(app: &mut AppWiring, coord: ZoneCoordinate, player: TilePos) -> bool {
    if coord.dimension != Dimension::Underground {
        warn!(zone = %coord, "nothing_to_climb");
        return false;
    }
    if coord.depth > 1 {
        app.session.state.set_pending_transition(TransitionDescriptor {
            from: TransitionSource::StairUp,
            x: player.x,
            y: player.y,
            from_dimension: Some(Dimension::Underground),
            zone_x: Some(coord.x),
            zone_y: Some(coord.y),
        });
        enter(
            app,
            ZoneEntryRequest::new(ZoneCoordinate::underground(coord.x, coord.y, coord.depth - 1)),
        );
        return true;
    }
    let request = match app
        .session
        .repository
        .get(&coord)
        .and_then(|zone| zone.return_to_surface)
    {
        Some(point) => ZoneEntryRequest::back_to_surface(point),
        None => ZoneEntryRequest::new(ZoneCoordinate::surface(coord.x, coord.y)),
    };
    enter(app, request);
    true
}

fn door(app: &mut AppWiring, coord: ZoneCoordinate, player: TilePos) -> bool {
    match coord.dimension {
        Dimension::Surface => {
            let near_door = app.session.live.as_ref().is_some_and(|live| {
                live.grid.positions().any(|pos| {
                    pos.chebyshev(player) <= 1
                        && live.grid.get(pos) == Some(&Tile::port(PortKind::Door))
                })
            });
            if !near_door {
                warn!(zone = %coord, x = player.x, y = player.y, "door_not_in_reach");
                return false;
            }
            app.session.state.set_pending_transition(TransitionDescriptor {
                from: TransitionSource::Interior,
                x: player.x,
                y: player.y,
                from_dimension: Some(Dimension::Surface),
                zone_x: Some(coord.x),
                zone_y: Some(coord.y),
            });
            enter(app, ZoneEntryRequest::new(ZoneCoordinate::interior(coord.x, coord.y)));
            true
        }
        Dimension::Interior => {
            let request = match app
                .session
                .repository
                .get(&coord)
                .and_then(|zone| zone.return_to_surface)
            {
                Some(point) => ZoneEntryRequest::back_to_surface(point),
                None => ZoneEntryRequest::new(ZoneCoordinate::surface(coord.x, coord.y)),
            };
            enter(app, request);
            true
        }
        Dimension::Underground => false,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use worldgen::{
        AppPaths, BoardKind, BoardStore, ContentCategory, ContentDefinition, ContentRegistry,
        GameSession, MemoryBoardSource, WorldConfig, ZoneOrchestrator,
    };

    use super::*;

    fn home_board() -> String {
        let terrain = vec!["\"floor\""; 81].join(",");
        format!(
            r#"{{"name": "home", "size": [9, 9], "terrain": [{terrain}],
                "features": {{"4,8": "door"}}, "metadata": {{"playerSpawn": [4, 7]}}}}"#
        )
    }

    fn wiring() -> AppWiring {
        wiring_with(WorldConfig::default())
    }

    fn wiring_with(config: WorldConfig) -> AppWiring {
        let mut registry = ContentRegistry::new();
        registry
            .register_enemy(ContentDefinition::new("rat", ContentCategory::Enemy))
            .expect("rat");
        registry.mark_initialized();
        let mut boards = BoardStore::new(MemoryBoardSource::new().with_board("home", home_board()));
        boards.register_board(0, 0, Dimension::Interior, "home", BoardKind::Canon);
        let mut app = AppWiring {
            paths: AppPaths::from_root(Path::new("/nonexistent/wayfarer")),
            registry,
            boards,
            session: GameSession::new(config),
            orchestrator: ZoneOrchestrator::default(),
            script: Vec::new(),
            resume: false,
        };
        enter(&mut app, ZoneEntryRequest::new(ZoneCoordinate::surface(0, 0)));
        app
    }

    fn here(app: &AppWiring) -> (ZoneCoordinate, TilePos) {
        let live = app.session.live.as_ref().expect("live");
        (live.coord, live.player.tile().expect("on grid"))
    }

    #[test]
    fn door_round_trip_returns_to_the_same_tile() {
        let mut app = wiring();
        let (_, outside) = here(&app);

        assert!(perform(&mut app, Step::Door));
        assert_eq!(here(&app), (ZoneCoordinate::interior(0, 0), TilePos::new(4, 7)));

        assert!(perform(&mut app, Step::Door));
        assert_eq!(here(&app), (ZoneCoordinate::surface(0, 0), outside));
    }

    fn open_side(app: &AppWiring) -> Side {
        let (coord, _) = here(app);
        let exits = app.session.connections.exits(coord).expect("materialized");
        exits.open_sides().first().map(|(side, _)| *side).expect("an open side")
    }

    #[test]
    fn walking_follows_the_connection_graph() {
        // every rolled edge stays shut, so home keeps only its forced exit
        let mut app = wiring_with(WorldConfig {
            surface_edge_open_chance: 0.0,
            connection_retry_budget: 0,
            ..WorldConfig::default()
        });
        let (home, _) = here(&app);
        let exits = app.session.connections.exits(home).expect("materialized");
        let open = open_side(&app);
        let closed = Side::ALL
            .into_iter()
            .find(|side| exits.side(*side).is_none())
            .expect("a closed side");

        assert!(!perform(&mut app, Step::Walk(closed)));
        assert_eq!(here(&app).0, home);

        assert!(perform(&mut app, Step::Walk(open)));
        assert_eq!(here(&app).0, home.neighbor(open));
    }

    #[test]
    fn dig_then_climb_comes_back_through_the_hole() {
        let mut app = wiring();
        let side = open_side(&app);
        assert!(perform(&mut app, Step::Walk(side)));
        let (surface, dug_at) = here(&app);

        assert!(perform(&mut app, Step::Dig));
        let (below, arrived) = here(&app);
        assert_eq!(below, ZoneCoordinate::underground(surface.x, surface.y, 1));
        assert_eq!(arrived, dug_at);

        assert!(perform(&mut app, Step::Climb));
        assert_eq!(here(&app), (surface, dug_at));
    }

    #[test]
    fn indoor_walks_and_surface_climbs_are_skipped() {
        let mut app = wiring();
        assert!(!perform(&mut app, Step::Climb));
        assert!(perform(&mut app, Step::Door));
        assert!(!perform(&mut app, Step::Walk(Side::North)));
    }
}
