use tracing::debug;

use crate::coord::ZoneCoordinate;
use crate::tile::Tile;
use crate::zone::{parse_pos_key, EnemyId, EnemySpawn, Grid, Presentation, ZoneData};

use super::format::{BoardError, BoardFile};

const SPAWN_FEATURES: [&str; 2] = ["spawn", "player_spawn"];

/// Presentation maps of an authored board. The repair path uses this alone
/// so it can refill a stale cache entry without touching its tiles.
pub fn presentation_from_board(board: &BoardFile) -> Presentation {
    let width = board.width().max(1);
    let terrain_textures = board
        .terrain
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let x = index as u32 % width;
            let y = index as u32 / width;
            (format!("{x},{y}"), raw.to_tile().texture_id())
        })
        .collect();
    Presentation {
        terrain_textures,
        overlay_textures: board.overlays.clone(),
        rotations: board.rotations.clone(),
        overlay_rotations: board.overlay_rotations.clone(),
    }
}

/// Turns an authored board into the same shape procedural generation
/// produces. Pure: no registry, store or rng involved.
pub fn convert_board_to_grid(
    board: &BoardFile,
    zone: &ZoneCoordinate,
) -> Result<ZoneData, BoardError> {
    board.validate()?;
    let tiles = board.terrain.iter().map(|raw| raw.to_tile()).collect();
    let mut grid = Grid::from_tiles(board.width(), board.height(), tiles).map_err(|error| {
        BoardError::Invalid {
            name: board.name.clone(),
            message: error.to_string(),
        }
    })?;

    let mut enemies = Vec::new();
    let mut feature_spawn = None;
    for (key, feature) in &board.features {
        // validate() already bounds-checked every key
        let Some(pos) = parse_pos_key(key) else {
            continue;
        };
        if SPAWN_FEATURES.contains(&feature.as_str()) {
            feature_spawn = Some(pos);
        } else if let Some(kind) = feature.strip_prefix("enemy:") {
            enemies.push(EnemySpawn {
                id: EnemyId::for_spawn(zone, kind, pos),
                kind: kind.to_string(),
                pos,
            });
        } else {
            grid.set(pos, Tile::from_tag(feature));
        }
    }

    let mut data = ZoneData::new(grid, board.authored_level().unwrap_or(1));
    data.presentation = Some(presentation_from_board(board));
    data.enemies = enemies;
    data.player_spawn = board.authored_spawn().or(feature_spawn);
    debug!(
        board = %board.name,
        zone = %zone,
        enemies = data.enemies.len(),
        "board_converted"
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::PortKind;
    use crate::zone::TilePos;

    fn museum() -> BoardFile {
        let mut terrain = vec!["\"floor\""; 81];
        terrain[0] = "\"wall\"";
        let raw = format!(
            r#"{{
                "name": "museum",
                "size": [9, 9],
                "terrain": [{}],
                "overlays": {{"2,2": "rug"}},
                "features": {{"4,4": "museum_case", "6,6": "enemy:ghost", "1,7": "stairdown"}},
                "rotations": {{"0,0": 180}},
                "metadata": {{"playerSpawn": [4, 7], "level": 2}}
            }}"#,
            terrain.join(",")
        );
        BoardFile::parse("museum", &raw).expect("museum")
    }

    #[test]
    fn features_overwrite_terrain_and_become_spawns() {
        let zone = ZoneCoordinate::interior(0, 0);
        let data = convert_board_to_grid(&museum(), &zone).expect("convert");

        assert_eq!(data.grid.get(TilePos::new(0, 0)), Some(&Tile::Wall));
        assert_eq!(
            data.grid.get(TilePos::new(4, 4)),
            Some(&Tile::from_tag("museum_case"))
        );
        assert_eq!(
            data.grid.get(TilePos::new(1, 7)),
            Some(&Tile::port(PortKind::StairDown))
        );
        assert_eq!(data.player_spawn, Some(TilePos::new(4, 7)));
        assert_eq!(data.level, 2);
        assert_eq!(data.enemies.len(), 1);
        assert_eq!(data.enemies[0].id, EnemyId::for_spawn(&zone, "ghost", TilePos::new(6, 6)));
    }

    #[test]
    fn presentation_mirrors_board_maps() {
        let presentation = presentation_from_board(&museum());
        assert_eq!(presentation.terrain_textures.len(), 81);
        assert_eq!(presentation.terrain_textures["0,0"], "wall");
        assert_eq!(presentation.overlay_textures["2,2"], "rug");
        assert_eq!(presentation.rotations["0,0"], 180);
    }

    #[test]
    fn conversion_is_deterministic() {
        let zone = ZoneCoordinate::interior(0, 0);
        let board = museum();
        assert_eq!(
            convert_board_to_grid(&board, &zone).expect("first"),
            convert_board_to_grid(&board, &zone).expect("second")
        );
    }
}
