use tracing::{debug, info, warn};

use crate::content::radial_pattern;
use crate::coord::ZoneCoordinate;
use crate::repository::DefeatedEnemySet;
use crate::state::ZoneStateManager;
use crate::tile::Tile;
use crate::zone::{EnemyId, EnemySpawn, Grid, Presentation, TilePos, ZoneData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcInstance {
    pub id: String,
    pub pos: TilePos,
}

/// Player placement in zone space. The position may sit one tile outside
/// the grid while a slide-in entrance plays towards `slide_target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivePlayer {
    pub position: (i32, i32),
    pub slide_target: Option<TilePos>,
}

impl LivePlayer {
    pub fn at(pos: TilePos) -> Self {
        Self {
            position: (pos.x as i32, pos.y as i32),
            slide_target: None,
        }
    }

    pub fn tile(&self) -> Option<TilePos> {
        let (x, y) = self.position;
        Some(TilePos::new(u32::try_from(x).ok()?, u32::try_from(y).ok()?))
    }

    /// Finishes the entrance slide, if one is pending.
    pub fn settle(&mut self) {
        if let Some(target) = self.slide_target.take() {
            self.position = (target.x as i32, target.y as i32);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BombBlast {
    pub origin: TilePos,
    pub cleared: Vec<TilePos>,
    pub defeated: Vec<EnemyId>,
    pub player_hit: bool,
}

/// The zone the player is currently standing in. Built from a cached
/// `ZoneData` and then mutated freely by play; the cache entry is untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveZone {
    pub coord: ZoneCoordinate,
    pub grid: Grid,
    pub presentation: Presentation,
    pub enemies: Vec<EnemySpawn>,
    pub npcs: Vec<NpcInstance>,
    pub player: LivePlayer,
    pub level: u8,
}

impl LiveZone {
    /// Installs a zone: copies its grid and presentation, keeps only enemies
    /// that are still alive and rebuilds NPCs from the grid.
    pub fn install(coord: ZoneCoordinate, zone: &ZoneData, defeated: &DefeatedEnemySet) -> Self {
        let presentation = zone
            .presentation
            .clone()
            .unwrap_or_else(|| Presentation::from_grid(&zone.grid));
        let enemies = defeated.filter_alive(&zone.enemies);
        let filtered = zone.enemies.len() - enemies.len();
        if filtered > 0 {
            debug!(zone = %coord, filtered, "defeated_enemies_filtered");
        }
        let npcs = npcs_from_grid(&zone.grid);
        let spawn = zone.player_spawn.unwrap_or_else(|| zone.grid.center());
        Self {
            coord,
            grid: zone.grid.clone(),
            presentation,
            enemies,
            npcs,
            player: LivePlayer::at(spawn),
            level: zone.level,
        }
    }

    pub fn enemy_at(&self, pos: TilePos) -> Option<&EnemySpawn> {
        self.enemies.iter().find(|enemy| enemy.pos == pos)
    }

    pub fn remove_enemy(&mut self, id: &EnemyId) -> Option<EnemySpawn> {
        let index = self.enemies.iter().position(|enemy| &enemy.id == id)?;
        Some(self.enemies.remove(index))
    }

    /// Advances every pending bomb by one action. Bombs whose fuse has run
    /// out explode over the radius-1 pattern around them.
    pub fn tick_bombs(&mut self, state: &mut ZoneStateManager, fuse: u32) -> Vec<BombBlast> {
        let mut blasts = Vec::new();
        let pending = state.pending_bomb_positions().to_vec();
        for pos in pending {
            let actions = match self.grid.get_mut(pos) {
                Some(Tile::Bomb {
                    actions_since_placed,
                }) => {
                    *actions_since_placed += 1;
                    *actions_since_placed
                }
                _ => {
                    warn!(zone = %self.coord, x = pos.x, y = pos.y, "pending_bomb_missing");
                    state.clear_bomb(pos);
                    continue;
                }
            };
            if actions >= fuse {
                state.clear_bomb(pos);
                blasts.push(self.explode(pos));
            }
        }
        blasts
    }

    fn explode(&mut self, origin: TilePos) -> BombBlast {
        let mut area = radial_pattern(&self.grid, origin, 1);
        area.push(origin);

        let mut cleared = Vec::new();
        for pos in &area {
            if let Some(tile) = self.grid.get_mut(*pos) {
                if tile.is_clearable() || matches!(tile, Tile::Bomb { .. }) {
                    *tile = Tile::Floor;
                    cleared.push(*pos);
                }
            }
        }

        let (caught, spared): (Vec<_>, Vec<_>) = self
            .enemies
            .drain(..)
            .partition(|enemy| area.contains(&enemy.pos));
        self.enemies = spared;
        let defeated = caught.into_iter().map(|enemy| enemy.id).collect::<Vec<_>>();
        let player_hit = self.player.tile().is_some_and(|tile| area.contains(&tile));

        info!(
            zone = %self.coord,
            x = origin.x,
            y = origin.y,
            defeated = defeated.len(),
            player_hit,
            "bomb_exploded"
        );
        BombBlast {
            origin,
            cleared,
            defeated,
            player_hit,
        }
    }
}

fn npcs_from_grid(grid: &Grid) -> Vec<NpcInstance> {
    grid.positions()
        .filter_map(|pos| match grid.get(pos) {
            Some(Tile::Npc { id }) => Some(NpcInstance {
                id: id.clone(),
                pos,
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone_with_enemies() -> (ZoneCoordinate, ZoneData) {
        let coord = ZoneCoordinate::surface(1, 1);
        let mut zone = ZoneData::blank(9);
        for (kind, pos) in [("rat", TilePos::new(3, 3)), ("wolf", TilePos::new(7, 7))] {
            zone.enemies.push(EnemySpawn {
                id: EnemyId::for_spawn(&coord, kind, pos),
                kind: kind.to_string(),
                pos,
            });
        }
        zone.grid.set(TilePos::new(2, 6), Tile::npc("hermit"));
        (coord, zone)
    }

    #[test]
    fn install_filters_defeated_and_finds_npcs() {
        let (coord, zone) = zone_with_enemies();
        let mut defeated = DefeatedEnemySet::new();
        defeated.insert(zone.enemies[0].id.clone());
        let live = LiveZone::install(coord, &zone, &defeated);
        assert_eq!(live.enemies.len(), 1);
        assert_eq!(live.enemies[0].kind, "wolf");
        assert_eq!(
            live.npcs,
            vec![NpcInstance {
                id: "hermit".to_string(),
                pos: TilePos::new(2, 6)
            }]
        );
        assert_eq!(live.player.tile(), Some(TilePos::new(4, 4)));
    }

    #[test]
    fn bomb_explodes_after_fuse_and_catches_adjacent_enemies() {
        let (coord, zone) = zone_with_enemies();
        let mut live = LiveZone::install(coord, &zone, &DefeatedEnemySet::new());
        let mut state = ZoneStateManager::default();
        let bomb = TilePos::new(3, 4);
        live.grid.set(
            bomb,
            Tile::Bomb {
                actions_since_placed: 0,
            },
        );
        live.grid.set(TilePos::new(2, 5), Tile::Rock);
        state.place_bomb(bomb);

        assert!(live.tick_bombs(&mut state, 2).is_empty());
        let blasts = live.tick_bombs(&mut state, 2);
        assert_eq!(blasts.len(), 1);
        let blast = &blasts[0];
        assert_eq!(blast.defeated.len(), 1);
        assert!(blast.player_hit);
        assert_eq!(live.grid.get(TilePos::new(2, 5)), Some(&Tile::Floor));
        assert_eq!(live.grid.get(bomb), Some(&Tile::Floor));
        assert_eq!(live.enemies.len(), 1);
        assert!(state.pending_bomb_positions().is_empty());
    }

    #[test]
    fn off_grid_player_has_no_tile_until_settled() {
        let mut player = LivePlayer {
            position: (-1, 4),
            slide_target: Some(TilePos::new(0, 4)),
        };
        assert_eq!(player.tile(), None);
        player.settle();
        assert_eq!(player.tile(), Some(TilePos::new(0, 4)));
    }
}
