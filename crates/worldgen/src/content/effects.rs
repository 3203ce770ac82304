use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::coord::{Dimension, ZoneCoordinate};
use crate::repository::DefeatedEnemySet;
use crate::state::{ChargeSelection, TransitionDescriptor, TransitionSource, ZoneStateManager};
use crate::tile::{PortKind, Tile};
use crate::zone::{EnemyId, EnemySpawn, Grid, TilePos};

pub const VITAL_CAP: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerVitals {
    pub hearts: u32,
    pub max_hearts: u32,
    pub hunger: u32,
    pub thirst: u32,
}

impl Default for PlayerVitals {
    fn default() -> Self {
        Self {
            hearts: 3,
            max_hearts: 3,
            hunger: VITAL_CAP,
            thirst: VITAL_CAP,
        }
    }
}

/// Everything an effect may touch when it fires.
pub struct EffectContext<'a> {
    pub vitals: &'a mut PlayerVitals,
    pub state: &'a mut ZoneStateManager,
    pub grid: &'a mut Grid,
    /// Live enemies of the zone; anything removed here must also land in
    /// `defeated`.
    pub enemies: &'a mut Vec<EnemySpawn>,
    pub defeated: &'a mut DefeatedEnemySet,
    pub zone: ZoneCoordinate,
    pub player: TilePos,
}

impl EffectContext<'_> {
    /// Takes the enemy standing on `pos` out of the zone for good.
    fn defeat_enemy_at(&mut self, pos: TilePos) -> Option<EnemyId> {
        let index = self.enemies.iter().position(|enemy| enemy.pos == pos)?;
        let enemy = self.enemies.remove(index);
        self.defeated.insert(enemy.id.clone());
        info!(zone = %self.zone, enemy = %enemy.id, kind = %enemy.kind, "enemy_defeated");
        Some(enemy.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectOutcome {
    /// The item stack loses one.
    Consumed,
    /// The item did something but stays in the inventory.
    Used,
    /// Nothing happened yet; the player must pick a target next turn.
    AwaitingTarget,
    Read(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectError {
    #[error("target {x},{y} is outside the radial pattern of the player")]
    OutOfReach { x: u32, y: u32 },
    #[error("target {x},{y} is not open ground")]
    Blocked { x: u32, y: u32 },
    #[error("cannot dig in the {dimension} dimension")]
    CannotDig { dimension: Dimension },
    #[error("unknown effect id '{0}'")]
    UnknownEffect(String),
    #[error("no zone is active, or the player is still outside it")]
    NoActiveZone,
    #[error("no bomb is armed; use it from the inventory first")]
    BombNotArmed,
}

/// Behavior attached to an item. Callers decide once which mode applies:
/// a direct use from the inventory, or a use aimed at a tile chosen from the
/// radial menu around the player.
pub trait ItemEffect {
    fn apply_direct(&self, ctx: &mut EffectContext<'_>) -> Result<EffectOutcome, EffectError>;

    fn apply_from_radial(
        &self,
        ctx: &mut EffectContext<'_>,
        target: TilePos,
    ) -> Result<EffectOutcome, EffectError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectKind {
    Food { hunger: u32 },
    Water { thirst: u32 },
    Heal { hearts: u32 },
    Bomb,
    Bow { range: u32 },
    Shovel,
    Note { text: String },
}

impl EffectKind {
    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Food { hunger } => write!(f, "food:{hunger}"),
            Self::Water { thirst } => write!(f, "water:{thirst}"),
            Self::Heal { hearts } => write!(f, "heal:{hearts}"),
            Self::Bomb => f.write_str("bomb"),
            Self::Bow { range } => write!(f, "bow:{range}"),
            Self::Shovel => f.write_str("shovel"),
            Self::Note { text } => write!(f, "note:{text}"),
        }
    }
}

impl FromStr for EffectKind {
    type Err = EffectError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match raw.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg.trim())),
            None => (raw.trim(), None),
        };
        let amount = |default: u32| -> Result<u32, EffectError> {
            match arg {
                Some(value) => value
                    .parse::<u32>()
                    .map_err(|_| EffectError::UnknownEffect(raw.to_string())),
                None => Ok(default),
            }
        };
        match name {
            "food" => Ok(Self::Food { hunger: amount(10)? }),
            "water" => Ok(Self::Water { thirst: amount(10)? }),
            "heal" => Ok(Self::Heal { hearts: amount(1)? }),
            "bomb" => Ok(Self::Bomb),
            "bow" => Ok(Self::Bow { range: amount(3)? }),
            "shovel" => Ok(Self::Shovel),
            "note" => Ok(Self::Note {
                text: arg.unwrap_or_default().to_string(),
            }),
            _ => Err(EffectError::UnknownEffect(raw.to_string())),
        }
    }
}

/// Tiles in the square rings `1..=radius` around `center`, clipped to the grid.
/// Every aimed item resolves its candidate targets through this.
pub fn radial_pattern(grid: &Grid, center: TilePos, radius: u32) -> Vec<TilePos> {
    let radius = radius as i64;
    let mut targets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx == 0 && dy == 0 {
                continue;
            }
            let x = center.x as i64 + dx;
            let y = center.y as i64 + dy;
            if grid.contains(x, y) {
                targets.push(TilePos::new(x as u32, y as u32));
            }
        }
    }
    targets
}

fn require_in_pattern(
    grid: &Grid,
    center: TilePos,
    radius: u32,
    target: TilePos,
) -> Result<(), EffectError> {
    if radial_pattern(grid, center, radius).contains(&target) {
        Ok(())
    } else {
        Err(EffectError::OutOfReach {
            x: target.x,
            y: target.y,
        })
    }
}

fn require_open_ground(grid: &Grid, target: TilePos) -> Result<(), EffectError> {
    match grid.get(target) {
        Some(tile) if tile.is_open_ground() => Ok(()),
        _ => Err(EffectError::Blocked {
            x: target.x,
            y: target.y,
        }),
    }
}

fn restore(value: &mut u32, amount: u32, cap: u32) {
    *value = value.saturating_add(amount).min(cap);
}

impl ItemEffect for EffectKind {
    fn apply_direct(&self, ctx: &mut EffectContext<'_>) -> Result<EffectOutcome, EffectError> {
        match self {
            Self::Food { hunger } => {
                restore(&mut ctx.vitals.hunger, *hunger, VITAL_CAP);
                Ok(EffectOutcome::Consumed)
            }
            Self::Water { thirst } => {
                restore(&mut ctx.vitals.thirst, *thirst, VITAL_CAP);
                Ok(EffectOutcome::Consumed)
            }
            Self::Heal { hearts } => {
                let cap = ctx.vitals.max_hearts;
                restore(&mut ctx.vitals.hearts, *hearts, cap);
                Ok(EffectOutcome::Consumed)
            }
            Self::Bomb => {
                ctx.state.begin_bomb_placement();
                Ok(EffectOutcome::AwaitingTarget)
            }
            Self::Bow { range } => {
                ctx.state.select_charge(ChargeSelection {
                    item_id: "bow".to_string(),
                    range: *range,
                });
                Ok(EffectOutcome::AwaitingTarget)
            }
            Self::Shovel => {
                if ctx.zone.dimension == Dimension::Interior {
                    return Err(EffectError::CannotDig {
                        dimension: ctx.zone.dimension,
                    });
                }
                require_open_ground(ctx.grid, ctx.player)?;
                ctx.grid.set(ctx.player, Tile::port(PortKind::Hole));
                ctx.state.set_pending_transition(TransitionDescriptor {
                    from: TransitionSource::Hole,
                    x: ctx.player.x,
                    y: ctx.player.y,
                    from_dimension: Some(ctx.zone.dimension),
                    zone_x: Some(ctx.zone.x),
                    zone_y: Some(ctx.zone.y),
                });
                Ok(EffectOutcome::Used)
            }
            Self::Note { text } => Ok(EffectOutcome::Read(text.clone())),
        }
    }

    fn apply_from_radial(
        &self,
        ctx: &mut EffectContext<'_>,
        target: TilePos,
    ) -> Result<EffectOutcome, EffectError> {
        match self {
            Self::Bomb => {
                if !ctx.state.bomb_placement_active() {
                    return Err(EffectError::BombNotArmed);
                }
                require_in_pattern(ctx.grid, ctx.player, 1, target)?;
                require_open_ground(ctx.grid, target)?;
                ctx.grid.set(
                    target,
                    Tile::Bomb {
                        actions_since_placed: 0,
                    },
                );
                ctx.state.place_bomb(target);
                Ok(EffectOutcome::Consumed)
            }
            Self::Bow { range } => {
                require_in_pattern(ctx.grid, ctx.player, *range, target)?;
                ctx.state.clear_charge();
                ctx.state.mark_player_attacked();
                if ctx.defeat_enemy_at(target).is_none() {
                    debug!(zone = %ctx.zone, x = target.x, y = target.y, "arrow_missed");
                }
                Ok(EffectOutcome::Used)
            }
            Self::Shovel => {
                if ctx.zone.dimension == Dimension::Interior {
                    return Err(EffectError::CannotDig {
                        dimension: ctx.zone.dimension,
                    });
                }
                require_in_pattern(ctx.grid, ctx.player, 1, target)?;
                require_open_ground(ctx.grid, target)?;
                ctx.grid.set(target, Tile::port(PortKind::Hole));
                Ok(EffectOutcome::Used)
            }
            Self::Food { .. } | Self::Water { .. } | Self::Heal { .. } | Self::Note { .. } => {
                self.apply_direct(ctx)
            }
        }
    }
}
