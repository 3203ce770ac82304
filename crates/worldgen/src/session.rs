use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::config::WorldConfig;
use crate::connections::ConnectionGraph;
use crate::content::{EffectContext, EffectError, EffectKind, EffectOutcome, ItemEffect, PlayerVitals};
use crate::flags::WorldFlags;
use crate::live::{BombBlast, LiveZone};
use crate::repository::{DefeatedEnemySet, ZoneRepository};
use crate::state::{PitfallStatus, ZoneStateManager};
use crate::zone::{EnemyId, TilePos};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub blasts: Vec<BombBlast>,
    pub pitfall: PitfallStatus,
}

/// All per-game mutable state. Registries and board stores live outside so
/// they can outlast a new game.
#[derive(Debug, Clone)]
pub struct GameSession {
    pub config: WorldConfig,
    pub repository: ZoneRepository,
    pub connections: ConnectionGraph,
    pub defeated: DefeatedEnemySet,
    pub flags: WorldFlags,
    pub state: ZoneStateManager,
    pub vitals: PlayerVitals,
    pub live: Option<LiveZone>,
    pub(crate) rng: ChaCha8Rng,
    seed: u64,
    fresh_start: bool,
}

impl GameSession {
    pub fn new(config: WorldConfig) -> Self {
        let seed = config.seed;
        Self {
            config,
            repository: ZoneRepository::new(),
            connections: ConnectionGraph::new(),
            defeated: DefeatedEnemySet::new(),
            flags: WorldFlags::default(),
            state: ZoneStateManager::default(),
            vitals: PlayerVitals::default(),
            live: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            fresh_start: true,
        }
    }

    /// Wipes every per-game structure and reseeds generation.
    pub fn new_game(&mut self, seed: u64) {
        self.repository.clear();
        self.connections.clear();
        self.defeated.clear();
        self.flags = WorldFlags::default();
        self.state.reset();
        self.vitals = PlayerVitals::default();
        self.live = None;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.seed = seed;
        self.fresh_start = true;
        info!(seed, "new_game_started");
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restored sessions continue from a stream derived from the world seed
    /// and cache size, so a reload does not replay the zones already made.
    pub(crate) fn reseed_after_restore(&mut self, seed: u64) {
        self.seed = seed;
        let salt = self.repository.len() as u64;
        self.rng = ChaCha8Rng::seed_from_u64(seed ^ salt.rotate_left(32));
        self.live = None;
        self.state.reset();
        self.fresh_start = false;
    }

    pub fn is_fresh_start(&self) -> bool {
        self.fresh_start
    }

    pub(crate) fn take_fresh_start(&mut self) -> bool {
        std::mem::replace(&mut self.fresh_start, false)
    }

    /// Removes the enemy from the live zone and records it as permanently
    /// defeated.
    pub fn defeat_enemy(&mut self, id: &EnemyId) -> bool {
        if let Some(live) = self.live.as_mut() {
            live.remove_enemy(id);
        }
        let inserted = self.defeated.insert(id.clone());
        if inserted {
            info!(enemy = %id, "enemy_defeated");
        }
        inserted
    }

    /// One player action has passed: bombs tick, pitfall survival counts.
    pub fn advance_turn(&mut self) -> TurnReport {
        self.state.begin_turn();
        let blasts = match self.live.as_mut() {
            Some(live) => live.tick_bombs(&mut self.state, self.config.bomb_fuse_actions),
            None => Vec::new(),
        };
        for blast in &blasts {
            for id in &blast.defeated {
                self.defeated.insert(id.clone());
            }
            if blast.player_hit {
                self.vitals.hearts = self.vitals.hearts.saturating_sub(1);
            }
        }
        let pitfall = self
            .state
            .record_pitfall_turn(self.config.pitfall_survival_turns);
        if pitfall == PitfallStatus::Survived {
            info!("pitfall_survived");
        }
        TurnReport { blasts, pitfall }
    }

    /// Uses an item effect in the live zone. `target` selects the radial
    /// mode; `None` is a direct use from the inventory.
    pub fn use_item(
        &mut self,
        effect: &EffectKind,
        target: Option<TilePos>,
    ) -> Result<EffectOutcome, EffectError> {
        let Some(live) = self.live.as_mut() else {
            warn!(effect = %effect, "item_used_without_zone");
            return Err(EffectError::NoActiveZone);
        };
        let player = live.player.tile().ok_or(EffectError::NoActiveZone)?;
        let mut ctx = EffectContext {
            vitals: &mut self.vitals,
            state: &mut self.state,
            grid: &mut live.grid,
            enemies: &mut live.enemies,
            defeated: &mut self.defeated,
            zone: live.coord,
            player,
        };
        match target {
            Some(target) => effect.apply_from_radial(&mut ctx, target),
            None => effect.apply_direct(&mut ctx),
        }
    }
}
