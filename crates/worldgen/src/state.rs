use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coord::Dimension;
use crate::tile::PortKind;
use crate::zone::TilePos;

/// What moved the player into the next zone through something other than an
/// edge exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionSource {
    StairDown,
    StairUp,
    Hole,
    Pitfall,
    Cistern,
    Interior,
}

impl TransitionSource {
    /// Port tile the arrival point must become so the player can go back.
    /// `None` means the arrival point keeps whatever is authored there.
    pub fn emergence_port(self) -> Option<PortKind> {
        match self {
            Self::StairDown | Self::Cistern => Some(PortKind::StairUp),
            Self::StairUp => Some(PortKind::StairDown),
            Self::Hole | Self::Pitfall => Some(PortKind::Ascend),
            Self::Interior => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionDescriptor {
    pub from: TransitionSource,
    pub x: u32,
    pub y: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_dimension: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_y: Option<i32>,
}

impl TransitionDescriptor {
    pub fn pos(&self) -> TilePos {
        TilePos::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeSelection {
    pub item_id: String,
    pub range: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitfallStatus {
    NotInPitfall,
    Surviving { turns: u32 },
    Survived,
}

/// Per-session scratch state for actions that span several turns. Never saved.
#[derive(Debug, Clone, Default)]
pub struct ZoneStateManager {
    pending_charge: Option<ChargeSelection>,
    bomb_placement: bool,
    pending_bomb_positions: Vec<TilePos>,
    pending_transition: Option<TransitionDescriptor>,
    last_transition: Option<TransitionDescriptor>,
    pitfall_zone: bool,
    pitfall_turns_survived: u32,
    player_just_attacked: bool,
}

impl ZoneStateManager {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Clears interaction state when the player leaves a zone. The transition
    /// descriptor and pitfall counters cross the boundary untouched.
    pub fn on_zone_transition(&mut self) {
        self.pending_charge = None;
        self.bomb_placement = false;
        self.pending_bomb_positions.clear();
        self.player_just_attacked = false;
    }

    pub fn begin_turn(&mut self) {
        self.player_just_attacked = false;
    }

    pub fn set_pending_transition(&mut self, descriptor: TransitionDescriptor) {
        debug!(from = ?descriptor.from, x = descriptor.x, y = descriptor.y, "transition_pending");
        if descriptor.from == TransitionSource::Pitfall {
            self.pitfall_zone = true;
            self.pitfall_turns_survived = 0;
        }
        self.pending_transition = Some(descriptor);
    }

    /// Hands the pending descriptor to exactly one consumer.
    pub fn take_pending_transition(&mut self) -> Option<TransitionDescriptor> {
        let descriptor = self.pending_transition.take();
        if descriptor.is_some() {
            self.last_transition = descriptor;
        }
        descriptor
    }

    pub fn pending_transition(&self) -> Option<&TransitionDescriptor> {
        self.pending_transition.as_ref()
    }

    pub fn last_transition(&self) -> Option<&TransitionDescriptor> {
        self.last_transition.as_ref()
    }

    pub fn select_charge(&mut self, selection: ChargeSelection) {
        self.pending_charge = Some(selection);
    }

    pub fn clear_charge(&mut self) {
        self.pending_charge = None;
    }

    pub fn pending_charge(&self) -> Option<&ChargeSelection> {
        self.pending_charge.as_ref()
    }

    pub fn begin_bomb_placement(&mut self) {
        self.bomb_placement = true;
    }

    pub fn cancel_bomb_placement(&mut self) {
        self.bomb_placement = false;
    }

    pub fn bomb_placement_active(&self) -> bool {
        self.bomb_placement
    }

    pub fn place_bomb(&mut self, pos: TilePos) {
        self.bomb_placement = false;
        self.pending_bomb_positions.push(pos);
    }

    pub fn pending_bomb_positions(&self) -> &[TilePos] {
        &self.pending_bomb_positions
    }

    pub fn clear_bomb(&mut self, pos: TilePos) {
        self.pending_bomb_positions.retain(|candidate| *candidate != pos);
    }

    pub fn mark_player_attacked(&mut self) {
        self.player_just_attacked = true;
    }

    pub fn player_just_attacked(&self) -> bool {
        self.player_just_attacked
    }

    pub fn in_pitfall_zone(&self) -> bool {
        self.pitfall_zone
    }

    pub fn pitfall_turns_survived(&self) -> u32 {
        self.pitfall_turns_survived
    }

    /// Counts one turn spent in a pitfall zone. Reaching `required` turns
    /// ends the pitfall state.
    pub fn record_pitfall_turn(&mut self, required: u32) -> PitfallStatus {
        if !self.pitfall_zone {
            return PitfallStatus::NotInPitfall;
        }
        self.pitfall_turns_survived = self.pitfall_turns_survived.saturating_add(1);
        if self.pitfall_turns_survived >= required {
            self.pitfall_zone = false;
            self.pitfall_turns_survived = 0;
            PitfallStatus::Survived
        } else {
            PitfallStatus::Surviving {
                turns: self.pitfall_turns_survived,
            }
        }
    }
}
