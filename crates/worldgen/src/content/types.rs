use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coord::Dimension;
use crate::tile::Tile;

use super::effects::EffectKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContentCategory {
    Item,
    Npc,
    Enemy,
}

impl ContentCategory {
    pub const ALL: [ContentCategory; 3] = [Self::Item, Self::Npc, Self::Enemy];

    pub fn as_token(self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Npc => "npc",
            Self::Enemy => "enemy",
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// World-wide switch some content waits on before it may spawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Dormant,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRule {
    pub min_level: u8,
    pub max_level: u8,
    /// Empty means every dimension.
    pub dimensions: Vec<Dimension>,
    pub requires_activation: bool,
}

impl Default for SpawnRule {
    fn default() -> Self {
        Self {
            min_level: 1,
            max_level: u8::MAX,
            dimensions: Vec::new(),
            requires_activation: false,
        }
    }
}

impl SpawnRule {
    pub fn allows(&self, level: u8, dimension: Dimension, activation: Activation) -> bool {
        if level < self.min_level || level > self.max_level {
            return false;
        }
        if !self.dimensions.is_empty() && !self.dimensions.contains(&dimension) {
            return false;
        }
        !(self.requires_activation && activation != Activation::Active)
    }

    pub fn only_in(dimension: Dimension) -> Self {
        Self {
            dimensions: vec![dimension],
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentDefinition {
    pub id: String,
    pub category: ContentCategory,
    pub tile: Tile,
    pub stackable: bool,
    pub spawn_weight: u32,
    pub spawn_rule: SpawnRule,
    pub effect: Option<EffectKind>,
    pub tooltip: Option<String>,
    pub tags: Vec<String>,
}

impl ContentDefinition {
    pub fn new(id: impl Into<String>, category: ContentCategory) -> Self {
        let id = id.into();
        let tile = match category {
            ContentCategory::Item => Tile::item(id.clone()),
            ContentCategory::Npc => Tile::npc(id.clone()),
            ContentCategory::Enemy => Tile::Floor,
        };
        Self {
            id,
            category,
            tile,
            stackable: false,
            spawn_weight: 1,
            spawn_rule: SpawnRule::default(),
            effect: None,
            tooltip: None,
            tags: Vec::new(),
        }
    }

    pub fn with_weight(mut self, spawn_weight: u32) -> Self {
        self.spawn_weight = spawn_weight;
        self
    }

    pub fn with_rule(mut self, spawn_rule: SpawnRule) -> Self {
        self.spawn_rule = spawn_rule;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_effect(mut self, effect: EffectKind) -> Self {
        self.effect = Some(effect);
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub items: usize,
    pub npcs: usize,
    pub enemies: usize,
}

impl RegistryStats {
    pub fn count(&self, category: ContentCategory) -> usize {
        match category {
            ContentCategory::Item => self.items,
            ContentCategory::Npc => self.npcs,
            ContentCategory::Enemy => self.enemies,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate {category} registration for id '{id}'")]
    DuplicateRegistration { category: ContentCategory, id: String },
    #[error("{category} definition id must not be empty")]
    EmptyId { category: ContentCategory },
    #[error("definition '{id}' declares category {declared} but was registered as {target}")]
    CategoryMismatch {
        id: String,
        declared: ContentCategory,
        target: ContentCategory,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_rule_gates_level_dimension_and_activation() {
        let rule = SpawnRule {
            min_level: 2,
            max_level: 3,
            dimensions: vec![Dimension::Underground],
            requires_activation: true,
        };
        assert!(rule.allows(2, Dimension::Underground, Activation::Active));
        assert!(!rule.allows(1, Dimension::Underground, Activation::Active));
        assert!(!rule.allows(4, Dimension::Underground, Activation::Active));
        assert!(!rule.allows(2, Dimension::Surface, Activation::Active));
        assert!(!rule.allows(2, Dimension::Underground, Activation::Dormant));
    }

    #[test]
    fn default_rule_allows_everything() {
        let rule = SpawnRule::default();
        assert!(rule.allows(1, Dimension::Interior, Activation::Dormant));
        assert!(rule.allows(200, Dimension::Surface, Activation::Dormant));
    }
}
