use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::coord::Dimension;

use super::types::{
    Activation, ContentCategory, ContentDefinition, RegistryError, RegistryStats,
};

/// Catalog of item, NPC and enemy definitions. Filled once at startup and
/// read-only afterwards; every lookup returns definitions in id order.
#[derive(Debug, Default, Clone)]
pub struct ContentRegistry {
    items: BTreeMap<String, ContentDefinition>,
    npcs: BTreeMap<String, ContentDefinition>,
    enemies: BTreeMap<String, ContentDefinition>,
    initialized: bool,
}

impl ContentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_item(&mut self, def: ContentDefinition) -> Result<(), RegistryError> {
        self.register(ContentCategory::Item, def)
    }

    pub fn register_npc(&mut self, def: ContentDefinition) -> Result<(), RegistryError> {
        self.register(ContentCategory::Npc, def)
    }

    pub fn register_enemy(&mut self, def: ContentDefinition) -> Result<(), RegistryError> {
        self.register(ContentCategory::Enemy, def)
    }

    pub fn register(
        &mut self,
        category: ContentCategory,
        def: ContentDefinition,
    ) -> Result<(), RegistryError> {
        if def.id.trim().is_empty() {
            return Err(RegistryError::EmptyId { category });
        }
        if def.category != category {
            return Err(RegistryError::CategoryMismatch {
                id: def.id,
                declared: def.category,
                target: category,
            });
        }
        let table = self.table_mut(category);
        if table.contains_key(&def.id) {
            return Err(RegistryError::DuplicateRegistration {
                category,
                id: def.id,
            });
        }
        table.insert(def.id.clone(), def);
        Ok(())
    }

    /// Flips the readiness flag. Only the first call runs the integrity check.
    pub fn mark_initialized(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        let stats = self.stats();
        for category in ContentCategory::ALL {
            if stats.count(category) == 0 {
                warn!(category = %category, "content_registry_category_empty");
            }
        }
        info!(
            items = stats.items,
            npcs = stats.npcs,
            enemies = stats.enemies,
            "content_registry_initialized"
        );
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            items: self.items.len(),
            npcs: self.npcs.len(),
            enemies: self.enemies.len(),
        }
    }

    pub fn get(&self, category: ContentCategory, id: &str) -> Option<&ContentDefinition> {
        self.table(category).get(id)
    }

    pub fn definitions(&self, category: ContentCategory) -> impl Iterator<Item = &ContentDefinition> {
        self.table(category).values()
    }

    /// Definitions whose spawn rule admits the given level, dimension and
    /// activation state.
    pub fn eligible(
        &self,
        category: ContentCategory,
        level: u8,
        dimension: Dimension,
        activation: Activation,
    ) -> Vec<&ContentDefinition> {
        self.table(category)
            .values()
            .filter(|def| def.spawn_rule.allows(level, dimension, activation))
            .collect()
    }

    pub fn eligible_tagged(
        &self,
        category: ContentCategory,
        tag: &str,
        level: u8,
        dimension: Dimension,
        activation: Activation,
    ) -> Vec<&ContentDefinition> {
        self.eligible(category, level, dimension, activation)
            .into_iter()
            .filter(|def| def.has_tag(tag))
            .collect()
    }

    fn table(&self, category: ContentCategory) -> &BTreeMap<String, ContentDefinition> {
        match category {
            ContentCategory::Item => &self.items,
            ContentCategory::Npc => &self.npcs,
            ContentCategory::Enemy => &self.enemies,
        }
    }

    fn table_mut(&mut self, category: ContentCategory) -> &mut BTreeMap<String, ContentDefinition> {
        match category {
            ContentCategory::Item => &mut self.items,
            ContentCategory::Npc => &mut self.npcs,
            ContentCategory::Enemy => &mut self.enemies,
        }
    }
}
