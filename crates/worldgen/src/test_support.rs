use crate::content::{ContentCategory, ContentDefinition, ContentRegistry, EffectKind, SpawnRule};
use crate::coord::Dimension;

/// Small registry covering every category and spawn tag the generators roll.
pub(crate) fn test_registry() -> ContentRegistry {
    let mut registry = ContentRegistry::new();
    registry
        .register_enemy(ContentDefinition::new("rat", ContentCategory::Enemy).with_weight(3))
        .expect("rat");
    registry
        .register_enemy(
            ContentDefinition::new("bat", ContentCategory::Enemy)
                .with_rule(SpawnRule::only_in(Dimension::Underground)),
        )
        .expect("bat");
    registry
        .register_item(
            ContentDefinition::new("apple", ContentCategory::Item)
                .with_tag("food")
                .with_effect(EffectKind::Food { hunger: 10 }),
        )
        .expect("apple");
    registry
        .register_item(
            ContentDefinition::new("flask", ContentCategory::Item)
                .with_tag("water")
                .with_effect(EffectKind::Water { thirst: 10 }),
        )
        .expect("flask");
    registry
        .register_item(
            ContentDefinition::new("heart", ContentCategory::Item)
                .with_tag("special")
                .with_effect(EffectKind::Heal { hearts: 1 }),
        )
        .expect("heart");
    registry
        .register_npc(ContentDefinition::new("hermit", ContentCategory::Npc))
        .expect("hermit");
    registry.mark_initialized();
    registry
}
