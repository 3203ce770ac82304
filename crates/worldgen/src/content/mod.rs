mod compiler;
mod effects;
mod registry;
mod types;

pub use compiler::{
    load_content_dir, load_content_document, ContentErrorCode, ContentLoadError, SourceLocation,
};
pub use effects::{
    radial_pattern, EffectContext, EffectError, EffectKind, EffectOutcome, ItemEffect,
    PlayerVitals, VITAL_CAP,
};
pub use registry::ContentRegistry;
pub use types::{
    Activation, ContentCategory, ContentDefinition, RegistryError, RegistryStats, SpawnRule,
};
