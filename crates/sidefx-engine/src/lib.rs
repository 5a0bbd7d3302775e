mod config;
mod context;
mod error;
mod extension;
mod gate;
mod scheduler;
mod service;
mod session;
#[cfg(test)]
mod testing;

pub use config::SideEffectsConfig;
pub use context::{
    BindableField, BindingContext, MAX_CONTEXT_LEVELS, MetaModel, PageView, entity_type_of,
    resolve_context,
};
pub use error::SideEffectsError;
pub use extension::{FieldChangeEvent, FieldGroupChangeEvent, SideEffectsExtension};
pub use gate::{GateRejected, GateResult, GateTrigger, ReadinessGate};
pub use scheduler::{EffectMap, EffectScheduler, EffectTargets, TargetOverride};
pub use service::SideEffectsService;
pub use session::{DeferredEffect, EffectMatch, SideEffectsSession};
