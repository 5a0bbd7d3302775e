use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use sidefx_metadata::MetadataIndex;
use sidefx_types::{ControlSideEffects, Schema, Target};

use crate::context::BindingContext;
use crate::error::SideEffectsError;

/// Application-wide owner of the rule index.
///
/// Shared by every page scheduler. The index is written only while building
/// and while controls attach or detach.
#[derive(Debug, Default)]
pub struct SideEffectsService {
    index: RwLock<MetadataIndex>,
}

impl SideEffectsService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from `schema`. Later calls are ignored.
    pub fn initialize(&self, schema: Arc<Schema>) -> bool {
        self.index.write().initialize(schema)
    }

    pub fn index(&self) -> RwLockReadGuard<'_, MetadataIndex> {
        self.index.read()
    }

    /// Register the side effects a control contributes to `entity_type`.
    /// Returns the rule's fully qualified name.
    pub fn add_control_side_effects(
        &self,
        entity_type: &str,
        control: &ControlSideEffects,
    ) -> Result<String, SideEffectsError> {
        let mut index = self.index.write();
        let rule = index.register_control_rule(entity_type, control)?;
        tracing::debug!(
            entity_type,
            rule = %rule.fully_qualified_name,
            "control side effects registered"
        );
        Ok(rule.fully_qualified_name.clone())
    }

    pub fn remove_control_side_effects(&self, control_id: &str) -> usize {
        let removed = self.index.write().unregister_control_rule(control_id);
        tracing::debug!(control_id, removed, "control side effects removed");
        removed
    }

    /// Ask `context` to re-read `targets` in one batch.
    pub async fn request_side_effects(
        &self,
        targets: &[Target],
        context: &dyn BindingContext,
        group_id: Option<&str>,
    ) -> Result<(), SideEffectsError> {
        tracing::debug!(
            context = %context.path(),
            targets = targets.len(),
            group_id,
            "requesting side effects"
        );
        context.request_side_effects(targets, group_id).await?;
        Ok(())
    }

    /// Invoke `action` on `context`. Failures are logged and not returned.
    pub async fn execute_action(
        &self,
        action: &str,
        context: &dyn BindingContext,
        group_id: Option<&str>,
    ) {
        if let Err(e) = context.execute_action(action, group_id).await {
            tracing::warn!(
                action,
                context = %context.path(),
                error = %e,
                "trigger action failed"
            );
        }
    }
}
