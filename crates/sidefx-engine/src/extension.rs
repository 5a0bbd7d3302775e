use std::sync::Arc;

use indexmap::IndexMap;
use sidefx_types::{ControlSideEffects, Schema, SideEffectRule};

use crate::config::SideEffectsConfig;
use crate::context::{BindableField, BindingContext, PageView};
use crate::error::SideEffectsError;
use crate::gate::ReadinessGate;
use crate::scheduler::{EffectScheduler, TargetOverride};
use crate::service::SideEffectsService;

/// A confirmed value change of a field.
#[derive(Clone)]
pub struct FieldChangeEvent {
    pub field: Arc<dyn BindableField>,
    /// Settles once the value behind the change is known, e.g. after a
    /// value help round trip.
    pub prerequisite: Option<ReadinessGate>,
}

impl FieldChangeEvent {
    pub fn new(field: Arc<dyn BindableField>) -> Self {
        Self {
            field,
            prerequisite: None,
        }
    }

    pub fn with_prerequisite(mut self, prerequisite: ReadinessGate) -> Self {
        self.prerequisite = Some(prerequisite);
        self
    }
}

/// Focus left the field groups `field_group_ids`, last touched through `field`.
#[derive(Clone)]
pub struct FieldGroupChangeEvent {
    pub field: Arc<dyn BindableField>,
    pub field_group_ids: Vec<String>,
}

/// Page-level entry point wired to the UI's change events.
///
/// Holds the shared service and the page's own scheduler; dropping the
/// extension discards the page's session.
pub struct SideEffectsExtension {
    service: Arc<SideEffectsService>,
    scheduler: EffectScheduler,
}

impl SideEffectsExtension {
    pub fn new(
        service: Arc<SideEffectsService>,
        view: Arc<dyn PageView>,
        config: SideEffectsConfig,
    ) -> Self {
        let scheduler = EffectScheduler::new(Arc::clone(&service), view, config);
        Self { service, scheduler }
    }

    /// Build the rule index the first time any page is entered.
    pub fn initialize_side_effects(&self, schema: Arc<Schema>) {
        if !self.service.initialize(schema) {
            tracing::trace!("side effects index already initialized");
        }
    }

    pub fn scheduler(&self) -> &EffectScheduler {
        &self.scheduler
    }

    pub async fn handle_field_change(
        &self,
        event: FieldChangeEvent,
        is_valid: bool,
        field_group_prerequisite: Option<ReadinessGate>,
    ) {
        self.scheduler
            .handle_field_change(
                event.field.as_ref(),
                is_valid,
                event.prerequisite,
                field_group_prerequisite,
            )
            .await;
    }

    pub async fn handle_field_group_change(&self, event: FieldGroupChangeEvent) {
        self.scheduler
            .handle_field_group_change(event.field.as_ref(), &event.field_group_ids)
            .await;
    }

    pub async fn request_side_effects(
        &self,
        rule: &SideEffectRule,
        context: &dyn BindingContext,
        group_id: Option<&str>,
        target_override: Option<&TargetOverride>,
    ) -> Result<(), SideEffectsError> {
        self.scheduler
            .request_side_effects(rule, context, group_id, target_override)
            .await
    }

    pub fn add_control_side_effects(
        &self,
        entity_type: &str,
        control: &ControlSideEffects,
    ) -> Result<String, SideEffectsError> {
        self.service.add_control_side_effects(entity_type, control)
    }

    pub fn remove_control_side_effects(&self, control_id: &str) {
        self.service.remove_control_side_effects(control_id);
    }

    pub fn get_registered_failed_requests(&self) -> IndexMap<String, Vec<SideEffectRule>> {
        self.scheduler.get_registered_failed_requests()
    }

    pub fn is_field_group_valid(&self, field_group: &str, context: &dyn BindingContext) -> bool {
        self.scheduler.is_field_group_valid(field_group, context)
    }
}
