//! Per-page orchestration of side effects.
//!
//! A field change either runs its matched rules right away (immediate field
//! groups and control rules) or parks them until the field group loses focus.
//! Requests that fail are remembered per context path and replayed the next
//! time a field on that context (or the page's own context) changes.
//!
//! The session lock is only taken for synchronous bookkeeping. Matching,
//! context resolution and every request happen outside it.

use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use indexmap::IndexMap;
use parking_lot::Mutex;
use sidefx_metadata::relative_source_path;
use sidefx_types::{FieldGroupDescriptor, FieldGroupKey, RuleSource, SideEffectRule, Target};

use crate::config::SideEffectsConfig;
use crate::context::{BindableField, BindingContext, PageView, entity_type_of, resolve_context};
use crate::error::SideEffectsError;
use crate::gate::ReadinessGate;
use crate::service::SideEffectsService;
use crate::session::{DeferredEffect, EffectMatch, SideEffectsSession};

/// Matched effects keyed by field group name, or `<controlId>::<entityType>`
/// for control rules. Iteration follows match order.
pub type EffectMap = IndexMap<String, EffectMatch>;

/// What one execution fetches and which action it fires first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EffectTargets {
    pub targets: Vec<Target>,
    pub trigger_action: Option<String>,
}

impl From<&SideEffectRule> for EffectTargets {
    fn from(rule: &SideEffectRule) -> Self {
        Self {
            targets: rule.targets(),
            trigger_action: rule.trigger_action.clone(),
        }
    }
}

/// Computes the targets of a rule in place of the rule's own lists.
pub type TargetOverride =
    Arc<dyn Fn(&SideEffectRule) -> BoxFuture<'static, EffectTargets> + Send + Sync>;

pub struct EffectScheduler {
    service: Arc<SideEffectsService>,
    view: Arc<dyn PageView>,
    config: SideEffectsConfig,
    session: Mutex<SideEffectsSession>,
}

impl EffectScheduler {
    pub fn new(
        service: Arc<SideEffectsService>,
        view: Arc<dyn PageView>,
        config: SideEffectsConfig,
    ) -> Self {
        Self {
            service,
            view,
            config,
            session: Mutex::new(SideEffectsSession::new()),
        }
    }

    /// Read access to the session's bookkeeping.
    pub fn with_session<R>(&self, f: impl FnOnce(&SideEffectsSession) -> R) -> R {
        f(&self.session.lock())
    }

    fn decode(&self, field_group_id: &str) -> Option<FieldGroupDescriptor> {
        match FieldGroupDescriptor::decode(
            field_group_id,
            self.config.marker(),
            self.config.term(),
        ) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                tracing::warn!(field_group_id, error = %e, "ignoring field group");
                None
            }
        }
    }

    /// Metadata rules behind `field_group_ids`.
    ///
    /// With a field, each rule is bound to the nearest context of the rule's
    /// entity type and dropped when there is none. Without a field the
    /// matches carry no context.
    pub fn matching_effects_for_field_groups(
        &self,
        field_group_ids: &[String],
        field: Option<&dyn BindableField>,
    ) -> EffectMap {
        let candidates: Vec<(FieldGroupDescriptor, SideEffectRule)> = {
            let index = self.service.index();
            field_group_ids
                .iter()
                .filter_map(|id| self.decode(id))
                .filter_map(|descriptor| {
                    let rule = index.rule(&descriptor.annotation_path)?.clone();
                    Some((descriptor, rule))
                })
                .collect()
        };

        let start = field.and_then(|f| f.binding_context());
        let mut effects = EffectMap::new();
        for (descriptor, rule) in candidates {
            let context = match (field, &start) {
                (None, _) => None,
                (Some(_), Some(start)) => {
                    match resolve_context(start, &descriptor.entity_type) {
                        Some(context) => Some(context),
                        None => continue,
                    }
                }
                (Some(_), None) => continue,
            };
            effects.insert(
                descriptor.name.clone(),
                EffectMatch {
                    name: descriptor.name,
                    immediate: descriptor.immediate,
                    rule,
                    context,
                },
            );
        }
        effects
    }

    /// Every effect a change of `field` can cause: its field groups' rules
    /// followed by the control rules sourced by its property.
    pub fn matching_effects_for_field(&self, field: &dyn BindableField) -> EffectMap {
        let mut effects =
            self.matching_effects_for_field_groups(&field.field_group_ids(), Some(field));
        effects.extend(self.control_effects(field));
        effects
    }

    fn control_effects(&self, field: &dyn BindableField) -> Vec<(String, EffectMatch)> {
        let (Some(source_path), Some(entity_set), Some(start)) = (
            field.source_path(),
            self.view.entity_set(),
            field.binding_context(),
        ) else {
            return Vec::new();
        };
        let meta_model = start.meta_model();
        let Some(view_entity_type) = meta_model.entity_type(&format!("/{entity_set}")) else {
            return Vec::new();
        };
        let property = relative_source_path(&source_path, &entity_set);

        let rules: Vec<(String, SideEffectRule)> = {
            let index = self.service.index();
            index
                .control_rules(&view_entity_type)
                .filter(|(_, rule)| rule.source_properties().iter().any(|p| p == property))
                .map(|(control_id, rule)| (control_id.clone(), rule.clone()))
                .collect()
        };
        if rules.is_empty() {
            return Vec::new();
        }
        let Some(context) = resolve_context(&start, &view_entity_type) else {
            return Vec::new();
        };

        rules
            .into_iter()
            .map(|(control_id, rule)| {
                let name = format!("{control_id}::{view_entity_type}");
                let effect = EffectMatch {
                    name: name.clone(),
                    immediate: true,
                    rule,
                    context: Some(Arc::clone(&context)),
                };
                (name, effect)
            })
            .collect()
    }

    /// Mark `field` valid or invalid for each of its deferred field groups.
    pub fn record_field_validity(&self, field: &dyn BindableField, valid: bool) {
        let field_id = field.id();
        let keys: Vec<FieldGroupKey> = self
            .matching_effects_for_field(field)
            .into_values()
            .filter(|effect| !effect.immediate)
            .filter_map(|effect| {
                let context = effect.context?;
                Some(FieldGroupKey::new(effect.name, context.path()))
            })
            .collect();

        let mut session = self.session.lock();
        for key in keys {
            session.mark_field_validity(key, &field_id, valid);
        }
    }

    /// No field of `field_group` currently holds an invalid value on `context`.
    pub fn is_field_group_valid(&self, field_group: &str, context: &dyn BindingContext) -> bool {
        let key = FieldGroupKey::new(field_group, context.path());
        self.session.lock().is_field_group_valid(&key)
    }

    pub fn clear_field_groups_validity(&self) {
        self.session.lock().clear_validity();
    }

    /// React to a confirmed value change of `field`.
    ///
    /// Invalid values only update validity. `prerequisite` is awaited before
    /// anything runs; when it is rejected the change is dropped.
    /// `field_group_prerequisite` gates the effects deferred by this change.
    pub async fn handle_field_change(
        &self,
        field: &dyn BindableField,
        is_valid: bool,
        prerequisite: Option<ReadinessGate>,
        field_group_prerequisite: Option<ReadinessGate>,
    ) {
        self.record_field_validity(field, is_valid);
        if !is_valid {
            return;
        }
        if let Some(prerequisite) = prerequisite {
            if let Err(e) = prerequisite.wait().await {
                tracing::debug!(field = %field.id(), error = %e, "field change abandoned");
                return;
            }
        }
        self.manage_side_effects_from_field(field, field_group_prerequisite.unwrap_or_default())
            .await;
    }

    /// Run immediate effects, defer the others behind `gate`, and replay the
    /// failures of the field's context and the page's context.
    pub async fn manage_side_effects_from_field(
        &self,
        field: &dyn BindableField,
        gate: ReadinessGate,
    ) {
        let effects: Vec<(EffectMatch, Arc<dyn BindingContext>, String)> = self
            .matching_effects_for_field(field)
            .into_values()
            .filter_map(|effect| {
                let context = effect.context.clone()?;
                let path = context.path();
                Some((effect, context, path))
            })
            .collect();

        let mut replay_contexts: Vec<(Arc<dyn BindingContext>, String)> = Vec::new();
        for context in field
            .binding_context()
            .into_iter()
            .chain(self.view.binding_context())
        {
            let path = context.path();
            if replay_contexts.iter().all(|(_, p)| *p != path) {
                replay_contexts.push((context, path));
            }
        }

        let mut batch: Vec<(SideEffectRule, Arc<dyn BindingContext>)> = Vec::new();
        {
            let mut session = self.session.lock();
            for (effect, context, path) in effects {
                if effect.immediate {
                    session.remove_failure(&path, &effect.rule.fully_qualified_name);
                    batch.push((effect.rule, context));
                } else {
                    let key = FieldGroupKey::new(effect.name.clone(), path);
                    let deferred = DeferredEffect {
                        gate: gate.clone(),
                        name: effect.name,
                        rule: effect.rule,
                        context,
                    };
                    if !session.register_deferred(key.clone(), deferred) {
                        tracing::trace!(key = %key, "side effect already deferred");
                    }
                }
            }
            for (context, path) in replay_contexts {
                for rule in session.take_failures(&path) {
                    tracing::debug!(context = %path, rule = %rule.fully_qualified_name, "replaying failed side effect");
                    batch.push((rule, Arc::clone(&context)));
                }
            }
        }

        let runs = batch.into_iter().map(|(rule, context)| async move {
            if let Err(e) = self
                .request_side_effects(&rule, context.as_ref(), None, None)
                .await
            {
                tracing::warn!(
                    context = %context.path(),
                    rule = %rule.fully_qualified_name,
                    error = %e,
                    "side effects request failed"
                );
            }
        });
        join_all(runs).await;
    }

    /// Run the effects deferred for `field_group_ids` once their gates open.
    ///
    /// Effects whose gate is rejected, or whose field group holds an invalid
    /// value, are dropped.
    pub async fn handle_field_group_change(
        &self,
        field: &dyn BindableField,
        field_group_ids: &[String],
    ) {
        let mut entries: Vec<DeferredEffect> = Vec::new();
        {
            let names: Vec<String> = field_group_ids
                .iter()
                .filter_map(|id| self.decode(id))
                .map(|descriptor| descriptor.name)
                .collect();
            let mut session = self.session.lock();
            for name in names {
                entries.extend(
                    session
                        .take_deferred_for_group(&name)
                        .into_iter()
                        .map(|(_, effect)| effect),
                );
            }
        }

        let runs = entries.into_iter().map(|effect| async move {
            if let Err(e) = effect.gate.wait().await {
                tracing::debug!(field_group = %effect.name, error = %e, "deferred side effect skipped");
                return Ok(());
            }
            if !self.is_field_group_valid(&effect.name, effect.context.as_ref()) {
                tracing::debug!(
                    field_group = %effect.name,
                    context = %effect.context.path(),
                    "field group invalid, deferred side effect skipped"
                );
                return Ok(());
            }
            self.request_side_effects(&effect.rule, effect.context.as_ref(), None, None)
                .await
        });

        for result in join_all(runs).await {
            if let Err(e) = result {
                let context = field.binding_context().map(|c| c.path()).unwrap_or_default();
                tracing::warn!(context = %context, error = %e, "deferred side effects failed");
            }
        }
    }

    /// Execute one rule against `context`.
    ///
    /// The trigger action is issued before the fetch and the two run
    /// together; an action failure is only logged. A failed fetch records
    /// the rule for replay on `context` and is returned.
    pub async fn request_side_effects(
        &self,
        rule: &SideEffectRule,
        context: &dyn BindingContext,
        group_id: Option<&str>,
        target_override: Option<&TargetOverride>,
    ) -> Result<(), SideEffectsError> {
        let EffectTargets {
            targets,
            trigger_action,
        } = match target_override {
            Some(compute) => compute(rule).await,
            None => EffectTargets::from(rule),
        };

        let action = async {
            if let Some(action) = trigger_action.as_deref() {
                self.service.execute_action(action, context, group_id).await;
            }
        };
        let fetch = async {
            if targets.is_empty() {
                return Ok(());
            }
            self.service
                .request_side_effects(&targets, context, group_id)
                .await
        };
        let ((), result) = futures::join!(action, fetch);

        if result.is_err() {
            let path = context.path();
            self.session.lock().record_failure(&path, rule);
        }
        result
    }

    /// Re-read everything the rules sourced by `navigation_property` target,
    /// as one merged request.
    pub async fn request_side_effects_for_navigation_property(
        &self,
        navigation_property: &str,
        context: &dyn BindingContext,
        group_id: Option<&str>,
    ) -> Result<(), SideEffectsError> {
        let Some(entity_type) = entity_type_of(context) else {
            return Ok(());
        };
        let merged = {
            let index = self.service.index();
            let rules = index.rules_for_navigation_property(&entity_type, navigation_property);
            if rules.is_empty() {
                return Ok(());
            }
            let mut merged = SideEffectRule {
                fully_qualified_name: format!(
                    "{entity_type}/SideEffectsForNavigationProperty/{navigation_property}"
                ),
                source: RuleSource::OData {
                    properties: Vec::new(),
                    entities: vec![navigation_property.to_string()],
                },
                target_properties: Vec::new(),
                target_entities: Vec::new(),
                trigger_action: None,
            };
            for rule in rules {
                for property in &rule.target_properties {
                    if !merged.target_properties.contains(property) {
                        merged.target_properties.push(property.clone());
                    }
                }
                for entity in &rule.target_entities {
                    if !merged.target_entities.contains(entity) {
                        merged.target_entities.push(entity.clone());
                    }
                }
            }
            merged
        };
        self.request_side_effects(&merged, context, group_id, None)
            .await
    }

    /// Fire the side effects declared on the bound action `action`.
    pub async fn request_action_side_effects(
        &self,
        action: &str,
        context: &dyn BindingContext,
        group_id: Option<&str>,
    ) -> Result<(), SideEffectsError> {
        let Some(entity_type) = entity_type_of(context) else {
            return Ok(());
        };
        let rule = {
            let index = self.service.index();
            match index.action_rule(action, &entity_type) {
                Some(rule) => rule.clone(),
                None => return Ok(()),
            }
        };

        let triggers = join_all(
            rule.trigger_actions
                .iter()
                .map(|trigger| self.service.execute_action(trigger, context, group_id)),
        );
        let fetch = async {
            if rule.path_expressions.is_empty() {
                return Ok(());
            }
            self.service
                .request_side_effects(&rule.path_expressions, context, group_id)
                .await
        };
        let (_, result) = futures::join!(triggers, fetch);
        result
    }

    /// Execute every rule of the context's entity type that has no source.
    /// Returns the first failure after all of them settled.
    pub async fn request_global_side_effects(
        &self,
        context: &dyn BindingContext,
        group_id: Option<&str>,
    ) -> Result<(), SideEffectsError> {
        let Some(entity_type) = entity_type_of(context) else {
            return Ok(());
        };
        let rules: Vec<SideEffectRule> = self
            .service
            .index()
            .global_rules(&entity_type)
            .into_iter()
            .cloned()
            .collect();

        let results = join_all(
            rules
                .iter()
                .map(|rule| self.request_side_effects(rule, context, group_id, None)),
        )
        .await;
        results.into_iter().collect()
    }

    /// Failed rules per context path, in the order they first failed.
    pub fn get_registered_failed_requests(&self) -> IndexMap<String, Vec<SideEffectRule>> {
        self.session.lock().failures().clone()
    }

    pub fn unregister_failed_side_effects(
        &self,
        rule_name: &str,
        context: &dyn BindingContext,
    ) -> bool {
        let path = context.path();
        self.session.lock().remove_failure(&path, rule_name)
    }

    pub fn unregister_failed_side_effects_for_context(
        &self,
        context: &dyn BindingContext,
    ) -> Vec<SideEffectRule> {
        let path = context.path();
        self.session.lock().take_failures(&path)
    }
}

impl std::fmt::Debug for EffectScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectScheduler")
            .field("config", &self.config)
            .field("session", &*self.session.lock())
            .finish_non_exhaustive()
    }
}
