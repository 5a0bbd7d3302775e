//! Rule index over a converted schema.
//!
//! Built once per session from the schema's SideEffects annotations. The
//! metadata-declared rules and action rules never change afterwards; the
//! control sub-index is mutated as controls attach and detach.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;
use sidefx_types::{
    ActionRule, AnnotationPath, ControlSideEffects, EntityType, Schema, SideEffectRule,
};

use crate::error::IndexError;
use crate::lookup::matches_navigation_property;
use crate::normalize::RuleNormalizer;

#[derive(Debug, Default)]
pub struct MetadataIndex {
    schema: Option<Arc<Schema>>,
    /// Entity type -> annotation path -> rule.
    odata: HashMap<String, IndexMap<AnnotationPath, SideEffectRule>>,
    /// Entity type -> action qualified name -> merged action rule.
    actions: HashMap<String, IndexMap<String, ActionRule>>,
    /// Entity type -> source control id -> rule.
    control: HashMap<String, IndexMap<String, SideEffectRule>>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.schema.is_some()
    }

    /// Index every SideEffects annotation of `schema`.
    ///
    /// Returns `false` without touching the index when it was already
    /// initialized.
    pub fn initialize(&mut self, schema: Arc<Schema>) -> bool {
        if self.is_initialized() {
            return false;
        }

        let normalizer = RuleNormalizer::new(&schema);
        for entity in &schema.entity_types {
            let rules = entity_rules(&normalizer, entity);
            if !rules.is_empty() {
                self.odata.insert(entity.fully_qualified_name.clone(), rules);
            }
            let actions = action_rules(&normalizer, entity);
            if !actions.is_empty() {
                self.actions
                    .insert(entity.fully_qualified_name.clone(), actions);
            }
        }
        tracing::debug!(
            entity_types = self.odata.len(),
            rules = self.odata.values().map(IndexMap::len).sum::<usize>(),
            actions = self.actions.values().map(IndexMap::len).sum::<usize>(),
            "side effects index built"
        );

        self.schema = Some(schema);
        true
    }

    /// Metadata rules of `entity_type`, in annotation order. Empty when unknown.
    pub fn rules_for_entity_type(
        &self,
        entity_type: &str,
    ) -> impl Iterator<Item = (&AnnotationPath, &SideEffectRule)> {
        self.odata.get(entity_type).into_iter().flatten()
    }

    /// The metadata rule at `path`, looked up on the entity type it targets.
    pub fn rule(&self, path: &AnnotationPath) -> Option<&SideEffectRule> {
        self.odata.get(&path.target)?.get(path)
    }

    /// Rules of `entity_type` with neither source properties nor source entities.
    pub fn global_rules(&self, entity_type: &str) -> Vec<&SideEffectRule> {
        self.rules_for_entity_type(entity_type)
            .map(|(_, rule)| rule)
            .filter(|rule| rule.is_global())
            .collect()
    }

    /// Rules of `entity_type` sourced by `navigation_property`.
    pub fn rules_for_navigation_property(
        &self,
        entity_type: &str,
        navigation_property: &str,
    ) -> Vec<&SideEffectRule> {
        self.rules_for_entity_type(entity_type)
            .map(|(_, rule)| rule)
            .filter(|rule| matches_navigation_property(rule, navigation_property))
            .collect()
    }

    pub fn action_rule(&self, action: &str, entity_type: &str) -> Option<&ActionRule> {
        self.actions.get(entity_type)?.get(action)
    }

    /// Control rules of `entity_type`, keyed by source control id.
    pub fn control_rules(&self, entity_type: &str) -> impl Iterator<Item = (&String, &SideEffectRule)> {
        self.control.get(entity_type).into_iter().flatten()
    }

    /// Store (or overwrite) the rule contributed by a control.
    ///
    /// The rule is named `<entityType>/SideEffectsForControl/<controlId>`.
    pub fn register_control_rule(
        &mut self,
        entity_type: &str,
        control: &ControlSideEffects,
    ) -> Result<&SideEffectRule, IndexError> {
        let control_id = control
            .source_control_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| IndexError::MissingSourceControlId {
                entity_type: entity_type.to_string(),
            })?;

        let empty = Schema::default();
        let schema = self.schema.as_deref().unwrap_or(&empty);
        let rule = RuleNormalizer::new(schema).normalize_control(
            schema.entity_type(entity_type),
            format!("{entity_type}/SideEffectsForControl/{control_id}"),
            control_id,
            control,
        );

        let rules = self.control.entry(entity_type.to_string()).or_default();
        let stored = match rules.entry(control_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(rule);
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(rule),
        };
        Ok(&*stored)
    }

    /// Drop the rule of `control_id` from every entity type. Returns how many
    /// rules were removed.
    pub fn unregister_control_rule(&mut self, control_id: &str) -> usize {
        let mut removed = 0;
        for rules in self.control.values_mut() {
            if rules.shift_remove(control_id).is_some() {
                removed += 1;
            }
        }
        self.control.retain(|_, rules| !rules.is_empty());
        removed
    }
}

fn entity_rules(
    normalizer: &RuleNormalizer<'_>,
    entity: &EntityType,
) -> IndexMap<AnnotationPath, SideEffectRule> {
    entity
        .annotations
        .iter()
        .filter_map(|annotation| {
            let record = annotation.side_effects()?;
            let path = annotation.path_on(&entity.fully_qualified_name);
            let rule = normalizer.normalize_record(entity, path.to_string(), record, None);
            Some((path, rule))
        })
        .collect()
}

fn action_rules(normalizer: &RuleNormalizer<'_>, entity: &EntityType) -> IndexMap<String, ActionRule> {
    let mut merged: IndexMap<String, ActionRule> = IndexMap::new();
    for action in entity.actions.iter().filter(|a| a.is_bound) {
        for annotation in &action.annotations {
            let Some(record) = annotation.side_effects() else {
                continue;
            };
            let rule = normalizer.normalize_record(
                entity,
                annotation.path_on(&action.fully_qualified_name).to_string(),
                record,
                action.binding_parameter(),
            );

            let entry = merged
                .entry(action.qualified_name().to_string())
                .or_default();
            for target in rule.targets() {
                if !entry.path_expressions.contains(&target) {
                    entry.path_expressions.push(target);
                }
            }
            if let Some(trigger) = rule.trigger_action {
                if !entry.trigger_actions.contains(&trigger) {
                    entry.trigger_actions.push(trigger);
                }
            }
        }
    }
    merged
}
