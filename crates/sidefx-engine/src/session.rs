//! Per-page bookkeeping: deferred effects, failed effects and field-group validity.
//!
//! A session is created when a page is entered and dropped when it is left.
//! Every method is synchronous; the scheduler takes its lock around each call
//! and never holds it across an `.await`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use sidefx_types::{FieldGroupKey, SideEffectRule};

use crate::context::BindingContext;
use crate::gate::ReadinessGate;

/// A rule matched for a field, with the context it must run against.
///
/// `context` is `None` only for bulk matches made without a field.
#[derive(Clone)]
pub struct EffectMatch {
    pub name: String,
    pub immediate: bool,
    pub rule: SideEffectRule,
    pub context: Option<Arc<dyn BindingContext>>,
}

impl fmt::Debug for EffectMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectMatch")
            .field("name", &self.name)
            .field("immediate", &self.immediate)
            .field("rule", &self.rule.fully_qualified_name)
            .field("context", &self.context.as_ref().map(|c| c.path()))
            .finish()
    }
}

/// An effect waiting for its field group to lose focus.
#[derive(Clone, Debug)]
pub struct DeferredEffect {
    pub gate: ReadinessGate,
    pub name: String,
    pub rule: SideEffectRule,
    pub context: Arc<dyn BindingContext>,
}

#[derive(Debug, Default)]
pub struct SideEffectsSession {
    deferred: IndexMap<FieldGroupKey, DeferredEffect>,
    /// Context path -> rules whose request failed there.
    failed: IndexMap<String, Vec<SideEffectRule>>,
    /// Field-group key -> ids of fields currently holding an invalid value.
    invalid: HashMap<FieldGroupKey, HashSet<String>>,
}

impl SideEffectsSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `effect` under `key`. The first registration for a key wins until
    /// it is taken; returns `false` when the effect was dropped.
    pub fn register_deferred(&mut self, key: FieldGroupKey, effect: DeferredEffect) -> bool {
        match self.deferred.entry(key) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(vacant) => {
                vacant.insert(effect);
                true
            }
        }
    }

    pub fn deferred(&self, key: &FieldGroupKey) -> Option<&DeferredEffect> {
        self.deferred.get(key)
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Remove and return every deferred effect of `field_group`, whatever its context.
    pub fn take_deferred_for_group(&mut self, field_group: &str) -> Vec<(FieldGroupKey, DeferredEffect)> {
        let mut taken = Vec::new();
        self.deferred.retain(|key, effect| {
            if key.field_group == field_group {
                taken.push((key.clone(), effect.clone()));
                false
            } else {
                true
            }
        });
        taken
    }

    /// Remember that `rule` failed on `context_path`. A rule is stored at most
    /// once per path.
    pub fn record_failure(&mut self, context_path: &str, rule: &SideEffectRule) {
        let rules = self.failed.entry(context_path.to_string()).or_default();
        if !rules
            .iter()
            .any(|r| r.fully_qualified_name == rule.fully_qualified_name)
        {
            rules.push(rule.clone());
        }
    }

    /// Forget the failure of `rule_name` on `context_path`.
    pub fn remove_failure(&mut self, context_path: &str, rule_name: &str) -> bool {
        let Some(rules) = self.failed.get_mut(context_path) else {
            return false;
        };
        let before = rules.len();
        rules.retain(|r| r.fully_qualified_name != rule_name);
        let removed = rules.len() != before;
        if rules.is_empty() {
            self.failed.shift_remove(context_path);
        }
        removed
    }

    /// Remove and return every failure recorded for `context_path`.
    pub fn take_failures(&mut self, context_path: &str) -> Vec<SideEffectRule> {
        self.failed.shift_remove(context_path).unwrap_or_default()
    }

    pub fn failures(&self) -> &IndexMap<String, Vec<SideEffectRule>> {
        &self.failed
    }

    /// Track whether `field_id` currently holds a valid value for `key`.
    pub fn mark_field_validity(&mut self, key: FieldGroupKey, field_id: &str, valid: bool) {
        if valid {
            if let Some(fields) = self.invalid.get_mut(&key) {
                fields.remove(field_id);
                if fields.is_empty() {
                    self.invalid.remove(&key);
                }
            }
        } else {
            self.invalid
                .entry(key)
                .or_default()
                .insert(field_id.to_string());
        }
    }

    pub fn is_field_group_valid(&self, key: &FieldGroupKey) -> bool {
        self.invalid.get(key).is_none_or(HashSet::is_empty)
    }

    pub fn clear_validity(&mut self) {
        self.invalid.clear();
    }
}
