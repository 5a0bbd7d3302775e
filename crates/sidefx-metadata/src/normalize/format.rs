//! Step 1: canonical shapes.
//!
//! Target properties arrive as bare strings or `{type, value}` pairs and
//! leave as bare strings. Target entities arrive as `{value}` pairs and leave
//! as [`TargetEntity`]; a missing value becomes the empty path. Repeated
//! targets are kept once, in first-seen order.

use sidefx_types::{ControlSideEffects, PathValue, SideEffectsRecord, TargetEntity};

use super::Draft;

pub(super) fn from_record(rule: &str, record: &SideEffectsRecord) -> Draft {
    let target_properties = record
        .target_properties
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| match raw.path() {
            Some(path) if !path.is_empty() => Some(path.to_string()),
            _ => {
                tracing::debug!(rule, index, "dropping target property without a path");
                None
            }
        })
        .collect();

    let mut draft = Draft {
        source_properties: paths(&record.source_properties),
        source_entities: paths(&record.source_entities),
        target_properties,
        target_entities: record
            .target_entities
            .iter()
            .map(|entity| TargetEntity::new(entity.value.clone().unwrap_or_default()))
            .collect(),
        trigger_action: record.trigger_action.clone().filter(|a| !a.is_empty()),
    };
    draft.dedup_targets();
    draft
}

pub(super) fn from_control(rule: &str, control: &ControlSideEffects) -> Draft {
    let target_properties = control
        .target_properties
        .iter()
        .filter(|path| {
            if path.is_empty() {
                tracing::debug!(rule, "dropping empty target property");
            }
            !path.is_empty()
        })
        .cloned()
        .collect();

    let mut draft = Draft {
        source_properties: control.source_properties.clone(),
        source_entities: Vec::new(),
        target_properties,
        target_entities: control.target_entities.clone(),
        trigger_action: control.trigger_action.clone().filter(|a| !a.is_empty()),
    };
    draft.dedup_targets();
    draft
}

fn paths(values: &[PathValue]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| v.value.clone())
        .filter(|v| !v.is_empty())
        .collect()
}
