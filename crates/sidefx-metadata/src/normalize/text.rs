//! Step 3: text-dependency expansion.
//!
//! A property annotated with `Common.Text` is shown together with its
//! description, so refreshing the property must refresh the description
//! too. A description behind a navigation property is refreshed through that
//! navigation as a target entity; one reached only through complex properties
//! stays a target property. Star targets over a navigation (`*`, `_Items/*`)
//! first mark that navigation as requested; descriptions inside a requested
//! entity are not added again. Added description properties are expanded in
//! turn, so a rule that already went through this step is left unchanged.

use std::collections::VecDeque;

use sidefx_types::{EntityType, Property, Schema, TargetEntity};

use super::Draft;

pub(super) fn expand(schema: &Schema, entity: &EntityType, rule: &str, draft: &mut Draft) {
    let mut requested: Vec<String> = draft
        .target_entities
        .iter()
        .map(|e| e.navigation_path.clone())
        .collect();

    // Stars first so that the covered set does not depend on target order.
    for path in draft.target_properties.iter().filter(|p| p.ends_with('*')) {
        if expand_star(schema, entity, path).is_none() {
            continue;
        }
        let (owner_path, _) = split_last(path);
        // `address/*` selects the properties of a complex value, not an entity.
        if schema.navigation_prefix(entity, owner_path) != owner_path {
            continue;
        }
        if !requested.iter().any(|r| r == owner_path) {
            requested.push(owner_path.to_string());
            if !owner_path.is_empty() {
                draft.target_entities.push(TargetEntity::new(owner_path));
            }
        }
    }

    let mut pending: VecDeque<String> = draft.target_properties.iter().cloned().collect();
    while let Some(path) = pending.pop_front() {
        let (owner_path, name) = split_last(&path);
        let properties: Vec<&Property> = if path.ends_with('*') {
            match expand_star(schema, entity, &path) {
                Some(properties) => properties,
                None => {
                    tracing::debug!(rule, path = %path, "star target does not resolve, skipped");
                    continue;
                }
            }
        } else {
            match resolve_property(schema, entity, owner_path, name) {
                Some(property) => vec![property],
                None => {
                    tracing::debug!(rule, path = %path, "target property does not resolve, skipped");
                    continue;
                }
            }
        };

        for property in properties {
            let Some(text) = property.text.as_deref().filter(|t| !t.is_empty()) else {
                continue;
            };
            let text_path = if owner_path.is_empty() {
                text.to_string()
            } else {
                format!("{owner_path}/{text}")
            };
            let (text_owner, _) = split_last(&text_path);
            let text_entity = schema.navigation_prefix(entity, text_owner);

            if requested.iter().any(|r| r == text_entity)
                || draft.target_properties.contains(&text_path)
            {
                continue;
            }

            if text_entity.is_empty() {
                draft.target_properties.push(text_path.clone());
                pending.push_back(text_path);
            } else {
                requested.push(text_entity.to_string());
                draft.target_entities.push(TargetEntity::new(text_entity));
            }
        }
    }
}

/// All properties selected by a star target such as `*`, `_Items/*` or
/// `address/*`. `None` when the path in front of the star does not resolve
/// to an entity or complex type.
pub(super) fn expand_star<'a>(
    schema: &'a Schema,
    entity: &'a EntityType,
    path: &str,
) -> Option<Vec<&'a Property>> {
    let (owner_path, _) = split_last(path);
    let owner = schema.resolve_path(entity, owner_path)?.structured_type()?;
    Some(owner.properties().iter().collect())
}

fn resolve_property<'a>(
    schema: &'a Schema,
    entity: &'a EntityType,
    owner_path: &str,
    name: &str,
) -> Option<&'a Property> {
    schema
        .resolve_path(entity, owner_path)?
        .structured_type()?
        .property(name)
}

/// Splits at the last `/`: `("a/b", "c")` for `a/b/c`, `("", "c")` for `c`.
fn split_last(path: &str) -> (&str, &str) {
    path.rsplit_once('/').unwrap_or(("", path))
}
