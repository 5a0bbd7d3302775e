//! Step 2: strip the binding parameter of a bound action.
//!
//! Rules on bound actions address their targets through the binding
//! parameter (`_it/netAmount`); the stored rule addresses them relative to
//! the bound entity type (`netAmount`).

use super::Draft;

pub(super) fn strip(draft: &mut Draft, parameter: &str) {
    for property in &mut draft.target_properties {
        if let Some(stripped) = strip_segment(property, parameter) {
            *property = stripped;
        }
    }
    for entity in &mut draft.target_entities {
        if let Some(stripped) = strip_segment(&entity.navigation_path, parameter) {
            entity.navigation_path = stripped;
        }
    }
    draft.dedup_targets();
}

/// Removes `parameter` as a whole leading segment, with its trailing `/`.
fn strip_segment(path: &str, parameter: &str) -> Option<String> {
    let rest = path.strip_prefix(parameter)?;
    if rest.is_empty() {
        return Some(String::new());
    }
    rest.strip_prefix('/').map(str::to_string)
}
