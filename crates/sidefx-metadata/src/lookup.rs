use sidefx_types::SideEffectRule;

/// Whether `rule` is sourced by `navigation_property`: either through a
/// source property below it or by naming it as a source entity.
pub fn matches_navigation_property(rule: &SideEffectRule, navigation_property: &str) -> bool {
    let prefix = format!("{navigation_property}/");
    rule.source_properties()
        .iter()
        .any(|path| path.starts_with(&prefix))
        || rule
            .source_entities()
            .iter()
            .any(|path| path == navigation_property)
}

/// A field's source path relative to the page's entity set.
///
/// `/Orders/total` becomes `total` for entity set `Orders`; paths outside
/// the entity set are returned unchanged.
pub fn relative_source_path<'a>(source_path: &'a str, entity_set: &str) -> &'a str {
    source_path
        .strip_prefix('/')
        .and_then(|rest| rest.strip_prefix(entity_set))
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(source_path)
}
