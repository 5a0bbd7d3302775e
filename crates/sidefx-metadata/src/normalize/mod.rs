//! Rule normalization.
//!
//! Turns an authored SideEffects record (or a control contribution) into the
//! canonical [`SideEffectRule`]. Three steps, one sub-module each:
//! - [`format`]: typed paths become bare strings, empty and repeated targets
//!   are dropped.
//! - [`binding`]: the bound action's binding parameter is stripped from targets.
//! - [`text`]: `Common.Text` description properties of every target are added,
//!   and star targets mark their navigation path as a requested entity.
//!
//! Steps operate on a [`Draft`]; only [`RuleNormalizer`] builds final rules.

mod binding;
mod format;
mod text;

use std::collections::HashSet;

use sidefx_types::{
    ControlSideEffects, EntityType, RuleSource, Schema, SideEffectRule, SideEffectsRecord,
    TargetEntity,
};

/// Rule under construction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Draft {
    pub(crate) source_properties: Vec<String>,
    pub(crate) source_entities: Vec<String>,
    pub(crate) target_properties: Vec<String>,
    pub(crate) target_entities: Vec<TargetEntity>,
    pub(crate) trigger_action: Option<String>,
}

impl Draft {
    /// Drop repeated target properties and entities, keeping first occurrences.
    pub(crate) fn dedup_targets(&mut self) {
        let mut seen = HashSet::new();
        self.target_properties.retain(|p| seen.insert(p.clone()));
        let mut seen = HashSet::new();
        self.target_entities
            .retain(|e| seen.insert(e.navigation_path.clone()));
    }
}

pub struct RuleNormalizer<'a> {
    schema: &'a Schema,
}

impl<'a> RuleNormalizer<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Normalize a rule declared on `entity` (or on one of its bound actions,
    /// in which case `binding_parameter` is that action's parameter name).
    pub fn normalize_record(
        &self,
        entity: &EntityType,
        fully_qualified_name: String,
        record: &SideEffectsRecord,
        binding_parameter: Option<&str>,
    ) -> SideEffectRule {
        let mut draft = format::from_record(&fully_qualified_name, record);
        if let Some(parameter) = binding_parameter {
            binding::strip(&mut draft, parameter);
        }
        text::expand(self.schema, entity, &fully_qualified_name, &mut draft);

        SideEffectRule {
            fully_qualified_name,
            source: RuleSource::OData {
                properties: draft.source_properties,
                entities: draft.source_entities,
            },
            target_properties: draft.target_properties,
            target_entities: draft.target_entities,
            trigger_action: draft.trigger_action,
        }
    }

    /// Normalize a control contribution. `entity` is `None` when the schema
    /// does not know the entity type; text expansion is skipped then.
    pub fn normalize_control(
        &self,
        entity: Option<&EntityType>,
        fully_qualified_name: String,
        control_id: &str,
        control: &ControlSideEffects,
    ) -> SideEffectRule {
        let mut draft = format::from_control(&fully_qualified_name, control);
        match entity {
            Some(entity) => text::expand(self.schema, entity, &fully_qualified_name, &mut draft),
            None => tracing::debug!(
                rule = %fully_qualified_name,
                "entity type unknown to schema, text properties not added"
            ),
        }

        SideEffectRule {
            fully_qualified_name,
            source: RuleSource::Control {
                control_id: control_id.to_string(),
                properties: draft.source_properties,
            },
            target_properties: draft.target_properties,
            target_entities: draft.target_entities,
            trigger_action: draft.trigger_action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidefx_types::{PathValue, RawTargetProperty};
    use similar_asserts::assert_eq;

    /// `Order` from the customer-name scenarios: four properties, a text
    /// annotation on `customerName`, and a customer navigation whose name
    /// carries a text across yet another navigation.
    pub(crate) fn order_schema() -> Schema {
        serde_json::from_str(
            r#"{
                "entityTypes": [
                    {
                        "fullyQualifiedName": "com.sap.Order",
                        "entityProperties": [
                            { "name": "id", "type": "Edm.String" },
                            { "name": "customerId", "type": "Edm.String", "text": "_Customer/name" },
                            { "name": "customerName", "type": "Edm.String", "text": "customerDescription" },
                            { "name": "total", "type": "Edm.Decimal" },
                            { "name": "customerDescription", "type": "Edm.String" },
                            { "name": "status", "type": "Edm.String", "text": "statusText" },
                            { "name": "statusText", "type": "Edm.String", "text": "statusLongText" },
                            { "name": "statusLongText", "type": "Edm.String" },
                            { "name": "address", "type": "com.sap.Address" }
                        ],
                        "navigationProperties": [
                            { "name": "_Customer", "targetType": "com.sap.Customer" },
                            { "name": "_Items", "targetType": "com.sap.Item", "isCollection": true }
                        ]
                    },
                    {
                        "fullyQualifiedName": "com.sap.Customer",
                        "entityProperties": [
                            { "name": "id", "type": "Edm.String" },
                            { "name": "name", "type": "Edm.String" },
                            { "name": "country", "type": "Edm.String", "text": "_Country/name" },
                            { "name": "address", "type": "com.sap.Address" }
                        ],
                        "navigationProperties": [
                            { "name": "_Country", "targetType": "com.sap.Country" }
                        ]
                    },
                    {
                        "fullyQualifiedName": "com.sap.Country",
                        "entityProperties": [{ "name": "name", "type": "Edm.String" }]
                    },
                    {
                        "fullyQualifiedName": "com.sap.Item",
                        "entityProperties": [
                            { "name": "product", "type": "Edm.String", "text": "productName" },
                            { "name": "productName", "type": "Edm.String" }
                        ]
                    }
                ],
                "complexTypes": [
                    {
                        "fullyQualifiedName": "com.sap.Address",
                        "properties": [
                            { "name": "street", "type": "Edm.String" },
                            { "name": "city", "type": "Edm.String", "text": "cityName" },
                            { "name": "cityName", "type": "Edm.String" }
                        ]
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    fn record(targets: &[&str]) -> SideEffectsRecord {
        SideEffectsRecord {
            source_properties: vec![PathValue::new("customerId")],
            target_properties: targets
                .iter()
                .map(|t| RawTargetProperty::Path(t.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn star_target_covers_same_entity_text_properties() {
        let schema = order_schema();
        let order = schema.entity_type("com.sap.Order").unwrap();
        let normalizer = RuleNormalizer::new(&schema);

        let rule = normalizer.normalize_record(order, "Order@SE".into(), &record(&["*"]), None);

        assert_eq!(rule.target_properties, vec!["*".to_string()]);
        assert!(!rule.target_properties.contains(&"customerDescription".to_string()));
        // customerId's text lives behind _Customer, which the star does not cover.
        assert_eq!(rule.target_entities, vec![TargetEntity::new("_Customer")]);

        let properties = text::expand_star(&schema, order, "*").unwrap();
        let names: Vec<&str> = properties.iter().map(|p| p.name.as_str()).collect();
        for declared in ["id", "customerId", "customerName", "total"] {
            assert!(names.contains(&declared));
        }
    }

    /// The authored record a normalized rule would come from.
    fn record_of(rule: &SideEffectRule) -> SideEffectsRecord {
        SideEffectsRecord {
            source_properties: rule.source_properties().iter().map(PathValue::new).collect(),
            source_entities: rule.source_entities().iter().map(PathValue::new).collect(),
            target_properties: rule
                .target_properties
                .iter()
                .cloned()
                .map(RawTargetProperty::Path)
                .collect(),
            target_entities: rule
                .target_entities
                .iter()
                .map(|e| PathValue::new(e.navigation_path.as_str()))
                .collect(),
            trigger_action: rule.trigger_action.clone(),
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        let schema = order_schema();
        let order = schema.entity_type("com.sap.Order").unwrap();
        let normalizer = RuleNormalizer::new(&schema);

        for (targets, binding_parameter) in [
            (vec!["customerName"], None),
            (vec!["*"], None),
            (vec!["_Items/*", "customerId"], None),
            (vec!["status"], None),
            (vec!["_Customer/country", "total"], None),
            (vec!["address/city", "address/*"], None),
            (vec!["_it/status", "_it/customerName", "status"], Some("_it")),
        ] {
            let mut authored = record(&targets);
            authored.trigger_action = Some("com.sap.Recompute".into());

            let once =
                normalizer.normalize_record(order, "Order@SE".into(), &authored, binding_parameter);
            let twice =
                normalizer.normalize_record(order, "Order@SE".into(), &record_of(&once), binding_parameter);
            assert_eq!(once, twice, "targets {targets:?}");
        }
    }

    #[test]
    fn stripped_binding_parameter_leaves_no_duplicates() {
        let schema = order_schema();
        let order = schema.entity_type("com.sap.Order").unwrap();
        let normalizer = RuleNormalizer::new(&schema);

        let rule = normalizer.normalize_record(
            order,
            "com.sap.Approve(com.sap.Order)@SE".into(),
            &record(&["_it/total", "total"]),
            Some("_it"),
        );
        assert_eq!(rule.target_properties, vec!["total".to_string()]);
    }

    #[test]
    fn text_chains_are_followed() {
        let schema = order_schema();
        let order = schema.entity_type("com.sap.Order").unwrap();
        let normalizer = RuleNormalizer::new(&schema);

        let rule = normalizer.normalize_record(order, "Order@SE".into(), &record(&["status"]), None);
        assert_eq!(
            rule.target_properties,
            vec![
                "status".to_string(),
                "statusText".to_string(),
                "statusLongText".to_string()
            ]
        );
    }

    #[test]
    fn control_rule_on_unknown_entity_keeps_targets_verbatim() {
        let schema = order_schema();
        let normalizer = RuleNormalizer::new(&schema);
        let control = ControlSideEffects {
            source_control_id: Some("ctl1".into()),
            source_properties: vec!["total".into()],
            target_properties: vec!["customerName".into()],
            ..Default::default()
        };

        let rule = normalizer.normalize_control(None, "X/SideEffectsForControl/ctl1".into(), "ctl1", &control);
        assert_eq!(rule.target_properties, vec!["customerName".to_string()]);
        assert_eq!(rule.control_id(), Some("ctl1"));
        assert_eq!(rule.source_properties(), ["total".to_string()].as_slice());
    }
}
