use serde::{Deserialize, Serialize};

/// Navigation-property path whose whole entity must be re-read.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetEntity {
    pub navigation_path: String,
}

impl TargetEntity {
    pub fn new(navigation_path: impl Into<String>) -> Self {
        Self {
            navigation_path: navigation_path.into(),
        }
    }
}

/// One path handed to a context's batched side-effects request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Entity(TargetEntity),
    Property(String),
}

/// What makes a rule a candidate for a change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleSource {
    /// Declared in metadata. Both lists empty means the rule is global.
    OData {
        properties: Vec<String>,
        entities: Vec<String>,
    },
    /// Contributed at runtime by a UI control.
    Control {
        control_id: String,
        properties: Vec<String>,
    },
}

/// A normalized SideEffects rule.
///
/// Target lists are canonical (bare strings, binding parameter stripped,
/// text properties added) by the time a rule is reachable from an index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffectRule {
    pub fully_qualified_name: String,
    pub source: RuleSource,
    pub target_properties: Vec<String>,
    pub target_entities: Vec<TargetEntity>,
    pub trigger_action: Option<String>,
}

impl SideEffectRule {
    pub fn source_properties(&self) -> &[String] {
        match &self.source {
            RuleSource::OData { properties, .. } | RuleSource::Control { properties, .. } => {
                properties
            }
        }
    }

    pub fn source_entities(&self) -> &[String] {
        match &self.source {
            RuleSource::OData { entities, .. } => entities,
            RuleSource::Control { .. } => &[],
        }
    }

    pub fn control_id(&self) -> Option<&str> {
        match &self.source {
            RuleSource::Control { control_id, .. } => Some(control_id),
            RuleSource::OData { .. } => None,
        }
    }

    /// Metadata rule with no sources: it applies to every save, not to a field.
    pub fn is_global(&self) -> bool {
        matches!(&self.source, RuleSource::OData { properties, entities }
            if properties.is_empty() && entities.is_empty())
    }

    /// Request targets: entities first, then properties, each deduplicated.
    pub fn targets(&self) -> Vec<Target> {
        let mut targets: Vec<Target> = Vec::new();
        for entity in &self.target_entities {
            let target = Target::Entity(entity.clone());
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        for property in &self.target_properties {
            let target = Target::Property(property.clone());
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        targets
    }
}

/// Merged side effects of one bound action.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRule {
    pub path_expressions: Vec<Target>,
    pub trigger_actions: Vec<String>,
}

/// SideEffects contributed by a control when it attaches to a page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSideEffects {
    #[serde(default)]
    pub source_control_id: Option<String>,
    #[serde(default)]
    pub source_properties: Vec<String>,
    #[serde(default)]
    pub target_properties: Vec<String>,
    #[serde(default)]
    pub target_entities: Vec<TargetEntity>,
    #[serde(default)]
    pub trigger_action: Option<String>,
}
