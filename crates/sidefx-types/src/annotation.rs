use serde::{Deserialize, Serialize};

use crate::field_group::AnnotationPath;

/// One annotation attached to an entity type or a bound action.
///
/// `term` is the fully qualified vocabulary term, `qualifier` the optional
/// `#Qualifier` suffix. The record body is discriminated by its `$Type`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    pub record: AnnotationRecord,
}

impl Annotation {
    /// The annotation path of this annotation when applied to `target`.
    pub fn path_on(&self, target: &str) -> AnnotationPath {
        AnnotationPath::new(target, &self.term, self.qualifier.clone())
    }

    /// The SideEffects body, if this annotation declares one.
    pub fn side_effects(&self) -> Option<&SideEffectsRecord> {
        match &self.record {
            AnnotationRecord::SideEffects(record) => Some(record),
            AnnotationRecord::Other => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$Type")]
pub enum AnnotationRecord {
    #[serde(rename = "com.sap.vocabularies.Common.v1.SideEffectsType")]
    SideEffects(SideEffectsRecord),
    /// Any record type the index does not care about.
    #[serde(other)]
    Other,
}

/// A SideEffects rule as authored in metadata, before normalization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SideEffectsRecord {
    #[serde(default)]
    pub source_properties: Vec<PathValue>,
    #[serde(default)]
    pub source_entities: Vec<PathValue>,
    #[serde(default)]
    pub target_properties: Vec<RawTargetProperty>,
    #[serde(default)]
    pub target_entities: Vec<PathValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_action: Option<String>,
}

/// `{ "type": "PropertyPath", "value": "..." }` style path expression.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathValue {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl PathValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            kind: None,
            value: Some(value.into()),
        }
    }
}

/// Target properties are authored either as bare strings or as typed paths.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTargetProperty {
    Path(String),
    Typed(PathValue),
}

impl RawTargetProperty {
    /// The authored path, `None` when the typed form carries no value.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Path(path) => Some(path.as_str()),
            Self::Typed(typed) => typed.value.as_deref(),
        }
    }
}
