use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::KeyError;

/// Token prefixed to a field group id when its side effects must not wait
/// for the group to lose focus.
pub const IMMEDIATE_REQUEST_MARKER: &str = "$$ImmediateRequest";

/// Vocabulary term under which SideEffects rules are declared.
pub const SIDE_EFFECTS_TERM: &str = "com.sap.vocabularies.Common.v1.SideEffects";

/// Structured form of `<target>@<term>[#<qualifier>]`.
///
/// Display renders the familiar string form; equality and hashing use the
/// parts, so identifiers containing `@` or `#` never collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationPath {
    pub target: String,
    pub term: String,
    pub qualifier: Option<String>,
}

impl AnnotationPath {
    pub fn new(target: impl Into<String>, term: impl Into<String>, qualifier: Option<String>) -> Self {
        Self {
            target: target.into(),
            term: term.into(),
            qualifier,
        }
    }
}

impl fmt::Display for AnnotationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.target, self.term)?;
        if let Some(ref qualifier) = self.qualifier {
            write!(f, "#{}", qualifier)?;
        }
        Ok(())
    }
}

/// Decoded field group identifier.
///
/// A field group id has the form `[<marker>]<entityType>[#<qualifier>]`.
/// `name` is the id with the marker removed; it is also the field-group half
/// of every [`FieldGroupKey`] built for this group. Ids with more than one
/// `#` are rejected with [`KeyError::TooManyQualifiers`]; the scheduler logs
/// them at warn level and skips the group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldGroupDescriptor {
    pub name: String,
    pub immediate: bool,
    pub entity_type: String,
    pub qualifier: Option<String>,
    pub annotation_path: AnnotationPath,
}

impl FieldGroupDescriptor {
    /// Decode `field_group_id` using the given immediate marker and SideEffects term.
    ///
    /// Pure string work; never touches metadata.
    pub fn decode(field_group_id: &str, marker: &str, term: &str) -> Result<Self, KeyError> {
        let (immediate, name) = match field_group_id.strip_prefix(marker) {
            Some(rest) if !marker.is_empty() => (true, rest),
            _ => (false, field_group_id),
        };
        if name.is_empty() {
            return Err(KeyError::EmptyFieldGroup);
        }

        let mut parts = name.split('#');
        let entity_type = parts.next().unwrap_or_default();
        let qualifier = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return Err(KeyError::TooManyQualifiers {
                id: field_group_id.to_string(),
            });
        }
        if entity_type.is_empty() {
            return Err(KeyError::EmptyFieldGroup);
        }

        Ok(Self {
            name: name.to_string(),
            immediate,
            entity_type: entity_type.to_string(),
            annotation_path: AnnotationPath::new(entity_type, term, qualifier.clone()),
            qualifier,
        })
    }
}

/// Identifies one field group bound to one context.
///
/// Used for the deferred-effect registry and the validity map. Display
/// renders `<fieldGroup>_<contextPath>` for logs only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldGroupKey {
    pub field_group: String,
    pub context_path: String,
}

impl FieldGroupKey {
    pub fn new(field_group: impl Into<String>, context_path: impl Into<String>) -> Self {
        Self {
            field_group: field_group.into(),
            context_path: context_path.into(),
        }
    }
}

impl fmt::Display for FieldGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.field_group, self.context_path)
    }
}
