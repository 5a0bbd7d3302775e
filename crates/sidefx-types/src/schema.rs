//! Converted business-object schema.
//!
//! A read-only graph of entity types, complex types and bound actions. The
//! only traversal the rest of the workspace needs is [`Schema::resolve_path`],
//! which answers with a closed [`ResolvedNode`] so callers match on what a
//! path points at instead of probing for fields.

use serde::{Deserialize, Serialize};

use crate::annotation::Annotation;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default)]
    pub entity_types: Vec<EntityType>,
    #[serde(default)]
    pub complex_types: Vec<ComplexType>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityType {
    pub fully_qualified_name: String,
    #[serde(default)]
    pub entity_properties: Vec<Property>,
    #[serde(default)]
    pub navigation_properties: Vec<NavigationProperty>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

/// A structural property. `text` holds the `Common.Text` path, relative to
/// the type declaring the property.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationProperty {
    pub name: String,
    pub target_type: String,
    #[serde(default)]
    pub is_collection: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexType {
    pub fully_qualified_name: String,
    #[serde(default)]
    pub properties: Vec<Property>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionParameter {
    pub fully_qualified_name: String,
}

/// An action as exposed on an entity type.
///
/// `fully_qualified_name` includes the overload, e.g.
/// `com.sap.Approve(com.sap.Order)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub fully_qualified_name: String,
    #[serde(default)]
    pub is_bound: bool,
    #[serde(default)]
    pub parameters: Vec<ActionParameter>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Action {
    /// Name without the overload suffix.
    pub fn qualified_name(&self) -> &str {
        match self.fully_qualified_name.split_once('(') {
            Some((name, _)) => name,
            None => &self.fully_qualified_name,
        }
    }

    /// Name of the binding parameter of a bound action.
    ///
    /// Taken from the first parameter's qualified name, after its first `/`.
    pub fn binding_parameter(&self) -> Option<&str> {
        if !self.is_bound {
            return None;
        }
        let first = self.parameters.first()?;
        first
            .fully_qualified_name
            .split_once('/')
            .map(|(_, name)| name)
            .filter(|name| !name.is_empty())
    }
}

/// A type that owns structural properties.
#[derive(Clone, Copy, Debug)]
pub enum StructuredType<'a> {
    Entity(&'a EntityType),
    Complex(&'a ComplexType),
}

impl<'a> StructuredType<'a> {
    pub fn properties(&self) -> &'a [Property] {
        match self {
            Self::Entity(entity) => &entity.entity_properties,
            Self::Complex(complex) => &complex.properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<&'a Property> {
        self.properties().iter().find(|p| p.name == name)
    }
}

/// What a relative path resolves to.
#[derive(Clone, Copy, Debug)]
pub enum ResolvedNode<'a> {
    /// Empty path: the starting entity type itself.
    EntityType(&'a EntityType),
    NavigationProperty {
        property: &'a NavigationProperty,
        target: &'a EntityType,
    },
    /// A property typed by a complex type.
    ComplexProperty {
        property: &'a Property,
        complex_type: &'a ComplexType,
    },
    Property(&'a Property),
}

impl<'a> ResolvedNode<'a> {
    /// The type whose properties are reachable below this node.
    pub fn structured_type(&self) -> Option<StructuredType<'a>> {
        match *self {
            Self::EntityType(entity) => Some(StructuredType::Entity(entity)),
            Self::NavigationProperty { target, .. } => Some(StructuredType::Entity(target)),
            Self::ComplexProperty { complex_type, .. } => Some(StructuredType::Complex(complex_type)),
            Self::Property(_) => None,
        }
    }
}

impl Schema {
    pub fn entity_type(&self, fully_qualified_name: &str) -> Option<&EntityType> {
        self.entity_types
            .iter()
            .find(|e| e.fully_qualified_name == fully_qualified_name)
    }

    pub fn complex_type(&self, fully_qualified_name: &str) -> Option<&ComplexType> {
        self.complex_types
            .iter()
            .find(|c| c.fully_qualified_name == fully_qualified_name)
    }

    /// Walk `path` segment by segment from `root`.
    ///
    /// Navigation properties step into their target entity type, complex
    /// properties into their complex type. Returns `None` as soon as a
    /// segment cannot be found or a primitive property is stepped through.
    pub fn resolve_path<'a>(&'a self, root: &'a EntityType, path: &str) -> Option<ResolvedNode<'a>> {
        let mut node = ResolvedNode::EntityType(root);
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let owner = node.structured_type()?;
            node = self.step(owner, segment)?;
        }
        Some(node)
    }

    /// Leading part of `path` made of navigation properties only.
    ///
    /// `_Customer/address/city` gives `_Customer`; a path starting with a
    /// structural or complex property gives the empty path.
    pub fn navigation_prefix<'p>(&self, root: &EntityType, path: &'p str) -> &'p str {
        let mut node = ResolvedNode::EntityType(root);
        let mut end = 0;
        let mut offset = 0;
        for segment in path.split('/') {
            let Some(owner) = node.structured_type() else {
                break;
            };
            match self.step(owner, segment) {
                Some(next @ ResolvedNode::NavigationProperty { .. }) => {
                    node = next;
                    end = offset + segment.len();
                }
                _ => break,
            }
            offset += segment.len() + 1;
        }
        &path[..end]
    }

    fn step<'a>(&'a self, owner: StructuredType<'a>, segment: &str) -> Option<ResolvedNode<'a>> {
        if let StructuredType::Entity(entity) = owner {
            if let Some(nav) = entity.navigation_properties.iter().find(|n| n.name == segment) {
                let target = self.entity_type(&nav.target_type)?;
                return Some(ResolvedNode::NavigationProperty {
                    property: nav,
                    target,
                });
            }
        }
        let property = owner.property(segment)?;
        match self.complex_type(&property.type_name) {
            Some(complex_type) => Some(ResolvedNode::ComplexProperty {
                property,
                complex_type,
            }),
            None => Some(ResolvedNode::Property(property)),
        }
    }
}
