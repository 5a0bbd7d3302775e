pub mod annotation;
pub mod error;
pub mod field_group;
pub mod request_error;
pub mod rule;
pub mod schema;

pub use annotation::{Annotation, AnnotationRecord, PathValue, RawTargetProperty, SideEffectsRecord};
pub use error::KeyError;
pub use field_group::{
    AnnotationPath, FieldGroupDescriptor, FieldGroupKey, IMMEDIATE_REQUEST_MARKER,
    SIDE_EFFECTS_TERM,
};
pub use request_error::{ErrorKind, RequestError};
pub use rule::{ActionRule, ControlSideEffects, RuleSource, SideEffectRule, Target, TargetEntity};
pub use schema::{
    Action, ActionParameter, ComplexType, EntityType, NavigationProperty, Property, ResolvedNode,
    Schema, StructuredType,
};
