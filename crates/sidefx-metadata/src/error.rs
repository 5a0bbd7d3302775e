/// Errors produced by index operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("control side effects for entity type '{entity_type}' carry no source control id")]
    MissingSourceControlId { entity_type: String },
}
