use thiserror;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("field group id is empty")]
    EmptyFieldGroup,
    #[error("field group id '{id}' carries more than one qualifier")]
    TooManyQualifiers { id: String },
}
