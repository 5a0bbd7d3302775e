use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical category for a failed side-effects request or trigger action.
///
/// Only feeds log fields: a failed re-read and a failed trigger action are
/// handled differently by the scheduler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The backend answered with an error for the requested paths.
    Backend,
    /// A side-effect triggering action failed to execute.
    ActionFailed,
}

/// Structured failure returned by a context's fetch or action capability.
///
/// - `kind` classifies the failure,
/// - `message` is a short summary safe for normal logs,
/// - `detail` optionally carries low-level diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

impl RequestError {
    /// Creates a [`RequestError`] without detail.
    ///
    /// Use [`Self::with_detail`] to attach diagnostic context.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    /// Creates a [`RequestError`] with all fields in a single call.
    pub fn new_with_detail(
        kind: ErrorKind,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    /// Adds or replaces the diagnostic detail. The last value wins.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(ref detail) = self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for RequestError {}
