use serde::{Deserialize, Serialize};
use sidefx_types::{IMMEDIATE_REQUEST_MARKER, SIDE_EFFECTS_TERM};

/// Naming conventions the scheduler decodes field group ids with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SideEffectsConfig {
    immediate_marker: String,
    side_effects_term: String,
}

impl Default for SideEffectsConfig {
    fn default() -> Self {
        Self {
            immediate_marker: IMMEDIATE_REQUEST_MARKER.to_string(),
            side_effects_term: SIDE_EFFECTS_TERM.to_string(),
        }
    }
}

impl SideEffectsConfig {
    pub fn immediate_marker(mut self, marker: impl Into<String>) -> Self {
        self.immediate_marker = marker.into();
        self
    }

    pub fn side_effects_term(mut self, term: impl Into<String>) -> Self {
        self.side_effects_term = term.into();
        self
    }

    pub fn marker(&self) -> &str {
        &self.immediate_marker
    }

    pub fn term(&self) -> &str {
        &self.side_effects_term
    }
}
