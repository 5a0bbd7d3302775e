//! SideEffects metadata: the rule index and the rule normalizer.
//!
//! Everything here is synchronous and free of I/O. The engine crate owns
//! contexts, scheduling and execution.

mod error;
mod index;
mod lookup;
mod normalize;

pub use error::IndexError;
pub use index::MetadataIndex;
pub use lookup::{matches_navigation_property, relative_source_path};
pub use normalize::RuleNormalizer;
