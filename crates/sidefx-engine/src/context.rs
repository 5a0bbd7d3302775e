//! Collaborators the engine is driven by, and the ancestor-context walk.
//!
//! The UI layer supplies fields, binding contexts, a metamodel and the page
//! view. Only the methods below are needed; rendering and transport stay on
//! the other side of these traits.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sidefx_types::{RequestError, Target};

/// Number of context levels examined by [`resolve_context`]: the field's own
/// context, its binding's context and that context's binding's context.
pub const MAX_CONTEXT_LEVELS: usize = 3;

/// Pointer to one record of the data model.
#[async_trait]
pub trait BindingContext: Send + Sync + fmt::Debug {
    fn path(&self) -> String;

    /// Context of the binding this context belongs to.
    fn parent_context(&self) -> Option<Arc<dyn BindingContext>>;

    fn meta_model(&self) -> Arc<dyn MetaModel>;

    /// Re-read `targets` relative to this context in one batch.
    async fn request_side_effects(
        &self,
        targets: &[Target],
        group_id: Option<&str>,
    ) -> Result<(), RequestError>;

    /// Invoke the bound action `action` on this context.
    async fn execute_action(&self, action: &str, group_id: Option<&str>)
    -> Result<(), RequestError>;
}

pub trait MetaModel: Send + Sync {
    /// Metadata path for a data path, e.g. `/Orders('1')` to `/Orders`.
    fn meta_path(&self, binding_path: &str) -> String;

    /// Qualified entity type name found at `meta_path`.
    fn entity_type(&self, meta_path: &str) -> Option<String>;
}

/// A UI field whose edits can trigger side effects.
pub trait BindableField: Send + Sync {
    fn id(&self) -> String;

    fn field_group_ids(&self) -> Vec<String>;

    fn binding_context(&self) -> Option<Arc<dyn BindingContext>>;

    /// Metadata path the field was templated from, e.g. `/Orders/total`.
    fn source_path(&self) -> Option<String>;
}

/// The page hosting the fields.
pub trait PageView: Send + Sync {
    fn entity_set(&self) -> Option<String>;

    fn binding_context(&self) -> Option<Arc<dyn BindingContext>>;
}

pub fn entity_type_of(context: &dyn BindingContext) -> Option<String> {
    let meta_model = context.meta_model();
    meta_model.entity_type(&meta_model.meta_path(&context.path()))
}

/// Nearest context, starting at `start`, whose entity type is `entity_type`.
///
/// At most [`MAX_CONTEXT_LEVELS`] contexts are examined. Self-referencing
/// compositions deeper than that are not found; the walk fails closed.
pub fn resolve_context(
    start: &Arc<dyn BindingContext>,
    entity_type: &str,
) -> Option<Arc<dyn BindingContext>> {
    let mut current = Arc::clone(start);
    for level in 1..=MAX_CONTEXT_LEVELS {
        if entity_type_of(current.as_ref()).as_deref() == Some(entity_type) {
            return Some(current);
        }
        if level == MAX_CONTEXT_LEVELS {
            break;
        }
        current = current.parent_context()?;
    }
    None
}
