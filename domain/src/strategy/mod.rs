//! Resource locator strategies.
//!
//! [`StrategyCore`] owns everything both tree strategies share: cleanup,
//! generation, validation, uniqueness resolution and persistence. The two
//! strategies compose it and differ only in how a move cascades to
//! descendants:
//!
//! - [`TreeFullEditStrategy`] rewrites every descendant's prefix.
//! - [`TreeLeafEditStrategy`] re-roots published descendants only.

mod base;
mod full_edit;
mod leaf_edit;

pub use self::base::StrategyCore;
pub use self::full_edit::TreeFullEditStrategy;
pub use self::leaf_edit::TreeLeafEditStrategy;

use crate::{ContentId, CoreError, HistoryEntry, ResourceDocument, Scope, TreeGenerator, UserId};

/// Result of a successful save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Candidate equalled the active path; nothing was written.
    Unchanged,
    /// A new active path was persisted.
    Moved { from: Option<String>, to: String },
}

impl SaveOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, SaveOutcome::Moved { .. })
    }
}

/// Contract every strategy exposes to content-save pipelines and admin actions.
pub trait ResourceLocatorStrategy: Send + Sync {
    /// Propose a unique path for a node titled `title` below `parent`.
    ///
    /// Nothing is persisted. `exclude` names the node being regenerated so
    /// its own paths do not count as collisions.
    fn generate(
        &self,
        title: &str,
        parent: Option<&ContentId>,
        scope: &Scope,
        exclude: Option<&ContentId>,
    ) -> Result<String, CoreError>;

    /// Persist `document.resource_segment` and cascade the move to descendants.
    ///
    /// A [`CoreError::CascadeAdaptationFailed`] means the document itself was
    /// saved but some descendants still carry stale paths.
    fn save(
        &self,
        document: &ResourceDocument,
        user: Option<&UserId>,
    ) -> Result<SaveOutcome, CoreError>;

    /// Grammar check for a non-root node's path.
    fn is_valid(&self, path: &str, webspace_key: &str, locale: &str) -> bool;

    fn load_by_content(&self, document: &ResourceDocument) -> Result<String, CoreError>;

    fn load_by_content_uuid(&self, content_id: &ContentId, scope: &Scope)
        -> Result<String, CoreError>;

    fn load_by_resource_locator(&self, path: &str, scope: &Scope) -> Result<ContentId, CoreError>;

    fn load_history_by_content_uuid(
        &self,
        content_id: &ContentId,
        scope: &Scope,
    ) -> Result<Vec<HistoryEntry>, CoreError>;

    fn delete_by_id(&self, path: &str, scope: &Scope) -> Result<(), CoreError>;

    /// Last segment of `path`.
    fn child_part(&self, path: &str) -> String {
        TreeGenerator::child_part(path).to_string()
    }
}
