//! Domain library for resource locators.
//!
//! Holds the domain types, ports (traits) and error definitions for managing
//! the hierarchical URL paths of content nodes, plus the cleanup engine and
//! the two tree cascade strategies. Keep storage adapters and IO concerns out
//! of this crate; the host provides them through [`PathMapper`] and
//! [`ContentTree`].

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a content node.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(String);

impl ContentId {
    pub fn new<S: Into<String>>(s: S) -> Result<Self, CoreError> {
        let val = s.into();
        if val.is_empty() || val.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidContentId);
        }
        Ok(Self(val))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContentId> for String {
    fn from(value: ContentId) -> Self {
        value.0
    }
}

/// Actor performing a save, recorded by the mapper alongside history entries.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new<S: Into<String>>(s: S) -> Result<Self, CoreError> {
        let val = s.into();
        if val.trim().is_empty() {
            return Err(CoreError::InvalidUserId);
        }
        Ok(Self(val))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Uniqueness and lookup partition: webspace, locale and optional segment.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Scope {
    pub webspace_key: String,
    pub locale: String,
    /// `None` is the default segment.
    pub segment_key: Option<String>,
}

impl Scope {
    pub fn new<W: Into<String>, L: Into<String>>(
        webspace_key: W,
        locale: L,
        segment_key: Option<String>,
    ) -> Self {
        Self {
            webspace_key: webspace_key.into(),
            locale: locale.into(),
            segment_key: segment_key.filter(|s| !s.is_empty()),
        }
    }

    /// Segment key as stored by adapters; the default segment is `""`.
    pub fn segment_or_default(&self) -> &str {
        self.segment_key.as_deref().unwrap_or("")
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.segment_key {
            Some(seg) => write!(f, "{}/{}/{}", self.webspace_key, self.locale, seg),
            None => write!(f, "{}/{}", self.webspace_key, self.locale),
        }
    }
}

/// Kind of content node owning a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    #[default]
    Content,
    InternalLink,
    ExternalLink,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Content => "content",
            NodeKind::InternalLink => "internal_link",
            NodeKind::ExternalLink => "external_link",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "content" => Some(NodeKind::Content),
            "internal_link" => Some(NodeKind::InternalLink),
            "external_link" => Some(NodeKind::ExternalLink),
            _ => None,
        }
    }

    /// External links point off-site and never own a tree path.
    pub fn has_tree_path(&self) -> bool {
        !matches!(self, NodeKind::ExternalLink)
    }
}

/// The document handed to `save`: a content node and its desired path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceDocument {
    pub content_id: ContentId,
    /// Desired display path, already cleaned by the editing UI.
    pub resource_segment: String,
    pub scope: Scope,
    pub kind: NodeKind,
}

impl ResourceDocument {
    pub fn new<P: Into<String>>(content_id: ContentId, resource_segment: P, scope: Scope) -> Self {
        Self {
            content_id,
            resource_segment: resource_segment.into(),
            scope,
            kind: NodeKind::Content,
        }
    }
}

/// A child entry as reported by the content tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    pub content_id: ContentId,
    pub kind: NodeKind,
    /// Publish state in the locale of the queried scope.
    pub published: bool,
    /// False for structural nodes whose type carries no resource locator.
    pub has_resource_locator: bool,
}

impl TreeNode {
    pub fn new(content_id: ContentId, published: bool) -> Self {
        Self {
            content_id,
            kind: NodeKind::Content,
            published,
            has_resource_locator: true,
        }
    }

    /// Whether this node owns a path a cascade could rewrite.
    pub fn owns_path(&self) -> bool {
        self.has_resource_locator && self.kind.has_tree_path()
    }
}

/// A retired path kept for redirect resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub path: String,
    pub content_id: ContentId,
    pub retired_at: SystemTime,
    pub retired_by: Option<UserId>,
}

/// Write request handed to [`PathMapper::save`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathUpdate {
    pub content_id: ContentId,
    pub scope: Scope,
    pub path: String,
    pub user_id: Option<UserId>,
    pub at: SystemTime,
}

/// Time source abstraction to make code testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Mapper port persisting and querying the path to content association.
///
/// All lookups are scoped; a path is unique per [`Scope`], counting both
/// active paths and history entries.
pub trait PathMapper: Send + Sync {
    /// Active path of the content node behind `document`.
    fn load_by_content(&self, document: &ResourceDocument) -> Result<String, CoreError> {
        self.load_by_content_uuid(&document.content_id, &document.scope)
    }
    /// Active path of a content id, `NotFound` if it never saved one.
    fn load_by_content_uuid(&self, content_id: &ContentId, scope: &Scope)
        -> Result<String, CoreError>;
    /// Content id holding `path`, following history entries to their owner.
    fn load_by_resource_locator(&self, path: &str, scope: &Scope) -> Result<ContentId, CoreError>;
    /// Retired paths of a content id, oldest first.
    fn load_history_by_content_uuid(
        &self,
        content_id: &ContentId,
        scope: &Scope,
    ) -> Result<Vec<HistoryEntry>, CoreError>;
    /// True when neither an active path nor a history entry holds `path`.
    fn unique(&self, path: &str, scope: &Scope) -> Result<bool, CoreError>;
    /// `path` itself or the first free `path-N`; paths held by `exclude` count as free.
    fn get_unique_path(
        &self,
        path: &str,
        scope: &Scope,
        exclude: Option<&ContentId>,
    ) -> Result<String, CoreError>;
    /// Set the active path, pushing the previous one to history.
    fn save(&self, update: &PathUpdate) -> Result<(), CoreError>;
    /// Remove the active mapping for `path`; history is retained.
    fn delete_by_path(&self, path: &str, scope: &Scope) -> Result<(), CoreError>;
}

/// Read port over the host content tree.
pub trait ContentTree: Send + Sync {
    /// Direct children of `parent` in tree order.
    fn children(&self, parent: &ContentId, scope: &Scope) -> Result<Vec<TreeNode>, CoreError>;
}

impl<M: PathMapper + ?Sized> PathMapper for Arc<M> {
    fn load_by_content_uuid(
        &self,
        content_id: &ContentId,
        scope: &Scope,
    ) -> Result<String, CoreError> {
        (**self).load_by_content_uuid(content_id, scope)
    }

    fn load_by_resource_locator(&self, path: &str, scope: &Scope) -> Result<ContentId, CoreError> {
        (**self).load_by_resource_locator(path, scope)
    }

    fn load_history_by_content_uuid(
        &self,
        content_id: &ContentId,
        scope: &Scope,
    ) -> Result<Vec<HistoryEntry>, CoreError> {
        (**self).load_history_by_content_uuid(content_id, scope)
    }

    fn unique(&self, path: &str, scope: &Scope) -> Result<bool, CoreError> {
        (**self).unique(path, scope)
    }

    fn get_unique_path(
        &self,
        path: &str,
        scope: &Scope,
        exclude: Option<&ContentId>,
    ) -> Result<String, CoreError> {
        (**self).get_unique_path(path, scope, exclude)
    }

    fn save(&self, update: &PathUpdate) -> Result<(), CoreError> {
        (**self).save(update)
    }

    fn delete_by_path(&self, path: &str, scope: &Scope) -> Result<(), CoreError> {
        (**self).delete_by_path(path, scope)
    }
}

impl<T: ContentTree + ?Sized> ContentTree for Arc<T> {
    fn children(&self, parent: &ContentId, scope: &Scope) -> Result<Vec<TreeNode>, CoreError> {
        (**self).children(parent, scope)
    }
}

/// One descendant the cascade could not adapt.
#[derive(Debug)]
pub struct CascadeFailure {
    pub content_id: ContentId,
    /// Path the cascade tried to assign, if it got that far.
    pub attempted_path: Option<String>,
    pub error: CoreError,
}

impl Display for CascadeFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.attempted_path {
            Some(path) => write!(f, "{} -> {}: {}", self.content_id, path, self.error),
            None => write!(f, "{}: {}", self.content_id, self.error),
        }
    }
}

/// Core domain errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("resource locator not valid: {0}")]
    ResourceLocatorNotValid(String),
    #[error("resource locator {path} already exists for content {holder}")]
    ResourceLocatorAlreadyExists { path: String, holder: ContentId },
    #[error("parent {0} has no resource locator")]
    ParentPathNotFound(ContentId),
    #[error("moved to {path}, but {} descendant(s) could not be adapted", .failures.len())]
    CascadeAdaptationFailed {
        path: String,
        failures: Vec<CascadeFailure>,
    },
    #[error("content {0} would become its own ancestor")]
    TreeCycle(ContentId),
    #[error("invalid content id")]
    InvalidContentId,
    #[error("invalid user id")]
    InvalidUserId,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("not found")]
    NotFound,
    #[error("repository error: {0}")]
    Repository(String),
}

impl CoreError {
    /// Rejected before any write happened; retrying with other input may succeed.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::ResourceLocatorNotValid(_)
                | CoreError::ResourceLocatorAlreadyExists { .. }
                | CoreError::ParentPathNotFound(_)
                | CoreError::TreeCycle(_)
        )
    }
}

/// Return a short about/version line for the binary to print.
pub fn about() -> String {
    let pkg = env!("CARGO_PKG_NAME");
    let ver = env!("CARGO_PKG_VERSION");
    format!("{} v{} - resource locator library loaded", pkg, ver)
}

pub mod adapters;
pub mod cleanup;
pub mod generator;
pub mod strategy;
pub mod validate;

pub use cleanup::{PathCleanup, ReplacerTables};
pub use generator::TreeGenerator;
pub use strategy::{
    ResourceLocatorStrategy, SaveOutcome, StrategyCore, TreeFullEditStrategy,
    TreeLeafEditStrategy,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_id_accepts_simple_values() {
        let id = ContentId::new("0f9a-11").expect("valid id");
        assert_eq!(id.as_str(), "0f9a-11");
    }

    #[test]
    fn content_id_rejects_empty_and_whitespace() {
        assert!(matches!(ContentId::new(""), Err(CoreError::InvalidContentId)));
        assert!(matches!(ContentId::new("a b"), Err(CoreError::InvalidContentId)));
    }

    #[test]
    fn user_id_basic_validation() {
        assert!(UserId::new("42").is_ok());
        assert!(matches!(UserId::new("  "), Err(CoreError::InvalidUserId)));
    }

    #[test]
    fn scope_drops_empty_segment() {
        let scope = Scope::new("sulu", "de", Some(String::new()));
        assert_eq!(scope.segment_key, None);
        assert_eq!(scope.segment_or_default(), "");
        assert_eq!(scope.to_string(), "sulu/de");

        let scope = Scope::new("sulu", "de", Some("winter".into()));
        assert_eq!(scope.to_string(), "sulu/de/winter");
    }

    #[test]
    fn node_kind_parsing() {
        assert_eq!(NodeKind::parse("content"), Some(NodeKind::Content));
        assert_eq!(NodeKind::parse("external-link"), Some(NodeKind::ExternalLink));
        assert_eq!(NodeKind::parse("INTERNAL_LINK"), Some(NodeKind::InternalLink));
        assert_eq!(NodeKind::parse("snippet"), None);
    }

    #[test]
    fn tree_node_ownership() {
        let mut node = TreeNode::new(ContentId::new("a").unwrap(), true);
        assert!(node.owns_path());
        node.kind = NodeKind::ExternalLink;
        assert!(!node.owns_path());
        node.kind = NodeKind::InternalLink;
        node.has_resource_locator = false;
        assert!(!node.owns_path());
    }

    #[test]
    fn cascade_error_message_counts_failures() {
        let err = CoreError::CascadeAdaptationFailed {
            path: "/b".into(),
            failures: vec![CascadeFailure {
                content_id: ContentId::new("c").unwrap(),
                attempted_path: Some("/b/x".into()),
                error: CoreError::NotFound,
            }],
        };
        assert_eq!(
            err.to_string(),
            "moved to /b, but 1 descendant(s) could not be adapted"
        );
        assert!(!err.is_validation());
    }
}
