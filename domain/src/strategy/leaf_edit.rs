use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::{ResourceLocatorStrategy, SaveOutcome, StrategyCore};
use crate::{
    CascadeFailure, Clock, ContentId, ContentTree, CoreError, HistoryEntry, PathCleanup,
    PathMapper, ResourceDocument, Scope, SystemClock, TreeGenerator, TreeNode, UserId,
};

/// Rewrites only the saved node; published descendants are re-rooted by
/// their leaf segment, unpublished branches keep their paths until their
/// own next save.
pub struct TreeLeafEditStrategy<M: PathMapper, T: ContentTree, C: Clock = SystemClock> {
    core: StrategyCore<M, C>,
    tree: T,
}

struct Pending {
    node: TreeNode,
    parent_path: String,
}

impl<M: PathMapper, T: ContentTree> TreeLeafEditStrategy<M, T, SystemClock> {
    pub fn new(mapper: M, tree: T, cleaner: PathCleanup) -> Self {
        Self::with_clock(mapper, tree, cleaner, SystemClock)
    }
}

impl<M: PathMapper, T: ContentTree, C: Clock> TreeLeafEditStrategy<M, T, C> {
    pub fn with_clock(mapper: M, tree: T, cleaner: PathCleanup, clock: C) -> Self {
        Self {
            core: StrategyCore::new(mapper, cleaner, clock),
            tree,
        }
    }

    pub fn core(&self) -> &StrategyCore<M, C> {
        &self.core
    }

    /// Each published descendant goes back through the full save procedure
    /// with `parent_path` + its old leaf segment.
    fn cascade(
        &self,
        root: &ContentId,
        scope: &Scope,
        to: &str,
        user: Option<&UserId>,
    ) -> Vec<CascadeFailure> {
        let mut failures = Vec::new();
        let mut stack = Vec::new();
        let mut visited = BTreeSet::from([root.clone()]);
        self.push_children(&mut stack, &mut failures, root, scope, to);

        while let Some(Pending { node, parent_path }) = stack.pop() {
            let id = &node.content_id;
            if !visited.insert(id.clone()) {
                warn!(content_id = %id, "content tree cycle, branch skipped");
                failures.push(CascadeFailure {
                    content_id: id.clone(),
                    attempted_path: None,
                    error: CoreError::TreeCycle(id.clone()),
                });
                continue;
            }
            if !node.published {
                debug!(content_id = %id, "unpublished, branch pruned");
                continue;
            }
            if !node.owns_path() {
                self.push_children(&mut stack, &mut failures, id, scope, &parent_path);
                continue;
            }

            let current = match self.core.current_path(id, scope) {
                Ok(Some(path)) => path,
                Ok(None) => {
                    self.push_children(&mut stack, &mut failures, id, scope, &parent_path);
                    continue;
                }
                Err(error) => {
                    warn!(content_id = %id, err = %error, "cascade lookup failed");
                    failures.push(CascadeFailure {
                        content_id: id.clone(),
                        attempted_path: None,
                        error,
                    });
                    continue;
                }
            };

            let target = TreeGenerator::join(&parent_path, TreeGenerator::child_part(&current));
            match self.core.save_path(id, scope, &target, user) {
                Ok(SaveOutcome::Moved { to, .. }) => {
                    self.push_children(&mut stack, &mut failures, id, scope, &to);
                }
                Ok(SaveOutcome::Unchanged) => {
                    self.push_children(&mut stack, &mut failures, id, scope, &current);
                }
                Err(error) => {
                    warn!(content_id = %id, path = %target, err = %error, "cascade adapt failed");
                    failures.push(CascadeFailure {
                        content_id: id.clone(),
                        attempted_path: Some(target),
                        error,
                    });
                }
            }
        }
        failures
    }

    fn push_children(
        &self,
        stack: &mut Vec<Pending>,
        failures: &mut Vec<CascadeFailure>,
        parent: &ContentId,
        scope: &Scope,
        parent_path: &str,
    ) {
        match self.tree.children(parent, scope) {
            Ok(children) => stack.extend(children.into_iter().rev().map(|node| Pending {
                node,
                parent_path: parent_path.to_string(),
            })),
            Err(error) => {
                warn!(content_id = %parent, err = %error, "listing children failed");
                failures.push(CascadeFailure {
                    content_id: parent.clone(),
                    attempted_path: None,
                    error,
                });
            }
        }
    }
}

impl<M: PathMapper, T: ContentTree, C: Clock> ResourceLocatorStrategy
    for TreeLeafEditStrategy<M, T, C>
{
    fn generate(
        &self,
        title: &str,
        parent: Option<&ContentId>,
        scope: &Scope,
        exclude: Option<&ContentId>,
    ) -> Result<String, CoreError> {
        self.core.generate(title, parent, scope, exclude)
    }

    fn save(
        &self,
        document: &ResourceDocument,
        user: Option<&UserId>,
    ) -> Result<SaveOutcome, CoreError> {
        let outcome = self.core.save(document, user)?;
        if let SaveOutcome::Moved { to, .. } = &outcome {
            if document.kind.has_tree_path() {
                let failures = self.cascade(&document.content_id, &document.scope, to, user);
                if !failures.is_empty() {
                    return Err(CoreError::CascadeAdaptationFailed {
                        path: to.clone(),
                        failures,
                    });
                }
            }
        }
        Ok(outcome)
    }

    fn is_valid(&self, path: &str, webspace_key: &str, locale: &str) -> bool {
        self.core.is_valid(path, webspace_key, locale)
    }

    fn load_by_content(&self, document: &ResourceDocument) -> Result<String, CoreError> {
        self.core.load_by_content(document)
    }

    fn load_by_content_uuid(
        &self,
        content_id: &ContentId,
        scope: &Scope,
    ) -> Result<String, CoreError> {
        self.core.load_by_content_uuid(content_id, scope)
    }

    fn load_by_resource_locator(&self, path: &str, scope: &Scope) -> Result<ContentId, CoreError> {
        self.core.load_by_resource_locator(path, scope)
    }

    fn load_history_by_content_uuid(
        &self,
        content_id: &ContentId,
        scope: &Scope,
    ) -> Result<Vec<HistoryEntry>, CoreError> {
        self.core.load_history_by_content_uuid(content_id, scope)
    }

    fn delete_by_id(&self, path: &str, scope: &Scope) -> Result<(), CoreError> {
        self.core.delete_by_id(path, scope)
    }
}
