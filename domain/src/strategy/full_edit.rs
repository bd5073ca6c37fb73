use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::{ResourceLocatorStrategy, SaveOutcome, StrategyCore};
use crate::{
    CascadeFailure, Clock, ContentId, ContentTree, CoreError, HistoryEntry, PathCleanup,
    PathMapper, ResourceDocument, Scope, SystemClock, TreeGenerator, TreeNode, UserId,
};

/// Rewrites the stored path of every descendant when an ancestor moves,
/// regardless of publish state.
pub struct TreeFullEditStrategy<M: PathMapper, T: ContentTree, C: Clock = SystemClock> {
    core: StrategyCore<M, C>,
    tree: T,
}

/// A descendant waiting to be rewritten, with its nearest path-owning
/// ancestor's path before and after the move.
struct Pending {
    node: TreeNode,
    parent_old: Option<String>,
    parent_new: String,
}

impl<M: PathMapper, T: ContentTree> TreeFullEditStrategy<M, T, SystemClock> {
    pub fn new(mapper: M, tree: T, cleaner: PathCleanup) -> Self {
        Self::with_clock(mapper, tree, cleaner, SystemClock)
    }
}

impl<M: PathMapper, T: ContentTree, C: Clock> TreeFullEditStrategy<M, T, C> {
    pub fn with_clock(mapper: M, tree: T, cleaner: PathCleanup, clock: C) -> Self {
        Self {
            core: StrategyCore::new(mapper, cleaner, clock),
            tree,
        }
    }

    pub fn core(&self) -> &StrategyCore<M, C> {
        &self.core
    }

    /// Depth-first, parent before children, over an explicit stack.
    fn cascade(
        &self,
        root: &ContentId,
        scope: &Scope,
        from: Option<&str>,
        to: &str,
        user: Option<&UserId>,
    ) -> Vec<CascadeFailure> {
        let mut failures = Vec::new();
        let mut stack = Vec::new();
        let mut visited = BTreeSet::from([root.clone()]);
        self.push_children(&mut stack, &mut failures, root, scope, from, to);

        while let Some(Pending {
            node,
            parent_old,
            parent_new,
        }) = stack.pop()
        {
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
            if !node.owns_path() {
                debug!(content_id = %id, "no resource locator, descending");
                self.push_children(
                    &mut stack,
                    &mut failures,
                    id,
                    scope,
                    parent_old.as_deref(),
                    &parent_new,
                );
                continue;
            }

            let current = match self.core.current_path(id, scope) {
                Ok(Some(path)) => path,
                Ok(None) => {
                    debug!(content_id = %id, "descendant never saved, descending");
                    self.push_children(
                        &mut stack,
                        &mut failures,
                        id,
                        scope,
                        parent_old.as_deref(),
                        &parent_new,
                    );
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

            let target = match parent_old.as_deref() {
                Some(old) => TreeGenerator::rebase(&current, old, &parent_new),
                None => TreeGenerator::join(&parent_new, TreeGenerator::child_part(&current)),
            };
            match self.core.save_path(id, scope, &target, user) {
                Ok(_) => {
                    self.push_children(
                        &mut stack,
                        &mut failures,
                        id,
                        scope,
                        Some(current.as_str()),
                        &target,
                    );
                }
                Err(error) => {
                    warn!(content_id = %id, path = %target, err = %error, "cascade rewrite failed");
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
        parent_old: Option<&str>,
        parent_new: &str,
    ) {
        match self.tree.children(parent, scope) {
            // reversed so the first child is popped first
            Ok(children) => stack.extend(children.into_iter().rev().map(|node| Pending {
                node,
                parent_old: parent_old.map(str::to_string),
                parent_new: parent_new.to_string(),
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
    for TreeFullEditStrategy<M, T, C>
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
        if let SaveOutcome::Moved { from, to } = &outcome {
            if document.kind.has_tree_path() {
                let failures = self.cascade(
                    &document.content_id,
                    &document.scope,
                    from.as_deref(),
                    to,
                    user,
                );
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
