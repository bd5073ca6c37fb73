use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::{
    ContentId, ContentTree, CoreError, HistoryEntry, PathMapper, PathUpdate, Scope, TreeNode,
};

/// Upper bound on `-N` suffixes tried by `get_unique_path`.
pub const MAX_UNIQUE_ATTEMPTS: usize = 10_000;

#[derive(Default)]
struct ScopeState {
    /// Active path to owner.
    active: BTreeMap<String, ContentId>,
    /// Owner to active path.
    by_content: BTreeMap<ContentId, String>,
    /// Append-only, oldest first.
    history: Vec<HistoryEntry>,
}

impl ScopeState {
    fn holder(&self, path: &str) -> Option<&ContentId> {
        self.active.get(path).or_else(|| {
            self.history
                .iter()
                .rev()
                .find(|h| h.path == path)
                .map(|h| &h.content_id)
        })
    }
}

/// Simple in-memory path mapper for tests. Not built for high concurrency
/// beyond the internal mutex guarding the map.
pub struct InMemoryPathMapper {
    inner: Mutex<BTreeMap<Scope, ScopeState>>,
    saves: AtomicUsize,
}

/// In-memory content tree for tests.
pub struct InMemoryContentTree {
    children: Mutex<ChildLists>,
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, CoreError> {
    m.lock()
        .map_err(|_| CoreError::Repository("mutex poisoned".into()))
}

impl InMemoryPathMapper {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful `save` calls that changed an active path.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryPathMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl PathMapper for InMemoryPathMapper {
    fn load_by_content_uuid(
        &self,
        content_id: &ContentId,
        scope: &Scope,
    ) -> Result<String, CoreError> {
        let map = lock(&self.inner)?;
        map.get(scope)
            .and_then(|s| s.by_content.get(content_id))
            .cloned()
            .ok_or(CoreError::NotFound)
    }

    fn load_by_resource_locator(&self, path: &str, scope: &Scope) -> Result<ContentId, CoreError> {
        let map = lock(&self.inner)?;
        map.get(scope)
            .and_then(|s| s.holder(path))
            .cloned()
            .ok_or(CoreError::NotFound)
    }

    fn load_history_by_content_uuid(
        &self,
        content_id: &ContentId,
        scope: &Scope,
    ) -> Result<Vec<HistoryEntry>, CoreError> {
        let map = lock(&self.inner)?;
        let Some(state) = map.get(scope) else {
            return Ok(Vec::new());
        };
        let active = state.by_content.get(content_id);
        // one entry per path, at its latest retirement
        let mut seen = BTreeSet::new();
        let mut entries: Vec<HistoryEntry> = state
            .history
            .iter()
            .rev()
            .filter(|h| &h.content_id == content_id && Some(&h.path) != active)
            .filter(|h| seen.insert(h.path.as_str()))
            .cloned()
            .collect();
        entries.reverse();
        Ok(entries)
    }

    fn unique(&self, path: &str, scope: &Scope) -> Result<bool, CoreError> {
        let map = lock(&self.inner)?;
        Ok(map.get(scope).map_or(true, |s| s.holder(path).is_none()))
    }

    fn get_unique_path(
        &self,
        path: &str,
        scope: &Scope,
        exclude: Option<&ContentId>,
    ) -> Result<String, CoreError> {
        let map = lock(&self.inner)?;
        let Some(state) = map.get(scope) else {
            return Ok(path.to_string());
        };
        let is_free = |candidate: &str| match state.holder(candidate) {
            None => true,
            Some(holder) => Some(holder) == exclude,
        };
        if is_free(path) {
            return Ok(path.to_string());
        }
        for i in 1..=MAX_UNIQUE_ATTEMPTS {
            let candidate = format!("{path}-{i}");
            if is_free(&candidate) {
                return Ok(candidate);
            }
        }
        Err(CoreError::Repository(format!(
            "no unique variant of {path} within {MAX_UNIQUE_ATTEMPTS} attempts"
        )))
    }

    fn save(&self, update: &PathUpdate) -> Result<(), CoreError> {
        let mut map = lock(&self.inner)?;
        let state = map.entry(update.scope.clone()).or_default();
        if state.by_content.get(&update.content_id) == Some(&update.path) {
            return Ok(());
        }
        if let Some(holder) = state.active.get(&update.path) {
            if holder != &update.content_id {
                return Err(CoreError::ResourceLocatorAlreadyExists {
                    path: update.path.clone(),
                    holder: holder.clone(),
                });
            }
        }
        if let Some(old) = state.by_content.remove(&update.content_id) {
            state.active.remove(&old);
            state.history.push(HistoryEntry {
                path: old,
                content_id: update.content_id.clone(),
                retired_at: update.at,
                retired_by: update.user_id.clone(),
            });
        }
        state
            .active
            .insert(update.path.clone(), update.content_id.clone());
        state
            .by_content
            .insert(update.content_id.clone(), update.path.clone());
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn delete_by_path(&self, path: &str, scope: &Scope) -> Result<(), CoreError> {
        let mut map = lock(&self.inner)?;
        let state = map.get_mut(scope).ok_or(CoreError::NotFound)?;
        match state.active.remove(path) {
            Some(owner) => {
                state.by_content.remove(&owner);
                Ok(())
            }
            None => Err(CoreError::NotFound),
        }
    }
}

// ============ InMemoryContentTree ============

impl InMemoryContentTree {
    pub fn new() -> Self {
        Self {
            children: Mutex::new(BTreeMap::new()),
        }
    }

    /// Fails with `TreeCycle` when `node` may not be placed under `parent`.
    pub fn check_parent(
        &self,
        parent: &ContentId,
        node: &ContentId,
        scope: &Scope,
    ) -> Result<(), CoreError> {
        let map = lock(&self.children)?;
        check_acyclic(&map, &scope.webspace_key, &scope.locale, parent, node)
    }

    /// Insert or move `node` under `parent`; an existing entry under the same
    /// parent is updated in place so sibling order is kept.
    pub fn upsert_node(
        &self,
        parent: Option<&ContentId>,
        node: TreeNode,
        scope: &Scope,
    ) -> Result<(), CoreError> {
        let mut map = lock(&self.children)?;
        let webspace = &scope.webspace_key;
        let locale = &scope.locale;
        if let Some(parent) = parent {
            check_acyclic(&map, webspace, locale, parent, &node.content_id)?;
            let key = (webspace.clone(), locale.clone(), parent.clone());
            if let Some(existing) = map
                .get_mut(&key)
                .and_then(|list| list.iter_mut().find(|n| n.content_id == node.content_id))
            {
                *existing = node;
                return Ok(());
            }
        }

        for ((w, l, _), list) in map.iter_mut() {
            if w == webspace && l == locale {
                list.retain(|n| n.content_id != node.content_id);
            }
        }
        if let Some(parent) = parent {
            map.entry((webspace.clone(), locale.clone(), parent.clone()))
                .or_default()
                .push(node);
        }
        Ok(())
    }
}

type ChildLists = BTreeMap<(String, String, ContentId), Vec<TreeNode>>;

/// Fails when `node` is `parent` or one of its ancestors.
fn check_acyclic(
    map: &ChildLists,
    webspace: &str,
    locale: &str,
    parent: &ContentId,
    node: &ContentId,
) -> Result<(), CoreError> {
    let mut current = parent;
    for _ in 0..=map.len() {
        if current == node {
            return Err(CoreError::TreeCycle(node.clone()));
        }
        let up = map.iter().find(|((w, l, _), list)| {
            w == webspace && l == locale && list.iter().any(|n| &n.content_id == current)
        });
        match up {
            Some(((_, _, grandparent), _)) => current = grandparent,
            None => return Ok(()),
        }
    }
    Err(CoreError::TreeCycle(node.clone()))
}

impl Default for InMemoryContentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTree for InMemoryContentTree {
    fn children(&self, parent: &ContentId, scope: &Scope) -> Result<Vec<TreeNode>, CoreError> {
        let map = lock(&self.children)?;
        let key = (
            scope.webspace_key.clone(),
            scope.locale.clone(),
            parent.clone(),
        );
        Ok(map.get(&key).cloned().unwrap_or_default())
    }
}
