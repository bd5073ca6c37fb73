//! sqlite-adapter — SQLite implementation of the `PathMapper` and
//! `ContentTree` ports for local/dev.
//!
//! Purpose
//! - Provide a lightweight, file-based store so the API server can run
//!   without an external content repository.
//! - Keeps active paths, the append-only path history and a minimal node
//!   tree (parent, kind, per-locale publish state) in one database.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Stores timestamps as seconds since UNIX_EPOCH (u64).
//! - The default segment is stored as the empty string so it can take part
//!   in primary keys.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use domain::{
    ContentId, ContentTree, CoreError, HistoryEntry, NodeKind, PathMapper, PathUpdate, Scope,
    TreeNode, UserId,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

/// Upper bound on `-N` suffixes tried by `get_unique_path`.
const MAX_UNIQUE_ATTEMPTS: usize = 10_000;

/// SQLite-backed store for local development.
pub struct SqliteRepo {
    conn: Mutex<Connection>,
}

impl SqliteRepo {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Construct from env var `DB_PATH` (defaults to `./data/resource_locators.db`).
    pub fn from_env() -> Result<Self, CoreError> {
        let path = std::env::var("DB_PATH")
            .unwrap_or_else(|_| "./data/resource_locators.db".to_string());
        if let Some(dir) = Path::new(&path).parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        Self::new(path)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }

    /// Insert or move `node` under `parent` for the scope's webspace and locale.
    ///
    /// Re-parenting appends the node after its new siblings; `None` detaches it.
    /// Fails with `TreeCycle` when `node` may not be placed under `parent`.
    pub fn check_parent(
        &self,
        parent: &ContentId,
        node: &ContentId,
        scope: &Scope,
    ) -> Result<(), CoreError> {
        let conn = self.lock()?;
        check_acyclic(&conn, &scope.webspace_key, &scope.locale, parent, node)
    }

    pub fn upsert_node(
        &self,
        parent: Option<&ContentId>,
        node: TreeNode,
        scope: &Scope,
    ) -> Result<(), CoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        let webspace = scope.webspace_key.as_str();
        let locale = scope.locale.as_str();

        let Some(parent) = parent else {
            tx.execute(
                "DELETE FROM content_nodes WHERE webspace = ?1 AND locale = ?2 AND content_id = ?3",
                params![webspace, locale, node.content_id.as_str()],
            )
            .map_err(map_sqerr)?;
            return tx.commit().map_err(map_sqerr);
        };

        check_acyclic(&tx, webspace, locale, parent, &node.content_id)?;

        let existing_parent: Option<String> = tx
            .query_row(
                "SELECT parent_id FROM content_nodes WHERE webspace = ?1 AND locale = ?2 AND content_id = ?3",
                params![webspace, locale, node.content_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sqerr)?;

        if existing_parent.as_deref() == Some(parent.as_str()) {
            tx.execute(
                "UPDATE content_nodes SET kind = ?4, published = ?5, has_resource_locator = ?6 \
                 WHERE webspace = ?1 AND locale = ?2 AND content_id = ?3",
                params![
                    webspace,
                    locale,
                    node.content_id.as_str(),
                    node.kind.as_str(),
                    node.published as i64,
                    node.has_resource_locator as i64,
                ],
            )
            .map_err(map_sqerr)?;
        } else {
            let position: i64 = tx
                .query_row(
                    "SELECT COALESCE(MAX(position), -1) + 1 FROM content_nodes \
                     WHERE webspace = ?1 AND locale = ?2 AND parent_id = ?3",
                    params![webspace, locale, parent.as_str()],
                    |row| row.get(0),
                )
                .map_err(map_sqerr)?;
            tx.execute(
                "INSERT OR REPLACE INTO content_nodes(webspace, locale, content_id, parent_id, kind, published, has_resource_locator, position) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    webspace,
                    locale,
                    node.content_id.as_str(),
                    parent.as_str(),
                    node.kind.as_str(),
                    node.published as i64,
                    node.has_resource_locator as i64,
                    position,
                ],
            )
            .map_err(map_sqerr)?;
        }
        tx.commit().map_err(map_sqerr)
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS resource_locators (
            webspace TEXT NOT NULL,
            locale TEXT NOT NULL,
            segment TEXT NOT NULL DEFAULT '',
            path TEXT NOT NULL,
            content_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            created_by TEXT,
            PRIMARY KEY (webspace, locale, segment, path),
            UNIQUE (webspace, locale, segment, content_id)
        );
        CREATE TABLE IF NOT EXISTS resource_locator_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            webspace TEXT NOT NULL,
            locale TEXT NOT NULL,
            segment TEXT NOT NULL DEFAULT '',
            path TEXT NOT NULL,
            content_id TEXT NOT NULL,
            retired_at INTEGER NOT NULL,
            retired_by TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_history_path ON resource_locator_history(webspace, locale, segment, path);
        CREATE INDEX IF NOT EXISTS idx_history_content ON resource_locator_history(webspace, locale, segment, content_id);
        CREATE TABLE IF NOT EXISTS content_nodes (
            webspace TEXT NOT NULL,
            locale TEXT NOT NULL,
            content_id TEXT NOT NULL,
            parent_id TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'content',
            published INTEGER NOT NULL DEFAULT 0,
            has_resource_locator INTEGER NOT NULL DEFAULT 1,
            position INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (webspace, locale, content_id)
        );
        CREATE INDEX IF NOT EXISTS idx_content_nodes_parent ON content_nodes(webspace, locale, parent_id, position);
        "#,
    )
    .map_err(map_sqerr)
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Repository(format!("sqlite error: {e}"))
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation)
}

fn system_time_to_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

fn secs_to_system_time(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn content_id_from_db(raw: String) -> Result<ContentId, CoreError> {
    ContentId::new(raw).map_err(|_| CoreError::Repository("bad content_id in db".into()))
}

/// Active holder of `path`, otherwise the content that retired it last.
fn holder(conn: &Connection, path: &str, scope: &Scope) -> Result<Option<ContentId>, CoreError> {
    let seg = scope.segment_or_default();
    let active: Option<String> = conn
        .query_row(
            "SELECT content_id FROM resource_locators \
             WHERE webspace = ?1 AND locale = ?2 AND segment = ?3 AND path = ?4",
            params![scope.webspace_key, scope.locale, seg, path],
            |row| row.get(0),
        )
        .optional()
        .map_err(map_sqerr)?;
    let raw = match active {
        Some(raw) => Some(raw),
        None => conn
            .query_row(
                "SELECT content_id FROM resource_locator_history \
                 WHERE webspace = ?1 AND locale = ?2 AND segment = ?3 AND path = ?4 \
                 ORDER BY id DESC LIMIT 1",
                params![scope.webspace_key, scope.locale, seg, path],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sqerr)?,
    };
    raw.map(content_id_from_db).transpose()
}

/// Walks `parent_id` upward from `parent`; fails when it reaches `node`.
fn check_acyclic(
    conn: &Connection,
    webspace: &str,
    locale: &str,
    parent: &ContentId,
    node: &ContentId,
) -> Result<(), CoreError> {
    let mut seen = BTreeSet::new();
    let mut current = parent.as_str().to_string();
    loop {
        if current == node.as_str() {
            return Err(CoreError::TreeCycle(node.clone()));
        }
        if !seen.insert(current.clone()) {
            // a loop above `parent` that does not involve `node`
            return Ok(());
        }
        let up: Option<String> = conn
            .query_row(
                "SELECT parent_id FROM content_nodes WHERE webspace = ?1 AND locale = ?2 AND content_id = ?3",
                params![webspace, locale, current],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sqerr)?;
        match up {
            Some(next) => current = next,
            None => return Ok(()),
        }
    }
}

fn active_path(
    conn: &Connection,
    content_id: &ContentId,
    scope: &Scope,
) -> Result<Option<String>, CoreError> {
    conn.query_row(
        "SELECT path FROM resource_locators \
         WHERE webspace = ?1 AND locale = ?2 AND segment = ?3 AND content_id = ?4",
        params![
            scope.webspace_key,
            scope.locale,
            scope.segment_or_default(),
            content_id.as_str()
        ],
        |row| row.get(0),
    )
    .optional()
    .map_err(map_sqerr)
}

impl PathMapper for SqliteRepo {
    fn load_by_content_uuid(
        &self,
        content_id: &ContentId,
        scope: &Scope,
    ) -> Result<String, CoreError> {
        let conn = self.lock()?;
        active_path(&conn, content_id, scope)?.ok_or(CoreError::NotFound)
    }

    fn load_by_resource_locator(&self, path: &str, scope: &Scope) -> Result<ContentId, CoreError> {
        let conn = self.lock()?;
        holder(&conn, path, scope)?.ok_or(CoreError::NotFound)
    }

    fn load_history_by_content_uuid(
        &self,
        content_id: &ContentId,
        scope: &Scope,
    ) -> Result<Vec<HistoryEntry>, CoreError> {
        let conn = self.lock()?;
        let active = active_path(&conn, content_id, scope)?;
        let mut stmt = conn
            .prepare(
                "SELECT path, retired_at, retired_by FROM resource_locator_history \
                 WHERE webspace = ?1 AND locale = ?2 AND segment = ?3 AND content_id = ?4 \
                 ORDER BY id DESC",
            )
            .map_err(map_sqerr)?;
        let mut rows = stmt
            .query(params![
                scope.webspace_key,
                scope.locale,
                scope.segment_or_default(),
                content_id.as_str()
            ])
            .map_err(map_sqerr)?;
        // newest first so each path keeps its latest retirement
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            let path: String = row.get(0).map_err(map_sqerr)?;
            if active.as_deref() == Some(path.as_str()) || !seen.insert(path.clone()) {
                continue;
            }
            let retired_at: i64 = row.get(1).map_err(map_sqerr)?;
            let retired_by: Option<String> = row.get(2).map_err(map_sqerr)?;
            let retired_by = retired_by
                .map(|u| UserId::new(u).map_err(|_| CoreError::Repository("bad retired_by".into())))
                .transpose()?;
            out.push(HistoryEntry {
                path,
                content_id: content_id.clone(),
                retired_at: secs_to_system_time(retired_at as u64),
                retired_by,
            });
        }
        out.reverse();
        Ok(out)
    }

    fn unique(&self, path: &str, scope: &Scope) -> Result<bool, CoreError> {
        let conn = self.lock()?;
        Ok(holder(&conn, path, scope)?.is_none())
    }

    fn get_unique_path(
        &self,
        path: &str,
        scope: &Scope,
        exclude: Option<&ContentId>,
    ) -> Result<String, CoreError> {
        let conn = self.lock()?;
        let is_free = |candidate: &str| -> Result<bool, CoreError> {
            Ok(match holder(&conn, candidate, scope)? {
                None => true,
                Some(h) => Some(&h) == exclude,
            })
        };
        if is_free(path)? {
            return Ok(path.to_string());
        }
        for i in 1..=MAX_UNIQUE_ATTEMPTS {
            let candidate = format!("{path}-{i}");
            if is_free(&candidate)? {
                return Ok(candidate);
            }
        }
        Err(CoreError::Repository(format!(
            "no unique variant of {path} within {MAX_UNIQUE_ATTEMPTS} attempts"
        )))
    }

    fn save(&self, update: &PathUpdate) -> Result<(), CoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        let scope = &update.scope;
        let seg = scope.segment_or_default();
        let at = system_time_to_secs(update.at) as i64;
        let user = update.user_id.as_ref().map(|u| u.as_str());

        let current = active_path(&tx, &update.content_id, scope)?;
        if current.as_deref() == Some(update.path.as_str()) {
            return Ok(());
        }
        if let Some(old) = current {
            tx.execute(
                "DELETE FROM resource_locators \
                 WHERE webspace = ?1 AND locale = ?2 AND segment = ?3 AND content_id = ?4",
                params![scope.webspace_key, scope.locale, seg, update.content_id.as_str()],
            )
            .map_err(map_sqerr)?;
            tx.execute(
                "INSERT INTO resource_locator_history(webspace, locale, segment, path, content_id, retired_at, retired_by) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    scope.webspace_key,
                    scope.locale,
                    seg,
                    old,
                    update.content_id.as_str(),
                    at,
                    user
                ],
            )
            .map_err(map_sqerr)?;
        }

        let res = tx.execute(
            "INSERT INTO resource_locators(webspace, locale, segment, path, content_id, created_at, created_by) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                scope.webspace_key,
                scope.locale,
                seg,
                update.path,
                update.content_id.as_str(),
                at,
                user
            ],
        );
        if let Err(e) = res {
            if is_constraint_violation(&e) {
                let holder = holder(&tx, &update.path, scope)?
                    .unwrap_or_else(|| update.content_id.clone());
                return Err(CoreError::ResourceLocatorAlreadyExists {
                    path: update.path.clone(),
                    holder,
                });
            }
            return Err(map_sqerr(e));
        }
        tx.commit().map_err(map_sqerr)?;
        debug!(content_id = %update.content_id, path = %update.path, "sqlite path saved");
        Ok(())
    }

    fn delete_by_path(&self, path: &str, scope: &Scope) -> Result<(), CoreError> {
        let conn = self.lock()?;
        let n = conn
            .execute(
                "DELETE FROM resource_locators \
                 WHERE webspace = ?1 AND locale = ?2 AND segment = ?3 AND path = ?4",
                params![scope.webspace_key, scope.locale, scope.segment_or_default(), path],
            )
            .map_err(map_sqerr)?;
        if n == 0 {
            return Err(CoreError::NotFound);
        }
        Ok(())
    }
}

impl ContentTree for SqliteRepo {
    fn children(&self, parent: &ContentId, scope: &Scope) -> Result<Vec<TreeNode>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT content_id, kind, published, has_resource_locator FROM content_nodes \
                 WHERE webspace = ?1 AND locale = ?2 AND parent_id = ?3 ORDER BY position ASC",
            )
            .map_err(map_sqerr)?;
        let mut rows = stmt
            .query(params![scope.webspace_key, scope.locale, parent.as_str()])
            .map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            let id: String = row.get(0).map_err(map_sqerr)?;
            let kind: String = row.get(1).map_err(map_sqerr)?;
            let published: i64 = row.get(2).map_err(map_sqerr)?;
            let has_rl: i64 = row.get(3).map_err(map_sqerr)?;
            out.push(TreeNode {
                content_id: content_id_from_db(id)?,
                kind: NodeKind::parse(&kind)
                    .ok_or_else(|| CoreError::Repository(format!("bad node kind in db: {kind}")))?,
                published: published != 0,
                has_resource_locator: has_rl != 0,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{PathCleanup, ResourceDocument, ResourceLocatorStrategy, TreeFullEditStrategy};
    use std::sync::Arc;

    fn tmp_db() -> (SqliteRepo, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let repo = SqliteRepo::new(path).unwrap();
        (repo, dir)
    }

    fn scope() -> Scope {
        Scope::new("sulu_io", "de", None)
    }

    fn id(s: &str) -> ContentId {
        ContentId::new(s).unwrap()
    }

    fn update(content: &str, path: &str, secs: u64) -> PathUpdate {
        PathUpdate {
            content_id: id(content),
            scope: scope(),
            path: path.to_string(),
            user_id: Some(UserId::new("7").unwrap()),
            at: UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    #[test]
    fn save_load_roundtrip() {
        let (repo, _dir) = tmp_db();
        repo.save(&update("a", "/products", 1)).unwrap();
        assert_eq!(repo.load_by_content_uuid(&id("a"), &scope()).unwrap(), "/products");
        assert_eq!(repo.load_by_resource_locator("/products", &scope()).unwrap(), id("a"));
        assert!(!repo.unique("/products", &scope()).unwrap());
        assert!(repo.unique("/other", &scope()).unwrap());
    }

    #[test]
    fn missing_content_is_not_found() {
        let (repo, _dir) = tmp_db();
        let err = repo.load_by_content_uuid(&id("nope"), &scope()).unwrap_err();
        assert!(matches!(err, CoreError::NotFound));
    }

    #[test]
    fn active_path_of_other_content_conflicts() {
        let (repo, _dir) = tmp_db();
        repo.save(&update("a", "/dup", 1)).unwrap();
        let err = repo.save(&update("b", "/dup", 2)).unwrap_err();
        match err {
            CoreError::ResourceLocatorAlreadyExists { path, holder } => {
                assert_eq!(path, "/dup");
                assert_eq!(holder, id("a"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // the failed transaction left nothing behind
        assert!(matches!(
            repo.load_by_content_uuid(&id("b"), &scope()),
            Err(CoreError::NotFound)
        ));
    }

    #[test]
    fn move_retires_old_path_into_history() {
        let (repo, _dir) = tmp_db();
        repo.save(&update("a", "/old", 10)).unwrap();
        repo.save(&update("a", "/new", 20)).unwrap();

        let history = repo.load_history_by_content_uuid(&id("a"), &scope()).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].path, "/old");
        assert_eq!(history[0].retired_at, UNIX_EPOCH + Duration::from_secs(20));
        assert_eq!(history[0].retired_by, Some(UserId::new("7").unwrap()));

        // retired paths stay reserved and resolve to their owner
        assert!(!repo.unique("/old", &scope()).unwrap());
        assert_eq!(repo.load_by_resource_locator("/old", &scope()).unwrap(), id("a"));
    }

    #[test]
    fn reclaimed_path_is_hidden_from_history() {
        let (repo, _dir) = tmp_db();
        repo.save(&update("a", "/one", 1)).unwrap();
        repo.save(&update("a", "/two", 2)).unwrap();
        repo.save(&update("a", "/one", 3)).unwrap();

        let paths: Vec<String> = repo
            .load_history_by_content_uuid(&id("a"), &scope())
            .unwrap()
            .into_iter()
            .map(|h| h.path)
            .collect();
        assert_eq!(paths, vec!["/two".to_string()]);
        assert_eq!(repo.load_by_content_uuid(&id("a"), &scope()).unwrap(), "/one");
    }

    #[test]
    fn unique_path_appends_suffix_and_respects_exclude() {
        let (repo, _dir) = tmp_db();
        repo.save(&update("a", "/news", 1)).unwrap();
        repo.save(&update("b", "/news-1", 1)).unwrap();

        assert_eq!(repo.get_unique_path("/news", &scope(), None).unwrap(), "/news-2");
        assert_eq!(repo.get_unique_path("/news", &scope(), Some(&id("a"))).unwrap(), "/news");
        assert_eq!(repo.get_unique_path("/fresh", &scope(), None).unwrap(), "/fresh");
    }

    #[test]
    fn scopes_are_isolated() {
        let (repo, _dir) = tmp_db();
        repo.save(&update("a", "/shared", 1)).unwrap();
        let en = Scope::new("sulu_io", "en", None);
        let seg = Scope::new("sulu_io", "de", Some("winter".to_string()));
        assert!(repo.unique("/shared", &en).unwrap());
        assert!(repo.unique("/shared", &seg).unwrap());
    }

    #[test]
    fn delete_keeps_history() {
        let (repo, _dir) = tmp_db();
        repo.save(&update("a", "/x", 1)).unwrap();
        repo.save(&update("a", "/y", 2)).unwrap();
        repo.delete_by_path("/y", &scope()).unwrap();

        assert!(matches!(
            repo.load_by_content_uuid(&id("a"), &scope()),
            Err(CoreError::NotFound)
        ));
        assert_eq!(repo.load_history_by_content_uuid(&id("a"), &scope()).unwrap().len(), 1);
        assert!(matches!(
            repo.delete_by_path("/y", &scope()),
            Err(CoreError::NotFound)
        ));
    }

    #[test]
    fn children_keep_insertion_order_and_update_in_place() {
        let (repo, _dir) = tmp_db();
        let root = id("root");
        repo.upsert_node(Some(&root), TreeNode::new(id("c1"), true), &scope()).unwrap();
        repo.upsert_node(Some(&root), TreeNode::new(id("c2"), false), &scope()).unwrap();
        repo.upsert_node(Some(&root), TreeNode::new(id("c1"), false), &scope()).unwrap();

        let kids = repo.children(&root, &scope()).unwrap();
        let ids: Vec<&str> = kids.iter().map(|n| n.content_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert!(!kids[0].published);

        // publish state is per locale
        assert!(repo.children(&root, &Scope::new("sulu_io", "en", None)).unwrap().is_empty());
    }

    #[test]
    fn reparenting_moves_node() {
        let (repo, _dir) = tmp_db();
        repo.upsert_node(Some(&id("p1")), TreeNode::new(id("n"), true), &scope()).unwrap();
        repo.upsert_node(Some(&id("p2")), TreeNode::new(id("n"), true), &scope()).unwrap();
        assert!(repo.children(&id("p1"), &scope()).unwrap().is_empty());
        assert_eq!(repo.children(&id("p2"), &scope()).unwrap().len(), 1);

        repo.upsert_node(None, TreeNode::new(id("n"), true), &scope()).unwrap();
        assert!(repo.children(&id("p2"), &scope()).unwrap().is_empty());
    }

    #[test]
    fn full_edit_cascade_over_sqlite() {
        let (repo, _dir) = tmp_db();
        let repo = Arc::new(repo);
        let strategy =
            TreeFullEditStrategy::new(repo.clone(), repo.clone(), PathCleanup::default());
        let doc = |c: &str, p: &str| ResourceDocument::new(id(c), p, scope());

        strategy.save(&doc("a", "/a"), None).unwrap();
        repo.upsert_node(Some(&id("a")), TreeNode::new(id("c"), true), &scope()).unwrap();
        strategy.save(&doc("c", "/a/c"), None).unwrap();
        repo.upsert_node(Some(&id("c")), TreeNode::new(id("d"), false), &scope()).unwrap();
        strategy.save(&doc("d", "/a/c/d"), None).unwrap();

        strategy.save(&doc("a", "/b"), None).unwrap();

        assert_eq!(repo.load_by_content_uuid(&id("d"), &scope()).unwrap(), "/b/c/d");
        assert_eq!(repo.load_by_resource_locator("/a/c/d", &scope()).unwrap(), id("d"));
    }

    #[test]
    fn history_lists_each_path_once() {
        let (repo, _dir) = tmp_db();
        for (secs, path) in ["/one", "/two", "/one", "/two", "/three"].into_iter().enumerate() {
            repo.save(&update("a", path, secs as u64)).unwrap();
        }

        let history = repo.load_history_by_content_uuid(&id("a"), &scope()).unwrap();
        let paths: Vec<&str> = history.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(paths, vec!["/one", "/two"]);
        // the latest retirement wins
        assert_eq!(history[1].retired_at, UNIX_EPOCH + Duration::from_secs(4));
    }

    #[test]
    fn upsert_rejects_cycles() {
        let (repo, _dir) = tmp_db();
        repo.upsert_node(Some(&id("root")), TreeNode::new(id("a"), true), &scope()).unwrap();
        repo.upsert_node(Some(&id("a")), TreeNode::new(id("b"), true), &scope()).unwrap();

        let err = repo
            .upsert_node(Some(&id("b")), TreeNode::new(id("b"), true), &scope())
            .unwrap_err();
        assert!(matches!(err, CoreError::TreeCycle(n) if n == id("b")));
        let err = repo
            .upsert_node(Some(&id("b")), TreeNode::new(id("a"), true), &scope())
            .unwrap_err();
        assert!(matches!(err, CoreError::TreeCycle(n) if n == id("a")));
        assert!(repo.check_parent(&id("b"), &id("root"), &scope()).is_err());
        assert!(repo.check_parent(&id("root"), &id("b"), &scope()).is_ok());

        assert_eq!(repo.children(&id("root"), &scope()).unwrap()[0].content_id, id("a"));
        assert!(repo.children(&id("b"), &scope()).unwrap().is_empty());
    }
}
