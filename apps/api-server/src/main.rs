//! api-server — Local development HTTP API for the resource locator workspace.
//!
//! Exposes generation, cleanup, tree-aware saving, redirect resolution and
//! history for content node paths, and supports local dev with:
//! - Storage: In-memory or SQLite (file) when the `sqlite` feature is enabled.
//! - Strategy: full-edit or leaf-edit cascades, chosen via TREE_STRATEGY.
//! - CORS: Configurable via CORS_ALLOW_ORIGIN (origin string) for admin frontends.
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p api-server
//!
//! # full-edit cascades against an in-memory store, JSON logs
//! TREE_STRATEGY=full STORAGE_PROVIDER=memory LOG_FORMAT=json \
//!   cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.
//!

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use domain::adapters::memory_repo::{InMemoryContentTree, InMemoryPathMapper};
use domain::{
    ContentId, ContentTree, CoreError, HistoryEntry, NodeKind, PathCleanup, PathMapper,
    PathUpdate, ResourceDocument, ResourceLocatorStrategy, SaveOutcome, Scope,
    TreeFullEditStrategy, TreeLeafEditStrategy, TreeNode, UserId,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Local store abstraction supporting memory or sqlite (feature-gated).
enum StoreKind {
    Memory {
        mapper: InMemoryPathMapper,
        tree: InMemoryContentTree,
    },
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteRepo),
}

#[derive(Clone)]
struct AnyStore {
    kind: Arc<StoreKind>,
}

impl AnyStore {
    fn memory() -> Self {
        Self {
            kind: Arc::new(StoreKind::Memory {
                mapper: InMemoryPathMapper::new(),
                tree: InMemoryContentTree::new(),
            }),
        }
    }

    #[cfg(feature = "sqlite")]
    fn sqlite(db_path: Option<&std::path::Path>) -> Result<Self, CoreError> {
        let repo = match db_path {
            Some(path) => {
                if let Some(dir) = path.parent() {
                    let _ = std::fs::create_dir_all(dir);
                }
                sqlite_adapter::SqliteRepo::new(path)?
            }
            None => sqlite_adapter::SqliteRepo::from_env()?,
        };
        Ok(Self {
            kind: Arc::new(StoreKind::Sqlite(repo)),
        })
    }

    fn upsert_node(
        &self,
        parent: Option<&ContentId>,
        node: TreeNode,
        scope: &Scope,
    ) -> Result<(), CoreError> {
        match &*self.kind {
            StoreKind::Memory { tree, .. } => tree.upsert_node(parent, node, scope),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(r) => r.upsert_node(parent, node, scope),
        }
    }

    fn check_parent(
        &self,
        parent: &ContentId,
        node: &ContentId,
        scope: &Scope,
    ) -> Result<(), CoreError> {
        match &*self.kind {
            StoreKind::Memory { tree, .. } => tree.check_parent(parent, node, scope),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(r) => r.check_parent(parent, node, scope),
        }
    }
}

impl PathMapper for AnyStore {
    fn load_by_content_uuid(
        &self,
        content_id: &ContentId,
        scope: &Scope,
    ) -> Result<String, CoreError> {
        match &*self.kind {
            StoreKind::Memory { mapper, .. } => mapper.load_by_content_uuid(content_id, scope),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(r) => r.load_by_content_uuid(content_id, scope),
        }
    }

    fn load_by_resource_locator(&self, path: &str, scope: &Scope) -> Result<ContentId, CoreError> {
        match &*self.kind {
            StoreKind::Memory { mapper, .. } => mapper.load_by_resource_locator(path, scope),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(r) => r.load_by_resource_locator(path, scope),
        }
    }

    fn load_history_by_content_uuid(
        &self,
        content_id: &ContentId,
        scope: &Scope,
    ) -> Result<Vec<HistoryEntry>, CoreError> {
        match &*self.kind {
            StoreKind::Memory { mapper, .. } => {
                mapper.load_history_by_content_uuid(content_id, scope)
            }
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(r) => r.load_history_by_content_uuid(content_id, scope),
        }
    }

    fn unique(&self, path: &str, scope: &Scope) -> Result<bool, CoreError> {
        match &*self.kind {
            StoreKind::Memory { mapper, .. } => mapper.unique(path, scope),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(r) => r.unique(path, scope),
        }
    }

    fn get_unique_path(
        &self,
        path: &str,
        scope: &Scope,
        exclude: Option<&ContentId>,
    ) -> Result<String, CoreError> {
        match &*self.kind {
            StoreKind::Memory { mapper, .. } => mapper.get_unique_path(path, scope, exclude),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(r) => r.get_unique_path(path, scope, exclude),
        }
    }

    fn save(&self, update: &PathUpdate) -> Result<(), CoreError> {
        match &*self.kind {
            StoreKind::Memory { mapper, .. } => mapper.save(update),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(r) => r.save(update),
        }
    }

    fn delete_by_path(&self, path: &str, scope: &Scope) -> Result<(), CoreError> {
        match &*self.kind {
            StoreKind::Memory { mapper, .. } => mapper.delete_by_path(path, scope),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(r) => r.delete_by_path(path, scope),
        }
    }
}

impl ContentTree for AnyStore {
    fn children(&self, parent: &ContentId, scope: &Scope) -> Result<Vec<TreeNode>, CoreError> {
        match &*self.kind {
            StoreKind::Memory { tree, .. } => tree.children(parent, scope),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(r) => r.children(parent, scope),
        }
    }
}

#[derive(Clone)]
struct AppState {
    store: AnyStore,
    strategy: Arc<dyn ResourceLocatorStrategy>,
    strategy_kind: config::TreeStrategy,
    cleanup: Arc<PathCleanup>,
    public_base_url: Option<String>,
}

impl AppState {
    fn new(
        store: AnyStore,
        kind: config::TreeStrategy,
        cleanup: PathCleanup,
        public_base_url: Option<String>,
    ) -> Self {
        let strategy: Arc<dyn ResourceLocatorStrategy> = match kind {
            config::TreeStrategy::Full => Arc::new(TreeFullEditStrategy::new(
                store.clone(),
                store.clone(),
                cleanup.clone(),
            )),
            config::TreeStrategy::Leaf => Arc::new(TreeLeafEditStrategy::new(
                store.clone(),
                store.clone(),
                cleanup.clone(),
            )),
        };
        Self {
            store,
            strategy,
            strategy_kind: kind,
            cleanup: Arc::new(cleanup),
            public_base_url,
        }
    }
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_ephemeral();

    let store = build_store_from_env(&cfg);
    let state = AppState::new(
        store,
        cfg.tree_strategy,
        cfg.path_cleanup(),
        cfg.public_base_url.clone(),
    );
    info!(strategy = cfg.tree_strategy.as_str(), "resource locator strategy ready");

    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let mut app = router(state)
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    // CORS - already validated in Config::from_env()
    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::HeaderName::from_static("x-user-id"),
            ])
    };
    app = app.layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    info!(%addr, "api-server listening");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, err = %e, "bind failed");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!(err = %e, "server error");
        std::process::exit(1);
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/cleanup", post(cleanup))
        .route("/api/resource-locators/generate", post(generate))
        .route(
            "/api/resource-locators",
            get(resolve_resource_locator).delete(delete_resource_locator),
        )
        .route("/api/nodes/:id", put(save_node))
        .route("/api/nodes/:id/resource-locator", get(get_node_resource_locator))
        .route("/api/nodes/:id/history", get(get_node_history))
        .with_state(state)
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Construct a store instance based on config and feature flags.
fn build_store_from_env(cfg: &config::Config) -> AnyStore {
    match cfg.storage_provider {
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => match AnyStore::sqlite(cfg.db_path.as_deref()) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("failed to init SqliteRepo from env: {e}");
                AnyStore::memory()
            }
        },
        _ => AnyStore::memory(),
    }
}

// ============================================================================
// Request / response shapes
// ============================================================================

#[derive(Deserialize)]
struct ScopeQuery {
    webspace: String,
    locale: String,
    segment: Option<String>,
}

impl ScopeQuery {
    fn scope(&self) -> Scope {
        Scope::new(self.webspace.as_str(), self.locale.as_str(), self.segment.clone())
    }
}

#[derive(Deserialize)]
struct LocatorQuery {
    path: String,
    webspace: String,
    locale: String,
    segment: Option<String>,
}

impl LocatorQuery {
    fn scope(&self) -> Scope {
        Scope::new(self.webspace.as_str(), self.locale.as_str(), self.segment.clone())
    }
}

#[derive(Deserialize)]
struct CleanupReq {
    raw: String,
    #[serde(default)]
    locale: String,
    #[serde(default)]
    webspace: String,
}

#[derive(Serialize)]
struct CleanupOut {
    path: String,
    valid: bool,
}

#[derive(Deserialize)]
struct GenerateReq {
    title: String,
    parent_id: Option<String>,
    /// Node being regenerated; its own paths do not count as collisions.
    content_id: Option<String>,
    webspace: String,
    locale: String,
    segment: Option<String>,
}

#[derive(Deserialize)]
struct SaveNodeReq {
    /// Explicit path; when absent one is generated from `title`.
    resource_locator: Option<String>,
    title: Option<String>,
    parent_id: Option<String>,
    webspace: String,
    locale: String,
    segment: Option<String>,
    #[serde(default)]
    kind: NodeKind,
    #[serde(default = "default_true")]
    published: bool,
    #[serde(default = "default_true")]
    has_resource_locator: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
struct SaveNodeOut {
    content_id: String,
    resource_locator: String,
    previous: Option<String>,
    changed: bool,
}

#[derive(Serialize)]
struct LocatorOut {
    content_id: String,
    resource_locator: String,
    url: String,
}

#[derive(Serialize)]
struct ResolveOut {
    content_id: String,
    resource_locator: String,
    /// True when the requested path is a retired one.
    moved: bool,
}

#[derive(Serialize)]
struct HistoryItemOut {
    path: String,
    retired_at: String,
    retired_by: Option<String>,
}

#[derive(Serialize)]
struct HistoryOut {
    content_id: String,
    history: Vec<HistoryItemOut>,
}

fn history_to_out(entry: &HistoryEntry) -> HistoryItemOut {
    HistoryItemOut {
        path: entry.path.clone(),
        retired_at: http_common::system_time_to_rfc3339(entry.retired_at),
        retired_by: entry.retired_by.as_ref().map(|u| u.as_str().to_string()),
    }
}

/// Map a domain error to its status and envelope, logging server faults.
fn error_response(err: &CoreError) -> Response {
    let (code, _) = http_common::status_for(err);
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(err = %err, "request failed");
    } else {
        warn!(err = %err, status = code, "request rejected");
    }
    (status, Json(http_common::error_body(err))).into_response()
}

fn user_from_headers(headers: &HeaderMap) -> Result<Option<UserId>, CoreError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(UserId::new)
        .transpose()
}

fn optional_id(raw: Option<&str>) -> Result<Option<ContentId>, CoreError> {
    raw.map(ContentId::new).transpose()
}

fn request_host(headers: &HeaderMap) -> &str {
    headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

// ============================================================================
// Handlers
// ============================================================================

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "strategy": state.strategy_kind.as_str(),
        "about": domain::about(),
    }))
}

async fn cleanup(State(state): State<AppState>, Json(req): Json<CleanupReq>) -> impl IntoResponse {
    let path = state.cleanup.cleanup(&req.raw, &req.locale);
    let valid = state.strategy.is_valid(&path, &req.webspace, &req.locale);
    Json(CleanupOut { path, valid })
}

async fn generate(State(state): State<AppState>, Json(req): Json<GenerateReq>) -> Response {
    let scope = Scope::new(req.webspace.as_str(), req.locale.as_str(), req.segment.clone());
    let result = optional_id(req.parent_id.as_deref()).and_then(|parent| {
        let exclude = optional_id(req.content_id.as_deref())?;
        state
            .strategy
            .generate(&req.title, parent.as_ref(), &scope, exclude.as_ref())
    });
    match result {
        Ok(path) => {
            info!(%scope, title = %req.title, path = %path, "resource locator generated");
            Json(serde_json::json!({ "resource_locator": path })).into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn save_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SaveNodeReq>,
) -> Response {
    let result = (|| -> Result<(ContentId, SaveOutcome, String), CoreError> {
        let content_id = ContentId::new(id)?;
        let user = user_from_headers(&headers)?;
        let parent = optional_id(req.parent_id.as_deref())?;
        let scope = Scope::new(req.webspace.as_str(), req.locale.as_str(), req.segment.clone());

        if let Some(parent) = &parent {
            state.store.check_parent(parent, &content_id, &scope)?;
        }

        let path = match (&req.resource_locator, &req.title) {
            (Some(path), _) => path.clone(),
            (None, Some(title)) => state.strategy.generate(
                title,
                parent.as_ref(),
                &scope,
                Some(&content_id),
            )?,
            (None, None) => {
                return Err(CoreError::ResourceLocatorNotValid(
                    "either resource_locator or title is required".into(),
                ))
            }
        };

        let mut document = ResourceDocument::new(content_id.clone(), path.as_str(), scope);
        document.kind = req.kind;
        // Rejected saves leave the tree untouched; a partial cascade still
        // moved the node itself.
        let saved = state.strategy.save(&document, user.as_ref());
        if matches!(saved, Ok(_) | Err(CoreError::CascadeAdaptationFailed { .. })) {
            let node = TreeNode {
                content_id: content_id.clone(),
                kind: req.kind,
                published: req.published,
                has_resource_locator: req.has_resource_locator,
            };
            state.store.upsert_node(parent.as_ref(), node, &document.scope)?;
        }
        let outcome = saved?;
        Ok((content_id, outcome, path))
    })();

    match result {
        Ok((content_id, outcome, path)) => {
            let previous = match &outcome {
                SaveOutcome::Moved { from, .. } => from.clone(),
                SaveOutcome::Unchanged => Some(path.clone()),
            };
            Json(SaveNodeOut {
                content_id: content_id.as_str().to_string(),
                resource_locator: path,
                previous,
                changed: outcome.is_moved(),
            })
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn get_node_resource_locator(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ScopeQuery>,
    headers: HeaderMap,
) -> Response {
    let scope = q.scope();
    let result = ContentId::new(id).and_then(|content_id| {
        let path = state.strategy.load_by_content_uuid(&content_id, &scope)?;
        Ok((content_id, path))
    });
    match result {
        Ok((content_id, path)) => {
            let url = http_common::build_public_url(
                state.public_base_url.as_deref(),
                request_host(&headers),
                &path,
            );
            Json(LocatorOut {
                content_id: content_id.as_str().to_string(),
                resource_locator: path,
                url,
            })
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn get_node_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ScopeQuery>,
) -> Response {
    let scope = q.scope();
    let result = ContentId::new(id).and_then(|content_id| {
        let entries = state
            .strategy
            .load_history_by_content_uuid(&content_id, &scope)?;
        Ok((content_id, entries))
    });
    match result {
        Ok((content_id, entries)) => Json(HistoryOut {
            content_id: content_id.as_str().to_string(),
            history: entries.iter().map(history_to_out).collect(),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn resolve_resource_locator(
    State(state): State<AppState>,
    Query(q): Query<LocatorQuery>,
) -> Response {
    let scope = q.scope();
    let result = state
        .strategy
        .load_by_resource_locator(&q.path, &scope)
        .and_then(|content_id| {
            let current = state.strategy.load_by_content_uuid(&content_id, &scope)?;
            Ok((content_id, current))
        });
    match result {
        Ok((content_id, current)) => {
            let moved = current != q.path;
            info!(%scope, path = %q.path, content_id = %content_id, moved, "resolve ok");
            Json(ResolveOut {
                content_id: content_id.as_str().to_string(),
                resource_locator: current,
                moved,
            })
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn delete_resource_locator(
    State(state): State<AppState>,
    Query(q): Query<LocatorQuery>,
) -> Response {
    match state.strategy.delete_by_id(&q.path, &q.scope()) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn app(kind: config::TreeStrategy) -> Router {
        let state = AppState::new(AnyStore::memory(), kind, PathCleanup::default(), None);
        router(state)
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<&str>) -> Response {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("X-User-Id", "editor-1");
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        router.clone().oneshot(req).await.unwrap()
    }

    async fn json_of(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn put_node(router: &Router, id: &str, body: serde_json::Value) -> Response {
        send(router, "PUT", &format!("/api/nodes/{id}"), Some(&body.to_string())).await
    }

    async fn path_of(router: &Router, id: &str) -> String {
        let resp = send(
            router,
            "GET",
            &format!("/api/nodes/{id}/resource-locator?webspace=sulu_io&locale=en"),
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        json_of(resp).await["resource_locator"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn health_reports_strategy() {
        let router = app(config::TreeStrategy::Full);
        let resp = send(&router, "GET", "/api/health", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_of(resp).await["strategy"], "full");
    }

    #[tokio::test]
    async fn cleanup_applies_locale_replacers() {
        let router = app(config::TreeStrategy::Leaf);
        let resp = send(
            &router,
            "POST",
            "/api/cleanup",
            Some(r#"{"raw":"Mä   chines & Tools","locale":"de"}"#),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_of(resp).await;
        assert_eq!(body["path"], "/mae-chines-und-tools");
        assert_eq!(body["valid"], true);
    }

    #[tokio::test]
    async fn leaf_edit_flow_over_http() {
        let router = app(config::TreeStrategy::Leaf);
        let scope = serde_json::json!({"webspace": "sulu_io", "locale": "en"});
        let with = |extra: serde_json::Value| {
            let mut v = scope.clone();
            v.as_object_mut()
                .unwrap()
                .extend(extra.as_object().unwrap().clone());
            v
        };

        let resp = put_node(&router, "a", with(serde_json::json!({"resource_locator": "/a"}))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        put_node(
            &router,
            "x",
            with(serde_json::json!({"parent_id": "a", "resource_locator": "/a/x"})),
        )
        .await;
        put_node(
            &router,
            "y",
            with(serde_json::json!({"parent_id": "a", "resource_locator": "/a/y", "published": false})),
        )
        .await;

        let resp = put_node(&router, "a", with(serde_json::json!({"resource_locator": "/b"}))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_of(resp).await;
        assert_eq!(body["changed"], true);
        assert_eq!(body["previous"], "/a");

        assert_eq!(path_of(&router, "x").await, "/b/x");
        assert_eq!(path_of(&router, "y").await, "/a/y");

        // the old path still resolves to its owner
        let resp = send(
            &router,
            "GET",
            "/api/resource-locators?path=/a/x&webspace=sulu_io&locale=en",
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_of(resp).await;
        assert_eq!(body["content_id"], "x");
        assert_eq!(body["resource_locator"], "/b/x");
        assert_eq!(body["moved"], true);

        let resp = send(
            &router,
            "GET",
            "/api/nodes/x/history?webspace=sulu_io&locale=en",
            None,
        )
        .await;
        let body = json_of(resp).await;
        assert_eq!(body["history"][0]["path"], "/a/x");
        assert_eq!(body["history"][0]["retired_by"], "editor-1");
    }

    #[tokio::test]
    async fn title_is_generated_under_parent() {
        let router = app(config::TreeStrategy::Leaf);
        put_node(
            &router,
            "p",
            serde_json::json!({"webspace": "sulu_io", "locale": "de", "resource_locator": "/produkte"}),
        )
        .await;

        let resp = send(
            &router,
            "POST",
            "/api/resource-locators/generate",
            Some(r#"{"title":"Über uns","parent_id":"p","webspace":"sulu_io","locale":"de"}"#),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_of(resp).await["resource_locator"], "/produkte/ueber-uns");

        let resp = send(
            &router,
            "POST",
            "/api/resource-locators/generate",
            Some(r#"{"title":"x","parent_id":"ghost","webspace":"sulu_io","locale":"de"}"#),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_of(resp).await["error"]["code"], "parent_not_found");
    }

    #[tokio::test]
    async fn conflicting_and_invalid_paths_are_rejected() {
        let router = app(config::TreeStrategy::Full);
        let body = |p: &str| serde_json::json!({"webspace": "sulu_io", "locale": "en", "resource_locator": p});

        assert_eq!(put_node(&router, "a", body("/taken")).await.status(), StatusCode::OK);

        let resp = put_node(&router, "b", body("/taken")).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(json_of(resp).await["error"]["code"], "conflict");

        let resp = put_node(&router, "b", body("/Not Valid")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_of(resp).await["error"]["code"], "invalid_resource_locator");
    }

    #[tokio::test]
    async fn cascade_failure_is_multi_status() {
        let router = app(config::TreeStrategy::Full);
        let body = |extra: serde_json::Value| {
            let mut v = serde_json::json!({"webspace": "sulu_io", "locale": "en"});
            v.as_object_mut()
                .unwrap()
                .extend(extra.as_object().unwrap().clone());
            v
        };

        put_node(&router, "a", body(serde_json::json!({"resource_locator": "/a"}))).await;
        put_node(&router, "c", body(serde_json::json!({"parent_id": "a", "resource_locator": "/a/c"}))).await;
        put_node(&router, "o", body(serde_json::json!({"resource_locator": "/b/c"}))).await;

        let resp = put_node(&router, "a", body(serde_json::json!({"resource_locator": "/b"}))).await;
        assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
        let out = json_of(resp).await;
        assert_eq!(out["error"]["code"], "cascade_failed");
        assert_eq!(out["failures"][0]["content_id"], "c");

        assert_eq!(path_of(&router, "a").await, "/b");
        assert_eq!(path_of(&router, "c").await, "/a/c");
    }

    #[tokio::test]
    async fn delete_frees_active_mapping() {
        let router = app(config::TreeStrategy::Leaf);
        put_node(
            &router,
            "a",
            serde_json::json!({"webspace": "sulu_io", "locale": "en", "resource_locator": "/gone"}),
        )
        .await;

        let uri = "/api/resource-locators?path=/gone&webspace=sulu_io&locale=en";
        assert_eq!(send(&router, "DELETE", uri, None).await.status(), StatusCode::NO_CONTENT);
        assert_eq!(send(&router, "DELETE", uri, None).await.status(), StatusCode::NOT_FOUND);

        let resp = send(
            &router,
            "GET",
            "/api/nodes/a/resource-locator?webspace=sulu_io&locale=en",
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rejected_save_leaves_tree_untouched() {
        let router = app(config::TreeStrategy::Leaf);
        let node = |extra: serde_json::Value| {
            let mut v = serde_json::json!({"webspace": "sulu_io", "locale": "en"});
            v.as_object_mut()
                .unwrap()
                .extend(extra.as_object().unwrap().clone());
            v
        };
        put_node(&router, "p1", node(serde_json::json!({"resource_locator": "/p1"}))).await;
        put_node(&router, "p2", node(serde_json::json!({"resource_locator": "/p2"}))).await;
        put_node(
            &router,
            "c",
            node(serde_json::json!({"parent_id": "p1", "resource_locator": "/p1/c"})),
        )
        .await;

        let resp = put_node(
            &router,
            "c",
            node(serde_json::json!({"parent_id": "p2", "resource_locator": "/Bad Path", "published": false})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = put_node(
            &router,
            "c",
            node(serde_json::json!({"parent_id": "p2", "resource_locator": "/p2", "published": false})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        // still a published child of p1, so it follows p1's rename
        put_node(&router, "p1", node(serde_json::json!({"resource_locator": "/q1"}))).await;
        assert_eq!(path_of(&router, "c").await, "/q1/c");
        put_node(&router, "p2", node(serde_json::json!({"resource_locator": "/q2"}))).await;
        assert_eq!(path_of(&router, "c").await, "/q1/c");
    }

    #[tokio::test]
    async fn placing_node_below_its_descendant_is_rejected() {
        let router = app(config::TreeStrategy::Full);
        let node = |extra: serde_json::Value| {
            let mut v = serde_json::json!({"webspace": "sulu_io", "locale": "en"});
            v.as_object_mut()
                .unwrap()
                .extend(extra.as_object().unwrap().clone());
            v
        };
        put_node(&router, "a", node(serde_json::json!({"resource_locator": "/a"}))).await;
        put_node(
            &router,
            "b",
            node(serde_json::json!({"parent_id": "a", "resource_locator": "/a/b"})),
        )
        .await;

        let resp = put_node(
            &router,
            "a",
            node(serde_json::json!({"parent_id": "b", "resource_locator": "/a/b/a"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_of(resp).await["error"]["code"], "tree_cycle");
        assert_eq!(path_of(&router, "a").await, "/a");

        let resp = put_node(
            &router,
            "a",
            node(serde_json::json!({"parent_id": "a", "resource_locator": "/a"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
