//! Development server implementation.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use quarry_static::{BuildOptions, GraphError, Orchestrator, SiteLayout, TaskId};
use tokio::sync::mpsc;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::dispatch::{Dispatcher, WatchTable};
use crate::livereload::{
    client_script, inject_client, next_message, ReloadHub, ReloadMessage, LIVERELOAD_PATH,
    LIVERELOAD_SCRIPT_PATH,
};
use crate::watcher::{FileWatcher, WatchEvent};

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Source and output trees
    pub layout: SiteLayout,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,

    /// Quiet period before a batch of source changes is rebuilt
    pub debounce: Duration,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            layout: SiteLayout::default(),
            port: 4567,
            host: "127.0.0.1".to_string(),
            open: true,
            debounce: Duration::from_millis(150),
        }
    }
}

impl DevServerConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("File watch error: {0}")]
    Watch(String),

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("Task graph error: {0}")]
    Graph(#[from] GraphError),
}

/// Shared server state.
struct ServerState {
    output_dir: PathBuf,
    hub: ReloadHub,
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    /// Build once, then serve the output tree until the process ends.
    pub async fn start(self) -> Result<(), ServerError> {
        let mut layout = self.config.layout.clone();
        std::fs::create_dir_all(&layout.output_dir)?;
        layout.source_dir = layout
            .source_dir
            .canonicalize()
            .map_err(|e| ServerError::Watch(format!("{}: {}", layout.source_dir.display(), e)))?;
        layout.output_dir = layout.output_dir.canonicalize()?;

        let orchestrator = Orchestrator::new(layout.clone())?;
        initial_build(&orchestrator).await;

        let table =
            WatchTable::standard(&layout).map_err(|e| ServerError::Watch(e.to_string()))?;
        let (source_watcher, source_rx) = FileWatcher::new(&[layout.source_dir.clone()])
            .map_err(|e| ServerError::Watch(e.to_string()))?;

        let dispatcher = Dispatcher::new(orchestrator, table, self.config.debounce);
        tokio::spawn(async move {
            dispatcher.run(source_rx).await;
            // Keep watcher alive
            drop(source_watcher);
        });

        let hub = ReloadHub::new();
        let (output_watcher, output_rx) = FileWatcher::new(&[layout.output_dir.clone()])
            .map_err(|e| ServerError::Watch(e.to_string()))?;

        let notify_hub = hub.clone();
        let output_dir = layout.output_dir.clone();
        let debounce = self.config.debounce;
        tokio::spawn(async move {
            forward_changes(output_rx, &output_dir, &notify_hub, debounce).await;
            drop(output_watcher);
        });

        let state = Arc::new(ServerState {
            output_dir: layout.output_dir.clone(),
            hub,
        });
        let app = router(state);

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                message: e.to_string(),
            })?;
        let local: SocketAddr = listener.local_addr()?;

        tracing::info!("Serving {} at http://{}", layout.output_dir.display(), local);

        if self.config.open {
            let url = self.config.url();
            if let Err(e) = open::that(&url) {
                tracing::warn!("Could not open browser at {}: {}", url, e);
            }
        }

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn initial_build(orchestrator: &Orchestrator) {
    let tasks: BTreeSet<TaskId> = TaskId::BUILD.into();

    match orchestrator.run(&tasks, BuildOptions::uncompressed()).await {
        Ok(report) if report.is_success() => {
            tracing::info!("Initial build finished in {}ms", report.duration_ms);
        }
        Ok(report) => {
            for (id, e) in report.failures() {
                tracing::error!("Initial build: {} failed: {}", id, e);
            }
        }
        Err(e) => tracing::error!("Cannot schedule initial build: {}", e),
    }
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(LIVERELOAD_PATH, get(ws_handler))
        .route(LIVERELOAD_SCRIPT_PATH, get(livereload_script_handler))
        .fallback(static_handler)
        .with_state(state)
}

/// Push one notification per changed output file, deduplicated within
/// each burst.
async fn forward_changes(
    mut rx: mpsc::Receiver<WatchEvent>,
    output_dir: &Path,
    hub: &ReloadHub,
    debounce: Duration,
) {
    while let Some(first) = rx.recv().await {
        let mut changed = BTreeSet::new();
        changed.extend(output_relative(output_dir, first.path()));

        while let Ok(Some(event)) = tokio::time::timeout(debounce, rx.recv()).await {
            changed.extend(output_relative(output_dir, event.path()));
        }

        for path in changed {
            tracing::debug!("Output changed: {}", path);
            hub.send(ReloadMessage::Changed { path });
        }
    }
}

/// `/`-separated path of `path` inside `output_dir`.
fn output_relative(output_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(output_dir).ok()?;
    let parts: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();

    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Map a request path onto the output tree, refusing anything that climbs
/// out of it.
fn resolve_request(output_dir: &Path, uri_path: &str) -> Option<PathBuf> {
    let mut path = output_dir.to_path_buf();

    for segment in uri_path.split('/').filter(|s| !s.is_empty()) {
        if segment == ".." || segment == "." || segment.contains('\\') {
            return None;
        }
        path.push(segment);
    }

    if path.is_dir() {
        path.push("index.html");
    }
    Some(path)
}

/// Serve the output tree, injecting the live reload client into pages.
async fn static_handler(State(state): State<Arc<ServerState>>, req: Request) -> Response {
    if let Some(page) = resolve_request(&state.output_dir, req.uri().path()) {
        if page.extension().and_then(|e| e.to_str()) == Some("html") && page.is_file() {
            match tokio::fs::read_to_string(&page).await {
                Ok(html) => return Html(inject_client(&html)).into_response(),
                Err(e) => tracing::warn!("Failed to read {}: {}", page.display(), e),
            }
        }
    }

    match ServeDir::new(&state.output_dir).oneshot(req).await {
        Ok(res) => res.map(Body::new).into_response(),
        Err(never) => match never {},
    }
}

/// Handler for the live reload WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();

    if send_message(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    // Forward reload messages to the client
    while let Some(msg) = next_message(&mut rx).await {
        if send_message(&mut socket, &msg).await.is_err() {
            break;
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

/// Handler for the live reload client script.
async fn livereload_script_handler() -> impl IntoResponse {
    ([("content-type", "application/javascript")], client_script())
}
