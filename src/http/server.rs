//! HTTP server setup and request serving.
//!
//! # Responsibilities
//! - Create the Axum router for each endpoint
//! - Wire up middleware (timeout, request ID, tracing, concurrency limit)
//! - Resolve the host, match a route and run its target
//! - Serve and fill the host's response cache
//! - Publish a rebuilt server context on reload
//!
//! # Design Decisions
//! - All state lives behind one `ArcSwap`; a request sees a single snapshot
//!   from start to finish
//! - Listeners are bound once at startup; a reload replaces hosts and routes,
//!   not endpoints

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::action::ActionRegistry;
use crate::admin::setup_admin_router;
use crate::config::ServerConfig;
use crate::context::ServerContext;
use crate::host::{CachedResponse, Host};
use crate::http::connection::Connection;
use crate::http::pipeline;
use crate::http::request::{RequestInfo, X_REQUEST_ID};
use crate::lifecycle::shutdown::{drain, Shutdown};
use crate::lifecycle::{build_context, StartupError};
use crate::net::{Endpoint, ListenerError};
use crate::observability::{metrics, tracing as route_trace};

/// Label used for metrics when a host has no name.
const UNNAMED_HOST: &str = "default";

/// One published generation of configuration and the context built from it.
pub struct ServerState {
    pub config: ServerConfig,
    pub context: ServerContext,
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<ServerState>>,
    /// True for the router serving the secure endpoint.
    pub secure: bool,
    pub started: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, context: ServerContext) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(ServerState { config, context })),
            secure: false,
            started: Instant::now(),
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<ServerState> {
        self.inner.load_full()
    }

    fn with_secure(&self, secure: bool) -> Self {
        Self {
            secure,
            ..self.clone()
        }
    }
}

/// Error type for running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("server task failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("server task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// HTTP server for the virtual-host router.
pub struct HttpServer {
    state: AppState,
    actions: ActionRegistry,
}

impl HttpServer {
    /// Build the context for `config` and wrap it for serving.
    ///
    /// `actions` stays shared with every context built by later reloads.
    pub fn new(config: ServerConfig, actions: ActionRegistry) -> Result<Self, StartupError> {
        let context = build_context(&config, actions.clone())?;
        Ok(Self {
            state: AppState::new(config, context),
            actions,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Build the Axum router for one endpoint.
    #[allow(deprecated)]
    pub fn router(&self, secure: bool) -> Router {
        let current = self.state.load();
        let timeout = current.context.limits().request_timeout();
        let permits = Arc::new(Semaphore::new(current.config.listener.max_connections.max(1)));
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .fallback(serve_request)
            .with_state(self.state.with_secure(secure))
            .layer(TimeoutLayer::new(timeout))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
            .layer(middleware::from_fn_with_state(permits, limit_concurrency))
    }

    /// Router for the admin API.
    pub fn admin_router(&self) -> Router {
        setup_admin_router(self.state.clone())
    }

    /// Build a context for `config` and publish it. The previous context is
    /// stopped once the new one is live; on error nothing changes.
    pub fn reload(&self, config: ServerConfig) -> Result<(), StartupError> {
        let context = build_context(&config, self.actions.clone())?;
        let previous = self.state.inner.swap(Arc::new(ServerState { config, context }));
        drain(&previous.context);
        tracing::info!(
            hosts = self.state.load().context.hosts().len(),
            "Configuration reloaded"
        );
        Ok(())
    }

    /// Serve every endpoint (and the admin API when enabled) until `shutdown`
    /// is triggered, then stop the context's hosts.
    pub async fn run(&self, shutdown: &Shutdown) -> Result<(), ServerError> {
        let current = self.state.load();

        // Bind everything first so a bad address fails before anything serves.
        let mut bound = Vec::new();
        for endpoint in current.context.endpoints() {
            let listener = endpoint.bind().await?;
            bound.push((endpoint.name().to_string(), listener, self.router(endpoint.is_secure())));
        }
        if current.config.admin.enabled {
            let endpoint = Endpoint::new("admin", current.config.admin.bind_address.clone(), false);
            let listener = endpoint.bind().await?;
            bound.push((endpoint.name().to_string(), listener, self.admin_router()));
        }

        let mut tasks = JoinSet::new();
        for (name, listener, app) in bound {
            let signal = shutdown.subscribe();
            tasks.spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(signal.wait())
                    .await?;
                tracing::info!(endpoint = %name, "Endpoint stopped");
                Ok::<(), std::io::Error>(())
            });
        }

        let mut result = Ok(());
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(ServerError::from)
                .and_then(|r| r.map_err(ServerError::from));
            if let Err(e) = outcome {
                tracing::error!(error = %e, "Server task failed");
                shutdown.trigger();
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        drain(&self.state.load().context);
        result
    }
}

/// Hold a permit for the whole request (backpressure).
async fn limit_concurrency(
    State(permits): State<Arc<Semaphore>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Ok(_permit) = permits.acquire_owned().await else {
        return plain(StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down");
    };
    next.run(request).await
}

fn host_label(host: &Host) -> String {
    host.name().unwrap_or_else(|| UNNAMED_HOST.to_string())
}

fn plain(status: StatusCode, message: &'static str) -> Response {
    (status, message).into_response()
}

fn cached_response(cached: CachedResponse) -> Response {
    let mut response = Response::new(Body::from(cached.body));
    *response.status_mut() = cached.status;
    if let Some(value) = cached
        .content_type
        .and_then(|ct| HeaderValue::from_str(&ct).ok())
    {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

/// Serve one request against the current context.
async fn serve_request(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let current = state.load();
    let (parts, body) = request.into_parts();
    let info = RequestInfo::from_parts(&parts, state.secure);

    let Some(host) = current.context.hosts().resolve(info.host.as_deref()) else {
        tracing::warn!(host = ?info.host, "No host for request");
        return plain(StatusCode::NOT_FOUND, "No matching host");
    };
    let host_name = host_label(&host);

    let Some(route) = host.find_route(&info) else {
        tracing::debug!(host = %host_name, path = %info.path, "No route matched");
        metrics::record_route_miss(&host_name);
        metrics::record_request(&host_name, "none", StatusCode::NOT_FOUND.as_u16(), start);
        return plain(StatusCode::NOT_FOUND, "No matching route");
    };

    let uri = info.uri();
    let limits = route.limits().clone();
    if let Err(status) = limits.check_uri(&uri) {
        metrics::record_request(&host_name, route.name(), status.as_u16(), start);
        return plain(status, "URI too long");
    }

    // Routes sharing a URI (by condition or method) never share an entry.
    let cache_key = format!("{}\0{}\0{}", host_name, route.name(), uri);
    let cacheable = route.cache_lifespan().is_some() && info.method == Method::GET;
    if cacheable {
        if let Some(hit) = host.cache().get(&cache_key) {
            metrics::record_cache_hit(&host_name);
            metrics::record_request(&host_name, route.name(), hit.status.as_u16(), start);
            return cached_response(hit);
        }
    }

    let mime = info
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let mut conn = Connection::new(host.clone(), info).with_route(route.clone());
    conn.set_streaming(host.get_streaming(&mime, &conn.request().path));

    match axum::body::to_bytes(body, limits.max_body_size).await {
        Ok(bytes) => conn.set_request_body(bytes),
        Err(_) => conn.error(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large"),
    }

    route_trace::trace_request(&conn);
    if !conn.is_finalized() {
        pipeline::process(&mut conn);
    }
    route_trace::trace_response(&conn);

    if let Some(lifespan) = route.cache_lifespan().filter(|_| cacheable) {
        store(&host, cache_key, &conn, lifespan);
    }

    metrics::record_request(&host_name, route.name(), conn.status().as_u16(), start);
    conn.into_response()
}

fn store(host: &Host, key: String, conn: &Connection, lifespan: Duration) {
    if !conn.status().is_success() || conn.has_error() {
        return;
    }
    let content_type = conn
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let cached = CachedResponse::new(
        conn.status(),
        content_type,
        axum::body::Bytes::copy_from_slice(conn.body()),
    );
    host.cache().insert(key, cached, lifespan);
}
