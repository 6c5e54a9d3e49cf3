use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub uptime_secs: u64,
    pub hosts: usize,
    pub actions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HostSummary {
    pub name: Option<String>,
    pub parent: Option<String>,
    pub default: bool,
    pub routes: usize,
    pub shares_routes: bool,
    pub shares_streaming: bool,
    pub trace: bool,
    pub cached_responses: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoutesQuery {
    /// Host name; the default host when absent.
    pub host: Option<String>,
    #[serde(default)]
    pub full: bool,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let inner = state.load();
    let ctx = &inner.context;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        uptime_secs: state.started.elapsed().as_secs(),
        hosts: ctx.hosts().len(),
        actions: ctx.action_handler().map(|h| h.registry().len()).unwrap_or(0),
    })
}

pub async fn get_hosts(State(state): State<AppState>) -> Json<Vec<HostSummary>> {
    let inner = state.load();
    let default = inner.context.default_host();

    let summaries = inner
        .context
        .hosts()
        .hosts()
        .into_iter()
        .map(|host| HostSummary {
            name: host.name(),
            parent: host.parent().and_then(|p| p.name()),
            default: default
                .as_ref()
                .is_some_and(|d| std::sync::Arc::ptr_eq(d, &host)),
            routes: host.route_table().len(),
            shares_routes: host.shares_routes(),
            shares_streaming: host.shares_streaming(),
            trace: !host.no_trace(),
            cached_responses: host.cache().len(),
        })
        .collect();

    Json(summaries)
}

/// Plain-text route dump for one host.
pub async fn get_routes(
    State(state): State<AppState>,
    Query(query): Query<RoutesQuery>,
) -> Result<String, (StatusCode, String)> {
    let inner = state.load();
    let ctx = &inner.context;
    let host = match &query.host {
        Some(name) => Some(ctx.hosts().lookup(name).ok_or_else(|| {
            (StatusCode::NOT_FOUND, format!("Unknown host: {}", name))
        })?),
        None => None,
    };

    ctx.log_routes(host.as_ref(), query.full)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "No default host".to_string()))
}

pub async fn get_actions(State(state): State<AppState>) -> Json<Vec<String>> {
    let inner = state.load();
    let names = inner
        .context
        .action_handler()
        .map(|h| h.registry().names())
        .unwrap_or_default();
    Json(names)
}
