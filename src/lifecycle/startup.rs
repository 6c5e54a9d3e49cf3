//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Build a server context: action handler, endpoints, hosts, routes
//! - Create virtual hosts after the hosts they derive from
//! - Start every host
//!
//! # Design Decisions
//! - Fail fast: any build error is fatal and no partial context escapes
//! - Hosts are created in dependency order, not file order
//! - The action registry is passed in so reloads keep registered actions

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use thiserror::Error;

use crate::action::ActionRegistry;
use crate::config::schema::{HostConfig, RouteConfig, ServerConfig};
use crate::config::validation::{host_label, join_errors, validate_config, ValidationError};
use crate::context::ServerContext;
use crate::host::{Host, HostError};
use crate::net::Endpoint;
use crate::routing::condition::parse_condition;
use crate::routing::route::{Auth, Route, RouteError};
use crate::routing::target::Target;

/// Name of the plain endpoint.
pub const MAIN_ENDPOINT: &str = "main";
/// Name of the endpoint whose requests are marked secure.
pub const SECURE_ENDPOINT: &str = "secure";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", join_errors(.0))]
    Config(Vec<ValidationError>),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("host {host}: {source}")]
    Route {
        host: String,
        #[source]
        source: RouteError,
    },
}

/// Build and start a context for `config`.
pub fn build_context(
    config: &ServerConfig,
    actions: ActionRegistry,
) -> Result<ServerContext, StartupError> {
    validate_config(config).map_err(StartupError::Config)?;

    let ctx = ServerContext::with_settings(
        config.limits.clone(),
        Duration::from_secs(config.cache.max_duration_secs),
    );
    ctx.open_action_handler_with(actions);

    let main = ctx.add_endpoint(Endpoint::new(
        MAIN_ENDPOINT,
        config.listener.bind_address.clone(),
        false,
    ));
    let secure = config
        .listener
        .secure_address
        .as_ref()
        .map(|addr| ctx.add_endpoint(Endpoint::new(SECURE_ENDPOINT, addr.clone(), true)));

    if !config.hosts.iter().any(|h| h.default) {
        let host = ctx.create_default_host()?;
        attach_endpoints(&host, &main, secure.as_ref());
    }

    let mut built: HashMap<String, Arc<Host>> = HashMap::new();
    for host_config in creation_order(&config.hosts) {
        let host = create_host(&ctx, host_config, &built)?;
        if host_config.parent.is_none() {
            attach_endpoints(&host, &main, secure.as_ref());
        }
        configure_host(&ctx, &host, host_config)?;
        if let Some(name) = &host_config.name {
            built.insert(name.clone(), host);
        }
    }

    ctx.start()?;
    tracing::info!(
        hosts = ctx.hosts().len(),
        actions = ctx.action_handler().map(|h| h.registry().len()).unwrap_or(0),
        "Server context built"
    );
    Ok(ctx)
}

fn attach_endpoints(host: &Arc<Host>, main: &Arc<Endpoint>, secure: Option<&Arc<Endpoint>>) {
    host.set_default_endpoint(main);
    if let Some(secure) = secure {
        host.set_secure_endpoint(secure);
    }
}

/// Hosts ordered so every parent precedes its virtual hosts. Assumes
/// validated input: parents exist and there are no cycles.
fn creation_order(hosts: &[HostConfig]) -> Vec<&HostConfig> {
    let mut ordered: Vec<&HostConfig> = Vec::with_capacity(hosts.len());
    let mut pending: Vec<&HostConfig> = hosts.iter().collect();
    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|host| {
            let ready = match &host.parent {
                None => true,
                Some(parent) => ordered
                    .iter()
                    .any(|h| h.name.as_deref() == Some(parent.as_str())),
            };
            if ready {
                ordered.push(*host);
            }
            !ready
        });
        if pending.len() == before {
            break;
        }
    }
    ordered
}

fn create_host(
    ctx: &ServerContext,
    config: &HostConfig,
    built: &HashMap<String, Arc<Host>>,
) -> Result<Arc<Host>, StartupError> {
    let host = if config.default {
        ctx.create_default_host()?
    } else {
        match config.parent.as_ref().and_then(|p| built.get(p)) {
            Some(parent) => ctx.clone_host(parent)?,
            None => ctx.create_host()?,
        }
    };
    if let Some(name) = &config.name {
        host.set_name(name.clone());
    }
    if config.ip.is_some() || config.port.is_some() {
        host.set_ip_port(config.ip.clone(), config.port);
    }
    if let Some(trace) = config.trace {
        host.set_no_trace(!trace);
    }
    Ok(host)
}

fn configure_host(
    ctx: &ServerContext,
    host: &Arc<Host>,
    config: &HostConfig,
) -> Result<(), StartupError> {
    if config.reset_routes {
        host.reset_routes();
    }
    for route_config in &config.routes {
        let route = build_route(ctx, host, route_config).map_err(|source| StartupError::Route {
            host: host_label(config),
            source,
        })?;
        host.add_route(route);
    }
    for rule in &config.streaming {
        host.set_streaming(&rule.mime, rule.uri.as_deref(), rule.enabled);
    }
    Ok(())
}

/// Build a route from its configuration. Parent routes are looked up on `host`.
pub fn build_route(
    ctx: &ServerContext,
    host: &Arc<Host>,
    config: &RouteConfig,
) -> Result<Arc<Route>, RouteError> {
    let mut builder = match &config.parent {
        Some(parent_name) => {
            let parent = host
                .lookup_route(parent_name)
                .ok_or_else(|| RouteError::UnknownParent {
                    route: config.name.clone(),
                    parent: parent_name.clone(),
                })?;
            Route::inherit(config.name.clone(), &parent)
        }
        None => Route::builder(config.name.clone()).limits(ctx.limits().clone()),
    };

    builder = builder
        .pattern(config.pattern.clone())
        .target(Target::parse(&config.target)?);

    if !config.methods.is_empty() {
        let methods = config
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|_| RouteError::InvalidMethod(m.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        builder = builder.methods(methods);
    }
    for condition in &config.conditions {
        builder = builder.condition(parse_condition(condition)?);
    }
    if let Some(handler) = &config.handler {
        builder = builder.handler(ctx.stage(handler)?);
    }
    for handler in &config.handlers {
        builder = builder.add_handler(ctx.stage(handler)?);
    }
    for (ext, handler) in &config.extensions {
        builder = builder.extension(ext.clone(), ctx.stage(handler)?);
    }
    if let Some(auth) = &config.auth {
        builder = builder.auth(Auth::new(auth.clone()));
    }
    if let Some(home) = &config.home {
        builder = builder.home(home.clone());
    }
    if let Some(documents) = &config.documents {
        builder = builder.documents(documents.clone());
    }
    if let Some(source) = &config.source {
        builder = builder.source(source.clone());
    }
    if let Some(template) = &config.template {
        builder = builder.template(template.clone());
    }
    for index in &config.indexes {
        builder = builder.index(index.clone());
    }
    if let Some(trace) = &config.trace {
        builder = builder.trace(trace.clone());
    }
    if let Some(secs) = config.cache_lifespan_secs {
        builder = builder.cache_lifespan(Duration::from_secs(secs));
    }
    if let Some(limits) = &config.limits {
        builder = builder.limits(limits.clone());
    }

    builder
        .hidden(config.hidden)
        .grouped(config.grouped)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::action;
    use crate::config::loader::from_toml_str;

    const CONFIG: &str = r#"
        [limits]
        max_body_size = 4096

        [[hosts]]
        name = "app.example.com"
        parent = "example.com"
        trace = true

        [[hosts.routes]]
        name = "v2"
        pattern = "^/app/v2/(.*)"
        parent = "app"

        [[hosts.streaming]]
        mime = "application/octet-stream"
        uri = "/upload"
        enabled = false

        [[hosts]]
        name = "example.com"
        default = true

        [[hosts.routes]]
        name = "app"
        pattern = "^/app/(.*)"
        handler = "actionHandler"
        auth = "basic"
        trace = { level = "debug" }

        [[hosts.routes]]
        name = "status"
        pattern = "^/status$"
        target = "write 200 ok"
    "#;

    #[test]
    fn test_build_context() {
        let config = from_toml_str(CONFIG).unwrap();
        let actions = ActionRegistry::new();
        actions.define("/app/hello", action(|_| Ok(())));

        let ctx = build_context(&config, actions).unwrap();
        assert_eq!(ctx.hosts().len(), 2);

        let default = ctx.default_host().unwrap();
        assert_eq!(default.name().as_deref(), Some("example.com"));
        assert_eq!(default.route_table().len(), 2);
        assert_eq!(default.default_route().unwrap().limits().max_body_size, 4096);
        assert!(default.no_trace());
        assert_eq!(default.default_endpoint().unwrap().name(), MAIN_ENDPOINT);

        let vhost = ctx.hosts().lookup("app.example.com").unwrap();
        assert!(vhost.is_vhost());
        assert!(!vhost.no_trace());
        assert!(!vhost.shares_routes());
        assert!(!vhost.shares_streaming());
        assert_eq!(vhost.route_table().len(), 3);
        assert!(!vhost.get_streaming("application/octet-stream", "/upload/x"));

        let v2 = vhost.lookup_route("v2").unwrap();
        assert_eq!(v2.auth().type_name(), Some("basic"));
        assert_eq!(v2.handler().unwrap().name(), "actionHandler");
        // Inherited at host start from the standalone parent route.
        assert!(v2.trace().is_some());
        assert!(v2.is_started());

        assert!(ctx.action_handler().unwrap().registry().contains("/app/hello"));
    }

    #[test]
    fn test_implicit_default_host() {
        let config = from_toml_str(
            r#"
            [[hosts]]
            name = "only.example.com"
            "#,
        )
        .unwrap();
        let ctx = build_context(&config, ActionRegistry::new()).unwrap();
        assert_eq!(ctx.hosts().len(), 2);
        assert!(ctx.default_host().unwrap().name().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config: ServerConfig = toml::from_str(
            r#"
            [[hosts]]
            name = "a"
            parent = "nope"
            "#,
        )
        .unwrap();
        assert!(matches!(
            build_context(&config, ActionRegistry::new()),
            Err(StartupError::Config(_))
        ));
    }

    #[test]
    fn test_creation_order() {
        let config: ServerConfig = toml::from_str(
            r#"
            [[hosts]]
            name = "c"
            parent = "b"
            [[hosts]]
            name = "b"
            parent = "a"
            [[hosts]]
            name = "a"
            "#,
        )
        .unwrap();
        let names: Vec<_> = creation_order(&config.hosts)
            .iter()
            .map(|h| h.name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
