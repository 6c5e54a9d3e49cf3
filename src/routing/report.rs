//! Human-readable route dump.
//!
//! Two layouts: a one-line-per-route table, and a full per-route block listing
//! every configured attribute. Hidden routes are left out. A host's default
//! route that was never added to its table is printed last.

use std::fmt::Write;
use std::sync::Arc;

use crate::host::Host;
use crate::routing::route::Route;

/// Render the routes of `host`.
pub fn log_routes(host: &Host, full: bool) -> String {
    let mut out = String::from("\n");
    if !full {
        let _ = writeln!(
            out,
            "{:<18} {:<12} {:<8} {:<46} {:<14}",
            "Route Name", "Methods", "Auth", "Pattern", "Target"
        );
    }

    let table = host.route_table();
    let default_route = host.default_route();
    let mut found_default = false;
    for (index, route) in table.iter().enumerate() {
        write_route(&mut out, route, index, full);
        if default_route.as_ref().is_some_and(|d| Arc::ptr_eq(d, route)) {
            found_default = true;
        }
    }
    if let (false, Some(route)) = (found_default, default_route.as_ref()) {
        write_route(&mut out, route, table.len(), full);
    }
    out.push('\n');
    out
}

fn methods_label(route: &Route) -> String {
    match route.methods() {
        Some(methods) => methods
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(","),
        None => "*".to_string(),
    }
}

fn pattern_label(route: &Route) -> &str {
    if route.pattern().is_empty() {
        "^/"
    } else {
        route.pattern()
    }
}

fn write_route(out: &mut String, route: &Route, index: usize, full: bool) {
    if route.is_hidden() {
        return;
    }
    let methods = methods_label(route);
    let pattern = pattern_label(route);
    let target = route.target().to_string();

    if !full {
        let _ = writeln!(
            out,
            "{:<18} {:<12} {:<8} {:<46} {:<14}",
            route.name(),
            methods,
            route.auth().type_name().unwrap_or("none"),
            pattern,
            target
        );
        return;
    }

    let _ = writeln!(out, "\n Route [{}]. {}", index, route.name());
    let _ = writeln!(out, "    Pattern:      {}", pattern);
    if !route.start_with().is_empty() {
        let _ = writeln!(out, "    Prefix:       {}", route.start_with());
    }
    let _ = writeln!(out, "    RegExp:       {}", route.path_pattern());
    let _ = writeln!(out, "    Methods:      {}", methods);
    let _ = writeln!(out, "    Target:       {}", target);
    let _ = writeln!(out, "    Auth:         {}", route.auth().type_name().unwrap_or("-"));
    let _ = writeln!(out, "    Home:         {}", route.home().display());
    let _ = writeln!(out, "    Documents:    {}", route.documents().display());
    if let Some(source) = route.source() {
        let _ = writeln!(out, "    Source:       {}", source);
    }
    if let Some(template) = route.template() {
        let _ = writeln!(out, "    Template:     {}", template);
    }
    for index in route.indexes() {
        let _ = writeln!(out, "    Indexes:      {} ", index);
    }
    for condition in route.conditions() {
        let _ = writeln!(
            out,
            "    Condition:    {} {}",
            condition.name(),
            condition.details().unwrap_or_default()
        );
    }
    if let Some(handler) = route.handler() {
        let _ = writeln!(out, "    Handler:      {}", handler.name());
    }
    for (ext, handler) in route.extensions() {
        let _ = writeln!(out, "    Extension:    \"{}\" => {}", ext, handler.name());
    }
    for handler in route.handlers() {
        let _ = writeln!(out, "    Handler:      {}", handler.name());
    }
}
