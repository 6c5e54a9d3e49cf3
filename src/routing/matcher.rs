//! Route matching logic.
//!
//! # Responsibilities
//! - Compile route patterns into anchored literal matchers
//! - Match method, pattern and conditions (AND semantics)
//! - Walk a route table in order, skipping whole groups on a segment miss
//!
//! # Design Decisions
//! - Patterns are anchored at the start; `$` anchors the end
//! - Only literal prefixes with an optional `(.*)` tail are supported
//! - No regex to guarantee O(n) matching
//! - First match wins

use std::fmt;
use std::sync::Arc;

use crate::http::request::RequestInfo;
use crate::routing::route::{Route, RouteError};
use crate::routing::table::RouteTable;

/// Compiled form of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// The empty pattern: matches every path.
    Any,
    /// Path must start with the literal.
    Prefix(String),
    /// Path must equal the literal.
    Exact(String),
}

const META: &[char] = &['$', '^', '*', '+', '?', '.', '(', ')', '[', ']', '{', '}', '|'];

impl PathPattern {
    /// Compile a normalized pattern. Returns the matcher and its literal prefix.
    pub fn parse(pattern: &str) -> Result<(Self, String), RouteError> {
        if pattern.is_empty() {
            return Ok((PathPattern::Any, String::new()));
        }
        let body = pattern.strip_prefix('^').unwrap_or(pattern);

        let mut literal = String::new();
        let mut rest = "";
        let mut chars = body.char_indices();
        while let Some((i, ch)) = chars.next() {
            if ch == '\\' {
                match chars.next() {
                    Some((_, escaped)) => literal.push(escaped),
                    None => {
                        return Err(RouteError::UnsupportedPattern {
                            pattern: pattern.to_string(),
                        })
                    }
                }
            } else if META.contains(&ch) {
                rest = &body[i..];
                break;
            } else {
                literal.push(ch);
            }
        }

        let compiled = match rest {
            "" | "(.*)" | ".*" | "(.*)$" | ".*$" => {
                if literal.is_empty() {
                    PathPattern::Any
                } else {
                    PathPattern::Prefix(literal.clone())
                }
            }
            "$" => PathPattern::Exact(literal.clone()),
            _ => {
                return Err(RouteError::UnsupportedPattern {
                    pattern: pattern.to_string(),
                })
            }
        };
        Ok((compiled, literal))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Any => true,
            PathPattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
            PathPattern::Exact(exact) => path == exact,
        }
    }
}

/// Anchored regular-expression form of the compiled matcher.
impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (literal, end) = match self {
            PathPattern::Any => return f.write_str("^"),
            PathPattern::Prefix(prefix) => (prefix, ""),
            PathPattern::Exact(exact) => (exact, "$"),
        };
        f.write_str("^")?;
        for ch in literal.chars() {
            if ch == '\\' || META.contains(&ch) {
                f.write_str("\\")?;
            }
            write!(f, "{ch}")?;
        }
        f.write_str(end)
    }
}

impl Route {
    /// Returns true if the request satisfies pattern, methods and conditions.
    pub fn matches(&self, req: &RequestInfo) -> bool {
        if !self.path_pattern().matches(&req.path) {
            return false;
        }
        if let Some(methods) = self.methods() {
            if !methods.contains(&req.method) {
                return false;
            }
        }
        self.conditions().iter().all(|c| c.matches(req))
    }
}

impl RouteTable {
    /// First route accepting the request, in table order.
    ///
    /// A route whose start segment the path does not begin with cannot match,
    /// so the walk jumps to that route's `next_group` when one is recorded.
    pub fn find(&self, req: &RequestInfo) -> Option<Arc<Route>> {
        let mut index = 0;
        while let Some(entry) = self.entry(index) {
            let route = entry.route();
            if !req.path.starts_with(route.start_segment()) {
                index = match entry.next_group() {
                    Some(next) if next > index => next,
                    _ => index + 1,
                };
                continue;
            }
            if route.matches(req) {
                return Some(route.clone());
            }
            index += 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::condition::HostCondition;
    use axum::http::Method;

    fn get(path: &str) -> RequestInfo {
        RequestInfo::new(Method::GET, path)
    }

    #[test]
    fn test_pattern_compile() {
        assert_eq!(PathPattern::parse("").unwrap().0, PathPattern::Any);
        assert_eq!(
            PathPattern::parse("^/app/(.*)").unwrap(),
            (PathPattern::Prefix("/app/".into()), "/app/".into())
        );
        assert_eq!(
            PathPattern::parse("^/status$").unwrap().0,
            PathPattern::Exact("/status".into())
        );
        assert_eq!(
            PathPattern::parse("/index\\.html$").unwrap().0,
            PathPattern::Exact("/index.html".into())
        );
        assert_eq!(PathPattern::parse("^(.*)").unwrap().0, PathPattern::Any);
        assert!(PathPattern::parse("^/a/[0-9]+").is_err());
    }

    #[test]
    fn test_path_matcher() {
        let prefix = PathPattern::Prefix("/api".into());
        assert!(prefix.matches("/api/v1"));
        assert!(!prefix.matches("/images"));

        let exact = PathPattern::Exact("/status".into());
        assert!(exact.matches("/status"));
        assert!(!exact.matches("/status/extra"));
    }

    #[test]
    fn test_pattern_display() {
        assert_eq!(PathPattern::Any.to_string(), "^");
        assert_eq!(PathPattern::Prefix("/app/".into()).to_string(), "^/app/");
        let (exact, _) = PathPattern::parse("/index\\.html$").unwrap();
        assert_eq!(exact.to_string(), "^/index\\.html$");
        assert_eq!(PathPattern::parse(&exact.to_string()).unwrap().0, exact);
    }

    #[test]
    fn test_route_methods_and_conditions() {
        let route = Route::builder("api")
            .pattern("^/api")
            .methods(vec![Method::GET, Method::HEAD])
            .condition(Box::new(HostCondition::new("api.example.com")))
            .build()
            .unwrap();

        let req = get("/api/x").with_host("api.example.com");
        assert!(route.matches(&req));

        let mut post = req.clone();
        post.method = Method::POST;
        assert!(!route.matches(&post));

        assert!(!route.matches(&get("/api/x").with_host("www.example.com")));
    }

    #[test]
    fn test_find_first_match_and_default_last() {
        let mut table = RouteTable::new();
        table.insert(Route::builder("default").build().unwrap());
        table.insert(Route::builder("app").pattern("^/app/(.*)").build().unwrap());
        table.insert(Route::builder("app-exact").pattern("^/app/x$").build().unwrap());
        table.insert(Route::builder("docs").pattern("^/docs").build().unwrap());

        assert_eq!(table.find(&get("/app/x")).unwrap().name(), "app");
        assert_eq!(table.find(&get("/docs/a")).unwrap().name(), "docs");
        assert_eq!(table.find(&get("/other")).unwrap().name(), "default");
    }

    #[test]
    fn test_find_skips_group_on_segment_miss() {
        let mut table = RouteTable::new();
        table.insert(Route::builder("a1").pattern("^/a/1").build().unwrap());
        table.insert(Route::builder("a2").pattern("^/a/2").build().unwrap());
        table.insert(Route::builder("b1").pattern("^/b/1").build().unwrap());

        assert_eq!(table.next_group(0), Some(2));
        assert_eq!(table.find(&get("/b/1")).unwrap().name(), "b1");
        assert!(table.find(&get("/c")).is_none());
    }
}
