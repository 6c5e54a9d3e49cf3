//! Route targets.
//!
//! A target says what a matched route does with the request:
//! - `run <args>` hands the request to the route's handler (the default rule)
//! - `redirect <status> <location>` answers with a redirect
//! - `write <status> <body>` answers with a literal body

use std::fmt;

use axum::http::StatusCode;

use crate::routing::route::RouteError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Dispatch to the route's handler. The argument is kept for the report.
    Run(String),
    Redirect { status: StatusCode, location: String },
    Write { status: StatusCode, body: String },
}

impl Default for Target {
    fn default() -> Self {
        Target::Run(String::new())
    }
}

impl Target {
    /// Parse a target directive. An empty directive is `run` with no arguments.
    pub fn parse(directive: &str) -> Result<Self, RouteError> {
        let directive = directive.trim();
        let (rule, rest) = match directive.split_once(char::is_whitespace) {
            Some((rule, rest)) => (rule, rest.trim()),
            None => (directive, ""),
        };

        match rule {
            "" => Ok(Target::default()),
            "run" => Ok(Target::Run(rest.to_string())),
            "redirect" => {
                let (status, location) = split_status(directive, rest)?;
                if !status.is_redirection() {
                    return Err(invalid(directive, "redirect status must be 3xx"));
                }
                if location.is_empty() {
                    return Err(invalid(directive, "missing redirect location"));
                }
                Ok(Target::Redirect { status, location })
            }
            "write" => {
                let (status, body) = split_status(directive, rest)?;
                Ok(Target::Write { status, body })
            }
            _ => Err(invalid(directive, "unknown target rule")),
        }
    }

    pub fn is_run(&self) -> bool {
        matches!(self, Target::Run(_))
    }
}

fn invalid(directive: &str, reason: &str) -> RouteError {
    RouteError::InvalidTarget {
        target: directive.to_string(),
        reason: reason.to_string(),
    }
}

fn split_status(directive: &str, rest: &str) -> Result<(StatusCode, String), RouteError> {
    let (code, tail) = match rest.split_once(char::is_whitespace) {
        Some((code, tail)) => (code, tail.trim()),
        None => (rest, ""),
    };
    let status = code
        .parse::<u16>()
        .ok()
        .and_then(|c| StatusCode::from_u16(c).ok())
        .ok_or_else(|| invalid(directive, "invalid status code"))?;
    Ok((status, tail.to_string()))
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Run(args) if args.is_empty() => write!(f, "$&"),
            Target::Run(args) => write!(f, "{}", args),
            Target::Redirect { status, location } => {
                write!(f, "redirect {} {}", status.as_u16(), location)
            }
            Target::Write { status, body } => write!(f, "write {} {}", status.as_u16(), body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        assert_eq!(Target::parse("").unwrap(), Target::Run(String::new()));
        assert_eq!(Target::parse("run $&").unwrap(), Target::Run("$&".into()));
        assert_eq!(
            Target::parse("redirect 301 /new/home").unwrap(),
            Target::Redirect {
                status: StatusCode::MOVED_PERMANENTLY,
                location: "/new/home".into()
            }
        );
        assert_eq!(
            Target::parse("write 503 down for maintenance").unwrap(),
            Target::Write {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "down for maintenance".into()
            }
        );
    }

    #[test]
    fn test_invalid_targets() {
        assert!(Target::parse("redirect 200 /x").is_err());
        assert!(Target::parse("redirect 302").is_err());
        assert!(Target::parse("write abc").is_err());
        assert!(Target::parse("proxy http://x").is_err());
    }

    #[test]
    fn test_display_placeholder() {
        assert_eq!(Target::default().to_string(), "$&");
        assert_eq!(Target::parse("redirect 302 /a").unwrap().to_string(), "redirect 302 /a");
    }
}
