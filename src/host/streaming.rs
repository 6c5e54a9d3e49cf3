//! Per-host streaming policy.
//!
//! Decides whether a request body of a given mime type is handed to the
//! handler incrementally (streamed) or buffered first. Rules are keyed by
//! mime type without parameters. A rule may be restricted to URIs under a
//! prefix; requests outside the prefix stream.

use std::collections::HashMap;

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const JSON: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRule {
    /// Only URIs starting with this prefix are subject to the rule.
    pub uri_prefix: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StreamingTable {
    rules: HashMap<String, StreamRule>,
}

/// Strip `;` parameters and surrounding whitespace from a mime type.
pub fn normalize_mime(mime: &str) -> &str {
    mime.split(';').next().unwrap_or(mime).trim()
}

impl StreamingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table every new host starts with: form and JSON bodies registered,
    /// without restricting streaming.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.set(FORM_URLENCODED, None, true);
        table.set(JSON, None, true);
        table
    }

    pub fn get(&self, mime: &str) -> Option<&StreamRule> {
        self.rules.get(normalize_mime(mime))
    }

    /// Whether a body of `mime` sent to `uri` should be streamed.
    pub fn is_streaming(&self, mime: &str, uri: &str) -> bool {
        match self.get(mime) {
            None => true,
            Some(StreamRule {
                uri_prefix: Some(prefix),
                enabled,
            }) => !uri.starts_with(prefix.as_str()) || *enabled,
            Some(rule) => rule.enabled,
        }
    }

    /// Insert or replace the rule for `mime`.
    pub fn set(&mut self, mime: &str, uri_prefix: Option<&str>, enabled: bool) {
        self.rules.insert(
            normalize_mime(mime).to_string(),
            StreamRule {
                uri_prefix: uri_prefix.map(str::to_string),
                enabled,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StreamRule)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_rule_streams() {
        let table = StreamingTable::new();
        assert!(table.is_streaming("text/plain", "/upload"));
    }

    #[test]
    fn test_defaults_do_not_disable() {
        let table = StreamingTable::with_defaults();
        assert_eq!(table.len(), 2);
        assert!(table.is_streaming(JSON, "/api"));
        assert!(table.is_streaming(FORM_URLENCODED, "/form"));
    }

    #[test]
    fn test_parameters_stripped() {
        let mut table = StreamingTable::new();
        table.set("text/html", None, false);
        assert!(!table.is_streaming("text/html; charset=utf-8", "/"));
        assert!(!table.is_streaming(" text/html ;q=1", "/"));

        table.set("image/png; x=y", None, false);
        assert!(table.get("image/png").is_some());
    }

    #[test]
    fn test_prefix_rule() {
        let mut table = StreamingTable::new();
        table.set("application/octet-stream", Some("/upload"), false);
        assert!(!table.is_streaming("application/octet-stream", "/upload/big"));
        assert!(table.is_streaming("application/octet-stream", "/other"));

        // Upsert replaces the previous rule.
        table.set("application/octet-stream", None, true);
        assert!(table.is_streaming("application/octet-stream", "/upload/big"));
        assert_eq!(table.len(), 1);
    }
}
