//! Ordered route table.
//!
//! # Responsibilities
//! - Keep routes in insertion order with the catch-all route last
//! - Maintain the grouping index (`next_group`) used to skip route groups
//! - Look routes up by name and by pattern
//!
//! # Design Decisions
//! - Entries hold `Arc<Route>`; cloning a table copies the index, not the routes
//! - Insertion is idempotent on route identity
//! - The backward walk that links a group stops at the first route of another
//!   segment, so insertion cost is bounded by one group's size

use std::sync::Arc;

use crate::routing::route::{normalize_pattern, normalize_route_name, Route};

/// A route and the index of the next differently-grouped route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    route: Arc<Route>,
    next_group: Option<usize>,
}

impl RouteEntry {
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn next_group(&self) -> Option<usize> {
        self.next_group
    }
}

/// Result of [`RouteTable::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// Inserted at this index.
    Inserted(usize),
    /// The same route was already in the table at this index.
    Present(usize),
}

impl Insertion {
    pub fn index(self) -> usize {
        match self {
            Insertion::Inserted(i) | Insertion::Present(i) => i,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> Option<&RouteEntry> {
        self.entries.get(index)
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Route>> {
        self.entries.get(index).map(|e| &e.route)
    }

    pub fn next_group(&self, index: usize) -> Option<usize> {
        self.entries.get(index).and_then(|e| e.next_group)
    }

    pub fn last(&self) -> Option<&Arc<Route>> {
        self.entries.last().map(|e| &e.route)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.entries.iter().map(|e| &e.route)
    }

    /// Position of this exact route (identity, not name).
    pub fn position(&self, route: &Arc<Route>) -> Option<usize> {
        self.entries.iter().position(|e| Arc::ptr_eq(&e.route, route))
    }

    pub fn contains(&self, route: &Arc<Route>) -> bool {
        self.position(route).is_some()
    }

    /// Insert a route, keeping a trailing catch-all route last and linking
    /// the preceding group to the new route.
    pub fn insert(&mut self, route: Arc<Route>) -> Insertion {
        if let Some(existing) = self.position(&route) {
            return Insertion::Present(existing);
        }

        let before_default = !route.has_empty_pattern()
            && self.last().is_some_and(|last| last.has_empty_pattern());
        let index = if before_default {
            let index = self.entries.len() - 1;
            self.entries.insert(
                index,
                RouteEntry {
                    route,
                    next_group: None,
                },
            );
            index
        } else {
            self.entries.push(RouteEntry {
                route,
                next_group: None,
            });
            self.entries.len() - 1
        };

        self.link_group(index);
        Insertion::Inserted(index)
    }

    fn link_group(&mut self, index: usize) {
        if index == 0 {
            return;
        }
        let segment = self.entries[index].route.start_segment().to_string();
        let prev_segment = self.entries[index - 1].route.start_segment().to_string();
        if prev_segment == segment {
            return;
        }
        self.entries[index - 1].next_group = Some(index);
        for entry in self.entries[..index - 1].iter_mut().rev() {
            if entry.route.start_segment() != prev_segment {
                break;
            }
            entry.next_group = Some(index);
        }
    }

    /// Route by name; an empty name means `"default"`.
    pub fn lookup(&self, name: &str) -> Option<&Arc<Route>> {
        let name = normalize_route_name(name);
        self.iter().find(|r| r.name() == name)
    }

    /// Route by pattern; every root spelling matches the empty pattern.
    pub fn lookup_by_pattern(&self, pattern: &str) -> Option<&Arc<Route>> {
        let pattern = normalize_pattern(pattern);
        self.iter().find(|r| r.pattern() == pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn route(name: &str, pattern: &str) -> Arc<Route> {
        Route::builder(name).pattern(pattern).build().unwrap()
    }

    fn names(table: &RouteTable) -> Vec<&str> {
        table.iter().map(|r| r.name()).collect()
    }

    #[test]
    fn test_insert_before_trailing_default() {
        let mut table = RouteTable::new();
        table.insert(route("a", "/a"));
        table.insert(route("default", ""));
        assert_eq!(table.insert(route("b", "/b")), Insertion::Inserted(1));
        assert_eq!(table.insert(route("c", "/c")), Insertion::Inserted(2));
        assert_eq!(names(&table), ["a", "b", "c", "default"]);
    }

    #[test]
    fn test_empty_pattern_is_appended() {
        let mut table = RouteTable::new();
        table.insert(route("default", ""));
        assert_eq!(table.insert(route("other-root", "^/$")), Insertion::Inserted(1));
        assert_eq!(names(&table), ["default", "other-root"]);
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut table = RouteTable::new();
        let r = route("a", "/a");
        assert_eq!(table.insert(r.clone()), Insertion::Inserted(0));
        assert_eq!(table.insert(r), Insertion::Present(0));
        assert_eq!(table.len(), 1);

        // Same name, different route: still inserted.
        table.insert(route("a", "/a"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_group_links() {
        let mut table = RouteTable::new();
        table.insert(route("a1", "/a/1"));
        table.insert(route("a2", "/a/2"));
        table.insert(route("a3", "/a/3"));
        assert_eq!(table.next_group(0), None);

        table.insert(route("b1", "/b/1"));
        assert_eq!(table.next_group(0), Some(3));
        assert_eq!(table.next_group(1), Some(3));
        assert_eq!(table.next_group(2), Some(3));
        assert_eq!(table.next_group(3), None);

        table.insert(route("c1", "/c/1"));
        assert_eq!(table.next_group(3), Some(4));
        // Walk stopped at the "/a" group.
        assert_eq!(table.next_group(2), Some(3));
    }

    #[test]
    fn test_group_links_before_default() {
        let mut table = RouteTable::new();
        table.insert(route("a", "/a"));
        table.insert(route("default", ""));
        assert_eq!(table.next_group(0), Some(1));

        table.insert(route("b", "/b"));
        assert_eq!(names(&table), ["a", "b", "default"]);
        assert_eq!(table.next_group(0), Some(1));
        assert_eq!(table.next_group(1), None);
        assert_eq!(table.next_group(2), None);
    }

    #[test]
    fn test_lookup_normalization() {
        let mut table = RouteTable::new();
        table.insert(route("api", "^/api"));
        table.insert(route("default", ""));

        assert_eq!(table.lookup("").unwrap().name(), "default");
        assert!(Arc::ptr_eq(table.lookup("").unwrap(), table.lookup("default").unwrap()));
        for pattern in ["/", "^/", "^/$", ""] {
            assert_eq!(table.lookup_by_pattern(pattern).unwrap().name(), "default");
        }
        assert_eq!(table.lookup_by_pattern("^/api").unwrap().name(), "api");
        assert!(table.lookup("missing").is_none());
    }

    proptest! {
        #[test]
        fn prop_distinct_segments_link_to_successor(count in 1usize..24) {
            let mut table = RouteTable::new();
            for i in 0..count {
                table.insert(route(&format!("r{i}"), &format!("/s{i}/x")));
                for j in 0..=i {
                    let expected = if j < i { Some(j + 1) } else { None };
                    prop_assert_eq!(table.next_group(j), expected);
                }
            }
        }

        #[test]
        fn prop_runs_point_past_their_end(segments in proptest::collection::vec(0u8..4, 1..40)) {
            let mut table = RouteTable::new();
            for (i, seg) in segments.iter().enumerate() {
                table.insert(route(&format!("r{i}"), &format!("/g{seg}/r{i}")));

                let inserted = &segments[..=i];
                let mut start = 0;
                while start < inserted.len() {
                    let mut end = start;
                    while end < inserted.len() && inserted[end] == inserted[start] {
                        end += 1;
                    }
                    let expected = if end < inserted.len() { Some(end) } else { None };
                    for k in start..end {
                        prop_assert_eq!(table.next_group(k), expected);
                    }
                    start = end;
                }
            }
        }

        #[test]
        fn prop_default_stays_last(patterns in proptest::collection::vec("/[a-c]{1,3}", 0..20)) {
            let mut table = RouteTable::new();
            table.insert(route("default", ""));
            for (i, pattern) in patterns.iter().enumerate() {
                let index = table.insert(route(&format!("r{i}"), pattern)).index();
                prop_assert_eq!(index, table.len() - 2);
                prop_assert_eq!(table.last().unwrap().name(), "default");
            }
        }
    }
}
