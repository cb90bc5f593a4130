//! Route metadata consumed by the guard
//!
//! Rules come from the routing table owned by the host. Only the "requires
//! elevated auth" flag matters here.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RouteRule {
    /// Segment pattern: `:name` matches one segment, a trailing `*` the rest.
    pub path: String,
    #[serde(default)]
    pub requires_elevated: bool,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
    callback_path: String,
}

/// Path part of a route, without query string or fragment.
pub fn route_path(route: &str) -> &str {
    route.split(['?', '#']).next().unwrap_or(route)
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn matches(pattern: &str, path: &str) -> bool {
    let mut wanted = segments(pattern);
    let mut actual = segments(path);
    loop {
        match (wanted.next(), actual.next()) {
            (None, None) => return true,
            (Some("*"), _) => return wanted.next().is_none(),
            (Some(p), Some(a)) if p.starts_with(':') || p == a => continue,
            _ => return false,
        }
    }
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>, callback_path: impl Into<String>) -> Self {
        Self {
            rules,
            callback_path: callback_path.into(),
        }
    }

    /// First matching rule wins; unmatched routes are open.
    pub fn requires_elevated(&self, route: &str) -> bool {
        let path = route_path(route);
        self.rules
            .iter()
            .find(|rule| matches(&rule.path, path))
            .is_some_and(|rule| rule.requires_elevated)
    }

    pub fn is_callback(&self, route: &str) -> bool {
        matches(&self.callback_path, route_path(route))
    }

    pub fn callback_path(&self) -> &str {
        &self.callback_path
    }
}
