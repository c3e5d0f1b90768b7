//! Route table with path patterns and rewrites

use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Invalid path pattern '{0}': {1}")]
    InvalidPattern(String, String),

    #[error("Rewrite template '{0}' uses '{{{1}}}' which the match pattern does not capture")]
    UnboundRewriteParam(String, String),
}

/// One segment of a compiled path pattern
#[derive(Clone, Debug, PartialEq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled path pattern such as `/test-print/{msg}`
#[derive(Clone, Debug)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        if !pattern.starts_with('/') {
            return Err(RouteError::InvalidPattern(
                pattern.to_string(),
                "must start with '/'".to_string(),
            ));
        }
        let mut segments = Vec::new();
        for part in pattern.split('/').skip(1) {
            if part.starts_with('{') && part.ends_with('}') && part.len() > 1 {
                let name = &part[1..part.len() - 1];
                if name.is_empty() {
                    return Err(RouteError::InvalidPattern(
                        pattern.to_string(),
                        "empty parameter name".to_string(),
                    ));
                }
                segments.push(Segment::Param(name.to_string()));
            } else if part.contains('{') || part.contains('}') {
                return Err(RouteError::InvalidPattern(
                    pattern.to_string(),
                    format!("malformed segment '{}'", part),
                ));
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }
        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a request path (the URI path component), capturing named segments.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        if !path.starts_with('/') {
            return None;
        }
        let parts: Vec<&str> = path.split('/').skip(1).collect();
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut captures = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    captures.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(captures)
    }

    /// Render the pattern as a concrete path using captured segments.
    ///
    /// Route table construction guarantees every parameter is bound.
    fn render(&self, captures: &HashMap<String, String>) -> String {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(literal) => path.push_str(literal),
                Segment::Param(name) => match captures.get(name) {
                    Some(value) => path.push_str(value),
                    None => {
                        path.push('{');
                        path.push_str(name);
                        path.push('}');
                    }
                },
            }
        }
        path
    }
}

/// Declarative route definition as written in the gateway config
#[derive(Clone, Debug, Deserialize)]
pub struct RouteConfig {
    /// HTTP method to match; absent or "*" matches any method
    #[serde(default)]
    pub method: Option<String>,
    pub path: String,
    pub service: String,
    pub rewrite: String,
}

/// A compiled route: method + path pattern -> target service + rewrite
#[derive(Clone, Debug)]
struct Route {
    method: Option<String>,
    pattern: PathPattern,
    rewrite: PathPattern,
    service: String,
}

/// Outcome of matching a request against the route table
#[derive(Clone, Debug, PartialEq)]
pub struct RouteMatch {
    /// Logical name of the target service
    pub service: String,
    /// The matched pattern, for logging and metrics labels
    pub route: String,
    /// Upstream path after rewrite substitution
    pub rewritten_path: String,
}

/// Ordered route table; the first matching route wins.
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Compile the configured routes, validating each rewrite template
    /// against its match pattern.
    pub fn build(configs: &[RouteConfig]) -> Result<Self, RouteError> {
        let mut routes = Vec::with_capacity(configs.len());
        for config in configs {
            let pattern = PathPattern::parse(&config.path)?;
            let rewrite = PathPattern::parse(&config.rewrite)?;
            let bound: Vec<&str> = pattern.param_names().collect();
            for name in rewrite.param_names() {
                if !bound.contains(&name) {
                    return Err(RouteError::UnboundRewriteParam(
                        config.rewrite.clone(),
                        name.to_string(),
                    ));
                }
            }
            let method = match config.method.as_deref() {
                None | Some("*") => None,
                Some(method) => Some(method.to_ascii_uppercase()),
            };
            routes.push(Route {
                method,
                pattern,
                rewrite,
                service: config.service.clone(),
            });
        }
        Ok(Self { routes })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Services referenced by at least one route, deduplicated in order.
    pub fn target_services(&self) -> Vec<String> {
        let mut services: Vec<String> = Vec::new();
        for route in &self.routes {
            if !services.contains(&route.service) {
                services.push(route.service.clone());
            }
        }
        services
    }

    /// First route matching the method and path, with the rewritten path.
    pub fn match_request(&self, method: &str, path: &str) -> Option<RouteMatch> {
        for route in &self.routes {
            if let Some(allowed) = &route.method {
                if !allowed.eq_ignore_ascii_case(method) {
                    continue;
                }
            }
            if let Some(captures) = route.pattern.matches(path) {
                return Some(RouteMatch {
                    service: route.service.clone(),
                    route: route.pattern.as_str().to_string(),
                    rewritten_path: route.rewrite.render(&captures),
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(configs: &[(&str, &str, &str, &str)]) -> RouteTable {
        let configs: Vec<RouteConfig> = configs
            .iter()
            .map(|(method, path, service, rewrite)| RouteConfig {
                method: if *method == "*" {
                    None
                } else {
                    Some(method.to_string())
                },
                path: path.to_string(),
                service: service.to_string(),
                rewrite: rewrite.to_string(),
            })
            .collect();
        RouteTable::build(&configs).expect("Failed to build route table")
    }

    #[test]
    fn test_pattern_rejects_relative_path() {
        assert!(PathPattern::parse("no-slash").is_err());
    }

    #[test]
    fn test_pattern_rejects_malformed_param() {
        assert!(PathPattern::parse("/a/{msg").is_err());
        assert!(PathPattern::parse("/a/msg}").is_err());
        assert!(PathPattern::parse("/a/{}").is_err());
    }

    #[test]
    fn test_literal_match() {
        let pattern = PathPattern::parse("/test-id").expect("Failed to parse");
        assert!(pattern.matches("/test-id").is_some());
        assert!(pattern.matches("/test-id/extra").is_none());
        assert!(pattern.matches("/other").is_none());
    }

    #[test]
    fn test_param_capture() {
        let pattern = PathPattern::parse("/test-print/{msg}").expect("Failed to parse");
        let captures = pattern.matches("/test-print/hello").expect("Should match");
        assert_eq!(captures.get("msg").map(String::as_str), Some("hello"));
        assert!(pattern.matches("/test-print").is_none());
        assert!(pattern.matches("/test-print/").is_none());
    }

    #[test]
    fn test_rewrite_substitutes_captures() {
        let table = table(&[("GET", "/test-print/{msg}", "backend-service", "/print/{msg}")]);
        let matched = table
            .match_request("GET", "/test-print/hello")
            .expect("Should match");
        assert_eq!(matched.rewritten_path, "/print/hello");
        assert_eq!(matched.service, "backend-service");
        assert_eq!(matched.route, "/test-print/{msg}");
    }

    #[test]
    fn test_first_match_wins() {
        let table = table(&[
            ("GET", "/api/{rest}", "first", "/one/{rest}"),
            ("GET", "/api/{rest}", "second", "/two/{rest}"),
        ]);
        let matched = table.match_request("GET", "/api/x").expect("Should match");
        assert_eq!(matched.service, "first");
    }

    #[test]
    fn test_method_mismatch_skips_route() {
        let table = table(&[
            ("POST", "/thing", "poster", "/thing"),
            ("GET", "/thing", "getter", "/thing"),
        ]);
        let matched = table.match_request("GET", "/thing").expect("Should match");
        assert_eq!(matched.service, "getter");
        assert!(table.match_request("DELETE", "/thing").is_none());
    }

    #[test]
    fn test_wildcard_method_matches_all() {
        let table = table(&[("*", "/anything", "svc", "/anything")]);
        assert!(table.match_request("GET", "/anything").is_some());
        assert!(table.match_request("POST", "/anything").is_some());
    }

    #[test]
    fn test_unbound_rewrite_param_rejected() {
        let configs = [RouteConfig {
            method: Some("GET".to_string()),
            path: "/a/{x}".to_string(),
            service: "svc".to_string(),
            rewrite: "/b/{y}".to_string(),
        }];
        let result = RouteTable::build(&configs);
        assert!(matches!(result, Err(RouteError::UnboundRewriteParam(_, _))));
    }

    #[test]
    fn test_target_services_deduplicated() {
        let table = table(&[
            ("GET", "/a", "svc-one", "/a"),
            ("GET", "/b", "svc-two", "/b"),
            ("GET", "/c", "svc-one", "/c"),
        ]);
        assert_eq!(table.target_services(), vec!["svc-one", "svc-two"]);
    }

    #[test]
    fn test_no_match_returns_none() {
        let table = table(&[("GET", "/test-id", "svc", "/id")]);
        assert!(table.match_request("GET", "/missing").is_none());
    }
}
