//! Turns a relay request into a concrete upstream URL.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use url::{form_urlencoded, Url};

use crate::config::ProxyRoute;
use crate::error::{ConfigError, RelayError, Result};

// == Relay Target ==
/// What the client asked to reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayTarget {
    /// `?url=<absolute-url>`
    Direct { url: String },
    /// `/relay/<route>/<path>?<query>`
    Named {
        route: String,
        path: String,
        query: Vec<(String, String)>,
    },
}

impl RelayTarget {
    /// Builds a direct target from the request query, requiring a non-empty `url`.
    pub fn from_query(query: &[(String, String)]) -> Result<Self> {
        query
            .iter()
            .find(|(k, v)| k == "url" && !v.trim().is_empty())
            .map(|(_, v)| RelayTarget::Direct {
                url: v.trim().to_string(),
            })
            .ok_or(RelayError::NoTargetSpecified)
    }
}

// == Resolved Target ==
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub url: Url,
    /// Route component for cache keys and invalidation
    pub route_label: String,
    /// Present for named routes
    pub route: Option<Arc<CompiledRoute>>,
    pub cache_path: String,
    pub cache_query: Vec<(String, String)>,
}

// == Compiled Route ==
/// A `ProxyRoute` with its rewrite patterns compiled.
#[derive(Debug)]
pub struct CompiledRoute {
    pub route: ProxyRoute,
    rewrites: Vec<(Regex, String)>,
}

impl CompiledRoute {
    pub fn compile(route: ProxyRoute) -> std::result::Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidRoute {
            route: route.name.clone(),
            reason,
        };

        if route.name.trim().is_empty() {
            return Err(invalid("route name is empty".to_string()));
        }
        // '|' separates the parts of a rendered cache key
        if route.name.contains('|') {
            return Err(invalid("route name may not contain '|'".to_string()));
        }
        match Url::parse(&route.target) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => return Err(invalid(format!("unsupported scheme '{}'", url.scheme()))),
            Err(e) => return Err(invalid(format!("target '{}': {}", route.target, e))),
        }

        let rewrites = route
            .path_rewrite
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|re| (re, rule.replacement.clone()))
                    .map_err(|e| invalid(format!("pattern '{}': {}", rule.pattern, e)))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { route, rewrites })
    }

    /// Applies every rewrite rule in order, each replacing its first match.
    pub fn rewrite_path(&self, path: &str) -> String {
        self.rewrites
            .iter()
            .fold(path.to_string(), |current, (pattern, replacement)| {
                pattern.replace(&current, replacement.as_str()).into_owned()
            })
    }
}

// == Route Table ==
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<String, Arc<CompiledRoute>>,
}

impl RouteTable {
    /// Compiles and indexes routes; names must be unique.
    pub fn from_routes(routes: &[ProxyRoute]) -> std::result::Result<Self, ConfigError> {
        let mut table = HashMap::with_capacity(routes.len());
        for route in routes {
            let compiled = CompiledRoute::compile(route.clone())?;
            if table
                .insert(route.name.clone(), Arc::new(compiled))
                .is_some()
            {
                return Err(ConfigError::InvalidRoute {
                    route: route.name.clone(),
                    reason: "duplicate route name".to_string(),
                });
            }
        }
        Ok(Self { routes: table })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<CompiledRoute>> {
        self.routes.get(name)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    // == Resolve ==
    pub fn resolve(&self, target: &RelayTarget) -> Result<ResolvedTarget> {
        match target {
            RelayTarget::Direct { url } => resolve_direct(url),
            RelayTarget::Named { route, path, query } => self.resolve_named(route, path, query),
        }
    }

    fn resolve_named(
        &self,
        name: &str,
        path: &str,
        query: &[(String, String)],
    ) -> Result<ResolvedTarget> {
        let compiled = self
            .get(name)
            .ok_or_else(|| RelayError::InvalidTarget(format!("unknown route '{}'", name)))?;

        let requested = with_leading_slash(path);
        let rewritten = with_leading_slash(&compiled.rewrite_path(&requested));

        let mut raw = format!("{}{}", compiled.route.target.trim_end_matches('/'), rewritten);
        if !query.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query.iter())
                .finish();
            raw.push('?');
            raw.push_str(&encoded);
        }

        let url = Url::parse(&raw)
            .map_err(|e| RelayError::InvalidTarget(format!("'{}': {}", raw, e)))?;

        Ok(ResolvedTarget {
            url,
            route_label: name.to_string(),
            route: Some(compiled.clone()),
            cache_path: requested,
            cache_query: query.to_vec(),
        })
    }
}

fn resolve_direct(raw: &str) -> Result<ResolvedTarget> {
    let url =
        Url::parse(raw).map_err(|e| RelayError::InvalidTarget(format!("'{}': {}", raw, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| RelayError::InvalidTarget(format!("'{}' has no host", raw)))?
        .to_ascii_lowercase();

    Ok(ResolvedTarget {
        route_label: format!("direct:{}", host),
        route: None,
        cache_path: url.path().to_string(),
        cache_query: url.query_pairs().into_owned().collect(),
        url,
    })
}

fn with_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
