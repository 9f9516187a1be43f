//! Cache key derivation.

use std::fmt;

use url::form_urlencoded;

// == Cache Key ==
/// Identity of a cacheable request: `(route, method, path, sorted query)`.
///
/// Query parameters are sorted on construction, so requests that differ only in
/// parameter order produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    route: String,
    method: String,
    path: String,
    query: Vec<(String, String)>,
}

impl CacheKey {
    pub fn new(
        route: impl Into<String>,
        method: &str,
        path: impl Into<String>,
        query: &[(String, String)],
    ) -> Self {
        let mut query = query.to_vec();
        query.sort();

        Self {
            route: route.into(),
            method: method.to_ascii_uppercase(),
            path: path.into(),
            query,
        }
    }

    /// Route component, used for route-scoped invalidation.
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for CacheKey {
    /// Renders `route|METHOD|path?a=1&b=2`; this string is what the store indexes
    /// and what pattern invalidation matches against.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.route, self.method, self.path)?;
        if !self.query.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query.iter())
                .finish();
            write!(f, "?{}", encoded)?;
        }
        Ok(())
    }
}
