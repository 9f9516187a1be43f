//! Target domain policy.

use tracing::debug;
use url::Url;

// == Domain Policy ==
/// Allow/block lists for upstream hostnames.
///
/// An entry matches its exact hostname and any subdomain of it. A leading `*`
/// or `*.` is accepted and means the same thing; a bare `*` matches every host.
/// The block list always wins, and an empty allow list allows everything.
#[derive(Debug, Clone, Default)]
pub struct DomainPolicy {
    allowed: Vec<String>,
    blocked: Vec<String>,
}

impl DomainPolicy {
    pub fn new(allowed: &[String], blocked: &[String]) -> Self {
        Self {
            allowed: normalize(allowed),
            blocked: normalize(blocked),
        }
    }

    /// Whether `url` may be contacted. Never errors: unparseable input is rejected.
    pub fn is_allowed(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => self.permits(&parsed),
            Err(_) => false,
        }
    }

    pub fn permits(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            debug!(scheme = url.scheme(), "rejecting non-http target");
            return false;
        }

        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        if self.blocked.iter().any(|d| host_matches(&host, d)) {
            debug!(host, "target host is blocked");
            return false;
        }

        self.allowed.is_empty() || self.allowed.iter().any(|d| host_matches(&host, d))
    }
}

fn normalize(domains: &[String]) -> Vec<String> {
    domains
        .iter()
        .map(|d| d.trim().to_ascii_lowercase())
        .map(|d| {
            if d == "*" {
                d
            } else {
                d.trim_start_matches('*').trim_start_matches('.').to_string()
            }
        })
        .filter(|d| !d.is_empty())
        .collect()
}

fn host_matches(host: &str, domain: &str) -> bool {
    domain == "*"
        || host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
