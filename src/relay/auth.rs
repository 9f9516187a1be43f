//! Upstream credentials attached per route.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::relay::HeaderBag;

// == Proxy Auth ==
/// Credentials a route injects into every forwarded request.
///
/// Applied after header filtering, so a client can neither strip nor spoof them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProxyAuth {
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
    ApiKey {
        #[serde(alias = "headerName")]
        header: String,
        value: String,
    },
}

impl ProxyAuth {
    pub fn apply(&self, headers: &mut HeaderBag) {
        match self {
            ProxyAuth::Bearer { token } => {
                headers.insert("Authorization", format!("Bearer {}", token));
            }
            ProxyAuth::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{}:{}", username, password));
                headers.insert("Authorization", format!("Basic {}", encoded));
            }
            ProxyAuth::ApiKey { header, value } => {
                headers.insert(header.clone(), value.clone());
            }
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for ProxyAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyAuth::Bearer { .. } => f.write_str("Bearer(***)"),
            ProxyAuth::Basic { username, .. } => write!(f, "Basic({}:***)", username),
            ProxyAuth::ApiKey { header, .. } => write!(f, "ApiKey({}: ***)", header),
        }
    }
}
