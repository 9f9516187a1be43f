//! Per-request orchestration: resolve, validate, consult the cache, forward,
//! store, inject CORS.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::cache::{current_timestamp_ms, CacheKey, CacheStats, CachedResponse, ResponseCache};
use crate::config::RelayConfig;
use crate::error::{ConfigError, RelayError, Result};
use crate::relay::{
    filter_inbound, filter_outbound, CorsPolicy, DomainPolicy, HeaderBag, OutboundRequest,
    RelayTarget, RequestForwarder, ResolvedTarget, RetryPolicy, RouteTable, UpstreamResponse,
};

pub const X_CACHE: &str = "x-cache";

// == Relay Snapshot ==
/// Everything derived from one `RelayConfig`. Requests hold on to the snapshot
/// they started with, so a reload never changes a request midway.
#[derive(Debug)]
pub struct RelaySnapshot {
    pub config: RelayConfig,
    pub routes: RouteTable,
    pub domains: DomainPolicy,
    pub cors: CorsPolicy,
    pub retry: RetryPolicy,
}

impl RelaySnapshot {
    pub fn build(config: RelayConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            routes: RouteTable::from_routes(&config.routes)?,
            domains: DomainPolicy::new(&config.allowed_domains, &config.blocked_domains),
            cors: CorsPolicy::new(&config.allowed_origins),
            retry: RetryPolicy::new(config.retries, config.retry_base_delay()),
            config,
        })
    }
}

// == Relay Request ==
#[derive(Debug)]
pub struct RelayRequest {
    pub method: Method,
    pub target: Result<RelayTarget>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

// == Relay Controller ==
#[derive(Debug)]
pub struct RelayController {
    snapshot: ArcSwap<RelaySnapshot>,
    cache: Arc<ResponseCache>,
    forwarder: RequestForwarder,
}

impl RelayController {
    /// Builds a controller with a cache sized from the configuration.
    pub fn new(config: RelayConfig) -> std::result::Result<Self, ConfigError> {
        let cache = Arc::new(ResponseCache::from_policy(&config.cache));
        Self::with_parts(config, cache, RequestForwarder::new()?)
    }

    pub fn with_parts(
        config: RelayConfig,
        cache: Arc<ResponseCache>,
        forwarder: RequestForwarder,
    ) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            snapshot: ArcSwap::from_pointee(RelaySnapshot::build(config)?),
            cache,
            forwarder,
        })
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn snapshot(&self) -> Arc<RelaySnapshot> {
        self.snapshot.load_full()
    }

    /// Validates `config` and swaps it in. On error the current snapshot stays.
    pub async fn reload(&self, config: RelayConfig) -> std::result::Result<(), ConfigError> {
        let snapshot = RelaySnapshot::build(config)?;
        self.cache.reconfigure(&snapshot.config.cache).await;
        info!(routes = snapshot.routes.len(), "relay configuration reloaded");
        self.snapshot.store(Arc::new(snapshot));
        Ok(())
    }

    // == Handle ==
    /// Relays one request. Always produces a response carrying CORS headers,
    /// errors included.
    pub async fn handle(&self, request: RelayRequest) -> Response {
        let snapshot = self.snapshot.load_full();
        let origin = request
            .headers
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut response = match self.dispatch(&snapshot, request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(code = err.code(), error = %err, "relay request failed");
                err.into_response()
            }
        };

        snapshot.cors.apply(response.headers_mut(), origin.as_deref());
        response
    }

    async fn dispatch(&self, snapshot: &RelaySnapshot, request: RelayRequest) -> Result<Response> {
        if request.method == Method::OPTIONS
            && request
                .headers
                .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
        {
            return Ok(StatusCode::NO_CONTENT.into_response());
        }

        let resolved = snapshot.routes.resolve(&request.target?)?;
        if !snapshot.domains.permits(&resolved.url) {
            let host = resolved.url.host_str().unwrap_or_default().to_string();
            warn!(url = %resolved.url, "target rejected by domain policy");
            return Err(RelayError::DisallowedTarget(host));
        }

        let outbound =
            outbound_request(&request.method, &resolved, &request.headers, request.body);

        match request.method {
            Method::GET => self.relay_cacheable(snapshot, &resolved, &outbound).await,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE => {
                self.relay_mutation(snapshot, &resolved, &outbound).await
            }
            _ => {
                let upstream = self.forward(snapshot, &outbound).await?;
                Ok(relayed(upstream))
            }
        }
    }

    async fn relay_cacheable(
        &self,
        snapshot: &RelaySnapshot,
        resolved: &ResolvedTarget,
        outbound: &OutboundRequest,
    ) -> Result<Response> {
        let policy = &snapshot.config.cache;
        if !policy.enabled {
            let upstream = self.forward(snapshot, outbound).await?;
            return Ok(relayed(upstream));
        }

        let key = CacheKey::new(
            resolved.route_label.clone(),
            Method::GET.as_str(),
            resolved.cache_path.clone(),
            &resolved.cache_query,
        );

        if let Some(entry) = self.cache.get(&key).await {
            debug!(
                key = %key,
                ttl_remaining_ms = entry.ttl_remaining_ms(current_timestamp_ms()),
                "serving cached response"
            );
            let status = StatusCode::from_u16(entry.payload.status).unwrap_or(StatusCode::OK);
            let mut response =
                upstream_response(status, &entry.payload.headers, entry.payload.body);
            response.headers_mut().insert(X_CACHE, HeaderValue::from_static("HIT"));
            return Ok(response);
        }

        let upstream = self.forward(snapshot, outbound).await?;
        let headers = filter_outbound(&upstream.headers);

        if upstream.status.is_success() {
            let payload = CachedResponse {
                status: upstream.status.as_u16(),
                headers: headers.clone(),
                body: upstream.body.clone(),
            };
            self.cache
                .set(&key, payload, policy.ttl_for(&resolved.route_label))
                .await;
        }

        let mut response = upstream_response(upstream.status, &headers, upstream.body);
        response.headers_mut().insert(X_CACHE, HeaderValue::from_static("MISS"));
        Ok(response)
    }

    async fn relay_mutation(
        &self,
        snapshot: &RelaySnapshot,
        resolved: &ResolvedTarget,
        outbound: &OutboundRequest,
    ) -> Result<Response> {
        // Before: a cancelled request still leaves no stale entries behind.
        // After: drops anything a concurrent read stored meanwhile.
        self.cache.invalidate_by_route(&resolved.route_label).await;
        let result = self.forward(snapshot, outbound).await;
        self.cache.invalidate_by_route(&resolved.route_label).await;

        Ok(relayed(result?))
    }

    async fn forward(
        &self,
        snapshot: &RelaySnapshot,
        outbound: &OutboundRequest,
    ) -> Result<UpstreamResponse> {
        let upstream = self
            .forwarder
            .forward(outbound, snapshot.config.timeout(), &snapshot.retry)
            .await?;
        if upstream.attempts > 1 {
            info!(
                url = %outbound.url,
                attempts = upstream.attempts,
                status = upstream.status.as_u16(),
                "upstream answered after retries"
            );
        }
        Ok(upstream)
    }

    // == Admin Operations ==
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub async fn reset_cache_stats(&self) {
        self.cache.reset_stats().await;
    }

    pub async fn clear_cache(&self) -> usize {
        self.cache.clear().await
    }

    pub async fn invalidate_route(&self, route: &str) -> usize {
        self.cache.invalidate_by_route(route).await
    }

    pub async fn invalidate_pattern(&self, pattern: &str) -> Result<usize> {
        if pattern.is_empty() {
            return Err(RelayError::InvalidRequest(
                "pattern cannot be empty".to_string(),
            ));
        }
        Ok(self.cache.invalidate_by_pattern(pattern).await)
    }
}

/// Filters client headers, then layers route headers and auth on top.
fn outbound_request(
    method: &Method,
    resolved: &ResolvedTarget,
    client_headers: &HeaderMap,
    body: Bytes,
) -> OutboundRequest {
    let mut headers = filter_inbound(&HeaderBag::from_header_map(client_headers));

    if let Some(compiled) = &resolved.route {
        for (name, value) in &compiled.route.headers {
            headers.insert(name.clone(), value.clone());
        }
        if let Some(auth) = &compiled.route.auth {
            auth.apply(&mut headers);
        }
    }

    OutboundRequest {
        method: method.clone(),
        url: resolved.url.clone(),
        headers,
        body,
    }
}

/// Upstream response with outbound filtering applied.
fn relayed(upstream: UpstreamResponse) -> Response {
    upstream_response(upstream.status, &filter_outbound(&upstream.headers), upstream.body)
}

fn upstream_response(status: StatusCode, headers: &HeaderBag, body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers.to_header_map();
    response
}
