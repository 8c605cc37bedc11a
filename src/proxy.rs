//! Sinkhole orchestration.
//!
//! Builds the resolver from already-loaded domain lists, binds the listener
//! and runs until shut down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cache::ResponseCache;
use crate::error::ServerError;
use crate::filter::{FilterEngine, Strategy};
use crate::querylog::QueryLog;
use crate::resolver::Resolver;
use crate::transport::{ShutdownHandle, UdpListener};
use crate::upstream::UdpUpstream;

/// Configuration for the sinkhole.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Local address to bind (e.g., 127.0.0.1:5353)
    pub bind_addr: SocketAddr,
    /// Upstream resolver queries are forwarded to
    pub upstream: SocketAddr,
    pub upstream_timeout: Duration,
    pub cache_enabled: bool,
    pub strategy: Strategy,
    /// How often counters are logged
    pub stats_interval: Duration,
}

/// Bound sinkhole, ready to serve.
pub struct Proxy {
    listener: UdpListener,
    resolver: Arc<Resolver>,
    stats_interval: Duration,
}

impl Proxy {
    /// Build matchers and bind the listener. Only a bind failure is fatal.
    pub async fn bind(
        config: &ProxyConfig,
        allow: Vec<String>,
        block: Vec<String>,
        query_log: Arc<dyn QueryLog>,
    ) -> Result<Self, ServerError> {
        let filter = FilterEngine::from_lists(config.strategy, allow, block);
        let cache = config.cache_enabled.then(|| Arc::new(ResponseCache::new()));
        let upstream = Arc::new(UdpUpstream::with_timeout(config.upstream, config.upstream_timeout));
        let resolver = Arc::new(Resolver::new(filter, cache, upstream, query_log));

        let listener = UdpListener::bind(config.bind_addr).await?;
        info!(
            address = %listener.local_addr()?,
            upstream = %config.upstream,
            cache = config.cache_enabled,
            strategy = ?config.strategy,
            blocked = resolver.blocked_count(),
            allowed = resolver.allowed_count(),
            "started DNS sinkhole"
        );

        Ok(Self {
            listener,
            resolver,
            stats_interval: config.stats_interval,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.listener.shutdown_handle()
    }

    /// Serve until the shutdown handle is triggered.
    pub async fn run(self) -> Result<(), ServerError> {
        let resolver = self.resolver.clone();
        let interval = self.stats_interval;
        let reporter = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // Skip first immediate tick
            loop {
                ticker.tick().await;
                let stats = resolver.stats().snapshot_and_reset();
                info!(
                    uptime_s = stats.uptime_secs,
                    cache = resolver.cache_len(),
                    requests = stats.requests,
                    forwarded = stats.forwarded,
                    cached = stats.cached,
                    blocked = stats.blocked,
                    failed = stats.failed,
                    avg_response_ms = stats.avg_response_ms,
                    "stats"
                );
            }
        });

        let result = self.listener.serve(self.resolver).await;
        reporter.abort();

        result
    }
}
