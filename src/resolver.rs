//! DNS query resolution.
//!
//! Handles one query end to end:
//! 1. Cache lookup (when caching is enabled)
//! 2. Filter decision on a miss (errors fail open)
//! 3. Forward allowed queries upstream, refuse blocked ones
//! 4. Cache the outcome, reply to the client, hand a record to the query log
//!
//! Transports decode datagrams and spawn [`Resolver::handle`] per query.

use hickory_proto::op::Message;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, error, info, warn};

use crate::cache::{CacheHit, ResponseCache};
use crate::dns::{self, QueryKey};
use crate::filter::FilterEngine;
use crate::querylog::{QueryLog, QueryRecord};
use crate::stats::Stats;
use crate::transport::ResponseWriter;
use crate::upstream::Upstream;

/// How a query was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Served from cache without contacting upstream.
    Cached { blocked: bool },
    Forwarded,
    Blocked,
    /// Upstream exchange failed; the client gets no reply.
    Failed,
}

impl Outcome {
    pub fn is_blocked(self) -> bool {
        matches!(self, Outcome::Blocked | Outcome::Cached { blocked: true })
    }

    fn is_cached(self) -> bool {
        matches!(self, Outcome::Cached { .. })
    }
}

/// Per-query orchestrator shared by every in-flight query.
pub struct Resolver {
    filter: FilterEngine,
    cache: Option<Arc<ResponseCache>>,
    upstream: Arc<dyn Upstream>,
    query_log: Arc<dyn QueryLog>,
    stats: Stats,
}

impl Resolver {
    /// `cache` is `None` when caching is disabled.
    pub fn new(
        filter: FilterEngine,
        cache: Option<Arc<ResponseCache>>,
        upstream: Arc<dyn Upstream>,
        query_log: Arc<dyn QueryLog>,
    ) -> Self {
        Self {
            filter,
            cache,
            upstream,
            query_log,
            stats: Stats::new(),
        }
    }

    /// Resolve `request` from `client` and write the reply through `writer`.
    pub async fn handle(&self, request: Message, client: SocketAddr, writer: &dyn ResponseWriter) {
        let start = Instant::now();

        let Some(question) = dns::first_question(&request) else {
            debug!(id = request.id(), %client, "query without question");
            self.respond(&dns::format_error(&request), client, writer).await;
            return;
        };
        let key = QueryKey::from_query(question);
        let name = dns::normalize(&key.name);
        debug!(id = request.id(), name = %name, qtype = %key.qtype, %client, "received query");

        let (reply, outcome) = match self.cached(&request, &key) {
            Some(hit) => hit,
            None => self.resolve(&request, key.clone(), &name).await,
        };

        if let Some(reply) = &reply {
            self.respond(reply, client, writer).await;
        }

        let latency = start.elapsed();
        self.stats.record(outcome, latency);
        let verdict = match outcome {
            Outcome::Failed => "FAIL",
            o if o.is_blocked() => "SMASH",
            _ => "PASS",
        };
        info!(name = %name, host = %client.ip(), ms = latency.as_millis() as u64, cached = outcome.is_cached(), "{verdict}");

        let record = QueryRecord {
            name,
            record_type: key.qtype,
            client: client.ip(),
            blocked: outcome.is_blocked(),
            cached: outcome.is_cached(),
            latency,
            timestamp: SystemTime::now(),
        };
        if let Err(e) = self.query_log.write(record) {
            error!(id = request.id(), error = %e, "failed to write query record");
        }
    }

    fn cached(&self, request: &Message, key: &QueryKey) -> Option<(Option<Message>, Outcome)> {
        let hit = self.cache.as_ref()?.get(key)?;
        debug!(id = request.id(), ?hit, "cache hit");

        Some(match hit {
            CacheHit::Allowed(answers) => (
                Some(dns::answered(request, &answers)),
                Outcome::Cached { blocked: false },
            ),
            CacheHit::Blocked(_) => (Some(dns::refused(request)), Outcome::Cached { blocked: true }),
        })
    }

    async fn resolve(&self, request: &Message, key: QueryKey, name: &str) -> (Option<Message>, Outcome) {
        let (allow, cacheable) = match self.filter.decide(name) {
            Ok(allow) => (allow, true),
            Err(e) => {
                error!(id = request.id(), name, error = %e, "filter decision failed, allowing");
                (true, false)
            }
        };

        if !allow {
            let reply = dns::refused(request);
            if let Some(cache) = &self.cache {
                cache.set_blocked(key, reply.answers());
            }
            return (Some(reply), Outcome::Blocked);
        }

        let mut reply = match self.upstream.exchange(request).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(id = request.id(), name, error = %e, "upstream exchange failed");
                return (None, Outcome::Failed);
            }
        };
        reply.set_id(request.id());

        if let (true, Some(cache), Some(first)) = (cacheable, &self.cache, reply.answers().first()) {
            let ttl = first.ttl();
            debug!(id = request.id(), ttl, "caching upstream answer");
            cache.set(key, reply.answers(), ttl);
        }

        (Some(reply), Outcome::Forwarded)
    }

    async fn respond(&self, reply: &Message, client: SocketAddr, writer: &dyn ResponseWriter) {
        let bytes = match reply.to_vec() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(id = reply.id(), error = %e, "failed to encode reply");
                return;
            }
        };
        if let Err(e) = writer.send(&bytes, client).await {
            warn!(id = reply.id(), %client, error = %e, "failed to write reply to client");
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn cache_len(&self) -> usize {
        self.cache.as_ref().map_or(0, |c| c.len())
    }

    /// Returns the number of domains in the block list.
    pub fn blocked_count(&self) -> usize {
        self.filter.blocked_count()
    }

    pub fn allowed_count(&self) -> usize {
        self.filter.allowed_count()
    }
}
