//! Sinkhole - a DNS proxy that blocks listed domains.
//!
//! Queries are checked against allow/block lists, forwarded upstream when
//! allowed, refused when blocked, cached, and recorded in a query log.

pub mod cache;
pub mod dns;
pub mod error;
pub mod filter;
pub mod proxy;
pub mod querylog;
pub mod resolver;
pub mod stats;
pub mod transport;
pub mod upstream;
