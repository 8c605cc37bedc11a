//! Error types for the query path and server lifecycle.

use hickory_proto::error::ProtoError;
use std::io;
use thiserror::Error;

/// Longest domain name (in bytes, without the trailing dot) a matcher accepts.
pub const MAX_DOMAIN_LEN: usize = 253;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatcherError {
    #[error("empty domain entry")]
    Empty,

    #[error("domain {domain:?} contains invalid character {ch:?}")]
    InvalidCharacter { domain: String, ch: char },

    #[error("domain is {0} bytes long (max {max})", max = MAX_DOMAIN_LEN)]
    TooLong(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("allow-list lookup failed: {0}")]
    AllowList(#[source] MatcherError),

    #[error("block-list lookup failed: {0}")]
    BlockList(#[source] MatcherError),
}

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("upstream I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("upstream codec error: {0}")]
    Codec(#[from] ProtoError),

    #[error("upstream did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Error, Debug)]
pub enum LogWriteError {
    #[error("query log is unavailable")]
    Unavailable,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind DNS listener on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("DNS listener I/O error: {0}")]
    Io(#[from] io::Error),
}
