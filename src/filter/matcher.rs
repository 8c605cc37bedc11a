//! Exact-match domain matchers.
//!
//! A matcher is built once from a domain list and is read-only afterwards,
//! so lookups need no synchronization. Matching is exact: `example.com` in a
//! list does not match `ads.example.com`.

use clap::ValueEnum;
use tracing::{debug, warn};

use super::basic::HashSetMatcher;
use super::radix::RadixMatcher;
use super::trie::TrieMatcher;
use crate::dns::normalize;
use crate::error::{MAX_DOMAIN_LEN, MatcherError};

/// Exact membership test over a fixed set of domains.
///
/// Callers pass names already normalized with [`crate::dns::normalize`].
pub trait DomainMatcher: Send + Sync {
    fn contains(&self, name: &str) -> Result<bool, MatcherError>;

    /// Number of distinct domains stored.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Matcher implementation selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Strategy {
    /// Hash set, O(1) lookups.
    Basic,
    /// Character trie, O(length) lookups with shared prefixes.
    #[default]
    Trie,
    /// Compressed trie from the `radix_trie` crate.
    Radix,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Basic, Strategy::Trie, Strategy::Radix];
}

impl Strategy {
    /// Build a matcher from `domains`, returning it with the number of
    /// domains it holds. Malformed entries are logged and skipped.
    pub fn build<I, S>(self, domains: I) -> (Box<dyn DomainMatcher>, usize)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matcher: Box<dyn DomainMatcher> = match self {
            Strategy::Basic => Box::new(HashSetMatcher::build(domains)),
            Strategy::Trie => Box::new(TrieMatcher::build(domains)),
            Strategy::Radix => Box::new(RadixMatcher::build(domains)),
        };
        let count = matcher.len();
        debug!(strategy = ?self, count, "matcher built");

        (matcher, count)
    }
}

/// Validate and normalize a list entry before insertion.
pub(crate) fn prepare_entry(raw: &str) -> Result<String, MatcherError> {
    let entry = normalize(raw.trim());
    if entry.is_empty() {
        return Err(MatcherError::Empty);
    }
    check_name(&entry)?;

    Ok(entry)
}

/// Reject names no list entry could ever match. Control characters include
/// the NUL byte the trie uses as its end-of-domain sentinel.
pub(crate) fn check_name(name: &str) -> Result<(), MatcherError> {
    if name.len() > MAX_DOMAIN_LEN {
        return Err(MatcherError::TooLong(name.len()));
    }
    if let Some(ch) = name.chars().find(|c| c.is_control() || c.is_whitespace()) {
        return Err(MatcherError::InvalidCharacter {
            domain: name.to_string(),
            ch,
        });
    }

    Ok(())
}

/// Log a rejected entry at build time.
pub(crate) fn skip_entry(raw: &str, err: &MatcherError) {
    warn!(entry = raw, error = %err, "skipping malformed domain entry");
}
