//! DNS query filtering.
//!
//! Combines an allow-list and a block-list matcher into one decision per
//! query name. The allow-list always wins.

mod basic;
pub mod blocklist;
mod matcher;
mod radix;
mod trie;

pub use basic::HashSetMatcher;
pub use matcher::{DomainMatcher, Strategy};
pub use radix::RadixMatcher;
pub use trie::TrieMatcher;

use crate::dns::normalize;
use crate::error::FilterError;

/// Allow/block decision over two independently built matchers.
pub struct FilterEngine {
    allow: Box<dyn DomainMatcher>,
    block: Box<dyn DomainMatcher>,
}

impl FilterEngine {
    pub fn new(allow: Box<dyn DomainMatcher>, block: Box<dyn DomainMatcher>) -> Self {
        Self { allow, block }
    }

    /// Build both matchers from domain lists with the same strategy.
    pub fn from_lists<A, B>(strategy: Strategy, allow: A, block: B) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        let (allow, _) = strategy.build(allow);
        let (block, _) = strategy.build(block);

        Self::new(allow, block)
    }

    /// Returns `true` to allow `name`, `false` to block it.
    ///
    /// Callers should treat an error as "allow".
    pub fn decide(&self, name: &str) -> Result<bool, FilterError> {
        let name = normalize(name);

        if self.allow.contains(&name).map_err(FilterError::AllowList)? {
            return Ok(true);
        }
        let blocked = self.block.contains(&name).map_err(FilterError::BlockList)?;

        Ok(!blocked)
    }

    pub fn allowed_count(&self) -> usize {
        self.allow.len()
    }

    pub fn blocked_count(&self) -> usize {
        self.block.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatcherError;

    const NONE: [&str; 0] = [];

    #[test]
    fn blocked_name_with_trailing_dot() {
        let engine = FilterEngine::from_lists(Strategy::Trie, NONE, ["ads.example.com"]);

        assert_eq!(engine.decide("ads.example.com."), Ok(false));
    }

    #[test]
    fn allow_list_wins_over_block_list() {
        for strategy in [Strategy::Basic, Strategy::Trie] {
            let engine =
                FilterEngine::from_lists(strategy, ["ads.example.com"], ["ads.example.com"]);

            assert_eq!(engine.decide("ads.example.com."), Ok(true), "{strategy:?}");
        }
    }

    #[test]
    fn allow_list_wins_for_every_listed_name() {
        let names = ["a.com", "b.org", "c.d.net", "tracker.io"];
        let engine = FilterEngine::from_lists(Strategy::Basic, names, names);

        for name in names {
            assert_eq!(engine.decide(name), Ok(true), "{name}");
            assert_eq!(engine.decide(&format!("{name}.")), Ok(true), "{name}.");
        }
    }

    #[test]
    fn unlisted_name_is_allowed() {
        let engine = FilterEngine::from_lists(Strategy::Trie, NONE, ["ads.example.com"]);

        assert_eq!(engine.decide("example.com."), Ok(true));
        assert_eq!(engine.decide("www.ads.example.com."), Ok(true));
    }

    #[test]
    fn decision_is_case_insensitive() {
        let engine = FilterEngine::from_lists(Strategy::Basic, NONE, ["ads.example.com"]);

        assert_eq!(engine.decide("ADS.Example.com."), Ok(false));
    }

    #[test]
    fn matcher_error_propagates() {
        let engine = FilterEngine::from_lists(Strategy::Trie, NONE, ["ads.example.com"]);

        assert!(matches!(
            engine.decide("bad\0name."),
            Err(FilterError::AllowList(MatcherError::InvalidCharacter { .. }))
        ));
    }

    #[test]
    fn counts() {
        let engine = FilterEngine::from_lists(Strategy::Trie, ["a.com"], ["b.com", "c.com"]);

        assert_eq!(engine.allowed_count(), 1);
        assert_eq!(engine.blocked_count(), 2);
    }
}
