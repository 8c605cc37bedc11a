//! Radix-trie matcher backed by the `radix_trie` crate.

use radix_trie::{Trie, TrieCommon};

use super::matcher::{DomainMatcher, check_name, prepare_entry, skip_entry};
use crate::error::MatcherError;

/// Compressed (radix) trie keyed by the normalized domain.
pub struct RadixMatcher {
    trie: Trie<String, ()>,
}

impl RadixMatcher {
    pub fn build<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut trie = Trie::new();
        for raw in domains {
            let raw = raw.as_ref();
            match prepare_entry(raw) {
                Ok(entry) => {
                    trie.insert(entry, ());
                }
                Err(e) => skip_entry(raw, &e),
            }
        }

        Self { trie }
    }
}

impl DomainMatcher for RadixMatcher {
    fn contains(&self, name: &str) -> Result<bool, MatcherError> {
        check_name(name)?;

        Ok(self.trie.get(name).is_some())
    }

    fn len(&self) -> usize {
        self.trie.len()
    }
}
