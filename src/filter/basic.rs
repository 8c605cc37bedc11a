//! Hash-set matcher.

use rustc_hash::FxHashSet;

use super::matcher::{DomainMatcher, check_name, prepare_entry, skip_entry};
use crate::error::MatcherError;

/// Exact string equality over an `FxHashSet`.
pub struct HashSetMatcher {
    domains: FxHashSet<String>,
}

impl HashSetMatcher {
    pub fn build<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = FxHashSet::default();
        for raw in domains {
            let raw = raw.as_ref();
            match prepare_entry(raw) {
                Ok(entry) => {
                    set.insert(entry);
                }
                Err(e) => skip_entry(raw, &e),
            }
        }

        Self { domains: set }
    }
}

impl DomainMatcher for HashSetMatcher {
    fn contains(&self, name: &str) -> Result<bool, MatcherError> {
        check_name(name)?;

        Ok(self.domains.contains(name))
    }

    fn len(&self) -> usize {
        self.domains.len()
    }
}
