//! Character-trie matcher.
//!
//! Each domain is stored as a path of byte edges ending in a `SENTINEL` edge.
//! Domains sharing a prefix share nodes, which keeps large block lists
//! (hundreds of thousands of entries) compact. Nodes live in one arena and
//! keep their edges sorted so a step is a binary search.

use super::matcher::{DomainMatcher, check_name, prepare_entry, skip_entry};
use crate::error::MatcherError;

/// Marks the end of a stored domain. Entries never contain it.
const SENTINEL: u8 = 0;

const ROOT: u32 = 0;

#[derive(Default)]
struct Node {
    edges: Vec<(u8, u32)>,
}

impl Node {
    fn child(&self, byte: u8) -> Option<u32> {
        self.edges
            .binary_search_by_key(&byte, |&(b, _)| b)
            .ok()
            .map(|i| self.edges[i].1)
    }
}

pub struct TrieMatcher {
    nodes: Vec<Node>,
    len: usize,
}

impl TrieMatcher {
    pub fn build<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut trie = Self {
            nodes: vec![Node::default()],
            len: 0,
        };
        for raw in domains {
            let raw = raw.as_ref();
            match prepare_entry(raw) {
                Ok(entry) => trie.insert(&entry),
                Err(e) => skip_entry(raw, &e),
            }
        }
        trie.nodes.shrink_to_fit();

        trie
    }

    fn insert(&mut self, domain: &str) {
        let mut node = ROOT;
        for &byte in domain.as_bytes() {
            node = self.child_or_insert(node, byte);
        }
        if self.nodes[node as usize].child(SENTINEL).is_none() {
            self.child_or_insert(node, SENTINEL);
            self.len += 1;
        }
    }

    fn child_or_insert(&mut self, node: u32, byte: u8) -> u32 {
        let next = self.nodes.len() as u32;
        let edges = &mut self.nodes[node as usize].edges;
        match edges.binary_search_by_key(&byte, |&(b, _)| b) {
            Ok(i) => edges[i].1,
            Err(i) => {
                edges.insert(i, (byte, next));
                self.nodes.push(Node::default());
                next
            }
        }
    }
}

impl DomainMatcher for TrieMatcher {
    fn contains(&self, name: &str) -> Result<bool, MatcherError> {
        check_name(name)?;

        let mut node = ROOT;
        for &byte in name.as_bytes() {
            match self.nodes[node as usize].child(byte) {
                Some(next) => node = next,
                None => return Ok(false),
            }
        }

        Ok(self.nodes[node as usize].child(SENTINEL).is_some())
    }

    fn len(&self) -> usize {
        self.len
    }
}
