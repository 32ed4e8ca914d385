//! Prefix/fuzzy lookup over chip and pin/bus names.
//!
//! The reference implementation keeps a fixed 26-letter trie for exactly
//! this purpose (`search_trie` on `Board`, matched against via
//! `trie.fuzzy(name)`), but its richer variant with a real fuzzy matcher
//! wasn't available to study here. This one uses a `HashMap`-keyed node per
//! character instead of a fixed alphabet (so names may contain digits and
//! underscores, as chip names do) and implements "fuzzy" as case-insensitive
//! prefix search, which is the only matching behavior the loader and
//! metadata lookup actually observe.

use std::collections::HashMap;

#[derive(Default)]
struct TrieNode {
    children: HashMap<char, TrieNode>,
    end_of_word: bool,
}

#[derive(Default)]
pub struct Trie {
    root: TrieNode,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, word: &str) {
        let mut node = &mut self.root;
        for ch in word.to_ascii_lowercase().chars() {
            node = node.children.entry(ch).or_default();
        }
        node.end_of_word = true;
    }

    pub fn contains(&self, word: &str) -> bool {
        self.find_node(word).map(|n| n.end_of_word).unwrap_or(false)
    }

    fn find_node(&self, prefix: &str) -> Option<&TrieNode> {
        let mut node = &self.root;
        for ch in prefix.to_ascii_lowercase().chars() {
            node = node.children.get(&ch)?;
        }
        Some(node)
    }

    /// All inserted words that start with `query`, case-insensitively.
    /// An exact match is always included since every full word is also a
    /// prefix of itself.
    pub fn fuzzy(&self, query: &str) -> Vec<String> {
        let Some(start) = self.find_node(query) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let prefix = query.to_ascii_lowercase();
        collect(start, &prefix, &mut out);
        out
    }
}

fn collect(node: &TrieNode, prefix: &str, out: &mut Vec<String>) {
    if node.end_of_word {
        out.push(prefix.to_string());
    }
    for (ch, child) in node.children.iter() {
        let mut next = prefix.to_string();
        next.push(*ch);
        collect(child, &next, out);
    }
}

/// True if `query` is an exact (case-insensitive) match or a case-insensitive
/// prefix of `name`. Used by metadata pin/bus lookup, which doesn't keep a
/// trie of its own.
pub fn matches(name: &str, query: &str) -> bool {
    let name = name.to_ascii_lowercase();
    let query = query.to_ascii_lowercase();
    name == query || name.starts_with(&query)
}
