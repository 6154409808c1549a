//! String prefix/suffix trie index (4.9).
//!
//! Each trie node carries the multi-set of `Pref`s whose value has that
//! node's prefix, so `starts_with(q)` is a descent to the node for `q`
//! followed by reading that node's set directly rather than re-walking
//! every string below it. The suffix index is the same structure built
//! over each value's reversed characters.

use crate::pref::Pref;
use hashbrown::HashMap;

#[derive(Debug, Default)]
struct Node {
    children: HashMap<char, Node>,
    refs: Vec<Pref>,
}

#[derive(Debug, Default)]
pub struct StringTrieIndex {
    root: Node,
    /// `reversed = true` makes this a suffix index: strings are inserted
    /// and queried with their characters reversed.
    reversed: bool,
}

impl StringTrieIndex {
    pub fn new_prefix() -> Self {
        Self { root: Node::default(), reversed: false }
    }

    pub fn new_suffix() -> Self {
        Self { root: Node::default(), reversed: true }
    }

    fn chars(&self, s: &str) -> Vec<char> {
        if self.reversed {
            s.chars().rev().collect()
        } else {
            s.chars().collect()
        }
    }

    pub fn insert(&mut self, value: &str, pref: Pref) {
        let mut node = &mut self.root;
        node.refs.push(pref);
        for c in self.chars(value) {
            node = node.children.entry(c).or_default();
            node.refs.push(pref);
        }
    }

    pub fn remove(&mut self, value: &str, pref: Pref) {
        let mut node = &mut self.root;
        node.refs.retain(|&p| p != pref);
        for c in self.chars(value) {
            let Some(next) = node.children.get_mut(&c) else { return };
            next.refs.retain(|&p| p != pref);
            node = next;
        }
    }

    /// Descends to the node for `query` and returns its subtree's
    /// multi-set, i.e. every row whose (possibly reversed) value starts
    /// with `query`.
    pub fn starts_with(&self, query: &str) -> &[Pref] {
        let mut node = &self.root;
        for c in self.chars(query) {
            match node.children.get(&c) {
                Some(n) => node = n,
                None => return &[],
            }
        }
        &node.refs
    }
}
