//! Path-addressed memoization trie.
//!
//! The trie mirrors the document structure: each node is reached by walking
//! [`Segment`]s from the root and may hold one materialized entry together
//! with the [`ResolveDepth`] it was materialized at. Nodes live in an arena;
//! pruning a subtree returns its slots to a free list.

use std::collections::HashMap;

use crate::path::{Path, Segment};

/// How eagerly descendants are materialized when a setting is fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResolveDepth {
    /// Only the requested node.
    #[default]
    None,
    /// The requested node and its direct children.
    Shallow,
    /// The whole subtree.
    Deep,
}

#[derive(Debug)]
struct TrieNode<T> {
    entry: Option<(T, ResolveDepth)>,
    children: HashMap<Segment, usize>,
}

impl<T> TrieNode<T> {
    fn empty() -> Self {
        Self {
            entry: None,
            children: HashMap::new(),
        }
    }
}

/// Arena-backed trie keyed by path segments.
#[derive(Debug)]
pub struct Cache<T> {
    nodes: Vec<TrieNode<T>>,
    free: Vec<usize>,
}

const ROOT: usize = 0;

impl<T: Clone> Default for Cache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Cache<T> {
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::empty()],
            free: Vec::new(),
        }
    }

    fn find(&self, path: &Path) -> Option<usize> {
        let mut idx = ROOT;
        for seg in path {
            idx = *self.nodes[idx].children.get(seg)?;
        }
        Some(idx)
    }

    fn alloc(&mut self) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = TrieNode::empty();
                idx
            }
            None => {
                self.nodes.push(TrieNode::empty());
                self.nodes.len() - 1
            }
        }
    }

    fn find_or_create(&mut self, path: &Path) -> usize {
        let mut idx = ROOT;
        for seg in path {
            idx = match self.nodes[idx].children.get(seg) {
                Some(&child) => child,
                None => {
                    let child = self.alloc();
                    self.nodes[idx].children.insert(seg.clone(), child);
                    child
                }
            };
        }
        idx
    }

    /// Entry at `path` if it was materialized at `min_depth` or deeper.
    pub fn get(&self, path: &Path, min_depth: ResolveDepth) -> Option<T> {
        let idx = self.find(path)?;
        match &self.nodes[idx].entry {
            Some((entry, depth)) if *depth >= min_depth => Some(entry.clone()),
            _ => None,
        }
    }

    /// Entry at `path` regardless of depth.
    pub fn peek(&self, path: &Path) -> Option<T> {
        self.get(path, ResolveDepth::None)
    }

    /// Store `entry` at `path`, replacing whatever was there.
    pub fn insert(&mut self, path: &Path, entry: T, depth: ResolveDepth) {
        let idx = self.find_or_create(path);
        self.nodes[idx].entry = Some((entry, depth));
    }

    /// Entries cached on every strict prefix of `path`, root first.
    pub fn ancestors(&self, path: &Path) -> Vec<T> {
        let mut out = Vec::new();
        let mut idx = ROOT;
        for seg in path {
            if let Some((entry, _)) = &self.nodes[idx].entry {
                out.push(entry.clone());
            }
            match self.nodes[idx].children.get(seg) {
                Some(&child) => idx = child,
                None => break,
            }
        }
        out
    }

    fn release(&mut self, idx: usize) {
        let children: Vec<usize> = self.nodes[idx].children.drain().map(|(_, c)| c).collect();
        for child in children {
            self.release(child);
        }
        self.nodes[idx].entry = None;
        if idx != ROOT {
            self.free.push(idx);
        }
    }

    /// Drop the entry at `path` and everything beneath it.
    ///
    /// The root path resets the whole cache.
    pub fn invalidate(&mut self, path: &Path) {
        let Some(parent) = path.parent() else {
            *self = Self::new();
            return;
        };
        let Some(parent_idx) = self.find(&parent) else {
            return;
        };
        if let Some(last) = path.last()
            && let Some(idx) = self.nodes[parent_idx].children.remove(last)
        {
            self.release(idx);
        }
    }

    /// Keep the entry at `path` but drop everything beneath it.
    pub fn invalidate_children(&mut self, path: &Path) {
        let Some(idx) = self.find(path) else {
            return;
        };
        let children: Vec<usize> = self.nodes[idx].children.drain().map(|(_, c)| c).collect();
        for child in children {
            self.release(child);
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![ROOT];
        while let Some(idx) = stack.pop() {
            if self.nodes[idx].entry.is_some() {
                count += 1;
            }
            stack.extend(self.nodes[idx].children.values().copied());
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;

    #[test]
    fn test_depth_contract() {
        let mut cache = Cache::new();
        cache.insert(&path!["a"], 1, ResolveDepth::Shallow);
        assert_eq!(cache.get(&path!["a"], ResolveDepth::None), Some(1));
        assert_eq!(cache.get(&path!["a"], ResolveDepth::Shallow), Some(1));
        assert_eq!(cache.get(&path!["a"], ResolveDepth::Deep), None);
        assert_eq!(cache.get(&path!["b"], ResolveDepth::None), None);
    }

    #[test]
    fn test_invalidate_prunes_subtree() {
        let mut cache = Cache::new();
        cache.insert(&path!["a"], 1, ResolveDepth::None);
        cache.insert(&path!["a", "b"], 2, ResolveDepth::None);
        cache.insert(&path!["a", "b", 0], 3, ResolveDepth::None);
        cache.insert(&path!["c"], 4, ResolveDepth::None);

        cache.invalidate(&path!["a", "b"]);
        assert_eq!(cache.peek(&path!["a"]), Some(1));
        assert_eq!(cache.peek(&path!["a", "b"]), None);
        assert_eq!(cache.peek(&path!["a", "b", 0]), None);
        assert_eq!(cache.len(), 2);

        // freed slots are reused
        let before = cache.nodes.len();
        cache.insert(&path!["x", "y"], 5, ResolveDepth::None);
        assert_eq!(cache.nodes.len(), before);
    }

    #[test]
    fn test_invalidate_children_keeps_entry() {
        let mut cache = Cache::new();
        cache.insert(&path!["a"], 1, ResolveDepth::Deep);
        cache.insert(&path!["a", 0], 2, ResolveDepth::None);
        cache.invalidate_children(&path!["a"]);
        assert_eq!(cache.peek(&path!["a"]), Some(1));
        assert_eq!(cache.peek(&path!["a", 0]), None);
    }

    #[test]
    fn test_invalidate_root_resets() {
        let mut cache = Cache::new();
        cache.insert(&path![], 0, ResolveDepth::None);
        cache.insert(&path!["a"], 1, ResolveDepth::None);
        cache.invalidate(&path![]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_ancestors() {
        let mut cache = Cache::new();
        cache.insert(&path![], 0, ResolveDepth::None);
        cache.insert(&path!["a", "b"], 2, ResolveDepth::None);
        cache.insert(&path!["a", "b", "c"], 3, ResolveDepth::None);
        assert_eq!(cache.ancestors(&path!["a", "b", "c"]), vec![0, 2]);
    }
}
