//! Per-call copy state.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::graph::{NodeKey, ResourceRef};

/// Counters reported at the end of a copy session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CopyStats {
    /// Nodes whose members were walked.
    pub copied: u32,
    /// Source nodes resolved to an existing destination node.
    pub reused: u32,
    /// Source nodes resolved by manufacturing a new node.
    pub cloned: u32,
    /// Resolutions that produced nothing.
    pub failed: u32,
    /// Re-entrant copies skipped by the in-progress guard.
    pub cycles_absorbed: u32,
}

/// Cycle guard plus sharing memo for one capture or reconcile call.
///
/// Keys on the source side: a source node is copied at most once per
/// session, and every reference to it maps to the same destination.
#[derive(Debug, Default)]
pub struct CopySession {
    in_progress: HashSet<NodeKey>,
    done: HashSet<NodeKey>,
    memo: HashMap<NodeKey, NodeKey>,
    resources: HashMap<ResourceRef, ResourceRef>,
    released: Vec<NodeKey>,
    pub stats: CopyStats,
}

impl CopySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a source node as being copied. Returns false if it already is.
    pub fn begin(&mut self, source: NodeKey) -> bool {
        self.in_progress.insert(source)
    }

    pub fn finish(&mut self, source: NodeKey) {
        self.in_progress.remove(&source);
        self.done.insert(source);
    }

    pub fn is_in_progress(&self, source: NodeKey) -> bool {
        self.in_progress.contains(&source)
    }

    /// Whether `source` was fully copied onto `dest` earlier in this session.
    pub fn is_done(&self, source: NodeKey, dest: NodeKey) -> bool {
        self.done.contains(&source) && self.memo.get(&source) == Some(&dest)
    }

    pub fn lookup(&self, source: NodeKey) -> Option<NodeKey> {
        self.memo.get(&source).copied()
    }

    /// Record a mapping; an existing mapping for `source` wins.
    pub fn memoize(&mut self, source: NodeKey, dest: NodeKey) -> NodeKey {
        *self.memo.entry(source).or_insert(dest)
    }

    pub fn lookup_resource(&self, source: ResourceRef) -> Option<ResourceRef> {
        self.resources.get(&source).copied()
    }

    pub fn memoize_resource(&mut self, source: ResourceRef, dest: ResourceRef) {
        self.resources.entry(source).or_insert(dest);
    }

    /// Record a destination component detached from its owner.
    pub fn note_released(&mut self, dest: NodeKey) {
        if !self.released.contains(&dest) {
            self.released.push(dest);
        }
    }

    /// Destination components released so far, in release order.
    pub fn released(&self) -> &[NodeKey] {
        &self.released
    }

    /// Destination nodes produced or reused so far.
    pub fn destinations(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.memo.values().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn first_mapping_wins() {
        let mut keys: SlotMap<NodeKey, ()> = SlotMap::with_key();
        let (a, b, c) = (keys.insert(()), keys.insert(()), keys.insert(()));

        let mut session = CopySession::new();
        assert_eq!(session.memoize(a, b), b);
        assert_eq!(session.memoize(a, c), b);
        assert_eq!(session.lookup(a), Some(b));
    }

    #[test]
    fn in_progress_guard() {
        let mut keys: SlotMap<NodeKey, ()> = SlotMap::with_key();
        let (a, b) = (keys.insert(()), keys.insert(()));

        let mut session = CopySession::new();
        assert!(session.begin(a));
        assert!(!session.begin(a));
        session.memoize(a, b);
        assert!(!session.is_done(a, b));
        session.finish(a);
        assert!(!session.is_in_progress(a));
        assert!(session.is_done(a, b));
    }
}
