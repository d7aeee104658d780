//! Keyed, ordered queue backing the merge train.
//!
//! A `Sequencer` is a FIFO with priority insertion and O(1) keyed removal and
//! reordering. Nodes live in an arena (a slab of slots addressed by index)
//! and are chained with back/forward slot indices instead of pointers, with a
//! key-to-slot map for constant-time lookup.
//!
//! All mutating operations take the internal lock for the duration of the
//! structural edit only. The lock guards against concurrent signal handlers
//! within the owning actor; cross-actor access never happens because each
//! actor owns its sequencer exclusively.
//!
//! Operating on an absent key is always a no-op, never an error.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

/// One arena slot.
#[derive(Debug)]
struct Node<K, E> {
    key: K,
    item: E,
    prev: Option<usize>,
    next: Option<usize>,
}

/// The chain state, mutated only under the sequencer lock.
#[derive(Debug)]
struct Chain<K, E> {
    nodes: Vec<Option<Node<K, E>>>,
    free: Vec<usize>,
    index: HashMap<K, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K: Eq + Hash + Clone, E> Chain<K, E> {
    fn new() -> Self {
        Chain {
            nodes: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    fn alloc(&mut self, key: K, item: E) -> usize {
        let node = Node {
            key,
            item,
            prev: None,
            next: None,
        };
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn node(&self, idx: usize) -> &Node<K, E> {
        self.nodes[idx].as_ref().expect("slot in use")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<K, E> {
        self.nodes[idx].as_mut().expect("slot in use")
    }

    /// Detaches a node from the chain, fixing neighbors and head/tail.
    /// The slot stays allocated; the node's own links are cleared.
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let n = self.node(idx);
            (n.prev, n.next)
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(nx) => self.node_mut(nx).prev = prev,
            None => self.tail = prev,
        }
        let n = self.node_mut(idx);
        n.prev = None;
        n.next = None;
    }

    /// Frees a detached slot, returning its node.
    fn release(&mut self, idx: usize) -> Node<K, E> {
        let node = self.nodes[idx].take().expect("slot in use");
        self.free.push(idx);
        node
    }

    fn link_tail(&mut self, idx: usize) {
        self.node_mut(idx).prev = self.tail;
        match self.tail {
            Some(t) => self.node_mut(t).next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }

    fn link_head(&mut self, idx: usize) {
        self.node_mut(idx).next = self.head;
        match self.head {
            Some(h) => self.node_mut(h).prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    /// Splices a detached node back in, directly before `anchor`.
    fn insert_before(&mut self, idx: usize, anchor: usize) {
        let anchor_prev = self.node(anchor).prev;
        self.node_mut(idx).prev = anchor_prev;
        self.node_mut(idx).next = Some(anchor);
        match anchor_prev {
            Some(p) => self.node_mut(p).next = Some(idx),
            None => self.head = Some(idx),
        }
        self.node_mut(anchor).prev = Some(idx);
    }

    /// Splices a detached node back in, directly after `anchor`.
    fn insert_after(&mut self, idx: usize, anchor: usize) {
        let anchor_next = self.node(anchor).next;
        self.node_mut(idx).prev = Some(anchor);
        self.node_mut(idx).next = anchor_next;
        match anchor_next {
            Some(nx) => self.node_mut(nx).prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.node_mut(anchor).next = Some(idx);
    }

    /// Drops an existing node for `key`, if any. Keeps the index invariant:
    /// every key maps to exactly one reachable node.
    fn evict(&mut self, key: &K) {
        if let Some(idx) = self.index.remove(key) {
            self.unlink(idx);
            self.release(idx);
        }
    }
}

/// Keyed ordered queue with priority insertion and O(1) keyed mutation.
#[derive(Debug)]
pub struct Sequencer<K, E> {
    inner: Mutex<Chain<K, E>>,
}

impl<K: Eq + Hash + Clone, E> Default for Sequencer<K, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, E> Sequencer<K, E> {
    pub fn new() -> Self {
        Sequencer {
            inner: Mutex::new(Chain::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Chain<K, E>> {
        // A poisoned lock means a panic mid-edit; the chain is repaired by the
        // panicking operation before any unwind point, so recover and continue.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends an item at the tail. An existing entry for the same key is
    /// replaced (the old node is dropped, the new one appended).
    pub fn push(&self, key: K, item: E) {
        let mut chain = self.lock();
        chain.evict(&key);
        let idx = chain.alloc(key.clone(), item);
        chain.link_tail(idx);
        chain.index.insert(key, idx);
    }

    /// Inserts an item at the head. An existing entry for the same key is
    /// replaced.
    pub fn priority(&self, key: K, item: E) {
        let mut chain = self.lock();
        chain.evict(&key);
        let idx = chain.alloc(key.clone(), item);
        chain.link_head(idx);
        chain.index.insert(key, idx);
    }

    /// Removes and returns the head item, or `None` if the queue is empty.
    pub fn pop(&self) -> Option<E> {
        let mut chain = self.lock();
        let idx = chain.head?;
        chain.unlink(idx);
        let node = chain.release(idx);
        chain.index.remove(&node.key);
        Some(node.item)
    }

    /// Unlinks the node for `key`, if present.
    pub fn remove(&self, key: &K) {
        let mut chain = self.lock();
        chain.evict(key);
    }

    /// Moves the node for `key` one position toward the head. No-op if the
    /// node is absent or already the head.
    pub fn promote(&self, key: &K) {
        let mut chain = self.lock();
        let Some(&idx) = chain.index.get(key) else {
            return;
        };
        let Some(anchor) = chain.node(idx).prev else {
            return;
        };
        chain.unlink(idx);
        chain.insert_before(idx, anchor);
    }

    /// Moves the node for `key` one position toward the tail. No-op if the
    /// node is absent or already the tail.
    pub fn demote(&self, key: &K) {
        let mut chain = self.lock();
        let Some(&idx) = chain.index.get(key) else {
            return;
        };
        let Some(anchor) = chain.node(idx).next else {
            return;
        };
        chain.unlink(idx);
        chain.insert_after(idx, anchor);
    }

    /// Returns the 1-based position of `key` counted from the head, or 0 if
    /// the key is absent. O(n): walks the chain from the head.
    pub fn position(&self, key: &K) -> usize {
        let chain = self.lock();
        let Some(&target) = chain.index.get(key) else {
            return 0;
        };
        let mut pos = 1;
        let mut cursor = chain.head;
        while let Some(idx) = cursor {
            if idx == target {
                return pos;
            }
            pos += 1;
            cursor = chain.node(idx).next;
        }
        0
    }

    /// Returns the number of queued items. O(n): walks the full chain.
    pub fn len(&self) -> usize {
        let chain = self.lock();
        let mut count = 0;
        let mut cursor = chain.head;
        while let Some(idx) = cursor {
            count += 1;
            cursor = chain.node(idx).next;
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.lock().head.is_none()
    }
}

impl<K: Eq + Hash + Clone, E: Clone> Sequencer<K, E> {
    /// Returns the head item without removing it.
    pub fn peek(&self) -> Option<E> {
        let chain = self.lock();
        chain.head.map(|idx| chain.node(idx).item.clone())
    }

    /// Returns a snapshot of all items, ordered front to back.
    pub fn all(&self) -> Vec<E> {
        let chain = self.lock();
        let mut out = Vec::new();
        let mut cursor = chain.head;
        while let Some(idx) = cursor {
            let node = chain.node(idx);
            out.push(node.item.clone());
            cursor = node.next;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(seq: &Sequencer<&'static str, u32>) -> Vec<u32> {
        seq.all()
    }

    #[test]
    fn push_appends_in_fifo_order() {
        let seq = Sequencer::new();
        seq.push("a", 1);
        seq.push("b", 2);
        seq.push("c", 3);
        assert_eq!(keys(&seq), vec![1, 2, 3]);
        assert_eq!(seq.pop(), Some(1));
        assert_eq!(seq.pop(), Some(2));
        assert_eq!(seq.pop(), Some(3));
        assert_eq!(seq.pop(), None);
    }

    #[test]
    fn priority_inserts_at_head() {
        let seq = Sequencer::new();
        seq.push("a", 1);
        seq.push("b", 2);
        seq.priority("c", 3);
        assert_eq!(keys(&seq), vec![3, 1, 2]);
        assert_eq!(seq.position(&"c"), 1);
    }

    #[test]
    fn pop_on_empty_is_none_and_peek_matches_head() {
        let seq: Sequencer<&str, u32> = Sequencer::new();
        assert_eq!(seq.pop(), None);
        assert_eq!(seq.peek(), None);
        seq.push("a", 7);
        assert_eq!(seq.peek(), Some(7));
        assert_eq!(seq.len(), 1);
    }

    #[test]
    fn remove_only_node_resets_head_and_tail() {
        let seq = Sequencer::new();
        seq.push("a", 1);
        seq.remove(&"a");
        assert!(seq.is_empty());
        assert_eq!(seq.len(), 0);
        // The chain must be fully usable again afterwards.
        seq.push("b", 2);
        assert_eq!(keys(&seq), vec![2]);
    }

    #[test]
    fn remove_absent_key_is_noop() {
        let seq = Sequencer::new();
        seq.push("a", 1);
        seq.remove(&"nope");
        assert_eq!(keys(&seq), vec![1]);
    }

    #[test]
    fn promote_and_demote_swap_with_neighbor() {
        let seq = Sequencer::new();
        seq.push("a", 1);
        seq.push("b", 2);
        seq.push("c", 3);

        seq.promote(&"c");
        assert_eq!(keys(&seq), vec![1, 3, 2]);
        seq.promote(&"c");
        assert_eq!(keys(&seq), vec![3, 1, 2]);

        seq.demote(&"a");
        assert_eq!(keys(&seq), vec![3, 2, 1]);
    }

    #[test]
    fn promote_head_and_demote_tail_are_noops() {
        let seq = Sequencer::new();
        seq.push("a", 1);
        seq.push("b", 2);

        seq.promote(&"a");
        assert_eq!(keys(&seq), vec![1, 2]);
        seq.demote(&"b");
        assert_eq!(keys(&seq), vec![1, 2]);
        seq.promote(&"absent");
        seq.demote(&"absent");
        assert_eq!(keys(&seq), vec![1, 2]);
    }

    #[test]
    fn position_is_zero_iff_absent_and_one_for_head() {
        let seq = Sequencer::new();
        assert_eq!(seq.position(&"a"), 0);
        seq.push("a", 1);
        seq.push("b", 2);
        assert_eq!(seq.position(&"a"), 1);
        assert_eq!(seq.position(&"b"), 2);
        assert_eq!(seq.position(&"c"), 0);
        seq.pop();
        assert_eq!(seq.position(&"a"), 0);
        assert_eq!(seq.position(&"b"), 1);
    }

    #[test]
    fn push_existing_key_replaces_entry() {
        let seq = Sequencer::new();
        seq.push("a", 1);
        seq.push("b", 2);
        seq.push("a", 10);
        assert_eq!(keys(&seq), vec![2, 10]);
        assert_eq!(seq.len(), 2);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Push(u8),
            Priority(u8),
            Pop,
            Remove(u8),
            Promote(u8),
            Demote(u8),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..8).prop_map(Op::Push),
                (0u8..8).prop_map(Op::Priority),
                Just(Op::Pop),
                (0u8..8).prop_map(Op::Remove),
                (0u8..8).prop_map(Op::Promote),
                (0u8..8).prop_map(Op::Demote),
            ]
        }

        /// A naive model: a Vec of (key, item) pairs with the same contract.
        fn apply_model(model: &mut Vec<(u8, u8)>, op: &Op) {
            match *op {
                Op::Push(k) => {
                    model.retain(|(key, _)| *key != k);
                    model.push((k, k));
                }
                Op::Priority(k) => {
                    model.retain(|(key, _)| *key != k);
                    model.insert(0, (k, k));
                }
                Op::Pop => {
                    if !model.is_empty() {
                        model.remove(0);
                    }
                }
                Op::Remove(k) => model.retain(|(key, _)| *key != k),
                Op::Promote(k) => {
                    if let Some(pos) = model.iter().position(|(key, _)| *key == k)
                        && pos > 0
                    {
                        model.swap(pos, pos - 1);
                    }
                }
                Op::Demote(k) => {
                    if let Some(pos) = model.iter().position(|(key, _)| *key == k)
                        && pos + 1 < model.len()
                    {
                        model.swap(pos, pos + 1);
                    }
                }
            }
        }

        proptest! {
            #[test]
            fn matches_naive_model(ops in proptest::collection::vec(op_strategy(), 0..64)) {
                let seq: Sequencer<u8, u8> = Sequencer::new();
                let mut model: Vec<(u8, u8)> = Vec::new();

                for op in &ops {
                    match *op {
                        Op::Push(k) => seq.push(k, k),
                        Op::Priority(k) => seq.priority(k, k),
                        Op::Pop => { seq.pop(); }
                        Op::Remove(k) => seq.remove(&k),
                        Op::Promote(k) => seq.promote(&k),
                        Op::Demote(k) => seq.demote(&k),
                    }
                    apply_model(&mut model, op);

                    // Snapshot order matches the model after every step.
                    let expect: Vec<u8> = model.iter().map(|(_, v)| *v).collect();
                    prop_assert_eq!(seq.all(), expect);

                    // Index and chain stay mutually consistent: every live key
                    // is reachable from the head at exactly its position.
                    prop_assert_eq!(seq.len(), model.len());
                    for (pos, (key, _)) in model.iter().enumerate() {
                        prop_assert_eq!(seq.position(key), pos + 1);
                    }
                }
            }
        }
    }
}
