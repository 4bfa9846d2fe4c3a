//! # subject-tree
//!
//! An in-memory adaptive radix tree keyed by dot-delimited subjects, built
//! for publish/subscribe routing: store `subject -> value`, then enumerate
//! every stored subject matching a filter that may contain token wildcards
//! (`*` for exactly one token, `>` for one or more trailing tokens).
//!
//! Internal nodes adapt their layout to their fanout (4/10/16/48/256
//! children) and carry compressed path prefixes, so deep subject spaces
//! stay shallow and dense ones stay small.
//!
//! ## Example
//!
//! ```rust
//! use subject_tree::SubjectTree;
//!
//! let mut tree: SubjectTree<u64> = SubjectTree::new();
//! tree.insert(b"orders.eu.created", 1);
//! tree.insert(b"orders.us.created", 2);
//! tree.insert(b"orders.us.cancelled", 3);
//!
//! assert_eq!(tree.find(b"orders.us.created"), Some(&2));
//!
//! let mut created = 0;
//! tree.match_filter(b"orders.*.created", |_subject, _value| created += 1);
//! assert_eq!(created, 2);
//! ```
//!
//! The tree is single-threaded: callers serialize mutation themselves.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod debug;
mod node;
mod parts;
#[cfg(test)]
mod proptests;

use crate::node::{Leaf, Node, Node4};
use crate::parts::{gen_parts, match_parts, FragMatch, Part};

/// Token separator byte (`.`).
pub const TSEP: u8 = b'.';
/// Partial wildcard byte (`*`): matches exactly one token. Filters only.
pub const PWC: u8 = b'*';
/// Full wildcard byte (`>`): matches one or more trailing tokens, and is
/// only valid as the final token. Filters only.
pub const FWC: u8 = b'>';
/// Reserved discriminator byte (ASCII DEL) marking a subject that ends
/// exactly at an internal node. Subjects containing it are rejected.
pub const NO_PIVOT: u8 = 0x7F;

/// Length of the shared leading byte run of `a` and `b`.
#[inline]
fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// The byte a subject branches on at `i`, or the no-pivot marker when the
/// subject ends there.
#[inline]
fn pivot(subject: &[u8], i: usize) -> u8 {
    if i < subject.len() {
        subject[i]
    } else {
        NO_PIVOT
    }
}

/// An adaptive radix tree mapping dot-delimited subjects to values.
///
/// Subjects are opaque byte strings; only the no-pivot byte (0x7F) is
/// reserved. Wildcards are meaningful in filters passed to
/// [`match_filter`](SubjectTree::match_filter), never in stored subjects.
pub struct SubjectTree<T> {
    pub(crate) root: Option<Node<T>>,
    size: u64,
}

impl<T> SubjectTree<T> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self { root: None, size: 0 }
    }

    /// Number of stored subjects.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the tree holds no subjects.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Insert or update `subject`.
    ///
    /// Returns the previous value and whether an existing entry was
    /// replaced. A subject containing the reserved no-pivot byte is
    /// silently rejected with `(None, false)`.
    pub fn insert(&mut self, subject: &[u8], value: T) -> (Option<T>, bool) {
        if subject.contains(&NO_PIVOT) {
            return (None, false);
        }
        if self.root.is_none() {
            self.root = Some(Node::leaf(subject, value));
            self.size += 1;
            return (None, false);
        }
        let root = self.root.as_mut().expect("non-empty tree");
        let (old, updated) = Self::insert_node(root, subject, 0, value);
        if !updated {
            self.size += 1;
        }
        (old, updated)
    }

    /// Look up a subject by exact bytes. Wildcards are not interpreted.
    pub fn find(&self, subject: &[u8]) -> Option<&T> {
        let mut n = self.root.as_ref()?;
        let mut si = 0;
        loop {
            match n {
                Node::Leaf(l) => return l.matches(&subject[si..]).then_some(&l.value),
                _ => {
                    let prefix = n.path();
                    if !subject[si..].starts_with(prefix) {
                        return None;
                    }
                    si += prefix.len();
                    n = n.find_child(pivot(subject, si))?;
                }
            }
        }
    }

    /// Remove a subject, returning its value if it was present.
    pub fn delete(&mut self, subject: &[u8]) -> Option<T> {
        if let Some(Node::Leaf(l)) = &self.root {
            if !l.matches(subject) {
                return None;
            }
            let Some(Node::Leaf(l)) = self.root.take() else { unreachable!() };
            self.size -= 1;
            return Some(l.value);
        }
        let root = self.root.as_mut()?;
        let value = Self::delete_node(root, subject, 0)?;
        self.size -= 1;
        Some(value)
    }

    /// Invoke `cb` with every stored subject matching `filter`, passing
    /// the reconstructed subject bytes and a reference to the value.
    ///
    /// `*` matches exactly one token and `>` matches one or more trailing
    /// tokens, each recognized only when it occupies a whole filter token.
    /// Wildcard bytes inside a token are treated as literals.
    pub fn match_filter<F>(&self, filter: &[u8], mut cb: F)
    where
        F: FnMut(&[u8], &T),
    {
        // A lone `>` matches every stored subject.
        if filter == [FWC] {
            self.iter_fast(|subject, value| {
                cb(subject, value);
                true
            });
            return;
        }
        let parts = gen_parts(filter);
        if parts.is_empty() {
            return;
        }
        if let Some(root) = &self.root {
            let mut pre = Vec::with_capacity(filter.len().max(16));
            Self::match_node(root, &parts, &mut pre, &mut cb);
        }
    }

    /// Depth-first walk in each node's native child order. No ordering
    /// guarantee beyond visiting every entry once. The callback returns
    /// `false` to stop.
    pub fn iter_fast<F>(&self, mut cb: F)
    where
        F: FnMut(&[u8], &T) -> bool,
    {
        if let Some(root) = &self.root {
            let mut pre = Vec::new();
            Self::walk_fast(root, &mut pre, &mut cb);
        }
    }

    /// Walk entries in ascending subject order, with the convention that a
    /// subject ending at an internal node precedes every subject that
    /// extends it. The callback returns `false` to stop.
    pub fn iter_ordered<F>(&self, mut cb: F)
    where
        F: FnMut(&[u8], &T) -> bool,
    {
        if let Some(root) = &self.root {
            let mut pre = Vec::new();
            Self::walk_ordered(root, &mut pre, &mut cb);
        }
    }

    fn insert_node(n: &mut Node<T>, subject: &[u8], si: usize, value: T) -> (Option<T>, bool) {
        if let Node::Leaf(leaf) = n {
            if leaf.matches(&subject[si..]) {
                let old = std::mem::replace(&mut leaf.value, value);
                return (Some(old), true);
            }
            // Diverging subject: seat a node4 over the shared bytes and
            // re-key both leaves under their pivot bytes.
            let rem = &subject[si..];
            let cpi = common_prefix_len(&leaf.suffix, rem);
            let old = std::mem::replace(n, Node::Node4(Box::new(Node4::new(rem[..cpi].to_vec()))));
            let Node::Leaf(mut old_leaf) = old else { unreachable!() };
            let old_pivot = pivot(&old_leaf.suffix, cpi);
            old_leaf.suffix.drain(..cpi);
            n.add_child(old_pivot, Node::Leaf(old_leaf));
            n.add_child(pivot(rem, cpi), Node::leaf(&rem[cpi..], value));
            return (None, false);
        }

        let rem = &subject[si..];
        let cpi = common_prefix_len(n.path(), rem);
        if cpi < n.path().len() {
            // The prefix diverges: split it at the shared point. The
            // existing node keeps the tail of its prefix (pivot byte
            // included) and drops one level.
            let mut shared = n.take_prefix();
            let tail = shared.split_off(cpi);
            let branch = tail[0];
            let mut old = std::mem::replace(n, Node::Node4(Box::new(Node4::new(shared))));
            old.set_prefix(tail);
            n.add_child(branch, old);
            n.add_child(pivot(rem, cpi), Node::leaf(&rem[cpi..], value));
            return (None, false);
        }

        let si = si + n.path().len();
        let d = pivot(subject, si);
        if n.has_child(d) {
            let child = n.find_child_mut(d).expect("child just located");
            return Self::insert_node(child, subject, si, value);
        }
        if n.is_full() {
            n.grow();
        }
        n.add_child(d, Node::leaf(&subject[si..], value));
        (None, false)
    }

    fn delete_node(n: &mut Node<T>, subject: &[u8], si: usize) -> Option<T> {
        if !subject[si..].starts_with(n.path()) {
            return None;
        }
        let si = si + n.path().len();
        let d = pivot(subject, si);

        enum At {
            Missing,
            LeafMiss,
            LeafHit,
            Inner,
        }
        let at = match n.find_child(d) {
            None => At::Missing,
            Some(Node::Leaf(l)) => {
                if l.matches(&subject[si..]) {
                    At::LeafHit
                } else {
                    At::LeafMiss
                }
            }
            Some(_) => At::Inner,
        };
        match at {
            At::Missing | At::LeafMiss => None,
            At::Inner => {
                let child = n.find_child_mut(d).expect("child just located");
                Self::delete_node(child, subject, si)
            }
            At::LeafHit => {
                let removed = n.delete_child(d).expect("child just located");
                let Node::Leaf(l) = removed else { unreachable!() };
                if n.num_children() == 1 {
                    Self::collapse_into_sole_child(n);
                } else {
                    n.shrink();
                }
                Some(l.value)
            }
        }
    }

    /// Replace a single-child node with that child, folding the node's
    /// prefix onto the front of the child's path.
    fn collapse_into_sole_child(n: &mut Node<T>) {
        let mut merged = n.take_prefix();
        let (_, mut child) = n.take_sole_child();
        match &mut child {
            Node::Leaf(l) => {
                merged.extend_from_slice(&l.suffix);
                l.suffix = merged;
            }
            inner => {
                merged.extend_from_slice(inner.path());
                inner.set_prefix(merged);
            }
        }
        *n = child;
    }

    fn match_node<F>(n: &Node<T>, parts: &[Part<'_>], pre: &mut Vec<u8>, cb: &mut F)
    where
        F: FnMut(&[u8], &T),
    {
        if let Node::Leaf(l) = n {
            match match_parts(parts, &l.suffix) {
                FragMatch::Matched | FragMatch::MatchedAll | FragMatch::TrailingWild => {
                    Self::emit_leaf(l, pre, cb);
                }
                FragMatch::Mismatch | FragMatch::Descend(_) => {}
            }
            return;
        }

        let result = match_parts(parts, n.path());
        if result == FragMatch::Mismatch {
            return;
        }
        let mark = pre.len();
        pre.extend_from_slice(n.path());
        match result {
            FragMatch::Mismatch => unreachable!(),
            FragMatch::Matched => {
                // Filter consumed: only a subject ending at this node can
                // still match.
                if let Some(Node::Leaf(l)) = n.find_child(NO_PIVOT) {
                    Self::emit_leaf(l, pre, cb);
                }
            }
            FragMatch::MatchedAll => {
                n.for_each_child(&mut |_, child| {
                    Self::match_all_below(child, pre, cb);
                    true
                });
            }
            FragMatch::TrailingWild => {
                // The open token may close exactly at this node...
                if let Some(Node::Leaf(l)) = n.find_child(NO_PIVOT) {
                    Self::emit_leaf(l, pre, cb);
                }
                // ...or keep running into the children.
                let tail = [Part::Pwc];
                n.for_each_child(&mut |c, child| {
                    if c != NO_PIVOT {
                        Self::match_node(child, &tail, pre, cb);
                    }
                    true
                });
            }
            FragMatch::Descend(rp) => match rp[0] {
                Part::Fwc => {
                    n.for_each_child(&mut |_, child| {
                        Self::match_all_below(child, pre, cb);
                        true
                    });
                }
                Part::Pwc => {
                    n.for_each_child(&mut |_, child| {
                        Self::match_node(child, &rp, pre, cb);
                        true
                    });
                }
                Part::Lit(lit) => {
                    if let Some(child) = n.find_child(lit[0]) {
                        Self::match_node(child, &rp, pre, cb);
                    }
                }
            },
        }
        pre.truncate(mark);
    }

    /// Emit every entry at or below `n`; used once a `>` has matched.
    fn match_all_below<F>(n: &Node<T>, pre: &mut Vec<u8>, cb: &mut F)
    where
        F: FnMut(&[u8], &T),
    {
        match n {
            Node::Leaf(l) => Self::emit_leaf(l, pre, cb),
            _ => {
                let mark = pre.len();
                pre.extend_from_slice(n.path());
                n.for_each_child(&mut |_, child| {
                    Self::match_all_below(child, pre, cb);
                    true
                });
                pre.truncate(mark);
            }
        }
    }

    fn emit_leaf<F>(l: &Leaf<T>, pre: &mut Vec<u8>, cb: &mut F)
    where
        F: FnMut(&[u8], &T),
    {
        let mark = pre.len();
        pre.extend_from_slice(&l.suffix);
        cb(pre, &l.value);
        pre.truncate(mark);
    }

    fn walk_fast<F>(n: &Node<T>, pre: &mut Vec<u8>, cb: &mut F) -> bool
    where
        F: FnMut(&[u8], &T) -> bool,
    {
        match n {
            Node::Leaf(l) => {
                let mark = pre.len();
                pre.extend_from_slice(&l.suffix);
                let keep_going = cb(pre, &l.value);
                pre.truncate(mark);
                keep_going
            }
            _ => {
                let mark = pre.len();
                pre.extend_from_slice(n.path());
                let keep_going = n.for_each_child(&mut |_, child| Self::walk_fast(child, pre, cb));
                pre.truncate(mark);
                keep_going
            }
        }
    }

    fn walk_ordered<F>(n: &Node<T>, pre: &mut Vec<u8>, cb: &mut F) -> bool
    where
        F: FnMut(&[u8], &T) -> bool,
    {
        match n {
            Node::Leaf(l) => {
                let mark = pre.len();
                pre.extend_from_slice(&l.suffix);
                let keep_going = cb(pre, &l.value);
                pre.truncate(mark);
                keep_going
            }
            _ => {
                let mark = pre.len();
                pre.extend_from_slice(n.path());
                let keep_going =
                    n.for_each_child_ordered(&mut |child| Self::walk_ordered(child, pre, cb));
                pre.truncate(mark);
                keep_going
            }
        }
    }
}

impl<T> Default for SubjectTree<T> {
    fn default() -> Self {
        Self::new()
    }
}
