//! The BST node and the low-level hand-over-hand locking primitive built on
//! top of it.
//!
//! A [`Node`] never moves once it is reachable from the tree: every field
//! that participates in the tree's shape or contents lives behind the
//! node's own [`RwLock`], and the lock is acquired and released manually
//! (via [`parking_lot`]'s `force_unlock_*` family) instead of through a
//! scope-bound guard, because the hand-over-hand protocol deliberately
//! holds a lock across the point where the reference used to reach it
//! (the parent's) is released. [`Held`] is the safe-looking handle that
//! makes this discipline hard to get wrong: it is just a raw pointer plus
//! a lock mode, and its `Drop` impl is the only place a node is unlocked.

use parking_lot::RwLock;
use std::ptr::NonNull;

use libbst::MAX_FIELD_LEN;

/// The two sides of a node a key can compare to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Left,
    Right,
}

/// The lock discipline a [`Held`] node was acquired under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeError {
    KeyTooLong,
    ValueTooLong,
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyTooLong => write!(f, "key exceeds {MAX_FIELD_LEN} bytes"),
            Self::ValueTooLong => write!(f, "value exceeds {MAX_FIELD_LEN} bytes"),
        }
    }
}

impl std::error::Error for NodeError {}

/// Everything about a node that the hand-over-hand protocol protects with
/// its lock: the key, the value, and both child links. The key is fixed at
/// construction and is only ever rewritten once, in-place, during a
/// two-child `remove` (see `Store::remove`'s case 3) — and only while this
/// node's own writer lock is held.
pub(crate) struct NodeInner {
    pub(crate) key: Box<[u8]>,
    pub(crate) value: Box<[u8]>,
    pub(crate) left: Option<Box<Node>>,
    pub(crate) right: Option<Box<Node>>,
}

pub(crate) struct Node {
    inner: RwLock<NodeInner>,
}

impl Node {
    /// Builds a new, childless node. Fails if either field is oversized;
    /// there is no allocation-failure case to report because Rust's global
    /// allocator aborts the process on OOM rather than handing back an
    /// error here (see DESIGN.md).
    pub(crate) fn new(key: &[u8], value: &[u8]) -> Result<Box<Node>, NodeError> {
        if key.len() > MAX_FIELD_LEN {
            return Err(NodeError::KeyTooLong);
        }
        if value.len() > MAX_FIELD_LEN {
            return Err(NodeError::ValueTooLong);
        }
        Ok(Box::new(Node {
            inner: RwLock::new(NodeInner {
                key: key.to_vec().into_boxed_slice(),
                value: value.to_vec().into_boxed_slice(),
                left: None,
                right: None,
            }),
        }))
    }

    /// The always-present, never-searched-for anchor node. Real data hangs
    /// off its `right` child, since every non-empty key compares greater
    /// than the empty key.
    pub(crate) fn sentinel() -> Node {
        Node {
            inner: RwLock::new(NodeInner {
                key: Box::from(&b""[..]),
                value: Box::from(&b""[..]),
                left: None,
                right: None,
            }),
        }
    }
}

/// A manually-unlocked hold on a single node, acquired in `mode`.
///
/// `Held` carries no lifetime: the pointer it wraps is valid for as long
/// as the lock it holds is held, which the hand-over-hand protocol in
/// `Store::locate` guarantees independently of Rust's borrow checker (a
/// node can only be freed by a thread that has first taken an exclusive
/// lock on it, which cannot happen while any other thread — including
/// this one — holds that same lock in any mode). Dropping a `Held`
/// releases the lock; nothing else does.
pub(crate) struct Held {
    ptr: NonNull<Node>,
    mode: Mode,
}

impl Held {
    pub(crate) fn new(node: &Node, mode: Mode) -> Held {
        match mode {
            Mode::Read => std::mem::forget(node.inner.read()),
            Mode::Write => std::mem::forget(node.inner.write()),
        }
        Held {
            ptr: NonNull::from(node),
            mode,
        }
    }

    fn node(&self) -> &Node {
        // SAFETY: the node outlives this `Held` by the locking invariant
        // documented on the type.
        unsafe { self.ptr.as_ref() }
    }

    pub(crate) fn inner(&self) -> &NodeInner {
        // SAFETY: `self` holds at least a read lock on this node's `RwLock`,
        // acquired in `Held::new` and not yet released.
        unsafe { &*self.node().inner.data_ptr() }
    }

    pub(crate) fn inner_mut(&mut self) -> &mut NodeInner {
        debug_assert_eq!(self.mode, Mode::Write, "inner_mut on a read-locked node");
        // SAFETY: `self` holds the write lock on this node's `RwLock`.
        unsafe { &mut *self.node().inner.data_ptr() }
    }

    pub(crate) fn key(&self) -> &[u8] {
        &self.inner().key
    }

    pub(crate) fn child(&self, side: Side) -> Option<&Node> {
        let slot = match side {
            Side::Left => &self.inner().left,
            Side::Right => &self.inner().right,
        };
        slot.as_deref()
    }

    pub(crate) fn child_slot_mut(&mut self, side: Side) -> &mut Option<Box<Node>> {
        match side {
            Side::Left => &mut self.inner_mut().left,
            Side::Right => &mut self.inner_mut().right,
        }
    }
}

impl Drop for Held {
    fn drop(&mut self) {
        // SAFETY: this `Held` is the sole owner of the lock it acquired.
        unsafe {
            match self.mode {
                Mode::Read => self.node().inner.force_unlock_read(),
                Mode::Write => self.node().inner.force_unlock_write(),
            }
        }
    }
}

/// Which child of `node_key` a `key` belongs under. Byte-lexicographic,
/// matching `str`/`[u8]`'s derived `Ord`. Equal keys go right, mirroring
/// the source's `strcmp(name, parent->name) < 0` tie-break — `add` never
/// lets this branch be taken for a key already present, since `locate`
/// would have found it first.
pub(crate) fn side_for(key: &[u8], node_key: &[u8]) -> Side {
    if key < node_key {
        Side::Left
    } else {
        Side::Right
    }
}
