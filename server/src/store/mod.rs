//! The concurrent, hand-over-hand locked binary search tree that backs the
//! key/value store. See `node.rs` for the locking primitive this module is
//! built on.

mod node;

pub use node::NodeError;
use node::{side_for, Held, Mode, Node, Side};

use std::io::{self, Write};

/// Sentinel-rooted BST. Every operation starts at `sentinel` and walks
/// real keys off its right child. `Store` must not be moved once any
/// operation has been run against it — wrap it in an `Arc` (or a `Box`)
/// immediately after construction, the way `main` does, since `Held`
/// tracks nodes by address rather than by Rust reference.
pub struct Store {
    sentinel: Node,
}

pub enum AddOutcome {
    Inserted,
    AlreadyPresent,
}

pub enum RemoveOutcome {
    Removed,
    NotFound,
}

struct Locate {
    target: Option<Held>,
    parent: Held,
    side: Side,
}

impl Store {
    pub fn new() -> Store {
        Store {
            sentinel: Node::sentinel(),
        }
    }

    /// Hand-over-hand descent from the sentinel. Locks the next node
    /// before releasing the one that was used to find it, so a node is
    /// never reachable without a lock being held on it somewhere along
    /// the path that found it.
    fn locate(&self, key: &[u8], mode: Mode) -> Locate {
        let mut parent = Held::new(&self.sentinel, mode);
        loop {
            let side = side_for(key, parent.key());
            let child = match parent.child(side) {
                None => return Locate { target: None, parent, side },
                Some(child) => child,
            };
            let child_held = Held::new(child, mode);
            if child_held.key() == key {
                return Locate {
                    target: Some(child_held),
                    parent,
                    side,
                };
            }
            // `child_held` is already locked; dropping the old `parent` now
            // releases the lock one step further back, never leaving the
            // path completely unlocked.
            parent = child_held;
        }
    }

    /// Looks up `key`, returning a copy of its value if present.
    pub fn query(&self, key: &[u8]) -> Option<Vec<u8>> {
        let Locate { target, .. } = self.locate(key, Mode::Read);
        target.map(|held| held.inner().value.to_vec())
    }

    /// Inserts `key` with `value` unless `key` is already present.
    pub fn add(&self, key: &[u8], value: &[u8]) -> Result<AddOutcome, NodeError> {
        let Locate { target, mut parent, side } = self.locate(key, Mode::Write);
        if target.is_some() {
            return Ok(AddOutcome::AlreadyPresent);
        }
        let new_node = Node::new(key, value)?;
        *parent.child_slot_mut(side) = Some(new_node);
        Ok(AddOutcome::Inserted)
    }

    /// Removes `key`, if present, rewiring its subtree by one of three
    /// cases: no right child, no left child, or (the general case) an
    /// in-order successor promoted up to take `key`'s place.
    pub fn remove(&self, key: &[u8]) -> RemoveOutcome {
        let Locate { target, mut parent, side } = self.locate(key, Mode::Write);
        let mut target = match target {
            Some(t) => t,
            None => return RemoveOutcome::NotFound,
        };

        let has_left = target.inner().left.is_some();
        let has_right = target.inner().right.is_some();

        if !has_right {
            let promoted = target.inner_mut().left.take();
            let guard_on_promoted = promoted.as_deref().map(|n| Held::new(n, Mode::Write));
            let old = std::mem::replace(parent.child_slot_mut(side), promoted);
            drop(guard_on_promoted);
            drop(parent);
            drop(target);
            drop(old);
        } else if !has_left {
            let promoted = target.inner_mut().right.take();
            let guard_on_promoted = promoted.as_deref().map(|n| Held::new(n, Mode::Write));
            let old = std::mem::replace(parent.child_slot_mut(side), promoted);
            drop(guard_on_promoted);
            drop(parent);
            drop(target);
            drop(old);
        } else {
            drop(parent);
            // Walk target's right subtree all the way left to find the
            // in-order successor, keeping at most the successor and its
            // immediate parent locked at any point. `succ_parent == None`
            // means the successor is target's direct right child, so its
            // back-pointer slot is target's own `right` field.
            let mut succ_parent: Option<Held> = None;
            let mut succ = Held::new(target.child(Side::Right).expect("has_right"), Mode::Write);
            loop {
                let next = match succ.child(Side::Left) {
                    Some(n) => Held::new(n, Mode::Write),
                    None => break,
                };
                let previous = succ_parent.replace(succ);
                succ = next;
                drop(previous);
            }

            target.inner_mut().key = succ.inner().key.to_vec().into_boxed_slice();
            target.inner_mut().value = succ.inner().value.to_vec().into_boxed_slice();
            let promoted = succ.inner_mut().right.take();
            // The slot being overwritten still holds the boxed `succ` node
            // that `succ: Held` points at; capture it via `mem::replace`
            // and defer its drop until every `Held` guard on it is gone,
            // the same discipline the two one-child cases above use.
            let old = match succ_parent.as_mut() {
                None => std::mem::replace(target.child_slot_mut(Side::Right), promoted),
                Some(sp) => std::mem::replace(sp.child_slot_mut(Side::Left), promoted),
            };
            drop(succ_parent);
            drop(succ);
            drop(target);
            drop(old);
        }
        RemoveOutcome::Removed
    }

    /// Writes the whole tree to `sink`, depth-first, indenting each line
    /// by its depth and marking absent children as `(null)`. Each node is
    /// read-locked for the duration of its own visit, including the
    /// recursive visits to both children.
    pub fn print(&self, sink: &mut dyn Write) -> io::Result<()> {
        self.print_node(&self.sentinel, 0, true, sink)
    }

    fn print_node(
        &self,
        node: &Node,
        depth: usize,
        is_root: bool,
        sink: &mut dyn Write,
    ) -> io::Result<()> {
        let held = Held::new(node, Mode::Read);
        let pad = " ".repeat(depth);
        if is_root {
            writeln!(sink, "{pad}(root)")?;
        } else {
            writeln!(
                sink,
                "{pad}{} {}",
                String::from_utf8_lossy(&held.inner().key),
                String::from_utf8_lossy(&held.inner().value)
            )?;
        }
        match held.child(Side::Left) {
            Some(child) => self.print_node(child, depth + 1, false, sink)?,
            None => writeln!(sink, "{pad} (null)")?,
        }
        match held.child(Side::Right) {
            Some(child) => self.print_node(child, depth + 1, false, sink)?,
            None => writeln!(sink, "{pad} (null)")?,
        }
        Ok(())
    }

    /// Tears down every node below the sentinel. Safe to call concurrently
    /// with other operations in principle (it takes the sentinel's own
    /// write lock like any other mutation), but the supervisor only ever
    /// calls it once every worker has drained, so the dropped subtrees are
    /// never mid-traversal.
    pub fn cleanup(&self) {
        let mut sentinel = Held::new(&self.sentinel, Mode::Write);
        let inner = sentinel.inner_mut();
        inner.left = None;
        inner.right = None;
    }
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(s: &str) -> (&[u8], &[u8]) {
        (s.as_bytes(), s.as_bytes())
    }

    #[test]
    fn add_then_query_round_trips() {
        let store = Store::new();
        let (k, v) = kv("alpha");
        assert!(matches!(store.add(k, v).unwrap(), AddOutcome::Inserted));
        assert_eq!(store.query(k), Some(v.to_vec()));
    }

    #[test]
    fn add_is_idempotent_for_existing_keys() {
        let store = Store::new();
        store.add(b"k", b"v1").unwrap();
        let outcome = store.add(b"k", b"v2").unwrap();
        assert!(matches!(outcome, AddOutcome::AlreadyPresent));
        assert_eq!(store.query(b"k"), Some(b"v1".to_vec()));
    }

    #[test]
    fn query_missing_key_is_none() {
        let store = Store::new();
        assert_eq!(store.query(b"missing"), None);
    }

    #[test]
    fn remove_leaf() {
        let store = Store::new();
        store.add(b"m", b"1").unwrap();
        assert!(matches!(store.remove(b"m"), RemoveOutcome::Removed));
        assert_eq!(store.query(b"m"), None);
    }

    #[test]
    fn remove_node_with_two_children_promotes_successor() {
        let store = Store::new();
        for k in ["m", "b", "z", "a", "c", "y"] {
            store.add(k.as_bytes(), k.as_bytes()).unwrap();
        }
        assert!(matches!(store.remove(b"m"), RemoveOutcome::Removed));
        assert_eq!(store.query(b"m"), None);
        for k in ["b", "z", "a", "c", "y"] {
            assert_eq!(store.query(k.as_bytes()), Some(k.as_bytes().to_vec()));
        }
    }

    #[test]
    fn remove_missing_key_reports_not_found() {
        let store = Store::new();
        assert!(matches!(store.remove(b"nope"), RemoveOutcome::NotFound));
    }

    #[test]
    fn print_marks_empty_tree() {
        let store = Store::new();
        let mut out = Vec::new();
        store.print(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("(root)"));
        assert!(text.contains("(null)"));
    }

    #[test]
    fn cleanup_drops_every_node() {
        let mut store = Store::new();
        for k in ["a", "b", "c"] {
            store.add(k.as_bytes(), k.as_bytes()).unwrap();
        }
        store.cleanup();
        let mut out = Vec::new();
        store.print(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "(root)\n (null)\n (null)\n"
        );
    }

    #[test]
    fn print_emits_keys_in_ascending_order() {
        let store = Store::new();
        for k in ["m", "f", "s", "b", "h", "p", "t", "a", "z"] {
            store.add(k.as_bytes(), k.as_bytes()).unwrap();
        }
        store.remove(b"m");
        let mut out = Vec::new();
        store.print(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut seen: Vec<&str> = text
            .lines()
            .filter_map(|line| {
                let trimmed = line.trim();
                if trimmed == "(root)" || trimmed == "(null)" {
                    None
                } else {
                    trimmed.split(' ').next()
                }
            })
            .collect();
        let mut sorted = seen.clone();
        sorted.sort_unstable();
        assert_eq!(seen, sorted, "print must emit keys in ascending order");
        seen.dedup();
        assert_eq!(seen.len(), sorted.len(), "keys must be unique");
    }

    /// Hammers a handful of shared keys with random adds/removes/queries
    /// from several threads at once and checks that every observed outcome
    /// is consistent with a legal serialization: `query` never sees a
    /// dangling or half-written value, and no thread ever deadlocks (the
    /// test itself would hang forever if hand-over-hand lock ordering were
    /// broken). Styled after the teacher's own `rand`-driven index stress
    /// tests (`engine::core::tests`), adapted from a single-threaded spam
    /// loop to a concurrent one since this store's whole point is
    /// concurrent access.
    #[test]
    fn concurrent_mixed_workload_never_deadlocks_or_corrupts() {
        use rand::Rng;
        use std::sync::Arc;

        const KEYS: &[&str] = &["k0", "k1", "k2", "k3", "k4"];
        const OPS_PER_THREAD: usize = 2_000;
        const THREADS: usize = 8;

        let store = Arc::new(Store::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let mut rng = rand::thread_rng();
                    for i in 0..OPS_PER_THREAD {
                        let key = KEYS[rng.gen_range(0..KEYS.len())].as_bytes();
                        match rng.gen_range(0..3) {
                            0 => {
                                let value = format!("t{t}-{i}");
                                let _ = store.add(key, value.as_bytes());
                            }
                            1 => {
                                store.remove(key);
                            }
                            _ => {
                                if let Some(value) = store.query(key) {
                                    // A value only ever comes from a single
                                    // `add` call, whole; it must never be
                                    // empty or truncated mid-write.
                                    assert!(!value.is_empty());
                                }
                            }
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker thread panicked or deadlocked");
        }

        // The tree must still be well-formed after the storm: every key
        // still present is one of the five contended keys, in order.
        let mut out = Vec::new();
        store.print(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed == "(root)" || trimmed == "(null)" {
                continue;
            }
            let key = trimmed.split(' ').next().unwrap();
            assert!(KEYS.contains(&key), "unexpected key survived: {key}");
        }
    }
}
