//! Read/Write set tracking for transactions

use crate::state_key::StateKey;
use std::collections::HashSet;

/// Read/Write set observed by one execution of a transaction
///
/// Conflict-detecting validators compare the sets of a task against the
/// write sets of lower-index tasks to find stale reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RWSet {
    /// State keys that were read
    pub reads: HashSet<StateKey>,
    /// State keys that were written
    pub writes: HashSet<StateKey>,
}

impl RWSet {
    /// Create a new empty RW set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a read access
    pub fn record_read(&mut self, key: StateKey) {
        self.reads.insert(key);
    }

    /// Record a write access
    pub fn record_write(&mut self, key: StateKey) {
        self.writes.insert(key);
    }

    /// Check if this transaction reads a key
    pub fn reads_key(&self, key: &StateKey) -> bool {
        self.reads.contains(key)
    }

    /// Check if this transaction writes a key
    pub fn writes_key(&self, key: &StateKey) -> bool {
        self.writes.contains(key)
    }

    /// Returns true if `self` read a key that `earlier` writes (read-after-write).
    pub fn has_raw_dependency(&self, earlier: &RWSet) -> bool {
        self.reads.iter().any(|key| earlier.writes.contains(key))
    }

    /// Returns true if both sets write a common key.
    pub fn has_waw_conflict(&self, other: &RWSet) -> bool {
        self.writes.iter().any(|key| other.writes.contains(key))
    }

    /// Returns true if a re-execution of `earlier` can change what `self`
    /// observed or the final value of a key `self` wrote.
    pub fn depends_on(&self, earlier: &RWSet) -> bool {
        self.has_raw_dependency(earlier) || self.has_waw_conflict(earlier)
    }

    /// Get all conflicting keys against a lower-index transaction
    pub fn get_conflicts(&self, earlier: &RWSet) -> ConflictSet {
        let raw = self.reads.intersection(&earlier.writes).cloned().collect();
        let waw = self.writes.intersection(&earlier.writes).cloned().collect();
        ConflictSet { raw, waw }
    }

    /// Check if the RW set is empty
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }
}

/// Keys on which a transaction conflicts with a lower-index one
#[derive(Clone, Debug, Default)]
pub struct ConflictSet {
    /// Keys read by the later transaction and written by the earlier one
    pub raw: HashSet<StateKey>,
    /// Keys written by both
    pub waw: HashSet<StateKey>,
}

impl ConflictSet {
    /// Get total number of conflicting keys
    pub fn total_conflicts(&self) -> usize {
        self.raw.len() + self.waw.len()
    }
}

/// Responses that carry the state accesses of the execution producing them
pub trait AccessTracked {
    /// Read/write set observed while producing this response
    fn rw_set(&self) -> &RWSet;
}

impl AccessTracked for RWSet {
    fn rw_set(&self) -> &RWSet {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> StateKey {
        StateKey::from(name)
    }

    #[test]
    fn test_rw_set_basic() {
        let mut rw = RWSet::new();
        rw.record_read(key("a"));
        rw.record_write(key("b"));

        assert!(rw.reads_key(&key("a")));
        assert!(!rw.reads_key(&key("b")));
        assert!(rw.writes_key(&key("b")));
        assert!(!rw.writes_key(&key("a")));
        assert!(!rw.is_empty());
    }

    #[test]
    fn test_raw_dependency() {
        let mut earlier = RWSet::new();
        earlier.record_write(key("x"));

        let mut later = RWSet::new();
        later.record_read(key("x"));

        assert!(later.has_raw_dependency(&earlier));
        assert!(!earlier.has_raw_dependency(&later));
        assert!(later.depends_on(&earlier));
    }

    #[test]
    fn test_waw_conflict() {
        let mut tx1 = RWSet::new();
        tx1.record_write(key("x"));
        let mut tx2 = RWSet::new();
        tx2.record_write(key("x"));

        assert!(tx1.has_waw_conflict(&tx2));
        assert!(tx2.depends_on(&tx1));
    }

    #[test]
    fn test_reads_of_earlier_do_not_create_dependency() {
        let mut earlier = RWSet::new();
        earlier.record_read(key("x"));

        let mut later = RWSet::new();
        later.record_write(key("x"));

        assert!(!later.depends_on(&earlier));
    }

    #[test]
    fn test_get_conflicts() {
        let mut earlier = RWSet::new();
        earlier.record_write(key("a"));
        earlier.record_write(key("b"));

        let mut later = RWSet::new();
        later.record_read(key("a"));
        later.record_write(key("b"));
        later.record_write(key("c"));

        let conflicts = later.get_conflicts(&earlier);
        assert_eq!(conflicts.total_conflicts(), 2);
        assert!(conflicts.raw.contains(&key("a")));
        assert!(conflicts.waw.contains(&key("b")));
    }

    #[test]
    fn test_no_conflicts() {
        let mut a = RWSet::new();
        a.record_write(key("a"));
        let mut b = RWSet::new();
        b.record_read(key("b"));

        assert_eq!(b.get_conflicts(&a).total_conflicts(), 0);
        assert!(!b.depends_on(&a));
    }
}
