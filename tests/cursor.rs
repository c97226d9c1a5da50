// Fail-fast cursor tests.
//
// The cursor captures the map's modification count when created and
// checks it on every step. Its own removals update the captured count;
// anything else that changes the key set or the table layout is reported
// as ConcurrentModification.
use std::hash::{BuildHasher, Hasher};
use treebin_map::{BinKind, CursorError, NodeHooks, TreeBinMap};

// Every key gets the same hash.
#[derive(Clone, Default)]
struct ConstBuildHasher;

impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> ConstHasher {
        ConstHasher
    }
}

struct ConstHasher;

impl Hasher for ConstHasher {
    fn finish(&self) -> u64 {
        0
    }
    fn write(&mut self, _bytes: &[u8]) {}
}

// Test: a full walk without removals.
// Assumes: the cursor follows the same order as iter().
// Verifies: identical sequences; stepping past the end keeps returning None.
#[test]
fn walk_matches_iter() {
    let m: TreeBinMap<u32, u32> = (0..40).map(|k| (k, k)).collect();
    let mut cur = m.cursor();
    let mut walked = Vec::new();
    while let Some((k, v)) = cur.next(&m).unwrap() {
        assert_eq!(k, v);
        walked.push(*k);
    }
    let iterated: Vec<u32> = m.keys().copied().collect();
    assert_eq!(walked, iterated);
    assert!(!cur.has_next());
    assert_eq!(cur.next(&m), Ok(None));
}

// Test: removal through the cursor.
// Assumes: cursor removal is the one sanctioned structural change.
// Verifies: removing every other entry keeps the walk going and leaves
// exactly the untouched entries.
#[test]
fn remove_through_cursor() {
    let mut m: TreeBinMap<u32, String> = (0..30).map(|k| (k, k.to_string())).collect();
    let mut cur = m.cursor();
    let mut visited = 0;
    loop {
        let Some((&k, _)) = cur.next(&m).unwrap() else {
            break;
        };
        visited += 1;
        if k % 2 == 0 {
            let (rk, rv) = cur.remove(&mut m).unwrap();
            assert_eq!(rk, k);
            assert_eq!(rv, k.to_string());
        }
    }
    assert_eq!(visited, 30);
    assert_eq!(m.len(), 15);
    assert!(m.keys().all(|k| k % 2 == 1));
}

// Test: remove preconditions.
// Assumes: remove needs a current entry from next().
// Verifies: NoCurrentEntry before the first step and after a removal.
#[test]
fn remove_without_current_entry() {
    let mut m: TreeBinMap<u32, u32> = (0..3).map(|k| (k, k)).collect();
    let mut cur = m.cursor();
    assert_eq!(cur.remove(&mut m), Err(CursorError::NoCurrentEntry));
    cur.next(&m).unwrap();
    assert!(cur.remove(&mut m).is_ok());
    assert_eq!(cur.remove(&mut m), Err(CursorError::NoCurrentEntry));
    assert_eq!(m.len(), 2);
}

// Test: outside structural changes are detected.
// Assumes: insert of a new key and remove bump the modification count.
// Verifies: next and remove both report ConcurrentModification.
#[test]
fn outside_modification_is_detected() {
    let mut m: TreeBinMap<u32, u32> = (0..10).map(|k| (k, k)).collect();
    let mut cur = m.cursor();
    cur.next(&m).unwrap();
    m.insert(100, 100);
    assert_eq!(cur.next(&m), Err(CursorError::ConcurrentModification));
    assert_eq!(cur.remove(&mut m), Err(CursorError::ConcurrentModification));

    let mut cur = m.cursor();
    cur.next(&m).unwrap();
    m.remove(&5);
    assert_eq!(cur.next(&m), Err(CursorError::ConcurrentModification));

    let mut cur = m.cursor();
    m.clear();
    assert_eq!(cur.next(&m), Err(CursorError::ConcurrentModification));
}

// Test: installing a key order under a live cursor.
// Assumes: with_key_order rebuilds existing tree bins, which reorders
// their chains.
// Verifies: the rebuild counts as a structural change and the cursor
// reports it; a map with no tree bins is left as it was.
#[test]
fn key_order_rebuild_is_detected() {
    let mut m = TreeBinMap::with_capacity_and_hasher(64, ConstBuildHasher);
    for k in 0..12u32 {
        m.insert(k, k);
    }
    assert_eq!(m.bin_kind(&0), Some(BinKind::Tree));
    let before = m.modification_count();
    let mut cur = m.cursor();
    let m = m.with_key_order();
    assert!(m.modification_count() > before);
    assert_eq!(cur.next(&*m), Err(CursorError::ConcurrentModification));

    let m: TreeBinMap<u32, u32> = (0..10).map(|k| (k, k)).collect();
    let before = m.modification_count();
    let mut cur = m.cursor();
    let m = m.with_key_order();
    assert_eq!(m.modification_count(), before);
    assert!(cur.next(&*m).unwrap().is_some());
}

// Test: value overwrites are not structural.
// Assumes: the modification count ignores overwrites.
// Verifies: the cursor keeps going and observes the new value.
#[test]
fn overwrite_during_walk_is_allowed() {
    let mut m: TreeBinMap<u32, u32> = (0..10).map(|k| (k, 0)).collect();
    let mut cur = m.cursor();
    let mut seen = 0;
    loop {
        let Some((&k, _)) = cur.next(&m).unwrap() else {
            break;
        };
        m.insert(k, 1);
        *m.get_mut(&k).unwrap() += 1;
        seen += 1;
    }
    assert_eq!(seen, 10);
    assert!(m.values().all(|&v| v == 2));
}

#[derive(Default)]
struct CountRemovals(usize);

impl NodeHooks<u32, u32> for CountRemovals {
    fn after_remove(&mut self, _key: &u32, _value: &u32) {
        self.0 += 1;
    }
}

// Test: cursor removal fires the removal hook.
// Assumes: hooks observe every structural removal except clear/drain.
// Verifies: one callback per removed entry.
#[test]
fn cursor_remove_fires_hook() {
    let mut m = TreeBinMap::<u32, u32>::new().with_hooks(CountRemovals::default());
    for k in 0..5 {
        m.insert(k, k);
    }
    let mut cur = m.cursor();
    while cur.next(&m).unwrap().is_some() {
        cur.remove(&mut m).unwrap();
    }
    assert!(m.is_empty());
    assert_eq!(m.hooks().0, 5);
}

// Test: error display.
// Assumes: errors implement std::error::Error.
// Verifies: messages are non-empty and the trait object works.
#[test]
fn cursor_error_is_an_error() {
    let e: Box<dyn std::error::Error> = Box::new(CursorError::ConcurrentModification);
    assert!(e.to_string().contains("modified"));
    assert!(!CursorError::NoCurrentEntry.to_string().is_empty());
}
