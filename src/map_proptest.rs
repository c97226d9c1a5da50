#![cfg(test)]

// Property tests for TreeBinMap kept inside the crate so they can check
// the table's internal structure after every step.

use crate::{MapConfig, OrderedTreeBinMap, TreeBinMap};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::hash_map::RandomState;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Collapses every key onto four hash values so bins overflow and turn
// into trees full of equal-hash, non-equal keys.
#[derive(Clone, Default)]
struct CoarseBuildHasher;

impl BuildHasher for CoarseBuildHasher {
    type Hasher = CoarseHasher;
    fn build_hasher(&self) -> CoarseHasher {
        CoarseHasher(0)
    }
}

struct CoarseHasher(u64);

impl Hasher for CoarseHasher {
    fn finish(&self) -> u64 {
        self.0 & 0x3
    }
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = self.0.wrapping_add(b as u64);
        }
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    InsertIfAbsent(usize, i32),
    Remove(usize),
    RemoveIfEq(usize, i32),
    Get(usize),
    Contains(String),
    Replace(usize, i32),
    Merge(usize, i32),
    ComputeIfPresentDrop(usize),
    Retain(i32),
    CursorRemoveEvery(usize),
    Reserve(usize),
    Clear,
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{1,4}", 1..=48).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            8 => (idx.clone(), -4i32..4).prop_map(|(i, v)| OpI::Insert(i, v)),
            2 => (idx.clone(), -4i32..4).prop_map(|(i, v)| OpI::InsertIfAbsent(i, v)),
            3 => idx.clone().prop_map(OpI::Remove),
            1 => (idx.clone(), -4i32..4).prop_map(|(i, v)| OpI::RemoveIfEq(i, v)),
            2 => idx.clone().prop_map(OpI::Get),
            1 => prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{0,5}".prop_map(|s| s)
            ]
            .prop_map(OpI::Contains),
            1 => (idx.clone(), -4i32..4).prop_map(|(i, v)| OpI::Replace(i, v)),
            1 => (idx.clone(), -4i32..4).prop_map(|(i, v)| OpI::Merge(i, v)),
            1 => idx.clone().prop_map(OpI::ComputeIfPresentDrop),
            1 => (2i32..5).prop_map(OpI::Retain),
            1 => (2usize..5).prop_map(OpI::CursorRemoveEvery),
            1 => (0usize..200).prop_map(OpI::Reserve),
            1 => Just(OpI::Clear),
            1 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run_scenario<S: BuildHasher>(
    mut sut: TreeBinMap<Key, i32, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Key, i32> = HashMap::new();
    let mut cursor_used = false;

    for op in ops {
        let mc_before = sut.modification_count();
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(pool, i);
                let present = model.contains_key(&k);
                prop_assert_eq!(sut.insert(k.clone(), v), model.insert(k, v));
                if present {
                    prop_assert_eq!(sut.modification_count(), mc_before, "overwrite is not structural");
                } else {
                    prop_assert!(sut.modification_count() > mc_before);
                }
            }
            OpI::InsertIfAbsent(i, v) => {
                let k = key_from(pool, i);
                let r = sut.insert_if_absent(k.clone(), v);
                if model.contains_key(&k) {
                    prop_assert_eq!(r, Some(v));
                } else {
                    prop_assert_eq!(r, None);
                    model.insert(k, v);
                }
            }
            OpI::Remove(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.remove(k.0.as_str()), model.remove(&k));
            }
            OpI::RemoveIfEq(i, v) => {
                let k = key_from(pool, i);
                let expect = model.get(&k) == Some(&v);
                prop_assert_eq!(sut.remove_if_eq(&k, &v), expect);
                if expect {
                    model.remove(&k);
                }
            }
            OpI::Get(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.get(&k), model.get(&k));
                prop_assert_eq!(sut.get(k.0.as_str()), model.get(&k));
            }
            OpI::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            OpI::Replace(i, v) => {
                let k = key_from(pool, i);
                let expect = model.get_mut(&k).map(|slot| std::mem::replace(slot, v));
                prop_assert_eq!(sut.replace(&k, v), expect);
            }
            OpI::Merge(i, v) => {
                let k = key_from(pool, i);
                // Sum, dropping the entry when it reaches zero.
                let merged = match model.get(&k) {
                    None => Some(v),
                    Some(&old) if old + v == 0 => None,
                    Some(&old) => Some(old + v),
                };
                let got = sut
                    .merge(k.clone(), v, |old, v| Some(old + v).filter(|s| *s != 0))
                    .copied();
                prop_assert_eq!(got, merged);
                match merged {
                    Some(m) => {
                        model.insert(k, m);
                    }
                    None => {
                        model.remove(&k);
                    }
                }
            }
            OpI::ComputeIfPresentDrop(i) => {
                let k = key_from(pool, i);
                let r = sut.compute_if_present(&k, |_, _| None);
                prop_assert!(r.is_none());
                model.remove(&k);
            }
            OpI::Retain(m) => {
                sut.retain(|_, v| *v % m != 0);
                model.retain(|_, v| *v % m != 0);
            }
            OpI::CursorRemoveEvery(n) => {
                let before = model.len();
                let mut cur = sut.cursor();
                let mut step = 0usize;
                let mut visited = 0usize;
                loop {
                    let next = cur.next(&sut).map_err(|e| TestCaseError::fail(e.to_string()))?;
                    let Some((k, _)) = next else { break };
                    let k = k.clone();
                    visited += 1;
                    if step % n == 0 {
                        let (rk, rv) = cur
                            .remove(&mut sut)
                            .map_err(|e| TestCaseError::fail(e.to_string()))?;
                        prop_assert_eq!(&rk, &k);
                        prop_assert_eq!(model.remove(&k), Some(rv));
                        cursor_used = true;
                    }
                    step += 1;
                }
                prop_assert_eq!(visited, before, "cursor must visit every entry once");
            }
            OpI::Reserve(n) => {
                sut.reserve(n);
                let room = (sut.capacity() as f32 * sut.load_factor()) as usize;
                prop_assert!(room >= sut.len() + n, "reserve left no room for {} more", n);
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
            }
            OpI::Iterate => {
                let got: BTreeSet<Key> = sut.keys().cloned().collect();
                let want: BTreeSet<Key> = model.keys().cloned().collect();
                prop_assert_eq!(got, want);
                prop_assert_eq!(sut.iter().len(), model.len());
            }
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        prop_assert!(sut.capacity().is_power_of_two());
        sut.assert_consistent();
        if !cursor_used {
            prop_assert!(sut.table.tree_root_is_head(), "tree root must lead its bin");
        }
    }
    for (k, v) in &model {
        prop_assert_eq!(sut.get(k), Some(v));
    }
    Ok(())
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - Every lookup, insert, removal and conditional update agrees with the model.
// - Value overwrites leave the modification count alone; insertions bump it.
// - Cursor removal never trips the fail-fast check and visits every entry once.
// - After each op: chains and trees agree, red-black rules hold, every node
//   sits in the bucket its hash selects, and len never exceeds the threshold.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let sut: TreeBinMap<Key, i32, RandomState> = TreeBinMap::new();
        run_scenario(sut, &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_colliding((pool, ops) in arb_scenario()) {
        let sut = TreeBinMap::with_hasher(CoarseBuildHasher);
        run_scenario(sut, &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_colliding_ordered((pool, ops) in arb_scenario()) {
        // Borrowed lookups of the plain map ignore the order; owned-key
        // lookups and every structural path still use it.
        let sut = TreeBinMap::with_hasher(CoarseBuildHasher).with_key_order();
        run_scenario(sut.into_inner(), &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_tight_config((pool, ops) in arb_scenario()) {
        let config = MapConfig::new()
            .load_factor(2.0)
            .treeify_thresholds(4, 2)
            .min_treeify_capacity(16);
        let sut = TreeBinMap::with_config_and_hasher(config, CoarseBuildHasher)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        run_scenario(sut, &pool, ops)?;
    }
}

// Lookups by reference on a key-ordered map against the same model.
// Structural ops with no ordered counterpart run through the plain map.
fn run_ordered_scenario<S: BuildHasher>(
    mut sut: OrderedTreeBinMap<Key, i32, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Key, i32> = HashMap::new();
    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.insert(k.clone(), v), model.insert(k, v));
            }
            OpI::InsertIfAbsent(i, v) => {
                let k = key_from(pool, i);
                if sut.insert_if_absent(k.clone(), v).is_none() {
                    model.insert(k, v);
                }
            }
            OpI::Remove(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.remove(k.0.as_str()), model.remove(&k));
            }
            OpI::RemoveIfEq(i, v) => {
                let k = key_from(pool, i);
                let expect = model.get(&k) == Some(&v);
                prop_assert_eq!(sut.remove_if_eq(k.0.as_str(), &v), expect);
                if expect {
                    model.remove(&k);
                }
            }
            OpI::Get(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.get(k.0.as_str()), model.get(&k));
                prop_assert_eq!(sut.get(&k), model.get(&k));
                if let Some(v) = sut.get_mut(k.0.as_str()) {
                    *v += 1;
                    *model.get_mut(&k).unwrap() += 1;
                }
            }
            OpI::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            OpI::Replace(i, v) => {
                let k = key_from(pool, i);
                let expect = model.get_mut(&k).map(|slot| std::mem::replace(slot, v));
                prop_assert_eq!(sut.replace(k.0.as_str(), v), expect);
            }
            OpI::Merge(i, v) => {
                let k = key_from(pool, i);
                let expect = model.get(&k).copied();
                prop_assert_eq!(
                    sut.replace_if_eq(k.0.as_str(), &v, v + 1),
                    expect == Some(v)
                );
                if expect == Some(v) {
                    model.insert(k, v + 1);
                }
            }
            OpI::ComputeIfPresentDrop(i) => {
                let k = key_from(pool, i);
                prop_assert!(sut.compute_if_present(k.0.as_str(), |_, _| None).is_none());
                model.remove(&k);
            }
            OpI::Retain(m) => {
                sut.retain(|_, v| *v % m != 0);
                model.retain(|_, v| *v % m != 0);
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
            }
            OpI::CursorRemoveEvery(_) | OpI::Reserve(_) | OpI::Iterate => {
                let got: BTreeSet<Key> = sut.keys().cloned().collect();
                let want: BTreeSet<Key> = model.keys().cloned().collect();
                prop_assert_eq!(got, want);
            }
        }
        prop_assert_eq!(sut.len(), model.len());
        sut.assert_consistent();
    }
    for (k, v) in &model {
        prop_assert_eq!(sut.get(k.0.as_str()), Some(v));
    }
    Ok(())
}

// Property: a key-ordered map answers lookups by reference like the model,
// with every key hashed onto four values.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_ordered_lookups_match_model((pool, ops) in arb_scenario()) {
        let sut = TreeBinMap::with_hasher(CoarseBuildHasher).with_key_order();
        run_ordered_scenario(sut, &pool, ops)?;
    }
}
