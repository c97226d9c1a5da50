//! Red-black tree bins.
//!
//! A tree bin overlays a red-black tree on the nodes of one oversized
//! bucket. The nodes stay threaded on a doubly linked chain (`next`,
//! `prev`) in enumeration order, so a bin can be turned back into a plain
//! chain, or split across two buckets, without consulting the tree.
//!
//! Tree order is by cached hash first. Keys with equal hashes are ordered
//! by the map's key comparator when one is installed, then by the node's
//! creation token. That order is structural only: two keys that tie on
//! hash and comparator are not equal, so lookups that cannot decide a
//! side search both subtrees.
//!
//! After any mutation that can move the root, the root is re-anchored as
//! the bucket head and the first node of the chain (`move_root_to_front`).
//! Cursor removal skips that step so that a traversal in progress keeps
//! its order; every reader therefore locates the root by walking parent
//! links from the head.

use crate::hashing::index_for;
use crate::node::{chain_len_capped, Bucket, NodeId, Nodes};
use core::borrow::Borrow;
use core::cmp::Ordering;

/// Comparator used to order equal-hash keys inside tree bins.
pub(crate) type KeyCmp<K> = fn(&K, &K) -> Ordering;

/// Outcome of descending a tree bin looking for where a key belongs.
pub(crate) enum Slot {
    Occupied(NodeId),
    Vacant { parent: NodeId, left: bool },
}

#[inline]
fn is_red<K, V>(nodes: &Nodes<K, V>, id: Option<NodeId>) -> bool {
    id.is_some_and(|id| nodes[id].red)
}

/// Order nodes whose hash and comparator tie, by creation token.
#[inline]
pub(crate) fn tie_break(a_seq: u64, b_seq: u64) -> Ordering {
    if a_seq <= b_seq {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

pub(crate) fn root_of<K, V>(nodes: &Nodes<K, V>, mut id: NodeId) -> NodeId {
    while let Some(p) = nodes[id].parent {
        id = p;
    }
    id
}

/// Search the subtree rooted at `start` for `key`.
///
/// `order` ranks the key sought against a stored key. It is set when
/// the map orders its tree bins; without it a hash tie between
/// two non-equal keys forces a search of both subtrees.
pub(crate) fn find<K, V, Q>(
    nodes: &Nodes<K, V>,
    start: NodeId,
    hash: u32,
    key: &Q,
    order: Option<&dyn Fn(&K) -> Ordering>,
) -> Option<NodeId>
where
    K: Borrow<Q>,
    Q: ?Sized + Eq,
{
    let mut p = Some(start);
    while let Some(id) = p {
        let n = &nodes[id];
        let (pl, pr) = (n.left, n.right);
        if n.hash > hash {
            p = pl;
        } else if n.hash < hash {
            p = pr;
        } else if n.key.borrow() == key {
            return Some(id);
        } else if pl.is_none() {
            p = pr;
        } else if pr.is_none() {
            p = pl;
        } else {
            match order.map_or(Ordering::Equal, |o| o(&n.key)) {
                Ordering::Less => p = pl,
                Ordering::Greater => p = pr,
                Ordering::Equal => {
                    if let Some(q) = pr.and_then(|r| find(nodes, r, hash, key, order)) {
                        return Some(q);
                    }
                    p = pl;
                }
            }
        }
    }
    None
}

/// Descend from `root` to either the node holding `key` or the empty
/// child slot a new node with creation token `seq` would take.
pub(crate) fn find_slot<K: Eq, V>(
    nodes: &Nodes<K, V>,
    root: NodeId,
    hash: u32,
    key: &K,
    cmp: Option<KeyCmp<K>>,
    seq: u64,
) -> Slot {
    let rank = cmp.map(|f| move |pk: &K| f(key, pk));
    let order = rank.as_ref().map(|o| o as &dyn Fn(&K) -> Ordering);
    let mut searched = false;
    let mut p = root;
    loop {
        let n = &nodes[p];
        let dir = if n.hash > hash {
            Ordering::Less
        } else if n.hash < hash {
            Ordering::Greater
        } else if n.key == *key {
            return Slot::Occupied(p);
        } else {
            match order.map_or(Ordering::Equal, |o| o(&n.key)) {
                Ordering::Equal => {
                    // Both subtrees may hold the key; look once, at the
                    // first node where the order cannot decide.
                    if !searched {
                        searched = true;
                        for child in [n.left, n.right].into_iter().flatten() {
                            if let Some(q) = find(nodes, child, hash, key, order) {
                                return Slot::Occupied(q);
                            }
                        }
                    }
                    tie_break(seq, n.seq)
                }
                d => d,
            }
        };
        let go_left = dir != Ordering::Greater;
        match if go_left { n.left } else { n.right } {
            Some(c) => p = c,
            None => return Slot::Vacant { parent: p, left: go_left },
        }
    }
}

/// Link the detached node `x` as a child of `parent` and as its chain
/// successor, rebalance, and re-anchor the root at the bucket head.
pub(crate) fn link<K, V>(
    nodes: &mut Nodes<K, V>,
    buckets: &mut [Bucket],
    root: NodeId,
    parent: NodeId,
    left: bool,
    x: NodeId,
) {
    let xpn = nodes[parent].next;
    {
        let n = &mut nodes[x];
        n.next = xpn;
        n.prev = Some(parent);
        n.parent = Some(parent);
        n.left = None;
        n.right = None;
    }
    if left {
        nodes[parent].left = Some(x);
    } else {
        nodes[parent].right = Some(x);
    }
    nodes[parent].next = Some(x);
    if let Some(n) = xpn {
        nodes[n].prev = Some(x);
    }
    let root = balance_insertion(nodes, root, x);
    move_root_to_front(nodes, buckets, root);
}

/// Make `root` the head of its bucket and the first node of its chain.
pub(crate) fn move_root_to_front<K, V>(nodes: &mut Nodes<K, V>, buckets: &mut [Bucket], root: NodeId) {
    if buckets.is_empty() {
        return;
    }
    let index = index_for(nodes[root].hash, buckets.len());
    let first = buckets[index].head();
    buckets[index] = Bucket::Tree(root);
    if first != Some(root) {
        let rp = nodes[root].prev;
        let rn = nodes[root].next;
        if let Some(rn) = rn {
            nodes[rn].prev = rp;
        }
        if let Some(rp) = rp {
            nodes[rp].next = rn;
        }
        if let Some(f) = first {
            nodes[f].prev = Some(root);
        }
        nodes[root].next = first;
        nodes[root].prev = None;
    }
    debug_assert!(check_invariants(nodes, root), "tree bin invariants violated");
}

/// Build a tree over the chain starting at `head`, keeping chain order.
/// `prev` links must already thread the chain.
pub(crate) fn treeify<K, V>(
    nodes: &mut Nodes<K, V>,
    buckets: &mut [Bucket],
    head: NodeId,
    cmp: Option<KeyCmp<K>>,
) {
    let mut root: Option<NodeId> = None;
    let mut x = Some(head);
    while let Some(id) = x {
        let next = nodes[id].next;
        nodes[id].left = None;
        nodes[id].right = None;
        match root {
            None => {
                nodes[id].parent = None;
                nodes[id].red = false;
                root = Some(id);
            }
            Some(r) => {
                let h = nodes[id].hash;
                let mut p = r;
                loop {
                    let ph = nodes[p].hash;
                    let dir = if ph > h {
                        Ordering::Less
                    } else if ph < h {
                        Ordering::Greater
                    } else {
                        match cmp.map_or(Ordering::Equal, |f| f(&nodes[id].key, &nodes[p].key)) {
                            Ordering::Equal => tie_break(nodes[id].seq, nodes[p].seq),
                            d => d,
                        }
                    };
                    let go_left = dir != Ordering::Greater;
                    let child = if go_left { nodes[p].left } else { nodes[p].right };
                    match child {
                        Some(c) => p = c,
                        None => {
                            nodes[id].parent = Some(p);
                            if go_left {
                                nodes[p].left = Some(id);
                            } else {
                                nodes[p].right = Some(id);
                            }
                            root = Some(balance_insertion(nodes, r, id));
                            break;
                        }
                    }
                }
            }
        }
        x = next;
    }
    if let Some(r) = root {
        move_root_to_front(nodes, buckets, r);
    }
}

/// Strip tree links from the chain starting at `head`; the chain order is
/// kept as is. Returns `head`.
pub(crate) fn untreeify<K, V>(nodes: &mut Nodes<K, V>, head: NodeId) -> NodeId {
    let mut e = Some(head);
    while let Some(id) = e {
        nodes[id].clear_tree_links();
        e = nodes[id].next;
    }
    head
}

/// Unlink `p` from its tree bin. The node stays in the arena; the caller
/// frees it. Falls back to a plain chain when the remaining bin is small.
pub(crate) fn remove<K, V>(
    nodes: &mut Nodes<K, V>,
    buckets: &mut [Bucket],
    p: NodeId,
    movable: bool,
    untreeify_threshold: usize,
) {
    if buckets.is_empty() {
        return;
    }
    let index = index_for(nodes[p].hash, buckets.len());
    let Some(mut first) = buckets[index].head() else {
        debug_assert!(false, "removing from an empty bucket");
        return;
    };

    // Chain unlink first; it does not depend on the tree shape.
    let succ = nodes[p].next;
    let pred = nodes[p].prev;
    match pred {
        None => match succ {
            Some(s) => first = s,
            None => {
                buckets[index] = Bucket::Empty;
                return;
            }
        },
        Some(pr) => nodes[pr].next = succ,
    }
    if let Some(s) = succ {
        nodes[s].prev = pred;
    }
    buckets[index] = Bucket::Tree(first);

    let mut root = root_of(nodes, first);
    if too_small(nodes, root)
        || chain_len_capped(nodes, first, untreeify_threshold) <= untreeify_threshold
    {
        tracing::trace!(index, "untreeify bin after removal");
        buckets[index] = Bucket::Chain(untreeify(nodes, first));
        return;
    }

    let (pl, pr) = (nodes[p].left, nodes[p].right);
    let replacement = match (pl, pr) {
        (Some(pl), Some(pr)) => {
            // Swap p with its in-order successor by relinking, so every
            // node keeps its key and value.
            let mut s = pr;
            while let Some(sl) = nodes[s].left {
                s = sl;
            }
            let c = nodes[s].red;
            nodes[s].red = nodes[p].red;
            nodes[p].red = c;
            let sr = nodes[s].right;
            let pp = nodes[p].parent;
            if s == pr {
                nodes[p].parent = Some(s);
                nodes[s].right = Some(p);
            } else {
                let sp = nodes[s].parent;
                nodes[p].parent = sp;
                if let Some(sp) = sp {
                    if nodes[sp].left == Some(s) {
                        nodes[sp].left = Some(p);
                    } else {
                        nodes[sp].right = Some(p);
                    }
                }
                nodes[s].right = Some(pr);
                nodes[pr].parent = Some(s);
            }
            nodes[p].left = None;
            nodes[p].right = sr;
            if let Some(sr) = sr {
                nodes[sr].parent = Some(p);
            }
            nodes[s].left = Some(pl);
            nodes[pl].parent = Some(s);
            nodes[s].parent = pp;
            match pp {
                None => root = s,
                Some(pp) => {
                    if nodes[pp].left == Some(p) {
                        nodes[pp].left = Some(s);
                    } else {
                        nodes[pp].right = Some(s);
                    }
                }
            }
            sr.unwrap_or(p)
        }
        (Some(pl), None) => pl,
        (None, Some(pr)) => pr,
        (None, None) => p,
    };

    if replacement != p {
        let pp = nodes[p].parent;
        nodes[replacement].parent = pp;
        match pp {
            None => root = replacement,
            Some(pp) => {
                if nodes[pp].left == Some(p) {
                    nodes[pp].left = Some(replacement);
                } else {
                    nodes[pp].right = Some(replacement);
                }
            }
        }
        nodes[p].left = None;
        nodes[p].right = None;
        nodes[p].parent = None;
    }

    let r = if nodes[p].red {
        root
    } else {
        balance_deletion(nodes, root, replacement)
    };

    if replacement == p {
        if let Some(pp) = nodes[p].parent.take() {
            if nodes[pp].left == Some(p) {
                nodes[pp].left = None;
            } else if nodes[pp].right == Some(p) {
                nodes[pp].right = None;
            }
        }
    }
    if movable {
        move_root_to_front(nodes, buckets, r);
    }
}

/// Constant-time shape test for a bin too small to stay a tree.
fn too_small<K, V>(nodes: &Nodes<K, V>, root: NodeId) -> bool {
    let r = &nodes[root];
    r.right.is_none() || r.left.map_or(true, |rl| nodes[rl].left.is_none())
}

/// Split a tree bin of a table being doubled. Nodes whose hash has `bit`
/// clear stay at `index`, the others move to `index + bit`; chain order
/// is kept on both sides. A side at or below the untreeify threshold
/// becomes a plain chain; a larger side is rebuilt as a tree unless it
/// received every node, in which case the old tree is still valid.
pub(crate) fn split<K, V>(
    nodes: &mut Nodes<K, V>,
    buckets: &mut [Bucket],
    first: NodeId,
    index: usize,
    bit: usize,
    untreeify_threshold: usize,
    cmp: Option<KeyCmp<K>>,
) {
    let (mut lo_head, mut lo_tail) = (None, None);
    let (mut hi_head, mut hi_tail) = (None, None);
    let (mut lc, mut hc) = (0usize, 0usize);

    let mut e = Some(first);
    while let Some(id) = e {
        let next = nodes[id].next;
        nodes[id].next = None;
        if nodes[id].hash as usize & bit == 0 {
            nodes[id].prev = lo_tail;
            match lo_tail {
                None => lo_head = Some(id),
                Some(t) => nodes[t].next = Some(id),
            }
            lo_tail = Some(id);
            lc += 1;
        } else {
            nodes[id].prev = hi_tail;
            match hi_tail {
                None => hi_head = Some(id),
                Some(t) => nodes[t].next = Some(id),
            }
            hi_tail = Some(id);
            hc += 1;
        }
        e = next;
    }

    tracing::trace!(index, bit, lo = lc, hi = hc, "split tree bin");

    if let Some(lo) = lo_head {
        if lc <= untreeify_threshold {
            buckets[index] = Bucket::Chain(untreeify(nodes, lo));
        } else {
            buckets[index] = Bucket::Tree(lo);
            if hi_head.is_some() {
                treeify(nodes, buckets, lo, cmp);
            }
        }
    }
    if let Some(hi) = hi_head {
        if hc <= untreeify_threshold {
            buckets[index + bit] = Bucket::Chain(untreeify(nodes, hi));
        } else {
            buckets[index + bit] = Bucket::Tree(hi);
            if lo_head.is_some() {
                treeify(nodes, buckets, hi, cmp);
            }
        }
    }
}

fn rotate_left<K, V>(nodes: &mut Nodes<K, V>, mut root: NodeId, p: NodeId) -> NodeId {
    let Some(r) = nodes[p].right else {
        return root;
    };
    let rl = nodes[r].left;
    nodes[p].right = rl;
    if let Some(rl) = rl {
        nodes[rl].parent = Some(p);
    }
    let pp = nodes[p].parent;
    nodes[r].parent = pp;
    match pp {
        None => {
            root = r;
            nodes[r].red = false;
        }
        Some(pp) => {
            if nodes[pp].left == Some(p) {
                nodes[pp].left = Some(r);
            } else {
                nodes[pp].right = Some(r);
            }
        }
    }
    nodes[r].left = Some(p);
    nodes[p].parent = Some(r);
    root
}

fn rotate_right<K, V>(nodes: &mut Nodes<K, V>, mut root: NodeId, p: NodeId) -> NodeId {
    let Some(l) = nodes[p].left else {
        return root;
    };
    let lr = nodes[l].right;
    nodes[p].left = lr;
    if let Some(lr) = lr {
        nodes[lr].parent = Some(p);
    }
    let pp = nodes[p].parent;
    nodes[l].parent = pp;
    match pp {
        None => {
            root = l;
            nodes[l].red = false;
        }
        Some(pp) => {
            if nodes[pp].right == Some(p) {
                nodes[pp].right = Some(l);
            } else {
                nodes[pp].left = Some(l);
            }
        }
    }
    nodes[l].right = Some(p);
    nodes[p].parent = Some(l);
    root
}

/// Insert fix-up for the freshly linked node `x`. Returns the new root.
fn balance_insertion<K, V>(nodes: &mut Nodes<K, V>, mut root: NodeId, mut x: NodeId) -> NodeId {
    nodes[x].red = true;
    loop {
        let Some(xp) = nodes[x].parent else {
            nodes[x].red = false;
            return x;
        };
        if !nodes[xp].red {
            return root;
        }
        let Some(xpp) = nodes[xp].parent else {
            return root;
        };
        if nodes[xpp].left == Some(xp) {
            let uncle = nodes[xpp].right;
            if let Some(u) = uncle.filter(|&u| nodes[u].red) {
                nodes[u].red = false;
                nodes[xp].red = false;
                nodes[xpp].red = true;
                x = xpp;
            } else {
                let (mut p, mut g) = (xp, Some(xpp));
                if nodes[p].right == Some(x) {
                    // Near child: rotate it to the far position first.
                    x = p;
                    root = rotate_left(nodes, root, x);
                    let Some(np) = nodes[x].parent else {
                        continue;
                    };
                    p = np;
                    g = nodes[np].parent;
                }
                nodes[p].red = false;
                if let Some(g) = g {
                    nodes[g].red = true;
                    root = rotate_right(nodes, root, g);
                }
            }
        } else {
            let uncle = nodes[xpp].left;
            if let Some(u) = uncle.filter(|&u| nodes[u].red) {
                nodes[u].red = false;
                nodes[xp].red = false;
                nodes[xpp].red = true;
                x = xpp;
            } else {
                let (mut p, mut g) = (xp, Some(xpp));
                if nodes[p].left == Some(x) {
                    x = p;
                    root = rotate_right(nodes, root, x);
                    let Some(np) = nodes[x].parent else {
                        continue;
                    };
                    p = np;
                    g = nodes[np].parent;
                }
                nodes[p].red = false;
                if let Some(g) = g {
                    nodes[g].red = true;
                    root = rotate_left(nodes, root, g);
                }
            }
        }
    }
}

/// Delete fix-up starting at `x`, the node that took the removed node's
/// place (or the removed node itself while still attached).
fn balance_deletion<K, V>(nodes: &mut Nodes<K, V>, mut root: NodeId, mut x: NodeId) -> NodeId {
    loop {
        if x == root {
            return root;
        }
        let Some(xp) = nodes[x].parent else {
            nodes[x].red = false;
            return x;
        };
        if nodes[x].red {
            nodes[x].red = false;
            return root;
        }
        if nodes[xp].left == Some(x) {
            let mut xpr = nodes[xp].right;
            if let Some(s) = xpr.filter(|&s| nodes[s].red) {
                nodes[s].red = false;
                nodes[xp].red = true;
                root = rotate_left(nodes, root, xp);
                xpr = nodes[xp].right;
            }
            match xpr {
                None => x = xp,
                Some(s) => {
                    let (sl, sr) = (nodes[s].left, nodes[s].right);
                    if !is_red(nodes, sr) && !is_red(nodes, sl) {
                        nodes[s].red = true;
                        x = xp;
                    } else {
                        if !is_red(nodes, sr) {
                            if let Some(sl) = sl {
                                nodes[sl].red = false;
                            }
                            nodes[s].red = true;
                            root = rotate_right(nodes, root, s);
                            xpr = nodes[xp].right;
                        }
                        if let Some(s) = xpr {
                            nodes[s].red = nodes[xp].red;
                            if let Some(sr) = nodes[s].right {
                                nodes[sr].red = false;
                            }
                        }
                        nodes[xp].red = false;
                        root = rotate_left(nodes, root, xp);
                        x = root;
                    }
                }
            }
        } else {
            let mut xpl = nodes[xp].left;
            if let Some(s) = xpl.filter(|&s| nodes[s].red) {
                nodes[s].red = false;
                nodes[xp].red = true;
                root = rotate_right(nodes, root, xp);
                xpl = nodes[xp].left;
            }
            match xpl {
                None => x = xp,
                Some(s) => {
                    let (sl, sr) = (nodes[s].left, nodes[s].right);
                    if !is_red(nodes, sl) && !is_red(nodes, sr) {
                        nodes[s].red = true;
                        x = xp;
                    } else {
                        if !is_red(nodes, sl) {
                            if let Some(sr) = sr {
                                nodes[sr].red = false;
                            }
                            nodes[s].red = true;
                            root = rotate_left(nodes, root, s);
                            xpl = nodes[xp].left;
                        }
                        if let Some(s) = xpl {
                            nodes[s].red = nodes[xp].red;
                            if let Some(sl) = nodes[s].left {
                                nodes[sl].red = false;
                            }
                        }
                        nodes[xp].red = false;
                        root = rotate_right(nodes, root, xp);
                        x = root;
                    }
                }
            }
        }
    }
}

/// Recursive consistency check of the subtree at `t`: chain links agree
/// in both directions, parent/child links agree, children respect hash
/// order, and no red node has two red children.
pub(crate) fn check_invariants<K, V>(nodes: &Nodes<K, V>, t: NodeId) -> bool {
    let n = &nodes[t];
    if let Some(tb) = n.prev {
        if nodes[tb].next != Some(t) {
            return false;
        }
    }
    if let Some(tn) = n.next {
        if nodes[tn].prev != Some(t) {
            return false;
        }
    }
    if let Some(tp) = n.parent {
        if nodes[tp].left != Some(t) && nodes[tp].right != Some(t) {
            return false;
        }
    }
    if let Some(tl) = n.left {
        if nodes[tl].parent != Some(t) || nodes[tl].hash > n.hash {
            return false;
        }
    }
    if let Some(tr) = n.right {
        if nodes[tr].parent != Some(t) || nodes[tr].hash < n.hash {
            return false;
        }
    }
    if n.red && is_red(nodes, n.left) && is_red(nodes, n.right) {
        return false;
    }
    n.left.map_or(true, |tl| check_invariants(nodes, tl))
        && n.right.map_or(true, |tr| check_invariants(nodes, tr))
}
