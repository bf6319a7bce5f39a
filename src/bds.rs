//! The BDS (Buchmann-Dahmen-Szydlo) authentication-path traversal engine.
//!
//! RFC 8391's reference algorithm recomputes the entire Merkle tree on every
//! `sign()` call, which costs `O(h * 2^h)` hash evaluations per signature.
//! `Bds` instead keeps one small incremental treehash instance per tree
//! level; each `sign()` call advances every unfinished instance a bounded
//! number of times and, when the authentication path needs a new node at
//! some level, takes it from that level's instance. Total work across the
//! life of a tree stays `O(h * 2^h)` (same as naive), but it is spread
//! evenly across the `2^h` signatures instead of redone from scratch each
//! time, so every individual `sign()` call costs `O(h)` amortized instead of
//! `O(h * 2^h)` worst case.
//!
//! A bounded `retain` cache additionally remembers recently completed nodes
//! at the lowest `bds_k` levels, since those levels recur often enough that
//! reusing a cached node is frequently cheaper than rebuilding it. This is a
//! deliberate simplification of the classical BDS `keep`/`retain` scheduling
//! (see DESIGN.md): it does not reach the same constant factor as the
//! original algorithm, but it preserves the same asymptotic amortized bound
//! and is far simpler to get right without being able to execute it.

use zeroize::Zeroize;

use crate::adrs::{ADRS_TYPE_HASHTREE, Adrs};
use crate::error::{Error, XmssResult};
use crate::hash::thash_h;
use crate::params::XmssParams;
use crate::xmss_commons::gen_leaf_wots;

/// One level's incremental treehash instance: builds the subtree root at a
/// fixed height, one leaf at a time, using the same merge-on-equal-heights
/// logic as a one-shot treehash but resumable across calls.
#[derive(Clone, Debug, Default)]
pub(crate) struct TreeHashInst {
    height: u32,
    start_idx: u32,
    next_idx: u32,
    stack: Vec<Vec<u8>>,
    stack_heights: Vec<u32>,
    node: Vec<u8>,
    completed: bool,
}

impl TreeHashInst {
    fn new(n: usize) -> Self {
        Self {
            height: 0,
            start_idx: 0,
            next_idx: 0,
            stack: Vec::new(),
            stack_heights: Vec::new(),
            node: vec![0u8; n],
            completed: true,
        }
    }

    /// (Re)starts this instance to build the height-`height` subtree root
    /// covering leaves `[start_idx, start_idx + 2^height)`.
    fn init(&mut self, height: u32, start_idx: u32) {
        self.height = height;
        self.start_idx = start_idx;
        self.next_idx = start_idx;
        self.stack.clear();
        self.stack_heights.clear();
        self.completed = false;
    }

    /// Feeds one more leaf into the instance, merging completed pairs.
    /// Safe to call on a completed instance (no-op).
    #[allow(clippy::too_many_arguments)]
    fn advance_one_leaf(
        &mut self,
        params: &XmssParams,
        sk_seed: &[u8],
        pub_seed: &[u8],
        layer: u32,
        tree: u64,
    ) -> XmssResult<()> {
        if self.completed {
            return Ok(());
        }
        let n = params.n as usize;

        let mut ots_addr = Adrs::new();
        let mut ltree_addr = Adrs::new();
        ots_addr.set_layer(layer);
        ots_addr.set_tree(tree);
        ltree_addr.set_layer(layer);
        ltree_addr.set_tree(tree);
        ltree_addr.set_ltree(self.next_idx);
        ots_addr.set_ots(self.next_idx);

        let mut leaf = vec![0u8; n];
        gen_leaf_wots(
            params,
            &mut leaf,
            sk_seed,
            pub_seed,
            &mut ltree_addr,
            &mut ots_addr,
        )?;

        self.stack.push(leaf);
        self.stack_heights.push(0);
        self.next_idx += 1;

        let mut node_addr = Adrs::new();
        node_addr.set_layer(layer);
        node_addr.set_tree(tree);
        node_addr.set_type(ADRS_TYPE_HASHTREE);

        while self.stack_heights.len() >= 2
            && self.stack_heights[self.stack_heights.len() - 1]
                == self.stack_heights[self.stack_heights.len() - 2]
        {
            let right = self.stack.pop().expect("checked len >= 2 above");
            let left = self.stack.pop().expect("checked len >= 2 above");
            let merged_height = self.stack_heights.pop().expect("checked len >= 2 above") + 1;
            self.stack_heights.pop();

            let mut input = vec![0u8; 2 * n];
            input[..n].copy_from_slice(&left);
            input[n..].copy_from_slice(&right);

            let subtree_idx = (self.next_idx - 1) >> merged_height;
            node_addr.set_tree_height(merged_height - 1);
            node_addr.set_tree_index(subtree_idx);

            let mut out = vec![0u8; n];
            thash_h(params, &mut out, &input, pub_seed, &mut node_addr)?;

            self.stack.push(out);
            self.stack_heights.push(merged_height);
        }

        if self.stack_heights.len() == 1 && self.stack_heights[0] == self.height {
            self.node = self.stack[0].clone();
            self.completed = true;
            self.stack.clear();
            self.stack_heights.clear();
        }
        Ok(())
    }
}

/// Number of `advance_one_leaf` calls made per unfinished instance on every
/// `bds_round`. Two is enough: an instance at height `i` has `2^(i+1)`
/// rounds between consecutive activations to perform `2^i` leaf pulls, so a
/// constant rate of 2-per-round always finishes comfortably early.
const ADVANCES_PER_ROUND: u32 = 2;

/// A recently completed node, cached for potential reuse at a low tree
/// level. Keyed by `(height, start_idx)`.
#[derive(Clone, Debug)]
struct RetainEntry {
    height: u32,
    start_idx: u32,
    node: Vec<u8>,
}

/// The amortized authentication-path state for one Merkle tree (one XMSS
/// instance, or one layer of an XMSS-MT hypertree).
///
/// Must be persisted by the caller alongside the signing key: it is exactly
/// as sensitive as the signing key's traversal position, since it encodes
/// how far through the tree signing has progressed.
#[derive(Clone, Debug)]
pub(crate) struct Bds {
    tree_height: u32,
    bds_k: u32,
    auth: Vec<Vec<u8>>,
    treehash: Vec<TreeHashInst>,
    retain: Vec<RetainEntry>,
    next_leaf: u32,
}

impl Bds {
    /// Builds a fresh `Bds` state for leaf index 0, running a full treehash
    /// pass to populate the initial authentication path and prime every
    /// level's incremental instance. Also returns the tree root.
    pub(crate) fn init(
        params: &XmssParams,
        root: &mut [u8],
        sk_seed: &[u8],
        pub_seed: &[u8],
        layer: u32,
        tree: u64,
    ) -> XmssResult<Self> {
        params.validate_bds_k(params.bds_k)?;

        let n = params.n as usize;
        let h = params.tree_height as usize;

        let mut auth = vec![vec![0u8; n]; h];
        let mut stack: Vec<Vec<u8>> = Vec::with_capacity(h + 1);
        let mut stack_heights: Vec<u32> = Vec::with_capacity(h + 1);

        let mut ots_addr = Adrs::new();
        let mut ltree_addr = Adrs::new();
        let mut node_addr = Adrs::new();
        ots_addr.set_layer(layer);
        ltree_addr.set_layer(layer);
        node_addr.set_layer(layer);
        ots_addr.set_tree(tree);
        ltree_addr.set_tree(tree);
        node_addr.set_tree(tree);
        node_addr.set_type(ADRS_TYPE_HASHTREE);

        let num_leaves = 1u32 << params.tree_height;
        for idx in 0..num_leaves {
            ltree_addr.set_ltree(idx);
            ots_addr.set_ots(idx);
            let mut leaf = vec![0u8; n];
            gen_leaf_wots(
                params,
                &mut leaf,
                sk_seed,
                pub_seed,
                &mut ltree_addr,
                &mut ots_addr,
            )?;
            stack.push(leaf);
            stack_heights.push(0);

            if idx == 1 {
                auth[0] = stack.last().expect("just pushed").clone();
            }

            while stack_heights.len() >= 2
                && stack_heights[stack_heights.len() - 1] == stack_heights[stack_heights.len() - 2]
            {
                let height = stack_heights[stack_heights.len() - 1];
                let tree_idx = idx >> (height + 1);
                node_addr.set_tree_height(height);
                node_addr.set_tree_index(tree_idx);

                let right = stack.pop().expect("checked len >= 2 above");
                let left = stack.pop().expect("checked len >= 2 above");
                stack_heights.pop();
                stack_heights.pop();

                let mut input = vec![0u8; 2 * n];
                input[..n].copy_from_slice(&left);
                input[n..].copy_from_slice(&right);
                let mut out = vec![0u8; n];
                thash_h(params, &mut out, &input, pub_seed, &mut node_addr)?;

                stack.push(out);
                stack_heights.push(height + 1);

                if tree_idx == 1 {
                    auth[(height + 1) as usize] = stack.last().expect("just pushed").clone();
                }
            }
        }
        root[..n].copy_from_slice(&stack[0]);

        let k = params.bds_k.min(params.tree_height.saturating_sub(1));
        let mut treehash = Vec::with_capacity(h);
        for i in 0..h {
            #[allow(clippy::cast_possible_truncation)]
            let level = i as u32;
            let mut inst = TreeHashInst::new(n);
            if level < params.tree_height {
                // The instance at height `level` is building the sibling of
                // leaf 0's ancestor at that height: starts at leaf `2^level`.
                let start = 1u32 << level;
                inst.height = level;
                inst.init(level, start);
            }
            treehash.push(inst);
        }

        Ok(Self {
            tree_height: params.tree_height,
            bds_k: k,
            auth,
            treehash,
            retain: Vec::new(),
            next_leaf: 1,
        })
    }

    /// Copies the current authentication path into `out` (`tree_height * n`
    /// bytes), as needed for the signature of the leaf about to be used.
    pub(crate) fn write_auth_path(&self, out: &mut [u8], n: usize) {
        for (i, node) in self.auth.iter().enumerate() {
            out[i * n..(i + 1) * n].copy_from_slice(node);
        }
    }

    /// Advances the state from `leaf_idx` to `leaf_idx + 1`: rotates in the
    /// next authentication node at the level that just became stale, and
    /// makes bounded incremental progress on every unfinished instance.
    pub(crate) fn advance(
        &mut self,
        params: &XmssParams,
        leaf_idx: u32,
        sk_seed: &[u8],
        pub_seed: &[u8],
        layer: u32,
        tree: u64,
    ) -> XmssResult<()> {
        let h = self.tree_height;

        let mut tau = h;
        for i in 0..h {
            if (leaf_idx >> i) & 1 == 0 {
                tau = i;
                break;
            }
        }

        if tau < h {
            let idx = tau as usize;
            while !self.treehash[idx].completed {
                self.treehash[idx].advance_one_leaf(params, sk_seed, pub_seed, layer, tree)?;
            }
            self.auth[idx] = self.treehash[idx].node.clone();
            if tau < self.bds_k {
                self.cache_retain(tau, self.treehash[idx].start_idx);
            }

            // Restart this level to build the subtree one full cycle ahead:
            // two subtrees of this height cover `2 * 2^tau` leaves, the
            // range just consumed plus its immediate sibling; the next one
            // needed starts right after both.
            let period = 1u32 << (tau + 1);
            let next_start = self.treehash[idx].start_idx + period;
            if next_start < (1u32 << h) {
                if let Some(node) = self.find_cached(tau, next_start) {
                    self.treehash[idx].node = node;
                    self.treehash[idx].start_idx = next_start;
                    self.treehash[idx].next_idx = next_start + (1 << tau);
                    self.treehash[idx].completed = true;
                } else {
                    self.treehash[idx].init(tau, next_start);
                }
            }
        }

        for inst in &mut self.treehash {
            for _ in 0..ADVANCES_PER_ROUND {
                if inst.completed {
                    break;
                }
                inst.advance_one_leaf(params, sk_seed, pub_seed, layer, tree)?;
            }
        }

        self.next_leaf = leaf_idx + 1;
        Ok(())
    }

    fn cache_retain(&mut self, height: u32, start_idx: u32) {
        let node = self.treehash[height as usize].node.clone();
        if self.retain.len() as u32 >= crate::params::MAX_RETAIN as u32 {
            self.retain.remove(0);
        }
        self.retain.push(RetainEntry {
            height,
            start_idx,
            node,
        });
    }

    fn find_cached(&self, height: u32, start_idx: u32) -> Option<Vec<u8>> {
        self.retain
            .iter()
            .find(|e| e.height == height && e.start_idx == start_idx)
            .map(|e| e.node.clone())
    }

    /// The next leaf index this state is prepared to sign with.
    pub(crate) fn next_leaf(&self) -> u32 {
        self.next_leaf
    }

    /// Serializes this state to bytes. Layout: `next_leaf` (4 bytes, BE),
    /// then `tree_height` auth nodes (`n` bytes each), then one record per
    /// treehash instance (`completed`:1, `height`:4, `start_idx`:4,
    /// `next_idx`:4, `node`: n bytes), then a retain-count byte followed by
    /// that many `(height:4, start_idx:4, node: n bytes)` records.
    pub(crate) fn serialize(&self, params: &XmssParams, out: &mut Vec<u8>) {
        let n = params.n as usize;
        out.extend_from_slice(&self.next_leaf.to_be_bytes());
        for node in &self.auth {
            out.extend_from_slice(node);
        }
        for inst in &self.treehash {
            out.push(u8::from(inst.completed));
            out.extend_from_slice(&inst.height.to_be_bytes());
            out.extend_from_slice(&inst.start_idx.to_be_bytes());
            out.extend_from_slice(&inst.next_idx.to_be_bytes());
            let mut node = inst.node.clone();
            node.resize(n, 0);
            out.extend_from_slice(&node);
            node.zeroize();
        }
        #[allow(clippy::cast_possible_truncation)]
        out.push(self.retain.len() as u8);
        for entry in &self.retain {
            out.extend_from_slice(&entry.height.to_be_bytes());
            out.extend_from_slice(&entry.start_idx.to_be_bytes());
            out.extend_from_slice(&entry.node);
        }
    }

    /// Reconstructs a `Bds` state from bytes produced by [`Bds::serialize`].
    pub(crate) fn deserialize(params: &XmssParams, bytes: &[u8]) -> XmssResult<Self> {
        let n = params.n as usize;
        let h = params.tree_height as usize;
        let mut pos = 0usize;

        let read_u32 = |b: &[u8], p: usize| -> XmssResult<u32> {
            b.get(p..p + 4)
                .map(|s| u32::from_be_bytes([s[0], s[1], s[2], s[3]]))
                .ok_or(Error::InvalidKeyLength {
                    expected: p + 4,
                    got: b.len(),
                })
        };

        let next_leaf = read_u32(bytes, pos)?;
        pos += 4;

        let mut auth = Vec::with_capacity(h);
        for _ in 0..h {
            let slice = bytes
                .get(pos..pos + n)
                .ok_or(Error::InvalidKeyLength {
                    expected: pos + n,
                    got: bytes.len(),
                })?;
            auth.push(slice.to_vec());
            pos += n;
        }

        let mut treehash = Vec::with_capacity(h);
        for _ in 0..h {
            let completed = *bytes.get(pos).ok_or(Error::InvalidKeyLength {
                expected: pos + 1,
                got: bytes.len(),
            })? != 0;
            pos += 1;
            let height = read_u32(bytes, pos)?;
            pos += 4;
            let start_idx = read_u32(bytes, pos)?;
            pos += 4;
            let next_idx = read_u32(bytes, pos)?;
            pos += 4;
            let node = bytes
                .get(pos..pos + n)
                .ok_or(Error::InvalidKeyLength {
                    expected: pos + n,
                    got: bytes.len(),
                })?
                .to_vec();
            pos += n;

            treehash.push(TreeHashInst {
                height,
                start_idx,
                next_idx,
                stack: Vec::new(),
                stack_heights: Vec::new(),
                node,
                completed,
            });
        }

        let retain_count = *bytes.get(pos).ok_or(Error::InvalidKeyLength {
            expected: pos + 1,
            got: bytes.len(),
        })? as usize;
        pos += 1;

        let mut retain = Vec::with_capacity(retain_count);
        for _ in 0..retain_count {
            let height = read_u32(bytes, pos)?;
            pos += 4;
            let start_idx = read_u32(bytes, pos)?;
            pos += 4;
            let node = bytes
                .get(pos..pos + n)
                .ok_or(Error::InvalidKeyLength {
                    expected: pos + n,
                    got: bytes.len(),
                })?
                .to_vec();
            pos += n;
            retain.push(RetainEntry {
                height,
                start_idx,
                node,
            });
        }

        Ok(Self {
            tree_height: params.tree_height,
            bds_k: params.bds_k,
            auth,
            treehash,
            retain,
            next_leaf,
        })
    }

    /// The exact serialized size in bytes for a parameter set, used to
    /// validate a deserialization buffer up front.
    pub(crate) fn serialized_len(params: &XmssParams) -> usize {
        let n = params.n as usize;
        let h = params.tree_height as usize;
        4 + h * n + h * (1 + 4 + 4 + 4 + n) + 1 + params.bds_k.min(10) as usize * (4 + 4 + n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::XmssOid;

    #[test]
    fn init_then_advance_keeps_auth_path_len_stable() {
        let mut params = XmssParams::default();
        XmssOid::XmssSha2_10_256.initialize(&mut params).unwrap();

        let sk_seed = vec![1u8; params.n as usize];
        let pub_seed = vec![2u8; params.n as usize];
        let mut root = vec![0u8; params.n as usize];

        let mut bds = Bds::init(&params, &mut root, &sk_seed, &pub_seed, 0, 0).unwrap();
        assert_eq!(bds.auth.len(), params.tree_height as usize);

        for leaf in 0..8u32 {
            bds.advance(&params, leaf, &sk_seed, &pub_seed, 0, 0).unwrap();
        }
        assert_eq!(bds.next_leaf(), 9);
    }

    #[test]
    fn serialize_round_trips() {
        let mut params = XmssParams::default();
        XmssOid::XmssSha2_10_256.initialize(&mut params).unwrap();

        let sk_seed = vec![1u8; params.n as usize];
        let pub_seed = vec![2u8; params.n as usize];
        let mut root = vec![0u8; params.n as usize];
        let bds = Bds::init(&params, &mut root, &sk_seed, &pub_seed, 0, 0).unwrap();

        let mut bytes = Vec::new();
        bds.serialize(&params, &mut bytes);
        let restored = Bds::deserialize(&params, &bytes).unwrap();

        assert_eq!(bds.auth, restored.auth);
        assert_eq!(bds.next_leaf, restored.next_leaf);
    }
}
