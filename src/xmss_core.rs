//! Core XMSS/XMSS-MT operations: key generation and signing, backed by the
//! amortized [`Bds`](crate::bds::Bds) traversal state rather than the naive
//! full-recompute treehash RFC 8391 describes.
//!
//! For XMSS-MT (`d > 1`), each of the `d` layers gets its own `Bds`
//! instance scoped to whichever subtree of that layer is currently active.
//! Only the top layer's subtree is fixed (tree index 0, forever); every
//! other layer's subtree changes every `2^tree_height` signatures, at which
//! point its `Bds` state is rebuilt from scratch for the new subtree. That
//! rebuild is the one place this crate still pays a full treehash cost, but
//! it is paid only at layer boundaries rather than on every signature.

use zeroize::Zeroize;

use crate::adrs::{ADRS_TYPE_OTS, Adrs};
use crate::bds::Bds;
use crate::error::{Error, XmssResult};
use crate::hash::{hash_message, prf};
use crate::params::XmssParams;
use crate::utils::{bytes_to_ull, ull_to_bytes};
use crate::wots::wots_sign;

/// Returns the size of the secret key's fixed-format prefix (index, seeds,
/// root, pub_seed) — excludes the serialized per-layer `Bds` traversal
/// states that trail it in the full on-disk secret key.
pub(crate) fn xmss_xmssmt_core_sk_bytes(params: &XmssParams) -> u64 {
    params.index_bytes as u64 + 4 * params.n as u64
}

/// One layer's amortized traversal state, scoped to whichever subtree
/// (`tree_idx`) of that layer is currently active. `root` is the root of
/// that subtree — fixed for as long as `tree_idx` doesn't change, so it is
/// computed once (by [`Bds::init`]) and reused for every signature that
/// falls inside the subtree.
#[derive(Clone, Debug)]
pub(crate) struct LayerState {
    pub(crate) tree_idx: u64,
    pub(crate) root: Vec<u8>,
    pub(crate) bds: Bds,
}

/// Derives an XMSS(-MT) key pair from a given seed (3*n bytes). Builds only
/// the top layer's `Bds` state; lower layers are built lazily on first use,
/// since they depend on which leaf of the upper tree ends up active.
///
/// Format sk: `[index || SK_SEED || SK_PRF || root || PUB_SEED]`
/// Format pk: `[root || PUB_SEED]` (omitting the algorithm OID).
pub(crate) fn xmssmt_core_seed_keypair(
    params: &XmssParams,
    pk: &mut [u8],
    sk: &mut [u8],
    seed: &[u8],
) -> XmssResult<Vec<Option<LayerState>>> {
    let n = params.n as usize;
    let idx_bytes = params.index_bytes as usize;

    for b in sk[..idx_bytes].iter_mut() {
        *b = 0;
    }

    sk[idx_bytes..idx_bytes + 2 * n].copy_from_slice(&seed[..2 * n]);
    sk[idx_bytes + 3 * n..idx_bytes + 4 * n].copy_from_slice(&seed[2 * n..3 * n]);
    pk[n..2 * n].copy_from_slice(&sk[idx_bytes + 3 * n..idx_bytes + 4 * n]);

    let pub_seed_copy = pk[n..2 * n].to_vec();
    let top_layer = params.d - 1;
    let bds = Bds::init(
        params,
        &mut pk[..n],
        &sk[idx_bytes..idx_bytes + n],
        &pub_seed_copy,
        top_layer,
        0,
    )?;
    sk[idx_bytes + 2 * n..idx_bytes + 3 * n].copy_from_slice(&pk[..n]);

    let mut layers: Vec<Option<LayerState>> = vec![None; params.d as usize];
    layers[top_layer as usize] = Some(LayerState {
        tree_idx: 0,
        root: pk[..n].to_vec(),
        bds,
    });

    Ok(layers)
}

/// Generates an XMSS(-MT) key pair using fresh randomness.
pub(crate) fn xmssmt_core_keypair<R: rand::CryptoRng>(
    params: &XmssParams,
    pk: &mut [u8],
    sk: &mut [u8],
    rng: &mut R,
) -> XmssResult<Vec<Option<LayerState>>> {
    let n = params.n as usize;
    let mut seed = vec![0u8; 3 * n];

    rng.fill_bytes(&mut seed[..]);
    let result = xmssmt_core_seed_keypair(params, pk, sk, &seed);
    seed.zeroize();
    result
}

/// Signs a message using the current global leaf index, advancing both the
/// index embedded in `sk` and every layer's `Bds` traversal state.
pub(crate) fn xmssmt_core_sign(
    params: &XmssParams,
    sk: &mut [u8],
    layers: &mut [Option<LayerState>],
    m: &[u8],
) -> XmssResult<Vec<u8>> {
    let n = params.n as usize;
    let idx_bytes = params.index_bytes as usize;
    let mlen = m.len();
    let sig_bytes = params.sig_bytes as usize;

    let sk_seed_start = idx_bytes;
    let sk_prf_start = idx_bytes + n;
    let pub_root_start = idx_bytes + 2 * n;
    let pub_seed_start = idx_bytes + 3 * n;

    let idx = bytes_to_ull(&sk[..idx_bytes]);

    let max_idx = if params.full_height >= 64 {
        u64::MAX
    } else {
        (1u64 << params.full_height) - 1
    };
    if idx > max_idx {
        return Err(Error::KeyExhausted);
    }

    let mut sk_seed = sk[sk_seed_start..sk_seed_start + n].to_vec();
    let mut sk_prf = sk[sk_prf_start..sk_prf_start + n].to_vec();
    let pub_root = sk[pub_root_start..pub_root_start + n].to_vec();
    let pub_seed = sk[pub_seed_start..pub_seed_start + n].to_vec();

    let mut sm = vec![0u8; sig_bytes + mlen];

    sm[sig_bytes..].copy_from_slice(m);
    sm[..idx_bytes].copy_from_slice(&sk[..idx_bytes]);

    if idx == max_idx {
        for b in sk[..idx_bytes].iter_mut() {
            *b = 0xFF;
        }
    } else {
        ull_to_bytes(&mut sk[..idx_bytes], idx + 1);
    }

    let mut idx_bytes_32 = [0u8; 32];
    ull_to_bytes(&mut idx_bytes_32, idx);
    prf(
        params,
        &mut sm[idx_bytes..idx_bytes + n],
        &idx_bytes_32,
        &sk_prf,
    )?;

    let mut root = vec![0u8; n];
    let prefix_len = params.padding_len as usize + 3 * n;
    let prefix_start = sig_bytes - prefix_len;
    let r_val = sm[idx_bytes..idx_bytes + n].to_vec();
    hash_message(
        params,
        &mut root,
        &r_val,
        &pub_root,
        idx,
        &mut sm[prefix_start..],
        mlen as u64,
    )?;

    let mut sm_offset = idx_bytes + n;

    for i in 0..params.d {
        let idx_leaf = (idx >> (params.tree_height * i)) & ((1u64 << params.tree_height) - 1);
        #[allow(clippy::cast_possible_truncation)]
        let idx_leaf_u32 = idx_leaf as u32;
        let tree_idx = idx >> (params.tree_height * (i + 1));

        let slot = &mut layers[i as usize];
        let needs_rebuild = match slot {
            Some(layer) => layer.tree_idx != tree_idx,
            None => true,
        };
        if needs_rebuild {
            let mut layer_root = vec![0u8; n];
            let bds = Bds::init(params, &mut layer_root, &sk_seed, &pub_seed, i, tree_idx)?;
            *slot = Some(LayerState {
                tree_idx,
                root: layer_root,
                bds,
            });
        }
        let layer = slot.as_mut().expect("just populated above");

        let mut ots_addr = Adrs::new();
        ots_addr.set_type(ADRS_TYPE_OTS);
        ots_addr.set_layer(i);
        ots_addr.set_tree(tree_idx);
        ots_addr.set_ots(idx_leaf_u32);

        wots_sign(
            params,
            &mut sm[sm_offset..],
            &root,
            &sk_seed,
            &pub_seed,
            &mut ots_addr,
        )?;
        sm_offset += params.wots_sig_bytes as usize;

        layer.bds.write_auth_path(&mut sm[sm_offset..], n);
        sm_offset += params.tree_height as usize * n;

        // The root for the next (outer) layer's message is this layer's
        // subtree root, constant for as long as `tree_idx` doesn't change —
        // already computed once by `Bds::init` and cached on `layer.root`,
        // so there is nothing left to recompute here.
        root.copy_from_slice(&layer.root);

        layer
            .bds
            .advance(params, idx_leaf_u32, &sk_seed, &pub_seed, i, tree_idx)?;
    }

    sk_seed.zeroize();
    sk_prf.zeroize();

    if idx == max_idx {
        #[allow(clippy::cast_possible_truncation)]
        let sk_bytes_len = params.sk_bytes as usize;
        for b in sk[idx_bytes..sk_bytes_len].iter_mut() {
            *b = 0;
        }
    }

    Ok(sm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::XmssOid;
    use crate::xmss_commons::xmssmt_core_sign_open;

    #[test]
    fn sign_then_verify_round_trips_across_several_leaves() {
        let mut params = XmssParams::default();
        XmssOid::XmssSha2_10_256.initialize(&mut params).unwrap();

        let n = params.n as usize;
        let idx_bytes = params.index_bytes as usize;
        let seed = vec![5u8; 3 * n];

        let mut pk = vec![0u8; 2 * n];
        let mut sk = vec![0u8; idx_bytes + 4 * n];
        let mut layers = xmssmt_core_seed_keypair(&params, &mut pk, &mut sk, &seed).unwrap();

        for msg_byte in 0..4u8 {
            let msg = vec![msg_byte; 17];
            let sm = xmssmt_core_sign(&params, &mut sk, &mut layers, &msg).unwrap();

            let mut recovered = Vec::new();
            xmssmt_core_sign_open(&params, &mut recovered, &sm, &pk).unwrap();
            assert_eq!(recovered, msg);
        }
    }
}
