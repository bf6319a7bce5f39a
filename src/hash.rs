//! The hash facade: the single dispatch point through which every other
//! module reaches the underlying SHA-256 / SHA-512 / SHAKE128 / SHAKE256
//! primitive. Exposes F, H, H_msg, PRF and PRF_keygen (RFC 8391 §5.1) over
//! whichever backend the active parameter set names.

use sha2::{Digest, Sha256, Sha512};
use sha3::{
    Shake128, Shake256,
    digest::{ExtendableOutput, Update, XofReader},
};
use zeroize::Zeroize;

use crate::adrs::Adrs;
use crate::error::{Error, XmssResult};
use crate::params::{XMSS_SHA2, XMSS_SHAKE128, XMSS_SHAKE256, XmssParams};
use crate::utils::ull_to_bytes;

const XMSS_HASH_PADDING_F: u64 = 0;
const XMSS_HASH_PADDING_H: u64 = 1;
const XMSS_HASH_PADDING_HASH: u64 = 2;
const XMSS_HASH_PADDING_PRF: u64 = 3;
const XMSS_HASH_PADDING_PRF_KEYGEN: u64 = 4;

fn core_hash(params: &XmssParams, out: &mut [u8], input: &[u8]) -> XmssResult<()> {
    match (params.n, params.func) {
        (24, XMSS_SHA2) => out[..24].copy_from_slice(&Sha256::digest(input)[..24]),
        (24, XMSS_SHAKE256) => {
            let mut hasher = Shake256::default();
            hasher.update(input);
            hasher.finalize_xof().read(&mut out[..24]);
        }
        (32, XMSS_SHA2) => out[..32].copy_from_slice(&Sha256::digest(input)),
        (32, XMSS_SHAKE128) => {
            let mut hasher = Shake128::default();
            hasher.update(input);
            hasher.finalize_xof().read(&mut out[..32]);
        }
        (32, XMSS_SHAKE256) => {
            let mut hasher = Shake256::default();
            hasher.update(input);
            hasher.finalize_xof().read(&mut out[..32]);
        }
        (64, XMSS_SHA2) => out[..64].copy_from_slice(&Sha512::digest(input)),
        (64, XMSS_SHAKE256) => {
            let mut hasher = Shake256::default();
            hasher.update(input);
            hasher.finalize_xof().read(&mut out[..64]);
        }
        _ => {
            return Err(Error::Hash {
                n: params.n,
                func: params.func,
            });
        }
    }
    Ok(())
}

fn addr_to_bytes(bytes: &mut [u8], adrs: Adrs) {
    adrs.to_bytes(bytes);
}

/// PRF(key, in): a key of `params.n` bytes and a 32-byte input (an address
/// or, for message randomization, `toByte(idx, 32)`).
pub(crate) fn prf(
    params: &XmssParams,
    out: &mut [u8],
    input: &[u8; 32],
    key: &[u8],
) -> XmssResult<()> {
    let n = params.n as usize;
    let padding_len = params.padding_len as usize;
    let mut buf = vec![0u8; padding_len + n + 32];

    ull_to_bytes(&mut buf[..padding_len], XMSS_HASH_PADDING_PRF);
    buf[padding_len..padding_len + n].copy_from_slice(&key[..n]);
    buf[padding_len + n..padding_len + n + 32].copy_from_slice(input);

    let result = core_hash(params, out, &buf);
    buf.zeroize();
    result
}

/// PRF_keygen(sk_seed, pub_seed, adrs): expands a WOTS+ chain's secret
/// value from the seed. `input` is `pub_seed || ADRS` (n + 32 bytes).
pub(crate) fn prf_keygen(
    params: &XmssParams,
    out: &mut [u8],
    input: &[u8],
    key: &[u8],
) -> XmssResult<()> {
    let n = params.n as usize;
    let padding_len = params.padding_len as usize;
    let mut buf = vec![0u8; padding_len + 2 * n + 32];

    ull_to_bytes(&mut buf[..padding_len], XMSS_HASH_PADDING_PRF_KEYGEN);
    buf[padding_len..padding_len + n].copy_from_slice(&key[..n]);
    buf[padding_len + n..padding_len + n + n + 32].copy_from_slice(&input[..n + 32]);

    let result = core_hash(params, out, &buf);
    buf.zeroize();
    result
}

/// PRF_idx(sk_prf, idx): the randomizer R used to hash the message. Uses
/// the same keyed construction as PRF, with `toByte(idx, 32)` as input.
pub(crate) fn prf_idx(
    params: &XmssParams,
    out: &mut [u8],
    idx: u64,
    sk_prf: &[u8],
) -> XmssResult<()> {
    let mut idx_bytes = [0u8; 32];
    ull_to_bytes(&mut idx_bytes, idx);
    prf(params, out, &idx_bytes, sk_prf)
}

/// H_msg(r, root, idx, msg): hashes the (variable-length) message together
/// with its randomizer, the public root, and the leaf index.
///
/// `m_with_prefix` must have `padding_len + 3*n + mlen` bytes of scratch
/// space available; the caller places the message at the tail
/// (`m_with_prefix[padding_len + 3*n..]`) before calling.
pub(crate) fn hash_message(
    params: &XmssParams,
    out: &mut [u8],
    r: &[u8],
    root: &[u8],
    idx: u64,
    m_with_prefix: &mut [u8],
    mlen: u64,
) -> XmssResult<()> {
    let n = params.n as usize;
    let padding_len = params.padding_len as usize;

    ull_to_bytes(&mut m_with_prefix[..padding_len], XMSS_HASH_PADDING_HASH);
    m_with_prefix[padding_len..padding_len + n].copy_from_slice(&r[..n]);
    m_with_prefix[padding_len + n..padding_len + 2 * n].copy_from_slice(&root[..n]);
    ull_to_bytes(
        &mut m_with_prefix[padding_len + 2 * n..padding_len + 3 * n],
        idx,
    );

    #[allow(clippy::cast_possible_truncation)]
    let total_len = mlen as usize + padding_len + 3 * n;
    core_hash(params, out, &m_with_prefix[..total_len])
}

/// H(key, adrs, L, R): the two-block tree-node hash combining a left and
/// right child into their parent. `input` is `L || R` (2n bytes).
pub(crate) fn thash_h(
    params: &XmssParams,
    out: &mut [u8],
    input: &[u8],
    pub_seed: &[u8],
    adrs: &mut Adrs,
) -> XmssResult<()> {
    let n = params.n as usize;
    let padding_len = params.padding_len as usize;
    let mut buf = vec![0u8; padding_len + 3 * n];
    let mut bitmask = vec![0u8; 2 * n];
    let mut addr_bytes = [0u8; 32];

    ull_to_bytes(&mut buf[..padding_len], XMSS_HASH_PADDING_H);

    adrs.set_key_and_mask(0);
    addr_to_bytes(&mut addr_bytes, *adrs);
    prf(
        params,
        &mut buf[padding_len..padding_len + n],
        &addr_bytes,
        pub_seed,
    )?;

    adrs.set_key_and_mask(1);
    addr_to_bytes(&mut addr_bytes, *adrs);
    prf(params, &mut bitmask[..n], &addr_bytes, pub_seed)?;

    adrs.set_key_and_mask(2);
    addr_to_bytes(&mut addr_bytes, *adrs);
    prf(params, &mut bitmask[n..2 * n], &addr_bytes, pub_seed)?;

    for i in 0..2 * n {
        buf[padding_len + n + i] = input[i] ^ bitmask[i];
    }

    core_hash(params, out, &buf)
}

/// F(key, adrs, M): the one-block WOTS+ chain step.
pub(crate) fn thash_f(
    params: &XmssParams,
    out: &mut [u8],
    input: &[u8],
    pub_seed: &[u8],
    adrs: &mut Adrs,
) -> XmssResult<()> {
    let n = params.n as usize;
    let padding_len = params.padding_len as usize;
    let mut buf = vec![0u8; padding_len + 2 * n];
    let mut bitmask = vec![0u8; n];
    let mut addr_bytes = [0u8; 32];

    ull_to_bytes(&mut buf[..padding_len], XMSS_HASH_PADDING_F);

    adrs.set_key_and_mask(0);
    addr_to_bytes(&mut addr_bytes, *adrs);
    prf(
        params,
        &mut buf[padding_len..padding_len + n],
        &addr_bytes,
        pub_seed,
    )?;

    adrs.set_key_and_mask(1);
    addr_to_bytes(&mut addr_bytes, *adrs);
    prf(params, &mut bitmask, &addr_bytes, pub_seed)?;

    for i in 0..n {
        buf[padding_len + n + i] = input[i] ^ bitmask[i];
    }

    core_hash(params, out, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::XmssOid;

    #[test]
    fn thash_f_is_deterministic() {
        let mut params = XmssParams::default();
        XmssOid::XmssSha2_10_256.initialize(&mut params).unwrap();
        let pub_seed = [7u8; 32];
        let input = [1u8; 32];
        let mut adrs1 = Adrs::new();
        let mut adrs2 = Adrs::new();
        let mut out1 = [0u8; 32];
        let mut out2 = [0u8; 32];
        thash_f(&params, &mut out1, &input, &pub_seed, &mut adrs1).unwrap();
        thash_f(&params, &mut out2, &input, &pub_seed, &mut adrs2).unwrap();
        assert_eq!(out1, out2);
    }

    #[test]
    fn thash_h_differs_from_thash_f() {
        let mut params = XmssParams::default();
        XmssOid::XmssSha2_10_256.initialize(&mut params).unwrap();
        let pub_seed = [7u8; 32];
        let input2 = [1u8; 64];
        let input1 = [1u8; 32];
        let mut adrs = Adrs::new();
        let mut out_f = [0u8; 32];
        let mut out_h = [0u8; 32];
        thash_f(&params, &mut out_f, &input1, &pub_seed, &mut adrs).unwrap();
        thash_h(&params, &mut out_h, &input2, &pub_seed, &mut adrs).unwrap();
        assert_ne!(out_f, out_h);
    }
}
