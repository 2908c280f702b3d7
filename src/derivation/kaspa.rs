// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Kaspa address derivation and encoding.
//!
//! Kaspa addresses use the cashaddr-style checksum (40-bit BCH code) over a
//! `kaspa:` prefix, not the bech32 checksum, so they are encoded here rather
//! than with the `bech32` crate.
//!
//! Unlike the Bitcoin family, an index that fails to derive is logged and
//! skipped. Balances are fetched through a bulk endpoint, so a sparse address
//! list is acceptable.

use bitcoin::bip32::Xpub;
use bitcoin::secp256k1::{Secp256k1, Verification};
use tracing::warn;

use super::{
    derive_child, parse_extended_key, AddressCounts, ChainNetwork, DerivationError,
    DerivedAddressSet, CHANGE_CHAIN, EXTERNAL_CHAIN,
};

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Address version for a Schnorr (x-only) public key.
const VERSION_PUBKEY: u8 = 0;

fn prefix(network: ChainNetwork) -> &'static str {
    match network {
        ChainNetwork::Mainnet => "kaspa",
        ChainNetwork::Testnet => "kaspatest",
    }
}

/// Derive receive and change Kaspa addresses for an extended key.
///
/// The key is always treated as account-level: branch 0 is receive and
/// branch 1 is change.
pub fn derive_kaspa_addresses(
    extended_key: &str,
    network: ChainNetwork,
    counts: AddressCounts,
) -> Result<DerivedAddressSet<String>, DerivationError> {
    let key = parse_extended_key(extended_key)?;
    let secp = Secp256k1::verification_only();

    let receive_root = derive_child(&secp, &key, EXTERNAL_CHAIN as usize).map_err(|e| {
        DerivationError::ChildDerivation {
            what: "receive branch".to_string(),
            reason: e.to_string(),
        }
    })?;
    let change_root = derive_child(&secp, &key, CHANGE_CHAIN as usize).map_err(|e| {
        DerivationError::ChildDerivation {
            what: "change branch".to_string(),
            reason: e.to_string(),
        }
    })?;

    Ok(DerivedAddressSet {
        receive: derive_branch(&secp, &receive_root, counts.receive, network)?,
        change: derive_branch(&secp, &change_root, counts.change, network)?,
    })
}

fn derive_branch<C: Verification>(
    secp: &Secp256k1<C>,
    root: &Xpub,
    count: usize,
    network: ChainNetwork,
) -> Result<Vec<String>, DerivationError> {
    let mut addresses = Vec::with_capacity(count);

    for index in 0..count {
        let child = match derive_child(secp, root, index) {
            Ok(child) => child,
            // The index bound is a property of the request, not of one key.
            Err(e @ DerivationError::IndexOutOfRange(_)) => return Err(e),
            Err(e) => {
                warn!(index, error = %e, "Skipping Kaspa index: derivation failed");
                continue;
            }
        };

        // Compressed SEC1 key; the x-only coordinate follows the parity byte.
        let pubkey = child.public_key.serialize();
        match encode_kaspa_address(network, VERSION_PUBKEY, &pubkey[1..]) {
            Ok(address) => addresses.push(address),
            Err(e) => {
                warn!(index, error = %e, "Skipping Kaspa index: address encoding failed");
            }
        }
    }

    Ok(addresses)
}

/// Encode a Kaspa address: `<prefix>:<base32(version || payload || checksum)>`.
pub fn encode_kaspa_address(
    network: ChainNetwork,
    version: u8,
    payload: &[u8],
) -> Result<String, DerivationError> {
    if payload.is_empty() {
        return Err(DerivationError::Encoding("empty address payload".to_string()));
    }

    let prefix = prefix(network);

    let mut data = Vec::with_capacity(payload.len() + 1);
    data.push(version);
    data.extend_from_slice(payload);
    let data = to_base32(&data);

    let checksum = checksum(prefix, &data);
    let mut out = String::with_capacity(prefix.len() + 1 + data.len() + 8);
    out.push_str(prefix);
    out.push(':');
    for value in data.iter().copied().chain(checksum_digits(checksum)) {
        out.push(CHARSET[value as usize] as char);
    }
    Ok(out)
}

/// Regroup 8-bit bytes into 5-bit values, zero-padding the tail.
fn to_base32(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut acc: u32 = 0;
    let mut bits = 0;

    for &byte in bytes {
        acc = ((acc << 8) | u32::from(byte)) & 0xfff;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(((acc >> bits) & 0x1f) as u8);
        }
    }
    if bits > 0 {
        out.push(((acc << (5 - bits)) & 0x1f) as u8);
    }
    out
}

fn polymod(values: impl Iterator<Item = u8>) -> u64 {
    let mut c: u64 = 1;
    for d in values {
        let c0 = c >> 35;
        c = ((c & 0x07_ffff_ffff) << 5) ^ u64::from(d);
        if c0 & 0x01 != 0 {
            c ^= 0x98_f2bc_8e61;
        }
        if c0 & 0x02 != 0 {
            c ^= 0x79_b76d_99e2;
        }
        if c0 & 0x04 != 0 {
            c ^= 0xf3_3e5f_b3c4;
        }
        if c0 & 0x08 != 0 {
            c ^= 0xae_2eab_e2a8;
        }
        if c0 & 0x10 != 0 {
            c ^= 0x1e_4f43_e470;
        }
    }
    c ^ 1
}

fn checksum(prefix: &str, data: &[u8]) -> u64 {
    polymod(
        prefix
            .bytes()
            .map(|c| c & 0x1f)
            .chain(std::iter::once(0))
            .chain(data.iter().copied())
            .chain([0u8; 8]),
    )
}

fn checksum_digits(checksum: u64) -> impl Iterator<Item = u8> {
    (0..8).map(move |i| ((checksum >> (5 * (7 - i))) & 0x1f) as u8)
}

#[cfg(test)]
mod tests {
    use super::super::test_keys::{account_xpub, with_version};
    use super::*;

    fn kpub() -> String {
        with_version(&account_xpub(), [0x03, 0x8f, 0x33, 0x2e])
    }

    /// Decode the base32 body back to 5-bit values (test helper).
    fn body_values(address: &str) -> (String, Vec<u8>) {
        let (prefix, body) = address.split_once(':').unwrap();
        let values = body
            .bytes()
            .map(|c| CHARSET.iter().position(|&x| x == c).unwrap() as u8)
            .collect();
        (prefix.to_string(), values)
    }

    #[test]
    fn base32_regrouping_pads_tail() {
        assert_eq!(to_base32(&[0xff]), vec![0x1f, 0x1c]);
        assert_eq!(to_base32(&[0x00; 5]), vec![0; 8]);
    }

    #[test]
    fn zero_payload_matches_reference_checksum() {
        let address =
            encode_kaspa_address(ChainNetwork::Mainnet, VERSION_PUBKEY, &[0u8; 32]).unwrap();
        assert_eq!(address, format!("kaspa:{}kx9awp4e", "q".repeat(53)));
    }

    #[test]
    fn address_shape_for_schnorr_pubkey() {
        let address =
            encode_kaspa_address(ChainNetwork::Mainnet, VERSION_PUBKEY, &[0x11; 32]).unwrap();
        let (prefix, values) = body_values(&address);

        assert_eq!(prefix, "kaspa");
        // 33 bytes -> 53 five-bit groups, plus 8 checksum groups.
        assert_eq!(values.len(), 61);
        // Version 0 occupies the first five bits.
        assert_eq!(values[0], 0);
    }

    #[test]
    fn checksum_verifies_and_detects_corruption() {
        let address =
            encode_kaspa_address(ChainNetwork::Testnet, VERSION_PUBKEY, &[0x42; 32]).unwrap();
        let (prefix, values) = body_values(&address);
        assert_eq!(prefix, "kaspatest");

        let (data, check) = values.split_at(values.len() - 8);
        let expected: Vec<u8> = checksum_digits(checksum(&prefix, data)).collect();
        assert_eq!(check, expected.as_slice());

        let mut corrupted = data.to_vec();
        corrupted[5] ^= 1;
        let recomputed: Vec<u8> = checksum_digits(checksum(&prefix, &corrupted)).collect();
        assert_ne!(check, recomputed.as_slice());
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(encode_kaspa_address(ChainNetwork::Mainnet, VERSION_PUBKEY, &[]).is_err());
    }

    #[test]
    fn derives_both_branches() {
        let set = derive_kaspa_addresses(&kpub(), ChainNetwork::Mainnet, AddressCounts::uniform(25))
            .unwrap();

        assert_eq!(set.receive.len(), 25);
        assert_eq!(set.change.len(), 25);
        assert!(set.iter().all(|a| a.starts_with("kaspa:q")));
        assert_ne!(set.receive[0], set.change[0]);
    }

    #[test]
    fn derivation_is_deterministic() {
        let counts = AddressCounts::uniform(5);
        let first = derive_kaspa_addresses(&kpub(), ChainNetwork::Mainnet, counts).unwrap();
        let second = derive_kaspa_addresses(&kpub(), ChainNetwork::Mainnet, counts).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_key_is_rejected() {
        assert!(matches!(
            derive_kaspa_addresses("kpub-nope", ChainNetwork::Mainnet, AddressCounts::uniform(1)),
            Err(DerivationError::InvalidExtendedKey(_))
        ));
    }
}
