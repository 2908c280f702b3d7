// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Watch-only address derivation from extended public keys.
//!
//! This module provides:
//! - Version-agnostic extended public key parsing (xpub, tpub, ltub, kpub, ...)
//! - Bitcoin-family receive/change address derivation (Taproot, P2WPKH)
//! - Kaspa receive/change address derivation (Schnorr, kaspa bech32)
//! - A bounded cache for derived address sets

pub mod kaspa;
pub mod utxo;

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use bitcoin::base58;
use bitcoin::bip32::{ChildNumber, Xpub};
use bitcoin::secp256k1::{Secp256k1, Verification};
use lru::LruCache;

pub use kaspa::{derive_kaspa_addresses, encode_kaspa_address};
pub use utxo::{derive_utxo_addresses, DerivedAddress, UtxoCoin};

/// BIP32 depth of an account-level key (m/purpose'/coin'/account').
pub const ACCOUNT_DEPTH: u8 = 3;

/// BIP32 depth of a chain-level key (m/purpose'/coin'/account'/change).
pub const CHAIN_DEPTH: u8 = 4;

/// Child index of the external (receive) chain.
pub const EXTERNAL_CHAIN: u32 = 0;

/// Child index of the internal (change) chain.
pub const CHANGE_CHAIN: u32 = 1;

/// Serialized length of a BIP32 extended key payload.
const EXTENDED_KEY_LEN: usize = 78;

/// Mainnet xpub version bytes, substituted before decoding so that
/// non-Bitcoin prefixes are accepted.
const XPUB_VERSION: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];

/// Default number of derived addresses per branch for Bitcoin and Litecoin.
pub const DEFAULT_UTXO_ADDRESS_COUNT: usize = 10;

/// Default number of derived addresses per branch for Kaspa.
pub const DEFAULT_KASPA_ADDRESS_COUNT: usize = 1000;

/// Default number of distinct extended keys kept per provider.
pub const DEFAULT_DERIVATION_CACHE_CAPACITY: usize = 1024;

/// Which network an address is encoded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainNetwork {
    Mainnet,
    Testnet,
}

impl ChainNetwork {
    pub fn is_testnet(self) -> bool {
        self == ChainNetwork::Testnet
    }
}

/// Ordered receive and change addresses derived from one extended key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAddressSet<A> {
    pub receive: Vec<A>,
    pub change: Vec<A>,
}

impl<A> DerivedAddressSet<A> {
    /// All addresses, receive branch first.
    pub fn iter(&self) -> impl Iterator<Item = &A> {
        self.receive.iter().chain(self.change.iter())
    }

    pub fn len(&self) -> usize {
        self.receive.len() + self.change.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How many addresses to derive on each branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressCounts {
    pub receive: usize,
    pub change: usize,
}

impl AddressCounts {
    pub const fn uniform(count: usize) -> Self {
        Self {
            receive: count,
            change: count,
        }
    }
}

/// Errors that can occur while deriving addresses.
#[derive(Debug, thiserror::Error)]
pub enum DerivationError {
    #[error("Invalid extended public key: {0}")]
    InvalidExtendedKey(String),

    #[error("Index {0} is out of range for non-hardened derivation")]
    IndexOutOfRange(usize),

    #[error("Failed to derive {what}: {reason}")]
    ChildDerivation { what: String, reason: String },

    #[error("Address encoding failed: {0}")]
    Encoding(String),
}

/// Parse an extended public key regardless of its version prefix.
///
/// Only depth, parent fingerprint, child number, chain code and public key
/// are interpreted; the network implied by the version bytes is ignored.
pub fn parse_extended_key(encoded: &str) -> Result<Xpub, DerivationError> {
    let mut data = base58::decode_check(encoded.trim())
        .map_err(|e| DerivationError::InvalidExtendedKey(e.to_string()))?;

    if data.len() != EXTENDED_KEY_LEN {
        return Err(DerivationError::InvalidExtendedKey(format!(
            "expected {EXTENDED_KEY_LEN} bytes, got {}",
            data.len()
        )));
    }

    data[..4].copy_from_slice(&XPUB_VERSION);
    Xpub::decode(&data).map_err(|e| DerivationError::InvalidExtendedKey(e.to_string()))
}

/// Derive the non-hardened child `index` of `key`.
pub(crate) fn derive_child<C: Verification>(
    secp: &Secp256k1<C>,
    key: &Xpub,
    index: usize,
) -> Result<Xpub, DerivationError> {
    let child = u32::try_from(index)
        .ok()
        .and_then(|i| ChildNumber::from_normal_idx(i).ok())
        .ok_or(DerivationError::IndexOutOfRange(index))?;

    key.ckd_pub(secp, child)
        .map_err(|e| DerivationError::ChildDerivation {
            what: format!("child {index}"),
            reason: e.to_string(),
        })
}

/// Bounded cache of derived address sets, keyed by extended key.
///
/// Derivation is a pure function of the key, so entries never go stale; the
/// LRU bound only caps memory when many distinct keys are queried.
pub struct DerivationCache<V> {
    cache: Mutex<LruCache<String, Arc<V>>>,
}

impl<V> DerivationCache<V> {
    /// Create a cache holding at most `capacity` extended keys.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Return the cached set for `key`, deriving and storing it on a miss.
    ///
    /// Derivation runs without the lock held; concurrent misses for the same
    /// key may both derive, which is harmless because the result is identical.
    pub fn get_or_try_insert<E>(
        &self,
        key: &str,
        derive: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        if let Some(hit) = self.cache.lock().ok().and_then(|mut c| c.get(key).cloned()) {
            return Ok(hit);
        }

        let value = Arc::new(derive()?);
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key.to_string(), Arc::clone(&value));
        }
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
