// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bitcoin-family address derivation.
//!
//! Bitcoin keys produce single-key Taproot outputs (`bc1p...`); Litecoin keys
//! produce segwit v0 witness-pubkey-hash outputs (`ltc1q...`). Any index that
//! fails to derive aborts the whole set.

use bech32::{segwit, Hrp};
use bitcoin::bip32::Xpub;
use bitcoin::hashes::{hash160, Hash};
use bitcoin::secp256k1::{PublicKey, Secp256k1, Verification};
use bitcoin::{Address, Network, ScriptBuf};
use sha2::{Digest, Sha256};

use super::{
    derive_child, parse_extended_key, AddressCounts, ChainNetwork, DerivationError,
    DerivedAddressSet, ACCOUNT_DEPTH, CHANGE_CHAIN, EXTERNAL_CHAIN,
};

/// Bitcoin-family coins served over Electrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UtxoCoin {
    Bitcoin,
    Litecoin,
}

impl UtxoCoin {
    /// Lowercase chain name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            UtxoCoin::Bitcoin => "bitcoin",
            UtxoCoin::Litecoin => "litecoin",
        }
    }

    /// Encode a derived public key as this coin's receive output.
    fn encode<C: Verification>(
        self,
        secp: &Secp256k1<C>,
        pubkey: &PublicKey,
        network: ChainNetwork,
    ) -> Result<DerivedAddress, DerivationError> {
        match self {
            UtxoCoin::Bitcoin => {
                let network = match network {
                    ChainNetwork::Mainnet => Network::Bitcoin,
                    ChainNetwork::Testnet => Network::Testnet,
                };
                let (internal_key, _parity) = pubkey.x_only_public_key();
                let address = Address::p2tr(secp, internal_key, None, network);
                Ok(DerivedAddress {
                    script_pubkey: address.script_pubkey(),
                    address: address.to_string(),
                })
            }
            UtxoCoin::Litecoin => {
                let hrp = if network.is_testnet() { "tltc" } else { "ltc" };
                let hrp = Hrp::parse(hrp).map_err(|e| DerivationError::Encoding(e.to_string()))?;

                let program = hash160::Hash::hash(&pubkey.serialize());
                let address = segwit::encode(hrp, segwit::VERSION_0, program.as_byte_array())
                    .map_err(|e| DerivationError::Encoding(e.to_string()))?;

                // OP_0 <20-byte program>
                let mut script = Vec::with_capacity(22);
                script.push(0x00);
                script.push(0x14);
                script.extend_from_slice(program.as_byte_array());

                Ok(DerivedAddress {
                    address,
                    script_pubkey: ScriptBuf::from_bytes(script),
                })
            }
        }
    }
}

/// A derived output: its human-readable address and locking script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAddress {
    pub address: String,
    pub script_pubkey: ScriptBuf,
}

impl DerivedAddress {
    /// Electrum scripthash of this output's script.
    pub fn scripthash(&self) -> String {
        scripthash(self.script_pubkey.as_bytes())
    }
}

/// SHA-256 of `script`, byte-reversed and hex encoded.
pub fn scripthash(script: &[u8]) -> String {
    let mut digest: [u8; 32] = Sha256::digest(script).into();
    digest.reverse();
    hex::encode(digest)
}

/// Derive receive and change addresses for a Bitcoin-family extended key.
///
/// An account-level key (depth 3) yields both branches. Any other depth is
/// treated as an already-selected chain: the key itself is the receive root
/// and no change addresses are produced.
pub fn derive_utxo_addresses(
    extended_key: &str,
    coin: UtxoCoin,
    network: ChainNetwork,
    counts: AddressCounts,
) -> Result<DerivedAddressSet<DerivedAddress>, DerivationError> {
    let key = parse_extended_key(extended_key)?;
    let secp = Secp256k1::verification_only();

    let (receive_root, change_root) = if key.depth == ACCOUNT_DEPTH {
        let receive = derive_branch_root(&secp, &key, EXTERNAL_CHAIN, "external chain")?;
        let change = derive_branch_root(&secp, &key, CHANGE_CHAIN, "change chain")?;
        (receive, Some(change))
    } else {
        (key, None)
    };

    let receive = derive_branch(&secp, &receive_root, counts.receive, coin, network)?;
    let change = match change_root {
        Some(root) => derive_branch(&secp, &root, counts.change, coin, network)?,
        None => Vec::new(),
    };

    Ok(DerivedAddressSet { receive, change })
}

fn derive_branch_root<C: Verification>(
    secp: &Secp256k1<C>,
    key: &Xpub,
    branch: u32,
    what: &str,
) -> Result<Xpub, DerivationError> {
    derive_child(secp, key, branch as usize).map_err(|e| DerivationError::ChildDerivation {
        what: what.to_string(),
        reason: e.to_string(),
    })
}

fn derive_branch<C: Verification>(
    secp: &Secp256k1<C>,
    root: &Xpub,
    count: usize,
    coin: UtxoCoin,
    network: ChainNetwork,
) -> Result<Vec<DerivedAddress>, DerivationError> {
    (0..count)
        .map(|index| {
            let child = derive_child(secp, root, index)?;
            coin.encode(secp, &child.public_key, network)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::test_keys::{account_xpub, chain_xpub, with_version};
    use super::*;

    const COUNTS: AddressCounts = AddressCounts::uniform(10);

    #[test]
    fn scripthash_matches_electrum_reference() {
        // P2PKH script of 1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa.
        let script = hex::decode("76a91462e907b15cbf27d5425399ebf6f0fb50ebb88f1888ac").unwrap();
        assert_eq!(
            scripthash(&script),
            "8b01df4e368ea28f8dc0423bcf7a4923e3a12d307c875e47a0cfbf90b5c39161"
        );
    }

    #[test]
    fn taproot_matches_bip86_vectors() {
        // BIP86 account 0 (m/86'/0'/0') of the "abandon ... about" mnemonic.
        let xpub = "xpub6BgBgsespWvERF3LHQu6CnqdvfEvtMcQjYrcRzx53QJjSxarj2afYWcLteoGVky7D3UKDP9QyrLprQ3VCECoY49yfdDEHGCtMMj92pReUsQ";
        let set = derive_utxo_addresses(
            xpub,
            UtxoCoin::Bitcoin,
            ChainNetwork::Mainnet,
            AddressCounts::uniform(2),
        )
        .unwrap();

        assert_eq!(
            set.receive[0].address,
            "bc1p5cyxnuxmeuwuvkwfem96lqzszd02n6xdcjrs20cac6yqjjwudpxqkedrcr"
        );
        assert_eq!(
            set.receive[1].address,
            "bc1p4qhjn9zdvkux4e44uhx8tc55attvtyu358kutcqkudyccelu0was9fqzwh"
        );
        assert_eq!(
            set.change[0].address,
            "bc1p3qkhfews2uk44qtvauqyr2ttdsw7svhkl9nkm9s9c3x4ax5h60wqwruhk7"
        );
    }

    #[test]
    fn litecoin_p2wpkh_matches_reference_vector() {
        // Generator point pubkey; hash160 751e76e8199196d454941c45d1b3a323f1433bd6.
        let pubkey: PublicKey =
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798".parse().unwrap();
        let secp = Secp256k1::verification_only();

        let mainnet = UtxoCoin::Litecoin
            .encode(&secp, &pubkey, ChainNetwork::Mainnet)
            .unwrap();
        assert_eq!(mainnet.address, "ltc1qw508d6qejxtdg4y5r3zarvary0c5xw7kgmn4n9");
        assert_eq!(
            mainnet.scripthash(),
            "9623df75239b5daa7f5f03042d325b51498c4bb7059c7748b17049bf96f73888"
        );

        let testnet = UtxoCoin::Litecoin
            .encode(&secp, &pubkey, ChainNetwork::Testnet)
            .unwrap();
        assert_eq!(testnet.address, "tltc1qw508d6qejxtdg4y5r3zarvary0c5xw7klfsuq0");
        assert_eq!(testnet.script_pubkey, mainnet.script_pubkey);
    }

    #[test]
    fn derivation_is_deterministic() {
        let xpub = account_xpub().to_string();
        let first =
            derive_utxo_addresses(&xpub, UtxoCoin::Bitcoin, ChainNetwork::Mainnet, COUNTS).unwrap();
        let second =
            derive_utxo_addresses(&xpub, UtxoCoin::Bitcoin, ChainNetwork::Mainnet, COUNTS).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn account_key_yields_both_branches() {
        let xpub = account_xpub().to_string();
        let set =
            derive_utxo_addresses(&xpub, UtxoCoin::Bitcoin, ChainNetwork::Mainnet, COUNTS).unwrap();

        assert_eq!(set.receive.len(), 10);
        assert_eq!(set.change.len(), 10);
        assert_eq!(set.len(), 20);
        assert_ne!(set.receive[0], set.change[0]);
        assert!(set.iter().all(|a| a.address.starts_with("bc1p")));
    }

    #[test]
    fn chain_key_yields_receive_only() {
        let xpub = chain_xpub().to_string();
        let set =
            derive_utxo_addresses(&xpub, UtxoCoin::Bitcoin, ChainNetwork::Mainnet, COUNTS).unwrap();

        assert_eq!(set.receive.len(), 10);
        assert!(set.change.is_empty());
    }

    #[test]
    fn chain_key_matches_account_external_branch() {
        let from_account = derive_utxo_addresses(
            &account_xpub().to_string(),
            UtxoCoin::Bitcoin,
            ChainNetwork::Mainnet,
            COUNTS,
        )
        .unwrap();
        let from_chain = derive_utxo_addresses(
            &chain_xpub().to_string(),
            UtxoCoin::Bitcoin,
            ChainNetwork::Mainnet,
            COUNTS,
        )
        .unwrap();

        assert_eq!(from_account.receive, from_chain.receive);
    }

    #[test]
    fn taproot_scripts_are_segwit_v1() {
        let set = derive_utxo_addresses(
            &account_xpub().to_string(),
            UtxoCoin::Bitcoin,
            ChainNetwork::Testnet,
            AddressCounts::uniform(2),
        )
        .unwrap();

        for addr in set.iter() {
            assert!(addr.address.starts_with("tb1p"));
            let script = addr.script_pubkey.as_bytes();
            assert_eq!(script.len(), 34);
            assert_eq!(script[0], 0x51);
            assert_eq!(script[1], 0x20);
        }
    }

    #[test]
    fn litecoin_uses_p2wpkh_with_litecoin_prefix() {
        let ltub = with_version(&account_xpub(), [0x01, 0x9d, 0xa4, 0x62]);
        let mainnet =
            derive_utxo_addresses(&ltub, UtxoCoin::Litecoin, ChainNetwork::Mainnet, COUNTS)
                .unwrap();
        let testnet =
            derive_utxo_addresses(&ltub, UtxoCoin::Litecoin, ChainNetwork::Testnet, COUNTS)
                .unwrap();

        assert!(mainnet.iter().all(|a| a.address.starts_with("ltc1q")));
        assert!(testnet.iter().all(|a| a.address.starts_with("tltc1q")));

        let script = mainnet.receive[0].script_pubkey.as_bytes();
        assert_eq!(script.len(), 22);
        assert_eq!(&script[..2], &[0x00, 0x14]);

        // The network only changes the human-readable prefix.
        assert_eq!(mainnet.receive[0].scripthash(), testnet.receive[0].scripthash());
    }

    #[test]
    fn zero_counts_yield_empty_set() {
        let set = derive_utxo_addresses(
            &account_xpub().to_string(),
            UtxoCoin::Bitcoin,
            ChainNetwork::Mainnet,
            AddressCounts::uniform(0),
        )
        .unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn invalid_key_is_rejected() {
        let err =
            derive_utxo_addresses("xpub-nope", UtxoCoin::Bitcoin, ChainNetwork::Mainnet, COUNTS)
                .unwrap_err();
        assert!(matches!(err, DerivationError::InvalidExtendedKey(_)));
    }
}
