// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Airgap Balance Server - Watch-only Multi-chain Balance Oracle
//!
//! Resolves the balance of an address or extended public key on Bitcoin,
//! Litecoin, Ethereum, Solana or Kaspa and prices it in a fiat currency.
//! Private keys never enter the process.
//!
//! ## Modules
//!
//! - `aggregator` - Balance + rate composition, concurrent batches
//! - `api` - HTTP API handlers (Axum)
//! - `cache` - TTL cache with background sweeper
//! - `chains` - Per-chain balance providers with retry and reconnect
//! - `derivation` - HD address derivation from extended public keys
//! - `providers` - Exchange-rate service client

pub mod aggregator;
pub mod api;
pub mod cache;
pub mod chains;
pub mod config;
pub mod derivation;
pub mod error;
pub mod models;
pub mod providers;
pub mod state;
