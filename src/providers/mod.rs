// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External pricing providers.

pub mod cmc;

pub use cmc::{CmcRateClient, Rate, RateError, RateSource};
