// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::aggregator::BalanceProvider;

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn BalanceProvider>,
}

impl AppState {
    pub fn new(provider: Arc<dyn BalanceProvider>) -> Self {
        Self { provider }
    }
}
