//! Credit cost calculation.
//!
//! Pure and deterministic: the same mode, table and responses always yield
//! the same charge. Nothing here deducts or stores credits.
//!
//! ## Formula
//! - base = configured cost for the mode (or [`DEFAULT_BASE_COST`])
//! - discount = min(70%, 25% per successful response on a user-owned key)
//! - charge = max(1, floor(base * (1 - discount)))
//!
//! Discounts are applied in whole percent so flooring is exact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Mode, ProviderResponse};

/// Base cost used when a mode has no configured entry.
pub const DEFAULT_BASE_COST: u32 = 5;

/// Discount granted per successful user-owned response, in percent.
pub const USER_OWNED_DISCOUNT_PERCENT: u32 = 25;

/// Upper bound on the total discount, in percent.
pub const MAX_DISCOUNT_PERCENT: u32 = 70;

/// Per-mode base cost in credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostTable {
    costs: BTreeMap<Mode, u32>,
}

impl Default for CostTable {
    fn default() -> Self {
        Self::empty()
            .with_cost(Mode::Fast, 2)
            .with_cost(Mode::Consensus, 10)
            .with_cost(Mode::Creative, 8)
    }
}

impl CostTable {
    /// A table with no configured modes; every mode costs [`DEFAULT_BASE_COST`].
    pub fn empty() -> Self {
        Self {
            costs: BTreeMap::new(),
        }
    }

    pub fn with_cost(mut self, mode: Mode, credits: u32) -> Self {
        self.costs.insert(mode, credits);
        self
    }

    pub fn base_cost(&self, mode: Mode) -> u32 {
        self.costs.get(&mode).copied().unwrap_or(DEFAULT_BASE_COST)
    }
}

/// Discount in percent for a number of successful user-owned responses.
pub fn discount_percent(user_owned_successes: usize) -> u32 {
    let count = u32::try_from(user_owned_successes).unwrap_or(u32::MAX);
    count
        .saturating_mul(USER_OWNED_DISCOUNT_PERCENT)
        .min(MAX_DISCOUNT_PERCENT)
}

/// Credits to charge for a finished run.
pub fn calculate_credits<'a>(
    table: &CostTable,
    mode: Mode,
    responses: impl IntoIterator<Item = &'a ProviderResponse>,
) -> u32 {
    let base = u64::from(table.base_cost(mode));
    let user_owned_successes = responses
        .into_iter()
        .filter(|r| r.is_success() && r.is_user_owned())
        .count();

    let remaining_percent = u64::from(100 - discount_percent(user_owned_successes));
    let discounted = base * remaining_percent / 100;

    u32::try_from(discounted).unwrap_or(u32::MAX).max(1)
}
