//! Pricing model.
//!
//! `floor(base * city * events * haggle)`, evaluated left to right. Pure: the
//! same inputs always produce the same price.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::catalog::{Item, MarketEvent, city_multiplier};
use crate::config::EconomyConfig;
use crate::error::Rejection;
use crate::types::{CityId, Gold, ItemId};

/// Outcome of the single haggle attempt allowed per item per city visit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct HaggleStatus {
    pub multiplier: f64,
    pub attempted: bool,
}

/// Haggle results for the current city visit. Cleared on every arrival.
#[derive(Debug, Clone, Default)]
pub struct HaggleBook {
    entries: HashMap<ItemId, HaggleStatus>,
}

impl HaggleBook {
    pub fn multiplier(&self, item: ItemId) -> f64 {
        self.entries.get(&item).map(|s| s.multiplier).unwrap_or(1.0)
    }

    pub fn attempted(&self, item: ItemId) -> bool {
        self.entries.get(&item).is_some_and(|s| s.attempted)
    }

    pub fn status(&self, item: ItemId) -> Option<HaggleStatus> {
        self.entries.get(&item).copied()
    }

    /// Roll the one haggle attempt for `item`. Returns whether it succeeded.
    pub fn attempt<R: Rng>(
        &mut self,
        rng: &mut R,
        item: ItemId,
        config: &EconomyConfig,
    ) -> Result<bool, Rejection> {
        if self.attempted(item) {
            return Err(Rejection::AlreadyHaggled);
        }
        let success = rng.random::<f64>() < config.haggle_success_chance;
        let multiplier = if success {
            config.haggle_discount
        } else {
            config.haggle_penalty
        };
        self.entries.insert(
            item,
            HaggleStatus {
                multiplier,
                attempted: true,
            },
        );
        Ok(success)
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub(crate) fn set(&mut self, item: ItemId, multiplier: f64) {
        self.entries.insert(
            item,
            HaggleStatus {
                multiplier,
                attempted: true,
            },
        );
    }
}

/// Product of every active event's multiplier for `item`.
pub fn event_multiplier(events: &[MarketEvent], item: ItemId) -> f64 {
    events.iter().fold(1.0, |acc, e| acc * e.multiplier_for(item))
}

/// Current price of `item` in `city`.
pub fn price(item: &Item, city: CityId, events: &[MarketEvent], haggle: &HaggleBook) -> Gold {
    let raw = item.base_price as f64
        * city_multiplier(city, item.id)
        * event_multiplier(events, item.id)
        * haggle.multiplier(item.id);
    raw.floor().max(0.0) as Gold
}
