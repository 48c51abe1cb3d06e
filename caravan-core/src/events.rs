use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::catalog::{self, MarketEvent};
use crate::config::EconomyConfig;
use crate::pricing::HaggleBook;
use crate::types::Gold;

// ============================================================================
// Market conditions for the current city visit
// ============================================================================

/// Active market events and haggle results. Both live until the next arrival.
#[derive(Debug, Clone, Default)]
pub struct MarketConditions {
    pub events: Vec<MarketEvent>,
    pub haggle: HaggleBook,
}

impl MarketConditions {
    /// Roll this visit's market: clears haggling and replaces the event (at
    /// most one is ever active).
    pub fn regenerate<R: Rng>(&mut self, rng: &mut R, config: &EconomyConfig) {
        self.haggle.reset();
        self.events.clear();
        self.events.extend(roll_market_event(rng, config));
    }
}

/// Pick zero or one event from the catalog.
pub fn roll_market_event<R: Rng>(rng: &mut R, config: &EconomyConfig) -> Option<MarketEvent> {
    if rng.random::<f64>() >= config.market_event_chance {
        return None;
    }
    catalog::market_events().choose(rng).cloned()
}

// ============================================================================
// Arrival roll
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArrivalOutcome {
    Bandits { loss: Gold },
    Oasis { bonus: Gold },
    Safe,
}

/// What happens on the road just before entering the city.
pub fn roll_arrival<R: Rng>(rng: &mut R, gold: Gold, config: &EconomyConfig) -> ArrivalOutcome {
    let roll = rng.random::<f64>();
    if roll < config.bandit_chance {
        let loss = (gold as f64 * config.bandit_loss).floor() as Gold;
        ArrivalOutcome::Bandits {
            loss: loss.min(gold),
        }
    } else if roll < config.bandit_chance + config.oasis_chance {
        ArrivalOutcome::Oasis {
            bonus: config.oasis_bonus,
        }
    } else {
        ArrivalOutcome::Safe
    }
}
