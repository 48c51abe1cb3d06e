use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::error::ConfigError;
use crate::types::Gold;

/// Tunable constants of the economy. Every field has a default, so a partial
/// JSON object overrides only what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(default, rename_all = "camelCase")]
pub struct EconomyConfig {
    pub starting_gold: Gold,

    // Travel
    pub travel_cost: Gold,
    /// Milliseconds per 1% of travel progress.
    pub travel_step_ms: u64,
    pub bandit_chance: f64,
    /// Fraction of current gold bandits take.
    pub bandit_loss: f64,
    pub oasis_chance: f64,
    pub oasis_bonus: Gold,

    // Market
    pub market_event_chance: f64,
    pub haggle_success_chance: f64,
    pub haggle_discount: f64,
    pub haggle_penalty: f64,

    // Quests
    pub quest_chance: f64,
    pub max_available_quests: usize,
    pub quest_min_quantity: u32,
    pub quest_max_quantity: u32,
    pub quest_reward_per_unit: Gold,
    pub quest_reward_base: Gold,

    // Personal stall
    pub stall_slots: usize,
    pub stall_tick_ms: u64,
    /// Highest asking price bots accept, as a multiple of the fair price.
    pub stall_markup_limit: f64,
    pub stall_sale_chance: f64,

    // Bazaar
    pub bazaar_min_stalls: usize,
    pub bazaar_max_stalls: usize,
    pub bazaar_min_offers: usize,
    pub bazaar_max_offers: usize,
    pub bazaar_min_markup: f64,
    pub bazaar_max_markup: f64,

    // Negotiation
    pub trade_request_delay_ms: u64,
    pub negotiation_timeout_ms: u64,
    /// How often the counterpart gets a turn.
    pub negotiation_poll_ms: u64,
    pub partner_balance: Gold,

    // Victory
    pub win_gold: Gold,
    pub win_quests: u32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_gold: 1250,
            travel_cost: 50,
            travel_step_ms: 50,
            bandit_chance: 0.3,
            bandit_loss: 0.1,
            oasis_chance: 0.2,
            oasis_bonus: 75,
            market_event_chance: 0.6,
            haggle_success_chance: 0.4,
            haggle_discount: 0.8,
            haggle_penalty: 1.1,
            quest_chance: 0.5,
            max_available_quests: 3,
            quest_min_quantity: 3,
            quest_max_quantity: 7,
            quest_reward_per_unit: 400,
            quest_reward_base: 1000,
            stall_slots: 4,
            stall_tick_ms: 8000,
            stall_markup_limit: 1.25,
            stall_sale_chance: 0.5,
            bazaar_min_stalls: 5,
            bazaar_max_stalls: 8,
            bazaar_min_offers: 2,
            bazaar_max_offers: 3,
            bazaar_min_markup: 0.9,
            bazaar_max_markup: 1.5,
            trade_request_delay_ms: 10_000,
            negotiation_timeout_ms: 60_000,
            negotiation_poll_ms: 250,
            partner_balance: 5000,
            win_gold: 100_000,
            win_quests: 5,
        }
    }
}

impl EconomyConfig {
    /// Parse a (possibly partial) JSON object and validate it.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str::<Self>(raw)?.validated()
    }

    /// Reject ranges the random draws cannot sample from and chances
    /// outside `[0, 1]`.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let inclusive = [
            (
                "questMinQuantity",
                "questMaxQuantity",
                self.quest_min_quantity as usize,
                self.quest_max_quantity as usize,
            ),
            (
                "bazaarMinStalls",
                "bazaarMaxStalls",
                self.bazaar_min_stalls,
                self.bazaar_max_stalls,
            ),
            (
                "bazaarMinOffers",
                "bazaarMaxOffers",
                self.bazaar_min_offers,
                self.bazaar_max_offers,
            ),
        ];
        for (low, high, min, max) in inclusive {
            if min > max {
                return Err(ConfigError::InvertedRange { low, high });
            }
        }
        let finite = self.bazaar_min_markup.is_finite() && self.bazaar_max_markup.is_finite();
        if !finite || self.bazaar_min_markup.partial_cmp(&self.bazaar_max_markup) != Some(Ordering::Less) {
            return Err(ConfigError::EmptyRange {
                low: "bazaarMinMarkup",
                high: "bazaarMaxMarkup",
            });
        }

        let chances = [
            ("banditChance", self.bandit_chance),
            ("banditLoss", self.bandit_loss),
            ("oasisChance", self.oasis_chance),
            ("marketEventChance", self.market_event_chance),
            ("haggleSuccessChance", self.haggle_success_chance),
            ("questChance", self.quest_chance),
            ("stallSaleChance", self.stall_sale_chance),
        ];
        for (name, chance) in chances {
            if !(0.0..=1.0).contains(&chance) {
                return Err(ConfigError::NotAProbability(name));
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EconomyConfig::from_json(r#"{"travelCost": 80, "stallSlots": 6}"#).unwrap();
        assert_eq!(config.travel_cost, 80);
        assert_eq!(config.stall_slots, 6);
        assert_eq!(config.starting_gold, 1250);
        assert_eq!(config.quest_reward_base, 1000);
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            EconomyConfig::from_json("{travelCost: }"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(EconomyConfig::default().validated().is_ok());
    }

    #[test]
    fn test_flat_markup_range_rejected() {
        let err = EconomyConfig::from_json(r#"{"bazaarMinMarkup": 1.0, "bazaarMaxMarkup": 1.0}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::EmptyRange {
                low: "bazaarMinMarkup",
                ..
            }
        ));

        let unbounded = EconomyConfig {
            bazaar_max_markup: f64::INFINITY,
            ..EconomyConfig::default()
        };
        assert!(matches!(unbounded.validated(), Err(ConfigError::EmptyRange { .. })));
    }

    #[test]
    fn test_inverted_ranges_rejected() {
        for raw in [
            r#"{"questMinQuantity": 8, "questMaxQuantity": 7}"#,
            r#"{"bazaarMinStalls": 9}"#,
            r#"{"bazaarMinOffers": 4, "bazaarMaxOffers": 1}"#,
        ] {
            assert!(
                matches!(
                    EconomyConfig::from_json(raw),
                    Err(ConfigError::InvertedRange { .. })
                ),
                "{raw}"
            );
        }
        // A single-value inclusive range is fine.
        assert!(EconomyConfig::from_json(r#"{"bazaarMinStalls": 8, "questMinQuantity": 7}"#).is_ok());
    }

    #[test]
    fn test_chance_outside_unit_interval_rejected() {
        let config = EconomyConfig {
            bandit_chance: 1.5,
            ..EconomyConfig::default()
        };
        assert_eq!(
            config.validated().unwrap_err().to_string(),
            "banditChance must be between 0 and 1"
        );
    }
}
