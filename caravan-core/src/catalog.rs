//! Static game data: items, city price tables, market events, caravan tiers
//! and the names simulated traders go by.

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::types::{CityId, Gold, ItemCategory, ItemId};

// ============================================================================
// Items
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub category: ItemCategory,
    pub base_price: Gold,
    pub icon: Option<String>,
}

pub const RAW_SILK: ItemId = ItemId(101);
pub const EXOTIC_SPICES: ItemId = ItemId(102);
pub const CERAMICS: ItemId = ItemId(103);
pub const RARE_SWORD: ItemId = ItemId(201);

struct ItemDef {
    id: ItemId,
    name: &'static str,
    category: ItemCategory,
    base_price: Gold,
    icon: &'static str,
}

const ITEMS: [ItemDef; 4] = [
    ItemDef {
        id: RAW_SILK,
        name: "Raw Silk",
        category: ItemCategory::Material,
        base_price: 150,
        icon: "🕸️",
    },
    ItemDef {
        id: EXOTIC_SPICES,
        name: "Exotic Spices",
        category: ItemCategory::TradeGood,
        base_price: 350,
        icon: "🌶️",
    },
    ItemDef {
        id: CERAMICS,
        name: "Ceramics",
        category: ItemCategory::TradeGood,
        base_price: 800,
        icon: "🏺",
    },
    // Only ever handed over by a negotiation counterpart.
    ItemDef {
        id: RARE_SWORD,
        name: "Rare Sword",
        category: ItemCategory::Weapon,
        base_price: 1000,
        icon: "⚔️",
    },
];

impl ItemDef {
    fn build(&self) -> Item {
        Item {
            id: self.id,
            name: self.name.to_string(),
            category: self.category,
            base_price: self.base_price,
            icon: Some(self.icon.to_string()),
        }
    }
}

/// Look up an item by id.
pub fn item(id: ItemId) -> Option<Item> {
    ITEMS.iter().find(|d| d.id == id).map(ItemDef::build)
}

/// Goods sold in city markets and bazaars and requested by quests.
pub fn trade_goods() -> Vec<Item> {
    ITEMS
        .iter()
        .filter(|d| d.category != ItemCategory::Weapon)
        .map(ItemDef::build)
        .collect()
}

// ============================================================================
// Cities
// ============================================================================

/// Per-item base multiplier for a city. Unlisted items trade at 1.0.
pub fn city_multiplier(city: CityId, item: ItemId) -> f64 {
    let table: &[(ItemId, f64)] = match city {
        CityId::Changan => &[(RAW_SILK, 0.5), (EXOTIC_SPICES, 1.2), (CERAMICS, 0.8)],
        CityId::Samarkand => &[(RAW_SILK, 1.0), (EXOTIC_SPICES, 1.0), (CERAMICS, 1.0)],
        CityId::Constantinople => &[(RAW_SILK, 4.0), (EXOTIC_SPICES, 0.7), (CERAMICS, 1.5)],
    };
    table
        .iter()
        .find(|(id, _)| *id == item)
        .map(|(_, m)| *m)
        .unwrap_or(1.0)
}

pub fn city_description(city: CityId) -> &'static str {
    match city {
        CityId::Changan => "The eastern capital. Silk is cheap, spices are dear.",
        CityId::Samarkand => "Crossroads of the Silk Road. Fair prices for all.",
        CityId::Constantinople => "Gateway to the west, where silk sells for a fortune.",
    }
}

// ============================================================================
// Market Events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "lowercase")]
pub enum MarketEventKind {
    Shortage,
    Surplus,
    Festival,
    War,
    Blockade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct MarketEvent {
    pub kind: MarketEventKind,
    pub text: String,
    pub multipliers: Vec<(ItemId, f64)>,
}

impl MarketEvent {
    /// Multiplier this event applies to `item` (1.0 when it has no entry).
    pub fn multiplier_for(&self, item: ItemId) -> f64 {
        self.multipliers
            .iter()
            .find(|(id, _)| *id == item)
            .map(|(_, m)| *m)
            .unwrap_or(1.0)
    }
}

pub fn market_events() -> Vec<MarketEvent> {
    let event = |kind, text: &str, multipliers: &[(ItemId, f64)]| MarketEvent {
        kind,
        text: text.to_string(),
        multipliers: multipliers.to_vec(),
    };
    vec![
        event(
            MarketEventKind::Shortage,
            "Silk Shortage in the West! Silk prices up.",
            &[(RAW_SILK, 2.0)],
        ),
        event(
            MarketEventKind::Surplus,
            "Bountiful Spices harvest nearby. Prices low.",
            &[(EXOTIC_SPICES, 0.5)],
        ),
        event(
            MarketEventKind::Festival,
            "Ceramics festival in town!",
            &[(CERAMICS, 1.5)],
        ),
        event(
            MarketEventKind::War,
            "War brewing! Weapons and supplies needed.",
            &[(RAW_SILK, 1.2), (CERAMICS, 1.2)],
        ),
        event(
            MarketEventKind::Blockade,
            "Bandits block trade routes. Spices scarce.",
            &[(EXOTIC_SPICES, 1.5)],
        ),
    ]
}

// ============================================================================
// Caravan Tiers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct CaravanTier {
    pub level: u32,
    pub name: String,
    pub cost: Gold,
    pub slots: usize,
    pub description: String,
    pub icon: String,
}

pub const MAX_CARAVAN_LEVEL: u32 = 4;

/// Slot count of the largest caravan; inventories are always this long.
pub const MAX_SLOTS: usize = 50;

pub fn caravan_tiers() -> Vec<CaravanTier> {
    let tier = |level, name: &str, cost, slots, description: &str, icon: &str| CaravanTier {
        level,
        name: name.to_string(),
        cost,
        slots,
        description: description.to_string(),
        icon: icon.to_string(),
    };
    vec![
        tier(1, "Donkey", 0, 10, "A stubborn but loyal beast.", "/donkey.png"),
        tier(2, "Camel", 2000, 20, "Built for the long desert crossings.", "/camel_icon.png"),
        tier(3, "Wagon", 10000, 30, "A covered wagon with room to spare.", "/wagon_icon.png"),
        tier(4, "Elephant", 50000, MAX_SLOTS, "The caravan of kings.", "/elephant_icon.png"),
    ]
}

pub fn caravan_tier(level: u32) -> Option<CaravanTier> {
    caravan_tiers().into_iter().find(|t| t.level == level)
}

// ============================================================================
// Simulated traders
// ============================================================================

pub const BAZAAR_NAMES: [&str; 8] = [
    "ShadowWolf",
    "GoldDigger",
    "SilkMaster",
    "SultanTrade",
    "NomadKing",
    "SilentDagger",
    "CaravanQueen",
    "OldMerchant",
];

pub const BAZAAR_TITLES: [&str; 6] = [
    "Best Prices!",
    "Rare Finds",
    "Quick Sale",
    "AFK / Buying Gold",
    "Discounted Spices",
    "High Quality Silk",
];

pub const STALL_BUYERS: [&str; 4] = ["DragonSlayer", "TraderJoe", "MysticNomad", "BladeMaster"];

pub const TRADE_PARTNER: &str = "ShadowHunter";

pub const TRAVEL_FLAVOR: [&str; 5] = [
    "Crossing the endless dunes...",
    "Fording a swollen river...",
    "Resting at a hidden oasis...",
    "Passing a nomad encampment...",
    "The city walls rise on the horizon...",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_goods_exclude_weapons() {
        let goods = trade_goods();
        assert_eq!(goods.len(), 3);
        assert!(goods.iter().all(|g| g.category != ItemCategory::Weapon));
        assert!(item(RARE_SWORD).is_some());
    }

    #[test]
    fn test_city_multiplier_defaults_to_one() {
        assert_eq!(city_multiplier(CityId::Constantinople, RAW_SILK), 4.0);
        assert_eq!(city_multiplier(CityId::Changan, RARE_SWORD), 1.0);
    }

    #[test]
    fn test_tiers_are_ordered_and_grow() {
        let tiers = caravan_tiers();
        for pair in tiers.windows(2) {
            assert_eq!(pair[1].level, pair[0].level + 1);
            assert!(pair[1].cost > pair[0].cost);
            assert!(pair[1].slots > pair[0].slots);
        }
        assert_eq!(tiers.last().map(|t| t.slots), Some(MAX_SLOTS));
    }
}
