use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::catalog::{CaravanTier, Item, MarketEvent};
use crate::inventory::ItemInstance;
use crate::negotiation::{SessionState, TradeSide};
use crate::notify::{LogEntry, Notification};
use crate::pricing::HaggleStatus;
use crate::quests::Quest;
use crate::stall::StallListing;
use crate::travel::{Arrival, TravelState};
use crate::types::{CityId, Gold};

// ============================================================================
// Snapshot Types (for rendering)
// ============================================================================

#[derive(Serialize, Deserialize, Tsify, Clone, Debug, PartialEq)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct EconomySnapshot {
    pub now_ms: u64,
    pub gold: Gold,
    /// Gold not held back by a locked trade offer.
    pub spendable_gold: Gold,
    pub escrow: Gold,
    pub city: CitySnapshot,
    pub caravan: CaravanSnapshot,
    /// Always `MAX_SLOTS` long; slots at or past `caravan.capacity` are locked.
    pub inventory: Vec<Option<ItemInstance>>,
    pub market: Vec<MarketPriceSnapshot>,
    pub events: Vec<MarketEvent>,
    pub travel: TravelSnapshot,
    pub stall: Vec<Option<StallListing>>,
    pub bazaar: Vec<BazaarStallSnapshot>,
    pub quests: QuestSnapshot,
    pub trade_request: Option<String>,
    pub negotiation: Option<NegotiationSnapshot>,
    pub log: Vec<LogEntry>,
    pub progress: WinProgress,
}

#[derive(Serialize, Deserialize, Tsify, Clone, Debug, PartialEq)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct CitySnapshot {
    pub id: CityId,
    pub name: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, Tsify, Clone, Debug, PartialEq)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct CaravanSnapshot {
    pub level: u32,
    pub name: String,
    pub capacity: usize,
    pub used: usize,
    pub next_tier: Option<CaravanTier>,
}

#[derive(Serialize, Deserialize, Tsify, Clone, Debug, PartialEq)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct MarketPriceSnapshot {
    pub item: Item,
    pub price: Gold,
    pub haggle: Option<HaggleStatus>,
}

#[derive(Serialize, Deserialize, Tsify, Clone, Debug, PartialEq)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct TravelSnapshot {
    pub state: TravelState,
    pub flavor: Option<String>,
}

#[derive(Serialize, Deserialize, Tsify, Clone, Debug, PartialEq)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct BazaarStallSnapshot {
    pub id: u64,
    pub name: String,
    pub title: String,
    pub offers: Vec<BazaarOfferSnapshot>,
}

#[derive(Serialize, Deserialize, Tsify, Clone, Debug, PartialEq)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct BazaarOfferSnapshot {
    /// `OfferId` as u64; pass back to buy or bid.
    pub id: u64,
    pub item: Item,
    pub price: Gold,
}

#[derive(Serialize, Deserialize, Tsify, Clone, Debug, PartialEq)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct QuestSnapshot {
    pub available: Vec<Quest>,
    pub active: Option<Quest>,
    pub completed: u32,
}

#[derive(Serialize, Deserialize, Tsify, Clone, Debug, PartialEq)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationSnapshot {
    pub id: u64,
    pub partner: String,
    pub state: SessionState,
    pub me: TradeSide,
    pub them: TradeSide,
    pub elapsed_ms: u64,
}

/// Distance to the victory goals.
#[derive(Serialize, Deserialize, Tsify, Clone, Debug, PartialEq)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct WinProgress {
    pub level: u32,
    pub level_goal: u32,
    pub gold: Gold,
    pub gold_goal: Gold,
    pub quests: u32,
    pub quests_goal: u32,
    pub won: bool,
}

/// What every facade call hands back: the new state and what to tell the
/// player about it.
#[derive(Serialize, Deserialize, Tsify, Clone, Debug, PartialEq)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct Outcome {
    pub state: EconomySnapshot,
    pub notifications: Vec<Notification>,
    /// Set on the call during which the caravan reached a city.
    pub arrival: Option<Arrival>,
}
