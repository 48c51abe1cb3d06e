use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use tsify_next::Tsify;

// ============================================================================
// IDs
// ============================================================================

new_key_type! {
    /// A single priced offer on a bazaar stall. Regenerating the bazaar
    /// removes every offer, so keys held across a travel go stale.
    pub struct OfferId;
}

/// Trait for converting SlotMap keys to u64 for WASM boundary
pub trait KeyToU64 {
    fn to_u64(self) -> u64;
}

impl KeyToU64 for OfferId {
    fn to_u64(self) -> u64 {
        self.0.as_ffi()
    }
}

impl OfferId {
    pub fn from_u64(raw: u64) -> Self {
        OfferId::from(slotmap::KeyData::from_ffi(raw))
    }
}

/// Catalog identity of an item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct ItemId(pub u32);

/// Identity of one owned item (unique across the save).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct InstanceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct QuestId(pub u64);

pub type Gold = u64;

// ============================================================================
// Cities
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum CityId {
    #[serde(rename = "Chang'an")]
    Changan,
    #[default]
    Samarkand,
    Constantinople,
}

impl CityId {
    /// Returns an iterator over all cities
    pub fn all() -> impl Iterator<Item = CityId> {
        [CityId::Changan, CityId::Samarkand, CityId::Constantinople].into_iter()
    }

    pub fn name(self) -> &'static str {
        match self {
            CityId::Changan => "Chang'an",
            CityId::Samarkand => "Samarkand",
            CityId::Constantinople => "Constantinople",
        }
    }

    /// Accepts the display name or the lowercase key the map screen uses.
    pub fn parse(raw: &str) -> Option<CityId> {
        CityId::all().find(|c| {
            c.name().eq_ignore_ascii_case(raw) || c.key().eq_ignore_ascii_case(raw)
        })
    }

    pub fn key(self) -> &'static str {
        match self {
            CityId::Changan => "changan",
            CityId::Samarkand => "samarkand",
            CityId::Constantinople => "constantinople",
        }
    }
}

impl std::fmt::Display for CityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Item Category
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum ItemCategory {
    Material,
    #[serde(rename = "Trade Good")]
    TradeGood,
    Weapon,
}

// ============================================================================
// Notification Severity
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Error,
    Gain,
}
