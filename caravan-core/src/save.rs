//! Save blob and where it goes.
//!
//! The blob is a JSON object with camelCase keys. Anything missing falls back
//! to a fresh game; anything out of range is pulled back into range on load.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::catalog::{self, MAX_CARAVAN_LEVEL, MAX_SLOTS};
use crate::inventory::ItemInstance;
use crate::quests::Quest;
use crate::stall::StallListing;
use crate::types::{CityId, Gold};

/// Key the browser build stores the blob under.
pub const SAVE_KEY: &str = "silkroad_save";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaveState {
    pub gold: Gold,
    /// Kept as text so an unknown city degrades to the start city instead of
    /// failing the whole load.
    pub current_city: String,
    pub caravan_level: u32,
    pub max_inventory: usize,
    #[serde(deserialize_with = "lenient_slots")]
    pub inventory: Vec<Option<ItemInstance>>,
    pub active_quest: Option<Quest>,
    pub completed_quests: u32,
    pub available_quests: Vec<Quest>,
    #[serde(deserialize_with = "lenient_slots")]
    pub stall: Vec<Option<StallListing>>,
}

/// Decode slots one at a time; an unreadable entry empties its slot instead
/// of failing the whole save.
fn lenient_slots<'de, D, T>(deserializer: D) -> Result<Vec<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Vec::<Option<Value>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|slot| slot.and_then(decode_slot))
        .collect())
}

fn decode_slot<T: DeserializeOwned>(mut value: Value) -> Option<T> {
    whole_numbers(&mut value);
    if let Some(item) = value.get_mut("item") {
        whole_numbers(item);
    }
    match serde_json::from_value(value) {
        Ok(slot) => Some(slot),
        Err(err) => {
            tracing::warn!(target: "save", error = %err, "unreadable slot dropped");
            None
        }
    }
}

/// Older saves stamp items with fractional ids and prices.
fn whole_numbers(value: &mut Value) {
    let Some(object) = value.as_object_mut() else {
        return;
    };
    for key in ["instanceId", "uniqueId", "boughtAt", "price"] {
        let Some(field) = object.get_mut(key) else {
            continue;
        };
        if field.is_u64() {
            continue;
        }
        if let Some(number) = field.as_f64().filter(|n| n.is_finite() && *n >= 0.0) {
            *field = Value::from(number.floor() as u64);
        }
    }
}

impl Default for SaveState {
    fn default() -> Self {
        Self::fresh(1250)
    }
}

impl SaveState {
    pub fn fresh(starting_gold: Gold) -> Self {
        Self {
            gold: starting_gold,
            current_city: CityId::default().name().to_string(),
            caravan_level: 1,
            max_inventory: catalog::caravan_tier(1).map(|t| t.slots).unwrap_or(10),
            inventory: vec![None; MAX_SLOTS],
            active_quest: None,
            completed_quests: 0,
            available_quests: Vec::new(),
            stall: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a stored blob. `None` or unreadable input gives a fresh game;
    /// the parse error is logged.
    pub fn load(raw: Option<&str>, starting_gold: Gold) -> SaveState {
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return SaveState::fresh(starting_gold);
        };
        match serde_json::from_str::<SaveState>(raw) {
            Ok(state) => state.normalized(),
            Err(err) => {
                tracing::warn!(target: "save", error = %err, "corrupt save, starting fresh");
                SaveState::fresh(starting_gold)
            }
        }
    }

    /// Pull loaded values back into range.
    pub fn normalized(mut self) -> SaveState {
        let city = CityId::parse(&self.current_city).unwrap_or_else(|| {
            tracing::warn!(target: "save", city = %self.current_city, "unknown city in save");
            CityId::default()
        });
        self.current_city = city.name().to_string();
        self.caravan_level = self.caravan_level.clamp(1, MAX_CARAVAN_LEVEL);
        self.max_inventory = catalog::caravan_tier(self.caravan_level)
            .map(|t| t.slots)
            .unwrap_or(self.max_inventory)
            .min(MAX_SLOTS);
        self.inventory.resize(MAX_SLOTS, None);
        self
    }

    pub fn city(&self) -> CityId {
        CityId::parse(&self.current_city).unwrap_or_default()
    }
}

/// Where save blobs live.
pub trait SaveStore {
    fn load(&self) -> Option<String>;
    fn save(&mut self, blob: &str);
}

/// Keeps the latest blob in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blob: Option<String>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Some(blob.into()),
            writes: 0,
        }
    }

    pub fn blob(&self) -> Option<&str> {
        self.blob.as_deref()
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl SaveStore for MemoryStore {
    fn load(&self) -> Option<String> {
        self.blob.clone()
    }

    fn save(&mut self, blob: &str) {
        self.blob = Some(blob.to_string());
        self.writes += 1;
    }
}
