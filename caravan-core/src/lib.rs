use rand::SeedableRng;
use rand::rngs::StdRng;
use wasm_bindgen::prelude::*;

pub mod bazaar;
pub mod catalog;
mod config;
mod economy;
mod error;
pub mod events;
pub mod inventory;
pub mod negotiation;
mod notify;
pub mod pricing;
pub mod quests;
pub mod save;
mod snapshot;
pub mod stall;
pub mod timers;
pub mod travel;
mod types;

pub use config::*;
pub use economy::*;
pub use error::*;
pub use notify::*;
pub use snapshot::*;
pub use types::*;

#[cfg(feature = "ledger")]
pub use ledger;

use save::SaveStore;

// ============================================================================
// Save store backed by a JS callback
// ============================================================================

/// Hands every save blob to a JS function, e.g.
/// `blob => localStorage.setItem("silkroad_save", blob)`.
struct JsCallbackStore {
    latest: Option<String>,
    callback: Option<js_sys::Function>,
}

impl SaveStore for JsCallbackStore {
    fn load(&self) -> Option<String> {
        self.latest.clone()
    }

    fn save(&mut self, blob: &str) {
        self.latest = Some(blob.to_string());
        let Some(callback) = &self.callback else {
            return;
        };
        if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(blob)) {
            tracing::warn!(target: "save", error = ?err, "save callback failed");
        }
    }
}

// ============================================================================
// WASM API - Caravan
// ============================================================================

#[wasm_bindgen]
pub struct Caravan {
    economy: Economy,
}

#[wasm_bindgen]
impl Caravan {
    /// `saved` is the blob from the last session (if any), `on_save` receives
    /// each new blob, `config` is an optional partial `EconomyConfig`.
    #[wasm_bindgen(constructor)]
    pub fn new(
        saved: Option<String>,
        on_save: Option<js_sys::Function>,
        config: JsValue,
    ) -> Result<Caravan, JsValue> {
        // Better panic messages in browser console
        console_error_panic_hook::set_once();

        let config: EconomyConfig = if config.is_undefined() || config.is_null() {
            EconomyConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };
        let config = config
            .validated()
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        let seed = (js_sys::Math::random() * u32::MAX as f64) as u64;
        let store = JsCallbackStore {
            latest: saved,
            callback: on_save,
        };
        Ok(Self {
            economy: Economy::with_store(config, StdRng::seed_from_u64(seed), Box::new(store)),
        })
    }

    /// Deterministic game for replays and tests; saves stay in memory.
    #[wasm_bindgen(js_name = withSeed)]
    pub fn with_seed(seed: u64, saved: Option<String>) -> Caravan {
        let store = JsCallbackStore {
            latest: saved,
            callback: None,
        };
        Self {
            economy: Economy::with_store(
                EconomyConfig::default(),
                StdRng::seed_from_u64(seed),
                Box::new(store),
            ),
        }
    }

    #[wasm_bindgen]
    pub fn snapshot(&self) -> EconomySnapshot {
        self.economy.snapshot()
    }

    /// Let game time pass; call from the render loop with the frame delta.
    #[wasm_bindgen]
    pub fn advance(&mut self, elapsed_ms: u32) -> Outcome {
        self.economy.tick(elapsed_ms as u64)
    }

    #[wasm_bindgen]
    pub fn travel(&mut self, city: String) -> Outcome {
        self.economy.apply(|e| e.travel_to(&city))
    }

    #[wasm_bindgen(js_name = buyUpgrade)]
    pub fn buy_upgrade(&mut self, level: u32) -> Outcome {
        self.economy.apply(|e| e.buy_upgrade(level))
    }

    #[wasm_bindgen(js_name = listStallItem)]
    pub fn list_stall_item(&mut self, slot: usize, price: u32) -> Outcome {
        self.economy.apply(|e| e.list_stall_item(slot, price as Gold))
    }

    #[wasm_bindgen(js_name = removeStallListing)]
    pub fn remove_stall_listing(&mut self, stall_slot: usize) -> Outcome {
        self.economy.apply(|e| e.remove_stall_listing(stall_slot))
    }

    #[wasm_bindgen(js_name = buyFromBazaar)]
    pub fn buy_from_bazaar(&mut self, stall_id: u64, offer_id: u64) -> Outcome {
        self.economy
            .apply(|e| e.buy_from_bazaar(stall_id, OfferId::from_u64(offer_id)))
    }

    #[wasm_bindgen(js_name = makeOffer)]
    pub fn make_offer(&mut self, stall_id: u64, offer_id: u64, bid: u32) -> Outcome {
        self.economy
            .apply(|e| e.make_offer(stall_id, OfferId::from_u64(offer_id), bid as Gold))
    }

    #[wasm_bindgen(js_name = acceptQuest)]
    pub fn accept_quest(&mut self, quest_id: u64) -> Outcome {
        self.economy.apply(|e| e.accept_quest(QuestId(quest_id)))
    }

    #[wasm_bindgen]
    pub fn haggle(&mut self, item_id: u32) -> Outcome {
        self.economy.apply(|e| e.haggle(ItemId(item_id)))
    }

    #[wasm_bindgen(js_name = buyFromMarket)]
    pub fn buy_from_market(&mut self, item_id: u32) -> Outcome {
        self.economy.apply(|e| e.buy_from_market(ItemId(item_id)))
    }

    #[wasm_bindgen(js_name = sellToMarket)]
    pub fn sell_to_market(&mut self, slot: usize) -> Outcome {
        self.economy.apply(|e| e.sell_to_market(slot))
    }

    #[wasm_bindgen(js_name = startNegotiation)]
    pub fn start_negotiation(&mut self) -> Outcome {
        self.economy.apply(|e| e.start_negotiation())
    }

    #[wasm_bindgen(js_name = setGoldOffer)]
    pub fn set_gold_offer(&mut self, gold: u32) -> Outcome {
        self.economy.apply(|e| e.set_gold_offer(gold as Gold))
    }

    #[wasm_bindgen(js_name = offerItem)]
    pub fn offer_item(&mut self, instance_id: u64) -> Outcome {
        self.economy.apply(|e| e.offer_item(InstanceId(instance_id)))
    }

    #[wasm_bindgen(js_name = lockMyOffer)]
    pub fn lock_my_offer(&mut self) -> Outcome {
        self.economy.apply(|e| e.lock_my_offer())
    }

    #[wasm_bindgen(js_name = confirmMyOffer)]
    pub fn confirm_my_offer(&mut self) -> Outcome {
        self.economy.apply(|e| e.confirm_my_offer())
    }

    #[wasm_bindgen(js_name = closeNegotiation)]
    pub fn close_negotiation(&mut self) -> Outcome {
        self.economy.apply(|e| e.close_negotiation())
    }

    #[wasm_bindgen(js_name = resetAll)]
    pub fn reset_all(&mut self) -> Outcome {
        self.economy.apply(|e| e.reset_all())
    }

    #[wasm_bindgen(js_name = saveBlob)]
    pub fn save_blob(&self) -> Result<String, JsValue> {
        self.economy
            .save_blob()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Storage key for the save blob.
    #[wasm_bindgen(js_name = saveKey)]
    pub fn save_key() -> String {
        save::SAVE_KEY.to_string()
    }

    /// The full catalog, for tooltips and the upgrade screen.
    #[wasm_bindgen(js_name = caravanTiers)]
    pub fn caravan_tiers(&self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(&catalog::caravan_tiers())?)
    }
}
