use thiserror::Error;

use crate::types::{CityId, Gold};

/// A business rule refused an action. State is untouched and the message is
/// shown to the player as an error notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Not enough gold: need {needed}, have {available}")]
    InsufficientGold { needed: Gold, available: Gold },
    #[error("Inventory is full")]
    InventoryFull,
    #[error("Slot {0} is locked; upgrade your caravan")]
    SlotLocked(usize),
    #[error("Slot {0} is empty")]
    EmptySlot(usize),
    #[error("Your stall has no free space")]
    StallFull,
    #[error("Asking price must be at least 1 gold")]
    InvalidPrice,
    #[error("Unknown item")]
    UnknownItem,
    #[error("Unknown city: {0}")]
    UnknownCity(String),
    #[error("You are already in {0}")]
    AlreadyInCity(CityId),
    #[error("The caravan is on the road")]
    Traveling,
    #[error("Caravan level {requested} is not available (current level {current})")]
    TierOutOfSequence { requested: u32, current: u32 },
    #[error("That offer is gone")]
    OfferGone,
    #[error("{0} rejected your offer")]
    OfferRefused(String),
    #[error("Quest not found")]
    UnknownQuest,
    #[error("You already have an active quest")]
    QuestActive,
    #[error("You already haggled over this item here")]
    AlreadyHaggled,
    #[error("No trade is open")]
    NoNegotiation,
    #[error("A trade is already open")]
    NegotiationOpen,
    #[error("Your offer is locked")]
    OfferLocked,
    #[error("Lock your offer first")]
    NotLocked,
    #[error("Waiting for the other trader to lock")]
    CounterpartNotLocked,
    #[error("Already confirmed")]
    AlreadyConfirmed,
    #[error("The trade is already finished")]
    NegotiationFinished,
    #[error("That item is already on the table")]
    ItemAlreadyOffered,
    #[error("That item is promised in a trade")]
    ItemCommitted,
}

/// An `EconomyConfig` the engine cannot run with.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{low} must not exceed {high}")]
    InvertedRange {
        low: &'static str,
        high: &'static str,
    },
    #[error("{low} must be below {high}")]
    EmptyRange {
        low: &'static str,
        high: &'static str,
    },
    #[error("{0} must be between 0 and 1")]
    NotAProbability(&'static str),
}
