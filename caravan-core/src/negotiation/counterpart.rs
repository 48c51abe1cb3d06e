use std::sync::mpsc::{self, Receiver, Sender};

use crate::catalog::{self, RARE_SWORD};
use crate::inventory::ItemInstance;
use crate::types::{Gold, InstanceId};

use super::session::TradeSide;

/// Something the counterpart does at the table.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerAction {
    OfferGold(Gold),
    OfferItem(ItemInstance),
    Lock,
    Confirm,
    Withdraw,
}

/// Something our side did, as the counterpart hears about it.
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    GoldOffered(Gold),
    ItemOffered(ItemInstance),
    Locked,
    Confirmed,
    Settled,
    Cancelled,
}

/// Read-only view of the table handed to the counterpart on its turn.
#[derive(Debug, Clone, Copy)]
pub struct TableView<'a> {
    /// Time since the session opened.
    pub elapsed_ms: u64,
    pub me: &'a TradeSide,
    pub them: &'a TradeSide,
}

/// The other trader. Settlement never looks behind this trait.
pub trait Counterpart {
    fn name(&self) -> &str;

    /// Gold the counterpart can put behind a locked offer.
    fn balance(&self) -> Gold;

    /// Take a turn. Actions are applied in order; ones the session refuses
    /// are dropped.
    fn poll(&mut self, view: &TableView<'_>) -> Vec<PeerAction>;

    fn observe(&mut self, _event: &TableEvent) {}
}

/// Local trader following a fixed timeline: puts a Rare Sword on the table,
/// locks, then confirms once both sides are locked.
#[derive(Debug, Clone)]
pub struct ScriptedCounterpart {
    name: String,
    balance: Gold,
    offer_at_ms: u64,
    lock_at_ms: u64,
    confirm_at_ms: u64,
}

impl ScriptedCounterpart {
    pub fn new(name: impl Into<String>, balance: Gold) -> Self {
        Self {
            name: name.into(),
            balance,
            offer_at_ms: 2000,
            lock_at_ms: 4000,
            confirm_at_ms: 5000,
        }
    }

    fn sword() -> Option<ItemInstance> {
        let item = catalog::item(RARE_SWORD)?;
        Some(ItemInstance {
            instance_id: InstanceId(1),
            item_id: item.id,
            name: item.name,
            icon: item.icon,
            bought_at: None,
        })
    }
}

impl Counterpart for ScriptedCounterpart {
    fn name(&self) -> &str {
        &self.name
    }

    fn balance(&self) -> Gold {
        self.balance
    }

    fn poll(&mut self, view: &TableView<'_>) -> Vec<PeerAction> {
        let mut actions = Vec::new();
        let elapsed = view.elapsed_ms;

        if elapsed >= self.offer_at_ms && view.them.items.is_empty() && !view.them.locked {
            actions.extend(Self::sword().map(PeerAction::OfferItem));
        }
        if elapsed >= self.lock_at_ms && !view.them.locked {
            actions.push(PeerAction::Lock);
        }
        // Waits on our lock; keeps retrying on later turns.
        if elapsed >= self.confirm_at_ms && view.me.locked && !view.them.confirmed {
            actions.push(PeerAction::Confirm);
        }
        actions
    }
}

/// Counterpart driven by messages from elsewhere (another tab, a relay, a
/// test). Actions sent through the `PeerLink` are applied on the next turn;
/// our moves come back out of it.
#[derive(Debug)]
pub struct RemotePeer {
    name: String,
    balance: Gold,
    inbox: Receiver<PeerAction>,
    outbox: Sender<TableEvent>,
}

/// The far end of a `RemotePeer`.
#[derive(Debug)]
pub struct PeerLink {
    pub actions: Sender<PeerAction>,
    pub events: Receiver<TableEvent>,
}

impl PeerLink {
    /// Queue an action; returns false once the peer has been dropped.
    pub fn send(&self, action: PeerAction) -> bool {
        self.actions.send(action).is_ok()
    }

    pub fn received(&self) -> Vec<TableEvent> {
        self.events.try_iter().collect()
    }
}

impl RemotePeer {
    pub fn pair(name: impl Into<String>, balance: Gold) -> (RemotePeer, PeerLink) {
        let (action_tx, action_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let peer = RemotePeer {
            name: name.into(),
            balance,
            inbox: action_rx,
            outbox: event_tx,
        };
        let link = PeerLink {
            actions: action_tx,
            events: event_rx,
        };
        (peer, link)
    }
}

impl Counterpart for RemotePeer {
    fn name(&self) -> &str {
        &self.name
    }

    fn balance(&self) -> Gold {
        self.balance
    }

    fn poll(&mut self, _view: &TableView<'_>) -> Vec<PeerAction> {
        self.inbox.try_iter().collect()
    }

    fn observe(&mut self, event: &TableEvent) {
        if self.outbox.send(event.clone()).is_err() {
            tracing::debug!(target: "negotiation", peer = %self.name, "remote link closed");
        }
    }
}
