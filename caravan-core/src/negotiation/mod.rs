//! Peer-to-peer exchange with a simulated or remote trader.

mod counterpart;
mod session;

pub use counterpart::*;
pub use session::*;

use crate::error::Rejection;
use crate::inventory::ItemInstance;
use crate::types::Gold;

/// Counterpart moves that made it onto the table during a poll.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    GoldOffered(Gold),
    ItemOffered(String),
    Locked,
    Confirmed,
    /// Both sides confirmed; the settlement is ready.
    Completed,
    Withdrew,
    TimedOut,
}

/// A trade session together with whoever sits across the table.
pub struct Negotiation {
    session: TradeSession,
    counterpart: Box<dyn Counterpart>,
    opened_at_ms: u64,
    idle_since_ms: u64,
}

impl std::fmt::Debug for Negotiation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Negotiation")
            .field("session", &self.session)
            .field("counterpart", &self.counterpart.name())
            .field("opened_at_ms", &self.opened_at_ms)
            .finish()
    }
}

impl Negotiation {
    pub fn open(id: u64, counterpart: Box<dyn Counterpart>, now_ms: u64) -> Self {
        let session = TradeSession::new(id, counterpart.name());
        Self {
            session,
            counterpart,
            opened_at_ms: now_ms,
            idle_since_ms: now_ms,
        }
    }

    pub fn session(&self) -> &TradeSession {
        &self.session
    }

    pub fn elapsed(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.opened_at_ms)
    }

    pub fn set_my_gold(&mut self, gold: Gold) -> Result<(), Rejection> {
        self.session.set_gold(Party::Me, gold)?;
        self.counterpart.observe(&TableEvent::GoldOffered(gold));
        Ok(())
    }

    pub fn offer_my_item(&mut self, item: ItemInstance) -> Result<(), Rejection> {
        self.session.add_item(Party::Me, item.clone())?;
        self.counterpart.observe(&TableEvent::ItemOffered(item));
        Ok(())
    }

    pub fn lock_mine(&mut self, balance: Gold, now_ms: u64) -> Result<(), Rejection> {
        self.session.lock(Party::Me, balance)?;
        // The timeout only runs while we wait locked.
        self.idle_since_ms = now_ms;
        self.counterpart.observe(&TableEvent::Locked);
        Ok(())
    }

    /// Returns true when our confirmation completed the session.
    pub fn confirm_mine(&mut self) -> Result<bool, Rejection> {
        let done = self.session.confirm(Party::Me)?;
        self.counterpart.observe(&TableEvent::Confirmed);
        if done {
            self.counterpart.observe(&TableEvent::Settled);
        }
        Ok(done)
    }

    /// Close the window. Allowed unless our offer is locked in a live
    /// session; a live session is cancelled.
    pub fn close(&mut self) -> Result<(), Rejection> {
        if !self.session.is_active() {
            return Ok(());
        }
        if self.session.side(Party::Me).locked {
            return Err(Rejection::OfferLocked);
        }
        self.session.cancel()?;
        self.counterpart.observe(&TableEvent::Cancelled);
        Ok(())
    }

    /// Give the counterpart its turn, then apply the idle timeout.
    pub fn poll(&mut self, now_ms: u64, timeout_ms: u64) -> Vec<Progress> {
        let mut progress = Vec::new();
        if !self.session.is_active() {
            return progress;
        }

        let view = TableView {
            elapsed_ms: self.elapsed(now_ms),
            me: self.session.side(Party::Me),
            them: self.session.side(Party::Them),
        };
        let actions = self.counterpart.poll(&view);

        for action in actions {
            let applied = match action {
                PeerAction::OfferGold(gold) => self
                    .session
                    .set_gold(Party::Them, gold)
                    .map(|_| Progress::GoldOffered(gold)),
                PeerAction::OfferItem(item) => {
                    let name = item.name.clone();
                    self.session
                        .add_item(Party::Them, item)
                        .map(|_| Progress::ItemOffered(name))
                }
                PeerAction::Lock => self
                    .session
                    .lock(Party::Them, self.counterpart.balance())
                    .map(|_| Progress::Locked),
                PeerAction::Confirm => self.session.confirm(Party::Them).map(|done| {
                    if done {
                        Progress::Completed
                    } else {
                        Progress::Confirmed
                    }
                }),
                PeerAction::Withdraw => self.session.cancel().map(|_| Progress::Withdrew),
            };
            match applied {
                Ok(step) => {
                    self.idle_since_ms = now_ms;
                    progress.push(step);
                }
                Err(refused) => {
                    tracing::debug!(
                        target: "negotiation",
                        session = self.session.id(),
                        reason = %refused,
                        "counterpart action refused"
                    );
                }
            }
            if !self.session.is_active() {
                break;
            }
        }

        let waiting = self.session.is_active() && self.session.side(Party::Me).locked;
        if waiting && now_ms.saturating_sub(self.idle_since_ms) >= timeout_ms {
            // Cannot fail: the session is active.
            let _ = self.session.cancel();
            self.counterpart.observe(&TableEvent::Cancelled);
            progress.push(Progress::TimedOut);
        }
        if progress.contains(&Progress::Completed) {
            self.counterpart.observe(&TableEvent::Settled);
        }
        progress
    }

    pub fn take_settlement(&mut self) -> Option<Settlement> {
        self.session.take_settlement()
    }
}
