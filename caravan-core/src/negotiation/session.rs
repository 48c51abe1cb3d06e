use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::error::Rejection;
use crate::inventory::ItemInstance;
use crate::types::{Gold, InstanceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Success,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Me,
    Them,
}

/// One side of the table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct TradeSide {
    pub gold_offer: Gold,
    pub items: Vec<ItemInstance>,
    pub locked: bool,
    pub confirmed: bool,
}

impl TradeSide {
    fn ensure_open(&self) -> Result<(), Rejection> {
        if self.locked {
            return Err(Rejection::OfferLocked);
        }
        Ok(())
    }
}

/// What changes hands when a session succeeds, seen from `Me`.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub gold_out: Gold,
    pub gold_in: Gold,
    pub items_out: Vec<InstanceId>,
    pub items_in: Vec<ItemInstance>,
}

/// Two-sided offer/lock/confirm exchange.
///
/// Each side moves `unlocked -> locked -> confirmed` and never back. Confirm
/// needs both sides locked. When both have confirmed the session is
/// `Success`, and `take_settlement` hands out the transfer exactly once.
#[derive(Debug, Clone)]
pub struct TradeSession {
    id: u64,
    partner: String,
    state: SessionState,
    me: TradeSide,
    them: TradeSide,
    settled: bool,
}

impl TradeSession {
    pub fn new(id: u64, partner: impl Into<String>) -> Self {
        Self {
            id,
            partner: partner.into(),
            state: SessionState::Active,
            me: TradeSide::default(),
            them: TradeSide::default(),
            settled: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn partner(&self) -> &str {
        &self.partner
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn side(&self, party: Party) -> &TradeSide {
        match party {
            Party::Me => &self.me,
            Party::Them => &self.them,
        }
    }

    fn side_mut(&mut self, party: Party) -> Result<&mut TradeSide, Rejection> {
        if !self.is_active() {
            return Err(Rejection::NegotiationFinished);
        }
        Ok(match party {
            Party::Me => &mut self.me,
            Party::Them => &mut self.them,
        })
    }

    pub fn set_gold(&mut self, party: Party, gold: Gold) -> Result<(), Rejection> {
        let side = self.side_mut(party)?;
        side.ensure_open()?;
        side.gold_offer = gold;
        Ok(())
    }

    pub fn add_item(&mut self, party: Party, item: ItemInstance) -> Result<(), Rejection> {
        let side = self.side_mut(party)?;
        side.ensure_open()?;
        if side.items.iter().any(|i| i.instance_id == item.instance_id) {
            return Err(Rejection::ItemAlreadyOffered);
        }
        side.items.push(item);
        Ok(())
    }

    /// Whether `Me` has put this item on the table in a live session.
    pub fn commits(&self, instance: InstanceId) -> bool {
        self.is_active() && self.me.items.iter().any(|i| i.instance_id == instance)
    }

    /// Lock a side's offer. `balance` is what that side can actually pay.
    pub fn lock(&mut self, party: Party, balance: Gold) -> Result<(), Rejection> {
        let side = self.side_mut(party)?;
        side.ensure_open()?;
        if side.gold_offer > balance {
            return Err(Rejection::InsufficientGold {
                needed: side.gold_offer,
                available: balance,
            });
        }
        side.locked = true;
        Ok(())
    }

    /// Confirm a side. Returns true when this confirmation completed the
    /// session.
    pub fn confirm(&mut self, party: Party) -> Result<bool, Rejection> {
        let other_locked = match party {
            Party::Me => self.them.locked,
            Party::Them => self.me.locked,
        };
        let side = self.side_mut(party)?;
        if side.confirmed {
            return Err(Rejection::AlreadyConfirmed);
        }
        if !side.locked {
            return Err(Rejection::NotLocked);
        }
        if !other_locked {
            return Err(Rejection::CounterpartNotLocked);
        }
        side.confirmed = true;

        if self.me.confirmed && self.them.confirmed {
            self.state = SessionState::Success;
            return Ok(true);
        }
        Ok(false)
    }

    /// Abandon a live session. Nothing transfers.
    pub fn cancel(&mut self) -> Result<(), Rejection> {
        if !self.is_active() {
            return Err(Rejection::NegotiationFinished);
        }
        self.state = SessionState::Cancelled;
        Ok(())
    }

    /// The transfer for a successful session. `None` before success and on
    /// every call after the first.
    pub fn take_settlement(&mut self) -> Option<Settlement> {
        if self.state != SessionState::Success || self.settled {
            return None;
        }
        self.settled = true;
        Some(Settlement {
            gold_out: self.me.gold_offer,
            gold_in: self.them.gold_offer,
            items_out: self.me.items.iter().map(|i| i.instance_id).collect(),
            items_in: self.them.items.clone(),
        })
    }

    /// Gold `Me` has committed and cannot spend elsewhere.
    pub fn escrow(&self) -> Gold {
        if self.is_active() && self.me.locked {
            self.me.gold_offer
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemId;

    fn instance(id: u64) -> ItemInstance {
        ItemInstance {
            instance_id: InstanceId(id),
            item_id: ItemId(201),
            name: "Rare Sword".into(),
            icon: None,
            bought_at: None,
        }
    }

    fn both_locked(mine: Gold, theirs: Gold) -> TradeSession {
        let mut s = TradeSession::new(1, "ShadowHunter");
        s.set_gold(Party::Me, mine).unwrap();
        s.set_gold(Party::Them, theirs).unwrap();
        s.lock(Party::Me, mine).unwrap();
        s.lock(Party::Them, theirs).unwrap();
        s
    }

    #[test]
    fn test_confirm_requires_both_locks() {
        let mut s = TradeSession::new(1, "ShadowHunter");
        assert_eq!(s.confirm(Party::Me), Err(Rejection::NotLocked));
        s.lock(Party::Me, 0).unwrap();
        assert_eq!(s.confirm(Party::Me), Err(Rejection::CounterpartNotLocked));
        s.lock(Party::Them, 0).unwrap();
        assert_eq!(s.confirm(Party::Me), Ok(false));
        assert_eq!(s.confirm(Party::Me), Err(Rejection::AlreadyConfirmed));
        assert_eq!(s.confirm(Party::Them), Ok(true));
        assert_eq!(s.state(), SessionState::Success);
    }

    #[test]
    fn test_lock_checks_balance_and_freezes_offer() {
        let mut s = TradeSession::new(1, "ShadowHunter");
        s.set_gold(Party::Me, 500).unwrap();
        assert_eq!(
            s.lock(Party::Me, 499),
            Err(Rejection::InsufficientGold {
                needed: 500,
                available: 499
            })
        );
        s.lock(Party::Me, 500).unwrap();
        assert_eq!(s.set_gold(Party::Me, 10), Err(Rejection::OfferLocked));
        assert_eq!(s.add_item(Party::Me, instance(1)), Err(Rejection::OfferLocked));
        assert_eq!(s.lock(Party::Me, 500), Err(Rejection::OfferLocked));
        assert_eq!(s.escrow(), 500);
    }

    #[test]
    fn test_settlement_is_handed_out_once() {
        let mut s = both_locked(300, 0);
        assert_eq!(s.add_item(Party::Them, instance(9)), Err(Rejection::OfferLocked));
        assert!(s.take_settlement().is_none());

        s.confirm(Party::Them).unwrap();
        s.confirm(Party::Me).unwrap();
        let settlement = s.take_settlement().unwrap();
        assert_eq!(settlement.gold_out, 300);
        assert_eq!(settlement.gold_in, 0);
        assert!(s.take_settlement().is_none());
        assert_eq!(s.escrow(), 0);
    }

    #[test]
    fn test_finished_session_refuses_changes() {
        let mut s = TradeSession::new(1, "ShadowHunter");
        s.cancel().unwrap();
        assert_eq!(s.set_gold(Party::Me, 5), Err(Rejection::NegotiationFinished));
        assert_eq!(s.cancel(), Err(Rejection::NegotiationFinished));
        assert!(s.take_settlement().is_none());
    }

    #[test]
    fn test_duplicate_item_rejected() {
        let mut s = TradeSession::new(1, "ShadowHunter");
        s.add_item(Party::Me, instance(4)).unwrap();
        assert_eq!(
            s.add_item(Party::Me, instance(4)),
            Err(Rejection::ItemAlreadyOffered)
        );
        assert!(s.commits(InstanceId(4)));
        assert!(!s.commits(InstanceId(5)));
    }
}
