//! The economy: one container that owns every piece of mutable game state.
//!
//! Player actions are plain methods returning `Result<_, Rejection>`; a
//! rejected action leaves state untouched. `apply` wraps an action for the
//! presentation layer: it turns a rejection into an error notification, saves
//! after a successful one and returns a fresh snapshot. Time only moves in
//! `tick`, which fires the scheduler's due timers one at a time.
//!
//! Every balance change goes through `credit`/`spend`/`lose`, which record a
//! `gold` tracing event, so the recorded deltas always add up to the balance.

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use crate::bazaar::{self, Bazaar};
use crate::catalog::{self, Item, MAX_CARAVAN_LEVEL, TRADE_PARTNER};
use crate::config::EconomyConfig;
use crate::error::Rejection;
use crate::events::{self, ArrivalOutcome, MarketConditions};
use crate::inventory::Inventory;
use crate::negotiation::{Counterpart, Negotiation, Party, Progress, ScriptedCounterpart};
use crate::notify::{Notification, NotificationLog};
use crate::pricing;
use crate::quests::{QuestBook, QuestCheck};
use crate::save::{MemoryStore, SaveState, SaveStore};
use crate::snapshot::*;
use crate::stall::Stall;
use crate::timers::{Fired, Scheduler, TimerKind};
use crate::travel::{Arrival, TravelState};
use crate::types::{
    CityId, Gold, InstanceId, ItemCategory, ItemId, KeyToU64, OfferId, QuestId, Severity,
};

pub struct Economy {
    config: EconomyConfig,
    rng: StdRng,
    clock: Scheduler,
    /// Bumped on reset; background timers from before a reset are ignored.
    generation: u64,
    /// Bumped on every departure and reset.
    travel_epoch: u64,

    gold: Gold,
    city: CityId,
    level: u32,
    inventory: Inventory,
    market: MarketConditions,
    quests: QuestBook,
    stall: Stall,
    bazaar: Bazaar,
    travel: TravelState,

    negotiation: Option<Negotiation>,
    next_session: u64,
    trade_request: Option<String>,

    log: NotificationLog,
    pending: Vec<Notification>,
    /// Latest arrival not yet handed out in an `Outcome`.
    arrival: Option<Arrival>,
    won: bool,
    dirty: bool,
    store: Box<dyn SaveStore>,
}

impl Economy {
    /// A fresh game with an in-memory save store.
    pub fn new(config: EconomyConfig, seed: u64) -> Self {
        Self::with_store(config, StdRng::seed_from_u64(seed), Box::new(MemoryStore::new()))
    }

    /// Load whatever `store` holds (or start fresh) and arm the background
    /// timers.
    pub fn with_store(config: EconomyConfig, rng: StdRng, store: Box<dyn SaveStore>) -> Self {
        let saved = SaveState::load(store.load().as_deref(), config.starting_gold);
        let mut economy = Self {
            inventory: Inventory::default(),
            stall: Stall::new(config.stall_slots),
            gold: saved.gold,
            config,
            rng,
            clock: Scheduler::new(),
            generation: 0,
            travel_epoch: 0,
            city: CityId::default(),
            level: 1,
            market: MarketConditions::default(),
            quests: QuestBook::new(),
            bazaar: Bazaar::new(),
            travel: TravelState::Idle,
            negotiation: None,
            next_session: 1,
            trade_request: None,
            log: NotificationLog::new(),
            pending: Vec::new(),
            arrival: None,
            won: false,
            dirty: false,
            store,
        };
        economy.restore(saved);
        economy.arm_background();
        economy
    }

    fn restore(&mut self, saved: SaveState) {
        self.gold = saved.gold;
        self.city = saved.city();
        self.level = saved.caravan_level;

        let (inventory, lost) = Inventory::from_saved(saved.inventory, saved.max_inventory);
        self.inventory = inventory;
        for item in lost {
            tracing::warn!(target: "save", item = %item.name, "item in a locked slot did not fit");
            self.notify(format!("{} was lost: no room in the caravan", item.name), Severity::Error);
        }

        let (stall, overflow) = Stall::from_saved(saved.stall, self.config.stall_slots);
        self.stall = stall;
        for listing in overflow {
            if let Err(item) = self.inventory.place(listing.item) {
                tracing::warn!(target: "save", item = %item.name, "stall listing did not fit");
            }
        }
        let highest = self
            .stall
            .listings()
            .map(|l| l.item.instance_id)
            .chain(self.inventory.items().map(|i| i.instance_id))
            .max();
        if let Some(id) = highest {
            self.inventory.reserve_ids_through(id);
        }

        self.quests = QuestBook::from_saved(
            saved.available_quests,
            saved.active_quest,
            saved.completed_quests,
        );
        self.market = MarketConditions::default();
        self.travel = TravelState::Idle;
        self.negotiation = None;
        self.trade_request = None;
        self.arrival = None;
        self.won = false;
        self.bazaar.regenerate(&mut self.rng, &self.config);
    }

    fn arm_background(&mut self) {
        self.clock
            .every(TimerKind::StallSale, self.config.stall_tick_ms, self.generation);
        self.clock.once(
            TimerKind::TradeRequest,
            self.config.trade_request_delay_ms,
            self.generation,
        );
    }

    // ========================================================================
    // Facade plumbing
    // ========================================================================

    /// Run a player action and report back.
    pub fn apply<T>(&mut self, action: impl FnOnce(&mut Self) -> Result<T, Rejection>) -> Outcome {
        match action(self) {
            Ok(_) => self.dirty = true,
            Err(rejection) => {
                tracing::debug!(target: "economy", reason = %rejection, "action rejected");
                self.notify(rejection.to_string(), Severity::Error);
            }
        }
        self.finish()
    }

    /// Let `elapsed_ms` of game time pass.
    pub fn tick(&mut self, elapsed_ms: u64) -> Outcome {
        self.advance(elapsed_ms);
        self.finish()
    }

    fn finish(&mut self) -> Outcome {
        self.check_victory();
        if std::mem::take(&mut self.dirty) {
            self.persist();
        }
        Outcome {
            state: self.snapshot(),
            notifications: std::mem::take(&mut self.pending),
            arrival: self.arrival.take(),
        }
    }

    /// Fire every timer due in the next `elapsed_ms`, in due order.
    pub fn advance(&mut self, elapsed_ms: u64) {
        let until = self.clock.now().saturating_add(elapsed_ms);
        while let Some(fired) = self.clock.pop_due(until) {
            self.fire(fired);
        }
        self.clock.settle(until);
    }

    fn fire(&mut self, fired: Fired) {
        match fired.kind {
            TimerKind::TravelStep => self.on_travel_step(fired.epoch),
            TimerKind::StallSale => self.on_stall_tick(fired.epoch),
            TimerKind::TradeRequest => self.on_trade_request(fired.epoch),
            TimerKind::NegotiationPoll => self.on_negotiation_poll(fired.epoch),
        }
    }

    fn notify(&mut self, text: impl Into<String>, severity: Severity) {
        let notification = Notification::new(text, severity);
        self.log.push(&notification);
        self.pending.push(notification);
    }

    fn persist(&mut self) {
        match self.save_state().to_json() {
            Ok(blob) => {
                self.store.save(&blob);
                tracing::info!(target: "save", bytes = blob.len() as u64, gold = self.gold);
            }
            Err(err) => tracing::warn!(target: "save", error = %err, "could not encode save"),
        }
    }

    pub fn save_state(&self) -> SaveState {
        SaveState {
            gold: self.gold,
            current_city: self.city.name().to_string(),
            caravan_level: self.level,
            max_inventory: self.inventory.capacity(),
            inventory: self.inventory.slots().to_vec(),
            active_quest: self.quests.active().cloned(),
            completed_quests: self.quests.completed(),
            available_quests: self.quests.available().to_vec(),
            stall: self.stall.slots().to_vec(),
        }
    }

    pub fn save_blob(&self) -> Result<String, serde_json::Error> {
        self.save_state().to_json()
    }

    // ========================================================================
    // Gold
    // ========================================================================

    pub fn gold(&self) -> Gold {
        self.gold
    }

    /// Gold held back by a locked trade offer.
    pub fn escrow(&self) -> Gold {
        self.negotiation
            .as_ref()
            .map(|n| n.session().escrow())
            .unwrap_or(0)
    }

    pub fn spendable(&self) -> Gold {
        self.gold.saturating_sub(self.escrow())
    }

    fn ensure_funds(&self, amount: Gold) -> Result<(), Rejection> {
        let available = self.spendable();
        if amount > available {
            return Err(Rejection::InsufficientGold {
                needed: amount,
                available,
            });
        }
        Ok(())
    }

    fn record_gold(&self, delta: i64, reason: &'static str) {
        tracing::info!(target: "gold", delta = delta, balance = self.gold, reason = reason);
    }

    fn credit(&mut self, amount: Gold, reason: &'static str) {
        if amount == 0 {
            return;
        }
        self.gold = self.gold.saturating_add(amount);
        self.record_gold(amount as i64, reason);
    }

    fn spend(&mut self, amount: Gold, reason: &'static str) -> Result<(), Rejection> {
        self.ensure_funds(amount)?;
        self.lose(amount, reason);
        Ok(())
    }

    /// Take gold without the spendable check (bandits, escrow release).
    fn lose(&mut self, amount: Gold, reason: &'static str) {
        let taken = amount.min(self.gold);
        if taken == 0 {
            return;
        }
        self.gold -= taken;
        self.record_gold(-(taken as i64), reason);
    }

    // ========================================================================
    // Guards
    // ========================================================================

    fn ensure_in_city(&self) -> Result<(), Rejection> {
        if self.travel.is_traveling() {
            return Err(Rejection::Traveling);
        }
        Ok(())
    }

    fn negotiation_open(&self) -> bool {
        self.negotiation
            .as_ref()
            .is_some_and(|n| n.session().is_active())
    }

    fn ensure_uncommitted(&self, instance: InstanceId) -> Result<(), Rejection> {
        let committed = self
            .negotiation
            .as_ref()
            .is_some_and(|n| n.session().commits(instance));
        if committed {
            return Err(Rejection::ItemCommitted);
        }
        Ok(())
    }

    fn trade_good(id: ItemId) -> Result<Item, Rejection> {
        catalog::item(id)
            .filter(|i| i.category != ItemCategory::Weapon)
            .ok_or(Rejection::UnknownItem)
    }

    /// Current price of an item here.
    pub fn price_of(&self, item: &Item) -> Gold {
        pricing::price(item, self.city, &self.market.events, &self.market.haggle)
    }

    // ========================================================================
    // Travel
    // ========================================================================

    pub fn travel_to(&mut self, destination: &str) -> Result<(), Rejection> {
        let city = CityId::parse(destination)
            .ok_or_else(|| Rejection::UnknownCity(destination.to_string()))?;
        self.travel(city)
    }

    /// Pay the fare and set off. Arrival happens in `advance`.
    pub fn travel(&mut self, destination: CityId) -> Result<(), Rejection> {
        self.ensure_in_city()?;
        if self.negotiation_open() {
            return Err(Rejection::NegotiationOpen);
        }
        if destination == self.city {
            return Err(Rejection::AlreadyInCity(destination));
        }
        self.spend(self.config.travel_cost, "travel")?;

        self.travel = TravelState::Traveling {
            destination,
            progress: 0,
        };
        self.travel_epoch += 1;
        self.clock.cancel(TimerKind::TravelStep);
        self.clock
            .every(TimerKind::TravelStep, self.config.travel_step_ms, self.travel_epoch);

        tracing::info!(target: "travel", from = self.city.name(), to = destination.name(), epoch = self.travel_epoch);
        self.notify(format!("The caravan sets out for {destination}"), Severity::Info);
        Ok(())
    }

    fn on_travel_step(&mut self, epoch: u64) {
        if epoch != self.travel_epoch || !self.travel.is_traveling() {
            return;
        }
        if let Some(destination) = self.travel.step() {
            self.clock.cancel(TimerKind::TravelStep);
            self.arrival = Some(self.arrive(destination));
            self.dirty = true;
        }
    }

    /// Arrival sequence: road event, city change, quests, market, bazaar.
    fn arrive(&mut self, city: CityId) -> Arrival {
        let outcome = events::roll_arrival(&mut self.rng, self.gold, &self.config);
        match outcome {
            ArrivalOutcome::Bandits { loss } => {
                self.lose(loss, "bandits");
                self.notify(
                    format!("Bandits ambushed the caravan and took {loss} gold!"),
                    Severity::Error,
                );
            }
            ArrivalOutcome::Oasis { bonus } => {
                self.credit(bonus, "oasis");
                self.notify(
                    format!("A hidden oasis! Travelers paid {bonus} gold for water."),
                    Severity::Gain,
                );
            }
            ArrivalOutcome::Safe => {}
        }

        self.city = city;
        self.notify(format!("Arrived in {city}"), Severity::Success);

        let new_quest = self
            .quests
            .offer_on_arrival(&mut self.rng, city, &self.config)
            .cloned();
        if let Some(quest) = &new_quest {
            tracing::info!(target: "quest", event = "offered", quest = quest.id.0, city = city.name(), target_city = quest.target_city.name(), reward = quest.reward);
            self.notify(format!("New quest posted: {}", quest.title), Severity::Info);
        }
        self.check_quest(city);

        self.market.regenerate(&mut self.rng, &self.config);
        let event = self.market.events.first().cloned();
        if let Some(event) = &event {
            self.notify(event.text.clone(), Severity::Info);
        }

        self.bazaar.regenerate(&mut self.rng, &self.config);

        tracing::info!(
            target: "travel",
            city = city.name(),
            outcome = ?outcome,
            gold = self.gold,
            event = event.as_ref().map(|e| e.text.as_str()).unwrap_or(""),
        );

        Arrival {
            city,
            outcome,
            new_quest,
            event,
        }
    }

    fn check_quest(&mut self, city: CityId) {
        match self.quests.check_completion(city, &mut self.inventory) {
            QuestCheck::NotHere => {}
            QuestCheck::Completed { quest, consumed } => {
                self.credit(quest.reward, "quest");
                tracing::info!(target: "quest", event = "completed", quest = quest.id.0, city = city.name(), consumed = consumed.len() as u64, reward = quest.reward);
                self.notify(
                    format!("Quest complete: {}! Earned {} gold.", quest.title, quest.reward),
                    Severity::Gain,
                );
            }
            QuestCheck::Short { quest, owed } => {
                tracing::info!(target: "quest", event = "short", quest = quest.id.0, city = city.name(), owed = owed as u64);
                self.notify(
                    format!("You still need {owed} more {} for {}", quest.item_name, quest.title),
                    Severity::Info,
                );
            }
        }
    }

    // ========================================================================
    // Caravan
    // ========================================================================

    pub fn buy_upgrade(&mut self, level: u32) -> Result<(), Rejection> {
        if level != self.level + 1 {
            return Err(Rejection::TierOutOfSequence {
                requested: level,
                current: self.level,
            });
        }
        let tier = catalog::caravan_tier(level).ok_or(Rejection::TierOutOfSequence {
            requested: level,
            current: self.level,
        })?;
        self.spend(tier.cost, "upgrade")?;
        self.level = tier.level;
        self.inventory.grow_to(tier.slots);
        self.notify(
            format!("Upgraded to {}! Capacity is now {} slots.", tier.name, tier.slots),
            Severity::Success,
        );
        Ok(())
    }

    // ========================================================================
    // City market
    // ========================================================================

    pub fn buy_from_market(&mut self, item_id: ItemId) -> Result<usize, Rejection> {
        self.ensure_in_city()?;
        let item = Self::trade_good(item_id)?;
        let price = self.price_of(&item);
        self.ensure_funds(price)?;
        if !self.inventory.has_room() {
            return Err(Rejection::InventoryFull);
        }
        self.spend(price, "market_buy")?;
        let instance = self.inventory.mint(&item, Some(price));
        let slot = self.inventory.insert(instance)?;
        self.notify(format!("Bought {} for {price} gold", item.name), Severity::Success);
        Ok(slot)
    }

    pub fn sell_to_market(&mut self, slot: usize) -> Result<Gold, Rejection> {
        self.ensure_in_city()?;
        self.inventory.check_usable(slot)?;
        let held = self.inventory.get(slot).ok_or(Rejection::EmptySlot(slot))?;
        self.ensure_uncommitted(held.instance_id)?;
        let item = catalog::item(held.item_id).ok_or(Rejection::UnknownItem)?;
        let price = self.price_of(&item);

        self.inventory.take(slot)?;
        self.credit(price, "market_sell");
        self.notify(format!("Sold {} for {price} gold", item.name), Severity::Gain);
        Ok(price)
    }

    /// One attempt per item per city visit. Returns whether it worked.
    pub fn haggle(&mut self, item_id: ItemId) -> Result<bool, Rejection> {
        self.ensure_in_city()?;
        let item = Self::trade_good(item_id)?;
        let won = self.market.haggle.attempt(&mut self.rng, item.id, &self.config)?;
        if won {
            self.notify(format!("Haggling worked! {} is cheaper here now.", item.name), Severity::Success);
        } else {
            self.notify(
                format!("The merchant took offense. {} costs more here now.", item.name),
                Severity::Info,
            );
        }
        Ok(won)
    }

    // ========================================================================
    // Personal stall
    // ========================================================================

    pub fn list_stall_item(&mut self, slot: usize, price: Gold) -> Result<usize, Rejection> {
        if let Some(held) = self.inventory.get(slot) {
            self.ensure_uncommitted(held.instance_id)?;
        }
        let stall_slot = self.stall.list(&mut self.inventory, slot, price)?;
        let name = self.stall.slots()[stall_slot]
            .as_ref()
            .map(|l| l.item.name.clone())
            .unwrap_or_default();
        self.notify(format!("Listed {name} for {price} gold"), Severity::Info);
        Ok(stall_slot)
    }

    pub fn remove_stall_listing(&mut self, stall_slot: usize) -> Result<usize, Rejection> {
        let slot = self.stall.remove(stall_slot, &mut self.inventory)?;
        self.notify("Listing removed", Severity::Info);
        Ok(slot)
    }

    fn on_stall_tick(&mut self, epoch: u64) {
        if epoch != self.generation {
            return;
        }
        let Some(sale) = self
            .stall
            .tick(&mut self.rng, self.city, &self.market, &self.config)
        else {
            return;
        };
        self.dirty = true;
        self.credit(sale.listing.price, "stall_sale");
        tracing::info!(
            target: "sale",
            item = %sale.listing.item.name,
            price = sale.listing.price,
            fair_price = sale.fair_price,
            buyer = sale.buyer,
            city = self.city.name(),
        );
        self.notify(
            format!(
                "{} bought your {} for {} gold!",
                sale.buyer, sale.listing.item.name, sale.listing.price
            ),
            Severity::Gain,
        );
    }

    // ========================================================================
    // Bazaar
    // ========================================================================

    pub fn buy_from_bazaar(&mut self, stall_id: u64, offer: OfferId) -> Result<usize, Rejection> {
        self.ensure_in_city()?;
        let (seller, found) = self.bazaar.find(stall_id, offer)?;
        let (seller, price) = (seller.name.clone(), found.price);
        self.ensure_funds(price)?;
        if !self.inventory.has_room() {
            return Err(Rejection::InventoryFull);
        }
        self.complete_bazaar_purchase(stall_id, offer, price, &seller)
    }

    /// Bid below (or above) the asking price. A refused bid changes nothing.
    pub fn make_offer(&mut self, stall_id: u64, offer: OfferId, bid: Gold) -> Result<usize, Rejection> {
        self.ensure_in_city()?;
        if bid == 0 {
            return Err(Rejection::InvalidPrice);
        }
        let (seller, found) = self.bazaar.find(stall_id, offer)?;
        let (seller, asking) = (seller.name.clone(), found.price);
        self.ensure_funds(bid)?;
        if !self.inventory.has_room() {
            return Err(Rejection::InventoryFull);
        }

        let chance = bazaar::acceptance_chance(bid, asking);
        if self.rng.random::<f64>() >= chance {
            tracing::info!(target: "sale", event = "bid_refused", seller = %seller, bid = bid, asking = asking);
            return Err(Rejection::OfferRefused(seller));
        }
        self.complete_bazaar_purchase(stall_id, offer, bid, &seller)
    }

    fn complete_bazaar_purchase(
        &mut self,
        stall_id: u64,
        offer: OfferId,
        price: Gold,
        seller: &str,
    ) -> Result<usize, Rejection> {
        self.spend(price, "bazaar")?;
        let bought = self.bazaar.take(stall_id, offer)?;
        let instance = self.inventory.mint(&bought.item, Some(price));
        let slot = self.inventory.insert(instance)?;
        tracing::info!(target: "sale", event = "bazaar_buy", seller = seller, item = %bought.item.name, price = price, asking = bought.price);
        self.notify(
            format!("Bought {} from {seller} for {price} gold", bought.item.name),
            Severity::Success,
        );
        Ok(slot)
    }

    // ========================================================================
    // Quests
    // ========================================================================

    pub fn accept_quest(&mut self, id: QuestId) -> Result<(), Rejection> {
        let quest = self.quests.accept(id)?;
        let text = format!("Quest accepted: {}", quest.title);
        tracing::info!(target: "quest", event = "accepted", quest = id.0);
        self.notify(text, Severity::Success);
        Ok(())
    }

    // ========================================================================
    // Negotiation
    // ========================================================================

    /// Open a trade with the scripted partner (accepting a pending request if
    /// there is one).
    pub fn start_negotiation(&mut self) -> Result<u64, Rejection> {
        let partner = self
            .trade_request
            .clone()
            .unwrap_or_else(|| TRADE_PARTNER.to_string());
        let counterpart = ScriptedCounterpart::new(partner, self.config.partner_balance);
        self.start_negotiation_with(Box::new(counterpart))
    }

    pub fn start_negotiation_with(&mut self, counterpart: Box<dyn Counterpart>) -> Result<u64, Rejection> {
        self.ensure_in_city()?;
        if self.negotiation_open() {
            return Err(Rejection::NegotiationOpen);
        }
        let id = self.next_session;
        self.next_session += 1;
        let negotiation = Negotiation::open(id, counterpart, self.clock.now());
        let partner = negotiation.session().partner().to_string();
        self.negotiation = Some(negotiation);
        self.trade_request = None;

        self.clock.cancel(TimerKind::NegotiationPoll);
        self.clock
            .every(TimerKind::NegotiationPoll, self.config.negotiation_poll_ms, id);
        tracing::info!(target: "negotiation", event = "opened", session = id, partner = %partner);
        self.notify(format!("Trading with {partner}"), Severity::Info);
        Ok(id)
    }

    fn live_negotiation(&mut self) -> Result<&mut Negotiation, Rejection> {
        let negotiation = self.negotiation.as_mut().ok_or(Rejection::NoNegotiation)?;
        if !negotiation.session().is_active() {
            return Err(Rejection::NegotiationFinished);
        }
        Ok(negotiation)
    }

    pub fn set_gold_offer(&mut self, gold: Gold) -> Result<(), Rejection> {
        let balance = self.gold;
        let negotiation = self.live_negotiation()?;
        if gold > balance {
            return Err(Rejection::InsufficientGold {
                needed: gold,
                available: balance,
            });
        }
        negotiation.set_my_gold(gold)
    }

    /// Put an inventory item on the table. It stays in its slot until the
    /// trade settles.
    pub fn offer_item(&mut self, instance: InstanceId) -> Result<(), Rejection> {
        let slot = self
            .inventory
            .position_of(instance)
            .filter(|s| *s < self.inventory.capacity())
            .ok_or(Rejection::UnknownItem)?;
        let item = self.inventory.get(slot).cloned().ok_or(Rejection::EmptySlot(slot))?;
        let name = item.name.clone();
        self.live_negotiation()?.offer_my_item(item)?;
        self.notify(format!("You offered {name}"), Severity::Info);
        Ok(())
    }

    pub fn lock_my_offer(&mut self) -> Result<(), Rejection> {
        let (balance, now) = (self.gold, self.clock.now());
        let negotiation = self.live_negotiation()?;
        negotiation.lock_mine(balance, now)?;
        let (id, escrow) = (negotiation.session().id(), negotiation.session().escrow());
        tracing::info!(target: "negotiation", event = "locked", session = id, escrow = escrow);
        self.notify("You locked your offer", Severity::Info);
        Ok(())
    }

    pub fn confirm_my_offer(&mut self) -> Result<(), Rejection> {
        let done = self.live_negotiation()?.confirm_mine()?;
        self.notify("You confirmed the trade", Severity::Info);
        if done {
            self.settle();
        }
        Ok(())
    }

    /// Close the trade window. Refused while our offer is locked in a live
    /// trade.
    pub fn close_negotiation(&mut self) -> Result<(), Rejection> {
        let negotiation = self.negotiation.as_mut().ok_or(Rejection::NoNegotiation)?;
        let was_active = negotiation.session().is_active();
        negotiation.close()?;
        let id = negotiation.session().id();
        self.negotiation = None;
        self.clock.cancel(TimerKind::NegotiationPoll);
        if was_active {
            tracing::info!(target: "negotiation", event = "cancelled", session = id);
            self.notify("Trade cancelled", Severity::Info);
        }
        Ok(())
    }

    fn on_negotiation_poll(&mut self, epoch: u64) {
        let (now, timeout) = (self.clock.now(), self.config.negotiation_timeout_ms);
        let Some(negotiation) = self
            .negotiation
            .as_mut()
            .filter(|n| n.session().id() == epoch && n.session().is_active())
        else {
            return;
        };
        let partner = negotiation.session().partner().to_string();
        let progress = negotiation.poll(now, timeout);
        let finished = !negotiation.session().is_active();

        for step in progress {
            self.dirty = true;
            match step {
                Progress::GoldOffered(gold) => {
                    self.notify(format!("{partner} offers {gold} gold"), Severity::Info)
                }
                Progress::ItemOffered(name) => {
                    self.notify(format!("{partner} added {name} to the trade"), Severity::Info)
                }
                Progress::Locked => self.notify(format!("{partner} locked their offer"), Severity::Info),
                Progress::Confirmed => self.notify(format!("{partner} confirmed"), Severity::Info),
                Progress::Completed => self.settle(),
                Progress::Withdrew => {
                    tracing::info!(target: "negotiation", event = "withdrawn", session = epoch);
                    self.notify(format!("{partner} backed out of the trade"), Severity::Error);
                }
                Progress::TimedOut => {
                    tracing::info!(target: "negotiation", event = "timed_out", session = epoch);
                    self.notify(
                        format!("{partner} stopped responding. Trade cancelled."),
                        Severity::Error,
                    );
                }
            }
        }
        if finished {
            self.clock.cancel(TimerKind::NegotiationPoll);
        }
    }

    /// Carry out a successful trade. Safe to call repeatedly: the session
    /// hands its settlement out once.
    fn settle(&mut self) {
        let Some(negotiation) = self.negotiation.as_mut() else {
            return;
        };
        let Some(settlement) = negotiation.take_settlement() else {
            return;
        };
        let id = negotiation.session().id();
        let partner = negotiation.session().partner().to_string();

        for instance in &settlement.items_out {
            if self.inventory.remove_instance(*instance).is_none() {
                tracing::warn!(target: "negotiation", session = id, instance = instance.0, "offered item vanished before settlement");
            }
        }
        self.lose(settlement.gold_out, "trade_out");
        self.credit(settlement.gold_in, "trade_in");

        let mut received = 0u64;
        for item in settlement.items_in {
            let item = self.inventory.reissue(item);
            match self.inventory.place(item) {
                Ok(_) => received += 1,
                Err(lost) => {
                    tracing::warn!(target: "negotiation", session = id, item = %lost.name, "no room for traded item");
                    self.notify(
                        format!("No room for {}; it was left behind", lost.name),
                        Severity::Error,
                    );
                }
            }
        }

        self.clock.cancel(TimerKind::NegotiationPoll);
        self.dirty = true;
        tracing::info!(
            target: "negotiation",
            event = "settled",
            session = id,
            gold_out = settlement.gold_out,
            gold_in = settlement.gold_in,
            items_out = settlement.items_out.len() as u64,
            items_in = received,
        );
        self.notify(format!("Trade with {partner} complete!"), Severity::Success);
    }

    fn on_trade_request(&mut self, epoch: u64) {
        if epoch != self.generation || self.negotiation_open() {
            return;
        }
        self.trade_request = Some(TRADE_PARTNER.to_string());
        self.notify(format!("{TRADE_PARTNER} wants to trade with you"), Severity::Info);
    }

    // ========================================================================
    // Game
    // ========================================================================

    /// Back to a fresh game. Pending timers and any open trade are dropped.
    pub fn reset_all(&mut self) -> Result<(), Rejection> {
        self.clock.cancel_all();
        self.generation += 1;
        self.travel_epoch += 1;

        let before = self.gold;
        self.restore(SaveState::fresh(self.config.starting_gold));
        let delta = self.gold as i64 - before as i64;
        if delta != 0 {
            self.record_gold(delta, "reset");
        }
        self.arm_background();
        tracing::info!(target: "economy", generation = self.generation, "reset");
        self.notify("A new journey begins", Severity::Info);
        Ok(())
    }

    fn check_victory(&mut self) {
        if self.won {
            return;
        }
        let progress = self.win_progress();
        if progress.level >= progress.level_goal
            && progress.gold >= progress.gold_goal
            && progress.quests >= progress.quests_goal
        {
            self.won = true;
            tracing::info!(target: "economy", gold = self.gold, quests = progress.quests, "victory");
            self.notify("You are the King of the Silk Road!", Severity::Success);
        }
    }

    fn win_progress(&self) -> WinProgress {
        WinProgress {
            level: self.level,
            level_goal: MAX_CARAVAN_LEVEL,
            gold: self.gold,
            gold_goal: self.config.win_gold,
            quests: self.quests.completed(),
            quests_goal: self.config.win_quests,
            won: self.won,
        }
    }

    // ========================================================================
    // Read access
    // ========================================================================

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn city(&self) -> CityId {
        self.city
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn stall(&self) -> &Stall {
        &self.stall
    }

    pub fn bazaar(&self) -> &Bazaar {
        &self.bazaar
    }

    pub fn quests(&self) -> &QuestBook {
        &self.quests
    }

    pub fn market(&self) -> &MarketConditions {
        &self.market
    }

    pub fn travel_state(&self) -> TravelState {
        self.travel
    }

    pub fn negotiation(&self) -> Option<&Negotiation> {
        self.negotiation.as_ref()
    }

    pub fn trade_request(&self) -> Option<&str> {
        self.trade_request.as_deref()
    }

    pub fn log(&self) -> &NotificationLog {
        &self.log
    }

    pub fn snapshot(&self) -> EconomySnapshot {
        let tier = catalog::caravan_tier(self.level);
        EconomySnapshot {
            now_ms: self.clock.now(),
            gold: self.gold,
            spendable_gold: self.spendable(),
            escrow: self.escrow(),
            city: CitySnapshot {
                id: self.city,
                name: self.city.name().to_string(),
                description: catalog::city_description(self.city).to_string(),
            },
            caravan: CaravanSnapshot {
                level: self.level,
                name: tier.map(|t| t.name).unwrap_or_default(),
                capacity: self.inventory.capacity(),
                used: self.inventory.occupied(),
                next_tier: catalog::caravan_tier(self.level + 1),
            },
            inventory: self.inventory.slots().to_vec(),
            market: catalog::trade_goods()
                .into_iter()
                .map(|item| MarketPriceSnapshot {
                    price: self.price_of(&item),
                    haggle: self.market.haggle.status(item.id),
                    item,
                })
                .collect(),
            events: self.market.events.clone(),
            travel: TravelSnapshot {
                state: self.travel,
                flavor: self.travel.flavor().map(str::to_string),
            },
            stall: self.stall.slots().to_vec(),
            bazaar: self
                .bazaar
                .stalls()
                .iter()
                .map(|stall| BazaarStallSnapshot {
                    id: stall.id,
                    name: stall.name.clone(),
                    title: stall.title.clone(),
                    offers: self
                        .bazaar
                        .offers_at(stall)
                        .map(|(id, offer)| BazaarOfferSnapshot {
                            id: id.to_u64(),
                            item: offer.item.clone(),
                            price: offer.price,
                        })
                        .collect(),
                })
                .collect(),
            quests: QuestSnapshot {
                available: self.quests.available().to_vec(),
                active: self.quests.active().cloned(),
                completed: self.quests.completed(),
            },
            trade_request: self.trade_request.clone(),
            negotiation: self.negotiation.as_ref().map(|n| {
                let session = n.session();
                NegotiationSnapshot {
                    id: session.id(),
                    partner: session.partner().to_string(),
                    state: session.state(),
                    me: session.side(Party::Me).clone(),
                    them: session.side(Party::Them).clone(),
                    elapsed_ms: n.elapsed(self.clock.now()),
                }
            }),
            log: self.log.entries().to_vec(),
            progress: self.win_progress(),
        }
    }
}

impl std::fmt::Debug for Economy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Economy")
            .field("now_ms", &self.clock.now())
            .field("gold", &self.gold)
            .field("city", &self.city)
            .field("level", &self.level)
            .field("travel", &self.travel)
            .field("negotiation", &self.negotiation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CERAMICS, RAW_SILK, RARE_SWORD};

    fn economy() -> Economy {
        Economy::new(EconomyConfig::default(), 7)
    }

    fn calm() -> EconomyConfig {
        EconomyConfig {
            bandit_chance: 0.0,
            oasis_chance: 0.0,
            market_event_chance: 0.0,
            quest_chance: 0.0,
            ..EconomyConfig::default()
        }
    }

    #[test]
    fn test_fresh_game() {
        let e = economy();
        assert_eq!(e.gold(), 1250);
        assert_eq!(e.city(), CityId::Samarkand);
        assert_eq!(e.level(), 1);
        assert_eq!(e.inventory().capacity(), 10);
        assert!((5..=8).contains(&e.bazaar().stalls().len()));
    }

    #[test]
    fn test_travel_charges_fare_before_arrival() {
        let mut e = economy();
        e.travel(CityId::Changan).unwrap();
        assert_eq!(e.gold(), 1200);
        assert!(e.travel_state().is_traveling());
        assert_eq!(e.travel(CityId::Constantinople), Err(Rejection::Traveling));
    }

    #[test]
    fn test_travel_to_current_city_rejected_before_charging() {
        let mut e = economy();
        assert_eq!(
            e.travel(CityId::Samarkand),
            Err(Rejection::AlreadyInCity(CityId::Samarkand))
        );
        assert_eq!(e.gold(), 1250);
        assert_eq!(e.travel_to("Atlantis"), Err(Rejection::UnknownCity("Atlantis".into())));
    }

    #[test]
    fn test_arrival_after_hundred_steps() {
        let mut e = Economy::new(calm(), 1);
        e.travel(CityId::Constantinople).unwrap();
        e.advance(4999);
        assert!(e.travel_state().is_traveling());
        e.advance(1);
        assert_eq!(e.city(), CityId::Constantinople);
        assert_eq!(e.gold(), 1200);
        assert!(!e.travel_state().is_traveling());
    }

    #[test]
    fn test_arrival_reported_once() {
        let config = EconomyConfig {
            oasis_chance: 1.0,
            ..calm()
        };
        let mut e = Economy::new(config, 3);
        e.travel(CityId::Changan).unwrap();
        assert!(e.tick(4_999).arrival.is_none());

        let arrival = e.tick(1).arrival.unwrap();
        assert_eq!(arrival.city, CityId::Changan);
        assert_eq!(arrival.outcome, ArrivalOutcome::Oasis { bonus: 75 });
        assert_eq!(arrival.new_quest, None);
        assert_eq!(arrival.event, None);
        assert_eq!(e.gold(), 1275);

        assert!(e.tick(1).arrival.is_none());
    }

    #[test]
    fn test_upgrade_example() {
        let mut e = economy();
        e.gold = 1999;
        assert_eq!(
            e.buy_upgrade(2),
            Err(Rejection::InsufficientGold {
                needed: 2000,
                available: 1999
            })
        );
        assert_eq!(e.level(), 1);

        e.gold = 2000;
        e.buy_upgrade(2).unwrap();
        assert_eq!(e.level(), 2);
        assert_eq!(e.inventory().capacity(), 20);
        assert_eq!(e.gold(), 0);
        assert!(matches!(e.buy_upgrade(4), Err(Rejection::TierOutOfSequence { .. })));
    }

    #[test]
    fn test_market_buy_and_sell() {
        let mut e = Economy::new(calm(), 2);
        let slot = e.buy_from_market(CERAMICS).unwrap();
        assert_eq!(e.gold(), 450);
        assert_eq!(e.inventory().get(slot).and_then(|i| i.bought_at), Some(800));
        assert_eq!(e.sell_to_market(slot), Ok(800));
        assert_eq!(e.gold(), 1250);
        assert_eq!(e.buy_from_market(RARE_SWORD), Err(Rejection::UnknownItem));
    }

    #[test]
    fn test_city_actions_blocked_on_the_road() {
        let mut e = economy();
        e.travel(CityId::Changan).unwrap();
        assert_eq!(e.buy_from_market(RAW_SILK), Err(Rejection::Traveling));
        assert_eq!(e.haggle(RAW_SILK), Err(Rejection::Traveling));
    }

    #[test]
    fn test_haggle_once_per_visit() {
        let mut e = economy();
        e.haggle(RAW_SILK).unwrap();
        assert_eq!(e.haggle(RAW_SILK), Err(Rejection::AlreadyHaggled));
        let silk = catalog::item(RAW_SILK).unwrap();
        assert!(e.price_of(&silk) == 120 || e.price_of(&silk) == 165);
    }

    #[test]
    fn test_apply_turns_rejection_into_error_notification() {
        let mut e = economy();
        let outcome = e.apply(|e| e.travel(CityId::Samarkand));
        assert_eq!(outcome.notifications.len(), 1);
        assert_eq!(outcome.notifications[0].severity, Severity::Error);
        assert_eq!(outcome.state.gold, 1250);
    }

    #[test]
    fn test_escrow_blocks_spending() {
        let mut e = Economy::new(calm(), 3);
        e.start_negotiation().unwrap();
        e.set_gold_offer(1000).unwrap();
        e.lock_my_offer().unwrap();
        assert_eq!(e.spendable(), 250);
        assert!(matches!(
            e.buy_from_market(CERAMICS),
            Err(Rejection::InsufficientGold { needed: 800, available: 250 })
        ));
        assert_eq!(e.travel(CityId::Changan), Err(Rejection::NegotiationOpen));
        assert_eq!(e.close_negotiation(), Err(Rejection::OfferLocked));
    }

    #[test]
    fn test_trade_request_arrives() {
        let mut e = economy();
        e.advance(9_999);
        assert!(e.trade_request().is_none());
        e.advance(1);
        assert_eq!(e.trade_request(), Some(TRADE_PARTNER));
    }

    #[test]
    fn test_reset_restores_fresh_game() {
        let mut e = economy();
        e.travel(CityId::Changan).unwrap();
        e.buy_upgrade(2).unwrap_err();
        e.reset_all().unwrap();
        assert_eq!(e.gold(), 1250);
        assert!(!e.travel_state().is_traveling());
        e.advance(10_000);
        assert_eq!(e.city(), CityId::Samarkand);
    }
}
