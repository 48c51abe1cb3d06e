use caravan_core::catalog::{self, CERAMICS, RARE_SWORD, RAW_SILK};
use caravan_core::inventory::ItemInstance;
use caravan_core::negotiation::{PeerAction, RemotePeer, SessionState, TableEvent};
use caravan_core::save::{MemoryStore, SaveState};
use caravan_core::{CityId, Economy, EconomyConfig, InstanceId, Rejection, Severity};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn calm() -> EconomyConfig {
    EconomyConfig {
        bandit_chance: 0.0,
        oasis_chance: 0.0,
        market_event_chance: 0.0,
        quest_chance: 0.0,
        ..EconomyConfig::default()
    }
}

fn silk(id: u64) -> ItemInstance {
    let def = catalog::item(RAW_SILK).unwrap();
    ItemInstance {
        instance_id: InstanceId(id),
        item_id: def.id,
        name: def.name,
        icon: def.icon,
        bought_at: Some(def.base_price),
    }
}

fn texts(notifications: &[caravan_core::Notification]) -> Vec<&str> {
    notifications.iter().map(|n| n.text.as_str()).collect()
}

#[test]
fn scripted_trade_settles_exactly_once() {
    let mut e = Economy::new(calm(), 21);
    let slot = e.buy_from_market(CERAMICS).unwrap();
    let ceramics = e.inventory().get(slot).unwrap().instance_id;
    assert_eq!(e.gold(), 450);

    assert_eq!(e.start_negotiation(), Ok(1));
    e.set_gold_offer(100).unwrap();
    e.offer_item(ceramics).unwrap();

    // The offered item stays put but cannot leave by another route.
    assert_eq!(e.sell_to_market(slot), Err(Rejection::ItemCommitted));
    assert_eq!(e.list_stall_item(slot, 900), Err(Rejection::ItemCommitted));
    assert_eq!(e.travel(CityId::Changan), Err(Rejection::NegotiationOpen));

    // Sword at 2s, lock at 4s.
    let outcome = e.tick(4_000);
    assert!(texts(&outcome.notifications).contains(&"ShadowHunter locked their offer"));
    let them = &outcome.state.negotiation.as_ref().unwrap().them;
    assert_eq!(them.items.len(), 1);
    assert!(them.locked);

    e.lock_my_offer().unwrap();
    assert_eq!((e.escrow(), e.spendable()), (100, 350));

    let outcome = e.tick(1_000);
    assert!(texts(&outcome.notifications).contains(&"ShadowHunter confirmed"));

    let outcome = e.apply(|e| e.confirm_my_offer());
    assert!(
        texts(&outcome.notifications).contains(&"Trade with ShadowHunter complete!"),
        "{:?}",
        outcome.notifications
    );
    assert_eq!(e.gold(), 350);
    assert_eq!(e.escrow(), 0);
    assert_eq!(e.inventory().count_of(CERAMICS), 0);
    assert_eq!(e.inventory().count_of(RARE_SWORD), 1);
    assert_eq!(
        outcome.state.negotiation.as_ref().map(|n| n.state),
        Some(SessionState::Success)
    );

    assert_eq!(e.confirm_my_offer(), Err(Rejection::NegotiationFinished));
    e.advance(10_000);
    assert_eq!(e.gold(), 350);
    assert_eq!(e.inventory().count_of(RARE_SWORD), 1);
}

#[test]
fn traded_item_without_room_is_lost_with_warning() {
    let mut save = SaveState::fresh(1250);
    for i in 0..10 {
        save.inventory[i] = Some(silk(i as u64 + 1));
    }
    let store = MemoryStore::with_blob(save.to_json().unwrap());
    let mut e = Economy::with_store(calm(), StdRng::seed_from_u64(5), Box::new(store));
    assert!(!e.inventory().has_room());

    e.start_negotiation().unwrap();
    e.lock_my_offer().unwrap();
    e.advance(5_000);

    let outcome = e.apply(|e| e.confirm_my_offer());
    let lost = outcome
        .notifications
        .iter()
        .find(|n| n.text.starts_with("No room for Rare Sword"))
        .expect("lost item notification");
    assert_eq!(lost.severity, Severity::Error);
    assert_eq!(e.inventory().occupied(), 10);
    assert_eq!(e.inventory().count_of(RARE_SWORD), 0);
    assert_eq!(e.gold(), 1250);
}

#[test]
fn remote_trade_moves_gold_both_ways() {
    let mut e = Economy::new(calm(), 8);
    let (peer, link) = RemotePeer::pair("Courier", 1000);
    e.start_negotiation_with(Box::new(peer)).unwrap();

    e.set_gold_offer(300).unwrap();
    e.lock_my_offer().unwrap();
    assert_eq!(e.escrow(), 300);

    link.send(PeerAction::OfferGold(500));
    link.send(PeerAction::OfferItem(silk(77)));
    link.send(PeerAction::Lock);
    e.advance(250);
    assert!(e.negotiation().unwrap().session().is_active());

    e.confirm_my_offer().unwrap();
    assert_eq!(e.gold(), 1250, "nothing moves until both confirm");

    link.send(PeerAction::Confirm);
    let outcome = e.tick(250);
    assert!(texts(&outcome.notifications).contains(&"Trade with Courier complete!"));

    assert_eq!(e.gold(), 1250 - 300 + 500);
    assert_eq!(e.inventory().count_of(RAW_SILK), 1);
    assert_eq!(
        link.received(),
        vec![
            TableEvent::GoldOffered(300),
            TableEvent::Locked,
            TableEvent::Confirmed,
            TableEvent::Settled,
        ]
    );
}

#[test]
fn silent_partner_times_out_and_releases_escrow() {
    let mut e = Economy::new(calm(), 13);
    let (peer, _link) = RemotePeer::pair("Courier", 0);
    e.start_negotiation_with(Box::new(peer)).unwrap();
    e.set_gold_offer(1000).unwrap();
    e.lock_my_offer().unwrap();

    assert_eq!(
        e.buy_from_market(CERAMICS),
        Err(Rejection::InsufficientGold {
            needed: 800,
            available: 250
        })
    );
    assert_eq!(e.close_negotiation(), Err(Rejection::OfferLocked));

    let outcome = e.tick(60_000);
    assert!(
        outcome
            .notifications
            .iter()
            .any(|n| n.text.contains("stopped responding")),
        "{:?}",
        outcome.notifications
    );
    assert_eq!(e.escrow(), 0);
    assert_eq!(e.gold(), 1250);
    assert_eq!(
        e.negotiation().map(|n| n.session().state()),
        Some(SessionState::Cancelled)
    );
    assert!(e.buy_from_market(CERAMICS).is_ok());
}

#[test]
fn partner_can_back_out() {
    let mut e = Economy::new(calm(), 2);
    let (peer, link) = RemotePeer::pair("Courier", 0);
    e.start_negotiation_with(Box::new(peer)).unwrap();
    e.set_gold_offer(500).unwrap();
    e.lock_my_offer().unwrap();

    link.send(PeerAction::Withdraw);
    let outcome = e.tick(250);
    assert!(texts(&outcome.notifications).contains(&"Courier backed out of the trade"));
    assert_eq!(e.escrow(), 0);
    assert_eq!(e.gold(), 1250);
    assert_eq!(e.set_gold_offer(10), Err(Rejection::NegotiationFinished));

    // A finished trade no longer holds the caravan in town.
    e.travel(CityId::Changan).unwrap();
}

#[test]
fn trade_request_arrives_after_ten_seconds() {
    let mut e = Economy::new(calm(), 4);
    e.advance(9_999);
    assert_eq!(e.trade_request(), None);

    let outcome = e.tick(1);
    assert_eq!(outcome.state.trade_request.as_deref(), Some("ShadowHunter"));

    e.start_negotiation().unwrap();
    assert_eq!(e.trade_request(), None);
    assert_eq!(e.negotiation().unwrap().session().partner(), "ShadowHunter");
}

#[test]
fn closing_before_lock_stops_the_partner() {
    let mut e = Economy::new(calm(), 6);
    e.start_negotiation().unwrap();
    e.set_gold_offer(200).unwrap();
    e.close_negotiation().unwrap();
    assert!(e.negotiation().is_none());

    let outcome = e.tick(8_000);
    assert!(
        !outcome
            .notifications
            .iter()
            .any(|n| n.text.starts_with("ShadowHunter")),
        "{:?}",
        outcome.notifications
    );
    assert_eq!(e.gold(), 1250);
    assert_eq!(e.close_negotiation(), Err(Rejection::NoNegotiation));
}
