//! Simulated competing merchants. The whole bazaar is rebuilt on every
//! arrival; offers are keyed by `OfferId` so buying removes exactly the offer
//! the player picked, and keys from a previous city no longer resolve.

use rand::Rng;
use rand::seq::IndexedRandom;
use slotmap::SlotMap;

use crate::catalog::{self, BAZAAR_NAMES, BAZAAR_TITLES, Item};
use crate::config::EconomyConfig;
use crate::error::Rejection;
use crate::types::{Gold, OfferId};

#[derive(Debug, Clone, PartialEq)]
pub struct BazaarOffer {
    pub item: Item,
    pub price: Gold,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BazaarStall {
    pub id: u64,
    pub name: String,
    pub title: String,
    pub offers: Vec<OfferId>,
}

#[derive(Debug, Clone, Default)]
pub struct Bazaar {
    stalls: Vec<BazaarStall>,
    offers: SlotMap<OfferId, BazaarOffer>,
    next_stall_id: u64,
}

impl Bazaar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stalls(&self) -> &[BazaarStall] {
        &self.stalls
    }

    pub fn offer(&self, id: OfferId) -> Option<&BazaarOffer> {
        self.offers.get(id)
    }

    /// Offers still on display at a stall, in display order.
    pub fn offers_at<'a>(
        &'a self,
        stall: &'a BazaarStall,
    ) -> impl Iterator<Item = (OfferId, &'a BazaarOffer)> + 'a {
        stall
            .offers
            .iter()
            .filter_map(|id| self.offers.get(*id).map(|o| (*id, o)))
    }

    pub fn regenerate<R: Rng>(&mut self, rng: &mut R, config: &EconomyConfig) {
        self.stalls.clear();
        self.offers.clear();

        let goods = catalog::trade_goods();
        let stall_count = rng.random_range(config.bazaar_min_stalls..=config.bazaar_max_stalls);
        for _ in 0..stall_count {
            let id = self.next_stall_id;
            self.next_stall_id += 1;

            let offer_count = rng.random_range(config.bazaar_min_offers..=config.bazaar_max_offers);
            let mut offers = Vec::with_capacity(offer_count);
            for _ in 0..offer_count {
                let Some(item) = goods.choose(rng) else {
                    break;
                };
                let markup = rng.random_range(config.bazaar_min_markup..config.bazaar_max_markup);
                let price = (item.base_price as f64 * markup).floor() as Gold;
                offers.push(self.offers.insert(BazaarOffer {
                    item: item.clone(),
                    price,
                }));
            }

            self.stalls.push(BazaarStall {
                id,
                name: BAZAAR_NAMES.choose(rng).copied().unwrap_or_default().to_string(),
                title: BAZAAR_TITLES.choose(rng).copied().unwrap_or_default().to_string(),
                offers,
            });
        }
    }

    /// Look up an offer that is still on display at `stall_id`.
    pub fn find(&self, stall_id: u64, offer: OfferId) -> Result<(&BazaarStall, &BazaarOffer), Rejection> {
        let stall = self
            .stalls
            .iter()
            .find(|s| s.id == stall_id && s.offers.contains(&offer))
            .ok_or(Rejection::OfferGone)?;
        let found = self.offers.get(offer).ok_or(Rejection::OfferGone)?;
        Ok((stall, found))
    }

    /// Remove a sold offer from its stall.
    pub fn take(&mut self, stall_id: u64, offer: OfferId) -> Result<BazaarOffer, Rejection> {
        self.find(stall_id, offer)?;
        if let Some(stall) = self.stalls.iter_mut().find(|s| s.id == stall_id) {
            stall.offers.retain(|id| *id != offer);
        }
        self.offers.remove(offer).ok_or(Rejection::OfferGone)
    }
}

/// Chance a seller accepts `offered` against `asking`.
pub fn acceptance_chance(offered: Gold, asking: Gold) -> f64 {
    if asking == 0 {
        return 1.0;
    }
    let ratio = offered as f64 / asking as f64;
    if ratio >= 0.9 {
        0.7
    } else if ratio >= 0.75 {
        0.4
    } else {
        0.1
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn generated(seed: u64) -> Bazaar {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut bazaar = Bazaar::new();
        bazaar.regenerate(&mut rng, &EconomyConfig::default());
        bazaar
    }

    #[test]
    fn test_generation_bounds() {
        for seed in 0..50 {
            let bazaar = generated(seed);
            assert!((5..=8).contains(&bazaar.stalls().len()));
            for stall in bazaar.stalls() {
                assert!((2..=3).contains(&stall.offers.len()));
                assert!(BAZAAR_NAMES.contains(&stall.name.as_str()));
                assert!(BAZAAR_TITLES.contains(&stall.title.as_str()));
                for (_, offer) in bazaar.offers_at(stall) {
                    let base = offer.item.base_price as f64;
                    assert!(offer.price as f64 >= (base * 0.9).floor());
                    assert!((offer.price as f64) < base * 1.5);
                }
            }
        }
    }

    #[test]
    fn test_take_removes_only_that_offer() {
        let mut bazaar = generated(3);
        let stall = bazaar.stalls()[0].clone();
        let first = stall.offers[0];
        let second = stall.offers[1];

        assert!(bazaar.take(stall.id, first).is_ok());
        assert_eq!(bazaar.take(stall.id, first), Err(Rejection::OfferGone));
        assert!(bazaar.find(stall.id, second).is_ok());
        assert_eq!(bazaar.stalls()[0].offers.len(), stall.offers.len() - 1);
    }

    #[test]
    fn test_offer_on_wrong_stall_is_gone() {
        let bazaar = generated(5);
        let a = &bazaar.stalls()[0];
        let b = &bazaar.stalls()[1];
        assert_eq!(bazaar.find(b.id, a.offers[0]).err(), Some(Rejection::OfferGone));
    }

    #[test]
    fn test_regeneration_invalidates_old_keys() {
        let mut rng = StdRng::seed_from_u64(9);
        let config = EconomyConfig::default();
        let mut bazaar = Bazaar::new();
        bazaar.regenerate(&mut rng, &config);
        let old = bazaar.stalls()[0].clone();

        bazaar.regenerate(&mut rng, &config);
        assert!(bazaar.offer(old.offers[0]).is_none());
        assert!(bazaar.stalls().iter().all(|s| s.id != old.id));
    }

    #[test]
    fn test_acceptance_thresholds() {
        assert_eq!(acceptance_chance(90, 100), 0.7);
        assert_eq!(acceptance_chance(89, 100), 0.4);
        assert_eq!(acceptance_chance(75, 100), 0.4);
        assert_eq!(acceptance_chance(74, 100), 0.1);
        assert_eq!(acceptance_chance(150, 100), 0.7);
    }
}
