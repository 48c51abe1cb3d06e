//! The player's personal stall and the bot buyers that browse it.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::catalog::{self, STALL_BUYERS};
use crate::config::EconomyConfig;
use crate::error::Rejection;
use crate::events::MarketConditions;
use crate::inventory::{Inventory, ItemInstance};
use crate::pricing;
use crate::types::{CityId, Gold};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct StallListing {
    pub item: ItemInstance,
    pub price: Gold,
    /// Inventory slot the item came from.
    pub source_index: usize,
}

/// A bot bought a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct StallSale {
    pub listing: StallListing,
    pub buyer: &'static str,
    pub fair_price: Gold,
}

#[derive(Debug, Clone)]
pub struct Stall {
    slots: Vec<Option<StallListing>>,
}

impl Stall {
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    /// Rebuild from saved listings, keeping the stall at `size` slots. Listings
    /// that do not fit are returned.
    pub fn from_saved(saved: Vec<Option<StallListing>>, size: usize) -> (Self, Vec<StallListing>) {
        let mut stall = Self::new(size);
        let mut overflow = Vec::new();
        for listing in saved.into_iter().flatten() {
            match stall.slots.iter_mut().find(|s| s.is_none()) {
                Some(slot) => *slot = Some(listing),
                None => overflow.push(listing),
            }
        }
        (stall, overflow)
    }

    pub fn slots(&self) -> &[Option<StallListing>] {
        &self.slots
    }

    pub fn listings(&self) -> impl Iterator<Item = &StallListing> {
        self.slots.iter().flatten()
    }

    /// Move the item in inventory slot `index` onto the first free stall slot.
    pub fn list(
        &mut self,
        inventory: &mut Inventory,
        index: usize,
        price: Gold,
    ) -> Result<usize, Rejection> {
        if price == 0 {
            return Err(Rejection::InvalidPrice);
        }
        let free = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Rejection::StallFull)?;
        let item = inventory.take(index)?;
        self.slots[free] = Some(StallListing {
            item,
            price,
            source_index: index,
        });
        Ok(free)
    }

    /// Take a listing down, returning the item to the first free inventory
    /// slot.
    pub fn remove(&mut self, index: usize, inventory: &mut Inventory) -> Result<usize, Rejection> {
        let slot = self.slots.get_mut(index).ok_or(Rejection::EmptySlot(index))?;
        if slot.is_none() {
            return Err(Rejection::EmptySlot(index));
        }
        if !inventory.has_room() {
            return Err(Rejection::InventoryFull);
        }
        let listing = slot.take().ok_or(Rejection::EmptySlot(index))?;
        inventory.insert(listing.item)
    }

    /// One browsing bot: looks at a random listing and buys it if the asking
    /// price is within reach of the fair price and the coin flip lands.
    pub fn tick<R: Rng>(
        &mut self,
        rng: &mut R,
        city: CityId,
        market: &MarketConditions,
        config: &EconomyConfig,
    ) -> Option<StallSale> {
        let occupied: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
            .collect();
        let index = *occupied.choose(rng)?;
        let listing = self.slots[index].as_ref()?;

        let item = catalog::item(listing.item.item_id)?;
        let fair_price = pricing::price(&item, city, &market.events, &market.haggle);
        let ceiling = fair_price as f64 * config.stall_markup_limit;
        if listing.price as f64 > ceiling || rng.random::<f64>() >= config.stall_sale_chance {
            return None;
        }

        let listing = self.slots[index].take()?;
        let buyer = STALL_BUYERS.choose(rng).copied().unwrap_or(STALL_BUYERS[0]);
        Some(StallSale {
            listing,
            buyer,
            fair_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::catalog::{CERAMICS, RAW_SILK};
    use crate::types::ItemId;

    fn stocked(kinds: &[ItemId]) -> Inventory {
        let mut inv = Inventory::new(10);
        for kind in kinds {
            let item = catalog::item(*kind).unwrap();
            let instance = inv.mint(&item, Some(item.base_price));
            inv.insert(instance).unwrap();
        }
        inv
    }

    #[test]
    fn test_listing_moves_item_out_of_inventory() {
        let mut inv = stocked(&[RAW_SILK, CERAMICS]);
        let mut stall = Stall::new(4);

        assert_eq!(stall.list(&mut inv, 1, 900), Ok(0));
        assert_eq!(inv.occupied(), 1);
        assert!(inv.get(1).is_none());
        let listing = stall.slots()[0].as_ref().unwrap();
        assert_eq!(listing.item.item_id, CERAMICS);
        assert_eq!(listing.source_index, 1);
    }

    #[test]
    fn test_zero_price_rejected_without_moving_item() {
        let mut inv = stocked(&[RAW_SILK]);
        let mut stall = Stall::new(4);
        assert_eq!(stall.list(&mut inv, 0, 0), Err(Rejection::InvalidPrice));
        assert_eq!(inv.occupied(), 1);
        assert_eq!(stall.listings().count(), 0);
    }

    #[test]
    fn test_full_stall_rejected() {
        let mut inv = stocked(&[RAW_SILK, RAW_SILK, RAW_SILK, RAW_SILK, RAW_SILK]);
        let mut stall = Stall::new(4);
        for i in 0..4 {
            stall.list(&mut inv, i, 100).unwrap();
        }
        assert_eq!(stall.list(&mut inv, 4, 100), Err(Rejection::StallFull));
        assert!(inv.get(4).is_some());
    }

    #[test]
    fn test_remove_restores_to_first_free_slot() {
        let mut inv = stocked(&[RAW_SILK, CERAMICS]);
        let mut stall = Stall::new(4);
        stall.list(&mut inv, 1, 900).unwrap();
        stall.list(&mut inv, 0, 200).unwrap();

        // Ceramics came from slot 1 but slot 0 is now the first free one.
        assert_eq!(stall.remove(0, &mut inv), Ok(0));
        assert_eq!(inv.get(0).map(|i| i.item_id), Some(CERAMICS));
        assert_eq!(stall.remove(0, &mut inv), Err(Rejection::EmptySlot(0)));
    }

    #[test]
    fn test_remove_fails_when_inventory_full() {
        let mut inv = Inventory::new(1);
        let silk = catalog::item(RAW_SILK).unwrap();
        let first = inv.mint(&silk, None);
        inv.insert(first).unwrap();
        let mut stall = Stall::new(4);
        stall.list(&mut inv, 0, 100).unwrap();
        let refill = inv.mint(&silk, None);
        inv.insert(refill).unwrap();

        assert_eq!(stall.remove(0, &mut inv), Err(Rejection::InventoryFull));
        assert!(stall.slots()[0].is_some());
    }

    #[test]
    fn test_overpriced_listing_never_sells() {
        let mut inv = stocked(&[RAW_SILK]);
        let mut stall = Stall::new(4);
        // Fair silk price in Samarkand is 150; 125% is 187.5.
        stall.list(&mut inv, 0, 188).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let market = MarketConditions::default();
        let config = EconomyConfig::default();
        for _ in 0..200 {
            assert!(stall.tick(&mut rng, CityId::Samarkand, &market, &config).is_none());
        }
        assert!(stall.slots()[0].is_some());
    }

    #[test]
    fn test_fair_listing_eventually_sells() {
        let mut inv = stocked(&[RAW_SILK]);
        let mut stall = Stall::new(4);
        stall.list(&mut inv, 0, 187).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let market = MarketConditions::default();
        let config = EconomyConfig::default();

        let sale = (0..100)
            .find_map(|_| stall.tick(&mut rng, CityId::Samarkand, &market, &config))
            .expect("a fair listing sells within 100 ticks");
        assert_eq!(sale.listing.price, 187);
        assert_eq!(sale.fair_price, 150);
        assert!(STALL_BUYERS.contains(&sale.buyer));
        assert_eq!(stall.listings().count(), 0);
    }

    #[test]
    fn test_empty_stall_tick_is_noop() {
        let mut stall = Stall::new(4);
        let mut rng = StdRng::seed_from_u64(1);
        let market = MarketConditions::default();
        assert!(
            stall
                .tick(&mut rng, CityId::Changan, &market, &EconomyConfig::default())
                .is_none()
        );
    }
}
