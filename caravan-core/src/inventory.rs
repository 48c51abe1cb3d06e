use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::catalog::{Item, MAX_SLOTS};
use crate::error::Rejection;
use crate::types::{Gold, InstanceId, ItemId};

/// One owned item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct ItemInstance {
    #[serde(alias = "uniqueId")]
    pub instance_id: InstanceId,
    #[serde(alias = "id")]
    pub item_id: ItemId,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    /// Price paid when the item was bought, if it was bought.
    #[serde(default)]
    pub bought_at: Option<Gold>,
}

/// Caravan cargo: a fixed row of `MAX_SLOTS` slots, of which the first
/// `capacity` are usable.
#[derive(Debug, Clone)]
pub struct Inventory {
    slots: Vec<Option<ItemInstance>>,
    capacity: usize,
    next_instance: u64,
}

impl Inventory {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; MAX_SLOTS],
            capacity: capacity.min(MAX_SLOTS),
            next_instance: 1,
        }
    }

    /// Rebuild from saved slots. Items sitting in locked slots are moved into
    /// free usable slots; any that do not fit are returned as lost. Repeated
    /// instance ids are reissued.
    pub fn from_saved(saved: Vec<Option<ItemInstance>>, capacity: usize) -> (Self, Vec<ItemInstance>) {
        let mut inventory = Self::new(capacity);
        let mut stray = Vec::new();
        for (i, slot) in saved.into_iter().enumerate() {
            match slot {
                Some(item) if i < inventory.capacity => inventory.slots[i] = Some(item),
                Some(item) => stray.push(item),
                None => {}
            }
        }
        let mut lost = Vec::new();
        for item in stray {
            if let Err(rejected) = inventory.place(item) {
                lost.push(rejected);
            }
        }
        inventory.next_instance = inventory
            .items()
            .map(|item| item.instance_id.0 + 1)
            .max()
            .unwrap_or(1);

        let mut seen = HashSet::new();
        let mut next = inventory.next_instance;
        for item in inventory.slots.iter_mut().flatten() {
            if !seen.insert(item.instance_id) {
                tracing::warn!(target: "save", item = %item.name, id = item.instance_id.0, "duplicate instance id reissued");
                item.instance_id = InstanceId(next);
                next += 1;
            }
        }
        inventory.next_instance = next;
        (inventory, lost)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Capacity only grows; caravan upgrades are irreversible.
    pub fn grow_to(&mut self, capacity: usize) {
        self.capacity = self.capacity.max(capacity.min(MAX_SLOTS));
    }

    pub fn slots(&self) -> &[Option<ItemInstance>] {
        &self.slots
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemInstance> {
        self.slots.iter().flatten()
    }

    pub fn occupied(&self) -> usize {
        self.items().count()
    }

    pub fn first_free(&self) -> Option<usize> {
        self.slots[..self.capacity].iter().position(Option::is_none)
    }

    pub fn has_room(&self) -> bool {
        self.first_free().is_some()
    }

    pub fn get(&self, index: usize) -> Option<&ItemInstance> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Create a fresh instance of a catalog item with a new unique id.
    pub fn mint(&mut self, item: &Item, bought_at: Option<Gold>) -> ItemInstance {
        let instance_id = InstanceId(self.next_instance);
        self.next_instance += 1;
        ItemInstance {
            instance_id,
            item_id: item.id,
            name: item.name.clone(),
            icon: item.icon.clone(),
            bought_at,
        }
    }

    /// Give an item that came from elsewhere an id that is unique here.
    pub fn reissue(&mut self, mut item: ItemInstance) -> ItemInstance {
        item.instance_id = InstanceId(self.next_instance);
        self.next_instance += 1;
        item
    }

    /// Never mint `id` or anything below it again.
    pub fn reserve_ids_through(&mut self, id: InstanceId) {
        self.next_instance = self.next_instance.max(id.0 + 1);
    }

    /// Put an item in the first free usable slot, handing it back if full.
    pub fn place(&mut self, item: ItemInstance) -> Result<usize, ItemInstance> {
        match self.first_free() {
            Some(index) => {
                self.slots[index] = Some(item);
                Ok(index)
            }
            None => Err(item),
        }
    }

    pub fn insert(&mut self, item: ItemInstance) -> Result<usize, Rejection> {
        self.place(item).map_err(|_| Rejection::InventoryFull)
    }

    /// Remove and return the item in `index`.
    pub fn take(&mut self, index: usize) -> Result<ItemInstance, Rejection> {
        self.check_usable(index)?;
        self.slots[index].take().ok_or(Rejection::EmptySlot(index))
    }

    pub fn check_usable(&self, index: usize) -> Result<(), Rejection> {
        if index >= self.capacity {
            return Err(Rejection::SlotLocked(index));
        }
        Ok(())
    }

    pub fn count_of(&self, item: ItemId) -> usize {
        self.items().filter(|i| i.item_id == item).count()
    }

    /// Remove `quantity` items of a kind, earliest slots first. Removes
    /// nothing unless enough are held.
    pub fn remove_earliest(&mut self, item: ItemId, quantity: usize) -> Option<Vec<ItemInstance>> {
        if self.count_of(item) < quantity {
            return None;
        }
        let mut removed = Vec::with_capacity(quantity);
        for slot in self.slots.iter_mut() {
            if removed.len() == quantity {
                break;
            }
            if slot.as_ref().is_some_and(|i| i.item_id == item) {
                removed.extend(slot.take());
            }
        }
        Some(removed)
    }

    pub fn position_of(&self, instance: InstanceId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|i| i.instance_id == instance))
    }

    pub fn remove_instance(&mut self, instance: InstanceId) -> Option<ItemInstance> {
        let index = self.position_of(instance)?;
        self.slots[index].take()
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new(10)
    }
}
