//! Supply-run quests: deliver N of an item to a city for a gold reward.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::catalog;
use crate::config::EconomyConfig;
use crate::error::Rejection;
use crate::inventory::{Inventory, ItemInstance};
use crate::types::{CityId, Gold, ItemId, QuestId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    pub id: QuestId,
    pub title: String,
    pub description: String,
    pub item: ItemId,
    pub item_name: String,
    pub quantity: u32,
    pub reward: Gold,
    pub target_city: CityId,
}

/// Roll for a new quest offered in `arrival`. The target is never `arrival`.
pub fn generate_quest<R: Rng>(
    rng: &mut R,
    arrival: CityId,
    id: QuestId,
    config: &EconomyConfig,
) -> Option<Quest> {
    if rng.random::<f64>() >= config.quest_chance {
        return None;
    }
    let goods = catalog::trade_goods();
    let item = goods.choose(rng)?;
    let quantity = rng.random_range(config.quest_min_quantity..=config.quest_max_quantity);
    let reward = quantity as Gold * config.quest_reward_per_unit + config.quest_reward_base;
    let others: Vec<CityId> = CityId::all().filter(|c| *c != arrival).collect();
    let target_city = *others.choose(rng)?;

    Some(Quest {
        id,
        title: format!("Supply Run: {target_city}"),
        description: format!(
            "The Governor of {target_city} is demanding {quantity} {}.",
            item.name
        ),
        item: item.id,
        item_name: item.name.clone(),
        quantity,
        reward,
        target_city,
    })
}

/// Result of checking the active quest on arrival.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestCheck {
    /// No active quest, or it targets another city.
    NotHere,
    Completed {
        quest: Quest,
        consumed: Vec<ItemInstance>,
    },
    /// Right city, not enough goods. Nothing was touched.
    Short { quest: Quest, owed: u32 },
}

#[derive(Debug, Clone)]
pub struct QuestBook {
    available: Vec<Quest>,
    active: Option<Quest>,
    completed: u32,
    next_id: u64,
}

impl QuestBook {
    pub fn new() -> Self {
        Self {
            available: Vec::new(),
            active: None,
            completed: 0,
            next_id: 1,
        }
    }

    pub fn from_saved(available: Vec<Quest>, active: Option<Quest>, completed: u32) -> Self {
        let next_id = available
            .iter()
            .chain(active.iter())
            .map(|q| q.id.0 + 1)
            .max()
            .unwrap_or(1);
        Self {
            available,
            active,
            completed,
            next_id,
        }
    }

    pub fn available(&self) -> &[Quest] {
        &self.available
    }

    pub fn active(&self) -> Option<&Quest> {
        self.active.as_ref()
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    /// Maybe post a new quest on arrival, if the board has room.
    pub fn offer_on_arrival<R: Rng>(
        &mut self,
        rng: &mut R,
        arrival: CityId,
        config: &EconomyConfig,
    ) -> Option<&Quest> {
        if self.available.len() >= config.max_available_quests {
            return None;
        }
        let quest = generate_quest(rng, arrival, QuestId(self.next_id), config)?;
        self.next_id += 1;
        self.available.push(quest);
        self.available.last()
    }

    pub fn accept(&mut self, id: QuestId) -> Result<&Quest, Rejection> {
        if self.active.is_some() {
            return Err(Rejection::QuestActive);
        }
        let index = self
            .available
            .iter()
            .position(|q| q.id == id)
            .ok_or(Rejection::UnknownQuest)?;
        let quest = self.available.remove(index);
        Ok(self.active.insert(quest))
    }

    /// Deliver the active quest if we are in its city with enough goods.
    /// Items are taken from the earliest slots first. The reward is the
    /// caller's to pay.
    pub fn check_completion(&mut self, city: CityId, inventory: &mut Inventory) -> QuestCheck {
        let Some(quest) = self.active.take_if(|q| q.target_city == city) else {
            return QuestCheck::NotHere;
        };

        let required = quest.quantity as usize;
        match inventory.remove_earliest(quest.item, required) {
            Some(consumed) => {
                self.completed += 1;
                QuestCheck::Completed { quest, consumed }
            }
            None => {
                let owed = (required - inventory.count_of(quest.item)) as u32;
                self.active = Some(quest.clone());
                QuestCheck::Short { quest, owed }
            }
        }
    }
}

impl Default for QuestBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::catalog::{CERAMICS, RAW_SILK};

    fn quest(id: u64, item: ItemId, quantity: u32, target_city: CityId) -> Quest {
        Quest {
            id: QuestId(id),
            title: String::new(),
            description: String::new(),
            item,
            item_name: String::new(),
            quantity,
            reward: quantity as Gold * 400 + 1000,
            target_city,
        }
    }

    fn fill(inv: &mut Inventory, kinds: &[ItemId]) {
        for kind in kinds {
            let item = catalog::item(*kind).unwrap();
            let instance = inv.mint(&item, None);
            inv.insert(instance).unwrap();
        }
    }

    #[test]
    fn test_generated_quests_follow_the_rules() {
        let mut rng = StdRng::seed_from_u64(21);
        let config = EconomyConfig {
            quest_chance: 1.0,
            ..EconomyConfig::default()
        };
        for i in 0..200 {
            let q = generate_quest(&mut rng, CityId::Samarkand, QuestId(i), &config).unwrap();
            assert!((3..=7).contains(&q.quantity));
            assert_eq!(q.reward, q.quantity as Gold * 400 + 1000);
            assert_ne!(q.target_city, CityId::Samarkand);
            assert!(catalog::trade_goods().iter().any(|g| g.id == q.item));
        }
    }

    #[test]
    fn test_board_holds_at_most_three() {
        let mut rng = StdRng::seed_from_u64(8);
        let config = EconomyConfig {
            quest_chance: 1.0,
            ..EconomyConfig::default()
        };
        let mut book = QuestBook::new();
        for _ in 0..10 {
            book.offer_on_arrival(&mut rng, CityId::Changan, &config);
        }
        assert_eq!(book.available().len(), 3);
    }

    #[test]
    fn test_accept_moves_quest_to_active() {
        let mut book = QuestBook::from_saved(
            vec![
                quest(1, RAW_SILK, 3, CityId::Changan),
                quest(2, CERAMICS, 4, CityId::Constantinople),
            ],
            None,
            0,
        );
        assert_eq!(book.accept(QuestId(2)).map(|q| q.id), Ok(QuestId(2)));
        assert_eq!(book.available().len(), 1);
        assert_eq!(book.accept(QuestId(1)), Err(Rejection::QuestActive));
        assert_eq!(book.available().len(), 1);
    }

    #[test]
    fn test_accept_unknown_quest() {
        let mut book = QuestBook::new();
        assert_eq!(book.accept(QuestId(9)), Err(Rejection::UnknownQuest));
    }

    #[test]
    fn test_completion_consumes_exact_quantity() {
        let mut inv = Inventory::new(10);
        fill(&mut inv, &[RAW_SILK, CERAMICS, RAW_SILK, RAW_SILK, RAW_SILK]);
        let mut book = QuestBook::from_saved(vec![], Some(quest(1, RAW_SILK, 3, CityId::Changan)), 2);

        let check = book.check_completion(CityId::Changan, &mut inv);
        let QuestCheck::Completed { quest, consumed } = check else {
            panic!("expected completion, got {check:?}");
        };
        assert_eq!(quest.reward, 2200);
        assert_eq!(consumed.len(), 3);
        assert_eq!(inv.count_of(RAW_SILK), 1);
        assert!(inv.get(4).is_some(), "latest silk stays");
        assert_eq!(book.completed(), 3);
        assert!(book.active().is_none());
    }

    #[test]
    fn test_short_delivery_changes_nothing() {
        let mut inv = Inventory::new(10);
        fill(&mut inv, &[RAW_SILK, RAW_SILK]);
        let mut book = QuestBook::from_saved(vec![], Some(quest(1, RAW_SILK, 5, CityId::Changan)), 0);

        let check = book.check_completion(CityId::Changan, &mut inv);
        assert!(matches!(check, QuestCheck::Short { owed: 3, .. }));
        assert_eq!(inv.count_of(RAW_SILK), 2);
        assert!(book.active().is_some());
        assert_eq!(book.completed(), 0);
    }

    #[test]
    fn test_wrong_city_is_not_checked() {
        let mut inv = Inventory::new(10);
        fill(&mut inv, &[RAW_SILK, RAW_SILK, RAW_SILK]);
        let mut book = QuestBook::from_saved(vec![], Some(quest(1, RAW_SILK, 3, CityId::Changan)), 0);
        assert_eq!(
            book.check_completion(CityId::Samarkand, &mut inv),
            QuestCheck::NotHere
        );
        assert_eq!(inv.count_of(RAW_SILK), 3);
    }
}
