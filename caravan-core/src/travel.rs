use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::catalog::{MarketEvent, TRAVEL_FLAVOR};
use crate::events::ArrivalOutcome;
use crate::quests::Quest;
use crate::types::CityId;

/// Progress is counted in whole percent.
pub const ARRIVED: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TravelState {
    #[default]
    Idle,
    Traveling { destination: CityId, progress: u8 },
}

impl TravelState {
    pub fn is_traveling(&self) -> bool {
        matches!(self, TravelState::Traveling { .. })
    }

    /// Advance one percent. Returns the destination when the caravan arrives,
    /// leaving the state idle.
    pub fn step(&mut self) -> Option<CityId> {
        let TravelState::Traveling {
            destination,
            progress,
        } = self
        else {
            return None;
        };
        *progress = progress.saturating_add(1).min(ARRIVED);
        if *progress < ARRIVED {
            return None;
        }
        let arrived = *destination;
        *self = TravelState::Idle;
        Some(arrived)
    }

    /// Road text for the current leg; changes every 20%.
    pub fn flavor(&self) -> Option<&'static str> {
        match self {
            TravelState::Idle => None,
            TravelState::Traveling { progress, .. } => {
                let index = (*progress as usize / 20).min(TRAVEL_FLAVOR.len() - 1);
                Some(TRAVEL_FLAVOR[index])
            }
        }
    }
}

/// Everything that happened on one arrival, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct Arrival {
    pub city: CityId,
    pub outcome: ArrivalOutcome,
    pub new_quest: Option<Quest>,
    pub event: Option<MarketEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hundred_steps_to_arrive() {
        let mut travel = TravelState::Traveling {
            destination: CityId::Changan,
            progress: 0,
        };
        for _ in 0..99 {
            assert_eq!(travel.step(), None);
        }
        assert_eq!(travel.step(), Some(CityId::Changan));
        assert_eq!(travel, TravelState::Idle);
        assert_eq!(travel.step(), None);
    }

    #[test]
    fn test_flavor_changes_every_fifth() {
        let at = |progress| {
            TravelState::Traveling {
                destination: CityId::Samarkand,
                progress,
            }
            .flavor()
        };
        assert_eq!(at(0), at(19));
        assert_ne!(at(19), at(20));
        assert_eq!(at(99), Some(TRAVEL_FLAVOR[4]));
        assert_eq!(TravelState::Idle.flavor(), None);
    }
}
