//! Registry of every farm ever created, keyed by owner id
//!
//! Farms are never removed so a player who drops can reconnect under the
//! same id and find their board and balance untouched.

use crate::farm::{Farm, GameRules};
use log::info;
use shared::PlayerId;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of resolving a login request against the store
#[derive(Debug, Clone)]
pub struct FarmLogin {
    pub player_id: PlayerId,
    pub farm: Arc<Farm>,
    /// True when an existing farm was reattached
    pub reconnected: bool,
}

#[derive(Debug)]
pub struct FarmStore {
    farms: HashMap<PlayerId, Arc<Farm>>,
    rules: GameRules,
}

impl FarmStore {
    pub fn new(rules: GameRules) -> Self {
        Self {
            farms: HashMap::new(),
            rules,
        }
    }

    /// Reattaches to the farm named by `requested_id`, or creates a fresh one
    ///
    /// An absent, empty or unknown id always mints a new identifier; the caller
    /// learns which one through [`FarmLogin::player_id`].
    pub fn login(&mut self, requested_id: Option<&str>) -> FarmLogin {
        if let Some(id) = requested_id.filter(|id| !id.is_empty()) {
            if let Some(farm) = self.farms.get(id) {
                info!("Player {} reattached to existing farm", id);
                return FarmLogin {
                    player_id: id.to_string(),
                    farm: Arc::clone(farm),
                    reconnected: true,
                };
            }
        }

        let player_id = self.mint_id();
        let farm = Arc::new(Farm::new(player_id.clone(), self.rules));
        self.farms.insert(player_id.clone(), Arc::clone(&farm));
        info!("Created farm for new player {}", player_id);

        FarmLogin {
            player_id,
            farm,
            reconnected: false,
        }
    }

    fn mint_id(&self) -> PlayerId {
        loop {
            let id = Uuid::new_v4().to_string();
            if !self.farms.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn get(&self, player_id: &str) -> Option<Arc<Farm>> {
        self.farms.get(player_id).cloned()
    }

    pub(crate) fn contains(&self, player_id: &str) -> bool {
        self.farms.contains_key(player_id)
    }

    /// Handles to every farm, for work done outside the registry lock
    pub fn farms(&self) -> Vec<Arc<Farm>> {
        self.farms.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.farms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.farms.is_empty()
    }
}
