//! The shared server state: farms, viewer sets and live sessions
//!
//! One `World` is built at startup and handed to every connection worker and
//! the growth ticker. Structural changes (login, view switch, logout) take the
//! registry write lock and so happen as one atomic unit. Farm actions only hold
//! the read lock while they look up and mutate a farm; the farm's own mutex
//! serializes them, so actions on different farms run in parallel.

use crate::error::ActionError;
use crate::farm::{Farm, GameRules};
use crate::store::FarmStore;
use crate::viewers::{SessionId, SessionSignal, ViewerRegistry};
use log::{debug, info};
use shared::{PlayerId, ServerMessage};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Handle returned to a connection worker after a successful login
#[derive(Debug, Clone)]
pub struct Login {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub signal: Arc<SessionSignal>,
    pub reconnected: bool,
}

#[derive(Debug)]
struct SessionEntry {
    player_id: PlayerId,
    signal: Arc<SessionSignal>,
}

#[derive(Debug)]
struct Registries {
    farms: FarmStore,
    viewers: ViewerRegistry,
    sessions: HashMap<SessionId, SessionEntry>,
    /// owner id -> that owner's live session
    owners: HashMap<PlayerId, SessionId>,
}

impl Registries {
    fn player_of(&self, session: SessionId) -> Result<&PlayerId, ActionError> {
        self.sessions
            .get(&session)
            .map(|entry| &entry.player_id)
            .ok_or(ActionError::SessionClosed)
    }

    fn own_farm(&self, session: SessionId) -> Result<(PlayerId, Arc<Farm>), ActionError> {
        let player_id = self.player_of(session)?;
        let farm = self
            .farms
            .get(player_id)
            .ok_or_else(|| ActionError::UnknownPlayer(player_id.clone()))?;
        Ok((player_id.clone(), farm))
    }

    /// An owner is home while their live session displays their own farm
    fn is_home(&self, owner: &str) -> bool {
        self.owners
            .get(owner)
            .and_then(|session| self.viewers.viewing(*session))
            .is_some_and(|viewing| viewing == owner)
    }

    fn detach_session(&mut self, session: SessionId) -> Option<SessionEntry> {
        let entry = self.sessions.remove(&session)?;
        if self.owners.get(&entry.player_id) == Some(&session) {
            self.owners.remove(&entry.player_id);
        }
        self.viewers.remove(session);
        Some(entry)
    }

    fn roster(&self) -> BTreeMap<PlayerId, PlayerId> {
        self.sessions
            .iter()
            .filter_map(|(session, entry)| {
                self.viewers
                    .viewing(*session)
                    .map(|viewing| (entry.player_id.clone(), viewing.clone()))
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct World {
    registries: RwLock<Registries>,
    next_session_id: AtomicU64,
}

impl World {
    pub fn new(rules: GameRules) -> Self {
        Self {
            registries: RwLock::new(Registries {
                farms: FarmStore::new(rules),
                viewers: ViewerRegistry::new(),
                sessions: HashMap::new(),
                owners: HashMap::new(),
            }),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Creates or reattaches a farm and registers a new self-viewing session for it
    ///
    /// If the player already has a live session, that session is closed and
    /// unregistered first; its worker stops at its next iteration.
    pub async fn login(&self, requested_id: Option<&str>) -> Login {
        let session_id = SessionId(self.next_session_id.fetch_add(1, Ordering::Relaxed));
        let signal = Arc::new(SessionSignal::new_dirty());

        let mut reg = self.registries.write().await;
        let farm_login = reg.farms.login(requested_id);
        let player_id = farm_login.player_id;

        if let Some(old_session) = reg.owners.get(&player_id).copied() {
            if let Some(old) = reg.detach_session(old_session) {
                info!(
                    "Session {} for {} superseded by {}, closing it",
                    old_session, player_id, session_id
                );
                old.signal.close();
            }
        }

        reg.sessions.insert(
            session_id,
            SessionEntry {
                player_id: player_id.clone(),
                signal: Arc::clone(&signal),
            },
        );
        reg.owners.insert(player_id.clone(), session_id);
        reg.viewers
            .insert(session_id, player_id.clone(), Arc::clone(&signal));
        reg.viewers.mark_all_dirty();

        info!(
            "Session {} logged in as {} ({})",
            session_id,
            player_id,
            if farm_login.reconnected { "reconnect" } else { "new" }
        );

        Login {
            session_id,
            player_id,
            signal,
            reconnected: farm_login.reconnected,
        }
    }

    /// Switches the farm a session displays, returning the previously viewed owner
    pub async fn set_view(&self, session: SessionId, target: &str) -> Result<PlayerId, ActionError> {
        let mut reg = self.registries.write().await;
        reg.player_of(session)?;
        if !reg.farms.contains(target) {
            return Err(ActionError::UnknownPlayer(target.to_string()));
        }

        let previous = reg
            .viewers
            .set_view(session, target.to_string())
            .ok_or(ActionError::SessionClosed)?;
        reg.viewers.mark_all_dirty();

        debug!("Session {} now viewing {} (was {})", session, target, previous);
        Ok(previous)
    }

    /// Unregisters a session; the farm stays for a later reconnect
    ///
    /// Returns false if the session was already gone (e.g. superseded).
    pub async fn logout(&self, session: SessionId) -> bool {
        let mut reg = self.registries.write().await;
        match reg.detach_session(session) {
            Some(entry) => {
                reg.viewers.mark_all_dirty();
                info!("Session {} ({}) logged out", session, entry.player_id);
                true
            }
            None => false,
        }
    }

    /// Plants on the session's own farm
    pub async fn plant(&self, session: SessionId, row: i32, col: i32) -> Result<(), ActionError> {
        let reg = self.registries.read().await;
        let (player_id, farm) = reg.own_farm(session)?;
        farm.plant(row, col)?;
        reg.viewers.mark_viewers_dirty(&player_id);
        Ok(())
    }

    /// Harvests on the session's own farm, returning the amount credited
    pub async fn harvest(&self, session: SessionId, row: i32, col: i32) -> Result<u32, ActionError> {
        let reg = self.registries.read().await;
        let (player_id, farm) = reg.own_farm(session)?;
        let amount = farm.harvest(row, col)?;
        reg.viewers.mark_viewers_dirty(&player_id);
        Ok(amount)
    }

    /// Steals from the farm the session is currently viewing and pays the thief
    ///
    /// The read lock is held across the whole attempt, so the victim cannot
    /// come home halfway through: the home check and the draw see one state.
    pub async fn steal(&self, session: SessionId, row: i32, col: i32) -> Result<u32, ActionError> {
        let reg = self.registries.read().await;
        let (thief_id, thief_farm) = reg.own_farm(session)?;
        let victim_id = reg
            .viewers
            .viewing(session)
            .cloned()
            .ok_or(ActionError::SessionClosed)?;

        if reg.is_home(&victim_id) {
            debug!("{} tried to steal from {} while they are home", thief_id, victim_id);
            return Err(ActionError::OwnerIsHome);
        }

        let victim = reg
            .farms
            .get(&victim_id)
            .ok_or_else(|| ActionError::UnknownPlayer(victim_id.clone()))?;
        let amount = victim.steal(row, col).into_result()?;

        thief_farm.add_coins(amount);
        reg.viewers.mark_viewers_dirty(&victim_id);
        reg.viewers.mark_viewers_dirty(&thief_id);
        info!("{} stole {} from {} at ({}, {})", thief_id, amount, victim_id, row, col);
        Ok(amount)
    }

    /// Full state for a session: the farm it views, its own balance and the roster
    pub async fn state_for(&self, session: SessionId, msg: &str) -> Option<ServerMessage> {
        let reg = self.registries.read().await;
        let player_id = reg.player_of(session).ok()?;
        let viewing = reg.viewers.viewing(session)?;
        let coins = reg.farms.get(player_id)?.coins();
        let board = reg.farms.get(viewing)?.snapshot();

        Some(ServerMessage::State {
            client_id: player_id.clone(),
            msg: msg.to_string(),
            coins,
            board,
            players: reg.roster(),
        })
    }

    /// Every connected player mapped to the farm they are viewing
    pub async fn roster(&self) -> BTreeMap<PlayerId, PlayerId> {
        self.registries.read().await.roster()
    }

    pub async fn farm(&self, player_id: &str) -> Option<Arc<Farm>> {
        self.registries.read().await.farms.get(player_id)
    }

    /// Handles to every farm, taken under a short read lock
    pub async fn farms(&self) -> Vec<Arc<Farm>> {
        self.registries.read().await.farms.farms()
    }

    pub async fn farm_count(&self) -> usize {
        self.registries.read().await.farms.len()
    }

    pub async fn session_count(&self) -> usize {
        self.registries.read().await.sessions.len()
    }

    pub async fn viewing(&self, session: SessionId) -> Option<PlayerId> {
        self.registries.read().await.viewers.viewing(session).cloned()
    }

    /// Flags every viewer of each owner for a push
    pub async fn mark_viewers_dirty(&self, owners: &[PlayerId]) {
        let reg = self.registries.read().await;
        for owner in owners {
            reg.viewers.mark_viewers_dirty(owner);
        }
    }
}
