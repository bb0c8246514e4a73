//! Tracks which sessions are watching which farm
//!
//! Each live session sits in exactly one viewer set: the one for the farm it is
//! currently viewing. Pushes are targeted through these sets, so a farm change
//! only wakes the sessions that display that farm.

use shared::PlayerId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Identifier of one connection, unique for the lifetime of the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Dirty flag and wake-up channel shared between a session worker and its notifiers
///
/// `mark_dirty` never blocks, so the ticker and other sessions can flag a
/// session without waiting on its socket.
#[derive(Debug, Default)]
pub struct SessionSignal {
    dirty: AtomicBool,
    closed: AtomicBool,
    notify: Notify,
}

impl SessionSignal {
    /// A signal that starts dirty, so the first loop iteration pushes the full state
    pub fn new_dirty() -> Self {
        Self {
            dirty: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Clears the flag, returning whether it was set
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Asks the owning worker to stop at its next iteration
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves after the next `mark_dirty` or `close`, including ones that already happened
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

#[derive(Debug)]
struct Viewer {
    viewing: PlayerId,
    signal: Arc<SessionSignal>,
}

#[derive(Debug, Default)]
pub struct ViewerRegistry {
    /// owner id -> sessions currently displaying that owner's farm
    sets: HashMap<PlayerId, HashSet<SessionId>>,
    viewers: HashMap<SessionId, Viewer>,
}

impl ViewerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session viewing `target`
    pub fn insert(&mut self, session: SessionId, target: PlayerId, signal: Arc<SessionSignal>) {
        self.remove(session);
        self.sets
            .entry(target.clone())
            .or_default()
            .insert(session);
        self.viewers.insert(
            session,
            Viewer {
                viewing: target,
                signal,
            },
        );
    }

    /// Moves a session into `target`'s viewer set and marks it dirty
    ///
    /// Returns the previously viewed owner, or `None` if the session is unknown.
    pub fn set_view(&mut self, session: SessionId, target: PlayerId) -> Option<PlayerId> {
        let viewer = self.viewers.get_mut(&session)?;
        let previous = std::mem::replace(&mut viewer.viewing, target.clone());
        viewer.signal.mark_dirty();

        Self::detach(&mut self.sets, &previous, session);
        self.sets.entry(target).or_default().insert(session);
        Some(previous)
    }

    /// Drops a session from whichever set holds it, returning what it was viewing
    pub fn remove(&mut self, session: SessionId) -> Option<PlayerId> {
        let viewer = self.viewers.remove(&session)?;
        Self::detach(&mut self.sets, &viewer.viewing, session);
        Some(viewer.viewing)
    }

    fn detach(sets: &mut HashMap<PlayerId, HashSet<SessionId>>, owner: &str, session: SessionId) {
        if let Some(set) = sets.get_mut(owner) {
            set.remove(&session);
            if set.is_empty() {
                sets.remove(owner);
            }
        }
    }

    pub fn viewing(&self, session: SessionId) -> Option<&PlayerId> {
        self.viewers.get(&session).map(|viewer| &viewer.viewing)
    }

    /// Sessions currently displaying `owner`'s farm
    #[cfg(test)]
    pub fn viewers_of(&self, owner: &str) -> Vec<SessionId> {
        self.sets
            .get(owner)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Flags every viewer of `owner` for a push, returning how many were flagged
    pub fn mark_viewers_dirty(&self, owner: &str) -> usize {
        let Some(set) = self.sets.get(owner) else {
            return 0;
        };
        for session in set {
            if let Some(viewer) = self.viewers.get(session) {
                viewer.signal.mark_dirty();
            }
        }
        set.len()
    }

    /// Flags every registered session, used when the player roster changes
    pub fn mark_all_dirty(&self) {
        for viewer in self.viewers.values() {
            viewer.signal.mark_dirty();
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.viewers.len()
    }
}
