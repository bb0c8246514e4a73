//! Periodic crop growth driver
//!
//! A single task advances every farm's timers on a fixed period and flags the
//! viewers of each farm whose board changed. It never touches a socket, so a
//! slow client cannot stall growth for everyone else.

use crate::world::World;
use log::{debug, error};
use shared::PlayerId;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(100);

pub struct GrowthTicker {
    world: Arc<World>,
    period: Duration,
    ticks: u64,
}

impl GrowthTicker {
    pub fn new(world: Arc<World>, period: Duration) -> Self {
        Self {
            world,
            period,
            ticks: 0,
        }
    }

    /// Runs one growth pass, returning the owners whose board changed
    ///
    /// A farm that panics while ticking is logged and skipped; the rest of the
    /// pass still runs.
    pub async fn tick_once(&mut self) -> Vec<PlayerId> {
        self.ticks += 1;
        let farms = self.world.farms().await;

        let mut changed = Vec::new();
        for farm in farms {
            match panic::catch_unwind(AssertUnwindSafe(|| farm.tick_grow())) {
                Ok(true) => changed.push(farm.owner().to_string()),
                Ok(false) => {}
                Err(_) => error!("Growth tick failed for farm {}", farm.owner()),
            }
        }

        if !changed.is_empty() {
            debug!("Tick {}: {} farms ripened crops", self.ticks, changed.len());
            self.world.mark_viewers_dirty(&changed).await;
        }
        changed
    }

    /// Ticks forever on the configured period
    pub async fn run(mut self) {
        let mut timer = interval(self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip the first tick since it fires immediately
        timer.tick().await;

        loop {
            timer.tick().await;
            self.tick_once().await;
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
