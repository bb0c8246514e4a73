//! Per-player farm state: a fixed grid of plots plus a coin balance
//!
//! Every operation on a farm runs under that farm's own mutex, so operations on
//! the same farm are linearized while different farms never contend. Two thieves
//! racing for one ripe plot are resolved by whoever takes the lock first: the
//! second draw is computed from the already reduced yield.

use crate::error::FarmError;
use log::debug;
use rand::Rng;
use shared::{
    Board, PlayerId, PlotState, GRID_COLS, GRID_ROWS, GROW_DURATION_MS, HARVEST_REWARD,
    PLANT_COST, STARTING_COINS, STEAL_MAX_PERCENT, STEAL_MIN_YIELD_PERCENT,
};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Tunable economy and timing of the game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameRules {
    pub plant_cost: u32,
    pub harvest_reward: u32,
    pub grow_duration: Duration,
    pub starting_coins: u32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            plant_cost: PLANT_COST,
            harvest_reward: HARVEST_REWARD,
            grow_duration: Duration::from_millis(GROW_DURATION_MS),
            starting_coins: STARTING_COINS,
        }
    }
}

impl GameRules {
    /// True when a ripe plot still holds enough yield to be stolen from
    fn is_stealable(&self, remaining_yield: u32) -> bool {
        u64::from(remaining_yield) * 100
            >= u64::from(self.harvest_reward) * u64::from(STEAL_MIN_YIELD_PERCENT)
    }

    /// Largest amount a single steal may take from the given yield (rounded down)
    fn max_steal(remaining_yield: u32) -> u32 {
        let cap = u64::from(remaining_yield) * u64::from(STEAL_MAX_PERCENT) / 100;
        // Never exceeds remaining_yield, so the conversion cannot fail
        u32::try_from(cap).unwrap_or(remaining_yield)
    }
}

/// Result of a steal attempt on one plot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StealOutcome {
    Stolen(u32),
    OutOfBounds,
    NotRipe,
    YieldTooLow,
}

impl StealOutcome {
    pub fn into_result(self) -> Result<u32, FarmError> {
        match self {
            StealOutcome::Stolen(amount) => Ok(amount),
            StealOutcome::OutOfBounds => Err(FarmError::OutOfBounds),
            StealOutcome::NotRipe => Err(FarmError::NotRipe),
            StealOutcome::YieldTooLow => Err(FarmError::YieldTooLow),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Plot {
    state: PlotState,
    /// Only set while growing
    planted_at: Option<Instant>,
    /// Meaningful while growing or ripe
    remaining_yield: u32,
}

#[derive(Debug)]
struct FarmInner {
    coins: u32,
    plots: [[Plot; GRID_COLS]; GRID_ROWS],
}

#[derive(Debug)]
pub struct Farm {
    owner: PlayerId,
    rules: GameRules,
    inner: Mutex<FarmInner>,
}

impl Farm {
    pub fn new(owner: PlayerId, rules: GameRules) -> Self {
        Self {
            owner,
            rules,
            inner: Mutex::new(FarmInner {
                coins: rules.starting_coins,
                plots: [[Plot::default(); GRID_COLS]; GRID_ROWS],
            }),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    // Every mutation validates before writing, so a poisoned guard still holds consistent state.
    fn lock(&self) -> MutexGuard<'_, FarmInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn index(row: i32, col: i32) -> Result<(usize, usize), FarmError> {
        let r = usize::try_from(row).map_err(|_| FarmError::OutOfBounds)?;
        let c = usize::try_from(col).map_err(|_| FarmError::OutOfBounds)?;
        if r >= GRID_ROWS || c >= GRID_COLS {
            return Err(FarmError::OutOfBounds);
        }
        Ok((r, c))
    }

    /// Plants a crop on an empty plot, paying the plant cost
    pub fn plant(&self, row: i32, col: i32) -> Result<(), FarmError> {
        let (r, c) = Self::index(row, col)?;
        let mut inner = self.lock();

        if inner.plots[r][c].state != PlotState::Empty {
            return Err(FarmError::PlotOccupied);
        }
        if inner.coins < self.rules.plant_cost {
            return Err(FarmError::InsufficientFunds);
        }

        inner.coins -= self.rules.plant_cost;
        inner.plots[r][c] = Plot {
            state: PlotState::Growing,
            planted_at: Some(Instant::now()),
            remaining_yield: self.rules.harvest_reward,
        };
        Ok(())
    }

    /// Harvests a ripe plot, crediting whatever yield thieves left behind
    ///
    /// Returns the amount credited. The plot goes back to empty.
    pub fn harvest(&self, row: i32, col: i32) -> Result<u32, FarmError> {
        let (r, c) = Self::index(row, col)?;
        let mut inner = self.lock();

        if inner.plots[r][c].state != PlotState::Ripe {
            return Err(FarmError::NotRipe);
        }

        let amount = inner.plots[r][c].remaining_yield;
        inner.plots[r][c] = Plot::default();
        inner.coins = inner.coins.saturating_add(amount);
        Ok(amount)
    }

    /// Takes a random share of a ripe plot's remaining yield
    ///
    /// The amount is drawn uniformly from `0..=25%` of the remaining yield. The
    /// plot stays ripe even when drained; only a harvest empties it.
    pub fn steal(&self, row: i32, col: i32) -> StealOutcome {
        let (r, c) = match Self::index(row, col) {
            Ok(index) => index,
            Err(_) => return StealOutcome::OutOfBounds,
        };
        let mut inner = self.lock();
        let plot = &mut inner.plots[r][c];

        if plot.state != PlotState::Ripe {
            return StealOutcome::NotRipe;
        }
        let before = plot.remaining_yield;
        if !self.rules.is_stealable(before) {
            debug!(
                "Steal on {} ({}, {}) refused: yield {} too low",
                self.owner, row, col, before
            );
            return StealOutcome::YieldTooLow;
        }

        let amount = rand::thread_rng().gen_range(0..=GameRules::max_steal(before));
        plot.remaining_yield = before - amount;
        debug!(
            "Stole {} from {} ({}, {}): yield {} -> {}",
            amount, self.owner, row, col, before, plot.remaining_yield
        );
        StealOutcome::Stolen(amount)
    }

    /// Ripens every growing plot planted at least one grow duration ago
    ///
    /// Returns true iff at least one plot changed state.
    pub fn tick_grow(&self) -> bool {
        self.tick_grow_at(Instant::now())
    }

    /// Same as [`Farm::tick_grow`] against an explicit clock reading
    pub fn tick_grow_at(&self, now: Instant) -> bool {
        let mut inner = self.lock();
        let mut changed = false;

        for plot in inner.plots.iter_mut().flatten() {
            if plot.state != PlotState::Growing {
                continue;
            }
            let ready = plot
                .planted_at
                .map_or(true, |at| now.saturating_duration_since(at) >= self.rules.grow_duration);
            if ready {
                plot.state = PlotState::Ripe;
                plot.planted_at = None;
                changed = true;
            }
        }

        changed
    }

    /// Copies the grid states out so pushers never read under the lock
    pub fn snapshot(&self) -> Board {
        let inner = self.lock();
        let mut board = Board::default();
        for (r, row) in inner.plots.iter().enumerate() {
            for (c, plot) in row.iter().enumerate() {
                board[r][c] = plot.state;
            }
        }
        board
    }

    /// Yield still held by a plot, `None` for invalid coordinates
    pub fn remaining_yield(&self, row: i32, col: i32) -> Option<u32> {
        let (r, c) = Self::index(row, col).ok()?;
        Some(self.lock().plots[r][c].remaining_yield)
    }

    pub fn coins(&self) -> u32 {
        self.lock().coins
    }

    /// Credits the balance, used to pay a thief after a successful steal elsewhere
    pub fn add_coins(&self, amount: u32) {
        let mut inner = self.lock();
        inner.coins = inner.coins.saturating_add(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn test_farm() -> Farm {
        Farm::new("owner".to_string(), GameRules::default())
    }

    fn ripen(farm: &Farm) -> bool {
        farm.tick_grow_at(Instant::now() + farm.rules().grow_duration)
    }

    #[test]
    fn test_new_farm_is_empty() {
        let farm = test_farm();
        assert_eq!(farm.coins(), STARTING_COINS);
        assert_eq!(farm.owner(), "owner");
        assert!(farm
            .snapshot()
            .iter()
            .flatten()
            .all(|state| *state == PlotState::Empty));
    }

    #[test]
    fn test_plant_debits_cost() {
        let farm = test_farm();
        farm.plant(0, 0).unwrap();

        assert_eq!(farm.coins(), STARTING_COINS - PLANT_COST);
        assert_eq!(farm.snapshot()[0][0], PlotState::Growing);
        assert_eq!(farm.remaining_yield(0, 0), Some(HARVEST_REWARD));
    }

    #[test]
    fn test_plant_out_of_bounds() {
        let farm = test_farm();
        for (row, col) in [(-1, 0), (0, -1), (4, 0), (0, 4), (i32::MAX, i32::MIN)] {
            assert_eq!(farm.plant(row, col), Err(FarmError::OutOfBounds));
        }
        assert_eq!(farm.coins(), STARTING_COINS);
    }

    #[test]
    fn test_plant_occupied_plot() {
        let farm = test_farm();
        farm.plant(1, 1).unwrap();
        assert_eq!(farm.plant(1, 1), Err(FarmError::PlotOccupied));
        assert_eq!(farm.coins(), STARTING_COINS - PLANT_COST);
    }

    #[test]
    fn test_plant_insufficient_funds() {
        let farm = test_farm();
        // 40 coins buy exactly 8 plants
        for i in 0..8 {
            farm.plant(i / 4, i % 4).unwrap();
        }
        assert_eq!(farm.coins(), 0);
        assert_eq!(farm.plant(3, 3), Err(FarmError::InsufficientFunds));
        assert_eq!(farm.snapshot()[3][3], PlotState::Empty);
    }

    #[test]
    fn test_harvest_before_ripe_fails() {
        let farm = test_farm();
        assert_eq!(farm.harvest(0, 0), Err(FarmError::NotRipe));

        farm.plant(0, 0).unwrap();
        assert!(!farm.tick_grow());
        assert_eq!(farm.harvest(0, 0), Err(FarmError::NotRipe));
        assert_eq!(farm.harvest(9, 0), Err(FarmError::OutOfBounds));
    }

    #[test]
    fn test_full_growth_cycle() {
        let farm = test_farm();
        farm.plant(0, 0).unwrap();
        assert_eq!(farm.coins(), 35);

        assert!(ripen(&farm));
        assert_eq!(farm.snapshot()[0][0], PlotState::Ripe);
        assert_eq!(farm.remaining_yield(0, 0), Some(12));

        assert_eq!(farm.harvest(0, 0), Ok(12));
        assert_eq!(farm.coins(), 47);
        assert_eq!(farm.snapshot()[0][0], PlotState::Empty);
        assert_eq!(farm.remaining_yield(0, 0), Some(0));
    }

    #[test]
    fn test_tick_is_idempotent_once_ripe() {
        let farm = test_farm();
        farm.plant(2, 3).unwrap();

        assert!(ripen(&farm));
        assert!(!ripen(&farm));
        assert!(!farm.tick_grow());
        assert_eq!(farm.snapshot()[2][3], PlotState::Ripe);
    }

    #[test]
    fn test_tick_respects_grow_duration() {
        let rules = GameRules {
            grow_duration: Duration::from_secs(60),
            ..GameRules::default()
        };
        let farm = Farm::new("slow".to_string(), rules);
        farm.plant(0, 0).unwrap();

        assert!(!farm.tick_grow_at(Instant::now() + Duration::from_secs(30)));
        assert_eq!(farm.snapshot()[0][0], PlotState::Growing);
        assert!(farm.tick_grow_at(Instant::now() + Duration::from_secs(61)));
    }

    #[test]
    fn test_steal_requires_ripe_plot() {
        let farm = test_farm();
        assert_eq!(farm.steal(0, 0), StealOutcome::NotRipe);
        farm.plant(0, 0).unwrap();
        assert_eq!(farm.steal(0, 0), StealOutcome::NotRipe);
        assert_eq!(farm.steal(-1, 0), StealOutcome::OutOfBounds);
    }

    #[test]
    fn test_steal_draws_at_most_a_quarter() {
        let farm = test_farm();
        farm.plant(0, 0).unwrap();
        ripen(&farm);

        match farm.steal(0, 0) {
            StealOutcome::Stolen(amount) => {
                // floor(25% of 12) = 3
                assert!(amount <= 3);
                assert_eq!(farm.remaining_yield(0, 0), Some(HARVEST_REWARD - amount));
            }
            other => panic!("Unexpected outcome {:?}", other),
        }
        assert_eq!(farm.snapshot()[0][0], PlotState::Ripe);
        assert_eq!(farm.coins(), STARTING_COINS - PLANT_COST);
    }

    #[test]
    fn test_steal_until_yield_too_low() {
        let rules = GameRules {
            harvest_reward: 100,
            ..GameRules::default()
        };
        let farm = Farm::new("rich".to_string(), rules);
        farm.plant(0, 0).unwrap();
        ripen(&farm);

        let mut total = 0;
        let mut attempts = 0;
        loop {
            attempts += 1;
            assert!(attempts < 10_000, "yield never dropped below the threshold");
            match farm.steal(0, 0) {
                StealOutcome::Stolen(amount) => total += amount,
                StealOutcome::YieldTooLow => break,
                other => panic!("Unexpected outcome {:?}", other),
            }
        }

        let left = farm.remaining_yield(0, 0).unwrap();
        assert!(left < 20);
        assert_eq!(total + left, 100);
        assert_eq!(farm.snapshot()[0][0], PlotState::Ripe);

        assert_eq!(farm.harvest(0, 0), Ok(left));
    }

    #[test]
    fn test_default_yield_floor() {
        let farm = test_farm();
        farm.plant(0, 0).unwrap();
        ripen(&farm);

        // Draws shrink with the yield: at 3 the cap rounds down to 0
        for _ in 0..500 {
            assert!(matches!(farm.steal(0, 0), StealOutcome::Stolen(_)));
        }
        assert!(farm.remaining_yield(0, 0).unwrap() >= 3);
    }

    #[test]
    fn test_steal_with_huge_reward() {
        let rules = GameRules {
            harvest_reward: 300_000_000,
            ..GameRules::default()
        };
        let farm = Farm::new("owner".to_string(), rules);
        farm.plant(0, 0).unwrap();
        ripen(&farm);

        match farm.steal(0, 0) {
            StealOutcome::Stolen(amount) => {
                assert!(amount <= 75_000_000);
                assert_eq!(farm.remaining_yield(0, 0), Some(300_000_000 - amount));
            }
            other => panic!("Unexpected {:?}", other),
        }
        assert_eq!(GameRules::max_steal(u32::MAX), u32::MAX / 4);
        assert!(rules.is_stealable(u32::MAX));
        assert!(!rules.is_stealable(59_999_999));
    }

    #[test]
    fn test_steal_outcome_into_result() {
        assert_eq!(StealOutcome::Stolen(2).into_result(), Ok(2));
        assert_eq!(
            StealOutcome::YieldTooLow.into_result(),
            Err(FarmError::YieldTooLow)
        );
        assert_eq!(StealOutcome::NotRipe.into_result(), Err(FarmError::NotRipe));
    }

    #[test]
    fn test_stealable_threshold() {
        let rules = GameRules::default();
        assert!(rules.is_stealable(12));
        assert!(rules.is_stealable(3));
        assert!(!rules.is_stealable(2));
        assert_eq!(GameRules::max_steal(12), 3);
        assert_eq!(GameRules::max_steal(3), 0);
    }

    #[test]
    fn test_add_coins() {
        let farm = test_farm();
        farm.add_coins(7);
        assert_eq!(farm.coins(), STARTING_COINS + 7);
    }

    #[test]
    fn test_concurrent_steals_never_overdraw() {
        for _ in 0..50 {
            let farm = Arc::new(test_farm());
            farm.plant(0, 0).unwrap();
            ripen(&farm);

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let farm = Arc::clone(&farm);
                    thread::spawn(move || farm.steal(0, 0))
                })
                .collect();

            let mut drawn = 0;
            for handle in handles {
                if let StealOutcome::Stolen(amount) = handle.join().unwrap() {
                    drawn += amount;
                }
            }

            assert!(drawn <= HARVEST_REWARD);
            assert_eq!(farm.remaining_yield(0, 0), Some(HARVEST_REWARD - drawn));
        }
    }
}
