//! Round state machine for the crash game.
//!
//! This module owns the phase transitions, the bet set, and the decision of what a
//! tick should do. It performs no I/O and never reads a clock: every entry point takes
//! `now_ms` explicitly, so the whole lifecycle can be driven from tests with synthetic
//! timestamps.
//!
//! ## Phases
//!
//! 1. **Idle** - no loop is driving the round; joins are still accepted
//! 2. **Countdown** - joins accepted until `countdown_end_ms`
//! 3. **Running** - multiplier climbs along [`curve::value_at`]; cashouts accepted
//! 4. **Crashed** - crash point reached; after the hold the next countdown starts
//!
//! ## Ticks
//!
//! [`RoundState::plan_tick`] inspects the state and returns the [`TickAction`]s that are
//! due. The caller executes each action (awaiting ledger writes where needed) and then
//! applies it back with the matching `launch` / `record_cashout` / `mark_crashed` /
//! `reset` call. Within one plan, auto-cashouts always precede the crash.

use crash_types::{Bet, ChannelKey, Phase, RoundError, RoundView, SeedPair, UserId};
use std::collections::BTreeMap;

use crate::curve;

/// Default tick period.
pub const TICK_MS: u64 = 250;

/// Default countdown before launch.
pub const COUNTDOWN_MS: u64 = 3_000;

/// Default pause between a crash and the next countdown.
pub const CRASH_HOLD_MS: u64 = 1_500;

/// Lowest accepted auto-cashout target.
pub const MIN_AUTO_CASH: f64 = 1.01;

/// Phase durations in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundTiming {
    pub tick_ms: u64,
    pub countdown_ms: u64,
    pub crash_hold_ms: u64,
}

impl Default for RoundTiming {
    fn default() -> Self {
        Self {
            tick_ms: TICK_MS,
            countdown_ms: COUNTDOWN_MS,
            crash_hold_ms: CRASH_HOLD_MS,
        }
    }
}

impl RoundTiming {
    /// Validate the configuration (all durations > 0, tick no longer than the countdown).
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.tick_ms == 0 {
            return Err("tick_ms must be greater than zero");
        }
        if self.countdown_ms == 0 {
            return Err("countdown_ms must be greater than zero");
        }
        if self.crash_hold_ms == 0 {
            return Err("crash_hold_ms must be greater than zero");
        }
        if self.tick_ms > self.countdown_ms {
            return Err("tick_ms must not exceed countdown_ms");
        }
        Ok(())
    }
}

/// Standing per-user auto-cashout targets. Outlives individual rounds.
#[derive(Clone, Debug, Default)]
pub struct AutoCashBook {
    targets: BTreeMap<UserId, f64>,
}

impl AutoCashBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite `user`'s target.
    pub fn set(&mut self, user: &str, target: f64) -> Result<(), RoundError> {
        if !target.is_finite() || target < MIN_AUTO_CASH {
            return Err(RoundError::InvalidTarget(target));
        }
        self.targets.insert(user.to_string(), target);
        Ok(())
    }

    pub fn target(&self, user: &str) -> Option<f64> {
        self.targets.get(user).copied()
    }
}

/// Something a tick decided should happen.
#[derive(Clone, Debug, PartialEq)]
pub enum TickAction {
    /// Countdown elapsed; start the flight now.
    Launch,
    /// Cash `user` out at their standing target.
    AutoCashout { user: UserId, multiplier: f64 },
    /// The curve reached the crash point.
    Crash { multiplier: f64 },
    /// Crash hold elapsed; draw a new crash point and count down again.
    Reset,
}

/// Round state for one channel.
#[derive(Clone, Debug)]
pub struct RoundState {
    timing: RoundTiming,
    round_id: u64,
    phase: Phase,
    crash_point: f64,
    seeds: Option<SeedPair>,
    start_ms: u64,
    countdown_end_ms: u64,
    crashed_at_ms: u64,
    launched: bool,
    bets: BTreeMap<UserId, Bet>,
    autoplay: BTreeMap<UserId, bool>,
}

impl RoundState {
    pub fn new(timing: RoundTiming) -> Self {
        Self {
            timing,
            round_id: 0,
            phase: Phase::Idle,
            crash_point: 0.0,
            seeds: None,
            start_ms: 0,
            countdown_end_ms: 0,
            crashed_at_ms: 0,
            launched: false,
            bets: BTreeMap::new(),
            autoplay: BTreeMap::new(),
        }
    }

    pub fn timing(&self) -> &RoundTiming {
        &self.timing
    }

    pub fn round_id(&self) -> u64 {
        self.round_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn crash_point(&self) -> f64 {
        self.crash_point
    }

    pub fn seeds(&self) -> Option<&SeedPair> {
        self.seeds.as_ref()
    }

    pub fn countdown_end_ms(&self) -> u64 {
        self.countdown_end_ms
    }

    pub fn bet(&self, user: &str) -> Option<&Bet> {
        self.bets.get(user)
    }

    pub fn bets(&self) -> impl Iterator<Item = (&UserId, &Bet)> {
        self.bets.iter()
    }

    /// Begin a new round: fresh crash point, countdown from `now_ms`.
    ///
    /// Bets from a round that launched are settled history and get discarded. Bets
    /// placed while the previous round never launched (joined while idle or during a
    /// countdown that was stopped) are already escrowed and ride this round instead.
    pub fn reset(&mut self, now_ms: u64, seeds: SeedPair, crash_point: f64) {
        if self.launched {
            self.bets.clear();
        }
        self.round_id = self.round_id.saturating_add(1);
        self.phase = Phase::Countdown;
        self.seeds = Some(seeds);
        self.crash_point = crash_point;
        self.countdown_end_ms = now_ms.saturating_add(self.timing.countdown_ms);
        self.start_ms = 0;
        self.crashed_at_ms = 0;
        self.launched = false;
    }

    pub fn launch(&mut self, now_ms: u64) {
        self.phase = Phase::Running;
        self.start_ms = now_ms;
        self.launched = true;
    }

    pub fn mark_crashed(&mut self, now_ms: u64) {
        self.phase = Phase::Crashed;
        self.crashed_at_ms = now_ms;
    }

    /// Force the round idle. Bets stay addressable until the next reset.
    pub fn stop(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Current multiplier as it should be displayed and settled.
    pub fn multiplier_at(&self, now_ms: u64) -> f64 {
        match self.phase {
            Phase::Running => curve::value_at(now_ms.saturating_sub(self.start_ms)),
            Phase::Crashed => self.crash_point,
            Phase::Idle | Phase::Countdown => 1.0,
        }
    }

    /// Decide what is due at `now_ms`.
    ///
    /// While running, every open bet whose owner's target has been reached (and lies
    /// below the crash point) is cashed at that target, each user at most once. The
    /// crash, if due, comes after them.
    pub fn plan_tick(&self, now_ms: u64, book: &AutoCashBook) -> Vec<TickAction> {
        match self.phase {
            Phase::Idle => Vec::new(),
            Phase::Countdown => {
                if now_ms >= self.countdown_end_ms {
                    vec![TickAction::Launch]
                } else {
                    Vec::new()
                }
            }
            Phase::Running => {
                let multiplier = self.multiplier_at(now_ms);
                let mut actions: Vec<TickAction> = self
                    .bets
                    .iter()
                    .filter(|(_, bet)| bet.is_open())
                    .filter_map(|(user, _)| {
                        let target = book.target(user)?;
                        (target <= multiplier && target < self.crash_point).then(|| {
                            TickAction::AutoCashout {
                                user: user.clone(),
                                multiplier: target,
                            }
                        })
                    })
                    .collect();
                if multiplier >= self.crash_point {
                    actions.push(TickAction::Crash {
                        multiplier: self.crash_point,
                    });
                }
                actions
            }
            Phase::Crashed => {
                if now_ms >= self.crashed_at_ms.saturating_add(self.timing.crash_hold_ms) {
                    vec![TickAction::Reset]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Validate a join against the current round, in rejection order.
    pub fn check_join(&self, user: &str, amount: u64, balance: u64) -> Result<(), RoundError> {
        if !self.phase.accepts_joins() {
            return Err(RoundError::AlreadyRunning);
        }
        if amount < 1 {
            return Err(RoundError::InvalidAmount);
        }
        if balance < amount {
            return Err(RoundError::InsufficientBalance { balance, amount });
        }
        if self.bets.contains_key(user) {
            return Err(RoundError::AlreadyJoined);
        }
        Ok(())
    }

    /// Record an escrowed bet. Call only after the debit is durable.
    pub fn record_join(&mut self, user: &str, amount: u64, now_ms: u64) {
        self.bets.insert(user.to_string(), Bet::new(amount, now_ms));
    }

    /// Validate a cashout and return the bet it would settle.
    pub fn check_cashout(&self, user: &str) -> Result<&Bet, RoundError> {
        let bet = self.bets.get(user).ok_or(RoundError::NotInRound)?;
        if !bet.is_open() {
            return Err(RoundError::AlreadyCashed);
        }
        if self.phase != Phase::Running {
            return Err(RoundError::NotRunning);
        }
        Ok(bet)
    }

    /// Mark a bet cashed. Call only after the credit is durable.
    pub fn record_cashout(&mut self, user: &str, multiplier: f64) {
        if let Some(bet) = self.bets.get_mut(user) {
            bet.cashed_at = Some(multiplier);
        }
    }

    /// Flip `user`'s autoplay flag and return the new value.
    ///
    /// The flag is stored for front ends to read; the engine does not act on it.
    pub fn toggle_autoplay(&mut self, user: &str) -> bool {
        let flag = self.autoplay.entry(user.to_string()).or_insert(false);
        *flag = !*flag;
        *flag
    }

    pub fn autoplay(&self, user: &str) -> bool {
        self.autoplay.get(user).copied().unwrap_or(false)
    }

    /// Build the render view at `now_ms`.
    pub fn view(&self, channel: &ChannelKey, now_ms: u64, recent: Vec<f64>) -> RoundView {
        let seconds_left = match self.phase {
            Phase::Countdown => self.countdown_end_ms.saturating_sub(now_ms) as f64 / 1_000.0,
            _ => 0.0,
        };
        let revealed = self.phase == Phase::Crashed;
        RoundView {
            channel: channel.clone(),
            round_id: self.round_id,
            phase: self.phase,
            seconds_left,
            multiplier: self.multiplier_at(now_ms),
            crash_point: revealed.then_some(self.crash_point),
            seeds: if revealed { self.seeds.clone() } else { None },
            joined: self.bets.keys().cloned().collect(),
            recent,
        }
    }
}
