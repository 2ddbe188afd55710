//! Per-channel round actor.
//!
//! A [`Round`] wraps the pure [`RoundState`] with the things it cannot own itself: the
//! ledger, the clock, the render sink and the tick timer. Every command and every tick
//! takes the same async mutex, so a join or cashout is linearized with the tick and sees
//! a consistent phase. Ledger writes are awaited while that mutex is held; the lock order
//! is always round, then ledger.
//!
//! In-memory effects are applied only after the matching ledger write succeeded. A failed
//! write aborts the command (or the rest of the tick) and leaves the round untouched.

use crash_execution::{AutoCashBook, CrashSource, RoundState, RoundTiming, TickAction};
use crash_types::{ChannelKey, Phase, RoundError, RoundView, UserId};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::EngineError;
use crate::ledger::Ledger;
use crate::render::RenderSink;

/// Balance granted on a user's first reference in a channel.
pub const DEFAULT_START_BALANCE: u64 = 1_000;

/// Per-channel settings chosen at setup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSettings {
    pub start_balance: u64,
    /// User allowed to set other players' balances.
    pub host: Option<UserId>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            start_balance: DEFAULT_START_BALANCE,
            host: None,
        }
    }
}

/// Collaborators shared by every round in the process.
#[derive(Clone)]
pub struct RoundContext {
    pub ledger: Arc<Ledger>,
    pub clock: Arc<dyn Clock>,
    pub sink: Arc<dyn RenderSink>,
    pub timing: RoundTiming,
}

/// Result of a successful cashout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cashout {
    pub multiplier: f64,
    pub payout: u64,
    pub balance: u64,
}

struct RoundInner {
    state: RoundState,
    auto_cash: AutoCashBook,
    source: Box<dyn CrashSource>,
}

struct Ticker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct Round {
    channel: ChannelKey,
    ctx: RoundContext,
    inner: Mutex<RoundInner>,
    settings: RwLock<ChannelSettings>,
    view_tx: watch::Sender<RoundView>,
    ticker: std::sync::Mutex<Option<Ticker>>,
}

impl Round {
    pub fn new(
        channel: ChannelKey,
        ctx: RoundContext,
        settings: ChannelSettings,
        source: Box<dyn CrashSource>,
    ) -> Self {
        let state = RoundState::new(ctx.timing);
        let view = state.view(&channel, ctx.clock.now_ms(), ctx.ledger.recent(&channel));
        let (view_tx, _) = watch::channel(view);
        Self {
            channel,
            ctx,
            inner: Mutex::new(RoundInner {
                state,
                auto_cash: AutoCashBook::new(),
                source,
            }),
            settings: RwLock::new(settings),
            view_tx,
            ticker: std::sync::Mutex::new(None),
        }
    }

    pub fn channel(&self) -> &ChannelKey {
        &self.channel
    }

    pub fn settings(&self) -> ChannelSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_settings(&self, settings: ChannelSettings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    /// Latest published view.
    pub fn view(&self) -> RoundView {
        self.view_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RoundView> {
        self.view_tx.subscribe()
    }

    pub fn is_looping(&self) -> bool {
        self.ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|ticker| !ticker.handle.is_finished())
    }

    /// Open a countdown from idle and start the tick loop.
    pub async fn start(self: &Arc<Self>) -> Result<RoundView, EngineError> {
        let view = self.begin_countdown().await?;
        self.start_loop();
        Ok(view)
    }

    /// Move an idle round into its countdown without touching the timer.
    pub async fn begin_countdown(&self) -> Result<RoundView, EngineError> {
        let mut inner = self.inner.lock().await;
        if inner.state.phase() != Phase::Idle {
            return Err(RoundError::AlreadyRunning.into());
        }
        let now = self.ctx.clock.now_ms();
        let (seeds, crash_point) = inner.source.next_round();
        inner.state.reset(now, seeds, crash_point);
        info!(
            channel = %self.channel,
            round = inner.state.round_id(),
            carried = inner.state.bets().count(),
            "round started"
        );
        Ok(self.refresh(&inner.state, now))
    }

    /// Spawn the fixed-rate tick loop. No-op if one is already running.
    pub fn start_loop(self: &Arc<Self>) {
        let mut ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if ticker
            .as_ref()
            .is_some_and(|ticker| !ticker.handle.is_finished())
        {
            return;
        }

        let (stop_tx, mut stop_rx) = oneshot::channel();
        let round = Arc::clone(self);
        let period = Duration::from_millis(self.ctx.timing.tick_ms);
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {}
                }
                if AssertUnwindSafe(round.tick()).catch_unwind().await.is_err() {
                    error!(channel = %round.channel, "tick panicked");
                }
            }
            debug!(channel = %round.channel, "tick loop exited");
        });
        *ticker = Some(Ticker {
            stop: stop_tx,
            handle,
        });
    }

    /// Halt the tick loop and force the round idle.
    ///
    /// A tick already in progress finishes its ledger writes first.
    pub async fn stop(&self) -> RoundView {
        let ticker = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(ticker) = ticker {
            let _ = ticker.stop.send(());
            if let Err(err) = ticker.handle.await {
                warn!(channel = %self.channel, ?err, "tick loop ended abnormally");
            }
        }

        let mut inner = self.inner.lock().await;
        inner.state.stop();
        info!(channel = %self.channel, round = inner.state.round_id(), "round stopped");
        self.refresh(&inner.state, self.ctx.clock.now_ms())
    }

    /// Run one tick at the current clock time.
    pub async fn tick(&self) {
        self.tick_at(self.ctx.clock.now_ms()).await;
    }

    /// Run one tick at `now_ms`: execute every due action, then render.
    pub async fn tick_at(&self, now_ms: u64) {
        let mut inner = self.inner.lock().await;
        let inner = &mut *inner;
        let actions = inner.state.plan_tick(now_ms, &inner.auto_cash);
        for action in actions {
            // Whatever was not applied is planned again on the next tick.
            if let Err(err) = self.execute(inner, action, now_ms).await {
                warn!(channel = %self.channel, ?err, "tick aborted");
                break;
            }
        }

        let view = self.refresh(&inner.state, now_ms);
        if let Err(err) = self.ctx.sink.render(&view) {
            warn!(channel = %self.channel, ?err, "render failed");
        }
    }

    async fn execute(
        &self,
        inner: &mut RoundInner,
        action: TickAction,
        now_ms: u64,
    ) -> Result<(), EngineError> {
        match action {
            TickAction::Launch => {
                inner.state.launch(now_ms);
                info!(
                    channel = %self.channel,
                    round = inner.state.round_id(),
                    players = inner.state.bets().count(),
                    "round launched"
                );
            }
            TickAction::AutoCashout { user, multiplier } => {
                let cashout = self.settle(&mut inner.state, &user, multiplier).await?;
                info!(
                    channel = %self.channel,
                    user,
                    multiplier,
                    payout = cashout.payout,
                    "auto cashout"
                );
            }
            TickAction::Crash { multiplier } => {
                self.ctx.ledger.push_recent(&self.channel, multiplier).await?;
                inner.state.mark_crashed(now_ms);
                let busted = inner.state.bets().filter(|(_, bet)| bet.is_open()).count();
                info!(
                    channel = %self.channel,
                    round = inner.state.round_id(),
                    multiplier,
                    busted,
                    "round crashed"
                );
            }
            TickAction::Reset => {
                let (seeds, crash_point) = inner.source.next_round();
                inner.state.reset(now_ms, seeds, crash_point);
                debug!(channel = %self.channel, round = inner.state.round_id(), "next countdown");
            }
        }
        Ok(())
    }

    /// Escrow `amount` from `user` into the current round. Returns the new balance.
    pub async fn join(&self, user: &str, amount: u64) -> Result<u64, EngineError> {
        let mut inner = self.inner.lock().await;
        let key = self.channel.user(user);
        let balance = self
            .ctx
            .ledger
            .ensure_balance(&key, self.settings().start_balance)
            .await?;
        inner.state.check_join(user, amount, balance)?;

        self.ctx.ledger.debit(&key, amount).await?;
        let now = self.ctx.clock.now_ms();
        inner.state.record_join(user, amount, now);
        self.refresh(&inner.state, now);

        info!(channel = %self.channel, user, amount, "joined");
        Ok(self.ctx.ledger.balance(&key))
    }

    /// Cash `user` out at an explicit multiplier.
    pub async fn cashout(&self, user: &str, multiplier: f64) -> Result<Cashout, EngineError> {
        let mut inner = self.inner.lock().await;
        self.settle(&mut inner.state, user, multiplier).await
    }

    /// Cash `user` out at the multiplier the curve shows right now.
    pub async fn cashout_now(&self, user: &str) -> Result<Cashout, EngineError> {
        let mut inner = self.inner.lock().await;
        let multiplier = inner.state.multiplier_at(self.ctx.clock.now_ms());
        let cashout = self.settle(&mut inner.state, user, multiplier).await?;
        info!(
            channel = %self.channel,
            user,
            multiplier,
            payout = cashout.payout,
            "cashed out"
        );
        Ok(cashout)
    }

    async fn settle(
        &self,
        state: &mut RoundState,
        user: &str,
        multiplier: f64,
    ) -> Result<Cashout, EngineError> {
        let bet = state.check_cashout(user)?;
        if multiplier >= state.crash_point() {
            return Err(RoundError::RoundCrashed.into());
        }
        let payout = bet.payout_at(multiplier);

        let key = self.channel.user(user);
        self.ctx.ledger.credit(&key, payout).await?;
        state.record_cashout(user, multiplier);
        Ok(Cashout {
            multiplier,
            payout,
            balance: self.ctx.ledger.balance(&key),
        })
    }

    /// Store `user`'s standing auto-cashout target.
    pub async fn set_auto_cash(&self, user: &str, target: f64) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().await;
        inner.auto_cash.set(user, target)?;
        debug!(channel = %self.channel, user, auto_cash = target, "auto cashout set");
        Ok(())
    }

    pub async fn auto_cash(&self, user: &str) -> Option<f64> {
        self.inner.lock().await.auto_cash.target(user)
    }

    /// Flip `user`'s autoplay flag and return the new value.
    pub async fn toggle_autoplay(&self, user: &str) -> bool {
        self.inner.lock().await.state.toggle_autoplay(user)
    }

    /// `user`'s balance, granting the channel's start balance on first reference.
    pub async fn balance(&self, user: &str) -> Result<u64, EngineError> {
        let key = self.channel.user(user);
        Ok(self
            .ctx
            .ledger
            .ensure_balance(&key, self.settings().start_balance)
            .await?)
    }

    /// Overwrite `target`'s balance. Only the host may change someone else's.
    pub async fn set_balance(&self, actor: &str, target: &str, value: i64) -> Result<u64, EngineError> {
        if actor != target && self.settings().host.as_deref() != Some(actor) {
            return Err(RoundError::NotHost.into());
        }
        let key = self.channel.user(target);
        self.ctx.ledger.set_balance(&key, value).await?;
        info!(channel = %self.channel, actor, user = target, value, "balance set");
        Ok(self.ctx.ledger.balance(&key))
    }

    fn refresh(&self, state: &RoundState, now_ms: u64) -> RoundView {
        let view = state.view(&self.channel, now_ms, self.ctx.ledger.recent(&self.channel));
        self.view_tx.send_replace(view.clone());
        view
    }

    #[cfg(test)]
    pub(crate) async fn with_state<T>(&self, f: impl FnOnce(&RoundState) -> T) -> T {
        f(&self.inner.lock().await.state)
    }
}
