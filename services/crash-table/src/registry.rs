use crash_execution::{CrashSource, RandomSeeds};
use crash_types::ChannelKey;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

use crate::round::{ChannelSettings, Round, RoundContext};

/// Builds the crash source for a newly created round.
pub type SourceFactory = Arc<dyn Fn(&ChannelKey) -> Box<dyn CrashSource> + Send + Sync>;

/// Process-wide map from channel to its round. Entries are never removed.
pub struct RoundRegistry {
    ctx: RoundContext,
    sources: SourceFactory,
    rounds: RwLock<HashMap<ChannelKey, Arc<Round>>>,
}

impl RoundRegistry {
    /// Registry whose rounds draw fresh random seeds.
    pub fn new(ctx: RoundContext) -> Self {
        Self::with_sources(ctx, Arc::new(|_: &ChannelKey| -> Box<dyn CrashSource> {
            Box::new(RandomSeeds::from_entropy())
        }))
    }

    pub fn with_sources(ctx: RoundContext, sources: SourceFactory) -> Self {
        Self {
            ctx,
            sources,
            rounds: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, channel: &ChannelKey) -> Option<Arc<Round>> {
        self.rounds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned()
    }

    /// Existing round for `channel`, or a new one with `settings`.
    pub fn get_or_create(&self, channel: &ChannelKey, settings: ChannelSettings) -> Arc<Round> {
        if let Some(round) = self.get(channel) {
            return round;
        }
        let mut rounds = self.rounds.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(rounds.entry(channel.clone()).or_insert_with(|| {
            info!(channel = %channel, "round created");
            Arc::new(Round::new(
                channel.clone(),
                self.ctx.clone(),
                settings,
                (self.sources)(channel),
            ))
        }))
    }

    /// Create the round for `channel`, or replace its settings in place.
    pub fn setup(&self, channel: &ChannelKey, settings: ChannelSettings) -> Arc<Round> {
        let round = self.get_or_create(channel, settings.clone());
        if round.settings() != settings {
            round.update_settings(settings);
            info!(channel = %channel, "channel settings updated");
        }
        round
    }

    pub fn channels(&self) -> Vec<ChannelKey> {
        let mut channels: Vec<_> = self
            .rounds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        channels.sort();
        channels
    }

    /// Stop every round's tick loop.
    pub async fn stop_all(&self) {
        let rounds: Vec<_> = self
            .rounds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for round in rounds {
            round.stop().await;
        }
    }
}
