//! Render collaborators.
//!
//! The round actor hands every freshly computed [`RoundView`] to a [`RenderSink`] once per
//! tick. Sinks run inside the tick, so they should be quick; a failing sink is logged and
//! ignored.

use crash_types::RoundView;
use tracing::debug;

pub trait RenderSink: Send + Sync {
    fn render(&self, view: &RoundView) -> anyhow::Result<()>;
}

/// Logs each view at debug level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl RenderSink for TracingSink {
    fn render(&self, view: &RoundView) -> anyhow::Result<()> {
        debug!(
            channel = %view.channel,
            round = view.round_id,
            phase = view.phase.as_str(),
            multiplier = view.multiplier,
            seconds_left = view.seconds_left,
            joined = view.joined.len(),
            "round view"
        );
        Ok(())
    }
}

/// Drops every view.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn render(&self, _view: &RoundView) -> anyhow::Result<()> {
        Ok(())
    }
}
