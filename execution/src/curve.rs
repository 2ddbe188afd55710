//! The multiplier curve.
//!
//! Both the tick loop and manual cashouts price a bet with [`value_at`]; there is no
//! other formula, so the settled multiplier always matches the displayed one.

/// Exponential growth rate per second.
pub const GROWTH_RATE: f64 = 0.115;

/// Multiplier after `elapsed_ms` of flight. Starts at 1.0 and grows without bound.
pub fn value_at(elapsed_ms: u64) -> f64 {
    let seconds = elapsed_ms as f64 / 1_000.0;
    (GROWTH_RATE * seconds).exp()
}

/// Earliest elapsed time (in whole milliseconds) at which the curve reaches `multiplier`.
pub fn elapsed_to_reach(multiplier: f64) -> u64 {
    if multiplier.is_nan() || multiplier <= 1.0 {
        return 0;
    }
    let seconds = multiplier.ln() / GROWTH_RATE;
    let mut elapsed_ms = (seconds * 1_000.0).ceil() as u64;
    // Guard against the float round trip landing one millisecond short.
    while value_at(elapsed_ms) < multiplier {
        elapsed_ms += 1;
    }
    elapsed_ms
}
