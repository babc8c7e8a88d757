//! Kelly criterion stake suggestion.
//!
//! Suggests a fractional-Kelly stake for a board row from the model
//! probability, the best price and the user's bankroll (in units).

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Kelly sizing configuration.
#[derive(Debug, Clone)]
pub struct KellyConfig {
    /// Fractional Kelly multiplier (0.5 = half-Kelly).
    pub multiplier: f64,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self { multiplier: 0.5 }
    }
}

// ---------------------------------------------------------------------------
// Kelly calculator
// ---------------------------------------------------------------------------

/// Full Kelly fraction `f* = (b·p − q) / b` where `b = price − 1`.
///
/// Returns `None` when the price offers no net return or the fraction is not
/// positive (no bet).
pub fn kelly_fraction(win_prob: f64, price: f64) -> Option<f64> {
    let b = price - 1.0;
    if !(b > 0.0) || !win_prob.is_finite() {
        return None;
    }
    let q = 1.0 - win_prob;
    let f = (b * win_prob - q) / b;
    (f > 0.0).then_some(f)
}

pub struct KellyCalculator {
    config: KellyConfig,
}

impl KellyCalculator {
    pub fn new(config: KellyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KellyConfig {
        &self.config
    }

    /// Suggested stake in bankroll units, or `None` when Kelly says no bet.
    pub fn suggested_stake(&self, win_prob: f64, price: f64, bankroll: f64) -> Option<f64> {
        if !(bankroll > 0.0) {
            return None;
        }
        kelly_fraction(win_prob, price).map(|f| f * self.config.multiplier * bankroll)
    }
}

impl Default for KellyCalculator {
    fn default() -> Self {
        Self::new(KellyConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
