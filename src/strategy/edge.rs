//! Edge calculation.
//!
//! Compares the race-normalised model probability with the best offered
//! price and decides whether a runner qualifies for the board's
//! recommendation threshold.

use tracing::debug;

use crate::types::round2;

/// `(p × price − 1) × 100`: expected return per unit staked, in percent.
pub fn edge_pct(model_prob: f64, market_price: f64) -> f64 {
    (model_prob * market_price - 1.0) * 100.0
}

/// Model probability as a percentage (race-normalised).
pub fn model_pct(model_prob: f64) -> f64 {
    model_prob * 100.0
}

/// Bookmaker-implied probability as a percentage.
///
/// Not normalised: summed across a race it exceeds 100 by the overround.
pub fn bookmaker_pct(market_price: f64) -> f64 {
    if market_price > 0.0 {
        100.0 / market_price
    } else {
        0.0
    }
}

/// Inclusive threshold check.
pub fn qualifies(edge_pct: f64, min_edge: f64) -> bool {
    edge_pct >= min_edge
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EdgeConfig {
    /// Minimum edge% (inclusive) for a row to qualify.
    pub min_edge: f64,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self { min_edge: 0.0 }
    }
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

/// Edge figures for one runner at one price. Values are full precision.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub model_prob: f64,
    pub market_price: f64,
    pub edge_pct: f64,
    pub model_pct: f64,
    pub bookmaker_pct: f64,
    pub qualifies: bool,
}

pub struct EdgeCalculator {
    config: EdgeConfig,
}

impl EdgeCalculator {
    pub fn new(config: EdgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    /// Evaluate a runner.
    ///
    /// Qualification is judged on the edge as presented (2 dp) so that the
    /// flag never disagrees with the number shown next to it.
    pub fn evaluate(&self, model_prob: f64, market_price: f64) -> Edge {
        let edge = edge_pct(model_prob, market_price);
        let qualifies = qualifies(round2(edge), self.config.min_edge);

        debug!(
            model = format!("{:.2}%", model_pct(model_prob)),
            price = format!("{market_price:.2}"),
            edge = format!("{edge:.2}%"),
            qualifies,
            "Edge evaluated"
        );

        Edge {
            model_prob,
            market_price,
            edge_pct: edge,
            model_pct: model_pct(model_prob),
            bookmaker_pct: bookmaker_pct(market_price),
            qualifies,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_pct_reference_values() {
        assert!((edge_pct(0.25, 5.0) - 25.0).abs() < 1e-9);
        assert!((edge_pct(0.5, 1.8) - (-10.0)).abs() < 1e-9);
        assert!(edge_pct(0.2, 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_bookmaker_pct() {
        assert!((bookmaker_pct(4.0) - 25.0).abs() < 1e-12);
        assert_eq!(bookmaker_pct(0.0), 0.0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert!(qualifies(1.0, 1.0));
        assert!(qualifies(1.01, 1.0));
        assert!(!qualifies(0.99, 1.0));
    }

    #[test]
    fn test_evaluate_populates_all_fields() {
        let calc = EdgeCalculator::new(EdgeConfig { min_edge: 5.0 });
        let e = calc.evaluate(0.25, 5.0);
        assert!((e.edge_pct - 25.0).abs() < 1e-9);
        assert!((e.model_pct - 25.0).abs() < 1e-9);
        assert!((e.bookmaker_pct - 20.0).abs() < 1e-9);
        assert!(e.qualifies);
    }

    #[test]
    fn test_evaluate_negative_edge_does_not_qualify() {
        let calc = EdgeCalculator::new(EdgeConfig::default());
        let e = calc.evaluate(0.5, 1.8);
        assert!(!e.qualifies);
    }

    #[test]
    fn test_qualification_uses_presented_edge() {
        // 0.2 × 5.0498 = 1.00996 → edge 0.996% displays as 1.00%
        let calc = EdgeCalculator::new(EdgeConfig { min_edge: 1.0 });
        let e = calc.evaluate(0.2, 5.0498);
        assert!(e.edge_pct < 1.0);
        assert!(e.qualifies);
    }

    #[test]
    fn test_edge_config_default() {
        let config = EdgeConfig::default();
        assert_eq!(config.min_edge, 0.0);
    }
}
