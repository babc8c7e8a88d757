//! Probability normalizer.
//!
//! Turns per-runner strengths (native model probabilities or fair prices)
//! into a race-level distribution that sums to 1.
//!
//! Inputs are `BTreeMap`s so the summation order is fixed by the keys:
//! identical input always produces bit-identical output.

use std::collections::BTreeMap;

/// Fair prices below this are clamped before inversion.
pub const MIN_FAIR_PRICE: f64 = 1.01;

/// Raw strength of one runner before normalisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strength {
    /// A model probability (negative or non-finite values count as 0).
    Probability(f64),
    /// A fair decimal price, inverted after flooring at [`MIN_FAIR_PRICE`].
    FairPrice(f64),
}

impl Strength {
    /// Un-normalised weight contributed by this runner.
    pub fn raw(&self) -> f64 {
        match *self {
            Strength::Probability(p) if p.is_finite() => p.max(0.0),
            Strength::Probability(_) => 0.0,
            Strength::FairPrice(price) => 1.0 / floor_price(price),
        }
    }
}

/// Clamp a fair price to the floor. NaN is treated as the floor.
pub fn floor_price(price: f64) -> f64 {
    // f64::max ignores a NaN operand
    price.max(MIN_FAIR_PRICE)
}

/// Implied probability of a fair price, as a percentage.
pub fn fair_price_pct(price: f64) -> f64 {
    100.0 / floor_price(price)
}

/// Normalise strengths so the outputs sum to 1.
///
/// Empty input yields empty output. If every raw weight is zero, every
/// output is zero rather than NaN.
pub fn normalize<K: Ord + Clone>(strengths: &BTreeMap<K, Strength>) -> BTreeMap<K, f64> {
    let raw: Vec<(K, f64)> = strengths
        .iter()
        .map(|(key, strength)| (key.clone(), strength.raw()))
        .collect();
    let total: f64 = raw.iter().map(|(_, weight)| weight).sum();

    if total <= 0.0 {
        return raw.into_iter().map(|(key, _)| (key, 0.0)).collect();
    }

    raw.into_iter()
        .map(|(key, weight)| (key, weight / total))
        .collect()
}

/// Convenience wrapper: normalise a map of fair prices.
pub fn normalize_fair_prices<K: Ord + Clone>(prices: &BTreeMap<K, f64>) -> BTreeMap<K, f64> {
    let strengths: BTreeMap<K, Strength> = prices
        .iter()
        .map(|(key, price)| (key.clone(), Strength::FairPrice(*price)))
        .collect();
    normalize(&strengths)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(values: &[f64]) -> BTreeMap<i64, f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, p)| (i as i64 + 1, *p))
            .collect()
    }

    #[test]
    fn test_fair_prices_sum_to_one() {
        let cases = [
            vec![2.5, 4.0, 6.0, 11.0, 21.0],
            vec![1.5, 3.2],
            vec![7.0],
            vec![9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0],
            vec![1.01, 150.0, 3.75, 12.5],
        ];
        for case in cases {
            let probs = normalize_fair_prices(&prices(&case));
            let total: f64 = probs.values().sum();
            assert!((total - 1.0).abs() < 1e-9, "sum was {total} for {case:?}");
        }
    }

    #[test]
    fn test_empty_input_is_empty_output() {
        let probs = normalize_fair_prices::<i64>(&BTreeMap::new());
        assert!(probs.is_empty());
    }

    #[test]
    fn test_sub_floor_prices_are_clamped() {
        let probs = normalize_fair_prices(&prices(&[0.5, 1.01, -3.0, 0.0]));
        // All four clamp to 1.01 → equal share
        for p in probs.values() {
            assert!((p - 0.25).abs() < 1e-12);
        }
        assert!((Strength::FairPrice(f64::NAN).raw() - 1.0 / MIN_FAIR_PRICE).abs() < 1e-12);
    }

    #[test]
    fn test_inverse_price_proportions() {
        let probs = normalize_fair_prices(&prices(&[2.0, 4.0]));
        // 0.5 : 0.25 → 2/3 : 1/3
        assert!((probs[&1] - 2.0 / 3.0).abs() < 1e-12);
        assert!((probs[&2] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_native_probabilities_are_rescaled() {
        let strengths: BTreeMap<&str, Strength> = [
            ("a", Strength::Probability(0.3)),
            ("b", Strength::Probability(0.3)),
            ("c", Strength::Probability(0.6)),
            ("d", Strength::Probability(-0.2)),
        ]
        .into_iter()
        .collect();
        let probs = normalize(&strengths);
        assert!((probs["a"] - 0.25).abs() < 1e-12);
        assert!((probs["c"] - 0.5).abs() < 1e-12);
        assert_eq!(probs["d"], 0.0);
    }

    #[test]
    fn test_all_zero_weights_do_not_divide_by_zero() {
        let strengths: BTreeMap<i64, Strength> =
            [(1, Strength::Probability(0.0)), (2, Strength::Probability(f64::NAN))]
                .into_iter()
                .collect();
        let probs = normalize(&strengths);
        assert_eq!(probs.len(), 2);
        assert!(probs.values().all(|p| *p == 0.0));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let input = prices(&[3.3, 5.1, 2.2, 17.0, 8.8]);
        let first = normalize_fair_prices(&input);
        for _ in 0..10 {
            assert_eq!(normalize_fair_prices(&input), first);
        }
    }

    #[test]
    fn test_fair_price_pct() {
        assert!((fair_price_pct(4.0) - 25.0).abs() < 1e-12);
        assert!((fair_price_pct(0.2) - 100.0 / 1.01).abs() < 1e-12);
    }
}
