//! Precomputed angle-to-turn lookup.
//!
//! The table samples a [`ResponseCurve`] at `buckets` evenly spaced points
//! over the angle domain `[0, 360)`. Every curve maps `[0, 1)` into
//! `[0, 0.5]`, so [`TurnLookupTable::query`] returns turn values within
//! `[0, 180]` degrees.
//!
//! The table is built once at startup and shared read-only (behind an
//! `Arc`) with the decision policy.

use std::f64::consts::PI;

use serde::Deserialize;

/// Upper bound of every response curve.
pub const CURVE_MAX: f64 = 0.5;

/// Scale applied to a table entry to obtain degrees.
const DEGREES_SCALE: f64 = 360.0;

/// Errors that can occur when building a lookup table.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// The bucket count was zero.
    #[error("lookup table needs at least one bucket")]
    NoBuckets,
}

/// The smooth response function sampled into the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCurve {
    /// `0.5 * sin(pi * x)`: rises to 0.5 at mid-domain and falls back
    /// toward 0.
    #[default]
    HalfSine,
    /// `0.5 * (3x^2 - 2x^3)`: monotonic smoothstep.
    SmoothStep,
    /// `0.5 * x`: monotonic and linear.
    Linear,
}

impl ResponseCurve {
    /// Evaluate the curve at `x` in `[0, 1]`.
    pub fn eval(self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        match self {
            Self::HalfSine => CURVE_MAX * (PI * x).sin(),
            Self::SmoothStep => CURVE_MAX * x * x * 2.0f64.mul_add(-x, 3.0),
            Self::Linear => CURVE_MAX * x,
        }
    }
}

/// Which table the kick blend uses for enemy directions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyTable {
    /// The primary turn response.
    #[default]
    Primary,
    /// The opponent estimate (`0.5 - value`).
    Opponent,
}

/// Immutable angle-to-turn lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnLookupTable {
    entries: Vec<f64>,
    curve: ResponseCurve,
}

impl TurnLookupTable {
    /// Default number of buckets over the angle domain.
    pub const DEFAULT_BUCKETS: usize = 1000;

    /// Sample `curve` into `buckets` entries.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NoBuckets`] if `buckets` is zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn build(curve: ResponseCurve, buckets: usize) -> Result<Self, TableError> {
        if buckets == 0 {
            return Err(TableError::NoBuckets);
        }
        let entries = (0..buckets)
            .map(|i| curve.eval(i as f64 / buckets as f64))
            .collect();
        Ok(Self { entries, curve })
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no buckets (never true for a built table).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The curve this table was sampled from.
    pub const fn curve(&self) -> ResponseCurve {
        self.curve
    }

    /// Raw entries, in bucket order.
    pub fn entries(&self) -> &[f64] {
        &self.entries
    }

    /// Turn response for `angle` in degrees. Any finite angle is accepted
    /// and normalised into `[0, 360)`; `None` for NaN or infinity.
    pub fn query(&self, angle: f64) -> Option<f64> {
        self.entry(angle).map(|v| v * DEGREES_SCALE)
    }

    /// Opponent-direction estimate for `angle`: `(0.5 - value) * 360`.
    pub fn query_opponent(&self, angle: f64) -> Option<f64> {
        self.entry(angle).map(|v| (CURVE_MAX - v) * DEGREES_SCALE)
    }

    /// Query through the table selected by `which`.
    pub fn query_with(&self, which: EnemyTable, angle: f64) -> Option<f64> {
        match which {
            EnemyTable::Primary => self.query(angle),
            EnemyTable::Opponent => self.query_opponent(angle),
        }
    }

    /// Bucket index for `angle`, or `None` if the angle is not finite.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn bucket(&self, angle: f64) -> Option<usize> {
        if !angle.is_finite() {
            return None;
        }
        let normalized = angle.rem_euclid(DEGREES_SCALE);
        let raw = (normalized * self.entries.len() as f64 / DEGREES_SCALE).floor();
        // `normalized` is in [0, 360), so `raw` is non-negative; rounding at
        // the top edge can still land on `len`, hence the clamp.
        let last = self.entries.len().saturating_sub(1);
        Some((raw as usize).min(last))
    }

    fn entry(&self, angle: f64) -> Option<f64> {
        self.bucket(angle).and_then(|i| self.entries.get(i).copied())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn all_curves() -> [ResponseCurve; 3] {
        [
            ResponseCurve::HalfSine,
            ResponseCurve::SmoothStep,
            ResponseCurve::Linear,
        ]
    }

    #[test]
    fn zero_buckets_rejected() {
        assert!(matches!(
            TurnLookupTable::build(ResponseCurve::Linear, 0),
            Err(TableError::NoBuckets)
        ));
    }

    #[test]
    fn every_angle_stays_within_bounds() {
        for curve in all_curves() {
            let table = TurnLookupTable::build(curve, TurnLookupTable::DEFAULT_BUCKETS).unwrap();
            let mut angle = 0.0;
            while angle < 360.0 {
                let turn = table.query(angle).unwrap();
                let opp = table.query_opponent(angle).unwrap();
                assert!((0.0..=180.0).contains(&turn), "{curve:?} {angle} -> {turn}");
                assert!((0.0..=180.0).contains(&opp), "{curve:?} {angle} -> {opp}");
                angle += 0.25;
            }
        }
    }

    #[test]
    fn full_turn_wraps_to_zero() {
        let table = TurnLookupTable::build(ResponseCurve::HalfSine, 1000).unwrap();
        assert_eq!(table.bucket(360.0), Some(0));
        assert_eq!(table.bucket(0.0), Some(0));
        assert_eq!(table.query(360.0), table.query(0.0));
        assert_eq!(table.query(-10.0), table.query(350.0));
        assert_eq!(table.query(725.0), table.query(5.0));
    }

    #[test]
    fn bucket_index_matches_floor_formula() {
        let table = TurnLookupTable::build(ResponseCurve::Linear, 1000).unwrap();
        assert_eq!(table.bucket(90.0), Some(250));
        assert_eq!(table.bucket(359.999), Some(999));
        assert_eq!(table.bucket(0.35), Some(0));
        assert_eq!(table.bucket(0.37), Some(1));
    }

    #[test]
    fn adjacent_buckets_change_smoothly() {
        for curve in all_curves() {
            let table = TurnLookupTable::build(curve, 1000).unwrap();
            // Max slope of every curve is 0.5 * pi per unit x; one bucket is
            // 1/1000 of the domain.
            let bound = CURVE_MAX * PI / 1000.0 + EPS;
            for pair in table.entries().windows(2) {
                if let [a, b] = pair {
                    assert!((b - a).abs() <= bound, "{curve:?}: {a} -> {b}");
                }
            }
        }
    }

    #[test]
    fn opponent_table_is_affine_in_primary() {
        let table = TurnLookupTable::build(ResponseCurve::HalfSine, 1000).unwrap();
        for angle in [0.0, 45.0, 90.0, 180.0, 270.0] {
            let sum = table.query(angle).unwrap() + table.query_opponent(angle).unwrap();
            assert!((sum - 180.0).abs() < EPS);
        }
    }

    #[test]
    fn half_sine_peaks_mid_domain() {
        let table = TurnLookupTable::build(ResponseCurve::HalfSine, 1000).unwrap();
        assert!((table.query(180.0).unwrap() - 180.0).abs() < EPS);
        assert!(table.query(0.0).unwrap().abs() < EPS);
    }

    #[test]
    fn non_finite_angles_have_no_response() {
        let table = TurnLookupTable::build(ResponseCurve::Linear, 10).unwrap();
        assert_eq!(table.query(f64::NAN), None);
        assert_eq!(table.query_opponent(f64::INFINITY), None);
    }
}
