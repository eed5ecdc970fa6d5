use serde::{Deserialize, Serialize};
use ta::Next;
use ta::indicators::BollingerBands;

/// Standard BB(20, 2.0)
pub const BB_PERIOD: usize = 20;
pub const BB_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// SMA ± `multiplier` population standard deviations over the trailing
/// `period` closes. `None` when fewer than `period` closes are available.
pub fn compute_bands(closes: &[f64], period: usize, multiplier: f64) -> Option<Bands> {
    if period == 0 || closes.len() < period {
        return None;
    }

    // A fresh indicator over exactly the trailing window keeps the result a
    // pure function of the input slice.
    let mut bb = BollingerBands::new(period, multiplier).ok()?;
    let window = &closes[closes.len() - period..];

    let mut last = None;
    for close in window {
        last = Some(bb.next(*close));
    }

    last.map(|out| Bands {
        upper: out.upper,
        middle: out.average,
        lower: out.lower,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn naive(closes: &[f64], period: usize, multiplier: f64) -> Bands {
        let window = &closes[closes.len() - period..];
        let mean = window.iter().sum::<f64>() / period as f64;
        let var = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / period as f64;
        let sd = var.sqrt();
        Bands {
            upper: mean + multiplier * sd,
            middle: mean,
            lower: mean - multiplier * sd,
        }
    }

    #[test]
    fn too_short_series_has_no_bands() {
        let closes = vec![1.0; BB_PERIOD - 1];
        assert!(compute_bands(&closes, BB_PERIOD, BB_MULTIPLIER).is_none());
        assert!(compute_bands(&[], BB_PERIOD, BB_MULTIPLIER).is_none());
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(compute_bands(&[1.0, 2.0], 0, BB_MULTIPLIER).is_none());
    }

    #[test]
    fn constant_series_collapses_bands() {
        let closes = vec![42.5; 60];
        let bands = compute_bands(&closes, BB_PERIOD, BB_MULTIPLIER).unwrap();
        assert_eq!(bands.upper, bands.middle);
        assert_eq!(bands.middle, bands.lower);
        assert_eq!(bands.middle, 42.5);
    }

    #[test]
    fn uses_population_deviation_of_trailing_window() {
        // Trailing window 2,4,4,4,5,5,7,9: mean 5, population sd 2.
        let closes = [100.0, 100.0, 2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bands = compute_bands(&closes, 8, 2.0).unwrap();
        assert!((bands.middle - 5.0).abs() < 1e-9);
        assert!((bands.upper - 9.0).abs() < 1e-9);
        assert!((bands.lower - 1.0).abs() < 1e-9);
    }

    #[test]
    fn deterministic_and_matches_direct_formula() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let len = rng.random_range(BB_PERIOD..120);
            let closes: Vec<f64> = (0..len).map(|_| rng.random_range(1.0..50_000.0)).collect();

            let a = compute_bands(&closes, BB_PERIOD, BB_MULTIPLIER).unwrap();
            let b = compute_bands(&closes, BB_PERIOD, BB_MULTIPLIER).unwrap();
            assert_eq!(a, b);

            let expected = naive(&closes, BB_PERIOD, BB_MULTIPLIER);
            let tol = 1e-6 * expected.middle.abs().max(1.0);
            assert!((a.middle - expected.middle).abs() < tol);
            assert!((a.upper - expected.upper).abs() < tol);
            assert!((a.lower - expected.lower).abs() < tol);
        }
    }
}
