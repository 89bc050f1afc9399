//! Integration tests for the correlation pipeline.

use std::collections::HashMap;

use portsim::core::returns::ReturnSeries;
use portsim::core::types::{CorrelationMethod, HistoryWindow};
use portsim::correlation::{CorrelationEstimator, CorrelationMatrix, LagAnalyzer};
use portsim::simulation::Xoshiro256;

/// Generate two return series with the given target correlation.
fn correlated_pair(n: usize, rho: f64, seed: u64) -> (ReturnSeries, ReturnSeries) {
    let mut rng = Xoshiro256::new(seed);
    let mut a = Vec::with_capacity(n);
    let mut b = Vec::with_capacity(n);
    for _ in 0..n {
        let z1 = rng.next_normal();
        let z2 = rho * z1 + (1.0 - rho * rho).sqrt() * rng.next_normal();
        a.push(z1 * 0.01);
        b.push(z2 * 0.01);
    }
    (ReturnSeries::from_returns(a), ReturnSeries::from_returns(b))
}

fn assert_valid_invariants(matrix: &CorrelationMatrix) {
    let n = matrix.len();
    for i in 0..n {
        assert!((matrix.get(i, i) - 1.0).abs() < 1e-9, "unit diagonal");
        for j in 0..n {
            let v = matrix.get(i, j);
            assert!((v - matrix.get(j, i)).abs() < 1e-9, "symmetry");
            assert!((-1.0..=1.0).contains(&v), "entry {v} out of range");
        }
    }
    assert!(matrix.min_eigenvalue() > -1e-6, "PSD within tolerance");
}

#[test]
fn test_estimated_matrix_satisfies_invariants() {
    let (a, b) = correlated_pair(300, 0.7, 11);
    let (c, _) = correlated_pair(300, 0.0, 99);
    let mut series = HashMap::new();
    series.insert("A".to_string(), a);
    series.insert("B".to_string(), b);
    series.insert("C".to_string(), c);
    let tickers: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();

    for method in [
        CorrelationMethod::Sample,
        CorrelationMethod::Ewma,
        CorrelationMethod::LedoitWolf,
    ] {
        let estimate = CorrelationEstimator::new(method, HistoryWindow::OneYear)
            .estimate(&series, &tickers)
            .unwrap();
        assert_valid_invariants(&estimate.matrix);
    }
}

#[test]
fn test_sample_correlation_recovers_target() {
    let (a, b) = correlated_pair(5000, 0.7, 42);
    let mut series = HashMap::new();
    series.insert("A".to_string(), a);
    series.insert("B".to_string(), b);
    let tickers = vec!["A".to_string(), "B".to_string()];

    let estimate = CorrelationEstimator::new(CorrelationMethod::Sample, HistoryWindow::ThreeYears)
        .estimate(&series, &tickers)
        .unwrap();
    // Only the trailing 756 observations survive the window; sampling noise
    // at that depth stays within a few points of the target.
    let rho = estimate.matrix.get(0, 1);
    assert!((rho - 0.7).abs() < 0.08, "estimated rho {rho}");
}

#[test]
fn test_ten_day_overlap_falls_back_to_zero() {
    let (a, _) = correlated_pair(300, 0.0, 5);
    // B only overlaps A's last 10 timestamps.
    let b = ReturnSeries::new(
        (290..300).collect(),
        vec![0.01, -0.02, 0.005, 0.01, -0.01, 0.02, 0.0, -0.005, 0.015, 0.01],
    )
    .unwrap();
    let (c, _) = correlated_pair(300, 0.0, 6);

    let mut series = HashMap::new();
    series.insert("A".to_string(), a);
    series.insert("B".to_string(), b);
    series.insert("C".to_string(), c);
    let tickers: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();

    let estimate = CorrelationEstimator::new(CorrelationMethod::Sample, HistoryWindow::OneYear)
        .estimate(&series, &tickers)
        .unwrap();

    let i = estimate.matrix.index_of("A").unwrap();
    let j = estimate.matrix.index_of("B").unwrap();
    assert_eq!(estimate.matrix.get(i, j), 0.0);
    assert!(!estimate.warnings.is_empty());
    assert_valid_invariants(&estimate.matrix);
}

#[test]
fn test_hand_edited_asymmetric_matrix_repaired() {
    let tickers: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
    let mut matrix = CorrelationMatrix::from_rows(
        tickers,
        vec![
            vec![1.0, 0.9, -1.5],
            vec![0.4, 1.0, 0.8],
            vec![-0.7, 0.2, 1.0],
        ],
    )
    .unwrap();

    matrix.make_valid();
    assert_valid_invariants(&matrix);
}

#[test]
fn test_lag_adjustment_preserves_invariants() {
    // B echoes A with a one-day delay, so the same-day correlation
    // understates the relationship.
    let mut rng = Xoshiro256::new(77);
    let driver: Vec<f64> = (0..400).map(|_| rng.next_normal() * 0.01).collect();
    let a = ReturnSeries::from_returns(driver.clone());
    let echoed: Vec<f64> = (0..400)
        .map(|i| {
            if i == 0 {
                0.0
            } else {
                0.9 * driver[i - 1] + 0.1 * rng.next_normal() * 0.01
            }
        })
        .collect();
    let b = ReturnSeries::from_returns(echoed);

    let mut series = HashMap::new();
    series.insert("A".to_string(), a);
    series.insert("B".to_string(), b);
    let tickers = vec!["A".to_string(), "B".to_string()];

    let estimate = CorrelationEstimator::new(CorrelationMethod::Sample, HistoryWindow::OneYear)
        .estimate(&series, &tickers)
        .unwrap();
    let before = estimate.matrix.get(0, 1).abs();

    let lag_result = LagAnalyzer::new(0.97)
        .unwrap()
        .analyze(&series, &tickers)
        .unwrap();
    assert!(!lag_result.significant_pairs().is_empty());

    let adjusted = lag_result.apply_adjustment(&estimate.matrix);
    assert!(adjusted.get(0, 1).abs() > before);
    assert_valid_invariants(&adjusted);
}
