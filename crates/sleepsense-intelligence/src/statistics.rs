// ABOUTME: Statistical helpers shared by the signal and calibration algorithms
// ABOUTME: Mean, population standard deviation, median, and weighted linear regression
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense
#![allow(clippy::cast_precision_loss)] // Safe: sample counts are far below f64 mantissa range

//! All helpers are total: empty input yields `0.0` or `None` rather than an error.

/// Arithmetic mean, `0.0` for an empty slice
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance, `0.0` for an empty slice
#[must_use]
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation, `0.0` for an empty slice
#[must_use]
pub fn population_std_dev(values: &[f64]) -> f64 {
    population_variance(values).sqrt()
}

/// Median; even-length input averages the two middle values
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Weighted least-squares slope of `y` against `x`
///
/// Returns `None` when the slices differ in length, fewer than two points are
/// given, the total weight is not positive, or `x` has no weighted variance.
#[must_use]
pub fn weighted_linear_slope(x: &[f64], y: &[f64], weights: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() != weights.len() || x.len() < 2 {
        return None;
    }

    let total_weight: f64 = weights.iter().sum();
    if total_weight <= 0.0 {
        return None;
    }

    let mean_x = x.iter().zip(weights).map(|(xi, w)| xi * w).sum::<f64>() / total_weight;
    let mean_y = y.iter().zip(weights).map(|(yi, w)| yi * w).sum::<f64>() / total_weight;

    let mut covariance = 0.0;
    let mut variance_x = 0.0;
    for ((xi, yi), w) in x.iter().zip(y).zip(weights) {
        let dx = xi - mean_x;
        covariance = (w * dx).mul_add(yi - mean_y, covariance);
        variance_x = (w * dx).mul_add(dx, variance_x);
    }

    if variance_x.abs() < f64::EPSILON {
        return None;
    }
    Some(covariance / variance_x)
}
