// src/utils/fit.rs

use crate::models::practical::{BestFit, GradientVerdict};

/// Ordinary least-squares straight line through `(x, y)` points.
///
/// Returns `None` for fewer than two points or when every `x` is equal.
pub fn linear_fit(points: &[(f64, f64)]) -> Option<BestFit> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let (sum_x, sum_y, sum_xy, sum_xx) = points.iter().fold(
        (0.0, 0.0, 0.0, 0.0),
        |(sx, sy, sxy, sxx), (x, y)| (sx + x, sy + y, sxy + x * y, sxx + x * x),
    );

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        return None;
    }

    let gradient = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - gradient * sum_x) / n;
    Some(BestFit {
        gradient,
        intercept,
    })
}

/// Percentage difference between a student's gradient and the fitted one.
/// A zero answer counts as 100% off.
pub fn percent_difference(student: f64, fitted: f64) -> f64 {
    if student == 0.0 {
        return 100.0;
    }
    if fitted == 0.0 {
        return 100.0;
    }
    ((student - fitted) / fitted).abs() * 100.0
}

pub fn verdict(percent_difference: f64) -> GradientVerdict {
    if percent_difference < 5.0 {
        GradientVerdict::Great
    } else if percent_difference < 10.0 {
        GradientVerdict::Close
    } else {
        GradientVerdict::TryAgain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_exact_line() {
        let fit = linear_fit(&[(10.0, 1.5), (20.0, 2.5), (30.0, 3.5)]).unwrap();
        assert!((fit.gradient - 0.1).abs() < 1e-9);
        assert!((fit.intercept - 0.5).abs() < 1e-9);
    }

    #[test]
    fn vertical_data_has_no_fit() {
        assert!(linear_fit(&[(10.0, 1.0), (10.0, 2.0), (10.0, 3.0)]).is_none());
        assert!(linear_fit(&[(10.0, 1.0)]).is_none());
    }

    #[test]
    fn verdict_thresholds() {
        assert_eq!(verdict(percent_difference(0.104, 0.1)), GradientVerdict::Great);
        assert_eq!(verdict(percent_difference(0.108, 0.1)), GradientVerdict::Close);
        assert_eq!(verdict(percent_difference(0.2, 0.1)), GradientVerdict::TryAgain);
        assert_eq!(verdict(percent_difference(0.0, 0.1)), GradientVerdict::TryAgain);
    }
}
