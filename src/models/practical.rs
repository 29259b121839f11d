// src/models/practical.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// One row of the resistance-of-a-wire results table.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Reading {
    pub length_cm: f64,
    pub voltage_v: f64,
    pub current_a: f64,
}

/// DTO for the resistance practical: equipment check, readings and an
/// optional gradient the student worked out from their graph.
#[derive(Debug, Deserialize, Validate)]
pub struct ResistanceLabRequest {
    #[validate(range(min = 0.001, max = 1.0))]
    pub ammeter_resolution: f64,
    #[validate(range(min = 0.01, max = 20.0))]
    pub voltmeter_resolution: f64,
    #[validate(length(min = 1, max = 100))]
    pub readings: Vec<Reading>,
    pub student_gradient: Option<f64>,
}

/// A reading with its computed resistance.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ResistancePoint {
    pub length_cm: f64,
    pub resistance_ohm: f64,
}

/// Least-squares line `R = gradient * L + intercept`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct BestFit {
    pub gradient: f64,
    pub intercept: f64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GradientVerdict {
    /// Within 5% of the best-fit gradient.
    Great,
    /// Within 10%.
    Close,
    TryAgain,
}

#[derive(Debug, Serialize)]
pub struct GradientCheck {
    pub student_gradient: f64,
    pub percent_difference: f64,
    pub verdict: GradientVerdict,
}

#[derive(Debug, Serialize)]
pub struct ResistanceLabResponse {
    pub points: Vec<ResistancePoint>,
    pub discarded_rows: usize,
    pub best_fit: BestFit,
    pub gradient_check: Option<GradientCheck>,
}
