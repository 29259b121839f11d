// src/handlers/practical.rs

//! Resistance-of-a-wire practical: resistance per reading, a best-fit line
//! and a check of the student's own gradient.

use axum::{Json, response::IntoResponse};
use validator::Validate;

use crate::{
    error::AppError,
    models::practical::{
        GradientCheck, Reading, ResistanceLabRequest, ResistanceLabResponse, ResistancePoint,
    },
    utils::fit::{linear_fit, percent_difference, verdict},
};

const MIN_POINTS: usize = 3;

fn resistance_points(readings: &[Reading]) -> Vec<ResistancePoint> {
    readings
        .iter()
        .filter(|r| r.current_a > 0.0 && r.length_cm.is_finite() && r.voltage_v.is_finite())
        .map(|r| ResistancePoint {
            length_cm: r.length_cm,
            resistance_ohm: r.voltage_v / r.current_a,
        })
        .collect()
}

pub fn analyse(request: &ResistanceLabRequest) -> Result<ResistanceLabResponse, AppError> {
    let points = resistance_points(&request.readings);
    if points.len() < MIN_POINTS {
        return Err(AppError::BadRequest(format!(
            "Enter at least {} readings with a current above zero",
            MIN_POINTS
        )));
    }

    let xy: Vec<(f64, f64)> = points
        .iter()
        .map(|p| (p.length_cm, p.resistance_ohm))
        .collect();
    let best_fit = linear_fit(&xy).ok_or_else(|| {
        AppError::BadRequest("Readings need at least two different lengths".to_string())
    })?;

    let gradient_check = request.student_gradient.map(|g| {
        let diff = percent_difference(g, best_fit.gradient);
        GradientCheck {
            student_gradient: g,
            percent_difference: diff,
            verdict: verdict(diff),
        }
    });

    Ok(ResistanceLabResponse {
        discarded_rows: request.readings.len() - points.len(),
        points,
        best_fit,
        gradient_check,
    })
}

pub async fn analyse_resistance(
    Json(payload): Json<ResistanceLabRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    Ok(Json(analyse(&payload)?))
}
