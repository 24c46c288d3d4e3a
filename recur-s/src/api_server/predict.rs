use axum::{extract::State, Json};
use common::{Model, PipelineError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api_server::schema::{PatientRecord, ValidatedRecord};
use crate::api_server::ApiServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Recurrence {
    Yes,
    No,
}

impl Recurrence {
    pub fn from_label(label: i64) -> Result<Self, InferenceError> {
        match label {
            0 => Ok(Recurrence::No),
            1 => Ok(Recurrence::Yes),
            other => Err(InferenceError::UnexpectedLabel(other)),
        }
    }
}

/// Payload-level failures; rendered as `{"error": ...}` with a 200 status.
#[derive(Debug, Error, PartialEq)]
pub enum InferenceError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("unexpected class label {0}")]
    UnexpectedLabel(i64),
    #[error("expected two class probabilities, got {0}")]
    ProbabilityShape(usize),
    #[error("probability {0} is outside [0, 1]")]
    ProbabilityRange(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionResponse {
    Success {
        prediction: Recurrence,
        probability: String,
    },
    Failure {
        error: String,
    },
}

/// Percentage with two decimals, e.g. `0.73421` -> `"73.42%"`.
pub fn format_probability(p: f64) -> Result<String, InferenceError> {
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(InferenceError::ProbabilityRange(p));
    }
    let pct = if p <= 0.0 { 0.0 } else { p * 100.0 };
    Ok(format!("{:.2}%", pct))
}

fn infer(model: &dyn Model, record: &PatientRecord) -> Result<(Recurrence, String), InferenceError> {
    let frame = record.to_frame();
    let decision = Recurrence::from_label(model.predict(&frame)?)?;
    let proba = model.predict_proba(&frame)?;
    let positive = proba
        .get(1)
        .copied()
        .filter(|_| proba.len() == 2)
        .ok_or(InferenceError::ProbabilityShape(proba.len()))?;
    Ok((decision, format_probability(positive)?))
}

pub fn handle_predict(model: &dyn Model, record: &PatientRecord) -> PredictionResponse {
    match infer(model, record) {
        Ok((prediction, probability)) => {
            debug!("Prediction: {:?} ({})", prediction, probability);
            PredictionResponse::Success {
                prediction,
                probability,
            }
        }
        Err(e) => {
            warn!("Inference failed: {}", e);
            PredictionResponse::Failure {
                error: e.to_string(),
            }
        }
    }
}

pub async fn predict(
    State(app_state): State<Arc<ApiServer>>,
    ValidatedRecord(record): ValidatedRecord,
) -> Json<PredictionResponse> {
    Json(handle_predict(app_state.model.as_ref(), &record))
}
