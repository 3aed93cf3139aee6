use serde::{Deserialize, Serialize};

/// Accuracy of a rating predictor on a held-out slice of events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub rmse: f64,
    pub mae: f64,
    pub sample_count: usize,
}

pub fn rmse(pairs: &[(f32, f32)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }

    let sum_sq: f64 = pairs
        .iter()
        .map(|(predicted, actual)| {
            let err = (predicted - actual) as f64;
            err * err
        })
        .sum();
    (sum_sq / pairs.len() as f64).sqrt()
}

pub fn mae(pairs: &[(f32, f32)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }

    let sum_abs: f64 = pairs
        .iter()
        .map(|(predicted, actual)| ((predicted - actual) as f64).abs())
        .sum();
    sum_abs / pairs.len() as f64
}

pub fn evaluate(pairs: &[(f32, f32)]) -> EvaluationReport {
    EvaluationReport {
        rmse: rmse(pairs),
        mae: mae(pairs),
        sample_count: pairs.len(),
    }
}
