//! Hyperparameter grid searches
//!
//! Plain exhaustive search, no pruning: every candidate is evaluated
//! with the same engine the final metrics come from, and results are
//! returned sorted ascending by the configured error so the first entry
//! is the winner.

use crate::cleaning::CleanedFrame;
use crate::config::ValidationMode;
use crate::error::Result;
use crate::evaluation::{evaluate_split, EvalConfig, EvaluationResult};
use crate::features::{build_feature_frame, FeatureFrame, FeatureSpec};
use crate::metrics::TestSize;
use crate::models::BoostingParams;
use serde::Serialize;
use tracing::info;

/// Candidate lag sets tried when auto-selection is on.
pub fn default_lag_candidates() -> Vec<Vec<usize>> {
    vec![vec![1, 2, 4], vec![1, 2, 3, 4], vec![1, 3, 6]]
}

/// One evaluated lag candidate.
#[derive(Debug, Clone, Serialize)]
pub struct LagSearchEntry {
    pub lags: Vec<usize>,
    pub rmse_multi: f64,
    pub wf_rmse_multi: f64,
    pub rmse_base: f64,
    pub wf_rmse_base: f64,
    pub improvement_pct: f64,
}

impl LagSearchEntry {
    fn from_result(lags: Vec<usize>, result: &EvaluationResult) -> Self {
        Self {
            lags,
            rmse_multi: result.rmse_multi,
            wf_rmse_multi: result.wf_rmse_multi,
            rmse_base: result.rmse_base,
            wf_rmse_base: result.wf_rmse_base,
            improvement_pct: result.improvement_pct,
        }
    }

    /// Error used for ranking under the given validation mode.
    pub fn metric(&self, mode: ValidationMode) -> f64 {
        match mode {
            ValidationMode::WalkForward => self.wf_rmse_multi,
            ValidationMode::SingleSplit => self.rmse_multi,
        }
    }
}

/// Evaluate every candidate lag set on a freshly built feature frame and
/// rank them by the chosen validation error, best first.
pub fn grid_search_lags(
    cleaned: &CleanedFrame,
    spec: &FeatureSpec,
    candidates: &[Vec<usize>],
    test_size: &TestSize,
    config: &EvalConfig,
    mode: ValidationMode,
) -> Result<Vec<LagSearchEntry>> {
    let mut entries = Vec::with_capacity(candidates.len());
    for lags in candidates {
        let candidate_spec = FeatureSpec {
            lags: lags.clone(),
            ..spec.clone()
        };
        let frame = build_feature_frame(cleaned, &candidate_spec)?;
        let result = evaluate_split(&frame, lags, test_size, config)?;
        info!(
            lags = ?lags,
            wf_rmse = result.wf_rmse_multi,
            rmse = result.rmse_multi,
            "lag candidate evaluated"
        );
        entries.push(LagSearchEntry::from_result(lags.clone(), &result));
    }
    entries.sort_by(|a, b| a.metric(mode).total_cmp(&b.metric(mode)));
    Ok(entries)
}

/// One evaluated boosting-parameter candidate.
#[derive(Debug, Clone, Serialize)]
pub struct BoostingSearchEntry {
    pub params: BoostingParams,
    pub rmse_multi: f64,
    pub wf_rmse_multi: f64,
    pub improvement_pct: f64,
}

/// Evaluate boosting-parameter candidates on a fixed frame, ranked by
/// walk-forward multivariate RMSE.
pub fn grid_search_boosting(
    frame: &FeatureFrame,
    lags: &[usize],
    test_size: &TestSize,
    grid: &[BoostingParams],
    config: &EvalConfig,
) -> Result<Vec<BoostingSearchEntry>> {
    let mut entries = Vec::with_capacity(grid.len());
    for params in grid {
        let candidate_config = EvalConfig {
            boosting_params: Some(params.clone()),
            ..config.clone()
        };
        let result = evaluate_split(frame, lags, test_size, &candidate_config)?;
        entries.push(BoostingSearchEntry {
            params: params.clone(),
            rmse_multi: result.rmse_multi,
            wf_rmse_multi: result.wf_rmse_multi,
            improvement_pct: result.improvement_pct,
        });
    }
    entries.sort_by(|a, b| a.wf_rmse_multi.total_cmp(&b.wf_rmse_multi));
    Ok(entries)
}
