use std::sync::Arc;

use anyhow::Error as AnyError;
use polars::prelude::*;
use serde::Serialize;

use crate::analysis::run::{AnalysisOutput, BatchReport};
use crate::error::{Result, SpatialError};
use crate::gwr::{GwrModel, GwrSummary};
use crate::stats::{BivariateMoranResult, MoranResult};

/// Serializable view of one request outcome, for the reporting collaborator.
#[derive(Debug, Serialize)]
pub struct RequestRecord {
    pub id: String,
    pub dropped: usize,
    #[serde(flatten)]
    pub outcome: OutcomeRecord,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeRecord {
    Moran {
        result: MoranResult,
        conclusion: String,
    },
    BivariateMoran {
        result: BivariateMoranResult,
        conclusion: String,
    },
    Gwr {
        summary: GwrSummary,
    },
    Failed {
        kind: &'static str,
        message: String,
    },
}

impl BatchReport {
    /// Scalar records for every request, failures included.
    pub fn records(&self) -> Vec<RequestRecord> {
        self.outcomes
            .iter()
            .map(|outcome| {
                let body = match &outcome.result {
                    Ok(AnalysisOutput::Moran(result)) => OutcomeRecord::Moran {
                        result: result.clone(),
                        conclusion: result.conclusion(self.significance).to_string(),
                    },
                    Ok(AnalysisOutput::BivariateMoran(result)) => OutcomeRecord::BivariateMoran {
                        result: result.clone(),
                        conclusion: result.conclusion(self.significance).to_string(),
                    },
                    Ok(AnalysisOutput::Gwr { model, .. }) => {
                        OutcomeRecord::Gwr { summary: model.summary() }
                    }
                    Err(err) => OutcomeRecord::Failed { kind: err.kind(), message: err.to_string() },
                };
                RequestRecord {
                    id: outcome.id.to_string(),
                    dropped: outcome.dropped,
                    outcome: body,
                }
            })
            .collect()
    }

    /// Batch summary as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.records())
            .map_err(|e| SpatialError::Upstream(AnyError::new(e)))
    }

    /// Per-unit coefficient tables for every GWR outcome, keyed by request.
    pub fn gwr_frames(&self) -> Result<Vec<(Arc<str>, DataFrame)>> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match &outcome.result {
                Ok(AnalysisOutput::Gwr { model, unit_ids }) => {
                    Some(gwr_frame(model, unit_ids).map(|df| (outcome.id.clone(), df)))
                }
                _ => None,
            })
            .collect()
    }
}

/// Assemble the per-unit result table of a GWR fit: one row per unit, one
/// column per local coefficient, plus the local goodness of fit.
pub fn gwr_frame(model: &GwrModel, unit_ids: &[Arc<str>]) -> Result<DataFrame> {
    if unit_ids.len() != model.n() {
        return Err(SpatialError::DimensionMismatch {
            expected: model.n(),
            got: unit_ids.len(),
        });
    }

    let mut columns: Vec<Column> = Vec::with_capacity(model.covariate_names.len() + 3);
    columns.push(Column::new(
        "unit_id".into(),
        unit_ids.iter().map(|id| id.as_ref()).collect::<Vec<&str>>(),
    ));
    columns.push(Column::new("intercept".into(), model.coefficients.column(0).to_vec()));
    for (k, name) in model.covariate_names.iter().enumerate() {
        columns.push(Column::new(
            format!("coef_{name}").into(),
            model.coefficients.column(k + 1).to_vec(),
        ));
    }
    columns.push(Column::new("local_r2".into(), model.local_r2.clone()));

    DataFrame::new(columns).map_err(|e| SpatialError::Upstream(AnyError::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::request::{AnalysisRequest, Operation};
    use crate::config::{AnalysisConfig, MoranConfig};
    use crate::analysis::run::Orchestrator;
    use crate::units::{AttributeVector, GeoUnit};
    use geo::{MultiPolygon, polygon};

    fn strip(n: usize) -> Vec<GeoUnit> {
        (0..n)
            .map(|i| {
                let x = i as f64;
                GeoUnit::new(
                    format!("u{i}"),
                    MultiPolygon(vec![polygon![
                        (x: x, y: 0.0),
                        (x: x + 1.0, y: 0.0),
                        (x: x + 1.0, y: 1.0),
                        (x: x, y: 1.0),
                        (x: x, y: 0.0),
                    ]]),
                )
            })
            .collect()
    }

    fn report() -> BatchReport {
        let n = 16;
        let x: Vec<f64> = (0..n).map(|i| (i % 5) as f64).collect();
        let y: Vec<f64> = x.iter().enumerate().map(|(i, v)| 2.0 * v + (i % 3) as f64).collect();
        let catalog = vec![
            AnalysisRequest::new(
                "moran",
                strip(n),
                vec![AttributeVector::dense("v", (0..n).map(|i| i as f64).collect())],
                Operation::GlobalMoran { attribute: "v".into() },
            )
            .unwrap(),
            AnalysisRequest::new(
                "fit",
                strip(n),
                vec![AttributeVector::dense("y", y), AttributeVector::dense("x", x)],
                Operation::Gwr { dependent: "y".into(), covariates: vec!["x".into()] },
            )
            .unwrap(),
            AnalysisRequest::new(
                "flat",
                strip(n),
                vec![AttributeVector::dense("v", vec![0.0; n])],
                Operation::GlobalMoran { attribute: "v".into() },
            )
            .unwrap(),
        ];
        let config = AnalysisConfig {
            moran: MoranConfig { permutations: 99, significance: 0.05, seed: Some(5) },
            ..AnalysisConfig::default()
        };
        Orchestrator::new(config).run(catalog)
    }

    #[test]
    fn records_cover_successes_and_failures() {
        let report = report();
        let records = report.records();
        assert_eq!(records.len(), 3);

        let failed = records.iter().find(|r| r.id == "flat").unwrap();
        match &failed.outcome {
            OutcomeRecord::Failed { kind, .. } => assert_eq!(*kind, "degenerate_input"),
            other => panic!("expected failure record, got {other:?}"),
        }

        let moran = records.iter().find(|r| r.id == "moran").unwrap();
        assert!(matches!(&moran.outcome, OutcomeRecord::Moran { .. }));
    }

    #[test]
    fn json_round_trips_through_serde() {
        let json = report().to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let entries = parsed.as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().any(|e| e["status"] == "failed"));
        assert!(entries.iter().any(|e| e["status"] == "gwr"));
    }

    #[test]
    fn gwr_frame_has_one_row_per_unit_and_coefficient_columns() {
        let report = report();
        let frames = report.gwr_frames().unwrap();
        assert_eq!(frames.len(), 1);
        let (id, frame) = &frames[0];
        assert_eq!(id.as_ref(), "fit");
        assert_eq!(frame.height(), 16);

        let names: Vec<String> =
            frame.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["unit_id", "intercept", "coef_x", "local_r2"]);
    }

    #[test]
    fn gwr_frame_rejects_misaligned_ids() {
        let report = report();
        for outcome in report.successes() {
            if let Ok(AnalysisOutput::Gwr { model, .. }) = &outcome.result {
                let short: Vec<Arc<str>> = vec![Arc::from("only-one")];
                assert!(matches!(
                    gwr_frame(model, &short),
                    Err(SpatialError::DimensionMismatch { .. })
                ));
            }
        }
    }
}
