// Orchestrator end-to-end: a catalog of mixed requests over a synthetic
// electorate, with failures isolated per request.

use std::sync::Arc;

use geo::{MultiPolygon, polygon};
use votescape::{
    Aggregation, AnalysisConfig, AnalysisOutput, AnalysisRequest, AttributeVector, GeoUnit,
    MoranConfig, Operation, Orchestrator, RegionKeys, SpatialError,
};

fn square(x: f64, y: f64) -> MultiPolygon<f64> {
    MultiPolygon(vec![polygon![
        (x: x, y: y),
        (x: x + 1.0, y: y),
        (x: x + 1.0, y: y + 1.0),
        (x: x, y: y + 1.0),
        (x: x, y: y),
    ]])
}

fn grid(cols: usize, rows: usize) -> Vec<GeoUnit> {
    let mut units = Vec::with_capacity(cols * rows);
    for r in 0..rows {
        for c in 0..cols {
            units.push(GeoUnit::new(format!("m{r}{c}"), square(c as f64, r as f64)));
        }
    }
    units
}

fn config() -> AnalysisConfig {
    AnalysisConfig {
        moran: MoranConfig { permutations: 199, significance: 0.05, seed: Some(2022) },
        ..AnalysisConfig::default()
    }
}

/// A 6x6 electorate where the candidate's vote share rises eastward and
/// income follows the same gradient.
fn catalog() -> Vec<AnalysisRequest> {
    let units = grid(6, 6);
    let n = units.len();
    let vote_share: Vec<f64> =
        (0..n).map(|i| 10.0 + 12.0 * (i % 6) as f64 + ((i * 13) % 5) as f64).collect();
    let income: Vec<f64> =
        (0..n).map(|i| 1.0 + 0.4 * (i % 6) as f64 + ((i * 7) % 3) as f64 * 0.1).collect();
    let age: Vec<f64> = (0..n).map(|i| 30.0 + ((i * 11) % 13) as f64).collect();

    let columns = vec![
        AttributeVector::dense("vote_share", vote_share),
        AttributeVector::dense("income", income),
        AttributeVector::dense("median_age", age),
    ];

    vec![
        AnalysisRequest::new(
            "moran:vote_share",
            units.clone(),
            columns.clone(),
            Operation::GlobalMoran { attribute: "vote_share".into() },
        )
        .unwrap(),
        AnalysisRequest::new(
            "bv:vote_share~income",
            units.clone(),
            columns.clone(),
            Operation::BivariateMoran { x: "vote_share".into(), y: "income".into() },
        )
        .unwrap(),
        AnalysisRequest::new(
            "gwr:vote_share",
            units.clone(),
            columns.clone(),
            Operation::Gwr {
                dependent: "vote_share".into(),
                covariates: vec!["income".into(), "median_age".into()],
            },
        )
        .unwrap(),
        AnalysisRequest::new(
            "moran:degenerate",
            units,
            vec![AttributeVector::dense("flat", vec![1.0; n])],
            Operation::GlobalMoran { attribute: "flat".into() },
        )
        .unwrap(),
    ]
}

#[test]
fn batch_isolates_failures_and_reports_everything() {
    let _ = env_logger::builder().is_test(true).try_init();
    let report = Orchestrator::new(config()).run(catalog());

    assert_eq!(report.len(), 4);
    assert_eq!(report.successes().count(), 3);
    assert_eq!(report.failures().count(), 1);

    match &report.get("moran:vote_share").unwrap().result {
        Ok(AnalysisOutput::Moran(result)) => {
            assert!(result.i > 0.5);
            assert!(result.is_significant(report.significance));
        }
        other => panic!("unexpected {other:?}"),
    }

    match &report.get("bv:vote_share~income").unwrap().result {
        Ok(AnalysisOutput::BivariateMoran(result)) => {
            // Vote share and income share the same east-west gradient.
            assert!(result.i > 0.3, "I = {}", result.i);
            assert!(result.pearson > 0.8, "r = {}", result.pearson);
        }
        other => panic!("unexpected {other:?}"),
    }

    assert!(matches!(
        report.get("moran:degenerate").unwrap().result,
        Err(SpatialError::DegenerateInput(_))
    ));
}

#[test]
fn report_serializes_and_exports_gwr_tables() {
    let report = Orchestrator::new(config()).run(catalog());

    let json = report.to_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let entries = parsed.as_array().unwrap();
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().any(|e| e["id"] == "moran:degenerate" && e["status"] == "failed"));

    let frames = report.gwr_frames().unwrap();
    assert_eq!(frames.len(), 1);
    let (id, frame) = &frames[0];
    assert_eq!(id.as_ref(), "gwr:vote_share");
    assert_eq!(frame.height(), 36);
    let names: Vec<String> = frame.get_column_names().iter().map(|s| s.to_string()).collect();
    assert_eq!(
        names,
        vec!["unit_id", "intercept", "coef_income", "coef_median_age", "local_r2"]
    );
}

#[test]
fn aggregation_level_runs_the_same_operation_coarser() {
    // Municipalities dissolve into 3x2 macro-regions; vote percentage is
    // aggregated as a ratio of sums via the total-votes weight column.
    let units = grid(6, 6);
    let n = units.len();
    let keys: Vec<Option<Arc<str>>> = (0..n)
        .map(|i| {
            let (c, r) = (i % 6, i / 6);
            Some(Arc::from(format!("reg{}{}", c / 2, r / 3)))
        })
        .collect();
    let pct: Vec<f64> = (0..n).map(|i| 5.0 * (i % 6) as f64).collect();
    let totals: Vec<f64> = (0..n).map(|i| 100.0 + ((i * 17) % 50) as f64).collect();

    let request = AnalysisRequest::with_aggregation(
        "agg:moran",
        units,
        vec![
            AttributeVector::dense("pct", pct),
            AttributeVector::dense("totals", totals),
        ],
        Operation::GlobalMoran { attribute: "pct".into() },
        Some(Aggregation {
            keys: RegionKeys::new("macro", keys),
            weight: Some("totals".into()),
        }),
    )
    .unwrap();

    let report = Orchestrator::new(config()).run(vec![request]);
    let outcome = report.get("agg:moran").unwrap();
    match &outcome.result {
        Ok(AnalysisOutput::Moran(result)) => {
            assert!(result.i.is_finite());
            assert!(result.p_value >= 1.0 / 200.0 && result.p_value <= 1.0);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn cancelled_batch_reports_cancelled_not_partial_results() {
    let orchestrator = Orchestrator::new(config());
    orchestrator.cancel_token().cancel();
    let report = orchestrator.run(catalog());

    assert_eq!(report.len(), 4);
    for outcome in &report.outcomes {
        assert!(
            matches!(outcome.result, Err(SpatialError::Cancelled)),
            "request '{}' should be cancelled",
            outcome.id
        );
    }
}
