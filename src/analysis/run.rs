use std::sync::Arc;

use log::{info, warn};
use rayon::prelude::*;

use crate::analysis::aggregate::aggregate_regions;
use crate::analysis::request::{AnalysisRequest, Operation};
use crate::cancel::CancelToken;
use crate::config::AnalysisConfig;
use crate::error::{Result, SpatialError};
use crate::gwr::{GwrModel, fit_gwr};
use crate::stats::{BivariateMoranResult, MoranResult, bivariate_moran, global_moran};
use crate::units::{AttributeVector, ValidSample, validate};
use crate::weights::WeightMatrix;

/// Successful result of one catalog entry.
#[derive(Debug, Clone)]
pub enum AnalysisOutput {
    Moran(MoranResult),
    BivariateMoran(BivariateMoranResult),
    Gwr { model: GwrModel, unit_ids: Vec<Arc<str>> },
}

/// Per-request record in a batch report: soft failures land here instead of
/// aborting the batch.
#[derive(Debug)]
pub struct RequestOutcome {
    pub id: Arc<str>,
    /// Rows removed by aggregation and validation before the statistic ran.
    pub dropped: usize,
    pub result: Result<AnalysisOutput>,
}

/// All outcomes of one catalog run, keyed by request identifier.
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<RequestOutcome>,
    /// Significance threshold the run was configured with, used when
    /// rendering conclusions.
    pub significance: f64,
}

impl BatchReport {
    #[inline]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = &RequestOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &RequestOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn get(&self, id: &str) -> Option<&RequestOutcome> {
        self.outcomes.iter().find(|o| o.id.as_ref() == id)
    }
}

/// Drives a catalog of analysis requests through validation, weight
/// construction, and the estimators. Requests are independent: each owns its
/// geometry scope and weight structure, so the batch runs in parallel with
/// nothing shared but the read-only configuration.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: AnalysisConfig,
    cancel: CancelToken,
}

impl Orchestrator {
    pub fn new(config: AnalysisConfig) -> Self {
        Self::with_cancel(config, CancelToken::new())
    }

    pub fn with_cancel(config: AnalysisConfig, cancel: CancelToken) -> Self {
        Self { config, cancel }
    }

    /// Handle for requesting an abort from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run every request, isolating failures per request.
    pub fn run(&self, catalog: Vec<AnalysisRequest>) -> BatchReport {
        let outcomes: Vec<RequestOutcome> =
            catalog.into_par_iter().map(|request| self.run_request(request)).collect();
        BatchReport { outcomes, significance: self.config.moran.significance }
    }

    fn run_request(&self, request: AnalysisRequest) -> RequestOutcome {
        let id = request.id.clone();
        info!("request '{id}': {} over {} units", request.operation.label(), request.units.len());

        let mut dropped = 0usize;
        let result = self.execute(&request, &mut dropped);
        match &result {
            Ok(_) => info!("request '{id}': done ({dropped} rows dropped)"),
            Err(err) if err.is_soft() => warn!("request '{id}': skipped: {err}"),
            Err(err) => warn!("request '{id}': failed: {err}"),
        }

        RequestOutcome { id, dropped, result }
    }

    fn execute(&self, request: &AnalysisRequest, dropped: &mut usize) -> Result<AnalysisOutput> {
        self.cancel.bail_if_cancelled()?;

        let sample = self.prepare(request, dropped)?;

        match &request.operation {
            Operation::GlobalMoran { .. } => {
                let weights = WeightMatrix::build(&sample.units)?;
                let result =
                    global_moran(&sample.columns[0], &weights, &self.config.moran, &self.cancel)?;
                Ok(AnalysisOutput::Moran(result))
            }
            Operation::BivariateMoran { .. } => {
                let weights = WeightMatrix::build(&sample.units)?;
                let result = bivariate_moran(
                    &sample.columns[0],
                    &sample.columns[1],
                    &weights,
                    &self.config.moran,
                    &self.cancel,
                )?;
                Ok(AnalysisOutput::BivariateMoran(result))
            }
            Operation::Gwr { .. } => {
                let coords = sample.centroids();
                let model = fit_gwr(
                    &sample.columns[0],
                    &sample.columns[1..],
                    &coords,
                    &self.config.gwr,
                    &self.cancel,
                )?;
                let unit_ids = sample.units.iter().map(|u| u.id.clone()).collect();
                Ok(AnalysisOutput::Gwr { model, unit_ids })
            }
        }
    }

    /// Aggregate (when requested) and validate down to a dense sample.
    fn prepare(&self, request: &AnalysisRequest, dropped: &mut usize) -> Result<ValidSample> {
        let required: Vec<&AttributeVector> = request
            .operation
            .required_columns()
            .into_iter()
            .map(|name| {
                request.column(name).ok_or_else(|| SpatialError::MissingColumn(name.to_string()))
            })
            .collect::<Result<_>>()?;

        let sample = match &request.aggregation {
            Some(agg) => {
                let weight = agg
                    .weight
                    .as_deref()
                    .map(|name| {
                        request
                            .column(name)
                            .ok_or_else(|| SpatialError::MissingColumn(name.to_string()))
                    })
                    .transpose()?;
                let aggregated =
                    aggregate_regions(&request.units, &agg.keys, &required, weight)?;
                *dropped += aggregated.dropped;
                let refs: Vec<&AttributeVector> = aggregated.columns.iter().collect();
                validate(&aggregated.units, &refs)?
            }
            None => validate(&request.units, &required)?,
        };
        *dropped += sample.dropped;
        Ok(sample)
    }
}
