#![doc = "Votescape: spatial statistics for electoral geography"]
//!
//! The core pipeline: validate geographic units, build a queen-contiguity
//! [`WeightMatrix`], measure spatial structure with [`global_moran`] /
//! [`bivariate_moran`], explain it with [`fit_gwr`], and drive batches of
//! such analyses through the [`Orchestrator`].

mod analysis;
mod cancel;
mod config;
mod error;
mod gwr;
mod stats;
mod units;
mod weights;

#[doc(inline)]
pub use analysis::{
    Aggregated, Aggregation, AnalysisOutput, AnalysisRequest, BatchReport, Operation,
    Orchestrator, OutcomeRecord, RegionKeys, RequestOutcome, RequestRecord, aggregate_regions,
    gwr_frame,
};

#[doc(inline)]
pub use cancel::CancelToken;

#[doc(inline)]
pub use config::{AnalysisConfig, BandwidthSearch, GwrConfig, Kernel, MoranConfig};

#[doc(inline)]
pub use error::{Result, SpatialError};

#[doc(inline)]
pub use gwr::{GwrModel, GwrSummary, fit_gwr};

#[doc(inline)]
pub use stats::{BivariateMoranResult, MoranResult, bivariate_moran, global_moran};

#[doc(inline)]
pub use units::{AttributeVector, DenseColumn, GeoUnit, MIN_SAMPLE, ValidSample, validate};

#[doc(inline)]
pub use weights::{ROW_SUM_TOL, WeightMatrix, queen_weights};
