use log::debug;

use crate::cancel::CancelToken;
use crate::error::{Result, SpatialError};

const INVPHI: f64 = 0.618_033_988_749_894_9;

/// Outcome of a bandwidth calibration run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SearchOutcome {
    pub bandwidth: f64,
    pub criterion: f64,
    pub evaluations: usize,
}

/// Golden-section minimization of a fit criterion over a bandwidth bracket.
///
/// A candidate whose criterion cannot be computed (singular local system,
/// exhausted degrees of freedom) scores +∞ and is skipped rather than
/// aborting the search; `Cancelled` propagates immediately. Fails with
/// `BandwidthSelectionFailed` when no candidate produced a finite score.
pub(crate) fn golden_section<F>(
    min: f64,
    max: f64,
    tolerance: f64,
    max_iter: usize,
    cancel: &CancelToken,
    mut criterion: F,
) -> Result<SearchOutcome>
where
    F: FnMut(f64) -> Result<f64>,
{
    cancel.bail_if_cancelled()?;

    let mut evaluations = 0usize;
    let mut best_bw = f64::NAN;
    let mut best_score = f64::INFINITY;

    let mut eval = |bw: f64, evaluations: &mut usize| -> Result<f64> {
        *evaluations += 1;
        match criterion(bw) {
            Ok(score) => Ok(score),
            Err(SpatialError::Cancelled) => Err(SpatialError::Cancelled),
            Err(err) => {
                debug!("bandwidth candidate {bw:.6} skipped: {err}");
                Ok(f64::INFINITY)
            }
        }
    };

    let mut a = min;
    let mut b = max;
    let width0 = b - a;

    for (bw, score) in [(a, eval(a, &mut evaluations)?), (b, eval(b, &mut evaluations)?)] {
        if score < best_score {
            best_score = score;
            best_bw = bw;
        }
    }

    if width0 > 0.0 {
        let mut c = b - INVPHI * (b - a);
        let mut d = a + INVPHI * (b - a);
        let mut fc = eval(c, &mut evaluations)?;
        let mut fd = eval(d, &mut evaluations)?;

        for _ in 0..max_iter {
            if (b - a) <= tolerance * width0 {
                break;
            }
            cancel.bail_if_cancelled()?;

            if fc < fd {
                b = d;
                d = c;
                fd = fc;
                c = b - INVPHI * (b - a);
                fc = eval(c, &mut evaluations)?;
                if fc < best_score {
                    best_score = fc;
                    best_bw = c;
                }
            } else {
                a = c;
                c = d;
                fc = fd;
                d = a + INVPHI * (b - a);
                fd = eval(d, &mut evaluations)?;
                if fd < best_score {
                    best_score = fd;
                    best_bw = d;
                }
            }
        }
    }

    if !best_score.is_finite() {
        return Err(SpatialError::BandwidthSelectionFailed);
    }

    debug!("bandwidth search: chose {best_bw:.6} (criterion {best_score:.4}, {evaluations} evaluations)");
    Ok(SearchOutcome { bandwidth: best_bw, criterion: best_score, evaluations })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_the_minimum_of_a_parabola() {
        let cancel = CancelToken::new();
        let out =
            golden_section(0.0, 10.0, 1e-6, 100, &cancel, |bw| Ok((bw - 3.0) * (bw - 3.0)))
                .unwrap();
        assert!((out.bandwidth - 3.0).abs() < 1e-3, "got {}", out.bandwidth);
        assert!(out.criterion < 1e-6);
    }

    #[test]
    fn monotone_decreasing_criterion_picks_the_upper_end() {
        let cancel = CancelToken::new();
        let out = golden_section(1.0, 50.0, 1e-4, 100, &cancel, |bw| Ok(-bw)).unwrap();
        assert_eq!(out.bandwidth, 50.0);
    }

    #[test]
    fn failing_candidates_are_skipped_not_fatal() {
        let cancel = CancelToken::new();
        let out = golden_section(0.0, 10.0, 1e-6, 100, &cancel, |bw| {
            if bw < 2.0 {
                Err(SpatialError::NumericalError("unstable".into()))
            } else {
                Ok((bw - 5.0) * (bw - 5.0))
            }
        })
        .unwrap();
        assert!((out.bandwidth - 5.0).abs() < 1e-3);
    }

    #[test]
    fn all_candidates_failing_reports_selection_failure() {
        let cancel = CancelToken::new();
        let out = golden_section(0.0, 10.0, 1e-6, 100, &cancel, |_| {
            Err::<f64, _>(SpatialError::NumericalError("always singular".into()))
        });
        assert!(matches!(out, Err(SpatialError::BandwidthSelectionFailed)));
    }

    #[test]
    fn cancellation_wins_over_skipping() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let out = golden_section(0.0, 10.0, 1e-6, 100, &cancel, |bw| Ok(bw));
        assert!(matches!(out, Err(SpatialError::Cancelled)));
    }

    #[test]
    fn degenerate_bracket_evaluates_the_single_point() {
        let cancel = CancelToken::new();
        let out = golden_section(4.0, 4.0, 1e-6, 100, &cancel, |bw| Ok(bw * bw)).unwrap();
        assert_eq!(out.bandwidth, 4.0);
        assert_eq!(out.evaluations, 2);
    }
}
