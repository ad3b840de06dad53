/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use super::config::BatchEstimatorConfig;
use crate::od::{DivergedSnafu, ODError};
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EstimationStatus {
    Converging,
    Diverging,
    AbsoluteToleranceConverged,
    RelativeToleranceConverged,
    AbsAndRelToleranceConverged,
    MaxIterationsDiverged,
    MaxConsecutiveDiverged,
}

impl EstimationStatus {
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            Self::AbsoluteToleranceConverged
                | Self::RelativeToleranceConverged
                | Self::AbsAndRelToleranceConverged
        )
    }

    /// Whether the estimator stops iterating.
    pub fn is_final(self) -> bool {
        !matches!(self, Self::Converging | Self::Diverging)
    }
}

impl fmt::Display for EstimationStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Converging => "converging",
            Self::Diverging => "diverging",
            Self::AbsoluteToleranceConverged => "converged (absolute tolerance)",
            Self::RelativeToleranceConverged => "converged (relative tolerance)",
            Self::AbsAndRelToleranceConverged => "converged (absolute and relative tolerances)",
            Self::MaxIterationsDiverged => "maximum iterations reached",
            Self::MaxConsecutiveDiverged => "maximum consecutive divergences reached",
        };
        write!(f, "{repr}")
    }
}

/// RMS of the weighted residuals across iterations. Never reset between iterations.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ResidualHistory {
    pub old_rms: Option<f64>,
    pub new_rms: Option<f64>,
    pub best_rms: Option<f64>,
    /// Consecutive iterations whose RMS increased
    pub num_div_iterations: usize,
}

impl ResidualHistory {
    pub fn record(&mut self, rms: f64) {
        self.old_rms = self.new_rms;
        self.new_rms = Some(rms);
        self.best_rms = Some(self.best_rms.map_or(rms, |best| best.min(rms)));
    }

    /// Counts one more divergence, failing once the configured maximum is exceeded.
    pub fn count_divergence(&mut self, config: &BatchEstimatorConfig) -> Result<(), ODError> {
        self.num_div_iterations += 1;
        ensure!(
            self.num_div_iterations <= config.max_consecutive_divergences,
            DivergedSnafu {
                count: self.num_div_iterations,
                max: config.max_consecutive_divergences
            }
        );
        Ok(())
    }

    /// Checks the latest RMS against the tolerances, for the zero based iteration.
    pub fn test_for_convergence(
        &mut self,
        iteration: usize,
        config: &BatchEstimatorConfig,
    ) -> Result<(EstimationStatus, String), ODError> {
        let Some(new) = self.new_rms else {
            return Ok((EstimationStatus::Converging, "no residual yet".to_string()));
        };

        let abs_converged = new <= config.absolute_tolerance;
        let rel_change = match self.old_rms {
            Some(old) if iteration > 0 && old > 0.0 => Some((old - new).abs() / old),
            Some(old) if iteration > 0 => Some(if new == old { 0.0 } else { f64::INFINITY }),
            _ => None,
        };
        let rel_converged = rel_change.is_some_and(|change| change <= config.relative_tolerance);

        let status = match (abs_converged, rel_converged) {
            (true, true) => EstimationStatus::AbsAndRelToleranceConverged,
            (true, false) => EstimationStatus::AbsoluteToleranceConverged,
            (false, true) => EstimationStatus::RelativeToleranceConverged,
            (false, false) => {
                if iteration + 1 >= config.max_iterations {
                    EstimationStatus::MaxIterationsDiverged
                } else if self.old_rms.is_some_and(|old| new > old) {
                    self.count_divergence(config)?;
                    EstimationStatus::Diverging
                } else {
                    self.num_div_iterations = 0;
                    EstimationStatus::Converging
                }
            }
        };
        if status.is_converged() {
            self.num_div_iterations = 0;
        }

        let reason = match status {
            EstimationStatus::AbsoluteToleranceConverged => format!(
                "RMS {new:.6e} is within the absolute tolerance {:e}",
                config.absolute_tolerance
            ),
            EstimationStatus::RelativeToleranceConverged
            | EstimationStatus::AbsAndRelToleranceConverged => format!(
                "RMS {new:.6e} changed by {:.3e} relative (tolerance {:e})",
                rel_change.unwrap_or_default(),
                config.relative_tolerance
            ),
            EstimationStatus::MaxIterationsDiverged => format!(
                "RMS {new:.6e} did not converge within {} iterations",
                config.max_iterations
            ),
            EstimationStatus::Diverging => format!(
                "RMS increased to {new:.6e}, divergence {} of at most {}",
                self.num_div_iterations, config.max_consecutive_divergences
            ),
            _ => format!("RMS {new:.6e}"),
        };

        Ok((status, reason))
    }
}
