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

use super::strategy::{EstimationStrategy, SquareRootInformation, WeightedLeastSquares};
use crate::io::{ConfigError, ConfigRepr};
use crate::linalg::Matrix6;
use serde_derive::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Inversion of the accumulated information matrix.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InversionAlgorithm {
    /// Symmetric positive definite factorization
    #[default]
    Cholesky,
    /// Block inversion through the Schur complement of the position block
    Schur,
}

/// Estimation strategy used when none is provided to the estimator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Solver {
    WeightedLeastSquares(InversionAlgorithm),
    SquareRootInformation,
}

impl Default for Solver {
    fn default() -> Self {
        Self::WeightedLeastSquares(InversionAlgorithm::Cholesky)
    }
}

impl Solver {
    pub fn strategy(self) -> Box<dyn EstimationStrategy> {
        match self {
            Self::WeightedLeastSquares(inversion) => Box::new(WeightedLeastSquares::new(inversion)),
            Self::SquareRootInformation => Box::new(SquareRootInformation::default()),
        }
    }
}

/// Outer loop sigma editing.
///
/// On the first iteration, an observation is edited when its normalized residual exceeds
/// `initial_multiplier`. Afterwards the threshold is `multiplicative * previous RMS + additive`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct SigmaEditing {
    #[builder(default = 3000.0)]
    pub initial_multiplier: f64,
    #[builder(default = 3.0)]
    pub multiplicative: f64,
    #[builder(default = 0.0)]
    pub additive: f64,
}

impl Default for SigmaEditing {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SigmaEditing {
    /// Largest normalized residual kept at this iteration.
    pub fn threshold(&self, iteration: usize, previous_rms: Option<f64>) -> f64 {
        match previous_rms {
            Some(rms) if iteration > 0 => self.multiplicative * rms + self.additive,
            _ => self.initial_multiplier,
        }
    }
}

/// Configuration of the batch estimator.
///
/// The convergence thresholds have no default and must be provided.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
pub struct BatchEstimatorConfig {
    /// Name of the estimated spacecraft in the registry
    #[builder(setter(into))]
    pub estimated: String,
    /// Converged when the RMS of the weighted residuals is at most this value
    pub absolute_tolerance: f64,
    /// Converged when the RMS changed by at most this fraction since the previous iteration
    pub relative_tolerance: f64,
    pub max_iterations: usize,
    /// Number of consecutive RMS increases tolerated before failing
    pub max_consecutive_divergences: usize,
    #[builder(default)]
    #[serde(default)]
    pub solver: Solver,
    /// Constrain the solution with the a priori state and sigmas
    #[builder(default)]
    #[serde(default)]
    pub use_apriori: bool,
    /// A priori one sigma of each state component, in km and km/s
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub apriori_sigmas: Option<[f64; 6]>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub sigma_editing: Option<SigmaEditing>,
}

impl ConfigRepr for BatchEstimatorConfig {}

impl BatchEstimatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::InvalidConfig { msg });

        if self.estimated.is_empty() {
            return invalid("the estimated spacecraft must be named".to_string());
        }
        for (name, tol) in [
            ("absolute", self.absolute_tolerance),
            ("relative", self.relative_tolerance),
        ] {
            if !(tol.is_finite() && tol >= 0.0) {
                return invalid(format!(
                    "{name} tolerance must be finite and non negative, got {tol}"
                ));
            }
        }
        if self.max_iterations == 0 {
            return invalid("at least one iteration is required".to_string());
        }
        if self.use_apriori {
            match self.apriori_sigmas {
                None => {
                    return invalid("a priori sigmas are required with use_apriori".to_string())
                }
                Some(sigmas) if sigmas.iter().any(|s| !(s.is_finite() && *s > 0.0)) => {
                    return invalid(format!(
                        "a priori sigmas must be strictly positive, got {sigmas:?}"
                    ))
                }
                _ => {}
            }
        }
        if let Some(editing) = self.sigma_editing {
            if editing.initial_multiplier <= 0.0
                || editing.multiplicative <= 0.0
                || editing.additive < 0.0
            {
                return invalid(format!("invalid sigma editing {editing:?}"));
            }
        }
        Ok(())
    }

    /// Information matrix of the a priori state, if it is used.
    pub fn apriori_information(&self) -> Option<Matrix6<f64>> {
        if !self.use_apriori {
            return None;
        }
        self.apriori_sigmas.map(|sigmas| {
            let mut info = Matrix6::zeros();
            for (i, sigma) in sigmas.iter().enumerate() {
                info[(i, i)] = sigma.powi(-2);
            }
            info
        })
    }
}
