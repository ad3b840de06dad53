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

use super::config::InversionAlgorithm;
use super::normal::{is_well_conditioned, NormalEquations};
use crate::linalg::{DMatrix, DVector, Matrix6, Vector6};

/// Solution of one estimation step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StateCorrection {
    pub dx: Vector6<f64>,
    pub covariance: Matrix6<f64>,
}

/// Accumulates the observations of one iteration and solves for the state correction.
pub trait EstimationStrategy {
    fn name(&self) -> &'static str;

    /// Clears the accumulated information, called at the start of each iteration.
    fn reset(&mut self);

    /// Adds the partials `h` (one row per measurement value, six columns), the residuals and
    /// the weight (inverse noise covariance) of one observation.
    fn accumulate(&mut self, h: &DMatrix<f64>, residual: &DVector<f64>, weight: &DMatrix<f64>);

    /// Constrains the solution with the a priori information and the deviation of the a priori
    /// state from the current estimate.
    fn accumulate_apriori(&mut self, information: &Matrix6<f64>, deviation: &Vector6<f64>) {
        self.accumulate(
            &DMatrix::identity(6, 6),
            &DVector::from_column_slice(deviation.as_slice()),
            &DMatrix::from_column_slice(6, 6, information.as_slice()),
        );
    }

    /// None when the accumulated system cannot be inverted.
    fn solve(&self) -> Option<StateCorrection>;
}

/// Normal equations solved by inverting the information matrix.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct WeightedLeastSquares {
    pub inversion: InversionAlgorithm,
    normal: NormalEquations,
}

impl WeightedLeastSquares {
    pub fn new(inversion: InversionAlgorithm) -> Self {
        Self {
            inversion,
            normal: NormalEquations::default(),
        }
    }

    pub fn normal_equations(&self) -> &NormalEquations {
        &self.normal
    }
}

impl EstimationStrategy for WeightedLeastSquares {
    fn name(&self) -> &'static str {
        "weighted least squares"
    }

    fn reset(&mut self) {
        self.normal.reset();
    }

    fn accumulate(&mut self, h: &DMatrix<f64>, residual: &DVector<f64>, weight: &DMatrix<f64>) {
        self.normal.add(h, residual, weight);
    }

    fn solve(&self) -> Option<StateCorrection> {
        self.normal
            .solve(self.inversion)
            .map(|(dx, covariance)| StateCorrection { dx, covariance })
    }
}

/// Square root information accumulation with Householder triangularization.
///
/// Keeps the upper triangular `R` and `z` such that `Rᵀ R` is the information matrix and
/// `R dx = z` the normal equations, which avoids squaring the condition number.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SquareRootInformation {
    r: Matrix6<f64>,
    z: Vector6<f64>,
}

impl Default for SquareRootInformation {
    fn default() -> Self {
        Self {
            r: Matrix6::zeros(),
            z: Vector6::zeros(),
        }
    }
}

impl SquareRootInformation {
    pub fn information(&self) -> Matrix6<f64> {
        self.r.transpose() * self.r
    }
}

impl EstimationStrategy for SquareRootInformation {
    fn name(&self) -> &'static str {
        "square root information"
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn accumulate(&mut self, h: &DMatrix<f64>, residual: &DVector<f64>, weight: &DMatrix<f64>) {
        // Whitening with W = L Lᵀ
        let whitening = match weight.clone().cholesky() {
            Some(chol) => chol.l().transpose(),
            None => {
                warn!("weight is not positive definite, only its diagonal is used");
                DMatrix::from_diagonal(&weight.diagonal().map(|w| w.max(0.0).sqrt()))
            }
        };
        let hw = &whitening * h;
        let yw = &whitening * residual;

        let m = hw.nrows();
        let mut stacked = DMatrix::zeros(6 + m, 7);
        for i in 0..6 {
            for j in 0..6 {
                stacked[(i, j)] = self.r[(i, j)];
            }
            stacked[(i, 6)] = self.z[i];
        }
        for i in 0..m {
            for j in 0..6 {
                stacked[(6 + i, j)] = hw[(i, j)];
            }
            stacked[(6 + i, 6)] = yw[i];
        }

        let triangular = stacked.qr().r();
        for i in 0..6 {
            for j in 0..6 {
                self.r[(i, j)] = if j >= i { triangular[(i, j)] } else { 0.0 };
            }
            self.z[i] = triangular[(i, 6)];
        }
    }

    fn solve(&self) -> Option<StateCorrection> {
        if !is_well_conditioned(&self.information()) {
            return None;
        }
        let r_inv = self.r.try_inverse()?;
        let dx = r_inv * self.z;
        Some(StateCorrection {
            dx,
            covariance: r_inv * r_inv.transpose(),
        })
    }
}
