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
use crate::linalg::{DMatrix, DVector, Matrix3, Matrix6, Vector6};
use crate::od::{InvalidNoiseSnafu, ODError};
use snafu::prelude::*;

/// Smallest eigenvalue of the unit diagonal information matrix deemed of full rank
const MIN_SCALED_EIGENVALUE: f64 = 1e-12;

/// Accumulated information matrix and right hand side of the normal equations.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NormalEquations {
    pub information: Matrix6<f64>,
    pub rhs: Vector6<f64>,
}

impl Default for NormalEquations {
    fn default() -> Self {
        Self {
            information: Matrix6::zeros(),
            rhs: Vector6::zeros(),
        }
    }
}

impl NormalEquations {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Adds `Hᵀ W H` and `Hᵀ W y`.
    pub fn add(&mut self, h: &DMatrix<f64>, residual: &DVector<f64>, weight: &DMatrix<f64>) {
        let htw = h.transpose() * weight;
        let info = &htw * h;
        let rhs = &htw * residual;
        for i in 0..6 {
            self.rhs[i] += rhs[i];
            for j in 0..6 {
                self.information[(i, j)] += info[(i, j)];
            }
        }
    }

    /// Inverse of the information matrix, None if it is not invertible with this algorithm.
    pub fn covariance(&self, algorithm: InversionAlgorithm) -> Option<Matrix6<f64>> {
        if !is_well_conditioned(&self.information) {
            return None;
        }
        match algorithm {
            InversionAlgorithm::Cholesky => self.information.cholesky().map(|chol| chol.inverse()),
            InversionAlgorithm::Schur => schur_inverse(&self.information),
        }
    }

    /// State correction and its covariance.
    pub fn solve(&self, algorithm: InversionAlgorithm) -> Option<(Vector6<f64>, Matrix6<f64>)> {
        let covariance = self.covariance(algorithm)?;
        let dx = covariance * self.rhs;
        dx.iter()
            .all(|x| x.is_finite())
            .then_some((dx, covariance))
    }
}

/// Rank deficient information matrices may pass a Cholesky factorization through round off,
/// so the rank is checked on the matrix scaled to a unit diagonal.
pub fn is_well_conditioned(information: &Matrix6<f64>) -> bool {
    let diag = information.diagonal();
    if diag.iter().any(|d| !(*d > 0.0 && d.is_finite())) {
        return false;
    }
    let scale = diag.map(|d| d.sqrt().recip());
    let scaled = Matrix6::from_fn(|i, j| information[(i, j)] * scale[i] * scale[j]);
    scaled.symmetric_eigenvalues().min() > MIN_SCALED_EIGENVALUE
}

/// Inverts a 6x6 matrix through the Schur complement of its upper left 3x3 block.
pub fn schur_inverse(m: &Matrix6<f64>) -> Option<Matrix6<f64>> {
    let a: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
    let b: Matrix3<f64> = m.fixed_view::<3, 3>(0, 3).into_owned();
    let c: Matrix3<f64> = m.fixed_view::<3, 3>(3, 0).into_owned();
    let d: Matrix3<f64> = m.fixed_view::<3, 3>(3, 3).into_owned();

    let a_inv = a.try_inverse()?;
    let s_inv = (d - c * a_inv * b).try_inverse()?;

    let top_right = -a_inv * b * s_inv;
    let bottom_left = -s_inv * c * a_inv;
    let top_left = a_inv - top_right * c * a_inv;

    let mut inv = Matrix6::zeros();
    inv.fixed_view_mut::<3, 3>(0, 0).copy_from(&top_left);
    inv.fixed_view_mut::<3, 3>(0, 3).copy_from(&top_right);
    inv.fixed_view_mut::<3, 3>(3, 0).copy_from(&bottom_left);
    inv.fixed_view_mut::<3, 3>(3, 3).copy_from(&s_inv);
    Some(inv)
}

/// Inverse noise covariance of every admitted observation.
///
/// Rebuilt whenever the number of observations or the a priori flag changes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightMatrix {
    weights: Vec<DMatrix<f64>>,
    apriori: Option<Matrix6<f64>>,
    use_apriori: bool,
}

impl WeightMatrix {
    pub fn build(
        covariances: &[DMatrix<f64>],
        apriori: Option<Matrix6<f64>>,
    ) -> Result<Self, ODError> {
        let weights = covariances
            .iter()
            .map(|cov| {
                let sigma = cov.diagonal().min().max(0.0).sqrt();
                ensure!(sigma > 0.0, InvalidNoiseSnafu { sigma });
                cov.clone()
                    .try_inverse()
                    .context(InvalidNoiseSnafu { sigma })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!("weight matrix built for {} observations", weights.len());

        Ok(Self {
            weights,
            use_apriori: apriori.is_some(),
            apriori,
        })
    }

    pub fn is_stale(&self, num_obs: usize, use_apriori: bool) -> bool {
        self.weights.len() != num_obs || self.use_apriori != use_apriori
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weight(&self, index: usize) -> Option<&DMatrix<f64>> {
        self.weights.get(index)
    }

    pub fn apriori(&self) -> Option<&Matrix6<f64>> {
        self.apriori.as_ref()
    }
}

#[cfg(test)]
mod ut_normal {
    use super::*;
    use approx::assert_relative_eq;

    fn spd() -> Matrix6<f64> {
        let a = Matrix6::from_fn(|i, j| {
            ((i * 7 + j * 3) % 5) as f64 + if i == j { 1.0 } else { 0.0 }
        });
        a.transpose() * a + Matrix6::identity()
    }

    #[test]
    fn schur_matches_cholesky() {
        let eqs = NormalEquations {
            information: spd(),
            rhs: Vector6::new(1.0, -2.0, 3.0, 0.5, 0.0, -1.0),
        };
        let (dx_chol, cov_chol) = eqs.solve(InversionAlgorithm::Cholesky).unwrap();
        let (dx_schur, cov_schur) = eqs.solve(InversionAlgorithm::Schur).unwrap();
        assert_relative_eq!(cov_chol, cov_schur, epsilon = 1e-9);
        assert_relative_eq!(dx_chol, dx_schur, epsilon = 1e-9);
        assert_relative_eq!(spd() * cov_chol, Matrix6::identity(), epsilon = 1e-9);
    }

    #[test]
    fn singular() {
        let mut eqs = NormalEquations::default();
        let h = DMatrix::from_row_slice(1, 6, &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        eqs.add(&h, &DVector::from_element(1, 2.0), &DMatrix::identity(1, 1));
        assert_eq!(eqs.information[(0, 0)], 1.0);
        assert_eq!(eqs.rhs[0], 2.0);
        assert!(eqs.solve(InversionAlgorithm::Cholesky).is_none());
        assert!(eqs.solve(InversionAlgorithm::Schur).is_none());
    }

    #[test]
    fn weights() {
        let covs = vec![
            DMatrix::from_element(1, 1, 4.0),
            DMatrix::from_diagonal_element(2, 2, 0.25),
        ];
        let w = WeightMatrix::build(&covs, None).unwrap();
        assert_eq!(w.len(), 2);
        assert_relative_eq!(w.weight(0).unwrap()[(0, 0)], 0.25);
        assert_relative_eq!(w.weight(1).unwrap()[(1, 1)], 4.0);
        assert!(!w.is_stale(2, false));
        assert!(w.is_stale(3, false));
        assert!(w.is_stale(2, true));

        let bad = vec![DMatrix::from_element(1, 1, 0.0)];
        assert!(matches!(
            WeightMatrix::build(&bad, None),
            Err(ODError::InvalidNoise { .. })
        ));
    }
}
