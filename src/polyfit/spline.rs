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

use super::{InsufficientSamplesSnafu, InterpolationError, LengthMismatchSnafu, NotIncreasingSnafu};
use crate::linalg::{DMatrix, SVector};
use snafu::ensure;

/// Cubic spline through N-dimensional samples with not-a-knot end conditions.
///
/// The third derivative is continuous at the second and penultimate abscissas, so any
/// cubic polynomial is reproduced exactly when at least four samples are provided.
#[derive(Clone, Debug)]
pub struct CubicSpline<const N: usize> {
    xs: Vec<f64>,
    ys: Vec<SVector<f64, N>>,
    /// Second derivatives at each abscissa
    m: Vec<SVector<f64, N>>,
}

impl<const N: usize> CubicSpline<N> {
    pub const MIN_SAMPLES: usize = 4;

    pub fn new(xs: &[f64], ys: &[SVector<f64, N>]) -> Result<Self, InterpolationError> {
        let n = xs.len();
        ensure!(
            n == ys.len(),
            LengthMismatchSnafu {
                xs: n,
                ys: ys.len()
            }
        );
        ensure!(
            n >= Self::MIN_SAMPLES,
            InsufficientSamplesSnafu {
                need: Self::MIN_SAMPLES,
                got: n
            }
        );
        for (i, pair) in xs.windows(2).enumerate() {
            ensure!(
                pair[1] > pair[0],
                NotIncreasingSnafu {
                    index: i + 1,
                    value: pair[1]
                }
            );
        }

        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();

        let mut a = DMatrix::<f64>::zeros(n, n);
        let mut rhs = DMatrix::<f64>::zeros(n, N);

        // Not-a-knot at x[1]
        a[(0, 0)] = h[1];
        a[(0, 1)] = -(h[0] + h[1]);
        a[(0, 2)] = h[0];

        for i in 1..n - 1 {
            a[(i, i - 1)] = h[i - 1];
            a[(i, i)] = 2.0 * (h[i - 1] + h[i]);
            a[(i, i + 1)] = h[i];
            let slope = (ys[i + 1] - ys[i]) / h[i] - (ys[i] - ys[i - 1]) / h[i - 1];
            for k in 0..N {
                rhs[(i, k)] = 6.0 * slope[k];
            }
        }

        // Not-a-knot at x[n-2]
        a[(n - 1, n - 3)] = h[n - 2];
        a[(n - 1, n - 2)] = -(h[n - 3] + h[n - 2]);
        a[(n - 1, n - 1)] = h[n - 3];

        let sol = a.lu().solve(&rhs).ok_or(InterpolationError::SingularSystem)?;

        let m = (0..n)
            .map(|i| SVector::<f64, N>::from_fn(|k, _| sol[(i, k)]))
            .collect();

        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            m,
        })
    }

    /// Abscissa span covered by this spline.
    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    fn segment(&self, x: f64) -> usize {
        // Extrapolation uses the outermost segments
        let last = self.xs.len() - 2;
        self.xs[1..=last]
            .iter()
            .position(|xi| x < *xi)
            .unwrap_or(last)
    }

    /// Evaluates the spline at the provided abscissa.
    pub fn eval(&self, x: f64) -> SVector<f64, N> {
        let i = self.segment(x);
        let h = self.xs[i + 1] - self.xs[i];
        let to_next = self.xs[i + 1] - x;
        let from_prev = x - self.xs[i];

        self.m[i] * (to_next.powi(3) / (6.0 * h))
            + self.m[i + 1] * (from_prev.powi(3) / (6.0 * h))
            + (self.ys[i] / h - self.m[i] * (h / 6.0)) * to_next
            + (self.ys[i + 1] / h - self.m[i + 1] * (h / 6.0)) * from_prev
    }

    /// Evaluates the first derivative of the spline at the provided abscissa.
    pub fn eval_deriv(&self, x: f64) -> SVector<f64, N> {
        let i = self.segment(x);
        let h = self.xs[i + 1] - self.xs[i];
        let to_next = self.xs[i + 1] - x;
        let from_prev = x - self.xs[i];

        -self.m[i] * (to_next.powi(2) / (2.0 * h))
            + self.m[i + 1] * (from_prev.powi(2) / (2.0 * h))
            + (self.ys[i + 1] - self.ys[i]) / h
            - (self.m[i + 1] - self.m[i]) * (h / 6.0)
    }
}
