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

use std::ops::{Mul, MulAssign};

use crate::od::{InvalidNoiseSnafu, ODError};
use crate::time::Epoch;
use rand::Rng;
use rand_distr::Normal;
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;

use super::Stochastics;

/// White noise is an uncorrelated random variable.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WhiteNoise {
    /// Mean value of this white noise
    pub mean: f64,
    /// One sigma of the Normal distribution, in the unit of the measurement.
    pub sigma: f64,
}

impl WhiteNoise {
    /// Zero mean white noise.
    pub fn new(sigma: f64) -> Result<Self, ODError> {
        ensure!(sigma.is_finite() && sigma >= 0.0, InvalidNoiseSnafu { sigma });
        Ok(Self { mean: 0.0, sigma })
    }

    pub fn with_mean(mut self, mean: f64) -> Self {
        self.mean = mean;
        self
    }
}

impl Stochastics for WhiteNoise {
    fn covariance(&self, _epoch: Epoch) -> f64 {
        self.sigma.powi(2)
    }

    fn sample<R: Rng>(&mut self, _epoch: Epoch, rng: &mut R) -> f64 {
        match Normal::new(self.mean, self.sigma) {
            Ok(normal) => rng.sample(normal),
            Err(e) => {
                warn!("cannot sample white noise {self:?}: {e}");
                self.mean
            }
        }
    }
}

impl Mul<f64> for WhiteNoise {
    type Output = Self;

    /// Scale the white noise sigmas by a constant.
    fn mul(mut self, rhs: f64) -> Self::Output {
        self.sigma *= rhs;
        self
    }
}

impl MulAssign<f64> for WhiteNoise {
    fn mul_assign(&mut self, rhs: f64) {
        *self = *self * rhs;
    }
}
