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

use crate::linalg::{Matrix3, Matrix6, Vector6};
use crate::time::Epoch;
use snafu::prelude::*;

/// Code 500 binary ephemerides and their interpolation.
pub mod code500;

pub use code500::{Code500Propagator, EphemerisError, EphemerisInterpolationCache};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PropagationError {
    #[snafu(display("propagation from {from} to {to} failed: {msg}"))]
    PropFailure {
        from: Epoch,
        to: Epoch,
        msg: String,
    },
}

/// Black box dynamics: maps a Cartesian state (km, km/s) from one epoch to another.
pub trait Propagator {
    /// Returns the state at `to` and the state transition matrix from `from` to `to`.
    fn propagate(
        &mut self,
        rv: &Vector6<f64>,
        from: Epoch,
        to: Epoch,
    ) -> Result<(Vector6<f64>, Matrix6<f64>), PropagationError>;
}

/// Force free motion, mostly useful to validate estimators.
#[derive(Copy, Clone, Debug, Default)]
pub struct StraightLine;

impl StraightLine {
    pub fn stm(dt_s: f64) -> Matrix6<f64> {
        let mut stm = Matrix6::identity();
        stm.fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(Matrix3::identity() * dt_s));
        stm
    }
}

impl Propagator for StraightLine {
    fn propagate(
        &mut self,
        rv: &Vector6<f64>,
        from: Epoch,
        to: Epoch,
    ) -> Result<(Vector6<f64>, Matrix6<f64>), PropagationError> {
        ensure!(
            rv.iter().all(|x| x.is_finite()),
            PropFailureSnafu {
                from,
                to,
                msg: format!("non finite initial state {rv}"),
            }
        );
        let stm = Self::stm((to - from).to_seconds());
        Ok((stm * rv, stm))
    }
}

impl<P: Propagator + ?Sized> Propagator for &mut P {
    fn propagate(
        &mut self,
        rv: &Vector6<f64>,
        from: Epoch,
        to: Epoch,
    ) -> Result<(Vector6<f64>, Matrix6<f64>), PropagationError> {
        (**self).propagate(rv, from, to)
    }
}
