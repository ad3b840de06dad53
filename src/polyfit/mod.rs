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

use snafu::prelude::*;

/// Not-a-knot cubic spline interpolation of vector samples.
pub mod spline;

pub use spline::CubicSpline;

#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InterpolationError {
    #[snafu(display("spline requires at least {need} samples but got {got}"))]
    InsufficientSamples { need: usize, got: usize },
    #[snafu(display("{xs} abscissas provided for {ys} samples"))]
    LengthMismatch { xs: usize, ys: usize },
    #[snafu(display("abscissas must be strictly increasing (x[{index}] = {value})"))]
    NotIncreasing { index: usize, value: f64 },
    #[snafu(display("spline system is singular"))]
    SingularSystem,
}
