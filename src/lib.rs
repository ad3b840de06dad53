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

/*! # nyx-od

Batch orbit determination core: tracking observations are filtered, modeled through signal paths
between ground stations and spacecraft (with light time, hardware delays and corrections), and
processed by an iterative weighted least squares estimator. Participant ephemerides may come
from a black box propagator or from Code-500 binary ephemeris files.
*/

/// Propagator interface, a kinematic propagator, and the Code-500 ephemeris propagator.
pub mod propagators;

/// Utility functions shared by different modules: time system conversions and rotations.
pub mod utils;

/// All the input/output needs for this library: configuration and tracking data files, path
/// resolution and reporting.
pub mod io;

/// Orbit determination: tracking data, filters, signal modeling and the batch estimator.
pub mod od;

/// Polynomial and spline fitting module
pub mod polyfit;

#[macro_use]
extern crate log;
extern crate hifitime;
extern crate nalgebra as na;

/// Re-export of hifitime
pub mod time {
    pub use hifitime::*;
}

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}
