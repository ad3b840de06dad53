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

use crate::io::ConfigError;
use crate::propagators::{EphemerisError, PropagationError};
use crate::time::Epoch;
use snafu::prelude::Snafu;

/// Speed of light in km/s
pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

/// Provides the batch least squares estimator.
pub mod blse;

/// Provides the tracking data filters applied before estimation.
pub mod filter;

/// Provides ground stations fixed on a rotating body.
pub mod ground_station;
pub use ground_station::GroundStation;

/// Provides all of the supported measurement models and tracking data.
pub mod msr;

/// Provides noise modeling
pub mod noise;

/// Resolution of participant states during an estimation pass.
pub mod participants;

/// Object registry of the spacecraft and ground stations.
pub mod registry;

/// Provides the signal paths between tracking participants.
pub mod signal;

/// Provides all of the functionality to simulate tracking data.
pub mod simulator;

#[allow(unused_imports)]
pub mod prelude {
    pub use super::blse::*;
    pub use super::filter::*;
    pub use super::ground_station::*;
    pub use super::msr::*;
    pub use super::noise::WhiteNoise;
    pub use super::participants::*;
    pub use super::registry::*;
    pub use super::signal::*;
    pub use super::simulator::*;
    pub use super::*;

    pub use crate::io::{ConfigRepr, CsvReport, MemoryReport, ReportSink};
    pub use crate::propagators::{Propagator, StraightLine};
    pub use crate::time::{Duration, Epoch, TimeUnits, Unit};
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ODError {
    #[snafu(display("during an orbit determination, encountered {source}"))]
    ODPropError { source: PropagationError },
    #[snafu(display("during an orbit determination, encountered {source}"))]
    ODEphemerisError { source: EphemerisError },
    #[snafu(display("OD failed because {source}"))]
    ODConfigError { source: ConfigError },
    #[snafu(display("{name} is neither a configured spacecraft nor a ground station"))]
    UnknownParticipant { name: String },
    #[snafu(display("no ephemeris loaded for spacecraft {name}"))]
    NoEphemeris { name: String },
    #[snafu(display("unknown measurement type {name}"))]
    UnknownMeasurementType { name: String },
    #[snafu(display("no measurement adapter handles {msr_type} from {participants}"))]
    NoAdapter {
        msr_type: String,
        participants: String,
    },
    #[snafu(display("a signal path needs at least two participants, got {count}"))]
    SignalPathTooShort { count: usize },
    #[snafu(display("derivative rows have {got} columns but {expected} are expected"))]
    DerivativeShapeMismatch { expected: usize, got: usize },
    #[snafu(display("{got} values provided for {expected} signal paths"))]
    PathCountMismatch { expected: usize, got: usize },
    #[snafu(display("at least {need} measurements required for {action}"))]
    TooFewMeasurements { need: usize, action: &'static str },
    #[snafu(display("observation @ {epoch} precedes the previous one @ {previous}"))]
    OutOfOrderObservation { epoch: Epoch, previous: Epoch },
    #[snafu(display("invalid measurement @ {epoch} = {val}"))]
    InvalidMeasurement { epoch: Epoch, val: f64 },
    #[snafu(display("noise sigma must be strictly positive, got {sigma}"))]
    InvalidNoise { sigma: f64 },
    #[snafu(display("measurement must be calculated before its derivatives"))]
    MeasurementNotComputed,
    #[snafu(display("estimator diverged {count} consecutive times (maximum is {max})"))]
    Diverged { count: usize, max: usize },
    #[snafu(display("estimation aborted before iteration {iteration}"))]
    Aborted { iteration: usize },
}
