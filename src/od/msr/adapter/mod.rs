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

use super::{MeasurementType, ObservationRecord, TrackingConfig, TrackingDataArc};
use crate::linalg::DMatrix;
use crate::od::participants::ParticipantStates;
use crate::od::registry::Registry;
use crate::od::signal::{SignalConfig, TimeTag};
use crate::od::{InvalidNoiseSnafu, ODError};
use crate::time::Epoch;
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use typed_builder::TypedBuilder;

mod range;
mod range_rate;

pub use range::RangeAdapter;
pub use range_rate::RangeRateAdapter;

/// Configuration shared by the measurement adapters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(default)]
pub struct AdapterConfig {
    #[builder(default)]
    pub time_tag: TimeTag,
    /// Whether the signal returns to the first participant
    #[builder(default = true)]
    pub round_trip: bool,
    /// Scale applied to the summed path values, defaults to 0.5 for round trips and 1 otherwise
    #[builder(default, setter(strip_option))]
    pub multiplier: Option<f64>,
    #[builder(default)]
    pub signal: SignalConfig,
    /// One sigma noise used when the observation carries no covariance, in the measurement unit
    #[builder(default = 1e-3)]
    pub noise_sigma: f64,
    /// Used when a range rate observation has no count interval, in seconds
    #[builder(default = 10.0)]
    pub doppler_count_interval_s: f64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AdapterConfig {
    pub fn multiplier(&self) -> f64 {
        self.multiplier
            .unwrap_or(if self.round_trip { 0.5 } else { 1.0 })
    }

    pub(crate) fn validate(&self) -> Result<(), ODError> {
        ensure!(
            self.noise_sigma > 0.0 && self.noise_sigma.is_finite(),
            InvalidNoiseSnafu {
                sigma: self.noise_sigma
            }
        );
        Ok(())
    }

    /// Noise covariance of an observation, falling back on this configuration.
    pub fn covariance(&self, obs: Option<&ObservationRecord>, num_paths: usize) -> DMatrix<f64> {
        match obs.and_then(|obs| obs.noise_covariance.clone()) {
            Some(cov) if cov.nrows() == num_paths && cov.ncols() == num_paths => cov,
            _ => DMatrix::from_diagonal_element(num_paths, num_paths, self.noise_sigma.powi(2)),
        }
    }
}

/// A computed measurement.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementData {
    pub epoch: Epoch,
    pub msr_type: MeasurementType,
    pub participants: Vec<Vec<String>>,
    /// One value per signal path
    pub value: Vec<f64>,
    pub feasible: bool,
    pub infeasible_reason: Option<String>,
    pub covariance: DMatrix<f64>,
}

/// Converts the signal path geometry into a physical observable.
pub trait MeasurementAdapter {
    fn name(&self) -> &str;

    fn measurement_type(&self) -> MeasurementType;

    fn participant_lists(&self) -> &[Vec<String>];

    fn config(&self) -> &AdapterConfig;

    /// Whether this adapter models the provided observation.
    fn handles(&self, obs: &ObservationRecord) -> bool {
        obs.msr_type == self.measurement_type()
            && obs.participant_lists.as_slice() == self.participant_lists()
    }

    fn noise_sigma(&self) -> f64 {
        self.config().noise_sigma
    }

    /// Computes the measurement tagged at `epoch`. The observation, if any, provides its
    /// metadata (range modulo, count interval, noise).
    fn calculate_measurement(
        &mut self,
        epoch: Epoch,
        obs: Option<&ObservationRecord>,
        states: &mut dyn ParticipantStates,
    ) -> Result<MeasurementData, ODError>;

    /// Partials of the last computed measurement with respect to the estimated state at the
    /// estimation epoch, one row per signal path.
    fn calculate_measurement_derivatives(&self) -> Result<DMatrix<f64>, ODError>;
}

/// Builds the adapter modeling a tracking configuration.
pub fn adapter_for(
    trk: TrackingConfig,
    registry: &Registry,
    config: &AdapterConfig,
) -> Result<Box<dyn MeasurementAdapter>, ODError> {
    let name = trk.to_string();
    Ok(match trk.msr_type {
        MeasurementType::Range => Box::new(RangeAdapter::new(
            &name,
            trk.participants,
            registry,
            config.clone(),
        )?),
        MeasurementType::RangeRate => Box::new(RangeRateAdapter::new(
            &name,
            trk.participants,
            registry,
            config.clone(),
        )?),
    })
}

/// Builds one adapter per tracking configuration of the arc.
pub fn adapters_for(
    arc: &TrackingDataArc,
    registry: &Registry,
    config: &AdapterConfig,
) -> Result<Vec<Box<dyn MeasurementAdapter>>, ODError> {
    arc.tracking_configs()
        .into_iter()
        .map(|trk| adapter_for(trk, registry, config))
        .collect()
}
