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

use crate::io::ConfigRepr;
use crate::linalg::Vector6;
use crate::od::msr::{adapter_for, AdapterConfig, MeasurementType, ObservationRecord};
use crate::od::msr::{TrackingConfig, TrackingDataArc};
use crate::od::noise::{Stochastics, WhiteNoise};
use crate::od::participants::{Participants, ReferenceState};
use crate::od::registry::Registry;
use crate::od::*;
use crate::propagators::{Code500Propagator, Propagator};
use crate::time::{Epoch, TimeSeries, Unit};
use indexmap::IndexMap;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use typed_builder::TypedBuilder;

/// Source name of the simulated observations.
pub const SIMULATED_SOURCE: &str = "simulated";

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Schedule {
    #[default]
    Continuous,
    /// Alternates tracking passes and gaps, both in seconds, from the start of the simulation
    Intermittent { on_s: f64, off_s: f64 },
}

impl Schedule {
    pub fn is_on(&self, start: Epoch, epoch: Epoch) -> bool {
        match *self {
            Self::Continuous => true,
            Self::Intermittent { on_s, off_s } => {
                let period = on_s + off_s;
                period <= 0.0 || (epoch - start).to_seconds().rem_euclid(period) < on_s
            }
        }
    }
}

/// Simulated tracking of one measurement type along given participant lists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct TrkConfig {
    pub msr_type: MeasurementType,
    pub participants: Vec<Vec<String>>,
    #[builder(default)]
    #[serde(default)]
    pub schedule: Schedule,
    #[builder(default = 60.0)]
    pub sampling_s: f64,
    /// Measurement noise, also recorded as the observation noise
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub noise: Option<WhiteNoise>,
}

impl ConfigRepr for TrkConfig {}

/// Generates tracking data from a truth trajectory of the estimated spacecraft.
#[derive(TypedBuilder)]
#[builder(doc)]
pub struct TrackingSimulator<P: Propagator> {
    pub propagator: P,
    pub registry: Registry,
    /// Name of the tracked spacecraft, whose truth trajectory starts from `initial` at `epoch`
    #[builder(setter(into))]
    pub estimated: String,
    pub initial: Vector6<f64>,
    pub epoch: Epoch,
    pub configs: Vec<TrkConfig>,
    #[builder(default)]
    pub adapter_config: AdapterConfig,
    #[builder(default)]
    pub ephemerides: IndexMap<String, Code500Propagator>,
    /// Noise is only added when seeded
    #[builder(default, setter(strip_option))]
    pub seed: Option<u64>,
}

impl<P: Propagator> TrackingSimulator<P> {
    /// Simulates every configuration between both epochs, keeping the feasible measurements.
    pub fn generate(&mut self, start: Epoch, end: Epoch) -> Result<TrackingDataArc, ODError> {
        let mut rng = self.seed.map(Pcg64Mcg::seed_from_u64);
        let mut observations = Vec::new();
        let mut unique_id = 0;

        for config in &self.configs {
            ensure!(
                config.sampling_s > 0.0,
                InvalidMeasurementSnafu {
                    epoch: start,
                    val: config.sampling_s
                }
            );
            let trk = TrackingConfig {
                msr_type: config.msr_type,
                participants: config.participants.clone(),
            };
            let mut adapter = adapter_for(trk, &self.registry, &self.adapter_config)?;
            let mut truth = ReferenceState::at_estimation_epoch(self.epoch, self.initial);
            let (mut generated, mut infeasible) = (0, 0);

            for epoch in TimeSeries::inclusive(start, end, Unit::Second * config.sampling_s) {
                if !config.schedule.is_on(start, epoch) {
                    continue;
                }
                truth.advance(epoch, &mut self.propagator)?;

                let mut participants = Participants {
                    registry: &self.registry,
                    estimated: &self.estimated,
                    reference: &truth,
                    propagator: &mut self.propagator,
                    ephemerides: &mut self.ephemerides,
                };
                let msr = adapter.calculate_measurement(epoch, None, &mut participants)?;
                if !msr.feasible {
                    infeasible += 1;
                    continue;
                }

                let mut value = msr.value;
                if let (Some(noise), Some(rng)) = (config.noise, rng.as_mut()) {
                    let mut noise = noise;
                    for v in value.iter_mut() {
                        *v += noise.sample(epoch, rng);
                    }
                }

                unique_id += 1;
                let mut obs = ObservationRecord::new(config.msr_type, epoch, &[], 0.0)
                    .with_source(SIMULATED_SOURCE)
                    .with_unique_id(unique_id);
                obs.participant_lists = config.participants.clone();
                obs.value_orig = value.clone();
                obs.value = value;
                if let Some(noise) = config.noise {
                    obs = obs.with_noise_sigma(noise.sigma);
                }
                if config.msr_type == MeasurementType::RangeRate {
                    obs = obs
                        .with_doppler_count_interval(self.adapter_config.doppler_count_interval_s);
                }
                observations.push(obs);
                generated += 1;
            }

            info!(
                "{}: generated {generated} measurements, {infeasible} infeasible",
                adapter.name()
            );
        }

        let mut arc = TrackingDataArc::new(observations);
        arc.source = Some(SIMULATED_SOURCE.to_string());
        Ok(arc)
    }
}
