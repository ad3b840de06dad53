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

use super::{AdapterConfig, MeasurementAdapter, MeasurementData};
use crate::linalg::DMatrix;
use crate::od::msr::{MeasurementModel, MeasurementType, ObservationRecord};
use crate::od::participants::ParticipantStates;
use crate::od::registry::Registry;
use crate::od::{MeasurementNotComputedSnafu, ODError};
use crate::time::Epoch;
use snafu::ensure;

/// Range in km: the multiplier times the sum of the geometric ranges, applied corrections
/// and hardware delays of each signal path.
#[derive(Clone, Debug)]
pub struct RangeAdapter {
    name: String,
    participant_lists: Vec<Vec<String>>,
    config: AdapterConfig,
    model: MeasurementModel,
    computed: bool,
}

impl RangeAdapter {
    pub fn new(
        name: &str,
        participant_lists: Vec<Vec<String>>,
        registry: &Registry,
        config: AdapterConfig,
    ) -> Result<Self, ODError> {
        config.validate()?;
        let model = MeasurementModel::new(
            &participant_lists,
            config.round_trip,
            registry,
            &config.signal,
            config.time_tag,
        )?;
        Ok(Self {
            name: name.to_string(),
            participant_lists,
            config,
            model,
            computed: false,
        })
    }

    pub fn model(&self) -> &MeasurementModel {
        &self.model
    }
}

impl MeasurementAdapter for RangeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn measurement_type(&self) -> MeasurementType {
        MeasurementType::Range
    }

    fn participant_lists(&self) -> &[Vec<String>] {
        &self.participant_lists
    }

    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    fn calculate_measurement(
        &mut self,
        epoch: Epoch,
        obs: Option<&ObservationRecord>,
        states: &mut dyn ParticipantStates,
    ) -> Result<MeasurementData, ODError> {
        self.computed = false;
        self.model.calculate(epoch, states)?;
        self.computed = true;

        let multiplier = self.config.multiplier();
        let modulo = obs.and_then(|obs| obs.range_modulo).filter(|m| *m > 0.0);

        let value = self
            .model
            .values()?
            .into_iter()
            .map(|path_value| {
                let value = multiplier * path_value;
                match modulo {
                    Some(modulo) => value.rem_euclid(modulo),
                    None => value,
                }
            })
            .collect();

        Ok(MeasurementData {
            epoch: self.model.measurement_epoch()?,
            msr_type: MeasurementType::Range,
            participants: self.participant_lists.clone(),
            value,
            feasible: self.model.is_feasible(),
            infeasible_reason: self.model.infeasible_reason(),
            covariance: self.config.covariance(obs, self.participant_lists.len()),
        })
    }

    fn calculate_measurement_derivatives(&self) -> Result<DMatrix<f64>, ODError> {
        ensure!(self.computed, MeasurementNotComputedSnafu);
        Ok(self.model.derivatives()? * self.config.multiplier())
    }
}
