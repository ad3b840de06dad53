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
use crate::od::signal::TimeTag;
use crate::od::{MeasurementNotComputedSnafu, ODError};
use crate::time::{Epoch, Unit};
use snafu::OptionExt;

/// Range rate in km/s, as the change of the range over the Doppler count interval.
#[derive(Clone, Debug)]
pub struct RangeRateAdapter {
    name: String,
    participant_lists: Vec<Vec<String>>,
    config: AdapterConfig,
    start: MeasurementModel,
    end: MeasurementModel,
    /// Count interval of the last computed measurement
    count_interval_s: Option<f64>,
}

impl RangeRateAdapter {
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
            start: model.clone(),
            end: model,
            count_interval_s: None,
        })
    }
}

impl MeasurementAdapter for RangeRateAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn measurement_type(&self) -> MeasurementType {
        MeasurementType::RangeRate
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
        self.count_interval_s = None;
        let count_interval_s = obs
            .and_then(|obs| obs.doppler_count_interval_s)
            .filter(|tc| *tc > 0.0)
            .unwrap_or(self.config.doppler_count_interval_s);
        let interval = Unit::Second * count_interval_s;

        // The count interval ends at the time tag on reception, and starts there on transmission
        let (start_epoch, end_epoch) = match self.config.time_tag {
            TimeTag::Receive => (epoch - interval, epoch),
            TimeTag::Transmit => (epoch, epoch + interval),
        };
        self.start.calculate(start_epoch, states)?;
        self.end.calculate(end_epoch, states)?;
        self.count_interval_s = Some(count_interval_s);

        let scale = self.config.multiplier() / count_interval_s;
        let value = self
            .end
            .values()?
            .into_iter()
            .zip(self.start.values()?)
            .map(|(end, start)| scale * (end - start))
            .collect();

        let reason = self
            .start
            .infeasible_reason()
            .or_else(|| self.end.infeasible_reason());

        Ok(MeasurementData {
            epoch,
            msr_type: MeasurementType::RangeRate,
            participants: self.participant_lists.clone(),
            value,
            feasible: self.start.is_feasible() && self.end.is_feasible(),
            infeasible_reason: reason,
            covariance: self.config.covariance(obs, self.participant_lists.len()),
        })
    }

    fn calculate_measurement_derivatives(&self) -> Result<DMatrix<f64>, ODError> {
        let count_interval_s = self.count_interval_s.context(MeasurementNotComputedSnafu)?;
        let scale = self.config.multiplier() / count_interval_s;
        Ok((self.end.derivatives()? - self.start.derivatives()?) * scale)
    }
}
