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

use crate::linalg::DMatrix;
use crate::od::participants::ParticipantStates;
use crate::od::registry::Registry;
use crate::od::signal::{SignalConfig, SignalData, SignalPath, TimeTag};
use crate::od::ODError;
use crate::time::Epoch;

/// Owns one signal path per participant list and aggregates their results.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementModel {
    paths: Vec<SignalPath>,
    time_tag: TimeTag,
}

impl MeasurementModel {
    pub fn new(
        participant_lists: &[Vec<String>],
        round_trip: bool,
        registry: &Registry,
        config: &SignalConfig,
        time_tag: TimeTag,
    ) -> Result<Self, ODError> {
        let paths = participant_lists
            .iter()
            .map(|list| SignalPath::new(list, round_trip, registry, config.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { paths, time_tag })
    }

    pub fn paths(&self) -> &[SignalPath] {
        &self.paths
    }

    pub fn time_tag(&self) -> TimeTag {
        self.time_tag
    }

    /// Models every path at the provided epoch.
    pub fn calculate(
        &mut self,
        epoch: Epoch,
        states: &mut dyn ParticipantStates,
    ) -> Result<(), ODError> {
        let at_end = self.time_tag.epoch_is_at_end();
        for path in self.paths.iter_mut() {
            path.model_signal(epoch, at_end, states)?;
        }
        Ok(())
    }

    pub fn is_feasible(&self) -> bool {
        self.paths.iter().all(|path| path.is_feasible())
    }

    pub fn infeasible_reason(&self) -> Option<String> {
        self.paths.iter().find_map(|path| path.infeasible_reason())
    }

    /// One value per path, in km.
    pub fn values(&self) -> Result<Vec<f64>, ODError> {
        self.paths.iter().map(|path| path.value()).collect()
    }

    pub fn signal_data(&self) -> Vec<Vec<&SignalData>> {
        self.paths.iter().map(|path| path.signal_data()).collect()
    }

    /// Epoch of the measurement, from the anchored end of the first path.
    pub fn measurement_epoch(&self) -> Result<Epoch, ODError> {
        match self.paths.first() {
            Some(path) => path.measurement_epoch(self.time_tag.epoch_is_at_end()),
            None => Err(ODError::MeasurementNotComputed),
        }
    }

    /// One row of partials per path.
    pub fn derivatives(&self) -> Result<DMatrix<f64>, ODError> {
        let mut rows = DMatrix::zeros(self.paths.len(), 6);
        for (i, path) in self.paths.iter().enumerate() {
            rows.row_mut(i).copy_from(&path.derivatives()?);
        }
        Ok(rows)
    }
}
