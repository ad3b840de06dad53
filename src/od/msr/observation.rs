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

use super::MeasurementType;
use crate::linalg::DMatrix;
use crate::od::filter::RejectReason;
use crate::time::{Epoch, TimeScale};
use indexmap::IndexMap;
use std::fmt;

/// One tracking observation, as read from a tracking data file.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationRecord {
    /// Name of the observation type in the source file, e.g. `Range`
    pub type_name: String,
    pub msr_type: MeasurementType,
    pub unique_id: u64,
    pub epoch: Epoch,
    /// Time scale of the epoch in the source file
    pub time_scale: TimeScale,
    /// One participant list per signal path, starting with the tracker
    pub participant_lists: Vec<Vec<String>>,
    /// Measured value per signal path
    pub value: Vec<f64>,
    /// Backup of the values before any edit
    pub value_orig: Vec<f64>,
    pub uplink_band: Option<u8>,
    /// in Hz
    pub uplink_frequency_hz: Option<f64>,
    /// in km
    pub range_modulo: Option<f64>,
    /// in seconds
    pub doppler_count_interval_s: Option<f64>,
    pub noise_covariance: Option<DMatrix<f64>>,
    /// Vendor specific fields
    pub extra: IndexMap<String, String>,
    /// File this observation was read from
    pub source: String,
    pub in_used: bool,
    pub removed_reason: Option<RejectReason>,
}

impl ObservationRecord {
    /// Builds a single path observation.
    pub fn new(msr_type: MeasurementType, epoch: Epoch, participants: &[&str], value: f64) -> Self {
        Self {
            type_name: msr_type.to_string(),
            msr_type,
            unique_id: 0,
            epoch,
            time_scale: TimeScale::TAI,
            participant_lists: vec![participants.iter().map(|p| p.to_string()).collect()],
            value: vec![value],
            value_orig: vec![value],
            uplink_band: None,
            uplink_frequency_hz: None,
            range_modulo: None,
            doppler_count_interval_s: None,
            noise_covariance: None,
            extra: IndexMap::new(),
            source: String::new(),
            in_used: true,
            removed_reason: None,
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn with_unique_id(mut self, unique_id: u64) -> Self {
        self.unique_id = unique_id;
        self
    }

    pub fn with_noise_sigma(mut self, sigma: f64) -> Self {
        let paths = self.participant_lists.len();
        self.noise_covariance = Some(DMatrix::from_diagonal_element(paths, paths, sigma.powi(2)));
        self
    }

    pub fn with_doppler_count_interval(mut self, seconds: f64) -> Self {
        self.doppler_count_interval_s = Some(seconds);
        self
    }

    /// The tracking station or spacecraft which initiated the measurement.
    pub fn tracker(&self) -> Option<&str> {
        self.participant_lists
            .first()
            .and_then(|list| list.first())
            .map(String::as_str)
    }

    /// Every participant except the tracker.
    pub fn observed(&self) -> impl Iterator<Item = &str> {
        self.participant_lists
            .iter()
            .flat_map(|list| list.iter().skip(1))
            .map(String::as_str)
    }

    /// One value per signal path.
    pub fn is_consistent(&self) -> bool {
        self.value.len() == self.participant_lists.len()
    }

    /// Participant lists formatted as `GS -> SC`, joined by `;`.
    pub fn path_string(&self) -> String {
        self.participant_lists
            .iter()
            .map(|list| list.join(" -> "))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Marks this observation as unused.
    pub fn reject(&mut self, reason: RejectReason) {
        self.in_used = false;
        self.removed_reason = Some(reason);
    }
}

impl fmt::Display for ObservationRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "#{} {} {} [{}] = {:?} {}",
            self.unique_id,
            self.epoch,
            self.type_name,
            self.path_string(),
            self.value,
            self.msr_type.unit()
        )
    }
}
