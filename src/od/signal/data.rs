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

use crate::linalg::{Matrix3, Vector3};
use crate::od::participants::ParticipantState;
use crate::od::SPEED_OF_LIGHT_KM_S;

/// Physical quantities computed for one leg of a signal path.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalData {
    pub transmitter: String,
    pub receiver: String,
    pub tx_state: ParticipantState,
    pub rx_state: ParticipantState,
    /// Receiver minus transmitter, inertial, in km
    pub range_vector: Vector3<f64>,
    /// in km/s
    pub range_rate: f64,
    /// in seconds
    pub light_time_s: f64,
    /// Hardware delay at the transmitter, in seconds
    pub tx_delay_s: f64,
    /// Hardware delay at the receiver, in seconds
    pub rx_delay_s: f64,
    pub correction_ids: Vec<String>,
    /// Correction values in km, parallel to `use_correction`
    pub corrections: Vec<f64>,
    pub use_correction: Vec<bool>,
    pub feasible: bool,
    /// Elevation of the ground station end in degrees, or the closest approach to the
    /// occulting body in km between two spacecraft
    pub feasibility_value: f64,
    pub infeasible_reason: Option<String>,
    /// Body fixed to inertial rotation of the transmitter
    pub tx_rotation: Matrix3<f64>,
    /// Body fixed to inertial rotation of the receiver
    pub rx_rotation: Matrix3<f64>,
}

impl SignalData {
    pub fn range_km(&self) -> f64 {
        self.range_vector.norm()
    }

    /// Sum of the applied corrections, in km.
    pub fn applied_corrections(&self) -> f64 {
        self.corrections
            .iter()
            .zip(&self.use_correction)
            .filter(|(_, used)| **used)
            .map(|(value, _)| value)
            .sum()
    }

    /// Hardware delays converted to a distance, in km.
    pub fn delay_km(&self) -> f64 {
        SPEED_OF_LIGHT_KM_S * (self.tx_delay_s + self.rx_delay_s)
    }

    /// Contribution of this leg to the path measurement, in km.
    pub fn leg_value(&self) -> f64 {
        self.range_km() + self.applied_corrections() + self.delay_km()
    }

    pub(crate) fn mark_infeasible(&mut self, reason: String) {
        if self.feasible {
            self.feasible = false;
            self.infeasible_reason = Some(reason);
        }
    }
}
