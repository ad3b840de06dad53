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

use super::ground_station::GroundStation;
use super::participants::ParticipantStates;
use super::registry::{Participant, Registry};
use super::{
    DerivativeShapeMismatchSnafu, MeasurementNotComputedSnafu, ODError, SignalPathTooShortSnafu,
    SPEED_OF_LIGHT_KM_S,
};
use crate::linalg::{DMatrix, Matrix3, RowVector6};
use crate::time::{Epoch, Unit};
use crate::utils::segment_distance_to_origin;
use serde_derive::{Deserialize, Serialize};
use snafu::{ensure, OptionExt};
use typed_builder::TypedBuilder;

pub mod correction;
pub mod data;

pub use correction::{CorrectionModel, CorrectionSetting};
pub use data::SignalData;

/// Which end of the signal path carries the measurement time tag.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeTag {
    /// Tagged at the final reception
    #[default]
    Receive,
    /// Tagged at the initial transmission
    Transmit,
}

impl TimeTag {
    pub fn epoch_is_at_end(self) -> bool {
        matches!(self, Self::Receive)
    }
}

/// Light time and feasibility settings of signal paths.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(default)]
pub struct SignalConfig {
    /// Whether to solve for the light time on each leg
    #[builder(default = true)]
    pub light_time: bool,
    /// in seconds
    #[builder(default = 1e-8)]
    pub light_time_tolerance_s: f64,
    #[builder(default = 10)]
    pub light_time_max_iterations: usize,
    /// Radius of the body which may block the line of sight between two spacecraft, in km
    #[builder(default = 6378.1363)]
    pub occulting_radius_km: f64,
    #[builder(default)]
    pub corrections: Vec<CorrectionSetting>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A participant of a signal path, with its hardware delays.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalNode {
    pub name: String,
    pub station: Option<GroundStation>,
    /// in seconds
    pub transmit_delay_s: f64,
    /// in seconds
    pub receive_delay_s: f64,
}

impl SignalNode {
    fn from_participant(participant: Participant<'_>) -> Self {
        Self {
            name: participant.name().to_string(),
            station: match participant {
                Participant::GroundStation(gs) => Some(gs.clone()),
                Participant::Spacecraft(_) => None,
            },
            transmit_delay_s: participant.transmit_delay_s(),
            receive_delay_s: participant.receive_delay_s(),
        }
    }

    fn rotation(&self, epoch: Epoch) -> Matrix3<f64> {
        match &self.station {
            Some(gs) => gs.body.body_to_inertial(epoch),
            None => Matrix3::identity(),
        }
    }
}

/// One directional link between two participants.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalLeg {
    pub tx: SignalNode,
    pub rx: SignalNode,
    pub data: Option<SignalData>,
}

/// A possibly multi-hop signal, stored as legs ordered from the first transmitter (head,
/// index 0) to the final receiver (tail, last index).
#[derive(Clone, Debug, PartialEq)]
pub struct SignalPath {
    legs: Vec<SignalLeg>,
    config: SignalConfig,
}

impl SignalPath {
    /// Builds the legs between consecutive participants. A round trip path returns to the
    /// first participant through the same nodes in reverse.
    pub fn new(
        participants: &[String],
        round_trip: bool,
        registry: &Registry,
        config: SignalConfig,
    ) -> Result<Self, ODError> {
        ensure!(
            participants.len() >= 2,
            SignalPathTooShortSnafu {
                count: participants.len()
            }
        );

        let mut names: Vec<&String> = participants.iter().collect();
        if round_trip {
            names.extend(participants.iter().rev().skip(1));
        }

        let nodes = names
            .into_iter()
            .map(|name| registry.participant(name).map(SignalNode::from_participant))
            .collect::<Result<Vec<_>, _>>()?;

        let legs = nodes
            .windows(2)
            .map(|pair| SignalLeg {
                tx: pair[0].clone(),
                rx: pair[1].clone(),
                data: None,
            })
            .collect();

        Ok(Self { legs, config })
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    pub fn legs(&self) -> &[SignalLeg] {
        &self.legs
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Index of the leg anchored on the measurement epoch.
    pub fn start_index(&self, epoch_is_at_end: bool) -> usize {
        if epoch_is_at_end {
            self.legs.len().saturating_sub(1)
        } else {
            0
        }
    }

    /// Computes every leg, starting from the tail when the epoch is the final reception
    /// and from the head when it is the first transmission.
    pub fn model_signal(
        &mut self,
        epoch: Epoch,
        epoch_is_at_end: bool,
        states: &mut dyn ParticipantStates,
    ) -> Result<(), ODError> {
        for leg in self.legs.iter_mut() {
            leg.data = None;
        }
        let n = self.legs.len();

        if epoch_is_at_end {
            let mut t_rx = epoch - Unit::Second * self.legs[n - 1].rx.receive_delay_s;
            for i in (0..n).rev() {
                let data = self.model_leg(i, t_rx, true, states)?;
                if i > 0 {
                    let turnaround =
                        self.legs[i].tx.transmit_delay_s + self.legs[i - 1].rx.receive_delay_s;
                    t_rx = data.tx_state.epoch - Unit::Second * turnaround;
                }
                self.legs[i].data = Some(data);
            }
        } else {
            let mut t_tx = epoch + Unit::Second * self.legs[0].tx.transmit_delay_s;
            for i in 0..n {
                let data = self.model_leg(i, t_tx, false, states)?;
                if i + 1 < n {
                    let turnaround =
                        self.legs[i].rx.receive_delay_s + self.legs[i + 1].tx.transmit_delay_s;
                    t_tx = data.rx_state.epoch + Unit::Second * turnaround;
                }
                self.legs[i].data = Some(data);
            }
        }

        Ok(())
    }

    fn model_leg(
        &self,
        index: usize,
        anchor: Epoch,
        anchored_at_rx: bool,
        states: &mut dyn ParticipantStates,
    ) -> Result<SignalData, ODError> {
        let leg = &self.legs[index];
        let (fixed_name, free_name) = if anchored_at_rx {
            (&leg.rx.name, &leg.tx.name)
        } else {
            (&leg.tx.name, &leg.rx.name)
        };

        let fixed = states.state_of(fixed_name, anchor)?;
        let mut free = states.state_of(free_name, anchor)?;
        let mut light_time_s = 0.0;
        let mut converged = true;

        if self.config.light_time {
            converged = false;
            for iteration in 0..self.config.light_time_max_iterations {
                let new_lt = (fixed.radius() - free.radius()).norm() / SPEED_OF_LIGHT_KM_S;
                let done = (new_lt - light_time_s).abs() < self.config.light_time_tolerance_s;
                light_time_s = new_lt;
                let free_epoch = if anchored_at_rx {
                    anchor - Unit::Second * light_time_s
                } else {
                    anchor + Unit::Second * light_time_s
                };
                free = states.state_of(free_name, free_epoch)?;
                if done {
                    trace!(
                        "{} -> {}: light time {light_time_s:.9} s after {} iterations",
                        leg.tx.name,
                        leg.rx.name,
                        iteration + 1
                    );
                    converged = true;
                    break;
                }
            }
        }

        let (tx_state, rx_state) = if anchored_at_rx {
            (free, fixed)
        } else {
            (fixed, free)
        };

        let range_vector = rx_state.radius() - tx_state.radius();
        let range = range_vector.norm();
        let range_rate = if range > 0.0 {
            (rx_state.velocity() - tx_state.velocity()).dot(&range_vector) / range
        } else {
            0.0
        };

        let elevation_deg = match (&leg.tx.station, &leg.rx.station) {
            (Some(gs), _) => Some(gs.elevation_of(tx_state.epoch, &rx_state.radius())),
            (None, Some(gs)) => Some(gs.elevation_of(rx_state.epoch, &tx_state.radius())),
            (None, None) => None,
        };

        let mut data = SignalData {
            transmitter: leg.tx.name.clone(),
            receiver: leg.rx.name.clone(),
            tx_state,
            rx_state,
            range_vector,
            range_rate,
            light_time_s,
            tx_delay_s: leg.tx.transmit_delay_s,
            rx_delay_s: leg.rx.receive_delay_s,
            correction_ids: Vec::with_capacity(self.config.corrections.len()),
            corrections: Vec::with_capacity(self.config.corrections.len()),
            use_correction: Vec::with_capacity(self.config.corrections.len()),
            feasible: true,
            feasibility_value: 0.0,
            infeasible_reason: None,
            tx_rotation: leg.tx.rotation(tx_state.epoch),
            rx_rotation: leg.rx.rotation(rx_state.epoch),
        };

        if !converged {
            data.mark_infeasible(format!(
                "light time did not converge within {} iterations",
                self.config.light_time_max_iterations
            ));
        }

        if [data.tx_delay_s, data.rx_delay_s]
            .iter()
            .any(|delay| !delay.is_finite() || *delay < 0.0)
        {
            data.mark_infeasible(format!(
                "invalid hardware delays ({} s, {} s)",
                data.tx_delay_s, data.rx_delay_s
            ));
        }

        match (elevation_deg, leg.tx.station.as_ref().or(leg.rx.station.as_ref())) {
            (Some(elevation_deg), Some(gs)) => {
                data.feasibility_value = elevation_deg;
                if !(elevation_deg >= gs.elevation_mask_deg) {
                    data.mark_infeasible(format!(
                        "elevation of {elevation_deg:.3} deg at {} is below the mask of {} deg",
                        gs.name, gs.elevation_mask_deg
                    ));
                }
            }
            _ => {
                let closest =
                    segment_distance_to_origin(&tx_state.radius(), &rx_state.radius());
                data.feasibility_value = closest;
                if !(closest >= self.config.occulting_radius_km) {
                    data.mark_infeasible(format!(
                        "line of sight passes {closest:.3} km from the center of the occulting body"
                    ));
                }
            }
        }

        for setting in &self.config.corrections {
            data.correction_ids.push(setting.model.to_string());
            data.corrections.push(setting.model.evaluate(elevation_deg));
            data.use_correction.push(setting.enabled);
        }

        Ok(data)
    }

    /// False if any leg is infeasible or has not been computed.
    pub fn is_feasible(&self) -> bool {
        self.legs
            .iter()
            .all(|leg| leg.data.as_ref().is_some_and(|data| data.feasible))
    }

    /// First reason for this path to be infeasible.
    pub fn infeasible_reason(&self) -> Option<String> {
        self.legs
            .iter()
            .filter_map(|leg| leg.data.as_ref())
            .find_map(|data| data.infeasible_reason.clone())
    }

    pub fn signal_data(&self) -> Vec<&SignalData> {
        self.legs.iter().filter_map(|leg| leg.data.as_ref()).collect()
    }

    fn computed(&self) -> Result<Vec<&SignalData>, ODError> {
        self.legs
            .iter()
            .map(|leg| leg.data.as_ref().context(MeasurementNotComputedSnafu))
            .collect()
    }

    /// Geometric range, applied corrections and hardware delays summed over all legs, in km.
    pub fn value(&self) -> Result<f64, ODError> {
        Ok(self.computed()?.iter().map(|data| data.leg_value()).sum())
    }

    /// Sum of the range rates of all legs, in km/s.
    pub fn range_rate(&self) -> Result<f64, ODError> {
        Ok(self.computed()?.iter().map(|data| data.range_rate).sum())
    }

    /// Epoch of the measurement, taken from the anchored end of the path.
    pub fn measurement_epoch(&self, epoch_is_at_end: bool) -> Result<Epoch, ODError> {
        let leg = &self.legs[self.start_index(epoch_is_at_end)];
        let data = leg.data.as_ref().context(MeasurementNotComputedSnafu)?;
        Ok(if epoch_is_at_end {
            data.rx_state.epoch + Unit::Second * data.rx_delay_s
        } else {
            data.tx_state.epoch - Unit::Second * data.tx_delay_s
        })
    }

    /// Partials of the path range with respect to the estimated state at the estimation
    /// epoch, as a single row.
    pub fn derivatives(&self) -> Result<DMatrix<f64>, ODError> {
        let rows = self
            .computed()?
            .into_iter()
            .map(|data| DMatrix::from_row_slice(1, 6, leg_derivative(data).as_slice()))
            .collect::<Vec<_>>();
        sum_rows(&rows, 6)
    }
}

fn leg_derivative(data: &SignalData) -> RowVector6<f64> {
    let range = data.range_km();
    let mut row = RowVector6::zeros();
    if range == 0.0 {
        return row;
    }
    let unit = data.range_vector / range;
    let partial = RowVector6::new(unit[0], unit[1], unit[2], 0.0, 0.0, 0.0);
    if let Some(stm) = data.rx_state.stm {
        row += partial * stm;
    }
    if let Some(stm) = data.tx_state.stm {
        row -= partial * stm;
    }
    row
}

/// Sums single row matrices which must all have `expected_cols` columns.
pub(crate) fn sum_rows(
    rows: &[DMatrix<f64>],
    expected_cols: usize,
) -> Result<DMatrix<f64>, ODError> {
    let mut total = DMatrix::zeros(1, expected_cols);
    for row in rows {
        ensure!(
            row.nrows() == 1 && row.ncols() == expected_cols,
            DerivativeShapeMismatchSnafu {
                expected: expected_cols,
                got: row.ncols()
            }
        );
        total += row;
    }
    Ok(total)
}
