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

use super::registry::{Participant, Registry};
use super::{NoEphemerisSnafu, ODError, ODEphemerisSnafu, ODPropSnafu};
use crate::linalg::{Matrix6, Vector3, Vector6};
use crate::propagators::{Code500Propagator, Propagator};
use crate::time::Epoch;
use indexmap::IndexMap;
use snafu::{OptionExt, ResultExt};

/// State of a tracking participant at a given epoch, in km and km/s.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParticipantState {
    pub epoch: Epoch,
    pub rv: Vector6<f64>,
    /// Transition matrix from the estimation epoch, only for the estimated spacecraft
    pub stm: Option<Matrix6<f64>>,
}

impl ParticipantState {
    pub fn radius(&self) -> Vector3<f64> {
        self.rv.fixed_rows::<3>(0).into_owned()
    }

    pub fn velocity(&self) -> Vector3<f64> {
        self.rv.fixed_rows::<3>(3).into_owned()
    }
}

/// Provides the state of any participant of a measurement.
pub trait ParticipantStates {
    fn state_of(&mut self, name: &str, epoch: Epoch) -> Result<ParticipantState, ODError>;
}

/// Trajectory of the estimated spacecraft, anchored at the latest processed epoch.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReferenceState {
    pub epoch: Epoch,
    pub rv: Vector6<f64>,
    /// Transition matrix from the estimation epoch to `epoch`
    pub stm: Matrix6<f64>,
}

impl ReferenceState {
    pub fn at_estimation_epoch(epoch: Epoch, rv: Vector6<f64>) -> Self {
        Self {
            epoch,
            rv,
            stm: Matrix6::identity(),
        }
    }

    /// Moves the anchor to the provided epoch, chaining the transition matrices.
    pub fn advance(&mut self, to: Epoch, prop: &mut dyn Propagator) -> Result<(), ODError> {
        if to != self.epoch {
            let (rv, stm) = prop.propagate(&self.rv, self.epoch, to).context(ODPropSnafu)?;
            self.rv = rv;
            self.stm = stm * self.stm;
            self.epoch = to;
        }
        Ok(())
    }

    /// State at the provided epoch, without moving the anchor.
    pub fn propagated(
        &self,
        to: Epoch,
        prop: &mut dyn Propagator,
    ) -> Result<ParticipantState, ODError> {
        if to == self.epoch {
            return Ok(ParticipantState {
                epoch: to,
                rv: self.rv,
                stm: Some(self.stm),
            });
        }
        let (rv, stm) = prop.propagate(&self.rv, self.epoch, to).context(ODPropSnafu)?;
        Ok(ParticipantState {
            epoch: to,
            rv,
            stm: Some(stm * self.stm),
        })
    }
}

/// Participant states for one estimation pass: ground stations from their body rotation,
/// the estimated spacecraft from the reference trajectory and the other spacecraft from
/// their ephemerides.
pub struct Participants<'a> {
    pub registry: &'a Registry,
    pub estimated: &'a str,
    pub reference: &'a ReferenceState,
    pub propagator: &'a mut dyn Propagator,
    pub ephemerides: &'a mut IndexMap<String, Code500Propagator>,
}

impl ParticipantStates for Participants<'_> {
    fn state_of(&mut self, name: &str, epoch: Epoch) -> Result<ParticipantState, ODError> {
        if name == self.estimated {
            return self.reference.propagated(epoch, &mut *self.propagator);
        }

        match self.registry.participant(name)? {
            Participant::GroundStation(gs) => Ok(ParticipantState {
                epoch,
                rv: gs.inertial_state(epoch),
                stm: None,
            }),
            Participant::Spacecraft(_) => {
                let eph = self
                    .ephemerides
                    .get_mut(name)
                    .context(NoEphemerisSnafu { name })?;
                Ok(ParticipantState {
                    epoch,
                    rv: eph.state_at(epoch).context(ODEphemerisSnafu)?,
                    stm: None,
                })
            }
        }
    }
}
