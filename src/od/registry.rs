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
use super::msr::MeasurementType;
use super::{ODError, UnknownParticipantSnafu};
use crate::io::ConfigRepr;
use serde_derive::{Deserialize, Serialize};
use snafu::OptionExt;

/// A spacecraft known to the estimation run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Spacecraft {
    pub name: String,
    /// Turn around delay of the transponder, in seconds
    #[serde(default)]
    pub transponder_delay_s: f64,
    /// Logical name of the Code 500 ephemeris, if this spacecraft is not estimated
    #[serde(default)]
    pub ephemeris: Option<String>,
}

impl Spacecraft {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transponder_delay_s: 0.0,
            ephemeris: None,
        }
    }
}

/// Resolves the participants of the tracking data by name.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Registry {
    #[serde(default)]
    pub spacecraft: Vec<Spacecraft>,
    #[serde(default)]
    pub ground_stations: Vec<GroundStation>,
}

impl ConfigRepr for Registry {}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Participant<'a> {
    Spacecraft(&'a Spacecraft),
    GroundStation(&'a GroundStation),
}

impl<'a> Participant<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Self::Spacecraft(sc) => &sc.name,
            Self::GroundStation(gs) => &gs.name,
        }
    }

    /// Hardware delay when this participant emits the signal, in seconds.
    pub fn transmit_delay_s(&self) -> f64 {
        match self {
            Self::Spacecraft(sc) => 0.5 * sc.transponder_delay_s,
            Self::GroundStation(gs) => gs.transmit_delay_s,
        }
    }

    /// Hardware delay when this participant receives the signal, in seconds.
    pub fn receive_delay_s(&self) -> f64 {
        match self {
            Self::Spacecraft(sc) => 0.5 * sc.transponder_delay_s,
            Self::GroundStation(gs) => gs.receive_delay_s,
        }
    }
}

/// Names known to the run, against which filter selections are validated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MasterLists {
    pub spacecraft: Vec<String>,
    pub ground_stations: Vec<String>,
    pub measurement_types: Vec<String>,
}

impl Registry {
    pub fn with_spacecraft(mut self, spacecraft: Spacecraft) -> Self {
        self.spacecraft.retain(|sc| sc.name != spacecraft.name);
        self.spacecraft.push(spacecraft);
        self
    }

    pub fn with_ground_station(mut self, station: GroundStation) -> Self {
        self.ground_stations.retain(|gs| gs.name != station.name);
        self.ground_stations.push(station);
        self
    }

    pub fn spacecraft(&self, name: &str) -> Option<&Spacecraft> {
        self.spacecraft.iter().find(|sc| sc.name == name)
    }

    pub fn ground_station(&self, name: &str) -> Option<&GroundStation> {
        self.ground_stations.iter().find(|gs| gs.name == name)
    }

    pub fn participant(&self, name: &str) -> Result<Participant<'_>, ODError> {
        self.ground_station(name)
            .map(Participant::GroundStation)
            .or_else(|| self.spacecraft(name).map(Participant::Spacecraft))
            .context(UnknownParticipantSnafu { name })
    }

    pub fn master_lists(&self) -> MasterLists {
        MasterLists {
            spacecraft: self.spacecraft.iter().map(|sc| sc.name.clone()).collect(),
            ground_stations: self.ground_stations.iter().map(|gs| gs.name.clone()).collect(),
            measurement_types: MeasurementType::ALL
                .iter()
                .map(|msr_type| msr_type.to_string())
                .collect(),
        }
    }
}
