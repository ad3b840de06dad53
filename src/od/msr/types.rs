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

use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::od::ODError;

#[derive(Copy, Clone, Debug, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum MeasurementType {
    #[serde(rename = "Range")]
    Range,
    #[serde(rename = "RangeRate")]
    RangeRate,
}

impl MeasurementType {
    pub const ALL: [Self; 2] = [Self::Range, Self::RangeRate];

    /// Returns the expected unit of this measurement type
    pub fn unit(self) -> &'static str {
        match self {
            Self::Range => "km",
            Self::RangeRate => "km/s",
        }
    }

    /// Numeric type identifier used in GMD tracking files
    pub fn type_id(self) -> u32 {
        match self {
            Self::Range => 9004,
            Self::RangeRate => 9012,
        }
    }

    pub fn from_type_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.type_id() == id)
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Range => write!(f, "Range"),
            Self::RangeRate => write!(f, "RangeRate"),
        }
    }
}

impl FromStr for MeasurementType {
    type Err = ODError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Range" | "Range_KM" => Ok(Self::Range),
            "RangeRate" | "DSN_TCP" => Ok(Self::RangeRate),
            _ => Err(ODError::UnknownMeasurementType {
                name: s.to_string(),
            }),
        }
    }
}
