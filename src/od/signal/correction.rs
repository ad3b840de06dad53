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

/// Range correction applied on each leg of a signal path, in km.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CorrectionModel {
    /// Zenith delay mapped to the elevation of the ground station end of the leg
    Troposphere { zenith_delay_m: f64 },
    /// Constant range bias
    Bias { value_km: f64 },
}

impl CorrectionModel {
    /// Correction in km for a leg, given the elevation (in degrees) at its ground station, if any.
    pub fn evaluate(&self, elevation_deg: Option<f64>) -> f64 {
        match self {
            Self::Troposphere { zenith_delay_m } => match elevation_deg {
                Some(elevation_deg) => {
                    let sin_el = elevation_deg.to_radians().sin();
                    zenith_delay_m * 1e-3 * 1.001 / (0.002001 + sin_el.powi(2)).sqrt()
                }
                None => 0.0,
            },
            Self::Bias { value_km } => *value_km,
        }
    }
}

impl fmt::Display for CorrectionModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Troposphere { .. } => write!(f, "Troposphere"),
            Self::Bias { .. } => write!(f, "Bias"),
        }
    }
}

/// A correction which may be computed without being applied.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrectionSetting {
    pub model: CorrectionModel,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl CorrectionSetting {
    pub fn enabled(model: CorrectionModel) -> Self {
        Self {
            model,
            enabled: true,
        }
    }

    pub fn disabled(model: CorrectionModel) -> Self {
        Self {
            model,
            enabled: false,
        }
    }
}

#[cfg(test)]
mod ut_correction {
    use super::*;

    #[test]
    fn troposphere_mapping() {
        let tropo = CorrectionModel::Troposphere {
            zenith_delay_m: 2.3,
        };
        let zenith = tropo.evaluate(Some(90.0));
        assert!((zenith - 2.3e-3 * 1.001 / 1.002001_f64.sqrt()).abs() < 1e-15);
        // Grows toward the horizon
        assert!(tropo.evaluate(Some(10.0)) > 5.0 * zenith);
        // Not applicable between spacecraft
        assert_eq!(tropo.evaluate(None), 0.0);
        assert_eq!(CorrectionModel::Bias { value_km: 0.1 }.evaluate(None), 0.1);
    }
}
