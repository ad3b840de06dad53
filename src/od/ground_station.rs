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

use crate::io::{epoch_from_str, epoch_to_str, ConfigRepr};
use crate::linalg::{Matrix3, Vector3, Vector6};
use crate::time::Epoch;
use crate::utils::r3;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Rotation and shape of the central body hosting the ground stations.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BodyRotation {
    /// in km
    pub equatorial_radius_km: f64,
    pub flattening: f64,
    /// in rad/s
    pub rotation_rate_rad_s: f64,
    #[serde(serialize_with = "epoch_to_str", deserialize_with = "epoch_from_str")]
    pub reference_epoch: Epoch,
    /// Body fixed prime meridian angle at the reference epoch, in radians
    pub reference_angle_rad: f64,
}

impl BodyRotation {
    /// Uniformly rotating Earth, with the Greenwich angle at J2000.
    pub fn earth() -> Self {
        Self {
            equatorial_radius_km: 6378.1363,
            flattening: 1.0 / 298.257223563,
            rotation_rate_rad_s: 7.292_115_146_706_979e-5,
            reference_epoch: Epoch::from_gregorian_tai_at_noon(2000, 1, 1),
            reference_angle_rad: 280.460_618_37_f64.to_radians(),
        }
    }

    pub fn angle_at(&self, epoch: Epoch) -> f64 {
        self.reference_angle_rad
            + self.rotation_rate_rad_s * (epoch - self.reference_epoch).to_seconds()
    }

    /// Rotation from body fixed to inertial at the provided epoch.
    pub fn body_to_inertial(&self, epoch: Epoch) -> Matrix3<f64> {
        r3(-self.angle_at(epoch))
    }
}

impl Default for BodyRotation {
    fn default() -> Self {
        Self::earth()
    }
}

/// A tracking station fixed on the surface of a rotating body.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GroundStation {
    pub name: String,
    /// in degrees
    pub latitude_deg: f64,
    /// in degrees
    pub longitude_deg: f64,
    /// in km
    pub height_km: f64,
    /// in degrees
    #[serde(default)]
    pub elevation_mask_deg: f64,
    /// Hardware delay on the uplink, in seconds
    #[serde(default)]
    pub transmit_delay_s: f64,
    /// Hardware delay on the downlink, in seconds
    #[serde(default)]
    pub receive_delay_s: f64,
    #[serde(default)]
    pub body: BodyRotation,
}

impl GroundStation {
    /// Initializes a point on the surface of the Earth.
    pub fn from_point(name: String, latitude_deg: f64, longitude_deg: f64, height_km: f64) -> Self {
        Self {
            name,
            latitude_deg,
            longitude_deg,
            height_km,
            elevation_mask_deg: 0.0,
            transmit_delay_s: 0.0,
            receive_delay_s: 0.0,
            body: BodyRotation::earth(),
        }
    }

    pub fn with_elevation_mask(mut self, elevation_mask_deg: f64) -> Self {
        self.elevation_mask_deg = elevation_mask_deg;
        self
    }

    pub fn with_delays(mut self, transmit_delay_s: f64, receive_delay_s: f64) -> Self {
        self.transmit_delay_s = transmit_delay_s;
        self.receive_delay_s = receive_delay_s;
        self
    }

    /// Body fixed position from the geodetic coordinates.
    pub fn body_fixed_position(&self) -> Vector3<f64> {
        let (lat, lon) = (
            self.latitude_deg.to_radians(),
            self.longitude_deg.to_radians(),
        );
        let e2 = self.body.flattening * (2.0 - self.body.flattening);
        let n = self.body.equatorial_radius_km / (1.0 - e2 * lat.sin().powi(2)).sqrt();
        Vector3::new(
            (n + self.height_km) * lat.cos() * lon.cos(),
            (n + self.height_km) * lat.cos() * lon.sin(),
            (n * (1.0 - e2) + self.height_km) * lat.sin(),
        )
    }

    fn zenith_body_fixed(&self) -> Vector3<f64> {
        let (lat, lon) = (
            self.latitude_deg.to_radians(),
            self.longitude_deg.to_radians(),
        );
        Vector3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
    }

    /// Inertial position and velocity of this station, in km and km/s.
    pub fn inertial_state(&self, epoch: Epoch) -> Vector6<f64> {
        let r = self.body.body_to_inertial(epoch) * self.body_fixed_position();
        let omega = Vector3::new(0.0, 0.0, self.body.rotation_rate_rad_s);
        let v = omega.cross(&r);
        Vector6::new(r[0], r[1], r[2], v[0], v[1], v[2])
    }

    /// Elevation in degrees of the provided inertial position seen from this station.
    pub fn elevation_of(&self, epoch: Epoch, target: &Vector3<f64>) -> f64 {
        let dcm = self.body.body_to_inertial(epoch);
        let los = target - dcm * self.body_fixed_position();
        let zenith = dcm * self.zenith_body_fixed();
        (los.dot(&zenith) / los.norm()).clamp(-1.0, 1.0).asin().to_degrees()
    }
}

impl ConfigRepr for GroundStation {}

impl fmt::Display for GroundStation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (lat.: {:.4} deg    long.: {:.4} deg    alt.: {:.3} m)",
            self.name,
            self.latitude_deg,
            self.longitude_deg,
            self.height_km * 1e3,
        )
    }
}
