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
use crate::time::{Duration, Epoch, Unit};

/// Offset of the A.1 atomic time scale with respect to TAI, in seconds (A.1 = TAI + offset).
pub const A1_TAI_OFFSET_S: f64 = 0.034_381_7;

/// Julian date of the reference epoch of A.1 modified Julian dates (05 Jan 1941 12:00:00).
pub const A1_MJD_REFERENCE_JD: f64 = 2_430_000.0;

/// Number of seconds in one day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Returns the duration between TAI and A.1.
pub fn a1_offset() -> Duration {
    Unit::Second * A1_TAI_OFFSET_S
}

/// Epoch of the origin of A.1 modified Julian dates.
pub fn a1_mjd_reference() -> Epoch {
    Epoch::from_jde_tai(A1_MJD_REFERENCE_JD) - a1_offset()
}

/// Largest magnitude of an A.1 modified Julian date accepted as an epoch, in days.
pub const MAX_A1_MJD_DAYS: f64 = 1.0e7;

/// Builds an epoch from an A.1 modified Julian date, or None if the date is not finite or
/// beyond `MAX_A1_MJD_DAYS`.
pub fn epoch_from_a1_mjd(a1_mjd: f64) -> Option<Epoch> {
    if a1_mjd.is_finite() && a1_mjd.abs() <= MAX_A1_MJD_DAYS {
        Some(a1_mjd_reference() + Unit::Day * a1_mjd)
    } else {
        None
    }
}

/// Returns the A.1 modified Julian date of the provided epoch.
pub fn epoch_to_a1_mjd(epoch: Epoch) -> f64 {
    (epoch - a1_mjd_reference()).to_unit(Unit::Day)
}

/// Rotation matrix about the Z axis by the provided angle in radians (frame rotation).
pub fn r3(angle_rad: f64) -> Matrix3<f64> {
    let (s, c) = angle_rad.sin_cos();
    Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0)
}

/// Returns the minimum distance between the origin and the segment going from `a` to `b`.
pub fn segment_distance_to_origin(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq < f64::EPSILON {
        return a.norm();
    }
    let t = (-a.dot(&ab) / len_sq).clamp(0.0, 1.0);
    (a + ab * t).norm()
}
