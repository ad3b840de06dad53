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

use nyx_od::io::{FileCategory, SearchPaths};
use nyx_od::linalg::Vector6;
use nyx_od::propagators::code500::{Code500File, Code500Units};
use nyx_od::propagators::{Code500Propagator, EphemerisError};
use nyx_od::time::{Epoch, TimeUnits, Unit};
use rstest::*;
use std::path::PathBuf;

const RADIUS_KM: f64 = 7000.0;
const MU_KM3_S2: f64 = 398_600.4415;

fn t0() -> Epoch {
    Epoch::from_gregorian_utc_at_midnight(2021, 6, 1)
}

/// Circular equatorial orbit
fn circular(dt_s: f64) -> Vector6<f64> {
    let n = (MU_KM3_S2 / RADIUS_KM.powi(3)).sqrt();
    let (s, c) = (n * dt_s).sin_cos();
    let v = n * RADIUS_KM;
    Vector6::new(RADIUS_KM * c, RADIUS_KM * s, 0.0, -v * s, v * c, 0.0)
}

/// Writes two and a half records of one minute spaced states, and returns the directory.
fn write_ephemeris(name: &str, big_endian: bool) -> PathBuf {
    let states: Vec<_> = (0..120).map(|i| circular(60.0 * i as f64)).collect();
    let file = Code500File::from_states(
        101.0,
        3.0,
        t0(),
        60.seconds(),
        &states,
        Code500Units::default(),
    );

    let dir = std::env::temp_dir().join(format!("nyx-od-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), file.to_bytes(big_endian)).unwrap();
    dir
}

#[rstest]
#[case::big_endian(true)]
#[case::little_endian(false)]
fn interpolates_circular_orbit(#[case] big_endian: bool) {
    let _ = pretty_env_logger::try_init();

    let name = format!("sat101-{big_endian}.eph");
    let dir = write_ephemeris(&name, big_endian);
    let paths = SearchPaths::default().with_directory(FileCategory::Ephemeris, &dir);

    let mut eph = Code500Propagator::from_resolver(&name, &paths, Code500Units::default()).unwrap();
    assert_eq!(eph.file_name(), name);

    let (start, end) = eph.span();
    assert!((start - t0()).abs() < 1.microseconds());
    assert!((end - (t0() + 119.minutes())).abs() < 1.microseconds());

    // Between grid points, including across the record boundary after the 50th point
    for offset_s in [0.0, 95.0, 2970.0, 3001.5, 7000.0, 7140.0] {
        let rv = eph.state_at(t0() + Unit::Second * offset_s).unwrap();
        let truth = circular(offset_s);
        let dr = (rv.fixed_rows::<3>(0) - truth.fixed_rows::<3>(0)).norm();
        let dv = (rv.fixed_rows::<3>(3) - truth.fixed_rows::<3>(3)).norm();
        assert!(dr < 1e-2, "{offset_s} s: position error {dr} km");
        assert!(dv < 2e-5, "{offset_s} s: velocity error {dv} km/s");
    }

    assert!(matches!(
        eph.state_at(t0() + 3.hours()),
        Err(EphemerisError::EpochOutsideSpan { .. })
    ));
    assert!(matches!(
        eph.state_at(t0() - 1.seconds()),
        Err(EphemerisError::EpochOutsideSpan { .. })
    ));
}

#[test]
fn stepping_through_the_file() {
    let name = "sat101-step.eph";
    let dir = write_ephemeris(name, true);
    let paths = SearchPaths::default().with_directory(FileCategory::Ephemeris, &dir);
    let mut eph = Code500Propagator::from_resolver(name, &paths, Code500Units::default()).unwrap();

    assert!(matches!(
        eph.step(1.minutes()),
        Err(EphemerisError::NotInitialized)
    ));

    eph.initialize(t0() + 10.seconds()).unwrap();
    for _ in 0..100 {
        eph.step(45.seconds()).unwrap();
    }
    let epoch = t0() + 10.seconds() + 4500.seconds();
    assert_eq!(eph.epoch(), Some(epoch));
    let truth = circular(4510.0);
    assert!((eph.state().fixed_rows::<3>(0) - truth.fixed_rows::<3>(0)).norm() < 1e-2);

    // Loaded once: a new name is accepted and ignored
    assert!(eph.set_ephemeris_file("another.eph"));
    assert_eq!(eph.file_name(), name);
}

#[test]
fn missing_file() {
    let paths =
        SearchPaths::default().with_directory(FileCategory::Ephemeris, std::env::temp_dir());
    assert!(matches!(
        Code500Propagator::from_resolver("no-such-file.eph", &paths, Code500Units::default()),
        Err(EphemerisError::FileNotFound { .. })
    ));
}
