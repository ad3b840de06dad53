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

mod blse;
mod filters;
mod signal;

use nyx_od::linalg::Vector6;
use nyx_od::od::prelude::*;

/// Two-way tracking of a spacecraft flying in a straight line above three non rotating stations.
pub fn scenario() -> (Registry, Vector6<f64>, Epoch) {
    let mut registry = Registry::default().with_spacecraft(Spacecraft::new("SC1"));
    for (name, lat, lon) in [("GS1", 0.0, 0.0), ("GS2", 10.0, 5.0), ("GS3", -10.0, -5.0)] {
        let mut station = GroundStation::from_point(name.to_string(), lat, lon, 0.1);
        station.body.rotation_rate_rad_s = 0.0;
        station.body.reference_angle_rad = 0.0;
        registry = registry.with_ground_station(station);
    }

    let truth = Vector6::new(7000.0, 0.0, 0.0, 0.0, 1.0, 0.5);
    (registry, truth, Epoch::from_gregorian_utc_at_midnight(2020, 1, 1))
}

pub fn range_configs(noise: Option<f64>) -> Vec<TrkConfig> {
    ["GS1", "GS2", "GS3"]
        .iter()
        .map(|gs| {
            let cfg = TrkConfig::builder()
                .msr_type(MeasurementType::Range)
                .participants(vec![vec![gs.to_string(), "SC1".to_string()]]);
            match noise {
                Some(sigma) => cfg.noise(WhiteNoise::new(sigma).unwrap()).build(),
                None => cfg.build(),
            }
        })
        .collect()
}

pub fn simulate(configs: Vec<TrkConfig>, seed: Option<u64>, minutes: i64) -> TrackingDataArc {
    let (registry, truth, epoch) = scenario();
    let builder = TrackingSimulator::builder()
        .propagator(StraightLine)
        .registry(registry)
        .estimated("SC1")
        .initial(truth)
        .epoch(epoch)
        .configs(configs);
    let mut sim = match seed {
        Some(seed) => builder.seed(seed).build(),
        None => builder.build(),
    };
    sim.generate(epoch, epoch + minutes.minutes()).unwrap()
}
