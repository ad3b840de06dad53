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

use super::scenario;
use indexmap::IndexMap;
use nyx_od::linalg::Vector6;
use nyx_od::od::prelude::*;
use nyx_od::od::ODError;

/// Two-way path from GS1, computed at `offset_s` after the estimation epoch with the provided
/// state at that epoch.
fn model_two_way(rv0: Vector6<f64>, offset_s: f64, config: SignalConfig) -> SignalPath {
    let (registry, _, epoch) = scenario();
    let mut path = SignalPath::new(
        &["GS1".to_string(), "SC1".to_string()],
        true,
        &registry,
        config,
    )
    .unwrap();

    let reference = ReferenceState::at_estimation_epoch(epoch, rv0);
    let mut propagator = StraightLine;
    let mut ephemerides = IndexMap::new();
    let mut states = Participants {
        registry: &registry,
        estimated: "SC1",
        reference: &reference,
        propagator: &mut propagator,
        ephemerides: &mut ephemerides,
    };

    path.model_signal(epoch + Unit::Second * offset_s, true, &mut states)
        .unwrap();
    path
}

#[test]
fn two_way_range_value() {
    let (registry, truth, epoch) = scenario();
    let gs = registry.ground_station("GS1").unwrap().inertial_state(epoch);
    let geometric = (truth.fixed_rows::<3>(0) - gs.fixed_rows::<3>(0)).norm();

    let instantaneous = model_two_way(
        truth,
        0.0,
        SignalConfig::builder().light_time(false).build(),
    );
    assert_eq!(instantaneous.len(), 2);
    assert!(instantaneous.is_feasible());
    assert!((instantaneous.value().unwrap() - 2.0 * geometric).abs() < 1e-9);

    let path = model_two_way(truth, 0.0, SignalConfig::default());
    let data = path.signal_data();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0].transmitter, "GS1");
    assert_eq!(data[1].receiver, "GS1");
    // The spacecraft moves at about 1.1 km/s during the round trip
    assert!((path.value().unwrap() - 2.0 * geometric).abs() < 0.1);
    for leg in &data {
        assert!((leg.light_time_s - geometric / SPEED_OF_LIGHT_KM_S).abs() < 1e-4);
        assert!((leg.feasibility_value - 90.0).abs() < 1.0);
    }
    // Epoch is the final reception
    assert_eq!(path.measurement_epoch(true).unwrap(), epoch);
}

#[test]
fn derivatives_match_finite_differences() {
    let (_, truth, _) = scenario();
    let offset_s = 600.0;

    let path = model_two_way(truth, offset_s, SignalConfig::default());
    let partials = path.derivatives().unwrap();
    assert_eq!((partials.nrows(), partials.ncols()), (1, 6));

    let nominal = path.value().unwrap();
    for i in 0..6 {
        let step = if i < 3 { 1e-3 } else { 1e-6 };
        let mut perturbed = truth;
        perturbed[i] += step;
        let fd = (model_two_way(perturbed, offset_s, SignalConfig::default())
            .value()
            .unwrap()
            - nominal)
            / step;
        let tol = 1e-3 * fd.abs().max(1.0);
        assert!(
            (partials[(0, i)] - fd).abs() < tol,
            "partial {i}: {} vs {fd}",
            partials[(0, i)]
        );
    }
}

#[test]
fn below_the_horizon() {
    let (_, truth, _) = scenario();
    let mut hidden = truth;
    hidden[0] = -hidden[0];

    let path = model_two_way(hidden, 0.0, SignalConfig::default());
    assert!(!path.is_feasible());
    let reason = path.infeasible_reason().unwrap();
    assert!(reason.contains("elevation"), "{reason}");
    // Values are still computed
    assert!(path.value().unwrap() > 0.0);
}

#[test]
fn malformed_paths() {
    let (registry, _, _) = scenario();

    assert!(matches!(
        SignalPath::new(&["GS1".to_string()], false, &registry, SignalConfig::default()),
        Err(ODError::SignalPathTooShort { count: 1 })
    ));
    assert!(matches!(
        SignalPath::new(
            &["GS1".to_string(), "SC9".to_string()],
            false,
            &registry,
            SignalConfig::default()
        ),
        Err(ODError::UnknownParticipant { .. })
    ));

    let unmodeled = SignalPath::new(
        &["GS1".to_string(), "SC1".to_string()],
        false,
        &registry,
        SignalConfig::default(),
    )
    .unwrap();
    assert!(!unmodeled.is_feasible());
    assert!(matches!(
        unmodeled.derivatives(),
        Err(ODError::MeasurementNotComputed)
    ));
}
