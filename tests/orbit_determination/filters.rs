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

use super::{range_configs, scenario, simulate};
use nyx_od::linalg::Vector6;
use nyx_od::od::prelude::*;

fn estimator(filters: Vec<Box<dyn DataFilter>>) -> BatchEstimator<StraightLine> {
    let (registry, _, _) = scenario();
    BatchEstimator::builder()
        .config(
            BatchEstimatorConfig::builder()
                .estimated("SC1")
                .absolute_tolerance(1e-3)
                .relative_tolerance(1e-4)
                .max_iterations(10)
                .max_consecutive_divergences(2)
                .build(),
        )
        .propagator(StraightLine)
        .registry(registry)
        .filters(filters)
        .build()
}

#[test]
fn filters_gate_the_estimation() {
    let _ = pretty_env_logger::try_init();

    let (registry, truth, epoch) = scenario();
    let mut arc = simulate(range_configs(None), None, 30);
    let master = registry.master_lists();

    let accept = AcceptFilterConfig::loads(
        r#"
        name: every other one
        thinning: !Frequency 2
        "#,
    )
    .unwrap();
    let reject = RejectFilterConfig::builder()
        .trackers(vec!["GS3".to_string()])
        .epoch_start("2020-01-01T00:20:30 UTC")
        .build();

    let filters: Vec<Box<dyn DataFilter>> = vec![
        Box::new(StatisticAcceptFilter::new(accept, &master).unwrap()),
        Box::new(StatisticRejectFilter::new(reject, &master).unwrap()),
    ];

    let mut blse = estimator(filters);
    let initial = truth + Vector6::new(0.2, 0.2, -0.2, 0.0, 0.0, 0.0);
    let solution = blse.estimate(initial, epoch, &arc).unwrap();
    println!("{solution}");

    // Observations are interleaved GS1, GS2, GS3 at each minute: the odd indices pass the
    // thinning, and GS3 passes it on odd minutes only.
    let stats = &solution.filter_statistics;
    assert_eq!(stats.rejected[&RejectReason::Thinned], 47);
    assert_eq!(stats.rejected[&RejectReason::RejectFilter], 5);
    assert_eq!(stats.accepted, 41);
    assert_eq!(stats.accepted + stats.total_rejected(), arc.len());
    assert_eq!(solution.rejected.len(), stats.total_rejected());

    assert!(solution.converged(), "{}", solution.reason);
    let err = solution.estimated_state - truth;
    assert!(err.fixed_rows::<3>(0).norm() < 1e-4, "position error {err}");
    assert!(solution
        .residuals
        .iter()
        .all(|r| !r.path.starts_with("GS3") || r.epoch <= epoch + 20.minutes()));

    solution.apply_rejections(&mut arc);
    assert_eq!(
        arc.iter().filter(|o| !o.in_used).count(),
        stats.total_rejected()
    );
    let late_gs3 = arc
        .iter()
        .filter(|o| o.removed_reason == Some(RejectReason::RejectFilter))
        .collect::<Vec<_>>();
    assert_eq!(late_gs3.len(), 5);
    assert!(late_gs3
        .iter()
        .all(|o| o.tracker() == Some("GS3") && o.epoch > epoch + 20.minutes()));
}

#[test]
fn yaml_pipeline() {
    let (registry, _, epoch) = scenario();
    let arc = simulate(range_configs(None), None, 10);
    let master = registry.master_lists();

    let accepts = AcceptFilterConfig::loads_many(
        r#"
        - name: stations
          trackers: [GS1, GS2]
          epoch_end: "2020-01-01T00:05:00 UTC"
        "#,
    )
    .unwrap();
    let mut filters: Vec<Box<dyn DataFilter>> = accepts
        .into_iter()
        .map(|cfg| {
            Box::new(StatisticAcceptFilter::new(cfg, &master).unwrap()) as Box<dyn DataFilter>
        })
        .collect();

    let mut stats = FilterStatistics::default();
    for obs in arc.iter() {
        let outcome = filter_observation(&mut filters, obs);
        if outcome.is_accepted() {
            assert_ne!(obs.tracker(), Some("GS3"));
            assert!(obs.epoch <= epoch + 5.minutes());
        }
        stats.record(&outcome);
    }
    println!("{stats}");

    assert_eq!(stats.rejected[&RejectReason::Tracker], 11);
    assert_eq!(stats.rejected[&RejectReason::OutsideTimeWindow], 10);
    assert_eq!(stats.accepted, 12);

    // Unknown names are configuration errors
    let typo = AcceptFilterConfig::loads("trackers: [GS4]").unwrap();
    assert!(StatisticAcceptFilter::new(typo, &master).is_err());
}

#[test]
fn everything_filtered() {
    let (registry, truth, epoch) = scenario();
    let arc = simulate(range_configs(None), None, 10);
    let master = registry.master_lists();

    let config = AcceptFilterConfig::builder().file_names(vec![]).build();
    let filters: Vec<Box<dyn DataFilter>> =
        vec![Box::new(StatisticAcceptFilter::new(config, &master).unwrap())];

    let mut blse = estimator(filters);
    assert!(matches!(
        blse.estimate(truth, epoch, &arc),
        Err(nyx_od::od::ODError::TooFewMeasurements { .. })
    ));
}
