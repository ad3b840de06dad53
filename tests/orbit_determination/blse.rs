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
use nyx_od::linalg::{DMatrix, Matrix6, RowVector6, Vector6};
use nyx_od::od::prelude::*;
use nyx_od::od::ODError;
use rstest::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Observable linear in the state: `h(t) · x(t)`, with a straight line trajectory.
struct LinearAdapter {
    t0: Epoch,
    participants: Vec<Vec<String>>,
    config: AdapterConfig,
    sign: f64,
    last: Option<DMatrix<f64>>,
}

impl LinearAdapter {
    fn new(t0: Epoch) -> Self {
        Self {
            t0,
            participants: vec![vec!["GS1".to_string(), "SC1".to_string()]],
            config: AdapterConfig::default(),
            sign: 1.0,
            last: None,
        }
    }

    fn h(&self, epoch: Epoch) -> RowVector6<f64> {
        let a = (epoch - self.t0).to_seconds() / 600.0;
        RowVector6::new(a.cos(), a.sin(), 0.2, 0.0, 0.0, 0.0)
    }

    /// Partials with respect to the state at `t0`.
    fn partials(&self, epoch: Epoch) -> RowVector6<f64> {
        self.h(epoch) * StraightLine::stm((epoch - self.t0).to_seconds())
    }
}

impl MeasurementAdapter for LinearAdapter {
    fn name(&self) -> &str {
        "linear"
    }

    fn measurement_type(&self) -> MeasurementType {
        MeasurementType::Range
    }

    fn participant_lists(&self) -> &[Vec<String>] {
        &self.participants
    }

    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    fn calculate_measurement(
        &mut self,
        epoch: Epoch,
        obs: Option<&ObservationRecord>,
        states: &mut dyn ParticipantStates,
    ) -> Result<MeasurementData, ODError> {
        let sc = states.state_of("SC1", epoch)?;
        let stm = sc.stm.unwrap_or_else(Matrix6::identity);
        let partials = self.h(epoch) * stm * self.sign;
        self.last = Some(DMatrix::from_row_slice(1, 6, partials.as_slice()));
        Ok(MeasurementData {
            epoch,
            msr_type: MeasurementType::Range,
            participants: self.participants.clone(),
            value: vec![(self.h(epoch) * sc.rv)[0]],
            feasible: true,
            infeasible_reason: None,
            covariance: self.config.covariance(obs, 1),
        })
    }

    fn calculate_measurement_derivatives(&self) -> Result<DMatrix<f64>, ODError> {
        self.last.clone().ok_or(ODError::MeasurementNotComputed)
    }
}

const SIGMA: f64 = 1e-3;

fn linear_arc(t0: Epoch, truth: &Vector6<f64>, count: i64) -> TrackingDataArc {
    let adapter = LinearAdapter::new(t0);
    TrackingDataArc::new(
        (0..count)
            .map(|k| {
                let epoch = t0 + (10 * k).minutes();
                let value = (adapter.partials(epoch) * truth)[0];
                ObservationRecord::new(MeasurementType::Range, epoch, &["GS1", "SC1"], value)
                    .with_noise_sigma(SIGMA)
                    .with_unique_id(k as u64)
            })
            .collect(),
    )
}

fn config() -> BatchEstimatorConfig {
    BatchEstimatorConfig::builder()
        .estimated("SC1")
        .absolute_tolerance(1e-9)
        .relative_tolerance(1e-4)
        .max_iterations(10)
        .max_consecutive_divergences(2)
        .build()
}

fn registry() -> Registry {
    scenario().0
}

fn linear_estimator(config: BatchEstimatorConfig, t0: Epoch) -> BatchEstimator<StraightLine> {
    BatchEstimator::builder()
        .config(config)
        .propagator(StraightLine)
        .registry(registry())
        .adapters(vec![Box::new(LinearAdapter::new(t0)) as Box<dyn MeasurementAdapter>])
        .build()
}

#[rstest]
#[case(Solver::WeightedLeastSquares(InversionAlgorithm::Cholesky))]
#[case(Solver::WeightedLeastSquares(InversionAlgorithm::Schur))]
#[case(Solver::SquareRootInformation)]
fn linear_model_matches_closed_form(#[case] solver: Solver) {
    let _ = pretty_env_logger::try_init();

    let t0 = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
    let initial = Vector6::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    let truth = Vector6::new(1.5, -0.2, 0.3, 1e-3, -2e-3, 5e-4);
    let arc = linear_arc(t0, &truth, 5);
    let sigmas = [1.0, 1.0, 1.0, 1e-2, 1e-2, 1e-2];

    let mut cfg = config();
    cfg.solver = solver;
    cfg.use_apriori = true;
    cfg.apriori_sigmas = Some(sigmas);

    let mut blse = linear_estimator(cfg, t0);
    let solution = blse.estimate(initial, t0, &arc).unwrap();
    println!("{solution}");

    // x = (Λ0 + Hᵀ W H)⁻¹ (Λ0 x0 + Hᵀ W y)
    let adapter = LinearAdapter::new(t0);
    let mut info =
        Matrix6::from_diagonal(&Vector6::from_iterator(sigmas.iter().map(|s| s.powi(-2))));
    let mut rhs = info * initial;
    for obs in arc.iter() {
        let h = adapter.partials(obs.epoch);
        info += h.transpose() * h / SIGMA.powi(2);
        rhs += h.transpose() * obs.value[0] / SIGMA.powi(2);
    }
    let expected = info.cholesky().unwrap().solve(&rhs);

    assert!(solution.converged(), "{}", solution.reason);
    assert_eq!(blse.state(), EstimatorState::Finished);
    assert!(
        (solution.estimated_state - expected).norm() < 1e-6,
        "got {} expected {}",
        solution.estimated_state,
        expected
    );

    let rms: Vec<f64> = solution.iterations.iter().map(|it| it.rms).collect();
    assert!(rms.len() >= 2);
    assert!(rms[1] < rms[0]);
    assert!(rms.windows(2).all(|w| w[1] <= w[0] * (1.0 + 1e-3)));
    assert_eq!(solution.iterations.iter().map(|it| it.num_used).max(), Some(5));
}

#[rstest]
#[case(Solver::WeightedLeastSquares(InversionAlgorithm::Cholesky))]
#[case(Solver::SquareRootInformation)]
fn two_way_range(#[case] solver: Solver) {
    let _ = pretty_env_logger::try_init();

    let (registry, truth, epoch) = scenario();
    let arc = simulate(range_configs(None), None, 30);
    assert_eq!(arc.len(), 93);

    let mut cfg = config();
    cfg.solver = solver;
    cfg.absolute_tolerance = 1e-3;

    let mut blse = BatchEstimator::builder()
        .config(cfg)
        .propagator(StraightLine)
        .registry(registry)
        .build();

    let initial = truth + Vector6::new(1.0, -0.5, 0.8, 1e-3, -1e-3, 5e-4);
    let solution = blse.estimate(initial, epoch, &arc).unwrap();
    println!("{solution}");

    assert!(solution.converged(), "{}", solution.reason);
    assert!(solution.num_iterations() <= 6);
    let err = solution.estimated_state - truth;
    assert!(err.fixed_rows::<3>(0).norm() < 1e-4, "position error {err}");
    assert!(err.fixed_rows::<3>(3).norm() < 1e-6, "velocity error {err}");
    assert_eq!(blse.adapters.len(), 3);
    assert!(solution.sigmas().iter().all(|s| *s > 0.0));
}

#[test]
fn noisy_range_and_range_rate() {
    let _ = pretty_env_logger::try_init();

    let (registry, truth, epoch) = scenario();
    let mut configs = range_configs(Some(5e-3));
    configs.push(
        TrkConfig::builder()
            .msr_type(MeasurementType::RangeRate)
            .participants(vec![vec!["GS1".to_string(), "SC1".to_string()]])
            .noise(WhiteNoise::new(1e-6).unwrap())
            .sampling_s(120.0)
            .build(),
    );
    let arc = simulate(configs, Some(42), 30);

    let mut report = MemoryReport::default();
    let mut blse = BatchEstimator::builder()
        .config(config())
        .propagator(StraightLine)
        .registry(registry)
        .build();

    let initial = truth + Vector6::new(0.5, 0.5, -0.5, 1e-4, 1e-4, 0.0);
    let solution = blse.estimate(initial, epoch, &arc).unwrap();
    println!("{solution}");

    assert!(solution.converged(), "{}", solution.reason);
    let rms = solution.final_rms().unwrap();
    assert!(rms > 0.5 && rms < 2.0, "rms = {rms}");
    let err = solution.estimated_state - truth;
    let sigmas = solution.sigmas();
    for i in 0..6 {
        assert!(err[i].abs() < 5.0 * sigmas[i], "{i}: {} vs {}", err[i], sigmas[i]);
    }

    // Residuals are reported per observation and per iteration
    for record in &solution.residuals {
        report.on_measurement(record);
    }
    assert_eq!(report.measurements.len(), arc.len());
}

#[test]
fn sigma_editing_removes_outlier() {
    let _ = pretty_env_logger::try_init();

    let (registry, truth, epoch) = scenario();
    let mut arc = simulate(range_configs(None), None, 30);
    let outlier = 10;
    arc.observations[outlier].value[0] += 1.0;

    let mut cfg = config();
    cfg.absolute_tolerance = 1e-3;
    cfg.sigma_editing = Some(
        SigmaEditing::builder()
            .initial_multiplier(500.0)
            .multiplicative(3.0)
            .additive(5.0)
            .build(),
    );

    let mut blse = BatchEstimator::builder()
        .config(cfg)
        .propagator(StraightLine)
        .registry(registry)
        .build();

    let initial = truth + Vector6::new(0.05, -0.05, 0.05, 0.0, 0.0, 0.0);
    let solution = blse.estimate(initial, epoch, &arc).unwrap();

    assert!(solution.converged(), "{}", solution.reason);
    assert_eq!(solution.edited(), vec![outlier]);
    assert!(solution.iterations.iter().all(|it| it.num_edited == 1));
    assert!((solution.estimated_state - truth).fixed_rows::<3>(0).norm() < 1e-4);
}

#[test]
fn diverging_derivatives() {
    let _ = pretty_env_logger::try_init();

    let t0 = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
    let truth = Vector6::new(1.5, -0.2, 0.3, 1e-3, -2e-3, 5e-4);
    let arc = linear_arc(t0, &truth, 8);

    let mut adapter = LinearAdapter::new(t0);
    adapter.sign = -1.0;
    let mut blse = BatchEstimator::builder()
        .config(config())
        .propagator(StraightLine)
        .registry(registry())
        .adapters(vec![Box::new(adapter) as Box<dyn MeasurementAdapter>])
        .build();

    let err = blse.estimate(Vector6::zeros(), t0, &arc).unwrap_err();
    assert!(matches!(err, ODError::Diverged { count: 3, max: 2 }), "{err}");
}

#[test]
fn singular_information_is_a_divergence() {
    let _ = pretty_env_logger::try_init();

    let t0 = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
    let truth = Vector6::new(1.5, -0.2, 0.3, 1e-3, -2e-3, 5e-4);
    let arc = linear_arc(t0, &truth, 3);

    let mut cfg = config();
    cfg.max_consecutive_divergences = 1;
    let mut report = MemoryReport::default();
    let mut blse = linear_estimator(cfg, t0);
    let err = blse.estimate(Vector6::zeros(), t0, &arc).unwrap_err();
    assert!(matches!(err, ODError::Diverged { count: 2, max: 1 }), "{err}");

    // With too few iterations to exceed the divergence limit, the run ends unconverged
    let mut cfg = config();
    cfg.max_iterations = 1;
    let mut blse = linear_estimator(cfg, t0);
    let solution = blse.estimate(Vector6::zeros(), t0, &arc).unwrap();
    assert!(!solution.converged());
    assert_eq!(solution.status, EstimationStatus::MaxIterationsDiverged);
    assert_eq!(solution.covariance, Matrix6::zeros());
    report.on_completion(&solution);
    assert!(report.completed.is_some());
}

/// Sets the abort flag once the first iteration is reported.
struct AbortAfterFirst(Arc<AtomicBool>);

impl ReportSink for AbortAfterFirst {
    fn on_measurement(&mut self, _record: &ResidualRecord) {}

    fn on_iteration(&mut self, _summary: &IterationSummary) {
        self.0.store(true, Ordering::Relaxed);
    }
}

#[test]
fn abort_between_iterations() {
    let t0 = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
    let truth = Vector6::new(1.5, -0.2, 0.3, 1e-3, -2e-3, 5e-4);
    let arc = linear_arc(t0, &truth, 8);

    let mut blse = linear_estimator(config(), t0);
    blse.abort_handle().store(true, Ordering::Relaxed);
    assert!(matches!(
        blse.estimate(Vector6::zeros(), t0, &arc),
        Err(ODError::Aborted { iteration: 0 })
    ));

    let mut blse = linear_estimator(config(), t0);
    blse.sink = Some(Box::new(AbortAfterFirst(blse.abort_handle())));
    assert!(matches!(
        blse.estimate(Vector6::zeros(), t0, &arc),
        Err(ODError::Aborted { iteration: 1 })
    ));
}

#[test]
fn structural_errors() {
    let t0 = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
    let truth = Vector6::new(1.5, -0.2, 0.3, 1e-3, -2e-3, 5e-4);

    // No adapter models range rate
    let mut arc = linear_arc(t0, &truth, 8);
    arc.observations.push(
        ObservationRecord::new(MeasurementType::RangeRate, t0 + 2.hours(), &["GS1", "SC1"], 0.1),
    );
    let mut blse = linear_estimator(config(), t0);
    assert!(matches!(
        blse.estimate(Vector6::zeros(), t0, &arc),
        Err(ODError::NoAdapter { .. })
    ));

    // Observations must be time ordered
    let mut arc = linear_arc(t0, &truth, 8);
    arc.observations.swap(2, 3);
    let mut blse = linear_estimator(config(), t0);
    assert!(matches!(
        blse.estimate(Vector6::zeros(), t0, &arc),
        Err(ODError::OutOfOrderObservation { .. })
    ));

    // Unknown estimated spacecraft
    let mut cfg = config();
    cfg.estimated = "SC9".to_string();
    let mut blse = linear_estimator(cfg, t0);
    assert!(matches!(
        blse.estimate(Vector6::zeros(), t0, &linear_arc(t0, &truth, 8)),
        Err(ODError::UnknownParticipant { .. })
    ));

    // A non finite initial guess cannot be propagated
    let mut blse = linear_estimator(config(), t0);
    let initial = Vector6::new(f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0);
    assert!(matches!(
        blse.estimate(initial, t0, &linear_arc(t0, &truth, 8)),
        Err(ODError::ODPropError { .. })
    ));

    // A priori requested without sigmas
    let mut cfg = config();
    cfg.use_apriori = true;
    let mut blse = linear_estimator(cfg, t0);
    assert!(matches!(
        blse.estimate(Vector6::zeros(), t0, &linear_arc(t0, &truth, 8)),
        Err(ODError::ODConfigError { .. })
    ));
}
