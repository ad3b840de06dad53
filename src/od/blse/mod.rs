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

use crate::io::ReportSink;
use crate::linalg::{DVector, Matrix6, Vector6};
use crate::od::filter::{filter_observation, DataFilter, FilterOutcome, FilterStatistics};
use crate::od::msr::{adapters_for, AdapterConfig, MeasurementAdapter, TrackingDataArc};
use crate::od::participants::{Participants, ReferenceState};
use crate::od::registry::Registry;
use crate::od::*;
use crate::propagators::{Code500Propagator, Propagator};
use crate::time::Epoch;
use indexmap::IndexMap;
use snafu::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use typed_builder::TypedBuilder;

mod config;
mod convergence;
mod normal;
mod solution;
mod strategy;

pub use config::{BatchEstimatorConfig, InversionAlgorithm, SigmaEditing, Solver};
pub use convergence::{EstimationStatus, ResidualHistory};
pub use normal::{is_well_conditioned, schur_inverse, NormalEquations, WeightMatrix};
pub use solution::{BatchSolution, IterationSummary, ResidualRecord, ResidualStatus};
pub use strategy::{
    EstimationStrategy, SquareRootInformation, StateCorrection, WeightedLeastSquares,
};

/// States of the batch estimator.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum EstimatorState {
    #[default]
    Initializing,
    Propagating,
    Calculating,
    Accumulating,
    Estimating,
    CheckingRun,
    Iterating,
    Finished,
}

impl fmt::Display for EstimatorState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// An observation admitted by the filters along with its adapter.
struct Admitted {
    index: usize,
    adapter: usize,
}

/// Iterative batch least squares estimator of the state of one spacecraft at an epoch.
#[derive(TypedBuilder)]
#[builder(doc)]
pub struct BatchEstimator<P: Propagator> {
    pub config: BatchEstimatorConfig,
    /// Propagator of the estimated spacecraft, must provide its state transition matrix
    pub propagator: P,
    pub registry: Registry,
    /// Overrides the strategy selected by the configured solver
    #[builder(default, setter(strip_option))]
    pub strategy: Option<Box<dyn EstimationStrategy>>,
    /// Used to build the adapters when none are provided
    #[builder(default)]
    pub adapter_config: AdapterConfig,
    /// Built from the tracking configurations of the arc when empty
    #[builder(default)]
    pub adapters: Vec<Box<dyn MeasurementAdapter>>,
    /// Applied in order to every observation before the first iteration
    #[builder(default)]
    pub filters: Vec<Box<dyn DataFilter>>,
    /// Ephemerides of the other spacecraft participating in the measurements
    #[builder(default)]
    pub ephemerides: IndexMap<String, Code500Propagator>,
    #[builder(default, setter(strip_option))]
    pub sink: Option<Box<dyn ReportSink>>,
    #[builder(default)]
    pub abort: Arc<AtomicBool>,
    #[builder(default, setter(skip))]
    state: EstimatorState,
}

impl<P: Propagator> BatchEstimator<P> {
    pub fn state(&self) -> EstimatorState {
        self.state
    }

    /// Setting the returned flag stops the run at the next iteration boundary.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    fn transition(state: &mut EstimatorState, to: EstimatorState) {
        if *state != to {
            debug!("estimator: {state} -> {to}");
            *state = to;
        }
    }

    /// Estimates the state at `epoch` from the tracking arc, starting from `initial`, which is
    /// also the a priori state when the a priori is used.
    pub fn estimate(
        &mut self,
        initial: Vector6<f64>,
        epoch: Epoch,
        arc: &TrackingDataArc,
    ) -> Result<BatchSolution, ODError> {
        self.state = EstimatorState::Initializing;
        self.config.validate().context(ODConfigSnafu)?;
        self.adapter_config.validate()?;
        self.registry.participant(&self.config.estimated)?;

        if self.adapters.is_empty() {
            self.adapters = adapters_for(arc, &self.registry, &self.adapter_config)?;
        }

        // Filters run once, the admitted set is the same for every iteration.
        let mut stats = FilterStatistics::default();
        let mut rejected = Vec::new();
        let mut admitted = Vec::with_capacity(arc.len());
        let mut previous: Option<Epoch> = None;
        for (index, obs) in arc.iter().enumerate() {
            let outcome = filter_observation(&mut self.filters, obs);
            stats.record(&outcome);
            let obs = match outcome {
                FilterOutcome::Accepted(obs) => obs,
                FilterOutcome::Rejected(reason) => {
                    rejected.push((index, reason));
                    continue;
                }
            };

            if let Some(previous) = previous {
                ensure!(
                    obs.epoch >= previous,
                    OutOfOrderObservationSnafu {
                        epoch: obs.epoch,
                        previous
                    }
                );
            }
            previous = Some(obs.epoch);

            ensure!(
                obs.is_consistent(),
                PathCountMismatchSnafu {
                    expected: obs.participant_lists.len(),
                    got: obs.value.len()
                }
            );
            if let Some(val) = obs.value.iter().find(|v| !v.is_finite()) {
                return InvalidMeasurementSnafu {
                    epoch: obs.epoch,
                    val: *val,
                }
                .fail();
            }

            let adapter = self
                .adapters
                .iter()
                .position(|adapter| adapter.handles(obs))
                .context(NoAdapterSnafu {
                    msr_type: obs.msr_type.to_string(),
                    participants: obs.path_string(),
                })?;
            admitted.push(Admitted { index, adapter });
        }

        ensure!(
            !admitted.is_empty(),
            TooFewMeasurementsSnafu {
                need: 1_usize,
                action: "a batch estimation"
            }
        );
        info!("{stats}");

        let apriori = self.config.apriori_information();
        let mut weights = WeightMatrix::default();

        let mut owned_strategy;
        let strategy: &mut dyn EstimationStrategy = match self.strategy.as_mut() {
            Some(strategy) => strategy.as_mut(),
            None => {
                owned_strategy = self.config.solver.strategy();
                owned_strategy.as_mut()
            }
        };
        info!(
            "estimating {} @ {epoch} from {} observations with {}",
            self.config.estimated,
            admitted.len(),
            strategy.name()
        );

        let mut history = ResidualHistory::default();
        let mut estimate = initial;
        let mut covariance = Matrix6::zeros();
        let mut summaries: Vec<IterationSummary> = Vec::new();
        let mut residuals: Vec<ResidualRecord> = Vec::new();

        for iteration in 0.. {
            if self.abort.load(Ordering::Relaxed) {
                warn!("estimation aborted before iteration {iteration}");
                return AbortedSnafu { iteration }.fail();
            }

            if weights.is_stale(admitted.len(), apriori.is_some()) {
                let covariances: Vec<_> = admitted
                    .iter()
                    .map(|a| {
                        let obs = &arc.observations[a.index];
                        self.adapters[a.adapter]
                            .config()
                            .covariance(Some(obs), obs.participant_lists.len())
                    })
                    .collect();
                weights = WeightMatrix::build(&covariances, apriori)?;
            }

            strategy.reset();
            if let Some(info) = weights.apriori() {
                strategy.accumulate_apriori(info, &(initial - estimate));
            }

            let threshold = self
                .config
                .sigma_editing
                .map(|editing| editing.threshold(iteration, history.new_rms));

            let mut reference = ReferenceState::at_estimation_epoch(epoch, estimate);
            let mut sum_weighted_sq = 0.0;
            let mut num_values = 0;
            let (mut num_used, mut num_edited, mut num_infeasible) = (0, 0, 0);
            residuals.clear();

            for (k, admitted_obs) in admitted.iter().enumerate() {
                let obs = &arc.observations[admitted_obs.index];

                Self::transition(&mut self.state, EstimatorState::Propagating);
                reference.advance(obs.epoch, &mut self.propagator)?;

                Self::transition(&mut self.state, EstimatorState::Calculating);
                let adapter = &mut self.adapters[admitted_obs.adapter];
                let mut participants = Participants {
                    registry: &self.registry,
                    estimated: &self.config.estimated,
                    reference: &reference,
                    propagator: &mut self.propagator,
                    ephemerides: &mut self.ephemerides,
                };
                let computed =
                    adapter.calculate_measurement(obs.epoch, Some(obs), &mut participants)?;
                ensure!(
                    computed.value.len() == obs.value.len(),
                    PathCountMismatchSnafu {
                        expected: obs.value.len(),
                        got: computed.value.len()
                    }
                );

                let weight = weights
                    .weight(k)
                    .context(MeasurementNotComputedSnafu)?;
                let sigmas: Vec<f64> = (0..obs.value.len())
                    .map(|i| weight[(i, i)].recip().sqrt())
                    .collect();
                let residual = DVector::from_iterator(
                    obs.value.len(),
                    obs.value.iter().zip(&computed.value).map(|(o, c)| o - c),
                );

                let status = if !computed.feasible {
                    debug!(
                        "{obs} is infeasible: {}",
                        computed.infeasible_reason.as_deref().unwrap_or("unknown reason")
                    );
                    num_infeasible += 1;
                    ResidualStatus::Infeasible
                } else if threshold.is_some_and(|threshold| {
                    residual
                        .iter()
                        .zip(&sigmas)
                        .any(|(r, sigma)| (r / sigma).abs() > threshold)
                }) {
                    debug!("{obs} sigma edited at iteration {iteration}");
                    num_edited += 1;
                    ResidualStatus::SigmaEdited
                } else {
                    Self::transition(&mut self.state, EstimatorState::Accumulating);
                    let h = adapter.calculate_measurement_derivatives()?;
                    ensure!(
                        h.ncols() == 6,
                        DerivativeShapeMismatchSnafu {
                            expected: 6_usize,
                            got: h.ncols()
                        }
                    );
                    strategy.accumulate(&h, &residual, weight);
                    sum_weighted_sq += (residual.transpose() * weight * &residual)[(0, 0)];
                    num_values += residual.len();
                    num_used += 1;
                    ResidualStatus::Used
                };

                for (path, ((observed, computed), sigma)) in obs
                    .value
                    .iter()
                    .zip(&computed.value)
                    .zip(&sigmas)
                    .enumerate()
                {
                    let record = ResidualRecord {
                        iteration,
                        index: admitted_obs.index,
                        epoch: obs.epoch,
                        msr_type: obs.msr_type,
                        path: obs.participant_lists[path].join(" -> "),
                        observed: *observed,
                        computed: if status == ResidualStatus::Infeasible {
                            f64::NAN
                        } else {
                            *computed
                        },
                        residual: if status == ResidualStatus::Infeasible {
                            f64::NAN
                        } else {
                            observed - computed
                        },
                        sigma: *sigma,
                        status,
                    };
                    if let Some(sink) = self.sink.as_mut() {
                        sink.on_measurement(&record);
                    }
                    residuals.push(record);
                }
            }

            ensure!(
                num_values > 0,
                TooFewMeasurementsSnafu {
                    need: 1_usize,
                    action: "accumulating the normal equations"
                }
            );
            let rms = (sum_weighted_sq / num_values as f64).sqrt();

            Self::transition(&mut self.state, EstimatorState::Estimating);
            let state = estimate;
            let correction = match strategy.solve() {
                Some(solved) => {
                    covariance = solved.covariance;
                    Some(solved.dx)
                }
                None => {
                    warn!("[{iteration}] singular information matrix, state left unchanged");
                    None
                }
            };
            let dx = correction.unwrap_or_else(Vector6::zeros);
            estimate += dx;

            Self::transition(&mut self.state, EstimatorState::CheckingRun);
            history.record(rms);
            let (status, reason) = if correction.is_some() {
                history.test_for_convergence(iteration, &self.config)?
            } else {
                history.count_divergence(&self.config)?;
                (
                    EstimationStatus::Diverging,
                    format!(
                        "information matrix is not positive definite, divergence {} of at most {}",
                        history.num_div_iterations, self.config.max_consecutive_divergences
                    ),
                )
            };

            let summary = IterationSummary {
                iteration,
                rms,
                num_used,
                num_edited,
                num_infeasible,
                state,
                correction: dx,
                status,
                reason: reason.clone(),
            };
            info!("{summary}");
            if let Some(sink) = self.sink.as_mut() {
                sink.on_iteration(&summary);
            }
            summaries.push(summary);

            if status.is_final() {
                break;
            }
            // A singular system at the last allowed iteration ends the run as well
            if iteration + 1 >= self.config.max_iterations {
                break;
            }
            Self::transition(&mut self.state, EstimatorState::Iterating);
        }

        Self::transition(&mut self.state, EstimatorState::Finished);

        let last = summaries.last().map(|s| (s.status, s.reason.clone()));
        let (status, reason) = last.unwrap_or((
            EstimationStatus::MaxIterationsDiverged,
            "no iteration".to_string(),
        ));
        let status = if status.is_final() {
            status
        } else {
            EstimationStatus::MaxIterationsDiverged
        };
        if status.is_converged() {
            info!("estimation converged after {} iterations: {reason}", summaries.len());
        } else {
            warn!("estimation did not converge: {reason}");
        }

        let solution = BatchSolution {
            epoch,
            estimated_state: estimate,
            covariance,
            status,
            reason,
            iterations: summaries,
            residuals,
            rejected,
            filter_statistics: stats,
        };
        if let Some(sink) = self.sink.as_mut() {
            sink.on_completion(&solution);
        }
        Ok(solution)
    }
}
