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

use super::convergence::EstimationStatus;
use crate::linalg::{Matrix6, Vector6};
use crate::od::filter::{FilterStatistics, RejectReason};
use crate::od::msr::{MeasurementType, TrackingDataArc};
use crate::time::Epoch;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// How an observation was used during an iteration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResidualStatus {
    Used,
    SigmaEdited,
    Infeasible,
}

impl fmt::Display for ResidualStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Used => write!(f, "used"),
            Self::SigmaEdited => write!(f, "sigma edited"),
            Self::Infeasible => write!(f, "infeasible"),
        }
    }
}

/// Residual of one measurement value (one signal path of an observation).
#[derive(Clone, Debug, PartialEq)]
pub struct ResidualRecord {
    pub iteration: usize,
    /// Index of the observation in the tracking arc
    pub index: usize,
    pub epoch: Epoch,
    pub msr_type: MeasurementType,
    pub path: String,
    pub observed: f64,
    /// NaN when the measurement is infeasible
    pub computed: f64,
    pub residual: f64,
    pub sigma: f64,
    pub status: ResidualStatus,
}

impl ResidualRecord {
    /// Residual divided by its noise sigma.
    pub fn normalized(&self) -> f64 {
        self.residual / self.sigma
    }
}

impl fmt::Display for ResidualRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {}: O-C = {:.6e} {} ({})",
            self.iteration,
            self.epoch,
            self.msr_type,
            self.path,
            self.residual,
            self.msr_type.unit(),
            self.status
        )
    }
}

/// Summary of one estimator iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct IterationSummary {
    pub iteration: usize,
    /// RMS of the weighted residuals of the used observations
    pub rms: f64,
    pub num_used: usize,
    pub num_edited: usize,
    pub num_infeasible: usize,
    /// State before applying the correction
    pub state: Vector6<f64>,
    pub correction: Vector6<f64>,
    pub status: EstimationStatus,
    pub reason: String,
}

impl fmt::Display for IterationSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}] RMS: {:.6e} ({} used, {} edited, {} infeasible); dx: {:.3} m\t{:.3} m/s; {}",
            self.iteration,
            self.rms,
            self.num_used,
            self.num_edited,
            self.num_infeasible,
            self.correction.fixed_rows::<3>(0).norm() * 1e3,
            self.correction.fixed_rows::<3>(3).norm() * 1e3,
            self.status
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchSolution {
    pub epoch: Epoch,
    pub estimated_state: Vector6<f64>,
    /// Covariance of the last successful solve, zero if none succeeded
    pub covariance: Matrix6<f64>,
    pub status: EstimationStatus,
    pub reason: String,
    pub iterations: Vec<IterationSummary>,
    /// Residuals of the last iteration
    pub residuals: Vec<ResidualRecord>,
    /// Observations removed by the data filters, by arc index
    pub rejected: Vec<(usize, RejectReason)>,
    pub filter_statistics: FilterStatistics,
}

impl BatchSolution {
    pub fn converged(&self) -> bool {
        self.status.is_converged()
    }

    pub fn num_iterations(&self) -> usize {
        self.iterations.len()
    }

    pub fn final_rms(&self) -> Option<f64> {
        self.iterations.last().map(|it| it.rms)
    }

    /// One sigma of each state component.
    pub fn sigmas(&self) -> Vector6<f64> {
        self.covariance.diagonal().map(|v| v.max(0.0).sqrt())
    }

    /// Arc indexes of the observations edited during the last iteration.
    pub fn edited(&self) -> Vec<usize> {
        let mut edited: Vec<usize> = self
            .residuals
            .iter()
            .filter(|r| r.status == ResidualStatus::SigmaEdited)
            .map(|r| r.index)
            .collect();
        edited.dedup();
        edited
    }

    /// Marks the observations removed by the filters as unused in the arc they came from.
    pub fn apply_rejections(&self, arc: &mut TrackingDataArc) {
        for (index, reason) in &self.rejected {
            if let Some(obs) = arc.observations.get_mut(*index) {
                obs.reject(*reason);
            }
        }
    }
}

impl fmt::Display for BatchSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Status: {} ({})", self.status, self.reason)?;
        writeln!(f, "Iterations: {}", self.num_iterations())?;
        if let Some(rms) = self.final_rms() {
            writeln!(f, "Final RMS: {rms:.6e}")?;
        }
        writeln!(f, "Filters: {}", self.filter_statistics)?;
        writeln!(f, "Estimate @ {}: {:.9}", self.epoch, self.estimated_state.transpose())?;
        write!(f, "Covariance:\n{:.3e}", self.covariance)
    }
}
