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

use super::{CsvSnafu, InputOutputError};
use crate::od::blse::{BatchSolution, IterationSummary, ResidualRecord};
use serde_derive::Serialize;
use snafu::ResultExt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Receives what the estimator computes. Nothing flows back into the estimation.
pub trait ReportSink {
    fn on_measurement(&mut self, record: &ResidualRecord);

    fn on_iteration(&mut self, _summary: &IterationSummary) {}

    fn on_completion(&mut self, _solution: &BatchSolution) {}
}

/// Keeps everything in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryReport {
    pub measurements: Vec<ResidualRecord>,
    pub iterations: Vec<IterationSummary>,
    pub completed: Option<BatchSolution>,
}

impl ReportSink for MemoryReport {
    fn on_measurement(&mut self, record: &ResidualRecord) {
        self.measurements.push(record.clone());
    }

    fn on_iteration(&mut self, summary: &IterationSummary) {
        self.iterations.push(summary.clone());
    }

    fn on_completion(&mut self, solution: &BatchSolution) {
        self.completed = Some(solution.clone());
    }
}

#[derive(Serialize)]
struct ResidualRow<'a> {
    iteration: usize,
    epoch: String,
    msr_type: String,
    path: &'a str,
    observed: f64,
    computed: f64,
    residual: f64,
    sigma: f64,
    status: String,
}

/// Writes one CSV row per residual. Write failures are logged and otherwise ignored.
pub struct CsvReport<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl CsvReport<File> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, InputOutputError> {
        let writer = csv::Writer::from_path(path).context(CsvSnafu {
            action: "creating residual report",
        })?;
        Ok(Self { writer, rows: 0 })
    }
}

impl<W: Write> CsvReport<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
            rows: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(self) -> Result<W, InputOutputError> {
        self.writer.into_inner().map_err(|e| InputOutputError::StdIOError {
            source: e.into_error(),
            action: "flushing residual report",
        })
    }
}

impl<W: Write> ReportSink for CsvReport<W> {
    fn on_measurement(&mut self, record: &ResidualRecord) {
        let row = ResidualRow {
            iteration: record.iteration,
            epoch: record.epoch.to_string(),
            msr_type: record.msr_type.to_string(),
            path: &record.path,
            observed: record.observed,
            computed: record.computed,
            residual: record.residual,
            sigma: record.sigma,
            status: record.status.to_string(),
        };
        match self.writer.serialize(row) {
            Ok(()) => self.rows += 1,
            Err(e) => warn!("could not write residual {record}: {e}"),
        }
    }

    fn on_completion(&mut self, _solution: &BatchSolution) {
        if let Err(e) = self.writer.flush() {
            warn!("could not flush residual report: {e}");
        }
    }
}
