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

use crate::io::{FileCategory, PathResolver};
use crate::linalg::Vector6;
use crate::polyfit::InterpolationError;
use crate::time::{Duration, Epoch};
use bytes::Bytes;
use snafu::prelude::*;
use std::path::{Path, PathBuf};

pub mod cache;
pub mod format;

pub use cache::{EphemerisBlock, EphemerisInterpolationCache, RecordLocation, WINDOW_SIZE};
pub use format::{Code500File, Code500Header, Code500Units, DataRecord, TimeSystemFlag};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EphemerisError {
    #[snafu(display("ephemeris file {name} could not be found"))]
    FileNotFound { name: String },
    #[snafu(display("could not read ephemeris file {}: {source}", path.display()))]
    ReadFailure {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("ephemeris file is {len} bytes long but at least {need} are required"))]
    Truncated { len: usize, need: usize },
    #[snafu(display("unknown time system flag {value}"))]
    BadTimeSystem { value: f64 },
    #[snafu(display("invalid number of data records {value}"))]
    BadRecordCount { value: f64 },
    #[snafu(display("malformed date word {value}"))]
    MalformedDate { value: f64 },
    #[snafu(display("malformed seconds of day {value}"))]
    MalformedSeconds { value: f64 },
    #[snafu(display("data record {record} is malformed: {reason}"))]
    MalformedRecord { record: usize, reason: String },
    #[snafu(display("{epoch} is outside of the ephemeris span [{start}, {end}]"))]
    EpochOutsideSpan {
        epoch: Epoch,
        start: Epoch,
        end: Epoch,
    },
    #[snafu(display("interpolation requires {need} points but only {got} available"))]
    InsufficientPoints { need: usize, got: usize },
    #[snafu(display("interpolation failed: {source}"))]
    Interpolation { source: InterpolationError },
    #[snafu(display("ephemeris propagator must be initialized before stepping"))]
    NotInitialized,
}

/// Propagates a spacecraft by interpolating its Code 500 ephemeris.
#[derive(Clone, Debug)]
pub struct Code500Propagator {
    file_name: String,
    cache: EphemerisInterpolationCache,
    epoch: Option<Epoch>,
    state: Vector6<f64>,
}

impl Code500Propagator {
    /// Loads the ephemeris file named `name`, resolved in the ephemeris search directories.
    pub fn from_resolver(
        name: &str,
        resolver: &dyn PathResolver,
        units: Code500Units,
    ) -> Result<Self, EphemerisError> {
        let path = resolver
            .find_path(name, FileCategory::Ephemeris)
            .context(FileNotFoundSnafu { name })?;
        let mut me = Self::from_path(&path, units)?;
        me.file_name = name.to_string();
        Ok(me)
    }

    pub fn from_path<P: AsRef<Path>>(path: P, units: Code500Units) -> Result<Self, EphemerisError> {
        let path = path.as_ref();
        let data = std::fs::read(path).context(ReadFailureSnafu { path })?;
        let file = Code500File::parse(Bytes::from(data))?;
        info!(
            "Loaded Code 500 ephemeris {} ({} records)",
            path.display(),
            file.records.len()
        );
        let cache = EphemerisInterpolationCache::from_file(&file, units)?;
        Ok(Self::from_cache(path.display().to_string(), cache))
    }

    pub fn from_cache(file_name: String, cache: EphemerisInterpolationCache) -> Self {
        Self {
            file_name,
            cache,
            epoch: None,
            state: Vector6::zeros(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The ephemeris file is read only once loaded: renaming it is accepted and ignored.
    pub fn set_ephemeris_file(&mut self, name: &str) -> bool {
        if name != self.file_name {
            debug!(
                "ignoring new ephemeris file {name}, {} is already loaded",
                self.file_name
            );
        }
        true
    }

    /// Start and end epochs of the ephemeris.
    pub fn span(&self) -> (Epoch, Epoch) {
        (self.cache.start_epoch(), self.cache.end_epoch())
    }

    pub fn cache(&self) -> &EphemerisInterpolationCache {
        &self.cache
    }

    pub fn initialize(&mut self, epoch: Epoch) -> Result<Vector6<f64>, EphemerisError> {
        self.state = self.cache.interpolate(epoch)?;
        self.epoch = Some(epoch);
        Ok(self.state)
    }

    pub fn step(&mut self, dt: Duration) -> Result<Vector6<f64>, EphemerisError> {
        let epoch = self.epoch.context(NotInitializedSnafu)? + dt;
        self.initialize(epoch)
    }

    /// Interpolated state at the provided epoch, without moving the current epoch.
    pub fn state_at(&mut self, epoch: Epoch) -> Result<Vector6<f64>, EphemerisError> {
        self.cache.interpolate(epoch)
    }

    pub fn epoch(&self) -> Option<Epoch> {
        self.epoch
    }

    pub fn state(&self) -> Vector6<f64> {
        self.state
    }
}
