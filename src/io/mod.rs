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

use crate::time::Epoch;
use crate::utils::epoch_from_a1_mjd;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Write-only sinks receiving measurement residuals and convergence summaries.
pub mod report;

pub use report::{CsvReport, MemoryReport, ReportSink};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("failed to read configuration file: {source}"))]
    ReadError { source: io::Error },

    #[snafu(display("failed to parse YAML configuration file: {source}"))]
    ParseError { source: serde_yaml::Error },

    #[snafu(display("invalid configuration: {msg}"))]
    InvalidConfig { msg: String },
}

impl PartialEq for ConfigError {
    /// No two configuration errors match
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InputOutputError {
    #[snafu(display("{action} encountered i/o error: {source}"))]
    StdIOError {
        source: io::Error,
        action: &'static str,
    },
    #[snafu(display("line {line_no} of {action}: {reason}"))]
    ParseLine {
        line_no: usize,
        action: &'static str,
        reason: String,
    },
    #[snafu(display("{action} encountered CSV error: {source}"))]
    CsvError {
        source: csv::Error,
        action: &'static str,
    },
    #[snafu(display("could not find {name} as {category:?}"))]
    FileNotFound { name: String, category: FileCategory },
}

pub trait ConfigRepr: Debug + Sized + Serialize + DeserializeOwned {
    /// Builds the configuration representation from the path to a yaml
    fn load<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path).context(ReadSnafu)?;
        let reader = BufReader::new(file);

        serde_yaml::from_reader(reader).context(ParseSnafu)
    }

    /// Builds a sequence of "Selves" from the provided path to a yaml
    fn load_many<P>(path: P) -> Result<Vec<Self>, ConfigError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path).context(ReadSnafu)?;
        let reader = BufReader::new(file);

        serde_yaml::from_reader(reader).context(ParseSnafu)
    }

    /// Builds a map of names to "selves" from the provided path to a yaml
    fn load_named<P>(path: P) -> Result<BTreeMap<String, Self>, ConfigError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path).context(ReadSnafu)?;
        let reader = BufReader::new(file);

        serde_yaml::from_reader(reader).context(ParseSnafu)
    }

    /// Builds "Self" from the provided string of a yaml
    fn loads(data: &str) -> Result<Self, ConfigError> {
        debug!("Loading YAML:\n{data}");
        serde_yaml::from_str(data).context(ParseSnafu)
    }

    /// Builds a sequence of "Selves" from the provided string of a yaml
    fn loads_many(data: &str) -> Result<Vec<Self>, ConfigError> {
        debug!("Loading YAML:\n{data}");
        serde_yaml::from_str(data).context(ParseSnafu)
    }
}

/// Parses an epoch either from any of the hifitime formats (e.g. `2020-01-01T00:00:00 UTC`)
/// or from an A.1 modified Julian date given as a plain number (e.g. `28848.5`).
pub fn parse_epoch(repr: &str) -> Result<Epoch, ConfigError> {
    let repr = repr.trim();
    if let Ok(a1_mjd) = repr.parse::<f64>() {
        return epoch_from_a1_mjd(a1_mjd).ok_or_else(|| ConfigError::InvalidConfig {
            msg: format!("A.1 modified Julian date `{repr}` is not a valid epoch"),
        });
    }
    Epoch::from_str(repr).map_err(|e| ConfigError::InvalidConfig {
        msg: format!("malformed epoch `{repr}`: {e}"),
    })
}

pub(crate) fn epoch_to_str<S>(epoch: &Epoch, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{epoch}"))
}

/// A deserializer from Epoch string
pub(crate) fn epoch_from_str<'de, D>(deserializer: D) -> Result<Epoch, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_epoch(&s).map_err(serde::de::Error::custom)
}

/// Category of a logical file name, used to pick the search directories.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FileCategory {
    Ephemeris,
    TrackingData,
    Configuration,
}

/// Resolves logical file names into paths on the file system.
pub trait PathResolver {
    /// Returns the absolute path of the provided logical name, or None if it cannot be found.
    fn find_path(&self, name: &str, category: FileCategory) -> Option<PathBuf>;
}

/// Path resolver searching a list of directories per file category, in order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchPaths {
    pub directories: BTreeMap<FileCategory, Vec<PathBuf>>,
}

impl SearchPaths {
    /// Returns a copy of these search paths with the provided directory appended to the category.
    pub fn with_directory<P: AsRef<Path>>(mut self, category: FileCategory, dir: P) -> Self {
        self.directories
            .entry(category)
            .or_default()
            .push(dir.as_ref().to_path_buf());
        self
    }
}

impl ConfigRepr for SearchPaths {}

impl PathResolver for SearchPaths {
    fn find_path(&self, name: &str, category: FileCategory) -> Option<PathBuf> {
        let as_path = Path::new(name);
        if as_path.is_absolute() {
            return as_path.exists().then(|| as_path.to_path_buf());
        }

        let found = self
            .directories
            .get(&category)
            .into_iter()
            .flatten()
            .map(|dir| dir.join(as_path))
            .find(|candidate| candidate.exists())
            .and_then(|candidate| candidate.canonicalize().ok());

        if found.is_none() {
            debug!("{name} not found in any {category:?} directory");
        }
        found
    }
}
