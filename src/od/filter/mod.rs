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

use super::msr::ObservationRecord;
use super::registry::MasterLists;
use crate::io::{parse_epoch, ConfigError};
use crate::time::Epoch;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod accept;
pub mod reject;

pub use accept::{AcceptFilterConfig, StatisticAcceptFilter, Thinning};
pub use reject::{RejectFilterConfig, StatisticRejectFilter};

/// Keyword selecting every name in a filter selection.
pub const ALL: &str = "All";

/// Why an observation was not admitted, with its numeric code.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RejectReason {
    Thinned,
    OutsideTimeWindow,
    RejectFilter,
    Tracker,
    ObservedObject,
    DataType,
    EmptyFileList,
    TrackingConfig,
}

impl RejectReason {
    pub fn code(self) -> u32 {
        match self {
            Self::Thinned => 1,
            Self::OutsideTimeWindow => 2,
            Self::RejectFilter => 3,
            Self::Tracker => 5,
            Self::ObservedObject => 6,
            Self::DataType => 7,
            Self::EmptyFileList => 8,
            Self::TrackingConfig => 9,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            Self::Thinned => "thinned",
            Self::OutsideTimeWindow => "outside of the time window",
            Self::RejectFilter => "matched by a reject filter",
            Self::Tracker => "tracker not selected",
            Self::ObservedObject => "observed object not selected",
            Self::DataType => "data type not selected",
            Self::EmptyFileList => "empty file list",
            Self::TrackingConfig => "tracking configuration not selected",
        };
        write!(f, "{msg} ({})", self.code())
    }
}

/// Result of a filter: the very same observation when admitted.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FilterOutcome<'a> {
    Accepted(&'a ObservationRecord),
    Rejected(RejectReason),
}

impl FilterOutcome<'_> {
    /// Zero on acceptance, else the rejection code.
    pub fn code(&self) -> u32 {
        match self {
            Self::Accepted(_) => 0,
            Self::Rejected(reason) => reason.code(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// A stage of the tracking data admission pipeline.
pub trait DataFilter {
    fn name(&self) -> &str;

    fn filtering_data<'a>(&mut self, obs: &'a ObservationRecord) -> FilterOutcome<'a>;
}

/// Runs the observation through each filter in order, stopping at the first rejection.
pub fn filter_observation<'a>(
    filters: &mut [Box<dyn DataFilter>],
    obs: &'a ObservationRecord,
) -> FilterOutcome<'a> {
    for filter in filters.iter_mut() {
        if let FilterOutcome::Rejected(reason) = filter.filtering_data(obs) {
            debug!("{} rejected {obs}: {reason}", filter.name());
            return FilterOutcome::Rejected(reason);
        }
    }
    FilterOutcome::Accepted(obs)
}

/// Number of observations per outcome code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterStatistics {
    pub accepted: usize,
    pub rejected: BTreeMap<RejectReason, usize>,
}

impl FilterStatistics {
    pub fn record(&mut self, outcome: &FilterOutcome<'_>) {
        match outcome {
            FilterOutcome::Accepted(_) => self.accepted += 1,
            FilterOutcome::Rejected(reason) => *self.rejected.entry(*reason).or_default() += 1,
        }
    }

    pub fn total_rejected(&self) -> usize {
        self.rejected.values().sum()
    }
}

impl fmt::Display for FilterStatistics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} accepted", self.accepted)?;
        for (reason, count) in &self.rejected {
            write!(f, ", {count} {reason}")?;
        }
        Ok(())
    }
}

/// Names selected by a filter, where `All` matches anything.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Selection {
    all: bool,
    names: Vec<String>,
}

impl Selection {
    /// Checks every name against the provided master list.
    pub(crate) fn new(
        field: &str,
        names: &[String],
        known: &[&[String]],
    ) -> Result<Self, ConfigError> {
        let all = names.iter().any(|name| name == ALL);
        if !all {
            if let Some(unknown) = names
                .iter()
                .find(|name| !known.iter().any(|list| list.contains(name)))
            {
                return Err(ConfigError::InvalidConfig {
                    msg: format!("{field} `{unknown}` is not a known object"),
                });
            }
        }
        Ok(Self {
            all,
            names: names.to_vec(),
        })
    }

    pub(crate) fn unchecked(names: &[String]) -> Self {
        Self {
            all: names.iter().any(|name| name == ALL),
            names: names.to_vec(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub(crate) fn matches(&self, name: &str) -> bool {
        self.all || self.names.iter().any(|n| n == name)
    }
}

/// Selections shared by the accept and reject filters.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Selections {
    pub(crate) files: Selection,
    pub(crate) observed: Selection,
    pub(crate) trackers: Selection,
    pub(crate) data_types: Selection,
    pub(crate) start: Option<Epoch>,
    pub(crate) end: Option<Epoch>,
}

impl Selections {
    pub(crate) fn new(
        file_names: &[String],
        observed_objects: &[String],
        trackers: &[String],
        data_types: &[String],
        epoch_start: Option<&str>,
        epoch_end: Option<&str>,
        master: &MasterLists,
    ) -> Result<Self, ConfigError> {
        let start = epoch_start.map(parse_epoch).transpose()?;
        let end = epoch_end.map(parse_epoch).transpose()?;
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                return Err(ConfigError::InvalidConfig {
                    msg: format!("epoch window ends at {end}, before its start {start}"),
                });
            }
        }

        Ok(Self {
            files: Selection::unchecked(file_names),
            observed: Selection::new("observed object", observed_objects, &[&master.spacecraft])?,
            trackers: Selection::new(
                "tracker",
                trackers,
                &[&master.ground_stations, &master.spacecraft],
            )?,
            data_types: Selection::new("data type", data_types, &[&master.measurement_types])?,
            start,
            end,
        })
    }

    /// Whether the filter applies to observations from this file.
    pub(crate) fn applies_to(&self, obs: &ObservationRecord) -> bool {
        self.files.matches(&obs.source)
    }

    pub(crate) fn observed_matches(&self, obs: &ObservationRecord) -> bool {
        obs.observed().any(|name| self.observed.matches(name))
    }

    pub(crate) fn tracker_matches(&self, obs: &ObservationRecord) -> bool {
        obs.tracker().is_some_and(|name| self.trackers.matches(name))
    }

    pub(crate) fn data_type_matches(&self, obs: &ObservationRecord) -> bool {
        self.data_types.matches(&obs.type_name)
            || self.data_types.matches(&obs.msr_type.to_string())
    }

    pub(crate) fn in_window(&self, epoch: Epoch) -> bool {
        self.start.map_or(true, |start| epoch >= start) && self.end.map_or(true, |end| epoch <= end)
    }
}

pub(crate) fn all() -> Vec<String> {
    vec![ALL.to_string()]
}
