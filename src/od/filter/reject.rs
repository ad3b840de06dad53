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

use super::{all, DataFilter, FilterOutcome, RejectReason, Selections};
use crate::io::{ConfigError, ConfigRepr};
use crate::od::msr::ObservationRecord;
use crate::od::registry::MasterLists;
use serde_derive::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct RejectFilterConfig {
    #[builder(default = "RejectFilter".to_string(), setter(into))]
    pub name: String,
    #[builder(default = all())]
    #[serde(default = "all")]
    pub file_names: Vec<String>,
    #[builder(default = all())]
    #[serde(default = "all")]
    pub observed_objects: Vec<String>,
    #[builder(default = all())]
    #[serde(default = "all")]
    pub trackers: Vec<String>,
    #[builder(default = all())]
    #[serde(default = "all")]
    pub data_types: Vec<String>,
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    pub epoch_start: Option<String>,
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    pub epoch_end: Option<String>,
}

impl ConfigRepr for RejectFilterConfig {}

/// Removes the observations matching every selection and falling in the epoch window.
#[derive(Clone, Debug, PartialEq)]
pub struct StatisticRejectFilter {
    name: String,
    selections: Selections,
}

impl StatisticRejectFilter {
    pub fn new(config: RejectFilterConfig, master: &MasterLists) -> Result<Self, ConfigError> {
        Ok(Self {
            selections: Selections::new(
                &config.file_names,
                &config.observed_objects,
                &config.trackers,
                &config.data_types,
                config.epoch_start.as_deref(),
                config.epoch_end.as_deref(),
                master,
            )?,
            name: config.name,
        })
    }
}

impl DataFilter for StatisticRejectFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn filtering_data<'a>(&mut self, obs: &'a ObservationRecord) -> FilterOutcome<'a> {
        if self.selections.files.is_empty() {
            return FilterOutcome::Rejected(RejectReason::EmptyFileList);
        }

        let s = &self.selections;
        if s.applies_to(obs)
            && s.observed_matches(obs)
            && s.tracker_matches(obs)
            && s.data_type_matches(obs)
            && s.in_window(obs.epoch)
        {
            FilterOutcome::Rejected(RejectReason::RejectFilter)
        } else {
            FilterOutcome::Accepted(obs)
        }
    }
}
