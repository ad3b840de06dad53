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

use super::{MeasurementType, ObservationRecord};
use core::fmt;
use hifitime::prelude::{Duration, Epoch};
use indexmap::IndexSet;
use serde_derive::{Deserialize, Serialize};
use std::ops::RangeBounds;

mod io_gmd;

/// A measurement type and the participant lists producing it.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub msr_type: MeasurementType,
    pub participants: Vec<Vec<String>>,
}

impl TrackingConfig {
    pub fn of(obs: &ObservationRecord) -> Self {
        Self {
            msr_type: obs.msr_type,
            participants: obs.participant_lists.clone(),
        }
    }
}

impl fmt::Display for TrackingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths: Vec<String> = self
            .participants
            .iter()
            .map(|list| list.join(" -> "))
            .collect();
        write!(f, "{}: {}", self.msr_type, paths.join("; "))
    }
}

/// Tracking data as a list of observations sorted by epoch.
/// Several observations may share an epoch, their relative order is preserved.
#[derive(Clone, Default, PartialEq)]
pub struct TrackingDataArc {
    pub observations: Vec<ObservationRecord>,
    /// Source file if loaded from a file or saved to a file.
    pub source: Option<String>,
}

impl TrackingDataArc {
    pub fn new(mut observations: Vec<ObservationRecord>) -> Self {
        observations.sort_by(|a, b| a.epoch.cmp(&b.epoch));
        Self {
            observations,
            source: None,
        }
    }

    /// Returns the unique trackers in this tracking data arc
    pub fn unique_trackers(&self) -> IndexSet<String> {
        self.observations
            .iter()
            .filter_map(|obs| obs.tracker().map(str::to_string))
            .collect()
    }

    /// Returns the unique measurement types in this tracking data arc
    pub fn unique_types(&self) -> IndexSet<MeasurementType> {
        self.observations.iter().map(|obs| obs.msr_type).collect()
    }

    /// Returns the tracking configurations found in this arc, in order of first appearance.
    pub fn tracking_configs(&self) -> IndexSet<TrackingConfig> {
        self.observations.iter().map(TrackingConfig::of).collect()
    }

    /// Returns the start epoch of this tracking arc
    pub fn start_epoch(&self) -> Option<Epoch> {
        self.observations.first().map(|obs| obs.epoch)
    }

    /// Returns the end epoch of this tracking arc
    pub fn end_epoch(&self) -> Option<Epoch> {
        self.observations.last().map(|obs| obs.epoch)
    }

    pub fn duration(&self) -> Option<Duration> {
        Some(self.end_epoch()? - self.start_epoch()?)
    }

    /// Returns the number of observations in this data arc
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Returns whether this arc has no observations.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ObservationRecord> {
        self.observations.iter()
    }

    /// Returns a new tracking arc with only the observations within the given epoch range.
    pub fn filter_by_epoch<R: RangeBounds<Epoch>>(mut self, bound: R) -> Self {
        self.observations.retain(|obs| bound.contains(&obs.epoch));
        self
    }

    /// Returns a new tracking arc that only contains observations from the desired tracker.
    pub fn filter_by_tracker(mut self, tracker: &str) -> Self {
        self.observations.retain(|obs| obs.tracker() == Some(tracker));
        self
    }
}

impl fmt::Display for TrackingDataArc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start_epoch(), self.end_epoch()) {
            (Some(start), Some(end)) => {
                let src = match &self.source {
                    Some(src) => format!(" (source: {src})"),
                    None => String::new(),
                };
                write!(
                    f,
                    "Tracking arc with {} observations of type {:?} over {} \
                    (from {start} to {end}) with trackers {:?}{src}",
                    self.len(),
                    self.unique_types(),
                    end - start,
                    self.unique_trackers()
                )
            }
            _ => write!(f, "Empty tracking arc"),
        }
    }
}

impl fmt::Debug for TrackingDataArc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self} @ {self:p}")
    }
}
