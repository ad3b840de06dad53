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
use crate::od::msr::{ObservationRecord, TrackingConfig};
use crate::od::registry::MasterLists;
use crate::time::{Epoch, Unit};
use serde_derive::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Keeps one observation out of several.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Thinning {
    /// Accept every Nth observation reaching this check
    Frequency(u32),
    /// Accept an observation when at least this many seconds elapsed since the last accepted one
    TimeInterval(f64),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct AcceptFilterConfig {
    #[builder(default = "AcceptFilter".to_string(), setter(into))]
    pub name: String,
    /// Files this filter applies to
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
    /// Only admit these tracking configurations
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub tracking_configs: Option<Vec<TrackingConfig>>,
    /// Gregorian epoch or A.1 modified Julian date
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    pub epoch_start: Option<String>,
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    pub epoch_end: Option<String>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub thinning: Option<Thinning>,
}

impl ConfigRepr for AcceptFilterConfig {}

/// Admits the observations matching every selection.
#[derive(Clone, Debug, PartialEq)]
pub struct StatisticAcceptFilter {
    name: String,
    selections: Selections,
    tracking_configs: Option<Vec<TrackingConfig>>,
    thinning: Option<Thinning>,
    counter: u32,
    last_accepted: Option<Epoch>,
}

impl StatisticAcceptFilter {
    pub fn new(config: AcceptFilterConfig, master: &MasterLists) -> Result<Self, ConfigError> {
        let selections = Selections::new(
            &config.file_names,
            &config.observed_objects,
            &config.trackers,
            &config.data_types,
            config.epoch_start.as_deref(),
            config.epoch_end.as_deref(),
            master,
        )?;

        match config.thinning {
            Some(Thinning::Frequency(0)) => {
                return Err(ConfigError::InvalidConfig {
                    msg: "thinning frequency must be at least 1".to_string(),
                })
            }
            Some(Thinning::TimeInterval(seconds)) if !(seconds >= 0.0) => {
                return Err(ConfigError::InvalidConfig {
                    msg: format!("thinning interval must be non negative, got {seconds}"),
                })
            }
            _ => {}
        }

        Ok(Self {
            name: config.name,
            selections,
            tracking_configs: config.tracking_configs,
            thinning: config.thinning,
            counter: 0,
            last_accepted: None,
        })
    }

    fn thin(&mut self, obs: &ObservationRecord) -> bool {
        match self.thinning {
            None => true,
            Some(Thinning::Frequency(n)) => {
                self.counter += 1;
                if self.counter >= n {
                    self.counter = 0;
                    true
                } else {
                    false
                }
            }
            Some(Thinning::TimeInterval(seconds)) => {
                let due = self
                    .last_accepted
                    .map_or(true, |last| obs.epoch - last >= Unit::Second * seconds);
                if due {
                    self.last_accepted = Some(obs.epoch);
                }
                due
            }
        }
    }
}

impl DataFilter for StatisticAcceptFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn filtering_data<'a>(&mut self, obs: &'a ObservationRecord) -> FilterOutcome<'a> {
        if self.selections.files.is_empty() {
            return FilterOutcome::Rejected(RejectReason::EmptyFileList);
        }
        if !self.selections.applies_to(obs) {
            return FilterOutcome::Accepted(obs);
        }

        if let Some(configs) = &self.tracking_configs {
            if !configs.contains(&TrackingConfig::of(obs)) {
                return FilterOutcome::Rejected(RejectReason::TrackingConfig);
            }
        }

        if !self.selections.observed_matches(obs) {
            FilterOutcome::Rejected(RejectReason::ObservedObject)
        } else if !self.selections.tracker_matches(obs) {
            FilterOutcome::Rejected(RejectReason::Tracker)
        } else if !self.selections.data_type_matches(obs) {
            FilterOutcome::Rejected(RejectReason::DataType)
        } else if !self.selections.in_window(obs.epoch) {
            FilterOutcome::Rejected(RejectReason::OutsideTimeWindow)
        } else if !self.thin(obs) {
            FilterOutcome::Rejected(RejectReason::Thinned)
        } else {
            FilterOutcome::Accepted(obs)
        }
    }
}

#[cfg(test)]
mod ut_accept {
    use super::*;
    use crate::od::msr::MeasurementType;
    use crate::time::TimeUnits;

    fn master() -> MasterLists {
        MasterLists {
            spacecraft: vec!["SC1".to_string(), "SC2".to_string()],
            ground_stations: vec!["GS1".to_string(), "GS2".to_string()],
            measurement_types: vec!["Range".to_string(), "RangeRate".to_string()],
        }
    }

    fn t0() -> Epoch {
        Epoch::from_gregorian_utc_at_midnight(2020, 1, 1)
    }

    fn obs(tracker: &str, sc: &str, msr_type: MeasurementType, minutes: i64) -> ObservationRecord {
        ObservationRecord::new(msr_type, t0() + minutes.minutes(), &[tracker, sc], 1.0)
            .with_source("track.gmd")
    }

    #[test]
    fn reason_codes() {
        let config = AcceptFilterConfig::builder()
            .observed_objects(vec!["SC1".to_string()])
            .trackers(vec!["GS1".to_string()])
            .data_types(vec!["Range".to_string()])
            .epoch_start("2020-01-01T00:00:00 UTC")
            .epoch_end("2020-01-01T01:00:00 UTC")
            .build();
        let mut filter = StatisticAcceptFilter::new(config, &master()).unwrap();

        let cases = [
            (obs("GS1", "SC1", MeasurementType::Range, 10), 0),
            (obs("GS1", "SC2", MeasurementType::Range, 10), 6),
            (obs("GS2", "SC1", MeasurementType::Range, 10), 5),
            (obs("GS1", "SC1", MeasurementType::RangeRate, 10), 7),
            (obs("GS1", "SC1", MeasurementType::Range, 61), 2),
            // Several failures: the first check wins
            (obs("GS2", "SC2", MeasurementType::RangeRate, 61), 6),
        ];
        for (obs, code) in &cases {
            // Repeated calls are deterministic
            for _ in 0..3 {
                assert_eq!(filter.filtering_data(obs).code(), *code, "{obs}");
            }
        }
    }

    #[test]
    fn identity_preserved() {
        let mut filter =
            StatisticAcceptFilter::new(AcceptFilterConfig::builder().build(), &master()).unwrap();
        let record = obs("GS1", "SC1", MeasurementType::Range, 0);
        match filter.filtering_data(&record) {
            FilterOutcome::Accepted(same) => assert!(std::ptr::eq(same, &record)),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn thinning_frequency() {
        let config = AcceptFilterConfig::builder()
            .thinning(Thinning::Frequency(3))
            .build();
        let mut filter = StatisticAcceptFilter::new(config, &master()).unwrap();
        let accepted: Vec<i64> = (1..=9)
            .filter(|i| {
                filter
                    .filtering_data(&obs("GS1", "SC1", MeasurementType::Range, *i))
                    .is_accepted()
            })
            .collect();
        assert_eq!(accepted, vec![3, 6, 9]);
    }

    #[test]
    fn thinning_only_counts_reached_checks() {
        let config = AcceptFilterConfig::builder()
            .trackers(vec!["GS1".to_string()])
            .thinning(Thinning::Frequency(2))
            .build();
        let mut filter = StatisticAcceptFilter::new(config, &master()).unwrap();
        let codes: Vec<u32> = [
            obs("GS1", "SC1", MeasurementType::Range, 1),
            obs("GS2", "SC1", MeasurementType::Range, 2),
            obs("GS1", "SC1", MeasurementType::Range, 3),
        ]
        .iter()
        .map(|o| filter.filtering_data(o).code())
        .collect();
        assert_eq!(codes, vec![1, 5, 0]);
    }

    #[test]
    fn thinning_interval() {
        let config = AcceptFilterConfig::builder()
            .thinning(Thinning::TimeInterval(150.0))
            .build();
        let mut filter = StatisticAcceptFilter::new(config, &master()).unwrap();
        let accepted: Vec<i64> = (0..8)
            .filter(|i| {
                filter
                    .filtering_data(&obs("GS1", "SC1", MeasurementType::Range, *i))
                    .is_accepted()
            })
            .collect();
        assert_eq!(accepted, vec![0, 3, 6]);
    }

    #[test]
    fn file_selection() {
        let config = AcceptFilterConfig::builder()
            .file_names(vec!["other.gmd".to_string()])
            .trackers(vec!["GS2".to_string()])
            .build();
        let mut filter = StatisticAcceptFilter::new(config, &master()).unwrap();
        // Not from a selected file: untouched
        assert_eq!(
            filter
                .filtering_data(&obs("GS1", "SC1", MeasurementType::Range, 0))
                .code(),
            0
        );

        let config = AcceptFilterConfig::builder().file_names(vec![]).build();
        let mut filter = StatisticAcceptFilter::new(config, &master()).unwrap();
        assert_eq!(
            filter
                .filtering_data(&obs("GS1", "SC1", MeasurementType::Range, 0))
                .code(),
            8
        );
    }

    #[test]
    fn tracking_configs() {
        let config = AcceptFilterConfig::builder()
            .tracking_configs(vec![TrackingConfig {
                msr_type: MeasurementType::Range,
                participants: vec![vec!["GS1".to_string(), "SC1".to_string()]],
            }])
            .build();
        let mut filter = StatisticAcceptFilter::new(config, &master()).unwrap();
        assert!(filter
            .filtering_data(&obs("GS1", "SC1", MeasurementType::Range, 0))
            .is_accepted());
        assert_eq!(
            filter
                .filtering_data(&obs("GS2", "SC1", MeasurementType::Range, 0))
                .code(),
            9
        );
    }

    #[test]
    fn validation() {
        let unknown = AcceptFilterConfig::builder()
            .trackers(vec!["Goldstone".to_string()])
            .build();
        assert!(matches!(
            StatisticAcceptFilter::new(unknown, &master()),
            Err(ConfigError::InvalidConfig { .. })
        ));

        let bad_type = AcceptFilterConfig::builder()
            .data_types(vec!["Azimuth".to_string()])
            .build();
        assert!(StatisticAcceptFilter::new(bad_type, &master()).is_err());

        for epoch in ["yesterday", "NaN", "inf"] {
            let bad_epoch = AcceptFilterConfig::builder().epoch_start(epoch).build();
            assert!(matches!(
                StatisticAcceptFilter::new(bad_epoch, &master()),
                Err(ConfigError::InvalidConfig { .. })
            ));
        }

        let reversed = AcceptFilterConfig::builder()
            .epoch_start("28900.0")
            .epoch_end("28800.0")
            .build();
        assert!(StatisticAcceptFilter::new(reversed, &master()).is_err());

        let yaml = AcceptFilterConfig::loads(
            r#"
            name: LateOnly
            trackers: [GS1]
            epoch_start: "2020-01-01T00:30:00 UTC"
            thinning: !Frequency 2
            "#,
        )
        .unwrap();
        assert_eq!(yaml.observed_objects, vec!["All"]);
        assert!(StatisticAcceptFilter::new(yaml, &master()).is_ok());
    }
}
