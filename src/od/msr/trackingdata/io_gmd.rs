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

use crate::io::{InputOutputError, ParseLineSnafu, StdIOSnafu};
use crate::od::msr::{MeasurementType, ObservationRecord};
use crate::time::TimeScale;
use crate::utils::{epoch_from_a1_mjd, epoch_to_a1_mjd};
use snafu::ResultExt;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use super::TrackingDataArc;

const ACTION: &str = "GMD tracking file";

fn parse_f64(token: &str, line_no: usize, what: &str) -> Result<f64, InputOutputError> {
    token.parse::<f64>().map_err(|_| {
        ParseLineSnafu {
            line_no,
            action: ACTION,
            reason: format!("invalid {what} `{token}`"),
        }
        .build()
    })
}

fn parse_record(line: &str, line_no: usize) -> Result<ObservationRecord, InputOutputError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let bad = |reason: String| {
        ParseLineSnafu {
            line_no,
            action: ACTION,
            reason,
        }
        .build()
    };

    if tokens.len() < 5 {
        return Err(bad(format!("expected at least 5 fields, found {}", tokens.len())));
    }

    let a1_mjd = parse_f64(tokens[0], line_no, "A.1 modified Julian date")?;
    let epoch = epoch_from_a1_mjd(a1_mjd)
        .ok_or_else(|| bad(format!("A.1 modified Julian date `{}` is out of range", tokens[0])))?;
    let type_name = tokens[1];
    let type_id: u32 = tokens[2]
        .parse()
        .map_err(|_| bad(format!("invalid type id `{}`", tokens[2])))?;
    let msr_type = MeasurementType::from_type_id(type_id)
        .ok_or_else(|| bad(format!("unsupported type id {type_id} ({type_name})")))?;

    // Trailing metadata fields per type, the value is always last
    let trailing = match msr_type {
        MeasurementType::Range => 1,
        MeasurementType::RangeRate => 3,
    };
    if tokens.len() < 3 + 2 + trailing {
        return Err(bad(format!("{type_name} requires at least two participants")));
    }
    let participants: Vec<&str> = tokens[3..tokens.len() - trailing].to_vec();
    let value = parse_f64(tokens[tokens.len() - 1], line_no, "value")?;

    let mut obs = ObservationRecord::new(msr_type, epoch, &participants, value);
    obs.type_name = type_name.to_string();
    obs.time_scale = TimeScale::TAI;
    obs.unique_id = line_no as u64;

    if msr_type == MeasurementType::RangeRate {
        let band = parse_f64(tokens[tokens.len() - 3], line_no, "uplink band")?;
        if band.fract() != 0.0 || !(0.0..=f64::from(u8::MAX)).contains(&band) {
            return Err(bad(format!("invalid uplink band `{}`", tokens[tokens.len() - 3])));
        }
        obs.uplink_band = Some(band as u8);
        obs.doppler_count_interval_s =
            Some(parse_f64(tokens[tokens.len() - 2], line_no, "Doppler count interval")?);
    }

    Ok(obs)
}

impl TrackingDataArc {
    /// Loads a tracking arc from a GMD text file: one observation per line, `%` starts a comment.
    ///
    /// Range: `<A.1 MJD> <type name> 9004 <participants..> <value km>`
    /// Range rate: `<A.1 MJD> <type name> 9012 <participants..> <band> <count interval s>
    /// <value km/s>`
    pub fn from_gmd<P: AsRef<Path>>(path: P) -> Result<Self, InputOutputError> {
        let file = File::open(&path).context(StdIOSnafu {
            action: "opening GMD file for tracking arc",
        })?;
        let source = path.as_ref().display().to_string();

        let mut observations = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.context(StdIOSnafu {
                action: "reading GMD file",
            })?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('%') {
                continue;
            }
            observations.push(parse_record(line, idx + 1)?.with_source(&source));
        }

        info!("Loaded {} observations from {source}", observations.len());

        let mut arc = Self::new(observations);
        arc.source = Some(source);
        Ok(arc)
    }

    /// Parses GMD formatted observations from a string, tagging them with the provided source.
    pub fn from_gmd_str(data: &str, source: &str) -> Result<Self, InputOutputError> {
        let observations = data
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('%'))
            .map(|(line_no, line)| parse_record(line, line_no).map(|obs| obs.with_source(source)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut arc = Self::new(observations);
        arc.source = Some(source.to_string());
        Ok(arc)
    }

    /// Serializes this arc in the GMD format.
    pub fn to_gmd_string(&self) -> String {
        let mut out = String::new();
        for obs in self.iter() {
            let participants = obs
                .participant_lists
                .first()
                .map(|list| list.join(" "))
                .unwrap_or_default();
            let value = obs.value.first().copied().unwrap_or(f64::NAN);
            let _ = write!(
                out,
                "{:.11}    {}    {}    {}",
                epoch_to_a1_mjd(obs.epoch),
                obs.type_name,
                obs.msr_type.type_id(),
                participants
            );
            let _ = match obs.msr_type {
                MeasurementType::Range => writeln!(out, "    {value:.9}"),
                MeasurementType::RangeRate => writeln!(
                    out,
                    "    {}    {}    {value:.12}",
                    obs.uplink_band.unwrap_or(1),
                    obs.doppler_count_interval_s.unwrap_or(1.0)
                ),
            };
        }
        out
    }

    /// Writes this arc to a GMD file.
    pub fn to_gmd<P: AsRef<Path>>(&self, path: P) -> Result<(), InputOutputError> {
        let mut file = File::create(&path).context(StdIOSnafu {
            action: "creating GMD file",
        })?;
        writeln!(file, "% {} observations", self.len())
            .and_then(|_| file.write_all(self.to_gmd_string().as_bytes()))
            .context(StdIOSnafu {
                action: "writing GMD file",
            })?;
        info!("Tracking arc saved to {}", path.as_ref().display());
        Ok(())
    }
}
