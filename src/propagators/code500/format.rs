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

use super::{
    BadRecordCountSnafu, BadTimeSystemSnafu, EphemerisError, MalformedDateSnafu,
    MalformedSecondsSnafu, TruncatedSnafu,
};
use crate::linalg::Vector6;
use crate::time::{Duration, Epoch, Unit};
use crate::utils::{a1_offset, SECONDS_PER_DAY};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;

/// Size in bytes of every header and data record.
pub const RECORD_LEN: usize = 2800;
/// Number of states stored in each data record.
pub const POINTS_PER_RECORD: usize = 50;
const WORDS_PER_RECORD: usize = RECORD_LEN / 8;
/// Days between 1900-01-01 and 1970-01-01
const DAYS_1900_TO_1970: i64 = 25_567;

/// Scale factors between the native Code 500 unit system and km, km/s.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Code500Units {
    pub position_scale: f64,
    pub velocity_scale: f64,
}

impl Default for Code500Units {
    fn default() -> Self {
        Self {
            position_scale: 1.0e4,
            velocity_scale: 1.0e4 / 864.0,
        }
    }
}

impl Code500Units {
    pub fn to_km(&self, native: &Vector6<f64>) -> Vector6<f64> {
        let mut rv = *native;
        rv.fixed_rows_mut::<3>(0).scale_mut(self.position_scale);
        rv.fixed_rows_mut::<3>(3).scale_mut(self.velocity_scale);
        rv
    }

    pub fn to_native(&self, km: &Vector6<f64>) -> Vector6<f64> {
        let mut rv = *km;
        rv.fixed_rows_mut::<3>(0).unscale_mut(self.position_scale);
        rv.fixed_rows_mut::<3>(3).unscale_mut(self.velocity_scale);
        rv
    }
}

/// Time system of the record time stamps.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSystemFlag {
    /// Already in the continuous A.1 time base
    A1,
    /// UTC, converted on read
    Utc,
}

impl TimeSystemFlag {
    fn from_word(word: f64) -> Option<Self> {
        if word == 1.0 {
            Some(Self::A1)
        } else if word == 2.0 {
            Some(Self::Utc)
        } else {
            None
        }
    }

    fn word(self) -> f64 {
        match self {
            Self::A1 => 1.0,
            Self::Utc => 2.0,
        }
    }

    /// Converts a YYYMMDD date word and seconds of day into an epoch.
    pub fn to_epoch(self, date: f64, seconds_of_day: f64) -> Result<Epoch, EphemerisError> {
        let (year, month, day) = decode_date(date)?;
        // One extra second for a leap second
        ensure!(
            (0.0..=SECONDS_PER_DAY + 1.0).contains(&seconds_of_day),
            MalformedSecondsSnafu {
                value: seconds_of_day
            }
        );
        let midnight = match self {
            Self::A1 => Epoch::from_gregorian_tai_at_midnight(year, month, day) - a1_offset(),
            Self::Utc => Epoch::from_gregorian_utc_at_midnight(year, month, day),
        };
        Ok(midnight + Unit::Second * seconds_of_day)
    }
}

fn decode_date(date: f64) -> Result<(i32, u8, u8), EphemerisError> {
    ensure!(
        date.is_finite() && date >= 0.0 && date.fract() == 0.0,
        MalformedDateSnafu { value: date }
    );
    let date = date as i64;
    let (years, month, day) = (date / 10_000, (date / 100) % 100, date % 100);
    ensure!(
        (1..=12).contains(&month) && (1..=31).contains(&day),
        MalformedDateSnafu {
            value: date as f64
        }
    );
    Ok((1900 + years as i32, month as u8, day as u8))
}

/// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// Encodes an epoch as the A.1 YYYMMDD date word and seconds of day.
pub fn encode_a1(epoch: Epoch) -> (f64, f64) {
    let clock = epoch + a1_offset();
    let ref_1900 = Epoch::from_gregorian_tai_at_midnight(1900, 1, 1);
    let days = (clock - ref_1900).to_unit(Unit::Day).floor();
    let seconds = (clock - (ref_1900 + Unit::Day * days)).to_seconds();
    let (year, month, day) = civil_from_days(days as i64 - DAYS_1900_TO_1970);
    let date = (year - 1900) * 10_000 + month * 100 + day;
    (date as f64, seconds)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Code500Header {
    pub satellite_id: f64,
    pub time_system: TimeSystemFlag,
    pub start_date: f64,
    pub start_seconds: f64,
    pub end_date: f64,
    pub end_seconds: f64,
    pub step_s: f64,
    pub central_body_id: f64,
    pub num_records: usize,
}

impl Code500Header {
    pub fn start_epoch(&self) -> Result<Epoch, EphemerisError> {
        self.time_system
            .to_epoch(self.start_date, self.start_seconds)
    }

    pub fn end_epoch(&self) -> Result<Epoch, EphemerisError> {
        self.time_system.to_epoch(self.end_date, self.end_seconds)
    }
}

/// One data record: a start time, a constant step and fifty states in native units.
#[derive(Clone, Debug, PartialEq)]
pub struct DataRecord {
    pub start_date: f64,
    pub start_seconds: f64,
    pub step_s: f64,
    pub states: Vec<Vector6<f64>>,
}

/// A parsed Code 500 ephemeris file.
#[derive(Clone, Debug, PartialEq)]
pub struct Code500File {
    pub header: Code500Header,
    pub records: Vec<DataRecord>,
}

fn read_word(buf: &mut Bytes, big_endian: bool) -> f64 {
    if big_endian {
        buf.get_f64()
    } else {
        buf.get_f64_le()
    }
}

impl Code500File {
    /// Parses the file contents, detecting the byte order from the time system flag.
    pub fn parse(data: Bytes) -> Result<Self, EphemerisError> {
        ensure!(
            data.len() >= RECORD_LEN,
            TruncatedSnafu {
                len: data.len(),
                need: RECORD_LEN
            }
        );

        let flag_be = (&data[8..16]).get_f64();
        let flag_le = (&data[8..16]).get_f64_le();
        let (big_endian, time_system) = match (
            TimeSystemFlag::from_word(flag_be),
            TimeSystemFlag::from_word(flag_le),
        ) {
            (Some(flag), _) => (true, flag),
            (None, Some(flag)) => (false, flag),
            (None, None) => return BadTimeSystemSnafu { value: flag_be }.fail(),
        };

        let mut hdr = data.slice(0..RECORD_LEN);
        let satellite_id = read_word(&mut hdr, big_endian);
        let _flag = read_word(&mut hdr, big_endian);
        let start_date = read_word(&mut hdr, big_endian);
        let start_seconds = read_word(&mut hdr, big_endian);
        let end_date = read_word(&mut hdr, big_endian);
        let end_seconds = read_word(&mut hdr, big_endian);
        let step_s = read_word(&mut hdr, big_endian);
        let central_body_id = read_word(&mut hdr, big_endian);
        let count_word = read_word(&mut hdr, big_endian);
        ensure!(
            count_word.is_finite() && count_word >= 0.0 && count_word.fract() == 0.0,
            BadRecordCountSnafu { value: count_word }
        );
        // Saturates for counts that cannot fit, which the length check then rejects
        let num_records = count_word as usize;

        let need = num_records
            .checked_add(1)
            .and_then(|records| records.checked_mul(RECORD_LEN))
            .unwrap_or(usize::MAX);
        ensure!(
            data.len() >= need,
            TruncatedSnafu {
                len: data.len(),
                need
            }
        );

        let records = (0..num_records)
            .map(|i| {
                let start = RECORD_LEN * (i + 1);
                let mut rec = data.slice(start..start + RECORD_LEN);
                let start_date = read_word(&mut rec, big_endian);
                let start_seconds = read_word(&mut rec, big_endian);
                let step_s = read_word(&mut rec, big_endian);
                let states = (0..POINTS_PER_RECORD)
                    .map(|_| Vector6::from_fn(|_, _| read_word(&mut rec, big_endian)))
                    .collect();
                DataRecord {
                    start_date,
                    start_seconds,
                    step_s,
                    states,
                }
            })
            .collect();

        debug!(
            "Code 500 file for satellite {satellite_id}: {num_records} records, {} endian, {:?}",
            if big_endian { "big" } else { "little" },
            time_system
        );

        Ok(Self {
            header: Code500Header {
                satellite_id,
                time_system,
                start_date,
                start_seconds,
                end_date,
                end_seconds,
                step_s,
                central_body_id,
                num_records,
            },
            records,
        })
    }

    /// Builds an A.1 tagged file from evenly spaced states in km and km/s.
    pub fn from_states(
        satellite_id: f64,
        central_body_id: f64,
        start: Epoch,
        step: Duration,
        states_km: &[Vector6<f64>],
        units: Code500Units,
    ) -> Self {
        let step_s = step.to_seconds();
        let records: Vec<DataRecord> = states_km
            .chunks(POINTS_PER_RECORD)
            .enumerate()
            .map(|(i, chunk)| {
                let (start_date, start_seconds) =
                    encode_a1(start + step * (i * POINTS_PER_RECORD) as i64);
                let mut states: Vec<Vector6<f64>> =
                    chunk.iter().map(|rv| units.to_native(rv)).collect();
                states.resize(POINTS_PER_RECORD, Vector6::zeros());
                DataRecord {
                    start_date,
                    start_seconds,
                    step_s,
                    states,
                }
            })
            .collect();

        let (start_date, start_seconds) = encode_a1(start);
        let last = states_km.len().saturating_sub(1) as i64;
        let (end_date, end_seconds) = encode_a1(start + step * last);

        Self {
            header: Code500Header {
                satellite_id,
                time_system: TimeSystemFlag::A1,
                start_date,
                start_seconds,
                end_date,
                end_seconds,
                step_s,
                central_body_id,
                num_records: records.len(),
            },
            records,
        }
    }

    /// Serializes this file, zero padding every record to its fixed length.
    pub fn to_bytes(&self, big_endian: bool) -> Bytes {
        let mut buf = BytesMut::with_capacity(RECORD_LEN * (1 + self.records.len()));
        let put = |buf: &mut BytesMut, word: f64| {
            if big_endian {
                buf.put_f64(word)
            } else {
                buf.put_f64_le(word)
            }
        };

        let hdr = &self.header;
        for word in [
            hdr.satellite_id,
            hdr.time_system.word(),
            hdr.start_date,
            hdr.start_seconds,
            hdr.end_date,
            hdr.end_seconds,
            hdr.step_s,
            hdr.central_body_id,
            self.records.len() as f64,
        ] {
            put(&mut buf, word);
        }
        for _ in 9..WORDS_PER_RECORD {
            put(&mut buf, 0.0);
        }

        for rec in &self.records {
            put(&mut buf, rec.start_date);
            put(&mut buf, rec.start_seconds);
            put(&mut buf, rec.step_s);
            for state in rec.states.iter().take(POINTS_PER_RECORD) {
                for word in state.iter() {
                    put(&mut buf, *word);
                }
            }
            let written = 3 + 6 * rec.states.len().min(POINTS_PER_RECORD);
            for _ in written..WORDS_PER_RECORD {
                put(&mut buf, 0.0);
            }
        }

        buf.freeze()
    }
}
