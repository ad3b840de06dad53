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

use super::format::{Code500File, Code500Units, POINTS_PER_RECORD};
use super::{
    EphemerisError, EpochOutsideSpanSnafu, InsufficientPointsSnafu, InterpolationSnafu,
    MalformedRecordSnafu,
};
use crate::linalg::Vector6;
use crate::polyfit::CubicSpline;
use crate::time::{Duration, Epoch, Unit};
use snafu::{ensure, ResultExt};

/// Number of points fed to the spline on every interpolation.
pub const WINDOW_SIZE: usize = 5;

/// A data record converted to km and km/s, with its start epoch in the internal time base.
#[derive(Clone, Debug, PartialEq)]
pub struct EphemerisBlock {
    pub start: Epoch,
    pub step: Duration,
    /// Valid states only: fewer than fifty for the final block
    pub states: Vec<Vector6<f64>>,
}

impl EphemerisBlock {
    pub fn epoch_of(&self, index: usize) -> Epoch {
        self.start + self.step * index as i64
    }
}

/// Position of an epoch in the ephemeris: the point at or before it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RecordLocation {
    pub block: usize,
    pub index: usize,
}

/// Interpolates a Code 500 ephemeris with a five point window re-centered on every request.
#[derive(Clone, Debug)]
pub struct EphemerisInterpolationCache {
    blocks: Vec<EphemerisBlock>,
    start: Epoch,
    end: Epoch,
    window: Vec<(Epoch, Vector6<f64>)>,
    spline: Option<CubicSpline<6>>,
}

impl EphemerisInterpolationCache {
    pub fn from_file(file: &Code500File, units: Code500Units) -> Result<Self, EphemerisError> {
        let start = file.header.start_epoch()?;
        let end = file.header.end_epoch()?;
        ensure!(
            !file.records.is_empty(),
            InsufficientPointsSnafu {
                need: WINDOW_SIZE,
                got: 0_usize
            }
        );

        let last_rec = file.records.len() - 1;
        let mut blocks: Vec<EphemerisBlock> = Vec::with_capacity(file.records.len());
        for (i, rec) in file.records.iter().enumerate() {
            let block_start = file
                .header
                .time_system
                .to_epoch(rec.start_date, rec.start_seconds)?;
            ensure!(
                rec.step_s.is_finite() && rec.step_s > 0.0,
                MalformedRecordSnafu {
                    record: i,
                    reason: format!("invalid step of {} s", rec.step_s)
                }
            );
            if let Some(prev) = blocks.last() {
                ensure!(
                    block_start > prev.start,
                    MalformedRecordSnafu {
                        record: i,
                        reason: format!("starts at {block_start}, before the previous record"),
                    }
                );
            }
            let step = Unit::Second * rec.step_s;

            let count = if i == last_rec {
                // The end epoch of the header bounds the final record
                let span_s = (end - block_start).to_seconds();
                ensure!(
                    span_s >= 0.0,
                    MalformedRecordSnafu {
                        record: i,
                        reason: format!("starts after the ephemeris end {end}"),
                    }
                );
                ((span_s / rec.step_s + 1e-6).floor() as usize + 1).min(POINTS_PER_RECORD)
            } else {
                POINTS_PER_RECORD
            };

            blocks.push(EphemerisBlock {
                start: block_start,
                step,
                states: rec
                    .states
                    .iter()
                    .take(count)
                    .map(|native| units.to_km(native))
                    .collect(),
            });
        }

        Self::from_blocks(blocks, start, end)
    }

    /// Builds the cache from blocks in km and km/s. Every block but the last must hold fifty
    /// states, and the last one between one and fifty.
    pub fn from_blocks(
        blocks: Vec<EphemerisBlock>,
        start: Epoch,
        end: Epoch,
    ) -> Result<Self, EphemerisError> {
        let last = blocks.len().saturating_sub(1);
        for (i, blk) in blocks.iter().enumerate() {
            let count = blk.states.len();
            let valid = if i == last {
                (1..=POINTS_PER_RECORD).contains(&count)
            } else {
                count == POINTS_PER_RECORD
            };
            ensure!(
                valid,
                MalformedRecordSnafu {
                    record: i,
                    reason: format!("holds {count} states"),
                }
            );
        }

        Ok(Self {
            blocks,
            start,
            end,
            window: Vec::with_capacity(WINDOW_SIZE),
            spline: None,
        })
    }

    pub fn start_epoch(&self) -> Epoch {
        self.start
    }

    pub fn end_epoch(&self) -> Epoch {
        self.end
    }

    pub fn blocks(&self) -> &[EphemerisBlock] {
        &self.blocks
    }

    /// Total number of valid points across all blocks.
    pub fn num_points(&self) -> usize {
        match self.blocks.last() {
            Some(last) => (self.blocks.len() - 1) * POINTS_PER_RECORD + last.states.len(),
            None => 0,
        }
    }

    /// Epoch of the provided record location.
    pub fn epoch_of(&self, loc: RecordLocation) -> Epoch {
        self.blocks[loc.block].epoch_of(loc.index)
    }

    /// Returns the block and point index at or immediately before the requested epoch,
    /// or None if the epoch is outside of the ephemeris span.
    pub fn find_record(&self, epoch: Epoch) -> Option<RecordLocation> {
        if epoch < self.start || epoch > self.end || self.blocks.is_empty() {
            return None;
        }

        let block = self
            .blocks
            .iter()
            .position(|blk| blk.start > epoch)
            .map_or(self.blocks.len() - 1, |next| next.saturating_sub(1));

        let blk = &self.blocks[block];
        let offset = (epoch - blk.start).to_seconds() / blk.step.to_seconds();
        if offset < 0.0 {
            return None;
        }
        // Time tags are only good to the nanosecond
        let nearest = offset.round();
        let offset = if (offset - nearest).abs() < 1e-9 {
            nearest
        } else {
            offset.floor()
        };
        let index = (offset as usize).min(blk.states.len().saturating_sub(1));

        Some(RecordLocation { block, index })
    }

    fn point(&self, global: usize) -> (Epoch, Vector6<f64>) {
        let blk = &self.blocks[global / POINTS_PER_RECORD];
        let idx = global % POINTS_PER_RECORD;
        (blk.epoch_of(idx), blk.states[idx])
    }

    /// Refills the interpolation window with the five points around the epoch: one point
    /// before the bracketing point and three after it, shifted to stay within the data.
    pub fn update_interpolator(&mut self, epoch: Epoch) -> Result<(), EphemerisError> {
        let loc = self.find_record(epoch).ok_or_else(|| {
            EpochOutsideSpanSnafu {
                epoch,
                start: self.start,
                end: self.end,
            }
            .build()
        })?;

        let total = self.num_points();
        ensure!(
            total >= WINDOW_SIZE,
            InsufficientPointsSnafu {
                need: WINDOW_SIZE,
                got: total
            }
        );

        let global = loc.block * POINTS_PER_RECORD + loc.index;
        let first = global.saturating_sub(1).min(total - WINDOW_SIZE);

        self.window.clear();
        self.spline = None;
        for g in first..first + WINDOW_SIZE {
            self.window.push(self.point(g));
        }

        let ref_epoch = self.window[0].0;
        let xs: Vec<f64> = self
            .window
            .iter()
            .map(|(e, _)| (*e - ref_epoch).to_seconds())
            .collect();
        let ys: Vec<Vector6<f64>> = self.window.iter().map(|(_, rv)| *rv).collect();

        trace!(
            "{epoch}: window [{} .. {}] from block {} point {}",
            self.window[0].0,
            self.window[WINDOW_SIZE - 1].0,
            loc.block,
            loc.index
        );

        self.spline = Some(CubicSpline::new(&xs, &ys).context(InterpolationSnafu)?);
        Ok(())
    }

    /// Points of the current interpolation window.
    pub fn window(&self) -> &[(Epoch, Vector6<f64>)] {
        &self.window
    }

    /// Returns the state in km and km/s at the requested epoch.
    pub fn interpolate(&mut self, epoch: Epoch) -> Result<Vector6<f64>, EphemerisError> {
        self.update_interpolator(epoch)?;
        match (&self.spline, self.window.first()) {
            (Some(spline), Some((ref_epoch, _))) => {
                Ok(spline.eval((epoch - *ref_epoch).to_seconds()))
            }
            _ => InsufficientPointsSnafu {
                need: WINDOW_SIZE,
                got: self.window.len(),
            }
            .fail(),
        }
    }
}

#[cfg(test)]
mod ut_cache {
    use super::*;
    use crate::time::TimeUnits;
    use approx::assert_abs_diff_eq;

    /// Cubic in time so that the spline is exact
    fn truth(dt_s: f64) -> Vector6<f64> {
        let t = dt_s / 1000.0;
        Vector6::new(
            7000.0 + t - 0.2 * t.powi(3),
            -300.0 + 2.0 * t.powi(2),
            10.0 * t,
            1e-3 - 6e-4 * t.powi(2),
            4e-3 * t,
            1e-2,
        )
    }

    fn cache(num_points: usize) -> EphemerisInterpolationCache {
        let start = Epoch::from_gregorian_utc_at_midnight(2022, 2, 2);
        let states: Vec<_> = (0..num_points).map(|i| truth(60.0 * i as f64)).collect();
        let file = Code500File::from_states(
            1.0,
            3.0,
            start,
            60.seconds(),
            &states,
            Code500Units::default(),
        );
        EphemerisInterpolationCache::from_file(&file, Code500Units::default()).unwrap()
    }

    #[test]
    fn final_block_is_bounded_by_end_epoch() {
        let eph = cache(123);
        assert_eq!(eph.blocks().len(), 3);
        assert_eq!(eph.blocks()[2].states.len(), 23);
        assert_eq!(eph.num_points(), 123);
        let span = eph.end_epoch() - eph.start_epoch();
        assert!((span - 60.seconds() * 122).abs() < 1.microseconds());
    }

    #[test]
    fn bracket_invariant() {
        let eph = cache(123);
        let step = 60.seconds();
        let mut epoch = eph.start_epoch() + 7.seconds();
        while epoch < eph.end_epoch() {
            let loc = eph.find_record(epoch).unwrap();
            let at = eph.epoch_of(loc);
            assert!(at <= epoch, "{epoch} maps to later point {at}");

            let blk = &eph.blocks()[loc.block];
            let next = if loc.index + 1 < blk.states.len() {
                blk.epoch_of(loc.index + 1)
            } else {
                eph.blocks()[loc.block + 1].start
            };
            assert!(next > epoch, "{epoch} is not before the next point {next}");
            epoch += step * 0.77;
        }

        assert_eq!(eph.find_record(eph.start_epoch() - 1.seconds()), None);
        assert_eq!(eph.find_record(eph.end_epoch() + 1.seconds()), None);
        assert_eq!(
            eph.find_record(eph.end_epoch()),
            Some(RecordLocation {
                block: 2,
                index: 22
            })
        );
    }

    #[test]
    fn window_centering() {
        let mut eph = cache(123);
        // Crosses the first block boundary
        for minutes in [10.5, 48.2, 49.5, 50.0, 51.3, 99.9] {
            let epoch = eph.start_epoch() + Unit::Minute * minutes;
            eph.update_interpolator(epoch).unwrap();
            let window = eph.window();
            assert_eq!(window.len(), WINDOW_SIZE);
            // Knot epochs are decoded from date words, so only good to the nanosecond
            let slack = 1.microseconds();
            assert!(
                window[1].0 <= epoch + slack && epoch < window[2].0 - slack,
                "{minutes} min"
            );
        }
    }

    #[test]
    fn window_edges() {
        let mut eph = cache(123);
        let start = eph.start_epoch();
        eph.update_interpolator(start + 20.seconds()).unwrap();
        assert_eq!(eph.window()[0].0, start);

        let end = eph.end_epoch();
        eph.update_interpolator(end - 20.seconds()).unwrap();
        let window = eph.window();
        assert!((window[WINDOW_SIZE - 1].0 - end).abs() < 1.microseconds());

        eph.update_interpolator(end).unwrap();
        assert!((eph.window()[0].0 - (end - 60.seconds() * 4)).abs() < 1.microseconds());
    }

    #[test]
    fn interpolation() {
        let mut eph = cache(123);
        for seconds in [0.0, 31.0, 2999.0, 3000.0, 6001.5, 7300.0] {
            let epoch = eph.start_epoch() + Unit::Second * seconds;
            let rv = eph.interpolate(epoch).unwrap();
            let expected = truth(seconds);
            assert_abs_diff_eq!(rv, expected, epsilon = 1e-6);
        }

        assert!(matches!(
            eph.interpolate(eph.end_epoch() + 1.seconds()),
            Err(EphemerisError::EpochOutsideSpan { .. })
        ));
    }

    #[test]
    fn short_interior_block() {
        let eph = cache(123);
        let mut blocks = eph.blocks().to_vec();
        blocks[1].states.truncate(20);
        assert!(matches!(
            EphemerisInterpolationCache::from_blocks(blocks, eph.start_epoch(), eph.end_epoch()),
            Err(EphemerisError::MalformedRecord { record: 1, .. })
        ));

        let mut blocks = eph.blocks().to_vec();
        blocks[2].states.clear();
        assert!(matches!(
            EphemerisInterpolationCache::from_blocks(blocks, eph.start_epoch(), eph.end_epoch()),
            Err(EphemerisError::MalformedRecord { record: 2, .. })
        ));

        let blocks = eph.blocks().to_vec();
        let rebuilt =
            EphemerisInterpolationCache::from_blocks(blocks, eph.start_epoch(), eph.end_epoch())
                .unwrap();
        assert_eq!(rebuilt.num_points(), 123);
    }

    #[test]
    fn too_few_points() {
        let mut eph = cache(4);
        assert!(matches!(
            eph.interpolate(eph.start_epoch() + 30.seconds()),
            Err(EphemerisError::InsufficientPoints { need: 5, got: 4 })
        ));
    }
}
