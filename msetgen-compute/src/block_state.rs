//! Per-block iteration bookkeeping.
//!
//! The block store (`MapSectionValues`) holds per-pixel results in row-major
//! order. One row at a time is unpacked into lane-group vectors, iterated,
//! and packed back. Rows and lane-groups that are already finished are
//! skipped, which is what makes raising the iteration budget cheap.

use crate::lanes::{limb_mask, mask_from_bools, mask_to_bools};
use crate::limb_buffer::LimbBuffer;
use log::trace;
use msetgen_core::{
    BlockSize, FixedPointFormat, MapSectionValues, SamplePoints, LANES, MAX_TARGET_ITERATIONS,
};
use wide::{i32x8, CmpGt};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowCursor {
    BeforeFirstRow,
    ProcessingRow(usize),
    AfterLastRow,
}

pub struct BlockIterationState {
    block_size: BlockSize,
    limb_count: usize,
    target_iterations: u32,
    target_minus_one: i32x8,
    skip_escaped_rows: bool,

    // Sample coordinates: one cr vector per lane-group, one ci value per row.
    crs: Vec<LimbBuffer>,
    cis: Vec<Vec<u32>>,
    ci: LimbBuffer,

    // Unpacked state of the current row, one entry per lane-group.
    row_zrs: Vec<LimbBuffer>,
    row_zis: Vec<LimbBuffer>,
    row_counts: Vec<i32x8>,
    row_escaped: Vec<i32x8>,
    row_done: Vec<i32x8>,
    row_is_resumed: bool,
    in_play: Vec<usize>,

    cursor: RowCursor,
    values: MapSectionValues,
}

impl BlockIterationState {
    /// Create the state for one block.
    ///
    /// `previous`, if given, must already match `format` and `block_size`.
    pub fn new(
        format: FixedPointFormat,
        block_size: BlockSize,
        target_iterations: u32,
        sample_points: &SamplePoints,
        previous: Option<MapSectionValues>,
    ) -> Self {
        debug_assert!(target_iterations <= MAX_TARGET_ITERATIONS);
        let limb_count = format.limb_count;
        let vectors_per_row = block_size.vectors_per_row();

        let cr_limbs: Vec<Vec<u32>> = sample_points
            .crs
            .iter()
            .map(|cr| cr.to_twos_complement())
            .collect();
        let crs = cr_limbs
            .chunks(LANES)
            .map(|group| LimbBuffer::from_lane_values(std::array::from_fn(|k| group[k].as_slice())))
            .collect();
        let cis = sample_points
            .cis
            .iter()
            .map(|ci| ci.to_twos_complement())
            .collect();

        let skip_escaped_rows = previous.is_some();
        let mut values =
            previous.unwrap_or_else(|| MapSectionValues::new(format, block_size, target_iterations));
        values.target_iterations = target_iterations;

        Self {
            block_size,
            limb_count,
            target_iterations,
            target_minus_one: i32x8::splat(target_iterations as i32 - 1),
            skip_escaped_rows,
            crs,
            cis,
            ci: LimbBuffer::new(limb_count),
            row_zrs: vec![LimbBuffer::new(limb_count); vectors_per_row],
            row_zis: vec![LimbBuffer::new(limb_count); vectors_per_row],
            row_counts: vec![i32x8::default(); vectors_per_row],
            row_escaped: vec![i32x8::default(); vectors_per_row],
            row_done: vec![i32x8::default(); vectors_per_row],
            row_is_resumed: false,
            in_play: Vec::with_capacity(vectors_per_row),
            cursor: RowCursor::BeforeFirstRow,
            values,
        }
    }

    pub fn cursor(&self) -> RowCursor {
        self.cursor
    }

    pub fn target_iterations(&self) -> u32 {
        self.target_iterations
    }

    /// The next row that needs work, without moving the cursor.
    ///
    /// When resuming, rows in which every pixel had already escaped are
    /// skipped.
    pub fn next_pending_row(&self) -> Option<usize> {
        let first = match self.cursor {
            RowCursor::BeforeFirstRow => 0,
            RowCursor::ProcessingRow(row) => row + 1,
            RowCursor::AfterLastRow => return None,
        };
        (first..self.block_size.height)
            .find(|&row| !(self.skip_escaped_rows && self.values.row_has_escaped[row]))
    }

    /// Persist the current row and move to the next one that needs work.
    ///
    /// Returns None once past the last row.
    pub fn get_next_row_number(&mut self) -> Option<usize> {
        match self.next_pending_row() {
            Some(row) => {
                self.set_row_number(row);
                Some(row)
            }
            None => {
                self.persist_current_row();
                self.cursor = RowCursor::AfterLastRow;
                None
            }
        }
    }

    /// Persist the current row and load `row`.
    pub fn set_row_number(&mut self, row: usize) {
        debug_assert!(row < self.block_size.height);
        self.persist_current_row();
        self.load_row(row);
        self.cursor = RowCursor::ProcessingRow(row);
    }

    /// Lane-groups of the current row that still have a lane to iterate.
    pub fn in_play_list(&self) -> &[usize] {
        &self.in_play
    }

    /// True if the current row continues from stored Z values.
    pub fn is_row_resumed(&self) -> bool {
        self.row_is_resumed
    }

    pub fn cr(&self, group: usize) -> &LimbBuffer {
        &self.crs[group]
    }

    /// The current row's ci, broadcast to all lanes.
    pub fn ci(&self) -> &LimbBuffer {
        &self.ci
    }

    /// Copy a lane-group's stored Z into working buffers.
    pub fn load_lane_group(&self, group: usize, zr: &mut LimbBuffer, zi: &mut LimbBuffer) {
        zr.copy_from(&self.row_zrs[group]);
        zi.copy_from(&self.row_zis[group]);
    }

    /// Record one round of results for a lane-group.
    ///
    /// Lanes already done keep their count and Z. Other lanes take the new Z,
    /// count the round if `advanced`, and become done on escape or on
    /// reaching the target. Returns true once all eight lanes are done.
    pub fn update_lane_group(
        &mut self,
        group: usize,
        escaped: i32x8,
        zr: &LimbBuffer,
        zi: &LimbBuffer,
        advanced: bool,
    ) -> bool {
        let was_done = self.row_done[group];
        let active = !was_done;

        if advanced {
            let counts = self.row_counts[group];
            self.row_counts[group] = active.blend(counts + i32x8::splat(1), counts);
        }

        let newly_escaped = escaped & active;
        self.row_escaped[group] = self.row_escaped[group] | newly_escaped;

        let reached_target = self.row_counts[group].cmp_gt(self.target_minus_one);
        let done = was_done | newly_escaped | reached_target;

        if was_done.none() {
            self.row_zrs[group].copy_from(zr);
            self.row_zis[group].copy_from(zi);
        } else {
            freeze_blend(&mut self.row_zrs[group], zr, was_done);
            freeze_blend(&mut self.row_zis[group], zi, was_done);
        }

        self.row_done[group] = done;
        done.all()
    }

    pub fn lane_group_counts(&self, group: usize) -> [i32; LANES] {
        self.row_counts[group].to_array()
    }

    pub fn lane_group_escaped(&self, group: usize) -> [bool; LANES] {
        mask_to_bools(self.row_escaped[group])
    }

    /// Persist the current row and hand back the block store.
    ///
    /// Returns the values and whether every row has escaped.
    pub fn finish(mut self) -> (MapSectionValues, bool) {
        self.persist_current_row();
        let all_escaped = self.values.row_has_escaped.iter().all(|&escaped| escaped);
        (self.values, all_escaped)
    }

    fn load_row(&mut self, row: usize) {
        self.ci = LimbBuffer::splat(&self.cis[row]);
        self.in_play.clear();
        self.row_is_resumed = false;

        let width = self.block_size.values_per_row();
        let n = self.limb_count;
        let z = &self.values.z_values;

        for group in 0..self.block_size.vectors_per_row() {
            let first = row * width + group * LANES;
            let pixels = first..first + LANES;

            let counts = &self.values.counts[pixels.clone()];
            let count_vec = i32x8::new(std::array::from_fn(|k| counts[k] as i32));
            let escaped = mask_from_bools(&self.values.escaped[pixels.clone()]);
            let done = escaped | count_vec.cmp_gt(self.target_minus_one);

            self.row_zrs[group] = LimbBuffer::from_lane_values(std::array::from_fn(|k| {
                &z.zrs[(first + k) * n..(first + k + 1) * n]
            }));
            self.row_zis[group] = LimbBuffer::from_lane_values(std::array::from_fn(|k| {
                &z.zis[(first + k) * n..(first + k + 1) * n]
            }));

            self.row_is_resumed |= counts.iter().any(|&c| c > 0);
            self.row_counts[group] = count_vec;
            self.row_escaped[group] = escaped;
            self.row_done[group] = done;

            if !done.all() {
                self.in_play.push(group);
            }
        }

        trace!(
            "Row {}: {} of {} lane-groups in play{}",
            row,
            self.in_play.len(),
            self.block_size.vectors_per_row(),
            if self.row_is_resumed { " (resumed)" } else { "" }
        );
    }

    fn persist_current_row(&mut self) {
        let RowCursor::ProcessingRow(row) = self.cursor else {
            return;
        };

        let width = self.block_size.values_per_row();
        let n = self.limb_count;
        let mut row_escaped = true;

        for group in 0..self.block_size.vectors_per_row() {
            let first = row * width + group * LANES;
            let counts = self.row_counts[group].to_array();
            let escaped = mask_to_bools(self.row_escaped[group]);

            for lane in 0..LANES {
                let pixel = first + lane;
                self.values.counts[pixel] = counts[lane] as u32;
                self.values.escaped[pixel] = escaped[lane];
                row_escaped &= escaped[lane];

                let limbs = pixel * n..(pixel + 1) * n;
                self.values.z_values.zrs[limbs.clone()]
                    .copy_from_slice(&self.row_zrs[group].lane_limbs(lane));
                self.values.z_values.zis[limbs]
                    .copy_from_slice(&self.row_zis[group].lane_limbs(lane));
            }
        }

        self.values.row_has_escaped[row] = row_escaped;
    }
}

/// Keep `frozen` lanes of `stored`; take `fresh` for the rest.
fn freeze_blend(stored: &mut LimbBuffer, fresh: &LimbBuffer, frozen: i32x8) {
    let frozen = limb_mask(frozen);
    for i in 0..stored.limb_count() {
        stored[i] = frozen.blend(stored[i], fresh[i]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msetgen_core::BinaryRational;

    fn format() -> FixedPointFormat {
        FixedPointFormat::new(2, 8).unwrap()
    }

    fn points(block_size: BlockSize) -> SamplePoints {
        SamplePoints::build(
            &(BinaryRational::from_i64(-1), BinaryRational::from_i64(-1)),
            &BinaryRational::from_f64(0.125).unwrap(),
            block_size,
            format(),
        )
        .unwrap()
    }

    fn state(
        block_size: BlockSize,
        target: u32,
        previous: Option<MapSectionValues>,
    ) -> BlockIterationState {
        BlockIterationState::new(format(), block_size, target, &points(block_size), previous)
    }

    fn lane_mask(lanes: &[usize]) -> i32x8 {
        let mut flags = [false; LANES];
        for &lane in lanes {
            flags[lane] = true;
        }
        mask_from_bools(&flags)
    }

    #[test]
    fn cursor_walks_every_row_then_stops() {
        let mut s = state(BlockSize::new(8, 3), 10, None);
        assert_eq!(s.cursor(), RowCursor::BeforeFirstRow);
        assert_eq!(s.get_next_row_number(), Some(0));
        assert_eq!(s.get_next_row_number(), Some(1));
        assert_eq!(s.get_next_row_number(), Some(2));
        assert_eq!(s.cursor(), RowCursor::ProcessingRow(2));
        assert_eq!(s.get_next_row_number(), None);
        assert_eq!(s.cursor(), RowCursor::AfterLastRow);
        assert_eq!(s.get_next_row_number(), None);
    }

    #[test]
    fn fresh_rows_put_every_lane_group_in_play() {
        let mut s = state(BlockSize::new(24, 1), 10, None);
        s.get_next_row_number();
        assert_eq!(s.in_play_list(), &[0, 1, 2]);
        assert!(!s.is_row_resumed());
    }

    #[test]
    fn escaped_lanes_freeze_count_and_z() {
        let mut s = state(BlockSize::new(8, 1), 100, None);
        s.get_next_row_number();

        let z1 = LimbBuffer::splat(&[11, 1]);
        let z2 = LimbBuffer::splat(&[22, 2]);
        let z3 = LimbBuffer::splat(&[33, 3]);

        assert!(!s.update_lane_group(0, lane_mask(&[]), &z1, &z1, true));
        assert!(!s.update_lane_group(0, lane_mask(&[2]), &z2, &z2, true));
        // lane 2 reports "escaped" again and gets new values; both must be ignored
        assert!(!s.update_lane_group(0, lane_mask(&[2, 5]), &z3, &z3, true));
        assert!(!s.update_lane_group(0, lane_mask(&[]), &z1, &z1, true));

        let counts = s.lane_group_counts(0);
        assert_eq!(counts[2], 2);
        assert_eq!(counts[5], 3);
        assert_eq!(counts[0], 4);
        let escaped = s.lane_group_escaped(0);
        assert!(escaped[2] && escaped[5] && !escaped[0]);

        let (values, all_escaped) = s.finish();
        assert!(!all_escaped);
        assert_eq!(values.z_values.zr_limbs(2), &[22, 2]);
        assert_eq!(values.z_values.zr_limbs(5), &[33, 3]);
        assert_eq!(values.z_values.zi_limbs(0), &[11, 1]);
        assert_eq!(values.counts[2], 2);
    }

    #[test]
    fn reaching_the_target_finishes_the_group() {
        let mut s = state(BlockSize::new(8, 1), 3, None);
        s.get_next_row_number();
        let z = LimbBuffer::new(2);

        assert!(!s.update_lane_group(0, lane_mask(&[]), &z, &z, true));
        assert!(!s.update_lane_group(0, lane_mask(&[]), &z, &z, true));
        assert!(s.update_lane_group(0, lane_mask(&[]), &z, &z, true));
        assert_eq!(s.lane_group_counts(0), [3; LANES]);
        assert_eq!(s.lane_group_escaped(0), [false; LANES]);
    }

    #[test]
    fn first_round_without_advance_keeps_counts() {
        let mut s = state(BlockSize::new(8, 1), 10, None);
        s.get_next_row_number();
        let z = LimbBuffer::new(2);
        s.update_lane_group(0, lane_mask(&[]), &z, &z, false);
        assert_eq!(s.lane_group_counts(0), [0; LANES]);
    }

    #[test]
    fn resumed_rows_skip_escaped_rows_and_finished_groups() {
        let block = BlockSize::new(16, 3);
        let mut previous = MapSectionValues::new(format(), block, 10);
        previous.counts.iter_mut().for_each(|c| *c = 10);
        // row 0: everything escaped
        previous.row_has_escaped[0] = true;
        for pixel in 0..16 {
            previous.escaped[pixel] = true;
            previous.counts[pixel] = 3;
        }
        // row 1: first group escaped, second group at the old ceiling
        for pixel in 16..24 {
            previous.escaped[pixel] = true;
            previous.counts[pixel] = 4;
        }

        let mut s = state(block, 20, Some(previous));
        assert_eq!(s.next_pending_row(), Some(1));
        assert_eq!(s.cursor(), RowCursor::BeforeFirstRow);
        assert_eq!(s.get_next_row_number(), Some(1));
        assert!(s.is_row_resumed());
        assert_eq!(s.in_play_list(), &[1]);
        assert_eq!(s.get_next_row_number(), Some(2));
        assert_eq!(s.in_play_list(), &[0, 1]);
        assert_eq!(s.next_pending_row(), None);
        assert_eq!(s.get_next_row_number(), None);

        let (values, _) = s.finish();
        assert_eq!(values.target_iterations, 20);
        assert_eq!(values.counts[0], 3);
        assert_eq!(values.counts[16], 4);
    }
}
