//! Vector limb storage.
//!
//! A `LimbBuffer` holds one `u32x8` per limb: lane `k` of every register
//! together forms the fixed-point value of pixel `k` in a lane-group.
//! `u32x8` is 32-byte aligned, so the backing `Vec` is register-aligned.

use msetgen_core::LANES;
use std::ops::{Index, IndexMut};
use wide::{u32x8, u64x4};

#[derive(Clone, Debug, PartialEq)]
pub struct LimbBuffer {
    limbs: Vec<u32x8>,
}

impl LimbBuffer {
    /// Zero-initialized buffer of `limb_count` registers.
    pub fn new(limb_count: usize) -> Self {
        Self {
            limbs: vec![u32x8::default(); limb_count],
        }
    }

    /// Broadcast one value (least-significant limb first) to all lanes.
    pub fn splat(limbs: &[u32]) -> Self {
        Self {
            limbs: limbs.iter().map(|&limb| u32x8::splat(limb)).collect(),
        }
    }

    /// Pack eight values, one per lane. Each slice must hold `limb_count` limbs.
    pub fn from_lane_values(lanes: [&[u32]; LANES]) -> Self {
        let limb_count = lanes[0].len();
        let limbs = (0..limb_count)
            .map(|i| u32x8::new(lanes.map(|lane| lane[i])))
            .collect();
        Self { limbs }
    }

    /// The limbs of a single lane, least-significant first.
    pub fn lane_limbs(&self, lane: usize) -> Vec<u32> {
        self.limbs.iter().map(|limb| limb.to_array()[lane]).collect()
    }

    pub fn limb_count(&self) -> usize {
        self.limbs.len()
    }

    pub fn limbs(&self) -> &[u32x8] {
        &self.limbs
    }

    pub fn most_significant(&self) -> u32x8 {
        self.limbs[self.limbs.len() - 1]
    }

    /// Overwrite with `other`. Both buffers must have the same limb count.
    pub fn copy_from(&mut self, other: &LimbBuffer) {
        self.limbs.copy_from_slice(&other.limbs);
    }

    pub fn clear(&mut self) {
        self.limbs.fill(u32x8::default());
    }
}

impl Index<usize> for LimbBuffer {
    type Output = u32x8;

    #[inline]
    fn index(&self, limb: usize) -> &u32x8 {
        &self.limbs[limb]
    }
}

impl IndexMut<usize> for LimbBuffer {
    #[inline]
    fn index_mut(&mut self, limb: usize) -> &mut u32x8 {
        &mut self.limbs[limb]
    }
}

/// Widened accumulator for squaring: `2 × limb_count` bins of 64-bit lanes,
/// split into lanes 0–3 (`low`) and lanes 4–7 (`high`).
#[derive(Clone, Debug)]
pub struct WideLimbBuffer {
    pub low: Vec<u64x4>,
    pub high: Vec<u64x4>,
}

impl WideLimbBuffer {
    pub fn new(bin_count: usize) -> Self {
        Self {
            low: vec![u64x4::default(); bin_count],
            high: vec![u64x4::default(); bin_count],
        }
    }

    pub fn bin_count(&self) -> usize {
        self.low.len()
    }

    pub fn clear(&mut self) {
        self.low.fill(u64x4::default());
        self.high.fill(u64x4::default());
    }
}
