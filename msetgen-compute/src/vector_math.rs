//! Lane-wise fixed-point arithmetic over `LimbBuffer`s.
//!
//! Every operation processes all eight lanes of a lane-group at once.
//! Operands are 31·N-bit two's-complement integers split into N limbs of
//! 31 bits; carries ripple from the least-significant limb upward and the
//! carry out of the most-significant limb is discarded (values wrap).
//!
//! Squaring is the only multiply. It runs in four stages:
//! 1. `to_sign_magnitude` strips the sign, widening lanes into two 4×64 groups.
//! 2. Partial products `a[i]·a[j]` for `j ≥ i` (off-diagonal terms doubled)
//!    are accumulated into `2N` bins: low 31 bits into bin `i+j`, the rest
//!    into bin `i+j+1`.
//! 3. `sum_the_partials` ripples the bins back to 31-bit limbs.
//! 4. `shift_and_trim` drops the extra fraction bits, restoring the format.

use crate::lanes::{join, limb_mask, mul_lanes, split};
use crate::limb_buffer::{LimbBuffer, WideLimbBuffer};
use msetgen_core::{FixedPointFormat, MathOpCounts, BITS_PER_LIMB, LIMB_MASK, SIGN_BIT_MASK};
use wide::{i32x8, u32x8, u64x4, CmpEq, CmpGt};

const WIDE_LIMB_MASK: u64 = LIMB_MASK as u64;

/// Magnitude bits of the most-significant limb (sign bit excluded).
const TOP_LIMB_MAGNITUDE_MASK: u32 = LIMB_MASK ^ SIGN_BIT_MASK;

pub struct VectorFixedPointMath {
    format: FixedPointFormat,
    limb_count: usize,
    negated: LimbBuffer,
    magnitude: LimbBuffer,
    operand_low: Vec<u64x4>,
    operand_high: Vec<u64x4>,
    partials: WideLimbBuffer,
    op_counts: MathOpCounts,
}

impl VectorFixedPointMath {
    pub fn new(format: FixedPointFormat) -> Self {
        let limb_count = format.limb_count;
        Self {
            format,
            limb_count,
            negated: LimbBuffer::new(limb_count),
            magnitude: LimbBuffer::new(limb_count),
            operand_low: vec![u64x4::default(); limb_count],
            operand_high: vec![u64x4::default(); limb_count],
            partials: WideLimbBuffer::new(2 * limb_count),
            op_counts: MathOpCounts::default(),
        }
    }

    pub fn format(&self) -> FixedPointFormat {
        self.format
    }

    pub fn limb_count(&self) -> usize {
        self.limb_count
    }

    pub fn op_counts(&self) -> MathOpCounts {
        self.op_counts
    }

    pub fn reset_op_counts(&mut self) {
        self.op_counts = MathOpCounts::default();
    }

    /// Threshold vector for `is_greater_or_equal`, or None if `threshold`
    /// does not fit before the binary point.
    pub fn threshold_vector(&self, threshold: u32) -> Option<i32x8> {
        self.format
            .integer_to_top_limb(threshold)
            .map(|limb| i32x8::splat(limb as i32))
    }

    // ========================================================================
    // Add / Subtract / Negate
    // ========================================================================

    pub fn add(&mut self, left: &LimbBuffer, right: &LimbBuffer, result: &mut LimbBuffer) {
        add_limbs(left, right, result);
        self.op_counts.additions += self.limb_count as u64;
    }

    pub fn sub(&mut self, left: &LimbBuffer, right: &LimbBuffer, result: &mut LimbBuffer) {
        negate_limbs(right, &mut self.negated);
        add_limbs(left, &self.negated, result);
        self.op_counts.negations += 1;
        self.op_counts.additions += 2 * self.limb_count as u64;
    }

    pub fn negate(&mut self, source: &LimbBuffer, result: &mut LimbBuffer) {
        negate_limbs(source, result);
        self.op_counts.negations += 1;
        self.op_counts.additions += self.limb_count as u64;
    }

    // ========================================================================
    // Sign conversion
    // ========================================================================

    /// Split two's-complement lanes into magnitudes and a sign mask.
    ///
    /// Returns the mask of lanes that were negative.
    pub fn to_sign_magnitude(&mut self, source: &LimbBuffer, magnitude: &mut LimbBuffer) -> i32x8 {
        self.op_counts.conversions += 1;
        self.op_counts.additions += self.limb_count as u64;
        convert_to_sign_magnitude(source, magnitude)
    }

    /// Inverse of `to_sign_magnitude`: negate the lanes selected by `negative`.
    pub fn from_sign_magnitude(
        &mut self,
        magnitude: &LimbBuffer,
        negative: i32x8,
        result: &mut LimbBuffer,
    ) {
        negate_limbs(magnitude, result);
        let negative = limb_mask(negative);
        for i in 0..self.limb_count {
            result[i] = negative.blend(result[i], magnitude[i]);
        }
        self.op_counts.conversions += 1;
        self.op_counts.additions += self.limb_count as u64;
    }

    // ========================================================================
    // Square
    // ========================================================================

    /// `result = source²`, a non-negative magnitude in the same format.
    ///
    /// Squares at or above 2^(bits_before_binary_point − 1) wrap into the sign bit.
    pub fn square(&mut self, source: &LimbBuffer, result: &mut LimbBuffer) {
        convert_to_sign_magnitude(source, &mut self.magnitude);
        self.op_counts.conversions += 1;
        self.op_counts.additions += self.limb_count as u64;
        self.widen();

        self.multiply_partials();
        self.sum_the_partials();
        self.shift_and_trim(result);
    }

    fn widen(&mut self) {
        for i in 0..self.limb_count {
            let (low, high) = split(self.magnitude[i]);
            self.operand_low[i] = low;
            self.operand_high[i] = high;
        }
        self.op_counts.split_operations += self.limb_count as u64;
    }

    fn multiply_partials(&mut self) {
        let n = self.limb_count;
        let mask = u64x4::splat(WIDE_LIMB_MASK);
        self.partials.clear();

        for i in 0..n {
            for j in i..n {
                let mut low = mul_lanes(self.operand_low[i], self.operand_low[j]);
                let mut high = mul_lanes(self.operand_high[i], self.operand_high[j]);
                if i != j {
                    // a[i]·a[j] appears twice in the square
                    low = low + low;
                    high = high + high;
                }

                self.partials.low[i + j] = self.partials.low[i + j] + (low & mask);
                self.partials.low[i + j + 1] = self.partials.low[i + j + 1] + (low >> 31);
                self.partials.high[i + j] = self.partials.high[i + j] + (high & mask);
                self.partials.high[i + j + 1] = self.partials.high[i + j + 1] + (high >> 31);
            }
        }

        self.op_counts.multiplications += (n * (n + 1) / 2) as u64;
    }

    /// Normalize every bin to 31 bits, carrying the excess upward.
    fn sum_the_partials(&mut self) {
        let mask = u64x4::splat(WIDE_LIMB_MASK);
        let mut carry_low = u64x4::default();
        let mut carry_high = u64x4::default();

        for k in 0..self.partials.bin_count() {
            let low = self.partials.low[k] + carry_low;
            let high = self.partials.high[k] + carry_high;
            self.partials.low[k] = low & mask;
            self.partials.high[k] = high & mask;
            carry_low = low >> 31;
            carry_high = high >> 31;
        }

        self.op_counts.additions += self.partials.bin_count() as u64;
    }

    /// Keep the top N limbs of the 2N-limb product after shifting left by
    /// `bits_before_binary_point`.
    fn shift_and_trim(&mut self, result: &mut LimbBuffer) {
        let n = self.limb_count;
        let shift = self.format.bits_before_binary_point as i32;
        let back_shift = BITS_PER_LIMB as i32 - shift;
        let mask = u64x4::splat(WIDE_LIMB_MASK);

        for i in 0..n {
            let low = ((self.partials.low[n + i] << shift)
                | (self.partials.low[n + i - 1] >> back_shift))
                & mask;
            let high = ((self.partials.high[n + i] << shift)
                | (self.partials.high[n + i - 1] >> back_shift))
                & mask;
            result[i] = join(low, high);
        }

        self.op_counts.split_operations += n as u64;
    }

    // ========================================================================
    // Comparison
    // ========================================================================

    /// Per lane: is `value ≥ threshold`?
    ///
    /// Most-significant-limb comparison: only the top limb of `value` (sign
    /// bit masked off) is compared against `threshold`, which must come from
    /// `threshold_vector`. Exact for integer thresholds; values just below a
    /// non-integer threshold may compare equal.
    pub fn is_greater_or_equal(&mut self, value: &LimbBuffer, threshold: i32x8) -> i32x8 {
        let top = value.most_significant() & u32x8::splat(TOP_LIMB_MAGNITUDE_MASK);
        let top: i32x8 = bytemuck::cast(top);
        self.op_counts.comparisons += 1;
        !threshold.cmp_gt(top)
    }
}

fn add_limbs(left: &LimbBuffer, right: &LimbBuffer, result: &mut LimbBuffer) {
    let mask = u32x8::splat(LIMB_MASK);
    let mut carry = u32x8::default();

    for i in 0..result.limb_count() {
        let sum = left[i] + right[i] + carry;
        result[i] = sum & mask;
        carry = sum >> 31;
    }
}

/// Invert within 31 bits, then add one.
fn negate_limbs(source: &LimbBuffer, result: &mut LimbBuffer) {
    let mask = u32x8::splat(LIMB_MASK);
    let mut carry = u32x8::splat(1);

    for i in 0..result.limb_count() {
        let sum = (source[i] ^ mask) + carry;
        result[i] = sum & mask;
        carry = sum >> 31;
    }
}

fn sign_mask(value: &LimbBuffer) -> i32x8 {
    let sign = value.most_significant() & u32x8::splat(SIGN_BIT_MASK);
    let sign: i32x8 = bytemuck::cast(sign);
    sign.cmp_eq(i32x8::splat(SIGN_BIT_MASK as i32))
}

/// Negate the negative lanes of `source` into `magnitude`; returns the sign mask.
fn convert_to_sign_magnitude(source: &LimbBuffer, magnitude: &mut LimbBuffer) -> i32x8 {
    let negative = sign_mask(source);
    negate_limbs(source, magnitude);
    let select = limb_mask(negative);
    for i in 0..magnitude.limb_count() {
        magnitude[i] = select.blend(magnitude[i], source[i]);
    }
    negative
}
