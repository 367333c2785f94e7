//! Mandelbrot recurrence over one lane-group.
//!
//! z ← z² + c is computed with squares only:
//!   zi' = (zr + zi)² − zr² − zi² + ci
//!   zr' = zr² − zi² + cr
//! zr² and zi² of the current z are kept between calls, so each step costs
//! three squares (one for the cross term, two for the escape test).

use crate::limb_buffer::LimbBuffer;
use crate::vector_math::VectorFixedPointMath;
use msetgen_core::{FixedPointFormat, MapSectionError, MathOpCounts};
use wide::i32x8;

pub struct SamplePointIterator {
    math: VectorFixedPointMath,
    threshold: i32x8,
    zr_sqr: LimbBuffer,
    zi_sqr: LimbBuffer,
    sum: LimbBuffer,
    diff: LimbBuffer,
    cross: LimbBuffer,
}

impl SamplePointIterator {
    pub fn new(format: FixedPointFormat, threshold: u32) -> Result<Self, MapSectionError> {
        let math = VectorFixedPointMath::new(format);
        let limb_count = format.limb_count;
        let mut iterator = Self {
            math,
            threshold: i32x8::default(),
            zr_sqr: LimbBuffer::new(limb_count),
            zi_sqr: LimbBuffer::new(limb_count),
            sum: LimbBuffer::new(limb_count),
            diff: LimbBuffer::new(limb_count),
            cross: LimbBuffer::new(limb_count),
        };
        iterator.set_threshold(threshold)?;
        Ok(iterator)
    }

    pub fn format(&self) -> FixedPointFormat {
        self.math.format()
    }

    pub fn set_threshold(&mut self, threshold: u32) -> Result<(), MapSectionError> {
        let format = self.math.format();
        self.threshold =
            self.math
                .threshold_vector(threshold)
                .ok_or(MapSectionError::InvalidThreshold {
                    threshold,
                    bits_before_binary_point: format.bits_before_binary_point,
                })?;
        Ok(())
    }

    pub fn math_op_counts(&self) -> MathOpCounts {
        self.math.op_counts()
    }

    pub fn reset_op_counts(&mut self) {
        self.math.reset_op_counts();
    }

    /// Prepare zr² / zi² and test escape without advancing.
    ///
    /// Fresh lanes start at z₁ = c. Resumed lanes keep the z they were stored with.
    pub fn iterate_first_round(
        &mut self,
        cr: &LimbBuffer,
        ci: &LimbBuffer,
        zr: &mut LimbBuffer,
        zi: &mut LimbBuffer,
        resuming: bool,
    ) -> i32x8 {
        if !resuming {
            zr.copy_from(cr);
            zi.copy_from(ci);
        }
        self.square_and_test(zr, zi)
    }

    /// Advance z by one step and test the new value for escape.
    ///
    /// Must follow `iterate_first_round` or another `iterate` on the same z.
    pub fn iterate(
        &mut self,
        cr: &LimbBuffer,
        ci: &LimbBuffer,
        zr: &mut LimbBuffer,
        zi: &mut LimbBuffer,
    ) -> i32x8 {
        // (zr + zi)²
        self.math.add(zr, zi, &mut self.sum);
        self.math.square(&self.sum, &mut self.cross);

        // zi = (zr + zi)² − zr² − zi² + ci
        self.math.sub(&self.cross, &self.zr_sqr, &mut self.diff);
        self.math.sub(&self.diff, &self.zi_sqr, &mut self.cross);
        self.math.add(&self.cross, ci, zi);

        // zr = zr² − zi² + cr
        self.math.sub(&self.zr_sqr, &self.zi_sqr, &mut self.diff);
        self.math.add(&self.diff, cr, zr);

        self.square_and_test(zr, zi)
    }

    fn square_and_test(&mut self, zr: &LimbBuffer, zi: &LimbBuffer) -> i32x8 {
        self.math.square(zr, &mut self.zr_sqr);
        self.math.square(zi, &mut self.zi_sqr);
        self.math.add(&self.zr_sqr, &self.zi_sqr, &mut self.sum);
        self.math.is_greater_or_equal(&self.sum, self.threshold)
    }
}
