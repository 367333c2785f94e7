//! Fixed-point number format shared by scalar seeds and vector limb buffers.
//!
//! A value with `limb_count` limbs is a 31·limb_count-bit two's-complement
//! integer `S`, interpreted as `S × 2^(bits_before_binary_point − 31·limb_count)`.
//! Each limb carries 31 significant bits; bit 31 is headroom for carries.

use crate::MapSectionError;
use serde::{Deserialize, Serialize};

/// Significant bits per limb.
pub const BITS_PER_LIMB: usize = 31;

/// Mask selecting the significant bits of a limb.
pub const LIMB_MASK: u32 = 0x7FFF_FFFF;

/// Sign bit of the most-significant limb.
pub const SIGN_BIT_MASK: u32 = 0x4000_0000;

/// Limb counts the engine is built for, smallest first.
pub const SUPPORTED_LIMB_COUNTS: [usize; 11] = [1, 2, 3, 4, 5, 6, 7, 8, 10, 12, 16];

/// log2(10), for converting decimal digits to bits.
const BITS_PER_DECIMAL_DIGIT: f64 = std::f64::consts::LOG2_10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedPointFormat {
    pub limb_count: usize,
    pub bits_before_binary_point: u8,
}

impl FixedPointFormat {
    pub fn new(limb_count: usize, bits_before_binary_point: u8) -> Result<Self, MapSectionError> {
        let format = Self {
            limb_count,
            bits_before_binary_point,
        };
        format.validate()?;
        Ok(format)
    }

    /// Smallest supported format with at least `fraction_bits` bits after the binary point.
    pub fn for_precision_bits(
        fraction_bits: usize,
        bits_before_binary_point: u8,
    ) -> Result<Self, MapSectionError> {
        let before = bits_before_binary_point as usize;
        let limb_count = SUPPORTED_LIMB_COUNTS
            .iter()
            .copied()
            .find(|&n| n * BITS_PER_LIMB >= fraction_bits + before)
            .ok_or(MapSectionError::PrecisionTooHigh {
                requested: fraction_bits + before,
                max: Self::max_total_bits(),
            })?;
        Self::new(limb_count, bits_before_binary_point)
    }

    /// Smallest supported format resolving `decimal_digits` digits after the decimal point.
    pub fn for_decimal_precision(
        decimal_digits: usize,
        bits_before_binary_point: u8,
    ) -> Result<Self, MapSectionError> {
        let fraction_bits = (decimal_digits as f64 * BITS_PER_DECIMAL_DIGIT).ceil() as usize;
        Self::for_precision_bits(fraction_bits, bits_before_binary_point)
    }

    pub fn validate(&self) -> Result<(), MapSectionError> {
        if !SUPPORTED_LIMB_COUNTS.contains(&self.limb_count) {
            return Err(MapSectionError::UnsupportedLimbCount(self.limb_count));
        }
        if self.bits_before_binary_point == 0 || self.bits_before_binary_point as usize >= BITS_PER_LIMB {
            return Err(MapSectionError::InvalidBinaryPoint(self.bits_before_binary_point));
        }
        Ok(())
    }

    pub fn limb_count(&self) -> usize {
        self.limb_count
    }

    pub fn bits_before_binary_point(&self) -> u8 {
        self.bits_before_binary_point
    }

    pub fn total_bits(&self) -> usize {
        self.limb_count * BITS_PER_LIMB
    }

    /// Bits after the binary point.
    pub fn fraction_bits(&self) -> usize {
        self.total_bits() - self.bits_before_binary_point as usize
    }

    /// Most-significant-limb encoding of a non-negative integer, or None if it
    /// would reach the sign bit.
    pub fn integer_to_top_limb(&self, value: u32) -> Option<u32> {
        let shift = BITS_PER_LIMB - self.bits_before_binary_point as usize;
        let encoded = (value as u64) << shift;
        if encoded >= SIGN_BIT_MASK as u64 {
            None
        } else {
            Some(encoded as u32)
        }
    }

    fn max_total_bits() -> usize {
        SUPPORTED_LIMB_COUNTS[SUPPORTED_LIMB_COUNTS.len() - 1] * BITS_PER_LIMB
    }
}
