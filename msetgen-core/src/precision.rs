//! Precision calculation for block generation.
//!
//! Determines how many bits after the binary point are needed to compute a
//! block at a given sample spacing and iteration budget.

use crate::{BinaryRational, FixedPointFormat, MapSectionError};

/// Safety margin for rounding errors in arithmetic operations.
const SAFETY_BITS: usize = 20;

/// Calculate the bits after the binary point needed for a sample grid.
///
/// # Arguments
/// * `sample_spacing` - Distance between adjacent samples in map space
/// * `target_iterations` - Iteration budget; error grows by roughly one bit per doubling
///
/// # Returns
/// Required fraction bits, at least 32.
pub fn calculate_precision_bits(sample_spacing: &BinaryRational, target_iterations: u32) -> usize {
    // Bits needed to tell adjacent samples apart
    let spacing_bits = match sample_spacing.log2_floor() {
        Some(log2) if log2 < 0 => log2.unsigned_abs(),
        _ => 0,
    };

    let iter_bits = if target_iterations > 1 {
        (target_iterations as f64).log2().ceil() as usize
    } else {
        0
    };

    (spacing_bits + iter_bits + SAFETY_BITS).max(32)
}

/// Pick the smallest supported format for a sample grid.
pub fn format_for_sample_spacing(
    sample_spacing: &BinaryRational,
    target_iterations: u32,
    bits_before_binary_point: u8,
) -> Result<FixedPointFormat, MapSectionError> {
    let bits = calculate_precision_bits(sample_spacing, target_iterations);
    FixedPointFormat::for_precision_bits(bits, bits_before_binary_point)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_at_overview_spacing_is_small() {
        // 4 units across 1024 samples
        let spacing = BinaryRational::from_string("0.00390625", 64).unwrap();
        let bits = calculate_precision_bits(&spacing, 1000);
        assert_eq!(bits, 8 + 10 + SAFETY_BITS);
        let format = format_for_sample_spacing(&spacing, 1000, 8).unwrap();
        assert_eq!(format.limb_count, 2);
    }

    #[test]
    fn precision_increases_with_zoom() {
        let shallow = BinaryRational::from_string("1e-3", 128).unwrap();
        let deep = BinaryRational::from_string("1e-40", 256).unwrap();

        let bits_shallow = calculate_precision_bits(&shallow, 1000);
        let bits_deep = calculate_precision_bits(&deep, 1000);

        // 37 decimal digits ≈ 123 bits
        assert!(bits_deep >= bits_shallow + 120, "{} vs {}", bits_deep, bits_shallow);
    }

    #[test]
    fn precision_minimum_is_32() {
        let spacing = BinaryRational::from_i64(1);
        assert_eq!(calculate_precision_bits(&spacing, 1), 32);
    }

    #[test]
    fn extreme_zoom_exceeds_largest_format() {
        let spacing = BinaryRational::from_string("1e-500", 2048).unwrap();
        assert!(format_for_sample_spacing(&spacing, 1000, 8).is_err());
    }
}
