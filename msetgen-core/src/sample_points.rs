//! Sample coordinates for a block.

use crate::{BinaryRational, BlockSize, FixedPointFormat, FixedPointValue, MapSectionError};

/// Per-column real parts and per-row imaginary parts of the sample points.
#[derive(Clone, Debug)]
pub struct SamplePoints {
    pub crs: Vec<FixedPointValue>,
    pub cis: Vec<FixedPointValue>,
}

impl SamplePoints {
    /// Build `cr = x + col·spacing` and `ci = y + row·spacing`.
    ///
    /// Sums are exact; each coordinate is truncated into `format` once.
    pub fn build(
        position: &(BinaryRational, BinaryRational),
        sample_spacing: &BinaryRational,
        block_size: BlockSize,
        format: FixedPointFormat,
    ) -> Result<Self, MapSectionError> {
        let crs = Self::axis(&position.0, sample_spacing, block_size.width, format)?;
        let cis = Self::axis(&position.1, sample_spacing, block_size.height, format)?;
        Ok(Self { crs, cis })
    }

    fn axis(
        origin: &BinaryRational,
        sample_spacing: &BinaryRational,
        count: usize,
        format: FixedPointFormat,
    ) -> Result<Vec<FixedPointValue>, MapSectionError> {
        (0..count)
            .map(|i| {
                let offset = sample_spacing.mul_int(i as i64);
                FixedPointValue::from_rational(&origin.add(&offset), format)
            })
            .collect()
    }
}
