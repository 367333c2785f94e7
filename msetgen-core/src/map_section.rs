//! Request and result types exchanged with the surrounding worker pool.

use crate::{BinaryRational, FixedPointFormat, FixedPointValue, MapSectionError};
use serde::{Deserialize, Serialize};

/// Lanes per SIMD vector; block widths must be a multiple of this.
pub const LANES: usize = 8;

/// Largest iteration budget; counts are held in signed 32-bit lanes.
pub const MAX_TARGET_ITERATIONS: u32 = i32::MAX as u32;

/// Dimensions of a block in samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockSize {
    pub width: usize,
    pub height: usize,
}

impl BlockSize {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn validate(&self) -> Result<(), MapSectionError> {
        if self.width == 0 || self.width % LANES != 0 || self.height == 0 {
            return Err(MapSectionError::InvalidBlockSize {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    pub fn values_per_row(&self) -> usize {
        self.width
    }

    pub fn vectors_per_row(&self) -> usize {
        self.width / LANES
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// Counts of arithmetic primitives executed, for performance diagnostics.
///
/// Every counter is per lane-group operation, not per lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathOpCounts {
    /// 32×32→64 limb products.
    pub multiplications: u64,
    /// Limb additions, including carry propagation steps.
    pub additions: u64,
    /// Whole-value two's-complement negations.
    pub negations: u64,
    /// Two's-complement to sign-magnitude conversions.
    pub conversions: u64,
    /// Escape threshold comparisons.
    pub comparisons: u64,
    /// Narrow/widen splits between 8×32 and 2×4×64 lane layouts.
    pub split_operations: u64,
}

/// Final Z values per pixel, as two's-complement limbs.
///
/// Pixel `p`'s limbs are `zrs[p * limb_count..(p + 1) * limb_count]`,
/// least-significant first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZValues {
    pub limb_count: usize,
    pub zrs: Vec<u32>,
    pub zis: Vec<u32>,
}

impl ZValues {
    pub fn zeroed(limb_count: usize, pixel_count: usize) -> Self {
        Self {
            limb_count,
            zrs: vec![0; limb_count * pixel_count],
            zis: vec![0; limb_count * pixel_count],
        }
    }

    pub fn pixel_count(&self) -> usize {
        if self.limb_count == 0 {
            0
        } else {
            self.zrs.len() / self.limb_count
        }
    }

    pub fn zr_limbs(&self, pixel: usize) -> &[u32] {
        &self.zrs[pixel * self.limb_count..(pixel + 1) * self.limb_count]
    }

    pub fn zi_limbs(&self, pixel: usize) -> &[u32] {
        &self.zis[pixel * self.limb_count..(pixel + 1) * self.limb_count]
    }

    /// Decode pixel `pixel`'s Z value in `format`.
    pub fn value(&self, pixel: usize, format: FixedPointFormat) -> (FixedPointValue, FixedPointValue) {
        (
            FixedPointValue::from_twos_complement(self.zr_limbs(pixel), format),
            FixedPointValue::from_twos_complement(self.zi_limbs(pixel), format),
        )
    }
}

/// Per-pixel state of a computed block, sufficient to resume it later.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSectionValues {
    pub format: FixedPointFormat,
    /// Iteration budget these values were computed to.
    pub target_iterations: u32,
    /// Iteration count per pixel, row-major.
    pub counts: Vec<u32>,
    /// Escape flag per pixel, row-major.
    pub escaped: Vec<bool>,
    /// True for rows in which every pixel escaped.
    pub row_has_escaped: Vec<bool>,
    pub z_values: ZValues,
}

impl MapSectionValues {
    pub fn new(format: FixedPointFormat, block_size: BlockSize, target_iterations: u32) -> Self {
        let pixel_count = block_size.pixel_count();
        Self {
            format,
            target_iterations,
            counts: vec![0; pixel_count],
            escaped: vec![false; pixel_count],
            row_has_escaped: vec![false; block_size.height],
            z_values: ZValues::zeroed(format.limb_count, pixel_count),
        }
    }

    /// Check array sizes against a block. Format mismatches are not checked here.
    pub fn check_shape(&self, block_size: BlockSize) -> Result<(), MapSectionError> {
        let pixel_count = block_size.pixel_count();
        if self.counts.len() != pixel_count || self.escaped.len() != pixel_count {
            return Err(MapSectionError::PreviousValuesMismatch(format!(
                "expected {} pixels, got {} counts and {} escape flags",
                pixel_count,
                self.counts.len(),
                self.escaped.len()
            )));
        }
        if self.row_has_escaped.len() != block_size.height {
            return Err(MapSectionError::PreviousValuesMismatch(format!(
                "expected {} row flags, got {}",
                block_size.height,
                self.row_has_escaped.len()
            )));
        }
        if self.z_values.limb_count != self.format.limb_count
            || self.z_values.zrs.len() != pixel_count * self.z_values.limb_count
            || self.z_values.zis.len() != pixel_count * self.z_values.limb_count
        {
            return Err(MapSectionError::PreviousValuesMismatch(
                "z values do not match the stored format".to_string(),
            ));
        }
        Ok(())
    }
}

fn abs(value: &BinaryRational) -> BinaryRational {
    if value.is_negative() {
        value.neg()
    } else {
        value.clone()
    }
}

/// A request to compute one block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapSectionRequest {
    pub format: FixedPointFormat,
    pub block_size: BlockSize,
    /// Map coordinates of the sample at column 0, row 0.
    pub position: (BinaryRational, BinaryRational),
    /// Distance between adjacent samples, in both directions.
    pub sample_spacing: BinaryRational,
    pub target_iterations: u32,
    /// Escape when |z|² reaches this value.
    pub threshold: u32,
    /// Values from an earlier, lower-budget run of the same block.
    #[serde(default)]
    pub previous: Option<MapSectionValues>,
}

impl MapSectionRequest {
    pub fn new(
        format: FixedPointFormat,
        block_size: BlockSize,
        position: (BinaryRational, BinaryRational),
        sample_spacing: BinaryRational,
        target_iterations: u32,
        threshold: u32,
    ) -> Self {
        Self {
            format,
            block_size,
            position,
            sample_spacing,
            target_iterations,
            threshold,
            previous: None,
        }
    }

    /// Continue from a previous result instead of starting fresh.
    pub fn resume_from(mut self, previous: MapSectionValues) -> Self {
        self.previous = Some(previous);
        self
    }

    pub fn is_resuming(&self) -> bool {
        self.previous.is_some()
    }

    pub fn validate(&self) -> Result<(), MapSectionError> {
        self.format.validate()?;
        self.block_size.validate()?;
        if self.target_iterations == 0 || self.target_iterations > MAX_TARGET_ITERATIONS {
            return Err(MapSectionError::InvalidTargetIterations(self.target_iterations));
        }
        if self.format.integer_to_top_limb(self.threshold).is_none() {
            return Err(MapSectionError::InvalidThreshold {
                threshold: self.threshold,
                bits_before_binary_point: self.format.bits_before_binary_point,
            });
        }
        self.check_escape_headroom()?;
        if let Some(previous) = &self.previous {
            previous.check_shape(self.block_size)?;
        }
        Ok(())
    }

    /// Largest |cr| and |ci| over the block's sample points.
    pub fn coordinate_extents(&self) -> (BinaryRational, BinaryRational) {
        let extent = |origin: &BinaryRational, count: usize| {
            let last = origin.add(&self.sample_spacing.mul_int(count as i64 - 1));
            abs(origin).max(abs(&last))
        };
        (
            extent(&self.position.0, self.block_size.width),
            extent(&self.position.1, self.block_size.height),
        )
    }

    /// Every |z|² up to and including the escaping one must stay below the
    /// sign bit, or the escape test reads a wrapped value.
    ///
    /// Before escape |z| < √t, so afterwards |z| < t + |c|. Requires
    /// (t + |c|)² < 2^(bits_before_binary_point − 1), checked without roots as
    /// 4t²|c|² < (L − t² − |c|²)² with L − t² − |c|² > 0.
    fn check_escape_headroom(&self) -> Result<(), MapSectionError> {
        let bits = self.format.bits_before_binary_point;
        let limit = BinaryRational::from_i64(1i64 << (bits - 1));
        let threshold = BinaryRational::from_i64(self.threshold as i64);
        let threshold_sqr = threshold.mul(&threshold);
        if threshold_sqr >= limit {
            return Err(MapSectionError::InvalidThreshold {
                threshold: self.threshold,
                bits_before_binary_point: bits,
            });
        }

        let (cr, ci) = self.coordinate_extents();
        let c_sqr = cr.mul(&cr).add(&ci.mul(&ci));
        let room = limit.sub(&threshold_sqr).sub(&c_sqr);
        let cross = threshold_sqr.mul_int(4).mul(&c_sqr);
        if room <= BinaryRational::zero() || cross >= room.mul(&room) {
            return Err(MapSectionError::CoordinateOutOfRange {
                value: format!("({}, {})", cr, ci),
                bits_before_binary_point: bits,
            });
        }
        Ok(())
    }
}

/// The computed block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapSectionResponse {
    pub block_size: BlockSize,
    pub values: MapSectionValues,
    /// False only if the request was cancelled.
    pub request_completed: bool,
    /// True if every pixel in the block escaped.
    pub all_rows_have_escaped: bool,
    #[serde(default)]
    pub math_op_counts: Option<MathOpCounts>,
}

impl MapSectionResponse {
    pub fn count(&self, col: usize, row: usize) -> u32 {
        self.values.counts[row * self.block_size.width + col]
    }

    pub fn escaped(&self, col: usize, row: usize) -> bool {
        self.values.escaped[row * self.block_size.width + col]
    }

    pub fn z_value(&self, col: usize, row: usize) -> (FixedPointValue, FixedPointValue) {
        self.values
            .z_values
            .value(row * self.block_size.width + col, self.values.format)
    }

    pub fn escaped_count(&self) -> usize {
        self.values.escaped.iter().filter(|&&e| e).count()
    }

    /// Values to pass back in a later request with a higher iteration budget.
    pub fn into_previous(self) -> MapSectionValues {
        self.values
    }
}
