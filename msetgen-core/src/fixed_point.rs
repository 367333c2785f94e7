//! Scalar fixed-point values used to seed sample coordinates.

use crate::fixed_point_format::{BITS_PER_LIMB, LIMB_MASK, SIGN_BIT_MASK};
use crate::{BinaryRational, FixedPointFormat, MapSectionError};
use dashu::integer::{IBig, UBig};
use dashu_base::BitTest;
use dashu_float::FBig;

/// A signed fixed-point number stored as sign + magnitude limbs.
///
/// Limbs are least-significant first and each holds 31 bits. The magnitude
/// is always strictly below 2^(31·limb_count − 1) so the value also has a
/// two's-complement encoding in the same format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedPointValue {
    format: FixedPointFormat,
    negative: bool,
    magnitude: Vec<u32>,
}

impl FixedPointValue {
    pub fn zero(format: FixedPointFormat) -> Self {
        Self {
            format,
            negative: false,
            magnitude: vec![0; format.limb_count],
        }
    }

    /// Truncate an exact rational into `format`.
    ///
    /// Fails if the value does not fit before the binary point.
    pub fn from_rational(
        value: &BinaryRational,
        format: FixedPointFormat,
    ) -> Result<Self, MapSectionError> {
        let scaled = value.scaled_integer(format.fraction_bits());
        Self::from_scaled_integer(&scaled, format).ok_or_else(|| {
            MapSectionError::CoordinateOutOfRange {
                value: value.to_string(),
                bits_before_binary_point: format.bits_before_binary_point,
            }
        })
    }

    /// Parse a decimal string directly into `format`.
    pub fn from_string(val: &str, format: FixedPointFormat) -> Result<Self, MapSectionError> {
        // Extra bits so the base conversion does not round before truncation.
        let precision_bits = format.total_bits() + 64;
        let rational = BinaryRational::from_string(val, precision_bits)?;
        Self::from_rational(&rational, format)
    }

    /// Build from the signed integer `S` where value = S × 2^-fraction_bits.
    pub fn from_scaled_integer(scaled: &IBig, format: FixedPointFormat) -> Option<Self> {
        let negative = *scaled < IBig::ZERO;
        let magnitude = UBig::try_from(if negative {
            -scaled.clone()
        } else {
            scaled.clone()
        })
        .ok()?;

        if magnitude.bit_len() >= format.total_bits() {
            return None;
        }

        let mask = UBig::from(LIMB_MASK);
        let limbs = (0..format.limb_count)
            .map(|i| {
                let limb = (&magnitude >> (i * BITS_PER_LIMB)) & &mask;
                u32::try_from(limb).ok()
            })
            .collect::<Option<Vec<u32>>>()?;

        Some(Self {
            format,
            negative: negative && limbs.iter().any(|&l| l != 0),
            magnitude: limbs,
        })
    }

    /// Decode a two's-complement limb sequence.
    ///
    /// The most negative value (only the sign bit set) decodes to a magnitude
    /// that reaches the sign bit; it is still represented exactly.
    pub fn from_twos_complement(limbs: &[u32], format: FixedPointFormat) -> Self {
        debug_assert_eq!(limbs.len(), format.limb_count);
        let negative = limbs[format.limb_count - 1] & SIGN_BIT_MASK != 0;
        let magnitude = if negative {
            negate_limbs(limbs)
        } else {
            limbs.iter().map(|&l| l & LIMB_MASK).collect()
        };

        Self {
            format,
            negative,
            magnitude,
        }
    }

    /// Encode as 31·limb_count-bit two's complement, one limb per element.
    pub fn to_twos_complement(&self) -> Vec<u32> {
        if self.negative {
            negate_limbs(&self.magnitude)
        } else {
            self.magnitude.clone()
        }
    }

    pub fn format(&self) -> FixedPointFormat {
        self.format
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude.iter().all(|&l| l == 0)
    }

    pub fn magnitude_limbs(&self) -> &[u32] {
        &self.magnitude
    }

    /// The signed integer `S` where value = S × 2^-fraction_bits.
    pub fn scaled_integer(&self) -> IBig {
        let magnitude = self
            .magnitude
            .iter()
            .rev()
            .fold(IBig::ZERO, |acc, &limb| (acc << BITS_PER_LIMB) + IBig::from(limb));
        if self.negative {
            -magnitude
        } else {
            magnitude
        }
    }

    pub fn to_rational(&self) -> BinaryRational {
        BinaryRational::new(
            self.scaled_integer(),
            -(self.format.fraction_bits() as isize),
        )
    }

    pub fn to_fbig(&self) -> FBig {
        self.to_rational().to_fbig()
    }

    /// Convert to f64 (for logging and tests only).
    pub fn to_f64(&self) -> f64 {
        self.to_rational().to_f64()
    }
}

impl std::fmt::Display for FixedPointValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_rational())
    }
}

/// Two's-complement negation of a limb sequence: invert, add one, ripple the carry.
fn negate_limbs(limbs: &[u32]) -> Vec<u32> {
    let mut carry = 1u32;
    limbs
        .iter()
        .map(|&limb| {
            let sum = (!limb & LIMB_MASK) + carry;
            carry = sum >> BITS_PER_LIMB;
            sum & LIMB_MASK
        })
        .collect()
}
