use crate::MapSectionError;
use dashu::integer::{IBig, UBig};
use dashu_base::{Approximation, BitTest};
use dashu_float::{DBig, FBig};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Exact arbitrary-precision number with a power-of-two denominator.
///
/// Value = mantissa × 2^exponent. Map positions and sample spacings are carried
/// in this form so that `origin + n·spacing` is exact before it is truncated
/// into a fixed-point format.
#[derive(Clone, Debug)]
pub struct BinaryRational {
    mantissa: IBig,
    exponent: isize,
}

impl BinaryRational {
    pub fn new(mantissa: IBig, exponent: isize) -> Self {
        Self { mantissa, exponent }
    }

    pub fn zero() -> Self {
        Self::new(IBig::ZERO, 0)
    }

    pub fn from_i64(val: i64) -> Self {
        Self::new(IBig::from(val), 0)
    }

    /// Exact conversion from f64. Fails for NaN and infinities.
    pub fn from_f64(val: f64) -> Result<Self, MapSectionError> {
        if val == 0.0 {
            return Ok(Self::zero());
        }
        let fbig = FBig::try_from(val)
            .map_err(|e| MapSectionError::Parse(format!("Failed to convert {}: {:?}", val, e)))?;
        Ok(Self::from_fbig(&fbig))
    }

    /// Parse a decimal string, keeping `precision_bits` significant bits.
    ///
    /// Decimal fractions such as "0.1" have no finite binary expansion; the
    /// conversion to base 2 is done in one step at the target precision.
    pub fn from_string(val: &str, precision_bits: usize) -> Result<Self, MapSectionError> {
        let dbig = val
            .trim()
            .parse::<DBig>()
            .map_err(|e| MapSectionError::Parse(format!("Failed to parse DBig: {}", e)))?;
        if dbig == DBig::ZERO {
            return Ok(Self::zero());
        }
        let fbig = match dbig.with_base_and_precision::<2>(precision_bits) {
            Approximation::Exact(v) => v,
            Approximation::Inexact(v, _) => v,
        };
        let repr = fbig.repr();
        Ok(Self::new(repr.significand().clone(), repr.exponent()))
    }

    pub fn from_fbig(value: &FBig) -> Self {
        let repr = value.repr();
        Self::new(repr.significand().clone(), repr.exponent())
    }

    pub fn mantissa(&self) -> &IBig {
        &self.mantissa
    }

    pub fn exponent(&self) -> isize {
        self.exponent
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == IBig::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa < IBig::ZERO
    }

    pub fn add(&self, other: &Self) -> Self {
        let (a, b, exponent) = Self::align(self, other);
        Self::new(a + b, exponent)
    }

    pub fn sub(&self, other: &Self) -> Self {
        let (a, b, exponent) = Self::align(self, other);
        Self::new(a - b, exponent)
    }

    /// Exact product. Mantissa sizes add, so keep this out of long loops.
    pub fn mul(&self, other: &Self) -> Self {
        Self::new(&self.mantissa * &other.mantissa, self.exponent + other.exponent)
    }

    pub fn mul_int(&self, factor: i64) -> Self {
        Self::new(&self.mantissa * IBig::from(factor), self.exponent)
    }

    pub fn neg(&self) -> Self {
        Self::new(-self.mantissa.clone(), self.exponent)
    }

    /// value × 2^fraction_bits, truncated toward zero.
    pub fn scaled_integer(&self, fraction_bits: usize) -> IBig {
        let shift = self.exponent + fraction_bits as isize;
        if shift >= 0 {
            return self.mantissa.clone() << shift as usize;
        }

        let negative = self.is_negative();
        let magnitude = if negative {
            -self.mantissa.clone()
        } else {
            self.mantissa.clone()
        };
        let truncated = magnitude >> shift.unsigned_abs();
        if negative {
            -truncated
        } else {
            truncated
        }
    }

    /// floor(log2(|value|)), or None for zero.
    pub fn log2_floor(&self) -> Option<isize> {
        if self.is_zero() {
            return None;
        }
        let magnitude = if self.is_negative() {
            -self.mantissa.clone()
        } else {
            self.mantissa.clone()
        };
        let bits = UBig::try_from(magnitude).map(|m| m.bit_len()).unwrap_or(1);
        Some(bits as isize - 1 + self.exponent)
    }

    pub fn to_fbig(&self) -> FBig {
        FBig::from_parts(self.mantissa.clone(), self.exponent)
    }

    /// Convert to f64 (for logging and tests only).
    pub fn to_f64(&self) -> f64 {
        self.to_fbig().to_f64().value()
    }

    fn align(a: &Self, b: &Self) -> (IBig, IBig, isize) {
        match a.exponent.cmp(&b.exponent) {
            Ordering::Equal => (a.mantissa.clone(), b.mantissa.clone(), a.exponent),
            Ordering::Less => {
                let shift = (b.exponent - a.exponent) as usize;
                (a.mantissa.clone(), b.mantissa.clone() << shift, a.exponent)
            }
            Ordering::Greater => {
                let shift = (a.exponent - b.exponent) as usize;
                (a.mantissa.clone() << shift, b.mantissa.clone(), b.exponent)
            }
        }
    }
}

impl PartialEq for BinaryRational {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BinaryRational {}

impl PartialOrd for BinaryRational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BinaryRational {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b, _) = Self::align(self, other);
        a.cmp(&b)
    }
}

impl std::fmt::Display for BinaryRational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_fbig())
    }
}

#[derive(Serialize, Deserialize)]
struct BinaryRationalSerde {
    mantissa: String,
    exponent: isize,
}

impl Serialize for BinaryRational {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let serde = BinaryRationalSerde {
            mantissa: self.mantissa.to_string(),
            exponent: self.exponent,
        };

        serde.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BinaryRational {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let serde = BinaryRationalSerde::deserialize(deserializer)?;
        let mantissa = serde
            .mantissa
            .parse::<IBig>()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse IBig: {}", e)))?;

        Ok(BinaryRational::new(mantissa, serde.exponent))
    }
}
