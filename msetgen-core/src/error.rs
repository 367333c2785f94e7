//! Error types for map section generation.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapSectionError {
    #[error("Unsupported limb count: {0}")]
    UnsupportedLimbCount(usize),

    #[error("Bits before the binary point must be in 1..=30, got {0}")]
    InvalidBinaryPoint(u8),

    #[error("Requested precision of {requested} bits exceeds the largest supported format ({max} bits)")]
    PrecisionTooHigh { requested: usize, max: usize },

    #[error("Block width must be a positive multiple of 8 and height positive, got {width}x{height}")]
    InvalidBlockSize { width: usize, height: usize },

    #[error("Coordinate {value} does not fit in a format with {bits_before_binary_point} bits before the binary point")]
    CoordinateOutOfRange {
        value: String,
        bits_before_binary_point: u8,
    },

    #[error("Target iterations must be in 1..=2147483647, got {0}")]
    InvalidTargetIterations(u32),

    #[error("Threshold {threshold} does not fit in a format with {bits_before_binary_point} bits before the binary point")]
    InvalidThreshold {
        threshold: u32,
        bits_before_binary_point: u8,
    },

    #[error("Previous values do not match the requested block: {0}")]
    PreviousValuesMismatch(String),

    #[error("Failed to parse number: {0}")]
    Parse(String),
}
