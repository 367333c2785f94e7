pub mod binary_rational;
pub mod config;
pub mod error;
pub mod fixed_point;
pub mod fixed_point_format;
pub mod map_section;
pub mod precision;
pub mod sample_points;

pub use binary_rational::BinaryRational;
pub use config::{
    get_generator_config, GeneratorConfig, DEFAULT_GENERATOR_CONFIG, DIAGNOSTIC_GENERATOR_CONFIG,
};
pub use error::MapSectionError;
pub use fixed_point::FixedPointValue;
pub use fixed_point_format::{
    FixedPointFormat, BITS_PER_LIMB, LIMB_MASK, SIGN_BIT_MASK, SUPPORTED_LIMB_COUNTS,
};
pub use map_section::{
    BlockSize, MapSectionRequest, MapSectionResponse, MapSectionValues, MathOpCounts, ZValues,
    LANES, MAX_TARGET_ITERATIONS,
};
pub use precision::{calculate_precision_bits, format_for_sample_spacing};
pub use sample_points::SamplePoints;
