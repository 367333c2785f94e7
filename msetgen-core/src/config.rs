//! Generator configuration.
//!
//! Static presets plus a JSON layer for overriding them. Presets are the
//! canonical defaults; callers pass a `GeneratorConfig` to the generator.

use crate::{
    format_for_sample_spacing, BinaryRational, BlockSize, FixedPointFormat, MapSectionError,
    MapSectionRequest,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Block dimensions used when a caller builds requests from this config.
    pub block_size: BlockSize,
    /// Integer bits of every format chosen from this config.
    pub bits_before_binary_point: u8,
    /// Escape threshold on |z|².
    pub threshold: u32,
    /// Collect `MathOpCounts` and return them with every response.
    pub collect_math_op_counts: bool,
}

/// Default configuration: 128×128 blocks, 8 integer bits, threshold 4.
pub static DEFAULT_GENERATOR_CONFIG: GeneratorConfig = GeneratorConfig {
    block_size: BlockSize::new(128, 128),
    bits_before_binary_point: 8,
    threshold: 4,
    collect_math_op_counts: false,
};

/// Same as the default, with op counting turned on.
pub static DIAGNOSTIC_GENERATOR_CONFIG: GeneratorConfig = GeneratorConfig {
    block_size: BlockSize::new(128, 128),
    bits_before_binary_point: 8,
    threshold: 4,
    collect_math_op_counts: true,
};

impl Default for GeneratorConfig {
    fn default() -> Self {
        DEFAULT_GENERATOR_CONFIG.clone()
    }
}

/// Look up a configuration preset by name.
pub fn get_generator_config(id: &str) -> Option<&'static GeneratorConfig> {
    match id {
        "default" => Some(&DEFAULT_GENERATOR_CONFIG),
        "diagnostic" => Some(&DIAGNOSTIC_GENERATOR_CONFIG),
        _ => None,
    }
}

impl GeneratorConfig {
    /// Parse a JSON override. Missing fields take default values.
    pub fn from_json(json: &str) -> Result<Self, MapSectionError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MapSectionError::Parse(format!("Invalid generator config: {}", e)))?;
        config.block_size.validate()?;
        Ok(config)
    }

    /// Build a fresh request, choosing the format from the sample spacing.
    pub fn request(
        &self,
        position: (BinaryRational, BinaryRational),
        sample_spacing: BinaryRational,
        target_iterations: u32,
    ) -> Result<MapSectionRequest, MapSectionError> {
        let format: FixedPointFormat = format_for_sample_spacing(
            &sample_spacing,
            target_iterations,
            self.bits_before_binary_point,
        )?;
        let request = MapSectionRequest::new(
            format,
            self.block_size,
            position,
            sample_spacing,
            target_iterations,
            self.threshold,
        );
        request.validate()?;
        Ok(request)
    }
}
