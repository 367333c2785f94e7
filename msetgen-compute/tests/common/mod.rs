//! Shared helpers for the generator integration tests.
#![allow(dead_code)]

use dashu::integer::IBig;
use msetgen_compute::{
    BinaryRational, BlockSize, FixedPointFormat, MapSectionRequest, MapSectionResponse,
    SamplePoints,
};

pub fn format(limb_count: usize) -> FixedPointFormat {
    FixedPointFormat::new(limb_count, 8).unwrap()
}

pub fn rational(s: &str) -> BinaryRational {
    BinaryRational::from_string(s, 256).unwrap()
}

/// Block whose samples cover `[x, x + width·spacing) × [y, y + height·spacing)`.
pub fn request(
    format: FixedPointFormat,
    block_size: BlockSize,
    (x, y): (&str, &str),
    spacing: &str,
    target_iterations: u32,
) -> MapSectionRequest {
    MapSectionRequest::new(
        format,
        block_size,
        (rational(x), rational(y)),
        rational(spacing),
        target_iterations,
        4,
    )
}

/// Exact per-pixel result: count, escaped, zr, zi (scaled integers).
#[derive(Debug, PartialEq)]
pub struct ReferencePixel {
    pub count: u32,
    pub escaped: bool,
    pub zr: IBig,
    pub zi: IBig,
}

/// Scalar fixed-point Mandelbrot on scaled integers.
///
/// Squares are floored to the format's fraction bits, matching the vector
/// engine bit for bit as long as nothing leaves the fixed-point window.
pub fn reference_pixel(
    cr: &IBig,
    ci: &IBig,
    format: FixedPointFormat,
    target_iterations: u32,
    threshold: u32,
) -> ReferencePixel {
    let fraction_bits = format.fraction_bits();
    let square = |x: &IBig| (x * x) >> fraction_bits;
    let limit = IBig::from(threshold) << fraction_bits;

    let mut zr = cr.clone();
    let mut zi = ci.clone();
    let mut count = 1;
    loop {
        let zr2 = square(&zr);
        let zi2 = square(&zi);
        if &zr2 + &zi2 >= limit {
            return ReferencePixel { count, escaped: true, zr, zi };
        }
        if count == target_iterations {
            return ReferencePixel { count, escaped: false, zr, zi };
        }
        let cross = square(&(&zr + &zi));
        zi = cross - &zr2 - &zi2 + ci;
        zr = zr2 - zi2 + cr;
        count += 1;
    }
}

/// Compare every pixel of `response` against the scalar reference.
pub fn assert_matches_reference(request: &MapSectionRequest, response: &MapSectionResponse) {
    let points = SamplePoints::build(
        &request.position,
        &request.sample_spacing,
        request.block_size,
        request.format,
    )
    .unwrap();

    for row in 0..request.block_size.height {
        for col in 0..request.block_size.width {
            let expected = reference_pixel(
                &points.crs[col].scaled_integer(),
                &points.cis[row].scaled_integer(),
                request.format,
                request.target_iterations,
                request.threshold,
            );
            let (zr, zi) = response.z_value(col, row);
            let actual = ReferencePixel {
                count: response.count(col, row),
                escaped: response.escaped(col, row),
                zr: zr.scaled_integer(),
                zi: zi.scaled_integer(),
            };
            assert_eq!(actual, expected, "pixel ({}, {})", col, row);
        }
    }
}
