mod common;

use common::{assert_matches_reference, format, rational, request};
use msetgen_compute::{
    BlockSize, FixedPointFormat, GeneratorConfig, MapSectionError, MapSectionGenerator,
    DIAGNOSTIC_GENERATOR_CONFIG,
};

#[test]
fn test_point_inside_main_cardioid_never_escapes() {
    let req = request(format(2), BlockSize::new(8, 1), ("-0.75", "0"), "0", 1000);
    let response = MapSectionGenerator::default().generate(&req).unwrap();

    for col in 0..8 {
        assert!(!response.escaped(col, 0));
        assert_eq!(response.count(col, 0), 1000);
    }
    assert!(response.request_completed);
    assert!(!response.all_rows_have_escaped);
}

#[test]
fn test_one_plus_i_escapes_on_second_iteration() {
    let req = request(format(3), BlockSize::new(8, 1), ("1", "1"), "0", 100);
    let response = MapSectionGenerator::default().generate(&req).unwrap();

    assert!(response.all_rows_have_escaped);
    assert_eq!(response.escaped_count(), 8);
    // z1 = 1 + i, z2 = 1 + 3i
    let (zr, zi) = response.z_value(3, 0);
    assert_eq!(response.count(3, 0), 2);
    assert_eq!(zr.to_f64(), 1.0);
    assert_eq!(zi.to_f64(), 3.0);
    assert_matches_reference(&req, &response);
}

#[test]
fn test_all_interior_block_runs_to_target() {
    let req = request(format(2), BlockSize::new(8, 2), ("0", "0"), "0", 5000);
    let response = MapSectionGenerator::default().generate(&req).unwrap();

    assert!(response.request_completed);
    assert!(!response.all_rows_have_escaped);
    assert!(response.values.counts.iter().all(|&c| c == 5000));
    assert!(response.values.row_has_escaped.iter().all(|&e| !e));
}

#[test]
fn test_overview_block_matches_exact_reference() {
    let req = request(
        format(2),
        BlockSize::new(32, 16),
        ("-2", "-1.25"),
        "0.078125",
        200,
    );
    let response = MapSectionGenerator::default().generate(&req).unwrap();

    assert_matches_reference(&req, &response);
    assert!(response.escaped_count() > 0);
    assert!(response.escaped_count() < 32 * 16);
}

#[test]
fn test_every_supported_limb_count_matches_reference() {
    let mut generator = MapSectionGenerator::default();
    for limbs in msetgen_compute::SUPPORTED_LIMB_COUNTS {
        let req = request(
            format(limbs),
            BlockSize::new(8, 4),
            ("-0.8", "0.1"),
            "0.015625",
            120,
        );
        let response = generator.generate(&req).unwrap();
        assert_eq!(generator.current_format(), Some(format(limbs)));
        assert_matches_reference(&req, &response);
    }
}

#[test]
fn test_deep_zoom_matches_exact_reference() {
    let req = request(
        format(6),
        BlockSize::new(8, 2),
        ("-0.743643887037158704752191506114774", "0.131825904205311970493132056385139"),
        "0.000000000000000000000000000001",
        500,
    );
    let response = MapSectionGenerator::default().generate(&req).unwrap();
    assert_matches_reference(&req, &response);
}

#[test]
fn test_target_of_one_counts_only_the_starting_point() {
    let req = request(format(2), BlockSize::new(8, 1), ("-3", "0"), "0.5", 1);
    let response = MapSectionGenerator::default().generate(&req).unwrap();

    // c = -3, -2.5, -2: |c|² ≥ 4; the rest stop at the budget
    for col in 0..8 {
        assert_eq!(response.count(col, 0), 1);
        assert_eq!(response.escaped(col, 0), col < 3, "col {}", col);
    }
}

#[test]
fn test_engine_is_reused_until_format_changes() {
    let mut generator = MapSectionGenerator::default();
    assert_eq!(generator.current_format(), None);

    let req = request(format(2), BlockSize::new(8, 1), ("0", "0"), "0.01", 10);
    generator.generate(&req).unwrap();
    assert_eq!(generator.current_format(), Some(format(2)));

    let req = request(format(4), BlockSize::new(8, 1), ("0", "0"), "0.01", 10);
    let response = generator.generate(&req).unwrap();
    assert_eq!(generator.current_format(), Some(format(4)));
    assert_eq!(response.values.z_values.limb_count, 4);
}

#[test]
fn test_op_counts_follow_config() {
    let req = request(format(2), BlockSize::new(8, 1), ("-2", "0"), "0.25", 50);

    let plain = MapSectionGenerator::default().generate(&req).unwrap();
    assert!(plain.math_op_counts.is_none());

    let mut diagnostic = MapSectionGenerator::new(DIAGNOSTIC_GENERATOR_CONFIG.clone());
    let first = diagnostic.generate(&req).unwrap().math_op_counts.unwrap();
    assert!(first.multiplications > 0);
    assert!(first.comparisons > 0);

    // counters start over with every request
    let second = diagnostic.generate(&req).unwrap().math_op_counts.unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_invalid_requests_are_rejected() {
    let mut generator = MapSectionGenerator::default();

    let req = request(format(2), BlockSize::new(12, 4), ("0", "0"), "0.1", 10);
    assert!(matches!(
        generator.generate(&req),
        Err(MapSectionError::InvalidBlockSize { width: 12, height: 4 })
    ));

    let req = request(format(2), BlockSize::new(8, 1), ("0", "0"), "0.1", 0);
    assert_eq!(
        generator.generate(&req).unwrap_err(),
        MapSectionError::InvalidTargetIterations(0)
    );

    let req = request(
        format(2),
        BlockSize::new(8, 1),
        ("0", "0"),
        "0.1",
        msetgen_compute::MAX_TARGET_ITERATIONS + 1,
    );
    assert_eq!(
        generator.generate(&req).unwrap_err(),
        MapSectionError::InvalidTargetIterations(msetgen_compute::MAX_TARGET_ITERATIONS + 1)
    );

    // 4 integer bits cannot hold |z2|² = 10 for c = 1 + i
    let req = request(
        FixedPointFormat::new(2, 4).unwrap(),
        BlockSize::new(8, 1),
        ("1", "1"),
        "0",
        10,
    );
    assert!(matches!(
        generator.generate(&req),
        Err(MapSectionError::InvalidThreshold { threshold: 4, .. })
    ));

    let req = request(format(2), BlockSize::new(8, 1), ("200", "0"), "0.1", 10);
    assert!(matches!(
        generator.generate(&req),
        Err(MapSectionError::CoordinateOutOfRange { .. })
    ));

    let mut req = request(format(2), BlockSize::new(8, 1), ("0", "0"), "0.1", 10);
    req.format = FixedPointFormat {
        limb_count: 9,
        bits_before_binary_point: 8,
    };
    assert_eq!(
        generator.generate(&req).unwrap_err(),
        MapSectionError::UnsupportedLimbCount(9)
    );

    let mut req = request(format(2), BlockSize::new(8, 1), ("0", "0"), "0.1", 10);
    req.threshold = 1000;
    assert!(matches!(
        generator.generate(&req),
        Err(MapSectionError::InvalidThreshold { threshold: 1000, .. })
    ));
}

#[test]
fn test_config_builds_requests_with_matching_precision() {
    let config = GeneratorConfig {
        block_size: BlockSize::new(16, 8),
        ..GeneratorConfig::default()
    };
    let req = config
        .request((rational("-0.5"), rational("0.5")), rational("0.0001"), 300)
        .unwrap();
    assert_eq!(req.block_size, BlockSize::new(16, 8));
    assert_eq!(req.threshold, 4);

    let response = MapSectionGenerator::new(config).generate(&req).unwrap();
    assert_matches_reference(&req, &response);
}
