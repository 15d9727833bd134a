use super::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

const LEVEL_VALUES: [f64; LEVEL_COUNT] = [0.1, 0.2, 0.3, 0.4, 0.5];

/// Helper: classifier fed `count` samples cycling through the five level values
fn classifier_with_levels(count: usize) -> EnergyClassifier {
    let mut classifier = EnergyClassifier::new(EnergyConfig::default());
    for i in 0..count {
        let time = i as f64 * 0.01;
        classifier.add_rms_sample(time, LEVEL_VALUES[i % LEVEL_COUNT]);
        classifier.update(time);
    }
    classifier
}

#[test]
fn test_unknown_before_min_samples() {
    let classifier = classifier_with_levels(49);
    assert_eq!(classifier.current_energy_level(), UNKNOWN_LEVEL);
    assert_eq!(classifier.cluster_centers(), None);
    assert_eq!(classifier.pulse_threshold(), None);
    assert_eq!(classifier.cluster_passes(), 0);
}

#[test]
fn test_first_clustering_at_min_samples() {
    let classifier = classifier_with_levels(50);
    assert_eq!(classifier.cluster_passes(), 1);
    assert_ne!(classifier.current_energy_level(), UNKNOWN_LEVEL);

    let centers = classifier.cluster_centers().unwrap();
    for (center, expected) in centers.iter().zip(LEVEL_VALUES) {
        assert!(
            (center - expected).abs() < 1e-9,
            "expected centre {} got {}",
            expected,
            center
        );
    }
    assert!((classifier.pulse_threshold().unwrap() - 0.3).abs() < 1e-9);
}

#[test]
fn test_recluster_only_after_interval() {
    let mut classifier = classifier_with_levels(100);
    assert_eq!(classifier.cluster_passes(), 1);

    classifier.add_rms_sample(59.0, 0.3);
    assert!(!classifier.update(59.0).reclustered);

    classifier.add_rms_sample(60.5, 0.3);
    assert!(classifier.update(60.5).reclustered);
    assert_eq!(classifier.cluster_passes(), 2);
}

#[test]
fn test_cluster_centers_sorted_ascending() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let values: Vec<f64> = (0..300).map(|_| rng.gen_range(0.0..1.0f64).powi(3)).collect();
        let centers = cluster_centers(&values);
        for pair in centers.windows(2) {
            assert!(pair[0] <= pair[1], "centres not sorted: {:?}", centers);
        }
    }
}

#[test]
fn test_cluster_centers_constant_input() {
    let centers = cluster_centers(&[0.2; 60]);
    assert!(centers.iter().all(|&c| (c - 0.2).abs() < 1e-12));
}

#[test]
fn test_sustained_loud_input_reaches_top_level() {
    let mut classifier = classifier_with_levels(100);
    for i in 0..300 {
        let time = 1.0 + i as f64 * 0.01;
        classifier.add_rms_sample(time, 0.5);
        classifier.update(time);
    }
    assert_eq!(classifier.current_energy_level(), 5);
}

#[test]
fn test_quiet_input_reaches_bottom_level() {
    let mut classifier = classifier_with_levels(100);
    for i in 0..300 {
        let time = 1.0 + i as f64 * 0.01;
        classifier.add_rms_sample(time, 0.1);
        classifier.update(time);
    }
    assert_eq!(classifier.current_energy_level(), 1);
}

#[test]
fn test_classify_from_unknown_picks_nearest() {
    let centers = [1.0, 2.0, 3.0, 4.0, 5.0];
    assert_eq!(classify_level(0.2, &centers, UNKNOWN_LEVEL), 1);
    assert_eq!(classify_level(3.1, &centers, UNKNOWN_LEVEL), 3);
    assert_eq!(classify_level(9.0, &centers, UNKNOWN_LEVEL), 5);
}

#[test]
fn test_no_oscillation_inside_hysteresis_band() {
    let centers = [1.0, 2.0, 3.0, 4.0, 5.0];
    // Midpoint between levels 2 and 3 is 2.5; hysteresis margin is 0.15
    let wobble = [2.45, 2.55, 2.4, 2.6, 2.52, 2.48];

    let mut level = 2;
    for &v in &wobble {
        level = classify_level(v, &centers, level);
        assert_eq!(level, 2, "switched away from 2 at {}", v);
    }

    let mut level = 3;
    for &v in &wobble {
        level = classify_level(v, &centers, level);
        assert_eq!(level, 3, "switched away from 3 at {}", v);
    }
}

#[test]
fn test_switch_after_clearing_hysteresis() {
    let centers = [1.0, 2.0, 3.0, 4.0, 5.0];
    assert_eq!(classify_level(2.7, &centers, 2), 3);
    assert_eq!(classify_level(2.3, &centers, 3), 2);
}

#[test]
fn test_band_overlap_extends_past_midpoint() {
    let centers = [1.0, 2.0, 3.0, 4.0, 5.0];
    let (lower, upper) = band(&centers, 2);
    assert!((lower - 2.375).abs() < 1e-12);
    assert!((upper - 3.625).abs() < 1e-12);
    assert_eq!(band(&centers, 0).0, f64::NEG_INFINITY);
    assert_eq!(band(&centers, 4).1, f64::INFINITY);
}

#[test]
fn test_ring_buffer_is_bounded() {
    let mut config = EnergyConfig::default();
    config.buffer_capacity = 64;
    let mut classifier = EnergyClassifier::new(config);
    for i in 0..200 {
        classifier.add_rms_sample(i as f64 * 0.01, 0.1);
    }
    assert_eq!(classifier.sample_count(), 64);
}

#[test]
fn test_non_finite_samples_ignored() {
    let mut classifier = EnergyClassifier::new(EnergyConfig::default());
    classifier.add_rms_sample(0.0, f64::NAN);
    assert_eq!(classifier.sample_count(), 0);
    assert_eq!(classifier.temporal_average(), None);
}
