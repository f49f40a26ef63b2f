pub(crate) use super::*;
use crate::config::NormalizerConfig;

fn normalizer() -> ProfileNormalizer {
    ProfileNormalizer::new(NormalizerConfig::default())
}

#[test]
fn test_gender_parse_accepts_both_cases() {
    assert_eq!(Gender::parse("f").expect("f"), Gender::Female);
    assert_eq!(Gender::parse(" M ").expect("m"), Gender::Male);
    assert!(matches!(
        Gender::parse("X"),
        Err(SizewiseError::UnsupportedGender(_))
    ));
}

#[test]
fn test_female_profile_is_measurement_complete() {
    let profile = normalizer()
        .normalize(&RawProfileInput::new("F", 13, 152.0, 44.0))
        .expect("valid");
    let n = normalizer();
    for &field in Gender::Female.required_measures() {
        let value = profile.measure(field).expect("backfilled");
        assert!(n.bounds(field).contains(value), "{field} = {value}");
        assert!(profile.provenance(field).expect("origin").is_derived());
    }
    assert!(profile.measure(MeasureField::Chest).is_none());
}

#[test]
fn test_male_profile_gets_chest_not_bust() {
    let profile = normalizer()
        .normalize(&RawProfileInput::new("M", 9, 132.0, 28.0))
        .expect("valid");
    assert!(profile.measure(MeasureField::Chest).is_some());
    assert!(profile.measure(MeasureField::Bust).is_none());
    assert!(profile.measure(MeasureField::Hip).is_none());
}

#[test]
fn test_user_supplied_values_are_kept() {
    let input = RawProfileInput::new("F", 13, 152.0, 44.0).with_measurement(MeasureField::Waist, 61.0);
    let profile = normalizer().normalize(&input).expect("valid");
    assert_eq!(profile.measure(MeasureField::Waist), Some(61.0));
    assert_eq!(
        profile.provenance(MeasureField::Waist),
        Some(FieldOrigin::UserSupplied)
    );
    assert!(!profile.derived_fields().contains(&MeasureField::Waist));
}

#[test]
fn test_derived_waist_matches_formula() {
    let profile = normalizer()
        .normalize(&RawProfileInput::new("F", 13, 152.0, 44.0))
        .expect("valid");
    // 0.25 * 152 + 0.55 * 44 + 2
    let expected = 0.25 * 152.0 + 0.55 * 44.0 + 2.0;
    let waist = profile.measure(MeasureField::Waist).expect("waist");
    assert!((waist - expected).abs() < 1e-4);
}

#[test]
fn test_puberty_term_raises_bust() {
    let young = normalizer()
        .normalize(&RawProfileInput::new("F", 9, 140.0, 35.0))
        .expect("valid");
    let older = normalizer()
        .normalize(&RawProfileInput::new("F", 13, 140.0, 35.0))
        .expect("valid");
    let delta = older.measure(MeasureField::Bust).expect("bust")
        - young.measure(MeasureField::Bust).expect("bust");
    assert!((delta - 4.0 * 1.2).abs() < 1e-4);
}

#[test]
fn test_out_of_range_derivation_is_clamped_and_flagged() {
    // Heavy tall teen pushes derived hip past 160
    let profile = normalizer()
        .normalize(&RawProfileInput::new("F", 17, 245.0, 195.0))
        .expect("valid");
    assert_eq!(profile.measure(MeasureField::Hip), Some(160.0));
    assert_eq!(
        profile.provenance(MeasureField::Hip),
        Some(FieldOrigin::DerivedClamped)
    );
}

#[test]
fn test_height_out_of_bounds_names_field() {
    let err = normalizer()
        .normalize(&RawProfileInput::new("M", 12, 300.0, 40.0))
        .expect_err("too tall");
    match err {
        SizewiseError::BoundsViolation { field, min, max, .. } => {
            assert_eq!(field, "height_cm");
            assert_eq!(min, 80.0);
            assert_eq!(max, 250.0);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_age_out_of_bounds() {
    let err = normalizer()
        .normalize(&RawProfileInput::new("M", 2, 90.0, 12.0))
        .expect_err("too young");
    assert!(matches!(err, SizewiseError::BoundsViolation { ref field, .. } if field == "age"));
}

#[test]
fn test_age_gate_rejects_implausible_toddler() {
    let err = normalizer()
        .normalize(&RawProfileInput::new("F", 4, 140.0, 20.0))
        .expect_err("gate");
    match err {
        SizewiseError::BoundsViolation { field, max, .. } => {
            assert_eq!(field, "height_cm");
            assert_eq!(max, 130.0);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_user_measurement_out_of_bounds_is_not_clamped() {
    let input = RawProfileInput::new("M", 12, 150.0, 40.0).with_measurement(MeasureField::Chest, 200.0);
    assert!(matches!(
        normalizer().normalize(&input),
        Err(SizewiseError::BoundsViolation { .. })
    ));
}

#[test]
fn test_wrong_gender_field_rejected() {
    let input = RawProfileInput::new("M", 12, 150.0, 40.0).with_measurement(MeasureField::Hip, 80.0);
    assert!(matches!(
        normalizer().normalize(&input),
        Err(SizewiseError::InvalidInput(_))
    ));
}

#[test]
fn test_nan_height_rejected() {
    assert!(matches!(
        normalizer().normalize(&RawProfileInput::new("M", 12, f32::NAN, 40.0)),
        Err(SizewiseError::InvalidInput(_))
    ));
}

#[test]
fn test_fit_preference_and_shape_parsing() {
    let input = RawProfileInput::new("F", 12, 150.0, 40.0)
        .with_fit_preference("Loose")
        .with_body_shape("curvy");
    let profile = normalizer().normalize(&input).expect("valid");
    assert_eq!(profile.fit_preference(), FitPreference::Loose);
    assert_eq!(profile.body_shape(), Some(BodyShape::Curvy));

    let bad = RawProfileInput::new("M", 12, 150.0, 40.0).with_body_shape("curvy");
    assert!(normalizer().normalize(&bad).is_err());
    let unknown = RawProfileInput::new("M", 12, 150.0, 40.0).with_fit_preference("baggy");
    assert!(normalizer().normalize(&unknown).is_err());
}

#[test]
fn test_derived_ratios() {
    let profile = normalizer()
        .normalize(&RawProfileInput::new("M", 10, 140.0, 35.0))
        .expect("valid");
    assert!((profile.bmi() - 35.0 / 1.96).abs() < 1e-4);
    assert!((profile.height_weight_ratio() - 4.0).abs() < 1e-5);
    assert!((profile.age_height_interaction() - 14.0).abs() < 1e-5);
}

#[test]
fn test_age_band_edges() {
    assert_eq!(AgeBand::from_age(3), AgeBand::EarlyChildhood);
    assert_eq!(AgeBand::from_age(6), AgeBand::EarlyChildhood);
    assert_eq!(AgeBand::from_age(7), AgeBand::MiddleChildhood);
    assert_eq!(AgeBand::from_age(14), AgeBand::EarlyTeen);
    assert_eq!(AgeBand::from_age(18), AgeBand::LateTeen);
}

#[test]
fn test_measure_field_wire_names() {
    assert_eq!(MeasureField::parse("waist_cm").expect("known"), MeasureField::Waist);
    assert!(MeasureField::parse("inseam_cm").is_err());
    let json = serde_json::to_string(&MeasureField::SleeveLength).expect("json");
    assert_eq!(json, "\"sleeve_length_cm\"");
}
