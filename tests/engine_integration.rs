//! End-to-end workflows across the normalizer, training pipelines,
//! registry, decision policy and explanation recorder.

use sizewise::collaborators::FsTraceStore;
use sizewise::dataset::{
    DatasetBalancer, HistoricalRecord, MeasurementTarget, Provenance, RecordTarget, SizeExample,
};
use sizewise::engine::MEASUREMENT_BANK_NAME;
use sizewise::features::FeatureRecord;
use sizewise::prelude::*;
use sizewise::registry::{FsBlobStore, ModelMetadata, ModelRegistry, RegistryEntry};
use sizewise::config::{BalancerConfig, ClassifierConfig, RegressionConfig};
use std::collections::BTreeMap;
use std::sync::Arc;

fn fast_config() -> EngineConfig {
    EngineConfig {
        classifier: ClassifierConfig {
            forest_trees: 10,
            softmax_max_iter: 150,
            ..ClassifierConfig::default()
        },
        regression: RegressionConfig {
            forest_trees: 10,
            ..RegressionConfig::default()
        },
        ..EngineConfig::default()
    }
}

fn record(gender: &str, height: f32, target: RecordTarget) -> HistoricalRecord {
    HistoricalRecord {
        profile_ref: None,
        gender: gender.to_string(),
        age: (((height - 80.0) / 6.0) as i32).clamp(3, 17),
        height_cm: height,
        weight_kg: height * 0.3 - 10.0,
        measurements: BTreeMap::new(),
        target,
        provenance: Provenance::Manual,
        fit_rating: None,
        record_age_days: 90.0,
    }
}

fn history() -> Vec<HistoricalRecord> {
    let mut out = Vec::new();
    for gender in ["F", "M"] {
        for i in 0..60 {
            let height = 100.0 + (i * 75 / 60) as f32;
            let code = if height < 120.0 {
                "small"
            } else if height < 145.0 {
                "medium"
            } else {
                "large"
            };
            out.push(record(gender, height, RecordTarget::Size(code.to_string())));
        }
    }
    for i in 0..40 {
        let height = 105.0 + i as f32 * 1.5;
        out.push(record(
            "F",
            height,
            RecordTarget::Measurement(MeasurementTarget {
                garment: "girls_special_frock".to_string(),
                measure: "length_cm".to_string(),
                value_cm: 0.55 * height + 2.0,
            }),
        ));
    }
    out
}

#[test]
fn test_girl_profile_derivation_and_skirt_waist() {
    let engine = Engine::new(EngineConfig::default(), Collaborators::in_memory(Vec::new())).expect("engine");
    let normalizer = ProfileNormalizer::default();
    let profile = engine
        .normalize(&RawProfileInput::new("F", 13, 152.0, 44.0))
        .expect("valid");

    for field in [
        MeasureField::Bust,
        MeasureField::Waist,
        MeasureField::Hip,
        MeasureField::Shoulder,
        MeasureField::SleeveLength,
    ] {
        let value = profile.measure(field).expect("derived");
        assert!(normalizer.bounds(field).contains(value), "{field} = {value}");
    }

    let waist = profile.measure(MeasureField::Waist).expect("derived");
    let skirt = engine
        .predict_measurement("girls_skirt", "waist_cm", &profile, None)
        .expect("served");
    assert!(skirt.value_cm > waist);
}

#[test]
fn test_out_of_range_input_names_the_field() {
    let engine = Engine::new(EngineConfig::default(), Collaborators::in_memory(Vec::new())).expect("engine");
    match engine.normalize(&RawProfileInput::new("F", 4, 150.0, 20.0)) {
        Err(SizewiseError::BoundsViolation { field, max, .. }) => {
            assert_eq!(field, "height_cm");
            assert_eq!(max, 130.0);
        }
        other => panic!("expected bounds violation, got {other:?}"),
    }
    assert!(matches!(
        engine.normalize(&RawProfileInput::new("X", 10, 130.0, 30.0)),
        Err(SizewiseError::UnsupportedGender(_))
    ));
}

#[test]
fn test_full_lifecycle_with_disk_storage() {
    let models = tempfile::tempdir().expect("models dir");
    let traces = tempfile::tempdir().expect("traces dir");
    let collaborators = || {
        Collaborators::in_memory(history())
            .with_blob_store(Arc::new(FsBlobStore::new(models.path())))
            .with_trace_store(Arc::new(FsTraceStore::new(traces.path())))
    };

    let engine = Engine::new(fast_config(), collaborators()).expect("engine");
    let sizes = engine.train_size_models().expect("size training");
    assert_eq!(sizes.status, TrainingStatus::Success);
    let measurements = engine.train_measurement_models().expect("measurement training");
    assert_eq!(measurements.status, TrainingStatus::Success);
    assert_eq!(measurements.models[0].name, "girls_special_frock/length_cm");

    let profile = engine
        .normalize(&RawProfileInput::new("F", 13, 152.0, 44.0))
        .expect("valid");
    let bundle = engine.recommend_profile(&profile, true, Some("intake-42")).expect("bundle");
    assert_eq!(bundle.size.tier, Tier::Ensemble);
    let frock = bundle
        .garments
        .iter()
        .find(|g| g.garment == "girls_special_frock")
        .expect("frock listed");
    assert_eq!(frock.measurements["length_cm"].tier, Some(Tier::TrainedModel));

    // A fresh engine over the same storage serves the same models and
    // can replay traces written by the first one.
    let (reopened, report) = Engine::open(fast_config(), collaborators()).expect("reopen");
    assert_eq!(report.loaded.len(), 4);
    assert!(report.missing.is_empty());
    let again = reopened.recommend_size(&profile, None).expect("served");
    assert_eq!(again.size_code, bundle.size.size_code);
    assert_eq!(again.confidence, bundle.size.confidence);

    let replayed = reopened.get_explanation(bundle.size.decision_id).expect("persisted trace");
    assert_eq!(replayed.session_id(), Some("intake-42"));
    assert_eq!(replayed.decision_type(), DecisionType::Size);
    let json = serde_json::to_string(&replayed).expect("serializable");
    assert!(json.contains("tier_selected"));

    assert!(reopened.registry().entry(MEASUREMENT_BANK_NAME).expect("index").is_some());
}

#[test]
fn test_registry_detects_tampering_across_instances() {
    let dir = tempfile::tempdir().expect("tempdir");
    let weights = vec![0.25_f32, -1.5, 3.0];
    let saved = ModelRegistry::new(Arc::new(FsBlobStore::new(dir.path())))
        .save("size_classifier_female", &weights, ModelMetadata::new("toy"))
        .expect("save");

    let store = FsBlobStore::new(dir.path());
    let (loaded, entry): (Vec<f32>, RegistryEntry) = ModelRegistry::new(Arc::new(store.clone()))
        .load("size_classifier_female")
        .expect("load");
    assert_eq!(loaded, weights);
    assert_eq!(entry.checksum, saved.checksum);

    std::fs::write(store.path(&saved.location), b"tampered").expect("overwrite");
    let result: sizewise::Result<(Vec<f32>, RegistryEntry)> =
        ModelRegistry::new(Arc::new(store)).load("size_classifier_female");
    assert!(matches!(result, Err(SizewiseError::IntegrityError { .. })));
}

#[test]
fn test_balancer_brings_genders_to_parity() {
    let normalizer = ProfileNormalizer::default();
    let example = |gender: &str, i: usize| {
        let age = 6 + (i % 10) as i32;
        let height = 110.0 + (age - 6) as f32 * 5.0 + (i % 3) as f32;
        let profile = normalizer
            .normalize(&RawProfileInput::new(gender, age, height, height * 0.3 - 8.0))
            .expect("valid");
        SizeExample {
            features: FeatureRecord::for_size(&profile),
            target: if age < 11 { "small" } else { "large" }.to_string(),
            sample_weight: 1.0,
            temporal_weight: 1.0,
            synthetic: false,
        }
    };
    let mut rows: Vec<SizeExample> = (0..100).map(|i| example("M", i)).collect();
    rows.extend((0..30).map(|i| example("F", i)));

    let outcome = DatasetBalancer::new(BalancerConfig::default()).balance(rows);
    let female = outcome.count(Gender::Female);
    let male = outcome.count(Gender::Male);
    assert!(female.abs_diff(male) <= 5, "female {female}, male {male}");
}
