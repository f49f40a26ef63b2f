pub(crate) use super::*;
use crate::collaborators::{FsTraceStore, InMemoryDataSource};
use crate::config::{ClassifierConfig, RecorderConfig, RegressionConfig};
use crate::dataset::{FitRating, MeasurementTarget, Provenance, RecordTarget};
use crate::policy::SIZE_CHAIN;
use crate::registry::FsBlobStore;

fn label_for(height: f32) -> &'static str {
    if height < 120.0 {
        "small"
    } else if height < 145.0 {
        "medium"
    } else {
        "large"
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
        provenance: Provenance::Automatic,
        fit_rating: None,
        record_age_days: 30.0,
    }
}

fn size_records(n: usize) -> Vec<HistoricalRecord> {
    let mut out = Vec::new();
    for gender in ["F", "M"] {
        for i in 0..n {
            let height = 100.0 + (i * 75 / n) as f32;
            out.push(record(gender, height, RecordTarget::Size(label_for(height).to_string())));
        }
    }
    out
}

fn pinafore_records(n: usize) -> Vec<HistoricalRecord> {
    (0..n)
        .map(|i| {
            let height = 100.0 + (i * 70 / n) as f32;
            record(
                "F",
                height,
                RecordTarget::Measurement(MeasurementTarget {
                    garment: "girls_pinafore".to_string(),
                    measure: "length_cm".to_string(),
                    value_cm: 0.5 * height + 4.0,
                }),
            )
        })
        .collect()
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        classifier: ClassifierConfig {
            forest_trees: 10,
            softmax_max_iter: 150,
            ..ClassifierConfig::default()
        },
        regression: RegressionConfig {
            forest_trees: 10,
            parallel: false,
            ..RegressionConfig::default()
        },
        ..EngineConfig::default()
    }
}

fn engine(collaborators: Collaborators) -> Engine {
    Engine::new(fast_config(), collaborators).expect("valid config")
}

fn girl(engine: &Engine) -> Profile {
    engine
        .normalize(&RawProfileInput::new("F", 13, 152.0, 44.0))
        .expect("valid profile")
}

struct DownDataSource;

impl DataSource for DownDataSource {
    fn historical_records(&self) -> Result<Vec<HistoricalRecord>> {
        Err(SizewiseError::unavailable("data_source", "connection refused"))
    }
}

#[test]
fn test_size_training_persists_then_serves() {
    let engine = engine(Collaborators::in_memory(size_records(60)));
    let report = engine.train_size_models().expect("trained");

    assert_eq!(report.status, TrainingStatus::Success, "skipped: {:?}", report.skipped);
    assert_eq!(report.model_version, MODEL_VERSION);
    let names: Vec<&str> = report.models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["size_classifier_female", "size_classifier_male", "size_classifier_universal"]
    );
    assert!(report.models.iter().all(|m| m.registry_version == 1));
    assert_eq!(report.balance.len(), 5);

    let entry = engine.registry().entry("size_classifier_female").expect("index").expect("entry");
    assert_eq!(entry.metadata.model_type, "size_ensemble");

    let rec = engine.recommend_size(&girl(&engine), Some("s1")).expect("served");
    assert_eq!(rec.tier, Tier::Ensemble);
    assert_eq!(rec.method, "ensemble:size_classifier_female");
    assert!((0.0..=1.0).contains(&rec.confidence));
    assert!(rec.alternatives.iter().all(|a| a.size_code != rec.size_code));

    let trace = engine.get_explanation(rec.decision_id).expect("trace");
    assert_eq!(trace.session_id(), Some("s1"));
}

#[test]
fn test_reopened_engine_serves_identical_decisions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let collaborators = || {
        Collaborators::in_memory(size_records(60)).with_blob_store(Arc::new(FsBlobStore::new(dir.path())))
    };

    let first = engine(collaborators());
    first.train_size_models().expect("trained");
    let before = first.recommend_size(&girl(&first), None).expect("served");

    let (reopened, report) = Engine::open(fast_config(), collaborators()).expect("open");
    assert_eq!(report.loaded.len(), 3);
    assert_eq!(report.missing, vec![MEASUREMENT_BANK_NAME.to_string()]);
    assert!(report.failed.is_empty());

    let after = reopened.recommend_size(&girl(&reopened), None).expect("served");
    assert_eq!(after.size_code, before.size_code);
    assert_eq!(after.confidence, before.confidence);
    assert_eq!(after.tier, Tier::Ensemble);
}

#[test]
fn test_corrupted_model_is_not_served() {
    let store = Arc::new(MemoryBlobStore::new());
    let collaborators = Collaborators::in_memory(size_records(60)).with_blob_store(store.clone());
    let trained = engine(collaborators.clone());
    trained.train_size_models().expect("trained");

    let entry = trained.registry().entry("size_classifier_female").expect("index").expect("entry");
    let mut bytes = store.get(&entry.location).expect("get").expect("blob");
    bytes[0] ^= 0xFF;
    store.put(&entry.location, &bytes).expect("tamper");

    let (reopened, report) = Engine::open(fast_config(), collaborators).expect("open");
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "size_classifier_female");

    let rec = reopened.recommend_size(&girl(&reopened), None).expect("served");
    assert_eq!(rec.method, "ensemble:size_classifier_universal");
}

#[test]
fn test_measurement_training_feeds_trained_tier() {
    let engine = engine(Collaborators::in_memory(pinafore_records(40)));
    let report = engine.train_measurement_models().expect("trained");
    assert_eq!(report.status, TrainingStatus::Success);
    assert_eq!(report.models.len(), 1);
    assert_eq!(report.models[0].name, "girls_pinafore/length_cm");
    assert!(report.models[0].metrics.contains_key("rmse"));

    let profile = girl(&engine);
    let prediction = engine
        .predict_measurement("girls_pinafore", "length_cm", &profile, None)
        .expect("served");
    assert_eq!(prediction.tier, Some(Tier::TrainedModel));
    assert!(prediction.method.starts_with("trained_model:"));
    assert!(prediction.confidence <= 0.9 - 0.1 + 1e-6);

    let garment = engine.predict_garment("girls_pinafore", &profile).expect("bank loaded");
    assert!(garment.values.contains_key("length_cm"));
    assert!(garment.failures.contains_key("waist_cm"));
}

#[test]
fn test_predict_garment_without_bank_is_model_not_found() {
    let engine = engine(Collaborators::in_memory(Vec::new()));
    let result = engine.predict_garment("girls_pinafore", &girl(&engine));
    assert!(matches!(result, Err(SizewiseError::ModelNotFound { .. })));
}

#[test]
fn test_empty_data_source_reports_no_data() {
    let engine = engine(Collaborators::in_memory(Vec::new()));
    assert_eq!(engine.train_size_models().expect("ran").status, TrainingStatus::NoData);
    assert_eq!(
        engine.train_measurement_models().expect("ran").status,
        TrainingStatus::NoData
    );
    assert!(engine.snapshot().size.is_none());
}

#[test]
fn test_unreachable_data_source_aborts_training() {
    let engine = engine(Collaborators::in_memory(Vec::new()).with_data_source(Arc::new(DownDataSource)));
    assert!(matches!(
        engine.train_size_models(),
        Err(SizewiseError::CollaboratorUnavailable { .. })
    ));
}

#[test]
fn test_profile_bundle_shares_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine(
        Collaborators::in_memory(Vec::new()).with_trace_store(Arc::new(FsTraceStore::new(dir.path()))),
    );
    let profile = girl(&engine);

    let bundle = engine.recommend_profile(&profile, false, Some("bundle-7")).expect("bundle");
    assert_eq!(bundle.session_id, "bundle-7");
    assert_eq!(bundle.size.tier, Tier::GarmentRule);
    let skirt = bundle
        .garments
        .iter()
        .find(|g| g.garment == "girls_skirt")
        .expect("skirt listed");
    let waist = &skirt.measurements["waist_cm"];
    assert_eq!(waist.method, "garment_rule:skirt_waist_ease");
    assert_eq!(
        engine.get_explanation(waist.decision_id).expect("trace").session_id(),
        Some("bundle-7")
    );
    assert_eq!(engine.recorder().len(), 1 + bundle.measurement_count() + failure_count(&bundle));

    let with_sports = engine.recommend_profile(&profile, true, None).expect("bundle");
    assert!(with_sports.garments.len() > bundle.garments.len());
    assert!(!with_sports.session_id.is_empty());
}

fn failure_count(bundle: &ProfileRecommendation) -> usize {
    bundle.garments.iter().map(|g| g.failures.len()).sum()
}

#[test]
fn test_failed_decision_is_still_traced() {
    let mut engine = engine(Collaborators::in_memory(Vec::new()));
    for tier in SIZE_CHAIN {
        engine = engine.with_disabled_tier(tier);
    }
    let result = engine.recommend_size(&girl(&engine), None);
    assert!(matches!(result, Err(SizewiseError::AllTiersExhausted { .. })));
    assert_eq!(engine.recorder().len(), 1);
}

#[test]
fn test_recorder_memory_follows_configured_cap() {
    let config = EngineConfig {
        recorder: RecorderConfig {
            max_in_memory_traces: 5,
        },
        ..fast_config()
    };
    let engine = Engine::new(config, Collaborators::in_memory(Vec::new())).expect("engine");
    let profile = girl(&engine);
    let last = (0..50)
        .map(|_| engine.recommend_size(&profile, None).expect("served"))
        .last()
        .expect("fifty decisions");

    assert_eq!(engine.recorder().len(), 5);
    assert!(engine.get_explanation(last.decision_id).is_ok());
}

#[test]
fn test_unknown_decision_is_trace_not_found() {
    let engine = engine(Collaborators::in_memory(Vec::new()));
    assert!(matches!(
        engine.get_explanation(Uuid::new_v4()),
        Err(SizewiseError::TraceNotFound { .. })
    ));
}

fn owned_by(profile_ref: &str, mut record: HistoricalRecord) -> HistoricalRecord {
    record.profile_ref = Some(profile_ref.to_string());
    record
}

fn skirt_waist(value_cm: f32) -> RecordTarget {
    RecordTarget::Measurement(MeasurementTarget {
        garment: "girls_skirt".to_string(),
        measure: "waist_cm".to_string(),
        value_cm,
    })
}

#[test]
fn test_fit_feedback_rates_next_training_records() {
    let source = Arc::new(InMemoryDataSource::new(vec![
        owned_by("p-1", record("F", 150.0, RecordTarget::Size("large".to_string()))),
        owned_by("p-1", record("F", 150.0, skirt_waist(68.0))),
        owned_by("p-1", record("F", 150.0, RecordTarget::Measurement(MeasurementTarget {
            garment: "girls_pinafore".to_string(),
            measure: "length_cm".to_string(),
            value_cm: 80.0,
        }))),
        owned_by("p-2", record("F", 150.0, RecordTarget::Size("large".to_string()))),
    ]));
    let engine = engine(
        Collaborators::in_memory(Vec::new())
            .with_data_source(source.clone())
            .with_feedback_sink(source.clone()),
    );

    let accepted = engine
        .record_fit_feedback(
            "p-1",
            "girls_skirt",
            FitFeedback::new(FitRating::SlightlyLarge)
                .with_satisfaction(4)
                .with_issue("waist", "slightly_loose"),
        )
        .expect("accepted");
    assert_eq!(accepted.profile_ref, "p-1");

    let ratings: Vec<Option<FitRating>> = source
        .historical_records()
        .expect("records")
        .iter()
        .map(|r| r.fit_rating)
        .collect();
    assert_eq!(
        ratings,
        vec![Some(FitRating::SlightlyLarge), Some(FitRating::SlightlyLarge), None, None]
    );
    assert_eq!(source.feedback().len(), 1);
}

#[test]
fn test_invalid_fit_feedback_is_not_forwarded() {
    let source = Arc::new(InMemoryDataSource::new(Vec::new()));
    let engine = engine(Collaborators::in_memory(Vec::new()).with_feedback_sink(source.clone()));

    for (profile_ref, garment, feedback) in [
        ("", "girls_skirt", FitFeedback::new(FitRating::Perfect)),
        ("p-1", "girls_ballgown", FitFeedback::new(FitRating::Perfect)),
        ("p-1", "girls_skirt", FitFeedback::new(FitRating::Perfect).with_satisfaction(9)),
        ("p-1", "girls_skirt", FitFeedback::new(FitRating::TooSmall).with_issue("", "tight")),
    ] {
        assert!(
            matches!(
                engine.record_fit_feedback(profile_ref, garment, feedback),
                Err(SizewiseError::InvalidInput(_))
            ),
            "{profile_ref:?} {garment:?}"
        );
    }
    assert!(source.feedback().is_empty());
}

#[test]
fn test_poor_fit_feedback_drops_size_label_from_corpus() {
    let records: Vec<HistoricalRecord> = size_records(30)
        .into_iter()
        .enumerate()
        .map(|(i, r)| owned_by(&format!("p-{i}"), r))
        .collect();
    let total = records.len();
    let source = Arc::new(InMemoryDataSource::new(records));
    let engine = engine(
        Collaborators::in_memory(Vec::new())
            .with_data_source(source.clone())
            .with_feedback_sink(source.clone()),
    );
    engine
        .record_fit_feedback("p-0", "girls_skirt", FitFeedback::new(FitRating::TooSmall))
        .expect("accepted");

    let normalizer = ProfileNormalizer::new(engine.config().normalizer.clone());
    let corpus = CorpusBuilder::new(&normalizer, &engine.config().weighting)
        .size_corpus(&source.historical_records().expect("records"));
    assert!(corpus
        .rejected
        .iter()
        .any(|r| r.index == 0 && r.reason.contains("poor fit")));
    assert!(corpus.examples.len() < total);
}
