pub(crate) use super::*;
use crate::profile::{ProfileNormalizer, RawProfileInput};

fn label_for(height: f32) -> &'static str {
    if height < 120.0 {
        "small"
    } else if height < 145.0 {
        "medium"
    } else {
        "large"
    }
}

fn profile(gender: &str, height: f32) -> Profile {
    let age = (((height - 80.0) / 6.0) as i32).clamp(3, 17);
    let weight = height * 0.3 - 10.0;
    ProfileNormalizer::default()
        .normalize(&RawProfileInput::new(gender, age, height, weight))
        .expect("valid profile")
}

fn examples(gender: &str, n: usize) -> Vec<SizeExample> {
    (0..n)
        .map(|i| {
            let height = 100.0 + (i * 75 / n) as f32;
            SizeExample {
                features: FeatureRecord::for_size(&profile(gender, height)),
                target: label_for(height).to_string(),
                sample_weight: 1.0,
                temporal_weight: 1.0,
                synthetic: false,
            }
        })
        .collect()
}

fn fast_config() -> ClassifierConfig {
    ClassifierConfig {
        forest_trees: 10,
        softmax_max_iter: 150,
        ..ClassifierConfig::default()
    }
}

fn trained() -> SizeClassifier {
    let mut rows = examples("F", 60);
    rows.extend(examples("M", 60));
    let mut classifier = SizeClassifier::new(fast_config());
    let outcome = classifier.train(&rows);
    assert_eq!(outcome.trained.len(), 3, "skipped: {:?}", outcome.skipped);
    classifier
}

#[test]
fn test_trains_every_scope() {
    let classifier = trained();
    let scopes: Vec<ModelScope> = classifier.scopes().collect();
    assert_eq!(scopes, ModelScope::ALL.to_vec());

    let metrics = classifier.model(ModelScope::Female).expect("female").metrics();
    assert_eq!(metrics.classes, vec!["small", "medium", "large"]);
    assert!((metrics.member_weights[0] + metrics.member_weights[1] - 1.0).abs() < 1e-5);
    assert!(metrics.n_calibration > 0);
    assert!(metrics.temperature > 0.0);
}

#[test]
fn test_prediction_excludes_top_pick_from_alternatives() {
    let classifier = trained();
    let prediction = classifier.predict(&profile("F", 165.0)).expect("prediction");

    assert_eq!(prediction.size_code, "large");
    assert_eq!(prediction.scope, ModelScope::Female);
    assert!((0.0..=1.0).contains(&prediction.confidence));
    assert_eq!(prediction.alternatives.len(), 2);
    assert!(prediction.alternatives.iter().all(|a| a.size_code != prediction.size_code));
    let total: f32 = prediction.probabilities.values().sum();
    assert!((total - 1.0).abs() < 1e-3);
    assert_eq!(prediction.steps[0].step_name(), "model_selection");
}

#[test]
fn test_prediction_is_deterministic() {
    let classifier = trained();
    let p = profile("M", 130.0);
    let first = classifier.predict(&p).expect("first");
    let second = classifier.predict(&p).expect("second");
    assert_eq!(first.size_code, second.size_code);
    assert_eq!(first.confidence, second.confidence);
}

#[test]
fn test_falls_back_to_universal_model() {
    let mut classifier = SizeClassifier::new(fast_config());
    let outcome = classifier.train(&examples("F", 60));
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].scope, ModelScope::Male);

    let prediction = classifier.predict(&profile("M", 160.0)).expect("universal");
    assert_eq!(prediction.scope, ModelScope::Universal);
    assert!(prediction.steps[0].reasoning_text().contains("universal"));
}

#[test]
fn test_untrained_classifier_reports_model_not_found() {
    let classifier = SizeClassifier::new(fast_config());
    assert!(matches!(
        classifier.predict(&profile("F", 150.0)),
        Err(SizewiseError::ModelNotFound { .. })
    ));
}

#[test]
fn test_loose_preference_steps_up_with_penalty() {
    let classifier = trained();
    let base = profile("F", 165.0);
    let standard = classifier.predict(&base).expect("standard");
    let loose = classifier
        .predict(&base.clone().with_fit_preference(FitPreference::Loose))
        .expect("loose");

    assert_eq!(loose.model_pick, "large");
    assert_eq!(loose.size_code, "large+");
    assert!((loose.confidence - standard.confidence * 0.9).abs() < 1e-6);
    assert!(loose.alternatives.iter().all(|a| a.size_code != "large+"));
    assert!(loose.steps.iter().any(|s| s.step_name() == "fit_adjustment"));
}

#[test]
fn test_snug_preference_ignored_for_young_children() {
    let classifier = SizeClassifier::new(fast_config());
    let young = profile("F", 105.0).with_fit_preference(FitPreference::Snug);
    assert!(young.age() < 10);

    let mut steps = Vec::new();
    let (code, confidence) = classifier.adjust_for_fit(&young, "small", 0.8, &mut steps);
    assert_eq!(code, "small");
    assert!((confidence - 0.8).abs() < 1e-6);
    assert_eq!(steps.len(), 1);
}

#[test]
fn test_adjustment_past_ladder_end_is_noop() {
    let classifier = SizeClassifier::new(fast_config());
    let older = profile("F", 170.0);

    let mut steps = Vec::new();
    let loose = older.clone().with_fit_preference(FitPreference::Loose);
    assert_eq!(classifier.adjust_for_fit(&loose, "large+", 0.8, &mut steps), ("large+".to_string(), 0.8));

    let snug = older.with_fit_preference(FitPreference::Snug);
    assert_eq!(classifier.adjust_for_fit(&snug, "small-", 0.8, &mut steps), ("small-".to_string(), 0.8));
    assert_eq!(classifier.adjust_for_fit(&snug, "medium", 1.0, &mut steps), ("small+".to_string(), 0.9));
}

#[test]
fn test_ensemble_needs_two_classes_and_enough_rows() {
    let config = fast_config();
    let ladder = SizeLadder::default();
    let rows = examples("F", 10);
    let refs: Vec<&SizeExample> = rows.iter().collect();
    assert!(matches!(
        SizeEnsemble::train("tiny", &refs, &ladder, &config),
        Err(SizewiseError::InsufficientData { required: 20, .. })
    ));

    let mut single = examples("F", 30);
    for row in &mut single {
        row.target = "medium".to_string();
    }
    let refs: Vec<&SizeExample> = single.iter().collect();
    assert!(matches!(
        SizeEnsemble::train("single", &refs, &ladder, &config),
        Err(SizewiseError::InsufficientData { required: 2, .. })
    ));
}

#[test]
fn test_ladder_sort_key_orders_unknown_codes_last() {
    let ladder = SizeLadder::default();
    let mut codes = vec!["XL", "large", "small-", "medium"];
    codes.sort_by(|a, b| ladder.sort_key(a).cmp(&ladder.sort_key(b)));
    assert_eq!(codes, vec!["small-", "medium", "large", "XL"]);
}
