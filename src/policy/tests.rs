pub(crate) use super::*;
use crate::collaborators::{RuleFunctionSize, StaticSizeLookup, TableRuleFunction};
use crate::explain::DecisionType;
use crate::profile::{MeasureField, ProfileNormalizer, RawProfileInput};
use crate::size_classifier::SizeLadder;

struct OfflineRuleFunction;

impl RuleFunction for OfflineRuleFunction {
    fn recommend_size(&self, _: &Profile) -> Result<RuleFunctionSize> {
        Err(SizewiseError::unavailable("rule_function", "database offline"))
    }

    fn autofill_measure(&self, _: &str, _: &str, _: &Profile) -> Result<Option<f32>> {
        Err(SizewiseError::unavailable("rule_function", "database offline"))
    }
}

fn policy_with(rule_function: Arc<dyn RuleFunction>) -> DecisionPolicy {
    DecisionPolicy::new(
        PolicyConfig::default(),
        RuleConfig::default(),
        rule_function,
        Arc::new(StaticSizeLookup::from_ladder(&SizeLadder::default())),
    )
}

fn policy() -> DecisionPolicy {
    policy_with(Arc::new(TableRuleFunction::default()))
}

fn girl() -> Profile {
    ProfileNormalizer::default()
        .normalize(&RawProfileInput::new("F", 13, 152.0, 44.0))
        .expect("valid")
}

fn size_trace() -> ExplanationTrace {
    ExplanationTrace::new(DecisionType::Size, None)
}

fn measurement_trace() -> ExplanationTrace {
    ExplanationTrace::new(DecisionType::Measurement, None)
}

#[test]
fn test_size_without_models_demotes_to_girth_chart() {
    let mut trace = size_trace();
    let rec = policy().recommend_size(None, &girl(), &mut trace).expect("served");

    assert_eq!(rec.tier, Tier::GarmentRule);
    assert!((rec.confidence - 0.7).abs() < 1e-6);
    assert!(!rec.needs_review);
    assert_eq!(rec.attempts.len(), 2);
    assert!(!rec.attempts[0].succeeded);
    assert!((rec.attempts[0].penalty - 0.1).abs() < 1e-6);
    assert!(rec.size_id.is_some());
    assert_eq!(rec.decision_id, trace.decision_id());
    assert!(rec.sql_recommendation.is_some());
    assert_eq!(trace.method(), Some("garment_rule"));

    let names: Vec<&str> = trace.steps().iter().map(ExplanationStep::step_name).collect();
    assert_eq!(names.first(), Some(&"tier_demotion"));
    assert_eq!(names.last(), Some(&"tier_selected"));
    assert!(trace.data_quality_notes().iter().any(|n| n.contains("bust_cm")));
    assert!(trace.feature_contributions().contains_key("height_cm"));
}

#[test]
fn test_forced_failures_never_raise_confidence() {
    let profile = girl();
    let ceilings = PolicyConfig::default().size_ceilings.0;
    let forced = [Tier::GarmentRule, Tier::GenericRule, Tier::ExternalRule];

    let mut previous = policy()
        .recommend_size(None, &profile, &mut size_trace())
        .expect("baseline");
    let mut paid = 0.1;
    for (depth, _) in forced.iter().enumerate() {
        let mut policy = policy();
        for tier in &forced[..=depth] {
            policy = policy.with_disabled_tier(*tier);
        }
        let demoted = policy.recommend_size(None, &profile, &mut size_trace()).expect("served");

        let failed_position = SIZE_CHAIN.iter().position(|t| *t == previous.tier).expect("in chain");
        assert!(demoted.confidence <= previous.confidence + 1e-6);
        assert!(demoted.confidence <= (ceilings[failed_position] - paid).max(0.1) + 1e-6);
        paid += 0.2;
        previous = demoted;
    }
    assert_eq!(previous.tier, Tier::AgeOnly);
    assert!((previous.confidence - 0.1).abs() < 1e-6);
}

#[test]
fn test_exhausted_chain_is_hard_error() {
    let mut policy = policy();
    for tier in SIZE_CHAIN {
        policy = policy.with_disabled_tier(tier);
    }
    match policy.recommend_size(None, &girl(), &mut size_trace()) {
        Err(SizewiseError::AllTiersExhausted { decision, attempts }) => {
            assert_eq!(decision, "size");
            assert_eq!(attempts.len(), 5);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[test]
fn test_skirt_waist_served_by_garment_rule() {
    let profile = girl();
    let waist = profile.measure(MeasureField::Waist).expect("derived");
    let prediction = policy()
        .predict_measurement(None, "girls_skirt", "waist_cm", &profile, None, &mut measurement_trace())
        .expect("served");

    assert_eq!(prediction.tier, Some(Tier::GarmentRule));
    assert!(prediction.value_cm > waist);
    assert!((prediction.confidence - 0.9).abs() < 1e-6);
    assert_eq!(prediction.method, "garment_rule:skirt_waist_ease");
    let comparison = prediction.comparison.expect("baseline");
    assert!(comparison.agrees);
}

#[test]
fn test_uncovered_pair_demotes_to_generic_rule() {
    let prediction = policy()
        .predict_measurement(None, "girls_pinafore", "waist_cm", &girl(), None, &mut measurement_trace())
        .expect("served");
    assert_eq!(prediction.tier, Some(Tier::GenericRule));
    assert_eq!(prediction.attempts.len(), 3);
    assert!((prediction.confidence - 0.55).abs() < 1e-6);
}

#[test]
fn test_manual_override_wins_regardless_of_state() {
    let mut trace = measurement_trace();
    let prediction = policy()
        .predict_measurement(None, "girls_skirt", "waist_cm", &girl(), Some(72.5), &mut trace)
        .expect("override");
    assert_eq!(prediction.value_cm, 72.5);
    assert_eq!(prediction.confidence, 1.0);
    assert_eq!(prediction.method, "manual_override");
    assert!(prediction.original_value.is_some());
    assert_eq!(trace.final_confidence(), Some(1.0));

    let mut broken = policy();
    for tier in MEASUREMENT_CHAIN {
        broken = broken.with_disabled_tier(tier);
    }
    let prediction = broken
        .predict_measurement(None, "girls_skirt", "waist_cm", &girl(), Some(72.5), &mut measurement_trace())
        .expect("override without tiers");
    assert_eq!(prediction.value_cm, 72.5);
    assert_eq!(prediction.original_value, None);
}

#[test]
fn test_rejects_meaningless_override() {
    let result = policy().predict_measurement(
        None,
        "girls_skirt",
        "waist_cm",
        &girl(),
        Some(f32::NAN),
        &mut measurement_trace(),
    );
    assert!(matches!(result, Err(SizewiseError::InvalidInput(_))));
}

#[test]
fn test_offline_rule_function_is_noted_and_skipped() {
    let offline = policy_with(Arc::new(OfflineRuleFunction));
    let mut trace = size_trace();
    let rec = offline.recommend_size(None, &girl(), &mut trace).expect("served");
    assert!(rec.sql_recommendation.is_none());
    assert!(trace.data_quality_notes().iter().any(|n| n.contains("comparison unavailable")));

    let demoted = policy_with(Arc::new(OfflineRuleFunction))
        .with_disabled_tier(Tier::GarmentRule)
        .with_disabled_tier(Tier::GenericRule)
        .recommend_size(None, &girl(), &mut size_trace())
        .expect("age only");
    assert_eq!(demoted.tier, Tier::AgeOnly);
    assert_eq!(demoted.size_code, "large");
    let external = demoted.attempts.iter().find(|a| a.tier == Tier::ExternalRule).expect("attempted");
    assert!((external.penalty - 0.2).abs() < 1e-6);
}
