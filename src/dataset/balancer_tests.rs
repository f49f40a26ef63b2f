pub(crate) use super::*;
use crate::dataset::TrainingExample;
use crate::features::FeatureSchema;

fn example(gender: Gender, age: u8, class: &str) -> SizeExample {
    let height = 95.0 + f32::from(age) * 5.0;
    let weight = 14.0 + f32::from(age) * 2.5;
    let is_female = if gender == Gender::Female { 1.0 } else { 0.0 };
    let values = vec![
        is_female,
        f32::from(age),
        height,
        weight,
        weight / (height / 100.0).powi(2),
        height / weight,
        f32::from(age) * height / 100.0,
    ];
    TrainingExample {
        features: FeatureRecord::from_values(FeatureSchema::Size, values).expect("valid"),
        target: class.to_string(),
        sample_weight: 1.0,
        temporal_weight: 1.0,
        synthetic: false,
    }
}

fn corpus(gender: Gender, n: usize) -> Vec<SizeExample> {
    let classes = ["small", "medium", "large"];
    (0..n)
        .map(|i| example(gender, 3 + (i % 16) as u8, classes[i % 3]))
        .collect()
}

#[test]
fn test_hundred_boys_thirty_girls_ends_near_parity() {
    let mut rows = corpus(Gender::Male, 100);
    rows.extend(corpus(Gender::Female, 30));
    let outcome = DatasetBalancer::new(BalancerConfig::default()).balance(rows);

    let f = outcome.count(Gender::Female);
    let m = outcome.count(Gender::Male);
    assert!(f.abs_diff(m) <= 5, "F={f} M={m}");
    assert_eq!(outcome.stages.len(), 5);
    assert_eq!(outcome.stages[0].stage, BalanceStage::Gender);
    assert_eq!(outcome.stages[0].female, 30);
    assert_eq!(outcome.stages[0].male, 30);
}

#[test]
fn test_single_gender_skips_gender_stages() {
    let outcome = DatasetBalancer::new(BalancerConfig::default()).balance(corpus(Gender::Female, 40));
    assert!(outcome.stages[0].skipped.is_some());
    assert!(outcome.stages[4].skipped.is_some());
    assert_eq!(outcome.count(Gender::Male), 0);

    // 14 small, 13 medium, 13 large: the class stage trims small to 13.
    assert_eq!(outcome.stages[1].female, 40);
    assert_eq!(outcome.stages[2].stage, BalanceStage::Class);
    assert_eq!(outcome.stages[2].female, 39);
    assert_eq!(outcome.synthetic_rows, 0);
    assert_eq!(outcome.count(Gender::Female), 39);
}

#[test]
fn test_oversampling_fills_minority_class() {
    let mut rows: Vec<SizeExample> = (0..20).map(|i| example(Gender::Female, 8 + (i % 2) as u8, "small")).collect();
    rows.extend((0..10).map(|i| example(Gender::Female, 8 + (i % 3) as u8, "medium")));
    let config = BalancerConfig {
        class_floor: 25,
        ..BalancerConfig::default()
    };
    let outcome = DatasetBalancer::new(config).balance(rows);

    let medium: Vec<&SizeExample> = outcome.examples.iter().filter(|e| e.target == "medium").collect();
    assert_eq!(medium.len(), 20);
    assert_eq!(outcome.synthetic_rows, 10);
    for row in medium.iter().filter(|e| e.synthetic) {
        let age = row.features.get("age").expect("age");
        assert!((8.0..=10.0).contains(&age));
        assert!((row.sample_weight - 0.5).abs() < 1e-6);
    }
}

#[test]
fn test_balancing_is_deterministic() {
    let mut rows = corpus(Gender::Male, 60);
    rows.extend(corpus(Gender::Female, 45));
    let balancer = DatasetBalancer::new(BalancerConfig::default());
    let a = balancer.balance(rows.clone());
    let b = balancer.balance(rows);
    assert_eq!(a.examples, b.examples);
}

#[test]
fn test_age_band_floor_protects_small_bands() {
    let rows: Vec<SizeExample> = (0..30)
        .map(|_| example(Gender::Male, 4, "small"))
        .chain((0..5).map(|_| example(Gender::Male, 16, "small")))
        .collect();
    let outcome = DatasetBalancer::new(BalancerConfig::default()).balance(rows);
    // smallest band has 5 rows, floor of 20 wins
    assert_eq!(outcome.stages[1].male, 25);
}

#[derive(Debug, Clone)]
struct Narrow {
    values: Vec<f32>,
    class: &'static str,
}

impl Balanceable for Narrow {
    fn gender(&self) -> Gender {
        Gender::Male
    }
    fn age(&self) -> u8 {
        10
    }
    fn class_key(&self) -> String {
        self.class.to_string()
    }
    fn numeric_features(&self) -> &[f32] {
        &self.values
    }
    fn is_synthetic(&self) -> bool {
        false
    }
    fn synthesize(reference: &Self, values: Vec<f32>, _: f32) -> Option<Self> {
        Some(Self {
            values,
            class: reference.class,
        })
    }
}

#[test]
fn test_too_few_numeric_features_skips_synthetic_stage() {
    let rows: Vec<Narrow> = (0..12)
        .map(|i| Narrow {
            values: vec![i as f32, 1.0],
            class: if i < 9 { "a" } else { "b" },
        })
        .collect();
    let outcome = DatasetBalancer::new(BalancerConfig::default()).balance(rows);
    let synthetic = &outcome.stages[3];
    assert_eq!(synthetic.stage, BalanceStage::Synthetic);
    assert!(synthetic.skipped.is_some());
    assert_eq!(outcome.examples.len(), outcome.stages[2].male);
}

#[test]
fn test_oversampler_needs_two_rows() {
    let mut rng = StdRng::seed_from_u64(1);
    let one = vec![example(Gender::Female, 9, "small")];
    assert!(SyntheticOversampler::new(5).generate(&one, 4, &mut rng).is_empty());
}
