pub(crate) use super::*;

#[test]
fn test_gini_pure_and_balanced() {
    assert!(weighted_gini(&[4.0, 0.0], 4.0).abs() < 1e-12);
    assert!((weighted_gini(&[2.0, 2.0], 4.0) - 0.5).abs() < 1e-12);
}

#[test]
fn test_regression_split_finds_step() {
    let x = Matrix::from_vec(6, 1, vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0]).expect("6x1");
    let y = [0.0, 0.0, 0.0, 9.0, 9.0, 9.0];
    let w = [1.0; 6];
    let indices: Vec<usize> = (0..6).collect();

    let split = best_regression_split(&x, &y, &w, &indices, 1).expect("split exists");
    assert_eq!(split.feature_idx, 0);
    assert!((split.threshold - 6.5).abs() < 1e-6);
}

#[test]
fn test_no_split_on_constant_feature() {
    let x = Matrix::from_vec(4, 1, vec![2.0; 4]).expect("4x1");
    let y = [0.0, 1.0, 0.0, 1.0];
    let indices: Vec<usize> = (0..4).collect();
    assert!(best_regression_split(&x, &y, &[1.0; 4], &indices, 1).is_none());
}

#[test]
fn test_min_samples_leaf_blocks_small_children() {
    let x = Matrix::from_vec(4, 1, vec![1.0, 2.0, 3.0, 4.0]).expect("4x1");
    let y = [0usize, 1, 1, 1];
    let indices: Vec<usize> = (0..4).collect();
    // the only useful split isolates one row
    let split = best_classification_split(&x, &y, &[1.0; 4], 2, &indices, 2);
    assert!(split.map_or(true, |s| s.threshold > 2.0));
}

#[test]
fn test_bootstrap_is_seeded() {
    let a = bootstrap_sample(50, 9);
    let b = bootstrap_sample(50, 9);
    assert_eq!(a, b);
    assert!(a.iter().all(|&i| i < 50));
    assert_ne!(a, bootstrap_sample(50, 10));
}

#[test]
fn test_normalize_sums_to_one() {
    let mut v = vec![1.0, 3.0];
    normalize(&mut v);
    assert!((v[0] - 0.25).abs() < 1e-6);
    let mut zeros = vec![0.0, 0.0];
    normalize(&mut zeros);
    assert_eq!(zeros, vec![0.0, 0.0]);
}
