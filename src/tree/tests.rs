pub(crate) use super::*;

fn step_data() -> (Matrix<f32>, Vector<f32>) {
    // y jumps from 10 to 20 at x = 5
    let xs: Vec<f32> = (0..10).map(|i| i as f32).collect();
    let ys: Vec<f32> = xs.iter().map(|&x| if x < 5.0 { 10.0 } else { 20.0 }).collect();
    (
        Matrix::from_vec(10, 1, xs).expect("10x1"),
        Vector::from_vec(ys),
    )
}

fn two_cluster_data() -> (Matrix<f32>, Vec<usize>) {
    let rows = vec![
        vec![0.0, 0.1],
        vec![0.2, 0.0],
        vec![0.1, 0.3],
        vec![0.3, 0.2],
        vec![5.0, 5.1],
        vec![5.2, 4.9],
        vec![4.8, 5.3],
        vec![5.1, 5.0],
    ];
    (
        Matrix::from_rows(&rows).expect("rows"),
        vec![0, 0, 0, 0, 1, 1, 1, 1],
    )
}

#[test]
fn test_regression_tree_learns_step() {
    let (x, y) = step_data();
    let mut tree = DecisionTreeRegressor::new().with_max_depth(3);
    tree.fit(&x, &y).expect("fit");

    let preds = tree.predict(&x).expect("fitted");
    for (p, t) in preds.as_slice().iter().zip(y.as_slice()) {
        assert!((p - t).abs() < 1e-5);
    }
    let root = tree.tree().expect("fitted");
    assert_eq!(root.depth(), 1);
}

#[test]
fn test_regression_leaf_uses_weighted_mean() {
    let x = Matrix::from_vec(2, 1, vec![1.0, 1.0]).expect("2x1");
    let y = Vector::from_slice(&[0.0, 10.0]);
    let mut tree = DecisionTreeRegressor::new();
    tree.fit_weighted(&x, &y, Some(&[3.0, 1.0])).expect("fit");
    let pred = tree.predict(&x).expect("fitted");
    assert!((pred[0] - 2.5).abs() < 1e-5);
}

#[test]
fn test_regression_tree_respects_max_depth() {
    let xs: Vec<f32> = (0..32).map(|i| i as f32).collect();
    let ys: Vec<f32> = xs.iter().map(|x| x * x).collect();
    let x = Matrix::from_vec(32, 1, xs).expect("32x1");
    let mut tree = DecisionTreeRegressor::new().with_max_depth(2);
    tree.fit(&x, &Vector::from_vec(ys)).expect("fit");
    assert!(tree.tree().expect("fitted").depth() <= 2);
}

#[test]
fn test_predict_wrong_feature_count_fails() {
    let (x, y) = step_data();
    let mut tree = DecisionTreeRegressor::new();
    tree.fit(&x, &y).expect("fit");
    assert!(tree.predict(&Matrix::zeros(1, 2)).is_err());
}

#[test]
fn test_classification_tree_separates_clusters() {
    let (x, y) = two_cluster_data();
    let mut tree = DecisionTreeClassifier::new();
    tree.fit_weighted(&x, &y, 2, None).expect("fit");
    assert_eq!(tree.predict(&x).expect("fitted"), y);

    let proba = tree.predict_proba(&x).expect("fitted");
    for row in 0..proba.n_rows() {
        let sum: f32 = proba.row_slice(row).iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }
}

#[test]
fn test_classifier_rejects_out_of_range_labels() {
    let (x, _) = two_cluster_data();
    let mut tree = DecisionTreeClassifier::new();
    let bad = vec![0, 0, 0, 0, 1, 1, 1, 5];
    assert!(tree.fit_weighted(&x, &bad, 2, None).is_err());
}

#[test]
fn test_forest_regressor_is_deterministic() {
    let (x, y) = step_data();
    let mut a = RandomForestRegressor::new(8).with_max_depth(3).with_random_state(42);
    let mut b = RandomForestRegressor::new(8).with_max_depth(3).with_random_state(42);
    a.fit(&x, &y).expect("fit");
    b.fit(&x, &y).expect("fit");
    assert_eq!(a.predict(&x).expect("fitted"), b.predict(&x).expect("fitted"));
    assert_eq!(a.n_trees(), 8);
}

#[test]
fn test_forest_feature_importances_favor_signal() {
    // feature 0 drives the target, feature 1 is constant
    let rows: Vec<Vec<f32>> = (0..20).map(|i| vec![i as f32, 1.0]).collect();
    let y: Vec<f32> = (0..20).map(|i| if i < 10 { 0.0 } else { 5.0 }).collect();
    let x = Matrix::from_rows(&rows).expect("rows");

    let mut rf = RandomForestRegressor::new(5).with_max_depth(3).with_random_state(1);
    rf.fit(&x, &Vector::from_vec(y)).expect("fit");
    let importances = rf.feature_importances().expect("fitted");
    assert!((importances.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    assert!(importances[0] > 0.99);
}

#[test]
fn test_forest_classifier_probabilities() {
    let (x, y) = two_cluster_data();
    let mut rf = RandomForestClassifier::new(10).with_random_state(42);
    rf.fit_weighted(&x, &y, 2, None).expect("fit");

    let proba = rf.predict_proba(&x).expect("fitted");
    assert_eq!(proba.shape(), (8, 2));
    for row in 0..8 {
        let sum: f32 = proba.row_slice(row).iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }
    assert!(rf.score(&x, &y).expect("fitted") > 0.99);
}

#[test]
fn test_unfitted_forest_errors() {
    let rf = RandomForestClassifier::new(3);
    assert!(rf.predict_proba(&Matrix::zeros(1, 2)).is_err());
    assert!(rf.feature_importances().is_none());
}
