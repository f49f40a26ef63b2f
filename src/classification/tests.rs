pub(crate) use super::*;

fn three_class_data() -> (Matrix<f32>, Vec<usize>) {
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for (class, center) in [(0usize, 0.0_f32), (1, 5.0), (2, 10.0)] {
        for k in 0..6 {
            let jitter = k as f32 * 0.2 - 0.5;
            rows.push(vec![center + jitter, center - jitter]);
            labels.push(class);
        }
    }
    (Matrix::from_rows(&rows).expect("rows"), labels)
}

#[test]
fn test_softmax_fits_separable_classes() {
    let (x, y) = three_class_data();
    let mut model = SoftmaxRegression::new().with_max_iter(1000);
    model.fit_weighted(&x, &y, 3, None).expect("fit");
    assert!(model.score(&x, &y).expect("fitted") > 0.95);
}

#[test]
fn test_softmax_rows_are_distributions() {
    let (x, y) = three_class_data();
    let mut model = SoftmaxRegression::new();
    model.fit_weighted(&x, &y, 3, None).expect("fit");
    let proba = model.predict_proba(&x).expect("fitted");
    for row in 0..proba.n_rows() {
        let sum: f32 = proba.row_slice(row).iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(proba.row_slice(row).iter().all(|&p| (0.0..=1.0).contains(&p)));
    }
}

#[test]
fn test_softmax_same_input_same_output() {
    let (x, y) = three_class_data();
    let mut a = SoftmaxRegression::new();
    let mut b = SoftmaxRegression::new();
    a.fit_weighted(&x, &y, 3, None).expect("fit");
    b.fit_weighted(&x, &y, 3, None).expect("fit");
    assert_eq!(a.predict_proba(&x).expect("fitted"), b.predict_proba(&x).expect("fitted"));
}

#[test]
fn test_softmax_handles_class_absent_from_data() {
    // class 2 declared but never observed
    let x = Matrix::from_vec(4, 1, vec![0.0, 1.0, 9.0, 10.0]).expect("4x1");
    let y = vec![0, 0, 1, 1];
    let mut model = SoftmaxRegression::new();
    model.fit_weighted(&x, &y, 3, None).expect("fit");
    let proba = model.predict_proba(&x).expect("fitted");
    assert_eq!(proba.n_cols(), 3);
    assert!(proba.get(0, 2) < 0.5);
}

#[test]
fn test_softmax_in_place_is_stable() {
    let mut v = vec![1000.0, 1000.0];
    softmax_in_place(&mut v);
    assert!((v[0] - 0.5).abs() < 1e-6);
}

#[test]
fn test_unfitted_predict_fails() {
    let model = SoftmaxRegression::new();
    assert!(model.predict_proba(&Matrix::zeros(1, 1)).is_err());
}
