pub(crate) use super::*;

#[test]
fn test_fit_computes_population_stats() {
    let x = Matrix::from_vec(4, 1, vec![2.0, 4.0, 4.0, 6.0]).expect("4x1");
    let mut scaler = StandardScaler::new();
    scaler.fit(&x).expect("non-empty");
    let mean = scaler.mean().expect("fitted");
    let std = scaler.std().expect("fitted");
    assert!((mean[0] - 4.0).abs() < 1e-6);
    // population variance = (4 + 0 + 0 + 4) / 4 = 2
    assert!((std[0] - 2.0_f32.sqrt()).abs() < 1e-5);
}

#[test]
fn test_constant_column_is_centered_only() {
    let x = Matrix::from_vec(3, 2, vec![1.0, 10.0, 1.0, 20.0, 1.0, 30.0]).expect("3x2");
    let mut scaler = StandardScaler::new();
    let scaled = scaler.fit_transform(&x).expect("fit");
    for row in 0..3 {
        assert!(scaled.get(row, 0).abs() < 1e-6);
    }
    assert!((scaled.get(0, 1) + scaled.get(2, 1)).abs() < 1e-5);
}

#[test]
fn test_transform_before_fit_fails() {
    let scaler = StandardScaler::new();
    assert!(!scaler.is_fitted());
    assert!(scaler.transform_row(&[1.0]).is_err());
}

#[test]
fn test_transform_row_dimension_mismatch() {
    let x = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).expect("2x2");
    let mut scaler = StandardScaler::new();
    scaler.fit(&x).expect("fit");
    assert!(scaler.transform_row(&[1.0]).is_err());
}

#[test]
fn test_fit_empty_fails() {
    let x = Matrix::zeros(0, 3);
    let mut scaler = StandardScaler::new();
    assert!(scaler.fit(&x).is_err());
}
