pub(crate) use super::*;

fn line_data() -> (Matrix<f32>, Vector<f32>) {
    // y = 2 * x0 - 0.5 * x1 + 4
    let rows: Vec<Vec<f32>> = (0..12)
        .map(|i| vec![i as f32, ((i * 7) % 5) as f32])
        .collect();
    let y: Vec<f32> = rows.iter().map(|r| 2.0 * r[0] - 0.5 * r[1] + 4.0).collect();
    (Matrix::from_rows(&rows).expect("rows"), Vector::from_vec(y))
}

#[test]
fn test_ols_recovers_coefficients() {
    let (x, y) = line_data();
    let mut model = LinearRegression::new();
    model.fit(&x, &y).expect("full rank");

    let coef = model.coefficients().expect("fitted");
    assert!((coef[0] - 2.0).abs() < 1e-3);
    assert!((coef[1] + 0.5).abs() < 1e-3);
    assert!((model.intercept() - 4.0).abs() < 1e-2);
    assert!(model.score(&x, &y).expect("fitted") > 0.999);
}

#[test]
fn test_constant_column_gets_zero_coefficient() {
    let rows: Vec<Vec<f32>> = (0..8).map(|i| vec![1.0, i as f32]).collect();
    let y: Vec<f32> = (0..8).map(|i| 3.0 * i as f32 + 1.0).collect();
    let x = Matrix::from_rows(&rows).expect("rows");

    let mut model = LinearRegression::new();
    model.fit(&x, &Vector::from_vec(y)).expect("constant column ignored");
    let coef = model.coefficients().expect("fitted");
    assert_eq!(coef[0], 0.0);
    assert!((coef[1] - 3.0).abs() < 1e-3);
}

#[test]
fn test_weights_pull_fit_toward_heavy_rows() {
    let x = Matrix::from_vec(4, 1, vec![0.0, 1.0, 2.0, 3.0]).expect("4x1");
    // last point is an outlier
    let y = Vector::from_slice(&[0.0, 1.0, 2.0, 10.0]);

    let mut uniform = LinearRegression::new();
    uniform.fit(&x, &y).expect("fit");
    let mut weighted = LinearRegression::new();
    weighted
        .fit_weighted(&x, &y, Some(&[10.0, 10.0, 10.0, 0.01]))
        .expect("fit");

    let slope_uniform = uniform.coefficients().expect("fitted")[0];
    let slope_weighted = weighted.coefficients().expect("fitted")[0];
    assert!((slope_weighted - 1.0).abs() < (slope_uniform - 1.0).abs());
}

#[test]
fn test_ols_underdetermined_fails() {
    let x = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 6.0, 5.0]).expect("2x3");
    let y = Vector::from_slice(&[1.0, 2.0]);
    let mut model = LinearRegression::new();
    assert!(model.fit(&x, &y).is_err());
}

#[test]
fn test_ridge_shrinks_toward_zero() {
    let (x, y) = line_data();
    let mut ols = LinearRegression::new();
    ols.fit(&x, &y).expect("fit");
    let mut ridge = Ridge::new(50.0);
    ridge.fit(&x, &y).expect("fit");

    let ols_norm: f32 = ols.coefficients().expect("fitted").as_slice().iter().map(|c| c * c).sum();
    let ridge_norm: f32 = ridge.coefficients().expect("fitted").as_slice().iter().map(|c| c * c).sum();
    assert!(ridge_norm < ols_norm);
}

#[test]
fn test_ridge_handles_underdetermined_system() {
    let x = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 6.0, 5.0]).expect("2x3");
    let y = Vector::from_slice(&[1.0, 2.0]);
    let mut model = Ridge::new(1.0);
    model.fit(&x, &y).expect("regularized system is SPD");
    assert_eq!(model.predict(&x).expect("fitted").len(), 2);
}

#[test]
fn test_predict_unfitted_is_error() {
    let model = LinearRegression::new();
    assert!(model.predict(&Matrix::zeros(1, 1)).is_err());
}
