pub(crate) use super::*;

#[test]
fn test_from_vec() {
    let m = Matrix::from_vec(2, 3, vec![1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0])
        .expect("test data has correct dimensions: 2*3=6 elements");
    assert_eq!(m.shape(), (2, 3));
    assert!((m.get(0, 0) - 1.0).abs() < 1e-6);
    assert!((m.get(1, 2) - 6.0).abs() < 1e-6);
}

#[test]
fn test_from_vec_error() {
    let result = Matrix::from_vec(2, 3, vec![1.0_f32, 2.0, 3.0]);
    assert!(result.is_err());
}

#[test]
fn test_from_rows_ragged_fails() {
    let result = Matrix::from_rows(&[vec![1.0_f32, 2.0], vec![3.0]]);
    assert!(result.is_err());
}

#[test]
fn test_from_rows_and_select() {
    let m = Matrix::from_rows(&[vec![1.0_f32, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]])
        .expect("rows have equal length");
    let picked = m.select_rows(&[2, 2, 0]);
    assert_eq!(picked.shape(), (3, 2));
    assert_eq!(picked.row_slice(0), &[5.0, 6.0]);
    assert_eq!(picked.row_slice(2), &[1.0, 2.0]);
}

#[test]
fn test_matvec() {
    let m = Matrix::from_vec(2, 2, vec![1.0_f32, 2.0, 3.0, 4.0]).expect("2x2");
    let out = m.matvec(&Vector::from_slice(&[1.0, 1.0])).expect("matching length");
    assert_eq!(out.as_slice(), &[3.0, 7.0]);
    assert!(m.matvec(&Vector::from_slice(&[1.0])).is_err());
}

#[test]
fn test_cholesky_solve() {
    // [[4, 2], [2, 3]] x = [2, 1] -> x = [0.5, 0]
    let a = Matrix::from_vec(2, 2, vec![4.0_f32, 2.0, 2.0, 3.0]).expect("2x2");
    let b = Vector::from_slice(&[2.0, 1.0]);
    let x = a.cholesky_solve(&b).expect("SPD matrix");
    assert!((x[0] - 0.5).abs() < 1e-5);
    assert!(x[1].abs() < 1e-5);
}

#[test]
fn test_cholesky_not_positive_definite() {
    let a = Matrix::from_vec(2, 2, vec![0.0_f32, 0.0, 0.0, 0.0]).expect("2x2");
    let b = Vector::from_slice(&[1.0, 1.0]);
    assert!(a.cholesky_solve(&b).is_err());
}

#[test]
fn test_add_to_diagonal() {
    let mut m = Matrix::zeros(2, 2);
    m.add_to_diagonal(3.0);
    assert!((m.get(0, 0) - 3.0).abs() < 1e-6);
    assert!((m.get(1, 1) - 3.0).abs() < 1e-6);
    assert!(m.get(0, 1).abs() < 1e-6);
}
