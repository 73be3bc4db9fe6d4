//! Small dense symmetric matrix helpers for the multivariate log-rank test.

const MAX_SWEEPS: usize = 100;

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns the eigenvalues and a matrix whose columns are the corresponding
/// eigenvectors.
pub(crate) fn symmetric_eigen(matrix: &[Vec<f64>]) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = matrix.len();
    let mut a = matrix.to_vec();
    let mut v = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect::<Vec<Vec<f64>>>();

    let scale = a.iter().flatten().map(|x| x * x).sum::<f64>();
    for _ in 0..MAX_SWEEPS {
        let off_diagonal = (0..n)
            .flat_map(|p| (0..n).filter(move |&q| q != p).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum::<f64>();
        if off_diagonal <= scale * f64::EPSILON * f64::EPSILON {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                if a[p][q] == 0.0 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + theta.hypot(1.0));
                let c = 1.0 / t.hypot(1.0);
                let s = t * c;
                for row in &mut a {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
                for k in 0..n {
                    let (pk, qk) = (a[p][k], a[q][k]);
                    a[p][k] = c * pk - s * qk;
                    a[q][k] = s * pk + c * qk;
                }
                for row in &mut v {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| a[i][i]).collect();
    (eigenvalues, v)
}

/// Moore-Penrose pseudo-inverse of a symmetric positive semi-definite matrix.
///
/// Eigenvalues below `n * eps * max|λ|` are treated as zero.
#[expect(clippy::cast_precision_loss)]
pub(crate) fn pseudo_inverse(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = matrix.len();
    let (eigenvalues, vectors) = symmetric_eigen(matrix);
    let largest = eigenvalues.iter().fold(0.0_f64, |m, l| m.max(l.abs()));
    let tolerance = largest * n as f64 * f64::EPSILON;

    let mut inverse = vec![vec![0.0; n]; n];
    for (k, &lambda) in eigenvalues.iter().enumerate() {
        if lambda.abs() <= tolerance {
            continue;
        }
        for i in 0..n {
            for j in 0..n {
                inverse[i][j] += vectors[i][k] * vectors[j][k] / lambda;
            }
        }
    }
    inverse
}

/// Computes `xᵀ M x`.
pub(crate) fn quadratic_form(x: &[f64], matrix: &[Vec<f64>]) -> f64 {
    x.iter()
        .zip(matrix)
        .map(|(xi, row)| xi * row.iter().zip(x).map(|(m, xj)| m * xj).sum::<f64>())
        .sum()
}
