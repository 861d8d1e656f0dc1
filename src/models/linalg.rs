//! Cholesky factorization of symmetric positive semi-definite systems
//!
//! Columns that are (numerically) linear combinations of earlier columns are
//! flagged as aliased and excluded from the factor instead of failing the
//! decomposition. Solutions carry zeros in aliased positions.

use ndarray::{Array1, Array2};

/// Relative residual variance below which a column counts as aliased
pub const ALIAS_TOLERANCE: f64 = 1e-9;

/// Lower-triangular factor of `A` restricted to its non-aliased columns
#[derive(Debug, Clone)]
pub struct Cholesky {
    l: Array2<f64>,
    aliased: Vec<bool>,
}

impl Cholesky {
    /// Factor a symmetric matrix, flagging aliased columns in order
    pub fn new(a: &Array2<f64>) -> Self {
        let n = a.nrows();
        let mut l = Array2::<f64>::zeros((n, n));
        let mut aliased = vec![false; n];

        for j in 0..n {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[j, k]] * l[[j, k]];
            }
            let diag = a[[j, j]] - sum;

            if a[[j, j]] <= 0.0 || diag <= ALIAS_TOLERANCE * a[[j, j]] {
                aliased[j] = true;
                continue;
            }
            let pivot = diag.sqrt();
            l[[j, j]] = pivot;

            for i in (j + 1)..n {
                let mut sum = 0.0;
                for k in 0..j {
                    sum += l[[i, k]] * l[[j, k]];
                }
                l[[i, j]] = (a[[i, j]] - sum) / pivot;
            }
        }

        Self { l, aliased }
    }

    /// Aliased flag per column
    pub fn aliased(&self) -> &[bool] {
        &self.aliased
    }

    /// Number of non-aliased columns
    pub fn rank(&self) -> usize {
        self.aliased.iter().filter(|a| !**a).count()
    }

    /// Solve `A x = b` on the non-aliased columns
    pub fn solve(&self, b: &Array1<f64>) -> Array1<f64> {
        let n = self.l.nrows();

        // L z = b
        let mut z = Array1::<f64>::zeros(n);
        for i in 0..n {
            if self.aliased[i] {
                continue;
            }
            let mut sum = 0.0;
            for j in 0..i {
                sum += self.l[[i, j]] * z[j];
            }
            z[i] = (b[i] - sum) / self.l[[i, i]];
        }

        // L^T x = z
        let mut x = Array1::<f64>::zeros(n);
        for i in (0..n).rev() {
            if self.aliased[i] {
                continue;
            }
            let mut sum = 0.0;
            for j in (i + 1)..n {
                sum += self.l[[j, i]] * x[j];
            }
            x[i] = (z[i] - sum) / self.l[[i, i]];
        }

        x
    }

    /// Inverse of `A` on the non-aliased block, zero elsewhere
    pub fn inverse(&self) -> Array2<f64> {
        let n = self.l.nrows();
        let mut inv = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            if self.aliased[i] {
                continue;
            }
            let mut e = Array1::<f64>::zeros(n);
            e[i] = 1.0;
            inv.column_mut(i).assign(&self.solve(&e));
        }
        inv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_solve_full_rank() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let chol = Cholesky::new(&a);
        assert_eq!(chol.rank(), 2);

        let x = chol.solve(&array![2.0, 1.0]);
        assert_relative_eq!(x[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(x[1], 0.0, epsilon = 1e-12);

        let inv = chol.inverse();
        let id = a.dot(&inv);
        assert_relative_eq!(id[[0, 0]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(id[[0, 1]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_aliased_duplicate_column() {
        // Gram matrix of columns [1, x, x]
        let x = array![[1.0, 1.0, 1.0], [1.0, 2.0, 2.0], [1.0, 3.0, 3.0]];
        let a = x.t().dot(&x);
        let chol = Cholesky::new(&a);

        assert_eq!(chol.aliased(), &[false, false, true]);
        assert_eq!(chol.rank(), 2);

        let b = x.t().dot(&array![2.0, 3.0, 4.0]);
        let beta = chol.solve(&b);
        assert_relative_eq!(beta[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(beta[1], 1.0, epsilon = 1e-9);
        assert_eq!(beta[2], 0.0);
    }

    #[test]
    fn test_zero_column_is_aliased() {
        let a = array![[2.0, 0.0], [0.0, 0.0]];
        let chol = Cholesky::new(&a);
        assert_eq!(chol.aliased(), &[false, true]);
        assert_eq!(chol.inverse()[[1, 1]], 0.0);
    }
}
