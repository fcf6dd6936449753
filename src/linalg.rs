// Sparse matrix and dense vector primitives for the forward model.
//
// The forward operator is a wide, very sparse matrix (a few entries per row),
// so CSR with plain `Vec<f64>` vectors covers everything the posterior
// evaluations need: `A x` for the likelihood and `A^T r` for its gradient.

/// Sparse matrix in compressed sparse row format.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Build a CSR matrix from COO triplets. Duplicate entries are summed.
    ///
    /// Callers are expected to have bounds-checked the triplets; this only
    /// debug-asserts.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut counts = vec![0usize; nrows];
        for &(r, c, _) in triplets {
            debug_assert!(r < nrows && c < ncols, "triplet ({r},{c}) out of bounds");
            counts[r] += 1;
        }

        let mut row_ptr = vec![0usize; nrows + 1];
        for i in 0..nrows {
            row_ptr[i + 1] = row_ptr[i] + counts[i];
        }

        let nnz = row_ptr[nrows];
        let mut col_idx = vec![0usize; nnz];
        let mut values = vec![0.0f64; nnz];
        let mut next = row_ptr.clone();
        for &(r, c, v) in triplets {
            let slot = next[r];
            col_idx[slot] = c;
            values[slot] = v;
            next[r] += 1;
        }

        // Sort each row by column and merge duplicates in place.
        let mut matrix = Self {
            nrows,
            ncols,
            row_ptr,
            col_idx,
            values,
        };
        matrix.normalize_rows();
        matrix
    }

    /// Sort columns within each row and sum duplicate entries.
    fn normalize_rows(&mut self) {
        let mut new_row_ptr = vec![0usize; self.nrows + 1];
        let mut new_col_idx = Vec::with_capacity(self.col_idx.len());
        let mut new_values = Vec::with_capacity(self.values.len());

        for r in 0..self.nrows {
            let start = self.row_ptr[r];
            let end = self.row_ptr[r + 1];
            let mut row: Vec<(usize, f64)> = (start..end)
                .map(|k| (self.col_idx[k], self.values[k]))
                .collect();
            row.sort_by_key(|&(c, _)| c);

            for (c, v) in row {
                match new_col_idx.last() {
                    Some(&last_c) if last_c == c && new_col_idx.len() > new_row_ptr[r] => {
                        let last = new_values.len() - 1;
                        new_values[last] += v;
                    }
                    _ => {
                        new_col_idx.push(c);
                        new_values.push(v);
                    }
                }
            }
            new_row_ptr[r + 1] = new_col_idx.len();
        }

        self.row_ptr = new_row_ptr;
        self.col_idx = new_col_idx;
        self.values = new_values;
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Multiply every stored entry by `s`.
    pub fn scale(&mut self, s: f64) {
        for v in &mut self.values {
            *v *= s;
        }
    }

    /// Compute `y = A x`. Panics if `x.len() != ncols`.
    pub fn matvec(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.ncols, "matvec dimension mismatch");
        let mut y = vec![0.0; self.nrows];
        for r in 0..self.nrows {
            let mut acc = 0.0;
            for k in self.row_ptr[r]..self.row_ptr[r + 1] {
                acc += self.values[k] * x[self.col_idx[k]];
            }
            y[r] = acc;
        }
        y
    }

    /// Compute `x = A^T y`. Panics if `y.len() != nrows`.
    pub fn rmatvec(&self, y: &[f64]) -> Vec<f64> {
        assert_eq!(y.len(), self.nrows, "rmatvec dimension mismatch");
        let mut x = vec![0.0; self.ncols];
        for r in 0..self.nrows {
            let yr = y[r];
            if yr == 0.0 {
                continue;
            }
            for k in self.row_ptr[r]..self.row_ptr[r + 1] {
                x[self.col_idx[k]] += self.values[k] * yr;
            }
        }
        x
    }
}

/// Dot product of two equal-length slices.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Squared Euclidean norm.
pub fn norm_sq(a: &[f64]) -> f64 {
    a.iter().map(|x| x * x).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2x3 test matrix:
    ///   | 1 0 2 |
    ///   | 0 3 0 |
    fn small_matrix() -> CsrMatrix {
        CsrMatrix::from_triplets(2, 3, &[(0, 0, 1.0), (0, 2, 2.0), (1, 1, 3.0)])
    }

    #[test]
    fn matvec_matches_dense_product() {
        let a = small_matrix();
        let y = a.matvec(&[1.0, 2.0, 3.0]);
        assert_eq!(y, vec![7.0, 6.0]);
    }

    #[test]
    fn rmatvec_matches_dense_transpose_product() {
        let a = small_matrix();
        let x = a.rmatvec(&[1.0, 2.0]);
        assert_eq!(x, vec![1.0, 6.0, 2.0]);
    }

    #[test]
    fn duplicate_triplets_are_summed() {
        let a = CsrMatrix::from_triplets(1, 2, &[(0, 1, 1.5), (0, 1, 2.5)]);
        assert_eq!(a.nnz(), 1);
        assert_eq!(a.matvec(&[0.0, 1.0]), vec![4.0]);
    }

    #[test]
    fn unsorted_triplets_produce_same_matrix() {
        let a = CsrMatrix::from_triplets(2, 3, &[(1, 1, 3.0), (0, 2, 2.0), (0, 0, 1.0)]);
        let y = a.matvec(&[1.0, 2.0, 3.0]);
        assert_eq!(y, vec![7.0, 6.0]);
    }

    #[test]
    fn scale_multiplies_all_entries() {
        let mut a = small_matrix();
        a.scale(2.0);
        assert_eq!(a.matvec(&[1.0, 1.0, 1.0]), vec![6.0, 6.0]);
    }

    #[test]
    fn rmatvec_then_matvec_agree_on_quadratic_form() {
        // x^T (A^T y) == (A x)^T y for any x, y.
        let a = small_matrix();
        let x = [0.5, -1.0, 2.0];
        let y = [3.0, -2.0];
        let lhs = dot(&x, &a.rmatvec(&y));
        let rhs = dot(&a.matvec(&x), &y);
        assert!((lhs - rhs).abs() < 1e-12);
    }

    #[test]
    fn empty_rows_are_allowed() {
        let a = CsrMatrix::from_triplets(3, 2, &[(2, 0, 1.0)]);
        assert_eq!(a.matvec(&[5.0, 7.0]), vec![0.0, 0.0, 5.0]);
    }

    #[test]
    fn norm_and_dot_helpers() {
        assert!((norm_sq(&[3.0, 4.0]) - 25.0).abs() < 1e-15);
        assert!((dot(&[1.0, 2.0], &[3.0, 4.0]) - 11.0).abs() < 1e-15);
    }
}
