use rand::Rng;

/// Dense row-major matrix of `f64`.
///
/// Batches are stored one example per row, so a layer's weights have shape
/// `(in_dim, out_dim)` and a batch forward pass is `X * W + b`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Builds a matrix from row vectors. Every row must have the same length.
    pub fn from_data(data: Vec<Vec<f64>>) -> Matrix {
        let rows = data.len();
        let cols = data.first().map_or(0, |r| r.len());
        let mut flat = Vec::with_capacity(rows * cols);
        for row in data {
            assert_eq!(row.len(), cols, "ragged rows in Matrix::from_data");
            flat.extend(row);
        }
        Matrix { rows, cols, data: flat }
    }

    /// Builds a matrix from a flat row-major buffer of length `rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Matrix {
        assert_eq!(data.len(), rows * cols, "buffer does not match {}x{}", rows, cols);
        Matrix { rows, cols, data }
    }

    /// Single-row matrix, e.g. a bias vector or one example.
    pub fn row_vector(values: Vec<f64>) -> Matrix {
        let cols = values.len();
        Matrix { rows: 1, cols, data: values }
    }

    /// Glorot (Xavier) uniform initialization:
    /// samples from U(-b, b) with `b = sqrt(factor / (fan_in + fan_out))`.
    ///
    /// `factor` is 6 for ReLU/Tanh/Identity and 2 for the logistic sigmoid.
    /// `fan_in` is `rows` and `fan_out` is `cols`, matching the `(in, out)`
    /// weight layout.
    pub fn glorot_uniform<R: Rng>(
        rows: usize,
        cols: usize,
        fan_in: usize,
        fan_out: usize,
        factor: f64,
        rng: &mut R,
    ) -> Matrix {
        let bound = (factor / (fan_in + fan_out) as f64).sqrt();
        let data = (0..rows * cols).map(|_| rng.gen_range(-bound..bound)).collect();
        Matrix { rows, cols, data }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        let cols = self.cols;
        &mut self.data[row * cols..(row + 1) * cols]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|r| self.row(r).to_vec()).collect()
    }

    /// Gathers the given rows, in order, into a new matrix.
    pub fn select_rows(&self, indices: &[usize]) -> Matrix {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Matrix { rows: indices.len(), cols: self.cols, data }
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                res.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        res
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    /// Matrix product `self * rhs`.
    pub fn dot(&self, rhs: &Matrix) -> Matrix {
        assert_eq!(
            self.cols, rhs.rows,
            "cannot multiply {}x{} by {}x{}",
            self.rows, self.cols, rhs.rows, rhs.cols
        );
        let mut res = Matrix::zeros(self.rows, rhs.cols);
        for i in 0..self.rows {
            let out = &mut res.data[i * rhs.cols..(i + 1) * rhs.cols];
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                let rhs_row = &rhs.data[k * rhs.cols..(k + 1) * rhs.cols];
                for (o, &b) in out.iter_mut().zip(rhs_row) {
                    *o += a * b;
                }
            }
        }
        res
    }

    /// Element-wise (Hadamard) product of two same-shape matrices.
    pub fn hadamard(&self, rhs: &Matrix) -> Matrix {
        assert_eq!(self.shape(), rhs.shape(), "hadamard of mismatched shapes");
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| a * b).collect(),
        }
    }

    /// Adds a `(1, cols)` row vector to every row.
    pub fn add_row(&self, bias: &Matrix) -> Matrix {
        assert_eq!(bias.rows, 1, "bias must be a row vector");
        assert_eq!(bias.cols, self.cols, "bias width does not match");
        let mut res = self.clone();
        for r in 0..res.rows {
            for (x, b) in res.row_mut(r).iter_mut().zip(&bias.data) {
                *x += b;
            }
        }
        res
    }

    /// Column sums as a `(1, cols)` row vector.
    pub fn sum_rows(&self) -> Matrix {
        let mut res = Matrix::zeros(1, self.cols);
        for r in 0..self.rows {
            for (acc, x) in res.data.iter_mut().zip(self.row(r)) {
                *acc += x;
            }
        }
        res
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        self.map(|x| x * factor)
    }

    /// `self += rhs * factor`, in place.
    pub fn add_scaled(&mut self, rhs: &Matrix, factor: f64) {
        assert_eq!(self.shape(), rhs.shape(), "add_scaled of mismatched shapes");
        for (a, b) in self.data.iter_mut().zip(&rhs.data) {
            *a += b * factor;
        }
    }

    pub fn sum_of_squares(&self) -> f64 {
        self.data.iter().map(|x| x * x).sum()
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn dot_matches_hand_computed_product() {
        let a = Matrix::from_data(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let b = Matrix::from_data(vec![vec![5.0, 6.0, 7.0], vec![8.0, 9.0, 10.0]]);
        let c = a.dot(&b);
        assert_eq!(c.to_rows(), vec![vec![21.0, 24.0, 27.0], vec![47.0, 54.0, 61.0]]);
    }

    #[test]
    fn transpose_swaps_axes() {
        let a = Matrix::from_data(vec![vec![1.0, 2.0, 3.0]]);
        let t = a.transpose();
        assert_eq!(t.shape(), (3, 1));
        assert_eq!(t.to_rows(), vec![vec![1.0], vec![2.0], vec![3.0]]);
    }

    #[test]
    fn add_row_broadcasts_bias() {
        let x = Matrix::from_data(vec![vec![1.0, 1.0], vec![2.0, 2.0]]);
        let b = Matrix::row_vector(vec![0.5, -1.0]);
        assert_eq!(x.add_row(&b).to_rows(), vec![vec![1.5, 0.0], vec![2.5, 1.0]]);
    }

    #[test]
    fn sum_rows_collapses_batch() {
        let x = Matrix::from_data(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
        assert_eq!(x.sum_rows().to_rows(), vec![vec![9.0, 12.0]]);
    }

    #[test]
    fn select_rows_preserves_requested_order() {
        let x = Matrix::from_data(vec![vec![0.0], vec![1.0], vec![2.0]]);
        assert_eq!(x.select_rows(&[2, 0]).to_rows(), vec![vec![2.0], vec![0.0]]);
    }

    #[test]
    fn glorot_uniform_is_bounded_and_seeded() {
        let mut rng_a = StdRng::seed_from_u64(7);
        let mut rng_b = StdRng::seed_from_u64(7);
        let a = Matrix::glorot_uniform(64, 32, 64, 32, 6.0, &mut rng_a);
        let b = Matrix::glorot_uniform(64, 32, 64, 32, 6.0, &mut rng_b);
        let bound = (6.0f64 / 96.0).sqrt();
        assert_eq!(a, b);
        assert!(a.as_slice().iter().all(|x| x.abs() <= bound));
    }

    #[test]
    fn dot_propagates_nan_through_zero_entries() {
        let a = Matrix::row_vector(vec![0.0, 1.0]);
        let b = Matrix::from_data(vec![vec![f64::NAN], vec![2.0]]);
        assert!(a.dot(&b).get(0, 0).is_nan());

        let inf = Matrix::from_data(vec![vec![f64::INFINITY], vec![2.0]]);
        assert!(a.dot(&inf).get(0, 0).is_nan());
    }

    #[test]
    #[should_panic(expected = "cannot multiply")]
    fn dot_rejects_mismatched_inner_dims() {
        let a = Matrix::zeros(2, 3);
        let b = Matrix::zeros(2, 3);
        let _ = a.dot(&b);
    }
}
