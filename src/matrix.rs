//! Dense matrices of double-precision values with elementwise arithmetic,
//! matrix products, determinants, cofactor matrices and inverses.

use std::{
    fmt::Display,
    ops::{Add, Index, IndexMut, Mul, Neg, Sub},
    slice::Chunks,
};

use tracing::debug;

/// Tolerance used for zero detection, pivot selection, approximate equality
/// and singularity checks.
pub const EPS: f64 = 1e-7;

/// A dense matrix of `f64` entries, stored in row-major order.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    pub(crate) data: Vec<f64>,
    pub(crate) nrows: u32,
    pub(crate) ncols: u32,
}

/// Errors that can occur when constructing matrices or performing matrix
/// operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatrixError {
    InvalidShape { nrows: u32, ncols: u32 },
    DataMismatch { len: usize, nrows: u32, ncols: u32 },
    NotRectangular,
    ShapeMismatch,
    NotSquare,
    CofactorUndefined,
    Singular,
}

impl Display for MatrixError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatrixError::InvalidShape { nrows, ncols } => {
                write!(
                    f,
                    "A matrix must have at least one row and one column: got ({},{})",
                    nrows, ncols
                )
            }
            MatrixError::DataMismatch { len, nrows, ncols } => {
                write!(
                    f,
                    "Data length does not match matrix dimensions: {} vs ({},{})",
                    len, nrows, ncols
                )
            }
            MatrixError::NotRectangular => write!(f, "The matrix is not rectangular"),
            MatrixError::ShapeMismatch => write!(f, "The shape of the matrix is not compatible"),
            MatrixError::NotSquare => write!(f, "The matrix is not square"),
            MatrixError::CofactorUndefined => {
                write!(f, "The cofactor matrix is not defined for a 1x1 matrix")
            }
            MatrixError::Singular => write!(f, "The matrix is singular"),
        }
    }
}

impl std::error::Error for MatrixError {}

impl Matrix {
    /// Create a new zeroed matrix with `nrows` rows and `ncols` columns.
    pub fn new(nrows: u32, ncols: u32) -> Result<Matrix, MatrixError> {
        if nrows == 0 || ncols == 0 {
            return Err(MatrixError::InvalidShape { nrows, ncols });
        }

        Ok(Matrix {
            data: vec![0.; nrows as usize * ncols as usize],
            nrows,
            ncols,
        })
    }

    /// Create a new square matrix with ones on the main diagonal and zeroes
    /// elsewhere.
    pub fn identity(nrows: u32) -> Result<Matrix, MatrixError> {
        let mut m = Matrix::new(nrows, nrows)?;
        for i in 0..nrows {
            m[(i, i)] = 1.;
        }
        Ok(m)
    }

    /// Convert a linear representation of a matrix to a `Matrix`.
    pub fn from_linear(data: Vec<f64>, nrows: u32, ncols: u32) -> Result<Matrix, MatrixError> {
        if nrows == 0 || ncols == 0 {
            return Err(MatrixError::InvalidShape { nrows, ncols });
        }
        if data.len() != nrows as usize * ncols as usize {
            return Err(MatrixError::DataMismatch {
                len: data.len(),
                nrows,
                ncols,
            });
        }

        Ok(Matrix { data, nrows, ncols })
    }

    /// Create a new matrix from a 2-dimensional vector of entries.
    pub fn from_nested_vec(rows: Vec<Vec<f64>>) -> Result<Matrix, MatrixError> {
        let nrows = rows.len();
        let ncols = rows.first().map(|r| r.len()).unwrap_or(0);

        if nrows == 0 || ncols == 0 {
            return Err(MatrixError::InvalidShape {
                nrows: nrows as u32,
                ncols: ncols as u32,
            });
        }

        let mut data = Vec::with_capacity(nrows * ncols);
        for r in rows {
            if r.len() != ncols {
                return Err(MatrixError::NotRectangular);
            }
            data.extend(r);
        }

        Ok(Matrix {
            data,
            nrows: nrows as u32,
            ncols: ncols as u32,
        })
    }

    /// Return the number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows as usize
    }

    /// Return the number of columns.
    pub fn ncols(&self) -> usize {
        self.ncols as usize
    }

    /// Return an iterator over the rows of the matrix.
    pub fn row_iter(&self) -> Chunks<'_, f64> {
        self.data.chunks(self.ncols as usize)
    }

    /// Compare two matrices entrywise, treating entries that differ by less
    /// than [EPS] as equal. Matrices of different shapes compare unequal
    /// rather than producing an error.
    pub fn approx_eq(&self, other: &Matrix) -> bool {
        self.nrows == other.nrows
            && self.ncols == other.ncols
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (a - b).abs() < EPS)
    }

    /// Transpose the matrix.
    pub fn transpose(&self) -> Matrix {
        let mut m = Matrix {
            data: vec![0.; self.data.len()],
            nrows: self.ncols,
            ncols: self.nrows,
        };
        for i in 0..self.nrows {
            for j in 0..self.ncols {
                m[(j, i)] = self[(i, j)];
            }
        }
        m
    }

    /// Multiply the scalar `k` into each entry of the matrix.
    pub fn mul_scalar(&self, k: f64) -> Matrix {
        Matrix {
            data: self.data.iter().map(|e| e * k).collect(),
            nrows: self.nrows,
            ncols: self.ncols,
        }
    }

    /// Compute the determinant of the matrix via Gaussian elimination with
    /// partial pivoting on a working copy.
    pub fn det(&self) -> Result<f64, MatrixError> {
        if self.nrows != self.ncols {
            return Err(MatrixError::NotSquare);
        }

        Ok(self.clone().det_in_place())
    }

    /// Row-reduce the matrix, accumulating the product of the pivots. The
    /// caller must guarantee that the matrix is square.
    ///
    /// Pivoting takes the first row below the diagonal whose entry in the
    /// pivot column has magnitude at least [EPS], not the row with the
    /// largest such entry. A row swap negates the accumulated product. If no
    /// adequate pivot exists the determinant is exactly zero.
    fn det_in_place(mut self) -> f64 {
        let n = self.nrows;
        if n == 1 {
            return self.data[0];
        }

        let mut det: f64 = 1.;
        for i in 0..n {
            if det.abs() <= EPS {
                break;
            }

            if self[(i, i)].abs() < EPS {
                let pivot = (i + 1..n).find(|&r| self[(r, i)].abs() >= EPS);
                match pivot {
                    Some(r) => {
                        debug!("pivot below tolerance in column {}, swapping rows {} and {}", i, i, r);
                        self.swap_rows(i, r);
                        det = -det;
                    }
                    None => {
                        debug!("no pivot above tolerance in column {}", i);
                        return 0.;
                    }
                }
            }

            det *= self[(i, i)];

            if det.abs() > EPS {
                for j in i + 1..n {
                    let factor = self[(j, i)] / self[(i, i)];
                    for k in i..n {
                        let e = self[(i, k)];
                        self[(j, k)] -= factor * e;
                    }
                }
            }
        }

        det
    }

    /// Compute the cofactor matrix: entry `(i, j)` is the determinant of the
    /// minor obtained by deleting row `i` and column `j`, with the sign
    /// `(-1)^(i+j)`.
    ///
    /// The cofactor matrix of a 1x1 matrix is left undefined.
    pub fn cofactor_matrix(&self) -> Result<Matrix, MatrixError> {
        if self.nrows != self.ncols {
            return Err(MatrixError::NotSquare);
        }
        if self.nrows == 1 {
            return Err(MatrixError::CofactorUndefined);
        }

        let mut m = Matrix::new(self.nrows, self.ncols)?;
        for i in 0..self.nrows {
            for j in 0..self.ncols {
                let d = self.minor(i, j).det_in_place();
                m[(i, j)] = if (i + j) % 2 == 0 { d } else { -d };
            }
        }

        Ok(m)
    }

    /// Compute the inverse of a square matrix as the transposed cofactor
    /// matrix divided by the determinant. A matrix whose determinant has
    /// magnitude below [EPS] has no inverse.
    pub fn inv(&self) -> Result<Matrix, MatrixError> {
        if self.nrows != self.ncols {
            return Err(MatrixError::NotSquare);
        }

        let det = self.clone().det_in_place();
        if det.abs() < EPS {
            debug!("rejecting inverse: determinant {} is below tolerance", det);
            return Err(MatrixError::Singular);
        }

        if self.nrows == 1 {
            return Matrix::from_linear(vec![1. / det], 1, 1);
        }

        Ok(self.cofactor_matrix()?.transpose().mul_scalar(1. / det))
    }

    /// Build the minor of a square matrix by deleting row `row` and column
    /// `col`, preserving the relative order of the remaining entries.
    fn minor(&self, row: u32, col: u32) -> Matrix {
        let n = self.nrows;
        let mut data = Vec::with_capacity((n - 1) as usize * (n - 1) as usize);
        for i in 0..n {
            if i == row {
                continue;
            }
            for j in 0..n {
                if j == col {
                    continue;
                }
                data.push(self[(i, j)]);
            }
        }

        Matrix {
            data,
            nrows: n - 1,
            ncols: n - 1,
        }
    }

    fn swap_rows(&mut self, r1: u32, r2: u32) {
        for c in 0..self.ncols {
            self.data.swap(
                (r1 * self.ncols + c) as usize,
                (r2 * self.ncols + c) as usize,
            );
        }
    }
}

impl Index<u32> for Matrix {
    type Output = [f64];

    /// Get the `index`th row of the matrix.
    #[inline]
    fn index(&self, index: u32) -> &Self::Output {
        &self.data[index as usize * self.ncols as usize..(index as usize + 1) * self.ncols as usize]
    }
}

impl Index<(u32, u32)> for Matrix {
    type Output = f64;

    /// Get the `i`th row and `j`th column of the matrix, where `index=(i,j)`.
    #[inline]
    fn index(&self, index: (u32, u32)) -> &Self::Output {
        &self.data[(index.0 * self.ncols + index.1) as usize]
    }
}

impl IndexMut<(u32, u32)> for Matrix {
    /// Get the `i`th row and `j`th column of the matrix, where `index=(i,j)`.
    #[inline]
    fn index_mut(&mut self, index: (u32, u32)) -> &mut f64 {
        &mut self.data[(index.0 * self.ncols + index.1) as usize]
    }
}

impl Display for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, row) in self.row_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "[")?;
            for (j, e) in row.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", e)?;
            }
            write!(f, "]")?;
        }
        write!(f, "]")
    }
}

impl Add<&Matrix> for &Matrix {
    type Output = Result<Matrix, MatrixError>;

    /// Add two matrices of the same shape.
    fn add(self, rhs: &Matrix) -> Self::Output {
        if self.nrows != rhs.nrows || self.ncols != rhs.ncols {
            return Err(MatrixError::ShapeMismatch);
        }

        let mut m = Matrix::new(self.nrows, self.ncols)?;
        for (c, (a, b)) in m.data.iter_mut().zip(self.data.iter().zip(rhs.data.iter())) {
            *c = a + b;
        }

        Ok(m)
    }
}

impl Sub<&Matrix> for &Matrix {
    type Output = Result<Matrix, MatrixError>;

    /// Subtract two matrices of the same shape.
    fn sub(self, rhs: &Matrix) -> Self::Output {
        if self.nrows != rhs.nrows || self.ncols != rhs.ncols {
            return Err(MatrixError::ShapeMismatch);
        }

        let mut m = Matrix::new(self.nrows, self.ncols)?;
        for (c, (a, b)) in m.data.iter_mut().zip(self.data.iter().zip(rhs.data.iter())) {
            *c = a - b;
        }

        Ok(m)
    }
}

impl Mul<&Matrix> for &Matrix {
    type Output = Result<Matrix, MatrixError>;

    /// Multiply two matrices, requiring the column count of the left operand
    /// to match the row count of the right operand.
    fn mul(self, rhs: &Matrix) -> Self::Output {
        if self.ncols != rhs.nrows {
            return Err(MatrixError::ShapeMismatch);
        }

        let mut m = Matrix::new(self.nrows, rhs.ncols)?;
        for i in 0..self.nrows {
            for j in 0..rhs.ncols {
                let sum = &mut m[(i, j)];
                for k in 0..self.ncols {
                    *sum += self[(i, k)] * rhs[(k, j)];
                }
            }
        }

        Ok(m)
    }
}

impl Neg for Matrix {
    type Output = Matrix;

    /// Negate each entry of the matrix.
    fn neg(mut self) -> Self::Output {
        for e in &mut self.data {
            *e = -*e;
        }

        self
    }
}

#[cfg(test)]
mod test {
    use super::{Matrix, MatrixError, EPS};

    #[test]
    fn basics() {
        let a = Matrix::from_linear(vec![1., 2., 3., 4., 5., 6.], 2, 3).unwrap();

        assert_eq!(a.nrows(), 2);
        assert_eq!(a.ncols(), 3);
        assert_eq!(a.transpose().data, vec![1., 4., 2., 5., 3., 6.]);
        assert_eq!(a.transpose().transpose(), a);
        assert_eq!((-a.clone()).data, vec![-1., -2., -3., -4., -5., -6.]);
        assert_eq!((&a - &a).unwrap().data, vec![0.; 6]);
        assert_eq!(a.mul_scalar(2.).data, vec![2., 4., 6., 8., 10., 12.]);

        let b = Matrix::from_nested_vec(vec![
            vec![7., 8.],
            vec![9., 10.],
            vec![11., 12.],
        ])
        .unwrap();

        let c = (&a * &b).unwrap();

        assert_eq!(c.data, vec![58., 64., 139., 154.]);
        assert_eq!(&c[1], &[139., 154.]);
        assert_eq!(c[(0, 1)], 64.);

        let d = (&a + &a).unwrap();
        assert_eq!(d.data, vec![2., 4., 6., 8., 10., 12.]);

        assert_eq!(format!("{}", c), "[[58, 64], [139, 154]]");
    }

    #[test]
    fn construction_errors() {
        assert_eq!(
            Matrix::new(0, 3),
            Err(MatrixError::InvalidShape { nrows: 0, ncols: 3 })
        );
        assert_eq!(
            Matrix::new(2, 0),
            Err(MatrixError::InvalidShape { nrows: 2, ncols: 0 })
        );
        assert_eq!(
            Matrix::from_linear(vec![1., 2., 3.], 2, 2),
            Err(MatrixError::DataMismatch {
                len: 3,
                nrows: 2,
                ncols: 2
            })
        );
        assert_eq!(
            Matrix::from_nested_vec(vec![vec![1., 2.], vec![3.]]),
            Err(MatrixError::NotRectangular)
        );
        assert_eq!(
            Matrix::from_nested_vec(vec![]),
            Err(MatrixError::InvalidShape { nrows: 0, ncols: 0 })
        );

        let z = Matrix::new(2, 3).unwrap();
        assert!(z.data.iter().all(|&e| e == 0.));
    }

    #[test]
    fn shape_errors() {
        let a = Matrix::new(2, 3).unwrap();
        let b = Matrix::new(3, 2).unwrap();

        assert_eq!(&a + &b, Err(MatrixError::ShapeMismatch));
        assert_eq!(&a - &b, Err(MatrixError::ShapeMismatch));
        // a 2x3 cannot left-multiply a 2x3
        assert_eq!(&a * &a, Err(MatrixError::ShapeMismatch));
        assert!((&a * &b).is_ok());
    }

    #[test]
    fn approx_eq() {
        let a = Matrix::from_nested_vec(vec![vec![1., 2.], vec![3., 4.]]).unwrap();

        assert!(a.approx_eq(&a));

        let mut b = a.clone();
        b[(0, 0)] += EPS / 2.;
        assert!(a.approx_eq(&b));

        b[(0, 0)] = 1. + 2. * EPS;
        assert!(!a.approx_eq(&b));

        // different shapes compare unequal instead of failing
        let c = Matrix::new(2, 3).unwrap();
        assert!(!a.approx_eq(&c));
    }

    #[test]
    fn determinant() {
        let id = Matrix::identity(4).unwrap();
        assert_eq!(id.det().unwrap(), 1.);

        let a = Matrix::from_nested_vec(vec![vec![1., 2.], vec![3., 4.]]).unwrap();
        assert_eq!(a.det().unwrap(), -2.);

        // swapping two rows negates the determinant
        let swapped = Matrix::from_nested_vec(vec![vec![3., 4.], vec![1., 2.]]).unwrap();
        assert!((swapped.det().unwrap() - 2.).abs() < EPS);

        let single = Matrix::from_linear(vec![-7.5], 1, 1).unwrap();
        assert_eq!(single.det().unwrap(), -7.5);

        let zero_row =
            Matrix::from_nested_vec(vec![vec![1., 2., 3.], vec![0., 0., 0.], vec![4., 5., 6.]])
                .unwrap();
        assert_eq!(zero_row.det().unwrap(), 0.);

        // a zero on the diagonal forces a pivot search
        let needs_pivot =
            Matrix::from_nested_vec(vec![vec![0., 1., 2.], vec![1., 0., 3.], vec![4., 5., 6.]])
                .unwrap();
        assert!((needs_pivot.det().unwrap() - 16.).abs() < EPS);

        let rect = Matrix::new(2, 3).unwrap();
        assert_eq!(rect.det(), Err(MatrixError::NotSquare));
    }

    #[test]
    fn determinant_early_stop() {
        // once the running pivot product falls to tolerance, the remaining
        // columns are not processed: the result is the partial product, not
        // the full determinant
        let m = Matrix::from_nested_vec(vec![
            vec![1e-4, 0., 0.],
            vec![0., 1e-4, 0.],
            vec![0., 0., 5.],
        ])
        .unwrap();

        let partial = 1e-4_f64 * 1e-4;
        let det = m.det().unwrap();
        assert_eq!(det, partial);
        assert_ne!(det, partial * 5.);
    }

    #[test]
    fn cofactor_matrix() {
        let a = Matrix::from_nested_vec(vec![
            vec![1., 2., 3.],
            vec![0., 4., 2.],
            vec![5., 2., 1.],
        ])
        .unwrap();

        let c = a.cofactor_matrix().unwrap();
        let expected = Matrix::from_nested_vec(vec![
            vec![0., 10., -20.],
            vec![4., -14., 8.],
            vec![-8., -2., 4.],
        ])
        .unwrap();
        assert!(c.approx_eq(&expected));

        let single = Matrix::from_linear(vec![5.], 1, 1).unwrap();
        assert_eq!(single.cofactor_matrix(), Err(MatrixError::CofactorUndefined));

        let rect = Matrix::new(2, 3).unwrap();
        assert_eq!(rect.cofactor_matrix(), Err(MatrixError::NotSquare));
    }

    #[test]
    fn inverse() {
        let a = Matrix::from_nested_vec(vec![vec![1., 2.], vec![3., 4.]]).unwrap();
        let inv = a.inv().unwrap();
        let expected =
            Matrix::from_nested_vec(vec![vec![-2., 1.], vec![1.5, -0.5]]).unwrap();
        assert!(inv.approx_eq(&expected));
        assert!((&inv * &a).unwrap().approx_eq(&Matrix::identity(2).unwrap()));

        let b = Matrix::from_nested_vec(vec![
            vec![2., 5., 7.],
            vec![6., 3., 4.],
            vec![5., -2., -3.],
        ])
        .unwrap();
        let inv = b.inv().unwrap();
        assert!((&inv * &b).unwrap().approx_eq(&Matrix::identity(3).unwrap()));
        assert!((&b * &inv).unwrap().approx_eq(&Matrix::identity(3).unwrap()));

        let single = Matrix::from_linear(vec![4.], 1, 1).unwrap();
        assert_eq!(single.inv().unwrap().data, vec![0.25]);

        // rows are linearly dependent
        let singular =
            Matrix::from_nested_vec(vec![vec![1., 2.], vec![2., 4.]]).unwrap();
        assert_eq!(singular.inv(), Err(MatrixError::Singular));

        let rect = Matrix::new(2, 3).unwrap();
        assert_eq!(rect.inv(), Err(MatrixError::NotSquare));
    }
}
