//! Densemat is a small dense linear-algebra library for arbitrary-size
//! matrices of double-precision values.
//!
//! It provides construction, approximate equality under a fixed numeric
//! tolerance, elementwise sums and differences, scalar and matrix products,
//! transposition, determinants via Gaussian elimination with partial
//! pivoting, cofactor matrices built from recursive minor extraction, and
//! inverses built atop both.
//!
//! For example:
//!
//! ```
//! use densemat::matrix::Matrix;
//!
//! let a = Matrix::from_nested_vec(vec![vec![1., 2.], vec![3., 4.]]).unwrap();
//! assert_eq!(a.det().unwrap(), -2.);
//!
//! let inv = a.inv().unwrap();
//! let id = Matrix::identity(2).unwrap();
//! assert!((&a * &inv).unwrap().approx_eq(&id));
//! ```
//!
//! Every fallible operation reports a [matrix::MatrixError] instead of
//! panicking, and all working state (elimination copies, minors) is owned
//! by the operation that creates it.

pub mod matrix;
