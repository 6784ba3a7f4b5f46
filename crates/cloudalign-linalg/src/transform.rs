//! Rigid transform type (rotation + translation) with homogeneous conversions.

use faer::{Col, Mat};
use thiserror::Error;

/// Error type for rigid transform construction and application.
#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    /// The rotation block is not a square matrix.
    #[error("rotation must be square, got {rows}x{cols}")]
    NonSquareRotation {
        /// Number of rows of the offending matrix.
        rows: usize,
        /// Number of columns of the offending matrix.
        cols: usize,
    },
    /// Two entities that must share a dimension do not.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Dimension required by the receiver.
        expected: usize,
        /// Dimension actually supplied.
        found: usize,
    },
    /// A flat coordinate buffer is not a whole number of points.
    #[error("buffer of length {len} is not a multiple of dimension {dim}")]
    MalformedBuffer {
        /// Length of the offending buffer.
        len: usize,
        /// Point dimension the buffer was interpreted with.
        dim: usize,
    },
    /// A matrix claimed to be homogeneous fails the shape or last-row check.
    #[error("matrix is not a homogeneous rigid transform: {reason}")]
    NotHomogeneous {
        /// Which check failed.
        reason: &'static str,
    },
}

/// A rigid motion in m dimensions: an orthonormal rotation with det +1 plus a
/// translation, jointly equivalent to an (m+1)x(m+1) homogeneous matrix.
///
/// The determinant invariant is established by
/// [`crate::rigid::fit_rigid`] (reflection correction) and can be checked on
/// any instance with [`RigidTransform::is_rigid`].
#[derive(Debug, Clone)]
pub struct RigidTransform {
    rotation: Mat<f64>,
    translation: Col<f64>,
}

impl RigidTransform {
    /// Create a transform from a rotation matrix and a translation vector.
    ///
    /// Validates shapes only; orthonormality is the caller's responsibility
    /// and can be asserted with [`RigidTransform::is_rigid`].
    pub fn new(rotation: Mat<f64>, translation: Col<f64>) -> Result<Self, TransformError> {
        if rotation.nrows() != rotation.ncols() {
            return Err(TransformError::NonSquareRotation {
                rows: rotation.nrows(),
                cols: rotation.ncols(),
            });
        }
        if translation.nrows() != rotation.nrows() {
            return Err(TransformError::DimensionMismatch {
                expected: rotation.nrows(),
                found: translation.nrows(),
            });
        }
        Ok(Self {
            rotation,
            translation,
        })
    }

    /// Shapes already guaranteed by the caller.
    pub(crate) fn from_parts(rotation: Mat<f64>, translation: Col<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The identity transform in `dim` dimensions.
    pub fn identity(dim: usize) -> Self {
        Self {
            rotation: Mat::identity(dim, dim),
            translation: Col::zeros(dim),
        }
    }

    /// Spatial dimension m of the transform.
    #[inline]
    pub fn dim(&self) -> usize {
        self.rotation.nrows()
    }

    /// The m x m rotation block.
    pub fn rotation(&self) -> &Mat<f64> {
        &self.rotation
    }

    /// The m-vector translation.
    pub fn translation(&self) -> &Col<f64> {
        &self.translation
    }

    /// Check that the rotation block is orthonormal with determinant +1,
    /// within `eps` on every entry of R^T*R - I and on det(R) - 1.
    pub fn is_rigid(&self, eps: f64) -> bool {
        let m = self.dim();
        let gram = self.rotation.transpose() * self.rotation.as_ref();
        for i in 0..m {
            for j in 0..m {
                let expected = if i == j { 1.0 } else { 0.0 };
                if (gram.read(i, j) - expected).abs() > eps {
                    return false;
                }
            }
        }
        (self.rotation.determinant() - 1.0).abs() <= eps
    }

    /// Transform a flat row-major buffer of points into a pre-allocated
    /// buffer of the same length.
    pub fn transform_points(&self, src: &[f64], dst: &mut [f64]) -> Result<(), TransformError> {
        let m = self.dim();
        if src.len() % m != 0 {
            return Err(TransformError::MalformedBuffer {
                len: src.len(),
                dim: m,
            });
        }
        if dst.len() != src.len() {
            return Err(TransformError::MalformedBuffer {
                len: dst.len(),
                dim: m,
            });
        }
        let n = src.len() / m;

        // view the source as N x m (row major) and the destination as its
        // m x N transpose over the same memory layout
        let points_in_src = faer::mat::from_row_major_slice(src, n, m);
        let mut points_in_dst = faer::mat::from_column_major_slice_mut(dst, m, n);

        faer::linalg::matmul::matmul(
            &mut points_in_dst,
            self.rotation.as_ref(),
            points_in_src.transpose(),
            None,
            1.0,
            faer::Parallelism::None,
        );

        for i in 0..n {
            for j in 0..m {
                let v = points_in_dst.read(j, i) + self.translation.read(j);
                points_in_dst.write(j, i, v);
            }
        }
        Ok(())
    }

    /// Transform a single point, returning the mapped coordinates.
    pub fn apply_point(&self, point: &[f64]) -> Result<Vec<f64>, TransformError> {
        if point.len() != self.dim() {
            return Err(TransformError::DimensionMismatch {
                expected: self.dim(),
                found: point.len(),
            });
        }
        let mut out = vec![0.0; point.len()];
        self.transform_points(point, &mut out)?;
        Ok(out)
    }

    /// Compose with another transform applied first: `self ∘ inner`, so that
    /// `compose(inner).apply(p) == self.apply(inner.apply(p))`.
    pub fn compose(&self, inner: &RigidTransform) -> Result<RigidTransform, TransformError> {
        if self.dim() != inner.dim() {
            return Err(TransformError::DimensionMismatch {
                expected: self.dim(),
                found: inner.dim(),
            });
        }
        let rotation = self.rotation.as_ref() * inner.rotation.as_ref();
        let rotated = self.rotation.as_ref() * inner.translation.as_ref();
        let mut translation = Col::zeros(self.dim());
        for j in 0..self.dim() {
            translation.write(j, rotated.read(j) + self.translation.read(j));
        }
        Ok(RigidTransform {
            rotation,
            translation,
        })
    }

    /// Assemble the (m+1)x(m+1) homogeneous matrix with the rotation in the
    /// top-left block and the translation in the last column.
    pub fn to_homogeneous(&self) -> Mat<f64> {
        let m = self.dim();
        let mut h = Mat::zeros(m + 1, m + 1);
        for i in 0..m {
            for j in 0..m {
                h.write(i, j, self.rotation.read(i, j));
            }
            h.write(i, m, self.translation.read(i));
        }
        h.write(m, m, 1.0);
        h
    }

    /// Parse an (m+1)x(m+1) homogeneous matrix back into rotation and
    /// translation. The last row must be (0, ..., 0, 1) within 1e-9.
    pub fn from_homogeneous(h: &Mat<f64>) -> Result<Self, TransformError> {
        if h.nrows() != h.ncols() {
            return Err(TransformError::NotHomogeneous {
                reason: "matrix is not square",
            });
        }
        if h.nrows() < 2 {
            return Err(TransformError::NotHomogeneous {
                reason: "matrix is smaller than 2x2",
            });
        }
        let m = h.nrows() - 1;
        for j in 0..m {
            if h.read(m, j).abs() > 1e-9 {
                return Err(TransformError::NotHomogeneous {
                    reason: "last row is not (0, ..., 0, 1)",
                });
            }
        }
        if (h.read(m, m) - 1.0).abs() > 1e-9 {
            return Err(TransformError::NotHomogeneous {
                reason: "last row is not (0, ..., 0, 1)",
            });
        }
        let mut rotation = Mat::zeros(m, m);
        let mut translation = Col::zeros(m);
        for i in 0..m {
            for j in 0..m {
                rotation.write(i, j, h.read(i, j));
            }
            translation.write(i, h.read(i, m));
        }
        Ok(Self {
            rotation,
            translation,
        })
    }
}
