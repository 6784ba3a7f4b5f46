//! Closed-form least-squares rigid fitting (Kabsch / Umeyama).

use faer::{Col, Mat};
use thiserror::Error;

use crate::transform::RigidTransform;

/// Error type for the rigid fit.
#[derive(Debug, Error, PartialEq)]
pub enum RigidFitError {
    /// The corresponding point sets disagree in cardinality or
    /// dimensionality, or one of them is empty.
    #[error("corresponding point sets disagree in shape: source is {src_len}x{src_dim}, target is {dst_len}x{dst_dim}")]
    DimensionMismatch {
        /// Number of source points.
        src_len: usize,
        /// Source point dimension.
        src_dim: usize,
        /// Number of target points.
        dst_len: usize,
        /// Target point dimension.
        dst_dim: usize,
    },
    /// The input cannot be processed at all, e.g. non-finite coordinates
    /// poisoning the cross-covariance.
    #[error("degenerate input: {reason}")]
    DegenerateInput {
        /// Which check failed.
        reason: String,
    },
}

/// Compute the rigid transform that best maps `src` onto `dst` in the
/// least-squares sense, where `src` and `dst` are flat row-major N x `dim`
/// buffers and point `i` of `src` corresponds to point `i` of `dst`.
///
/// The solution is the classic SVD construction: center both sets, build the
/// cross-covariance H = Ac^T * Bc, decompose H = U * S * V^T, take
/// R = V * U^T, and flip the sign of the last column of V when det(R) < 0 so
/// the result is always a proper rotation rather than a reflection. The
/// translation is t = cB - R * cA.
///
/// Rank-deficient input (fewer than `dim` + 1 points in general position,
/// collinear or coplanar configurations) never fails: the reflection
/// correction keeps the rotation proper, and when H is exactly the zero
/// matrix (a single point, or all points coincident with their centroid) the
/// rotation is the identity and the fit reduces to the centroid translation.
/// Non-finite coordinates are the only rejected input.
pub fn fit_rigid(src: &[f64], dst: &[f64], dim: usize) -> Result<RigidTransform, RigidFitError> {
    let (src_len, dst_len) = if dim == 0 {
        (src.len(), dst.len())
    } else {
        (src.len() / dim, dst.len() / dim)
    };
    if dim == 0
        || src.is_empty()
        || src.len() % dim != 0
        || dst.len() % dim != 0
        || src.len() != dst.len()
    {
        return Err(RigidFitError::DimensionMismatch {
            src_len,
            src_dim: dim,
            dst_len,
            dst_dim: dim,
        });
    }
    let n = src_len;

    // centroids of both sets
    let mut c_src = vec![0.0; dim];
    let mut c_dst = vec![0.0; dim];
    for i in 0..n {
        for j in 0..dim {
            c_src[j] += src[i * dim + j];
            c_dst[j] += dst[i * dim + j];
        }
    }
    for j in 0..dim {
        c_src[j] /= n as f64;
        c_dst[j] /= n as f64;
    }

    // cross-covariance H = Ac^T * Bc
    let mut h = Mat::<f64>::zeros(dim, dim);
    for i in 0..n {
        for j in 0..dim {
            let ac = src[i * dim + j] - c_src[j];
            for k in 0..dim {
                let bc = dst[i * dim + k] - c_dst[k];
                h.write(j, k, h.read(j, k) + ac * bc);
            }
        }
    }

    let mut h_is_zero = true;
    for j in 0..dim {
        for k in 0..dim {
            let v = h.read(j, k);
            if !v.is_finite() {
                return Err(RigidFitError::DegenerateInput {
                    reason: format!("cross-covariance entry ({j}, {k}) is not finite"),
                });
            }
            if v != 0.0 {
                h_is_zero = false;
            }
        }
    }

    let rotation = if h_is_zero {
        // no orientation information at all, pin the rotation to identity
        Mat::identity(dim, dim)
    } else {
        let svd = h.svd();
        let u = svd.u();
        let v = svd.v();
        let r = v * u.transpose();
        if r.determinant() < 0.0 {
            let mut v_corrected = v.to_owned();
            for i in 0..dim {
                v_corrected.write(i, dim - 1, -v_corrected.read(i, dim - 1));
            }
            v_corrected.as_ref() * u.transpose()
        } else {
            r
        }
    };

    // t = cB - R * cA
    let rotated = rotation.as_ref() * faer::col::from_slice(&c_src);
    let mut translation = Col::zeros(dim);
    for j in 0..dim {
        translation.write(j, c_dst[j] - rotated.read(j));
    }

    Ok(RigidTransform::from_parts(rotation, translation))
}
