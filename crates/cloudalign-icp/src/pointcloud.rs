use cloudalign_linalg::RigidTransform;

use crate::error::IcpError;

/// An ordered sequence of m-dimensional points.
///
/// Coordinates are stored as a flat row-major buffer (`len * dim` values)
/// with the dimension fixed per cloud. Index order matters only as the
/// alignment key for matcher and registration results.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    data: Vec<f64>,
    dim: usize,
}

impl PointCloud {
    /// Create a point cloud from a flat row-major coordinate buffer.
    ///
    /// Fails when `dim` is zero or the buffer is not a whole number of
    /// points.
    pub fn from_flat(data: Vec<f64>, dim: usize) -> Result<Self, IcpError> {
        if dim == 0 {
            return Err(IcpError::InvalidConfiguration {
                reason: "point dimension must be at least 1".to_string(),
            });
        }
        if data.len() % dim != 0 {
            return Err(IcpError::InvalidConfiguration {
                reason: format!(
                    "flat buffer of length {} is not a multiple of dimension {dim}",
                    data.len()
                ),
            });
        }
        Ok(Self { data, dim })
    }

    /// Create a 3-D point cloud from an array-of-points slice.
    pub fn from_points3d(points: &[[f64; 3]]) -> Self {
        Self {
            data: points.iter().flatten().copied().collect(),
            dim: 3,
        }
    }

    /// Create a 2-D point cloud from an array-of-points slice.
    pub fn from_points2d(points: &[[f64; 2]]) -> Self {
        Self {
            data: points.iter().flatten().copied().collect(),
            dim: 2,
        }
    }

    /// Number of points in the cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    /// Check if the cloud has no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Spatial dimension m of every point.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Coordinates of point `i`.
    ///
    /// Panics when `i` is out of bounds.
    pub fn point(&self, i: usize) -> &[f64] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Iterate over the points in order.
    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.dim)
    }

    /// The flat row-major coordinate buffer.
    pub fn as_flat(&self) -> &[f64] {
        &self.data
    }

    /// Gather the points at `indices`, in that order.
    pub(crate) fn select(&self, indices: &[usize]) -> PointCloud {
        let mut data = Vec::with_capacity(indices.len() * self.dim);
        for &i in indices {
            data.extend_from_slice(self.point(i));
        }
        PointCloud {
            data,
            dim: self.dim,
        }
    }

    /// Apply a rigid transform to every point, returning the mapped cloud.
    pub fn transformed(&self, transform: &RigidTransform) -> Result<PointCloud, IcpError> {
        if transform.dim() != self.dim {
            return Err(IcpError::DimensionMismatch {
                src_len: self.len(),
                src_dim: self.dim,
                dst_len: self.len(),
                dst_dim: transform.dim(),
            });
        }
        let mut data = vec![0.0; self.data.len()];
        transform.transform_points(&self.data, &mut data)?;
        Ok(PointCloud {
            data,
            dim: self.dim,
        })
    }
}
