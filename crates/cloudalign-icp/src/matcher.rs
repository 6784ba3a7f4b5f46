//! Nearest-neighbor correspondence search between two point clouds.

use kiddo::immutable::float::kdtree::ImmutableKdTree;

use crate::error::IcpError;
use crate::pointcloud::PointCloud;

/// Per-source-point nearest-neighbor result, index-aligned with the query
/// cloud: `distances[i]` and `indices[i]` describe the target point closest
/// to source point `i`. Distances are Euclidean.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestNeighborMatches {
    /// Euclidean distance from each source point to its nearest target.
    pub distances: Vec<f64>,
    /// Index into the target cloud of each nearest point.
    pub indices: Vec<usize>,
}

/// Correspondence search seam: built once from a target cloud, queried with
/// successive source clouds during the ICP iteration.
pub trait NearestNeighborSearch {
    /// For each point of `source`, find the closest target point.
    fn nearest(&self, source: &PointCloud) -> Result<NearestNeighborMatches, IcpError>;
}

/// Exhaustive O(N*M) scan, any dimension. This is the reference matcher:
/// ties (equal minimum distance) deterministically resolve to the lowest
/// target index encountered during the scan.
#[derive(Debug)]
pub struct BruteForceMatcher<'a> {
    target: &'a PointCloud,
}

impl<'a> BruteForceMatcher<'a> {
    /// Create a matcher scanning `target`.
    pub fn new(target: &'a PointCloud) -> Self {
        Self { target }
    }
}

impl NearestNeighborSearch for BruteForceMatcher<'_> {
    fn nearest(&self, source: &PointCloud) -> Result<NearestNeighborMatches, IcpError> {
        if source.dim() != self.target.dim() || self.target.is_empty() {
            return Err(IcpError::DimensionMismatch {
                src_len: source.len(),
                src_dim: source.dim(),
                dst_len: self.target.len(),
                dst_dim: self.target.dim(),
            });
        }

        let mut distances = Vec::with_capacity(source.len());
        let mut indices = Vec::with_capacity(source.len());
        for p in source.iter() {
            let mut best_dist_sq = f64::INFINITY;
            let mut best_index = 0;
            for (i, q) in self.target.iter().enumerate() {
                let dist_sq: f64 = p
                    .iter()
                    .zip(q.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                // strict comparison keeps the lowest index on ties
                if dist_sq < best_dist_sq {
                    best_dist_sq = dist_sq;
                    best_index = i;
                }
            }
            distances.push(best_dist_sq.sqrt());
            indices.push(best_index);
        }
        Ok(NearestNeighborMatches { distances, indices })
    }
}

/// K-d tree matcher over a 3-D target cloud, built on
/// [`kiddo::immutable::float::kdtree::ImmutableKdTree`].
///
/// Produces the same matches as [`BruteForceMatcher`] except when two target
/// points are exactly equidistant from a query, where the tree's traversal
/// order decides instead of the lowest index.
pub struct KdTreeMatcher {
    tree: ImmutableKdTree<f64, u32, 3, 32>,
    target_len: usize,
}

impl KdTreeMatcher {
    /// Build the tree from a non-empty 3-D target cloud.
    pub fn build(target: &PointCloud) -> Result<Self, IcpError> {
        if target.dim() != 3 || target.is_empty() {
            return Err(IcpError::DimensionMismatch {
                src_len: target.len(),
                src_dim: 3,
                dst_len: target.len(),
                dst_dim: target.dim(),
            });
        }
        let points: Vec<[f64; 3]> = target.iter().map(|p| [p[0], p[1], p[2]]).collect();
        Ok(Self {
            tree: ImmutableKdTree::new_from_slice(&points),
            target_len: target.len(),
        })
    }

    /// Number of points the tree was built from.
    pub fn target_len(&self) -> usize {
        self.target_len
    }
}

impl NearestNeighborSearch for KdTreeMatcher {
    fn nearest(&self, source: &PointCloud) -> Result<NearestNeighborMatches, IcpError> {
        if source.dim() != 3 {
            return Err(IcpError::DimensionMismatch {
                src_len: source.len(),
                src_dim: source.dim(),
                dst_len: self.target_len,
                dst_dim: 3,
            });
        }

        let mut distances = Vec::with_capacity(source.len());
        let mut indices = Vec::with_capacity(source.len());
        for p in source.iter() {
            let nn = self
                .tree
                .nearest_one::<kiddo::SquaredEuclidean>(&[p[0], p[1], p[2]]);
            distances.push(nn.distance.sqrt());
            indices.push(nn.item as usize);
        }
        Ok(NearestNeighborMatches { distances, indices })
    }
}
