#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod error;
pub use error::IcpError;

mod pointcloud;
pub use pointcloud::PointCloud;

mod matcher;
pub use matcher::{BruteForceMatcher, KdTreeMatcher, NearestNeighborMatches, NearestNeighborSearch};

mod icp;
pub use icp::{
    fit_transform, register, register_cancellable, register_with_matcher, IcpParams,
    RegistrationResult,
};
