#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Closed-form rigid fitting (Kabsch / Umeyama).
pub mod rigid;

/// Rigid transform type and operations.
pub mod transform;

/// Rotation matrix constructors.
pub mod transforms;

pub use rigid::{fit_rigid, RigidFitError};
pub use transform::{RigidTransform, TransformError};
