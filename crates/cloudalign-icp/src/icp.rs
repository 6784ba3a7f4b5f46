use cloudalign_linalg::{fit_rigid, RigidTransform};
use log::debug;

use crate::error::IcpError;
use crate::matcher::{BruteForceMatcher, NearestNeighborSearch};
use crate::pointcloud::PointCloud;

/// Parameters of the ICP iteration.
#[derive(Debug, Clone)]
pub struct IcpParams {
    /// Maximum number of iterations to perform. Must be at least 1.
    pub max_iterations: usize,
    /// Convergence threshold on the change of the mean nearest-neighbor
    /// distance between two consecutive iterations (strict `<` comparison).
    ///
    /// The default of `0.0` preserves the reference behavior: the loop runs
    /// the full iteration budget, since no change is strictly smaller than
    /// zero. Callers wanting early stopping must supply a positive value.
    pub tolerance: f64,
}

impl Default for IcpParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 0.0,
        }
    }
}

/// Result of a registration run.
///
/// The transform maps the original source cloud onto its final aligned
/// position in the target frame.
#[derive(Debug, Clone)]
pub struct RegistrationResult {
    /// Estimated rigid transform from the source to the target frame.
    pub transform: RigidTransform,
    /// Nearest-neighbor distances from the last iteration, one per source
    /// point in source order. Empty when the run was cancelled before the
    /// first iteration.
    pub distances: Vec<f64>,
    /// Number of iterations actually performed.
    pub iterations: usize,
}

/// Compute the rigid transform best aligning `source` onto `target` under
/// *known* correspondence (point `i` of `source` pairs with point `i` of
/// `target`). Cloud-level boundary over
/// [`cloudalign_linalg::fit_rigid`].
pub fn fit_transform(source: &PointCloud, target: &PointCloud) -> Result<RigidTransform, IcpError> {
    if source.len() != target.len() || source.dim() != target.dim() || source.is_empty() {
        return Err(shape_error(source, target));
    }
    Ok(fit_rigid(source.as_flat(), target.as_flat(), source.dim())?)
}

/// Register `source` onto `target` with unknown correspondence, using the
/// exhaustive reference matcher.
///
/// Alternates nearest-neighbor correspondence search and closed-form rigid
/// fitting until the mean nearest-neighbor distance stops changing by more
/// than `params.tolerance`, or the iteration budget is exhausted. The
/// returned transform is recovered by a single final re-fit between the
/// original source cloud and its aligned working copy, so incremental
/// floating-point drift does not accumulate in the output.
pub fn register(
    source: &PointCloud,
    target: &PointCloud,
    init_pose: Option<&RigidTransform>,
    params: &IcpParams,
) -> Result<RegistrationResult, IcpError> {
    let matcher = BruteForceMatcher::new(target);
    register_cancellable(source, target, &matcher, init_pose, params, || false)
}

/// [`register`] with a caller-supplied correspondence matcher, e.g.
/// [`crate::matcher::KdTreeMatcher`] for large 3-D clouds. The matcher must
/// have been built from `target`.
pub fn register_with_matcher<M: NearestNeighborSearch>(
    source: &PointCloud,
    target: &PointCloud,
    matcher: &M,
    init_pose: Option<&RigidTransform>,
    params: &IcpParams,
) -> Result<RegistrationResult, IcpError> {
    register_cancellable(source, target, matcher, init_pose, params, || false)
}

/// [`register_with_matcher`] with an injectable cancellation predicate,
/// queried once at the top of every iteration. When the predicate returns
/// `true` the loop stops early and the run terminates normally through the
/// final re-fit, reporting the iterations completed so far.
pub fn register_cancellable<M, F>(
    source: &PointCloud,
    target: &PointCloud,
    matcher: &M,
    init_pose: Option<&RigidTransform>,
    params: &IcpParams,
    mut cancel: F,
) -> Result<RegistrationResult, IcpError>
where
    M: NearestNeighborSearch,
    F: FnMut() -> bool,
{
    if params.max_iterations == 0 {
        return Err(IcpError::InvalidConfiguration {
            reason: "max_iterations must be at least 1".to_string(),
        });
    }
    if !params.tolerance.is_finite() || params.tolerance < 0.0 {
        return Err(IcpError::InvalidConfiguration {
            reason: format!("tolerance must be finite and non-negative, got {}", params.tolerance),
        });
    }
    if source.len() != target.len() || source.dim() != target.dim() || source.is_empty() {
        return Err(shape_error(source, target));
    }
    if let Some(pose) = init_pose {
        if pose.dim() != source.dim() {
            return Err(IcpError::DimensionMismatch {
                src_len: source.len(),
                src_dim: source.dim(),
                dst_len: source.len(),
                dst_dim: pose.dim(),
            });
        }
    }

    // working copy of the source, optionally seeded with the initial pose
    let mut current = match init_pose {
        Some(pose) => source.transformed(pose)?,
        None => source.clone(),
    };

    let mut prev_error = f64::INFINITY;
    let mut distances = Vec::new();
    let mut iterations = 0;

    for i in 0..params.max_iterations {
        if cancel() {
            debug!("registration cancelled before iteration {i}");
            break;
        }

        // correspondence hypothesis for this round
        let matches = matcher.nearest(&current)?;
        let matched = target.select(&matches.indices);

        // incremental fit against the hypothesis, compounded into the
        // working copy
        let delta = fit_rigid(current.as_flat(), matched.as_flat(), current.dim())?;
        current = current.transformed(&delta)?;

        let mean_error =
            matches.distances.iter().sum::<f64>() / matches.distances.len() as f64;
        distances = matches.distances;
        iterations = i + 1;
        debug!("iteration {i}: mean nearest-neighbor distance {mean_error}");

        if (mean_error - prev_error).abs() < params.tolerance {
            debug!("converged after {iterations} iterations");
            break;
        }
        prev_error = mean_error;
    }

    // recover the single cumulative transform from the untouched source, so
    // the output does not accumulate drift from composing per-iteration
    // deltas
    let transform = fit_rigid(source.as_flat(), current.as_flat(), source.dim())?;

    Ok(RegistrationResult {
        transform,
        distances,
        iterations,
    })
}

fn shape_error(source: &PointCloud, target: &PointCloud) -> IcpError {
    IcpError::DimensionMismatch {
        src_len: source.len(),
        src_dim: source.dim(),
        dst_len: target.len(),
        dst_dim: target.dim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::KdTreeMatcher;
    use approx::assert_relative_eq;
    use cloudalign_linalg::transforms::{axis_angle, rotation2};

    /// 2x2x3 grid, minimum pairwise spacing 1: small rigid motions keep
    /// every transformed point closest to its true counterpart.
    fn grid_cloud() -> PointCloud {
        let mut points = Vec::new();
        for z in 0..3 {
            for y in 0..2 {
                for x in 0..2 {
                    points.push([x as f64, y as f64, z as f64]);
                }
            }
        }
        PointCloud::from_points3d(&points)
    }

    fn assert_transforms_close(actual: &RigidTransform, expected: &RigidTransform, eps: f64) {
        assert_eq!(actual.dim(), expected.dim());
        for i in 0..expected.dim() {
            for j in 0..expected.dim() {
                assert_relative_eq!(
                    actual.rotation().read(i, j),
                    expected.rotation().read(i, j),
                    epsilon = eps
                );
            }
            assert_relative_eq!(
                actual.translation().read(i),
                expected.translation().read(i),
                epsilon = eps
            );
        }
    }

    #[test]
    fn test_register_recovers_transform_of_shuffled_cloud(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let source = grid_cloud();

        let rotation = axis_angle(&[0.3, -0.2, 0.9], 0.08)?;
        let mut translation = faer::Col::zeros(3);
        translation.write(0, 0.05);
        translation.write(1, -0.03);
        translation.write(2, 0.02);
        let expected = RigidTransform::new(rotation, translation)?;

        // transform and shuffle: registration must not depend on point order
        let moved = source.transformed(&expected)?;
        let permutation = [7usize, 2, 11, 0, 5, 9, 1, 10, 4, 8, 3, 6];
        let target = moved.select(&permutation);

        let params = IcpParams {
            max_iterations: 100,
            tolerance: 1e-10,
        };
        let result = register(&source, &target, None, &params)?;

        assert!(result.iterations <= 100);
        assert_transforms_close(&result.transform, &expected, 1e-6);
        assert!(result.transform.is_rigid(1e-9));

        let mean_residual =
            result.distances.iter().sum::<f64>() / result.distances.len() as f64;
        assert!(mean_residual < 1e-9);
        Ok(())
    }

    #[test]
    fn test_register_unit_cube_quarter_turn_about_z() -> Result<(), Box<dyn std::error::Error>> {
        // the cube is 4-fold symmetric about z, so several rigid motions
        // reach zero residual; a rough initial pose near the true rotation
        // disambiguates and the engine must then lock onto the exact
        // quarter turn
        let cube = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
        ];
        let source = PointCloud::from_points3d(&cube);

        let quarter_turn = axis_angle(&[0.0, 0.0, 1.0], std::f64::consts::FRAC_PI_2)?;
        let expected = RigidTransform::new(quarter_turn, faer::Col::zeros(3))?;
        let target = source.transformed(&expected)?;

        let rough = RigidTransform::new(
            axis_angle(&[0.0, 0.0, 1.0], 80.0_f64.to_radians())?,
            faer::Col::zeros(3),
        )?;

        let result = register(&source, &target, Some(&rough), &IcpParams::default())?;

        // default tolerance of zero runs the full budget
        assert_eq!(result.iterations, 100);
        assert_transforms_close(&result.transform, &expected, 1e-6);

        let mean_residual =
            result.distances.iter().sum::<f64>() / result.distances.len() as f64;
        assert!(mean_residual < 1e-9);
        Ok(())
    }

    #[test]
    fn test_register_2d() -> Result<(), Box<dyn std::error::Error>> {
        let source =
            PointCloud::from_points2d(&[[0.0, 0.0], [2.0, 0.0], [0.0, 2.0], [2.0, 2.0], [1.0, 3.0]]);

        let mut translation = faer::Col::zeros(2);
        translation.write(0, 0.03);
        translation.write(1, -0.04);
        let expected = RigidTransform::new(rotation2(0.05), translation)?;
        let target = source.transformed(&expected)?.select(&[3, 1, 4, 0, 2]);

        let params = IcpParams {
            max_iterations: 100,
            tolerance: 1e-10,
        };
        let result = register(&source, &target, None, &params)?;
        assert_transforms_close(&result.transform, &expected, 1e-6);
        Ok(())
    }

    #[test]
    fn test_register_with_kdtree_matcher() -> Result<(), Box<dyn std::error::Error>> {
        let source = grid_cloud();
        let rotation = axis_angle(&[0.0, 1.0, 0.0], 0.05)?;
        let expected = RigidTransform::new(rotation, faer::Col::zeros(3))?;
        let target = source.transformed(&expected)?;

        let matcher = KdTreeMatcher::build(&target)?;
        let params = IcpParams {
            max_iterations: 100,
            tolerance: 1e-10,
        };
        let result = register_with_matcher(&source, &target, &matcher, None, &params)?;
        assert_transforms_close(&result.transform, &expected, 1e-6);
        Ok(())
    }

    #[test]
    fn test_register_single_point_is_pure_translation() -> Result<(), IcpError> {
        let source = PointCloud::from_points3d(&[[1.0, 2.0, 3.0]]);
        let target = PointCloud::from_points3d(&[[4.0, 5.0, 6.0]]);

        let result = register(&source, &target, None, &IcpParams::default())?;
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(
                    result.transform.rotation().read(i, j),
                    expected,
                    epsilon = 1e-12
                );
            }
            assert_relative_eq!(result.transform.translation().read(i), 3.0, epsilon = 1e-9);
        }
        assert_eq!(result.distances.len(), 1);
        assert!(result.distances[0] < 1e-9);
        Ok(())
    }

    #[test]
    fn test_register_rejects_mismatched_cardinality() {
        let source = PointCloud::from_points3d(&[[0.0; 3]; 5]);
        let target = PointCloud::from_points3d(&[[0.0; 3]; 7]);
        let err = register(&source, &target, None, &IcpParams::default()).unwrap_err();
        assert_eq!(
            err,
            IcpError::DimensionMismatch {
                src_len: 5,
                src_dim: 3,
                dst_len: 7,
                dst_dim: 3,
            }
        );
    }

    #[test]
    fn test_register_rejects_zero_iteration_budget() {
        let cloud = PointCloud::from_points3d(&[[0.0; 3]]);
        let params = IcpParams {
            max_iterations: 0,
            tolerance: 0.0,
        };
        assert!(matches!(
            register(&cloud, &cloud, None, &params),
            Err(IcpError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_register_rejects_negative_tolerance() {
        let cloud = PointCloud::from_points3d(&[[0.0; 3]]);
        let params = IcpParams {
            max_iterations: 10,
            tolerance: -1.0,
        };
        assert!(matches!(
            register(&cloud, &cloud, None, &params),
            Err(IcpError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_register_propagates_degenerate_input() {
        let source = PointCloud::from_points3d(&[[f64::NAN, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let target = PointCloud::from_points3d(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let err = register(&source, &target, None, &IcpParams::default()).unwrap_err();
        assert!(matches!(err, IcpError::DegenerateInput { .. }));
    }

    #[test]
    fn test_zero_tolerance_runs_full_budget_on_aligned_clouds() -> Result<(), IcpError> {
        // identical clouds converge immediately in residual terms, but the
        // default tolerance of zero never triggers the early exit
        let cloud = grid_cloud();
        let result = register(&cloud, &cloud, None, &IcpParams::default())?;
        assert_eq!(result.iterations, 100);
        for d in &result.distances {
            assert!(*d < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_cancellation_stops_after_requested_iterations() -> Result<(), IcpError> {
        let cloud = grid_cloud();
        let matcher = BruteForceMatcher::new(&cloud);
        let mut calls = 0;
        let result = register_cancellable(
            &cloud,
            &cloud,
            &matcher,
            None,
            &IcpParams::default(),
            move || {
                calls += 1;
                calls > 2
            },
        )?;
        assert_eq!(result.iterations, 2);
        assert_eq!(result.distances.len(), cloud.len());
        Ok(())
    }

    #[test]
    fn test_fit_transform_known_correspondence() -> Result<(), Box<dyn std::error::Error>> {
        let source = grid_cloud();
        let rotation = axis_angle(&[1.0, 1.0, 0.0], 0.4)?;
        let mut translation = faer::Col::zeros(3);
        translation.write(0, 1.5);
        let expected = RigidTransform::new(rotation, translation)?;
        let target = source.transformed(&expected)?;

        let fit = fit_transform(&source, &target)?;
        assert_transforms_close(&fit, &expected, 1e-6);
        Ok(())
    }
}
