use faer::Mat;

/// Compute the 3x3 rotation matrix from an axis and angle (Rodrigues).
///
/// The axis is normalized internally; a zero axis is rejected.
///
/// Example:
///
/// ```
/// use cloudalign_linalg::transforms::axis_angle;
///
/// let rotation = axis_angle(&[1.0, 0.0, 0.0], std::f64::consts::PI / 2.0).unwrap();
/// assert!((rotation.read(1, 2) - (-1.0)).abs() < 1e-12);
/// ```
pub fn axis_angle(axis: &[f64; 3], angle: f64) -> Result<Mat<f64>, &'static str> {
    let axis_norm = {
        let magnitude = (axis[0].powi(2) + axis[1].powi(2) + axis[2].powi(2)).sqrt();
        match magnitude < 1e-10 {
            true => return Err("cannot compute rotation matrix from a zero vector"),
            false => [
                axis[0] / magnitude,
                axis[1] / magnitude,
                axis[2] / magnitude,
            ],
        }
    };

    let x = axis_norm[0];
    let y = axis_norm[1];
    let z = axis_norm[2];

    let c = angle.cos();
    let s = angle.sin();
    let t = 1.0 - c;

    Ok(faer::mat![
        [c + x * x * t, x * y * t - z * s, x * z * t + y * s],
        [x * y * t + z * s, c + y * y * t, y * z * t - x * s],
        [x * z * t - y * s, y * z * t + x * s, c + z * z * t],
    ])
}

/// Compute the 2x2 rotation matrix for a planar rotation by `angle` radians.
pub fn rotation2(angle: f64) -> Mat<f64> {
    let (s, c) = angle.sin_cos();
    faer::mat![[c, -s], [s, c]]
}
