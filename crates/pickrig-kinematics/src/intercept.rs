//! Closed-form intercept time between the arm and a conveyor-borne target.
//!
//! The target drifts at constant `v_conveyor` along the belt axis while the
//! arm travels to an offset `(dx, dy, dz)` under a speed bound `v_max` and an
//! acceleration bound `a_max`.  The meeting time is
//!
//! ```text
//! t = -( v_max³ + √R - a_max·dx·v_conveyor ) / ( a_max·(v_conveyor² - v_max²) )
//!
//! R = a_max²·dx²·v_max²
//!   - a_max²·dy²·v_conveyor² + a_max²·dy²·v_max²
//!   - a_max²·dz²·v_conveyor² + a_max²·dz²·v_max²
//!   - 2·a_max·dx·v_conveyor·v_max³
//!   + v_conveyor²·v_max⁴
//! ```
//!
//! The expression is evaluated term by term in exactly that order and sign
//! convention; it is treated as a fixed contract, not re-derived.  Cubes and
//! fourth powers go through `powf` so each is a single rounded `pow`.

use pickrig_types::{InterceptSolution, RigError};
use tracing::debug;

/// The discriminant `R` of the intercept equation.
///
/// Negative when the target cannot be reached within the given limits.
pub fn intercept_radicand(dx: f64, dy: f64, dz: f64, v_conveyor: f64, v_max: f64, a_max: f64) -> f64 {
    a_max.powi(2) * dx.powi(2) * v_max.powi(2)
        - a_max.powi(2) * dy.powi(2) * v_conveyor.powi(2)
        + a_max.powi(2) * dy.powi(2) * v_max.powi(2)
        - a_max.powi(2) * dz.powi(2) * v_conveyor.powi(2)
        + a_max.powi(2) * dz.powi(2) * v_max.powi(2)
        - 2.0 * a_max * dx * v_conveyor * v_max.powf(3.0)
        + v_conveyor.powi(2) * v_max.powf(4.0)
}

/// Solve for the time (s) at which the arm meets the moving target.
///
/// # Errors
///
/// - [`RigError::Domain`] for a non-finite input, `a_max == 0`, or
///   `v_conveyor² == v_max²` (the equation degenerates).
/// - [`RigError::UnreachableTarget`] when the radicand is negative or the
///   root is not a positive finite time.
pub fn solve_intercept_time(
    dx: f64,
    dy: f64,
    dz: f64,
    v_conveyor: f64,
    v_max: f64,
    a_max: f64,
) -> Result<InterceptSolution, RigError> {
    let inputs = [dx, dy, dz, v_conveyor, v_max, a_max];
    if inputs.iter().any(|v| !v.is_finite()) {
        return Err(RigError::Domain(format!(
            "non-finite intercept input {inputs:?}"
        )));
    }
    if a_max == 0.0 {
        return Err(RigError::Domain("a_max must be non-zero".to_string()));
    }
    let denominator = a_max * (v_conveyor.powi(2) - v_max.powi(2));
    if denominator == 0.0 {
        return Err(RigError::Domain(format!(
            "conveyor speed {v_conveyor} equals arm speed bound {v_max}"
        )));
    }

    let radicand = intercept_radicand(dx, dy, dz, v_conveyor, v_max, a_max);
    if radicand < 0.0 {
        return Err(RigError::UnreachableTarget { radicand });
    }

    let t = -(v_max.powf(3.0) + radicand.sqrt() - a_max * dx * v_conveyor) / denominator;
    debug!(dx, dy, dz, v_conveyor, v_max, a_max, radicand, t, "intercept solved");

    InterceptSolution::new(t).ok_or(RigError::UnreachableTarget { radicand })
}
