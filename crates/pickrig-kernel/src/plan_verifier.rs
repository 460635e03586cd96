//! [`PlanVerifier`] – safety gate between the planner and the schedule.
//!
//! The schedule is open-loop: once `MOVING` fires nothing re-checks the
//! target.  Every plan therefore passes through [`PlanVerifier::verify`]
//! first.  Rules run in insertion order and the first violation is returned
//! as a [`RigError::PlanRejected`]; a rejected plan never reaches a device.

use pickrig_types::{InterceptPlan, RigError};

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// One condition a plan must satisfy before motion starts.
pub trait Rule: Send + Sync {
    /// Short name reported in [`RigError::PlanRejected`].
    fn name(&self) -> &str;

    /// Return `Ok(())` when `plan` is acceptable.
    fn check(&self, plan: &InterceptPlan) -> Result<(), RigError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PlanVerifier
// ────────────────────────────────────────────────────────────────────────────

/// Rule engine evaluated on every [`InterceptPlan`].
///
/// # Example
///
/// ```
/// use pickrig_kernel::plan_verifier::{InterceptWindowRule, PlanVerifier};
/// use pickrig_types::{InterceptPlan, Pose6};
///
/// let mut verifier = PlanVerifier::new();
/// verifier.add_rule(Box::new(InterceptWindowRule { max_s: 2.0 }));
///
/// let plan = InterceptPlan { relative_pose: Pose6::default(), accel: 5.0, vel: 3.0, t_intercept: 0.8 };
/// assert!(verifier.verify(&plan).is_ok());
///
/// let late = InterceptPlan { t_intercept: 4.0, ..plan };
/// assert!(verifier.verify(&late).is_err());
/// ```
#[derive(Default)]
pub struct PlanVerifier {
    rules: Vec<Box<dyn Rule>>,
}

impl PlanVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifier carrying the two built-in rules.
    pub fn with_limits(max_intercept_s: f64, max_reach_m: f64) -> Self {
        let mut verifier = Self::new();
        verifier.add_rule(Box::new(InterceptWindowRule {
            max_s: max_intercept_s,
        }));
        verifier.add_rule(Box::new(ReachRule { max_reach_m }));
        verifier
    }

    /// Register a rule.  Rules are evaluated in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check `plan` against every rule; the first failure wins.
    pub fn verify(&self, plan: &InterceptPlan) -> Result<(), RigError> {
        for rule in &self.rules {
            rule.check(plan)?;
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

/// Rejects plans whose intercept lies further out than `max_s` seconds.
/// The longer the approach, the more the belt's speed error accumulates.
pub struct InterceptWindowRule {
    pub max_s: f64,
}

impl Rule for InterceptWindowRule {
    fn name(&self) -> &str {
        "intercept_window"
    }

    fn check(&self, plan: &InterceptPlan) -> Result<(), RigError> {
        if plan.t_intercept > self.max_s {
            return Err(RigError::PlanRejected {
                rule: self.name().to_string(),
                details: format!("t_intercept {} s exceeds {} s", plan.t_intercept, self.max_s),
            });
        }
        Ok(())
    }
}

/// Rejects relative moves whose translation exceeds the arm's reach.
pub struct ReachRule {
    pub max_reach_m: f64,
}

impl Rule for ReachRule {
    fn name(&self) -> &str {
        "reach"
    }

    fn check(&self, plan: &InterceptPlan) -> Result<(), RigError> {
        let reach = plan.relative_pose.translation_norm();
        if !reach.is_finite() || reach > self.max_reach_m {
            return Err(RigError::PlanRejected {
                rule: self.name().to_string(),
                details: format!("translation {reach:.3} m exceeds reach {} m", self.max_reach_m),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pickrig_types::Pose6;

    fn plan(x: f64, t_intercept: f64) -> InterceptPlan {
        InterceptPlan {
            relative_pose: Pose6::new(x, 0.0, -0.2, 0.0, 0.0, 0.0),
            accel: 5.0,
            vel: 3.0,
            t_intercept,
        }
    }

    #[test]
    fn empty_verifier_accepts_everything() {
        let v = PlanVerifier::new();
        assert!(v.is_empty());
        assert!(v.verify(&plan(10.0, 100.0)).is_ok());
    }

    #[test]
    fn plan_within_limits_passes() {
        let v = PlanVerifier::with_limits(5.0, 1.3);
        assert_eq!(v.len(), 2);
        assert!(v.verify(&plan(0.2, 0.77)).is_ok());
    }

    #[test]
    fn late_intercept_is_rejected() {
        let v = PlanVerifier::with_limits(1.0, 1.3);
        let err = v.verify(&plan(0.2, 1.5)).unwrap_err();
        assert!(matches!(err, RigError::PlanRejected { ref rule, .. } if rule == "intercept_window"));
    }

    #[test]
    fn out_of_reach_is_rejected() {
        let v = PlanVerifier::with_limits(5.0, 1.3);
        let err = v.verify(&plan(1.5, 0.8)).unwrap_err();
        assert!(matches!(err, RigError::PlanRejected { ref rule, .. } if rule == "reach"));
    }

    #[test]
    fn first_failing_rule_wins() {
        let v = PlanVerifier::with_limits(1.0, 1.0);
        let err = v.verify(&plan(2.0, 2.0)).unwrap_err();
        assert!(matches!(err, RigError::PlanRejected { ref rule, .. } if rule == "intercept_window"));
    }

    #[test]
    fn custom_rule_can_be_registered() {
        struct NoReverse;
        impl Rule for NoReverse {
            fn name(&self) -> &str {
                "no_reverse"
            }
            fn check(&self, plan: &InterceptPlan) -> Result<(), RigError> {
                if plan.relative_pose.x < 0.0 {
                    return Err(RigError::PlanRejected {
                        rule: self.name().to_string(),
                        details: "target behind the tool".to_string(),
                    });
                }
                Ok(())
            }
        }

        let mut v = PlanVerifier::new();
        v.add_rule(Box::new(NoReverse));
        assert!(v.verify(&plan(0.1, 0.5)).is_ok());
        assert!(v.verify(&plan(-0.1, 0.5)).is_err());
    }
}
