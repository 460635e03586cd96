//! [`DeadlineSchedule`] – stage deadlines of one pick cycle.
//!
//! | Stage        | Released at (after `t_ref`)            |
//! |--------------|----------------------------------------|
//! | `MOVING`     | immediately                            |
//! | `GRASPING`   | `grasp_lead_fraction · t_intercept`    |
//! | `ARRIVED`    | `t_intercept`                          |
//! | `RETRACTING` | immediately after `ARRIVED`            |
//! | `RETURNING`  | `t_intercept + retreat_duration`       |
//! | `DONE`       | immediately after `RETURNING`          |

use std::time::Duration;

use pickrig_types::{InterceptPlan, RigError, ScheduleConfig, Stage};

/// One entry of the schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledStage {
    pub stage: Stage,
    /// Offset from `t_ref` at which the stage may begin.
    pub at: Duration,
    /// `true` when `at` is a real deadline rather than "as soon as the
    /// previous stage is done".
    pub gated: bool,
}

/// Ordered, non-decreasing stage deadlines.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadlineSchedule {
    entries: Vec<ScheduledStage>,
    retreat: Duration,
}

fn seconds(name: &str, value: f64) -> Result<Duration, RigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| RigError::InvalidConfig(format!("{name} = {value}: {e}")))
}

impl DeadlineSchedule {
    /// Derive the schedule for `plan`.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::InvalidConfig`] for a lead fraction outside
    /// `(0, 1]`, a negative or non-finite retreat duration, or a plan whose
    /// intercept time is not a positive finite number.
    pub fn from_plan(plan: &InterceptPlan, config: &ScheduleConfig) -> Result<Self, RigError> {
        let fraction = config.grasp_lead_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(RigError::InvalidConfig(format!(
                "grasp_lead_fraction {fraction} outside (0, 1]"
            )));
        }
        if !(plan.t_intercept.is_finite() && plan.t_intercept > 0.0) {
            return Err(RigError::InvalidConfig(format!(
                "t_intercept {} is not a valid schedule base",
                plan.t_intercept
            )));
        }

        let arrive = seconds("t_intercept", plan.t_intercept)?;
        let grasp = seconds("grasp deadline", plan.t_intercept * fraction)?;
        let retreat = seconds("retreat_duration_s", config.retreat_duration_s)?;
        let home = arrive + retreat;

        let entry = |stage, at, gated| ScheduledStage { stage, at, gated };
        Ok(Self {
            entries: vec![
                entry(Stage::Moving, Duration::ZERO, false),
                entry(Stage::Grasping, grasp, true),
                entry(Stage::Arrived, arrive, true),
                entry(Stage::Retracting, arrive, false),
                entry(Stage::Returning, home, true),
                entry(Stage::Done, home, false),
            ],
            retreat,
        })
    }

    pub fn entries(&self) -> &[ScheduledStage] {
        &self.entries
    }

    /// How long the retreat velocity command runs.
    pub fn retreat(&self) -> Duration {
        self.retreat
    }

    /// Deadline of `stage`, if it is part of the schedule.
    pub fn deadline(&self, stage: Stage) -> Option<Duration> {
        self.entries.iter().find(|e| e.stage == stage).map(|e| e.at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pickrig_types::Pose6;

    fn plan(t_intercept: f64) -> InterceptPlan {
        InterceptPlan {
            relative_pose: Pose6::default(),
            accel: 5.0,
            vel: 3.0,
            t_intercept,
        }
    }

    #[test]
    fn deadlines_follow_fraction_and_retreat() {
        let schedule = DeadlineSchedule::from_plan(&plan(0.8), &ScheduleConfig::default()).unwrap();
        assert_eq!(schedule.deadline(Stage::Moving), Some(Duration::ZERO));
        assert_eq!(schedule.deadline(Stage::Grasping), Some(Duration::from_millis(500)));
        assert_eq!(schedule.deadline(Stage::Arrived), Some(Duration::from_millis(800)));
        assert_eq!(schedule.deadline(Stage::Returning), Some(Duration::from_millis(1300)));
        assert_eq!(schedule.deadline(Stage::Init), None);
        assert_eq!(schedule.retreat(), Duration::from_millis(500));
    }

    #[test]
    fn entries_are_ordered_and_non_decreasing() {
        let schedule = DeadlineSchedule::from_plan(&plan(1.37), &ScheduleConfig::default()).unwrap();
        let stages: Vec<Stage> = schedule.entries().iter().map(|e| e.stage).collect();
        assert_eq!(stages, Stage::ORDER[1..].to_vec());
        assert!(schedule.entries().windows(2).all(|w| w[0].at <= w[1].at));
    }

    #[test]
    fn invalid_lead_fraction_is_rejected() {
        for fraction in [0.0, -0.1, 1.5, f64::NAN] {
            let config = ScheduleConfig {
                grasp_lead_fraction: fraction,
                ..ScheduleConfig::default()
            };
            assert!(matches!(
                DeadlineSchedule::from_plan(&plan(0.8), &config),
                Err(RigError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn invalid_intercept_is_never_a_schedule_base() {
        for t in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(DeadlineSchedule::from_plan(&plan(t), &ScheduleConfig::default()).is_err());
        }
    }

    #[test]
    fn negative_retreat_is_rejected() {
        let config = ScheduleConfig {
            retreat_duration_s: -0.5,
            ..ScheduleConfig::default()
        };
        assert!(DeadlineSchedule::from_plan(&plan(0.8), &config).is_err());
    }
}
