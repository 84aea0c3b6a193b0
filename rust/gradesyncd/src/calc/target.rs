use serde::Serialize;

use super::{GradeError, GradeSummary, WEIGHT_EPSILON};

/// How much of the course weight is already decided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightProgress {
    pub final_grade: f64,
    pub total_weight: f64,
    /// Weight of categories with at least one graded assignment.
    pub graded_weight: f64,
}

impl WeightProgress {
    pub fn from_summary(summary: &GradeSummary) -> Self {
        Self {
            final_grade: summary.final_grade,
            total_weight: summary.total_weight,
            graded_weight: summary.graded_weight,
        }
    }

    pub fn remaining_weight(&self) -> f64 {
        self.total_weight - self.graded_weight
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetOutcome {
    #[serde(rename_all = "camelCase")]
    Needed { needed_average: f64 },
    #[serde(rename_all = "camelCase")]
    AlreadyAchieved { needed_average: f64 },
    #[serde(rename_all = "camelCase")]
    Infeasible {
        needed_average: f64,
        max_achievable: f64,
    },
    /// Every weighted category is graded; the target is met or missed for good.
    #[serde(rename_all = "camelCase")]
    NothingRemaining { achieved: bool },
}

impl TargetOutcome {
    pub fn needed_average(&self) -> Option<f64> {
        match self {
            TargetOutcome::Needed { needed_average }
            | TargetOutcome::AlreadyAchieved { needed_average }
            | TargetOutcome::Infeasible { needed_average, .. } => Some(*needed_average),
            TargetOutcome::NothingRemaining { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetReport {
    pub target_grade: f64,
    pub current_grade: f64,
    pub remaining_weight: f64,
    #[serde(flatten)]
    pub outcome: TargetOutcome,
}

/// Works out the average needed on the remaining weight to reach a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetSolver {
    max_achievable: f64,
}

impl Default for TargetSolver {
    fn default() -> Self {
        Self {
            max_achievable: 100.0,
        }
    }
}

impl TargetSolver {
    /// `max_achievable` is the highest average still treated as reachable;
    /// raise it above 100 when remaining work offers bonus points.
    pub fn new(max_achievable: f64) -> Result<Self, GradeError> {
        if !max_achievable.is_finite() || max_achievable <= 0.0 {
            return Err(GradeError::validation(
                "maxAchievable",
                format!("maxAchievable must be greater than 0 (got {max_achievable})"),
            ));
        }
        Ok(Self { max_achievable })
    }

    pub fn max_achievable(&self) -> f64 {
        self.max_achievable
    }

    pub fn solve(&self, summary: &GradeSummary, target: f64) -> Result<TargetReport, GradeError> {
        self.solve_progress(WeightProgress::from_summary(summary), target)
    }

    pub fn solve_progress(
        &self,
        progress: WeightProgress,
        target: f64,
    ) -> Result<TargetReport, GradeError> {
        if !target.is_finite() || target < 0.0 {
            return Err(GradeError::validation(
                "target",
                format!("target must be a non-negative number (got {target})"),
            ));
        }

        let remaining = progress.remaining_weight();
        let current = progress.final_grade;

        let outcome = if remaining <= WEIGHT_EPSILON {
            TargetOutcome::NothingRemaining {
                achieved: current >= target,
            }
        } else {
            let needed_average = (target - current) / (remaining / 100.0);
            if needed_average <= 0.0 {
                TargetOutcome::AlreadyAchieved { needed_average }
            } else if needed_average > self.max_achievable {
                TargetOutcome::Infeasible {
                    needed_average,
                    max_achievable: self.max_achievable,
                }
            } else {
                TargetOutcome::Needed { needed_average }
            }
        };

        Ok(TargetReport {
            target_grade: target,
            current_grade: current,
            remaining_weight: remaining.max(0.0),
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half_done(final_grade: f64) -> WeightProgress {
        WeightProgress {
            final_grade,
            total_weight: 100.0,
            graded_weight: 50.0,
        }
    }

    #[test]
    fn needed_average_for_reachable_target() {
        let r = TargetSolver::default()
            .solve_progress(half_done(70.0), 85.0)
            .unwrap();
        assert_eq!(r.remaining_weight, 50.0);
        assert_eq!(r.outcome, TargetOutcome::Needed { needed_average: 30.0 });
    }

    #[test]
    fn exceeded_target_is_already_achieved() {
        let r = TargetSolver::default()
            .solve_progress(half_done(70.0), 60.0)
            .unwrap();
        assert!(matches!(
            r.outcome,
            TargetOutcome::AlreadyAchieved { needed_average } if needed_average < 0.0
        ));
    }

    #[test]
    fn fully_graded_course_has_nothing_remaining() {
        let done = WeightProgress {
            final_grade: 88.0,
            total_weight: 100.0,
            graded_weight: 100.0,
        };
        let solver = TargetSolver::default();
        for (target, achieved) in [(50.0, true), (88.0, true), (95.0, false)] {
            let r = solver.solve_progress(done, target).unwrap();
            assert_eq!(r.outcome, TargetOutcome::NothingRemaining { achieved });
            assert_eq!(r.outcome.needed_average(), None);
        }
    }

    #[test]
    fn unreachable_target_is_infeasible() {
        let p = WeightProgress {
            final_grade: 30.0,
            total_weight: 100.0,
            graded_weight: 80.0,
        };
        let r = TargetSolver::default().solve_progress(p, 90.0).unwrap();
        match r.outcome {
            TargetOutcome::Infeasible {
                needed_average,
                max_achievable,
            } => {
                assert!((needed_average - 300.0).abs() < 1e-9);
                assert_eq!(max_achievable, 100.0);
            }
            other => panic!("expected infeasible, got {other:?}"),
        }
    }

    #[test]
    fn raised_ceiling_admits_bonus_targets() {
        let p = WeightProgress {
            final_grade: 40.0,
            total_weight: 100.0,
            graded_weight: 50.0,
        };
        let strict = TargetSolver::default().solve_progress(p, 95.0).unwrap();
        assert!(matches!(strict.outcome, TargetOutcome::Infeasible { .. }));

        let lenient = TargetSolver::new(120.0).unwrap().solve_progress(p, 95.0).unwrap();
        assert_eq!(lenient.outcome, TargetOutcome::Needed { needed_average: 110.0 });
    }

    #[test]
    fn nothing_graded_needs_the_target_itself() {
        let p = WeightProgress {
            final_grade: 0.0,
            total_weight: 100.0,
            graded_weight: 0.0,
        };
        let r = TargetSolver::default().solve_progress(p, 85.0).unwrap();
        assert_eq!(r.outcome, TargetOutcome::Needed { needed_average: 85.0 });
    }

    #[test]
    fn invalid_targets_and_ceilings_are_rejected() {
        let solver = TargetSolver::default();
        assert!(solver.solve_progress(half_done(70.0), -1.0).is_err());
        assert!(solver.solve_progress(half_done(70.0), f64::NAN).is_err());
        assert!(TargetSolver::new(0.0).is_err());
    }

    #[test]
    fn report_serializes_with_status_tag() {
        let r = TargetSolver::default()
            .solve_progress(half_done(70.0), 85.0)
            .unwrap();
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["status"], "needed");
        assert_eq!(v["neededAverage"], 30.0);
        assert_eq!(v["targetGrade"], 85.0);
        assert_eq!(v["currentGrade"], 70.0);
    }
}
