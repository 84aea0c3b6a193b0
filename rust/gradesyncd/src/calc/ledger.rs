use serde::Serialize;

use super::{category_key, GradeError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAssignment {
    pub id: String,
    pub name: String,
    pub category: String,
    pub max_points: f64,
    /// `None` means ungraded.
    pub points_earned: Option<f64>,
}

impl LedgerAssignment {
    pub fn is_graded(&self) -> bool {
        self.points_earned.is_some()
    }
}

/// Assignments of one course, grouped by normalized category.
#[derive(Debug, Clone, Default)]
pub struct AssignmentLedger {
    assignments: Vec<LedgerAssignment>,
}

impl AssignmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_assignment(
        &mut self,
        id: &str,
        name: &str,
        category: &str,
        max_points: f64,
    ) -> Result<(), GradeError> {
        let category = category.trim();
        Self::validate_assignment(category, max_points)?;
        if self.assignments.iter().any(|a| a.id == id) {
            return Err(GradeError::validation(
                "assignmentId",
                format!("duplicate assignment id {id}"),
            ));
        }

        self.assignments.push(LedgerAssignment {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            max_points,
            points_earned: None,
        });
        Ok(())
    }

    /// Records (or replaces) the single grade of an assignment.
    pub fn record_grade(&mut self, assignment_id: &str, points_earned: f64) -> Result<(), GradeError> {
        Self::validate_points(points_earned)?;
        let Some(a) = self.assignments.iter_mut().find(|a| a.id == assignment_id) else {
            return Err(GradeError::validation(
                "assignmentId",
                format!("unknown assignment {assignment_id}"),
            ));
        };
        a.points_earned = Some(points_earned);
        Ok(())
    }

    /// Checks an assignment's category and point scale without adding it.
    pub fn validate_assignment(category: &str, max_points: f64) -> Result<(), GradeError> {
        if category.trim().is_empty() {
            return Err(GradeError::validation(
                "category",
                "category must not be empty",
            ));
        }
        if !max_points.is_finite() || max_points <= 0.0 {
            return Err(GradeError::validation(
                "maxPoints",
                format!("maxPoints must be greater than 0 (got {max_points})"),
            ));
        }
        Ok(())
    }

    pub fn validate_points(points_earned: f64) -> Result<(), GradeError> {
        if !points_earned.is_finite() || points_earned < 0.0 {
            return Err(GradeError::validation(
                "pointsEarned",
                format!("pointsEarned must be a non-negative number (got {points_earned})"),
            ));
        }
        Ok(())
    }

    pub fn all_assignments(&self, category: &str) -> Vec<&LedgerAssignment> {
        let key = category_key(category);
        self.assignments
            .iter()
            .filter(|a| category_key(&a.category) == key)
            .collect()
    }

    pub fn graded_assignments(&self, category: &str) -> Vec<&LedgerAssignment> {
        let key = category_key(category);
        self.assignments
            .iter()
            .filter(|a| a.is_graded() && category_key(&a.category) == key)
            .collect()
    }

    /// Distinct categories in first-seen order as `(key, display name)`.
    pub fn categories(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = Vec::new();
        for a in &self.assignments {
            let key = category_key(&a.category);
            if !out.iter().any(|(k, _)| *k == key) {
                out.push((key, a.category.clone()));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> AssignmentLedger {
        let mut l = AssignmentLedger::new();
        l.add_assignment("a1", "HW 1", "Homework", 10.0).unwrap();
        l.add_assignment("a2", "HW 2", "homework ", 10.0).unwrap();
        l.add_assignment("a3", "Midterm", "Exam", 100.0).unwrap();
        l
    }

    #[test]
    fn zero_max_points_is_rejected() {
        let mut l = AssignmentLedger::new();
        let res = l.add_assignment("a1", "Quiz", "Quiz", 0.0);
        assert!(matches!(
            res,
            Err(GradeError::Validation { field: "maxPoints", .. })
        ));
        assert!(l.add_assignment("a1", "Quiz", "Quiz", -2.0).is_err());
        assert!(l.all_assignments("Quiz").is_empty());
        assert!(l.categories().is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut l = ledger();
        assert!(l.add_assignment("a1", "again", "Homework", 5.0).is_err());
        assert_eq!(l.all_assignments("Homework").len(), 2);
    }

    #[test]
    fn graded_subset_follows_recorded_grades() {
        let mut l = ledger();
        assert_eq!(l.all_assignments("HOMEWORK").len(), 2);
        assert!(l.graded_assignments("Homework").is_empty());

        l.record_grade("a2", 7.0).unwrap();
        let graded = l.graded_assignments("Homework");
        assert_eq!(graded.len(), 1);
        assert_eq!(graded[0].id, "a2");
        assert!(graded[0].is_graded());
        assert_eq!(graded[0].points_earned, Some(7.0));
    }

    #[test]
    fn bonus_points_are_not_clamped() {
        let mut l = ledger();
        l.record_grade("a1", 12.0).unwrap();
        assert_eq!(l.graded_assignments("Homework")[0].points_earned, Some(12.0));
    }

    #[test]
    fn grade_for_unknown_assignment_or_negative_points_fails() {
        let mut l = ledger();
        assert!(l.record_grade("nope", 5.0).is_err());
        assert!(l.record_grade("a1", -1.0).is_err());
        assert!(l.record_grade("a1", f64::INFINITY).is_err());
    }

    #[test]
    fn categories_keep_first_spelling() {
        let l = ledger();
        let cats = l.categories();
        assert_eq!(
            cats,
            vec![
                ("homework".to_string(), "Homework".to_string()),
                ("exam".to_string(), "Exam".to_string()),
            ]
        );
    }
}
