use super::AssignmentLedger;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CategoryTotals {
    pub points_earned: f64,
    pub max_points: f64,
    pub graded_count: usize,
    pub ungraded_count: usize,
}

impl CategoryTotals {
    pub fn assignment_count(&self) -> usize {
        self.graded_count + self.ungraded_count
    }

    /// Points-weighted average over graded work, `None` when nothing is graded.
    ///
    /// `sum(earned) / sum(max) * 100`, so a 2-point quiz counts for 2 points
    /// next to a 100-point exam rather than for half the category.
    pub fn average(&self) -> Option<f64> {
        if self.graded_count == 0 || self.max_points <= 0.0 {
            return None;
        }
        Some(self.points_earned / self.max_points * 100.0)
    }
}

pub fn category_totals(ledger: &AssignmentLedger, category: &str) -> CategoryTotals {
    let assignment_count = ledger.all_assignments(category).len();
    let graded = ledger.graded_assignments(category);
    let mut totals = CategoryTotals {
        graded_count: graded.len(),
        ungraded_count: assignment_count - graded.len(),
        ..CategoryTotals::default()
    };
    for a in graded {
        totals.points_earned += a.points_earned.unwrap_or(0.0);
        totals.max_points += a.max_points;
    }
    totals
}

/// An empty category yields `None`, never 0%.
pub fn category_average(ledger: &AssignmentLedger, category: &str) -> Option<f64> {
    category_totals(ledger, category).average()
}
