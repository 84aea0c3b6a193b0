//! Grade calculation engine.
//!
//! Everything in here is a pure function of a course's [`WeightTable`] and
//! [`AssignmentLedger`]. Callers rebuild both from storage on every request.

mod aggregate;
mod calculator;
mod error;
mod ledger;
mod letter;
mod target;
mod weights;

pub use aggregate::{category_average, category_totals};
pub use calculator::{GradeCalculator, GradeSummary};
pub use error::GradeError;
pub use ledger::AssignmentLedger;
pub use letter::LetterScale;
pub use target::TargetSolver;
pub use weights::WeightTable;

/// Weight sums closer than this are treated as equal.
pub(crate) const WEIGHT_EPSILON: f64 = 1e-9;

/// Join key between weight entries and assignment categories.
///
/// Matching ignores surrounding whitespace and ASCII case, so "Homework" and
/// " homework" land in the same category.
pub fn category_key(category: &str) -> String {
    category.trim().to_ascii_lowercase()
}
