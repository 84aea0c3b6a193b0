use serde::Serialize;
use tracing::warn;

use super::{
    category_average, category_totals, AssignmentLedger, GradeError, LetterScale, WeightTable,
    WEIGHT_EPSILON,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub category: String,
    /// 0 when the category only exists on assignments.
    pub weight: f64,
    pub weight_defined: bool,
    pub assignment_count: usize,
    pub graded_count: usize,
    pub points_earned: f64,
    pub max_points: f64,
    pub average: Option<f64>,
    pub weighted_contribution: Option<f64>,
}

impl CategoryBreakdown {
    pub fn counts_toward_completion(&self) -> bool {
        self.weight_defined && self.weight > 0.0 && self.graded_count > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSummary {
    /// Grade earned so far, over the graded share of the weight only.
    pub final_grade: f64,
    pub projected_final_grade: Option<f64>,
    pub letter_grade: String,
    pub completion_percentage: f64,
    pub total_weight: f64,
    pub graded_weight: f64,
    pub remaining_weight: f64,
    pub weights_complete: bool,
    pub unweighted_categories: Vec<String>,
    pub breakdown: Vec<CategoryBreakdown>,
}

pub struct GradeCalculator<'a> {
    weights: &'a WeightTable,
    ledger: &'a AssignmentLedger,
    scale: &'a LetterScale,
}

impl<'a> GradeCalculator<'a> {
    pub fn new(
        weights: &'a WeightTable,
        ledger: &'a AssignmentLedger,
        scale: &'a LetterScale,
    ) -> Self {
        Self {
            weights,
            ledger,
            scale,
        }
    }

    pub fn calculate(&self) -> Result<GradeSummary, GradeError> {
        if self.weights.is_empty() {
            return Err(GradeError::no_syllabus_weights());
        }

        let mut breakdown: Vec<CategoryBreakdown> = self
            .weights
            .categories()
            .iter()
            .map(|(_, name)| {
                let weight = self.weights.weight_for(name).unwrap_or(0.0);
                self.breakdown_row(name, weight, true)
            })
            .collect();

        let mut unweighted_categories: Vec<String> = Vec::new();
        for (_, name) in self.ledger.categories() {
            if self.weights.weight_for(&name).is_some() {
                continue;
            }
            warn!(
                category = %name,
                "category has assignments but no syllabus weight; excluded from weighted grade"
            );
            unweighted_categories.push(name.clone());
            breakdown.push(self.breakdown_row(&name, 0.0, false));
        }

        let total_weight = self.weights.total_weight();
        let graded_weight: f64 = breakdown
            .iter()
            .filter(|r| r.counts_toward_completion())
            .map(|r| r.weight)
            .sum();
        // Sums taken in different orders can differ in the last bit.
        let remaining_weight = if total_weight - graded_weight <= WEIGHT_EPSILON {
            0.0
        } else {
            total_weight - graded_weight
        };

        let final_grade: f64 = breakdown
            .iter()
            .filter_map(|r| r.weighted_contribution)
            .sum();

        let completion_percentage = if total_weight <= WEIGHT_EPSILON {
            0.0
        } else if remaining_weight == 0.0 {
            100.0
        } else {
            graded_weight / total_weight * 100.0
        };

        let projected_final_grade = if completion_percentage > 0.0 {
            Some(final_grade / (completion_percentage / 100.0))
        } else {
            None
        };

        let letter_grade = self
            .scale
            .letter_for(projected_final_grade.unwrap_or(final_grade))
            .to_string();

        Ok(GradeSummary {
            final_grade,
            projected_final_grade,
            letter_grade,
            completion_percentage,
            total_weight,
            graded_weight,
            remaining_weight,
            weights_complete: total_weight >= 100.0 - WEIGHT_EPSILON,
            unweighted_categories,
            breakdown,
        })
    }

    fn breakdown_row(&self, category: &str, weight: f64, weight_defined: bool) -> CategoryBreakdown {
        let totals = category_totals(self.ledger, category);
        let average = category_average(self.ledger, category);
        let weighted_contribution = if weight_defined {
            average.map(|avg| weight * avg / 100.0)
        } else {
            None
        };
        CategoryBreakdown {
            category: category.to_string(),
            weight,
            weight_defined,
            assignment_count: totals.assignment_count(),
            graded_count: totals.graded_count,
            points_earned: totals.points_earned,
            max_points: totals.max_points,
            average,
            weighted_contribution,
        }
    }
}
