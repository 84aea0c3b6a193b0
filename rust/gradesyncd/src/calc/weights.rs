use serde::Serialize;

use super::{category_key, GradeError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightEntry {
    pub category: String,
    pub weight: f64,
    pub description: Option<String>,
}

/// Syllabus weights for one course.
///
/// Entries are kept in insertion order. Two entries that share a category are
/// both kept and summed whenever that category is looked up.
#[derive(Debug, Clone, Default)]
pub struct WeightTable {
    entries: Vec<WeightEntry>,
}

impl WeightTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_weight(
        &mut self,
        category: &str,
        weight: f64,
        description: Option<&str>,
    ) -> Result<(), GradeError> {
        let category = category.trim();
        Self::validate_entry(category, weight)?;

        self.entries.push(WeightEntry {
            category: category.to_string(),
            weight,
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        });
        Ok(())
    }

    /// Checks a weight entry without adding it.
    pub fn validate_entry(category: &str, weight: f64) -> Result<(), GradeError> {
        if category.trim().is_empty() {
            return Err(GradeError::validation(
                "category",
                "category must not be empty",
            ));
        }
        if !weight.is_finite() || weight <= 0.0 {
            return Err(GradeError::validation(
                "weight",
                format!("weight must be greater than 0 (got {weight})"),
            ));
        }
        if weight > 100.0 {
            return Err(GradeError::validation(
                "weight",
                format!("weight must not exceed 100 (got {weight})"),
            ));
        }
        Ok(())
    }

    #[allow(dead_code)]
    pub fn entries(&self) -> &[WeightEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of every weight currently defined. Below 100 means the course is not
    /// fully configured yet; interpreting that is up to the caller.
    pub fn total_weight(&self) -> f64 {
        self.entries.iter().map(|e| e.weight).sum()
    }

    pub fn weight_for(&self, category: &str) -> Option<f64> {
        let key = category_key(category);
        let mut found = false;
        let mut total = 0.0_f64;
        for e in &self.entries {
            if category_key(&e.category) == key {
                found = true;
                total += e.weight;
            }
        }
        found.then_some(total)
    }

    /// Distinct categories in first-seen order as `(key, display name)`.
    /// Use [`WeightTable::weight_for`] for the summed weight.
    pub fn categories(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = Vec::new();
        for e in &self.entries {
            let key = category_key(&e.category);
            if !out.iter().any(|(k, _)| *k == key) {
                out.push((key, e.category.clone()));
            }
        }
        out
    }
}
