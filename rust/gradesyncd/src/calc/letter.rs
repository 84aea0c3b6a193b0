use serde::{Deserialize, Serialize};

use super::GradeError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterBand {
    pub min_percent: f64,
    pub letter: String,
}

/// Cut points for letter grades, highest band first.
///
/// A percentage gets the letter of the first band whose minimum it reaches;
/// anything below the last band gets `floor_letter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterScale {
    pub bands: Vec<LetterBand>,
    pub floor_letter: String,
}

const DEFAULT_BANDS: [(f64, &str); 11] = [
    (93.0, "A"),
    (90.0, "A-"),
    (87.0, "B+"),
    (83.0, "B"),
    (80.0, "B-"),
    (77.0, "C+"),
    (73.0, "C"),
    (70.0, "C-"),
    (67.0, "D+"),
    (63.0, "D"),
    (60.0, "D-"),
];

impl Default for LetterScale {
    fn default() -> Self {
        Self {
            bands: DEFAULT_BANDS
                .iter()
                .map(|(min, letter)| LetterBand {
                    min_percent: *min,
                    letter: letter.to_string(),
                })
                .collect(),
            floor_letter: "F".to_string(),
        }
    }
}

impl LetterScale {
    pub fn new(bands: Vec<LetterBand>, floor_letter: &str) -> Result<Self, GradeError> {
        let scale = Self {
            bands,
            floor_letter: floor_letter.trim().to_string(),
        };
        scale.validate()?;
        Ok(scale)
    }

    pub fn validate(&self) -> Result<(), GradeError> {
        if self.bands.is_empty() {
            return Err(GradeError::validation(
                "bands",
                "letter scale needs at least one band",
            ));
        }
        if self.floor_letter.trim().is_empty() {
            return Err(GradeError::validation(
                "floorLetter",
                "floorLetter must not be empty",
            ));
        }
        let mut prev: Option<f64> = None;
        for (i, band) in self.bands.iter().enumerate() {
            if band.letter.trim().is_empty() {
                return Err(GradeError::validation(
                    "bands",
                    format!("band {i} has an empty letter"),
                ));
            }
            if !band.min_percent.is_finite() {
                return Err(GradeError::validation(
                    "bands",
                    format!("band {i} minPercent must be a finite number"),
                ));
            }
            if let Some(p) = prev {
                if band.min_percent >= p {
                    return Err(GradeError::validation(
                        "bands",
                        format!(
                            "bands must be strictly descending (band {i}: {} after {p})",
                            band.min_percent
                        ),
                    ));
                }
            }
            prev = Some(band.min_percent);
        }
        Ok(())
    }

    pub fn letter_for(&self, percent: f64) -> &str {
        self.bands
            .iter()
            .find(|b| percent >= b.min_percent)
            .map(|b| b.letter.as_str())
            .unwrap_or(self.floor_letter.as_str())
    }
}
