use serde_json::json;

/// Engine failures. Both kinds are caller-correctable; neither is fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GradeError {
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{message}")]
    Calculation { code: &'static str, message: String },
}

impl GradeError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        GradeError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn no_syllabus_weights() -> Self {
        GradeError::Calculation {
            code: "no_syllabus_weights",
            message: "No syllabus weights defined. Add weights to calculate your grade.".into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GradeError::Validation { .. } => "validation_failed",
            GradeError::Calculation { code, .. } => code,
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            GradeError::Validation { field, .. } => Some(json!({ "field": field })),
            GradeError::Calculation { .. } => None,
        }
    }
}
