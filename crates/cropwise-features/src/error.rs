use serde::Serialize;

/// Why a single input field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
    /// The field was absent.
    Missing,
    /// Not a number or a numeric string.
    NotANumber,
    /// NaN or infinite.
    NotFinite,
    /// Below the inclusive minimum.
    BelowMin,
    /// Above the inclusive maximum.
    AboveMax,
}

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Field name as it appears in the request body.
    pub field: String,
    /// Human-readable reason.
    pub message: String,
    /// Machine-readable reason.
    pub kind: FieldErrorKind,
}

impl FieldError {
    pub(crate) fn new(field: &str, kind: FieldErrorKind, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            kind,
        }
    }
}

/// Errors from sample validation and the fitted transforms.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    /// One or more fields failed validation; every failure is listed.
    #[error("{} field(s) failed validation", errors.len())]
    Validation {
        /// Every rejected field, in field order.
        errors: Vec<FieldError>,
    },

    /// The request body was not a JSON object.
    #[error("expected a JSON object of measurements")]
    NotAnObject,

    /// A scaler was fit on zero rows.
    #[error("cannot fit a scaler on zero rows")]
    EmptyMatrix,

    /// A row had the wrong number of columns.
    #[error("expected {expected} columns, got {got}")]
    WidthMismatch {
        /// Columns the transform was fit on.
        expected: usize,
        /// Columns supplied.
        got: usize,
    },

    /// A label encoder was fit on no labels.
    #[error("cannot fit a label encoder on zero labels")]
    EmptyLabels,

    /// A label never seen while fitting.
    #[error("unknown label `{label}`")]
    UnknownLabel {
        /// Label that was looked up.
        label: String,
    },

    /// A class index outside the fitted range.
    #[error("class index {class} out of range for {n_classes} classes")]
    UnknownClass {
        /// Index that was looked up.
        class: usize,
        /// Number of fitted classes.
        n_classes: usize,
    },
}
