//! I/O error types for cropwise-io.

use std::path::PathBuf;

/// Errors from dataset parsing, artifact persistence and report files.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The CSV parser hit a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// A required header column is absent.
    #[error("missing column \"{column}\" in {path}")]
    MissingColumn {
        /// Path to the CSV file.
        path: PathBuf,
        /// Expected column name.
        column: &'static str,
    },

    /// The file has a header but zero data rows.
    #[error("empty dataset (no data rows) in {path}")]
    EmptyDataset {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// A data row has a different number of columns than the header.
    #[error("inconsistent row length in {path}: row {row_index} has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Columns in the header.
        expected: usize,
        /// Columns in this row.
        got: usize,
    },

    /// A measurement is NaN, infinite or not a float.
    #[error("non-finite value in {path}: row {row_index}, column {column}, raw value \"{raw}\"")]
    NonFiniteValue {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Column name.
        column: &'static str,
        /// The raw cell.
        raw: String,
    },

    /// A row has a blank crop label.
    #[error("empty label in {path}: row {row_index}")]
    EmptyLabel {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
    },

    /// An output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A file exists but cannot be read.
    #[error("cannot read file {path}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// bincode encoding of an artifact failed.
    #[error("failed to serialize {artifact}")]
    SerializeArtifact {
        /// Which artifact.
        artifact: &'static str,
        /// Underlying bincode error.
        source: bincode::Error,
    },

    /// bincode decoding of an artifact failed.
    #[error("failed to deserialize {artifact} from {path}")]
    DeserializeArtifact {
        /// Which artifact.
        artifact: &'static str,
        /// Path read.
        path: PathBuf,
        /// Underlying bincode error.
        source: bincode::Error,
    },

    /// An artifact was written by an incompatible format version.
    #[error("incompatible {artifact} format version in {path}: expected {expected}, found {found}")]
    IncompatibleVersion {
        /// Which artifact.
        artifact: &'static str,
        /// Path read.
        path: PathBuf,
        /// Version this build reads.
        expected: u32,
        /// Version in the file.
        found: u32,
    },

    /// The model and scaler disagree on the feature count.
    #[error("model expects {model} features but scaler was fit on {scaler}")]
    ArtifactMismatch {
        /// Model width.
        model: usize,
        /// Scaler width.
        scaler: usize,
    },

    /// A report file holds invalid JSON.
    #[error("invalid JSON in {path}")]
    Json {
        /// Path to the report.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}
