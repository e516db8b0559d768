use std::path::PathBuf;

use segeval_metric::MetricError;
use thiserror::Error;

/// The error type for evaluation runs.
///
/// Any of these aborts the run that raised it; no report is produced from a
/// partially evaluated dataset.
#[derive(Error, Debug)]
pub enum EvalError {
    /// A per-image, per-class confusion matrix could not be built.
    #[error(transparent)]
    Metric(#[from] MetricError),

    /// Error for when a batch tensor has an unexpected shape.
    #[error("Invalid input tensor shape: expected {expected}, got {actual}")]
    InvalidTensorShape {
        /// The expected tensor shape.
        expected: String,
        /// The actual tensor shape.
        actual: String,
    },

    /// Error for when the evaluation configuration is inconsistent.
    #[error("Invalid evaluation configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// The batch stream yielded no image.
    #[error("No image was evaluated")]
    EmptyEvaluation,

    /// A label map contains a class index outside `[0, class_count)`.
    #[error("Label {label} is out of range for {class_count} classes")]
    LabelOutOfRange {
        /// The offending label value.
        label: i64,
        /// The configured number of classes.
        class_count: usize,
    },

    /// An evaluation state does not describe a possible evaluation.
    #[error("Corrupt evaluation state: {reason}")]
    CorruptState {
        /// What is inconsistent about the state.
        reason: String,
    },

    /// Merging would overflow a confusion count.
    #[error("Confusion counts of class {class} overflow")]
    CountOverflow {
        /// The class whose totals overflow.
        class: usize,
    },

    /// Writing the CSV report failed.
    #[error("Failed to write report: {0}")]
    Report(#[from] csv::Error),

    /// Reading or writing an evaluation state file failed.
    #[error("Invalid evaluation state: {0}")]
    State(#[from] serde_json::Error),

    /// Error for file system operations.
    #[error("I/O error on {path}")]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Error for writer operations without an associated path.
    #[error(transparent)]
    Write(#[from] std::io::Error),
}

/// A specialized `Result` type for evaluation operations.
pub type EvalResult<T> = Result<T, EvalError>;
