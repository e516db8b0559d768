use thiserror::Error;

/// The error type for confusion-matrix construction.
///
/// Both variants are validation failures of the raw arrays handed to
/// [`ConfusionAccumulator`](crate::ConfusionAccumulator). They are never
/// recovered from inside this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricError {
    /// Observation and score (or prediction) hold a different number of elements.
    #[error("Inconsistent input shapes: observation has {observation} elements, {other_name} has {other}")]
    ShapeMismatch {
        /// Element count of the observation array.
        observation: usize,
        /// Which array disagreed with the observation.
        other_name: &'static str,
        /// Element count of the disagreeing array.
        other: usize,
    },

    /// A label or prediction value outside `{0, 1}`.
    #[error("Invalid array: {array} must be binary, found value {value}")]
    InvalidLabel {
        /// Which array held the offending value.
        array: &'static str,
        /// The offending value (the maximum or minimum found).
        value: i64,
    },
}

/// A specialized `Result` type for metric construction.
pub type MetricResult<T> = Result<T, MetricError>;
