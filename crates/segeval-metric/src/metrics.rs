//! The per-class row of derived accuracy statistics.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Column names of a metrics row, in report order.
pub const METRIC_NAMES: [&str; 8] = [
    "Imbalance Ratio",
    "Overall Accuracy",
    "Precision (UA or PPV)",
    "Recall (PA or TPR or Sensitivity)",
    "False Positive Rate",
    "IoU",
    "F1-score",
    "TSS",
];

/// All derived statistics of one confusion matrix.
///
/// Field names serialize to the report column headers listed in [`METRIC_NAMES`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    #[serde(rename = "Imbalance Ratio")]
    pub imbalance_ratio: f64,
    #[serde(rename = "Overall Accuracy")]
    pub accuracy: f64,
    #[serde(rename = "Precision (UA or PPV)")]
    pub precision: f64,
    #[serde(rename = "Recall (PA or TPR or Sensitivity)")]
    pub recall: f64,
    #[serde(rename = "False Positive Rate")]
    pub false_positive_rate: f64,
    #[serde(rename = "IoU")]
    pub iou: f64,
    #[serde(rename = "F1-score")]
    pub f1: f64,
    #[serde(rename = "TSS")]
    pub tss: f64,
}

impl ClassMetrics {
    /// Values in the same order as [`METRIC_NAMES`].
    pub const fn values(&self) -> [f64; 8] {
        [
            self.imbalance_ratio,
            self.accuracy,
            self.precision,
            self.recall,
            self.false_positive_rate,
            self.iou,
            self.f1,
            self.tss,
        ]
    }
}

impl fmt::Display for ClassMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in METRIC_NAMES.iter().zip(self.values()).enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{name:<36}{value:.5}")?;
        }
        Ok(())
    }
}
