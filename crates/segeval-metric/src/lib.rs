//! # Segmentation accuracy metrics
//!
//! Confusion-matrix statistics for binary views of segmentation outputs,
//! implemented on top of the Burn tensor API.
//!
//! A [`ConfusionAccumulator`] is built from one binary view (ground truth,
//! positive-class score, optional hard prediction) and keeps only its four
//! confusion counts. Accumulators merge associatively, so per-image results
//! reduce into dataset-wide results without keeping any pixel data around.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use segeval_metric::ConfusionAccumulator;
//! use burn::prelude::*;
//!
//! # fn example<B: burn::tensor::backend::Backend>(device: &B::Device) {
//! let observation = Tensor::<B, 1, Int>::from_ints([1, 1, 0, 0], device);
//! let score = Tensor::<B, 1>::from_floats([0.9, 0.2, 0.1, 0.7], device);
//!
//! let chip = ConfusionAccumulator::new(observation, score, None)?;
//! let total = ConfusionAccumulator::merge_all([chip, chip]);
//! println!("IoU: {}", total.iou());
//! # }
//! ```

pub mod confusion;
pub mod error;
pub mod metrics;

pub use confusion::{ConfusionAccumulator, DEFAULT_THRESHOLD, EPSILON};
pub use error::{MetricError, MetricResult};
pub use metrics::{ClassMetrics, METRIC_NAMES};
