//! # segeval
//!
//! Per-class accuracy evaluation of semantic segmentation models built with
//! Burn.
//!
//! An [`EvaluationAggregator`] runs every batch of an evaluation dataset
//! through a [`SegmentationModel`], turns each class into a one-vs-rest binary
//! view, and merges the resulting confusion matrices into one running total per
//! class. The final [`AccuracyReport`] holds one row of statistics per class
//! and is written as CSV.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use segeval::{EvaluationAggregator, EvaluationConfig};
//!
//! let config = EvaluationConfig::new(14);
//! let report = EvaluationAggregator::new(config)?.run(&model, batches)?;
//! report.save_csv("accuracy_report.csv")?;
//! ```
//!
//! Shards of a dataset can be evaluated separately: save each aggregator's
//! [`EvaluationState`] and combine them with [`EvaluationState::merge`],
//! [`merge_state_files`] or the `segeval merge` command.

pub mod backend;
pub mod config;
pub mod distribution;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod report;
pub mod seed;

pub use config::EvaluationConfig;
pub use distribution::label_distribution;
pub use error::{EvalError, EvalResult};
pub use evaluation::{merge_state_files, run_valid, EvaluationAggregator, EvaluationState};
pub use model::{SegmentationBatch, SegmentationModel};
pub use report::{AccuracyReport, ReportRow};
pub use seed::{seed_backend, SeedConfig};
#[doc(inline)]
pub use segeval_metric as metric;
