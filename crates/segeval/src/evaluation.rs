//! Per-class accuracy evaluation over a stream of batches.
//!
//! For every image and every evaluated class the aggregator builds a
//! one-vs-rest binary view (label == class, prediction == class, class
//! probability) and merges its [`ConfusionAccumulator`] into that class's
//! running total. Only the four counts per class are kept between batches.

use std::{collections::BTreeMap, fs, path::Path};

use burn::{
    module::AutodiffModule,
    prelude::*,
    tensor::{activation::softmax, backend::AutodiffBackend},
};
use segeval_metric::ConfusionAccumulator;
use serde::{Deserialize, Serialize};

use crate::{
    config::EvaluationConfig,
    error::{EvalError, EvalResult},
    model::{SegmentationBatch, SegmentationModel},
    report::{AccuracyReport, ReportRow},
};

/// Running per-class totals of an evaluation.
///
/// States from separate shards of the same dataset combine with
/// [`merge`](Self::merge); the result is identical to a single pass over all
/// shards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationState {
    pub class_count: usize,
    pub ignore_class: usize,
    /// Number of images merged into the totals.
    pub images: u64,
    pub classes: BTreeMap<usize, ConfusionAccumulator>,
}

impl EvaluationState {
    /// A state with no image evaluated yet.
    pub const fn new(class_count: usize, ignore_class: usize) -> Self {
        Self {
            class_count,
            ignore_class,
            images: 0,
            classes: BTreeMap::new(),
        }
    }

    /// Combines two shard states.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidConfiguration`] if the states were produced
    /// with different class layouts, [`EvalError::CorruptState`] if either
    /// state fails [`validate`](Self::validate), or
    /// [`EvalError::CountOverflow`] if a combined count does not fit a `u64`.
    pub fn merge(&self, other: &Self) -> EvalResult<Self> {
        self.validate()?;
        other.validate()?;
        self.ensure_compatible(other.class_count, other.ignore_class)?;

        let mut classes = self.classes.clone();
        for (class, accumulator) in &other.classes {
            merge_into(&mut classes, *class, accumulator)?;
        }
        let images = checked_images(self.images, other.images)?;

        Ok(Self {
            class_count: self.class_count,
            ignore_class: self.ignore_class,
            images,
            classes,
        })
    }

    /// Checks that the state could have been produced by an evaluation.
    ///
    /// The class layout must be a valid configuration, only evaluated classes
    /// may carry totals, and every evaluated class has totals as soon as one
    /// image was merged.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::CorruptState`] naming the first inconsistency.
    pub fn validate(&self) -> EvalResult<()> {
        self.inconsistency()
            .map_or(Ok(()), |reason| Err(EvalError::CorruptState { reason }))
    }

    fn inconsistency(&self) -> Option<String> {
        let layout = EvaluationConfig::new(self.class_count).with_ignore_class(self.ignore_class);
        if let Err(err) = layout.validate() {
            return Some(err.to_string());
        }

        if let Some(class) = self
            .classes
            .keys()
            .find(|&&class| class == self.ignore_class || class >= self.class_count)
        {
            return Some(format!(
                "class {class} is not evaluated with {} classes ignoring {}",
                self.class_count, self.ignore_class
            ));
        }

        if self.images == 0 {
            return (!self.classes.is_empty())
                .then(|| "confusion totals without any evaluated image".to_string());
        }

        let missing = layout
            .evaluated_classes()
            .find(|class| !self.classes.contains_key(class))
            .map(|class| format!("class {class} has no totals after {} images", self.images));
        missing
    }

    /// Checks that this state uses the given class layout.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidConfiguration`] on any difference.
    pub fn ensure_compatible(&self, class_count: usize, ignore_class: usize) -> EvalResult<()> {
        if self.class_count != class_count || self.ignore_class != ignore_class {
            return Err(EvalError::InvalidConfiguration {
                reason: format!(
                    "state layout mismatch: {} classes ignoring {} vs {} classes ignoring {}",
                    self.class_count, self.ignore_class, class_count, ignore_class
                ),
            });
        }
        Ok(())
    }

    /// Assembles the report, one row per class in ascending class order.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::EmptyEvaluation`] if no image has been merged.
    pub fn report(&self) -> EvalResult<AccuracyReport> {
        if self.images == 0 {
            return Err(EvalError::EmptyEvaluation);
        }

        let rows = self
            .classes
            .iter()
            .map(|(&class, accumulator)| ReportRow::new(class, *accumulator))
            .collect();
        Ok(AccuracyReport::new(rows))
    }

    /// Writes the state as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> EvalResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| EvalError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads and validates a state previously written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or
    /// [`EvalError::CorruptState`] if its contents are inconsistent.
    pub fn load(path: impl AsRef<Path>) -> EvalResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| EvalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let state: Self = serde_json::from_str(&json)?;
        match state.inconsistency() {
            Some(reason) => Err(EvalError::CorruptState {
                reason: format!("{}: {reason}", path.display()),
            }),
            None => Ok(state),
        }
    }
}

/// Loads the shard states at `paths` and merges them into one.
///
/// With a `config`, the merged state must also use its class layout.
///
/// # Errors
///
/// Returns [`EvalError::EmptyEvaluation`] if `paths` is empty, or any error of
/// [`EvaluationState::load`], [`EvaluationState::merge`] and
/// [`EvaluationState::ensure_compatible`].
pub fn merge_state_files<P: AsRef<Path>>(
    paths: &[P],
    config: Option<&EvaluationConfig>,
) -> EvalResult<EvaluationState> {
    let mut merged: Option<EvaluationState> = None;
    for path in paths {
        let path = path.as_ref();
        let state = EvaluationState::load(path)?;
        tracing::info!(path = %path.display(), images = state.images, "loaded evaluation state");

        merged = Some(match merged {
            Some(total) => total.merge(&state)?,
            None => state,
        });
    }
    let merged = merged.ok_or(EvalError::EmptyEvaluation)?;

    if let Some(config) = config {
        config.validate()?;
        merged.ensure_compatible(config.class_count, config.ignore_class)?;
    }
    Ok(merged)
}

/// Accumulates per-class confusion counts over an evaluation dataset.
#[derive(Debug)]
pub struct EvaluationAggregator {
    config: EvaluationConfig,
    state: EvaluationState,
    batches: usize,
}

impl EvaluationAggregator {
    /// Creates an aggregator with empty totals.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidConfiguration`] if the configuration does
    /// not validate.
    pub fn new(config: EvaluationConfig) -> EvalResult<Self> {
        config.validate()?;
        let state = EvaluationState::new(config.class_count, config.ignore_class);
        Ok(Self {
            config,
            state,
            batches: 0,
        })
    }

    /// Resumes from a saved state.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidConfiguration`] if the configuration does
    /// not validate or does not match the state's class layout, or
    /// [`EvalError::CorruptState`] if the state is inconsistent.
    pub fn from_state(config: EvaluationConfig, state: EvaluationState) -> EvalResult<Self> {
        config.validate()?;
        state.ensure_compatible(config.class_count, config.ignore_class)?;
        state.validate()?;
        Ok(Self {
            config,
            state,
            batches: 0,
        })
    }

    pub const fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Running totals, keyed by class index.
    pub const fn accumulators(&self) -> &BTreeMap<usize, ConfusionAccumulator> {
        &self.state.classes
    }

    pub fn into_state(self) -> EvaluationState {
        self.state
    }

    /// Evaluates one batch and merges it into the running totals.
    ///
    /// The totals are only touched once the whole batch has been evaluated,
    /// so a failing batch leaves them as they were.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidTensorShape`] if the model output or the
    /// labels do not match, or [`EvalError::Metric`] if a binary view fails
    /// validation.
    pub fn update<B, M>(&mut self, model: &M, batch: SegmentationBatch<B>) -> EvalResult<()>
    where
        B: Backend,
        M: SegmentationModel<B>,
    {
        let batch_size = batch.len();
        let SegmentationBatch { images, labels } = batch;
        let [_, height, width] = labels.dims();
        let class_count = self.config.class_count;

        let logits = model.forward(images);
        let dims = logits.dims();
        if dims != [batch_size, class_count, height, width] {
            return Err(EvalError::InvalidTensorShape {
                expected: format!("[{batch_size}, {class_count}, {height}, {width}]"),
                actual: format!("{dims:?}"),
            });
        }

        let probabilities = softmax(logits, 1);
        let prediction = match self.config.score_threshold {
            Some(threshold) => Prediction::Threshold(threshold),
            None => Prediction::Argmax(probabilities.clone().argmax(1).squeeze::<3>(1)),
        };

        let mut batch_totals = BTreeMap::new();
        for i in 0..batch_size {
            let label = labels.clone().slice(s![i..i + 1, .., ..]);

            for class in self.config.evaluated_classes() {
                let class_label = label.clone().equal_elem(class as i64).int();
                let class_score: Tensor<B, 3> = probabilities
                    .clone()
                    .slice(s![i..i + 1, class..class + 1, .., ..])
                    .squeeze::<3>(1);

                let chip = match &prediction {
                    Prediction::Argmax(classes) => {
                        let class_pred = classes
                            .clone()
                            .slice(s![i..i + 1, .., ..])
                            .equal_elem(class as i64)
                            .int();
                        ConfusionAccumulator::new(class_label, class_score, Some(class_pred))?
                    }
                    Prediction::Threshold(threshold) => {
                        ConfusionAccumulator::with_threshold(class_label, class_score, *threshold)?
                    }
                };
                merge_into(&mut batch_totals, class, &chip)?;
            }
        }

        let mut classes = self.state.classes.clone();
        for (class, accumulator) in &batch_totals {
            merge_into(&mut classes, *class, accumulator)?;
        }
        let images = checked_images(self.state.images, batch_size as u64)?;
        self.state.classes = classes;
        self.state.images = images;
        self.batches += 1;

        tracing::debug!(
            batch = self.batches,
            images = batch_size,
            total_images = self.state.images,
            "merged batch"
        );
        Ok(())
    }

    /// Assembles the report from the current totals.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::EmptyEvaluation`] if no image has been evaluated.
    pub fn report(&self) -> EvalResult<AccuracyReport> {
        self.state.report()
    }

    /// Evaluates every batch of `batches` and returns the per-class report.
    ///
    /// The first failing batch aborts the run.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update) and [`report`](Self::report).
    pub fn run<B, M, I>(mut self, model: &M, batches: I) -> EvalResult<AccuracyReport>
    where
        B: Backend,
        M: SegmentationModel<B>,
        I: IntoIterator<Item = SegmentationBatch<B>>,
    {
        tracing::info!(
            classes = self.config.class_count,
            ignore_class = self.config.ignore_class,
            "starting accuracy evaluation"
        );

        for batch in batches {
            if batch.is_empty() {
                tracing::debug!("skipping empty batch");
                continue;
            }
            self.update(model, batch)?;
        }

        let report = self.report()?;
        tracing::info!(
            batches = self.batches,
            images = self.state.images,
            rows = report.rows().len(),
            "accuracy evaluation completed"
        );
        Ok(report)
    }
}

/// Evaluates an autodiff model in inference mode.
///
/// The model's `valid()` counterpart runs on the inner backend, so no gradient
/// is tracked and no parameter can change.
///
/// # Errors
///
/// See [`EvaluationAggregator::run`].
pub fn run_valid<B, M, I>(
    config: EvaluationConfig,
    model: &M,
    batches: I,
) -> EvalResult<AccuracyReport>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    M::InnerModule: SegmentationModel<B::InnerBackend>,
    I: IntoIterator<Item = SegmentationBatch<B::InnerBackend>>,
{
    let model = model.valid();
    EvaluationAggregator::new(config)?.run(&model, batches)
}

enum Prediction<B: Backend> {
    Argmax(Tensor<B, 3, Int>),
    Threshold(f64),
}

fn merge_into(
    totals: &mut BTreeMap<usize, ConfusionAccumulator>,
    class: usize,
    accumulator: &ConfusionAccumulator,
) -> EvalResult<()> {
    let total = totals.entry(class).or_default();
    *total = total
        .checked_merge(accumulator)
        .ok_or(EvalError::CountOverflow { class })?;
    Ok(())
}

fn checked_images(total: u64, added: u64) -> EvalResult<u64> {
    total
        .checked_add(added)
        .ok_or_else(|| EvalError::CorruptState {
            reason: format!("image count {total} + {added} overflows"),
        })
}
