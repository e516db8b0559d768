//! Binary confusion-matrix accumulator.
//!
//! A [`ConfusionAccumulator`] reduces one binary view (ground truth, positive
//! class score and hard prediction) to its four confusion counts. Accumulators
//! for disjoint pixel populations combine with [`ConfusionAccumulator::merge`],
//! which yields the same counts as building one accumulator over the
//! concatenated arrays.

use core::fmt;

use burn::{
    prelude::*,
    tensor::{backend::Backend, cast::ToElement, Tensor},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{MetricError, MetricResult},
    metrics::ClassMetrics,
};

/// Added to a denominator that would otherwise be exactly zero.
pub const EPSILON: f64 = 1e-5;

/// Score above which a pixel is predicted positive when no prediction is given.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Confusion counts of a binary view.
///
/// Counts are fixed at construction. The only way to combine accumulators is
/// [`merge`](Self::merge), which returns a new value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfusionAccumulator {
    tp: u64,
    fp: u64,
    #[serde(rename = "fn")]
    fn_: u64,
    tn: u64,
}

impl ConfusionAccumulator {
    /// Builds the confusion counts of a binary view.
    ///
    /// All three tensors are flattened. When `prediction` is `None` it is derived
    /// as `score > 0.5`.
    ///
    /// # Errors
    ///
    /// - [`MetricError::ShapeMismatch`] if `score` or `prediction` does not hold
    ///   as many elements as `observation`.
    /// - [`MetricError::InvalidLabel`] if `observation` or `prediction` contains
    ///   a value outside `{0, 1}`.
    pub fn new<B: Backend, const D: usize>(
        observation: Tensor<B, D, Int>,
        score: Tensor<B, D>,
        prediction: Option<Tensor<B, D, Int>>,
    ) -> MetricResult<Self> {
        match prediction {
            Some(prediction) => Self::build(observation, score, Hard::Given(prediction)),
            None => Self::build(observation, score, Hard::Threshold(DEFAULT_THRESHOLD)),
        }
    }

    /// Builds the confusion counts, predicting positive where `score > threshold`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_threshold<B: Backend, const D: usize>(
        observation: Tensor<B, D, Int>,
        score: Tensor<B, D>,
        threshold: f64,
    ) -> MetricResult<Self> {
        Self::build(observation, score, Hard::Threshold(threshold))
    }

    /// Wraps already known counts.
    pub const fn from_counts(tp: u64, fp: u64, fn_: u64, tn: u64) -> Self {
        Self { tp, fp, fn_, tn }
    }

    /// The merge identity: an accumulator over zero pixels.
    pub const fn empty() -> Self {
        Self::from_counts(0, 0, 0, 0)
    }

    fn build<B: Backend, const D: usize>(
        observation: Tensor<B, D, Int>,
        score: Tensor<B, D>,
        prediction: Hard<B, D>,
    ) -> MetricResult<Self> {
        let len = observation.shape().num_elements();
        let score_len = score.shape().num_elements();
        if score_len != len {
            return Err(MetricError::ShapeMismatch {
                observation: len,
                other_name: "score",
                other: score_len,
            });
        }

        if let Hard::Given(prediction) = &prediction {
            let prediction_len = prediction.shape().num_elements();
            if prediction_len != len {
                return Err(MetricError::ShapeMismatch {
                    observation: len,
                    other_name: "prediction",
                    other: prediction_len,
                });
            }
        }

        if len == 0 {
            return Ok(Self::empty());
        }

        let prediction = match prediction {
            Hard::Given(prediction) => prediction,
            Hard::Threshold(threshold) => score.greater_elem(threshold).int(),
        };

        let observation: Tensor<B, 1, Int> = observation.reshape([len]);
        let prediction: Tensor<B, 1, Int> = prediction.reshape([len]);
        ensure_binary(&observation, "observation")?;
        ensure_binary(&prediction, "prediction")?;

        // {0,1} - 2*{0,1} lands on four distinct values, one per cell.
        let diff = observation - prediction.mul_scalar(2);
        let count = |value: i32| -> u64 {
            diff.clone()
                .equal_elem(value)
                .int()
                .sum()
                .into_scalar()
                .to_u64()
        };

        Ok(Self {
            tp: count(-1),
            fp: count(-2),
            fn_: count(1),
            tn: count(0),
        })
    }

    /// Combines two accumulators over disjoint pixel populations.
    ///
    /// The result equals an accumulator built from the concatenation of both
    /// operands' arrays. Associative and commutative, with [`empty`](Self::empty)
    /// as identity.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if a count overflows `u64`. Use
    /// [`checked_merge`](Self::checked_merge) for counts read from outside.
    #[must_use]
    pub const fn merge(&self, other: &Self) -> Self {
        Self {
            tp: self.tp + other.tp,
            fp: self.fp + other.fp,
            fn_: self.fn_ + other.fn_,
            tn: self.tn + other.tn,
        }
    }

    /// Like [`merge`](Self::merge), but returns `None` if any count overflows.
    #[must_use]
    pub fn checked_merge(&self, other: &Self) -> Option<Self> {
        Some(Self {
            tp: self.tp.checked_add(other.tp)?,
            fp: self.fp.checked_add(other.fp)?,
            fn_: self.fn_.checked_add(other.fn_)?,
            tn: self.tn.checked_add(other.tn)?,
        })
    }

    /// Folds any number of accumulators into one, starting from the identity.
    pub fn merge_all<I>(accumulators: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        accumulators
            .into_iter()
            .fold(Self::empty(), |total, next| total.merge(&next))
    }

    pub const fn true_positives(&self) -> u64 {
        self.tp
    }

    pub const fn false_positives(&self) -> u64 {
        self.fp
    }

    pub const fn false_negatives(&self) -> u64 {
        self.fn_
    }

    pub const fn true_negatives(&self) -> u64 {
        self.tn
    }

    /// Number of pixels described by this accumulator.
    pub const fn total(&self) -> u64 {
        self.tp + self.fp + self.fn_ + self.tn
    }

    /// The 2×2 matrix, rows indexed by observation and columns by prediction.
    pub const fn matrix(&self) -> [[u64; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }

    /// Proportion between positive and negative observations, in `[0, ∞)`.
    pub fn imbalance_ratio(&self) -> f64 {
        let (tp, fp, fn_, tn) = self.counts();
        guarded_ratio(tp + fn_, fp + tn)
    }

    /// Overall accuracy.
    pub fn accuracy(&self) -> f64 {
        let (tp, fp, fn_, tn) = self.counts();
        guarded_ratio(tp + tn, tp + tn + fp + fn_)
    }

    /// User's accuracy (positive predictive value).
    pub fn precision(&self) -> f64 {
        let (tp, fp, _, _) = self.counts();
        guarded_ratio(tp, tp + fp)
    }

    /// Producer's accuracy (true positive rate, sensitivity).
    pub fn recall(&self) -> f64 {
        let (tp, _, fn_, _) = self.counts();
        guarded_ratio(tp, tp + fn_)
    }

    /// False alarm rate.
    pub fn false_positive_rate(&self) -> f64 {
        let (_, fp, _, tn) = self.counts();
        guarded_ratio(fp, tn + fp)
    }

    /// Intersection over union of the positive class.
    pub fn iou(&self) -> f64 {
        let (tp, fp, fn_, _) = self.counts();
        guarded_ratio(tp, tp + fp + fn_)
    }

    /// F1 score.
    ///
    /// Precision and recall are recomputed here from the counts. If any of the
    /// three denominators involved is zero, every one of them takes the epsilon.
    pub fn f1(&self) -> f64 {
        let (tp, fp, fn_, _) = self.counts();
        let precision_den = tp + fp;
        let recall_den = tp + fn_;

        if precision_den != 0.0 && recall_den != 0.0 {
            let precision = tp / precision_den;
            let recall = tp / recall_den;
            if precision + recall != 0.0 {
                return 2.0 * precision * recall / (precision + recall);
            }
        }

        let precision = tp / (precision_den + EPSILON);
        let recall = tp / (recall_den + EPSILON);
        2.0 * precision * recall / (precision + recall + EPSILON)
    }

    /// True skill statistic, `recall + specificity - 1`.
    ///
    /// Unlike the other statistics this one has no epsilon guard: a class with
    /// no positive or no negative observations yields NaN or an infinity.
    pub fn tss(&self) -> f64 {
        let (tp, fp, fn_, tn) = self.counts();
        tp / (tp + fn_) + tn / (tn + fp) - 1.0
    }

    /// Every derived statistic at once.
    pub fn metrics(&self) -> ClassMetrics {
        ClassMetrics {
            imbalance_ratio: self.imbalance_ratio(),
            accuracy: self.accuracy(),
            precision: self.precision(),
            recall: self.recall(),
            false_positive_rate: self.false_positive_rate(),
            iou: self.iou(),
            f1: self.f1(),
            tss: self.tss(),
        }
    }

    fn counts(&self) -> (f64, f64, f64, f64) {
        (
            self.tp as f64,
            self.fp as f64,
            self.fn_ as f64,
            self.tn as f64,
        )
    }
}

impl fmt::Display for ConfusionAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [[tn, fp], [fn_, tp]] = self.matrix();
        writeln!(f, "{:<18}{:>16}{:>16}", "", "prediction = 0", "prediction = 1")?;
        writeln!(f, "{:<18}{tn:>16}{fp:>16}", "observation = 0")?;
        write!(f, "{:<18}{fn_:>16}{tp:>16}", "observation = 1")
    }
}

/// Where the hard prediction comes from.
enum Hard<B: Backend, const D: usize> {
    Given(Tensor<B, D, Int>),
    Threshold(f64),
}

fn ensure_binary<B: Backend>(values: &Tensor<B, 1, Int>, array: &'static str) -> MetricResult<()> {
    let max = values.clone().max().into_scalar().to_i64();
    if max > 1 {
        return Err(MetricError::InvalidLabel { array, value: max });
    }
    let min = values.clone().min().into_scalar().to_i64();
    if min < 0 {
        return Err(MetricError::InvalidLabel { array, value: min });
    }
    Ok(())
}

fn guarded_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        numerator / (denominator + EPSILON)
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use burn::backend::NdArray;
    use rstest::*;

    use super::*;

    type TestBackend = NdArray;

    fn ints(values: &[i64]) -> Tensor<TestBackend, 1, Int> {
        Tensor::from_ints(values, &Default::default())
    }

    fn floats(values: &[f32]) -> Tensor<TestBackend, 1> {
        Tensor::from_floats(values, &Default::default())
    }

    fn build(observation: &[i64], prediction: &[i64]) -> ConfusionAccumulator {
        let score = vec![0.0_f32; observation.len()];
        ConfusionAccumulator::new(ints(observation), floats(&score), Some(ints(prediction)))
            .unwrap()
    }

    #[test]
    fn mixed_scenario_counts_and_metrics() {
        let acc = build(&[1, 1, 0, 0], &[1, 0, 0, 1]);

        assert_eq!(acc, ConfusionAccumulator::from_counts(1, 1, 1, 1));
        assert_relative_eq!(acc.accuracy(), 0.5);
        assert_relative_eq!(acc.precision(), 0.5);
        assert_relative_eq!(acc.recall(), 0.5);
        assert_relative_eq!(acc.false_positive_rate(), 0.5);
        assert_relative_eq!(acc.imbalance_ratio(), 1.0);
        assert_relative_eq!(acc.iou(), 1.0 / 3.0);
        assert_relative_eq!(acc.f1(), 0.5);
        assert_relative_eq!(acc.tss(), 0.0);
    }

    #[test]
    fn all_true_negative_uses_epsilon_fallback() {
        let acc = build(&[0; 6], &[0; 6]);

        assert_eq!(acc.true_positives(), 0);
        assert_eq!(acc.false_positives(), 0);
        assert_eq!(acc.false_negatives(), 0);
        assert_eq!(acc.true_negatives(), 6);
        assert_relative_eq!(acc.accuracy(), 1.0);
        assert_relative_eq!(acc.precision(), 0.0);
        assert_relative_eq!(acc.recall(), 0.0);
        assert_relative_eq!(acc.f1(), 0.0);
        assert!(acc.precision().is_finite());
        assert!(acc.tss().is_nan());
    }

    #[test]
    fn all_positive_imbalance_ratio_divides_by_epsilon() {
        let acc = build(&[1, 1], &[1, 1]);

        assert_relative_eq!(acc.imbalance_ratio(), 2.0 / EPSILON);
        assert_relative_eq!(acc.false_positive_rate(), 0.0);
        assert!(acc.tss().is_nan());
    }

    #[test]
    fn f1_falls_back_when_precision_and_recall_are_zero() {
        let acc = ConfusionAccumulator::from_counts(0, 3, 2, 5);

        assert_relative_eq!(acc.precision(), 0.0);
        assert_relative_eq!(acc.recall(), 0.0);
        assert_relative_eq!(acc.f1(), 0.0);
    }

    #[test]
    fn prediction_defaults_to_score_threshold() {
        let observation = ints(&[1, 1, 0, 0]);
        let score = floats(&[0.9, 0.5, 0.2, 0.7]);

        let acc = ConfusionAccumulator::new(observation, score, None).unwrap();

        // 0.5 is not strictly above the threshold.
        assert_eq!(acc, ConfusionAccumulator::from_counts(1, 1, 1, 1));
    }

    #[test]
    fn custom_threshold_hardens_predictions() {
        let observation = ints(&[1, 1, 0, 0]);
        let score = floats(&[0.9, 0.6, 0.2, 0.7]);

        let acc = ConfusionAccumulator::with_threshold(observation, score, 0.8).unwrap();

        assert_eq!(acc, ConfusionAccumulator::from_counts(1, 0, 1, 2));
    }

    #[test]
    fn accepts_multidimensional_views() {
        let device = Default::default();
        let observation = Tensor::<TestBackend, 2, Int>::from_ints([[1, 0], [1, 0]], &device);
        let score = Tensor::<TestBackend, 2>::from_floats([[0.8, 0.1], [0.3, 0.9]], &device);

        let acc = ConfusionAccumulator::new(observation, score, None).unwrap();

        assert_eq!(acc, ConfusionAccumulator::from_counts(1, 1, 1, 1));
        assert_eq!(acc.total(), 4);
    }

    #[rstest]
    #[case(&[0, 1, 2, 0], &[0, 1, 0, 0], "observation", 2)]
    #[case(&[0, 1, 1, 0], &[0, 3, 0, 0], "prediction", 3)]
    #[case(&[0, -1, 1, 0], &[0, 1, 0, 0], "observation", -1)]
    fn rejects_non_binary_values(
        #[case] observation: &[i64],
        #[case] prediction: &[i64],
        #[case] array: &str,
        #[case] value: i64,
    ) {
        let score = vec![0.0_f32; observation.len()];
        let result =
            ConfusionAccumulator::new(ints(observation), floats(&score), Some(ints(prediction)));

        match result {
            Err(MetricError::InvalidLabel { array: a, value: v }) => {
                assert_eq!(a, array);
                assert_eq!(v, value);
            }
            other => panic!("Expected InvalidLabel error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_score_length_mismatch() {
        let result = ConfusionAccumulator::new(
            ints(&[0, 1, 0, 1, 1]),
            floats(&[0.1, 0.2, 0.3, 0.4]),
            None,
        );

        assert_eq!(
            result,
            Err(MetricError::ShapeMismatch {
                observation: 5,
                other_name: "score",
                other: 4,
            })
        );
    }

    #[test]
    fn rejects_prediction_length_mismatch() {
        let result = ConfusionAccumulator::new(
            ints(&[0, 1, 0]),
            floats(&[0.1, 0.2, 0.3]),
            Some(ints(&[0, 1])),
        );

        assert!(matches!(
            result,
            Err(MetricError::ShapeMismatch {
                other_name: "prediction",
                ..
            })
        ));
    }

    #[test]
    fn empty_input_is_the_identity() {
        let acc = ConfusionAccumulator::new(ints(&[]), floats(&[]), None).unwrap();

        assert_eq!(acc, ConfusionAccumulator::empty());
        assert_eq!(acc.total(), 0);
    }

    #[rstest]
    #[case(&[1, 0, 1, 1, 0, 0, 1], &[0, 0, 1, 1, 1, 0, 0])]
    #[case(&[0, 0, 0], &[1, 1, 1])]
    #[case(&[1], &[1])]
    #[case(&[1, 0, 0, 1, 0, 1, 0, 1, 1, 0], &[1, 1, 0, 0, 0, 1, 1, 1, 0, 0])]
    fn counts_cover_every_pixel(#[case] observation: &[i64], #[case] prediction: &[i64]) {
        let acc = build(observation, prediction);

        assert_eq!(acc.total(), observation.len() as u64);
    }

    #[test]
    fn merge_with_identity_is_unchanged() {
        let acc = build(&[1, 0, 1, 0, 1], &[1, 1, 0, 0, 1]);

        assert_eq!(acc.merge(&ConfusionAccumulator::empty()), acc);
        assert_eq!(ConfusionAccumulator::empty().merge(&acc), acc);
        assert_eq!(ConfusionAccumulator::merge_all([acc]), acc);
    }

    #[test]
    fn merge_is_associative_and_commutative() {
        let a = build(&[1, 0, 1], &[1, 1, 0]);
        let b = build(&[0, 0, 1, 1], &[0, 1, 1, 1]);
        let c = build(&[1, 1], &[0, 0]);

        assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
        assert_eq!(a.merge(&b), b.merge(&a));
        assert_eq!(ConfusionAccumulator::merge_all([c, a, b]), a.merge(&b).merge(&c));
    }

    #[test]
    fn merge_matches_construction_from_concatenated_arrays() {
        let (obs_a, pred_a) = (ints(&[1, 0, 1, 0]), ints(&[1, 1, 0, 0]));
        let (obs_b, pred_b) = (ints(&[1, 1, 0]), ints(&[1, 0, 1]));
        let (score_a, score_b) = (floats(&[0.0; 4]), floats(&[0.0; 3]));

        let merged = ConfusionAccumulator::new(obs_a.clone(), score_a.clone(), Some(pred_a.clone()))
            .unwrap()
            .merge(
                &ConfusionAccumulator::new(obs_b.clone(), score_b.clone(), Some(pred_b.clone()))
                    .unwrap(),
            );
        let concatenated = ConfusionAccumulator::new(
            Tensor::cat(vec![obs_a, obs_b], 0),
            Tensor::cat(vec![score_a, score_b], 0),
            Some(Tensor::cat(vec![pred_a, pred_b], 0)),
        )
        .unwrap();

        assert_eq!(merged, concatenated);
    }

    #[test]
    fn merged_metrics_equal_metrics_of_combined_counts() {
        let once = build(&[1, 1, 0, 0], &[1, 0, 0, 1]);
        let doubled = once.merge(&once);

        assert_eq!(doubled, ConfusionAccumulator::from_counts(2, 2, 2, 2));
        assert_eq!(doubled.metrics(), ConfusionAccumulator::from_counts(2, 2, 2, 2).metrics());
        assert_relative_eq!(doubled.accuracy(), 0.5);
    }

    #[test]
    fn checked_merge_detects_overflow() {
        let small = ConfusionAccumulator::from_counts(1, 2, 3, 4);
        let saturated = ConfusionAccumulator::from_counts(u64::MAX, 0, 0, 0);

        assert_eq!(small.checked_merge(&small), Some(small.merge(&small)));
        assert_eq!(saturated.checked_merge(&ConfusionAccumulator::empty()), Some(saturated));
        assert_eq!(saturated.checked_merge(&saturated), None);
        assert_eq!(saturated.checked_merge(&small), None);
    }

    #[test]
    fn matrix_layout_and_display() {
        let acc = ConfusionAccumulator::from_counts(4, 3, 2, 1);

        assert_eq!(acc.matrix(), [[1, 3], [2, 4]]);
        let rendered = acc.to_string();
        assert_eq!(rendered.lines().count(), 3);
        assert!(rendered.contains("observation = 1"));
    }

    #[test]
    fn serde_uses_short_count_names() {
        let acc = ConfusionAccumulator::from_counts(1, 2, 3, 4);

        let json = serde_json::to_string(&acc).unwrap();
        assert_eq!(json, r#"{"tp":1,"fp":2,"fn":3,"tn":4}"#);
        assert_eq!(serde_json::from_str::<ConfusionAccumulator>(&json).unwrap(), acc);
    }
}
