//! Class frequency of a labelled dataset.

use burn::{prelude::*, tensor::cast::ToElement};

use crate::error::{EvalError, EvalResult};

/// Counts the pixels of every class over a stream of label maps.
///
/// Returns one count per class index; the ignore class keeps a count of zero.
///
/// # Errors
///
/// Returns [`EvalError::LabelOutOfRange`] if a label lies outside
/// `[0, class_count)`.
pub fn label_distribution<B, const D: usize, I>(
    labels: I,
    class_count: usize,
    ignore_class: usize,
) -> EvalResult<Vec<u64>>
where
    B: Backend,
    I: IntoIterator<Item = Tensor<B, D, Int>>,
{
    let mut counts = vec![0u64; class_count];

    for batch in labels {
        if batch.shape().num_elements() == 0 {
            continue;
        }

        let min = batch.clone().min().into_scalar().to_i64();
        let max = batch.clone().max().into_scalar().to_i64();
        for label in [min, max] {
            if label < 0 || label >= class_count as i64 {
                return Err(EvalError::LabelOutOfRange { label, class_count });
            }
        }

        for (class, count) in counts.iter_mut().enumerate() {
            if class == ignore_class {
                continue;
            }
            *count += batch
                .clone()
                .equal_elem(class as i64)
                .int()
                .sum()
                .into_scalar()
                .to_u64();
        }
    }

    tracing::debug!(?counts, "computed label distribution");
    Ok(counts)
}
