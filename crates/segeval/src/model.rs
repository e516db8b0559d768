//! The two collaborators an evaluation run consumes: a segmentation model and
//! a stream of labelled image batches.

use burn::prelude::*;

/// A model producing per-class logits for a batch of images.
///
/// Implementations must not update parameters. On an autodiff backend, pass
/// the `valid()` module to the evaluator, see
/// [`run_valid`](crate::evaluation::run_valid).
pub trait SegmentationModel<B: Backend> {
    /// Maps images `[batch, channels, height, width]` to raw (pre-softmax)
    /// logits `[batch, classes, height, width]`.
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;
}

impl<B, F> SegmentationModel<B> for F
where
    B: Backend,
    F: Fn(Tensor<B, 4>) -> Tensor<B, 4>,
{
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        self(images)
    }
}

/// One batch of evaluation data.
#[derive(Debug, Clone)]
pub struct SegmentationBatch<B: Backend> {
    /// Input images with shape `[batch, channels, height, width]`.
    pub images: Tensor<B, 4>,
    /// Class index per pixel with shape `[batch, height, width]`.
    pub labels: Tensor<B, 3, Int>,
}

impl<B: Backend> SegmentationBatch<B> {
    pub const fn new(images: Tensor<B, 4>, labels: Tensor<B, 3, Int>) -> Self {
        Self { images, labels }
    }

    /// Number of images in the batch.
    pub fn len(&self) -> usize {
        self.labels.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    type TestBackend = NdArray;

    #[test]
    fn batch_length_counts_images() {
        let device = Default::default();
        let batch = SegmentationBatch::<TestBackend>::new(
            Tensor::zeros([3, 2, 4, 4], &device),
            Tensor::zeros([3, 4, 4], &device),
        );

        assert_eq!(batch.len(), 3);
        assert!(!batch.is_empty());
    }
}
