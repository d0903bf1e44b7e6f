use super::*;
use crate::augment::SampleTransform;
use ndarray::{s, Array4};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// One batch of transformed NCHW inputs with their class labels.
#[derive(Clone, Debug)]
pub struct Batch {
    pub images: Array4<f32>,
    pub labels: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Walks an `ImageSet` in order, `batch_size` samples at a time, applying the per-sample
/// transform. The last batch holds whatever samples remain.
pub struct DataLoader {
    set: ImageSet,
    transform: SampleTransform,
    batch_size: usize,
    cursor: usize,
    rng: StdRng,
}

impl DataLoader {
    pub fn new(set: ImageSet, transform: SampleTransform, batch_size: usize) -> Result<DataLoader> {
        if batch_size == 0 {
            return Err(BenchError::InvalidConfig("batch size must be positive".to_owned()));
        }
        Ok(DataLoader {
            set,
            transform,
            batch_size,
            cursor: 0,
            rng: StdRng::from_entropy(),
        })
    }

    /// Replaces the source of randomness of the per-sample transform.
    pub fn with_seed(mut self, seed: u64) -> DataLoader {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_batches(&self) -> usize {
        (self.set.len() + self.batch_size - 1) / self.batch_size
    }
}

impl Iterator for DataLoader {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.cursor >= self.set.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.set.len());
        let geometry = *self.set.geometry();
        let (channels, side) = (geometry.channels(), geometry.side());

        let mut images = Array4::zeros((end - self.cursor, channels, side, side));
        let mut labels = Vec::with_capacity(end - self.cursor);
        for (slot, idx) in (self.cursor..end).enumerate() {
            let (pixels, label) = self.set.sample(idx);
            let sample = self.transform.apply(pixels, &geometry, &mut self.rng);
            images.slice_mut(s![slot, .., .., ..]).assign(&sample);
            labels.push(label);
        }
        self.cursor = end;
        Some(Batch { images, labels })
    }
}
