//! The two augmentation backends being compared and the random-affine + normalize pipeline they
//! both implement. The torchvision-style backend transforms every sample on the host while the
//! data is loaded; the kornia-style backend only converts samples to floats and augments whole
//! batches on the training device.

mod affine;

pub use self::affine::*;
use crate::device::Compute;
use crate::error::{BenchError, Result};
use crate::geometry::{ImageGeometry, Square};
use ndarray::{Array3, Array4};
use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// Random affine ranges used by both backends: rotation ±45°, vertical translation up to half
/// the image, scale 0.5–1.5 and horizontal shear 0–0.5°.
pub const RANDOM_AFFINE: RandomAffine = RandomAffine {
    degrees: (-45., 45.),
    translate: (0., 0.5),
    scale: (0.5, 1.5),
    shear: (0., 0.5),
};

/// Selects the data-augmentation implementation of a benchmark run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AugmentationBackend {
    /// Batched augmentation on the training device.
    Kornia,
    /// Per-sample augmentation while loading.
    Torchvision,
}

impl AugmentationBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            AugmentationBackend::Kornia => "kornia",
            AugmentationBackend::Torchvision => "torchvision",
        }
    }

    /// The per-sample transform applied by the data loader.
    pub fn transform(self, normalize: Normalize) -> SampleTransform {
        match self {
            AugmentationBackend::Kornia => SampleTransform::ToTensor,
            AugmentationBackend::Torchvision => SampleTransform::AffineNormalize {
                affine: RANDOM_AFFINE,
                normalize,
            },
        }
    }

    /// The batch augmentation applied inside the training step, if any.
    pub fn augmentation(self, normalize: Normalize) -> Option<BatchAugmentation> {
        match self {
            AugmentationBackend::Kornia => Some(BatchAugmentation {
                affine: RANDOM_AFFINE,
                normalize,
            }),
            AugmentationBackend::Torchvision => None,
        }
    }
}

impl fmt::Display for AugmentationBackend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AugmentationBackend {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<AugmentationBackend> {
        match s {
            "kornia" => Ok(AugmentationBackend::Kornia),
            "torchvision" => Ok(AugmentationBackend::Torchvision),
            _ => Err(BenchError::UnsupportedBackend(s.to_owned())),
        }
    }
}

/// Per-channel normalization with a single mean and standard deviation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Normalize {
    pub mean: f32,
    pub std: f32,
}

impl Normalize {
    pub fn apply(&self, value: f32) -> f32 {
        (value - self.mean) / self.std
    }
}

/// What the data loader does to every raw `u8` sample.
#[derive(Clone, Debug, PartialEq)]
pub enum SampleTransform {
    /// Scale into `[0, 1]` floats.
    ToTensor,
    /// Random affine with nearest interpolation, then scale and normalize.
    AffineNormalize {
        affine: RandomAffine,
        normalize: Normalize,
    },
}

impl SampleTransform {
    /// Turns a CHW `u8` sample of `geometry` into a CHW float tensor.
    pub fn apply<R: Rng>(&self, pixels: &[u8], geometry: &ImageGeometry, rng: &mut R) -> Array3<f32> {
        let (channels, side) = (geometry.channels(), geometry.side());
        let scaled = pixels.iter().map(|&p| f32::from(p) / 255.).collect::<Vec<f32>>();
        match self {
            SampleTransform::ToTensor => Array3::from_shape_fn((channels, side, side), |(c, y, x)| {
                scaled[(c * side + y) * side + x]
            }),
            SampleTransform::AffineNormalize { affine, normalize } => {
                let transform = affine.sample(rng, side, side);
                let plane_len = side * side;
                let mut warped = vec![0f32; scaled.len()];
                for (src, dst) in scaled
                    .chunks(plane_len)
                    .zip(warped.chunks_mut(plane_len))
                {
                    warp_plane(src, dst, side, side, &transform, Interpolation::Nearest);
                }
                Array3::from_shape_fn((channels, side, side), |(c, y, x)| {
                    normalize.apply(warped[(c * side + y) * side + x])
                })
            }
        }
    }
}

/// Augmentation applied to whole batches on the training device, outside of autograd.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchAugmentation {
    pub affine: RandomAffine,
    pub normalize: Normalize,
}

impl BatchAugmentation {
    pub fn apply<R: Rng>(
        &self,
        batch: &Array4<f32>,
        compute: &dyn Compute,
        rng: &mut R,
    ) -> Result<Array4<f32>> {
        let (num, _, height, width) = batch.dim();
        // Every sample in the batch draws its own parameters
        let transforms = (0..num)
            .map(|_| self.affine.sample(rng, width, height))
            .collect::<Vec<AffineTransform>>();
        let mut out = compute.warp_affine(batch.view(), &transforms, Interpolation::Bilinear)?;
        let normalize = self.normalize;
        out.mapv_inplace(|v| normalize.apply(v));
        Ok(out)
    }
}
