//! Trainable layers of the benchmarked classifiers. Each layer caches what its backward pass needs
//! during the forward pass and overwrites its parameter gradients on every backward pass, so no
//! explicit zeroing is required between steps.

mod activation;
mod conv;
mod linear;
mod pool;
mod reshape;
#[cfg(test)]
mod test;

pub use self::activation::*;
pub use self::conv::*;
pub use self::linear::*;
pub use self::pool::*;
pub use self::reshape::*;
use crate::device::Compute;
use crate::error::{BenchError, Result};
use ndarray::{Array, ArrayD, Dimension, ErrorKind, ShapeError};
use rand::Rng;

/// Whether stochastic layers are active.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// A trainable tensor and the gradient from the latest backward pass.
pub struct Param<'a> {
    pub value: &'a mut ArrayD<f32>,
    pub grad: &'a ArrayD<f32>,
}

/// Describes a layer of a convolutional neural network.
pub trait Layer {
    fn name(&self) -> &'static str;
    fn forward(&mut self, input: ArrayD<f32>, mode: Mode, compute: &dyn Compute) -> Result<ArrayD<f32>>;
    /// Maps the gradient of the output into the gradient of the input, storing parameter
    /// gradients on the way.
    fn backward(&mut self, grad: ArrayD<f32>, compute: &dyn Compute) -> Result<ArrayD<f32>>;
    fn params(&mut self) -> Vec<Param<'_>> {
        Vec::new()
    }
    fn num_params(&self) -> usize {
        0
    }
}

/// Uniform initialization in ±1/√fan_in for weights and biases alike.
pub(crate) fn init_uniform<R: Rng>(shape: &[usize], fan_in: usize, rng: &mut R) -> ArrayD<f32> {
    let bound = 1. / (fan_in.max(1) as f32).sqrt();
    ArrayD::from_shape_simple_fn(shape, || rng.gen_range(-bound..=bound))
}

/// Returns `array` in row-major layout, copying only if needed.
pub(crate) fn standard<D: Dimension>(array: Array<f32, D>) -> Array<f32, D> {
    if array.is_standard_layout() {
        array
    } else {
        array.as_standard_layout().into_owned()
    }
}

pub(crate) fn mismatch() -> BenchError {
    ShapeError::from_kind(ErrorKind::IncompatibleShape).into()
}
