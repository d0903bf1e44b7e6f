use super::*;
use crate::math::log_softmax;
use ndarray::{Array2, Array4, Ix2, Zip};

#[derive(Default)]
pub struct Relu {
    output: Option<ArrayD<f32>>,
}

impl Relu {
    pub fn new() -> Relu {
        Relu::default()
    }
}

impl Layer for Relu {
    fn name(&self) -> &'static str {
        "relu"
    }

    fn forward(&mut self, mut input: ArrayD<f32>, _mode: Mode, _compute: &dyn Compute) -> Result<ArrayD<f32>> {
        input.mapv_inplace(|v| v.max(0.));
        self.output = Some(input.clone());
        Ok(input)
    }

    fn backward(&mut self, mut grad: ArrayD<f32>, _compute: &dyn Compute) -> Result<ArrayD<f32>> {
        let output = self
            .output
            .as_ref()
            .ok_or(BenchError::BackwardBeforeForward("relu"))?;
        if output.shape() != grad.shape() {
            return Err(mismatch());
        }
        Zip::from(&mut grad).and(output).for_each(|g, &o| {
            if o <= 0. {
                *g = 0.;
            }
        });
        Ok(grad)
    }
}

/// Zeroes inputs with probability `p` during training and rescales the rest by `1 / (1 - p)`.
/// Feature maps (4-D inputs) are dropped per channel, anything else per element.
pub struct Dropout {
    p: f32,
    mask: Option<ArrayD<f32>>,
}

impl Dropout {
    pub fn new(p: f32) -> Dropout {
        Dropout {
            p: p.max(0.).min(1.),
            mask: None,
        }
    }

    fn sample_mask(&self, shape: &[usize]) -> Result<ArrayD<f32>> {
        let mut rng = rand::thread_rng();
        let keep = 1. - self.p;
        let scale = if keep > 0. { 1. / keep } else { 0. };
        let mut draw = move || if rng.gen::<f32>() < keep { scale } else { 0. };

        if let [num, channels, height, width] = *shape {
            let per_channel = Array2::from_shape_simple_fn((num, channels), &mut draw);
            let mask = Array4::from_shape_fn((num, channels, height, width), |(n, c, _, _)| {
                per_channel[[n, c]]
            });
            Ok(mask.into_dyn())
        } else {
            Ok(ArrayD::from_shape_simple_fn(shape, draw))
        }
    }
}

impl Layer for Dropout {
    fn name(&self) -> &'static str {
        "dropout"
    }

    fn forward(&mut self, mut input: ArrayD<f32>, mode: Mode, _compute: &dyn Compute) -> Result<ArrayD<f32>> {
        if mode == Mode::Eval || self.p == 0. {
            self.mask = None;
            return Ok(input);
        }
        let mask = self.sample_mask(input.shape())?;
        input *= &mask;
        self.mask = Some(mask);
        Ok(input)
    }

    fn backward(&mut self, mut grad: ArrayD<f32>, _compute: &dyn Compute) -> Result<ArrayD<f32>> {
        if let Some(mask) = &self.mask {
            if mask.shape() != grad.shape() {
                return Err(mismatch());
            }
            grad *= mask;
        }
        Ok(grad)
    }
}

/// Row-wise log-softmax over the class axis.
#[derive(Default)]
pub struct LogSoftmax {
    output: Option<Array2<f32>>,
}

impl LogSoftmax {
    pub fn new() -> LogSoftmax {
        LogSoftmax::default()
    }
}

impl Layer for LogSoftmax {
    fn name(&self) -> &'static str {
        "log_softmax"
    }

    fn forward(&mut self, input: ArrayD<f32>, _mode: Mode, _compute: &dyn Compute) -> Result<ArrayD<f32>> {
        let x = input.into_dimensionality::<Ix2>()?;
        let out = log_softmax(x.view());
        self.output = Some(out.clone());
        Ok(out.into_dyn())
    }

    fn backward(&mut self, grad: ArrayD<f32>, _compute: &dyn Compute) -> Result<ArrayD<f32>> {
        let output = self
            .output
            .as_ref()
            .ok_or(BenchError::BackwardBeforeForward("log_softmax"))?;
        let mut grad = grad.into_dimensionality::<Ix2>()?;
        if grad.dim() != output.dim() {
            return Err(mismatch());
        }
        // dx = dy - softmax(x) * Σ dy
        let sums = grad.sum_axis(ndarray::Axis(1));
        for ((mut row, out_row), &sum) in grad.outer_iter_mut().zip(output.outer_iter()).zip(sums.iter()) {
            Zip::from(&mut row).and(&out_row).for_each(|g, &o| *g -= o.exp() * sum);
        }
        Ok(grad.into_dyn())
    }
}
