use super::*;
use ndarray::{Array4, Ix4, IxDyn};

/// Non-overlapping max pooling with a square window. Trailing rows and columns that do not fill a
/// whole window are dropped.
pub struct MaxPool2d {
    size: usize,
    /// Flat input index of the maximum of every output element, plus the input shape.
    argmax: Option<(Vec<usize>, IxDyn)>,
}

impl MaxPool2d {
    pub fn new(size: usize) -> MaxPool2d {
        MaxPool2d {
            size: size.max(1),
            argmax: None,
        }
    }
}

impl Layer for MaxPool2d {
    fn name(&self) -> &'static str {
        "max_pool2d"
    }

    fn forward(&mut self, input: ArrayD<f32>, _mode: Mode, _compute: &dyn Compute) -> Result<ArrayD<f32>> {
        let x = standard(input.into_dimensionality::<Ix4>()?);
        let (num, channels, height, width) = x.dim();
        let (out_h, out_w) = (height / self.size, width / self.size);
        let src = x.as_slice().ok_or_else(mismatch)?;

        let mut out = Vec::with_capacity(num * channels * out_h * out_w);
        let mut argmax = Vec::with_capacity(out.capacity());
        for plane in 0..num * channels {
            let plane_offset = plane * height * width;
            for oy in 0..out_h {
                for ox in 0..out_w {
                    let mut best_idx = plane_offset + oy * self.size * width + ox * self.size;
                    let mut best = src[best_idx];
                    for iy in 0..self.size {
                        for ix in 0..self.size {
                            let idx = plane_offset + (oy * self.size + iy) * width + ox * self.size + ix;
                            if src[idx] > best {
                                best = src[idx];
                                best_idx = idx;
                            }
                        }
                    }
                    out.push(best);
                    argmax.push(best_idx);
                }
            }
        }

        self.argmax = Some((argmax, x.raw_dim().into_dyn()));
        Ok(Array4::from_shape_vec((num, channels, out_h, out_w), out)?.into_dyn())
    }

    fn backward(&mut self, grad: ArrayD<f32>, _compute: &dyn Compute) -> Result<ArrayD<f32>> {
        let (argmax, input_shape) = self
            .argmax
            .as_ref()
            .ok_or(BenchError::BackwardBeforeForward("max_pool2d"))?;
        let grad = standard(grad);
        let grad = grad.as_slice().ok_or_else(mismatch)?;
        if grad.len() != argmax.len() {
            return Err(mismatch());
        }

        let mut input_grad = vec![0f32; input_shape.size()];
        for (&idx, &g) in argmax.iter().zip(grad.iter()) {
            input_grad[idx] += g;
        }
        Ok(ArrayD::from_shape_vec(input_shape.clone(), input_grad)?)
    }
}
