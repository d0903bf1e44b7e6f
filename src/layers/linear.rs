use super::*;
use ndarray::{Axis, Ix1, Ix2};

/// A fully-connected layer, `y = x · Wᵀ + b`.
pub struct Linear {
    num_in: usize,
    num_out: usize,
    /// `num_out × num_in`
    weight: ArrayD<f32>,
    bias: ArrayD<f32>,
    weight_grad: ArrayD<f32>,
    bias_grad: ArrayD<f32>,
    input: Option<ndarray::Array2<f32>>,
}

impl Linear {
    pub fn new<R: Rng>(num_in: usize, num_out: usize, rng: &mut R) -> Linear {
        debug!("Create dense-layer: {} -> {}.", num_in, num_out);
        let weight = init_uniform(&[num_out, num_in], num_in, rng);
        let bias = init_uniform(&[num_out], num_in, rng);
        Linear {
            num_in,
            num_out,
            weight_grad: ArrayD::zeros(weight.raw_dim()),
            bias_grad: ArrayD::zeros(bias.raw_dim()),
            weight,
            bias,
            input: None,
        }
    }

    pub fn num_in(&self) -> usize {
        self.num_in
    }

    pub fn num_out(&self) -> usize {
        self.num_out
    }
}

impl Layer for Linear {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn forward(&mut self, input: ArrayD<f32>, _mode: Mode, compute: &dyn Compute) -> Result<ArrayD<f32>> {
        let x = input.into_dimensionality::<Ix2>()?;
        if x.ncols() != self.num_in {
            return Err(mismatch());
        }
        let weight = self.weight.view().into_dimensionality::<Ix2>()?;
        let bias = self.bias.view().into_dimensionality::<Ix1>()?;

        let mut y = compute.gemm(x.view(), weight.t())?;
        y += &bias;

        self.input = Some(x);
        Ok(y.into_dyn())
    }

    fn backward(&mut self, grad: ArrayD<f32>, compute: &dyn Compute) -> Result<ArrayD<f32>> {
        let x = self
            .input
            .as_ref()
            .ok_or(BenchError::BackwardBeforeForward("linear"))?;
        let grad = grad.into_dimensionality::<Ix2>()?;
        if grad.dim() != (x.nrows(), self.num_out) {
            return Err(mismatch());
        }
        let weight = self.weight.view().into_dimensionality::<Ix2>()?;

        let weight_grad = compute.gemm(grad.t(), x.view())?;
        let bias_grad = grad.sum_axis(Axis(0));
        let input_grad = compute.gemm(grad.view(), weight)?;

        self.weight_grad = weight_grad.into_dyn();
        self.bias_grad = bias_grad.into_dyn();
        Ok(input_grad.into_dyn())
    }

    fn params(&mut self) -> Vec<Param<'_>> {
        vec![
            Param {
                value: &mut self.weight,
                grad: &self.weight_grad,
            },
            Param {
                value: &mut self.bias,
                grad: &self.bias_grad,
            },
        ]
    }

    fn num_params(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}
