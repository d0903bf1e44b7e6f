use super::*;
use crate::geometry::{ImageGeometry, PaddedSquare, Square};
use crate::math::{col2im, im2col};
use ndarray::{Array1, Array2, Array4, Axis, Ix1, Ix2, Ix4};

/// A stride-1 2-D convolution computed as im2col followed by a gemm on the training device.
pub struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    filter: PaddedSquare,
    padding: usize,
    /// `out_channels × (in_channels * side * side)`
    weight: ArrayD<f32>,
    bias: ArrayD<f32>,
    weight_grad: ArrayD<f32>,
    bias_grad: ArrayD<f32>,
    input: Option<Array4<f32>>,
}

impl Conv2d {
    pub fn new<R: Rng>(
        in_channels: usize,
        out_channels: usize,
        filter: PaddedSquare,
        rng: &mut R,
    ) -> Conv2d {
        let fan_in = in_channels * filter.num_elems();
        debug!(
            "Create conv-layer with filter-shape: {:?}, channels: {} -> {}.",
            filter, in_channels, out_channels
        );
        let weight = init_uniform(&[out_channels, fan_in], fan_in, rng);
        let bias = init_uniform(&[out_channels], fan_in, rng);
        Conv2d {
            in_channels,
            out_channels,
            filter,
            padding: 0,
            weight_grad: ArrayD::zeros(weight.raw_dim()),
            bias_grad: ArrayD::zeros(bias.raw_dim()),
            weight,
            bias,
            input: None,
        }
    }

    /// Zero-pads the input by `padding` pixels on every side.
    pub fn with_padding(mut self, padding: usize) -> Conv2d {
        self.padding = padding;
        self
    }

    pub fn output_geometry(&self, input: &ImageGeometry) -> ImageGeometry {
        ImageGeometry::new(input.side() + 2 * self.padding, input.channels())
            .after_conv(&self.filter, self.out_channels)
    }

    fn output_side(&self, side: usize) -> usize {
        (side + 2 * self.padding + 1).saturating_sub(self.filter.side())
    }
}

impl Layer for Conv2d {
    fn name(&self) -> &'static str {
        "conv2d"
    }

    fn forward(&mut self, input: ArrayD<f32>, _mode: Mode, compute: &dyn Compute) -> Result<ArrayD<f32>> {
        let x = input.into_dimensionality::<Ix4>()?;
        let (num, channels, height, width) = x.dim();
        if channels != self.in_channels {
            return Err(mismatch());
        }
        let (out_h, out_w) = (self.output_side(height), self.output_side(width));
        let weight = self.weight.view().into_dimensionality::<Ix2>()?;
        let bias = self.bias.view().into_dimensionality::<Ix1>()?;

        let mut out = Array4::<f32>::zeros((num, self.out_channels, out_h, out_w));
        for (sample, mut out_sample) in x.outer_iter().zip(out.outer_iter_mut()) {
            let cols = im2col(sample, &self.filter, self.padding);
            let y = standard(compute.gemm(weight, cols.view())?);
            let y = y.into_shape((self.out_channels, out_h, out_w))?;
            out_sample.assign(&y);
            for (mut plane, &b) in out_sample.outer_iter_mut().zip(bias.iter()) {
                plane.mapv_inplace(|v| v + b);
            }
        }

        self.input = Some(x);
        Ok(out.into_dyn())
    }

    fn backward(&mut self, grad: ArrayD<f32>, compute: &dyn Compute) -> Result<ArrayD<f32>> {
        let x = self
            .input
            .as_ref()
            .ok_or(BenchError::BackwardBeforeForward("conv2d"))?;
        let grad = standard(grad.into_dimensionality::<Ix4>()?);
        let (num, channels, height, width) = x.dim();
        let (out_h, out_w) = (self.output_side(height), self.output_side(width));
        if grad.dim() != (num, self.out_channels, out_h, out_w) {
            return Err(mismatch());
        }
        let weight = self.weight.view().into_dimensionality::<Ix2>()?;

        let mut weight_grad = Array2::<f32>::zeros(weight.raw_dim());
        let mut bias_grad = Array1::<f32>::zeros(self.out_channels);
        let mut input_grad = Array4::<f32>::zeros(x.raw_dim());
        for (i, mut input_grad_sample) in input_grad.outer_iter_mut().enumerate() {
            let cols = im2col(x.index_axis(Axis(0), i), &self.filter, self.padding);
            let g = grad
                .index_axis(Axis(0), i)
                .into_shape((self.out_channels, out_h * out_w))?;

            weight_grad += &compute.gemm(g, cols.t())?;
            bias_grad += &g.sum_axis(Axis(1));

            let col_grad = compute.gemm(weight.t(), g)?;
            input_grad_sample.assign(&col2im(
                col_grad.view(),
                channels,
                height,
                width,
                &self.filter,
                self.padding,
            ));
        }

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
