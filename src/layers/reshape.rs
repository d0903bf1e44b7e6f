use super::*;
use ndarray::IxDyn;

/// Flattens everything but the batch axis.
#[derive(Default)]
pub struct Flatten {
    input_shape: Option<IxDyn>,
}

impl Flatten {
    pub fn new() -> Flatten {
        Flatten::default()
    }
}

impl Layer for Flatten {
    fn name(&self) -> &'static str {
        "flatten"
    }

    fn forward(&mut self, input: ArrayD<f32>, _mode: Mode, _compute: &dyn Compute) -> Result<ArrayD<f32>> {
        let num = *input.shape().first().ok_or_else(mismatch)?;
        let features = if num == 0 { 0 } else { input.len() / num };
        self.input_shape = Some(input.raw_dim());
        Ok(standard(input).into_shape(IxDyn(&[num, features]))?)
    }

    fn backward(&mut self, grad: ArrayD<f32>, _compute: &dyn Compute) -> Result<ArrayD<f32>> {
        let shape = self
            .input_shape
            .clone()
            .ok_or(BenchError::BackwardBeforeForward("flatten"))?;
        Ok(standard(grad).into_shape(shape)?)
    }
}
