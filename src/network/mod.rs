mod params;

pub use self::params::*;
use crate::device::Compute;
use crate::error::Result;
use crate::geometry::{ImageGeometry, PaddedSquare, Square};
use crate::layers::*;
use ndarray::{Array2, Array4, Ix2};
use rand::Rng;

/// A feed-forward stack of layers taking NCHW image batches to per-class scores.
pub struct Network {
    input_shape: ImageGeometry,
    layers: Vec<Box<dyn Layer>>,
}

impl Network {
    pub fn new(input_shape: ImageGeometry) -> Network {
        Network {
            input_shape,
            layers: Vec::new(),
        }
    }

    pub fn push<L: Layer + 'static>(&mut self, layer: L) -> &mut Network {
        self.layers.push(Box::new(layer));
        self
    }

    pub fn input_shape(&self) -> &ImageGeometry {
        &self.input_shape
    }

    pub fn num_params(&self) -> usize {
        self.layers.iter().map(|l| l.num_params()).sum()
    }

    pub fn layer_names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    pub fn forward(&mut self, input: Array4<f32>, mode: Mode, compute: &dyn Compute) -> Result<Array2<f32>> {
        let mut x = input.into_dyn();
        for layer in self.layers.iter_mut() {
            trace!("\t↳ {} forward, input shape {:?}", layer.name(), x.shape());
            x = layer.forward(x, mode, compute)?;
        }
        Ok(x.into_dimensionality::<Ix2>()?)
    }

    pub fn backward(&mut self, grad: Array2<f32>, compute: &dyn Compute) -> Result<()> {
        let mut g = grad.into_dyn();
        for layer in self.layers.iter_mut().rev() {
            g = layer.backward(g, compute)?;
        }
        Ok(())
    }

    /// All trainable tensors, in layer order.
    pub fn params(&mut self) -> Vec<Param<'_>> {
        let mut params = Vec::new();
        for layer in self.layers.iter_mut() {
            params.extend(layer.params());
        }
        params
    }
}

/// conv(1→32, 3) relu conv(32→64, 3) relu maxpool(2) dropout(0.25) flatten
/// linear(→128) relu dropout(0.5) linear(→classes) log_softmax
pub fn mnist_net<R: Rng>(params: &NetworkParams, rng: &mut R) -> Network {
    let input_shape = params.input_shape();
    let filter = PaddedSquare::from_side(3);
    let conv1 = Conv2d::new(input_shape.channels(), 32, filter, rng);
    let fm1_shape = conv1.output_geometry(&input_shape);
    let conv2 = Conv2d::new(fm1_shape.channels(), 64, filter, rng);
    let fm2_shape = conv2.output_geometry(&fm1_shape).after_pool(2);

    let mut net = Network::new(input_shape);
    net.push(conv1)
        .push(Relu::new())
        .push(conv2)
        .push(Relu::new())
        .push(MaxPool2d::new(2))
        .push(Dropout::new(0.25))
        .push(Flatten::new())
        .push(Linear::new(fm2_shape.num_elems(), 128, rng))
        .push(Relu::new())
        .push(Dropout::new(0.5))
        .push(Linear::new(128, params.num_classes, rng))
        .push(LogSoftmax::new());
    net
}

/// conv(3→6, 5) relu pool conv(6→16, 5) relu pool flatten linear(→120) relu linear(→84) relu
/// linear(→classes)
pub fn cifar10_net<R: Rng>(params: &NetworkParams, rng: &mut R) -> Network {
    let input_shape = params.input_shape();
    let filter = PaddedSquare::from_side(5);
    let conv1 = Conv2d::new(input_shape.channels(), 6, filter, rng);
    let fm1_shape = conv1.output_geometry(&input_shape).after_pool(2);
    let conv2 = Conv2d::new(fm1_shape.channels(), 16, filter, rng);
    let fm2_shape = conv2.output_geometry(&fm1_shape).after_pool(2);

    let mut net = Network::new(input_shape);
    net.push(conv1)
        .push(Relu::new())
        .push(MaxPool2d::new(2))
        .push(conv2)
        .push(Relu::new())
        .push(MaxPool2d::new(2))
        .push(Flatten::new())
        .push(Linear::new(fm2_shape.num_elems(), 120, rng))
        .push(Relu::new())
        .push(Linear::new(120, 84, rng))
        .push(Relu::new())
        .push(Linear::new(84, params.num_classes, rng));
    net
}
