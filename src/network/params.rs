use super::*;
use crate::augment::Normalize;
use crate::math::LossKind;
use crate::optim::OptimizerConfig;

/// The layer stacks the benchmark knows how to build.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Architecture {
    MnistConvNet,
    Cifar10ConvNet,
}

/// Everything that fixes a classifier apart from the augmentation backend and batch size.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkParams {
    pub source_side: usize,
    pub num_source_channels: usize,
    pub num_classes: usize,
    pub normalize: Normalize,
    pub loss: LossKind,
    pub optimizer: OptimizerConfig,
    pub architecture: Architecture,
}

pub const MNIST_PARAMS: NetworkParams = NetworkParams {
    source_side: 28,
    num_source_channels: 1,
    num_classes: 10,
    normalize: Normalize {
        mean: 0.1307,
        std: 0.3081,
    },
    loss: LossKind::Nll,
    optimizer: OptimizerConfig::Adam {
        lr: 0.0004,
        betas: (0.9, 0.999),
        eps: 1e-8,
    },
    architecture: Architecture::MnistConvNet,
};

// CIFAR10 reuses the MNIST normalization constants on every channel
pub const CIFAR10_PARAMS: NetworkParams = NetworkParams {
    source_side: 32,
    num_source_channels: 3,
    num_classes: 10,
    normalize: Normalize {
        mean: 0.1307,
        std: 0.3081,
    },
    loss: LossKind::CrossEntropy,
    optimizer: OptimizerConfig::Sgd {
        lr: 0.001,
        momentum: 0.9,
    },
    architecture: Architecture::Cifar10ConvNet,
};

impl NetworkParams {
    pub fn input_shape(&self) -> ImageGeometry {
        ImageGeometry::new(self.source_side, self.num_source_channels)
    }

    pub fn build<R: Rng>(&self, rng: &mut R) -> Network {
        let net = match self.architecture {
            Architecture::MnistConvNet => mnist_net(self, rng),
            Architecture::Cifar10ConvNet => cifar10_net(self, rng),
        };
        debug!(
            "Built {:?} with {} parameters: {:?}",
            self.architecture,
            net.num_params(),
            net.layer_names()
        );
        net
    }
}
