//! The benchmarked model: a dataset-specific network bound to a batch size and an augmentation
//! backend.

use crate::augment::{AugmentationBackend, BatchAugmentation, SampleTransform};
use crate::data::{Batch, DataLoader, DataSource, DatasetKind, Split};
use crate::device::Compute;
use crate::error::{BenchError, Result};
use crate::layers::{Mode, Param};
use crate::math::LossOutput;
use crate::network::{Network, NetworkParams, CIFAR10_PARAMS, MNIST_PARAMS};
use crate::optim::Optimizer;
use crate::sweep::ModelFactory;
use crate::trainer::TrainModule;
use rand::rngs::StdRng;
use rand::SeedableRng;

pub fn network_params(dataset: DatasetKind) -> &'static NetworkParams {
    match dataset {
        DatasetKind::Mnist => &MNIST_PARAMS,
        DatasetKind::Cifar10 => &CIFAR10_PARAMS,
    }
}

pub struct AugmentedClassifier {
    dataset: DatasetKind,
    params: &'static NetworkParams,
    batch_size: usize,
    backend: AugmentationBackend,
    network: Network,
    transform: SampleTransform,
    augmentation: Option<BatchAugmentation>,
    data: DataSource,
    rng: StdRng,
}

impl AugmentedClassifier {
    pub fn new(
        dataset: DatasetKind,
        batch_size: usize,
        backend: AugmentationBackend,
        data: DataSource,
    ) -> Result<AugmentedClassifier> {
        if batch_size == 0 {
            return Err(BenchError::InvalidConfig("batch size must be positive".to_owned()));
        }
        let params = network_params(dataset);
        let mut rng = StdRng::from_entropy();
        let network = params.build(&mut rng);
        debug!(
            "{} classifier with batch size {} and {} augmentation",
            dataset, batch_size, backend
        );
        Ok(AugmentedClassifier {
            dataset,
            params,
            batch_size,
            backend,
            network,
            transform: backend.transform(params.normalize),
            augmentation: backend.augmentation(params.normalize),
            data,
            rng,
        })
    }

    /// Like `new`, with the backend given by name. Unknown names fail with `UnsupportedBackend`.
    pub fn from_backend_name(
        dataset: DatasetKind,
        batch_size: usize,
        backend: &str,
        data: DataSource,
    ) -> Result<AugmentedClassifier> {
        AugmentedClassifier::new(dataset, batch_size, backend.parse()?, data)
    }

    pub fn dataset(&self) -> DatasetKind {
        self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn backend(&self) -> AugmentationBackend {
        self.backend
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// What the data loader applies to every sample.
    pub fn transform(&self) -> &SampleTransform {
        &self.transform
    }

    /// What the training step applies to every batch before the forward pass.
    pub fn augmentation(&self) -> Option<&BatchAugmentation> {
        self.augmentation.as_ref()
    }
}

impl TrainModule for AugmentedClassifier {
    fn prepare_data(&mut self) -> Result<()> {
        self.data.prepare(self.dataset, Split::Train)?;
        if self.dataset == DatasetKind::Mnist {
            self.data.prepare(self.dataset, Split::Test)?;
        }
        Ok(())
    }

    fn train_dataloader(&mut self) -> Result<DataLoader> {
        let set = self.data.acquire(self.dataset, Split::Train, false)?;
        DataLoader::new(set, self.transform.clone(), self.batch_size)
    }

    fn configure_optimizers(&self) -> Box<dyn Optimizer> {
        self.params.optimizer.build()
    }

    fn training_step(&mut self, batch: Batch, compute: &dyn Compute) -> Result<LossOutput> {
        let Batch { images, labels } = batch;
        let input = match &self.augmentation {
            Some(augmentation) => augmentation.apply(&images, compute, &mut self.rng)?,
            None => images,
        };
        let output = self.network.forward(input, Mode::Train, compute)?;
        self.params.loss.compute(output.view(), &labels)
    }

    fn backward(&mut self, output: LossOutput, compute: &dyn Compute) -> Result<()> {
        self.network.backward(output.grad, compute)
    }

    fn params(&mut self) -> Vec<Param<'_>> {
        self.network.params()
    }
}

/// Builds classifiers of one dataset that all read from the same data source.
#[derive(Clone)]
pub struct ClassifierFactory {
    dataset: DatasetKind,
    data: DataSource,
}

impl ClassifierFactory {
    pub fn new(dataset: DatasetKind, data: DataSource) -> ClassifierFactory {
        ClassifierFactory { dataset, data }
    }
}

impl ModelFactory for ClassifierFactory {
    type Model = AugmentedClassifier;

    fn construct(&self, batch_size: usize, backend: AugmentationBackend) -> Result<AugmentedClassifier> {
        AugmentedClassifier::new(self.dataset, batch_size, backend, self.data.clone())
    }
}
