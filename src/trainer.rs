//! Runs one training epoch of a model on a device while profiling every step.

use crate::data::{Batch, DataLoader};
use crate::device::{resolve_compute, Compute, DeviceSpec};
use crate::error::Result;
use crate::layers::Param;
use crate::math::LossOutput;
use crate::optim::Optimizer;
use crate::profiler::Profiler;

/// The hooks a model exposes to the trainer.
pub trait TrainModule {
    /// Makes sure every dataset the model trains on is on disk.
    fn prepare_data(&mut self) -> Result<()>;
    fn train_dataloader(&mut self) -> Result<DataLoader>;
    fn configure_optimizers(&self) -> Box<dyn Optimizer>;
    /// Forward pass and loss of one batch.
    fn training_step(&mut self, batch: Batch, compute: &dyn Compute) -> Result<LossOutput>;
    fn backward(&mut self, output: LossOutput, compute: &dyn Compute) -> Result<()>;
    fn params(&mut self) -> Vec<Param<'_>>;
}

/// Something that trains `M` for exactly one epoch on a device.
pub trait EpochTrainer<M> {
    fn run_one_epoch(&mut self, model: &mut M, device: DeviceSpec, profiler: &mut Profiler) -> Result<()>;
}

/// Records the non-overlapping actions `get_train_batch`, `model_forward`, `model_backward` and
/// `optimizer_step` of every training step.
#[derive(Copy, Clone, Debug, Default)]
pub struct Trainer {
    limit_train_batches: Option<usize>,
}

impl Trainer {
    pub fn new() -> Trainer {
        Trainer::default()
    }

    /// Stops the epoch after `n` batches.
    pub fn with_limit_train_batches(mut self, n: usize) -> Trainer {
        self.limit_train_batches = Some(n);
        self
    }
}

impl<M: TrainModule> EpochTrainer<M> for Trainer {
    fn run_one_epoch(&mut self, model: &mut M, device: DeviceSpec, profiler: &mut Profiler) -> Result<()> {
        let compute = resolve_compute(device)?;
        info!("Training on {} using {} compute", device.device, compute.name());

        model.prepare_data()?;
        let mut loader = model.train_dataloader()?;
        let mut optimizer = model.configure_optimizers();
        let limit = self.limit_train_batches.unwrap_or(usize::MAX);
        debug!(
            "{} batches of {} samples per epoch",
            loader.num_batches().min(limit),
            loader.batch_size()
        );

        let mut steps = 0;
        while steps < limit {
            let batch = match profiler.profile("get_train_batch", || loader.next()) {
                Some(batch) => batch,
                None => break,
            };
            let output = profiler.profile("model_forward", || {
                model.training_step(batch, compute.as_ref())
            })?;
            debug!("Step {}: loss {:.4}", steps, output.loss);
            profiler.profile("model_backward", || model.backward(output, compute.as_ref()))?;
            profiler.profile("optimizer_step", || optimizer.step(model.params()))?;
            steps += 1;
        }

        info!("Epoch done after {} steps\n{}", steps, profiler.summary());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::augment::SampleTransform;
    use crate::data::ImageSet;
    use crate::device::Device;
    use crate::error::BenchError;
    use crate::geometry::ImageGeometry;
    use crate::optim::OptimizerConfig;
    use ndarray::{Array2, ArrayD};

    /// Learns nothing; records the hooks it was called through.
    struct Recorder {
        num_samples: usize,
        batch_size: usize,
        calls: Vec<&'static str>,
        weight: ArrayD<f32>,
        grad: ArrayD<f32>,
    }

    impl Recorder {
        fn new(num_samples: usize, batch_size: usize) -> Recorder {
            Recorder {
                num_samples,
                batch_size,
                calls: Vec::new(),
                weight: ArrayD::zeros(vec![1]),
                grad: ArrayD::zeros(vec![1]),
            }
        }
    }

    impl TrainModule for Recorder {
        fn prepare_data(&mut self) -> Result<()> {
            self.calls.push("prepare_data");
            Ok(())
        }

        fn train_dataloader(&mut self) -> Result<DataLoader> {
            self.calls.push("train_dataloader");
            let set = ImageSet::new(
                ImageGeometry::new(1, 1),
                vec![0; self.num_samples],
                vec![0; self.num_samples],
            )?;
            DataLoader::new(set, SampleTransform::ToTensor, self.batch_size)
        }

        fn configure_optimizers(&self) -> Box<dyn Optimizer> {
            OptimizerConfig::Sgd { lr: 1., momentum: 0. }.build()
        }

        fn training_step(&mut self, batch: Batch, _: &dyn Compute) -> Result<LossOutput> {
            self.calls.push("training_step");
            Ok(LossOutput {
                loss: 0.,
                grad: Array2::zeros((batch.len(), 1)),
            })
        }

        fn backward(&mut self, _: LossOutput, _: &dyn Compute) -> Result<()> {
            self.calls.push("backward");
            self.grad.fill(1.);
            Ok(())
        }

        fn params(&mut self) -> Vec<Param<'_>> {
            vec![Param {
                value: &mut self.weight,
                grad: &self.grad,
            }]
        }
    }

    #[test]
    fn one_epoch_visits_every_batch() {
        let mut model = Recorder::new(5, 2);
        let mut profiler = Profiler::new();
        Trainer::new()
            .run_one_epoch(&mut model, Device::Cpu.spec(), &mut profiler)
            .unwrap();

        assert_eq!(&model.calls[..2], &["prepare_data", "train_dataloader"]);
        assert_eq!(model.calls.iter().filter(|&&c| c == "training_step").count(), 3);
        assert_eq!(model.weight[[0]], -3.);

        let labels = profiler
            .recorded_durations()
            .into_iter()
            .map(|(label, durations)| (label, durations.len()))
            .collect::<Vec<_>>();
        assert_eq!(
            labels,
            vec![
                ("get_train_batch", 4),
                ("model_forward", 3),
                ("model_backward", 3),
                ("optimizer_step", 3)
            ]
        );
    }

    #[test]
    fn batch_limit_cuts_the_epoch_short() {
        let mut model = Recorder::new(10, 2);
        let mut profiler = Profiler::new();
        Trainer::new()
            .with_limit_train_batches(2)
            .run_one_epoch(&mut model, Device::Cpu.spec(), &mut profiler)
            .unwrap();
        assert_eq!(model.calls.iter().filter(|&&c| c == "backward").count(), 2);
    }

    #[cfg(not(feature = "opencl"))]
    #[test]
    fn missing_accelerator_fails_before_training() {
        let mut model = Recorder::new(4, 2);
        let mut profiler = Profiler::new();
        let result = Trainer::new().run_one_epoch(&mut model, Device::Gpu.spec(), &mut profiler);
        assert!(matches!(result, Err(BenchError::DeviceUnavailable { .. })));
        assert!(model.calls.is_empty());
        assert!(profiler.spans().is_empty());
    }
}
