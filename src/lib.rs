//! Training-throughput benchmark of two data-augmentation backends. A sweep trains a small
//! convolutional classifier for one epoch per device, augmentation backend and batch size, and
//! reports how long every epoch took.

#[macro_use]
extern crate log;

pub mod augment;
#[cfg(feature = "opencl")]
mod cl_util;
pub mod classifier;
pub mod data;
pub mod device;
pub mod error;
pub mod geometry;
pub mod layers;
pub mod math;
pub mod network;
pub mod optim;
pub mod profiler;
pub mod report;
pub mod sweep;
pub mod trainer;
#[cfg(test)]
mod tests;

pub use augment::AugmentationBackend;
pub use classifier::{AugmentedClassifier, ClassifierFactory};
pub use data::{DataSource, DatasetKind};
pub use device::{Device, DeviceSpec};
pub use error::{BenchError, Result};
pub use profiler::{Profiler, TimingSpan};
pub use sweep::{BenchmarkConfig, ModelFactory, ResultEntry, ResultsTable, Sweep, SweepConfig};
pub use trainer::{EpochTrainer, Trainer};
