use crate::device::Device;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BenchError>;

/// Everything that can abort a benchmark sweep. Nothing in the harness catches these; the first
/// one raised terminates the whole sweep.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("unsupported augmentation backend: {0}")]
    UnsupportedBackend(String),
    #[error("unsupported device: {0}")]
    UnsupportedDevice(String),
    #[error("device {device} is unavailable: {reason}")]
    DeviceUnavailable { device: Device, reason: String },
    #[error("dataset {dataset} is unavailable: {reason}")]
    DataUnavailable { dataset: String, reason: String },
    #[error("invalid sweep configuration: {0}")]
    InvalidConfig(String),
    #[error("{0} layer ran backward before forward")]
    BackwardBeforeForward(&'static str),
    #[error("tensor shape mismatch: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl BenchError {
    pub fn data_unavailable<D, R>(dataset: D, reason: R) -> BenchError
    where
        D: ToString,
        R: ToString,
    {
        BenchError::DataUnavailable {
            dataset: dataset.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn device_unavailable<R: ToString>(device: Device, reason: R) -> BenchError {
        BenchError::DeviceUnavailable {
            device,
            reason: reason.to_string(),
        }
    }
}
