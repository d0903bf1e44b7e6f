//! Where the heavy lifting of a training step runs. A `Device` in a sweep configuration resolves
//! into a `Compute` implementation: the host for `cpu`, an OpenCL accelerator for `gpu`.

#[cfg(feature = "opencl")]
mod cl;
mod host;

#[cfg(feature = "opencl")]
pub use self::cl::ClCompute;
pub use self::host::HostCompute;
use crate::augment::{AffineTransform, Interpolation};
use crate::error::{BenchError, Result};
use ndarray::{Array2, Array4, ArrayView2, ArrayView4, ErrorKind, ShapeError};
use std::fmt;
use std::str::FromStr;

/// A device a benchmark run is trained on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Device {
    Cpu,
    Gpu,
}

impl Device {
    pub fn as_str(self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Gpu => "gpu",
        }
    }

    /// The number of accelerator units requested when training on this device.
    pub fn num_accelerators(self) -> usize {
        match self {
            Device::Cpu => 0,
            Device::Gpu => 1,
        }
    }

    pub fn spec(self) -> DeviceSpec {
        DeviceSpec {
            device: self,
            accelerators: self.num_accelerators(),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Device> {
        match s {
            "cpu" => Ok(Device::Cpu),
            "gpu" => Ok(Device::Gpu),
            _ => Err(BenchError::UnsupportedDevice(s.to_owned())),
        }
    }
}

/// The device capability handed to the trainer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceSpec {
    pub device: Device,
    pub accelerators: usize,
}

/// Dense math the network and the batched augmentation dispatch to.
pub trait Compute {
    fn name(&self) -> &str;
    /// C := A · B for a row-major `A` (m × k) and `B` (k × n).
    fn gemm(&self, a: ArrayView2<f32>, b: ArrayView2<f32>) -> Result<Array2<f32>>;
    /// Resamples every plane of an NCHW batch through the inverse transform of its sample.
    fn warp_affine(
        &self,
        batch: ArrayView4<f32>,
        transforms: &[AffineTransform],
        interpolation: Interpolation,
    ) -> Result<Array4<f32>>;
}

/// Resolves the compute backend for a device spec. Requesting an accelerator that is not present
/// fails with `DeviceUnavailable`; there is no fallback to the host.
pub fn resolve_compute(spec: DeviceSpec) -> Result<Box<dyn Compute>> {
    match spec.accelerators {
        0 => Ok(Box::new(HostCompute)),
        1 => accelerator(spec.device),
        n => Err(BenchError::device_unavailable(
            spec.device,
            format!("{} accelerators requested, only a single one is supported", n),
        )),
    }
}

#[cfg(feature = "opencl")]
fn accelerator(device: Device) -> Result<Box<dyn Compute>> {
    Ok(Box::new(ClCompute::new(device)?))
}

#[cfg(not(feature = "opencl"))]
fn accelerator(device: Device) -> Result<Box<dyn Compute>> {
    Err(BenchError::device_unavailable(
        device,
        "built without the `opencl` feature",
    ))
}

pub(crate) fn check_gemm_dims(a: &ArrayView2<f32>, b: &ArrayView2<f32>) -> Result<()> {
    if a.ncols() != b.nrows() {
        return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
    }
    Ok(())
}

pub(crate) fn check_warp_dims(batch: &ArrayView4<f32>, transforms: &[AffineTransform]) -> Result<()> {
    if batch.len_of(ndarray::Axis(0)) != transforms.len() {
        return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
    }
    Ok(())
}
