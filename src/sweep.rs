//! The benchmark sweep: one training epoch for every combination of device, augmentation backend
//! and batch size, visited in that nesting order.

use crate::augment::AugmentationBackend;
use crate::device::Device;
use crate::error::{BenchError, Result};
use crate::profiler::Profiler;
use crate::trainer::EpochTrainer;
use itertools::{iproduct, Itertools};
use std::fmt;

/// Fully determines one run of the sweep.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BenchmarkConfig {
    pub device: Device,
    pub backend: AugmentationBackend,
    pub batch_size: usize,
}

/// The measured epoch time of one configuration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ResultEntry {
    pub config: BenchmarkConfig,
    pub elapsed_seconds: f64,
}

impl ResultEntry {
    pub fn progress_line(&self) -> String {
        format!(
            "## Training device: {} / backend: {} / batch_size: {} took: {} (s)",
            self.config.device,
            self.config.backend,
            self.config.batch_size,
            format_seconds(self.elapsed_seconds)
        )
    }
}

/// Seconds with a decimal point even when whole, e.g. `2.5` and `1.0`.
pub fn format_seconds(seconds: f64) -> String {
    format!("{:?}", seconds)
}

type BatchTimes = Vec<(usize, f64)>;

/// Elapsed seconds keyed by device, then backend, then batch size. Keys keep the order they were
/// first inserted in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultsTable {
    devices: Vec<(Device, Vec<(AugmentationBackend, BatchTimes)>)>,
}

impl ResultsTable {
    pub fn new() -> ResultsTable {
        ResultsTable::default()
    }

    /// Makes sure the grouping for `device` and `backend` exists, even without any entries.
    pub fn add_group(&mut self, device: Device, backend: AugmentationBackend) -> &mut BatchTimes {
        let idx = match self.devices.iter().position(|(d, _)| *d == device) {
            Some(idx) => idx,
            None => {
                self.devices.push((device, Vec::new()));
                self.devices.len() - 1
            }
        };
        let backends = &mut self.devices[idx].1;
        let idx = match backends.iter().position(|(b, _)| *b == backend) {
            Some(idx) => idx,
            None => {
                backends.push((backend, Vec::new()));
                backends.len() - 1
            }
        };
        &mut backends[idx].1
    }

    /// Stores an entry. A second entry for the same configuration replaces the first in place.
    pub fn insert(&mut self, entry: ResultEntry) {
        let BenchmarkConfig {
            device,
            backend,
            batch_size,
        } = entry.config;
        let times = self.add_group(device, backend);
        match times.iter_mut().find(|(size, _)| *size == batch_size) {
            Some((_, elapsed)) => *elapsed = entry.elapsed_seconds,
            None => times.push((batch_size, entry.elapsed_seconds)),
        }
    }

    pub fn get(&self, device: Device, backend: AugmentationBackend, batch_size: usize) -> Option<f64> {
        self.group(device, backend)?
            .iter()
            .find(|(size, _)| *size == batch_size)
            .map(|(_, elapsed)| *elapsed)
    }

    pub fn group(&self, device: Device, backend: AugmentationBackend) -> Option<&[(usize, f64)]> {
        self.devices
            .iter()
            .find(|(d, _)| *d == device)?
            .1
            .iter()
            .find(|(b, _)| *b == backend)
            .map(|(_, times)| times.as_slice())
    }

    /// Every (device, backend) grouping in table order.
    pub fn groups(&self) -> impl Iterator<Item = (Device, AugmentationBackend, &[(usize, f64)])> + '_ {
        self.devices.iter().flat_map(|(device, backends)| {
            backends
                .iter()
                .map(move |(backend, times)| (*device, *backend, times.as_slice()))
        })
    }

    pub fn entries(&self) -> Vec<ResultEntry> {
        self.groups()
            .flat_map(|(device, backend, times)| {
                times.iter().map(move |&(batch_size, elapsed_seconds)| ResultEntry {
                    config: BenchmarkConfig {
                        device,
                        backend,
                        batch_size,
                    },
                    elapsed_seconds,
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.groups().map(|(_, _, times)| times.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The nested mapping, e.g. `{cpu: {torchvision: {16: 2.5}}}`.
impl fmt::Display for ResultsTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let devices = self.devices.iter().map(|(device, backends)| {
            let backends = backends.iter().map(|(backend, times)| {
                let times = times
                    .iter()
                    .map(|(size, elapsed)| format!("{}: {}", size, format_seconds(*elapsed)))
                    .join(", ");
                format!("{}: {{{}}}", backend, times)
            });
            format!("{}: {{{}}}", device, backends.format(", "))
        });
        write!(f, "{{{}}}", devices.format(", "))
    }
}

/// The dimensions of a sweep.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepConfig {
    pub devices: Vec<Device>,
    pub backends: Vec<AugmentationBackend>,
    pub batch_sizes: Vec<usize>,
}

impl Default for SweepConfig {
    fn default() -> SweepConfig {
        SweepConfig {
            devices: vec![Device::Cpu, Device::Gpu],
            backends: vec![AugmentationBackend::Kornia, AugmentationBackend::Torchvision],
            batch_sizes: vec![16, 32, 64, 128, 256, 512, 1028, 2048],
        }
    }
}

impl SweepConfig {
    /// Parses device and backend names, failing on the first one that is not recognized.
    pub fn from_names(devices: &[&str], backends: &[&str], batch_sizes: &[usize]) -> Result<SweepConfig> {
        let config = SweepConfig {
            devices: devices.iter().map(|d| d.parse::<Device>()).collect::<Result<_>>()?,
            backends: backends
                .iter()
                .map(|b| b.parse::<AugmentationBackend>())
                .collect::<Result<_>>()?,
            batch_sizes: batch_sizes.to_vec(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        fn check<T: Eq + std::hash::Hash>(values: &[T], what: &str) -> Result<()> {
            if values.is_empty() {
                return Err(BenchError::InvalidConfig(format!("no {} given", what)));
            }
            if !values.iter().all_unique() {
                return Err(BenchError::InvalidConfig(format!("duplicate {}", what)));
            }
            Ok(())
        }
        check(&self.devices, "devices")?;
        check(&self.backends, "backends")?;
        check(&self.batch_sizes, "batch sizes")?;
        if self.batch_sizes.contains(&0) {
            return Err(BenchError::InvalidConfig("batch sizes must be positive".to_owned()));
        }
        Ok(())
    }

    /// Every configuration of the sweep, devices outermost and batch sizes innermost.
    pub fn configs(&self) -> Vec<BenchmarkConfig> {
        iproduct!(
            self.devices.iter().copied(),
            self.backends.iter().copied(),
            self.batch_sizes.iter().copied()
        )
        .map(|(device, backend, batch_size)| BenchmarkConfig {
            device,
            backend,
            batch_size,
        })
        .collect()
    }
}

/// Builds the model trained by one run of the sweep.
pub trait ModelFactory {
    type Model;
    fn construct(&self, batch_size: usize, backend: AugmentationBackend) -> Result<Self::Model>;
}

pub struct Sweep<F, T> {
    config: SweepConfig,
    factory: F,
    trainer: T,
}

impl<F, T> Sweep<F, T>
where
    F: ModelFactory,
    T: EpochTrainer<F::Model>,
{
    pub fn new(config: SweepConfig, factory: F, trainer: T) -> Result<Sweep<F, T>> {
        config.validate()?;
        Ok(Sweep {
            config,
            factory,
            trainer,
        })
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Trains every configuration for one epoch, printing a progress line after each. The first
    /// error aborts the sweep.
    pub fn run(&mut self) -> Result<ResultsTable> {
        self.run_with(|entry| println!("{}", entry.progress_line()))
    }

    /// Like `run`, handing every finished entry to `on_result` instead of printing it.
    pub fn run_with<C: FnMut(&ResultEntry)>(&mut self, mut on_result: C) -> Result<ResultsTable> {
        let configs = self.config.configs();
        info!("Sweeping {} configurations", configs.len());
        let mut table = ResultsTable::new();
        for config in configs {
            debug!("Starting {:?}", config);
            let mut model = self.factory.construct(config.batch_size, config.backend)?;
            let mut profiler = Profiler::new();
            self.trainer
                .run_one_epoch(&mut model, config.device.spec(), &mut profiler)?;
            let entry = ResultEntry {
                config,
                elapsed_seconds: profiler.total_seconds(),
            };
            on_result(&entry);
            table.insert(entry);
        }
        Ok(table)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(device: Device, backend: AugmentationBackend, batch_size: usize, elapsed: f64) -> ResultEntry {
        ResultEntry {
            config: BenchmarkConfig {
                device,
                backend,
                batch_size,
            },
            elapsed_seconds: elapsed,
        }
    }

    #[test]
    fn table_keeps_insertion_order() {
        let mut table = ResultsTable::new();
        table.insert(entry(Device::Gpu, AugmentationBackend::Kornia, 32, 1.));
        table.insert(entry(Device::Cpu, AugmentationBackend::Torchvision, 16, 2.));
        table.insert(entry(Device::Gpu, AugmentationBackend::Kornia, 16, 3.));
        assert_eq!(
            table
                .entries()
                .iter()
                .map(|e| e.config.batch_size)
                .collect::<Vec<_>>(),
            vec![32, 16, 16]
        );
        assert_eq!(table.get(Device::Gpu, AugmentationBackend::Kornia, 16), Some(3.));
        assert_eq!(table.get(Device::Cpu, AugmentationBackend::Kornia, 16), None);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn reinserting_a_configuration_replaces_it() {
        let mut table = ResultsTable::new();
        table.insert(entry(Device::Cpu, AugmentationBackend::Kornia, 16, 1.));
        table.insert(entry(Device::Cpu, AugmentationBackend::Kornia, 16, 4.));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(Device::Cpu, AugmentationBackend::Kornia, 16), Some(4.));
    }

    #[test]
    fn table_displays_as_nested_mapping() {
        let mut table = ResultsTable::new();
        table.insert(entry(Device::Cpu, AugmentationBackend::Torchvision, 16, 2.5));
        table.insert(entry(Device::Cpu, AugmentationBackend::Torchvision, 32, 1.));
        table.insert(entry(Device::Gpu, AugmentationBackend::Kornia, 16, 0.25));
        assert_eq!(
            table.to_string(),
            "{cpu: {torchvision: {16: 2.5, 32: 1.0}}, gpu: {kornia: {16: 0.25}}}"
        );
        assert_eq!(ResultsTable::new().to_string(), "{}");
    }

    #[test]
    fn progress_line_names_the_configuration() {
        let line = entry(Device::Cpu, AugmentationBackend::Kornia, 64, 12.).progress_line();
        assert_eq!(
            line,
            "## Training device: cpu / backend: kornia / batch_size: 64 took: 12.0 (s)"
        );
    }

    #[test]
    fn configs_nest_device_backend_batch_size() {
        let config = SweepConfig::from_names(&["cpu", "gpu"], &["kornia", "torchvision"], &[16, 32]).unwrap();
        let configs = config.configs();
        assert_eq!(configs.len(), 8);
        assert_eq!(
            configs[..3]
                .iter()
                .map(|c| (c.device, c.backend, c.batch_size))
                .collect::<Vec<_>>(),
            vec![
                (Device::Cpu, AugmentationBackend::Kornia, 16),
                (Device::Cpu, AugmentationBackend::Kornia, 32),
                (Device::Cpu, AugmentationBackend::Torchvision, 16),
            ]
        );
        assert_eq!(configs[7].device, Device::Gpu);
    }

    #[test]
    fn default_sweep_covers_the_full_grid() {
        let config = SweepConfig::default();
        config.validate().unwrap();
        assert_eq!(config.configs().len(), 2 * 2 * 8);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(matches!(
            SweepConfig::from_names(&["cpu"], &["albumentations"], &[16]),
            Err(BenchError::UnsupportedBackend(_))
        ));
        assert!(matches!(
            SweepConfig::from_names(&["tpu"], &["kornia"], &[16]),
            Err(BenchError::UnsupportedDevice(_))
        ));
        for (devices, batch_sizes) in vec![
            (vec![], vec![16]),
            (vec!["cpu"], vec![]),
            (vec!["cpu"], vec![0]),
            (vec!["cpu", "cpu"], vec![16]),
            (vec!["cpu"], vec![16, 16]),
        ] {
            assert!(matches!(
                SweepConfig::from_names(&devices, &["kornia"], &batch_sizes),
                Err(BenchError::InvalidConfig(_))
            ));
        }
    }
}
