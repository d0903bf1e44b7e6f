//! Whole-sweep scenarios, first with stub collaborators and then with the real classifier.


use crate::augment::AugmentationBackend;
use crate::device::{Device, DeviceSpec};
use crate::error::{BenchError, Result};
use crate::profiler::Profiler;
use crate::report::render;
use crate::sweep::{ModelFactory, ResultsTable, Sweep, SweepConfig};
use crate::trainer::EpochTrainer;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, PartialEq)]
struct StubModel {
    batch_size: usize,
    backend: AugmentationBackend,
}

/// Shared log of what the stubs were asked to do.
type Calls = Rc<RefCell<Vec<String>>>;

struct StubFactory {
    calls: Calls,
}

impl ModelFactory for StubFactory {
    type Model = StubModel;

    fn construct(&self, batch_size: usize, backend: AugmentationBackend) -> Result<StubModel> {
        self.calls
            .borrow_mut()
            .push(format!("construct {} {}", backend, batch_size));
        Ok(StubModel { batch_size, backend })
    }
}

/// Records canned spans per batch size, optionally failing on one device.
struct StubTrainer {
    calls: Calls,
    spans: Vec<(usize, Vec<(&'static str, f64)>)>,
    unavailable: Option<Device>,
}

impl EpochTrainer<StubModel> for StubTrainer {
    fn run_one_epoch(&mut self, model: &mut StubModel, device: DeviceSpec, profiler: &mut Profiler) -> Result<()> {
        self.calls.borrow_mut().push(format!(
            "train {} {} {} on {} accelerators",
            device.device, model.backend, model.batch_size, device.accelerators
        ));
        if self.unavailable == Some(device.device) {
            return Err(BenchError::device_unavailable(device.device, "no accelerator"));
        }
        let spans = self
            .spans
            .iter()
            .find(|(size, _)| *size == model.batch_size)
            .map(|(_, spans)| spans.clone())
            .unwrap_or_else(|| vec![("epoch", 0.)]);
        for (label, seconds) in spans {
            profiler.record(label, seconds);
        }
        Ok(())
    }
}

fn stub_sweep(
    config: SweepConfig,
    spans: Vec<(usize, Vec<(&'static str, f64)>)>,
    unavailable: Option<Device>,
) -> (Sweep<StubFactory, StubTrainer>, Calls) {
    let calls = Calls::default();
    let sweep = Sweep::new(
        config,
        StubFactory {
            calls: calls.clone(),
        },
        StubTrainer {
            calls: calls.clone(),
            spans,
            unavailable,
        },
    )
    .unwrap();
    (sweep, calls)
}

fn run_quietly<F: ModelFactory, T: EpochTrainer<F::Model>>(sweep: &mut Sweep<F, T>) -> Result<ResultsTable> {
    sweep.run_with(|_| ())
}

#[test]
fn single_run_is_reported() {
    let config = SweepConfig::from_names(&["cpu"], &["torchvision"], &[16]).unwrap();
    let (mut sweep, _) = stub_sweep(config, vec![(16, vec![("epoch", 2.5)])], None);
    let table = run_quietly(&mut sweep).unwrap();
    assert_eq!(table.get(Device::Cpu, AugmentationBackend::Torchvision, 16), Some(2.5));
    assert_eq!(render(&table), "torchvision-cpu\n2.5\n########\n");
}

#[test]
fn batch_sizes_are_reported_in_sweep_order() {
    let config = SweepConfig::from_names(&["cpu"], &["torchvision"], &[16, 32]).unwrap();
    let (mut sweep, _) = stub_sweep(
        config,
        vec![(16, vec![("epoch", 1.)]), (32, vec![("epoch", 2.)])],
        None,
    );
    let table = run_quietly(&mut sweep).unwrap();
    assert_eq!(render(&table), "torchvision-cpu\n1.0\n2.0\n########\n");
    assert_eq!(table.to_string(), "{cpu: {torchvision: {16: 1.0, 32: 2.0}}}");
}

#[test]
fn every_span_is_summed() {
    let config = SweepConfig::from_names(&["cpu"], &["kornia"], &[8]).unwrap();
    let spans = vec![("model_forward", 1.), ("optimizer_step", 0.5), ("model_forward", 0.25)];
    let (mut sweep, _) = stub_sweep(config, vec![(8, spans)], None);
    let table = run_quietly(&mut sweep).unwrap();
    assert_eq!(table.get(Device::Cpu, AugmentationBackend::Kornia, 8), Some(1.75));
}

#[test]
fn full_grid_is_visited_in_nesting_order() {
    let config = SweepConfig::from_names(&["cpu", "gpu"], &["kornia", "torchvision"], &[16, 32, 64]).unwrap();
    let (mut sweep, calls) = stub_sweep(config, Vec::new(), None);
    let mut lines = Vec::new();
    let table = sweep.run_with(|entry| lines.push(entry.progress_line())).unwrap();

    assert_eq!(table.len(), 12);
    assert_eq!(lines.len(), 12);
    assert_eq!(
        lines[0],
        "## Training device: cpu / backend: kornia / batch_size: 16 took: 0.0 (s)"
    );
    assert_eq!(
        lines[11],
        "## Training device: gpu / backend: torchvision / batch_size: 64 took: 0.0 (s)"
    );
    let calls = calls.borrow();
    assert_eq!(calls.len(), 24);
    assert_eq!(calls[0], "construct kornia 16");
    assert_eq!(calls[1], "train cpu kornia 16 on 0 accelerators");
    assert_eq!(calls[13], "train gpu kornia 16 on 1 accelerators");
    assert_eq!(
        render(&table).lines().filter(|l| *l == "########").count(),
        4
    );
}

#[test]
fn unavailable_device_aborts_the_sweep() {
    let config = SweepConfig::from_names(&["cpu", "gpu"], &["kornia"], &[16, 32]).unwrap();
    let (mut sweep, calls) = stub_sweep(config, Vec::new(), Some(Device::Gpu));
    match run_quietly(&mut sweep) {
        Err(BenchError::DeviceUnavailable { device, .. }) => assert_eq!(device, Device::Gpu),
        other => panic!("expected DeviceUnavailable, got {:?}", other),
    }
    // Both cpu runs and the first gpu attempt, nothing after it
    assert_eq!(calls.borrow().len(), 6);
}

#[test]
fn unknown_backend_fails_before_training() {
    assert!(matches!(
        SweepConfig::from_names(&["cpu"], &["kornia", "albumentations"], &[16]),
        Err(BenchError::UnsupportedBackend(_))
    ));
}

#[test]
fn sweep_rejects_invalid_configs() {
    let config = SweepConfig {
        devices: vec![Device::Cpu],
        backends: Vec::new(),
        batch_sizes: vec![16],
    };
    let calls = Calls::default();
    let result = Sweep::new(
        config,
        StubFactory {
            calls: calls.clone(),
        },
        StubTrainer {
            calls: calls.clone(),
            spans: Vec::new(),
            unavailable: None,
        },
    );
    assert!(matches!(result, Err(BenchError::InvalidConfig(_))));
}
