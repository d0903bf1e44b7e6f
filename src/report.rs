//! Text rendering of a finished sweep.

use crate::sweep::{format_seconds, ResultsTable};

pub const SEPARATOR: &str = "########";

/// One block per device and backend: a `<backend>-<device>` header, the elapsed seconds of every
/// batch size on its own line, then a separator.
pub fn render(table: &ResultsTable) -> String {
    let mut out = String::new();
    for (device, backend, times) in table.groups() {
        out.push_str(&format!("{}-{}\n", backend, device));
        for (_, elapsed) in times {
            out.push_str(&format_seconds(*elapsed));
            out.push('\n');
        }
        out.push_str(SEPARATOR);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::augment::AugmentationBackend;
    use crate::device::Device;
    use crate::sweep::{BenchmarkConfig, ResultEntry};

    #[test]
    fn empty_table_renders_nothing() {
        assert_eq!(render(&ResultsTable::new()), "");
    }

    #[test]
    fn empty_grouping_still_gets_header_and_separator() {
        let mut table = ResultsTable::new();
        table.add_group(Device::Gpu, AugmentationBackend::Kornia);
        assert_eq!(render(&table), "kornia-gpu\n########\n");
    }

    #[test]
    fn groups_follow_table_order() {
        let mut table = ResultsTable::new();
        for &(device, backend, elapsed) in &[
            (Device::Cpu, AugmentationBackend::Kornia, 3.),
            (Device::Cpu, AugmentationBackend::Torchvision, 0.5),
            (Device::Gpu, AugmentationBackend::Kornia, 1.25),
        ] {
            table.insert(ResultEntry {
                config: BenchmarkConfig {
                    device,
                    backend,
                    batch_size: 16,
                },
                elapsed_seconds: elapsed,
            });
        }
        assert_eq!(
            render(&table),
            "kornia-cpu\n3.0\n########\ntorchvision-cpu\n0.5\n########\nkornia-gpu\n1.25\n########\n"
        );
    }
}
