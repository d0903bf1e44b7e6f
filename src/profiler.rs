//! Timing of the actions of a training epoch.

use std::time::Instant;

/// One timed occurrence of an action.
#[derive(Clone, Debug, PartialEq)]
pub struct TimingSpan {
    pub label: String,
    /// Seconds, never negative
    pub duration: f64,
}

impl TimingSpan {
    pub fn new<S: Into<String>>(label: S, duration: f64) -> TimingSpan {
        TimingSpan {
            label: label.into(),
            duration: duration.max(0.),
        }
    }
}

/// Records labelled durations in the order they happen.
#[derive(Clone, Debug, Default)]
pub struct Profiler {
    spans: Vec<TimingSpan>,
}

impl Profiler {
    pub fn new() -> Profiler {
        Profiler::default()
    }

    /// Runs `action` and records its wall-clock duration under `label`.
    pub fn profile<T, F: FnOnce() -> T>(&mut self, label: &str, action: F) -> T {
        let start = Instant::now();
        let out = action();
        self.record(label, start.elapsed().as_secs_f64());
        out
    }

    pub fn record<S: Into<String>>(&mut self, label: S, seconds: f64) {
        self.spans.push(TimingSpan::new(label, seconds));
    }

    pub fn spans(&self) -> &[TimingSpan] {
        &self.spans
    }

    pub fn into_spans(self) -> Vec<TimingSpan> {
        self.spans
    }

    /// Durations grouped by label, labels in the order they were first recorded.
    pub fn recorded_durations(&self) -> Vec<(&str, Vec<f64>)> {
        let mut grouped: Vec<(&str, Vec<f64>)> = Vec::new();
        for span in &self.spans {
            match grouped.iter_mut().find(|(label, _)| *label == span.label) {
                Some((_, durations)) => durations.push(span.duration),
                None => grouped.push((span.label.as_str(), vec![span.duration])),
            }
        }
        grouped
    }

    pub fn total_seconds(&self) -> f64 {
        self.spans.iter().map(|s| s.duration).sum()
    }

    /// A plain-text table of calls, mean and total duration per action.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!(
                "{:<20} | {:>8} | {:>12} | {:>12}",
                "Action", "Calls", "Mean (s)", "Total (s)"
            ),
            "-".repeat(61),
        ];
        for (label, durations) in self.recorded_durations() {
            let total: f64 = durations.iter().sum();
            lines.push(format!(
                "{:<20} | {:>8} | {:>12.6} | {:>12.6}",
                label,
                durations.len(),
                total / durations.len() as f64,
                total
            ));
        }
        lines.push(format!(
            "{:<20} | {:>8} | {:>12} | {:>12.6}",
            "Total",
            self.spans.len(),
            "",
            self.total_seconds()
        ));
        lines.join("\n") + "\n"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn durations_are_grouped_in_first_seen_order() {
        let mut profiler = Profiler::new();
        profiler.record("model_forward", 1.);
        profiler.record("get_train_batch", 0.5);
        profiler.record("model_forward", 2.);
        assert_eq!(
            profiler.recorded_durations(),
            vec![("model_forward", vec![1., 2.]), ("get_train_batch", vec![0.5])]
        );
        assert!((profiler.total_seconds() - 3.5).abs() < 1e-12);
    }

    #[test]
    fn profile_returns_the_action_result() {
        let mut profiler = Profiler::new();
        let value = profiler.profile("optimizer_step", || 42);
        assert_eq!(value, 42);
        assert_eq!(profiler.spans().len(), 1);
        assert_eq!(profiler.spans()[0].label, "optimizer_step");
        assert!(profiler.spans()[0].duration >= 0.);
    }

    #[test]
    fn negative_durations_are_clamped() {
        assert_eq!(TimingSpan::new("epoch", -1.).duration, 0.);
    }

    #[test]
    fn empty_profiler_totals_zero() {
        let profiler = Profiler::new();
        assert_eq!(profiler.total_seconds(), 0.);
        assert!(profiler.summary().contains("Total"));
    }

    #[test]
    fn summary_has_a_row_per_action() {
        let mut profiler = Profiler::new();
        profiler.record("model_forward", 1.);
        profiler.record("model_forward", 3.);
        profiler.record("optimizer_step", 0.5);
        let summary = profiler.summary();
        let lines = summary.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 5);
        assert!(lines[2].starts_with("model_forward"));
        assert!(lines[2].contains("2.000000"));
        assert!(lines[4].starts_with("Total"));
        assert!(summary.ends_with('\n'));
    }
}
