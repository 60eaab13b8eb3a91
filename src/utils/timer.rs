//! Timer utilities
//!
//! Wall-clock measurement for runs and for the phases of one invocation.

use std::time::{Duration, Instant};

/// Measures one labelled span, logging it when stopped
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    label: String,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            label: label.into(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    /// Stop timer and return elapsed time
    pub fn stop(self) -> Duration {
        let elapsed = self.elapsed();
        tracing::debug!("{}: {}ms", self.label, elapsed.as_millis());
        elapsed
    }
}

/// Stopwatch with lap timing
///
/// The method runner records one lap per phase (initialize, body, cleanup)
/// of a row invocation.
#[derive(Debug)]
pub struct Stopwatch {
    start: Instant,
    laps: Vec<(&'static str, Duration)>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            laps: Vec::new(),
        }
    }

    pub fn lap(&mut self, label: &'static str) {
        self.laps.push((label, self.start.elapsed()));
    }

    pub fn total(&self) -> Duration {
        self.start.elapsed()
    }

    /// Duration of each lap, not cumulative
    pub fn lap_times(&self) -> Vec<(&'static str, Duration)> {
        let mut prev = Duration::ZERO;
        self.laps
            .iter()
            .map(|(label, cumulative)| {
                let lap = cumulative.saturating_sub(prev);
                prev = *cumulative;
                (*label, lap)
            })
            .collect()
    }

    /// Length of the named lap
    pub fn lap_time(&self, label: &str) -> Option<Duration> {
        self.lap_times()
            .into_iter()
            .find(|(l, _)| *l == label)
            .map(|(_, d)| d)
    }

    pub fn format(&self) -> String {
        let mut output = String::new();
        for (label, duration) in self.lap_times() {
            output.push_str(&format!("{}: {}ms ", label, duration.as_millis()));
        }
        output.push_str(&format!("total: {}ms", self.total().as_millis()));
        output
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}
