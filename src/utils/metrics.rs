// src/utils/metrics.rs
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the recognition loop, shared between the pipeline task and
/// anything that wants to report on it.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    cycles_total: AtomicU64,
    capture_failures: AtomicU64,
    matches_total: AtomicU64,
    opens_total: AtomicU64,
    hardware_failures: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capture_failure(&self) {
        self.capture_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_match(&self) {
        self.matches_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_open(&self) {
        self.opens_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hardware_failure(&self) {
        self.hardware_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycles(&self) -> u64 {
        self.cycles_total.load(Ordering::Relaxed)
    }

    pub fn capture_failures(&self) -> u64 {
        self.capture_failures.load(Ordering::Relaxed)
    }

    pub fn matches(&self) -> u64 {
        self.matches_total.load(Ordering::Relaxed)
    }

    pub fn opens(&self) -> u64 {
        self.opens_total.load(Ordering::Relaxed)
    }

    pub fn hardware_failures(&self) -> u64 {
        self.hardware_failures.load(Ordering::Relaxed)
    }
}
