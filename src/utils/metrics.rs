//! Observability and Metrics
//!
//! This module provides metrics collection and observability features
//! for monitoring interception activity and health.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector for one injector instance.
#[derive(Debug)]
pub struct Metrics {
    /// Listening channels instrumented
    pub listeners_instrumented: AtomicU64,
    /// Connections that received codec stages (accept-time or catch-up)
    pub connections_intercepted: AtomicU64,
    /// Connections instrumented by late-bind catch-up specifically
    pub connections_caught_up: AtomicU64,
    /// Per-connection injection failures recovered locally
    pub injection_failures: AtomicU64,
    /// Stale duplicate connections closed during listener attach
    pub duplicates_closed: AtomicU64,
    /// Frames decoded
    pub frames_decoded: AtomicU64,
    /// Frames encoded
    pub frames_encoded: AtomicU64,
    /// Bytes decoded
    pub bytes_decoded: AtomicU64,
    /// Bytes encoded
    pub bytes_encoded: AtomicU64,
    /// Logins completed (identity bound)
    pub logins_completed: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            listeners_instrumented: AtomicU64::new(0),
            connections_intercepted: AtomicU64::new(0),
            connections_caught_up: AtomicU64::new(0),
            injection_failures: AtomicU64::new(0),
            duplicates_closed: AtomicU64::new(0),
            frames_decoded: AtomicU64::new(0),
            frames_encoded: AtomicU64::new(0),
            bytes_decoded: AtomicU64::new(0),
            bytes_encoded: AtomicU64::new(0),
            logins_completed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a listening channel instrumented
    pub fn listener_instrumented(&self) {
        self.listeners_instrumented.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection that received codec stages
    pub fn connection_intercepted(&self) {
        self.connections_intercepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection instrumented by late-bind catch-up.
    /// The interception itself is counted by `connection_intercepted`.
    pub fn connection_caught_up(&self) {
        self.connections_caught_up.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a recovered per-connection injection failure
    pub fn injection_failure(&self) {
        self.injection_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stale duplicate connection closed
    pub fn duplicate_closed(&self) {
        self.duplicates_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame decoded
    pub fn frame_decoded(&self, byte_count: u64) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_decoded.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a frame encoded
    pub fn frame_encoded(&self, byte_count: u64) {
        self.frames_encoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_encoded.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a completed login
    pub fn login_completed(&self) {
        self.logins_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Uptime of this collector
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Take a consistent point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            listeners_instrumented: self.listeners_instrumented.load(Ordering::Relaxed),
            connections_intercepted: self.connections_intercepted.load(Ordering::Relaxed),
            connections_caught_up: self.connections_caught_up.load(Ordering::Relaxed),
            injection_failures: self.injection_failures.load(Ordering::Relaxed),
            duplicates_closed: self.duplicates_closed.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_encoded: self.frames_encoded.load(Ordering::Relaxed),
            bytes_decoded: self.bytes_decoded.load(Ordering::Relaxed),
            bytes_encoded: self.bytes_encoded.load(Ordering::Relaxed),
            logins_completed: self.logins_completed.load(Ordering::Relaxed),
            uptime_secs: self.uptime_secs(),
        }
    }

    /// Log a summary report at info level
    pub fn report(&self) {
        let s = self.snapshot();
        info!(
            listeners = s.listeners_instrumented,
            connections = s.connections_intercepted,
            caught_up = s.connections_caught_up,
            failures = s.injection_failures,
            frames_in = s.frames_decoded,
            frames_out = s.frames_encoded,
            logins = s.logins_completed,
            uptime_secs = s.uptime_secs,
            "Interceptor metrics"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub listeners_instrumented: u64,
    pub connections_intercepted: u64,
    pub connections_caught_up: u64,
    pub injection_failures: u64,
    pub duplicates_closed: u64,
    pub frames_decoded: u64,
    pub frames_encoded: u64,
    pub bytes_decoded: u64,
    pub bytes_encoded: u64,
    pub logins_completed: u64,
    pub uptime_secs: u64,
}
