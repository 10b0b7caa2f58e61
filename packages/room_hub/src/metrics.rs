//! Hub metrics for observability
//!
//! Lock-free counters updated from connection tasks and the fan-out path.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Hub-wide counters
#[derive(Debug, Default)]
pub struct HubMetrics {
    // Connection metrics
    /// Currently joined connections
    pub active_connections: AtomicU64,
    /// Total joins since start
    pub total_connections: AtomicU64,

    // Fan-out metrics
    /// Frames handed to a connection's outbound queue
    pub frames_delivered: AtomicU64,
    /// Frames dropped because the peer's queue was closed or full
    pub frames_dropped: AtomicU64,
    /// Opaque application messages relayed to a room
    pub messages_relayed: AtomicU64,
    /// Rename / ready-toggle updates applied
    pub presence_updates: AtomicU64,

    // Directory metrics
    /// Successful occupancy writes
    pub directory_writes: AtomicU64,
    /// Occupancy writes that failed after every retry
    pub directory_failures: AtomicU64,
    /// Individual retry attempts
    pub directory_retries: AtomicU64,

    start_time: Option<Instant>,
}

impl HubMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn frames_delivered(&self, n: u64) {
        self.frames_delivered.fetch_add(n, Ordering::Relaxed);
    }

    pub fn frames_dropped(&self, n: u64) {
        self.frames_dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn message_relayed(&self) {
        self.messages_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn presence_updated(&self) {
        self.presence_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn directory_write(&self) {
        self.directory_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn directory_failure(&self) {
        self.directory_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn directory_retry(&self) {
        self.directory_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
            },
            frames: FrameMetrics {
                delivered: self.frames_delivered.load(Ordering::Relaxed),
                dropped: self.frames_dropped.load(Ordering::Relaxed),
                relayed: self.messages_relayed.load(Ordering::Relaxed),
                presence_updates: self.presence_updates.load(Ordering::Relaxed),
            },
            directory: DirectoryMetrics {
                writes: self.directory_writes.load(Ordering::Relaxed),
                failures: self.directory_failures.load(Ordering::Relaxed),
                retries: self.directory_retries.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub frames: FrameMetrics,
    pub directory: DirectoryMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub delivered: u64,
    pub dropped: u64,
    pub relayed: u64,
    pub presence_updates: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryMetrics {
    pub writes: u64,
    pub failures: u64,
    pub retries: u64,
}
