use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

pub mod http;
pub mod scanner;
pub mod transport;

pub use http::{HttpProber, Request};
pub use scanner::{ResponseScanner, ScannerOutcome};
pub use transport::{Connector, TcpConnector, TlsSettings, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeOutcome {
    Completed,
    ConnectFailed,
    WriteFailed,
    ReadFailed,
    TimedOut,
}

impl ProbeOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ProbeOutcome::Completed => "completed",
            ProbeOutcome::ConnectFailed => "connect_failed",
            ProbeOutcome::WriteFailed => "write_failed",
            ProbeOutcome::ReadFailed => "read_failed",
            ProbeOutcome::TimedOut => "timed_out",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ProbeOutcome::ConnectFailed | ProbeOutcome::WriteFailed | ProbeOutcome::ReadFailed
        )
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of a single probe.
///
/// Timestamps after `started_at` are only present for the phases the probe
/// actually reached.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub outcome: ProbeOutcome,
    pub started_at: Instant,
    pub connected_at: Option<Instant>,
    pub first_byte_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    /// Body bytes only.
    pub bytes: u64,
    pub error: Option<String>,
}

/// Elapsed time of the four measured phases of a completed probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phases {
    pub total: Duration,
    pub connect: Duration,
    pub response: Duration,
    pub data: Duration,
}

impl ProbeResult {
    pub fn timed_out(started_at: Instant) -> Self {
        Self {
            outcome: ProbeOutcome::TimedOut,
            started_at,
            connected_at: None,
            first_byte_at: None,
            finished_at: None,
            bytes: 0,
            error: None,
        }
    }

    pub fn failed(outcome: ProbeOutcome, started_at: Instant, error: impl fmt::Display) -> Self {
        Self {
            outcome,
            error: Some(error.to_string()),
            ..Self::timed_out(started_at)
        }
    }

    /// Phase durations, or `None` unless the probe completed.
    pub fn phases(&self) -> Option<Phases> {
        if self.outcome != ProbeOutcome::Completed {
            return None;
        }
        let connected = self.connected_at?;
        let first_byte = self.first_byte_at?;
        let finished = self.finished_at?;
        Some(Phases {
            total: finished.saturating_duration_since(self.started_at),
            connect: connected.saturating_duration_since(self.started_at),
            response: first_byte.saturating_duration_since(connected),
            data: finished.saturating_duration_since(first_byte),
        })
    }
}
