use std::future::Future;
use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{Duration, Instant, timeout_at};
use tracing::debug;

use super::scanner::ResponseScanner;
use super::transport::Connector;
use super::{ProbeOutcome, ProbeResult};
use crate::util::Target;

pub const USER_AGENT: &str = "http_ping";

// Deadline used when the configured timeout overflows the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);
const READ_CHUNK: usize = 8 * 1024;

/// A formatted HTTP request, built once and replayed on every probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request(Vec<u8>);

impl Request {
    /// `via_proxy` switches to an HTTP/1.0 request line carrying the
    /// absolute URI, as forward proxies expect.
    pub fn new(target: &Target, method: &str, vhost: Option<&str>, via_proxy: bool) -> Self {
        let request_line = if via_proxy {
            format!(
                "{method} {}://{}:{}{} HTTP/1.0\r\n",
                target.scheme.as_str(),
                target.host_header(),
                target.port,
                target.path
            )
        } else {
            format!("{method} {} HTTP/1.1\r\n", target.path)
        };
        let host = match vhost {
            Some(vhost) => vhost.to_string(),
            None => target.host_header(),
        };
        let request = format!(
            "{request_line}Host: {host}\r\nUser-Agent: {USER_AGENT}\r\nConnection: Close\r\n\r\n"
        );
        Self(request.into_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Why a probe stopped before completing.
enum Abort {
    TimedOut,
    Failed(ProbeOutcome, io::Error),
}

/// Run one blocking step under the probe deadline.
async fn within<T>(
    deadline: Instant,
    outcome: ProbeOutcome,
    step: impl Future<Output = io::Result<T>>,
) -> Result<T, Abort> {
    match timeout_at(deadline, step).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Abort::Failed(outcome, e)),
        Err(_) => Err(Abort::TimedOut),
    }
}

struct Timeline {
    connected_at: Instant,
    first_byte_at: Instant,
    finished_at: Instant,
    bytes: u64,
}

/// Executes single timed request/response round trips.
pub struct HttpProber<C> {
    connector: C,
    request: Request,
    timeout: Duration,
}

impl<C: Connector> HttpProber<C> {
    pub fn new(connector: C, request: Request, timeout: Duration) -> Self {
        Self {
            connector,
            request,
            timeout,
        }
    }

    /// Run one probe. Never fails: every problem is folded into the
    /// returned outcome.
    pub async fn probe(&self) -> ProbeResult {
        let started_at = Instant::now();
        let deadline = started_at
            .checked_add(self.timeout)
            .unwrap_or_else(|| started_at + FAR_FUTURE);

        match self.exchange(deadline).await {
            Ok(timeline) => ProbeResult {
                outcome: ProbeOutcome::Completed,
                started_at,
                connected_at: Some(timeline.connected_at),
                first_byte_at: Some(timeline.first_byte_at),
                finished_at: Some(timeline.finished_at),
                bytes: timeline.bytes,
                error: None,
            },
            Err(Abort::TimedOut) => {
                debug!(timeout = ?self.timeout, "probe deadline elapsed");
                ProbeResult::timed_out(started_at)
            }
            Err(Abort::Failed(outcome, e)) => {
                debug!(%outcome, error = %e, "probe failed");
                ProbeResult::failed(outcome, started_at, e)
            }
        }
    }

    async fn exchange(&self, deadline: Instant) -> Result<Timeline, Abort> {
        // The stream is dropped, and the connection closed, on every return.
        let mut stream = within(
            deadline,
            ProbeOutcome::ConnectFailed,
            self.connector.connect(),
        )
        .await?;
        let connected_at = Instant::now();

        within(
            deadline,
            ProbeOutcome::WriteFailed,
            stream.write_all(self.request.as_bytes()),
        )
        .await?;

        let mut scanner = ResponseScanner::new();
        let mut buf = vec![0u8; READ_CHUNK];
        let mut first_byte_at = None;
        loop {
            let read = async {
                match stream.read(&mut buf).await {
                    // TLS peers often close without close_notify.
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
                    other => other,
                }
            };
            let n = within(deadline, ProbeOutcome::ReadFailed, read).await?;
            let now = Instant::now();
            let first = *first_byte_at.get_or_insert(now);

            if n == 0 || scanner.feed(&buf[..n]).complete {
                debug!(
                    bytes = scanner.body_bytes(),
                    content_length = ?scanner.content_length(),
                    peer_closed = n == 0,
                    "response finished"
                );
                return Ok(Timeline {
                    connected_at,
                    first_byte_at: first,
                    finished_at: Instant::now(),
                    bytes: scanner.body_bytes(),
                });
            }
        }
    }
}
