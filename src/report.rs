// Human-readable output: one line per probe and the end-of-run summary.

use std::fmt::Write;
use std::time::Duration;

use crate::prober::{ProbeOutcome, ProbeResult};
use crate::stats::{AggregateStats, PhaseStats};

fn ms(elapsed: Duration) -> String {
    let value = format!("{:.3}", elapsed.as_secs_f64() * 1000.0);
    let value = value.trim_end_matches('0').trim_end_matches('.');
    value.to_string()
}

/// Line printed for a completed probe, e.g.
/// `1256 bytes from http://example.com/: 38.2 ms (12.1c/20.4r/5.7d)`.
pub fn probe_line(url: &str, result: &ProbeResult) -> Option<String> {
    let phases = result.phases()?;
    Some(format!(
        "{} bytes from {}: {} ms ({}c/{}r/{}d)",
        result.bytes,
        url,
        ms(phases.total),
        ms(phases.connect),
        ms(phases.response),
        ms(phases.data)
    ))
}

/// Diagnostic for a probe that did not complete.
pub fn failure_line(url: &str, result: &ProbeResult) -> Option<String> {
    let what = match result.outcome {
        ProbeOutcome::Completed => return None,
        ProbeOutcome::TimedOut => return Some(format!("{url}: timed out")),
        ProbeOutcome::ConnectFailed => "connect",
        ProbeOutcome::WriteFailed => "write",
        ProbeOutcome::ReadFailed => "read",
    };
    Some(match &result.error {
        Some(error) => format!("{url}: {what} failed - {error}"),
        None => format!("{url}: {what} failed"),
    })
}

pub fn summary(url: &str, method: &str, vhost: Option<&str>, stats: &AggregateStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = match vhost {
        Some(vhost) => writeln!(out, "--- {method} {vhost} {url} http_ping statistics ---"),
        None => writeln!(out, "--- {method} {url} http_ping statistics ---"),
    };
    let _ = writeln!(
        out,
        "{} requests started, {} completed ({}%), {} failures ({}%), {} timeouts ({}%)",
        stats.started,
        stats.completed,
        stats.percent(stats.completed),
        stats.failed,
        stats.percent(stats.failed),
        stats.timed_out,
        stats.percent(stats.timed_out),
    );
    if stats.completed > 0 {
        for (name, phase) in [
            ("total   ", &stats.total),
            ("connect ", &stats.connect),
            ("response", &stats.response),
            ("data    ", &stats.data),
        ] {
            let _ = writeln!(out, "{name} min/avg/max = {}", min_avg_max(phase, stats.completed));
        }
    }
    out
}

fn min_avg_max(phase: &PhaseStats, completed: u64) -> String {
    let avg = phase.avg(completed).unwrap_or_default();
    format!("{}/{}/{} ms", ms(phase.min), ms(avg), ms(phase.max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatsAggregator;
    use tokio::time::Instant;

    fn completed(start: Instant) -> ProbeResult {
        ProbeResult {
            outcome: ProbeOutcome::Completed,
            started_at: start,
            connected_at: Some(start + Duration::from_micros(12_100)),
            first_byte_at: Some(start + Duration::from_micros(32_500)),
            finished_at: Some(start + Duration::from_micros(38_200)),
            bytes: 1256,
            error: None,
        }
    }

    #[test]
    fn test_ms_formatting() {
        assert_eq!(ms(Duration::from_millis(40)), "40");
        assert_eq!(ms(Duration::from_micros(12_100)), "12.1");
        assert_eq!(ms(Duration::from_micros(1_234)), "1.234");
        assert_eq!(ms(Duration::ZERO), "0");
    }

    #[test]
    fn test_probe_line() {
        let line = probe_line("http://example.com/", &completed(Instant::now()));
        assert_eq!(
            line.as_deref(),
            Some("1256 bytes from http://example.com/: 38.2 ms (12.1c/20.4r/5.7d)")
        );
        assert!(probe_line("u", &ProbeResult::timed_out(Instant::now())).is_none());
    }

    #[test]
    fn test_failure_lines() {
        let now = Instant::now();
        assert_eq!(
            failure_line("http://x/", &ProbeResult::timed_out(now)).as_deref(),
            Some("http://x/: timed out")
        );
        assert_eq!(
            failure_line(
                "http://x/",
                &ProbeResult::failed(ProbeOutcome::ConnectFailed, now, "connection refused")
            )
            .as_deref(),
            Some("http://x/: connect failed - connection refused")
        );
        assert!(failure_line("http://x/", &completed(now)).is_none());
    }

    #[test]
    fn test_summary_with_completed_probes() {
        let mut aggregator = StatsAggregator::new();
        aggregator.record(&completed(Instant::now()));
        aggregator.record(&ProbeResult::timed_out(Instant::now()));

        let text = summary("http://example.com/", "GET", None, &aggregator.snapshot());
        assert!(text.contains("--- GET http://example.com/ http_ping statistics ---"));
        assert!(text.contains(
            "2 requests started, 1 completed (50%), 0 failures (0%), 1 timeouts (50%)"
        ));
        assert!(text.contains("total    min/avg/max = 38.2/38.2/38.2 ms"));
        assert!(text.contains("response min/avg/max = 20.4/20.4/20.4 ms"));
    }

    #[test]
    fn test_summary_without_completed_probes() {
        let mut aggregator = StatsAggregator::new();
        aggregator.record(&ProbeResult::timed_out(Instant::now()));

        let text = summary("http://example.com/", "HEAD", Some("v.test"), &aggregator.snapshot());
        assert!(text.contains("--- HEAD v.test http://example.com/ http_ping statistics ---"));
        assert!(!text.contains("min/avg/max"));
    }
}
