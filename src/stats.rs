use std::time::Duration;

use crate::prober::{ProbeOutcome, ProbeResult};

/// Running min/max/sum of one phase over completed probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseStats {
    pub min: Duration,
    pub max: Duration,
    pub sum: Duration,
}

impl Default for PhaseStats {
    fn default() -> Self {
        Self {
            min: Duration::MAX,
            max: Duration::ZERO,
            sum: Duration::ZERO,
        }
    }
}

impl PhaseStats {
    fn observe(&mut self, elapsed: Duration) {
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);
        self.sum = self.sum.saturating_add(elapsed);
    }

    /// Mean over `count` samples, rounded down to the nanosecond.
    pub fn avg(&self, count: u64) -> Option<Duration> {
        if count == 0 {
            return None;
        }
        let nanos = self.sum.as_nanos() / u128::from(count);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub total_bytes: u64,
    pub total: PhaseStats,
    pub connect: PhaseStats,
    pub response: PhaseStats,
    pub data: PhaseStats,
}

impl AggregateStats {
    /// Share of started probes, in whole percent.
    pub fn percent(&self, count: u64) -> u64 {
        if self.started == 0 {
            0
        } else {
            count * 100 / self.started
        }
    }
}

/// Folds probe results into [`AggregateStats`] without keeping them.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    stats: AggregateStats,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one finished probe. `started` moves together with the outcome
    /// counter so `started == completed + failed + timed_out` always holds.
    pub fn record(&mut self, result: &ProbeResult) {
        let stats = &mut self.stats;
        stats.started += 1;
        match result.outcome {
            ProbeOutcome::Completed => match result.phases() {
                Some(phases) => {
                    stats.completed += 1;
                    stats.total_bytes += result.bytes;
                    stats.total.observe(phases.total);
                    stats.connect.observe(phases.connect);
                    stats.response.observe(phases.response);
                    stats.data.observe(phases.data);
                }
                // A completed result always carries its timestamps.
                None => stats.failed += 1,
            },
            ProbeOutcome::ConnectFailed | ProbeOutcome::WriteFailed | ProbeOutcome::ReadFailed => {
                stats.failed += 1;
            }
            ProbeOutcome::TimedOut => stats.timed_out += 1,
        }
    }

    pub fn snapshot(&self) -> AggregateStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn completed(start: Instant, connect_ms: u64, response_ms: u64, data_ms: u64, bytes: u64) -> ProbeResult {
        let connected = start + Duration::from_millis(connect_ms);
        let first_byte = connected + Duration::from_millis(response_ms);
        ProbeResult {
            outcome: ProbeOutcome::Completed,
            started_at: start,
            connected_at: Some(connected),
            first_byte_at: Some(first_byte),
            finished_at: Some(first_byte + Duration::from_millis(data_ms)),
            bytes,
            error: None,
        }
    }

    #[test]
    fn test_three_completed_probes() {
        let start = Instant::now();
        let mut aggregator = StatsAggregator::new();
        aggregator.record(&completed(start, 10, 20, 30, 100));
        aggregator.record(&completed(start, 5, 40, 15, 200));
        aggregator.record(&completed(start, 15, 30, 0, 50));

        let stats = aggregator.snapshot();
        assert_eq!(stats.started, 3);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.total_bytes, 350);

        // totals: 60, 60, 45
        assert_eq!(stats.total.min, Duration::from_millis(45));
        assert_eq!(stats.total.max, Duration::from_millis(60));
        assert_eq!(stats.total.sum, Duration::from_millis(165));
        assert_eq!(stats.total.avg(stats.completed), Some(Duration::from_millis(55)));

        assert_eq!(stats.connect.min, Duration::from_millis(5));
        assert_eq!(stats.connect.max, Duration::from_millis(15));
        assert_eq!(stats.connect.sum, Duration::from_millis(30));
        assert_eq!(stats.connect.avg(3), Some(Duration::from_millis(10)));

        assert_eq!(stats.response.min, Duration::from_millis(20));
        assert_eq!(stats.response.max, Duration::from_millis(40));
        assert_eq!(stats.response.avg(3), Some(Duration::from_millis(30)));

        assert_eq!(stats.data.min, Duration::ZERO);
        assert_eq!(stats.data.max, Duration::from_millis(30));
        assert_eq!(stats.data.sum, Duration::from_millis(45));
        assert_eq!(stats.data.avg(3), Some(Duration::from_millis(15)));

        assert_eq!(stats.started, stats.completed + stats.failed + stats.timed_out);
    }

    #[test]
    fn test_failures_and_timeouts_are_counted_separately() {
        let start = Instant::now();
        let mut aggregator = StatsAggregator::new();
        aggregator.record(&ProbeResult::failed(ProbeOutcome::ConnectFailed, start, "refused"));
        aggregator.record(&ProbeResult::failed(ProbeOutcome::WriteFailed, start, "broken pipe"));
        aggregator.record(&ProbeResult::failed(ProbeOutcome::ReadFailed, start, "reset"));
        aggregator.record(&ProbeResult::timed_out(start));
        aggregator.record(&completed(start, 1, 1, 1, 10));

        let stats = aggregator.snapshot();
        assert_eq!(stats.started, 5);
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.total_bytes, 10);
        assert_eq!(stats.percent(stats.failed), 60);
        assert_eq!(stats.percent(stats.timed_out), 20);
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let mut aggregator = StatsAggregator::new();
        let empty = aggregator.snapshot();
        assert_eq!(empty, AggregateStats::default());
        assert_eq!(empty.total.min, Duration::MAX);
        assert_eq!(empty.total.avg(empty.completed), None);
        assert_eq!(empty.percent(0), 0);

        aggregator.record(&completed(Instant::now(), 2, 3, 4, 1));
        assert_eq!(aggregator.snapshot(), aggregator.snapshot());
        assert_eq!(aggregator.snapshot().started, 1);
    }

    #[test]
    fn test_average_stays_between_min_and_max() {
        let start = Instant::now();
        let mut aggregator = StatsAggregator::new();
        for (c, r, d) in [(1, 1, 1), (1, 1, 1), (2, 1, 1)] {
            aggregator.record(&completed(start, c, r, d, 0));
        }
        let stats = aggregator.snapshot();
        for phase in [stats.total, stats.connect, stats.response, stats.data] {
            let avg = phase.avg(stats.completed).expect("completed probes");
            assert!(phase.min <= avg && avg <= phase.max);
        }
    }
}
