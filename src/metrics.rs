use std::net::SocketAddr;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::info;
use warp::Filter;
use warp::Reply;
use warp::http::StatusCode;

use crate::prober::ProbeResult;

const PHASE_BUCKETS: &[f64] = &[
    0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
];

/// Prometheus view of the probe stream.
#[derive(Clone)]
pub struct ProbeMetrics {
    registry: Registry,
    probes: IntCounterVec,
    phases: HistogramVec,
    body_bytes: IntCounter,
}

impl ProbeMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let probes = IntCounterVec::new(
            Opts::new("http_ping_probes_total", "Probes by outcome"),
            &["outcome"],
        )?;
        let phases = HistogramVec::new(
            HistogramOpts::new(
                "http_ping_phase_milliseconds",
                "Duration of each phase of completed probes in milliseconds",
            )
            .buckets(PHASE_BUCKETS.to_vec()),
            &["phase"],
        )?;
        let body_bytes = IntCounter::new(
            "http_ping_body_bytes_total",
            "Response body bytes received by completed probes",
        )?;

        registry.register(Box::new(probes.clone()))?;
        registry.register(Box::new(phases.clone()))?;
        registry.register(Box::new(body_bytes.clone()))?;

        Ok(Self {
            registry,
            probes,
            phases,
            body_bytes,
        })
    }

    pub fn observe(&self, result: &ProbeResult) {
        self.probes
            .with_label_values(&[result.outcome.label()])
            .inc();

        if let Some(phases) = result.phases() {
            for (phase, elapsed) in [
                ("total", phases.total),
                ("connect", phases.connect),
                ("response", phases.response),
                ("data", phases.data),
            ] {
                self.phases
                    .with_label_values(&[phase])
                    .observe(elapsed.as_secs_f64() * 1000.0);
            }
            self.body_bytes.inc_by(result.bytes);
        }
    }

    /// Text exposition of everything registered.
    pub fn render(&self) -> prometheus::Result<(String, Vec<u8>)> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buf)?;
        Ok((encoder.format_type().to_string(), buf))
    }
}

pub async fn serve_metrics(metrics: ProbeMetrics, addr: SocketAddr) {
    let metrics_route = warp::path!("metrics").map(move || match metrics.render() {
        Ok((content_type, body)) => {
            warp::reply::with_header(body, "Content-Type", content_type).into_response()
        }
        Err(e) => {
            warp::reply::with_status(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
                .into_response()
        }
    });

    info!(%addr, "serving metrics");
    warp::serve(metrics_route).run(addr).await;
}
