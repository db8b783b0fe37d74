use http_ping::config::{Args, ProbeConfig};
use http_ping::error::SetupError;
use http_ping::metrics::{ProbeMetrics, serve_metrics};
use http_ping::prober::{HttpProber, ProbeResult, Request, TcpConnector, TlsSettings};
use http_ping::report;
use http_ping::scheduler::Scheduler;
use http_ping::stats::StatsAggregator;
use http_ping::util::{Resolver, Scheme, Target, parse_host_port};

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = ProbeConfig::load(Args::parse())?;
    let notes = config.normalize()?;
    let log_level = config.get_tracing_level()?;

    // Init tracing with configured log level; stdout is reserved for the report
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
                         .add_directive(format!("http_ping={}", log_level.as_str().to_lowercase()).parse()?))
        .init();
    for note in notes {
        warn!("{note}");
    }

    let url = config
        .url
        .clone()
        .ok_or_else(|| SetupError::Config("no URL given".to_string()))?;
    let target = Target::parse(&url)?;

    // Resolve once; an unknown host or proxy is fatal before any probe runs
    let resolver = Resolver::new(&config.dns_servers)?;
    let (host, port) = match &config.proxy {
        Some(proxy) => {
            let (host, port) = parse_host_port(proxy, 80);
            if host.is_empty() {
                return Err(SetupError::InvalidProxy(proxy.clone()).into());
            }
            (host, port)
        }
        None => (target.host.clone(), target.port),
    };
    let candidates = resolver.resolve(&host, port).await?;
    let addr = candidates[0];
    info!(%host, %addr, candidates = candidates.len(), "resolved endpoint");

    // Proxied requests go over plain TCP; the proxy handles the target scheme
    let tls = match (target.scheme, &config.proxy) {
        (Scheme::Https, None) => Some(TlsSettings::new(&target.host)?),
        _ => None,
    };
    let request = Request::new(
        &target,
        config.method(),
        config.vhost.as_deref(),
        config.proxy.is_some(),
    );
    let prober = HttpProber::new(
        TcpConnector::new(addr, config.nagle, tls),
        request,
        config.timeout(),
    );

    let metrics = match config.metrics_addr {
        Some(metrics_addr) => {
            let metrics = ProbeMetrics::new()?;
            tokio::spawn(serve_metrics(metrics.clone(), metrics_addr));
            Some(metrics)
        }
        None => None,
    };

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_termination().await;
        info!("termination requested, finishing current probe");
        let _ = shutdown_tx.send(true);
    });

    let scheduler = Scheduler::new(config.interval(), config.count);
    let mut stats = StatsAggregator::new();
    let quiet = config.quiet;
    scheduler
        .run(
            &mut shutdown_rx,
            || prober.probe(),
            |result: ProbeResult| {
                stats.record(&result);
                if let Some(metrics) = &metrics {
                    metrics.observe(&result);
                }
                if quiet {
                    return;
                }
                if let Some(line) = report::probe_line(&url, &result) {
                    println!("{line}");
                } else if let Some(line) = report::failure_line(&url, &result) {
                    eprintln!("{line}");
                }
            },
        )
        .await;

    print!(
        "{}",
        report::summary(&url, config.method(), config.vhost.as_deref(), &stats.snapshot())
    );
    Ok(())
}

async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
