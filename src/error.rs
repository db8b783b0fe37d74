use thiserror::Error;

/// Errors that stop the tool before the first probe is sent.
///
/// Anything that goes wrong while a probe is running is reported through
/// [`ProbeOutcome`](crate::prober::ProbeOutcome) instead.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unknown protocol - {0}")]
    UnsupportedScheme(String),

    #[error("invalid proxy {0}")]
    InvalidProxy(String),

    #[error("unknown host - {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("no valid address found for host {0}")]
    NoAddress(String),

    #[error("invalid DNS server {0}")]
    InvalidDnsServer(String),

    #[error("invalid TLS server name {0}")]
    ServerName(String),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] rustls::Error),

    #[error("configuration error: {0}")]
    Config(String),
}
