// Target parsing and address resolution.

use std::net::{IpAddr, SocketAddr};

use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::config::{
    NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts,
};
use url::{Host, Url};

use crate::error::SetupError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// The probed URL, split into the pieces the request and the connection need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// Path plus query, always starting with `/`.
    pub path: String,
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self, SetupError> {
        let url = Url::parse(raw).map_err(|e| SetupError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            _ => return Err(SetupError::UnsupportedScheme(raw.to_string())),
        };

        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => {
                return Err(SetupError::InvalidUrl {
                    url: raw.to_string(),
                    reason: "missing host".to_string(),
                });
            }
        };

        let port = url
            .port_or_known_default()
            .ok_or_else(|| SetupError::UnsupportedScheme(raw.to_string()))?;

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            scheme,
            host,
            port,
            path,
        })
    }

    /// Host as written in a URL or `Host` header, bracketed for IPv6.
    pub fn host_header(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

/// Split `host[:port]`. IPv6 hosts take a port only in brackets
/// (`[::1]:3128`); a bare `::1` is all host.
pub fn parse_host_port(s: &str, default_port: u16) -> (String, u16) {
    if let Some(rest) = s.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail
                .strip_prefix(':')
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(default_port);
            return (host.to_string(), port);
        }
    }
    if s.matches(':').count() > 1 {
        return (s.to_string(), default_port);
    }
    if let Some(idx) = s.rfind(':') {
        if let Ok(port) = s[idx + 1..].parse::<u16>() {
            return (s[..idx].to_string(), port);
        }
    }
    (s.to_string(), default_port)
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

/// Resolves the endpoint once, before any probe runs.
pub enum Resolver {
    /// The operating system's resolver.
    System,
    /// Queries the configured name servers directly.
    Dns(TokioAsyncResolver),
}

impl Resolver {
    pub fn new(dns_servers: &[String]) -> Result<Self, SetupError> {
        if dns_servers.is_empty() {
            return Ok(Resolver::System);
        }

        let mut name_servers = NameServerConfigGroup::new();
        for server in dns_servers {
            let (host, port) = parse_host_port(server, 53);
            let ip: IpAddr = strip_brackets(&host)
                .parse()
                .map_err(|_| SetupError::InvalidDnsServer(server.clone()))?;
            name_servers.push(NameServerConfig {
                socket_addr: SocketAddr::new(ip, port),
                protocol: Protocol::Udp,
                tls_dns_name: None,
                trust_negative_responses: false,
                bind_addr: None,
            });
        }

        let mut opts = ResolverOpts::default();
        opts.attempts = 2;
        let config = ResolverConfig::from_parts(None, vec![], name_servers);
        Ok(Resolver::Dns(TokioAsyncResolver::tokio(config, opts)))
    }

    /// Candidate addresses, IPv4 first, otherwise in resolver order.
    pub async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>, SetupError> {
        let host = strip_brackets(host);
        let resolve_err = |reason: String| SetupError::Resolve {
            host: host.to_string(),
            reason,
        };

        let mut candidates: Vec<SocketAddr> = if let Ok(ip) = host.parse::<IpAddr>() {
            vec![SocketAddr::new(ip, port)]
        } else {
            match self {
                Resolver::System => tokio::net::lookup_host((host, port))
                    .await
                    .map_err(|e| resolve_err(e.to_string()))?
                    .collect(),
                Resolver::Dns(resolver) => resolver
                    .lookup_ip(host)
                    .await
                    .map_err(|e| resolve_err(e.to_string()))?
                    .iter()
                    .map(|ip| SocketAddr::new(ip, port))
                    .collect(),
            }
        };

        if candidates.is_empty() {
            return Err(SetupError::NoAddress(host.to_string()));
        }
        candidates.sort_by_key(|addr| !addr.is_ipv4());
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_defaults() {
        let target = Target::parse("http://example.com").expect("valid url");
        assert_eq!(target.scheme, Scheme::Http);
        assert_eq!(target.host, "example.com");
        assert_eq!(target.port, 80);
        assert_eq!(target.path, "/");
    }

    #[test]
    fn test_parse_https_with_port_path_and_query() {
        let target = Target::parse("https://Example.com:8443/a/b?x=1").expect("valid url");
        assert_eq!(target.scheme, Scheme::Https);
        assert_eq!(target.host, "example.com");
        assert_eq!(target.port, 8443);
        assert_eq!(target.path, "/a/b?x=1");

        let target = Target::parse("https://example.com/").expect("valid url");
        assert_eq!(target.port, 443);
    }

    #[test]
    fn test_parse_ip_hosts() {
        let target = Target::parse("http://127.0.0.1:8080/").expect("valid url");
        assert_eq!(target.host, "127.0.0.1");

        let target = Target::parse("http://[::1]/").expect("valid url");
        assert_eq!(target.host, "::1");
        assert_eq!(target.host_header(), "[::1]");
    }

    #[test]
    fn test_parse_rejects_bad_urls() {
        assert!(matches!(
            Target::parse("ftp://example.com/"),
            Err(SetupError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            Target::parse("example.com"),
            Err(SetupError::InvalidUrl { .. })
        ));
        assert!(matches!(
            Target::parse("http://example.com:99999/"),
            Err(SetupError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_parse_host_port() {
        assert_eq!(parse_host_port("proxy.local", 80), ("proxy.local".to_string(), 80));
        assert_eq!(parse_host_port("proxy.local:3128", 80), ("proxy.local".to_string(), 3128));
        assert_eq!(parse_host_port("proxy.local:abc", 80), ("proxy.local:abc".to_string(), 80));
    }

    #[test]
    fn test_parse_host_port_ipv6() {
        assert_eq!(parse_host_port("::1", 80), ("::1".to_string(), 80));
        assert_eq!(parse_host_port("fe80::1:3128", 80), ("fe80::1:3128".to_string(), 80));
        assert_eq!(parse_host_port("[::1]:3128", 80), ("::1".to_string(), 3128));
        assert_eq!(parse_host_port("[::1]", 80), ("::1".to_string(), 80));
    }

    #[test]
    fn test_invalid_dns_server_is_rejected() {
        assert!(matches!(
            Resolver::new(&["not-an-ip".to_string()]),
            Err(SetupError::InvalidDnsServer(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_ip_literal_skips_lookup() {
        let addrs = Resolver::System.resolve("127.0.0.1", 8080).await.expect("literal");
        assert_eq!(addrs, vec!["127.0.0.1:8080".parse().expect("addr")]);
    }

    #[tokio::test]
    async fn test_resolve_bracketed_ipv6_literal() {
        let addrs = Resolver::System.resolve("[::1]", 3128).await.expect("literal");
        assert_eq!(addrs, vec!["[::1]:3128".parse().expect("addr")]);
    }

    #[tokio::test]
    async fn test_resolve_localhost_prefers_ipv4() {
        let addrs = Resolver::System.resolve("localhost", 80).await.expect("localhost");
        if addrs.iter().any(|a| a.is_ipv4()) {
            assert!(addrs[0].is_ipv4());
        }
    }
}
