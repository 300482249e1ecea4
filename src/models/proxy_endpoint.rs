use std::fmt;
use std::str::FromStr;

use crate::error::BenchError;

/// Wire protocol a proxy speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Https,
    Socks5,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Socks5 => "socks",
        }
    }
}

impl FromStr for Protocol {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            "socks" | "socks5" => Ok(Protocol::Socks5),
            other => Err(BenchError::Config(format!(
                "unsupported protocol: {}",
                other
            ))),
        }
    }
}

/// One configured proxy server.
///
/// Parsed from `protocol:host:port:user:pass:status`. The same
/// six-field form is the identity used to key metrics, so two
/// endpoints are the same proxy iff their `Display` output matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpoint {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub enabled: bool,
}

impl ProxyEndpoint {
    /// `host:port`, as dialed by the latency probe.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }

    /// Metrics key for this endpoint.
    pub fn identity(&self) -> String {
        self.to_string()
    }
}

impl FromStr for ProxyEndpoint {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 6 {
            return Err(BenchError::Config(format!(
                "invalid proxy format: {}",
                s
            )));
        }

        let protocol = parts[0].parse::<Protocol>()?;

        let host = parts[1].trim();
        if host.is_empty() {
            return Err(BenchError::Config(format!(
                "empty host in proxy: {}",
                s
            )));
        }

        let port = parts[2].parse::<u16>().map_err(|e| {
            BenchError::Config(format!(
                "invalid port '{}' in proxy {}: {}",
                parts[2], s, e
            ))
        })?;

        Ok(ProxyEndpoint {
            protocol,
            host: host.to_string(),
            port,
            username: parts[3].to_string(),
            password: parts[4].to_string(),
            enabled: parts[5] == "enabled",
        })
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}",
            self.protocol.as_str(),
            self.host,
            self.port,
            self.username,
            self.password,
            if self.enabled { "enabled" } else { "disabled" }
        )
    }
}
