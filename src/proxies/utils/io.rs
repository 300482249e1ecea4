use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::models::proxy_endpoint::ProxyEndpoint;
use crate::proxies::common::{ProxyError, Result as ProxyResult};

/// Measures raw connect latency to a proxy.
#[async_trait]
pub trait LatencyProbe: Send + Sync {
    async fn ping(&self, proxy: &ProxyEndpoint) -> ProxyResult<Duration>;
}

/// Times a bare TCP handshake. No protocol bytes are sent.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl LatencyProbe for TcpProbe {
    async fn ping(&self, proxy: &ProxyEndpoint) -> ProxyResult<Duration> {
        let addr = proxy.address();

        let start = Instant::now();
        let stream =
            tokio::time::timeout(self.timeout, TcpStream::connect(&addr))
                .await
                .map_err(|_| ProxyError::Connect {
                    addr: addr.clone(),
                    source: io::ErrorKind::TimedOut.into(),
                })?
                .map_err(|source| ProxyError::Connect {
                    addr: addr.clone(),
                    source,
                })?;
        let elapsed = start.elapsed();

        drop(stream);
        Ok(elapsed)
    }
}
