use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::models::proxy_endpoint::ProxyEndpoint;

use super::{
    common::Result as ProxyResult,
    transport::{build_client, fetch_body, proxy_url, RequestTransport},
};

/// Tunnels requests through an authenticated SOCKS5 proxy.
///
/// Uses `socks5h`, so the proxy resolves the target hostname.
pub struct Socks5Transport {
    client: Client,
}

#[async_trait]
impl RequestTransport for Socks5Transport {
    async fn perform_request(&self, url: &str) -> ProxyResult<Vec<u8>> {
        fetch_body(&self.client, url).await
    }
}

impl Socks5Transport {
    pub fn new(
        proxy: &ProxyEndpoint,
        timeout: Duration,
    ) -> ProxyResult<Self> {
        let url = proxy_url("socks5h", proxy)?;
        Ok(Self {
            client: build_client(url, timeout)?,
        })
    }
}
