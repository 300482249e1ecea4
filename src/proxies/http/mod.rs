use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::models::proxy_endpoint::ProxyEndpoint;

use super::{
    common::Result as ProxyResult,
    transport::{build_client, fetch_body, proxy_url, RequestTransport},
};

/// Forwards requests through an HTTP(S) proxy.
///
/// Both `http` and `https` endpoints are reached over a plain HTTP
/// proxy connection; TLS to the target goes through CONNECT.
pub struct HttpTransport {
    client: Client,
}

#[async_trait]
impl RequestTransport for HttpTransport {
    async fn perform_request(&self, url: &str) -> ProxyResult<Vec<u8>> {
        fetch_body(&self.client, url).await
    }
}

impl HttpTransport {
    pub fn new(
        proxy: &ProxyEndpoint,
        timeout: Duration,
    ) -> ProxyResult<Self> {
        let url = proxy_url("http", proxy)?;
        Ok(Self {
            client: build_client(url, timeout)?,
        })
    }
}
