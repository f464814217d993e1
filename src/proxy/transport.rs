//! Loopback transport to the sidecar's `/call` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;

use crate::proxy::error::{CallError, Result};
use crate::sidecar::SidecarEndpoint;

/// Ships one encoded request to the emulator and returns the encoded reply.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(
        &self,
        service: &str,
        method: &str,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<Vec<u8>>;
}

/// `POST http://127.0.0.1:<port>/call?s=<service>&m=<method>`.
pub struct HttpTransport {
    client: reqwest::Client,
    call_url: String,
}

impl HttpTransport {
    pub fn new(endpoint: &SidecarEndpoint) -> Self {
        // Loopback only: never route through an environment proxy.
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            call_url: format!("{}/call", endpoint.http_url()),
        }
    }

    pub fn call_url(&self) -> &str {
        &self.call_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn round_trip(
        &self,
        service: &str,
        method: &str,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(&self.call_url)
            .query(&[("s", service), ("m", method)])
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| CallError::transport(service, method, e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CallError::transport(service, method, e))?;

        if status != StatusCode::OK {
            return Err(CallError::NonOkStatus {
                service: service.to_string(),
                method: method.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_url() {
        let endpoint = SidecarEndpoint {
            host: "127.0.0.1".to_string(),
            port: 4321,
            admin_port: 4322,
        };
        let transport = HttpTransport::new(&endpoint);
        assert_eq!(transport.call_url(), "http://127.0.0.1:4321/call");
    }
}
