//! Default transport backed by reqwest.

use super::{ProgressSink, Transport};
use crate::deferred::Progress;
use crate::error::{Error, NetworkError, Result};
use crate::headers::Headers;
use crate::payload::SerializedPayload;
use crate::request::SerializedRequest;
use crate::response::RawResponse;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Configuration of the reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// TCP connection timeout.
    pub connect_timeout: Duration,
    /// Maximum idle connections kept per host.
    pub pool_max_idle_per_host: usize,
    /// How long idle pooled connections are kept.
    pub pool_idle_timeout: Duration,
    /// User-Agent header sent when the request sets none.
    pub user_agent: String,
    /// Maximum response body size in bytes; larger bodies fail the
    /// exchange instead of exhausting memory.
    pub max_response_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: concat!("courier-core/", env!("CARGO_PKG_VERSION")).to_owned(),
            max_response_size: 10 * 1024 * 1024,
        }
    }
}

/// [`Transport`] implementation on a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    config: TransportConfig,
}

impl ReqwestTransport {
    /// Creates the transport with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(TransportConfig::default())
    }

    /// Creates the transport from explicit configuration.
    ///
    /// # Errors
    ///
    /// A network error when the underlying client cannot be built.
    pub fn with_config(config: TransportConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .gzip(true)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn read_body(
        &self,
        response: reqwest::Response,
        progress: &ProgressSink,
    ) -> Result<Vec<u8>> {
        let total = response.content_length();
        let max_size = self.config.max_response_size;

        if let Some(length) = total {
            if length > max_size as u64 {
                warn!(length, max_size, "response exceeds size limit (Content-Length)");
                return Err(NetworkError::InvalidResponse(format!(
                    "response size {length} bytes exceeds limit {max_size} bytes"
                ))
                .into());
            }
        }

        let mut stream = response.bytes_stream();
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                error!(error = %e, "failed to read response chunk");
                Error::from(NetworkError::Io(format!("failed to read response chunk: {e}")))
            })?;
            if body.len() + chunk.len() > max_size {
                warn!(max_size, "response exceeds size limit during streaming");
                return Err(NetworkError::InvalidResponse(format!(
                    "response exceeds limit {max_size} bytes (streaming)"
                ))
                .into());
            }
            body.extend_from_slice(&chunk);
            progress.download(Progress::new(body.len() as u64, total));
        }
        Ok(body)
    }
}

fn to_header_map(headers: &Headers) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for header in headers {
        let name = HeaderName::from_bytes(header.name().as_bytes()).map_err(|e| {
            Error::configuration(format!("invalid header name `{}`: {e}", header.name()))
        })?;
        let value = HeaderValue::from_str(header.value()).map_err(|e| {
            Error::configuration(format!("invalid value for header `{}`: {e}", header.name()))
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

fn from_header_map(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        match value.to_str() {
            Ok(value) => headers.set(name.as_str(), value),
            Err(_) => warn!(header = name.as_str(), "dropping non-UTF-8 header value"),
        }
    }
    headers
}

fn classify(error: reqwest::Error) -> Error {
    if error.is_connect() {
        NetworkError::ConnectionFailed(error.to_string()).into()
    } else if error.is_request() || error.is_body() || error.is_decode() {
        NetworkError::Io(error.to_string()).into()
    } else {
        NetworkError::ConnectionFailed(error.to_string()).into()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(
        name = "transport_send",
        skip_all,
        fields(method = %request.method(), uri = %request.uri())
    )]
    async fn send(
        &self,
        request: &SerializedRequest,
        progress: ProgressSink,
    ) -> Result<RawResponse> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.uri().clone())
            .headers(to_header_map(request.headers())?);

        let body_len = request.body().len() as u64;
        builder = match request.body() {
            SerializedPayload::Absent => builder,
            SerializedPayload::Text(text) => builder.body(text.clone()),
            SerializedPayload::Bytes(bytes) => builder.body(bytes.clone()),
        };

        let response = builder.send().await.map_err(|e| {
            error!(error = %e, "request send failed");
            classify(e)
        })?;

        if body_len > 0 {
            // reqwest exposes no mid-write hook; report completion once
            // the request has gone out.
            progress.upload(Progress::new(body_len, Some(body_len)));
        }

        let status = response.status();
        let headers = from_header_map(response.headers());
        let body = self.read_body(response, &progress).await?;

        debug!(
            status = status.as_u16(),
            bytes = body.len(),
            "response received"
        );

        let payload = if body.is_empty() {
            SerializedPayload::Absent
        } else {
            match String::from_utf8(body) {
                Ok(text) => SerializedPayload::Text(text),
                Err(err) => SerializedPayload::Bytes(err.into_bytes()),
            }
        };

        Ok(RawResponse::new(status, headers, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_default_config() {
        let transport = ReqwestTransport::new();
        assert!(transport.is_ok());
    }

    #[test]
    fn header_conversion_round_trips() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "application/json");
        headers.set("X-Custom", "value");
        let map = to_header_map(&headers).unwrap();
        let back = from_header_map(&map);
        assert_eq!(back.get("content-type"), Some("application/json"));
        assert_eq!(back.get("x-custom"), Some("value"));
    }

    #[test]
    fn invalid_header_name_is_a_configuration_fault() {
        let mut headers = Headers::new();
        headers.set("bad header\n", "x");
        let err = to_header_map(&headers).unwrap_err();
        assert!(err.as_configuration().is_some());
    }
}
