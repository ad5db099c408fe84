//! HTTP(S) handler

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::decode::{DecodeOptions, decode_blocking};
use super::traits::{HandlerError, RequestHandler};
use super::types::{LoadResult, LoadedFrom};
use crate::config::NetworkConfig;
use crate::request::Request;

/// Downloads `http`/`https` URIs and decodes the body.
///
/// Transport failures, non-2xx statuses and non-image bodies are all
/// transient, so the dispatcher may retry them.
pub struct NetworkHandler {
    client: Client,
    options: DecodeOptions,
}

impl NetworkHandler {
    pub fn new(config: &NetworkConfig, options: DecodeOptions) -> Result<Self, HandlerError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| HandlerError::Other(format!("failed to build http client: {e}")))?;

        Ok(Self { client, options })
    }

    async fn download(&self, url: &str) -> Result<Bytes, HandlerError> {
        debug!(url, "Starting download");

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HandlerError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HandlerError::Response(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            check_content_type(content_type)?;
        }

        let limit = self.options.max_alloc;
        if let Some(length) = response.content_length() {
            check_body_size(length, limit)?;
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| HandlerError::Network(format!("failed to read body: {e}")))?
        {
            check_body_size((body.len() + chunk.len()) as u64, limit)?;
            body.extend_from_slice(&chunk);
        }

        debug!(url, size = body.len(), "Download completed");
        Ok(body.freeze())
    }
}

/// Bodies larger than the decode budget are refused before they are buffered.
fn check_body_size(size: u64, limit: Option<u64>) -> Result<(), HandlerError> {
    match limit {
        Some(max) if size > max => Err(HandlerError::OutOfMemory(format!(
            "response body of {size} bytes exceeds limit of {max} bytes"
        ))),
        _ => Ok(()),
    }
}

/// Accepts `image/*` and `application/octet-stream`; anything else is a bad response.
fn check_content_type(content_type: &str) -> Result<(), HandlerError> {
    let parsed: mime::Mime = content_type
        .parse()
        .map_err(|_| HandlerError::Response(format!("malformed content type: {content_type}")))?;

    if parsed.type_() == mime::IMAGE
        || parsed.essence_str() == mime::APPLICATION_OCTET_STREAM.essence_str()
    {
        Ok(())
    } else {
        Err(HandlerError::Response(format!(
            "unexpected content type: {content_type}"
        )))
    }
}

#[async_trait]
impl RequestHandler for NetworkHandler {
    fn name(&self) -> &'static str {
        "network"
    }

    fn can_handle(&self, request: &Request) -> bool {
        request
            .uri()
            .is_some_and(|uri| matches!(uri.scheme(), "http" | "https"))
    }

    async fn load(&self, request: &Request) -> Result<LoadResult, HandlerError> {
        let uri = request
            .uri()
            .ok_or_else(|| HandlerError::Unsupported(request.to_string()))?;
        let body = self.download(uri.as_str()).await?;
        let decoded = decode_blocking(body, request.pixel_format(), self.options).await?;

        Ok(LoadResult::new(Arc::new(decoded.image), LoadedFrom::Network)
            .with_exif_rotation(decoded.exif_rotation))
    }

    fn retryable(&self) -> bool {
        true
    }
}
