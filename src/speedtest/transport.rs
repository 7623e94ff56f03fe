//! HTTP capability the engine measures through.
//!
//! The engine only needs three request shapes: a streamed GET, a POST with an
//! in-memory body, and a bodiless HEAD. Non-2xx responses are reported as
//! [`TransportError::Status`] so callers never inspect status codes themselves.

use crate::settings::Settings;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use thiserror::Error;

pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait Transport: Send + Sync {
    /// Issue a GET and hand back the response body as a stream.
    fn get_stream<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<BodyStream, TransportError>>;

    /// POST `payload` and wait for the response status.
    fn post<'a>(&'a self, url: &'a str, payload: Vec<u8>) -> BoxFuture<'a, Result<(), TransportError>>;

    /// HEAD request, no body transferred.
    fn head<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<(), TransportError>>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(settings: &Settings) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.request_timeout())
            .connect_timeout(settings.connect_timeout())
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn check_status(response: &reqwest::Response) -> Result<(), TransportError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(TransportError::Status(status.as_u16()))
    }
}

impl Transport for HttpTransport {
    fn get_stream<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<BodyStream, TransportError>> {
        Box::pin(async move {
            let response = self.client.get(url).send().await?;
            check_status(&response)?;
            Ok(response.bytes_stream().map_err(TransportError::from).boxed())
        })
    }

    fn post<'a>(&'a self, url: &'a str, payload: Vec<u8>) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(url)
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(payload)
                .send()
                .await?;
            check_status(&response)
        })
    }

    fn head<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            let response = self.client.head(url).send().await?;
            check_status(&response)
        })
    }
}
