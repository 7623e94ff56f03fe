#![allow(dead_code)]

use async_stream::stream;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::StreamExt;
use speedprobe::speedtest::{BodyStream, Transport, TransportError};
use speedprobe::Settings;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const DOWNLOAD_URL: &str = "fake://down";
pub const UPLOAD_URL: &str = "fake://up";
pub const JITTER_URL: &str = "fake://jitter";

#[derive(Debug, Clone)]
pub struct DownloadPlan {
    pub status: Option<u16>,
    pub chunks: Option<usize>,
    pub chunk_size: usize,
    pub chunk_delay: Duration,
    pub fail_after: Option<usize>,
}

impl Default for DownloadPlan {
    fn default() -> Self {
        Self {
            status: None,
            chunks: Some(40),
            chunk_size: 8192,
            chunk_delay: Duration::from_millis(50),
            fail_after: None,
        }
    }
}

/// Scripted transport. HEAD results are taken per URL in order; a URL with
/// nothing scripted answers after 10 ms. `None` in a script is a failure.
#[derive(Default)]
pub struct FakeTransport {
    pub download: DownloadPlan,
    pub upload_delay: Duration,
    pub upload_status: Option<u16>,
    pub head_plan: Mutex<HashMap<String, VecDeque<Option<Duration>>>>,
    pub get_calls: AtomicUsize,
    pub post_calls: AtomicUsize,
    pub head_calls: AtomicUsize,
    pub posted_bytes: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            upload_delay: Duration::from_secs(2),
            ..Self::default()
        }
    }

    pub fn with_download(mut self, plan: DownloadPlan) -> Self {
        self.download = plan;
        self
    }

    pub fn with_head(self, url: &str, script: &[Option<u64>]) -> Self {
        self.head_plan.lock().unwrap().insert(
            url.to_string(),
            script.iter().map(|ms| ms.map(Duration::from_millis)).collect(),
        );
        self
    }

    pub fn io_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
            + self.post_calls.load(Ordering::SeqCst)
            + self.head_calls.load(Ordering::SeqCst)
    }
}

impl Transport for FakeTransport {
    fn get_stream<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Result<BodyStream, TransportError>> {
        Box::pin(async move {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            let plan = self.download.clone();
            if let Some(code) = plan.status {
                return Err(TransportError::Status(code));
            }
            let body = stream! {
                let mut sent = 0;
                loop {
                    if plan.chunks.map_or(false, |total| sent >= total) {
                        break;
                    }
                    if plan.fail_after.map_or(false, |limit| sent >= limit) {
                        yield Err(TransportError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset")));
                        break;
                    }
                    tokio::time::sleep(plan.chunk_delay).await;
                    sent += 1;
                    yield Ok(Bytes::from(vec![0xAB; plan.chunk_size]));
                }
            };
            Ok(body.boxed())
        })
    }

    fn post<'a>(&'a self, _url: &'a str, payload: Vec<u8>) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            self.post_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.upload_delay).await;
            match self.upload_status {
                Some(code) => Err(TransportError::Status(code)),
                None => {
                    self.posted_bytes.fetch_add(payload.len(), Ordering::SeqCst);
                    Ok(())
                }
            }
        })
    }

    fn head<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            self.head_calls.fetch_add(1, Ordering::SeqCst);
            let step = self
                .head_plan
                .lock()
                .unwrap()
                .get_mut(url)
                .map(|script| script.pop_front().unwrap_or(Some(Duration::from_millis(10))))
                .unwrap_or(Some(Duration::from_millis(10)));
            match step {
                Some(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(())
                }
                None => Err(TransportError::Status(503)),
            }
        })
    }
}

pub fn settings(ping_urls: &[&str]) -> Settings {
    Settings {
        download_url: DOWNLOAD_URL.to_string(),
        upload_url: UPLOAD_URL.to_string(),
        ping_urls: ping_urls.iter().map(|u| u.to_string()).collect(),
        jitter_url: Some(JITTER_URL.to_string()),
        ..Settings::default()
    }
}
