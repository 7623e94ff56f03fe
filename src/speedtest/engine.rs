use super::download::DownloadTest;
use super::upload::UploadTest;
use super::{jitter, ping, CancelFlag, Measurement, SpeedUpdate, Transport};
use crate::settings::Settings;
use futures::Stream;
use log::debug;
use std::sync::Arc;

/// Latency, jitter and throughput measurements over one [`Transport`].
///
/// Each engine owns its own cancellation domain. Cancelling one engine has no
/// effect on another, even when both share a transport.
pub struct SpeedTestEngine<T: ?Sized> {
    transport: Arc<T>,
    settings: Arc<Settings>,
    cancel: CancelFlag,
}

impl<T: ?Sized> Clone for SpeedTestEngine<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            settings: Arc::clone(&self.settings),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T: Transport + 'static> SpeedTestEngine<T> {
    pub fn new(transport: T, settings: Settings) -> Self {
        Self::from_shared(Arc::new(transport), settings)
    }
}

impl<T: Transport + ?Sized + 'static> SpeedTestEngine<T> {
    pub fn from_shared(transport: Arc<T>, settings: Settings) -> Self {
        Self {
            transport,
            settings: Arc::new(settings),
            cancel: CancelFlag::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// A handle that can cancel this engine from another task.
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn cancel_test(&self) {
        debug!("Test cancelled");
        self.cancel.cancel();
    }

    /// Clear a previous cancellation. Must be called before each new run.
    pub fn reset_cancellation(&self) {
        debug!("Resetting cancellation flag");
        self.cancel.reset();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn measure_ping(&self) -> Measurement {
        ping::measure_ping(self.transport.as_ref(), &self.settings.ping_urls, &self.cancel).await
    }

    pub async fn measure_jitter(&self) -> Measurement {
        jitter::measure_jitter(
            self.transport.as_ref(),
            self.settings.jitter_url(),
            self.settings.jitter_probes,
            &self.cancel,
        )
        .await
    }

    pub fn measure_download_speed(&self) -> impl Stream<Item = SpeedUpdate> + Send + 'static {
        DownloadTest::new(
            Arc::clone(&self.transport),
            self.settings.download_url.clone(),
            self.settings.chunk_size,
            self.settings.sample_interval(),
            self.cancel.clone(),
        )
        .run()
    }

    pub fn measure_upload_speed(&self) -> impl Stream<Item = SpeedUpdate> + Send + 'static {
        UploadTest::new(
            Arc::clone(&self.transport),
            self.settings.upload_url.clone(),
            self.settings.upload_size_bytes,
            self.cancel.clone(),
        )
        .run()
    }
}
