use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{Config, SSE_DEFAULT_RETRY_MS};
use crate::error::{AppError, Result};
use crate::stream::messages::SseDecoder;
use crate::stream::receiver::{LiveDeltaReceiver, LiveState};

const REFRESH_TIMEOUT_SECS: u64 = 10;

/// Receiver state shared between the owning view and the transport task.
struct Shared {
    receiver: Mutex<LiveDeltaReceiver>,
    state_tx: watch::Sender<LiveState>,
}

impl Shared {
    /// Run a handler under the lock and publish the new state if it changed.
    fn apply(&self, f: impl FnOnce(&mut LiveDeltaReceiver) -> bool) {
        let Ok(mut rx) = self.receiver.lock() else {
            return;
        };
        if f(&mut rx) {
            self.state_tx.send_replace(rx.state());
        }
    }

    fn is_closed(&self) -> bool {
        self.receiver.lock().map(|rx| rx.is_closed()).unwrap_or(true)
    }
}

/// The single live push connection of a dashboard view.
///
/// Owns the transport task; only status and latest sample are exposed.
/// Closing (explicitly or on drop) tears the connection down exactly once.
pub struct LiveStream {
    shared: Arc<Shared>,
    state_rx: watch::Receiver<LiveState>,
    task: Option<JoinHandle<()>>,
    client: reqwest::Client,
    base_url: String,
}

impl LiveStream {
    pub fn open(cfg: &Config) -> Result<Self> {
        // No total timeout: the response body is unbounded.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self::open_with_client(client, cfg.api_url.clone()))
    }

    pub fn open_with_client(client: reqwest::Client, base_url: String) -> Self {
        let (state_tx, state_rx) = watch::channel(LiveState::default());
        let shared = Arc::new(Shared {
            receiver: Mutex::new(LiveDeltaReceiver::new()),
            state_tx,
        });

        let url = format!("{base_url}/stream");
        let task = tokio::spawn(run_transport(Arc::clone(&shared), client.clone(), url));

        Self {
            shared,
            state_rx,
            task: Some(task),
            client,
            base_url,
        }
    }

    pub fn state(&self) -> LiveState {
        *self.state_rx.borrow()
    }

    /// Watch handle that changes whenever status or sample changes.
    pub fn subscribe(&self) -> watch::Receiver<LiveState> {
        self.state_rx.clone()
    }

    /// Ask the backend to recompute eagerly. Returns as soon as the request
    /// is spawned; failures are logged and dropped.
    pub fn trigger_refresh(&self) -> JoinHandle<()> {
        let client = self.client.clone();
        let url = format!("{}/refresh", self.base_url);
        tokio::spawn(async move {
            match client
                .post(&url)
                .timeout(Duration::from_secs(REFRESH_TIMEOUT_SECS))
                .send()
                .await
            {
                Ok(resp) => debug!(status = %resp.status(), "refresh requested"),
                Err(e) => debug!("refresh request failed: {e}"),
            }
        })
    }

    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            self.shared.apply(|rx| {
                rx.close();
                false
            });
            task.abort();
            info!("Live stream closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reconnecting transport. Stands in for the browser's EventSource: on any
/// error or end of stream it reports `disconnected`, waits for the server's
/// retry hint, and reconnects.
async fn run_transport(shared: Arc<Shared>, client: reqwest::Client, url: String) {
    let mut decoder = SseDecoder::new();

    loop {
        shared.apply(|rx| rx.on_connecting());
        info!("Stream connecting to {url}");

        match connect_once(&shared, &client, &url, &mut decoder).await {
            Ok(()) => info!("Stream ended by server"),
            Err(e) => warn!("Stream connection error: {e}"),
        }

        shared.apply(|rx| rx.on_error());
        if shared.is_closed() {
            return;
        }

        let delay_ms = decoder.retry_ms().unwrap_or(SSE_DEFAULT_RETRY_MS);
        debug!("Stream reconnecting in {delay_ms}ms");
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

async fn connect_once(
    shared: &Shared,
    client: &reqwest::Client,
    url: &str,
    decoder: &mut SseDecoder,
) -> Result<()> {
    let mut req = client
        .get(url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .header(reqwest::header::CACHE_CONTROL, "no-cache");
    if let Some(id) = decoder.last_event_id() {
        req = req.header("Last-Event-ID", id);
    }

    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(AppError::DataUnavailable(format!("/stream: HTTP {status}")));
    }

    // Partial frames from a previous connection must not bleed into this one.
    decoder.reset();

    shared.apply(|rx| rx.on_open());

    let mut body = resp.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for event in decoder.feed(&chunk) {
            if event.event != "message" {
                continue;
            }
            shared.apply(|rx| rx.on_message(&event.data));
        }
    }

    Ok(())
}
