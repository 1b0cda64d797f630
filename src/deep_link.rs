//! Deep-link listener
//!
//! The provider's callback page bounces the browser to `<scheme>://oauth?...`,
//! which the OS delivers to the app either as its launch URL (cold start) or
//! as a live event (warm). [`DeepLinkListener`] reads both from a host
//! [`DeepLinkSource`] and pushes matching URLs into the coordinator's queue.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::callback;
use crate::coordinator::SignalSender;
use crate::types::{CallbackEvent, CallbackSource};
use crate::utils::redact_url;

/// Host binding to the OS URL-open events
#[async_trait]
pub trait DeepLinkSource: Send + Sync {
    /// URL the process was launched with, if any
    async fn initial_url(&self) -> Option<String>;

    /// Live stream of URLs opened while the process runs
    fn subscribe(&self) -> BoxStream<'static, String>;
}

/// [`DeepLinkSource`] fed through an in-process channel
///
/// Suitable for hosts that already receive URLs on their own event loop, and
/// for tests.
pub struct ChannelDeepLinkSource {
    initial: Mutex<Option<String>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

impl ChannelDeepLinkSource {
    /// Create a source and the sender hosts push URLs into
    #[must_use]
    pub fn new(initial_url: Option<String>) -> (Self, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            initial: Mutex::new(initial_url),
            rx: Mutex::new(Some(rx)),
        };
        (source, tx)
    }
}

#[async_trait]
impl DeepLinkSource for ChannelDeepLinkSource {
    async fn initial_url(&self) -> Option<String> {
        // The launch URL is delivered once per process
        self.initial.lock().ok()?.take()
    }

    fn subscribe(&self) -> BoxStream<'static, String> {
        let rx = self.rx.lock().ok().and_then(|mut rx| rx.take());
        async_stream::stream! {
            if let Some(mut rx) = rx {
                while let Some(url) = rx.recv().await {
                    yield url;
                }
            }
        }
        .boxed()
    }
}

/// Which URLs count as callbacks for this app
#[derive(Debug, Clone)]
pub struct CallbackFilter {
    callback_url: String,
    scheme: String,
}

impl CallbackFilter {
    /// Match the custom `scheme` and anything under `callback_url`
    pub fn new(callback_url: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self {
            callback_url: callback_url.into(),
            scheme: scheme.into(),
        }
    }

    /// Whether `url` should be forwarded
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        callback::matches_callback(url, &self.callback_url, &self.scheme)
    }
}

/// Running listener task
///
/// Stops when [`stop`](Self::stop) is called, when its token is cancelled,
/// or when dropped.
pub struct DeepLinkListener {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl DeepLinkListener {
    /// Spawn the listener on the current runtime
    pub fn spawn(
        source: Arc<dyn DeepLinkSource>,
        filter: CallbackFilter,
        signals: SignalSender,
        cancel: CancellationToken,
    ) -> Self {
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            Self::run(source, filter, signals, token).await;
        });
        tracing::debug!("Deep-link listener started");
        Self { cancel, task }
    }

    async fn run(
        source: Arc<dyn DeepLinkSource>,
        filter: CallbackFilter,
        signals: SignalSender,
        cancel: CancellationToken,
    ) {
        if let Some(url) = source.initial_url().await {
            if !Self::forward(&filter, &signals, url) {
                return;
            }
        }

        let mut urls = source.subscribe();
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Deep-link listener cancelled");
                    break;
                }
                next = urls.next() => {
                    let Some(url) = next else {
                        tracing::debug!("Deep-link source closed");
                        break;
                    };
                    if !Self::forward(&filter, &signals, url) {
                        break;
                    }
                }
            }
        }
    }

    /// Returns `false` once the coordinator is gone
    fn forward(filter: &CallbackFilter, signals: &SignalSender, url: String) -> bool {
        if !filter.matches(&url) {
            tracing::trace!(url = %redact_url(&url), "Ignoring unrelated deep link");
            return true;
        }

        tracing::debug!(url = %redact_url(&url), "Deep link received");
        signals.deep_link(CallbackEvent::from_url(url, CallbackSource::DeepLink))
    }

    /// Stop listening
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Whether the task is still running
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for DeepLinkListener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
