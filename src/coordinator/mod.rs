//! Pairing coordinator
//!
//! Owns the [`PairingState`] machine and the only write access to the
//! credential store during a flow. Completion arrives on two paths that can
//! race each other:
//!
//! - the launcher's result object, sent by [`PairingCoordinator::pair`] once
//!   the surface closes
//! - the deep link, sent by the [`DeepLinkListener`] or by the host through
//!   [`PairingCoordinator::handle_callback_url`]
//!
//! Both are producers on one queue drained by a single consumer task. The
//! consumer engages the [`ProcessingGuard`] before its first await, so
//! whichever signal arrives first runs the exchange and every later one is
//! ignored.
//!
//! # Example
//!
//! ```no_run
//! use fitlink_pairing_sdk::coordinator::{PairingComponents, PairingCoordinator};
//! use fitlink_pairing_sdk::launcher::{LauncherSelector, StaticProbe, SystemBrowserLauncher};
//! use fitlink_pairing_sdk::storage::FileCredentialStore;
//! use fitlink_pairing_sdk::types::{PairingOptions, Platform};
//! use std::sync::Arc;
//!
//! # async fn example() -> fitlink_pairing_sdk::Result<()> {
//! let selector = LauncherSelector::new(Platform::Desktop, Arc::new(StaticProbe(false)))
//!     .with_system_browser(Arc::new(SystemBrowserLauncher::new()));
//! let components = PairingComponents::builder()
//!     .store(Arc::new(FileCredentialStore::new()))
//!     .selector(selector)
//!     .build();
//!
//! let coordinator = PairingCoordinator::new(PairingOptions::default(), components)?;
//! coordinator.pair().await?;
//! # Ok(())
//! # }
//! ```

mod guard;
mod signal;

pub use guard::ProcessingGuard;
pub use signal::{CompletionSignal, SignalSender};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use typed_builder::TypedBuilder;

use crate::backend::{AccessTokenExchanger, ConnectionValidator, RequestTokenClient};
use crate::callbacks::{PairingEvent, SharedObserver, TracingObserver};
use crate::deep_link::{CallbackFilter, DeepLinkListener, DeepLinkSource};
use crate::error::{PairingError, Result};
use crate::launcher::{AuthSessionResult, AuthSessionResultType, LauncherKind, LauncherSelector};
use crate::storage::{CredentialStore, SessionVault};
use crate::transport::{HttpFetch, ReqwestFetch};
use crate::types::{CallbackEvent, CallbackSource, PairingOptions, PairingSession, PairingState};
use crate::utils::redact_url;

// ============================================================================
// Construction
// ============================================================================

/// Host-provided collaborators
#[derive(TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for PairingComponents"),
    builder_type(doc = "Builder for PairingComponents", vis = "pub"),
    build_method(doc = "Build the PairingComponents")
)]
pub struct PairingComponents {
    /// Persisted key-value store
    pub store: Arc<dyn CredentialStore>,

    /// Launcher strategies and capability probe
    pub selector: LauncherSelector,

    /// Backend transport; defaults to reqwest with `request_timeout`
    #[builder(default, setter(strip_option))]
    pub fetch: Option<Arc<dyn HttpFetch>>,

    /// Terminal notifications; defaults to logging only
    #[builder(default = Arc::new(TracingObserver) as SharedObserver)]
    pub observer: SharedObserver,

    /// OS deep-link events
    #[builder(default, setter(strip_option))]
    pub deep_links: Option<Arc<dyn DeepLinkSource>>,
}

/// Bookkeeping for the current attempt
#[derive(Default)]
struct Flow {
    attempt: u64,
    session: Option<PairingSession>,
    waiter: Option<oneshot::Sender<Result<()>>>,
    /// Cancelled when the user backs out before the surface opens
    before_launch: CancellationToken,
}

struct Inner {
    options: PairingOptions,
    vault: SessionVault,
    request_tokens: RequestTokenClient,
    exchanger: AccessTokenExchanger,
    validator: ConnectionValidator,
    selector: LauncherSelector,
    observer: SharedObserver,
    guard: ProcessingGuard,
    state: watch::Sender<PairingState>,
    flow: Mutex<Flow>,
    signals: SignalSender,
    deep_link_source: Option<Arc<dyn DeepLinkSource>>,
    listener: Mutex<Option<DeepLinkListener>>,
    cancel: CancellationToken,
}

/// Drives the three-step handshake
pub struct PairingCoordinator {
    inner: Arc<Inner>,
}

impl PairingCoordinator {
    /// Create a coordinator and start its consumer task
    ///
    /// Must be called from within a Tokio runtime. When deep links are
    /// enabled for the platform, the listener starts right away so that a
    /// callback delivered at cold start resumes the persisted session.
    ///
    /// # Errors
    /// Returns `PairingError::InvalidConfig` if `options` do not validate or
    /// the default HTTP client cannot be built
    pub fn new(options: PairingOptions, components: PairingComponents) -> Result<Self> {
        options.validate()?;

        let fetch: Arc<dyn HttpFetch> = match components.fetch {
            Some(fetch) => fetch,
            None => Arc::new(ReqwestFetch::with_timeout(options.request_timeout)?),
        };

        let (signals, signal_rx) = SignalSender::channel();
        let (state, _) = watch::channel(PairingState::Idle);

        let inner = Arc::new(Inner {
            request_tokens: RequestTokenClient::new(fetch.clone(), &options),
            exchanger: AccessTokenExchanger::new(fetch.clone(), &options),
            validator: ConnectionValidator::new(fetch, &options),
            vault: SessionVault::new(components.store),
            selector: components.selector,
            observer: components.observer,
            guard: ProcessingGuard::new(),
            state,
            flow: Mutex::new(Flow::default()),
            signals,
            deep_link_source: components.deep_links,
            listener: Mutex::new(None),
            cancel: CancellationToken::new(),
            options,
        });

        let consumer = inner.clone();
        tokio::spawn(async move {
            consumer.consume(signal_rx).await;
        });

        let listen_at_start = inner
            .options
            .deep_links
            .unwrap_or(!inner.options.platform.overlay_result_is_reliable());
        if listen_at_start {
            inner.ensure_listener();
        }

        Ok(Self { inner })
    }

    /// Run one pairing attempt to completion
    ///
    /// # Errors
    ///
    /// Returns `PairingError::AlreadyInProgress` if a flow is running,
    /// `PairingError::UserCancelled` if the user backed out, or the error that
    /// ended the flow. Every error has already been reported to the observer.
    pub async fn pair(&self) -> Result<()> {
        let (attempt, outcome) = self.inner.begin()?;
        tracing::info!(attempt, "Pairing started");

        if let Err(e) = self.inner.start(attempt).await {
            self.inner.abort_attempt(e).await;
        }

        outcome.await.unwrap_or(Err(PairingError::UserCancelled))
    }

    /// Abandon the running attempt, as if the user had closed the surface
    ///
    /// While the request token is pending, the request is dropped and the
    /// consent surface never opens. While the surface is open, the attempt
    /// settles right away: the state returns to `Idle`, observers get
    /// [`PairingEvent::Reset`] and whatever the surface returns later is
    /// ignored. Closing the surface itself is up to the host; `pair()`
    /// resolves with `UserCancelled` once the launcher returns.
    ///
    /// Has no effect once an exchange is in flight.
    pub fn cancel(&self) {
        let flow = self.inner.flow();
        match self.state() {
            PairingState::RequestingToken => flow.before_launch.cancel(),
            PairingState::AwaitingAuthorization => {
                self.inner.signals.send(CompletionSignal::Cancel {
                    attempt: flow.attempt,
                });
            }
            _ => {}
        }
    }

    /// Feed a callback URL the host received itself
    ///
    /// Returns `true` if the URL matched the callback pattern and was queued.
    pub fn handle_callback_url(&self, url: &str) -> bool {
        let filter = self.inner.callback_filter();
        if !filter.matches(url) {
            tracing::debug!(url = %redact_url(url), "Not a pairing callback");
            return false;
        }
        self.inner
            .signals
            .deep_link(CallbackEvent::from_url(url, CallbackSource::DeepLink))
    }

    /// Producer handle for hosts that run their own listener
    #[must_use]
    pub fn signal_sender(&self) -> SignalSender {
        self.inner.signals.clone()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> PairingState {
        *self.inner.state.borrow()
    }

    /// Observe state changes
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<PairingState> {
        self.inner.state.subscribe()
    }

    /// Whether an exchange is being processed (synchronous view)
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.inner.guard.is_engaged()
    }

    /// Observe the processing flag
    #[must_use]
    pub fn subscribe_processing(&self) -> watch::Receiver<bool> {
        self.inner.guard.subscribe()
    }

    /// Typed access to the credential store
    #[must_use]
    pub fn vault(&self) -> &SessionVault {
        &self.inner.vault
    }

    /// Persisted connection flag
    ///
    /// # Errors
    /// Returns error if the store cannot be read
    pub async fn is_paired(&self) -> Result<bool> {
        Ok(self.inner.vault.is_paired().await?)
    }

    /// Ask the backend and correct the persisted flag
    ///
    /// # Errors
    /// See [`ConnectionValidator::sync_paired_flag`]
    pub async fn validate_connection(&self) -> Result<bool> {
        self.inner
            .validator
            .sync_paired_flag(&self.inner.vault)
            .await
    }

    /// Clear the local connection flag
    ///
    /// # Errors
    /// Returns error if the store cannot be written
    pub async fn unpair(&self) -> Result<()> {
        self.inner.vault.set_paired(false).await?;
        tracing::info!("Local pairing flag cleared");
        Ok(())
    }

    /// Stop the consumer task and the deep-link listener
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(listener) = self.inner.listener().take() {
            listener.stop();
        }
    }
}

impl Drop for PairingCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Flow
// ============================================================================

impl Inner {
    fn flow(&self) -> MutexGuard<'_, Flow> {
        self.flow.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listener(&self) -> MutexGuard<'_, Option<DeepLinkListener>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> PairingState {
        *self.state.borrow()
    }

    fn callback_filter(&self) -> CallbackFilter {
        CallbackFilter::new(&self.options.callback_url, &self.options.deep_link_scheme)
    }

    /// Move to `next` if the transition is legal
    fn transition(&self, next: PairingState) -> bool {
        self.transition_when(next, |_| true)
    }

    /// Move from exactly `expected` to `next`
    fn transition_from(&self, expected: PairingState, next: PairingState) -> bool {
        self.transition_when(next, |current| current == expected)
    }

    fn transition_when(&self, next: PairingState, accept: impl FnOnce(PairingState) -> bool) -> bool {
        let mut from = PairingState::Idle;
        let moved = self.state.send_if_modified(|state| {
            from = *state;
            if accept(*state) && state.can_transition_to(next) {
                *state = next;
                true
            } else {
                false
            }
        });
        if moved {
            tracing::debug!(%from, to = %next, "Pairing state changed");
        }
        moved
    }

    fn ensure_listener(&self) {
        let mut listener = self.listener();
        if listener.as_ref().is_some_and(DeepLinkListener::is_running) {
            return;
        }
        let Some(source) = self.deep_link_source.clone() else {
            tracing::debug!("No deep-link source registered, relying on handle_callback_url");
            return;
        };
        *listener = Some(DeepLinkListener::spawn(
            source,
            self.callback_filter(),
            self.signals.clone(),
            self.cancel.child_token(),
        ));
    }

    /// Enter `RequestingToken` and open a new attempt
    fn begin(&self) -> Result<(u64, oneshot::Receiver<Result<()>>)> {
        if self.guard.is_engaged() {
            return Err(PairingError::AlreadyInProgress);
        }

        let mut flow = self.flow();
        if !self.state().is_stable() || !self.transition(PairingState::RequestingToken) {
            return Err(PairingError::AlreadyInProgress);
        }

        flow.attempt += 1;
        flow.session = None;
        flow.before_launch = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        flow.waiter = Some(tx);
        Ok((flow.attempt, rx))
    }

    /// Everything up to the launcher closing
    async fn start(&self, attempt: u64) -> Result<()> {
        // A session left behind by an abandoned attempt must not be resumed
        self.vault.clear_session().await?;

        let api_key = self
            .vault
            .api_key()
            .await?
            .ok_or(PairingError::NotSignedIn)?;

        let before_launch = {
            let flow = self.flow();
            if flow.attempt != attempt {
                return Ok(());
            }
            flow.before_launch.clone()
        };

        let session = tokio::select! {
            () = before_launch.cancelled() => return Err(PairingError::UserCancelled),
            token = self.request_tokens.request(&api_key) => token?.into_session(),
        };
        self.vault.save_session(&session).await?;

        let token = session.token.clone();
        {
            let mut flow = self.flow();
            if flow.attempt != attempt {
                return Ok(());
            }
            flow.session = Some(session);
        }

        let launcher = self.selector.select()?;
        let deep_links = !launcher.delivers_result() || self.options.deep_links == Some(true);
        if deep_links {
            self.ensure_listener();
        }

        let consent_url = crate::launcher::build_consent_url(
            &self.options.consent_url,
            &token,
            &self.options.callback_url,
        )?;

        {
            // cancel() reads the state under the same lock
            let _flow = self.flow();
            if before_launch.is_cancelled() {
                tracing::debug!("Cancelled before the surface opened");
                return Err(PairingError::UserCancelled);
            }
            if !self.transition(PairingState::AwaitingAuthorization) {
                return Ok(());
            }
        }

        tracing::debug!(launcher = ?launcher.kind(), "Opening authorization surface");
        let result = launcher
            .launch(&consent_url, &self.options.callback_url)
            .await?;

        // The browser hands off immediately; the user still has the whole page ahead
        let grace = deep_links.then(|| match launcher.kind() {
            LauncherKind::SystemBrowser => self.options.authorization_timeout,
            _ => self.options.deep_link_grace,
        });
        self.signals.send(CompletionSignal::Launcher {
            attempt,
            result,
            grace,
        });
        Ok(())
    }

    /// Terminate `pair()`'s own attempt after a local error
    async fn abort_attempt(&self, error: PairingError) {
        let mut processing = self.guard.subscribe();
        loop {
            if self.guard.try_engage() {
                if self.state().is_stable() {
                    // The consumer already settled this attempt
                    self.guard.release();
                    return;
                }
                self.finish(Err(error)).await;
                return;
            }
            if processing.wait_for(|busy| !busy).await.is_err() {
                return;
            }
        }
    }

    // ========================================================================
    // Consumer
    // ========================================================================

    async fn consume(&self, mut signals: mpsc::UnboundedReceiver<CompletionSignal>) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("Pairing consumer stopped");
                    break;
                }
                signal = signals.recv() => {
                    let Some(signal) = signal else { break };
                    self.handle(signal).await;
                }
            }
        }
    }

    async fn handle(&self, signal: CompletionSignal) {
        match signal {
            CompletionSignal::Launcher {
                attempt,
                result,
                grace,
            } => self.on_launcher_result(attempt, result, grace).await,
            CompletionSignal::DeepLink(event) => self.on_callback(event).await,
            CompletionSignal::GraceExpired { attempt } => {
                if self.claim_attempt(attempt, "grace expiry") {
                    tracing::debug!("No deep link within grace period");
                    self.finish(Err(PairingError::UserCancelled)).await;
                }
            }
            CompletionSignal::Cancel { attempt } => {
                if self.claim_attempt(attempt, "cancel") {
                    self.finish(Err(PairingError::UserCancelled)).await;
                }
            }
        }
    }

    /// Engage the guard for a launcher-side signal of the current attempt
    fn claim_attempt(&self, attempt: u64, what: &str) -> bool {
        if self.flow().attempt != attempt {
            tracing::debug!(attempt, "Ignoring {what} from a previous attempt");
            return false;
        }
        if self.state() != PairingState::AwaitingAuthorization {
            tracing::debug!(state = %self.state(), "Ignoring {what}");
            return false;
        }
        if !self.guard.try_engage() {
            tracing::debug!("Ignoring {what}, already processing");
            return false;
        }
        true
    }

    async fn on_launcher_result(
        &self,
        attempt: u64,
        result: AuthSessionResult,
        grace: Option<Duration>,
    ) {
        if let Some(url) = result.usable_url() {
            if self.flow().attempt != attempt {
                tracing::debug!(attempt, "Ignoring launcher result from a previous attempt");
                return;
            }
            if self.state() != PairingState::AwaitingAuthorization {
                tracing::debug!(state = %self.state(), "Ignoring late launcher result");
                return;
            }
            let event = CallbackEvent::from_url(url, CallbackSource::Launcher);
            self.on_callback(event).await;
            return;
        }

        match (result.result_type, grace) {
            (AuthSessionResultType::Cancel, _) | (_, None) => {
                if self.claim_attempt(attempt, "launcher result") {
                    tracing::debug!(result = ?result.result_type, "Surface closed without callback");
                    self.finish(Err(PairingError::UserCancelled)).await;
                }
            }
            (_, Some(grace)) => {
                if self.flow().attempt != attempt
                    || self.state() != PairingState::AwaitingAuthorization
                {
                    tracing::debug!(state = %self.state(), "Ignoring dismiss");
                    return;
                }
                tracing::debug!(?grace, "Surface dismissed, waiting for deep link");
                let signals = self.signals.clone();
                let cancel = self.cancel.child_token();
                tokio::spawn(async move {
                    tokio::select! {
                        () = cancel.cancelled() => {}
                        () = tokio::time::sleep(grace) => {
                            signals.send(CompletionSignal::GraceExpired { attempt });
                        }
                    }
                });
            }
        }
    }

    /// First completion signal wins; everything else is ignored
    async fn on_callback(&self, event: CallbackEvent) {
        let state = self.state();
        let accepted = match event.source {
            // Only a deep link can resume a persisted session after a restart
            CallbackSource::DeepLink => matches!(
                state,
                PairingState::AwaitingAuthorization | PairingState::Idle
            ),
            CallbackSource::Launcher => state == PairingState::AwaitingAuthorization,
        };
        if !accepted {
            tracing::debug!(%state, source = %event.source, "Ignoring callback");
            return;
        }
        if !self.guard.try_engage() {
            tracing::debug!(source = %event.source, "Ignoring callback, already processing");
            return;
        }

        let in_memory = self.flow().session.clone();
        let session = match in_memory {
            Some(session) => Some(session),
            None => match self.vault.load_session().await {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!("Could not read persisted session: {e}");
                    None
                }
            },
        };

        if let Some(session) = &session {
            if event.is_for_other_session(session) {
                tracing::debug!(source = %event.source, "Ignoring callback for another session");
                self.guard.release();
                return;
            }
        }

        if !self.transition_from(state, PairingState::ExtractingVerifier) {
            tracing::debug!(state = %self.state(), "Ignoring callback, flow moved on");
            self.guard.release();
            return;
        }

        if state == PairingState::Idle {
            tracing::info!("Resuming pairing from persisted session");
        }

        let outcome = match session {
            Some(session) => self.exchange(&session, &event).await,
            None => Err(PairingError::SessionExpired),
        };
        self.finish(outcome).await;
    }

    async fn exchange(&self, session: &PairingSession, event: &CallbackEvent) -> Result<()> {
        let Some(verifier) = &event.verifier else {
            return Err(PairingError::verifier_missing(redact_url(&event.source_url)));
        };

        self.transition(PairingState::Exchanging);
        let api_key = self
            .vault
            .api_key()
            .await?
            .ok_or(PairingError::NotSignedIn)?;
        self.exchanger.exchange(session, verifier, &api_key).await
    }

    /// Settle a terminal outcome; the caller holds the guard
    async fn finish(&self, outcome: Result<()>) {
        if let Err(e) = self.vault.clear_session().await {
            tracing::warn!("Could not clear pairing session: {e}");
        }

        let outcome = match outcome {
            Ok(()) => self.vault.set_paired(true).await.map_err(PairingError::from),
            Err(e) => Err(e),
        };

        let next = match &outcome {
            Ok(()) => PairingState::Connected,
            Err(PairingError::UserCancelled) => PairingState::Idle,
            Err(e) => PairingState::Failed(e.kind()),
        };
        if !self.transition(next) {
            tracing::warn!(from = %self.state(), to = %next, "Forcing terminal state");
            self.state.send_replace(next);
        }

        let waiter = {
            let mut flow = self.flow();
            flow.session = None;
            flow.waiter.take()
        };
        self.guard.release();

        let event = match &outcome {
            Ok(()) => {
                tracing::info!("Device paired");
                PairingEvent::Connected
            }
            Err(e) if e.is_silent() => PairingEvent::Reset,
            Err(e) => {
                tracing::warn!("Pairing failed: {e}");
                PairingEvent::Failed {
                    message: e.user_message(),
                    kind: e.kind(),
                }
            }
        };
        self.observer.notify(event).await;

        if let Some(waiter) = waiter {
            let _ = waiter.send(outcome);
        }
    }
}
