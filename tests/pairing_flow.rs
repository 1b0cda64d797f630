//! Integration tests for the pairing flow
//!
//! The backend, launchers and deep-link source are in-memory fakes; the
//! coordinator, guard, listener, extractor and session vault are real.

use async_trait::async_trait;
use fitlink_pairing_sdk::storage::keys;
use fitlink_pairing_sdk::{
    ApiKey, AuthSessionResult, AuthorizationLauncher, ChannelDeepLinkSource, CredentialStore,
    FailureKind, HttpFetch, HttpResponse, LauncherKind, LauncherSelector, MemoryCredentialStore,
    PairingComponents, PairingCoordinator, PairingError, PairingEvent, PairingObserver,
    PairingOptions, PairingSession, PairingState, Platform, Result, SessionVault, StaticProbe,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const CALLBACK: &str = "https://fitlink.app/oauth/callback";

// ============================================================================
// Fakes
// ============================================================================

/// Backend answering the three pairing endpoints
struct FakeBackend {
    exchange_status: u16,
    exchange_delay: Duration,
    request_delay: Duration,
    connected: bool,
    exchange_calls: AtomicUsize,
    exchanges: Mutex<Vec<HashMap<String, String>>>,
}

impl FakeBackend {
    fn new(exchange_status: u16) -> Arc<Self> {
        Self::with_delay(exchange_status, Duration::ZERO)
    }

    fn with_delay(exchange_status: u16, exchange_delay: Duration) -> Arc<Self> {
        Self::build(exchange_status, exchange_delay, Duration::ZERO)
    }

    fn with_slow_request_token(request_delay: Duration) -> Arc<Self> {
        Self::build(200, Duration::ZERO, request_delay)
    }

    fn build(exchange_status: u16, exchange_delay: Duration, request_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            exchange_status,
            exchange_delay,
            request_delay,
            connected: true,
            exchange_calls: AtomicUsize::new(0),
            exchanges: Mutex::default(),
        })
    }

    fn calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    fn last_exchange(&self) -> HashMap<String, String> {
        self.exchanges.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl HttpFetch for FakeBackend {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse> {
        let query: HashMap<String, String> = query
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();

        if url.ends_with("/request-token") {
            tokio::time::sleep(self.request_delay).await;
            return Ok(HttpResponse::new(
                200,
                r#"{"oauth_token":"T1","oauth_token_secret":"S1"}"#,
            ));
        }
        if url.ends_with("/access-token") {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            self.exchanges.lock().unwrap().push(query);
            tokio::time::sleep(self.exchange_delay).await;
            let body = if self.exchange_status == 200 { "{}" } else { "upstream error" };
            return Ok(HttpResponse::new(self.exchange_status, body));
        }
        if url.ends_with("/validate-connection") {
            return Ok(HttpResponse::new(
                200,
                format!(r#"{{"isConnected":{}}}"#, self.connected),
            ));
        }
        Ok(HttpResponse::new(404, "not found"))
    }
}

/// Launcher returning a fixed result immediately
struct Immediate {
    kind: LauncherKind,
    delivers: bool,
    result: AuthSessionResult,
}

#[async_trait]
impl AuthorizationLauncher for Immediate {
    fn kind(&self) -> LauncherKind {
        self.kind
    }

    fn delivers_result(&self) -> bool {
        self.delivers
    }

    async fn launch(&self, _consent_url: &str, _callback_url: &str) -> Result<AuthSessionResult> {
        Ok(self.result.clone())
    }
}

/// Launcher that fires the deep links itself, then returns `result`
struct Racing {
    deep_links: mpsc::UnboundedSender<String>,
    urls: Vec<String>,
    result: AuthSessionResult,
}

#[async_trait]
impl AuthorizationLauncher for Racing {
    fn kind(&self) -> LauncherKind {
        LauncherKind::TrustedOverlay
    }

    fn delivers_result(&self) -> bool {
        true
    }

    async fn launch(&self, _consent_url: &str, _callback_url: &str) -> Result<AuthSessionResult> {
        for url in &self.urls {
            self.deep_links.send(url.clone()).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(self.result.clone())
    }
}

/// Launcher that never closes, like a process killed mid-consent
struct Stuck;

#[async_trait]
impl AuthorizationLauncher for Stuck {
    fn kind(&self) -> LauncherKind {
        LauncherKind::TrustedOverlay
    }

    fn delivers_result(&self) -> bool {
        false
    }

    async fn launch(&self, _consent_url: &str, _callback_url: &str) -> Result<AuthSessionResult> {
        std::future::pending().await
    }
}

/// Overlay that stays open until the test closes it
struct Gated {
    launches: AtomicUsize,
    close: Mutex<Option<oneshot::Receiver<AuthSessionResult>>>,
}

impl Gated {
    fn new() -> (Arc<Self>, oneshot::Sender<AuthSessionResult>) {
        let (tx, rx) = oneshot::channel();
        let launcher = Arc::new(Self {
            launches: AtomicUsize::new(0),
            close: Mutex::new(Some(rx)),
        });
        (launcher, tx)
    }

    fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthorizationLauncher for Gated {
    fn kind(&self) -> LauncherKind {
        LauncherKind::TrustedOverlay
    }

    fn delivers_result(&self) -> bool {
        true
    }

    async fn launch(&self, _consent_url: &str, _callback_url: &str) -> Result<AuthSessionResult> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let close = self.close.lock().unwrap().take().expect("launched twice");
        Ok(close.await.unwrap_or_else(|_| AuthSessionResult::cancel()))
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<PairingEvent>>,
}

#[async_trait]
impl PairingObserver for Recorder {
    async fn notify(&self, event: PairingEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Recorder {
    fn events(&self) -> Vec<PairingEvent> {
        self.events.lock().unwrap().clone()
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    coordinator: Arc<PairingCoordinator>,
    store: Arc<MemoryCredentialStore>,
    recorder: Arc<Recorder>,
    deep_links: mpsc::UnboundedSender<String>,
}

fn selector(platform: Platform, launcher: Arc<dyn AuthorizationLauncher>) -> LauncherSelector {
    match launcher.kind() {
        LauncherKind::TrustedOverlay => {
            LauncherSelector::new(platform, Arc::new(StaticProbe(true))).with_overlay(launcher)
        }
        LauncherKind::EmbeddedSurface => {
            LauncherSelector::new(platform, Arc::new(StaticProbe(false))).with_embedded(launcher)
        }
        LauncherKind::SystemBrowser => LauncherSelector::new(platform, Arc::new(StaticProbe(false)))
            .with_system_browser(launcher),
    }
}

/// Route coordinator logs to the test writer; `RUST_LOG=debug` to see them
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn harness_with(
    options: PairingOptions,
    selector: LauncherSelector,
    backend: Arc<FakeBackend>,
    store: Arc<MemoryCredentialStore>,
    source: (ChannelDeepLinkSource, mpsc::UnboundedSender<String>),
) -> Harness {
    init_tracing();
    let (source, deep_links) = source;
    let recorder = Arc::new(Recorder::default());
    let components = PairingComponents::builder()
        .store(store.clone())
        .selector(selector)
        .fetch(backend)
        .observer(recorder.clone())
        .deep_links(Arc::new(source))
        .build();

    let coordinator = PairingCoordinator::new(options, components).unwrap();
    coordinator
        .vault()
        .set_api_key(&ApiKey::new("key-1"))
        .await
        .unwrap();

    Harness {
        coordinator: Arc::new(coordinator),
        store,
        recorder,
        deep_links,
    }
}

async fn harness(
    platform: Platform,
    launcher: Arc<dyn AuthorizationLauncher>,
    backend: Arc<FakeBackend>,
) -> Harness {
    let options = PairingOptions::builder().platform(platform).build();
    harness_with(
        options,
        selector(platform, launcher),
        backend,
        Arc::new(MemoryCredentialStore::new()),
        ChannelDeepLinkSource::new(None),
    )
    .await
}

async fn wait_for_state(coordinator: &PairingCoordinator, expected: PairingState) {
    let mut rx = coordinator.subscribe_state();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|state| *state == expected))
        .await
        .unwrap_or_else(|_| panic!("state never became {expected}"))
        .unwrap();
}

async fn session_keys(store: &MemoryCredentialStore) -> Vec<Option<String>> {
    vec![
        store.read(keys::OAUTH_TOKEN).await.unwrap(),
        store.read(keys::OAUTH_TOKEN_SECRET).await.unwrap(),
        store.read(keys::OAUTH_TOKEN_CREATED_AT).await.unwrap(),
    ]
}

fn success(url: &str) -> AuthSessionResult {
    AuthSessionResult::success(url)
}

fn overlay(result: AuthSessionResult, delivers: bool) -> Arc<dyn AuthorizationLauncher> {
    Arc::new(Immediate {
        kind: LauncherKind::TrustedOverlay,
        delivers,
        result,
    })
}

// ============================================================================
// Happy path and terminal cleanup
// ============================================================================

#[tokio::test]
async fn test_happy_path_exchanges_t1_s1_v1() {
    let backend = FakeBackend::new(200);
    let h = harness(
        Platform::Ios,
        overlay(
            success(&format!("{CALLBACK}?oauth_token=T1&oauth_verifier=V1")),
            true,
        ),
        backend.clone(),
    )
    .await;

    h.coordinator.pair().await.unwrap();

    let exchange = backend.last_exchange();
    assert_eq!(exchange["apiKey"], "key-1");
    assert_eq!(exchange["oauth_token"], "T1");
    assert_eq!(exchange["token_secret"], "S1");
    assert_eq!(exchange["oauth_verifier"], "V1");

    assert_eq!(h.coordinator.state(), PairingState::Connected);
    assert!(h.coordinator.is_paired().await.unwrap());
    assert_eq!(session_keys(&h.store).await, vec![None, None, None]);
    assert!(!h.coordinator.is_processing());
    assert_eq!(h.recorder.events(), vec![PairingEvent::Connected]);
}

#[tokio::test]
async fn test_exchange_500_fails_and_clears_session() {
    let backend = FakeBackend::new(500);
    let h = harness(
        Platform::Ios,
        overlay(success(&format!("{CALLBACK}?oauth_verifier=V1")), true),
        backend.clone(),
    )
    .await;

    let err = h.coordinator.pair().await.unwrap_err();

    assert!(matches!(err, PairingError::Exchange { status: 500, .. }));
    assert_eq!(backend.calls(), 1);
    assert_eq!(
        h.coordinator.state(),
        PairingState::Failed(FailureKind::Exchange)
    );
    assert_eq!(session_keys(&h.store).await, vec![None, None, None]);
    assert_eq!(h.store.read(keys::PAIRED).await.unwrap(), None);
    assert!(!h.coordinator.is_processing());

    let events = h.recorder.events();
    assert_eq!(events.len(), 1);
    let PairingEvent::Failed { message, kind } = &events[0] else {
        panic!("expected failure event, got {events:?}");
    };
    assert!(message.contains("500"));
    assert_eq!(*kind, FailureKind::Exchange);
}

#[tokio::test]
async fn test_pair_replaces_stale_session() {
    let backend = FakeBackend::new(200);
    let h = harness(
        Platform::Ios,
        overlay(success(&format!("{CALLBACK}?oauth_verifier=V1")), true),
        backend.clone(),
    )
    .await;
    SessionVault::new(h.store.clone())
        .save_session(&PairingSession::new("OLD", "OLDS"))
        .await
        .unwrap();

    h.coordinator.pair().await.unwrap();

    let exchange = backend.last_exchange();
    assert_eq!(exchange["oauth_token"], "T1");
    assert_eq!(exchange["token_secret"], "S1");
}

#[tokio::test]
async fn test_verifier_missing_skips_exchange() {
    let backend = FakeBackend::new(200);
    let h = harness(
        Platform::Ios,
        overlay(success(&format!("{CALLBACK}?oauth_token=T1")), true),
        backend.clone(),
    )
    .await;

    let err = h.coordinator.pair().await.unwrap_err();

    assert!(matches!(err, PairingError::VerifierMissing { .. }));
    assert_eq!(backend.calls(), 0);
    assert_eq!(session_keys(&h.store).await, vec![None, None, None]);
}

// ============================================================================
// Idempotency under the race
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_launcher_and_deep_link_exchange_once() {
    let backend = FakeBackend::with_delay(200, Duration::from_millis(50));
    let (source, tx) = ChannelDeepLinkSource::new(None);
    let url = format!("{CALLBACK}?oauth_token=T1&oauth_verifier=V1");
    let launcher = Arc::new(Racing {
        deep_links: tx.clone(),
        urls: vec![
            "fitlink://oauth?oauth_token=T1&oauth_verifier=V1".to_string(),
            "fitlink://oauth?oauth_token=T1&oauth_verifier=V1".to_string(),
            url.clone(),
        ],
        result: success(&url),
    });
    let options = PairingOptions::builder()
        .platform(Platform::Ios)
        .deep_links(true)
        .build();
    let h = harness_with(
        options,
        selector(Platform::Ios, launcher),
        backend.clone(),
        Arc::new(MemoryCredentialStore::new()),
        (source, tx),
    )
    .await;

    h.coordinator.pair().await.unwrap();
    // Let any straggling signal reach the consumer
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(backend.calls(), 1);
    assert_eq!(h.coordinator.state(), PairingState::Connected);
    assert_eq!(h.recorder.events(), vec![PairingEvent::Connected]);
}

#[tokio::test]
async fn test_second_pair_rejected_while_in_progress() {
    let backend = FakeBackend::new(200);
    let browser = Arc::new(Immediate {
        kind: LauncherKind::SystemBrowser,
        delivers: false,
        result: AuthSessionResult::dismiss(),
    });
    let h = harness(Platform::Desktop, browser, backend.clone()).await;

    let coordinator = h.coordinator.clone();
    let first = tokio::spawn(async move { coordinator.pair().await });
    wait_for_state(&h.coordinator, PairingState::AwaitingAuthorization).await;

    let err = h.coordinator.pair().await.unwrap_err();
    assert!(matches!(err, PairingError::AlreadyInProgress));

    h.coordinator.cancel();
    let err = first.await.unwrap().unwrap_err();
    assert!(matches!(err, PairingError::UserCancelled));
    assert_eq!(h.coordinator.state(), PairingState::Idle);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_cancel_while_requesting_token_never_opens_surface() {
    let backend = FakeBackend::with_slow_request_token(Duration::from_secs(5));
    let (launcher, _close) = Gated::new();
    let h = harness(Platform::Ios, launcher.clone(), backend.clone()).await;

    let coordinator = h.coordinator.clone();
    let pairing = tokio::spawn(async move { coordinator.pair().await });
    wait_for_state(&h.coordinator, PairingState::RequestingToken).await;

    h.coordinator.cancel();
    let err = tokio::time::timeout(Duration::from_secs(2), pairing)
        .await
        .expect("cancel did not interrupt the token request")
        .unwrap()
        .unwrap_err();

    assert!(matches!(err, PairingError::UserCancelled));
    assert_eq!(h.coordinator.state(), PairingState::Idle);
    assert_eq!(launcher.launches(), 0);
    assert_eq!(backend.calls(), 0);
    assert_eq!(h.recorder.events(), vec![PairingEvent::Reset]);
    assert_eq!(session_keys(&h.store).await, vec![None, None, None]);
}

#[tokio::test]
async fn test_late_launcher_result_after_cancel_is_ignored() {
    let backend = FakeBackend::new(200);
    let (launcher, close) = Gated::new();
    let h = harness(Platform::Ios, launcher, backend.clone()).await;

    let coordinator = h.coordinator.clone();
    let pairing = tokio::spawn(async move { coordinator.pair().await });
    wait_for_state(&h.coordinator, PairingState::AwaitingAuthorization).await;

    h.coordinator.cancel();
    wait_for_state(&h.coordinator, PairingState::Idle).await;
    assert_eq!(h.recorder.events(), vec![PairingEvent::Reset]);

    // The surface was still open and now reports a full callback
    close
        .send(success(&format!(
            "{CALLBACK}?oauth_token=T1&oauth_verifier=V1"
        )))
        .unwrap();

    let err = pairing.await.unwrap().unwrap_err();
    assert!(matches!(err, PairingError::UserCancelled));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.coordinator.state(), PairingState::Idle);
    assert_eq!(backend.calls(), 0);
    assert_eq!(h.recorder.events(), vec![PairingEvent::Reset]);
    assert!(!h.coordinator.is_processing());
}

// ============================================================================
// Deep-link completion
// ============================================================================

#[tokio::test]
async fn test_android_dismiss_then_deep_link_completes() {
    let backend = FakeBackend::new(200);
    let h = harness(
        Platform::Android,
        overlay(AuthSessionResult::dismiss(), false),
        backend.clone(),
    )
    .await;

    let coordinator = h.coordinator.clone();
    let pairing = tokio::spawn(async move { coordinator.pair().await });
    wait_for_state(&h.coordinator, PairingState::AwaitingAuthorization).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    h.deep_links
        .send("fitlink://oauth?oauth_token=T1&oauth_verifier=V9".to_string())
        .unwrap();

    pairing.await.unwrap().unwrap();
    assert_eq!(backend.last_exchange()["oauth_verifier"], "V9");
    assert!(h.coordinator.is_paired().await.unwrap());
}

#[tokio::test]
async fn test_dismiss_without_deep_link_resets_after_grace() {
    let backend = FakeBackend::new(200);
    let options = PairingOptions::builder()
        .platform(Platform::Android)
        .deep_link_grace(Duration::from_millis(50))
        .build();
    let h = harness_with(
        options,
        selector(
            Platform::Android,
            overlay(AuthSessionResult::dismiss(), false),
        ),
        backend.clone(),
        Arc::new(MemoryCredentialStore::new()),
        ChannelDeepLinkSource::new(None),
    )
    .await;

    let err = h.coordinator.pair().await.unwrap_err();

    assert!(err.is_silent());
    assert_eq!(h.coordinator.state(), PairingState::Idle);
    assert_eq!(backend.calls(), 0);
    assert_eq!(session_keys(&h.store).await, vec![None, None, None]);
    assert_eq!(h.recorder.events(), vec![PairingEvent::Reset]);
}

#[tokio::test]
async fn test_callback_for_other_session_is_ignored() {
    let backend = FakeBackend::new(200);
    let h = harness(
        Platform::Android,
        overlay(AuthSessionResult::dismiss(), false),
        backend.clone(),
    )
    .await;

    let coordinator = h.coordinator.clone();
    let pairing = tokio::spawn(async move { coordinator.pair().await });
    wait_for_state(&h.coordinator, PairingState::AwaitingAuthorization).await;

    h.deep_links
        .send("fitlink://oauth?oauth_token=OLD&oauth_verifier=STALE".to_string())
        .unwrap();
    h.deep_links
        .send("fitlink://oauth?oauth_token=T1&oauth_verifier=V1".to_string())
        .unwrap();

    pairing.await.unwrap().unwrap();
    assert_eq!(backend.calls(), 1);
    assert_eq!(backend.last_exchange()["oauth_verifier"], "V1");
}

// ============================================================================
// Restart
// ============================================================================

#[tokio::test]
async fn test_session_survives_restart() {
    let backend = FakeBackend::new(200);
    let store = Arc::new(MemoryCredentialStore::new());

    // First process: the surface is open when the process dies
    let first = harness_with(
        PairingOptions::builder().platform(Platform::Android).build(),
        selector(Platform::Android, Arc::new(Stuck)),
        backend.clone(),
        store.clone(),
        ChannelDeepLinkSource::new(None),
    )
    .await;
    let coordinator = first.coordinator.clone();
    let pairing = tokio::spawn(async move { coordinator.pair().await });
    wait_for_state(&first.coordinator, PairingState::AwaitingAuthorization).await;
    pairing.abort();
    let _ = pairing.await;
    first.coordinator.shutdown();
    drop(first);

    assert_eq!(
        store.read(keys::OAUTH_TOKEN).await.unwrap().as_deref(),
        Some("T1")
    );

    // Second process: launched by the deep link
    let second = harness_with(
        PairingOptions::builder().platform(Platform::Android).build(),
        selector(Platform::Android, Arc::new(Stuck)),
        backend.clone(),
        store.clone(),
        ChannelDeepLinkSource::new(Some(
            "fitlink://oauth?oauth_token=T1&oauth_verifier=V1".to_string(),
        )),
    )
    .await;

    wait_for_state(&second.coordinator, PairingState::Connected).await;

    let exchange = backend.last_exchange();
    assert_eq!(exchange["oauth_token"], "T1");
    assert_eq!(exchange["token_secret"], "S1");
    assert_eq!(exchange["oauth_verifier"], "V1");
    assert!(second.coordinator.is_paired().await.unwrap());
    assert_eq!(session_keys(&store).await, vec![None, None, None]);
}

#[tokio::test]
async fn test_deep_link_without_session_expires() {
    let backend = FakeBackend::new(200);
    let h = harness(
        Platform::Android,
        overlay(AuthSessionResult::dismiss(), false),
        backend.clone(),
    )
    .await;

    assert!(
        h.coordinator
            .handle_callback_url("fitlink://oauth?oauth_verifier=V1")
    );

    wait_for_state(
        &h.coordinator,
        PairingState::Failed(FailureKind::SessionExpired),
    )
    .await;
    assert_eq!(backend.calls(), 0);
    assert!(!h.coordinator.is_paired().await.unwrap());
}

// ============================================================================
// Launcher selection
// ============================================================================

#[tokio::test]
async fn test_missing_overlay_without_fallback_is_terminal() {
    let backend = FakeBackend::new(200);
    let selector = LauncherSelector::new(Platform::Ios, Arc::new(StaticProbe(false))).with_overlay(
        overlay(success(&format!("{CALLBACK}?oauth_verifier=V1")), true),
    );
    let h = harness_with(
        PairingOptions::builder().platform(Platform::Ios).build(),
        selector,
        backend.clone(),
        Arc::new(MemoryCredentialStore::new()),
        ChannelDeepLinkSource::new(None),
    )
    .await;

    let err = h.coordinator.pair().await.unwrap_err();

    assert!(matches!(err, PairingError::LauncherUnavailable(_)));
    assert_eq!(backend.calls(), 0);
    assert_eq!(
        h.coordinator.state(),
        PairingState::Failed(FailureKind::LauncherUnavailable)
    );
    assert_eq!(session_keys(&h.store).await, vec![None, None, None]);
}

#[tokio::test]
async fn test_android_probe_error_falls_back_to_embedded() {
    let backend = FakeBackend::new(200);
    let probe = || -> Result<bool> { Err(PairingError::launcher_unavailable("module missing")) };
    let embedded = Arc::new(Immediate {
        kind: LauncherKind::EmbeddedSurface,
        delivers: true,
        result: success("fitlink://oauth#oauth_verifier=V1"),
    });
    let selector = LauncherSelector::new(Platform::Android, Arc::new(probe))
        .with_overlay(overlay(AuthSessionResult::cancel(), false))
        .with_embedded(embedded);
    let h = harness_with(
        PairingOptions::builder().platform(Platform::Android).build(),
        selector,
        backend.clone(),
        Arc::new(MemoryCredentialStore::new()),
        ChannelDeepLinkSource::new(None),
    )
    .await;

    h.coordinator.pair().await.unwrap();
    assert_eq!(backend.last_exchange()["oauth_verifier"], "V1");
}

// ============================================================================
// Connection validation
// ============================================================================

#[tokio::test]
async fn test_validate_connection_overwrites_flag() -> anyhow::Result<()> {
    let backend = FakeBackend::new(200);
    let h = harness(
        Platform::Ios,
        overlay(AuthSessionResult::cancel(), true),
        backend,
    )
    .await;
    assert!(!h.coordinator.is_paired().await?);

    assert!(h.coordinator.validate_connection().await?);
    assert!(h.coordinator.is_paired().await?);

    h.coordinator.unpair().await?;
    assert!(!h.coordinator.is_paired().await?);
    Ok(())
}
