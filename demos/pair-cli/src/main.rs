//! Fitlink Pair CLI
//!
//! Pairs a Fitlink account with the fitness provider from a desktop
//! terminal. The consent page opens in the default browser; once approved,
//! paste the URL the browser landed on (or let the `fitlink://` handler
//! forward it) and the verifier is exchanged.
//!
//! Run with:
//!   cargo run -p fitlink-pair-cli -- login --api-key <KEY>
//!   cargo run -p fitlink-pair-cli -- pair

mod output;

use clap::{Parser, Subcommand};
use fitlink_pairing_sdk::{
    ApiKey, ChannelDeepLinkSource, FileCredentialStore, FnPairingObserver, LauncherSelector,
    PairingComponents, PairingCoordinator, PairingOptions, Platform, StaticProbe,
    SystemBrowserLauncher,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;

/// Pair an account with the fitness provider
#[derive(Parser, Debug)]
#[command(name = "fitlink-pair")]
#[command(about = "Link a Fitlink account to the fitness provider")]
struct Args {
    /// Credential file (defaults to the local data directory)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store the account api key
    Login {
        /// Api key issued at sign-in
        #[arg(long)]
        api_key: String,
    },
    /// Run the pairing flow
    Pair {
        /// Print the consent URL instead of opening the browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Show local pairing state
    Status,
    /// Ask the backend and correct the local flag
    Validate,
    /// Clear the local pairing flag
    Unpair,
}

/// Get the credential file path
fn store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fitlink-pair-cli")
        .join("credentials.json")
}

fn build_coordinator(store: PathBuf, open_browser: bool) -> anyhow::Result<(
    PairingCoordinator,
    tokio::sync::mpsc::UnboundedSender<String>,
)> {
    let mut options = PairingOptions::from_env();
    options.platform = Platform::Desktop;

    let browser = SystemBrowserLauncher::new()
        .auto_open_browser(open_browser)
        .on_url(Arc::new(|url| output::display_consent_url(&url)));
    let selector = LauncherSelector::new(Platform::Desktop, Arc::new(StaticProbe(false)))
        .with_system_browser(Arc::new(browser));

    let (deep_links, deep_link_tx) = ChannelDeepLinkSource::new(None);
    let observer = FnPairingObserver::new(|event| {
        Box::pin(async move {
            output::display_event(&event);
        })
    });

    let components = PairingComponents::builder()
        .store(Arc::new(FileCredentialStore::with_path(store)))
        .selector(selector)
        .observer(Arc::new(observer))
        .deep_links(Arc::new(deep_links))
        .build();

    Ok((PairingCoordinator::new(options, components)?, deep_link_tx))
}

/// Forward pasted lines as deep links
fn spawn_stdin_forwarder(tx: tokio::sync::mpsc::UnboundedSender<String>) {
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if tx.send(line.to_string()).is_err() {
                break;
            }
        }
    });
}

async fn pair(coordinator: &PairingCoordinator) -> anyhow::Result<()> {
    let pairing = coordinator.pair();
    tokio::pin!(pairing);

    let result = tokio::select! {
        result = &mut pairing => result,
        _ = tokio::signal::ctrl_c() => {
            coordinator.cancel();
            pairing.await
        }
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_silent() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn".parse().unwrap());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let store = args.store.unwrap_or_else(store_path);
    let open_browser = !matches!(args.command, Command::Pair { no_browser: true });
    let (coordinator, deep_link_tx) = build_coordinator(store, open_browser)?;

    match args.command {
        Command::Login { api_key } => {
            coordinator.vault().set_api_key(&ApiKey::new(api_key)).await?;
            output::display_success("Api key stored");
        }
        Command::Pair { .. } => {
            output::display_pair_instructions();
            spawn_stdin_forwarder(deep_link_tx);
            pair(&coordinator).await?;
        }
        Command::Status => {
            let vault = coordinator.vault();
            let signed_in = vault.api_key().await?.is_some();
            let paired = vault.is_paired().await?;
            let pending = vault.load_session().await?;
            output::display_status(signed_in, paired, pending.as_ref());
        }
        Command::Validate => {
            let connected = coordinator.validate_connection().await?;
            output::display_status_line("Backend connection", connected);
        }
        Command::Unpair => {
            coordinator.unpair().await?;
            output::display_success("Local pairing flag cleared");
        }
    }

    coordinator.shutdown();
    Ok(())
}
