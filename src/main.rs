use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sub_raffler::engine::RaffleEngine;
use sub_raffler::paste::{NoPaste, PasteClient, PastebinClient, PastebinCredentials};
use sub_raffler::persistence::StateStore;
use sub_raffler::platform::reddit::{RedditClient, RedditCredentials};
use sub_raffler::randomness::RandomSource;
use sub_raffler::watcher::Supervisor;

#[derive(Parser, Debug)]
#[command(name = "sub-raffler", about = "Raffle moderation bot for discussion feeds")]
struct Args {
    /// Path of the persisted state file.
    #[arg(long, default_value = "bot_state.json")]
    state_file: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sub_raffler=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let store = match StateStore::open(&args.state_file) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(path = %args.state_file.display(), error = %e, "cannot open state store");
            return ExitCode::from(1);
        }
    };
    if let Err(e) = store.config().validate() {
        error!(error = %e, "invalid configuration");
        return ExitCode::from(1);
    }

    // Platform login is the only fatal startup step: the retry budget is
    // applied inside connect, and exhaustion exits non-zero.
    let creds = match RedditCredentials::from_env() {
        Ok(creds) => creds,
        Err(e) => {
            error!(error = %e, "missing platform credentials");
            return ExitCode::from(1);
        }
    };
    let platform = match RedditClient::connect(creds).await {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "platform login failed after all retries");
            return ExitCode::from(1);
        }
    };

    let paste: Arc<dyn PasteClient> = match PastebinCredentials::from_env() {
        Some(creds) => match PastebinClient::new(creds) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                error!(error = %e, "paste client setup failed, uploads disabled");
                Arc::new(NoPaste)
            }
        },
        None => {
            info!("no paste credentials configured, uploads disabled");
            Arc::new(NoPaste)
        }
    };

    let random = RandomSource::from_api_key(std::env::var("RANDOM_ORG_API_KEY").ok());

    let engine = Arc::new(RaffleEngine::new(
        Arc::clone(&store),
        platform.clone(),
        paste,
        random,
    ));

    let cancel = CancellationToken::new();

    // SIGHUP triggers an explicit configuration reload from the state file.
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        use tracing::warn;

        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let Ok(mut hangups) = signal(SignalKind::hangup()) else {
                return;
            };
            while hangups.recv().await.is_some() {
                match store.reload_from_disk() {
                    Ok(true) => info!("configuration reloaded from state file"),
                    Ok(false) => warn!("reload requested but state file is missing"),
                    Err(e) => warn!(error = %e, "reload failed, keeping current configuration"),
                }
            }
        });
    }

    let supervisor = Supervisor::new(platform, engine, store, cancel.clone());

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    supervisor.run().await;
    ExitCode::SUCCESS
}
