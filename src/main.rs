// Entrypoint for the CLI application.
// - Resolves credentials from flags, environment or a saved token.
// - Builds the lifecycle client and hands it to the UI loop.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use nextbrain_cli::config::{self, CredentialOverrides, Credentials};
use nextbrain_cli::{ui::main_menu, ModelLifecycleClient};

/// Interactive client for the NextBrain ML backend.
#[derive(Parser, Debug)]
#[command(name = "nextbrain", version, about)]
struct Cli {
    /// Access token [env: NEXTBRAIN_ACCESS_TOKEN]. Falls back to the token
    /// saved by `--save-token`.
    #[arg(long)]
    access_token: Option<String>,

    /// Backend base URL [env: NEXTBRAIN_BACKEND_URL]
    /// [default: https://api.nextbrain.ai].
    #[arg(long)]
    backend_url: Option<String>,

    /// Authenticate as an app session (header token) instead of an API
    /// token [env: NEXTBRAIN_APP_MODE=1|true|yes|on].
    #[arg(long)]
    app: bool,

    /// Save the access token to ~/.nextbrain_token for later runs.
    #[arg(long)]
    save_token: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    let credentials = Credentials::resolve(CredentialOverrides {
        access_token: cli.access_token,
        backend_url: cli.backend_url,
        app: cli.app,
    })?;
    if cli.save_token {
        config::persist_token(credentials.access_token())?;
    }

    let client = ModelLifecycleClient::new(credentials).context("Failed to build HTTP client")?;

    // Blocks until the user picks "Exit".
    main_menu(&client).await?;
    Ok(())
}
