use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use firebase_bootstrap::PlatformConfig;
use std::path::PathBuf;
use tracing::info;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "firebase-bootstrap")]
#[command(about = "Check platform configuration and exercise the shared handles")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the configuration and print the resolved endpoints
    Check {
        #[command(flatten)]
        source: ConfigSource,
    },
    /// Verify an ID token against the project's published signing keys
    VerifyToken {
        token: String,
        #[command(flatten)]
        source: ConfigSource,
    },
}

#[derive(clap::Args)]
struct ConfigSource {
    /// TOML file with one section per environment (default: FIREBASE_* variables)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Environment section to read from the config file
    #[arg(long, default_value = "local")]
    env: String,
}

impl ConfigSource {
    fn load(&self) -> Result<PlatformConfig> {
        match &self.config {
            Some(path) => PlatformConfig::from_file(path, &self.env),
            None => PlatformConfig::load(),
        }
    }
}

fn init_logging(json: bool) {
    let layer = if json {
        fmt::layer().json().with_current_span(false).boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match cli.command {
        Command::Check { source } => {
            let app = firebase_bootstrap::initialize(source.load()?)
                .context("Platform client initialization failed")?;
            let database = firebase_bootstrap::database()?;
            let storage = firebase_bootstrap::storage()?;
            let auth = firebase_bootstrap::auth()?;

            println!("project:     {}", app.project_id());
            println!("app id:      {}", app.config().app_id);
            println!("api key:     {:?}", app.config().api_key);
            println!("auth domain: {}", auth.auth_domain());
            println!("issuer:      {}", auth.issuer());
            println!("documents:   {}", database.documents_url());
            println!("bucket:      {}", storage.bucket());
        }
        Command::VerifyToken { token, source } => {
            firebase_bootstrap::initialize(source.load()?)
                .context("Platform client initialization failed")?;
            let auth = firebase_bootstrap::auth()?;

            let keys = auth.refresh_signing_keys().await?;
            info!("Verifying token against {} signing keys", keys);

            let user = auth.verify_id_token(&token).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
    }

    Ok(())
}
