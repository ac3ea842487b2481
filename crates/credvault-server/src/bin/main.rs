//! credvault - API key credential store served over HTTP

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use credvault_core::config::{default_data_dir, SETTINGS_FILE};
use credvault_core::{HttpProbe, KeySource, ProviderProbe, Settings, Vault};
use credvault_server::ApiServer;

/// Keychain account holding the master key
const KEYCHAIN_ACCOUNT: &str = "master-key";

/// credvault - encrypted storage, validation and audit logging for provider API keys
#[derive(Parser, Debug)]
#[command(name = "credvault")]
#[command(author = "OKA Tech")]
#[command(version)]
#[command(about = "credvault - API key credential store")]
struct Args {
    /// Port for the HTTP API
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Data directory (defaults to the platform data dir)
    #[arg(long, env = "CREDVAULT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Settings file (defaults to settings.json in the data directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep everything in memory under a throwaway key
    #[arg(long, conflicts_with_all = ["passphrase", "keychain"])]
    in_memory: bool,

    /// Passphrase for the master key
    #[arg(long, env = "CREDVAULT_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    /// Keep the master key in the OS keychain instead of deriving it
    #[arg(long, conflicts_with = "passphrase")]
    keychain: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let config_path = args
        .config
        .unwrap_or_else(|| data_dir.join(SETTINGS_FILE));
    let settings = Settings::load(&config_path)
        .with_context(|| format!("failed to load settings from {}", config_path.display()))?;

    let probe: Arc<dyn ProviderProbe> = Arc::new(HttpProbe::new(settings.probe.clone())?);

    let vault = if args.in_memory {
        Vault::in_memory(&settings, probe).await?
    } else {
        let key_source = if let Some(passphrase) = args.passphrase {
            KeySource::passphrase(passphrase)
        } else if args.keychain {
            KeySource::keychain(KEYCHAIN_ACCOUNT)
        } else {
            let passphrase = rpassword::prompt_password("Vault passphrase: ")
                .context("failed to read passphrase")?;
            KeySource::passphrase(passphrase)
        };

        Vault::open(&data_dir, &settings, &key_source, probe)
            .await
            .with_context(|| format!("failed to open vault at {}", data_dir.display()))?
    };
    info!("Vault ready");

    // first persistent run leaves an editable settings file behind
    if !args.in_memory && !config_path.exists() {
        match settings.save(&config_path).await {
            Ok(()) => info!("Wrote default settings to {}", config_path.display()),
            Err(e) => warn!("Could not write settings to {}: {}", config_path.display(), e),
        }
    }

    let addr = SocketAddr::new(args.host, args.port);
    ApiServer::new(Arc::new(vault), addr)
        .with_operation_timeout(settings.operation_timeout())
        .run()
        .await?;

    Ok(())
}
