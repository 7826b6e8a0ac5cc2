use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use renaym_licensing::{app, config::Config, license::key, state::AppState};

#[derive(Parser)]
#[command(
    name = "renaym-licensing",
    about = "License issuance and retrieval service for Renaym"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve,
    /// Generate an Ed25519 keypair for the signed license key format
    Keygen,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Keygen => {
            keygen();
            Ok(())
        }
    }
}

async fn serve() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let state = AppState::from_config(&config)?;

    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    tracing::info!("Listening on {}", config.addr());
    axum::serve(listener, app(state)).await?;

    Ok(())
}

fn keygen() {
    let (signing_key, verifying_key) = key::generate_keypair();
    println!(
        "LICENSE_SIGNING_KEY={}",
        key::signing_key_to_base64(&signing_key)
    );
    println!(
        "Verifying key (embed in the desktop app): {}",
        key::verifying_key_to_base64(&verifying_key)
    );
}
