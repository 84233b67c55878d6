use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;
use unicity_authn::provider::{generate_api_key, hash_api_key};
use unicity_authn::{AuthLayerState, create_app, load_settings};

#[derive(Parser)]
#[command(name = "unicity-authn")]
#[command(about = "Route-aware authentication provider chain")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the demo API behind the authentication layer
    Serve {
        /// Bind address, e.g. 0.0.0.0:8080
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
        /// Path to authn.json (defaults to AUTHN_CONFIG, XDG or ./authn.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate the configuration and print every route's effective policy
    CheckConfig {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the SHA-256 digest of a password or API key for authn.json
    HashSecret {
        /// The secret to hash
        #[arg(env = "AUTHN_SECRET")]
        secret: String,
    },
    /// Generate a new API key and its digest
    GenerateApiKey,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("unicity_authn=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, config } => {
            let settings = load_settings(config)?;
            let app = create_app(&settings)?;

            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!("Server listening on http://{}", bind);

            axum::serve(listener, app).await?;
        }
        Commands::CheckConfig { config } => {
            let settings = load_settings(config)?;
            let state = AuthLayerState::from_settings(&settings)?;

            println!("Providers (chain order):");
            for (config, name) in settings
                .providers
                .iter()
                .zip(state.authenticator().registry().all())
            {
                println!("  {:<12} {}", name.as_str(), config.recipe.kind());
            }
            println!();
            println!("Default: {}", state.routes().default_policy());
            if let Some(timeout) = state.authenticator().timeout() {
                println!("Timeout: {}ms", timeout.as_millis());
            }
            println!();
            println!("Routes:");
            for (key, policy) in state.routes().iter() {
                println!("  {:<7} {:<32} {}", key.method.as_str(), key.path, policy);
            }
            println!();
            println!("Configuration OK");
        }
        Commands::HashSecret { secret } => {
            println!("{}", hash_api_key(&secret));
        }
        Commands::GenerateApiKey => {
            let (full_key, prefix, key_hash) = generate_api_key();

            println!("API Key generated successfully!");
            println!();
            println!("  Key:     {}", full_key);
            println!("  Prefix:  {}", prefix);
            println!("  SHA-256: {}", key_hash);
            println!();
            println!("IMPORTANT: Save this key now. Only the digest belongs in authn.json:");
            println!("  {{\"name\": \"service\", \"type\": \"api_key\", \"keySha256\": \"{}\"}}", key_hash);
            println!("Use with: -H 'X-API-Key: {}'", full_key);
        }
    }

    Ok(())
}
