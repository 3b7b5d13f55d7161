use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "recipe-relay")]
#[command(about = "LINE recipe relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the webhook gateway (POST /callback, GET /). Requires LINE_CHANNEL_SECRET, LINE_CHANNEL_ACCESS_TOKEN and OPENAI_API_KEY (env or config).
    Gateway {
        /// Config file path (default: RECIPE_RELAY_CONFIG or ~/.recipe-relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// HTTP port (default from PORT, config, or 8000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Print the X-Line-Signature for a request body file, for sending test webhooks by hand.
    Sign {
        /// File holding the exact request body
        #[arg(value_name = "BODY")]
        body: PathBuf,

        /// Config file path (default: RECIPE_RELAY_CONFIG or ~/.recipe-relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("recipe-relay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Sign { body, config }) => {
            if let Err(e) = run_sign(body, config) {
                log::error!("sign failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_gateway(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    log::debug!("config: {}", path.display());
    let mut settings = lib::config::resolve_settings(config)?;
    if let Some(p) = port {
        settings.config.server.port = p;
    }
    log::info!(
        "starting gateway on {}:{}",
        settings.config.server.bind,
        settings.config.server.port
    );
    lib::gateway::run_gateway(settings).await
}

fn run_sign(body_path: PathBuf, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let secret = lib::config::resolve_channel_secret_with(&config.line, |key| {
        std::env::var(key).ok()
    })
    .context("LINE_CHANNEL_SECRET is not set (env or line.channelSecret)")?;
    let body = std::fs::read(&body_path)
        .with_context(|| format!("reading body from {}", body_path.display()))?;
    println!("{}", lib::channels::sign_body(&secret, &body));
    Ok(())
}
