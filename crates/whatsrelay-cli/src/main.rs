use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use whatsrelay_config::{AppConfig, ConfigLoader, ReplyMode};
use whatsrelay_gateway::GatewayServer;
use whatsrelay_gateway::bootstrap::{build_provider, open_exchange_log};
use whatsrelay_security::{RedactingWriter, mask_secret};

#[derive(Parser)]
#[command(name = "whatsrelay")]
#[command(about = "Answer WhatsApp messages with short LLM completions")]
#[command(version)]
struct Cli {
    /// Load environment variables from this file (default: .env if present)
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook server until Ctrl-C / SIGTERM
    Serve {
        /// Listen port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,

        /// Listen host (overrides HOST)
        #[arg(long)]
        host: Option<String>,

        /// Emit logs as JSON lines
        #[arg(long)]
        log_json: bool,
    },
    /// Validate configuration and check the completion API is reachable
    Check,
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(RedactingWriter::stderr());
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn load_config(env_file: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    let loader = match env_file {
        Some(path) => ConfigLoader::new().with_env_file(path),
        None => ConfigLoader::new(),
    };
    loader.load().context("failed to load configuration")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            port,
            host,
            log_json,
        } => {
            init_tracing(log_json);
            let mut config = load_config(cli.env_file)?;
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(host) = host {
                config.gateway.host = host;
            }
            info!(
                "starting whatsrelay v{} on {}",
                env!("CARGO_PKG_VERSION"),
                config.gateway.bind_addr()
            );
            GatewayServer::new(config).run().await?;
        }
        Command::Check => {
            init_tracing(false);
            let config = load_config(cli.env_file)?;
            print_summary(&config);
            if let Some(log) = open_exchange_log(&config)? {
                println!("exchange log:    {} exchanges", log.exchange_count()?);
            }
            if config.reply.mode == ReplyMode::Completion {
                let provider = build_provider(&config)?;
                let healthy = provider
                    .health_check()
                    .await
                    .context("completion API health check failed")?;
                if !healthy {
                    bail!(
                        "completion API at {} rejected the configured key",
                        config.llm.base_url
                    );
                }
                println!("completion API:  reachable ({})", provider.provider_id());
            }
        }
    }

    Ok(())
}

fn print_summary(config: &AppConfig) {
    println!("listen:          {}", config.gateway.bind_addr());
    println!("phone number id: {}", config.whatsapp.phone_number_id);
    println!("access token:    {}", mask_secret(&config.whatsapp.access_token));
    println!("verify token:    {}", mask_secret(&config.whatsapp.verify_token));
    println!(
        "graph api:       {}/{}",
        config.whatsapp.api_base_url, config.whatsapp.api_version
    );
    println!("reply mode:      {:?}", config.reply.mode);
    match config.reply.mode {
        ReplyMode::Completion => {
            println!(
                "model:           {} at {}",
                config.llm.model, config.llm.base_url
            );
            println!(
                "api key:         {}",
                config
                    .llm
                    .api_key
                    .as_deref()
                    .map(mask_secret)
                    .unwrap_or_else(|| "(unset)".to_string())
            );
            println!(
                "history:         {} turns, {:?} scope",
                config.conversation.history_length, config.conversation.history_scope
            );
            println!(
                "word limit:      {}",
                config.conversation.reply_word_limit
            );
        }
        ReplyMode::Fixed => println!("fixed reply:     {:?}", config.reply.fixed_text),
    }
    println!("request timeout: {:?}", config.request_timeout);
    if let Some(path) = &config.storage.exchange_log_path {
        println!("exchange log:    {}", path.display());
    }
}
