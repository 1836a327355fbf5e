use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spotlight_core::config::EngineConfig;
use spotlight_engine::Engine;
use spotlight_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "spotlight", version, about = "Streaming workflow execution plane")]
struct Cli {
    /// Path to config file (defaults apply when it does not exist)
    #[arg(short, long, env = "SPOTLIGHT_CONFIG", default_value = "spotlight.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP/SSE gateway (default)
    Serve,
    /// Print the effective configuration
    Config,
    /// List registered workflows
    Workflows,
    /// List native tools with their descriptions
    Tools,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "spotlight", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = EngineConfig::load_or_default(&cli.config)?;
    config.apply_env_overrides()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .with_target(false)
        .init();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Workflows => {
            for id in Engine::new(config).workflows().ids() {
                println!("{}", id);
            }
        }
        Commands::Tools => {
            let engine = Engine::new(config);
            let registry = engine.native_tools();
            for name in registry.list() {
                if let Some(def) = registry.definition(name) {
                    println!("{:<16} {}", def.name, def.description);
                }
            }
        }
        Commands::Serve => {
            let engine = Engine::new(config);
            info!(
                bind = %engine.config().server.bind,
                workflows = ?engine.workflows().ids(),
                "Starting gateway"
            );
            let server = GatewayServer::new(engine);
            let cancel = CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down gateway...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
