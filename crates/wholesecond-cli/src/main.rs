use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wholesecond_core::{Config, ConfigError};

mod commands;

use commands::Context;

/// Environment variable holding a `tracing` filter; overrides `logging.filter`.
const LOG_ENV: &str = "WHOLESECOND_LOG";

#[derive(Parser)]
#[command(name = "wholesecond", version, about = "Hit the whole second")]
struct Cli {
    /// Player id (defaults to `player.default_id` from the config)
    #[arg(long, global = true)]
    player: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit and inspect attempts
    Attempt {
        #[command(subcommand)]
        action: commands::attempt::AttemptAction,
    },
    /// Session status and administration
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Interactive play: press Enter on the whole second, `q` to quit
    Play,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_logging(config: Option<&Config>) {
    let configured = config.map_or("warn", Config::log_filter);
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run a game command; these refuse to start without a readable config.
fn with_context(
    loaded: Result<Config, ConfigError>,
    player: Option<String>,
    run: impl FnOnce(&Context) -> Result<(), Box<dyn std::error::Error>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::new(loaded?, player);
    run(&ctx)
}

fn main() {
    let cli = Cli::parse();
    let loaded = Config::load();
    init_logging(loaded.as_ref().ok());

    let player = cli.player;
    let result = match cli.command {
        Commands::Attempt { action } => {
            with_context(loaded, player, |ctx| commands::attempt::run(action, ctx))
        }
        Commands::Session { action } => {
            with_context(loaded, player, |ctx| commands::session::run(action, ctx))
        }
        Commands::Play => with_context(loaded, player, commands::play::run),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
