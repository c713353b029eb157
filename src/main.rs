use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use realfx::history_provider::Period;
use realfx::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display a normalized price chart for a symbol
    Chart {
        /// Ticker code or company name
        symbol: String,

        /// Data window: 1y, 5y, 10y or max
        #[arg(short, long, default_value = "10y")]
        period: String,

        /// Number of trailing rows to display
        #[arg(short, long, default_value_t = 10)]
        tail: usize,

        /// Emit the full series as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Search the symbol directory by name or code
    Search {
        /// Name fragment or ticker code
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(Commands::Chart {
            symbol,
            period,
            tail,
            json,
        }) => {
            let period: Period = period.parse()?;
            realfx::run_command(
                realfx::AppCommand::Chart {
                    symbol,
                    period,
                    tail,
                    json,
                },
                cli.config_path.as_deref(),
            )
            .await
        }
        Some(Commands::Search { query }) => {
            realfx::run_command(
                realfx::AppCommand::Search { query },
                cli.config_path.as_deref(),
            )
            .await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> anyhow::Result<()> {
    use anyhow::Context;

    let path = realfx::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
currency:
  local: "KRW"
  reference: "USD"
  exchange_symbol: "KRW=X"

providers:
  yahoo:
    base_url: "https://query1.finance.yahoo.com"
  fred:
    base_url: "https://api.stlouisfed.org"
    # api_key: "your-fred-api-key"
    series_id: "CPIAUCSL"

commodity:
  symbol: "GC=F"

benchmark:
  symbol: "^KS11"
  currency: local
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
