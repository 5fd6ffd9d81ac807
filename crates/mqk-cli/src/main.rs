//! mqk-cli entry point (C7): Phase-1 screening, Phase-2 decisions, database
//! lifecycle, config hashing, and benchmark export, all as thin wrappers
//! around the portfolio/strategy/benchmark crates (§6).

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mqk")]
#[command(about = "Crypto swing-trading engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Phase-1: screen the universe and emit the selector's candidate JSON.
    Screen {
        /// Layered config paths in merge order.
        #[arg(long = "config", value_name = "PATH")]
        config_paths: Vec<String>,

        /// Comma-separated symbol override (defaults to the configured universe).
        #[arg(long)]
        symbols: Option<String>,

        #[arg(long, default_value = "1h")]
        interval: String,

        #[arg(long, default_value = "60d")]
        period: String,

        /// Write the Phase-1 document here instead of stdout.
        #[arg(long)]
        output: Option<String>,
    },

    /// Phase-2: apply admission/rotation/cool-down against a Phase-1 document.
    Decide {
        /// Path to the Phase-1 candidates JSON file.
        candidates_json: String,

        #[arg(long = "db-path")]
        db_path: Option<String>,

        #[arg(long, default_value = "ko")]
        language: String,

        #[arg(long, default_value = "1h")]
        timeframe: String,

        #[arg(long)]
        execute_trades: bool,

        #[arg(long = "trade-mode", default_value = "paper")]
        trade_mode: String,

        #[arg(long = "quote-amount", default_value_t = 100.0)]
        quote_amount: f64,

        #[arg(long = "rotation-reentry-cooldown-hours", default_value_t = 0.0)]
        rotation_reentry_cooldown_hours: f64,

        #[arg(long = "config", value_name = "PATH")]
        config_paths: Vec<String>,

        /// Append-only hash-chained audit log (JSON Lines). Skipped when unset.
        #[arg(long = "audit-log")]
        audit_log: Option<String>,
    },

    /// Database lifecycle commands.
    Db {
        #[command(subcommand)]
        cmd: DbCmd,

        #[arg(long = "db-path", global = true)]
        db_path: Option<String>,
    },

    /// Compute the layered config hash and print canonical JSON.
    ConfigHash {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Export the read-only benchmark document (C9).
    BenchmarkExport {
        #[arg(long = "db-path")]
        db_path: Option<String>,

        #[arg(long)]
        output: Option<String>,

        #[arg(long = "scheduler-log")]
        scheduler_log: Option<String>,

        #[arg(long = "config", value_name = "PATH")]
        config_paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Screen { config_paths, symbols, interval, period, output } => {
            commands::screen::run(commands::screen::ScreenArgs {
                config_paths,
                symbols: symbols.map(|s| s.split(',').map(|x| x.trim().to_uppercase()).filter(|x| !x.is_empty()).collect()),
                interval,
                period,
                output,
            })
            .await?;
        }

        Commands::Decide {
            candidates_json,
            db_path,
            language,
            timeframe,
            execute_trades,
            trade_mode,
            quote_amount,
            rotation_reentry_cooldown_hours,
            config_paths,
            audit_log,
        } => {
            commands::decide::run(commands::decide::DecideArgs {
                candidates_json,
                db_path,
                language,
                timeframe,
                execute_trades,
                trade_mode,
                quote_amount,
                rotation_reentry_cooldown_hours,
                config_paths,
                audit_log,
            })
            .await?;
        }

        Commands::Db { cmd, db_path } => match cmd {
            DbCmd::Status => commands::db::status(db_path.as_deref()).await?,
            DbCmd::Migrate => commands::db::migrate(db_path.as_deref()).await?,
        },

        Commands::ConfigHash { paths } => commands::config::hash(&paths)?,

        Commands::BenchmarkExport { db_path, output, scheduler_log, config_paths } => {
            commands::benchmark::run(commands::benchmark::BenchmarkArgs { db_path, output, scheduler_log, config_paths })
                .await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}
