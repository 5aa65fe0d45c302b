use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use minisql::{Database, EngineConfig, config::DEFAULT_LOG_FILTER};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "minisql")]
#[command(about = "Runs SQL commands against a minisql database", long_about = None)]
struct Args {
    /// JSON file holding the tables (in-memory only when omitted)
    #[arg(long, env = "MINISQL_DATA_FILE")]
    data_file: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "MINISQL_LOG", default_value = DEFAULT_LOG_FILTER)]
    log: String,

    /// `;`-separated commands; read from stdin when omitted
    sql: Option<String>,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let config = EngineConfig {
        data_file: args.data_file,
        log_filter: args.log,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let sql = match args.sql {
        Some(sql) => sql,
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            input
        }
    };

    let mut db = Database::open(&config)?;
    match db.execute_batch(&sql) {
        Ok(results) => {
            for result in results {
                println!("{}", serde_json::to_string(&result)?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::debug!("Command failed: {}", e);
            println!("{}", serde_json::to_string(&e.report())?);
            Ok(ExitCode::FAILURE)
        }
    }
}
