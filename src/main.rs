use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use sensiscan_lib::config::{ScanConfig, APP_VERSION};
use sensiscan_lib::db::repository::{ScanStore, SqliteScanStore, DEFAULT_PAGE_SIZE};
use sensiscan_lib::models::ScanStrategy;
use sensiscan_lib::pipeline::processor::{build_processor, ScanInput};

#[derive(Parser)]
#[command(
    name = "sensiscan",
    version = APP_VERSION,
    about = "Detect personal, health and payment data in documents and images"
)]
struct Cli {
    /// Scan database (overrides SENSISCAN_DATABASE)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a file and store the result
    Scan {
        path: PathBuf,
        /// Declared media type; guessed from the extension when omitted
        #[arg(long)]
        media_type: Option<String>,
        /// Detection strategy (remote or local)
        #[arg(long)]
        strategy: Option<ScanStrategy>,
    },
    /// List stored results, newest first
    List {
        #[arg(default_value_t = 1)]
        page: u32,
        #[arg(default_value_t = DEFAULT_PAGE_SIZE)]
        limit: u32,
    },
    /// Delete a stored result
    Delete { id: Uuid },
}

fn main() -> ExitCode {
    sensiscan_lib::init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let mut config = ScanConfig::from_env()?;
    if let Some(path) = cli.database {
        config.database_path = path;
    }

    match cli.command {
        Commands::Scan {
            path,
            media_type,
            strategy,
        } => {
            if let Some(strategy) = strategy {
                config.strategy = strategy;
            }
            let bytes = std::fs::read(&path)?;
            let media_type = media_type.unwrap_or_else(|| {
                mime_guess::from_path(&path)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            let processor = build_processor(&config)?;
            let outcome = processor.scan(ScanInput {
                file_name,
                media_type,
                bytes,
            })?;

            #[derive(Serialize)]
            struct Printed<'a> {
                id: Uuid,
                file_name: &'a str,
                media_type: &'a str,
                sensitive_data: &'a sensiscan_lib::models::SensitiveData,
                created_at: chrono::DateTime<chrono::Utc>,
            }
            print_json(&Printed {
                id: outcome.id,
                file_name: &outcome.record.file_name,
                media_type: &outcome.record.media_type,
                sensitive_data: &outcome.record.sensitive_data,
                created_at: outcome.record.created_at,
            })?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::List { page, limit } => {
            let store = SqliteScanStore::open(&config.database_path)?;
            print_json(&store.list(page, limit)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Delete { id } => {
            let store = SqliteScanStore::open(&config.database_path)?;
            if store.delete_by_id(&id)? {
                println!("Deleted {id}");
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("No scan result with id {id}");
                Ok(ExitCode::from(2))
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
