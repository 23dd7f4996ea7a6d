use clap::Parser;
use miette::{IntoDiagnostic, Result};
use split_ledger::application::ledger::SplitLedger;
use split_ledger::config::LedgerConfig;
use split_ledger::domain::ports::{NotifierBox, SplitStoreBox, UserDirectoryBox};
use split_ledger::infrastructure::in_memory::{InMemorySplitStore, InMemoryUserDirectory};
use split_ledger::infrastructure::notifier::TracingNotifier;
use split_ledger::interfaces::csv::command_reader::CommandReader;
use split_ledger::interfaces::csv::split_writer::SplitWriter;
use split_ledger::interfaces::script::ScriptRunner;
use split_ledger::telemetry::{self, LogFormat};
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ledger script (CSV of commands)
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Payee identifier used in payment intents
    #[arg(long, default_value = LedgerConfig::DEFAULT_PAYEE)]
    payee: String,

    /// Currency code used in payment intents
    #[arg(long, default_value = LedgerConfig::DEFAULT_CURRENCY)]
    currency: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

fn in_memory() -> (SplitStoreBox, UserDirectoryBox) {
    (
        Box::new(InMemorySplitStore::new()),
        Box::new(InMemoryUserDirectory::new()),
    )
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<PathBuf>) -> Result<(SplitStoreBox, UserDirectoryBox)> {
    use split_ledger::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            let store = RocksDBStore::open(path)?;
            let splits: SplitStoreBox = Box::new(store.clone());
            let users: UserDirectoryBox = Box::new(store);
            Ok((splits, users))
        }
        None => Ok(in_memory()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<PathBuf>) -> Result<(SplitStoreBox, UserDirectoryBox)> {
    if db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_format);

    let (splits, users) = open_stores(cli.db_path)?;
    let notifier: NotifierBox = Box::new(TracingNotifier);
    let ledger = SplitLedger::with_config(
        splits,
        users,
        notifier,
        LedgerConfig::new(cli.payee, cli.currency),
    );

    let file = File::open(cli.input).into_diagnostic()?;
    ScriptRunner::new(&ledger)
        .run(CommandReader::new(file))
        .await;

    let splits = ledger.all_splits().await?;
    let stdout = io::stdout();
    let mut writer = SplitWriter::new(stdout.lock());
    writer.write_splits(&splits)?;

    Ok(())
}
