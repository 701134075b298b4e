use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use tally_config::{ConfigLoader, TallyConfig};
use tally_core::{parse_transactions, Transaction, DATE_FORMAT};
use tally_ledger::{Ledger, QueryOptions};
use tally_sync::{
    downloader_fn, FsLedgerFile, LedgerFile, Store, SyncSettings, TransactionMutator,
};
use tracing::{info, warn};

use crate::telemetry::init_tracing;

#[derive(Parser)]
#[command(name = "tally", about = "Plain-text ledger checker, query tool and sync store")]
pub struct Cli {
    /// Configuration environment, loads config/<env>.toml over config/default.toml
    #[arg(long, global = true)]
    env: Option<String>,
    /// Extra configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Ledger file, overriding `ledger.path`
    #[arg(long, short, global = true)]
    file: Option<PathBuf>,
    /// Log filter, overriding `log.level`
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Parse and validate the ledger
    Check,
    /// Print the ledger in canonical form
    Fmt {
        /// Rewrite the ledger file in place
        #[arg(long)]
        write: bool,
    },
    /// Search transactions, newest page first
    Query(QueryArgs),
    /// Account balances over a date range
    Balances(BalanceArgs),
    /// Rename an account across every posting
    Rename {
        old: String,
        new: String,
        /// Also rename accounts nested under OLD
        #[arg(long, conflicts_with_all = ["old_id", "new_id"])]
        nested: bool,
        /// Posting ID prefix to replace on renamed postings
        #[arg(long, requires = "new_id")]
        old_id: Option<String>,
        #[arg(long, requires = "old_id")]
        new_id: Option<String>,
    },
    /// Merge transactions from another ledger file
    Import { source: PathBuf },
    /// Sync transactions from a source ledger file through the sync windows
    Sync(SyncArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct QueryArgs {
    #[arg(long, default_value = "")]
    search: String,
    #[arg(long, value_parser = parse_date)]
    start: Option<NaiveDate>,
    #[arg(long, value_parser = parse_date)]
    end: Option<NaiveDate>,
    #[arg(long = "account")]
    accounts: Vec<String>,
    #[arg(long, default_value_t = 1)]
    page: usize,
    #[arg(long, default_value_t = 10)]
    results: usize,
}

#[derive(Args)]
pub struct BalanceArgs {
    /// Sum this account and its nested accounts instead of listing every account
    #[arg(long)]
    account: Option<String>,
    #[arg(long, value_parser = parse_date)]
    start: Option<NaiveDate>,
    #[arg(long, value_parser = parse_date)]
    end: Option<NaiveDate>,
    /// Skip accounts nested under this prefix
    #[arg(long, conflicts_with = "account")]
    exclude: Vec<String>,
}

#[derive(Args)]
pub struct SyncArgs {
    /// Ledger file standing in for the institution feed
    #[arg(long)]
    source: PathBuf,
    /// First date to sync; defaults to the last transaction in the ledger
    #[arg(long, value_parser = parse_date)]
    start: Option<NaiveDate>,
    #[arg(long, value_parser = parse_date, requires = "start")]
    end: Option<NaiveDate>,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut loader = ConfigLoader::new();
    if let Some(env) = &cli.env {
        loader = loader.env(env);
    }
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    let mut config = loader.load()?;
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
    if let Some(path) = &cli.file {
        config.ledger.path = path.clone();
    }
    init_tracing(&config.log)?;

    match cli.command {
        Command::Check => check(&config),
        Command::Fmt { write } => format(&config, write),
        Command::Query(args) => query(&config, args),
        Command::Balances(args) => balances(&config, args),
        Command::Rename {
            old,
            new,
            nested,
            old_id,
            new_id,
        } => rename(
            &config,
            &old,
            &new,
            nested,
            old_id.as_deref().unwrap_or_default(),
            new_id.as_deref().unwrap_or_default(),
        ),
        Command::Import { source } => import(&config, &source),
        Command::Sync(args) => sync(&config, args).await,
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| format!("expected YYYY/MM/DD or YYYY-MM-DD, got {value:?}"))
}

fn load_ledger(path: &Path) -> Result<Ledger> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ledger::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to load {}", path.display()))
}

fn read_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    parse_transactions(BufReader::new(file))
        .with_context(|| format!("failed to parse {}", path.display()))
}

fn open_store(config: &TallyConfig) -> Result<Arc<Store>> {
    let settings: SyncSettings = config.sync.settings()?;
    let file: Arc<dyn LedgerFile> = Arc::new(FsLedgerFile::new(&config.ledger.path));
    let store = Store::with_settings(file, settings)
        .with_context(|| format!("failed to open {}", config.ledger.path.display()))?;
    Ok(Arc::new(store))
}

fn check(config: &TallyConfig) -> Result<()> {
    let ledger = load_ledger(&config.ledger.path)?;
    ledger.validate().context("ledger is not valid")?;
    match (ledger.first_transaction_date(), ledger.last_transaction_date()) {
        (Some(first), Some(last)) => println!(
            "ok: {} transactions from {} to {}",
            ledger.len(),
            first.format(DATE_FORMAT),
            last.format(DATE_FORMAT)
        ),
        _ => println!("ok: empty ledger"),
    }
    Ok(())
}

fn format(config: &TallyConfig, write: bool) -> Result<()> {
    let ledger = load_ledger(&config.ledger.path)?;
    let rendered = ledger.to_string();
    if write {
        FsLedgerFile::new(&config.ledger.path)
            .write(rendered.as_bytes())
            .with_context(|| format!("failed to write {}", config.ledger.path.display()))?;
        info!(path = %config.ledger.path.display(), "formatted ledger");
    } else {
        print!("{rendered}");
    }
    Ok(())
}

fn query(config: &TallyConfig, args: QueryArgs) -> Result<()> {
    let ledger = load_ledger(&config.ledger.path)?;
    let options = QueryOptions::default()
        .with_search(args.search)
        .with_date_range(args.start, args.end)
        .with_accounts(args.accounts);
    let result = ledger.query(&options, args.page, args.results)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn balances(config: &TallyConfig, args: BalanceArgs) -> Result<()> {
    let ledger = load_ledger(&config.ledger.path)?;
    match args.account {
        Some(account) => {
            let balance = ledger.account_balance(&account, args.start, args.end);
            println!("{account}  {balance}");
        }
        None => {
            let balances =
                ledger.left_over_account_balances(args.start, args.end, args.exclude.as_slice());
            for (account, balance) in balances {
                println!("{account}  {balance}");
            }
        }
    }
    Ok(())
}

fn rename(
    config: &TallyConfig,
    old: &str,
    new: &str,
    nested: bool,
    old_id: &str,
    new_id: &str,
) -> Result<()> {
    let store = open_store(config)?;
    let renamed = if nested {
        store.update_account(old, new)?
    } else {
        store.rename_account(old, new, old_id, new_id)?
    };
    println!("renamed {renamed} postings");
    Ok(())
}

fn import(config: &TallyConfig, source: &Path) -> Result<()> {
    let store = open_store(config)?;
    let transactions = read_transactions(source)?;
    let offered = transactions.len();
    store.add_transactions(transactions)?;
    println!("imported {offered} transactions, ledger has {}", store.ledger().len());
    Ok(())
}

async fn sync(config: &TallyConfig, args: SyncArgs) -> Result<()> {
    let store = open_store(config)?;
    let feed = Arc::new(read_transactions(&args.source)?);
    let today = Utc::now().date_naive();
    let last_day = args.end.unwrap_or(today);

    // windows share their boundary day, so only the final window includes its end
    let downloader = Arc::new(downloader_fn(move |start: NaiveDate, end: NaiveDate| {
        let feed = Arc::clone(&feed);
        async move {
            Ok(feed
                .iter()
                .filter(|txn| txn.date >= start && (txn.date < end || end >= last_day))
                .cloned()
                .collect::<Vec<_>>())
        }
    }));
    let mutator: Arc<dyn TransactionMutator> = Arc::new(|_: &mut [Transaction]| {});

    let handle = match args.start {
        Some(start) => store.start_sync(start, last_day, downloader, mutator),
        None => store.sync_recent(downloader, mutator),
    }
    .ok_or_else(|| anyhow!("a sync is already running"))?;
    handle.await.context("sync task panicked")?;

    let (_, error) = store.sync_status();
    if let Some(err) = error {
        if !err.is_soft() {
            bail!("sync failed: {err}");
        }
        warn!(error = %err, "sync finished with errors");
        eprintln!("warning: {err}");
    }
    println!("synced, ledger has {} transactions", store.ledger().len());
    Ok(())
}
