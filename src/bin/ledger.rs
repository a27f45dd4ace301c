use std::{
    collections::HashMap,
    error::Error,
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use clap::{Parser, Subcommand};
use rusqlite::Connection;
use time::{Date, macros::format_description};
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use ledger_rs::{
    AdmissionMode, Budget, DEFAULT_CACHE_TTL, LedgerConfig, SpendScope, Transaction, cancellation,
    create_ledger, parse_transactions_csv,
};

/// A budget-enforcing expense ledger.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the ledger's SQLite database.
    #[arg(long, default_value = "ledger.db")]
    db_path: PathBuf,

    /// Which committed transactions count towards a budget.
    #[arg(long, value_enum, default_value_t = SpendScope::Lifetime)]
    spend_scope: SpendScope,

    /// Whether admissions in the same category are serialized.
    #[arg(long, value_enum, default_value_t = AdmissionMode::Unserialized)]
    admission: AdmissionMode,

    /// How many seconds summaries and the budget list stay cached.
    #[arg(long, default_value_t = DEFAULT_CACHE_TTL.as_secs())]
    summary_ttl_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set the spending limit for a category.
    SetBudget {
        /// The category name.
        category: String,
        /// The maximum amount that may be spent in the category.
        limit: f64,
    },
    /// List every budget.
    Budgets,
    /// Add a single transaction if it fits its category's budget.
    Add {
        /// The amount spent.
        #[arg(long)]
        amount: f64,
        /// The budget category.
        #[arg(long)]
        category: String,
        /// The date of the transaction as YYYY-MM-DD.
        #[arg(long, value_parser = parse_date)]
        date: Date,
        /// What the transaction was for.
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Import transactions from a CSV file with the header
    /// `date,amount,category,description`.
    Import {
        /// Path to the CSV file.
        csv_path: PathBuf,
        /// The number of concurrent workers.
        #[arg(short, long, default_value_t = 4)]
        workers: usize,
    },
    /// List every committed transaction, newest first.
    Transactions,
    /// Print spending per category between two dates (inclusive).
    Summary {
        /// The first day of the range as YYYY-MM-DD.
        #[arg(value_parser = parse_date)]
        from: Date,
        /// The last day of the range as YYYY-MM-DD.
        #[arg(value_parser = parse_date)]
        to: Date,
    },
}

fn parse_date(text: &str) -> Result<Date, String> {
    Date::parse(text, format_description!("[year]-[month]-[day]"))
        .map_err(|_| ledger_rs::Error::InvalidDate(text.to_owned()).to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_logging()?;

    let args = Args::parse();

    let config = LedgerConfig {
        spend_scope: args.spend_scope,
        admission_mode: args.admission,
        cache_ttl: Duration::from_secs(args.summary_ttl_secs),
    };
    tracing::debug!("opening {:?} with {config:?}", args.db_path);

    let connection = Connection::open(&args.db_path)?;
    let ledger = create_ledger(connection, config)?;

    match args.command {
        Command::SetBudget { category, limit } => {
            ledger.set_budget(Budget::new(&category, limit)?).await?;
            println!("Set budget for {category} to {limit:.2}");
        }
        Command::Budgets => {
            let budgets = ledger.list_budgets().await?;

            if budgets.is_empty() {
                println!("No budgets set.");
            }

            for (category, budget) in budgets {
                println!("{category}: {:.2}", budget.limit);
            }
        }
        Command::Add {
            amount,
            category,
            date,
            description,
        } => {
            let builder = Transaction::build(amount, &category, date).description(&description);
            let transaction = ledger.add_transaction(builder).await?;
            println!(
                "Added transaction {} of {:.2} in {}",
                transaction.id, transaction.amount, transaction.category
            );
        }
        Command::Import { csv_path, workers } => {
            let text = fs::read_to_string(&csv_path)?;
            let transactions = parse_transactions_csv(&text)?;

            let (handle, signal) = cancellation();
            tokio::spawn(async move {
                if let Err(error) = tokio::signal::ctrl_c().await {
                    tracing::error!("could not listen for Ctrl+C: {error}");
                    return;
                }
                tracing::info!("received Ctrl+C, cancelling import");
                handle.cancel();
            });

            let result = ledger.bulk_add(transactions, workers, signal).await?;

            println!("Accepted {}, rejected {}", result.accepted, result.rejected);

            for line in rejection_report(result.errors) {
                println!("  {line}");
            }
        }
        Command::Transactions => {
            for transaction in ledger.list_transactions().await? {
                println!(
                    "{} {} {:.2} {} {}",
                    transaction.id,
                    transaction.date,
                    transaction.amount,
                    transaction.category,
                    transaction.description
                );
            }
        }
        Command::Summary { from, to } => {
            let summary = ledger.summary(from, to).await?;

            println!("{}", serde_json::to_string_pretty(&summary)?);

            if summary.from_cache {
                tracing::info!("summary served from cache");
            }
        }
    }

    Ok(())
}

/// One line per rejected row, in file order.
///
/// Rows are numbered from 1 and exclude the header. A quoted field may span
/// several physical lines, so row numbers are not file line numbers.
fn rejection_report(errors: HashMap<usize, String>) -> Vec<String> {
    let mut errors: Vec<_> = errors.into_iter().collect();
    errors.sort_unstable_by_key(|(index, _)| *index);

    errors
        .into_iter()
        .map(|(index, message)| format!("row {}: {message}", index + 1))
        .collect()
}

fn setup_logging() -> Result<(), Box<dyn Error>> {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(std::io::stderr);

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")?;

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_ansi(false)
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    Ok(())
}
