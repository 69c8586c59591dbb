use billrun::application::engine::{BillingEngine, DEFAULT_CONCURRENCY};
use billrun::domain::customer::Customer;
use billrun::domain::invoice::Money;
use billrun::domain::ports::{BillingStore, BillingStoreBox, PaymentGatewayBox};
use billrun::infrastructure::gateway::SimulatedGateway;
use billrun::infrastructure::in_memory::InMemoryStore;
#[cfg(feature = "storage-rocksdb")]
use billrun::infrastructure::rocksdb::RocksDbStore;
use billrun::interfaces::csv::invoice_reader::InvoiceReader;
use billrun::interfaces::csv::report_writer::ReportWriter;
use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed invoices from a CSV file and run one billing cycle.
    Run {
        /// Input invoice seed CSV file
        input: PathBuf,

        /// Path to persistent database (optional). If provided, uses RocksDB.
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Maximum number of invoices charged concurrently
        #[arg(long, env = "BILLRUN_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// How the simulated payment gateway responds
        #[arg(long, value_enum, default_value_t = GatewayMode::Flaky)]
        gateway: GatewayMode,
    },
    /// Print the billing attempts recorded in a given month.
    Report {
        /// Path to the persistent database written by a previous run
        #[arg(long)]
        db_path: PathBuf,

        #[arg(long)]
        year: i32,

        #[arg(long)]
        month: u32,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GatewayMode {
    /// Capture every charge
    Approve,
    /// Decline every charge
    Decline,
    /// Mostly capture, with occasional declines and network errors
    Flaky,
}

impl GatewayMode {
    fn gateway(self) -> PaymentGatewayBox {
        match self {
            GatewayMode::Approve => Box::new(SimulatedGateway::approving()),
            GatewayMode::Decline => Box::new(SimulatedGateway::declining()),
            GatewayMode::Flaky => Box::new(SimulatedGateway::flaky(0.8)),
        }
    }
}

fn open_store(db_path: Option<PathBuf>) -> Result<BillingStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Ok(Box::new(RocksDbStore::open(path).into_diagnostic()?)),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => Err(miette::miette!(
            "this build has no persistent storage; rebuild with --features storage-rocksdb"
        )),
        None => Ok(Box::new(InMemoryStore::new())),
    }
}

/// Creates the customers and invoices described by the seed file.
///
/// The first row seen for a customer key fixes that customer's currency;
/// later rows with a different currency still create invoices, which the
/// gateway will classify as currency mismatches.
async fn seed_invoices(store: &dyn BillingStore, input: PathBuf) -> Result<usize> {
    let file = File::open(input).into_diagnostic()?;
    let reader = InvoiceReader::new(file);

    let mut customers: HashMap<u32, Customer> = HashMap::new();
    let mut seeded = 0;
    for record in reader.records() {
        match record {
            Ok(record) => {
                let customer = match customers.get(&record.customer) {
                    Some(customer) => *customer,
                    None => {
                        let customer = store
                            .create_customer(record.currency)
                            .await
                            .into_diagnostic()?;
                        customers.insert(record.customer, customer);
                        customer
                    }
                };
                store
                    .create_invoice(customer.id, Money::new(record.amount, record.currency))
                    .await
                    .into_diagnostic()?;
                seeded += 1;
            }
            Err(e) => {
                eprintln!("Error reading seed record: {}", e);
            }
        }
    }
    Ok(seeded)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            input,
            db_path,
            concurrency,
            gateway,
        } => {
            let store = open_store(db_path)?;
            let seeded = seed_invoices(store.as_ref(), input).await?;
            tracing::info!(seeded, "seeded invoices");

            let engine = BillingEngine::new(store, gateway.gateway()).with_concurrency(concurrency);
            let report = engine.run_billing_cycle().await.into_diagnostic()?;

            for failure in &report.failures {
                eprintln!(
                    "Error processing invoice {}: {}",
                    failure.invoice_id, failure.error
                );
            }

            let mut finalized = report.finalized;
            finalized.sort_by_key(|attempt| attempt.id);
            let stdout = io::stdout();
            let mut writer = ReportWriter::new(stdout.lock());
            writer.write_attempts(finalized).into_diagnostic()?;
        }
        Command::Report {
            db_path,
            year,
            month,
        } => {
            let store = open_store(Some(db_path))?;
            let attempts = store
                .fetch_attempts_by_month(year, month)
                .await
                .into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = ReportWriter::new(stdout.lock());
            writer.write_attempts(attempts).into_diagnostic()?;
        }
    }

    Ok(())
}
