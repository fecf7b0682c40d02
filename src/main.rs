use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use purchase_analytics::{
    init_logging, AppConfig, FeedLocation, PurchaseAnalytics, PurchaseRepository,
    CsvPurchaseRepository, JsonPurchaseRepository, SqlPurchaseRepository,
};

#[derive(Parser)]
#[command(name = "purchase-analytics")]
#[command(about = "Customer purchase analytics over SQL, CSV or JSON sources", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a CSV or JSON feed snapshot into the SQLite database
    Import {
        /// CSV feed (file path or http(s) URL)
        #[arg(long, conflicts_with = "json", required_unless_present = "json")]
        csv: Option<String>,

        /// JSON feed (file path or http(s) URL)
        #[arg(long)]
        json: Option<String>,

        /// Target database file
        #[arg(long, default_value = purchase_analytics::config::DEFAULT_DATABASE_PATH)]
        db: PathBuf,
    },
    /// Print every aggregate of the configured source
    Report,
    /// Total amount spent by a customer
    TotalSpent { customer_id: i64 },
    /// Customers who spent the most overall
    TopSpenders,
    /// Customers who spent the most in one category
    TopInCategory { category: String },
    /// Debt of a customer (-1 if unknown)
    Debt { customer_id: i64 },
    /// Whether a customer's cash covers their purchases
    CanPay { customer_id: i64 },
    /// Every customer with a positive debt
    Indebted,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Import { csv, json, db } => run_import(csv, json, db),
        command => run_query(command),
    }
}

fn run_import(csv: Option<String>, json: Option<String>, db: PathBuf) -> Result<()> {
    println!("🗄️  Import: feed → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load feed
    let source: Box<dyn PurchaseRepository> = match (csv, json) {
        (Some(csv), _) => Box::new(CsvPurchaseRepository::new(FeedLocation::parse(&csv))),
        (None, Some(json)) => Box::new(JsonPurchaseRepository::new(FeedLocation::parse(&json))),
        (None, None) => anyhow::bail!("either --csv or --json is required"),
    };
    println!("\n📂 Loading {} feed...", source.source_type());
    let purchase = source.get_purchases()?;
    println!(
        "✓ Loaded {} customers, {} purchases",
        purchase.customer_count(),
        purchase.purchase_count()
    );

    // 2. Store
    println!("\n💾 Writing {}...", db.display());
    let repo = SqlPurchaseRepository::open(&db)?;
    let written = repo.import(&purchase)?;

    // 3. Verify
    let count = repo.purchase_count()?;
    println!("✓ Inserted {} purchases ({} in database)", written, count);

    Ok(())
}

fn run_query(command: Commands) -> Result<()> {
    let config = AppConfig::from_env()?;
    let analytics = PurchaseAnalytics::new(config.build_repository()?);

    match command {
        Commands::Report => print_json(&analytics.report()?),
        Commands::TotalSpent { customer_id } => print_json(&analytics.total_spent(customer_id)?),
        Commands::TopSpenders => print_json(&analytics.top_spenders()?),
        Commands::TopInCategory { category } => {
            print_json(&analytics.top_spenders_in_category(&category)?)
        }
        Commands::Debt { customer_id } => print_json(&analytics.debt(customer_id)?),
        Commands::CanPay { customer_id } => print_json(&analytics.can_pay(customer_id)?),
        Commands::Indebted => print_json(&analytics.customers_with_debt()?),
        Commands::Import { .. } => anyhow::bail!("import does not run against the configured source"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
