mod config;
mod error;
mod loader;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::loader::{load_category_rules, load_keywords};
use crate::pipeline::Pipeline;
use crate::storage::Repository;

#[derive(Parser)]
#[command(name = "market-crawler", about = "Marketplace product and price crawler", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Search every keyword on every marketplace and store what is found
    Crawl {
        /// Newline-delimited keyword list (default: pipeline.keywords_path)
        #[arg(short, long)]
        keywords: Option<PathBuf>,

        /// Selector profile document (default: pipeline.selectors_path)
        #[arg(short, long)]
        selectors: Option<PathBuf>,

        /// Only crawl these marketplaces (repeatable)
        #[arg(short = 'm', long = "marketplace")]
        marketplaces: Vec<String>,

        /// Cards read per search page
        #[arg(long)]
        max_results: Option<usize>,
    },

    /// Show database statistics
    Stats,

    /// Print the recorded price series of one product
    History {
        product_id: i64,

        /// Also write the series to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Show which category a keyword is filed under
    Classify { keyword: String },

    /// Apply schema migrations without crawling
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "market_crawler=info,warn",
        1 => "market_crawler=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let mut config = AppConfig::load()?;

    match cli.command {
        Command::Crawl {
            keywords,
            selectors,
            marketplaces,
            max_results,
        } => {
            if let Some(path) = keywords {
                config.pipeline.keywords_path = path;
            }
            if let Some(path) = selectors {
                config.pipeline.selectors_path = path;
            }
            if let Some(n) = max_results {
                config.pipeline.max_results = n;
                for m in &mut config.marketplaces {
                    m.max_results = None;
                }
            }

            let keywords = load_keywords(&config.pipeline.keywords_path)?;
            if keywords.is_empty() {
                info!("Keyword list is empty, nothing to crawl");
                return Ok(());
            }

            let _t = utils::Timer::start("Crawl");
            let pipeline = Pipeline::from_config(&config, &marketplaces)?;
            let stats = pipeline.run(&keywords).await?;
            info!(
                "Done: {} passes, {} products, {} prices, {} errors",
                stats.passes, stats.products_saved, stats.prices_recorded, stats.errors
            );
        }

        Command::Stats => {
            let repo = Repository::open(&config.storage.db_path)?;
            let counts = repo.table_counts()?;
            let (min, max) = repo.crawl_range().unwrap_or((None, None));
            println!("─────────────────────────────────");
            println!("  Market Crawler — Database Stats");
            println!("─────────────────────────────────");
            println!("  Stores     : {}", utils::fmt_number(counts.stores));
            println!("  Categories : {}", utils::fmt_number(counts.categories));
            println!("  Products   : {}", utils::fmt_number(counts.products));
            println!("  Images     : {}", utils::fmt_number(counts.images));
            println!("  Prices     : {}", utils::fmt_number(counts.prices));
            println!("  From       : {}", min.map(|d| d.to_string()).unwrap_or("—".into()));
            println!("  To         : {}", max.map(|d| d.to_string()).unwrap_or("—".into()));
            if let Some((id, started, status)) = repo.last_crawl_run().unwrap_or(None) {
                println!("  Last run   : #{} {} ({})", id, started, status);
            }
            println!("─────────────────────────────────");
        }

        Command::History { product_id, csv } => {
            let repo = Repository::open(&config.storage.db_path)?;
            let Some(product) = repo.find_product(product_id)? else {
                println!("No product #{}", product_id);
                return Ok(());
            };
            let history = repo.price_history(product_id)?;

            println!("#{} {}", product.id, product.name);
            println!("  {}", product.purchase_url);
            for (k, v) in &product.key_features {
                println!("  {}: {}", k, v);
            }
            for img in repo.images_for(product_id)? {
                println!("  {} {}", if img.is_main { "[main]" } else { "      " }, img.url);
            }
            for p in &history {
                println!("  {}  {:>12}", p.crawled_at, p.price);
            }

            if let Some(path) = csv {
                let mut w = ::csv::Writer::from_path(&path)
                    .with_context(|| format!("Failed to create {:?}", path))?;
                for p in &history {
                    w.serialize(p)?;
                }
                w.flush()?;
                println!("{} rows written to {:?}", history.len(), path);
            }
        }

        Command::Classify { keyword } => {
            let rules = load_category_rules(config.pipeline.category_rules_path.as_deref())?;
            println!("{}", rules.classify(&keyword));
        }

        Command::Migrate => {
            Repository::open(&config.storage.db_path)?.run_migrations()?;
            println!("Migrations applied.");
        }
    }

    Ok(())
}
