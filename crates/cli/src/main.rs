//! Gem Catalog CLI - seeding and inspection tools.
//!
//! # Usage
//!
//! ```bash
//! # Load categories, products and CMS pages from a fixtures file
//! gc-cli --data catalog.json seed fixtures.yaml
//!
//! # List products, newest first, or by title prefix
//! gc-cli --data catalog.json products list
//! gc-cli --data catalog.json products list --search Ruby
//!
//! # List categories with their subcategories
//! gc-cli --data catalog.json categories list
//!
//! # Print a CMS page (stored content or the default template)
//! gc-cli --data catalog.json cms show privacy-policy
//! ```
//!
//! # Commands
//!
//! - `seed` - Load fixtures into the catalog data file
//! - `products list` - List products
//! - `categories list` - List the category tree
//! - `cms show` - Print a CMS page

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "gc-cli")]
#[command(author, version, about = "Gem catalog CLI tools")]
struct Cli {
    /// Catalog data file (defaults to `CATALOG_DATA_PATH`)
    #[arg(long, env = "CATALOG_DATA_PATH")]
    data: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load fixtures from a YAML file
    Seed {
        /// Path to the fixtures file
        file: PathBuf,
    },
    /// Inspect products
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// Inspect categories
    Categories {
        #[command(subcommand)]
        action: CategoriesAction,
    },
    /// Inspect CMS pages
    Cms {
        #[command(subcommand)]
        action: CmsAction,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List products
    List {
        /// Title prefix / text filter
        #[arg(short, long, default_value = "")]
        search: String,
    },
}

#[derive(Subcommand)]
enum CategoriesAction {
    /// List categories and their subcategories
    List,
}

#[derive(Subcommand)]
enum CmsAction {
    /// Print a page
    Show {
        /// Page slug (`privacy-policy`, `terms-conditions`)
        slug: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env before clap reads env-backed arguments
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = commands::open_store(&cli.data).await?;
    match cli.command {
        Commands::Seed { file } => {
            let summary = commands::seed::from_file(&store, &file).await?;
            tracing::info!(
                categories = summary.categories,
                subcategories = summary.subcategories,
                products = summary.products,
                pages = summary.pages,
                "Seeding complete"
            );
        }
        Commands::Products { action } => match action {
            ProductsAction::List { search } => commands::list::products(&store, &search).await?,
        },
        Commands::Categories { action } => match action {
            CategoriesAction::List => commands::list::categories(&store).await?,
        },
        Commands::Cms { action } => match action {
            CmsAction::Show { slug } => commands::list::cms_page(&store, &slug).await?,
        },
    }
    Ok(())
}
