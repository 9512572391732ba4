//! Magento SOAP command-line client.
//!
//! Run with: `magento-soap --config client.yaml products --sku 'n26%'`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use magento_soap::catalog::{CatalogProductInfoRequest, CatalogProductListRequest, Filters};
use magento_soap::{Client, ClientConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Command-line client for the Magento catalog SOAP API.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long, default_value = "client.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and print the session expiry
    Login,

    /// List products
    Products {
        /// Store view code
        #[arg(long)]
        store_view: Option<String>,

        /// SKU pattern (SQL `like` syntax, e.g. `n26%`)
        #[arg(long)]
        sku: Option<String>,

        /// Product type (simple, configurable, ...)
        #[arg(long = "type")]
        kind: Option<String>,
    },

    /// Show one product
    Product {
        /// Product id, or SKU with --by-sku
        product: String,

        /// Treat the identifier as a SKU
        #[arg(long)]
        by_sku: bool,

        /// Store view code
        #[arg(long)]
        store_view: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Config file: {}", args.config.display());
    let config = ClientConfig::from_file(&args.config).context("Failed to load config file")?;

    info!(
        endpoint = %config.endpoint,
        timeout_secs = config.timeout_secs,
        session_ttl_secs = config.session_ttl_secs,
        "Configuration loaded"
    );

    let client = Client::new(config).context("Failed to create client")?;

    match args.command {
        Command::Login => {
            let session = client.login().await.context("Login failed")?;
            println!("logged in, session valid until {}", session.expires_at());
        }

        Command::Products {
            store_view,
            sku,
            kind,
        } => {
            let mut filters = Filters::default();
            if let Some(sku) = sku {
                filters = filters.with_complex_filter("sku", "like", sku);
            }
            if let Some(kind) = kind {
                filters = filters.with_filter("type", kind);
            }

            let mut request = CatalogProductListRequest::new().with_filters(filters);
            if let Some(store_view) = store_view {
                request = request.with_store_view(store_view);
            }

            let products = client
                .catalog_product_list(request)
                .await
                .context("Product list failed")?;
            for product in &products {
                println!(
                    "{:>8}  {:<24} {:<12} {}",
                    product.product_id, product.sku, product.kind, product.name
                );
            }
            info!(count = products.len(), "Listed products");
        }

        Command::Product {
            product,
            by_sku,
            store_view,
        } => {
            let mut request = if by_sku {
                CatalogProductInfoRequest::by_sku(product)
            } else {
                CatalogProductInfoRequest::new(product)
            };
            if let Some(store_view) = store_view {
                request = request.with_store_view(store_view);
            }

            let info = client
                .catalog_product_info(request)
                .await
                .context("Product info failed")?;
            println!("id:          {}", info.product_id);
            println!("sku:         {}", info.sku);
            println!("name:        {}", info.name);
            println!("type:        {}", info.kind);
            if let Some(price) = info.price {
                println!("price:       {:.2}", price);
            }
            println!("created_at:  {}", info.created_at);
            println!("updated_at:  {}", info.updated_at);
        }
    }

    Ok(())
}
