//! # Seed Data Generator
//!
//! Populates the database with a small demo kitchen for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./larder_dev.db
//! cargo run -p larder-db --bin seed
//!
//! # Seed the database named in a config file
//! cargo run -p larder-db --bin seed -- --config ./larder.toml
//!
//! # Specify database path
//! cargo run -p larder-db --bin seed -- --db ./data/larder.db
//! ```
//!
//! ## Generated Data
//! - Raw items (flour, yeast, tomatoes, ...) with opening stock received
//!   against a purchase order
//! - Two prep recipes (Pizza Dough, Tomato Sauce) used as sub-recipes
//! - One menu recipe (Margherita) built from both
//! - One sale of three Margheritas

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use larder_core::{ComponentDraft, ItemDraft, NewStockTransaction, RecipeDraft, TransactionType};
use larder_db::{Database, LarderConfig, Outcome};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// (name, base unit, purchase unit, opening stock)
const ITEMS: &[(&str, &str, Option<&str>, f64)] = &[
    ("Flour", "kg", Some("sack"), 50.0),
    ("Yeast", "g", None, 500.0),
    ("Salt", "g", None, 2000.0),
    ("Olive Oil", "l", Some("can"), 10.0),
    ("Tomato", "kg", Some("crate"), 20.0),
    ("Mozzarella", "kg", None, 8.0),
    ("Basil", "g", None, 300.0),
];

const SEED_PO: &str = "PO-SEED-001";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut db_path = Some(PathBuf::from("./larder_dev.db"));

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    db_path = None;
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Larder Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Load settings from a larder.toml");
                println!("  -d, --db <PATH>      Database file path (default: ./larder_dev.db)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = if config_path.is_some() {
        LarderConfig::load(config_path)?
    } else {
        LarderConfig::default()
    };
    if let Some(path) = db_path {
        config.database.path = Some(path);
    }

    println!("🌱 Larder Seed Data Generator");
    println!("=============================");
    println!("Database: {}", config.database_path().display());
    println!();

    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if db.items().get_by_name("Flour").await?.is_some() {
        println!("⚠ Demo kitchen already present");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Items and opening stock
    let mut ids: HashMap<&str, String> = HashMap::new();
    let mut opening = Vec::with_capacity(ITEMS.len());
    for (name, base_unit, purchase_unit, stock) in ITEMS {
        let mut draft = ItemDraft::new(*name, *base_unit).reorder_point(stock / 5.0);
        if let Some(unit) = purchase_unit {
            draft = draft.purchase_unit(*unit);
        }
        let item = db.items().insert(&draft).await?;
        opening.push(
            NewStockTransaction::new(&item.id, *stock, TransactionType::Receiving)
                .by("seed")
                .po(SEED_PO)
                .notes("Opening stock"),
        );
        ids.insert(*name, item.id);
    }
    let received = db.ledger().record_bulk(&opening).await?;
    println!("✓ Created {} items, {} receiving entries", ids.len(), received.len());

    let id = |name: &str| ids.get(name).cloned().unwrap_or_default();

    // Prep recipes
    let dough = db
        .recipes()
        .create_recipe(
            &RecipeDraft::new("Pizza Dough")
                .yields(1.0, "kg")
                .recipe_type("prep"),
            &[
                ComponentDraft::item(id("Flour"), 0.6).loss(2.0),
                ComponentDraft::item(id("Yeast"), 7.0),
                ComponentDraft::item(id("Salt"), 12.0),
                ComponentDraft::item(id("Olive Oil"), 0.03),
            ],
        )
        .await?;

    let sauce = db
        .recipes()
        .create_recipe(
            &RecipeDraft::new("Tomato Sauce")
                .yields(1.0, "l")
                .recipe_type("sauce"),
            &[
                ComponentDraft::item(id("Tomato"), 1.2).loss(15.0),
                ComponentDraft::item(id("Olive Oil"), 0.05),
                ComponentDraft::item(id("Salt"), 8.0),
                ComponentDraft::item(id("Basil"), 5.0),
            ],
        )
        .await?;

    // Menu recipe
    let margherita = db
        .recipes()
        .create_recipe(
            &RecipeDraft::new("Margherita")
                .yields(1.0, "pcs")
                .recipe_type("main"),
            &[
                ComponentDraft::recipe(&dough.id, 0.25),
                ComponentDraft::recipe(&sauce.id, 0.08),
                ComponentDraft::item(id("Mozzarella"), 0.12),
                ComponentDraft::item(id("Basil"), 2.0).loss(10.0),
            ],
        )
        .await?;
    println!("✓ Created recipes: {}, {}, {}", dough.name, sauce.name, margherita.name);

    // One sale
    let result = db
        .sales()
        .record_sale(&margherita.id, 3.0, Some("seed"), Some("Demo sale"))
        .await;
    let outcome = Outcome::from_result(&result, |r| {
        format!("Sale recorded, {} ingredient(s) deducted", r.ledger_entries.len())
    });
    println!();
    println!("{} {}", if outcome.success { "✓" } else { "✗" }, outcome.message);

    if let Ok(receipt) = &result {
        let names: HashMap<&str, &str> = ids.iter().map(|(n, i)| (i.as_str(), *n)).collect();
        for (item_id, needed) in &receipt.requirements {
            let name = names.get(item_id.as_str()).copied().unwrap_or(item_id.as_str());
            println!("  {:<12} {:>10.4}", name, needed);
        }
    }

    let drift = db.ledger().verify_balances().await?;
    println!();
    if drift.is_empty() {
        println!("✓ Ledger balanced");
    } else {
        println!("⚠ {} item(s) drifted from their ledger", drift.len());
    }

    info!("Seed complete");
    db.close().await;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,larder=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
