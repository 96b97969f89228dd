//! # Seed Data Generator
//!
//! Populates a `notes` table with random notes for development.
//!
//! ## Usage
//! ```bash
//! # 50 notes into the database named by DATABASE_URL (default: in-memory)
//! cargo run -p storekit-db --bin seed
//!
//! # Custom amount and database
//! cargo run -p storekit-db --bin seed -- --count 500 --url sqlite://notes.db?mode=rwc
//!
//! # Verbose logging
//! RUST_LOG=storekit_db=debug cargo run -p storekit-db --bin seed
//! ```

use std::env;

use storekit_core::randomid;
use storekit_db::{
    Db, DbConfig, DbResult, Dialect, Migration, Page, PageOptions, Params, ScanExt, Scanner,
    Store,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_COUNT: usize = 50;

#[derive(Debug, Default)]
struct Note {
    id: i64,
    title: String,
    body: String,
}

fn note_params(note: &Note) -> Params {
    Params::new()
        .with("id", note.id)
        .with("title", note.title.clone())
        .with("body", note.body.clone())
}

fn scan_note(row: &dyn Scanner, note: &mut Note) -> DbResult<()> {
    note.id = row.get("id")?;
    note.title = row.get("title")?;
    note.body = row.get("body")?;
    Ok(())
}

/// Identity column syntax differs per engine; PostgreSQL reports no insert
/// id through the generic store, so it is not seeded here.
fn schema() -> Vec<Migration> {
    vec![
        Migration::statements(
            Dialect::Sqlite,
            ["CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                body TEXT NOT NULL
            )"],
        ),
        Migration::statements(
            Dialect::MySql,
            ["CREATE TABLE IF NOT EXISTS notes (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                title VARCHAR(64) NOT NULL,
                body TEXT NOT NULL
            )"],
        ),
    ]
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut count = DEFAULT_COUNT;
    let mut url: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(DEFAULT_COUNT);
                    i += 1;
                }
            }
            "--url" | "-u" => {
                if i + 1 < args.len() {
                    url = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("storekit seed data generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of notes to insert (default: {DEFAULT_COUNT})");
                println!("  -u, --url <URL>    Database URL (default: $DATABASE_URL or sqlite::memory:)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let config = match url {
        Some(url) => {
            let dialect = Dialect::from_url(&url).ok_or("unsupported database url")?;
            DbConfig::new(dialect, url)
        }
        None => DbConfig::from_env()?,
    };

    if config.dialect == Dialect::Postgres {
        return Err("seeding needs an engine that reports inserted ids (mysql or sqlite)".into());
    }

    let db = Db::connect_with(config, &schema()).await?;
    let notes = Store::with_row_scanner(db.clone(), note_params, scan_note);

    let start = std::time::Instant::now();
    for _ in 0..count {
        let note = Note {
            id: 0,
            title: randomid::string_n(12),
            body: randomid::string_n(48),
        };
        notes
            .create(
                "INSERT INTO notes (title, body) VALUES (:title, :body)",
                &note,
            )
            .await?;
    }

    let total = notes.count("SELECT COUNT(*) FROM notes").await?;
    info!(inserted = count, total, elapsed = ?start.elapsed(), "Seeding complete");

    let page = Page::with_options(&PageOptions::default());
    let first = notes
        .list_page("SELECT id, title, body FROM notes", &page, Params::new())
        .await?;

    println!("First {} of {} notes:", first.len(), total);
    for note in &first {
        println!("  #{:<6} {}  {}", note.id, note.title, note.body);
    }

    db.close().await;
    Ok(())
}
