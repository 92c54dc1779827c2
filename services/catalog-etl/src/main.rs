//! Catalog ETL Service - Merges two game-data exports into a star schema
//!
//! Responsibilities:
//! - Load the catalog export and the telemetry export (XLSX/XLS or CSV)
//! - Inner-join them on the app id (only games in both sources survive)
//! - Recreate the star schema, then append dimensions, bridge and facts
//! - Print an end-of-run report (merged rows, tables written)
//!
//! CRITICAL: This service must be DETERMINISTIC
//! Same pair of exports + same engine version = same star schema

use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use clap::Parser;
use etl_core::catalog;
use etl_core::output::TableWrite;
use etl_core::report::RunReport;
use etl_core::table::{RawTable, Value};
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "catalog-etl", about = "Merges two game exports into a star schema")]
struct Args {
    /// Catalog export: appid, name, release date, price, genres
    #[arg(long)]
    catalog: String,

    /// Telemetry export: appid, reviews, owners, playtimes
    #[arg(long)]
    telemetry: String,

    /// SQLite database path (falls back to DB_PATH env var)
    #[arg(long)]
    db: Option<String>,

    /// Dry run - don't write to the database
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Emit the run report as JSON
    #[arg(long, default_value = "false")]
    json: bool,
}

/// Star schema the pipeline appends into. Recreated at the start of
/// every run; the appends then populate it batch by batch.
const SCHEMA_SQL: &str = "
    DROP TABLE IF EXISTS bridge_game_genre;
    DROP TABLE IF EXISTS fact_review;
    DROP TABLE IF EXISTS fact_playtime;
    DROP TABLE IF EXISTS dim_genre;
    DROP TABLE IF EXISTS dim_game;

    CREATE TABLE dim_game (
        appid        INTEGER PRIMARY KEY,
        name         TEXT,
        release_date TEXT,
        price        REAL DEFAULT 0
    );

    CREATE TABLE dim_genre (
        genre_id   INTEGER PRIMARY KEY,
        genre_name TEXT UNIQUE
    );

    CREATE TABLE bridge_game_genre (
        appid    INTEGER,
        genre_id INTEGER,
        FOREIGN KEY(appid) REFERENCES dim_game(appid),
        FOREIGN KEY(genre_id) REFERENCES dim_genre(genre_id)
    );

    CREATE TABLE fact_playtime (
        appid            INTEGER PRIMARY KEY,
        avg_playtime     INTEGER,
        median_playtime  INTEGER,
        owners_text      TEXT,
        FOREIGN KEY(appid) REFERENCES dim_game(appid)
    );

    CREATE TABLE fact_review (
        appid          INTEGER PRIMARY KEY,
        positive_cnt   INTEGER,
        negative_cnt   INTEGER,
        positive_rate  REAL,
        FOREIGN KEY(appid) REFERENCES dim_game(appid)
    );
";

// =============================================================================
// File readers
// =============================================================================

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::String(s) => Value::Text(s.clone()),
        Data::Float(f) => Value::Float(*f),
        Data::Int(i) => Value::Int(*i),
        Data::Bool(b) => Value::Bool(*b),
        Data::Empty => Value::Null,
        other => Value::Text(other.to_string()),
    }
}

/// CSV cells are untyped text; recover scalar types so ids and counts
/// behave like their XLSX counterparts.
fn infer_value(field: &str) -> Value {
    if field.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = field.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = field.parse::<f64>() {
        return Value::Float(f);
    }
    match field {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::Text(field.to_string()),
    }
}

fn load_workbook(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path).context("Failed to open workbook")?;
    let sheet_names = workbook.sheet_names().to_vec();
    let sheet_name = sheet_names.first().context("Workbook has no sheets")?;
    let range = workbook
        .worksheet_range(sheet_name)
        .context("Failed to read sheet")?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .context("Sheet has no header row")?
        .iter()
        .map(|cell| match cell {
            Data::String(s) => s.trim().to_string(),
            Data::Empty => String::new(),
            other => format!("{}", other),
        })
        .collect();

    let mut table = RawTable::new(headers);
    for row in rows {
        table.push_row(row.iter().map(cell_to_value).collect());
    }
    Ok(table)
}

fn load_csv(content: &str) -> Result<RawTable> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut table = RawTable::new(headers);
    for record in reader.records() {
        let record = record.context("CSV parse error")?;
        table.push_row(record.iter().map(infer_value).collect());
    }
    Ok(table)
}

fn load_table(path: &Path) -> Result<RawTable> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        let content = std::fs::read_to_string(path).context("Failed to read CSV file")?;
        load_csv(&content)
    } else {
        load_workbook(path)
    }
}

fn file_digest(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).context("Failed to read input for hashing")?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

// =============================================================================
// SQLite writer
// =============================================================================

fn insert_sql(write: &TableWrite) -> String {
    let names: Vec<&str> = write.columns.iter().map(|c| c.name).collect();
    let placeholders = vec!["?"; write.columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        write.table,
        names.join(", "),
        placeholders
    )
}

async fn append_table(pool: &SqlitePool, write: &TableWrite) -> Result<()> {
    let sql = insert_sql(write);
    for row in &write.rows {
        let mut query = sqlx::query(&sql);
        for value in row {
            query = match value {
                Value::Text(s) => query.bind(s.clone()),
                Value::Int(i) => query.bind(*i),
                Value::Float(f) => query.bind(*f),
                Value::Bool(b) => query.bind(*b),
                Value::Null => query.bind(Option::<String>::None),
            };
        }
        query.execute(pool).await?;
    }
    Ok(())
}

async fn connect(db_path: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .context("Failed to open SQLite database")
}

fn print_report(report: &RunReport) {
    println!("\nMerged rows: {}", report.rows_processed);
    if !report.unmapped.is_empty() {
        println!("Unmapped values ({} total):", report.total_unmapped());
        for (role, count) in &report.unmapped {
            println!("  {}: {}", role, count);
        }
    }
    println!("Tables:");
    for summary in &report.tables {
        println!(
            "  {} ({}): {} rows",
            summary.table, summary.mode, summary.rows
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let db_path = match args.db.or_else(|| std::env::var("DB_PATH").ok()) {
        Some(p) => p,
        None if args.dry_run => String::new(),
        None => bail!("Pass --db or set DB_PATH"),
    };

    println!("=== Catalog ETL ===");
    println!("Catalog:   {}", args.catalog);
    println!("Telemetry: {}", args.telemetry);
    println!("Mode: {}", if args.dry_run { "dry-run" } else { "live" });

    let catalog_path = Path::new(&args.catalog);
    let telemetry_path = Path::new(&args.telemetry);
    println!("Catalog SHA-256:   {}", file_digest(catalog_path)?);
    println!("Telemetry SHA-256: {}", file_digest(telemetry_path)?);

    let catalog_table = load_table(catalog_path)?;
    let telemetry_table = load_table(telemetry_path)?;
    println!(
        "Loaded {} catalog rows, {} telemetry rows",
        catalog_table.row_count(),
        telemetry_table.row_count()
    );

    // A structural failure here aborts before the schema is touched.
    let output = catalog::run(&catalog_table, &telemetry_table)?;
    println!(
        "Catalog ∩ telemetry games: {}",
        output.report.rows_processed
    );

    if args.dry_run {
        println!("\nDry run - no tables written");
    } else {
        let pool = connect(&db_path).await?;
        println!("Recreating schema...");
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&pool)
            .await
            .context("Failed to create schema")?;
        for write in &output.tables {
            append_table(&pool, write).await?;
        }
        println!("Database: {}", db_path);
    }

    print_report(&output.report);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&output.report)?);
    }

    println!("\n=== Catalog ETL Complete ===");
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG_CSV: &str = "appid,name,release_date,price,genres\n\
                               10,Counter-Strike,2000-11-01,9.99,Action\n\
                               220,Half-Life 2,2004-11-16,9.99,Action; Indie\n";

    const TELEMETRY_CSV: &str = "appid,name,positive,negative,owners,average_forever,median_forever\n\
                                 10,counter strike,120,30,\"10,000,000 .. 20,000,000\",300,120\n\
                                 400,Portal,95,5,\"5,000,000 .. 10,000,000\",200,90\n";

    #[test]
    fn csv_loaders_feed_the_catalog_pipeline_end_to_end() {
        let catalog_table = load_csv(CATALOG_CSV).unwrap();
        let telemetry_table = load_csv(TELEMETRY_CSV).unwrap();
        let output = catalog::run(&catalog_table, &telemetry_table).unwrap();
        // Only appid 10 exists in both exports.
        assert_eq!(output.report.rows_processed, 1);
        let bridge = output
            .tables
            .iter()
            .find(|w| w.table == "bridge_game_genre")
            .unwrap();
        assert_eq!(bridge.rows.len(), 1);
        assert_eq!(bridge.rows[0][0], Value::Int(10));
    }

    #[test]
    fn csv_ids_parse_as_integers() {
        let table = load_csv(CATALOG_CSV).unwrap();
        assert_eq!(table.rows()[0][0], Value::Int(10));
        assert_eq!(table.rows()[0][3], Value::Float(9.99));
    }

    #[test]
    fn schema_declares_every_output_table() {
        let catalog_table = load_csv(CATALOG_CSV).unwrap();
        let telemetry_table = load_csv(TELEMETRY_CSV).unwrap();
        let output = catalog::run(&catalog_table, &telemetry_table).unwrap();
        for write in &output.tables {
            assert!(
                SCHEMA_SQL.contains(&format!("CREATE TABLE {} ", write.table)),
                "schema missing {}",
                write.table
            );
        }
    }

    #[test]
    fn insert_sql_matches_schema_columns() {
        let catalog_table = load_csv(CATALOG_CSV).unwrap();
        let telemetry_table = load_csv(TELEMETRY_CSV).unwrap();
        let output = catalog::run(&catalog_table, &telemetry_table).unwrap();
        let reviews = output
            .tables
            .iter()
            .find(|w| w.table == "fact_review")
            .unwrap();
        assert_eq!(
            insert_sql(reviews),
            "INSERT INTO fact_review (appid, positive_cnt, negative_cnt, positive_rate) \
             VALUES (?, ?, ?, ?)"
        );
    }
}
