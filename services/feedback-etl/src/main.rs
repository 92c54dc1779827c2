//! Feedback ETL Service - Normalizes a user-trend survey export into a
//! feedback star schema
//!
//! Responsibilities:
//! - Load the survey spreadsheet (XLSX/XLS or CSV) into a raw table
//! - Run the survey pipeline (dimensions, detail table, facts)
//! - Write every output table to SQLite with full-replace semantics
//! - Print an end-of-run report (rows, unmapped values, tables written)
//!
//! CRITICAL: This service must be DETERMINISTIC
//! Same export + same engine version = same star schema

use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use clap::Parser;
use etl_core::output::{ColType, TableWrite, WriteMode};
use etl_core::report::RunReport;
use etl_core::survey;
use etl_core::table::{RawTable, Value};
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "feedback-etl", about = "Normalizes a survey export into a star schema")]
struct Args {
    /// Survey export to ingest (.xlsx, .xls or .csv)
    #[arg(long)]
    input: String,

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

/// CSV cells are untyped text; recover the scalar types the engine
/// expects so e.g. a "1" sentiment flag behaves like the numeric 1 an
/// XLSX export would carry.
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

fn col_type_sql(ty: ColType) -> &'static str {
    match ty {
        ColType::Integer => "INTEGER",
        ColType::Real => "REAL",
        ColType::Text => "TEXT",
    }
}

fn create_sql(write: &TableWrite) -> String {
    let columns: Vec<String> = write
        .columns
        .iter()
        .map(|c| format!("{} {}", c.name, col_type_sql(c.ty)))
        .collect();
    format!("CREATE TABLE {} ({})", write.table, columns.join(", "))
}

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

async fn write_table(pool: &SqlitePool, write: &TableWrite) -> Result<()> {
    if write.mode == WriteMode::Replace {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", write.table))
            .execute(pool)
            .await?;
        sqlx::query(&create_sql(write)).execute(pool).await?;
    }
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
    println!("\nRows processed: {}", report.rows_processed);
    if report.unmapped.is_empty() {
        println!("Unmapped values: none");
    } else {
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

    println!("=== Feedback ETL ===");
    println!("Input: {}", args.input);
    println!("Mode: {}", if args.dry_run { "dry-run" } else { "live" });

    let input = Path::new(&args.input);
    println!("SHA-256: {}", file_digest(input)?);

    let table = load_table(input)?;
    println!(
        "Loaded {} rows x {} columns",
        table.row_count(),
        table.columns().len()
    );

    let output = survey::run(&table)?;

    if args.dry_run {
        println!("\nDry run - no tables written");
    } else {
        let pool = connect(&db_path).await?;
        for write in &output.tables {
            write_table(&pool, write).await?;
        }
        println!("\nDatabase: {}", db_path);
    }

    print_report(&output.report);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&output.report)?);
    }

    println!("\n=== Feedback ETL Complete ===");
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
