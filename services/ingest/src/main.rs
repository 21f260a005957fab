//! Ingest - loads one sales export into the summary and monthly tables
//!
//! Reads a CSV or workbook export, reshapes it and replaces both tables.
//! Nothing is rolled back: if a load fails, fix the cause and run the same
//! file again.

use anyhow::{Context, Result};
use clap::Parser;
use ingest::config::Config;
use ingest::export::export_tables;
use ingest::pg::PgStore;
use ingest::{replace_all, ReadOptions, Reshaped, SourceFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Warning lines printed before the digest is cut short.
const WARNING_DIGEST_LINES: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "ingest", about = "Loads a sales export into the dashboard tables")]
struct Args {
    /// Export file (.csv, .txt, .xlsx, .xlsm, .xlsb, .xls, .ods)
    file: PathBuf,

    /// Override the format chosen from the file extension
    #[arg(long, value_enum)]
    format: Option<SourceFormat>,

    /// Field delimiter for delimited text
    #[arg(long, default_value = ",")]
    delimiter: char,

    /// Dry run - parse and report, don't touch the database
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Also write the cleaned tables as CSV into this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

fn print_report(reshaped: &Reshaped) {
    let report = reshaped.report();
    println!("\nMonthly columns: {}", report.monthly_columns);
    println!("Summary rows: {}", report.summary_rows);
    println!("Monthly rows: {}", report.monthly_rows);

    for (i, row) in reshaped.summary.iter().take(3).enumerate() {
        println!(
            "  [{}] {} | {} | {} | {} | {:.2} / {:.2} | {}",
            i + 1,
            row.identity.salesperson,
            row.identity.customer_name,
            row.identity.product_family,
            row.identity.kind,
            row.accumulated_current,
            row.accumulated_prior,
            row.growth
                .map(|g| format!("{:+.2}%", g))
                .unwrap_or_else(|| "n/a".to_string())
        );
    }
    if reshaped.summary.len() > 3 {
        println!("  ... and {} more", reshaped.summary.len() - 3);
    }

    if !report.warnings.is_empty() {
        println!("\nSkipped rows: {}", report.warnings.len());
        for warning in report.warnings.iter().take(WARNING_DIGEST_LINES) {
            println!("  {}", warning);
        }
        if report.warnings.len() > WARNING_DIGEST_LINES {
            println!("  ... and {} more", report.warnings.len() - WARNING_DIGEST_LINES);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = if args.dry_run {
        Config::without_db()?
    } else {
        Config::from_env()?
    };

    let file_name = args.file.display().to_string();
    let format = match args.format {
        Some(format) => format,
        None => SourceFormat::from_file_name(&file_name)?,
    };
    let delimiter = u8::try_from(args.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .context("Delimiter must be a single ASCII character")?;

    println!("=== Sales Ingest ===");
    println!("File: {}", file_name);
    println!("Format: {:?}", format);
    println!("Mode: {}", if args.dry_run { "dry-run" } else { "live" });

    let reshaped = ingest::ingest_file(&args.file, format, &ReadOptions { delimiter })
        .await
        .with_context(|| format!("Failed to ingest {}", file_name))?;

    print_report(&reshaped);

    if let Some(dir) = &args.export_dir {
        let (summary_path, monthly_path) = export_tables(
            dir,
            &config.tables.summary,
            &config.tables.monthly,
            &reshaped.summary,
            &reshaped.monthly,
            chrono::Local::now().date_naive(),
        )?;
        println!("\nExported {}", summary_path.display());
        println!("Exported {}", monthly_path.display());
    }

    if args.dry_run {
        println!("\nDry run - nothing written to the database");
        return Ok(());
    }

    if reshaped.summary.is_empty() {
        anyhow::bail!("No rows parsed from {}, tables left untouched", file_name);
    }

    let store = PgStore::connect(&config.db_url, config.max_connections)
        .await
        .context("Failed to connect to database")?;
    println!("\nDatabase connected");

    let loaded = replace_all(
        &store,
        &config.tables,
        &reshaped.summary,
        &reshaped.monthly,
        config.chunk_size,
    )
    .await;

    let loaded = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            match e.chunk() {
                Some(chunk) => println!("\nLoad failed on {} (chunk {}): {}", e.table(), chunk, e),
                None => println!("\nLoad failed on {}: {}", e.table(), e),
            }
            println!("Tables may be partially written; re-run the whole file");
            return Err(e.into());
        }
    };

    println!("\n=== Ingest Complete ===");
    println!(
        "{}: {} rows in {} chunks",
        config.tables.summary,
        reshaped.summary.len(),
        loaded.summary_chunks
    );
    println!(
        "{}: {} rows in {} chunks",
        config.tables.monthly,
        reshaped.monthly.len(),
        loaded.monthly_chunks
    );

    Ok(())
}
