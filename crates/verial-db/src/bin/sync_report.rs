//! # Sync Report
//!
//! Prints the latest sync run and its first errors for each entity type.
//!
//! ## Usage
//! ```bash
//! # All entity types, default database
//! cargo run -p verial-db --bin sync-report
//!
//! # One entity, more errors, custom database
//! cargo run -p verial-db --bin sync-report -- --entity products --errors 50 --db ./data/verial-sync.db
//!
//! # Machine-readable output for the admin screens
//! cargo run -p verial-db --bin sync-report -- --json
//! ```

use std::env;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use verial_core::{EntityType, SyncStatusReport, DEFAULT_MAX_REPORTED_ERRORS};
use verial_db::{Database, DbConfig, DbResult};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut db_path = env::var("VERIAL_DB_PATH").unwrap_or_else(|_| String::from("./verial-sync.db"));
    let mut entities: Vec<EntityType> = EntityType::ALL.to_vec();
    let mut max_errors = DEFAULT_MAX_REPORTED_ERRORS as u32;
    let mut json = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--entity" | "-e" => {
                if i + 1 < args.len() {
                    match EntityType::parse(&args[i + 1]) {
                        Some(entity) => entities = vec![entity],
                        None => {
                            eprintln!("Unknown entity '{}' (products, orders, customers)", args[i + 1]);
                            std::process::exit(2);
                        }
                    }
                    i += 1;
                }
            }
            "--errors" | "-n" => {
                if i + 1 < args.len() {
                    max_errors = args[i + 1].parse().unwrap_or(max_errors);
                    i += 1;
                }
            }
            "--json" => json = true,
            "--help" | "-h" => {
                println!("Verial Sync Report");
                println!();
                println!("Usage: sync-report [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: $VERIAL_DB_PATH or ./verial-sync.db)");
                println!("  -e, --entity <NAME>    products, orders or customers (default: all)");
                println!("  -n, --errors <N>       Errors to list per run (default: {})", DEFAULT_MAX_REPORTED_ERRORS);
                println!("      --json             Print JSON instead of text");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            other => debug!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let db = Database::new(DbConfig::new(&db_path).max_connections(1)).await?;

    let mut reports = Vec::with_capacity(entities.len());
    for entity in entities {
        reports.push(build_report(&db, entity, max_errors).await?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!("Verial Sync Report");
        println!("==================");
        println!("Database: {}", db_path);
        for report in &reports {
            print_report(report);
        }
    }

    db.close().await;
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides the default `info,verial=debug,sqlx=warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,verial=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn build_report(db: &Database, entity: EntityType, max_errors: u32) -> DbResult<SyncStatusReport> {
    let runs = db.sync_runs();
    let run = runs.latest_for_entity(entity).await?;

    let (errors, total_errors) = match &run {
        Some(run) => (
            runs.list_errors(&run.id, max_errors).await?,
            runs.count_errors(&run.id).await?,
        ),
        None => (Vec::new(), 0),
    };

    Ok(SyncStatusReport {
        entity,
        run,
        errors,
        total_errors,
    })
}

fn print_report(report: &SyncStatusReport) {
    println!();
    println!("[{}]", report.entity);

    let Some(run) = &report.run else {
        println!("  no runs yet");
        return;
    };

    println!("  run:        {}", run.id);
    println!("  direction:  {}", run.direction);
    println!("  status:     {}{}", run.status, if run.cancel_requested { " (cancel requested)" } else { "" });
    println!("  offset:     {} (batch size {})", run.current_offset, run.batch_size);
    println!(
        "  counters:   processed {} · succeeded {} · errored {} · skipped {}",
        run.counters.processed, run.counters.succeeded, run.counters.errored, run.counters.skipped
    );
    println!("  started:    {}", run.started_at.to_rfc3339());
    if let Some(finished) = run.finished_at {
        println!("  finished:   {}", finished.to_rfc3339());
    }
    if let Some(last_error) = &run.last_error {
        println!("  last error: {}", last_error);
    }

    if report.total_errors > 0 {
        println!("  errors ({} of {}):", report.errors.len(), report.total_errors);
        for error in &report.errors {
            println!("    - {} [{}] {}", error.item, error.reason, error.message);
        }
    }
}
