//! CLI smoke entry point.
//!
//! # Responsibility
//! - Load an optional JSON config, open the configured database and print a
//!   deterministic status summary.
//!
//! Usage: `stocknote [config.json]`

use log::info;
use std::process::ExitCode;
use stocknote_core::{
    db::migrations::latest_version, init_from_config, open_db, open_db_in_memory, CatalogService,
    CoreConfig, NoteStatus, QueryService, SqliteCatalogRepository, SqliteNoteRepository,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("stocknote: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => CoreConfig::from_file(path)?,
        None => CoreConfig::default(),
    };
    init_from_config(&config)?;

    let conn = match config.db_path.as_deref() {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };

    let catalog = CatalogService::new(SqliteCatalogRepository::try_new(&conn)?, config.clone());
    let queries = QueryService::new(SqliteNoteRepository::try_new(&conn)?, config.clone());

    println!("stocknote_core ping={}", stocknote_core::ping());
    println!("stocknote_core version={}", stocknote_core::core_version());
    println!("schema_version={}", latest_version());
    println!("low_stock_products={}", catalog.count_low_stock()?);
    for (status, count) in queries.status_counts()? {
        println!("notes status={} count={count}", status_label(status));
    }

    info!("event=cli_smoke module=cli status=ok");
    Ok(())
}

fn status_label(status: NoteStatus) -> &'static str {
    match status {
        NoteStatus::Created => "created",
        NoteStatus::Processing => "processing",
        NoteStatus::Shipped => "shipped",
        NoteStatus::Closed => "closed",
    }
}
