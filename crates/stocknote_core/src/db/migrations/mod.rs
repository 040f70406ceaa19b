//! Schema steps for the stock ledger database.
//!
//! `0001_catalog` creates warehouses and products, `0002_notes` adds notes and
//! their lines. The database records the last applied step in
//! `PRAGMA user_version`; a file stamped with a step this build does not know
//! is refused rather than opened.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

/// One numbered DDL script.
struct SchemaStep {
    version: u32,
    name: &'static str,
    ddl: &'static str,
}

const SCHEMA_STEPS: [SchemaStep; 2] = [
    SchemaStep {
        version: 1,
        name: "catalog",
        ddl: include_str!("0001_catalog.sql"),
    },
    SchemaStep {
        version: 2,
        name: "notes",
        ddl: include_str!("0002_notes.sql"),
    },
];

/// Schema version written by the newest step.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Brings `conn` up to `latest_version()`.
///
/// Steps run inside one IMMEDIATE transaction, so a second process opening
/// the same fresh file waits and then finds nothing left to do.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let latest = latest_version();
    match read_schema_version(conn)? {
        found if found > latest => {
            return Err(DbError::UnsupportedSchemaVersion {
                db_version: found,
                latest_supported: latest,
            })
        }
        found if found == latest => return Ok(()),
        _ => {}
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let start = read_schema_version(&tx)?;
    for step in SCHEMA_STEPS.iter().filter(|step| step.version > start) {
        tx.execute_batch(step.ddl)?;
        tx.pragma_update(None, "user_version", step.version)?;
        info!(
            "event=db_migrate_step module=db step={} version={}",
            step.name, step.version
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={}",
        start, latest
    );
    Ok(())
}

fn read_schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
