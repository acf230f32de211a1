//! Audit Store (§4.9, C10): at-most-once enforcement via a content hash of
//! each already-applied rebuild plan.

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::error::{audit_store_failed, Error};
use crate::planner::RebuildPlan;

pub const AUDIT_TABLE: &str = "MIGRATION_API_AUDIT";

/// Deterministic textual form of a `RebuildPlan`, used as the SHA-256
/// preimage for its audit hash (§3, §11). FKs are sorted by base-columns,
/// lower-cased.
pub fn canonical_plan_text(plan: &RebuildPlan) -> String {
    let mut sorted_fks = plan.final_foreign_keys.clone();
    sorted_fks.sort_by_key(|fk| fk.base_columns.join(",").to_ascii_lowercase());

    let mut auto_increment = plan.auto_increment_columns.clone();
    auto_increment.sort();

    let mut lines = vec![
        format!("table\t{}", plan.base_table.to_ascii_lowercase()),
        format!("autoincrement\t{}", auto_increment.join(",")),
    ];
    for fk in &sorted_fks {
        lines.push(format!(
            "fk\t{}\t{}\t{}\t{}\t{}\t{}",
            fk.base_columns.join(",").to_ascii_lowercase(),
            fk.referenced_table.to_ascii_lowercase(),
            fk.referenced_columns.join(",").to_ascii_lowercase(),
            fk.on_delete.clone().unwrap_or_default(),
            fk.on_update.clone().unwrap_or_default(),
            fk.r#match.clone().unwrap_or_default(),
        ));
    }
    lines.join("\n")
}

#[must_use]
pub fn hash_plan(canonical: &str) -> String {
    let digest = Sha256::digest(canonical.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AuditStore;

impl AuditStore {
    pub fn ensure_table(&self, conn: &Connection) -> Result<(), Error> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {AUDIT_TABLE} (
                id INTEGER PRIMARY KEY,
                hash VARCHAR(128) NOT NULL UNIQUE,
                description TEXT,
                applied_at TEXT NOT NULL
            );"
        ))
        .map_err(audit_store_failed)
    }

    pub fn was_already_applied(&self, conn: &Connection, hash: &str) -> Result<bool, Error> {
        conn.query_row(
            &format!("SELECT 1 FROM {AUDIT_TABLE} WHERE hash = ?1"),
            [hash],
            |_| Ok(()),
        )
        .map(|_| true)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(false),
            other => Err(audit_store_failed(other)),
        })
    }

    pub fn record_applied(&self, conn: &Connection, hash: &str, description: &str) -> Result<(), Error> {
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {AUDIT_TABLE} (hash, description, applied_at)
                 VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))"
            ),
            rusqlite::params![hash, description],
        )
        .map_err(audit_store_failed)?;
        Ok(())
    }
}
