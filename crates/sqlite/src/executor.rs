//! Rebuild Executor (§4.8, C9): carries out a single table's rebuild inside
//! one transaction, consulting the audit store so an already-applied plan is
//! skipped rather than re-run.

use rusqlite::Connection;
use tracing::{debug, info, instrument, warn};

use crate::audit::{canonical_plan_text, hash_plan, AuditStore};
use crate::error::{rebuild_failed, Error, ForeignKeyRow, ReferentialViolation};
use crate::lowering::RebuildRequest;
use crate::normalizer;
use crate::planner::{self, RebuildPlan};
use crate::schema_reader;

pub struct RebuildOutcome {
    pub plan: RebuildPlan,
    pub skipped: bool,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn drop_residual(conn: &Connection, table: &str) -> Result<(), Error> {
    let known = schema_reader::list_tables(conn).map_err(|e| rebuild_failed(table, e))?;
    if known.iter().any(|t| t == table) {
        warn!(table = %table, "dropping residual table left over from a prior rebuild attempt");
        conn.execute_batch(&format!("DROP TABLE {}", quote_ident(table)))
            .map_err(|e| rebuild_failed(table, e))?;
    }
    Ok(())
}

fn check_foreign_keys(conn: &Connection, table: &str) -> Result<(), Error> {
    let mut stmt = conn
        .prepare("PRAGMA foreign_key_check")
        .map_err(|e| rebuild_failed(table, e))?;
    let violations: Vec<ReferentialViolation> = stmt
        .query_map([], |row| {
            Ok(ReferentialViolation {
                table: row.get(0)?,
                rowid: row.get(1)?,
                parent: row.get(2)?,
                fk_id: row.get(3)?,
            })
        })
        .map_err(|e| rebuild_failed(table, e))?
        .collect::<rusqlite::Result<_>>()
        .map_err(|e| rebuild_failed(table, e))?;

    if violations.is_empty() {
        return Ok(());
    }

    let mut offending_names: Vec<String> = violations.iter().map(|v| v.table.clone()).collect();
    offending_names.sort();
    offending_names.dedup();

    let mut offending_tables = Vec::with_capacity(offending_names.len());
    for name in offending_names {
        let rows: Vec<ForeignKeyRow> = conn
            .prepare(&format!("PRAGMA foreign_key_list({})", quote_ident(&name)))
            .and_then(|mut s| {
                s.query_map([], |row| {
                    Ok(ForeignKeyRow {
                        id: row.get(0)?,
                        seq: row.get(1)?,
                        table: row.get(2)?,
                        from: row.get(3)?,
                        to: row.get(4)?,
                        on_update: row.get(5)?,
                        on_delete: row.get(6)?,
                        r#match: row.get(7)?,
                    })
                })?
                .collect::<rusqlite::Result<_>>()
            })
            .map_err(|e| rebuild_failed(&name, e))?;
        offending_tables.push((name, rows));
    }

    Err(Error::ReferentialIntegrityViolated { violations, offending_tables })
}

/// Runs the full rebuild sequence for `requested_table` inside one
/// transaction. Returns `skipped: true` without touching the schema if an
/// identical plan has already been recorded in the audit store.
#[instrument(skip(conn, audit, request))]
pub fn rebuild_table(
    conn: &mut Connection,
    audit: &AuditStore,
    requested_table: &str,
    request: &RebuildRequest,
) -> Result<RebuildOutcome, Error> {
    let prior_autocommit = conn.is_autocommit();
    debug!(prior_autocommit, "entering rebuild");

    conn.execute_batch("PRAGMA foreign_keys = OFF;")
        .map_err(|e| rebuild_failed(requested_table, e))?;
    // Older SQLite builds disallow this pragma inside a transaction; best effort only.
    let _ = conn.execute_batch("PRAGMA legacy_alter_table = ON;");

    let outcome = run_in_transaction(conn, audit, requested_table, request);

    conn.execute_batch("PRAGMA foreign_keys = ON;").ok();
    debug!(restored_autocommit = conn.is_autocommit(), prior_autocommit, "left rebuild");
    outcome
}

fn run_in_transaction(
    conn: &mut Connection,
    audit: &AuditStore,
    requested_table: &str,
    request: &RebuildRequest,
) -> Result<RebuildOutcome, Error> {
    let tx = conn.transaction().map_err(|e| rebuild_failed(requested_table, e))?;

    let known_tables = schema_reader::list_tables(&tx).map_err(|e| rebuild_failed(requested_table, e))?;
    let table = normalizer::resolve(requested_table, &known_tables)?;
    info!(table = %table, "resolved physical table name");

    let tmp_name = format!("__tmp_{table}");
    let bak_name = format!("__bak_{table}");
    drop_residual(&tx, &tmp_name)?;
    drop_residual(&tx, &bak_name)?;

    let schema = schema_reader::read_table_schema(&tx, &table)?;
    let mut built_plan = planner::plan(&table, &schema, request);

    for fk in &mut built_plan.final_foreign_keys {
        let referenced_table = normalizer::resolve(&fk.referenced_table, &known_tables)?;
        let referenced_columns = schema_reader::columns(&tx, &referenced_table).map_err(|e| rebuild_failed(&referenced_table, e))?;
        let referenced_names: Vec<String> = referenced_columns.into_iter().map(|c| c.name).collect();
        for column in &mut fk.referenced_columns {
            *column = normalizer::resolve(column, &referenced_names)?;
        }
        let base_names: Vec<String> = schema.columns.iter().map(|c| c.name.clone()).collect();
        for column in &mut fk.base_columns {
            *column = normalizer::resolve(column, &base_names)?;
        }
        fk.referenced_table = referenced_table;
    }

    let canonical = canonical_plan_text(&built_plan);
    let hash = hash_plan(&canonical);

    audit.ensure_table(&tx)?;
    if audit.was_already_applied(&tx, &hash)? {
        info!(table = %table, hash = %hash, "rebuild plan already applied, skipping");
        tx.rollback().map_err(|e| rebuild_failed(&table, e))?;
        return Ok(RebuildOutcome { plan: built_plan, skipped: true });
    }

    let create_sql = planner::render_create_table(&tmp_name, &schema, &built_plan);
    debug!(sql = %create_sql, "creating rebuild target");
    tx.execute_batch(&create_sql).map_err(|e| rebuild_failed(&table, e))?;

    let column_list = schema
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let insert_sql = format!(
        "INSERT INTO {} ({column_list}) SELECT {column_list} FROM {}",
        quote_ident(&tmp_name),
        quote_ident(&table)
    );
    tx.execute_batch(&insert_sql).map_err(|e| rebuild_failed(&table, e))?;
    info!(table = %table, "copied rows into rebuild target");

    // foreign_keys is already OFF for the whole rebuild (turned back ON in step 12).
    tx.execute_batch(&format!(
        "ALTER TABLE {} RENAME TO {}",
        quote_ident(&table),
        quote_ident(&bak_name)
    ))
    .map_err(|e| rebuild_failed(&table, e))?;
    tx.execute_batch(&format!(
        "ALTER TABLE {} RENAME TO {}",
        quote_ident(&tmp_name),
        quote_ident(&table)
    ))
    .map_err(|e| rebuild_failed(&table, e))?;
    tx.execute_batch(&format!("DROP TABLE {}", quote_ident(&bak_name)))
        .map_err(|e| rebuild_failed(&table, e))?;
    info!(table = %table, "swapped rebuild target into place");

    for index in schema.indexes.iter().filter(|i| !i.implicit) {
        if let Some(sql) = &index.create_sql {
            tx.execute_batch(sql).map_err(|e| rebuild_failed(&table, e))?;
        }
    }
    for trigger in &schema.triggers {
        tx.execute_batch(&trigger.create_sql).map_err(|e| rebuild_failed(&table, e))?;
    }
    debug!(table = %table, indexes = schema.indexes.len(), triggers = schema.triggers.len(), "recreated dependents");

    tx.execute_batch("PRAGMA foreign_keys = ON;").map_err(|e| rebuild_failed(&table, e))?;
    check_foreign_keys(&tx, &table)?;

    audit.record_applied(&tx, &hash, &format!("rebuild of {table}"))?;

    tx.commit().map_err(|e| rebuild_failed(&table, e))?;
    info!(table = %table, hash = %hash, "rebuild committed");

    Ok(RebuildOutcome { plan: built_plan, skipped: false })
}
