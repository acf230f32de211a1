//! Wires the individual components into the end-to-end flow: name, extract,
//! lower, then rebuild each table that ended up with FK work pending.

use rusqlite::Connection;
use schemadrift_core::{Change, ChangeDocument};
use tracing::info;

use crate::audit::AuditStore;
use crate::config::PipelineConfig;
use crate::error::Error;
use crate::executor::{self, RebuildOutcome};
use crate::extractor;
use crate::lowering::{self, LoweringOutput};
use crate::namer;

/// Result of running the full pipeline over one changelog against one
/// connection.
pub struct PipelineOutcome {
    /// The changelog with FK ops extracted and SQLite-incompatible
    /// operations lowered or dropped.
    pub rewritten_document: ChangeDocument,
    pub pending_type_changes: Vec<lowering::PendingTypeChange>,
    pub rebuilds: Vec<(String, RebuildOutcome)>,
}

fn auto_name(document: &ChangeDocument) -> ChangeDocument {
    let mut change_sets = document.change_sets.clone();
    for change_set in &mut change_sets {
        let mut any_named = false;
        let mut changes = change_set.changes.clone();
        for change in &mut changes {
            match change {
                Change::AddForeignKeyConstraint {
                    base_table_name,
                    base_column_names,
                    referenced_table_name,
                    constraint_name,
                    ..
                } => {
                    if constraint_name.as_deref().unwrap_or("").is_empty() {
                        *constraint_name = Some(namer::name_foreign_key(
                            Some(base_table_name),
                            base_column_names,
                            Some(referenced_table_name),
                        ));
                        any_named = true;
                    }
                }
                Change::DropForeignKeyConstraint {
                    base_table_name,
                    base_column_names,
                    referenced_table_name,
                    constraint_name,
                } => {
                    if constraint_name.as_deref().unwrap_or("").is_empty() {
                        let columns = base_column_names.clone().unwrap_or_default();
                        *constraint_name = Some(namer::name_foreign_key(
                            Some(base_table_name),
                            &columns,
                            referenced_table_name.as_deref(),
                        ));
                        any_named = true;
                    }
                }
                _ => {}
            }
        }
        if any_named {
            change_set.changes = changes;
            change_set.touched = true;
        }
    }
    ChangeDocument::new(change_sets)
}

/// Runs naming (C3, optional), extraction (C4), and lowering (C5) over
/// `document`, then rebuilds (C9, gated by C10) every table that ended up
/// with a non-empty `RebuildRequest`.
pub fn run(conn: &mut Connection, document: &ChangeDocument, config: &PipelineConfig) -> Result<PipelineOutcome, Error> {
    let named = if config.auto_name_constraints {
        auto_name(document)
    } else {
        document.clone()
    };

    let (pruned, fk_ops_by_table) = extractor::extract(&named);
    let LoweringOutput {
        document: rewritten_document,
        pending_type_changes,
        rebuild_requests,
    } = lowering::lower(&pruned, &fk_ops_by_table);

    let audit = AuditStore;
    audit.ensure_table(conn)?;

    let mut rebuilds = Vec::with_capacity(rebuild_requests.len());
    for (table, request) in &rebuild_requests {
        info!(table = %table, "running rebuild for table with pending FK work");
        let outcome = executor::rebuild_table(conn, &audit, table, request)?;
        rebuilds.push((table.clone(), outcome));
    }

    Ok(PipelineOutcome {
        rewritten_document,
        pending_type_changes,
        rebuilds,
    })
}
