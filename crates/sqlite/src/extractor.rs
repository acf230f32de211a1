//! FK-Operation Extractor (§4.3, C4): pulls `addForeignKeyConstraint` and
//! `dropForeignKeyConstraint` changes out of a document, grouping them by
//! base table in document order.

use std::collections::BTreeMap;

use schemadrift_core::{Change, ChangeDocument, ChangeSet};

fn base_table_of(change: &Change) -> Option<&str> {
    match change {
        Change::AddForeignKeyConstraint { base_table_name, .. } => Some(base_table_name),
        Change::DropForeignKeyConstraint { base_table_name, .. } => Some(base_table_name),
        _ => None,
    }
}

/// Returns the document with every FK add/drop removed (empty change sets
/// pruned), plus a `base_table -> ordered FK ops` mapping in document order.
pub fn extract(document: &ChangeDocument) -> (ChangeDocument, BTreeMap<String, Vec<Change>>) {
    let mut by_table: BTreeMap<String, Vec<Change>> = BTreeMap::new();
    let mut change_sets = Vec::with_capacity(document.change_sets.len());

    for change_set in &document.change_sets {
        let mut kept = Vec::with_capacity(change_set.changes.len());
        let mut extracted_any = false;

        for change in &change_set.changes {
            if let Some(table) = base_table_of(change) {
                by_table.entry(table.to_string()).or_default().push(change.clone());
                extracted_any = true;
            } else {
                kept.push(change.clone());
            }
        }

        if kept.is_empty() {
            continue;
        }

        let mut new_set = change_set.clone();
        new_set.changes = kept;
        if extracted_any {
            new_set.touched = true;
        }
        change_sets.push(new_set);
    }

    (ChangeDocument::new(change_sets), by_table)
}
