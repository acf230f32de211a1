//! SQLite Lowering Pass (§4.4, C5): rewrites operations SQLite cannot run
//! natively into safe equivalents or into a rebuild request, and injects
//! table-exists preconditions where that is unambiguous.

use std::collections::{BTreeMap, BTreeSet};

use schemadrift_core::{Change, ChangeDocument, ChangeSet, Condition, Disposition, Preconditions};

use crate::fk::ForeignKeySpec;

const MAX_INDEX_NAME_LEN: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTypeChange {
    pub table: String,
    pub column: String,
    pub new_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct RebuildRequest {
    pub to_add: Vec<ForeignKeySpec>,
    pub to_drop: Vec<ForeignKeySpec>,
}

pub struct LoweringOutput {
    pub document: ChangeDocument,
    pub pending_type_changes: Vec<PendingTypeChange>,
    pub rebuild_requests: BTreeMap<String, RebuildRequest>,
}

fn derive_index_name(table: &str, columns: &[String]) -> String {
    let raw = format!("{table}_{}_uq", columns.join("_"));
    let sanitized: String = raw
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' { ch } else { '_' })
        .collect();
    sanitized.chars().take(MAX_INDEX_NAME_LEN).collect()
}

fn to_fk_spec_add(change: &Change) -> Option<(String, ForeignKeySpec)> {
    match change {
        Change::AddForeignKeyConstraint {
            base_table_name,
            base_column_names,
            referenced_table_name,
            referenced_column_names,
            on_delete,
            on_update,
            r#match,
            ..
        } => Some((
            base_table_name.clone(),
            ForeignKeySpec {
                base_columns: base_column_names.clone(),
                referenced_table: referenced_table_name.clone(),
                referenced_columns: referenced_column_names.clone(),
                on_delete: on_delete.clone(),
                on_update: on_update.clone(),
                r#match: r#match.clone(),
            },
        )),
        _ => None,
    }
}

fn to_fk_spec_drop(change: &Change) -> Option<(String, ForeignKeySpec)> {
    match change {
        Change::DropForeignKeyConstraint {
            base_table_name,
            base_column_names,
            referenced_table_name,
            ..
        } => Some((
            base_table_name.clone(),
            ForeignKeySpec {
                base_columns: base_column_names.clone().unwrap_or_default(),
                referenced_table: referenced_table_name.clone().unwrap_or_default(),
                referenced_columns: Vec::new(),
                on_delete: None,
                on_update: None,
                r#match: None,
            },
        )),
        _ => None,
    }
}

/// Table name a given (already-lowered) change kind targets, for the
/// precondition-injection heuristic. Kinds outside this set never
/// contribute a table to the "single identifiable table" computation.
fn table_name_of(change: &Change) -> Option<String> {
    match change {
        Change::CreateTable { table_name, .. } => Some(table_name.clone()),
        Change::AddColumn { table_name, .. } => Some(table_name.clone()),
        Change::DropColumn { table_name, .. } => Some(table_name.clone()),
        Change::CreateIndex { table_name, .. } => Some(table_name.clone()),
        Change::DropIndex { table_name, .. } => table_name.clone(),
        _ => None,
    }
}

struct Classified {
    lowered: Change,
    /// Excluded from the precondition-target-table computation: the
    /// original kind was `createTable` or `addUniqueConstraint`.
    excluded_from_heuristic: bool,
    was_create_table: bool,
}

fn classify(change: &Change, pending: &mut Vec<PendingTypeChange>) -> Option<Classified> {
    match change {
        Change::AddUniqueConstraint {
            table_name,
            column_names,
            constraint_name,
        } => {
            let index_name = constraint_name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| derive_index_name(table_name, column_names));
            Some(Classified {
                lowered: Change::CreateIndex {
                    table_name: table_name.clone(),
                    index_name: Some(index_name),
                    unique: true,
                    columns: column_names.clone(),
                },
                excluded_from_heuristic: true,
                was_create_table: false,
            })
        }
        Change::ModifyDataType {
            table_name,
            column_name,
            new_data_type,
        } => {
            pending.push(PendingTypeChange {
                table: table_name.clone(),
                column: column_name.clone(),
                new_type: new_data_type.clone(),
            });
            None
        }
        Change::AddForeignKeyConstraint { .. } | Change::DropForeignKeyConstraint { .. } => None,
        Change::CreateTable { .. } => Some(Classified {
            lowered: change.clone(),
            excluded_from_heuristic: true,
            was_create_table: true,
        }),
        other => Some(Classified {
            lowered: other.clone(),
            excluded_from_heuristic: false,
            was_create_table: false,
        }),
    }
}

fn maybe_inject_preconditions(
    change_set: &ChangeSet,
    classified: &[Classified],
) -> Option<Preconditions> {
    if change_set.preconditions.is_some() {
        return None;
    }

    let mut candidate_tables: BTreeSet<String> = BTreeSet::new();
    let mut create_table_targets: BTreeSet<String> = BTreeSet::new();

    for entry in classified {
        if entry.was_create_table {
            if let Some(name) = table_name_of(&entry.lowered) {
                create_table_targets.insert(name);
            }
            continue;
        }
        if entry.excluded_from_heuristic {
            continue;
        }
        if let Some(name) = table_name_of(&entry.lowered) {
            candidate_tables.insert(name);
        }
    }

    if candidate_tables.len() != 1 {
        return None;
    }
    let table = candidate_tables.into_iter().next().unwrap();
    if create_table_targets.contains(&table) {
        return None;
    }

    Some(Preconditions {
        on_fail: Disposition::MarkRan,
        on_error: Disposition::MarkRan,
        and: vec![Condition::TableExists(table)],
    })
}

/// Lowers every ChangeSet in `document`. `fk_ops_by_table` is the output of
/// the FK-Operation Extractor (C4), already run over the same document.
pub fn lower(
    document: &ChangeDocument,
    fk_ops_by_table: &BTreeMap<String, Vec<Change>>,
) -> LoweringOutput {
    let mut pending_type_changes = Vec::new();
    let mut rebuild_requests: BTreeMap<String, RebuildRequest> = BTreeMap::new();

    for (table, ops) in fk_ops_by_table {
        let request = rebuild_requests.entry(table.clone()).or_default();
        for op in ops {
            if let Some((_, spec)) = to_fk_spec_add(op) {
                request.to_add.push(spec);
            } else if let Some((_, spec)) = to_fk_spec_drop(op) {
                request.to_drop.push(spec);
            }
        }
    }

    let mut change_sets = Vec::with_capacity(document.change_sets.len());
    for change_set in &document.change_sets {
        let mut classified = Vec::with_capacity(change_set.changes.len());
        for change in &change_set.changes {
            if let Some(entry) = classify(change, &mut pending_type_changes) {
                classified.push(entry);
            }
        }

        let rewritten_any = classified.len() != change_set.changes.len()
            || classified
                .iter()
                .zip(&change_set.changes)
                .any(|(c, original)| &c.lowered != original);

        let injected = maybe_inject_preconditions(change_set, &classified);

        if classified.is_empty() {
            continue;
        }

        let mut new_set = change_set.clone();
        new_set.changes = classified.into_iter().map(|c| c.lowered).collect();
        if injected.is_some() {
            new_set.preconditions = injected;
            new_set.touched = true;
        } else if rewritten_any {
            new_set.touched = true;
        }
        change_sets.push(new_set);
    }

    LoweringOutput {
        document: ChangeDocument::new(change_sets),
        pending_type_changes,
        rebuild_requests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemadrift_core::Column;

    #[test]
    fn identity_for_unaffected_kinds() {
        let column = Column {
            name: "id".to_string(),
            r#type: "INTEGER".to_string(),
            nullable: false,
            default: None,
            primary_key: true,
        };
        let create = Change::CreateTable {
            table_name: "t".to_string(),
            columns: vec![column],
            primary_key: vec!["id".to_string()],
            foreign_keys: vec![],
        };
        let change_set = ChangeSet::new("1", "a", None, None, vec![create.clone()]);
        let document = ChangeDocument::new(vec![change_set]);

        let out = lower(&document, &BTreeMap::new());
        assert_eq!(out.document.change_sets.len(), 1);
        assert_eq!(out.document.change_sets[0].changes, vec![create]);
        assert!(out.pending_type_changes.is_empty());
        assert!(out.rebuild_requests.is_empty());
    }

    #[test]
    fn unique_constraint_becomes_index() {
        let change = Change::AddUniqueConstraint {
            table_name: "order_item".to_string(),
            column_names: vec!["product_id".to_string(), "vendor_id".to_string()],
            constraint_name: None,
        };
        let change_set = ChangeSet::new("1", "a", None, None, vec![change]);
        let document = ChangeDocument::new(vec![change_set]);

        let out = lower(&document, &BTreeMap::new());
        match &out.document.change_sets[0].changes[0] {
            Change::CreateIndex { index_name, unique, columns, .. } => {
                assert_eq!(index_name.as_deref(), Some("order_item_product_id_vendor_id_uq"));
                assert!(unique);
                assert_eq!(columns, &vec!["product_id".to_string(), "vendor_id".to_string()]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn modify_data_type_is_dropped_and_reported() {
        let change = Change::ModifyDataType {
            table_name: "t".to_string(),
            column_name: "c".to_string(),
            new_data_type: "BIGINT".to_string(),
        };
        let change_set = ChangeSet::new("1", "a", None, None, vec![change]);
        let document = ChangeDocument::new(vec![change_set]);

        let out = lower(&document, &BTreeMap::new());
        assert!(out.document.change_sets.is_empty());
        assert_eq!(
            out.pending_type_changes,
            vec![PendingTypeChange {
                table: "t".to_string(),
                column: "c".to_string(),
                new_type: "BIGINT".to_string(),
            }]
        );
    }

    #[test]
    fn injects_precondition_for_single_identifiable_table() {
        let change = Change::DropColumn {
            table_name: "widgets".to_string(),
            column_name: "legacy".to_string(),
        };
        let change_set = ChangeSet::new("1", "a", None, None, vec![change]);
        let document = ChangeDocument::new(vec![change_set]);

        let out = lower(&document, &BTreeMap::new());
        let preconditions = out.document.change_sets[0].preconditions.as_ref().unwrap();
        assert_eq!(preconditions.and, vec![Condition::TableExists("widgets".to_string())]);
    }

    #[test]
    fn does_not_inject_precondition_when_create_table_present() {
        let create = Change::CreateTable {
            table_name: "widgets".to_string(),
            columns: vec![],
            primary_key: vec![],
            foreign_keys: vec![],
        };
        let add_col = Change::AddColumn {
            table_name: "widgets".to_string(),
            columns: vec![],
        };
        let change_set = ChangeSet::new("1", "a", None, None, vec![create, add_col]);
        let document = ChangeDocument::new(vec![change_set]);

        let out = lower(&document, &BTreeMap::new());
        assert!(out.document.change_sets[0].preconditions.is_none());
    }

    #[test]
    fn fk_ops_become_rebuild_requests() {
        let mut fk_ops: BTreeMap<String, Vec<Change>> = BTreeMap::new();
        fk_ops.insert(
            "child".to_string(),
            vec![Change::AddForeignKeyConstraint {
                base_table_name: "child".to_string(),
                base_column_names: vec!["parent_id".to_string()],
                referenced_table_name: "parent".to_string(),
                referenced_column_names: vec!["id".to_string()],
                constraint_name: None,
                on_delete: None,
                on_update: None,
                r#match: None,
            }],
        );
        let document = ChangeDocument::default();
        let out = lower(&document, &fk_ops);
        let request = out.rebuild_requests.get("child").unwrap();
        assert_eq!(request.to_add.len(), 1);
        assert!(request.to_drop.is_empty());
    }
}
