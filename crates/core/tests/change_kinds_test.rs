//! Coverage of every recognized change kind (§3, §6) plus the opaque
//! passthrough for anything else.

use schemadrift_core::Change;

fn first_change(input: &str) -> Change {
    let document = schemadrift_core::parse(input).expect("document parses");
    document.change_sets[0].changes[0].clone()
}

const HEADER: &str = "databaseChangeLog:\n  - changeSet:\n      id: '1'\n      author: alice\n      changes:\n";

#[test]
fn add_unique_constraint_is_recognized() {
    let input = format!(
        "{HEADER}        - addUniqueConstraint:\n            tableName: order_item\n            columnNames: product_id,vendor_id\n"
    );
    match first_change(&input) {
        Change::AddUniqueConstraint {
            table_name,
            column_names,
            constraint_name,
        } => {
            assert_eq!(table_name, "order_item");
            assert_eq!(column_names, vec!["product_id", "vendor_id"]);
            assert_eq!(constraint_name, None);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn modify_data_type_is_recognized() {
    let input = format!(
        "{HEADER}        - modifyDataType:\n            tableName: t\n            columnName: c\n            newDataType: BIGINT\n"
    );
    match first_change(&input) {
        Change::ModifyDataType {
            table_name,
            column_name,
            new_data_type,
        } => {
            assert_eq!(table_name, "t");
            assert_eq!(column_name, "c");
            assert_eq!(new_data_type, "BIGINT");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn create_index_is_recognized() {
    let input = format!(
        "{HEADER}        - createIndex:\n            tableName: order_item\n            indexName: order_item_product_id_vendor_id_uq\n            unique: true\n            columns:\n              - column:\n                  name: product_id\n              - column:\n                  name: vendor_id\n"
    );
    match first_change(&input) {
        Change::CreateIndex {
            table_name,
            index_name,
            unique,
            columns,
        } => {
            assert_eq!(table_name, "order_item");
            assert_eq!(index_name.as_deref(), Some("order_item_product_id_vendor_id_uq"));
            assert!(unique);
            assert_eq!(columns, vec!["product_id", "vendor_id"]);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn drop_foreign_key_constraint_fallback_fields() {
    let input = format!(
        "{HEADER}        - dropForeignKeyConstraint:\n            baseTableName: revision_punishment\n"
    );
    match first_change(&input) {
        Change::DropForeignKeyConstraint {
            base_table_name,
            constraint_name,
            base_column_names,
            referenced_table_name,
        } => {
            assert_eq!(base_table_name, "revision_punishment");
            assert_eq!(constraint_name, None);
            assert_eq!(base_column_names, None);
            assert_eq!(referenced_table_name, None);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn unrecognized_kind_is_preserved_as_opaque() {
    let input = format!("{HEADER}        - renameTable:\n            oldTableName: foo\n            newTableName: bar\n");
    match first_change(&input) {
        Change::Opaque { kind, raw_lines } => {
            assert_eq!(kind, "renameTable");
            assert!(raw_lines.iter().any(|l| l.contains("oldTableName: foo")));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn sql_passthrough_is_recognized() {
    let input = format!("{HEADER}        - sql: select 1 from dual\n");
    match first_change(&input) {
        Change::Sql { sql } => assert_eq!(sql, "select 1 from dual"),
        other => panic!("unexpected: {other:?}"),
    }
}
