//! Rebuild Planner (§4.7, C8): computes the final FK set for a table and
//! renders the CREATE TABLE statement for its rebuild target.

use crate::fk::ForeignKeySpec;
use crate::lowering::RebuildRequest;
use crate::schema_reader::TableSchema;

#[derive(Debug, Clone)]
pub struct RebuildPlan {
    pub base_table: String,
    pub final_foreign_keys: Vec<ForeignKeySpec>,
    pub auto_increment_columns: Vec<String>,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Step 1-3 of §4.7: start from current FKs, drop any equal-by-base or
/// equal-by-target to a `to_drop` entry, then append `to_add`.
fn compute_final_foreign_keys(schema: &TableSchema, request: &RebuildRequest) -> Vec<ForeignKeySpec> {
    let mut final_fks: Vec<ForeignKeySpec> = schema
        .foreign_keys
        .iter()
        .filter(|current| {
            !request
                .to_drop
                .iter()
                .any(|drop| current.equal_by_base(drop) || current.equal_by_target(drop))
        })
        .cloned()
        .collect();
    final_fks.extend(request.to_add.iter().cloned());
    final_fks
}

/// AUTOINCREMENT is flagged only when the PK has exactly one column and the
/// raw CREATE TABLE SQL (uppercased) contains the quoted column name plus the
/// `INTEGER`, `PRIMARY KEY`, and `AUTOINCREMENT` tokens.
fn detect_autoincrement(schema: &TableSchema) -> Vec<String> {
    let pk_columns: Vec<&str> = schema
        .columns
        .iter()
        .filter(|c| c.part_of_pk)
        .map(|c| c.name.as_str())
        .collect();

    let [single_pk] = pk_columns.as_slice() else {
        return Vec::new();
    };

    let upper_sql = schema.create_sql.to_ascii_uppercase();
    let upper_quoted_name = format!("\"{}\"", single_pk.to_ascii_uppercase());

    let has_all = upper_sql.contains(&upper_quoted_name)
        && upper_sql.contains("INTEGER")
        && upper_sql.contains("PRIMARY KEY")
        && upper_sql.contains("AUTOINCREMENT");

    if has_all {
        vec![(*single_pk).to_string()]
    } else {
        Vec::new()
    }
}

pub fn plan(table: &str, schema: &TableSchema, request: &RebuildRequest) -> RebuildPlan {
    RebuildPlan {
        base_table: table.to_string(),
        final_foreign_keys: compute_final_foreign_keys(schema, request),
        auto_increment_columns: detect_autoincrement(schema),
    }
}

fn render_match(m: &Option<String>) -> Option<&str> {
    match m.as_deref() {
        Some(value) if !value.eq_ignore_ascii_case("NONE") => Some(value),
        _ => None,
    }
}

/// Emits `CREATE TABLE "<temp>" (...)` per the layout of §4.7.
pub fn render_create_table(temp_name: &str, schema: &TableSchema, plan: &RebuildPlan) -> String {
    let pk_columns: Vec<&str> = schema
        .columns
        .iter()
        .filter(|c| c.part_of_pk)
        .map(|c| c.name.as_str())
        .collect();
    let single_pk = pk_columns.len() == 1;

    let mut lines = Vec::new();
    for column in &schema.columns {
        let mut line = format!("  {} {}", quote_ident(&column.name), column.declared_type);
        if single_pk && column.part_of_pk {
            line.push_str(" PRIMARY KEY");
            if plan.auto_increment_columns.iter().any(|c| c == &column.name) {
                line.push_str(" AUTOINCREMENT");
            }
        }
        if column.not_null {
            line.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default_expression {
            line.push_str(" DEFAULT ");
            line.push_str(default);
        }
        lines.push(line);
    }

    if !single_pk && !pk_columns.is_empty() {
        let cols = pk_columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        lines.push(format!("  PRIMARY KEY ({cols})"));
    }

    for fk in &plan.final_foreign_keys {
        let base_cols = fk.base_columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        let ref_cols = fk
            .referenced_columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let mut line = format!(
            "  FOREIGN KEY ({base_cols}) REFERENCES {} ({ref_cols})",
            quote_ident(&fk.referenced_table)
        );
        if let Some(on_delete) = &fk.on_delete {
            line.push_str(" ON DELETE ");
            line.push_str(on_delete);
        }
        if let Some(on_update) = &fk.on_update {
            line.push_str(" ON UPDATE ");
            line.push_str(on_update);
        }
        if let Some(m) = render_match(&fk.r#match) {
            line.push_str(" MATCH ");
            line.push_str(m);
        }
        lines.push(line);
    }

    format!("CREATE TABLE {} (\n{}\n)", quote_ident(temp_name), lines.join(",\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_reader::Column;

    fn schema_with_single_pk() -> TableSchema {
        TableSchema {
            columns: vec![
                Column {
                    name: "id".to_string(),
                    declared_type: "INTEGER".to_string(),
                    not_null: true,
                    default_expression: None,
                    part_of_pk: true,
                },
                Column {
                    name: "name".to_string(),
                    declared_type: "TEXT".to_string(),
                    not_null: false,
                    default_expression: None,
                    part_of_pk: false,
                },
            ],
            create_sql: "CREATE TABLE \"t\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"name\" TEXT)".to_string(),
            foreign_keys: vec![],
            indexes: vec![],
            triggers: vec![],
        }
    }

    #[test]
    fn autoincrement_detected_for_single_integer_pk() {
        let schema = schema_with_single_pk();
        let request = RebuildRequest::default();
        let built = plan("t", &schema, &request);
        assert_eq!(built.auto_increment_columns, vec!["id".to_string()]);
    }

    #[test]
    fn autoincrement_absent_without_token_in_raw_sql() {
        let mut schema = schema_with_single_pk();
        schema.create_sql = "CREATE TABLE \"t\" (\"id\" INTEGER PRIMARY KEY, \"name\" TEXT)".to_string();
        let request = RebuildRequest::default();
        let built = plan("t", &schema, &request);
        assert!(built.auto_increment_columns.is_empty());
    }

    #[test]
    fn final_fks_drop_equal_by_base_and_append_new() {
        let mut schema = schema_with_single_pk();
        schema.foreign_keys = vec![ForeignKeySpec {
            base_columns: vec!["old_ref".to_string()],
            referenced_table: "old_parent".to_string(),
            referenced_columns: vec!["id".to_string()],
            on_delete: None,
            on_update: None,
            r#match: None,
        }];
        let request = RebuildRequest {
            to_add: vec![ForeignKeySpec {
                base_columns: vec!["new_ref".to_string()],
                referenced_table: "new_parent".to_string(),
                referenced_columns: vec!["id".to_string()],
                on_delete: None,
                on_update: None,
                r#match: None,
            }],
            to_drop: vec![ForeignKeySpec {
                base_columns: vec!["old_ref".to_string()],
                referenced_table: "irrelevant".to_string(),
                referenced_columns: vec![],
                on_delete: None,
                on_update: None,
                r#match: None,
            }],
        };
        let built = plan("t", &schema, &request);
        assert_eq!(built.final_foreign_keys.len(), 1);
        assert_eq!(built.final_foreign_keys[0].referenced_table, "new_parent");
    }

    #[test]
    fn render_create_table_emits_expected_shape() {
        let schema = schema_with_single_pk();
        let request = RebuildRequest::default();
        let built = plan("t", &schema, &request);
        let sql = render_create_table("__tmp_t", &schema, &built);
        assert!(sql.starts_with("CREATE TABLE \"__tmp_t\" (\n"));
        assert!(sql.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL"));
        assert!(sql.contains("\"name\" TEXT"));
        assert!(sql.ends_with(")"));
    }
}
