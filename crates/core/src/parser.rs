//! Conversion between the raw block tree ([`crate::tree`]) and the typed
//! [`crate::model`], in both directions (§4.1, §6).

use crate::error::{Error, MalformedDocument, Result, SourceLocation};
use crate::model::{
    Change, ChangeDocument, ChangeSet, Column, Condition, Disposition, InlineForeignKey,
    Preconditions,
};
use crate::tree::{self, MapEntry, Node, Parsed};

/// Parses a full changelog document.
pub fn parse(input: &str) -> Result<ChangeDocument> {
    let lines: Vec<&str> = input.lines().collect();
    let top = tree::parse_document(&lines)?;
    let entries = top.node.as_map().unwrap_or(&[]);

    let Some(log) = MapEntry::find(entries, "databaseChangeLog") else {
        return Ok(ChangeDocument::default());
    };

    let items: &[Parsed] = match &log.node {
        Node::List(items) => items,
        Node::Map(m) if m.is_empty() => &[],
        _ => return Err(bad(log.start_line)),
    };

    let mut change_sets = Vec::with_capacity(items.len());
    for item in items {
        change_sets.push(parse_change_set(item, &lines)?);
    }
    Ok(ChangeDocument::new(change_sets))
}

fn bad(line: usize) -> Error {
    MalformedDocument::BadIndentation {
        location: SourceLocation::new(line + 1),
    }
    .into()
}

fn required_scalar(entries: &[MapEntry], key: &str) -> Result<String> {
    optional_scalar(entries, key).ok_or_else(|| MalformedDocument::UnexpectedEnd.into())
}

fn optional_scalar(entries: &[MapEntry], key: &str) -> Option<String> {
    MapEntry::find(entries, key)
        .and_then(|p| p.node.as_scalar())
        .map(str::to_string)
}

fn optional_bool(entries: &[MapEntry], key: &str, default: bool) -> bool {
    optional_scalar(entries, key)
        .map(|s| s.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_change_set(item: &Parsed, lines: &[&str]) -> Result<ChangeSet> {
    let item_entries = item.node.as_map().ok_or_else(|| bad(item.start_line))?;
    let cs = MapEntry::find(item_entries, "changeSet").ok_or_else(|| bad(item.start_line))?;
    let cs_entries = cs.node.as_map().ok_or_else(|| bad(cs.start_line))?;

    let id = required_scalar(cs_entries, "id")?;
    let author = required_scalar(cs_entries, "author")?;
    let labels = optional_scalar(cs_entries, "labels");
    let preconditions = parse_preconditions(cs_entries)?;
    let changes = parse_changes(cs_entries, lines)?;

    let raw_lines: Vec<String> = item
        .raw_lines(lines)
        .into_iter()
        .map(str::to_string)
        .collect();

    Ok(ChangeSet {
        id,
        author,
        labels,
        preconditions,
        changes,
        touched: false,
        raw_lines: Some(raw_lines),
    })
}

fn parse_preconditions(cs_entries: &[MapEntry]) -> Result<Option<Preconditions>> {
    let Some(pc) = MapEntry::find(cs_entries, "preConditions") else {
        return Ok(None);
    };
    let entries = pc.node.as_map().ok_or_else(|| bad(pc.start_line))?;

    let on_fail = parse_disposition(optional_scalar(entries, "onFail").as_deref());
    let on_error = parse_disposition(optional_scalar(entries, "onError").as_deref());

    let mut and = Vec::new();
    if let Some(and_entry) = MapEntry::find(entries, "and") {
        let items = and_entry.node.as_list().unwrap_or(&[]);
        for cond_item in items {
            and.push(parse_condition(cond_item)?);
        }
    }

    Ok(Some(Preconditions {
        on_fail,
        on_error,
        and,
    }))
}

fn parse_disposition(value: Option<&str>) -> Disposition {
    match value {
        Some(v) if v.eq_ignore_ascii_case("HALT") => Disposition::Halt,
        _ => Disposition::MarkRan,
    }
}

fn parse_condition(item: &Parsed) -> Result<Condition> {
    let entries = item.node.as_map().ok_or_else(|| bad(item.start_line))?;
    if entries.len() == 1 && entries[0].key == "tableExists" {
        let table_entries = entries[0]
            .value
            .node
            .as_map()
            .ok_or_else(|| bad(entries[0].value.start_line))?;
        let table_name = required_scalar(table_entries, "tableName")?;
        return Ok(Condition::TableExists(table_name));
    }
    Ok(Condition::Opaque(
        entries
            .iter()
            .flat_map(|e| render_entry_lines(e))
            .collect(),
    ))
}

/// Best-effort flat rendering for an opaque leaf condition's fields; these
/// never come from data the engine itself parsed out of raw source lines, so
/// a plain re-render is acceptable.
fn render_entry_lines(entry: &MapEntry) -> Vec<String> {
    match entry.value.node.as_scalar() {
        Some(scalar) => vec![format!("{}: {}", entry.key, scalar)],
        None => vec![format!("{}:", entry.key)],
    }
}

fn parse_changes(cs_entries: &[MapEntry], lines: &[&str]) -> Result<Vec<Change>> {
    let Some(changes_entry) = MapEntry::find(cs_entries, "changes") else {
        return Ok(Vec::new());
    };
    let items = changes_entry.node.as_list().unwrap_or(&[]);

    let mut changes = Vec::with_capacity(items.len());
    for item in items {
        changes.push(parse_change(item, lines)?);
    }
    Ok(changes)
}

fn parse_change(item: &Parsed, lines: &[&str]) -> Result<Change> {
    let entries = item.node.as_map().ok_or_else(|| bad(item.start_line))?;
    let Some(entry) = entries.first() else {
        return Err(bad(item.start_line));
    };
    let kind = entry.key.as_str();
    let value = &entry.value;

    let parsed = match kind {
        "createTable" => parse_create_table(value)?,
        "addColumn" => parse_add_column(value)?,
        "dropColumn" => parse_drop_column(value)?,
        "addForeignKeyConstraint" => parse_add_fk(value)?,
        "dropForeignKeyConstraint" => parse_drop_fk(value)?,
        "addUniqueConstraint" => parse_add_unique(value)?,
        "modifyDataType" => parse_modify_data_type(value)?,
        "createIndex" => parse_create_index(value)?,
        "dropIndex" => parse_drop_index(value)?,
        "sql" => parse_sql(value)?,
        other => {
            return Ok(Change::Opaque {
                kind: other.to_string(),
                raw_lines: item.raw_lines(lines).into_iter().map(str::to_string).collect(),
            });
        }
    };
    Ok(parsed)
}

fn parse_sql(value: &Parsed) -> Result<Change> {
    if let Some(sql) = value.node.as_scalar() {
        return Ok(Change::Sql { sql: sql.to_string() });
    }
    let entries = value.node.as_map().ok_or_else(|| bad(value.start_line))?;
    Ok(Change::Sql {
        sql: required_scalar(entries, "sql")?,
    })
}

fn parse_column_list(entries: &[MapEntry], key: &str) -> Result<Vec<Column>> {
    let Some(list_entry) = MapEntry::find(entries, key) else {
        return Ok(Vec::new());
    };
    let items = list_entry.node.as_list().unwrap_or(&[]);
    let mut columns = Vec::with_capacity(items.len());
    for item in items {
        columns.push(parse_column(item)?);
    }
    Ok(columns)
}

fn parse_column(item: &Parsed) -> Result<Column> {
    let item_entries = item.node.as_map().ok_or_else(|| bad(item.start_line))?;
    let col = MapEntry::find(item_entries, "column").ok_or_else(|| bad(item.start_line))?;
    let entries = col.node.as_map().ok_or_else(|| bad(col.start_line))?;

    let name = required_scalar(entries, "name")?;
    let r#type = optional_scalar(entries, "type").unwrap_or_default();
    let default = optional_scalar(entries, "defaultValue");

    let (nullable, primary_key) = match MapEntry::find(entries, "constraints") {
        Some(constraints) => {
            let c_entries = constraints
                .node
                .as_map()
                .ok_or_else(|| bad(constraints.start_line))?;
            (
                optional_bool(c_entries, "nullable", true),
                optional_bool(c_entries, "primaryKey", false),
            )
        }
        None => (true, false),
    };

    Ok(Column {
        name,
        r#type,
        nullable,
        default,
        primary_key,
    })
}

fn parse_index_column_names(entries: &[MapEntry]) -> Result<Vec<String>> {
    let Some(list_entry) = MapEntry::find(entries, "columns") else {
        return Ok(Vec::new());
    };
    let items = list_entry.node.as_list().unwrap_or(&[]);
    let mut names = Vec::with_capacity(items.len());
    for item in items {
        let item_entries = item.node.as_map().ok_or_else(|| bad(item.start_line))?;
        let col = MapEntry::find(item_entries, "column").ok_or_else(|| bad(item.start_line))?;
        let col_entries = col.node.as_map().ok_or_else(|| bad(col.start_line))?;
        names.push(required_scalar(col_entries, "name")?);
    }
    Ok(names)
}

fn parse_inline_foreign_keys(entries: &[MapEntry]) -> Result<Vec<InlineForeignKey>> {
    let Some(list_entry) = MapEntry::find(entries, "foreignKeys") else {
        return Ok(Vec::new());
    };
    let items = list_entry.node.as_list().unwrap_or(&[]);
    let mut fks = Vec::with_capacity(items.len());
    for item in items {
        let item_entries = item.node.as_map().ok_or_else(|| bad(item.start_line))?;
        let fk = MapEntry::find(item_entries, "foreignKeyConstraint")
            .ok_or_else(|| bad(item.start_line))?;
        let entries = fk.node.as_map().ok_or_else(|| bad(fk.start_line))?;
        fks.push(InlineForeignKey {
            base_columns: split_csv(&optional_scalar(entries, "baseColumnNames").unwrap_or_default()),
            referenced_table: required_scalar(entries, "referencedTableName")?,
            referenced_columns: split_csv(
                &optional_scalar(entries, "referencedColumnNames").unwrap_or_default(),
            ),
            on_delete: optional_scalar(entries, "onDelete"),
            on_update: optional_scalar(entries, "onUpdate"),
            constraint_name: optional_scalar(entries, "constraintName"),
        });
    }
    Ok(fks)
}

fn parse_create_table(value: &Parsed) -> Result<Change> {
    let entries = value.node.as_map().ok_or_else(|| bad(value.start_line))?;
    let table_name = required_scalar(entries, "tableName")?;
    let columns = parse_column_list(entries, "columns")?;
    let primary_key = columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| c.name.clone())
        .collect();
    let foreign_keys = parse_inline_foreign_keys(entries)?;
    Ok(Change::CreateTable {
        table_name,
        columns,
        primary_key,
        foreign_keys,
    })
}

fn parse_add_column(value: &Parsed) -> Result<Change> {
    let entries = value.node.as_map().ok_or_else(|| bad(value.start_line))?;
    Ok(Change::AddColumn {
        table_name: required_scalar(entries, "tableName")?,
        columns: parse_column_list(entries, "columns")?,
    })
}

fn parse_drop_column(value: &Parsed) -> Result<Change> {
    let entries = value.node.as_map().ok_or_else(|| bad(value.start_line))?;
    Ok(Change::DropColumn {
        table_name: required_scalar(entries, "tableName")?,
        column_name: required_scalar(entries, "columnName")?,
    })
}

fn parse_add_fk(value: &Parsed) -> Result<Change> {
    let entries = value.node.as_map().ok_or_else(|| bad(value.start_line))?;
    Ok(Change::AddForeignKeyConstraint {
        base_table_name: required_scalar(entries, "baseTableName")?,
        base_column_names: split_csv(&required_scalar(entries, "baseColumnNames")?),
        referenced_table_name: required_scalar(entries, "referencedTableName")?,
        referenced_column_names: split_csv(&required_scalar(entries, "referencedColumnNames")?),
        constraint_name: optional_scalar(entries, "constraintName"),
        on_delete: optional_scalar(entries, "onDelete"),
        on_update: optional_scalar(entries, "onUpdate"),
        r#match: optional_scalar(entries, "match"),
    })
}

fn parse_drop_fk(value: &Parsed) -> Result<Change> {
    let entries = value.node.as_map().ok_or_else(|| bad(value.start_line))?;
    Ok(Change::DropForeignKeyConstraint {
        base_table_name: required_scalar(entries, "baseTableName")?,
        constraint_name: optional_scalar(entries, "constraintName"),
        base_column_names: optional_scalar(entries, "baseColumnNames").map(|s| split_csv(&s)),
        referenced_table_name: optional_scalar(entries, "referencedTableName"),
    })
}

fn parse_add_unique(value: &Parsed) -> Result<Change> {
    let entries = value.node.as_map().ok_or_else(|| bad(value.start_line))?;
    Ok(Change::AddUniqueConstraint {
        table_name: required_scalar(entries, "tableName")?,
        column_names: split_csv(&required_scalar(entries, "columnNames")?),
        constraint_name: optional_scalar(entries, "constraintName"),
    })
}

fn parse_modify_data_type(value: &Parsed) -> Result<Change> {
    let entries = value.node.as_map().ok_or_else(|| bad(value.start_line))?;
    Ok(Change::ModifyDataType {
        table_name: required_scalar(entries, "tableName")?,
        column_name: required_scalar(entries, "columnName")?,
        new_data_type: required_scalar(entries, "newDataType")?,
    })
}

fn parse_create_index(value: &Parsed) -> Result<Change> {
    let entries = value.node.as_map().ok_or_else(|| bad(value.start_line))?;
    Ok(Change::CreateIndex {
        table_name: required_scalar(entries, "tableName")?,
        index_name: optional_scalar(entries, "indexName"),
        unique: optional_bool(entries, "unique", false),
        columns: parse_index_column_names(entries)?,
    })
}

fn parse_drop_index(value: &Parsed) -> Result<Change> {
    let entries = value.node.as_map().ok_or_else(|| bad(value.start_line))?;
    Ok(Change::DropIndex {
        table_name: optional_scalar(entries, "tableName"),
        index_name: required_scalar(entries, "indexName")?,
    })
}

// --- Serialization ---------------------------------------------------------

/// Renders a document back to text. Untouched change sets are emitted from
/// their captured raw lines; touched ones are re-rendered from typed fields.
pub fn serialize(document: &ChangeDocument) -> String {
    let mut out = String::new();
    out.push_str("databaseChangeLog:\n");
    for change_set in &document.change_sets {
        render_change_set(change_set, &mut out);
    }
    out
}

fn push_line(out: &mut String, indent: usize, text: &str) {
    for _ in 0..indent {
        out.push(' ');
    }
    out.push_str(text);
    out.push('\n');
}

fn render_change_set(cs: &ChangeSet, out: &mut String) {
    if !cs.touched {
        if let Some(raw) = &cs.raw_lines {
            for line in raw {
                out.push_str(line);
                out.push('\n');
            }
            return;
        }
    }

    push_line(out, 2, "- changeSet:");
    push_line(out, 6, &format!("id: {}", tree::quote_if_needed(&cs.id)));
    push_line(out, 6, &format!("author: {}", tree::quote_if_needed(&cs.author)));
    if let Some(labels) = &cs.labels {
        push_line(out, 6, &format!("labels: {}", tree::quote_if_needed(labels)));
    }
    if let Some(pc) = &cs.preconditions {
        render_preconditions(pc, out);
    }
    if !cs.changes.is_empty() {
        push_line(out, 6, "changes:");
        for change in &cs.changes {
            render_change(change, out);
        }
    }
}

fn render_preconditions(pc: &Preconditions, out: &mut String) {
    push_line(out, 6, "preConditions:");
    push_line(out, 8, &format!("onFail: {}", pc.on_fail.as_str()));
    push_line(out, 8, &format!("onError: {}", pc.on_error.as_str()));
    if !pc.and.is_empty() {
        push_line(out, 8, "and:");
        for cond in &pc.and {
            render_condition(cond, out);
        }
    }
}

fn render_condition(cond: &Condition, out: &mut String) {
    match cond {
        Condition::TableExists(name) => {
            push_line(out, 10, "- tableExists:");
            push_line(out, 14, &format!("tableName: {}", tree::quote_if_needed(name)));
        }
        Condition::Opaque(lines) => {
            for (i, line) in lines.iter().enumerate() {
                let prefix = if i == 0 { "- " } else { "  " };
                push_line(out, 10, &format!("{prefix}{line}"));
            }
        }
    }
}

fn render_change(change: &Change, out: &mut String) {
    match change {
        Change::CreateTable {
            table_name,
            columns,
            foreign_keys,
            ..
        } => {
            push_line(out, 8, "- createTable:");
            push_line(out, 12, &format!("tableName: {}", tree::quote_if_needed(table_name)));
            render_columns(columns, 12, out);
            if !foreign_keys.is_empty() {
                push_line(out, 12, "foreignKeys:");
                for fk in foreign_keys {
                    push_line(out, 14, "- foreignKeyConstraint:");
                    push_line(
                        out,
                        18,
                        &format!(
                            "baseColumnNames: {}",
                            tree::quote_if_needed(&fk.base_columns.join(","))
                        ),
                    );
                    push_line(
                        out,
                        18,
                        &format!("referencedTableName: {}", tree::quote_if_needed(&fk.referenced_table)),
                    );
                    push_line(
                        out,
                        18,
                        &format!(
                            "referencedColumnNames: {}",
                            tree::quote_if_needed(&fk.referenced_columns.join(","))
                        ),
                    );
                    if let Some(name) = &fk.constraint_name {
                        push_line(out, 18, &format!("constraintName: {}", tree::quote_if_needed(name)));
                    }
                    if let Some(v) = &fk.on_delete {
                        push_line(out, 18, &format!("onDelete: {}", tree::quote_if_needed(v)));
                    }
                    if let Some(v) = &fk.on_update {
                        push_line(out, 18, &format!("onUpdate: {}", tree::quote_if_needed(v)));
                    }
                }
            }
        }
        Change::AddColumn { table_name, columns } => {
            push_line(out, 8, "- addColumn:");
            push_line(out, 12, &format!("tableName: {}", tree::quote_if_needed(table_name)));
            render_columns(columns, 12, out);
        }
        Change::DropColumn { table_name, column_name } => {
            push_line(out, 8, "- dropColumn:");
            push_line(out, 12, &format!("tableName: {}", tree::quote_if_needed(table_name)));
            push_line(out, 12, &format!("columnName: {}", tree::quote_if_needed(column_name)));
        }
        Change::AddForeignKeyConstraint {
            base_table_name,
            base_column_names,
            referenced_table_name,
            referenced_column_names,
            constraint_name,
            on_delete,
            on_update,
            r#match,
        } => {
            push_line(out, 8, "- addForeignKeyConstraint:");
            push_line(out, 12, &format!("baseTableName: {}", tree::quote_if_needed(base_table_name)));
            push_line(
                out,
                12,
                &format!("baseColumnNames: {}", tree::quote_if_needed(&base_column_names.join(","))),
            );
            push_line(
                out,
                12,
                &format!("referencedTableName: {}", tree::quote_if_needed(referenced_table_name)),
            );
            push_line(
                out,
                12,
                &format!(
                    "referencedColumnNames: {}",
                    tree::quote_if_needed(&referenced_column_names.join(","))
                ),
            );
            if let Some(v) = constraint_name {
                push_line(out, 12, &format!("constraintName: {}", tree::quote_if_needed(v)));
            }
            if let Some(v) = on_delete {
                push_line(out, 12, &format!("onDelete: {}", tree::quote_if_needed(v)));
            }
            if let Some(v) = on_update {
                push_line(out, 12, &format!("onUpdate: {}", tree::quote_if_needed(v)));
            }
            if let Some(v) = r#match {
                push_line(out, 12, &format!("match: {}", tree::quote_if_needed(v)));
            }
        }
        Change::DropForeignKeyConstraint {
            base_table_name,
            constraint_name,
            base_column_names,
            referenced_table_name,
        } => {
            push_line(out, 8, "- dropForeignKeyConstraint:");
            push_line(out, 12, &format!("baseTableName: {}", tree::quote_if_needed(base_table_name)));
            if let Some(v) = constraint_name {
                push_line(out, 12, &format!("constraintName: {}", tree::quote_if_needed(v)));
            }
            if let Some(cols) = base_column_names {
                push_line(
                    out,
                    12,
                    &format!("baseColumnNames: {}", tree::quote_if_needed(&cols.join(","))),
                );
            }
            if let Some(v) = referenced_table_name {
                push_line(out, 12, &format!("referencedTableName: {}", tree::quote_if_needed(v)));
            }
        }
        Change::AddUniqueConstraint {
            table_name,
            column_names,
            constraint_name,
        } => {
            push_line(out, 8, "- addUniqueConstraint:");
            push_line(out, 12, &format!("tableName: {}", tree::quote_if_needed(table_name)));
            push_line(
                out,
                12,
                &format!("columnNames: {}", tree::quote_if_needed(&column_names.join(","))),
            );
            if let Some(v) = constraint_name {
                push_line(out, 12, &format!("constraintName: {}", tree::quote_if_needed(v)));
            }
        }
        Change::ModifyDataType {
            table_name,
            column_name,
            new_data_type,
        } => {
            push_line(out, 8, "- modifyDataType:");
            push_line(out, 12, &format!("tableName: {}", tree::quote_if_needed(table_name)));
            push_line(out, 12, &format!("columnName: {}", tree::quote_if_needed(column_name)));
            push_line(out, 12, &format!("newDataType: {}", tree::quote_if_needed(new_data_type)));
        }
        Change::CreateIndex {
            table_name,
            index_name,
            unique,
            columns,
        } => {
            push_line(out, 8, "- createIndex:");
            push_line(out, 12, &format!("tableName: {}", tree::quote_if_needed(table_name)));
            if let Some(name) = index_name {
                push_line(out, 12, &format!("indexName: {}", tree::quote_if_needed(name)));
            }
            if *unique {
                push_line(out, 12, "unique: true");
            }
            push_line(out, 12, "columns:");
            for col in columns {
                push_line(out, 14, "- column:");
                push_line(out, 18, &format!("name: {}", tree::quote_if_needed(col)));
            }
        }
        Change::DropIndex { table_name, index_name } => {
            push_line(out, 8, "- dropIndex:");
            if let Some(v) = table_name {
                push_line(out, 12, &format!("tableName: {}", tree::quote_if_needed(v)));
            }
            push_line(out, 12, &format!("indexName: {}", tree::quote_if_needed(index_name)));
        }
        Change::Sql { sql } => {
            push_line(out, 8, &format!("- sql: {}", tree::quote_if_needed(sql)));
        }
        Change::Opaque { raw_lines, .. } => {
            for line in raw_lines {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
}

fn render_columns(columns: &[Column], indent: usize, out: &mut String) {
    push_line(out, indent, "columns:");
    for col in columns {
        push_line(out, indent + 2, "- column:");
        push_line(out, indent + 6, &format!("name: {}", tree::quote_if_needed(&col.name)));
        push_line(out, indent + 6, &format!("type: {}", tree::quote_if_needed(&col.r#type)));
        if let Some(default) = &col.default {
            push_line(out, indent + 6, &format!("defaultValue: {}", tree::quote_if_needed(default)));
        }
        if col.primary_key || !col.nullable {
            push_line(out, indent + 6, "constraints:");
            if col.primary_key {
                push_line(out, indent + 10, "primaryKey: true");
            }
            if !col.nullable {
                push_line(out, indent + 10, "nullable: false");
            }
        }
    }
}
