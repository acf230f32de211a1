//! Schema Reader (§4.5, C6): reads the live SQLite schema off a connection.

use rusqlite::Connection;

use crate::error::Error;
use crate::fk::ForeignKeySpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub default_expression: Option<String>,
    pub part_of_pk: bool,
}

#[derive(Debug, Clone)]
pub struct IndexDefinition {
    pub name: String,
    pub create_sql: Option<String>,
    pub implicit: bool,
}

#[derive(Debug, Clone)]
pub struct TriggerDefinition {
    pub name: String,
    pub create_sql: String,
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    pub columns: Vec<Column>,
    pub create_sql: String,
    pub foreign_keys: Vec<ForeignKeySpec>,
    pub indexes: Vec<IndexDefinition>,
    pub triggers: Vec<TriggerDefinition>,
}

fn quoted(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<Column>> {
    let sql = format!("PRAGMA table_info({})", quoted(table));
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(Column {
            name: row.get::<_, String>(1)?,
            declared_type: row.get::<_, String>(2)?,
            not_null: row.get::<_, i64>(3)? != 0,
            default_expression: row.get::<_, Option<String>>(4)?,
            part_of_pk: row.get::<_, i64>(5)? != 0,
        })
    })?;
    rows.collect()
}

pub fn create_sql(conn: &Connection, table: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )
    .map(Some)
    .or_else(|err| match err {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    })
}

pub fn current_foreign_keys(conn: &Connection, table: &str) -> rusqlite::Result<Vec<ForeignKeySpec>> {
    let sql = format!("PRAGMA foreign_key_list({})", quoted(table));
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, Option<String>>(7)?,
        ))
    })?;

    let mut by_id: Vec<(i64, Vec<(i64, String, String, String, Option<String>, Option<String>, Option<String>)>)> =
        Vec::new();
    while let Some(row) = rows.next().transpose()? {
        let (id, seq, referenced_table, from, to, on_update, on_delete, match_type) = row;
        match by_id.iter_mut().find(|(existing_id, _)| *existing_id == id) {
            Some((_, entries)) => entries.push((seq, from, referenced_table, to, on_update, on_delete, match_type)),
            None => by_id.push((id, vec![(seq, from, referenced_table, to, on_update, on_delete, match_type)])),
        }
    }

    let mut specs = Vec::with_capacity(by_id.len());
    for (_, mut entries) in by_id {
        entries.sort_by_key(|(seq, ..)| *seq);
        let referenced_table = entries[0].2.clone();
        let on_update = entries[0].4.clone();
        let on_delete = entries[0].5.clone();
        let r#match = entries[0].6.clone();
        specs.push(ForeignKeySpec {
            base_columns: entries.iter().map(|(_, from, ..)| from.clone()).collect(),
            referenced_table,
            referenced_columns: entries.iter().map(|(_, _, _, to, ..)| to.clone()).collect(),
            on_delete,
            on_update,
            r#match,
        });
    }
    Ok(specs)
}

pub fn indexes(conn: &Connection, table: &str) -> rusqlite::Result<Vec<IndexDefinition>> {
    let sql = format!("PRAGMA index_list({})", quoted(table));
    let mut stmt = conn.prepare(&sql)?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<_>>()?;

    let mut result = Vec::with_capacity(names.len());
    for name in names {
        let create_sql: Option<String> = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'index' AND name = ?1",
                [&name],
                |row| row.get(0),
            )
            .ok();
        let implicit = create_sql.is_none();
        result.push(IndexDefinition {
            name,
            create_sql,
            implicit,
        });
    }
    Ok(result)
}

pub fn triggers(conn: &Connection, table: &str) -> rusqlite::Result<Vec<TriggerDefinition>> {
    let mut stmt = conn.prepare(
        "SELECT name, sql FROM sqlite_master WHERE type = 'trigger' AND tbl_name = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map([table], |row| {
        Ok(TriggerDefinition {
            name: row.get(0)?,
            create_sql: row.get::<_, String>(1)?,
        })
    })?;
    rows.collect()
}

pub fn list_tables(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect()
}

/// Reads a full `TableSchema`. Fails with `TableMissing` if no columns are
/// reported (the table does not exist).
pub fn read_table_schema(conn: &Connection, table: &str) -> Result<TableSchema, Error> {
    let cols = columns(conn, table).map_err(|e| crate::error::rebuild_failed(table, e))?;
    if cols.is_empty() {
        return Err(Error::TableMissing { table: table.to_string() });
    }
    let sql = create_sql(conn, table)
        .map_err(|e| crate::error::rebuild_failed(table, e))?
        .unwrap_or_default();
    let foreign_keys = current_foreign_keys(conn, table).map_err(|e| crate::error::rebuild_failed(table, e))?;
    let idx = indexes(conn, table).map_err(|e| crate::error::rebuild_failed(table, e))?;
    let trig = triggers(conn, table).map_err(|e| crate::error::rebuild_failed(table, e))?;

    Ok(TableSchema {
        columns: cols,
        create_sql: sql,
        foreign_keys,
        indexes: idx,
        triggers: trig,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY AUTOINCREMENT);
             CREATE TABLE child (
                 id INTEGER PRIMARY KEY,
                 parent_id INTEGER,
                 FOREIGN KEY (parent_id) REFERENCES parent(id)
             );
             CREATE INDEX child_parent_idx ON child(parent_id);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn reads_columns_in_creation_order() {
        let conn = setup();
        let cols = columns(&conn, "child").unwrap();
        assert_eq!(cols.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), vec!["id", "parent_id"]);
    }

    #[test]
    fn reads_foreign_keys_grouped_by_id() {
        let conn = setup();
        let fks = current_foreign_keys(&conn, "child").unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].referenced_table, "parent");
        assert_eq!(fks[0].base_columns, vec!["parent_id".to_string()]);
    }

    #[test]
    fn indexes_mark_explicit_vs_implicit() {
        let conn = setup();
        let idx = indexes(&conn, "child").unwrap();
        let explicit = idx.iter().find(|i| i.name == "child_parent_idx").unwrap();
        assert!(!explicit.implicit);
        assert!(explicit.create_sql.is_some());
    }

    #[test]
    fn missing_table_fails() {
        let conn = setup();
        let err = read_table_schema(&conn, "nope").unwrap_err();
        assert!(matches!(err, Error::TableMissing { .. }));
    }

    #[test]
    fn list_tables_excludes_sqlite_internal() {
        let conn = setup();
        let tables = list_tables(&conn).unwrap();
        assert!(tables.iter().all(|t| !t.starts_with("sqlite_")));
        assert!(tables.contains(&"parent".to_string()));
        assert!(tables.contains(&"child".to_string()));
    }
}
