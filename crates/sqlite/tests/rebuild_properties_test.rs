//! Exercises the rebuild executor's testable properties (spec §8:
//! data preservation, index/trigger preservation, AUTOINCREMENT
//! preservation, residue cleanup, failure atomicity, at-most-once).

use rusqlite::Connection;
use schemadrift_sqlite::{rebuild_table, AuditStore, ForeignKeySpec, RebuildRequest};

fn seeded_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE parent (id INTEGER PRIMARY KEY AUTOINCREMENT, label TEXT);
         CREATE TABLE child (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             parent_id INTEGER,
             note TEXT NOT NULL DEFAULT 'n/a'
         );
         INSERT INTO parent (label) VALUES ('p1'), ('p2');
         INSERT INTO child (parent_id, note) VALUES (1, 'a'), (2, 'b'), (NULL, 'c');
         CREATE INDEX child_note_idx ON child(note);
         CREATE TRIGGER child_no_delete BEFORE DELETE ON child BEGIN SELECT RAISE(IGNORE); END;",
    )
    .unwrap();
    conn
}

fn add_parent_fk() -> RebuildRequest {
    RebuildRequest {
        to_add: vec![ForeignKeySpec {
            base_columns: vec!["parent_id".to_string()],
            referenced_table: "parent".to_string(),
            referenced_columns: vec!["id".to_string()],
            on_delete: None,
            on_update: None,
            r#match: None,
        }],
        to_drop: vec![],
    }
}

#[test]
fn data_survives_the_rebuild_byte_for_byte() {
    let mut conn = seeded_connection();
    let audit = AuditStore::default();
    rebuild_table(&mut conn, &audit, "child", &add_parent_fk()).unwrap();

    let mut stmt = conn.prepare("SELECT id, parent_id, note FROM child ORDER BY id").unwrap();
    let rows: Vec<(i64, Option<i64>, String)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(rows, vec![(1, Some(1), "a".to_string()), (2, Some(2), "b".to_string()), (3, None, "c".to_string())]);
}

#[test]
fn indexes_and_triggers_survive_the_rebuild() {
    let mut conn = seeded_connection();
    let audit = AuditStore::default();
    rebuild_table(&mut conn, &audit, "child", &add_parent_fk()).unwrap();

    let index_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name='child_note_idx'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(index_count, 1);

    let trigger_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='trigger' AND name='child_no_delete'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(trigger_count, 1);
}

#[test]
fn autoincrement_is_preserved_across_the_rebuild() {
    let mut conn = seeded_connection();
    let audit = AuditStore::default();
    rebuild_table(&mut conn, &audit, "child", &add_parent_fk()).unwrap();

    conn.execute("DELETE FROM child WHERE id = 3", []).ok();
    // DELETE is blocked by the trigger, so this just proves the table is usable;
    // the real signal is a fresh insert continuing the sequence past the max seen id.
    conn.execute("INSERT INTO child (parent_id, note) VALUES (1, 'd')", []).unwrap();
    let max_id: i64 = conn.query_row("SELECT MAX(id) FROM child", [], |r| r.get(0)).unwrap();
    assert!(max_id >= 4);
}

#[test]
fn a_prior_residual_temp_table_is_dropped_before_rebuilding() {
    let mut conn = seeded_connection();
    conn.execute_batch("CREATE TABLE __tmp_child (leftover INTEGER);").unwrap();
    let audit = AuditStore::default();
    let outcome = rebuild_table(&mut conn, &audit, "child", &add_parent_fk()).unwrap();
    assert!(!outcome.skipped);

    let leftover_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM sqlite_master WHERE name = '__tmp_child'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(leftover_count, 0);
}

#[test]
fn a_referential_violation_leaves_the_table_untouched() {
    let mut conn = seeded_connection();
    conn.execute("INSERT INTO child (parent_id, note) VALUES (999, 'orphan')", []).unwrap();
    let audit = AuditStore::default();

    let result = rebuild_table(&mut conn, &audit, "child", &add_parent_fk());
    assert!(result.is_err());

    // Original table (four rows now, including the orphan) must be intact, unrenamed.
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM child", [], |r| r.get(0)).unwrap();
    assert_eq!(count, 4);
    let bak_exists: i64 = conn
        .query_row("SELECT COUNT(*) FROM sqlite_master WHERE name = '__bak_child'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(bak_exists, 0);
}

#[test]
fn the_same_plan_is_applied_at_most_once() {
    let mut conn = seeded_connection();
    let audit = AuditStore::default();
    let first = rebuild_table(&mut conn, &audit, "child", &add_parent_fk()).unwrap();
    let second = rebuild_table(&mut conn, &audit, "child", &add_parent_fk()).unwrap();
    assert!(!first.skipped);
    assert!(second.skipped);
}
