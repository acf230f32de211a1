//! Deterministic naming of anonymous foreign-key operations (§4.2, C3).

const MAX_NAME_LEN: usize = 60;

/// Lowercases, replaces any character outside `[a-z0-9_]` with `_`, collapses
/// runs of `_`, strips a leading `_`, and falls back to `v` if empty.
pub fn slug(input: &str) -> String {
    let lowered = input.to_ascii_lowercase();
    let mut replaced = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
            replaced.push(ch);
        } else {
            replaced.push('_');
        }
    }

    let mut collapsed = String::with_capacity(replaced.len());
    let mut prev_underscore = false;
    for ch in replaced.chars() {
        if ch == '_' {
            if !prev_underscore {
                collapsed.push(ch);
            }
            prev_underscore = true;
        } else {
            collapsed.push(ch);
            prev_underscore = false;
        }
    }

    let stripped = collapsed.trim_start_matches('_');
    if stripped.is_empty() {
        "v".to_string()
    } else {
        stripped.to_string()
    }
}

fn truncate(name: String) -> String {
    if name.len() <= MAX_NAME_LEN {
        name
    } else {
        name.chars().take(MAX_NAME_LEN).collect()
    }
}

/// Assigns a deterministic constraint name, falling back to `table`/`col`
/// tokens when the base table or base columns are unavailable.
pub fn name_foreign_key(base_table: Option<&str>, base_columns: &[String], referenced_table: Option<&str>) -> String {
    let table_part = match base_table {
        Some(t) if !t.is_empty() => slug(t),
        _ => "table".to_string(),
    };
    let columns_part = if base_columns.is_empty() {
        "col".to_string()
    } else {
        slug(&base_columns.join("_"))
    };

    let name = match referenced_table {
        Some(rt) if !rt.is_empty() => format!("fk_{table_part}_{columns_part}__{}", slug(rt)),
        _ => format!("fk_{table_part}_{columns_part}"),
    };

    truncate(name)
}
