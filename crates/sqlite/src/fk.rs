//! Foreign-key comparison entity shared by the rebuild planner and schema
//! reader (§3 `ForeignKeySpec`).

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeySpec {
    pub base_columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
    pub r#match: Option<String>,
}

fn normalize_token(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase()
}

fn normalize_sequence(values: &[String]) -> Vec<String> {
    values.iter().map(|v| normalize_token(v)).collect()
}

impl ForeignKeySpec {
    /// Two specs are equal by base when their base-column sequences match
    /// case-insensitively after whitespace normalization.
    #[must_use]
    pub fn equal_by_base(&self, other: &Self) -> bool {
        normalize_sequence(&self.base_columns) == normalize_sequence(&other.base_columns)
    }

    /// Two specs are equal by target when the referenced table matches
    /// case-insensitively and the referenced-column sequences match.
    #[must_use]
    pub fn equal_by_target(&self, other: &Self) -> bool {
        self.referenced_table.eq_ignore_ascii_case(&other.referenced_table)
            && normalize_sequence(&self.referenced_columns) == normalize_sequence(&other.referenced_columns)
    }
}
