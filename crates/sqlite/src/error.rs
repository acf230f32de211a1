use std::fmt;

/// One row of `PRAGMA foreign_key_list` output, captured for diagnostics.
#[derive(Debug, Clone)]
pub struct ForeignKeyRow {
    pub id: i64,
    pub seq: i64,
    pub from: String,
    pub table: String,
    pub to: String,
    pub on_update: String,
    pub on_delete: String,
    pub r#match: String,
}

#[derive(Debug)]
pub struct ReferentialViolation {
    pub table: String,
    pub rowid: Option<i64>,
    pub parent: String,
    pub fk_id: i64,
}

#[derive(Debug)]
pub enum Error {
    Document(schemadrift_core::Error),
    TableMissing {
        table: String,
    },
    IdentifierNotFound {
        requested: String,
        candidates: Vec<String>,
    },
    RebuildFailed {
        table: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    ReferentialIntegrityViolated {
        violations: Vec<ReferentialViolation>,
        offending_tables: Vec<(String, Vec<ForeignKeyRow>)>,
    },
    AuditStoreFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document(error) => write!(f, "{error}"),
            Self::TableMissing { table } => write!(f, "table `{table}` is not present in the live schema"),
            Self::IdentifierNotFound { requested, candidates } => {
                write!(
                    f,
                    "identifier `{requested}` could not be resolved against known names: {}",
                    candidates.join(", ")
                )
            }
            Self::RebuildFailed { table, source } => {
                write!(f, "rebuild of table `{table}` failed: {source}")
            }
            Self::ReferentialIntegrityViolated {
                violations,
                offending_tables,
            } => {
                writeln!(f, "foreign_key_check reported {} violation(s):", violations.len())?;
                for v in violations {
                    writeln!(
                        f,
                        "  table={} rowid={:?} parent={} fk_id={}",
                        v.table, v.rowid, v.parent, v.fk_id
                    )?;
                }
                for (table, rows) in offending_tables {
                    writeln!(f, "  foreign keys on {table}:")?;
                    for row in rows {
                        writeln!(
                            f,
                            "    id={} seq={} from={} table={} to={} on_update={} on_delete={} match={}",
                            row.id, row.seq, row.from, row.table, row.to, row.on_update, row.on_delete, row.r#match
                        )?;
                    }
                }
                Ok(())
            }
            Self::AuditStoreFailed { source } => write!(f, "audit store operation failed: {source}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Document(error) => Some(error),
            Self::RebuildFailed { source, .. } => Some(source.as_ref()),
            Self::AuditStoreFailed { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<schemadrift_core::Error> for Error {
    fn from(value: schemadrift_core::Error) -> Self {
        Self::Document(value)
    }
}

pub fn rebuild_failed(table: impl Into<String>, source: rusqlite::Error) -> Error {
    Error::RebuildFailed {
        table: table.into(),
        source: Box::new(source),
    }
}

pub fn audit_store_failed(source: rusqlite::Error) -> Error {
    Error::AuditStoreFailed { source: Box::new(source) }
}

pub type Result<T> = std::result::Result<T, Error>;
