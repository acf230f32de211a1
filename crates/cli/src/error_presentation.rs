use std::{io, path::PathBuf};

use anyhow::Context;
use miette::Report;

const CHANGELOG_READ_CONTEXT: &str = "while reading the changelog file";
const OUTPUT_WRITE_CONTEXT: &str = "while writing the rewritten changelog";
const DATABASE_OPEN_CONTEXT: &str = "while opening the sqlite database";
const PIPELINE_CONTEXT: &str = "while running the rebuild pipeline";

pub(crate) type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug)]
pub(crate) enum CliError {
    ReadChangelog { path: PathBuf, source: io::Error },
    WriteOutput { path: PathBuf, source: io::Error },
    OpenDatabase { path: PathBuf, source: rusqlite::Error },
    Document(schemadrift_core::Error),
    Pipeline(schemadrift_sqlite::Error),
}

impl From<schemadrift_core::Error> for CliError {
    fn from(value: schemadrift_core::Error) -> Self {
        Self::Document(value)
    }
}

impl From<schemadrift_sqlite::Error> for CliError {
    fn from(value: schemadrift_sqlite::Error) -> Self {
        Self::Pipeline(value)
    }
}

pub(crate) fn render_runtime_error(error: CliError) -> String {
    match error {
        CliError::ReadChangelog { path, source } => {
            let context = format!("{CHANGELOG_READ_CONTEXT} `{}`", path.display());
            format!("[io] {}", report_with_context(source, context))
        }
        CliError::WriteOutput { path, source } => {
            let context = format!("{OUTPUT_WRITE_CONTEXT} `{}`", path.display());
            format!("[io] {}", report_with_context(source, context))
        }
        CliError::OpenDatabase { path, source } => {
            let context = format!("{DATABASE_OPEN_CONTEXT} `{}`", path.display());
            format!("[database] {}", report_with_context(source, context))
        }
        CliError::Document(source) => {
            format!("[changelog] {}", report_with_context(source, "while parsing the changelog"))
        }
        CliError::Pipeline(source) => {
            let category = pipeline_category(&source);
            format!("[{category}] {}", report_with_context(source, PIPELINE_CONTEXT))
        }
    }
}

fn report_with_context<E, C>(source: E, context: C) -> Report
where
    E: std::error::Error + Send + Sync + 'static,
    C: Into<String>,
{
    let context = context.into();
    let anyhow_error = std::result::Result::<(), E>::Err(source)
        .context(context)
        .expect_err("context wrapping must produce an error");
    miette::miette!("{anyhow_error:#}")
}

fn pipeline_category(error: &schemadrift_sqlite::Error) -> &'static str {
    match error {
        schemadrift_sqlite::Error::Document(_) => "changelog",
        schemadrift_sqlite::Error::TableMissing { .. } => "table-missing",
        schemadrift_sqlite::Error::IdentifierNotFound { .. } => "identifier",
        schemadrift_sqlite::Error::RebuildFailed { .. } => "rebuild",
        schemadrift_sqlite::Error::ReferentialIntegrityViolated { .. } => "referential-integrity",
        schemadrift_sqlite::Error::AuditStoreFailed { .. } => "audit-store",
    }
}
