mod error_presentation;

use std::path::PathBuf;

use clap::Parser;

use error_presentation::{render_runtime_error, CliError, CliResult};

/// Names and lowers the SQLite-incompatible operations in a changelog, then
/// rebuilds whichever tables that lowering left with pending foreign-key
/// work.
#[derive(Debug, Parser)]
#[command(name = "schemadrift", version, about)]
struct Cli {
    /// Path to the changelog document to read.
    #[arg(long)]
    changelog: PathBuf,

    /// Path to the SQLite database file the rebuilds run against.
    #[arg(long)]
    database: PathBuf,

    /// Directory the rewritten changelog is written into.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Assign deterministic names to anonymous foreign-key constraints before lowering.
    #[arg(long)]
    auto_name_constraints: bool,

    /// Skip writing the rewritten changelog when lowering changed nothing.
    #[arg(long)]
    skip_when_empty: bool,

    /// Increase log verbosity; repeat for more (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: &Cli) -> CliResult<()> {
    let raw = std::fs::read_to_string(&cli.changelog).map_err(|source| CliError::ReadChangelog {
        path: cli.changelog.clone(),
        source,
    })?;
    let document = schemadrift_core::parse(&raw)?;

    let mut conn = rusqlite::Connection::open(&cli.database).map_err(|source| CliError::OpenDatabase {
        path: cli.database.clone(),
        source,
    })?;

    let config = schemadrift_sqlite::PipelineConfig {
        auto_name_constraints: cli.auto_name_constraints,
        skip_when_empty: cli.skip_when_empty,
        output_dir: cli.output_dir.clone(),
    };

    let outcome = schemadrift_sqlite::run(&mut conn, &document, &config)?;

    let wrote_output = !(config.skip_when_empty && outcome.rewritten_document.change_sets.is_empty());
    if wrote_output {
        std::fs::create_dir_all(&cli.output_dir).map_err(|source| CliError::WriteOutput {
            path: cli.output_dir.clone(),
            source,
        })?;
        let file_name = cli.changelog.file_name().unwrap_or_else(|| std::ffi::OsStr::new("changelog.yaml"));
        let out_path = cli.output_dir.join(file_name);
        let rendered = schemadrift_core::serialize(&outcome.rewritten_document);
        std::fs::write(&out_path, rendered).map_err(|source| CliError::WriteOutput {
            path: out_path.clone(),
            source,
        })?;
        println!("wrote rewritten changelog to {}", out_path.display());
    } else {
        println!("lowering made no changes; skipped writing a rewritten changelog");
    }

    if outcome.pending_type_changes.is_empty() {
        println!("no pending type changes");
    } else {
        println!("pending type changes (not applied automatically):");
        for change in &outcome.pending_type_changes {
            println!("  {}.{} -> {}", change.table, change.column, change.new_type);
        }
    }

    if outcome.rebuilds.is_empty() {
        println!("no table rebuilds were required");
    } else {
        println!("rebuilds:");
        for (table, result) in &outcome.rebuilds {
            let status = if result.skipped { "skipped (already applied)" } else { "applied" };
            println!("  {table}: {status}, final foreign keys: {}", result.plan.final_foreign_keys.len());
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(error) = run(&cli) {
        eprintln!("{}", render_runtime_error(error));
        std::process::exit(1);
    }
}
