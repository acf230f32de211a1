//! SQLite-aware change-plan lowering and table-rebuild engine.
//!
//! Builds on [`schemadrift_core`]'s changelog model to name anonymous foreign
//! keys, lower operations SQLite cannot run natively, and carry out the
//! rename-based table rebuilds those lowered operations require.

mod audit;
mod config;
mod error;
mod executor;
mod extractor;
mod fk;
mod lowering;
mod namer;
mod normalizer;
mod pipeline;
mod planner;
mod schema_reader;

pub use audit::{canonical_plan_text, hash_plan, AuditStore, AUDIT_TABLE};
pub use config::PipelineConfig;
pub use error::{Error, ForeignKeyRow, ReferentialViolation, Result};
pub use executor::{rebuild_table, RebuildOutcome};
pub use extractor::extract;
pub use fk::ForeignKeySpec;
pub use lowering::{lower, LoweringOutput, PendingTypeChange, RebuildRequest};
pub use namer::name_foreign_key;
pub use normalizer::resolve as resolve_identifier;
pub use pipeline::{run, PipelineOutcome};
pub use planner::{plan, render_create_table, RebuildPlan};
pub use schema_reader::{
    current_foreign_keys, list_tables, read_table_schema, Column, IndexDefinition, TableSchema,
    TriggerDefinition,
};
