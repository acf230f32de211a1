//! Pipeline configuration (ambient stack, not a spec component).

use std::path::PathBuf;

/// Tunables for a single pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Run the Constraint Namer (C3) over FK changes missing an explicit
    /// `constraintName` before extraction.
    pub auto_name_constraints: bool,
    /// Skip writing the rewritten changelog when lowering made no changes.
    pub skip_when_empty: bool,
    /// Directory the rewritten changelog and any generated artifacts land in.
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            auto_name_constraints: true,
            skip_when_empty: true,
            output_dir: PathBuf::from("."),
        }
    }
}
