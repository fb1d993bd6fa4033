mod model;
mod registry;
mod units;

pub use model::{
    CleanupRules, ColumnRef, CsvColumnsSpec, CsvSpec, EngineConfig, FilePattern, Hdf5Spec,
    LengthSpec, PrepareAction, PrepareStep, QuantitySpec, SeriesSource, SeriesTransform,
    SourceLocation, TextSpec, TextTableSpec, Vec3NormSpec,
};
pub use registry::EngineRegistry;
pub use units::{LengthUnit, UnitPolicy};

pub(crate) use registry::compile_glob;

use crate::domain::BenchError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read engine config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse engine config: {source}")]
    Parse { source: serde_json::Error },
    #[error("engine config must be a JSON object mapping engine names to definitions")]
    NotAnObject,
    #[error("engine config declares no engines")]
    NoEngines,
    #[error("engine '{engine}': {source}")]
    EngineSchema {
        engine: String,
        source: serde_json::Error,
    },
    #[error("engine '{engine}': {reason}")]
    InvalidEngine { engine: String, reason: String },
    #[error("engine '{engine}', quantity '{quantity}': {reason}")]
    InvalidSpec {
        engine: String,
        quantity: String,
        reason: String,
    },
    #[error("engine '{engine}', quantity '{quantity}': unknown extraction type '{kind}'")]
    UnknownSpecType {
        engine: String,
        quantity: String,
        kind: String,
    },
    #[error("engine '{engine}', field '{field}': invalid regex: {source}")]
    InvalidPattern {
        engine: String,
        field: String,
        source: regex::Error,
    },
    #[error("engine '{engine}', field '{field}': pattern lacks named group '{group}'")]
    MissingCaptureGroup {
        engine: String,
        field: String,
        group: String,
    },
    #[error("engine '{engine}': invalid glob '{pattern}': {source}")]
    InvalidGlob {
        engine: String,
        pattern: String,
        source: globset::Error,
    },
    #[error("engine '{engine}', field '{field}': unrecognized length unit '{unit}'")]
    UnknownUnit {
        engine: String,
        field: String,
        unit: String,
    },
    #[error("no engine claims command '{command}'")]
    UnroutableCommand { command: String },
    #[error("case '{case_id}': @skip_pairs names unknown engine '{engine}'")]
    UnknownSkipPairEngine { case_id: String, engine: String },
}

impl From<ConfigError> for BenchError {
    fn from(error: ConfigError) -> Self {
        let message = error.to_string();
        let placeholder = match &error {
            ConfigError::Read { .. } => return BenchError::io_system("IO.ENGINE_CONFIG", message),
            ConfigError::Parse { .. } | ConfigError::NotAnObject | ConfigError::NoEngines => {
                "INPUT.ENGINE_CONFIG"
            }
            ConfigError::EngineSchema { .. } | ConfigError::InvalidEngine { .. } => {
                "INPUT.ENGINE_SCHEMA"
            }
            ConfigError::InvalidSpec { .. }
            | ConfigError::UnknownSpecType { .. }
            | ConfigError::InvalidPattern { .. }
            | ConfigError::MissingCaptureGroup { .. }
            | ConfigError::InvalidGlob { .. } => "INPUT.QUANTITY_SPEC",
            ConfigError::UnknownUnit { .. } => "INPUT.LENGTH_UNIT",
            ConfigError::UnroutableCommand { .. } => "INPUT.UNROUTABLE_COMMAND",
            ConfigError::UnknownSkipPairEngine { .. } => "INPUT.SKIP_PAIR_ENGINE",
        };
        BenchError::input_validation(placeholder, message)
    }
}
