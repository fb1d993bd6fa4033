use super::CliError;
use anyhow::Context;
use dda_core::cases::{CommandCase, read_command_cases};
use dda_core::domain::BenchError;
use dda_core::engines::{EngineRegistry, UnitPolicy};
use std::path::{Path, PathBuf};
use tracing::info;

pub(super) fn load_cases(path: &Path) -> Result<Vec<CommandCase>, CliError> {
    let cases = read_command_cases(path).map_err(BenchError::from)?;
    if cases.is_empty() {
        return Err(BenchError::input_validation(
            "INPUT.CASE_FILE_EMPTY",
            format!("command file '{}' defines no cases", path.display()),
        )
        .into());
    }
    info!("loaded {} case(s) from {}", cases.len(), path.display());
    Ok(cases)
}

pub(super) fn load_registry(path: &Path, unit_policy: UnitPolicy) -> Result<EngineRegistry, CliError> {
    Ok(EngineRegistry::from_path(path, unit_policy).map_err(BenchError::from)?)
}

pub(super) fn parse_unit_policy(value: &str) -> Result<UnitPolicy, CliError> {
    UnitPolicy::parse(value).ok_or_else(|| {
        CliError::Usage(format!(
            "unknown unit policy '{}' (expected 'strict' or 'assume-meters')",
            value
        ))
    })
}

/// Prepare sources resolve against the engine config's directory unless an
/// explicit root was given.
pub(super) fn resolve_resource_root(
    explicit: Option<&Path>,
    code_config: &Path,
) -> Result<PathBuf, CliError> {
    if let Some(root) = explicit {
        return Ok(root.to_path_buf());
    }
    let parent = code_config
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty());
    match parent {
        Some(parent) => Ok(parent.to_path_buf()),
        None => Ok(std::env::current_dir().context("failed to read the working directory")?),
    }
}
