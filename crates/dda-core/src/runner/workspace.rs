use crate::domain::{BenchError, BenchResult};
use crate::engines::{EngineConfig, EngineRegistry, PrepareAction, PrepareStep};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Materializes the engine's prepare steps inside `work_dir`. Sources are
/// resolved against `resource_root`.
pub fn prepare_work_dir(
    engine: &EngineConfig,
    resource_root: &Path,
    work_dir: &Path,
) -> BenchResult<()> {
    fs::create_dir_all(work_dir).map_err(|source| {
        BenchError::io_system(
            "IO.WORK_DIR",
            format!(
                "failed to create work directory '{}': {}",
                work_dir.display(),
                source
            ),
        )
    })?;

    for step in &engine.prepare {
        apply_step(engine, step, resource_root, work_dir)?;
    }
    Ok(())
}

fn apply_step(
    engine: &EngineConfig,
    step: &PrepareStep,
    resource_root: &Path,
    work_dir: &Path,
) -> BenchResult<()> {
    let source = resource_root.join(&step.source);
    if fs::symlink_metadata(&source).is_err() {
        return Err(BenchError::io_system(
            "IO.PREPARE",
            format!(
                "engine '{}' prepare source '{}' does not exist",
                engine.name,
                source.display()
            ),
        ));
    }

    let target_name = match &step.target {
        Some(name) => PathBuf::from(name),
        None => source
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| {
                BenchError::input_validation(
                    "INPUT.ENGINE_CONFIG",
                    format!(
                        "engine '{}' prepare source '{}' has no file name",
                        engine.name,
                        step.source.display()
                    ),
                )
            })?,
    };
    let target = work_dir.join(target_name);
    if fs::symlink_metadata(&target).is_ok() {
        remove_entry(&target).map_err(|error| prepare_error(engine, &target, error))?;
    }

    let outcome = match step.action {
        PrepareAction::Symlink => link(&source, &target),
        PrepareAction::Copy => copy_entry(&source, &target),
    };
    outcome.map_err(|error| prepare_error(engine, &target, error))?;
    debug!("prepared {} for {}", target.display(), engine.name);
    Ok(())
}

fn prepare_error(engine: &EngineConfig, target: &Path, error: io::Error) -> BenchError {
    BenchError::io_system(
        "IO.PREPARE",
        format!(
            "engine '{}' failed to prepare '{}': {}",
            engine.name,
            target.display(),
            error
        ),
    )
}

#[cfg(unix)]
fn link(source: &Path, target: &Path) -> io::Result<()> {
    let source = fs::canonicalize(source)?;
    std::os::unix::fs::symlink(source, target)
}

#[cfg(not(unix))]
fn link(source: &Path, target: &Path) -> io::Result<()> {
    copy_entry(source, target)
}

fn copy_entry(source: &Path, target: &Path) -> io::Result<()> {
    if !source.is_dir() {
        return fs::copy(source, target).map(|_| ());
    }
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        copy_entry(&entry.path(), &target.join(entry.file_name()))?;
    }
    Ok(())
}

fn remove_entry(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Deletes files under `output_dir` named by any engine's cleanup rules.
/// Names match exactly, globs match file names at any depth. Failures are
/// logged and skipped. Returns the number of removed entries.
pub fn clean_output_tree(output_dir: &Path, registry: &EngineRegistry) -> usize {
    let mut entries = Vec::new();
    collect_tree(output_dir, &mut entries);
    // Children before parents.
    entries.sort();
    entries.reverse();

    let mut removed = 0;
    for engine in registry.engines() {
        let rules = &engine.cleanup;
        for path in &entries {
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let by_name = rules.remove_names.iter().any(|wanted| wanted == name);
            let by_glob = rules
                .remove_globs
                .iter()
                .any(|pattern| pattern.matcher.is_match(name));
            if !(by_name || by_glob) || fs::symlink_metadata(path).is_err() {
                continue;
            }
            match remove_entry(path) {
                Ok(()) => removed += 1,
                Err(error) => warn!("cleanup could not remove {}: {}", path.display(), error),
            }
        }
    }
    removed
}

fn collect_tree(dir: &Path, entries: &mut Vec<PathBuf>) {
    let Ok(read_dir) = fs::read_dir(dir) else {
        return;
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        let is_real_dir = entry
            .file_type()
            .map(|file_type| file_type.is_dir())
            .unwrap_or(false);
        entries.push(path.clone());
        if is_real_dir {
            collect_tree(&path, entries);
        }
    }
}
