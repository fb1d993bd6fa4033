//! Config-driven readers turning engine output files into named quantities.
//!
//! Every reader reports a missing file, a pattern miss or an unparseable
//! capture as `None`; absence is never an error at this layer.

mod files;
mod hdf5;
mod table;
mod text;

pub(crate) use files::{EntryKind, glob_entries, natural_cmp};
pub use text::equivalent_radius;

use crate::domain::EngineValues;
use crate::engines::{EngineConfig, Hdf5Spec, LengthSpec, QuantitySpec, SeriesSource, SeriesTransform};
use files::resolve_source;
use std::path::{Path, PathBuf};
use tracing::debug;

fn output_dir(primary_output: &Path) -> &Path {
    primary_output
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Candidate files for scalar lookups: the primary output first, then every
/// `extra_files` glob in declared order.
fn scalar_candidates(engine: &EngineConfig, primary_output: &Path) -> Vec<PathBuf> {
    let dir = output_dir(primary_output);
    let mut candidates = vec![primary_output.to_path_buf()];
    for pattern in &engine.extra_files {
        candidates.extend(glob_entries(dir, pattern, EntryKind::File));
    }
    candidates
}

pub fn extract_scalar(engine: &EngineConfig, quantity: &str, primary_output: &Path) -> Option<f64> {
    let spec = engine.output(quantity)?;
    if !spec.yields_scalar() {
        debug!(engine = %engine.name, quantity, kind = spec.type_name(), "spec is not scalar");
        return None;
    }

    if let QuantitySpec::Hdf5(hdf5_spec) = spec
        && let Some(source) = &hdf5_spec.source
    {
        let path = resolve_source(source, output_dir(primary_output))?;
        return hdf5_scalar(&path, hdf5_spec);
    }

    let value = scalar_candidates(engine, primary_output)
        .iter()
        .find_map(|candidate| scalar_from_file(spec, candidate));
    if value.is_none() {
        debug!(engine = %engine.name, quantity, "quantity not found in outputs");
    }
    value
}

fn scalar_from_file(spec: &QuantitySpec, path: &Path) -> Option<f64> {
    match spec {
        QuantitySpec::Text(spec) => text::text_scalar(&text::read_text(path)?, spec),
        QuantitySpec::TextVec3Norm(spec) => text::vec3_norm(&text::read_text(path)?, spec),
        QuantitySpec::Hdf5(spec) => hdf5_scalar(path, spec),
        QuantitySpec::Csv(_) | QuantitySpec::CsvColumns(_) | QuantitySpec::TextTableColumns(_) => {
            None
        }
    }
}

fn hdf5_scalar(path: &Path, spec: &Hdf5Spec) -> Option<f64> {
    let values = hdf5::read_dataset(path, &spec.dataset)?;
    let value = match spec.index {
        Some(index) => *values.get(index)?,
        None if values.len() == 1 => values[0],
        None => return None,
    };
    Some(value * spec.unit_factor)
}

fn locate(source: Option<&SeriesSource>, primary_output: &Path) -> Option<PathBuf> {
    match source {
        Some(source) => resolve_source(source, output_dir(primary_output)),
        None => Some(primary_output.to_path_buf()),
    }
}

pub fn extract_series(
    engine: &EngineConfig,
    quantity: &str,
    primary_output: &Path,
    known: &EngineValues,
) -> Option<Vec<f64>> {
    let spec = engine.output(quantity)?;
    let (values, unit_factor, transforms) = match spec {
        QuantitySpec::Hdf5(spec) => {
            let path = locate(spec.source.as_ref(), primary_output)?;
            let values = hdf5::read_dataset(&path, &spec.dataset)?;
            (values, spec.unit_factor, spec.transforms.as_slice())
        }
        QuantitySpec::Csv(spec) => {
            let content = text::read_text(&locate(spec.source.as_ref(), primary_output)?)?;
            let values = table::delimited_column(&content, &spec.column, spec.delimiter)?;
            (values, spec.unit_factor, spec.transforms.as_slice())
        }
        QuantitySpec::CsvColumns(spec) => {
            let content = text::read_text(&locate(spec.source.as_ref(), primary_output)?)?;
            let values = table::delimited_columns(&content, &spec.columns, spec.delimiter)?;
            (values, spec.unit_factor, spec.transforms.as_slice())
        }
        QuantitySpec::TextTableColumns(spec) => {
            let content = text::read_text(&locate(spec.source.as_ref(), primary_output)?)?;
            let values = table::text_table(&content, spec)?;
            (values, spec.unit_factor, spec.transforms.as_slice())
        }
        QuantitySpec::Text(_) | QuantitySpec::TextVec3Norm(_) => {
            debug!(engine = %engine.name, quantity, kind = spec.type_name(), "spec is not a series");
            return None;
        }
    };

    let scaled = values
        .into_iter()
        .map(|value| value * unit_factor)
        .collect::<Vec<_>>();
    let transformed = apply_transforms(scaled, transforms, known)?;
    if transformed.is_empty() {
        debug!(engine = %engine.name, quantity, "series is empty after transforms");
        return None;
    }
    Some(transformed)
}

pub fn apply_transforms(
    mut values: Vec<f64>,
    transforms: &[SeriesTransform],
    known: &EngineValues,
) -> Option<Vec<f64>> {
    for transform in transforms {
        match transform {
            SeriesTransform::FilterZeros => values.retain(|value| *value != 0.0),
            SeriesTransform::DivideBy(quantity) => {
                let divisor = known.get(quantity).filter(|divisor| *divisor != 0.0);
                let Some(divisor) = divisor else {
                    debug!(quantity = %quantity, "divisor missing or zero");
                    return None;
                };
                values.iter_mut().for_each(|value| *value /= divisor);
            }
            SeriesTransform::Square => values.iter_mut().for_each(|value| *value *= *value),
        }
    }
    Some(values)
}

fn extract_length(engine: &EngineConfig, spec: &LengthSpec, primary_output: &Path) -> Option<f64> {
    scalar_candidates(engine, primary_output)
        .iter()
        .find_map(|candidate| text::length_meters(&text::read_text(candidate)?, spec))
}

/// Effective radius in meters.
pub fn extract_aeff(engine: &EngineConfig, primary_output: &Path) -> Option<f64> {
    extract_length(engine, engine.aeff.as_ref()?, primary_output)
}

/// Wavelength in meters.
pub fn extract_lambda(engine: &EngineConfig, primary_output: &Path) -> Option<f64> {
    extract_length(engine, engine.lambda.as_ref()?, primary_output)
}

#[cfg(test)]
mod tests {
    use super::{apply_transforms, extract_aeff, extract_lambda, extract_scalar, extract_series};
    use crate::domain::EngineValues;
    use crate::engines::{EngineConfig, EngineRegistry, SeriesTransform, UnitPolicy};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn engine(outputs: &str, extra: &str) -> EngineConfig {
        let config = format!(
            r#"{{"adda": {{"prefix": "adda", "detect_substrings": ["adda"], "outputs": {outputs}, {extra}}}}}"#
        );
        EngineRegistry::from_json_str(&config, UnitPolicy::Strict)
            .expect("test config should load")
            .engines()[0]
            .clone()
    }

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent directory should be created");
        }
        fs::write(path, content).expect("test file should be written");
    }

    #[test]
    fn missing_spec_or_file_is_absent() {
        let temp = TempDir::new().expect("tempdir should be created");
        let adda = engine(
            r#"{"Cext": {"pattern": "Cext\\s*=\\s*(?P<value>\\S+)"}}"#,
            r#""extra_files": []"#,
        );
        let stdout = temp.path().join("stdout.txt");

        assert_eq!(extract_scalar(&adda, "Qext", &stdout), None);
        assert_eq!(extract_scalar(&adda, "Cext", &stdout), None);

        write_file(&stdout, "Cext = 3.25e-13\n");
        assert_eq!(extract_scalar(&adda, "Cext", &stdout), Some(3.25e-13));
    }

    #[test]
    fn scalar_lookup_falls_back_to_extra_files_in_declared_order() {
        let temp = TempDir::new().expect("tempdir should be created");
        let adda = engine(
            r#"{"Qabs": {"pattern": "Qabs\\s*=\\s*(?P<value>\\S+)"}}"#,
            r#""extra_files": ["CrossSec-*", "log*"]"#,
        );
        let stdout = temp.path().join("stdout.txt");
        write_file(&stdout, "all data written to CrossSec-Y\n");
        write_file(&temp.path().join("log"), "Qabs = 9.0\n");
        write_file(&temp.path().join("CrossSec-X"), "no value\n");
        write_file(&temp.path().join("CrossSec-Y"), "Qabs = 0.75\n");

        assert_eq!(extract_scalar(&adda, "Qabs", &stdout), Some(0.75));
    }

    #[test]
    fn vector_norm_quantities_are_extracted() {
        let temp = TempDir::new().expect("tempdir should be created");
        let adda = engine(
            r#"{"force": {"type": "text_vec3_norm", "pattern": "Fr = \\((?P<x>[^,]+), (?P<y>[^,]+), (?P<z>[^)]+)\\)", "unit_factor": 0.5}}"#,
            r#""extra_files": []"#,
        );
        let stdout = temp.path().join("stdout.txt");
        write_file(&stdout, "Fr = (6, 8, 0)\n");
        assert_eq!(extract_scalar(&adda, "force", &stdout), Some(5.0));
    }

    #[test]
    fn series_from_latest_run_directory_applies_transforms() {
        let temp = TempDir::new().expect("tempdir should be created");
        let adda = engine(
            r#"{"int_field": {"type": "csv", "run_dir_glob": "run*", "glob": "IntField-*",
                "column": "|E|^2", "transforms": ["filter_zeros", {"divide_by": "E0"}, "square"]}}"#,
            r#""extra_files": []"#,
        );
        let stdout = temp.path().join("stdout.txt");
        write_file(&stdout, "");
        write_file(&temp.path().join("run000_old/IntField-Y"), "x |E|^2\n0 100\n");
        write_file(&temp.path().join("run001_new/IntField-Y"), "x |E|^2\n0 2\n1 0\n2 4\n");

        let mut known = EngineValues::new();
        known.insert_raw("E0", 2.0);
        let series = extract_series(&adda, "int_field", &stdout, &known)
            .expect("series should be extracted");
        assert_eq!(series, vec![1.0, 4.0]);

        let without_e0 = extract_series(&adda, "int_field", &stdout, &EngineValues::new());
        assert_eq!(without_e0, None);
    }

    #[test]
    fn text_table_series_reads_from_primary_output() {
        let temp = TempDir::new().expect("tempdir should be created");
        let adda = engine(
            r#"{"mueller": {"type": "text_table_columns", "header_pattern": "^theta", "first_column": 1, "column_count": 2, "unit_factor": 10}}"#,
            r#""extra_files": []"#,
        );
        let stdout = temp.path().join("stdout.txt");
        write_file(&stdout, "theta s11 s12\n0 1 2\n90 3 4\nend\n");
        let series = extract_series(&adda, "mueller", &stdout, &EngineValues::new())
            .expect("table should be extracted");
        assert_eq!(series, vec![10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn divide_by_zero_quantity_fails_the_transform_pipeline() {
        let mut known = EngineValues::new();
        known.insert_raw("E0", 0.0);
        let transforms = [SeriesTransform::DivideBy("E0".to_string())];
        assert_eq!(apply_transforms(vec![1.0], &transforms, &known), None);
    }

    #[test]
    fn lengths_are_read_in_meters() {
        let temp = TempDir::new().expect("tempdir should be created");
        let adda = engine(
            "{}",
            r#""extra_files": ["log"],
               "aeff": {"pattern": "a_eq\\s*=\\s*(?P<value>\\S+)", "unit": "um"},
               "lambda": {"pattern": "lambda:\\s*(?P<value>\\S+)", "unit": "nm"}"#,
        );
        let stdout = temp.path().join("stdout.txt");
        write_file(&stdout, "lambda: 500\n");
        write_file(&temp.path().join("log"), "a_eq = 0.25\n");

        let aeff = extract_aeff(&adda, &stdout).expect("aeff should come from the extra file");
        assert!((aeff - 0.25e-6).abs() < 1e-18);
        let lambda = extract_lambda(&adda, &stdout).expect("lambda should be read");
        assert!((lambda - 500.0e-9).abs() < 1e-18);
    }
}
