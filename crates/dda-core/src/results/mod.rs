//! Persisted artifacts of a bench run.

mod summary;

pub use summary::write_summary_csv;

use crate::domain::BenchError;
use crate::orchestrator::{CaseReport, CaseValues};
use serde::Serialize;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const RESULTS_FILE: &str = "results.json";
pub const SUMMARY_FILE: &str = "summary.csv";
pub const REPORT_FILE: &str = "report.json";

#[derive(Debug)]
pub enum ResultsError {
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    ReadDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    ReadResults {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseResults {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Display for ResultsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateDirectory { path, source } => write!(
                f,
                "failed to create directory '{}': {}",
                path.display(),
                source
            ),
            Self::Serialize { path, source } => {
                write!(f, "failed to serialize '{}': {}", path.display(), source)
            }
            Self::Write { path, source } => {
                write!(f, "failed to write '{}': {}", path.display(), source)
            }
            Self::ReadDirectory { path, source } => write!(
                f,
                "failed to read directory '{}': {}",
                path.display(),
                source
            ),
            Self::ReadResults { path, source } => {
                write!(f, "failed to read results '{}': {}", path.display(), source)
            }
            Self::ParseResults { path, source } => {
                write!(f, "failed to parse results '{}': {}", path.display(), source)
            }
        }
    }
}

impl Error for ResultsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDirectory { source, .. }
            | Self::Write { source, .. }
            | Self::ReadDirectory { source, .. }
            | Self::ReadResults { source, .. } => Some(source),
            Self::Serialize { source, .. } | Self::ParseResults { source, .. } => Some(source),
        }
    }
}

impl From<ResultsError> for BenchError {
    fn from(error: ResultsError) -> Self {
        let message = error.to_string();
        match error {
            ResultsError::CreateDirectory { .. }
            | ResultsError::Write { .. }
            | ResultsError::ReadDirectory { .. }
            | ResultsError::ReadResults { .. } => BenchError::io_system("IO.RESULTS", message),
            ResultsError::ParseResults { .. } => {
                BenchError::input_validation("INPUT.RESULTS_FILE", message)
            }
            ResultsError::Serialize { .. } => BenchError::internal("SYS.RESULTS_SERIALIZE", message),
        }
    }
}

/// Directory name for a case id; path separators are flattened.
pub fn case_dir_name(case_id: &str) -> String {
    case_id.replace(['/', '\\'], "_")
}

/// Directory holding a case's runs and `results.json`.
pub fn case_dir(output_dir: &Path, case_id: &str) -> PathBuf {
    output_dir.join(case_dir_name(case_id))
}

fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
}

pub fn case_results_document(case_id: &str, values: &CaseValues) -> Result<Value, serde_json::Error> {
    let mut engines = Map::new();
    let mut provenance = Map::new();
    for record in values.engines() {
        let mut quantities = Map::new();
        let mut sources = Map::new();
        for (name, tagged) in record.values.iter() {
            quantities.insert(name.to_string(), number(tagged.value));
            sources.insert(
                name.to_string(),
                Value::String(tagged.provenance.as_str().to_string()),
            );
        }
        engines.insert(record.name.clone(), Value::Object(quantities));
        provenance.insert(record.name.clone(), Value::Object(sources));
    }

    let runs = values
        .runs()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;

    let mut document = Map::new();
    document.insert("case".to_string(), Value::String(case_id.to_string()));
    document.insert("engines".to_string(), Value::Object(engines));
    document.insert("provenance".to_string(), Value::Object(provenance));
    document.insert("runs".to_string(), Value::Array(runs));
    Ok(Value::Object(document))
}

pub fn write_case_results(
    output_dir: &Path,
    case_id: &str,
    values: &CaseValues,
) -> Result<PathBuf, ResultsError> {
    let path = case_dir(output_dir, case_id).join(RESULTS_FILE);
    let document = case_results_document(case_id, values).map_err(|source| {
        ResultsError::Serialize {
            path: path.clone(),
            source,
        }
    })?;
    write_json(&path, &document)?;
    Ok(path)
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchRunReport {
    pub generated_at_unix_seconds: u64,
    pub passed: bool,
    pub output_dir: String,
    pub case_count: usize,
    pub passed_case_count: usize,
    pub failed_case_count: usize,
    pub pair_count: usize,
    pub failed_pair_count: usize,
    pub skipped_pair_count: usize,
    pub cases: Vec<CaseReport>,
}

impl BenchRunReport {
    pub fn from_cases(output_dir: &Path, cases: Vec<CaseReport>) -> Self {
        let case_count = cases.len();
        let passed_case_count = cases.iter().filter(|case| case.passed).count();
        let failed_case_count = case_count.saturating_sub(passed_case_count);
        let pair_count = cases.iter().map(|case| case.pair_count).sum::<usize>();
        let failed_pair_count = cases.iter().map(|case| case.failed_pair_count).sum::<usize>();
        let skipped_pair_count = cases
            .iter()
            .map(|case| case.skipped_pair_count)
            .sum::<usize>();

        Self {
            generated_at_unix_seconds: current_unix_timestamp_seconds(),
            passed: failed_case_count == 0,
            output_dir: normalize_path(output_dir),
            case_count,
            passed_case_count,
            failed_case_count,
            pair_count,
            failed_pair_count,
            skipped_pair_count,
            cases,
        }
    }
}

pub fn write_report_file(report_path: &Path, report: &BenchRunReport) -> Result<(), ResultsError> {
    let value = serde_json::to_value(report).map_err(|source| ResultsError::Serialize {
        path: report_path.to_path_buf(),
        source,
    })?;
    write_json(report_path, &value)
}

fn write_json(path: &Path, value: &Value) -> Result<(), ResultsError> {
    if let Some(parent_dir) = path.parent() {
        fs::create_dir_all(parent_dir).map_err(|source| ResultsError::CreateDirectory {
            path: parent_dir.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(value).map_err(|source| ResultsError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| ResultsError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn render_human_summary(report: &BenchRunReport) -> String {
    let mut lines = Vec::new();
    let status = if report.passed { "PASS" } else { "FAIL" };
    lines.push(format!("Bench status: {}", status));
    lines.push(format!(
        "Cases: {} total ({} passed, {} failed)",
        report.case_count, report.passed_case_count, report.failed_case_count
    ));
    lines.push(format!(
        "Pairs: {} total ({} failed, {} skipped)",
        report.pair_count, report.failed_pair_count, report.skipped_pair_count
    ));

    for case in &report.cases {
        let case_status = if case.passed { "PASS" } else { "FAIL" };
        lines.push(format!(
            "Case {}: {} ({} engines, {} pairs)",
            case.case_id,
            case_status,
            case.engines.len(),
            case.pair_count
        ));
        for pair in case.pairs.iter().filter(|pair| !pair.passed) {
            lines.push(format!("  {}", pair.line.trim_end()));
        }
    }

    lines.join("\n")
}

fn current_unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
