use super::{RESULTS_FILE, ResultsError};
use crate::extract::natural_cmp;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

struct SummaryRow {
    case_id: String,
    engine: String,
    cells: BTreeMap<String, String>,
}

fn results_files(output_dir: &Path) -> Result<Vec<PathBuf>, ResultsError> {
    if !output_dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(output_dir).map_err(|source| ResultsError::ReadDirectory {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut files = entries
        .flatten()
        .map(|entry| entry.path().join(RESULTS_FILE))
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    files.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
    Ok(files)
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn read_rows(path: &Path) -> Result<Vec<SummaryRow>, ResultsError> {
    let content = fs::read_to_string(path).map_err(|source| ResultsError::ReadResults {
        path: path.to_path_buf(),
        source,
    })?;
    let document: Value =
        serde_json::from_str(&content).map_err(|source| ResultsError::ParseResults {
            path: path.to_path_buf(),
            source,
        })?;

    let case_id = document
        .get("case")
        .and_then(Value::as_str)
        .unwrap_or("unknown_case")
        .to_string();
    let Some(engines) = document.get("engines").and_then(Value::as_object) else {
        return Ok(Vec::new());
    };

    Ok(engines
        .iter()
        .map(|(engine, values)| SummaryRow {
            case_id: case_id.clone(),
            engine: engine.clone(),
            cells: values
                .as_object()
                .map(|values| {
                    values
                        .iter()
                        .map(|(name, value)| (name.clone(), cell(value)))
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect())
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Aggregates every `<output_dir>/*/results.json` into one row per case and
/// engine. Columns are `case`, `engine`, then the sorted union of quantity
/// names. Nothing is written when no results exist. Returns the row count.
pub fn write_summary_csv(output_dir: &Path, csv_path: &Path) -> Result<usize, ResultsError> {
    let mut rows = Vec::new();
    for path in results_files(output_dir)? {
        rows.extend(read_rows(&path)?);
    }
    if rows.is_empty() {
        return Ok(0);
    }

    let columns = rows
        .iter()
        .flat_map(|row| row.cells.keys().cloned())
        .collect::<BTreeSet<_>>();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    let header = ["case".to_string(), "engine".to_string()]
        .into_iter()
        .chain(columns.iter().cloned())
        .map(|name| escape(&name))
        .collect::<Vec<_>>();
    lines.push(header.join(","));

    for row in &rows {
        let mut fields = vec![escape(&row.case_id), escape(&row.engine)];
        fields.extend(columns.iter().map(|column| {
            row.cells
                .get(column)
                .map(|value| escape(value))
                .unwrap_or_default()
        }));
        lines.push(fields.join(","));
    }

    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(csv_path, content).map_err(|source| ResultsError::Write {
        path: csv_path.to_path_buf(),
        source,
    })?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::write_summary_csv;
    use std::fs;
    use tempfile::TempDir;

    fn write_results(root: &std::path::Path, dir: &str, json: &str) {
        let case_dir = root.join(dir);
        fs::create_dir_all(&case_dir).expect("case dir should be created");
        fs::write(case_dir.join("results.json"), json).expect("results should be written");
    }

    #[test]
    fn summary_unions_columns_across_cases() {
        let temp = TempDir::new().expect("tempdir should be created");
        write_results(
            temp.path(),
            "case2",
            r#"{"case": "case2", "engines": {"adda": {"Qext": 2.5}}}"#,
        );
        write_results(
            temp.path(),
            "case10",
            r#"{"case": "case10", "engines": {"adda": {"Cext": 1e-12}, "ddscat": {"Cext": 2e-12, "aeff": null}}}"#,
        );
        fs::write(temp.path().join("stray.txt"), "ignored").expect("stray file should be written");

        let csv_path = temp.path().join("summary.csv");
        let rows = write_summary_csv(temp.path(), &csv_path).expect("summary should be written");
        assert_eq!(rows, 3);

        let csv = fs::read_to_string(&csv_path).expect("summary should be readable");
        let lines = csv.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "case,engine,Cext,Qext,aeff");
        assert_eq!(lines[1], "case2,adda,,2.5,");
        assert_eq!(lines[2], "case10,adda,1e-12,,");
        assert_eq!(lines[3], "case10,ddscat,2e-12,,");
    }

    #[test]
    fn no_results_means_no_summary_file() {
        let temp = TempDir::new().expect("tempdir should be created");
        let csv_path = temp.path().join("summary.csv");
        assert_eq!(
            write_summary_csv(temp.path(), &csv_path).expect("empty summary should succeed"),
            0
        );
        assert!(!csv_path.exists());
    }
}
