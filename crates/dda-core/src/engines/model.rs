use globset::GlobMatcher;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub name: String,
    pub detect_substrings: Vec<String>,
    pub prefix: String,
    pub exe: Option<String>,
    pub env: BTreeMap<String, String>,
    pub prepare: Vec<PrepareStep>,
    pub outputs: BTreeMap<String, QuantitySpec>,
    pub extra_files: Vec<FilePattern>,
    pub aeff: Option<LengthSpec>,
    pub lambda: Option<LengthSpec>,
    pub cleanup: CleanupRules,
}

impl EngineConfig {
    pub fn claims(&self, command: &str) -> bool {
        self.detect_substrings
            .iter()
            .any(|needle| command.contains(needle.as_str()))
    }

    pub fn output(&self, quantity: &str) -> Option<&QuantitySpec> {
        self.outputs.get(quantity)
    }

    /// Replaces the logical prefix with the configured executable, if any.
    pub fn invocation_line(&self, command: &str) -> String {
        match (&self.exe, command.strip_prefix(self.prefix.as_str())) {
            (Some(exe), Some(rest)) if rest.starts_with(' ') => format!("{exe}{rest}"),
            (Some(exe), Some("")) => exe.clone(),
            _ => command.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilePattern {
    pub pattern: String,
    pub matcher: GlobMatcher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareAction {
    Symlink,
    Copy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareStep {
    pub action: PrepareAction,
    pub source: PathBuf,
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CleanupRules {
    pub remove_names: Vec<String>,
    pub remove_globs: Vec<FilePattern>,
}

#[derive(Debug, Clone)]
pub enum QuantitySpec {
    Text(TextSpec),
    TextVec3Norm(Vec3NormSpec),
    Hdf5(Hdf5Spec),
    Csv(CsvSpec),
    CsvColumns(CsvColumnsSpec),
    TextTableColumns(TextTableSpec),
}

impl QuantitySpec {
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::TextVec3Norm(_) => "text_vec3_norm",
            Self::Hdf5(_) => "hdf5",
            Self::Csv(_) => "csv",
            Self::CsvColumns(_) => "csv_columns",
            Self::TextTableColumns(_) => "text_table_columns",
        }
    }

    pub fn yields_scalar(&self) -> bool {
        matches!(self, Self::Text(_) | Self::TextVec3Norm(_) | Self::Hdf5(_))
    }
}

#[derive(Debug, Clone)]
pub struct TextSpec {
    pub pattern: Regex,
    pub unit_factor: f64,
    pub take_last: bool,
}

#[derive(Debug, Clone)]
pub struct Vec3NormSpec {
    pub pattern: Regex,
    pub groups: [String; 3],
    pub unit_factor: f64,
    pub take_last: bool,
}

#[derive(Debug, Clone)]
pub struct Hdf5Spec {
    pub source: Option<SeriesSource>,
    pub dataset: String,
    pub index: Option<usize>,
    pub unit_factor: f64,
    pub transforms: Vec<SeriesTransform>,
}

#[derive(Debug, Clone)]
pub struct CsvSpec {
    pub source: Option<SeriesSource>,
    pub column: ColumnRef,
    pub delimiter: Option<char>,
    pub unit_factor: f64,
    pub transforms: Vec<SeriesTransform>,
}

#[derive(Debug, Clone)]
pub struct CsvColumnsSpec {
    pub source: Option<SeriesSource>,
    pub columns: Vec<ColumnRef>,
    pub delimiter: Option<char>,
    pub unit_factor: f64,
    pub transforms: Vec<SeriesTransform>,
}

#[derive(Debug, Clone)]
pub struct TextTableSpec {
    pub source: Option<SeriesSource>,
    pub header: Regex,
    pub start_offset: usize,
    pub first_column: usize,
    pub column_count: usize,
    pub unit_factor: f64,
    pub transforms: Vec<SeriesTransform>,
}

/// Locates a sibling file of the primary output.
#[derive(Debug, Clone)]
pub struct SeriesSource {
    pub location: SourceLocation,
    pub run_dir: Option<FilePattern>,
}

#[derive(Debug, Clone)]
pub enum SourceLocation {
    Exact(PathBuf),
    Glob(FilePattern),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesTransform {
    FilterZeros,
    DivideBy(String),
    Square,
}

#[derive(Debug, Clone)]
pub enum LengthSpec {
    Text {
        pattern: Regex,
        take_last: bool,
        meters_per_unit: f64,
    },
    Dipoles {
        count_pattern: Regex,
        cell_size_pattern: Regex,
        meters_per_unit: f64,
    },
}
