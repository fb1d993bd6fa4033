use super::ConfigError;
use super::model::{
    CleanupRules, ColumnRef, CsvColumnsSpec, CsvSpec, EngineConfig, FilePattern, Hdf5Spec,
    LengthSpec, PrepareAction, PrepareStep, QuantitySpec, SeriesSource, SeriesTransform,
    SourceLocation, TextSpec, TextTableSpec, Vec3NormSpec,
};
use super::units::{UnitPolicy, meters_per_unit};
use globset::GlobBuilder;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const VALUE_GROUP: &str = "value";

#[derive(Debug, Clone)]
pub struct EngineRegistry {
    engines: Vec<EngineConfig>,
    unit_policy: UnitPolicy,
}

impl EngineRegistry {
    pub fn from_path(path: &Path, unit_policy: UnitPolicy) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content, unit_policy)
    }

    pub fn from_json_str(content: &str, unit_policy: UnitPolicy) -> Result<Self, ConfigError> {
        let document: serde_json::Value =
            serde_json::from_str(content).map_err(|source| ConfigError::Parse { source })?;
        let serde_json::Value::Object(entries) = document else {
            return Err(ConfigError::NotAnObject);
        };

        let mut engines = Vec::with_capacity(entries.len());
        for (name, value) in entries {
            let raw: RawEngineConfig =
                serde_json::from_value(value).map_err(|source| ConfigError::EngineSchema {
                    engine: name.clone(),
                    source,
                })?;
            engines.push(compile_engine(&name, raw, unit_policy)?);
        }

        if engines.is_empty() {
            return Err(ConfigError::NoEngines);
        }

        Ok(Self {
            engines,
            unit_policy,
        })
    }

    pub fn engines(&self) -> &[EngineConfig] {
        &self.engines
    }

    pub fn get(&self, name: &str) -> Option<&EngineConfig> {
        self.engines.iter().find(|engine| engine.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn unit_policy(&self) -> UnitPolicy {
        self.unit_policy
    }

    /// First engine in declaration order whose detection substrings occur in
    /// the command.
    pub fn detect(&self, command: &str) -> Result<&EngineConfig, ConfigError> {
        self.engines
            .iter()
            .find(|engine| engine.claims(command))
            .ok_or_else(|| ConfigError::UnroutableCommand {
                command: command.to_string(),
            })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEngineConfig {
    #[serde(default)]
    detect_substrings: Vec<String>,
    prefix: String,
    #[serde(default)]
    exe: Option<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    prepare: Vec<RawPrepareStep>,
    #[serde(default)]
    outputs: BTreeMap<String, RawQuantitySpec>,
    #[serde(default)]
    extra_files: Vec<String>,
    #[serde(default)]
    aeff: Option<RawLengthSpec>,
    #[serde(default)]
    lambda: Option<RawLengthSpec>,
    #[serde(default)]
    cleanup: RawCleanup,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPrepareStep {
    Symlink {
        symlink: PathBuf,
        #[serde(rename = "as", default)]
        target: Option<String>,
    },
    Copy {
        copy: PathBuf,
        #[serde(rename = "as", default)]
        target: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCleanup {
    #[serde(default)]
    remove_names: Vec<String>,
    #[serde(default)]
    remove_globs: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawQuantitySpec {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    pattern: Option<String>,
    unit_factor: Option<f64>,
    #[serde(default)]
    take_last: bool,
    groups: Option<Vec<String>>,
    file: Option<PathBuf>,
    glob: Option<String>,
    run_dir_glob: Option<String>,
    dataset: Option<String>,
    index: Option<usize>,
    column: Option<ColumnRef>,
    columns: Option<Vec<ColumnRef>>,
    delimiter: Option<String>,
    header_pattern: Option<String>,
    start_offset: Option<usize>,
    first_column: Option<usize>,
    column_count: Option<usize>,
    #[serde(default)]
    transforms: Vec<RawTransform>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTransform {
    Named(String),
    DivideBy { divide_by: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLengthSpec {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    pattern: Option<String>,
    #[serde(default)]
    take_last: bool,
    count_pattern: Option<String>,
    cell_size_pattern: Option<String>,
    #[serde(default = "default_length_unit")]
    unit: String,
}

fn default_length_unit() -> String {
    "m".to_string()
}

fn compile_engine(
    name: &str,
    raw: RawEngineConfig,
    unit_policy: UnitPolicy,
) -> Result<EngineConfig, ConfigError> {
    if raw.prefix.trim().is_empty() {
        return Err(ConfigError::InvalidEngine {
            engine: name.to_string(),
            reason: "prefix must not be empty".to_string(),
        });
    }
    if raw.detect_substrings.iter().any(|needle| needle.is_empty()) {
        return Err(ConfigError::InvalidEngine {
            engine: name.to_string(),
            reason: "detect_substrings must not contain empty strings".to_string(),
        });
    }

    let prepare = raw
        .prepare
        .into_iter()
        .map(|step| match step {
            RawPrepareStep::Symlink { symlink, target } => PrepareStep {
                action: PrepareAction::Symlink,
                source: symlink,
                target,
            },
            RawPrepareStep::Copy { copy, target } => PrepareStep {
                action: PrepareAction::Copy,
                source: copy,
                target,
            },
        })
        .collect();

    let mut outputs = BTreeMap::new();
    for (quantity, spec) in raw.outputs {
        let compiled = compile_quantity(name, &quantity, spec)?;
        outputs.insert(quantity, compiled);
    }

    let extra_files = raw
        .extra_files
        .iter()
        .map(|pattern| compile_glob(name, pattern))
        .collect::<Result<Vec<_>, _>>()?;

    let aeff = raw
        .aeff
        .map(|spec| compile_length(name, "aeff", spec, unit_policy))
        .transpose()?;
    let lambda = raw
        .lambda
        .map(|spec| compile_length(name, "lambda", spec, unit_policy))
        .transpose()?;

    let cleanup = CleanupRules {
        remove_names: raw.cleanup.remove_names,
        remove_globs: raw
            .cleanup
            .remove_globs
            .iter()
            .map(|pattern| compile_glob(name, pattern))
            .collect::<Result<Vec<_>, _>>()?,
    };

    Ok(EngineConfig {
        name: name.to_string(),
        detect_substrings: raw.detect_substrings,
        prefix: raw.prefix,
        exe: raw.exe,
        env: raw.env,
        prepare,
        outputs,
        extra_files,
        aeff,
        lambda,
        cleanup,
    })
}

pub(crate) fn compile_glob(engine: &str, pattern: &str) -> Result<FilePattern, ConfigError> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|source| ConfigError::InvalidGlob {
            engine: engine.to_string(),
            pattern: pattern.to_string(),
            source,
        })?;
    Ok(FilePattern {
        pattern: pattern.to_string(),
        matcher: glob.compile_matcher(),
    })
}

fn compile_regex(engine: &str, field: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        engine: engine.to_string(),
        field: field.to_string(),
        source,
    })
}

fn require_groups(
    engine: &str,
    field: &str,
    regex: &Regex,
    groups: &[&str],
) -> Result<(), ConfigError> {
    for group in groups {
        if !regex.capture_names().flatten().any(|name| name == *group) {
            return Err(ConfigError::MissingCaptureGroup {
                engine: engine.to_string(),
                field: field.to_string(),
                group: (*group).to_string(),
            });
        }
    }
    Ok(())
}

struct SpecContext<'a> {
    engine: &'a str,
    quantity: &'a str,
}

impl SpecContext<'_> {
    fn invalid(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidSpec {
            engine: self.engine.to_string(),
            quantity: self.quantity.to_string(),
            reason: reason.into(),
        }
    }

    fn field(&self, name: &str) -> String {
        format!("outputs.{}.{}", self.quantity, name)
    }

    fn required<T>(&self, value: Option<T>, field: &str, kind: &str) -> Result<T, ConfigError> {
        value.ok_or_else(|| self.invalid(format!("type '{kind}' requires '{field}'")))
    }

    fn reject(&self, present: bool, field: &str, kind: &str) -> Result<(), ConfigError> {
        if present {
            return Err(self.invalid(format!("field '{field}' is not valid for type '{kind}'")));
        }
        Ok(())
    }
}

fn compile_quantity(
    engine: &str,
    quantity: &str,
    raw: RawQuantitySpec,
) -> Result<QuantitySpec, ConfigError> {
    let context = SpecContext { engine, quantity };
    let kind = raw.kind.clone().unwrap_or_else(|| "text".to_string());
    let unit_factor = raw.unit_factor.unwrap_or(1.0);
    if !unit_factor.is_finite() {
        return Err(context.invalid("unit_factor must be finite"));
    }

    match kind.as_str() {
        "text" | "text_vec3_norm" => {
            reject_series_fields(&context, &raw, &kind)?;
            let pattern_text = context.required(raw.pattern.as_deref(), "pattern", &kind)?;
            let pattern = compile_regex(engine, &context.field("pattern"), pattern_text)?;
            if kind == "text" {
                context.reject(raw.groups.is_some(), "groups", &kind)?;
                require_groups(engine, &context.field("pattern"), &pattern, &[VALUE_GROUP])?;
                return Ok(QuantitySpec::Text(TextSpec {
                    pattern,
                    unit_factor,
                    take_last: raw.take_last,
                }));
            }

            let groups = match raw.groups {
                None => ["x".to_string(), "y".to_string(), "z".to_string()],
                Some(groups) => <[String; 3]>::try_from(groups)
                    .map_err(|_| context.invalid("groups must name exactly three captures"))?,
            };
            let group_names = groups.iter().map(String::as_str).collect::<Vec<_>>();
            require_groups(engine, &context.field("pattern"), &pattern, &group_names)?;
            Ok(QuantitySpec::TextVec3Norm(Vec3NormSpec {
                pattern,
                groups,
                unit_factor,
                take_last: raw.take_last,
            }))
        }
        "hdf5" => {
            reject_table_fields(&context, &raw, &kind)?;
            context.reject(raw.delimiter.is_some(), "delimiter", &kind)?;
            let dataset = context.required(raw.dataset.clone(), "dataset", &kind)?;
            Ok(QuantitySpec::Hdf5(Hdf5Spec {
                source: compile_source(&context, &raw)?,
                dataset,
                index: raw.index,
                unit_factor,
                transforms: compile_transforms(&context, &raw.transforms)?,
            }))
        }
        "csv" => {
            reject_table_fields(&context, &raw, &kind)?;
            context.reject(raw.columns.is_some(), "columns", &kind)?;
            let column = context.required(raw.column.clone(), "column", &kind)?;
            Ok(QuantitySpec::Csv(CsvSpec {
                source: compile_source(&context, &raw)?,
                column,
                delimiter: compile_delimiter(&context, raw.delimiter.as_deref())?,
                unit_factor,
                transforms: compile_transforms(&context, &raw.transforms)?,
            }))
        }
        "csv_columns" => {
            reject_table_fields(&context, &raw, &kind)?;
            context.reject(raw.column.is_some(), "column", &kind)?;
            let columns = context.required(raw.columns.clone(), "columns", &kind)?;
            if columns.is_empty() {
                return Err(context.invalid("columns must not be empty"));
            }
            Ok(QuantitySpec::CsvColumns(CsvColumnsSpec {
                source: compile_source(&context, &raw)?,
                columns,
                delimiter: compile_delimiter(&context, raw.delimiter.as_deref())?,
                unit_factor,
                transforms: compile_transforms(&context, &raw.transforms)?,
            }))
        }
        "text_table_columns" => {
            context.reject(raw.pattern.is_some(), "pattern", &kind)?;
            context.reject(raw.column.is_some() || raw.columns.is_some(), "column", &kind)?;
            context.reject(raw.dataset.is_some(), "dataset", &kind)?;
            let header_text =
                context.required(raw.header_pattern.as_deref(), "header_pattern", &kind)?;
            let header = compile_regex(engine, &context.field("header_pattern"), header_text)?;
            let column_count = context.required(raw.column_count, "column_count", &kind)?;
            if column_count == 0 {
                return Err(context.invalid("column_count must be positive"));
            }
            Ok(QuantitySpec::TextTableColumns(TextTableSpec {
                source: compile_source(&context, &raw)?,
                header,
                start_offset: raw.start_offset.unwrap_or(1),
                first_column: raw.first_column.unwrap_or(0),
                column_count,
                unit_factor,
                transforms: compile_transforms(&context, &raw.transforms)?,
            }))
        }
        other => Err(ConfigError::UnknownSpecType {
            engine: engine.to_string(),
            quantity: quantity.to_string(),
            kind: other.to_string(),
        }),
    }
}

fn reject_series_fields(
    context: &SpecContext<'_>,
    raw: &RawQuantitySpec,
    kind: &str,
) -> Result<(), ConfigError> {
    context.reject(raw.file.is_some() || raw.glob.is_some(), "file", kind)?;
    context.reject(raw.run_dir_glob.is_some(), "run_dir_glob", kind)?;
    context.reject(raw.dataset.is_some(), "dataset", kind)?;
    context.reject(raw.column.is_some() || raw.columns.is_some(), "column", kind)?;
    context.reject(!raw.transforms.is_empty(), "transforms", kind)?;
    reject_table_fields(context, raw, kind)
}

fn reject_table_fields(
    context: &SpecContext<'_>,
    raw: &RawQuantitySpec,
    kind: &str,
) -> Result<(), ConfigError> {
    context.reject(raw.header_pattern.is_some(), "header_pattern", kind)?;
    context.reject(raw.start_offset.is_some(), "start_offset", kind)?;
    context.reject(raw.first_column.is_some(), "first_column", kind)?;
    context.reject(raw.column_count.is_some(), "column_count", kind)?;
    if kind != "text" && kind != "text_vec3_norm" {
        context.reject(raw.pattern.is_some(), "pattern", kind)?;
    }
    Ok(())
}

fn compile_source(
    context: &SpecContext<'_>,
    raw: &RawQuantitySpec,
) -> Result<Option<SeriesSource>, ConfigError> {
    let location = match (&raw.file, &raw.glob) {
        (Some(_), Some(_)) => return Err(context.invalid("use either 'file' or 'glob', not both")),
        (Some(file), None) => {
            if file.is_absolute() {
                return Err(context.invalid("'file' must be relative to the output directory"));
            }
            SourceLocation::Exact(file.clone())
        }
        (None, Some(pattern)) => SourceLocation::Glob(compile_glob(context.engine, pattern)?),
        (None, None) => {
            if raw.run_dir_glob.is_some() {
                return Err(context.invalid("'run_dir_glob' requires 'file' or 'glob'"));
            }
            return Ok(None);
        }
    };

    let run_dir = raw
        .run_dir_glob
        .as_deref()
        .map(|pattern| compile_glob(context.engine, pattern))
        .transpose()?;
    Ok(Some(SeriesSource { location, run_dir }))
}

fn compile_delimiter(
    context: &SpecContext<'_>,
    delimiter: Option<&str>,
) -> Result<Option<char>, ConfigError> {
    let Some(delimiter) = delimiter else {
        return Ok(None);
    };
    if delimiter == "\\t" {
        return Ok(Some('\t'));
    }
    let mut chars = delimiter.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if ch.is_whitespace() => Ok(None),
        (Some(ch), None) => Ok(Some(ch)),
        _ => Err(context.invalid(format!(
            "delimiter must be a single character, got '{delimiter}'"
        ))),
    }
}

fn compile_transforms(
    context: &SpecContext<'_>,
    transforms: &[RawTransform],
) -> Result<Vec<SeriesTransform>, ConfigError> {
    transforms
        .iter()
        .map(|transform| match transform {
            RawTransform::Named(name) if name == "filter_zeros" => Ok(SeriesTransform::FilterZeros),
            RawTransform::Named(name) if name == "square" => Ok(SeriesTransform::Square),
            RawTransform::Named(name) => Err(context.invalid(format!("unknown transform '{name}'"))),
            RawTransform::DivideBy { divide_by } if divide_by.is_empty() => {
                Err(context.invalid("divide_by must name a quantity"))
            }
            RawTransform::DivideBy { divide_by } => {
                Ok(SeriesTransform::DivideBy(divide_by.clone()))
            }
        })
        .collect()
}

fn compile_length(
    engine: &str,
    field: &str,
    raw: RawLengthSpec,
    unit_policy: UnitPolicy,
) -> Result<LengthSpec, ConfigError> {
    let meters_per_unit = meters_per_unit(engine, &format!("{field}.unit"), &raw.unit, unit_policy)?;
    let kind = raw.kind.as_deref().unwrap_or("text");
    let invalid = |reason: &str| ConfigError::InvalidSpec {
        engine: engine.to_string(),
        quantity: field.to_string(),
        reason: reason.to_string(),
    };

    match kind {
        "text" => {
            let pattern_text = raw
                .pattern
                .as_deref()
                .ok_or_else(|| invalid("type 'text' requires 'pattern'"))?;
            let pattern = compile_regex(engine, &format!("{field}.pattern"), pattern_text)?;
            require_groups(engine, &format!("{field}.pattern"), &pattern, &[VALUE_GROUP])?;
            Ok(LengthSpec::Text {
                pattern,
                take_last: raw.take_last,
                meters_per_unit,
            })
        }
        "dipoles" => {
            let count_text = raw
                .count_pattern
                .as_deref()
                .ok_or_else(|| invalid("type 'dipoles' requires 'count_pattern'"))?;
            let cell_text = raw
                .cell_size_pattern
                .as_deref()
                .ok_or_else(|| invalid("type 'dipoles' requires 'cell_size_pattern'"))?;
            let count_field = format!("{field}.count_pattern");
            let cell_field = format!("{field}.cell_size_pattern");
            let count_pattern = compile_regex(engine, &count_field, count_text)?;
            let cell_size_pattern = compile_regex(engine, &cell_field, cell_text)?;
            require_groups(engine, &count_field, &count_pattern, &[VALUE_GROUP])?;
            require_groups(engine, &cell_field, &cell_size_pattern, &[VALUE_GROUP])?;
            Ok(LengthSpec::Dipoles {
                count_pattern,
                cell_size_pattern,
                meters_per_unit,
            })
        }
        other => Err(ConfigError::UnknownSpecType {
            engine: engine.to_string(),
            quantity: field.to_string(),
            kind: other.to_string(),
        }),
    }
}
