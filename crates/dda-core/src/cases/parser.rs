use super::model::{
    CaseCommand, CaseTag, CommandCase, FeatureFlag, FeatureFlags, TolerancePolicy, ToleranceTag,
};
use crate::domain::{BenchError, ToleranceRange};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

const CASE_MARKER: &str = "@case:";

#[derive(Debug, thiserror::Error)]
pub enum CaseParseError {
    #[error("failed to read command file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("line {line}: @case requires a non-empty identifier")]
    EmptyCaseId { line: usize },
    #[error("line {line}: case '{case_id}' already defined at line {first_line}")]
    DuplicateCaseId {
        case_id: String,
        line: usize,
        first_line: usize,
    },
    #[error("line {line}: tag '@{tag}' appears before any @case")]
    TagOutsideCase { tag: String, line: usize },
    #[error("line {line}: command '{command}' appears before any @case")]
    CommandOutsideCase { command: String, line: usize },
    #[error("line {line}: unknown tag '@{tag}'")]
    UnknownTag { tag: String, line: usize },
    #[error("line {line}: @{tag} expects two integers '<min> <max>', got '{value}'")]
    MalformedTolerance {
        tag: &'static str,
        line: usize,
        value: String,
    },
    #[error("line {line}: @{tag} range is inverted ({min} > {max})")]
    InvertedTolerance {
        tag: &'static str,
        line: usize,
        min: i64,
        max: i64,
    },
    #[error("line {line}: @skip_pairs expects exactly two engine names, got '{value}'")]
    MalformedSkipPairs { line: usize, value: String },
    #[error("line {line}: flag @{tag} takes no arguments, got '{value}'")]
    MalformedFlag {
        tag: &'static str,
        line: usize,
        value: String,
    },
    #[error("case '{case_id}': @tol_res is required")]
    MissingResidualTolerance { case_id: String },
    #[error("case '{case_id}': define either @tol or both @tol_ext and @tol_abs")]
    MissingExtAbsTolerance { case_id: String },
    #[error("case '{case_id}': @tol cannot be combined with @tol_ext/@tol_abs")]
    MixedTolerances { case_id: String },
    #[error("case '{case_id}': @{flag} requires @{tolerance}")]
    MissingFeatureTolerance {
        case_id: String,
        flag: &'static str,
        tolerance: &'static str,
    },
}

impl From<CaseParseError> for BenchError {
    fn from(error: CaseParseError) -> Self {
        let message = error.to_string();
        let placeholder = match &error {
            CaseParseError::Read { .. } => return BenchError::io_system("IO.CASE_FILE", message),
            CaseParseError::EmptyCaseId { .. } => "INPUT.CASE_ID",
            CaseParseError::DuplicateCaseId { .. } => "INPUT.CASE_DUPLICATE",
            CaseParseError::TagOutsideCase { .. } | CaseParseError::CommandOutsideCase { .. } => {
                "INPUT.CASE_SCOPE"
            }
            CaseParseError::UnknownTag { .. } => "INPUT.CASE_UNKNOWN_TAG",
            CaseParseError::MalformedTolerance { .. }
            | CaseParseError::InvertedTolerance { .. }
            | CaseParseError::MalformedSkipPairs { .. }
            | CaseParseError::MalformedFlag { .. } => "INPUT.CASE_TAG_VALUE",
            CaseParseError::MissingResidualTolerance { .. }
            | CaseParseError::MissingExtAbsTolerance { .. }
            | CaseParseError::MixedTolerances { .. }
            | CaseParseError::MissingFeatureTolerance { .. } => "INPUT.CASE_TOLERANCE",
        };
        BenchError::input_validation(placeholder, message)
    }
}

pub fn read_command_cases(path: &Path) -> Result<Vec<CommandCase>, CaseParseError> {
    let content = fs::read_to_string(path).map_err(|source| CaseParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_command_cases(&content)
}

pub fn parse_command_cases(content: &str) -> Result<Vec<CommandCase>, CaseParseError> {
    let mut cases = Vec::new();
    let mut seen_ids: HashMap<String, usize> = HashMap::new();
    let mut current: Option<PendingCase> = None;

    for (index, raw_line) in content.lines().enumerate() {
        let line = index + 1;
        let stripped = raw_line.trim();
        if stripped.is_empty() {
            continue;
        }

        if let Some(comment) = stripped.strip_prefix('#') {
            if let Some((_, id_part)) = stripped.split_once(CASE_MARKER) {
                if let Some(pending) = current.take() {
                    cases.extend(pending.finish()?);
                }
                let case_id = id_part.trim();
                if case_id.is_empty() {
                    return Err(CaseParseError::EmptyCaseId { line });
                }
                if let Some(first_line) = seen_ids.get(case_id) {
                    return Err(CaseParseError::DuplicateCaseId {
                        case_id: case_id.to_string(),
                        line,
                        first_line: *first_line,
                    });
                }
                seen_ids.insert(case_id.to_string(), line);
                current = Some(PendingCase::new(case_id, line));
                continue;
            }

            let Some(tag_text) = comment.trim_start().strip_prefix('@') else {
                continue;
            };
            let (tag_name, arguments) = split_tag(tag_text);
            let Some(pending) = current.as_mut() else {
                return Err(CaseParseError::TagOutsideCase {
                    tag: tag_name.to_string(),
                    line,
                });
            };
            let tag = CaseTag::from_name(tag_name).ok_or_else(|| CaseParseError::UnknownTag {
                tag: tag_name.to_string(),
                line,
            })?;
            pending.apply_tag(tag, arguments, line)?;
            continue;
        }

        let Some(pending) = current.as_mut() else {
            return Err(CaseParseError::CommandOutsideCase {
                command: stripped.to_string(),
                line,
            });
        };
        pending.commands.push(CaseCommand {
            text: stripped.to_string(),
            source_line: line,
        });
    }

    if let Some(pending) = current.take() {
        cases.extend(pending.finish()?);
    }

    Ok(cases)
}

fn split_tag(tag_text: &str) -> (&str, &str) {
    let end = tag_text
        .find(|ch: char| ch == ':' || ch.is_whitespace())
        .unwrap_or(tag_text.len());
    let (name, rest) = tag_text.split_at(end);
    let rest = rest.trim_start();
    let rest = rest.strip_prefix(':').unwrap_or(rest);
    (name, rest.trim())
}

struct PendingCase {
    case_id: String,
    header_line: usize,
    commands: Vec<CaseCommand>,
    meta: BTreeMap<String, String>,
    skip_pairs: Vec<(String, String)>,
}

impl PendingCase {
    fn new(case_id: &str, header_line: usize) -> Self {
        Self {
            case_id: case_id.to_string(),
            header_line,
            commands: Vec::new(),
            meta: BTreeMap::new(),
            skip_pairs: Vec::new(),
        }
    }

    fn apply_tag(&mut self, tag: CaseTag, arguments: &str, line: usize) -> Result<(), CaseParseError> {
        match tag {
            CaseTag::Tolerance(tolerance) => {
                let (min, max) = parse_range(tolerance.key(), arguments, line)?;
                self.meta
                    .insert(format!("{}_min", tolerance.key()), min.to_string());
                self.meta
                    .insert(format!("{}_max", tolerance.key()), max.to_string());
            }
            CaseTag::SkipPairs => {
                let engines = arguments.split_whitespace().collect::<Vec<_>>();
                let [first, second] = engines.as_slice() else {
                    return Err(CaseParseError::MalformedSkipPairs {
                        line,
                        value: arguments.to_string(),
                    });
                };
                self.skip_pairs
                    .push((first.to_string(), second.to_string()));
            }
            CaseTag::Flag(flag) => {
                if !arguments.is_empty() {
                    return Err(CaseParseError::MalformedFlag {
                        tag: flag.key(),
                        line,
                        value: arguments.to_string(),
                    });
                }
                self.meta.insert(flag.key().to_string(), "1".to_string());
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Option<CommandCase>, CaseParseError> {
        if self.commands.is_empty() {
            return Ok(None);
        }

        let policy = resolve_policy(&self.case_id, &self.meta)?;
        Ok(Some(CommandCase {
            case_id: self.case_id,
            header_line: self.header_line,
            commands: self.commands,
            meta: self.meta,
            skip_pairs: self.skip_pairs,
            policy,
        }))
    }
}

fn parse_range(tag: &'static str, arguments: &str, line: usize) -> Result<(i64, i64), CaseParseError> {
    let malformed = || CaseParseError::MalformedTolerance {
        tag,
        line,
        value: arguments.to_string(),
    };

    let tokens = arguments.split_whitespace().collect::<Vec<_>>();
    let [min, max] = tokens.as_slice() else {
        return Err(malformed());
    };
    let min = min.parse::<i64>().map_err(|_| malformed())?;
    let max = max.parse::<i64>().map_err(|_| malformed())?;
    if min > max {
        return Err(CaseParseError::InvertedTolerance { tag, line, min, max });
    }
    Ok((min, max))
}

fn stored_range(meta: &BTreeMap<String, String>, tag: ToleranceTag) -> Option<ToleranceRange> {
    let min = meta.get(&format!("{}_min", tag.key()))?.parse().ok()?;
    let max = meta.get(&format!("{}_max", tag.key()))?.parse().ok()?;
    Some(ToleranceRange::new(min, max))
}

fn resolve_policy(
    case_id: &str,
    meta: &BTreeMap<String, String>,
) -> Result<TolerancePolicy, CaseParseError> {
    let res = stored_range(meta, ToleranceTag::Res).ok_or_else(|| {
        CaseParseError::MissingResidualTolerance {
            case_id: case_id.to_string(),
        }
    })?;

    let tol = stored_range(meta, ToleranceTag::Tol);
    let ext = stored_range(meta, ToleranceTag::Ext);
    let abs = stored_range(meta, ToleranceTag::Abs);
    let (ext, abs) = match (tol, ext, abs) {
        (Some(tol), None, None) => (tol, tol),
        (None, Some(ext), Some(abs)) => (ext, abs),
        (Some(_), _, _) => {
            return Err(CaseParseError::MixedTolerances {
                case_id: case_id.to_string(),
            });
        }
        (None, _, _) => {
            return Err(CaseParseError::MissingExtAbsTolerance {
                case_id: case_id.to_string(),
            });
        }
    };

    let flag_set = |flag: FeatureFlag| meta.get(flag.key()).is_some_and(|value| value == "1");
    let flags = FeatureFlags {
        need_int: flag_set(FeatureFlag::Int),
        need_force: flag_set(FeatureFlag::Force),
        need_torque: flag_set(FeatureFlag::Torque),
        need_mueller: flag_set(FeatureFlag::Mueller),
    };

    for flag in [
        FeatureFlag::Int,
        FeatureFlag::Force,
        FeatureFlag::Torque,
        FeatureFlag::Mueller,
    ] {
        if flag_set(flag) && stored_range(meta, flag.tolerance()).is_none() {
            return Err(CaseParseError::MissingFeatureTolerance {
                case_id: case_id.to_string(),
                flag: flag.key(),
                tolerance: flag.tolerance().key(),
            });
        }
    }

    Ok(TolerancePolicy {
        ext,
        abs,
        res,
        int: stored_range(meta, ToleranceTag::Int),
        force: stored_range(meta, ToleranceTag::Force),
        torque: stored_range(meta, ToleranceTag::Torque),
        mueller: stored_range(meta, ToleranceTag::Mueller),
        flags,
    })
}

#[cfg(test)]
mod tests {
    use super::{CaseParseError, parse_command_cases, read_command_cases};
    use crate::domain::{BenchErrorCategory, ToleranceRange};
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn parse_err(content: &str) -> CaseParseError {
        parse_command_cases(content).expect_err("content should be rejected")
    }

    #[test]
    fn single_case_with_uniform_tolerance_parses_to_exact_meta() {
        let content = "# @case: a\n# @tol: 4 7\n# @tol_res: 3 5\nadda -size 8\n";
        let cases = parse_command_cases(content).expect("case file should parse");

        assert_eq!(cases.len(), 1);
        let case = &cases[0];
        assert_eq!(case.case_id, "a");
        assert_eq!(case.commands.len(), 1);
        assert_eq!(case.commands[0].text, "adda -size 8");
        assert_eq!(case.commands[0].source_line, 4);

        let expected = BTreeMap::from([
            ("tol_min".to_string(), "4".to_string()),
            ("tol_max".to_string(), "7".to_string()),
            ("tol_res_min".to_string(), "3".to_string()),
            ("tol_res_max".to_string(), "5".to_string()),
        ]);
        assert_eq!(case.meta, expected);
        assert_eq!(case.policy.ext, ToleranceRange::new(4, 7));
        assert_eq!(case.policy.abs, ToleranceRange::new(4, 7));
        assert_eq!(case.policy.res, ToleranceRange::new(3, 5));
    }

    #[test]
    fn comments_blank_lines_and_compact_markers_are_accepted() {
        let content = "\
# leading comment
#@case:sphere

# @tol_ext: 5 9
# @tol_abs: 4 9
# @tol_res: 1 16
# plain comment inside case
adda -shape sphere

ddscat -shape sphere
";
        let cases = parse_command_cases(content).expect("case file should parse");
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].case_id, "sphere");
        assert_eq!(cases[0].commands.len(), 2);
        assert_eq!(cases[0].commands[1].source_line, 10);
        assert_eq!(cases[0].policy.ext, ToleranceRange::new(5, 9));
        assert_eq!(cases[0].policy.abs, ToleranceRange::new(4, 9));
    }

    #[test]
    fn empty_cases_are_dropped_without_validation() {
        let content = "# @case: empty\n# @case: full\n# @tol: 1 2\n# @tol_res: 0 3\nadda\n";
        let cases = parse_command_cases(content).expect("empty case should be dropped");
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].case_id, "full");
    }

    #[test]
    fn feature_flags_and_skip_pairs_accumulate() {
        let content = "\
# @case: forces
# @tol: 4 8
# @tol_res: 0 16
# @tol_force: 3 10
# @need_force
# @skip_pairs: adda ddscat
# @skip_pairs: ifdda adda
adda -beam plane
";
        let cases = parse_command_cases(content).expect("case file should parse");
        let case = &cases[0];
        assert!(case.policy.flags.need_force);
        assert!(!case.policy.flags.need_torque);
        assert_eq!(case.meta.get("need_force").map(String::as_str), Some("1"));
        assert_eq!(case.policy.force, Some(ToleranceRange::new(3, 10)));
        assert_eq!(case.skip_pairs.len(), 2);
        assert!(case.skips_pair("ddscat", "adda"));
        assert!(case.skips_pair("adda", "ifdda"));
        assert!(!case.skips_pair("ddscat", "ifdda"));
    }

    #[test]
    fn mixing_uniform_and_split_tolerances_is_rejected() {
        let error = parse_err("# @case: a\n# @tol: 4 7\n# @tol_ext: 4 7\n# @tol_res: 1 2\nadda\n");
        assert!(matches!(error, CaseParseError::MixedTolerances { ref case_id } if case_id == "a"));
    }

    #[test]
    fn duplicate_case_ids_are_rejected() {
        let content = "\
# @case: a
# @tol: 1 2
# @tol_res: 1 2
adda
# @case: a
adda
";
        let error = parse_err(content);
        assert!(matches!(
            error,
            CaseParseError::DuplicateCaseId { line: 5, first_line: 1, .. }
        ));
    }

    #[test]
    fn structural_errors_map_to_distinct_variants() {
        assert!(matches!(parse_err("# @case:   \nadda\n"), CaseParseError::EmptyCaseId { line: 1 }));
        assert!(matches!(
            parse_err("# @tol: 1 2\n"),
            CaseParseError::TagOutsideCase { line: 1, .. }
        ));
        assert!(matches!(
            parse_err("adda -size 4\n"),
            CaseParseError::CommandOutsideCase { line: 1, .. }
        ));
        assert!(matches!(
            parse_err("# @case: a\n# @tolerance: 1 2\n"),
            CaseParseError::UnknownTag { ref tag, .. } if tag == "tolerance"
        ));
    }

    #[test]
    fn malformed_tag_values_are_rejected() {
        assert!(matches!(
            parse_err("# @case: a\n# @tol: 4\n"),
            CaseParseError::MalformedTolerance { tag: "tol", line: 2, .. }
        ));
        assert!(matches!(
            parse_err("# @case: a\n# @tol_res: x 4\n"),
            CaseParseError::MalformedTolerance { tag: "tol_res", .. }
        ));
        assert!(matches!(
            parse_err("# @case: a\n# @tol: 7 4\n"),
            CaseParseError::InvertedTolerance { min: 7, max: 4, .. }
        ));
        assert!(matches!(
            parse_err("# @case: a\n# @skip_pairs: adda\n"),
            CaseParseError::MalformedSkipPairs { line: 2, .. }
        ));
        assert!(matches!(
            parse_err("# @case: a\n# @need_int: yes\n"),
            CaseParseError::MalformedFlag { tag: "need_int", .. }
        ));
    }

    #[test]
    fn missing_tolerances_are_reported_per_rule() {
        assert!(matches!(
            parse_err("# @case: a\n# @tol: 1 2\nadda\n"),
            CaseParseError::MissingResidualTolerance { .. }
        ));
        assert!(matches!(
            parse_err("# @case: a\n# @tol_ext: 1 2\n# @tol_res: 1 2\nadda\n"),
            CaseParseError::MissingExtAbsTolerance { .. }
        ));
        assert!(matches!(
            parse_err("# @case: a\n# @tol: 1 2\n# @tol_res: 1 2\n# @need_mueller\nadda\n"),
            CaseParseError::MissingFeatureTolerance {
                flag: "need_mueller",
                tolerance: "tol_mueller",
                ..
            }
        ));
    }

    #[test]
    fn parse_errors_convert_to_input_validation_errors() {
        let error: crate::domain::BenchError = parse_err("adda\n").into();
        assert_eq!(error.category(), BenchErrorCategory::InputValidationError);
        assert_eq!(error.placeholder(), "INPUT.CASE_SCOPE");
    }

    #[test]
    fn read_command_cases_loads_file_and_reports_missing_paths() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("DDA_commands");
        fs::write(&path, "# @case: a\n# @tol: 2 16\n# @tol_res: 0 16\nadda\n")
            .expect("command file should be written");

        let cases = read_command_cases(&path).expect("command file should load");
        assert_eq!(cases[0].case_id, "a");

        let missing = read_command_cases(&temp.path().join("missing"))
            .expect_err("missing file should fail");
        let error: crate::domain::BenchError = missing.into();
        assert_eq!(error.category(), BenchErrorCategory::IoSystemError);
    }
}
