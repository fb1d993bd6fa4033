use crate::common::constants::{FAIL_MARK, WARN_MARK};
use serde::Serialize;

pub(super) const CASE_WIDTH: usize = 50;
pub(super) const ENGINE_WIDTH: usize = 7;
pub(super) const NAME_WIDTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    Warn,
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantityComparison {
    pub name: String,
    pub digits: Option<u32>,
    pub metric: Option<String>,
    pub verdict: Verdict,
    pub above_max: bool,
    pub detail: Option<String>,
}

impl QuantityComparison {
    pub(super) fn not_applicable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            digits: None,
            metric: None,
            verdict: Verdict::NotApplicable,
            above_max: false,
            detail: None,
        }
    }

    pub(super) fn undefined(name: &str, verdict: Verdict) -> Self {
        Self {
            verdict,
            ..Self::not_applicable(name)
        }
    }

    pub(super) fn scored(name: &str, digits: u32, metric: Option<&str>, verdict: Verdict) -> Self {
        Self {
            name: name.to_string(),
            digits: Some(digits),
            metric: metric.map(str::to_string),
            verdict,
            above_max: false,
            detail: None,
        }
    }

    pub fn failed(&self) -> bool {
        self.verdict == Verdict::Fail
    }

    pub fn token(&self) -> String {
        let mark = match self.verdict {
            Verdict::Fail => FAIL_MARK,
            Verdict::Warn => WARN_MARK,
            Verdict::Pass | Verdict::NotApplicable => "",
        };
        let body = match (self.digits, &self.detail) {
            (Some(digits), _) => format!("{}{}", digits, self.metric.as_deref().unwrap_or("")),
            (None, Some(detail)) => detail.clone(),
            (None, None) => "NA".to_string(),
        };
        format!("{:<width$}:{}{}", self.name, body, mark, width = NAME_WIDTH)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairReport {
    pub first: String,
    pub second: String,
    pub skipped: bool,
    pub passed: bool,
    pub comparisons: Vec<QuantityComparison>,
    pub line: String,
}

impl PairReport {
    pub fn comparison(&self, name: &str) -> Option<&QuantityComparison> {
        self.comparisons
            .iter()
            .find(|comparison| comparison.name == name)
    }
}

pub(super) fn line_prefix(case_id: &str, first: &str, second: &str) -> String {
    format!(
        "{:<case_width$} | {:<engine_width$} | {:<engine_width$}",
        case_id,
        first,
        second,
        case_width = CASE_WIDTH,
        engine_width = ENGINE_WIDTH
    )
}
