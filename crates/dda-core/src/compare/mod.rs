//! Pairwise digit-agreement comparison between engines of one case.
//!
//! Every unordered engine pair is scored family by family. A pair fails when
//! any attempted required comparison lands outside its tolerance range or is
//! undefined; residual comparisons only ever warn.

mod model;

pub use model::{PairReport, QuantityComparison, Verdict};

use crate::cases::CommandCase;
use crate::domain::{EngineValues, Quantity, ToleranceRange};
use crate::numerics::{digits_of_agreement, matching_digits, mean_relative_error, mueller_digits};
use crate::reconcile::{AlignedMetric, aligned_force_metric, aligned_torque_metric};
use model::line_prefix;
use std::collections::BTreeMap;
use tracing::{error, info};

/// Quantities scored by a dedicated family; anything else in a case's list is
/// compared generically.
const FAMILY_QUANTITIES: [Quantity; 12] = [
    Quantity::Cext,
    Quantity::Cabs,
    Quantity::Qext,
    Quantity::Qabs,
    Quantity::Residual1,
    Quantity::IntField,
    Quantity::Force,
    Quantity::E0,
    Quantity::Cpr,
    Quantity::Torque,
    Quantity::Qtrq,
    Quantity::Mueller,
];

const SKIP_TOKEN: &str = "SKIP:@skip_pairs";

/// Everything the comparator needs to know about one engine in a case.
#[derive(Debug, Clone, Copy)]
pub struct EngineSnapshot<'a> {
    pub name: &'a str,
    pub values: &'a EngineValues,
    pub series: &'a BTreeMap<String, Vec<f64>>,
    /// Outcome of the worst unsuccessful run, e.g. `timeout` or `exit(2)`.
    pub run_issue: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtAbsFamily {
    Extinction,
    Absorption,
}

impl ExtAbsFamily {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Extinction => "Ext",
            Self::Absorption => "Abs",
        }
    }

    const fn quantities(self) -> (Quantity, Quantity) {
        match self {
            Self::Extinction => (Quantity::Cext, Quantity::Qext),
            Self::Absorption => (Quantity::Cabs, Quantity::Qabs),
        }
    }
}

fn judge(
    name: &str,
    digits: Option<u32>,
    metric: Option<&str>,
    range: ToleranceRange,
    miss: Verdict,
) -> QuantityComparison {
    let Some(digits) = digits else {
        let mut comparison = QuantityComparison::undefined(name, miss);
        comparison.metric = metric.map(str::to_string);
        return comparison;
    };

    if range.contains(digits) {
        return QuantityComparison::scored(name, digits, metric, Verdict::Pass);
    }
    let mut comparison = QuantityComparison::scored(name, digits, metric, miss);
    comparison.above_max = range.exceeded_by(digits);
    comparison
}

/// Scores extinction or absorption, preferring raw cross-sections, then raw
/// efficiencies, then any cross-section, then any efficiency.
pub fn compare_extabs(
    first: &EngineValues,
    second: &EngineValues,
    family: ExtAbsFamily,
    range: ToleranceRange,
) -> QuantityComparison {
    let name = family.label();
    let (cross_section, efficiency) = family.quantities();

    let candidates = [
        (first.raw(cross_section), second.raw(cross_section), "C"),
        (first.raw(efficiency), second.raw(efficiency), "Q"),
        (
            first.quantity(cross_section),
            second.quantity(cross_section),
            "C*",
        ),
        (first.quantity(efficiency), second.quantity(efficiency), "Q*"),
    ];

    for (lhs, rhs, metric) in candidates {
        if let (Some(lhs), Some(rhs)) = (lhs, rhs) {
            return judge(
                name,
                digits_of_agreement(lhs, rhs),
                Some(metric),
                range,
                Verdict::Fail,
            );
        }
    }
    QuantityComparison::not_applicable(name)
}

pub fn compare_residual(
    first: &EngineValues,
    second: &EngineValues,
    range: ToleranceRange,
) -> QuantityComparison {
    let name = Quantity::Residual1.as_str();
    match (
        first.quantity(Quantity::Residual1),
        second.quantity(Quantity::Residual1),
    ) {
        (Some(lhs), Some(rhs)) => judge(
            name,
            digits_of_agreement(lhs, rhs),
            None,
            range,
            Verdict::Warn,
        ),
        _ => QuantityComparison::not_applicable(name),
    }
}

/// Equal labels are kept; otherwise the derived (starred) label wins, and
/// failing that the first engine's label is used.
fn metric_label(first: AlignedMetric, second: AlignedMetric) -> &'static str {
    if first.kind == second.kind || first.kind.is_derived() || !second.kind.is_derived() {
        first.kind.label()
    } else {
        second.kind.label()
    }
}

/// Compares two aligned force or torque metrics. Only metrics of the same
/// family are comparable; a quantity produced by neither engine fails.
pub fn compare_aligned(
    name: &str,
    first: AlignedMetric,
    second: AlignedMetric,
    range: ToleranceRange,
) -> QuantityComparison {
    match (first.kind.family(), second.kind.family()) {
        (None, None) => QuantityComparison::undefined(name, Verdict::Fail),
        (Some(lhs_family), Some(rhs_family)) if lhs_family == rhs_family => {
            let digits = match (first.value, second.value) {
                (Some(lhs), Some(rhs)) => digits_of_agreement(lhs, rhs),
                _ => None,
            };
            judge(
                name,
                digits,
                Some(metric_label(first, second)),
                range,
                Verdict::Fail,
            )
        }
        _ => QuantityComparison::not_applicable(name),
    }
}

/// Internal-field agreement, scored on the mean relative error against the
/// second engine.
pub fn compare_int_field(
    first: Option<&[f64]>,
    second: Option<&[f64]>,
    range: ToleranceRange,
) -> QuantityComparison {
    let digits = match (first, second) {
        (Some(values), Some(reference)) => {
            mean_relative_error(values, reference).and_then(matching_digits)
        }
        _ => None,
    };
    judge(
        Quantity::IntField.as_str(),
        digits,
        None,
        range,
        Verdict::Fail,
    )
}

pub fn compare_mueller(
    first: Option<&[f64]>,
    second: Option<&[f64]>,
    range: ToleranceRange,
) -> QuantityComparison {
    let digits = match (first, second) {
        (Some(values), Some(reference)) => mueller_digits(values, reference),
        _ => None,
    };
    judge(
        Quantity::Mueller.as_str(),
        digits,
        None,
        range,
        Verdict::Fail,
    )
}

/// Generic scalar comparison for quantities without a dedicated family.
pub fn compare_scalar(
    name: &str,
    first: &EngineValues,
    second: &EngineValues,
    range: ToleranceRange,
) -> QuantityComparison {
    match (first.get(name), second.get(name)) {
        (Some(lhs), Some(rhs)) => judge(
            name,
            digits_of_agreement(lhs, rhs),
            None,
            range,
            Verdict::Fail,
        ),
        _ => QuantityComparison::not_applicable(name),
    }
}

fn run_health(first: &EngineSnapshot<'_>, second: &EngineSnapshot<'_>) -> Option<QuantityComparison> {
    let issues = [first, second]
        .iter()
        .filter_map(|engine| {
            engine
                .run_issue
                .map(|issue| format!("{}={issue}", engine.name))
        })
        .collect::<Vec<_>>();
    if issues.is_empty() {
        return None;
    }

    let mut comparison = QuantityComparison::undefined("run", Verdict::Fail);
    comparison.detail = Some(issues.join(","));
    Some(comparison)
}

fn series<'a>(engine: &EngineSnapshot<'a>, quantity: Quantity) -> Option<&'a [f64]> {
    engine.series.get(quantity.as_str()).map(Vec::as_slice)
}

fn is_family_quantity(name: &str) -> bool {
    FAMILY_QUANTITIES
        .iter()
        .any(|quantity| quantity.as_str() == name)
}

/// Scores one engine pair. `quantities` is the case's effective quantity list.
pub fn compare_pair(
    case: &CommandCase,
    quantities: &[String],
    first: &EngineSnapshot<'_>,
    second: &EngineSnapshot<'_>,
) -> PairReport {
    let prefix = line_prefix(&case.case_id, first.name, second.name);
    if case.skips_pair(first.name, second.name) {
        return PairReport {
            first: first.name.to_string(),
            second: second.name.to_string(),
            skipped: true,
            passed: true,
            comparisons: Vec::new(),
            line: format!("{prefix} | {SKIP_TOKEN}"),
        };
    }

    let policy = &case.policy;
    let flags = policy.flags;
    let listed = |quantity: Quantity| quantities.iter().any(|name| name == quantity.as_str());
    let mut comparisons = Vec::new();

    comparisons.extend(run_health(first, second));
    comparisons.push(compare_extabs(
        first.values,
        second.values,
        ExtAbsFamily::Extinction,
        policy.ext,
    ));
    comparisons.push(compare_extabs(
        first.values,
        second.values,
        ExtAbsFamily::Absorption,
        policy.abs,
    ));
    if listed(Quantity::Residual1) {
        comparisons.push(compare_residual(first.values, second.values, policy.res));
    }
    if flags.need_int {
        comparisons.push(compare_int_field(
            series(first, Quantity::IntField),
            series(second, Quantity::IntField),
            policy.int.unwrap_or(ToleranceRange::PERMISSIVE),
        ));
    }
    if flags.need_force {
        comparisons.push(compare_aligned(
            Quantity::Force.as_str(),
            aligned_force_metric(first.values),
            aligned_force_metric(second.values),
            policy.force_range(),
        ));
    }
    if flags.need_torque {
        comparisons.push(compare_aligned(
            Quantity::Torque.as_str(),
            aligned_torque_metric(first.values),
            aligned_torque_metric(second.values),
            policy.torque_range(),
        ));
    }
    if flags.need_mueller {
        comparisons.push(compare_mueller(
            series(first, Quantity::Mueller),
            series(second, Quantity::Mueller),
            policy.mueller.unwrap_or(ToleranceRange::PERMISSIVE),
        ));
    }
    for name in quantities.iter().filter(|name| !is_family_quantity(name)) {
        comparisons.push(compare_scalar(name, first.values, second.values, policy.ext));
    }

    let passed = !comparisons.iter().any(QuantityComparison::failed);
    let tokens = comparisons
        .iter()
        .map(QuantityComparison::token)
        .collect::<Vec<_>>();
    PairReport {
        first: first.name.to_string(),
        second: second.name.to_string(),
        skipped: false,
        passed,
        comparisons,
        line: format!("{prefix} | {}", tokens.join(" | ")),
    }
}

/// Scores every unordered pair in first-appearance order and logs one line
/// per pair.
pub fn compare_case(
    case: &CommandCase,
    quantities: &[String],
    engines: &[EngineSnapshot<'_>],
) -> Vec<PairReport> {
    let mut reports = Vec::new();
    for (index, first) in engines.iter().enumerate() {
        for second in &engines[index + 1..] {
            let report = compare_pair(case, quantities, first, second);
            if report.passed {
                info!("{}", report.line);
            } else {
                error!("{}", report.line);
            }
            reports.push(report);
        }
    }
    reports
}
