//! Cross-engine metric reconciliation.
//!
//! Engines report extinction and absorption either as cross-sections `C` or
//! efficiencies `Q = C / (pi aeff^2)`, and optical force and torque either
//! directly or as the dimensionless `Cpr`/`Qtrq`. The functions here fill the
//! missing side of each relation when the supporting quantities are known.

use crate::common::constants::{EPS0, PI, TWO_PI};
use crate::domain::{EngineValues, Quantity};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Cpr,
    DerivedCpr,
    Force,
    Qtrq,
    DerivedQtrq,
    NotAvailable,
}

impl MetricKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cpr => "Cpr",
            Self::DerivedCpr => "Cpr*",
            Self::Force => "force",
            Self::Qtrq => "Qtrq",
            Self::DerivedQtrq => "Qtrq*",
            Self::NotAvailable => "NA",
        }
    }

    pub const fn is_derived(self) -> bool {
        matches!(self, Self::DerivedCpr | Self::DerivedQtrq)
    }

    /// Metrics in the same family measure the same physical quantity.
    pub const fn family(self) -> Option<MetricFamily> {
        match self {
            Self::Cpr | Self::DerivedCpr => Some(MetricFamily::PressureCoefficient),
            Self::Force => Some(MetricFamily::RawForce),
            Self::Qtrq | Self::DerivedQtrq => Some(MetricFamily::TorqueEfficiency),
            Self::NotAvailable => None,
        }
    }
}

impl Display for MetricKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricFamily {
    PressureCoefficient,
    RawForce,
    TorqueEfficiency,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedMetric {
    pub kind: MetricKind,
    pub value: Option<f64>,
}

impl AlignedMetric {
    const fn new(kind: MetricKind, value: Option<f64>) -> Self {
        Self { kind, value }
    }
}

pub fn geometric_area(aeff: f64) -> f64 {
    PI * aeff * aeff
}

/// Back-fills `C`/`Q` pairs for extinction and absorption. Existing values
/// are never overwritten.
pub fn fill_cross_sections(values: &mut EngineValues, aeff: f64) {
    let area = geometric_area(aeff);
    if !area.is_finite() || area <= 0.0 {
        return;
    }

    for (cross_section, efficiency) in [
        (Quantity::Cext, Quantity::Qext),
        (Quantity::Cabs, Quantity::Qabs),
    ] {
        if !values.contains(cross_section)
            && let Some(q) = values.quantity(efficiency)
        {
            values.insert_derived(cross_section, q * area);
        }
        if !values.contains(efficiency)
            && let Some(c) = values.quantity(cross_section)
        {
            values.insert_derived(efficiency, c / area);
        }
    }
}

/// `Cpr = 2F / (eps0 E0^2)`.
pub fn cpr_from_force(force: f64, e0: f64) -> Option<f64> {
    if e0 == 0.0 {
        return None;
    }
    Some(2.0 * force / (EPS0 * e0 * e0))
}

/// `Qtrq = T 2k / (pi aeff^2 eps0 E0^2)` with `k = 2 pi / lambda`.
pub fn qtrq_from_torque(torque: f64, lambda: f64, aeff: f64, e0: f64) -> Option<f64> {
    if lambda == 0.0 || aeff == 0.0 || e0 == 0.0 {
        return None;
    }
    let wavenumber = TWO_PI / lambda;
    Some(torque * 2.0 * wavenumber / (PI * aeff * aeff * EPS0 * e0 * e0))
}

pub fn aligned_force_metric(values: &EngineValues) -> AlignedMetric {
    if let Some(cpr) = values.quantity(Quantity::Cpr) {
        return AlignedMetric::new(MetricKind::Cpr, Some(cpr));
    }
    match (values.quantity(Quantity::Force), values.quantity(Quantity::E0)) {
        (Some(force), Some(e0)) => AlignedMetric::new(MetricKind::DerivedCpr, cpr_from_force(force, e0)),
        (Some(force), None) => AlignedMetric::new(MetricKind::Force, Some(force)),
        (None, _) => AlignedMetric::new(MetricKind::NotAvailable, None),
    }
}

pub fn aligned_torque_metric(values: &EngineValues) -> AlignedMetric {
    if let Some(qtrq) = values.quantity(Quantity::Qtrq) {
        return AlignedMetric::new(MetricKind::Qtrq, Some(qtrq));
    }
    match (
        values.quantity(Quantity::Torque),
        values.quantity(Quantity::Lambda),
        values.quantity(Quantity::Aeff),
        values.quantity(Quantity::E0),
    ) {
        (Some(torque), Some(lambda), Some(aeff), Some(e0)) => AlignedMetric::new(
            MetricKind::DerivedQtrq,
            qtrq_from_torque(torque, lambda, aeff, e0),
        ),
        _ => AlignedMetric::new(MetricKind::NotAvailable, None),
    }
}

/// Stores `Cpr_recalc`/`Qtrq_recalc` whenever the aligned metric had to be
/// derived, so persisted records carry the proxy even if no pair used it.
pub fn add_recomputed_quantities(values: &mut EngineValues) {
    let force = aligned_force_metric(values);
    if force.kind == MetricKind::DerivedCpr
        && let Some(cpr) = force.value
    {
        values.insert_derived(Quantity::CprRecalc, cpr);
    }

    let torque = aligned_torque_metric(values);
    if torque.kind == MetricKind::DerivedQtrq
        && let Some(qtrq) = torque.value
    {
        values.insert_derived(Quantity::QtrqRecalc, qtrq);
    }
}
