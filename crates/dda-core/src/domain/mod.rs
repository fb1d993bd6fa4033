pub mod errors;

pub use errors::{BenchError, BenchErrorCategory, BenchResult};

use crate::common::constants::{PERMISSIVE_TOLERANCE_MAX, PERMISSIVE_TOLERANCE_MIN};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Quantity {
    Cext,
    Cabs,
    Qext,
    Qabs,
    Residual1,
    IntField,
    Force,
    Torque,
    E0,
    Cpr,
    Qtrq,
    Mueller,
    Aeff,
    Lambda,
    CprRecalc,
    QtrqRecalc,
}

impl Quantity {
    pub const ALL: [Quantity; 16] = [
        Self::Cext,
        Self::Cabs,
        Self::Qext,
        Self::Qabs,
        Self::Residual1,
        Self::IntField,
        Self::Force,
        Self::Torque,
        Self::E0,
        Self::Cpr,
        Self::Qtrq,
        Self::Mueller,
        Self::Aeff,
        Self::Lambda,
        Self::CprRecalc,
        Self::QtrqRecalc,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cext => "Cext",
            Self::Cabs => "Cabs",
            Self::Qext => "Qext",
            Self::Qabs => "Qabs",
            Self::Residual1 => "residual1",
            Self::IntField => "int_field",
            Self::Force => "force",
            Self::Torque => "torque",
            Self::E0 => "E0",
            Self::Cpr => "Cpr",
            Self::Qtrq => "Qtrq",
            Self::Mueller => "mueller",
            Self::Aeff => "aeff",
            Self::Lambda => "lambda",
            Self::CprRecalc => "Cpr_recalc",
            Self::QtrqRecalc => "Qtrq_recalc",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|quantity| quantity.as_str() == name)
    }

    pub const fn is_series(self) -> bool {
        matches!(self, Self::IntField | Self::Mueller)
    }
}

impl Display for Quantity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Quantities extracted after each run when the case does not narrow the list.
pub const DEFAULT_QUANTITIES: [&str; 12] = [
    "Cext",
    "Cabs",
    "residual1",
    "Qext",
    "Qabs",
    "int_field",
    "force",
    "E0",
    "Cpr",
    "torque",
    "Qtrq",
    "mueller",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Raw,
    Derived,
}

impl Provenance {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Derived => "derived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaggedValue {
    pub value: f64,
    pub provenance: Provenance,
}

/// Scalar values gathered for one engine within one case, keyed by quantity
/// name so engine-specific extras travel alongside the known vocabulary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineValues {
    scalars: BTreeMap<String, TaggedValue>,
}

impl EngineValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.scalars.get(name).map(|tagged| tagged.value)
    }

    pub fn quantity(&self, quantity: Quantity) -> Option<f64> {
        self.get(quantity.as_str())
    }

    pub fn raw(&self, quantity: Quantity) -> Option<f64> {
        self.scalars
            .get(quantity.as_str())
            .filter(|tagged| tagged.provenance == Provenance::Raw)
            .map(|tagged| tagged.value)
    }

    pub fn provenance(&self, name: &str) -> Option<Provenance> {
        self.scalars.get(name).map(|tagged| tagged.provenance)
    }

    pub fn contains(&self, quantity: Quantity) -> bool {
        self.scalars.contains_key(quantity.as_str())
    }

    pub fn insert_raw(&mut self, name: impl Into<String>, value: f64) {
        self.scalars.insert(
            name.into(),
            TaggedValue {
                value,
                provenance: Provenance::Raw,
            },
        );
    }

    pub fn insert_derived(&mut self, quantity: Quantity, value: f64) {
        self.scalars.insert(
            quantity.as_str().to_string(),
            TaggedValue {
                value,
                provenance: Provenance::Derived,
            },
        );
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaggedValue)> {
        self.scalars.iter().map(|(name, tagged)| (name.as_str(), tagged))
    }

    pub fn len(&self) -> usize {
        self.scalars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToleranceRange {
    pub min: i64,
    pub max: i64,
}

impl ToleranceRange {
    pub const PERMISSIVE: ToleranceRange = ToleranceRange {
        min: PERMISSIVE_TOLERANCE_MIN,
        max: PERMISSIVE_TOLERANCE_MAX,
    };

    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, digits: u32) -> bool {
        let digits = i64::from(digits);
        digits >= self.min && digits <= self.max
    }

    pub fn exceeded_by(&self, digits: u32) -> bool {
        i64::from(digits) > self.max
    }
}

impl Display for ToleranceRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineValues, Provenance, Quantity, ToleranceRange};

    #[test]
    fn quantity_names_round_trip_through_parse() {
        for quantity in Quantity::ALL {
            assert_eq!(Quantity::parse(quantity.as_str()), Some(quantity));
        }
        assert_eq!(Quantity::parse("Csca"), None);
    }

    #[test]
    fn derived_values_are_not_reported_as_raw() {
        let mut values = EngineValues::new();
        values.insert_raw("Cext", 1.0);
        values.insert_derived(Quantity::Qext, 2.0);

        assert_eq!(values.raw(Quantity::Cext), Some(1.0));
        assert_eq!(values.raw(Quantity::Qext), None);
        assert_eq!(values.quantity(Quantity::Qext), Some(2.0));
        assert_eq!(values.provenance("Qext"), Some(Provenance::Derived));
    }

    #[test]
    fn tolerance_range_bounds_are_inclusive() {
        let range = ToleranceRange::new(4, 7);
        assert!(range.contains(4));
        assert!(range.contains(7));
        assert!(!range.contains(3));
        assert!(!range.contains(8));
        assert!(range.exceeded_by(8));
        assert!(ToleranceRange::PERMISSIVE.contains(16));
    }
}
