use super::ConfigError;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitPolicy {
    #[default]
    Strict,
    AssumeMeters,
}

impl UnitPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "strict" => Some(Self::Strict),
            "assume-meters" | "assume_meters" => Some(Self::AssumeMeters),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Meter,
    Micrometer,
    Nanometer,
}

impl LengthUnit {
    pub fn parse(unit: &str) -> Option<Self> {
        match unit.trim().to_lowercase().as_str() {
            "m" | "meter" | "meters" | "metre" | "metres" => Some(Self::Meter),
            "um" | "µm" | "μm" | "micrometer" | "micrometers" | "micrometre" | "micrometres"
            | "micron" | "microns" => Some(Self::Micrometer),
            "nm" | "nanometer" | "nanometers" | "nanometre" | "nanometres" => {
                Some(Self::Nanometer)
            }
            _ => None,
        }
    }

    pub const fn meters(self) -> f64 {
        match self {
            Self::Meter => 1.0,
            Self::Micrometer => 1.0e-6,
            Self::Nanometer => 1.0e-9,
        }
    }
}

pub(super) fn meters_per_unit(
    engine: &str,
    field: &str,
    unit: &str,
    policy: UnitPolicy,
) -> Result<f64, ConfigError> {
    if let Some(unit) = LengthUnit::parse(unit) {
        return Ok(unit.meters());
    }

    match policy {
        UnitPolicy::Strict => Err(ConfigError::UnknownUnit {
            engine: engine.to_string(),
            field: field.to_string(),
            unit: unit.to_string(),
        }),
        UnitPolicy::AssumeMeters => {
            warn!(engine, field, unit, "unrecognized length unit, assuming meters");
            Ok(1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LengthUnit, UnitPolicy, meters_per_unit};

    #[test]
    fn unit_aliases_are_case_insensitive() {
        assert_eq!(LengthUnit::parse("NM"), Some(LengthUnit::Nanometer));
        assert_eq!(LengthUnit::parse("Micron"), Some(LengthUnit::Micrometer));
        assert_eq!(LengthUnit::parse("µm"), Some(LengthUnit::Micrometer));
        assert_eq!(LengthUnit::parse(" metres "), Some(LengthUnit::Meter));
        assert_eq!(LengthUnit::parse("furlong"), None);
    }

    #[test]
    fn unknown_units_follow_policy() {
        let strict = meters_per_unit("adda", "aeff.unit", "angstrom", UnitPolicy::Strict);
        assert!(strict.is_err());

        let lenient = meters_per_unit("adda", "aeff.unit", "angstrom", UnitPolicy::AssumeMeters)
            .expect("lenient policy should accept unknown units");
        assert_eq!(lenient, 1.0);

        let micrometers = meters_per_unit("adda", "aeff.unit", "um", UnitPolicy::Strict)
            .expect("known unit should resolve");
        assert_eq!(micrometers, 1.0e-6);
    }

    #[test]
    fn policy_names_parse() {
        assert_eq!(UnitPolicy::parse("strict"), Some(UnitPolicy::Strict));
        assert_eq!(UnitPolicy::parse("assume-meters"), Some(UnitPolicy::AssumeMeters));
        assert_eq!(UnitPolicy::parse("loose"), None);
    }
}
