use crate::engines::{LengthSpec, TextSpec, Vec3NormSpec};
use crate::common::constants::PI;
use regex::{Captures, Regex};
use std::fs;
use std::path::Path;

pub(super) fn read_text(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok()
}

fn find_captures<'t>(text: &'t str, pattern: &Regex, take_last: bool) -> Option<Captures<'t>> {
    if take_last {
        pattern.captures_iter(text).last()
    } else {
        pattern.captures(text)
    }
}

/// Parses a numeric token, accepting Fortran `D` exponents.
pub(crate) fn parse_number(token: &str) -> Option<f64> {
    let token = token.trim().trim_matches(|ch| ch == '"' || ch == '\'');
    if let Ok(value) = token.parse::<f64>() {
        return Some(value);
    }
    token.replace(['D', 'd'], "E").parse::<f64>().ok()
}

fn captured_number(captures: &Captures<'_>, group: &str) -> Option<f64> {
    parse_number(captures.name(group)?.as_str())
}

pub(super) fn text_scalar(text: &str, spec: &TextSpec) -> Option<f64> {
    let captures = find_captures(text, &spec.pattern, spec.take_last)?;
    captured_number(&captures, "value").map(|value| value * spec.unit_factor)
}

pub(super) fn vec3_norm(text: &str, spec: &Vec3NormSpec) -> Option<f64> {
    let captures = find_captures(text, &spec.pattern, spec.take_last)?;
    let mut sum_of_squares = 0.0;
    for group in &spec.groups {
        let component = captured_number(&captures, group)?;
        sum_of_squares += component * component;
    }
    Some(sum_of_squares.sqrt() * spec.unit_factor)
}

/// Length in meters. Dipole specs reconstruct the volume-equivalent radius
/// from `V = N d^3`.
pub(super) fn length_meters(text: &str, spec: &LengthSpec) -> Option<f64> {
    match spec {
        LengthSpec::Text {
            pattern,
            take_last,
            meters_per_unit,
        } => {
            let captures = find_captures(text, pattern, *take_last)?;
            captured_number(&captures, "value").map(|value| value * meters_per_unit)
        }
        LengthSpec::Dipoles {
            count_pattern,
            cell_size_pattern,
            meters_per_unit,
        } => {
            let count = captured_number(&count_pattern.captures(text)?, "value")?;
            let cell_size = captured_number(&cell_size_pattern.captures(text)?, "value")?;
            equivalent_radius(count, cell_size * meters_per_unit)
        }
    }
}

pub fn equivalent_radius(dipole_count: f64, cell_size: f64) -> Option<f64> {
    if dipole_count <= 0.0 || cell_size <= 0.0 {
        return None;
    }
    let volume = dipole_count * cell_size.powi(3);
    Some((3.0 * volume / (4.0 * PI)).cbrt())
}

#[cfg(test)]
mod tests {
    use super::{equivalent_radius, length_meters, parse_number, text_scalar, vec3_norm};
    use crate::common::constants::PI;
    use crate::engines::{LengthSpec, TextSpec, Vec3NormSpec};
    use regex::Regex;

    fn regex(pattern: &str) -> Regex {
        Regex::new(pattern).expect("test regex should compile")
    }

    #[test]
    fn text_scalar_takes_first_or_last_match_and_scales() {
        let log = "Cext = 1.5e-12\nCext = 2.5e-12\n";
        let first = TextSpec {
            pattern: regex(r"Cext\s*=\s*(?P<value>\S+)"),
            unit_factor: 1.0,
            take_last: false,
        };
        let last = TextSpec {
            take_last: true,
            unit_factor: 1.0e12,
            ..first.clone()
        };

        assert_eq!(text_scalar(log, &first), Some(1.5e-12));
        let scaled = text_scalar(log, &last).expect("last match should parse");
        assert!((scaled - 2.5).abs() < 1e-12);
        assert_eq!(text_scalar("nothing here", &first), None);
    }

    #[test]
    fn unparseable_capture_is_absent() {
        let spec = TextSpec {
            pattern: regex(r"Qext\s*=\s*(?P<value>\S+)"),
            unit_factor: 1.0,
            take_last: false,
        };
        assert_eq!(text_scalar("Qext = n/a", &spec), None);
    }

    #[test]
    fn fortran_exponents_are_accepted() {
        assert_eq!(parse_number("1.25D-03"), Some(1.25e-3));
        assert_eq!(parse_number(" 4.0 "), Some(4.0));
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn vec3_norm_combines_named_components() {
        let spec = Vec3NormSpec {
            pattern: regex(r"F = \((?P<x>[^,]+),\s*(?P<y>[^,]+),\s*(?P<z>[^)]+)\)"),
            groups: ["x".to_string(), "y".to_string(), "z".to_string()],
            unit_factor: 2.0,
            take_last: false,
        };
        let norm = vec3_norm("F = (3.0, 0.0, 4.0)", &spec).expect("vector should parse");
        assert!((norm - 10.0).abs() < 1e-12);
    }

    #[test]
    fn dipole_count_and_cell_size_give_equivalent_radius() {
        let spec = LengthSpec::Dipoles {
            count_pattern: regex(r"N = (?P<value>\d+)"),
            cell_size_pattern: regex(r"d = (?P<value>\S+)"),
            meters_per_unit: 1.0e-9,
        };
        let aeff = length_meters("N = 1000\nd = 10\n", &spec).expect("aeff should be derived");
        let expected = (3.0 * 1000.0 * 1.0e-24 / (4.0 * PI)).cbrt();
        assert!((aeff - expected).abs() / expected < 1e-12);

        assert_eq!(equivalent_radius(0.0, 1.0), None);
    }

    #[test]
    fn text_length_is_normalized_to_meters() {
        let spec = LengthSpec::Text {
            pattern: regex(r"aeff\s*=\s*(?P<value>\S+)"),
            take_last: false,
            meters_per_unit: 1.0e-6,
        };
        let aeff = length_meters("aeff = 0.5", &spec).expect("aeff should parse");
        assert!((aeff - 0.5e-6).abs() < 1e-18);
    }
}
