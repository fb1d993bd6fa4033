//! Physical and reporting constants shared by the reconciler and comparator.

pub const PI: f64 = std::f64::consts::PI;
pub const TWO_PI: f64 = 2.0 * PI;

/// Vacuum permittivity in F/m.
pub const EPS0: f64 = 8.854_187_817_620_389e-12;

pub const DIGIT_CAP: u32 = 16;
pub const MUELLER_COLUMNS: usize = 16;

pub const PERMISSIVE_TOLERANCE_MIN: i64 = 0;
pub const PERMISSIVE_TOLERANCE_MAX: i64 = 1_000_000_000;

pub const FAIL_MARK: &str = "❌";
pub const WARN_MARK: &str = "⚠";

#[cfg(test)]
mod tests {
    use super::{EPS0, PERMISSIVE_TOLERANCE_MAX, TWO_PI};

    #[test]
    fn constants_keep_expected_values() {
        assert!((EPS0 - 8.854_187_817_620_389e-12).abs() < 1e-24);
        assert!((TWO_PI - 6.283_185_307_179_586).abs() < 1e-15);
        assert_eq!(PERMISSIVE_TOLERANCE_MAX, 10_i64.pow(9));
    }
}
