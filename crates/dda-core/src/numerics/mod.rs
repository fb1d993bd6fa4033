//! Agreement metrics shared by every comparison family.
//!
//! All functions are pure; absent inputs are handled by the callers, which
//! decide whether an undefined metric is a failure or a warning.

use crate::common::constants::{DIGIT_CAP, MUELLER_COLUMNS};

pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for &value in values {
        let corrected = value - correction;
        let next = sum + corrected;
        correction = (next - sum) - corrected;
        sum = next;
    }

    sum
}

/// `|a - b| / max(|a|, |b|)`, and `0.0` when both operands are exactly zero.
pub fn relative_error(lhs: f64, rhs: f64) -> f64 {
    let scale = lhs.abs().max(rhs.abs());
    if scale == 0.0 {
        return 0.0;
    }
    (lhs - rhs).abs() / scale
}

pub fn matching_digits(relative_error: f64) -> Option<u32> {
    if !relative_error.is_finite() || relative_error < 0.0 {
        return None;
    }
    if relative_error == 0.0 {
        return Some(DIGIT_CAP);
    }

    let digits = (-relative_error.log10()).floor();
    if digits <= 0.0 {
        return Some(0);
    }
    Some((digits as u32).min(DIGIT_CAP))
}

pub fn digits_of_agreement(lhs: f64, rhs: f64) -> Option<u32> {
    matching_digits(relative_error(lhs, rhs))
}

/// Mean of `|a_k - r_k| / |r_k|` over samples whose reference is non-zero.
pub fn mean_relative_error(values: &[f64], reference: &[f64]) -> Option<f64> {
    if values.len() != reference.len() {
        return None;
    }

    let errors = values
        .iter()
        .zip(reference)
        .filter(|(_, reference)| **reference != 0.0)
        .map(|(value, reference)| (value - reference).abs() / reference.abs())
        .collect::<Vec<_>>();

    if errors.is_empty() {
        return None;
    }
    Some(stable_sum(&errors) / errors.len() as f64)
}

/// Digit agreement of two row-major Mueller tables.
///
/// Each column is scored on its mean relative error and the worst column
/// determines the result. Columns whose reference samples are all zero carry
/// no information and are skipped.
pub fn mueller_digits(values: &[f64], reference: &[f64]) -> Option<u32> {
    column_digits(values, reference, MUELLER_COLUMNS)
}

pub fn column_digits(values: &[f64], reference: &[f64], columns: usize) -> Option<u32> {
    if columns == 0
        || values.is_empty()
        || values.len() != reference.len()
        || values.len() % columns != 0
    {
        return None;
    }

    let mut worst: Option<u32> = None;
    for column in 0..columns {
        let column_values = values
            .iter()
            .skip(column)
            .step_by(columns)
            .copied()
            .collect::<Vec<_>>();
        let column_reference = reference
            .iter()
            .skip(column)
            .step_by(columns)
            .copied()
            .collect::<Vec<_>>();

        let Some(error) = mean_relative_error(&column_values, &column_reference) else {
            continue;
        };
        let digits = matching_digits(error)?;
        worst = Some(worst.map_or(digits, |current| current.min(digits)));
    }

    worst
}

#[cfg(test)]
mod tests {
    use super::{
        column_digits, digits_of_agreement, matching_digits, mean_relative_error, mueller_digits,
        relative_error, stable_sum,
    };

    #[test]
    fn stable_sum_reduces_order_loss_for_large_and_small_values() {
        let input = [1.0e16, 1.0, -1.0e16];
        assert_eq!(stable_sum(&input), 1.0);
    }

    #[test]
    fn identical_values_have_zero_error_and_capped_digits() {
        for value in [1.0e-12, -3.5, 42.0, 7.0e20] {
            assert_eq!(relative_error(value, value), 0.0);
        }
        assert_eq!(relative_error(0.0, 0.0), 0.0);
        assert_eq!(matching_digits(0.0), Some(16));
    }

    #[test]
    fn relative_error_uses_larger_magnitude_as_scale() {
        assert_eq!(relative_error(1.0, 1.1), relative_error(1.1, 1.0));
        assert!((relative_error(1.0, 2.0) - 0.5).abs() < 1e-15);
        assert_eq!(relative_error(0.0, 3.0), 1.0);
    }

    #[test]
    fn matching_digits_is_monotone_and_clamped() {
        let errors = [1e-20, 1e-16, 3e-9, 3e-5, 1e-3, 0.5, 1.0, 2.0, 1e6];
        let digits = errors
            .iter()
            .map(|error| matching_digits(*error).expect("finite errors should yield digits"))
            .collect::<Vec<_>>();

        for window in digits.windows(2) {
            assert!(window[0] >= window[1], "digits should not increase: {digits:?}");
        }
        assert!(digits.iter().all(|digits| *digits <= 16));
        assert_eq!(digits[0], 16);
        assert_eq!(digits[2], 8);
        assert_eq!(*digits.last().expect("non-empty"), 0);
    }

    #[test]
    fn matching_digits_rejects_negative_and_non_finite_errors() {
        assert_eq!(matching_digits(-1e-3), None);
        assert_eq!(matching_digits(f64::NAN), None);
        assert_eq!(matching_digits(f64::INFINITY), None);
    }

    #[test]
    fn close_cross_sections_agree_to_five_digits() {
        assert_eq!(digits_of_agreement(1.0e-12, 1.00001e-12), Some(5));
    }

    #[test]
    fn mean_relative_error_skips_zero_reference_samples() {
        let values = [1.0, 5.0, 2.2];
        let reference = [1.0, 0.0, 2.0];
        let error = mean_relative_error(&values, &reference).expect("two samples qualify");
        assert!((error - 0.05).abs() < 1e-12);

        assert_eq!(mean_relative_error(&[1.0], &[0.0]), None);
        assert_eq!(mean_relative_error(&[1.0, 2.0], &[1.0]), None);
    }

    #[test]
    fn identical_mueller_tables_reach_the_digit_cap() {
        let table = (1..=32).map(f64::from).collect::<Vec<_>>();
        assert_eq!(mueller_digits(&table, &table), Some(16));
    }

    #[test]
    fn worst_mueller_column_sets_the_score() {
        let reference = (1..=32).map(f64::from).collect::<Vec<_>>();
        let mut values = reference.clone();
        values[3] = reference[3] / 1.01;
        values[19] = reference[19] / 1.01;

        assert_eq!(mueller_digits(&values, &reference), Some(2));
    }

    #[test]
    fn mueller_rejects_ragged_or_mismatched_tables() {
        let table = vec![1.0; 32];
        assert_eq!(mueller_digits(&table[..31], &table[..31]), None);
        assert_eq!(mueller_digits(&table, &table[..16]), None);
        assert_eq!(mueller_digits(&[], &[]), None);
    }

    #[test]
    fn all_zero_columns_are_ignored_until_nothing_qualifies() {
        let values = [0.0, 1.0, 0.0, 1.0];
        let reference = [0.0, 1.0, 0.0, 1.0];
        assert_eq!(column_digits(&values, &reference, 2), Some(16));
        assert_eq!(column_digits(&[0.0, 0.0], &[0.0, 0.0], 2), None);
    }
}
