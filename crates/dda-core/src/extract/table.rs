use super::text::parse_number;
use crate::engines::{ColumnRef, TextTableSpec};
use tracing::debug;

/// Without an explicit delimiter a row is comma-separated if it contains a
/// comma and whitespace-separated otherwise.
fn split_row(line: &str, delimiter: Option<char>) -> Vec<&str> {
    match delimiter.or_else(|| line.contains(',').then_some(',')) {
        Some(delimiter) => line.split(delimiter).map(str::trim).collect(),
        None => line.split_whitespace().collect(),
    }
}

fn unquote(cell: &str) -> &str {
    cell.trim().trim_matches('"')
}

struct DelimitedTable<'a> {
    header: Option<Vec<&'a str>>,
    rows: Vec<Vec<&'a str>>,
}

fn parse_delimited(content: &str, delimiter: Option<char>) -> DelimitedTable<'_> {
    let mut lines = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| split_row(line, delimiter));

    let Some(first) = lines.next() else {
        return DelimitedTable {
            header: None,
            rows: Vec::new(),
        };
    };

    let first_is_header = first.iter().any(|cell| parse_number(unquote(cell)).is_none());
    let mut rows = Vec::new();
    let header = if first_is_header {
        Some(first.into_iter().map(unquote).collect())
    } else {
        rows.push(first);
        None
    };
    rows.extend(lines);
    DelimitedTable { header, rows }
}

fn column_index(table: &DelimitedTable<'_>, column: &ColumnRef) -> Option<usize> {
    match column {
        ColumnRef::Index(index) => Some(*index),
        ColumnRef::Name(name) => table
            .header
            .as_ref()?
            .iter()
            .position(|cell| cell == name),
    }
}

fn column_values(table: &DelimitedTable<'_>, column: &ColumnRef) -> Option<Vec<f64>> {
    let Some(index) = column_index(table, column) else {
        debug!(?column, "column not present in table header");
        return None;
    };
    table
        .rows
        .iter()
        .map(|row| row.get(index).and_then(|cell| parse_number(unquote(cell))))
        .collect()
}

pub(super) fn delimited_column(
    content: &str,
    column: &ColumnRef,
    delimiter: Option<char>,
) -> Option<Vec<f64>> {
    let table = parse_delimited(content, delimiter);
    column_values(&table, column)
}

/// Values of each column in turn, concatenated.
pub(super) fn delimited_columns(
    content: &str,
    columns: &[ColumnRef],
    delimiter: Option<char>,
) -> Option<Vec<f64>> {
    let table = parse_delimited(content, delimiter);
    let mut values = Vec::new();
    for column in columns {
        values.extend(column_values(&table, column)?);
    }
    Some(values)
}

/// Row-major values of a whitespace table anchored at the first header match.
/// Short rows before the first full row are skipped; after it, the first
/// short row ends the table.
pub(super) fn text_table(content: &str, spec: &TextTableSpec) -> Option<Vec<f64>> {
    let lines = content.lines().collect::<Vec<_>>();
    let header_index = lines.iter().position(|line| spec.header.is_match(line))?;
    let start = header_index + spec.start_offset;

    let mut values = Vec::new();
    for line in lines.iter().skip(start) {
        let numbers = line
            .split(|ch: char| ch.is_whitespace() || ch == ',')
            .filter(|token| !token.is_empty())
            .skip(spec.first_column)
            .take(spec.column_count)
            .map(parse_number)
            .collect::<Option<Vec<_>>>();

        match numbers {
            Some(row) if row.len() == spec.column_count => values.extend(row),
            _ if values.is_empty() => continue,
            _ => break,
        }
    }

    Some(values)
}
