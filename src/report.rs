use std::fmt::Write;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::matrix;
use crate::models::Matrix;
use crate::sheet::{CellValue, FilterRange, Surface};

pub const HEADER_ROW: usize = 2;
pub const FIRST_DATA_ROW: usize = HEADER_ROW + 1;
pub const MEMBER_COLUMNS: usize = 4;
pub const TOTAL_SCORE_COLUMN: usize = 3;
pub const MEMBER_HEADERS: [&str; MEMBER_COLUMNS] =
    ["employee number", "member", "total score", "entry count"];
pub const UPDATED_AT_PREFIX: &str = "updated at: ";

pub fn format_updated_at(now: DateTime<Utc>, timezone: Tz) -> String {
    now.with_timezone(&timezone)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Clears the surface and writes the member rows, date columns, and score
/// cells, then installs a filter sorted by total score. The timestamp in A1
/// is written last.
pub fn render_matrix<S>(surface: &mut S, matrix: &Matrix, updated_at: &str) -> anyhow::Result<()>
where
    S: Surface + ?Sized,
{
    surface.clear_contents();

    for member_index in 0..matrix.rows.len() {
        for date_index in 0..matrix.dates.len() {
            if let Some(cell) = matrix.cell(member_index, date_index) {
                surface.set_value(
                    FIRST_DATA_ROW + member_index,
                    MEMBER_COLUMNS + 1 + date_index,
                    CellValue::link(&cell.link, CellValue::Number(i64::from(cell.score))),
                );
            }
        }
    }

    for (index, header) in MEMBER_HEADERS.iter().enumerate() {
        surface.set_value(HEADER_ROW, index + 1, CellValue::text(*header));
    }
    for (offset, row) in matrix.rows.iter().enumerate() {
        let sheet_row = FIRST_DATA_ROW + offset;
        let employee_number = row
            .member
            .employee_number
            .map_or(CellValue::Empty, CellValue::Real);
        surface.set_value(sheet_row, 1, employee_number);
        surface.set_value(
            sheet_row,
            2,
            CellValue::link(&row.member.link, CellValue::text(row.member.name())),
        );
        surface.set_value(sheet_row, 3, CellValue::Number(i64::from(row.total_score)));
        surface.set_value(sheet_row, 4, CellValue::Number(i64::from(row.entry_count)));
    }

    for (date_index, date) in matrix.dates.iter().enumerate() {
        surface.set_value(
            HEADER_ROW,
            MEMBER_COLUMNS + 1 + date_index,
            CellValue::text(date.as_str()),
        );
    }

    if surface.remove_filter() {
        debug!(sheet = surface.name(), "removed previous filter");
    }
    surface.create_filter(FilterRange {
        first_row: HEADER_ROW,
        first_column: 1,
        last_row: HEADER_ROW + matrix.rows.len(),
        last_column: MEMBER_COLUMNS + matrix.dates.len(),
    })?;
    surface.sort_filter(TOTAL_SCORE_COLUMN, false)?;

    surface.set_value(1, 1, CellValue::text(format!("{UPDATED_AT_PREFIX}{updated_at}")));
    Ok(())
}

pub fn build_summary(matrix: &Matrix, limit: usize) -> String {
    let scores = matrix::rank_members(matrix);
    let mut output = String::new();

    let _ = writeln!(output, "Top members by YWT score:");
    if scores.is_empty() {
        let _ = writeln!(output, "No active members found.");
        return output;
    }

    for score in scores.iter().take(limit) {
        let number = score
            .employee_number
            .map_or_else(|| "-".to_string(), |number| number.to_string());
        let _ = writeln!(
            output,
            "- {} (#{}) score {} across {} entries",
            score.name, number, score.total_score, score.entry_count
        );
    }

    let _ = writeln!(
        output,
        "{} members over {} days",
        matrix.rows.len(),
        matrix.dates.len()
    );
    output
}
