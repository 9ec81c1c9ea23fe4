use serde::Serialize;

/// One reflection-log page from the YWT database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub author_id: Option<String>,
    pub title: Option<String>,
    pub like_count: usize,
    pub link: String,
}

/// One roster page from the member database.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub account_id: Option<String>,
    pub display_name: Option<String>,
    /// Raw Notion number; not necessarily integral.
    pub employee_number: Option<f64>,
    pub is_former: bool,
    pub link: String,
}

impl Member {
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub score: u32,
    pub link: String,
}

#[derive(Debug, Clone)]
pub struct MatrixRow {
    pub member: Member,
    pub total_score: u32,
    pub entry_count: u32,
    /// Indexed in the same order as `Matrix::dates`.
    pub cells: Vec<Option<Cell>>,
}

#[derive(Debug, Clone)]
pub struct Matrix {
    pub dates: Vec<String>,
    pub rows: Vec<MatrixRow>,
}

impl Matrix {
    pub fn cell(&self, member_index: usize, date_index: usize) -> Option<&Cell> {
        self.rows
            .get(member_index)
            .and_then(|row| row.cells.get(date_index))
            .and_then(Option::as_ref)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberScore {
    pub employee_number: Option<f64>,
    pub name: String,
    pub total_score: u32,
    pub entry_count: u32,
}
