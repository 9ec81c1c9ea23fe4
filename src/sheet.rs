//! Display surface the matrix is written into, plus an in-memory grid that
//! behaves like a spreadsheet tab and can be exported as CSV or Markdown.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

use anyhow::{bail, Context};

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(i64),
    /// Raw, possibly fractional number such as a Notion number property.
    Real(f64),
    Link { url: String, label: Box<CellValue> },
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn link(url: impl Into<String>, label: CellValue) -> Self {
        CellValue::Link {
            url: url.into(),
            label: Box::new(label),
        }
    }

    /// What a spreadsheet would show in the cell.
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(text) => text.clone(),
            CellValue::Number(number) => number.to_string(),
            CellValue::Real(number) => number.to_string(),
            CellValue::Link { label, .. } => label.display(),
        }
    }

    /// Cell content as it would be typed into a spreadsheet.
    pub fn formula(&self) -> String {
        match self {
            CellValue::Link { url, label } => {
                let label = match label.as_ref() {
                    CellValue::Number(_) | CellValue::Real(_) => label.display(),
                    other => format!("\"{}\"", escape_formula(&other.display())),
                };
                format!("=HYPERLINK(\"{}\", {})", escape_formula(url), label)
            }
            other => other.display(),
        }
    }

    pub fn markdown(&self) -> String {
        match self {
            CellValue::Link { url, label } => {
                format!(
                    "[{}]({})",
                    escape_markdown(&label.display()),
                    markdown_url(url)
                )
            }
            other => escape_markdown(&other.display()),
        }
    }

    fn sort_key(&self) -> Option<f64> {
        match self {
            CellValue::Number(number) => Some(*number as f64),
            CellValue::Real(number) => Some(*number),
            CellValue::Link { label, .. } => label.sort_key(),
            _ => None,
        }
    }
}

fn escape_formula(text: &str) -> String {
    text.replace('"', "\"\"")
}

fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Angle-bracket link destination; `|` would end the table cell.
fn markdown_url(url: &str) -> String {
    let encoded = url
        .replace('|', "%7C")
        .replace('<', "%3C")
        .replace('>', "%3E");
    format!("<{encoded}>")
}

/// Rectangle of 1-based rows and columns; the first row holds filter headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterRange {
    pub first_row: usize,
    pub first_column: usize,
    pub last_row: usize,
    pub last_column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub range: FilterRange,
    pub sort: Option<(usize, bool)>,
}

/// A writable 2-D grid addressed with 1-based (row, column) coordinates.
pub trait Surface {
    fn name(&self) -> &str;
    fn clear_contents(&mut self);
    fn set_value(&mut self, row: usize, column: usize, value: CellValue);
    /// Removes the active filter, returning whether one existed.
    fn remove_filter(&mut self) -> bool;
    fn create_filter(&mut self, range: FilterRange) -> anyhow::Result<()>;
    /// Sorts the rows below the filter header by `column`.
    fn sort_filter(&mut self, column: usize, ascending: bool) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Csv,
    Markdown,
}

#[derive(Debug, Clone, Default)]
pub struct SheetGrid {
    name: String,
    cells: BTreeMap<(usize, usize), CellValue>,
    filter: Option<Filter>,
}

impl SheetGrid {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn get(&self, row: usize, column: usize) -> Option<&CellValue> {
        self.cells.get(&(row, column))
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn row_count(&self) -> usize {
        self.cells.keys().map(|(row, _)| *row).max().unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.cells.keys().map(|(_, column)| *column).max().unwrap_or(0)
    }

    /// Dense rows from A1 to the last written cell.
    pub fn rows(&self) -> Vec<Vec<CellValue>> {
        let columns = self.column_count();
        (1..=self.row_count())
            .map(|row| {
                (1..=columns)
                    .map(|column| self.get(row, column).cloned().unwrap_or(CellValue::Empty))
                    .collect()
            })
            .collect()
    }

    pub fn to_csv(&self) -> anyhow::Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        for row in self.rows() {
            writer.write_record(row.iter().map(CellValue::formula))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|err| anyhow::anyhow!("failed to flush csv: {err}"))?;
        String::from_utf8(bytes).context("csv output was not utf-8")
    }

    /// Row 1 becomes a paragraph, row 2 the table header, the rest table rows.
    pub fn to_markdown(&self) -> String {
        let rows = self.rows();
        let mut output = String::new();
        let _ = writeln!(output, "# {}", self.name);

        let mut rows = rows.into_iter();
        if let Some(first) = rows.next() {
            let text: Vec<String> = first
                .iter()
                .map(CellValue::display)
                .filter(|value| !value.is_empty())
                .collect();
            if !text.is_empty() {
                let _ = writeln!(output);
                let _ = writeln!(output, "{}", text.join(" "));
            }
        }

        if let Some(header) = rows.next() {
            let _ = writeln!(output);
            let cells: Vec<String> = header.iter().map(CellValue::markdown).collect();
            let _ = writeln!(output, "| {} |", cells.join(" | "));
            let _ = writeln!(output, "|{}", "---|".repeat(cells.len()));
            for row in rows {
                let cells: Vec<String> = row.iter().map(CellValue::markdown).collect();
                let _ = writeln!(output, "| {} |", cells.join(" | "));
            }
        }

        output
    }

    pub fn write_to(&self, path: &Path, format: OutputFormat) -> anyhow::Result<()> {
        let contents = match format {
            OutputFormat::Csv => self.to_csv()?,
            OutputFormat::Markdown => self.to_markdown(),
        };
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

impl Surface for SheetGrid {
    fn name(&self) -> &str {
        &self.name
    }

    fn clear_contents(&mut self) {
        self.cells.clear();
    }

    fn set_value(&mut self, row: usize, column: usize, value: CellValue) {
        if value == CellValue::Empty {
            self.cells.remove(&(row, column));
        } else {
            self.cells.insert((row, column), value);
        }
    }

    fn remove_filter(&mut self) -> bool {
        self.filter.take().is_some()
    }

    fn create_filter(&mut self, range: FilterRange) -> anyhow::Result<()> {
        if self.filter.is_some() {
            bail!("sheet {} already has a filter", self.name);
        }
        if range.first_row == 0
            || range.first_column == 0
            || range.last_row < range.first_row
            || range.last_column < range.first_column
        {
            bail!("invalid filter range {range:?}");
        }
        self.filter = Some(Filter { range, sort: None });
        Ok(())
    }

    fn sort_filter(&mut self, column: usize, ascending: bool) -> anyhow::Result<()> {
        let Some(filter) = self.filter.as_mut() else {
            bail!("sheet {} has no filter to sort", self.name);
        };
        let range = filter.range;
        if column < range.first_column || column > range.last_column {
            bail!("sort column {column} is outside the filter range");
        }
        filter.sort = Some((column, ascending));

        let data_rows = (range.first_row + 1)..=range.last_row;
        let mut rows: Vec<Vec<(usize, CellValue)>> = data_rows
            .clone()
            .map(|row| {
                (range.first_column..=range.last_column)
                    .filter_map(|col| self.cells.remove(&(row, col)).map(|value| (col, value)))
                    .collect()
            })
            .collect();

        let key = |row: &Vec<(usize, CellValue)>| {
            row.iter()
                .find(|(col, _)| *col == column)
                .and_then(|(_, value)| value.sort_key())
        };
        rows.sort_by(|a, b| match (key(a), key(b)) {
            (Some(a), Some(b)) if ascending => a.total_cmp(&b),
            (Some(a), Some(b)) => b.total_cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        for (row, values) in data_rows.zip(rows) {
            for (col, value) in values {
                self.cells.insert((row, col), value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored_row(grid: &mut SheetGrid, row: usize, name: &str, score: Option<i64>) {
        grid.set_value(row, 1, CellValue::text(name));
        if let Some(score) = score {
            grid.set_value(row, 2, CellValue::Number(score));
        }
    }

    #[test]
    fn link_formula_quotes_text_labels_only() {
        let numeric = CellValue::link("https://notion.so/log", CellValue::Number(3));
        assert_eq!(numeric.formula(), "=HYPERLINK(\"https://notion.so/log\", 3)");
        assert_eq!(numeric.display(), "3");

        let named = CellValue::link("https://notion.so/m", CellValue::text("Al \"Ace\""));
        assert_eq!(
            named.formula(),
            "=HYPERLINK(\"https://notion.so/m\", \"Al \"\"Ace\"\"\")"
        );
        assert_eq!(named.markdown(), "[Al \"Ace\"](<https://notion.so/m>)");
    }

    #[test]
    fn real_numbers_keep_their_fraction() {
        assert_eq!(CellValue::Real(1.5).display(), "1.5");
        assert_eq!(CellValue::Real(2.0).display(), "2");
        assert_eq!(CellValue::Real(1.5).formula(), "1.5");
        assert_eq!(
            CellValue::link("https://x", CellValue::Real(0.5)).formula(),
            "=HYPERLINK(\"https://x\", 0.5)"
        );
    }

    #[test]
    fn markdown_link_destination_survives_table_syntax() {
        let link = CellValue::link("https://x/a|b)c<d>", CellValue::Number(3));
        assert_eq!(link.markdown(), "[3](<https://x/a%7Cb)c%3Cd%3E>)");

        let mut grid = SheetGrid::new("YWT");
        grid.set_value(1, 1, CellValue::text("title"));
        grid.set_value(2, 1, CellValue::text("score"));
        grid.set_value(3, 1, link);
        let markdown = grid.to_markdown();
        let last = markdown.lines().last().expect("table row");
        assert_eq!(last, "| [3](<https://x/a%7Cb)c%3Cd%3E>) |");
        assert_eq!(last.matches('|').count(), 2);
    }

    #[test]
    fn sort_filter_reorders_data_rows_descending_and_stable() {
        let mut grid = SheetGrid::new("YWTマップ");
        grid.set_value(1, 1, CellValue::text("name"));
        grid.set_value(1, 2, CellValue::text("score"));
        scored_row(&mut grid, 2, "low", Some(1));
        scored_row(&mut grid, 3, "blank", None);
        scored_row(&mut grid, 4, "high", Some(5));
        scored_row(&mut grid, 5, "low-too", Some(1));
        grid.set_value(7, 1, CellValue::text("outside"));

        grid.create_filter(FilterRange {
            first_row: 1,
            first_column: 1,
            last_row: 5,
            last_column: 2,
        })
        .expect("filter");
        grid.sort_filter(2, false).expect("sort");

        let names: Vec<String> = (2..=5)
            .map(|row| grid.get(row, 1).map(CellValue::display).unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["high", "low", "low-too", "blank"]);
        assert_eq!(grid.get(1, 1), Some(&CellValue::text("name")));
        assert_eq!(grid.get(3, 2), Some(&CellValue::Number(1)));
        assert_eq!(grid.get(5, 2), None);
        assert_eq!(grid.get(7, 1), Some(&CellValue::text("outside")));
        assert_eq!(grid.filter().and_then(|filter| filter.sort), Some((2, false)));
    }

    #[test]
    fn filters_must_be_removed_before_recreating() {
        let mut grid = SheetGrid::new("sheet");
        let range = FilterRange {
            first_row: 1,
            first_column: 1,
            last_row: 2,
            last_column: 2,
        };
        grid.create_filter(range).expect("first filter");
        assert!(grid.create_filter(range).is_err());
        assert!(grid.remove_filter());
        assert!(!grid.remove_filter());
        grid.create_filter(range).expect("recreated");
    }

    #[test]
    fn sort_without_filter_fails() {
        let mut grid = SheetGrid::new("sheet");
        assert!(grid.sort_filter(1, true).is_err());
    }

    #[test]
    fn csv_export_fills_gaps_with_empty_cells() {
        let mut grid = SheetGrid::new("sheet");
        grid.set_value(1, 1, CellValue::text("title"));
        grid.set_value(2, 1, CellValue::Number(7));
        grid.set_value(2, 3, CellValue::link("https://x", CellValue::Number(2)));

        let csv = grid.to_csv().expect("csv");
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "title,,");
        assert_eq!(lines[1], "7,,\"=HYPERLINK(\"\"https://x\"\", 2)\"");
    }

    #[test]
    fn markdown_export_renders_header_and_links() {
        let mut grid = SheetGrid::new("YWT");
        grid.set_value(1, 1, CellValue::text("updated at: now"));
        grid.set_value(2, 1, CellValue::text("member"));
        grid.set_value(2, 2, CellValue::text("2024-05-01"));
        grid.set_value(3, 1, CellValue::link("https://m", CellValue::text("Alice")));
        grid.set_value(3, 2, CellValue::link("https://l", CellValue::Number(3)));

        let markdown = grid.to_markdown();
        assert!(markdown.starts_with("# YWT\n"));
        assert!(markdown.contains("updated at: now"));
        assert!(markdown.contains("| member | 2024-05-01 |"));
        assert!(markdown.contains("|---|---|"));
        assert!(markdown.contains("| [Alice](<https://m>) | [3](<https://l>) |"));
    }

    #[test]
    fn clear_contents_empties_the_grid() {
        let mut grid = SheetGrid::new("sheet");
        grid.set_value(3, 4, CellValue::Number(1));
        grid.clear_contents();
        assert_eq!(grid.row_count(), 0);
        assert!(grid.rows().is_empty());
    }
}
