//! Plain text tables for command results.
//!
//! The main entry point is the [`Table`] struct, built from a list of items and column definitions.
use std::fmt::Display;

/// Table with a header row, printed with the [`Display`] trait.
///
/// Every column is as wide as its widest cell plus a padding of four spaces.
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Column definition: a name and a function extracting the cell value from an item.
pub type TableColumn<S, T> = (S, fn(&T) -> String);

const PADDING: usize = 4;

impl Table {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    /// Create a table with one row per item.
    pub fn from_iter<'a, S, Iter, Item>(iter: Iter, columns: &[TableColumn<S, Item>]) -> Self
    where
        S: Display,
        Iter: IntoIterator<Item = &'a Item>,
        Item: 'a,
    {
        let header = columns.iter().map(|(name, _)| name.to_string()).collect();
        let rows = iter
            .into_iter()
            .map(|item| columns.iter().map(|(_, cell)| cell(item)).collect())
            .collect();

        Self::new(header, rows)
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.header.iter().map(|cell| cell.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        widths.into_iter().map(|width| width + PADDING).collect()
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let widths = self.column_widths();

        for row in std::iter::once(&self.header).chain(&self.rows) {
            for (cell, width) in row.iter().zip(&widths) {
                write!(f, "{cell:<width$}")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Part {
        id: &'static str,
        size: u64,
    }

    fn columns() -> [TableColumn<&'static str, Part>; 2] {
        [
            ("ID", |p: &Part| p.id.to_string()),
            ("SIZE", |p: &Part| p.size.to_string()),
        ]
    }

    #[test]
    fn test_columns_fit_their_widest_cell() {
        let parts = [
            Part {
                id: "app.mtar.part.0",
                size: 4,
            },
            Part {
                id: "dev.mtaext",
                size: 104857600,
            },
        ];

        let table = Table::from_iter(&parts, &columns());

        assert_eq!(
            table.to_string(),
            "ID                 SIZE         \n\
             app.mtar.part.0    4            \n\
             dev.mtaext         104857600    \n"
        );
    }

    #[test]
    fn test_header_only() {
        let table = Table::from_iter(&[], &columns());

        assert_eq!(table.to_string(), "ID    SIZE    \n");
    }
}
