//! Fixed-width text table rendering.

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
}

/// Column-aligned text table. Widths follow the widest cell of each column.
#[derive(Debug, Clone, Default)]
pub struct TextTable {
    headers: Vec<String>,
    alignments: Vec<Alignment>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn new(headers: impl IntoIterator<Item = String>) -> Self {
        let headers: Vec<String> = headers.into_iter().collect();
        let alignments = vec![Alignment::Left; headers.len()];
        Self {
            headers,
            alignments,
            rows: Vec::new(),
        }
    }

    /// Sets the alignment of column `index`. Out-of-range indexes are ignored.
    pub fn align(&mut self, index: usize, alignment: Alignment) -> &mut Self {
        if let Some(slot) = self.alignments.get_mut(index) {
            *slot = alignment;
        }
        self
    }

    /// Appends one row; short rows are padded with empty cells, extra cells dropped.
    pub fn push_row(&mut self, mut cells: Vec<String>) {
        cells.resize(self.headers.len(), String::new());
        self.rows.push(cells);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        widths
    }

    fn write_line(
        &self,
        f: &mut Formatter<'_>,
        cells: &[String],
        widths: &[usize],
    ) -> std::fmt::Result {
        let mut line = String::new();
        for (index, (cell, width)) in cells.iter().zip(widths).enumerate() {
            if index > 0 {
                line.push_str("  ");
            }
            let pad = width.saturating_sub(cell.chars().count());
            match self.alignments[index] {
                Alignment::Left => {
                    line.push_str(cell);
                    line.extend(std::iter::repeat(' ').take(pad));
                }
                Alignment::Right => {
                    line.extend(std::iter::repeat(' ').take(pad));
                    line.push_str(cell);
                }
            }
        }
        writeln!(f, "{}", line.trim_end())
    }
}

impl Display for TextTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let widths = self.widths();
        self.write_line(f, &self.headers, &widths)?;
        let rule_len = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        writeln!(f, "{}", "-".repeat(rule_len))?;
        for row in &self.rows {
            self.write_line(f, row, &widths)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Alignment, TextTable};

    #[test]
    fn columns_are_padded_to_widest_cell() {
        let mut table = TextTable::new(["name".to_string(), "qty".to_string()]);
        table.align(1, Alignment::Right);
        table.push_row(vec!["water".to_string(), "12".to_string()]);
        table.push_row(vec!["gas".to_string(), "1500".to_string()]);

        let rendered = table.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "name    qty");
        assert_eq!(lines[1], "-----------");
        assert_eq!(lines[2], "water    12");
        assert_eq!(lines[3], "gas    1500");
    }

    #[test]
    fn short_rows_are_padded() {
        let mut table = TextTable::new(["a".to_string(), "b".to_string()]);
        table.push_row(vec!["x".to_string()]);
        assert_eq!(table.len(), 1);
        assert!(table.to_string().lines().nth(2).unwrap().starts_with('x'));
    }
}
