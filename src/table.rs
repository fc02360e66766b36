use std::fmt;

/// A single extracted cell. Absent cells are `None` at the row level.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
}

impl Cell {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(x) => write!(f, "{}", x),
        }
    }
}

/// One table as produced by the extractor: a header row plus data rows of
/// the same width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTableFrame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<Cell>>>,
}

impl RawTableFrame {
    pub fn new(columns: Vec<String>) -> Self {
        RawTableFrame {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<Option<Cell>>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_ref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Stacks frames in order. Columns are the union in first-seen order; a
/// frame lacking a column contributes absent cells for it.
pub fn concat(frames: &[RawTableFrame]) -> RawTableFrame {
    let mut columns: Vec<String> = Vec::new();
    for frame in frames {
        for c in &frame.columns {
            if !columns.contains(c) {
                columns.push(c.clone());
            }
        }
    }

    let mut out = RawTableFrame::new(columns);
    for frame in frames {
        let mapping: Vec<Option<usize>> = out
            .columns
            .iter()
            .map(|c| frame.column_index(c))
            .collect();
        for row in &frame.rows {
            let merged = mapping
                .iter()
                .map(|idx| idx.and_then(|i| row.get(i).cloned().flatten()))
                .collect();
            out.rows.push(merged);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Option<Cell> {
        Some(Cell::Text(s.into()))
    }

    #[test]
    fn concat_keeps_page_order() {
        let mut a = RawTableFrame::new(vec!["番号".into(), "保育所".into()]);
        a.push_row(vec![Some(Cell::Int(1)), text("A")]);
        let mut b = RawTableFrame::new(vec!["番号".into(), "保育所".into()]);
        b.push_row(vec![Some(Cell::Int(2)), text("B")]);
        b.push_row(vec![Some(Cell::Int(3)), text("C")]);

        let all = concat(&[a, b]);
        assert_eq!(all.len(), 3);
        assert_eq!(all.cell(0, "保育所"), Some(&Cell::Text("A".into())));
        assert_eq!(all.cell(2, "番号"), Some(&Cell::Int(3)));
    }

    #[test]
    fn concat_unions_columns() {
        let mut a = RawTableFrame::new(vec!["x".into()]);
        a.push_row(vec![text("1")]);
        let mut b = RawTableFrame::new(vec!["y".into(), "x".into()]);
        b.push_row(vec![text("2"), text("3")]);

        let all = concat(&[a, b]);
        assert_eq!(all.columns, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(all.cell(0, "y"), None);
        assert_eq!(all.cell(1, "x"), Some(&Cell::Text("3".into())));
        assert_eq!(all.cell(1, "y"), Some(&Cell::Text("2".into())));
    }

    #[test]
    fn push_row_pads_short_rows() {
        let mut f = RawTableFrame::new(vec!["a".into(), "b".into()]);
        f.push_row(vec![text("only")]);
        assert_eq!(f.rows[0].len(), 2);
        assert_eq!(f.cell(0, "b"), None);
    }
}
