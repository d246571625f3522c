use crate::error::MigrationError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::SpreadsheetError;

/// Cells collected from one worksheet, in the order the file stores them.
pub(crate) struct Sheet {
    /// Source file name
    pub(crate) file_name: String,
    /// Sheet name
    pub(crate) name: String,
    pub(crate) cells: Vec<Cell>,
    /// Used range, determined from the cells pushed so far
    pub(crate) row_upper_bound: Option<usize>,
    pub(crate) col_lower_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(super) fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            cells: Vec::new(),
            row_upper_bound: None,
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    pub(super) fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell and widens the used range to cover it.
    pub(super) fn push(&mut self, cell: Cell) {
        self.row_upper_bound = Some(self.row_upper_bound.map_or(cell.row, |row| row.max(cell.row)));
        self.col_lower_bound = Some(self.col_lower_bound.map_or(cell.col, |col| col.min(cell.col)));
        self.col_upper_bound = Some(self.col_upper_bound.map_or(cell.col, |col| col.max(cell.col)));
        self.cells.push(cell);
    }

    /// Lays the cells out as rows of text.
    ///
    /// Rows run from the first sheet row through the last row holding data, and every
    /// row spans the used column range, so blank cells and rows come out as empty text.
    pub(crate) fn into_rows(self) -> Result<Vec<Vec<String>>, MigrationError> {
        let (Some(row_upper), Some(col_lower), Some(col_upper)) = (self.row_upper_bound, self.col_lower_bound, self.col_upper_bound) else {
            return Ok(Vec::new());
        };
        let width = col_upper - col_lower + 1;
        let mut rows = vec![vec![String::new(); width]; row_upper + 1];
        for cell in &self.cells {
            let text = cell.text().map_err(|message| {
                SpreadsheetError::CellValueError(self.file_name.to_owned(), self.name.to_owned(), cell.reference(), message)
            })?;
            rows[cell.row][cell.col - col_lower] = text;
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellType;

    fn cell(row: usize, col: usize, kind: CellType, value: &str) -> Cell {
        Cell { row, col, kind, value: value.to_owned() }
    }

    #[test]
    fn pads_rows_across_used_columns() {
        let mut sheet = Sheet::new("book.xlsx", "Vases");
        sheet.push(cell(0, 1, CellType::InlineString, "Name"));
        sheet.push(cell(0, 2, CellType::InlineString, "Year"));
        sheet.push(cell(2, 1, CellType::InlineString, "Vase"));
        sheet.push(cell(2, 3, CellType::Number, "400"));

        let rows = sheet.into_rows().unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["Name".to_owned(), "Year".to_owned(), String::new()],
                vec![String::new(); 3],
                vec!["Vase".to_owned(), String::new(), "400".to_owned()],
            ]
        );
    }

    #[test]
    fn later_cells_overwrite_earlier_ones() {
        let mut sheet = Sheet::new("book.xls", "Vases");
        sheet.push(cell(0, 0, CellType::Number, "1"));
        sheet.push(cell(0, 0, CellType::Number, "2"));
        assert_eq!(sheet.into_rows().unwrap(), vec![vec!["2".to_owned()]]);
    }

    #[test]
    fn empty_sheet_has_no_rows() {
        let sheet = Sheet::new("book.xls", "Vases");
        assert!(sheet.is_empty());
        assert!(sheet.into_rows().unwrap().is_empty());
    }

    #[test]
    fn reports_unrenderable_cells_with_reference() {
        let mut sheet = Sheet::new("book.xls", "Vases");
        sheet.push(cell(3, 1, CellType::NumberDate1900, "soon"));
        let error = sheet.into_rows().unwrap_err();
        assert!(error.to_string().contains("B4"), "{error}");
        assert!(error.to_string().contains("Vases"), "{error}");
    }
}
