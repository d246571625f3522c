//! # Workbook Reader
//!
//! Opens a spreadsheet file and exposes one worksheet as rows of text. Two container
//! formats are understood: the legacy binary format (`.xls`, `.xla`), a BIFF8 record
//! stream inside an OLE compound file, and the zipped XML format (`.xlsx`, `.xlsm`,
//! `.xlam`). The format is resolved once, from the file extension.
pub(crate) mod cell;
pub(crate) mod excel;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod xls;
pub(crate) mod xlsx;

#[cfg(test)]
pub(crate) mod testing;

use crate::error::MigrationError;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::xls::XlsSpreadsheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use log::debug;
use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

/// Buffered file handle the readers parse from.
pub(crate) type WorkbookReader = BufReader<File>;

/// Errors raised while opening or reading a workbook.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Workbook '{0}' not found")]
    FileNotFoundError(String),

    #[error("Unsupported workbook format '{0}': expected .xls, .xla, .xlsx, .xlsm or .xlam")]
    UnsupportedFormatError(String),

    #[error("Spreadsheet '{0}' is password protected")]
    SpreadsheetPasswordProtectedError(String),

    #[error("Spreadsheet '{0}' has no worksheets")]
    SpreadsheetEmptyError(String),

    #[error("Missing part '{0}' in workbook")]
    FileError(String),

    #[error("Sheet '{1}' not found in '{0}'")]
    SheetNotFoundError(String, String),

    #[error("Invalid cell value '{3}' at {2} in sheet '{1}' of '{0}'")]
    CellValueError(String, String, String, String),
}

/// Container format of a workbook, picked from its file extension.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkbookFormat {
    /// Excel 97-2003: BIFF8 records inside an OLE compound file
    LegacyBinary,
    /// Excel 2007+: XML parts inside a zip archive
    ZippedXml,
}

impl WorkbookFormat {
    /// Resolves the format from the extension, ignoring ASCII case.
    pub fn detect<P: AsRef<Path>>(path: P) -> Result<Self, SpreadsheetError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("xls") | Some("xla") => Ok(Self::LegacyBinary),
            Some("xlsx") | Some("xlsm") | Some("xlam") => Ok(Self::ZippedXml),
            _ => Err(SpreadsheetError::UnsupportedFormatError(path.to_string_lossy().into_owned())),
        }
    }
}

impl Display for WorkbookFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LegacyBinary => write!(f, "legacy binary"),
            Self::ZippedXml => write!(f, "zipped XML"),
        }
    }
}

/// How a worksheet is picked and read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadOptions {
    /// Worksheet to read; the first worksheet when `None`
    pub sheet: Option<String>,
    /// Read cells holding error values (`#DIV/0!`, `#N/A`, ...) as empty instead of failing
    pub errors_as_empty: bool,
}

/// Common interface of the format readers.
pub(crate) trait Spreadsheet {
    /// Worksheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    fn read_sheet(&mut self, sheet_name: &str, options: &ReadOptions) -> Result<Sheet, MigrationError>;
}

/// One worksheet of a workbook, held as rows of cell text.
#[derive(Clone, Debug, PartialEq)]
pub struct Workbook {
    name: String,
    format: WorkbookFormat,
    sheet: String,
    rows: Vec<Vec<String>>,
}

impl Workbook {
    /// Opens `path` and reads the selected worksheet.
    ///
    /// Rows run from the first sheet row through the last row holding data; each row
    /// spans the sheet's used columns, blank cells reading as empty text.
    pub fn open<P: AsRef<Path>>(path: P, options: &ReadOptions) -> Result<Workbook, MigrationError> {
        let path = path.as_ref();
        let name = path.to_string_lossy().into_owned();
        let format = WorkbookFormat::detect(path)?;
        if !path.is_file() {
            Err(SpreadsheetError::FileNotFoundError(name.to_owned()))?
        }

        let mut spreadsheet: Box<dyn Spreadsheet> = match format {
            WorkbookFormat::LegacyBinary => Box::new(XlsSpreadsheet::open(path)?),
            WorkbookFormat::ZippedXml => Box::new(XlsxSpreadsheet::open(path)?),
        };
        let sheet_names = spreadsheet.sheet_names();
        let sheet_name = match &options.sheet {
            Some(sheet_name) => sheet_name.to_owned(),
            None => sheet_names
                .first()
                .cloned()
                .ok_or_else(|| SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?,
        };
        debug!("Reading sheet '{}' of {} workbook '{}' (sheets: {:?})", sheet_name, format, name, sheet_names);

        let rows = spreadsheet.read_sheet(&sheet_name, options)?.into_rows()?;
        Ok(Workbook { name, format, sheet: sheet_name, rows })
    }

    /// Wraps rows obtained elsewhere, e.g. from a generator or a test.
    pub fn from_rows(name: &str, format: WorkbookFormat, rows: Vec<Vec<String>>) -> Workbook {
        Workbook {
            name: name.to_owned(),
            format,
            sheet: String::new(),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> WorkbookFormat {
        self.format
    }

    /// Name of the worksheet the rows come from.
    pub fn sheet_name(&self) -> &str {
        &self.sheet
    }

    /// Number of rows, counting from sheet row 1 through the last row holding data.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cells of row `index`, 1-based; `None` outside `1..=row_count()`.
    pub fn row(&self, index: usize) -> Option<&[String]> {
        index.checked_sub(1).and_then(|index| self.rows.get(index)).map(Vec::as_slice)
    }

    /// Iterates the rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[String]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }
}
