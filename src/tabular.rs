//! # Tabular Exporter
//!
//! Writes workbook rows to delimited text and reads them back as a header row plus
//! data rows, the shape statement generation works from.
use crate::error::MigrationError;
use crate::error::ResultMessage;
use crate::spreadsheet::Workbook;
use csv::ReaderBuilder;
use csv::StringRecord;
use csv::Terminator;
use csv::WriterBuilder;
use log::debug;
use log::warn;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;

/// Writes rows 1 through `row_count()` of `workbook` to `path`, one line per row.
///
/// Fields holding the delimiter, a quote or a line break are quoted, embedded quotes
/// doubled. The file is created or truncated. Returns the number of rows written.
pub fn export<P: AsRef<Path>>(workbook: &Workbook, path: P, delimiter: u8) -> Result<usize, MigrationError> {
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(MigrationError::from)
        .with_prefix(&format!("Create '{}' failed", path.display()))?;
    let count = write(workbook, file, delimiter).with_prefix(&format!("Write '{}' failed", path.display()))?;
    debug!("Exported {} rows to '{}'", count, path.display());
    Ok(count)
}

/// Writes the rows of `workbook` to any writer.
pub fn write<W: Write>(workbook: &Workbook, writer: W, delimiter: u8) -> Result<usize, MigrationError> {
    let mut csv_writer = WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(writer);

    let mut count = 0usize;
    for index in 1..=workbook.row_count() {
        if let Some(row) = workbook.row(index) {
            csv_writer.write_record(row)?;
            count += 1;
        }
    }
    csv_writer.flush()?;
    Ok(count)
}

/// Column names taken from the first line of the delimited text, in order.
/// Names are kept as written; repeated names are not merged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HeaderRow(Vec<String>);

impl HeaderRow {
    pub fn new<I, S>(names: I) -> HeaderRow
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HeaderRow(names.into_iter().map(Into::into).collect())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One data line as (column name, value) pairs in header order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataRow {
    pairs: Vec<(String, String)>,
}

impl DataRow {
    /// Pairs `values` with the header names.
    ///
    /// Missing trailing values read as empty text; values beyond the header are dropped.
    pub fn new<S: AsRef<str>>(headers: &HeaderRow, values: &[S]) -> DataRow {
        let pairs = headers
            .names()
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let value = values.get(index).map(|value| value.as_ref().to_owned()).unwrap_or_default();
                (name.to_owned(), value)
            })
            .collect();
        DataRow { pairs }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.pairs.iter().map(|(column, _)| column.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> + '_ {
        self.pairs.iter().map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Reads delimited text whose first line is the header row.
pub struct TableReader<R: Read> {
    reader: csv::Reader<R>,
    headers: HeaderRow,
    record: StringRecord,
}

impl TableReader<File> {
    pub fn open<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<TableReader<File>, MigrationError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(MigrationError::from)
            .with_prefix(&format!("Open '{}' failed", path.display()))?;
        TableReader::from_reader(file, delimiter)
    }
}

impl<R: Read> TableReader<R> {
    pub fn from_reader(reader: R, delimiter: u8) -> Result<TableReader<R>, MigrationError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = HeaderRow::new(reader.headers()?.iter());
        Ok(TableReader { reader, headers, record: StringRecord::new() })
    }

    pub fn headers(&self) -> &HeaderRow {
        &self.headers
    }

    /// Reads the next data row, or `None` at end of input.
    pub fn next_row(&mut self) -> Result<Option<DataRow>, MigrationError> {
        if !self.reader.read_record(&mut self.record)? {
            return Ok(None);
        }
        if self.record.len() > self.headers.len() {
            let line = self.record.position().map(|position| position.line()).unwrap_or_default();
            warn!(
                "Line {} has {} fields but the header has {}; extra fields are dropped",
                line,
                self.record.len(),
                self.headers.len()
            );
        }
        let values: Vec<&str> = self.record.iter().collect();
        Ok(Some(DataRow::new(&self.headers, &values)))
    }
}

impl<R: Read> Iterator for TableReader<R> {
    type Item = Result<DataRow, MigrationError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}
