use crate::error::MigrationError;
use crate::error::ResultOptionChain;
use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::Cfb;
use crate::match_biff8_record;
use crate::spreadsheet::cell::to_error_value;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel::load_number_formats;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::ReadOptions;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use either::Either;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

// BIFF8 record type identifiers
const FORMULA: u16 = 6;        // Formula with its cached result
const EOF: u16 = 10;           // End of a substream
const DATE1904: u16 = 34;      // Date system flag (1904 vs 1900 base)
const FILE_PASS: u16 = 47;     // Password protection
const BOUND_SHEET8: u16 = 133; // Sheet name, kind and substream position
const ARRAY: u16 = 545;        // Array formula body after its FORMULA record
const TABLE: u16 = 566;        // Data table body after its FORMULA record
const SHR_FMLA: u16 = 1212;    // Shared formula body after its FORMULA record
const MUL_RK: u16 = 189;       // Run of RK numbers in one row
const XF: u16 = 224;           // Cell style, carrying the number format id
const SST: u16 = 252;          // Shared string table
const LABEL_SST: u16 = 253;    // Text cell referencing the shared string table
const NUMBER: u16 = 515;       // Floating point cell
const LABEL: u16 = 516;        // Text cell with an inline string
const BOOL_ERR: u16 = 517;     // Boolean or error cell
const STRING: u16 = 519;       // Text result of the preceding formula
const RK: u16 = 638;           // Compressed number cell
const FORMAT: u16 = 1054;      // Custom number format
const BOF: u16 = 2057;         // Beginning of a substream

/// `dt` value of BOUNDSHEET8 for worksheets (others are charts and macro sheets).
const SHEET_TYPE_WORKSHEET: u8 = 0;

/// Error types specific to XLS file parsing
#[derive(Error, Debug)]
pub enum XlsError {
    #[error("Invalid Formula value '{0}'")]
    FormulaValueError(u64),

    #[error("Shared string index '{0}' is out of range")]
    SharedStringIndexError(usize),
}

/// Reader for Excel 97-2003 workbooks.
pub(crate) struct XlsSpreadsheet {
    /// File name used in error messages
    pub(crate) name: String,
    reader: Biff8Reader,
    shared_strings: Vec<String>,
    /// Cell type of each XF index
    number_formats: Vec<CellType>,
    /// Worksheets with their substream positions
    sheets: Vec<(String, usize)>,
}

impl XlsSpreadsheet {
    /// Opens an XLS file and reads the workbook globals substream.
    pub(crate) fn open(path: &Path) -> Result<XlsSpreadsheet, MigrationError> {
        let file_name = path.to_string_lossy().into_owned();
        let mut buf_reader = BufReader::new(File::open(path)?);
        let cfb = Cfb::new(&mut buf_reader)?;
        let mut reader = cfb.read("Workbook")
            .ok_none_else(|| cfb.read("Book"))?
            .map(Biff8Reader::new)
            .ok_or_else(|| SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?;
        let mut is_1904 = false;
        let mut shared_strings = Vec::new();
        let mut custom_formats: HashMap<String, CellType> = HashMap::new();
        let mut format_indexes: Vec<String> = Vec::new();
        let mut sheets: Vec<(String, usize)> = Vec::new();
        match_biff8_record!(reader => {
            EOF => break,
            FILE_PASS => Err(SpreadsheetError::SpreadsheetPasswordProtectedError(file_name.to_owned()))?,
            DATE1904 if reader.read_u16()? == 1 => is_1904 = true,
            FORMAT => {
                let id = reader.read_u16()?;
                let format = reader.read_xl_unicode_string()?;
                custom_formats.insert(id.to_string(), CellType::parse_custom_number_format(&format, is_1904));
            }
            XF => {
                reader.skip(2)?;
                let id = reader.read_u16()?;
                format_indexes.push(id.to_string());
            }
            SST => shared_strings = load_shared_strings(&mut reader)?,
            BOUND_SHEET8 => {
                let pointer = reader.read_usize()?;
                reader.skip(1)?;
                let sheet_type = reader.read_u8()?;
                let sheet_name = reader.read_short_xl_unicode_string()?;
                if sheet_type == SHEET_TYPE_WORKSHEET {
                    sheets.push((sheet_name, pointer));
                }
            }
        });
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?
        }

        // FORMAT records may precede DATE1904, so resolve the epoch once everything is read.
        if is_1904 {
            for kind in custom_formats.values_mut() {
                *kind = to_1904(*kind);
            }
        }
        let number_formats = load_number_formats(format_indexes, custom_formats, is_1904);

        Ok(XlsSpreadsheet {
            name: file_name,
            reader,
            shared_strings,
            number_formats,
            sheets,
        })
    }

    fn number_format(&self, index: usize) -> CellType {
        self.number_formats.get(index).copied().unwrap_or(CellType::Number)
    }
}

impl Spreadsheet for XlsSpreadsheet {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Walks the sheet substream and collects every cell record.
    fn read_sheet(&mut self, sheet_name: &str, options: &ReadOptions) -> Result<Sheet, MigrationError> {
        let pointer = self.sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, pointer)| *pointer)
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(self.name.to_owned(), sheet_name.to_owned()))?;

        self.reader.goto(pointer);
        self.reader.next()?;
        let mut sheet = Sheet::new(&self.name, sheet_name);
        while let Some(tag) = self.reader.next()? {
            match tag {
                BOF | EOF => break,
                MUL_RK => {
                    let row = self.reader.read_u16()? as usize;
                    let col_lower_bound = self.reader.read_u16()? as usize;
                    let col_upper_bound = self.reader.get_u16_back(2)? as usize;
                    for col in col_lower_bound..=col_upper_bound {
                        let index = self.reader.read_u16()? as usize;
                        let kind = self.number_format(index);
                        let value = self.reader.read_rk_number()?;
                        sheet.push(Cell { row, col, kind, value });
                    }
                }
                BOOL_ERR | NUMBER | RK | LABEL_SST | LABEL | FORMULA => {
                    let row = self.reader.read_u16()? as usize;
                    let col = self.reader.read_u16()? as usize;
                    let (either, value) = match tag {
                        BOOL_ERR => read_bool_or_error_cell(&mut self.reader)?,
                        NUMBER => read_number_cell(&mut self.reader)?,
                        RK => read_rk_cell(&mut self.reader)?,
                        LABEL_SST => read_label_sst_cell(&mut self.reader, &self.shared_strings)?,
                        LABEL => read_label_cell(&mut self.reader)?,
                        _ => read_formula_cell(&mut self.reader)?,
                    };
                    let kind = match either {
                        Either::Left(kind) => kind,
                        Either::Right(index) => self.number_format(index),
                    };
                    if kind != CellType::Error {
                        if !value.is_empty() {
                            sheet.push(Cell { row, col, kind, value });
                        }
                    } else if !options.errors_as_empty {
                        Err(SpreadsheetError::CellValueError(
                            sheet.file_name.to_owned(),
                            sheet.name.to_owned(),
                            index_to_reference(row, col),
                            value,
                        ))?
                    }
                }
                _ => (),
            }
        }
        Ok(sheet)
    }
}

fn to_1904(kind: CellType) -> CellType {
    match kind {
        CellType::NumberDateTime1900 => CellType::NumberDateTime1904,
        CellType::NumberDate1900 => CellType::NumberDate1904,
        CellType::NumberTime1900 => CellType::NumberTime1904,
        kind => kind,
    }
}

fn load_shared_strings(reader: &mut Biff8Reader) -> Result<Vec<String>, MigrationError> {
    let mut shared_strings: Vec<String> = Vec::new();
    reader.skip(4)?;
    let count = reader.read_usize()?;
    for _ in 0..count {
        shared_strings.push(reader.read_xl_unicode_rich_extended_string()?);
    }
    Ok(shared_strings)
}

/// BOOL_ERR stores a boolean or an error code, told apart by a flag byte.
fn read_bool_or_error_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), MigrationError> {
    reader.skip(2)?;
    let value = reader.read_u8()?;
    let flag = reader.read_u8()?;
    if flag == 0 {
        Ok((Either::Left(CellType::Boolean), value.to_string()))
    } else {
        Ok((Either::Left(CellType::Error), to_error_value(value).to_owned()))
    }
}

fn read_number_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), MigrationError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_f64()?;
    Ok((Either::Right(index), value.to_string()))
}

fn read_rk_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), MigrationError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_rk_number()?;
    Ok((Either::Right(index), value))
}

fn read_label_sst_cell(reader: &mut Biff8Reader, shared_strings: &[String]) -> Result<(Either<CellType, usize>, String), MigrationError> {
    reader.skip(2)?;
    let index = reader.read_usize()?;
    let value = shared_strings.get(index).ok_or(XlsError::SharedStringIndexError(index))?;
    Ok((Either::Left(CellType::InlineString), value.to_owned()))
}

fn read_label_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), MigrationError> {
    reader.skip(2)?;
    let value = reader.read_xl_unicode_string()?;
    Ok((Either::Left(CellType::InlineString), value))
}

/// Reads the cached result of a formula.
///
/// A result whose top two bytes are `0xFFFF` is not a number: the low byte tells
/// string, boolean, error or empty string apart. A string result follows in a STRING
/// record, possibly after the body of a shared, array or table formula.
fn read_formula_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), MigrationError> {
    let index = reader.read_u16()? as usize;
    let formula = reader.read_u64()?;
    let is_number = (formula & 0xFFFF000000000000) != 0xFFFF000000000000;
    let flag = formula & 0xFF;
    if is_number {
        Ok((Either::Right(index), f64::from_bits(formula).to_string()))
    } else if flag == 0 {
        loop {
            match reader.next()? {
                Some(SHR_FMLA) | Some(ARRAY) | Some(TABLE) => continue,
                Some(STRING) => return Ok((Either::Left(CellType::InlineString), reader.read_xl_unicode_string()?)),
                _ => Err(XlsError::FormulaValueError(formula))?,
            }
        }
    } else if flag == 1 {
        let value = if (formula & 0xFF0000) > 0 { "1" } else { "0" };
        Ok((Either::Left(CellType::Boolean), value.to_owned()))
    } else if flag == 2 {
        let code = ((formula >> 16) & 0xFF) as u8;
        Ok((Either::Left(CellType::Error), to_error_value(code).to_owned()))
    } else if flag == 3 {
        Ok((Either::Left(CellType::InlineString), String::new()))
    } else {
        Err(XlsError::FormulaValueError(formula))?
    }
}
