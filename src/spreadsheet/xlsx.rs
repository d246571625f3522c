use crate::error::MigrationError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::ReadOptions;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::WorkbookReader;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use zip::ZipArchive;

// XML tag names of the workbook parts
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");
const TAG_FORMAT_INDEX: QName = QName(b"xf");
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");       // Phonetic reading, not part of the text
const TAG_TEXT: QName = QName(b"t");
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

/// Reader for Excel 2007+ workbooks (`.xlsx`, `.xlsm`, `.xlam`).
pub(crate) struct XlsxSpreadsheet {
    /// File name used in error messages
    pub(crate) name: String,
    zip: ZipArchive<WorkbookReader>,
    /// Cell type of each `cellXfs` style index
    number_formats: Vec<CellType>,
    /// Worksheets as (name, zip path) pairs
    sheets: Vec<(String, String)>,
    shared_strings: Vec<String>,
}

impl XlsxSpreadsheet {
    /// Opens an XLSX file and loads the workbook, styles and shared strings parts.
    pub(crate) fn open(path: &Path) -> Result<XlsxSpreadsheet, MigrationError> {
        let (mut zip, number_formats, sheets) = excel::open(path, load_workbook, load_number_formats)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        Ok(XlsxSpreadsheet {
            name: path.to_string_lossy().into_owned(),
            zip,
            number_formats,
            sheets,
            shared_strings,
        })
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    fn read_sheet(&mut self, sheet_name: &str, options: &ReadOptions) -> Result<Sheet, MigrationError> {
        let zip_path = self.sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, zip_path)| zip_path.to_owned())
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(self.name.to_owned(), sheet_name.to_owned()))?;

        let mut sheet = Sheet::new(&self.name, sheet_name);
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut is_shared = false;
        let mut value = String::new();
        let mut reader = self.zip.xml_reader(&zip_path)?
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                // Rows without an `r` attribute follow the previous one.
                row_count = match event.get_attribute_value("r")? {
                    Some(number) => number.parse::<usize>()?.saturating_sub(1),
                    None => row_count,
                };
                col_count = 0;
            }
            Event::End(event) if event.name() == TAG_ROW => row_count += 1,
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row_count, col_count));
                col_count = col + 1;
                is_shared = false;
                value.clear();
                kind = match event.get_attribute_value("t")?.as_deref() {
                    Some("inlineStr") | Some("str") => CellType::InlineString,
                    Some("s") => {
                        is_shared = true;
                        CellType::InlineString
                    }
                    Some("d") => CellType::IsoDateTime,
                    Some("b") => CellType::Boolean,
                    Some("e") => CellType::Error,
                    _ => CellType::Number,
                };
                if let Some(format_id) = event.get_attribute_value("s")? {
                    if kind == CellType::Number && !format_id.is_empty() {
                        let index = format_id.parse::<usize>()?;
                        kind = self.number_formats.get(index).copied().unwrap_or(CellType::Number);
                    }
                }
            }
            Event::Start(event) if event.name() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if event.name() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if event.name() == TAG_CELL => {
                if is_shared && !value.is_empty() {
                    let index = value.trim().parse::<usize>()?;
                    value = self.shared_strings.get(index)
                        .ok_or_else(|| SpreadsheetError::FileError(format!("xl/sharedStrings.xml item {index}")))?
                        .to_owned();
                }
                // Normalize number text ("1E-3", "4.0E2") to the shortest decimal form.
                if kind == CellType::Number {
                    if let Ok(number) = value.trim().parse::<f64>() {
                        value = number.to_string();
                    }
                }
                if kind == CellType::Error {
                    if !options.errors_as_empty {
                        Err(SpreadsheetError::CellValueError(
                            sheet.file_name.to_owned(),
                            sheet.name.to_owned(),
                            index_to_reference(row, col),
                            value.to_owned(),
                        ))?
                    }
                } else if !value.is_empty() {
                    sheet.push(Cell { row, col, kind, value: value.to_owned() });
                }
                value.clear();
            }
        });
        Ok(sheet)
    }
}

/// Reads sheet names and paths from `xl/workbook.xml`, plus the date system flag.
fn load_workbook(zip: &mut ZipArchive<WorkbookReader>) -> Result<(Vec<(String, String)>, bool), MigrationError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_owned()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.into_owned(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value == "1" || value == "true")
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Reads custom number formats and the `cellXfs` style list from `xl/styles.xml`.
fn load_number_formats(zip: &mut ZipArchive<WorkbookReader>, is_1904: bool) -> Result<Vec<CellType>, MigrationError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id.into_owned(), CellType::parse_custom_number_format(&format, is_1904));
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let id = event.get_attribute_value("numFmtId")?;
            format_indexes.push(id.map(Cow::into_owned).unwrap_or_else(|| "0".to_owned()));
        }
    });

    Ok(excel::load_number_formats(format_indexes, custom_formats, is_1904))
}

fn load_shared_strings(zip: &mut ZipArchive<WorkbookReader>) -> Result<Vec<String>, MigrationError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Collects the text up to `end_tag`, skipping phonetic runs.
///
/// Rich text keeps its characters in `<t>` children; `is_text_content` marks elements
/// such as `<v>` whose own content is the text.
fn read_string_value<R: BufRead>(reader: &mut XmlReader<R>, end_tag: QName, is_text_content: bool) -> Result<String, MigrationError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::testing::text_rows;
    use crate::spreadsheet::testing::xlsx_parts;
    use crate::spreadsheet::testing::xlsx_workbook;
    use crate::spreadsheet::testing::zip_archive;
    use crate::spreadsheet::testing::zip_parts;
    use crate::spreadsheet::testing::TestCell;
    use std::path::PathBuf;

    fn write(directory: &tempfile::TempDir, bytes: Vec<u8>) -> PathBuf {
        let path = directory.path().join("book.xlsx");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn reads_shared_inline_and_typed_cells() {
        let directory = tempfile::tempdir().unwrap();
        let path = write(&directory, xlsx_workbook(&[(
            "Vases",
            vec![
                vec![TestCell::Shared("Name"), TestCell::Label("Year"), TestCell::Label("Glazed")],
                vec![TestCell::Shared("Vase & lid"), TestCell::Number(400.0), TestCell::Bool(true)],
                vec![TestCell::Empty, TestCell::Number(12.25), TestCell::Bool(false)],
            ],
        )]));

        let mut spreadsheet = XlsxSpreadsheet::open(&path).unwrap();
        assert_eq!(spreadsheet.sheet_names(), vec!["Vases"]);
        let rows = spreadsheet.read_sheet("Vases", &ReadOptions::default()).unwrap().into_rows().unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["Name", "Year", "Glazed"],
                vec!["Vase & lid", "400", "true"],
                vec!["", "12.25", "false"],
            ]
        );
    }

    #[test]
    fn normalizes_number_text() {
        let mut parts = xlsx_parts(&[("Weights", vec![vec![TestCell::Number(0.001), TestCell::Number(400.0), TestCell::Number(2.5)]])]);
        let sheet = parts.iter_mut().find(|(name, _)| name == "xl/worksheets/sheet1.xml").unwrap();
        sheet.1 = sheet.1
            .replace("<v>0.001</v>", "<v>1E-3</v>")
            .replace("<v>400</v>", "<v>4.0E2</v>")
            .replace("<v>2.5</v>", "<v>2.50</v>");
        let directory = tempfile::tempdir().unwrap();
        let path = write(&directory, zip_parts(&parts));

        let mut spreadsheet = XlsxSpreadsheet::open(&path).unwrap();
        let rows = spreadsheet.read_sheet("Weights", &ReadOptions::default()).unwrap().into_rows().unwrap();
        assert_eq!(rows, vec![vec!["0.001", "400", "2.5"]]);
    }

    #[test]
    fn selects_sheets_by_name() {
        let directory = tempfile::tempdir().unwrap();
        let path = write(&directory, xlsx_workbook(&[
            ("Vases", text_rows(&[&["Name"], &["Vase"]])),
            ("Coins", text_rows(&[&["Name", "Weight"], &["Obol", "0.72"]])),
        ]));

        let mut spreadsheet = XlsxSpreadsheet::open(&path).unwrap();
        assert_eq!(spreadsheet.sheet_names(), vec!["Vases", "Coins"]);
        let rows = spreadsheet.read_sheet("Coins", &ReadOptions::default()).unwrap().into_rows().unwrap();
        assert_eq!(rows, vec![vec!["Name", "Weight"], vec!["Obol", "0.72"]]);
        assert!(spreadsheet.read_sheet("Maps", &ReadOptions::default()).is_err());
    }

    #[test]
    fn applies_date_styles_and_the_1904_system() {
        let mut parts = xlsx_parts(&[(
            "Dates",
            vec![vec![TestCell::Number(0.0), TestCell::Number(1.5)]],
        )]);
        // Style both cells: the first with a built-in date, the second with a custom date-time format.
        let sheet = parts.iter_mut().find(|(name, _)| name == "xl/worksheets/sheet1.xml").unwrap();
        sheet.1 = sheet.1.replace(r#"<c r="A1">"#, r#"<c r="A1" s="1">"#).replace(r#"<c r="B1">"#, r#"<c r="B1" s="2">"#);
        let workbook = parts.iter_mut().find(|(name, _)| name == "xl/workbook.xml").unwrap();
        workbook.1 = workbook.1.replace("<sheets>", r#"<workbookPr date1904="1"/><sheets>"#);
        parts.push((
            "xl/styles.xml".to_owned(),
            concat!(
                r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
                r#"<numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd hh:mm"/></numFmts>"#,
                r#"<cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="14"/><xf numFmtId="164"/></cellXfs>"#,
                r#"</styleSheet>"#,
            ).to_owned(),
        ));
        let directory = tempfile::tempdir().unwrap();
        let path = write(&directory, zip_parts(&parts));

        let mut spreadsheet = XlsxSpreadsheet::open(&path).unwrap();
        let rows = spreadsheet.read_sheet("Dates", &ReadOptions::default()).unwrap().into_rows().unwrap();
        assert_eq!(rows, vec![vec!["1904-01-01", "1904-01-02 12:00:00"]]);
    }

    #[test]
    fn error_cells_fail_unless_read_as_empty() {
        let directory = tempfile::tempdir().unwrap();
        let path = write(&directory, xlsx_workbook(&[(
            "Vases",
            vec![vec![TestCell::Label("Ratio"), TestCell::Error(0x07)]],
        )]));

        let mut spreadsheet = XlsxSpreadsheet::open(&path).unwrap();
        let error = spreadsheet.read_sheet("Vases", &ReadOptions::default()).err().expect("error cell");
        assert!(error.to_string().contains("#DIV/0!"), "{error}");
        assert!(error.to_string().contains("B1"), "{error}");

        let options = ReadOptions { errors_as_empty: true, ..ReadOptions::default() };
        let rows = spreadsheet.read_sheet("Vases", &options).unwrap().into_rows().unwrap();
        assert_eq!(rows, vec![vec!["Ratio"]]);
    }

    #[test]
    fn rich_text_skips_phonetic_runs() {
        let mut parts = xlsx_parts(&[("Names", vec![vec![TestCell::Shared("placeholder")]])]);
        let shared = parts.iter_mut().find(|(name, _)| name == "xl/sharedStrings.xml").unwrap();
        shared.1 = concat!(
            r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
            r#"<si><r><t>Taranto </t></r><r><t xml:space="preserve">ware</t></r><rPh><t>ignored</t></rPh></si>"#,
            r#"</sst>"#,
        ).to_owned();
        let directory = tempfile::tempdir().unwrap();
        let path = write(&directory, zip_parts(&parts));

        let mut spreadsheet = XlsxSpreadsheet::open(&path).unwrap();
        let rows = spreadsheet.read_sheet("Names", &ReadOptions::default()).unwrap().into_rows().unwrap();
        assert_eq!(rows, vec![vec!["Taranto ware"]]);
    }

    #[test]
    fn missing_workbook_part_is_reported() {
        let directory = tempfile::tempdir().unwrap();
        let path = write(&directory, zip_archive(&[("xl/_rels/workbook.xml.rels", "<Relationships/>")]));
        let error = XlsxSpreadsheet::open(&path).err().expect("missing part");
        assert!(matches!(error, MigrationError::SpreadsheetError(SpreadsheetError::FileError(_))));
    }
}
