//! Builders for the workbook fixtures used across the test suites.

use crate::spreadsheet::cell::to_error_value;
use crate::spreadsheet::reference::index_to_reference;
use quick_xml::escape::escape;
use std::io::Cursor;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
const FREE_SECTOR: u32 = 0xFFFF_FFFF;
const FAT_SECTOR: u32 = 0xFFFF_FFFD;

const MAIN_NAMESPACE: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIP_NAMESPACE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PACKAGE_NAMESPACE: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// One cell of a fixture sheet.
#[derive(Clone, Copy, Debug)]
pub(crate) enum TestCell {
    Empty,
    /// Text stored inline in the cell record
    Label(&'static str),
    /// Text stored in the shared string table
    Shared(&'static str),
    Number(f64),
    Bool(bool),
    /// Error code as stored in BIFF8 (`0x07` is `#DIV/0!`)
    Error(u8),
}

/// Frames `content` as a BIFF8 record.
pub(crate) fn record(kind: u16, content: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(content.len() + 4);
    bytes.extend(kind.to_le_bytes());
    bytes.extend((content.len() as u16).to_le_bytes());
    bytes.extend_from_slice(content);
    bytes
}

/// Builds a version 3 compound file holding a single stream.
///
/// The stream is zero padded to the 4096 byte mini stream cutoff so it is always
/// stored in regular sectors.
pub(crate) fn compound_file(stream_name: &str, payload: &[u8]) -> Vec<u8> {
    let size = payload.len().max(4096);
    let stream_sectors = size.div_ceil(512);
    assert!(stream_sectors + 2 <= 128, "fixture stream too large for one FAT sector");

    let mut header = vec![0u8; 512];
    header[0..8].copy_from_slice(&0xE11A_B1A1_E011_CFD0u64.to_le_bytes());
    header[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
    header[26..28].copy_from_slice(&3u16.to_le_bytes());
    header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
    header[30..32].copy_from_slice(&9u16.to_le_bytes());
    header[32..34].copy_from_slice(&6u16.to_le_bytes());
    header[44..48].copy_from_slice(&1u32.to_le_bytes());
    header[48..52].copy_from_slice(&1u32.to_le_bytes());
    header[56..60].copy_from_slice(&4096u32.to_le_bytes());
    header[60..64].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[68..72].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[76..80].copy_from_slice(&0u32.to_le_bytes());
    for slot in header[80..512].chunks_exact_mut(4) {
        slot.copy_from_slice(&FREE_SECTOR.to_le_bytes());
    }

    let mut fat = vec![FREE_SECTOR; 128];
    fat[0] = FAT_SECTOR;
    fat[1] = END_OF_CHAIN;
    for sector in 2..2 + stream_sectors {
        fat[sector] = if sector + 1 < 2 + stream_sectors { sector as u32 + 1 } else { END_OF_CHAIN };
    }

    let mut directory = vec![0u8; 512];
    directory[0..128].copy_from_slice(&directory_entry("Root Entry", 5, END_OF_CHAIN, 0));
    directory[128..256].copy_from_slice(&directory_entry(stream_name, 2, 2, size));

    let mut data = header;
    data.extend(fat.iter().flat_map(|entry| entry.to_le_bytes()));
    data.extend(directory);
    data.extend_from_slice(payload);
    data.resize(512 * (3 + stream_sectors), 0);
    data
}

fn directory_entry(name: &str, kind: u8, start: u32, size: usize) -> Vec<u8> {
    let mut entry = vec![0u8; 128];
    let units: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
    for (index, unit) in units.iter().enumerate() {
        entry[index * 2..index * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    entry[64..66].copy_from_slice(&((units.len() * 2) as u16).to_le_bytes());
    entry[66] = kind;
    entry[67] = 1;
    for offset in [68, 72, 76] {
        entry[offset..offset + 4].copy_from_slice(&FREE_SECTOR.to_le_bytes());
    }
    entry[116..120].copy_from_slice(&start.to_le_bytes());
    entry[120..128].copy_from_slice(&(size as u64).to_le_bytes());
    entry
}

fn bof(kind: u16) -> Vec<u8> {
    let mut content = vec![0u8; 16];
    content[0..2].copy_from_slice(&0x0600u16.to_le_bytes());
    content[2..4].copy_from_slice(&kind.to_le_bytes());
    record(0x0809, &content)
}

/// Builds an `.xls` file with one worksheet per `(name, rows)` pair.
/// Label and shared texts must be ASCII; they are stored as compressed strings.
pub(crate) fn xls_workbook(sheets: &[(&str, Vec<Vec<TestCell>>)]) -> Vec<u8> {
    xls_workbook_with(&[], sheets)
}

/// Like [`xls_workbook`], with `globals` (framed records) placed right after the globals BOF.
pub(crate) fn xls_workbook_with(globals: &[u8], sheets: &[(&str, Vec<Vec<TestCell>>)]) -> Vec<u8> {
    let extra_globals = globals;
    let mut shared_strings: Vec<&str> = Vec::new();
    let mut substreams: Vec<Vec<u8>> = Vec::new();
    for (_, rows) in sheets {
        let mut stream = bof(0x0010);
        for (row, cells) in rows.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                let mut content = Vec::new();
                content.extend((row as u16).to_le_bytes());
                content.extend((col as u16).to_le_bytes());
                content.extend(0u16.to_le_bytes());
                let kind: u16 = match cell {
                    TestCell::Empty => continue,
                    TestCell::Label(text) => {
                        content.extend((text.len() as u16).to_le_bytes());
                        content.push(0);
                        content.extend(text.as_bytes());
                        0x0204
                    }
                    TestCell::Shared(text) => {
                        content.extend((shared_strings.len() as u32).to_le_bytes());
                        shared_strings.push(*text);
                        0x00FD
                    }
                    TestCell::Number(number) => {
                        content.extend(number.to_le_bytes());
                        0x0203
                    }
                    TestCell::Bool(value) => {
                        content.extend([*value as u8, 0]);
                        0x0205
                    }
                    TestCell::Error(code) => {
                        content.extend([*code, 1]);
                        0x0205
                    }
                };
                stream.extend(record(kind, &content));
            }
        }
        stream.extend(record(0x000A, &[]));
        substreams.push(stream);
    }

    let mut globals = bof(0x0005);
    globals.extend(extra_globals);
    if !shared_strings.is_empty() {
        let mut content = Vec::new();
        content.extend((shared_strings.len() as u32).to_le_bytes());
        content.extend((shared_strings.len() as u32).to_le_bytes());
        for text in &shared_strings {
            content.extend((text.len() as u16).to_le_bytes());
            content.push(0);
            content.extend(text.as_bytes());
        }
        globals.extend(record(0x00FC, &content));
    }
    let mut pointer_offsets = Vec::new();
    for (name, _) in sheets {
        pointer_offsets.push(globals.len() + 4);
        let mut content = vec![0u8; 6];
        content.extend([name.len() as u8, 0]);
        content.extend(name.as_bytes());
        globals.extend(record(0x0085, &content));
    }
    globals.extend(record(0x000A, &[]));

    let mut pointer = globals.len();
    for (offset, substream) in pointer_offsets.iter().zip(&substreams) {
        globals[*offset..*offset + 4].copy_from_slice(&(pointer as u32).to_le_bytes());
        pointer += substream.len();
    }
    let mut stream = globals;
    substreams.into_iter().for_each(|substream| stream.extend(substream));
    compound_file("Workbook", &stream)
}

/// Packs `(path, content)` entries into an in-memory zip archive.
pub(crate) fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Builds the parts of an `.xlsx` file with one worksheet per `(name, rows)` pair.
/// Extra parts such as `xl/styles.xml` can be appended before zipping.
pub(crate) fn xlsx_parts(sheets: &[(&str, Vec<Vec<TestCell>>)]) -> Vec<(String, String)> {
    let mut shared_strings: Vec<&str> = Vec::new();
    let mut parts: Vec<(String, String)> = Vec::new();
    let mut workbook_sheets = String::new();
    let mut relationships = String::new();
    for (index, (name, rows)) in sheets.iter().enumerate() {
        let number = index + 1;
        workbook_sheets.push_str(&format!(r#"<sheet name="{}" sheetId="{number}" r:id="rId{number}"/>"#, escape(*name)));
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{number}" Type="{RELATIONSHIP_NAMESPACE}/worksheet" Target="worksheets/sheet{number}.xml"/>"#
        ));
        let mut data = String::new();
        for (row, cells) in rows.iter().enumerate() {
            data.push_str(&format!(r#"<row r="{}">"#, row + 1));
            for (col, cell) in cells.iter().enumerate() {
                let reference = index_to_reference(row, col);
                let xml = match cell {
                    TestCell::Empty => continue,
                    TestCell::Label(text) => format!(r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#, escape(*text)),
                    TestCell::Shared(text) => {
                        shared_strings.push(*text);
                        format!(r#"<c r="{reference}" t="s"><v>{}</v></c>"#, shared_strings.len() - 1)
                    }
                    TestCell::Number(number) => format!(r#"<c r="{reference}"><v>{number}</v></c>"#),
                    TestCell::Bool(value) => format!(r#"<c r="{reference}" t="b"><v>{}</v></c>"#, *value as u8),
                    TestCell::Error(code) => format!(r#"<c r="{reference}" t="e"><v>{}</v></c>"#, to_error_value(*code)),
                };
                data.push_str(&xml);
            }
            data.push_str("</row>");
        }
        parts.push((
            format!("xl/worksheets/sheet{number}.xml"),
            format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="{MAIN_NAMESPACE}"><sheetData>{data}</sheetData></worksheet>"#),
        ));
    }

    parts.push((
        "xl/workbook.xml".to_owned(),
        format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{MAIN_NAMESPACE}" xmlns:r="{RELATIONSHIP_NAMESPACE}"><sheets>{workbook_sheets}</sheets></workbook>"#),
    ));
    parts.push((
        "xl/_rels/workbook.xml.rels".to_owned(),
        format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PACKAGE_NAMESPACE}">{relationships}</Relationships>"#),
    ));
    let items: String = shared_strings.iter().map(|text| format!("<si><t>{}</t></si>", escape(*text))).collect();
    parts.push((
        "xl/sharedStrings.xml".to_owned(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="{MAIN_NAMESPACE}" count="{0}" uniqueCount="{0}">{items}</sst>"#,
            shared_strings.len()
        ),
    ));
    parts
}

/// Zips the given parts into the bytes of an `.xlsx` file.
pub(crate) fn zip_parts(parts: &[(String, String)]) -> Vec<u8> {
    let entries: Vec<(&str, &str)> = parts.iter().map(|(name, content)| (name.as_str(), content.as_str())).collect();
    zip_archive(&entries)
}

/// Builds an `.xlsx` file with one worksheet per `(name, rows)` pair.
pub(crate) fn xlsx_workbook(sheets: &[(&str, Vec<Vec<TestCell>>)]) -> Vec<u8> {
    zip_parts(&xlsx_parts(sheets))
}

/// Rows of plain text cells: numeric strings become numbers, empty strings stay blank.
pub(crate) fn text_rows(rows: &[&[&'static str]]) -> Vec<Vec<TestCell>> {
    rows.iter()
        .map(|cells| {
            cells.iter()
                .map(|text| match text.parse::<f64>() {
                    _ if text.is_empty() => TestCell::Empty,
                    Ok(number) => TestCell::Number(number),
                    Err(_) => TestCell::Shared(*text),
                })
                .collect()
        })
        .collect()
}
