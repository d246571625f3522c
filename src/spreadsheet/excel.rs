//! Parts shared by the workbook readers: zip container setup, relationships and number formats.
use crate::error::MigrationError;
use crate::helpers::cfb::Cfb;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::WorkbookReader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use zip::ZipArchive;

const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Opens a zipped workbook and loads its sheet list and number formats.
///
/// Returns the archive, the cell type of every style index, and `(sheet name, zip path)`
/// pairs in workbook order.
pub(super) fn open<W, F>(path: &Path, load_workbook: W, load_number_formats: F) -> Result<(
    ZipArchive<WorkbookReader>,
    Vec<CellType>,
    Vec<(String, String)>
), MigrationError>
where
    W: Fn(&mut ZipArchive<WorkbookReader>) -> Result<(Vec<(String, String)>, bool), MigrationError>,
    F: Fn(&mut ZipArchive<WorkbookReader>, bool) -> Result<Vec<CellType>, MigrationError>,
{
    let file_name = path.to_string_lossy();
    let mut reader = BufReader::new(File::open(path)?);

    // Encrypted OOXML packages are wrapped in a compound file instead of a zip.
    if is_password_protected(&mut reader) {
        Err(SpreadsheetError::SpreadsheetPasswordProtectedError(file_name.to_string()))?;
    }
    reader.seek(SeekFrom::Start(0))?;

    let mut zip = ZipArchive::new(reader)?;
    let (sheets, is_1904) = load_workbook(&mut zip)?;
    if sheets.is_empty() {
        Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_string()))?
    }

    let number_formats = load_number_formats(&mut zip, is_1904)?;
    Ok((zip, number_formats, sheets))
}

/// Maps relationship ids to worksheet paths inside the archive.
pub(super) fn load_relationships(zip: &mut ZipArchive<WorkbookReader>, path: &str) -> Result<HashMap<String, String>, MigrationError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_owned()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.into_owned(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Resolves each style's number format id to a cell type, preferring custom formats.
pub(crate) fn load_number_formats(format_indexes: Vec<String>, custom_formats: HashMap<String, CellType>, is_1904: bool) -> Vec<CellType> {
    format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

/// Relationship targets are relative to `xl/` unless absolute.
pub(crate) fn to_zip_path(path: &str) -> String {
    if let Some(path) = path.strip_prefix('/') {
        path.to_owned()
    } else if path.starts_with("xl/") {
        path.to_owned()
    } else {
        format!("xl/{path}")
    }
}

fn is_password_protected(reader: &mut WorkbookReader) -> bool {
    Cfb::new(reader)
        .map(|cfb| cfb.exists("EncryptedPackage"))
        .unwrap_or(false)
}
