use thiserror::Error;

/// Main error type for the migration pipeline.
/// Aggregates errors from the standard library, dependencies and every internal module.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    // Third-party library errors
    #[error("{0}")]
    CsvError(#[from] csv::Error),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    CfbHelperError(#[from] crate::helpers::cfb::CfbError),

    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    Biff8HelperError(#[from] crate::helpers::biff8::Biff8Error),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    XlsError(#[from] crate::spreadsheet::xls::XlsError),

    // Pipeline module errors
    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("{0}")]
    DatabaseError(#[from] crate::database::DatabaseError),
}

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, MigrationError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| MigrationError::WithContextError(format!("{}: {}", message, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_prefix_wraps_message() {
        let result: Result<(), MigrationError> = Err(std::io::Error::other("disk full").into());
        let error = result.with_prefix("Write 'out.csv' failed").unwrap_err();
        assert_eq!(error.to_string(), "Write 'out.csv' failed: disk full");
    }

    #[test]
    fn ok_none_else_falls_through_only_on_none() {
        let first: Result<Option<u8>, ()> = Ok(None);
        assert_eq!(first.ok_none_else(|| Ok(Some(2))), Ok(Some(2)));
        let second: Result<Option<u8>, ()> = Ok(Some(1));
        assert_eq!(second.ok_none_else(|| Ok(Some(2))), Ok(Some(1)));
    }
}
