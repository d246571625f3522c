//! Low-level readers for the two workbook containers: OLE compound files
//! carrying BIFF8 records, and zip archives carrying XML parts.

pub(crate) mod biff8;
pub(crate) mod bytes;
pub(crate) mod cfb;
pub(crate) mod xml;
pub(crate) mod zip;
