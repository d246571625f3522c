//! OLE Compound File Binary (CFB) container reader.
//! Legacy `.xls` workbooks store their BIFF8 record stream inside this container.

use crate::error::MigrationError;
use crate::helpers::bytes::to_u16;
use crate::helpers::bytes::to_u64;
use crate::helpers::bytes::to_usize;
use crate::helpers::bytes::to_usize_iter;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use thiserror::Error;

/// Sector ids at or above this value are markers (free, end of chain, FAT, DIFAT).
const MAX_REG_SECT: usize = 0xFFFF_FFFB;
const SIGNATURE: u64 = 0xE11A_B1A1_E011_CFD0;
const HEADER_SIZE: usize = 512;
const MINI_SECTOR_SIZE: usize = 64;
const MINI_STREAM_CUTOFF: usize = 4096;
const DIRECTORY_ENTRY_SIZE: usize = 128;

/// Errors specific to Compound File Binary format parsing
#[derive(Error, Debug)]
pub enum CfbError {
    #[error("The file is corrupted or has an invalid CFB structure")]
    FileFormatError,

    #[error("Invalid OLE signature (not a legacy office document?)")]
    OleSignatureError,

    #[error("Invalid sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("The number of double indirect file allocation table sectors is wrong: expect '{0}', actual '{1}'")]
    DoubleIndirectFileAllocationTableError(usize, usize),

    #[error("The number of file allocation table sectors is wrong: expect '{0}', actual '{1}'")]
    FileAllocationTableError(usize, usize),

    #[error("Broken sector chain at sector '{0}'")]
    SectorChainError(usize),

    #[error("Empty root directory")]
    RootDirectoryError,
}

/// A compound file loaded into memory, addressable by stream name.
pub(crate) struct Cfb {
    directories: HashMap<String, Directory>,
    file_allocation_table: Vec<usize>,
    sectors: Sectors,
    mini_file_allocation_table: Vec<usize>,
    mini_sectors: Sectors,
}

impl Cfb {
    /// Reads the whole container and indexes its directory entries.
    pub(crate) fn new<RS: Read + Seek>(reader: &mut RS) -> Result<Cfb, MigrationError> {
        let size = reader.seek(SeekFrom::End(0))? as usize;
        if size < HEADER_SIZE {
            Err(CfbError::FileFormatError)?;
        }
        reader.seek(SeekFrom::Start(0))?;
        let mut data = vec![0u8; size];
        reader.read_exact(&mut data)?;

        let header = Header::new(&data[..HEADER_SIZE])?;
        let sectors = Sectors { size: header.sector_size()?, data };
        let file_allocation_table = Self::load_file_allocation_table(&sectors, &header)?;
        let directories = Self::load_directories(&file_allocation_table, &sectors, header.directory_start)?;
        let mini_file_allocation_table = if header.mini_file_allocation_table_count > 0 {
            let bytes = Self::read_chain(&file_allocation_table, &sectors, header.mini_file_allocation_table_start)?;
            to_usize_iter(&bytes).collect()
        } else {
            Vec::new()
        };
        let mini_sectors = match directories.get("Root Entry") {
            Some(root) => {
                let mut data = Self::read_chain(&file_allocation_table, &sectors, root.start)?;
                data.truncate(root.size);
                Sectors { data, size: MINI_SECTOR_SIZE }
            }
            None => Sectors { data: Vec::new(), size: MINI_SECTOR_SIZE },
        };

        Ok(Cfb {
            directories,
            file_allocation_table,
            sectors,
            mini_file_allocation_table,
            mini_sectors,
        })
    }

    /// Checks if a stream exists in the container
    pub(crate) fn exists(&self, name: &str) -> bool {
        self.directories.contains_key(name)
    }

    /// Reads a whole stream, or `None` when no stream carries that name.
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>, MigrationError> {
        let Some(directory) = self.directories.get(name) else {
            return Ok(None);
        };
        let mut bytes = if directory.size < MINI_STREAM_CUTOFF {
            Self::read_mini_chain(&self.mini_file_allocation_table, &self.mini_sectors, directory.start)?
        } else {
            Self::read_chain(&self.file_allocation_table, &self.sectors, directory.start)?
        };
        bytes.truncate(directory.size);
        Ok(Some(bytes))
    }

    /// Collects the FAT by walking the header DIFAT array and any DIFAT sectors.
    fn load_file_allocation_table(sectors: &Sectors, header: &Header) -> Result<Vec<usize>, MigrationError> {
        let mut difat: Vec<usize> = to_usize_iter(&sectors.data[76..HEADER_SIZE]).collect();

        let mut count = 0usize;
        let mut index = header.difat_start;
        while index < MAX_REG_SECT {
            difat.extend(to_usize_iter(sectors.get(index)?));
            // Last entry of each DIFAT sector links to the next one.
            index = difat.pop().ok_or(CfbError::FileFormatError)?;
            count += 1;
            if count > header.difat_count {
                break;
            }
        }
        if count != header.difat_count {
            Err(CfbError::DoubleIndirectFileAllocationTableError(header.difat_count, count))?
        }

        let mut file_allocation_table = Vec::new();
        let mut count = 0usize;
        for index in difat.into_iter().filter(|index| *index < MAX_REG_SECT) {
            file_allocation_table.extend(to_usize_iter(sectors.get(index)?));
            count += 1;
        }
        if count != header.file_allocation_table_count {
            Err(CfbError::FileAllocationTableError(header.file_allocation_table_count, count))?
        }
        Ok(file_allocation_table)
    }

    fn load_directories(file_allocation_table: &[usize], sectors: &Sectors, start: usize) -> Result<HashMap<String, Directory>, MigrationError> {
        let bytes = Self::read_chain(file_allocation_table, sectors, start)?;
        let directories: HashMap<String, Directory> = bytes
            .chunks_exact(DIRECTORY_ENTRY_SIZE)
            .map(Directory::new)
            .filter(|(name, _)| !name.is_empty())
            .collect();
        if directories.is_empty() {
            Err(CfbError::RootDirectoryError)?
        }
        Ok(directories)
    }

    /// Follows a FAT chain and concatenates the visited sectors.
    fn read_chain(file_allocation_table: &[usize], sectors: &Sectors, start: usize) -> Result<Vec<u8>, MigrationError> {
        let mut content = Vec::new();
        let mut index = start;
        let mut visited = 0usize;
        while index < MAX_REG_SECT {
            content.extend_from_slice(sectors.get(index)?);
            index = *file_allocation_table.get(index).ok_or(CfbError::SectorChainError(index))?;
            visited += 1;
            if visited > file_allocation_table.len() {
                Err(CfbError::SectorChainError(index))?
            }
        }
        Ok(content)
    }

    /// Mini sectors are addressed from the start of the mini stream, without a header slot.
    fn read_mini_chain(mini_file_allocation_table: &[usize], mini_sectors: &Sectors, start: usize) -> Result<Vec<u8>, MigrationError> {
        let mut content = Vec::new();
        let mut index = start;
        let mut visited = 0usize;
        while index < MAX_REG_SECT {
            let lower = index * mini_sectors.size;
            let upper = mini_sectors.data.len().min(lower + mini_sectors.size);
            if lower >= upper {
                Err(CfbError::SectorChainError(index))?
            }
            content.extend_from_slice(&mini_sectors.data[lower..upper]);
            index = *mini_file_allocation_table.get(index).ok_or(CfbError::SectorChainError(index))?;
            visited += 1;
            if visited > mini_file_allocation_table.len() {
                Err(CfbError::SectorChainError(index))?
            }
        }
        Ok(content)
    }
}

struct Sectors {
    data: Vec<u8>,
    size: usize,
}

impl Sectors {
    /// Sector `index` lives right after the header slot.
    fn get(&self, index: usize) -> Result<&[u8], CfbError> {
        let lower = (index + 1) * self.size;
        let upper = self.data.len().min(lower + self.size);
        if lower < upper {
            Ok(&self.data[lower..upper])
        } else {
            Err(CfbError::SectorChainError(index))
        }
    }
}

struct Header {
    major_version: u16,
    sector_shift: u16,
    file_allocation_table_count: usize,
    directory_start: usize,
    mini_file_allocation_table_start: usize,
    mini_file_allocation_table_count: usize,
    difat_start: usize,
    difat_count: usize,
}

impl Header {
    fn new(data: &[u8]) -> Result<Self, MigrationError> {
        if to_u64(&data[0..8]) != SIGNATURE {
            Err(CfbError::OleSignatureError)?;
        }
        Ok(Header {
            major_version: to_u16(&data[26..28]),
            sector_shift: to_u16(&data[30..32]),
            file_allocation_table_count: to_usize(&data[44..48]),
            directory_start: to_usize(&data[48..52]),
            mini_file_allocation_table_start: to_usize(&data[60..64]),
            mini_file_allocation_table_count: to_usize(&data[64..68]),
            difat_start: to_usize(&data[68..72]),
            difat_count: to_usize(&data[72..76]),
        })
    }

    fn sector_size(&self) -> Result<usize, CfbError> {
        match (self.major_version, self.sector_shift) {
            (3, 0x0009) => Ok(512),
            // Version 4 pads the 512-byte header up to a full 4096-byte sector.
            (4, 0x000C) => Ok(4096),
            (version, shift) => Err(CfbError::SectorSizeError(version, shift)),
        }
    }
}

struct Directory {
    start: usize,
    size: usize,
}

impl Directory {
    fn new(bytes: &[u8]) -> (String, Directory) {
        let length = (to_u16(&bytes[64..66]) as usize).min(64);
        let (name, _, _) = UTF_16LE.decode(&bytes[..length]);
        let name = match name.find('\0') {
            Some(position) => name[..position].to_owned(),
            None => name.into_owned(),
        };
        let start = to_usize(&bytes[116..120]);
        let size = to_u64(&bytes[120..128]) as usize;
        (name, Directory { start, size })
    }
}
