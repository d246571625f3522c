//! Binary Interchange File Format (BIFF8) record reader.
//! Walks the record stream of an Excel 97-2003 workbook, stitching CONTINUE
//! records onto the record they extend.

use crate::error::MigrationError;
use crate::helpers::bytes::to_f64;
use crate::helpers::bytes::to_u16;
use crate::helpers::bytes::to_u32;
use crate::helpers::bytes::to_u64;
use crate::helpers::bytes::to_usize;
use encoding_rs::UTF_16LE;
use thiserror::Error;

const CONTINUE: u16 = 60;

/// Errors specific to BIFF8 format parsing
#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("Fewer than {0} bytes remaining in record")]
    NoEnoughDataError(usize),
}

/// Cursor over a BIFF8 stream.
pub(crate) struct Biff8Reader {
    buffer: Vec<u8>,
    pointer: usize,
    /// Byte ranges of the current record and its CONTINUE records
    chunks: Vec<(usize, usize)>,
    index: usize,
    offset: usize,
}

impl Biff8Reader {
    pub(crate) fn new(data: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            buffer: data,
            pointer: 0,
            chunks: Vec::new(),
            index: 0,
            offset: 0,
        }
    }

    /// Advances to the next record and returns its type, or `None` at end of stream.
    pub(crate) fn next(&mut self) -> Result<Option<u16>, MigrationError> {
        if self.pointer + 4 > self.buffer.len() {
            return Ok(None);
        }
        self.index = 0;
        self.offset = 0;
        self.chunks.clear();

        let kind = self.get_u16_at(self.pointer)?;
        self.push_chunk()?;
        while self.pointer + 4 <= self.buffer.len() && self.get_u16_at(self.pointer)? == CONTINUE {
            self.push_chunk()?;
        }
        Ok(Some(kind))
    }

    fn push_chunk(&mut self) -> Result<(), MigrationError> {
        let size = self.get_u16_at(self.pointer + 2)? as usize;
        let lower = self.pointer + 4;
        let upper = (lower + size).min(self.buffer.len());
        self.pointer = upper;
        self.chunks.push((lower, upper));
        Ok(())
    }

    /// Moves the cursor to an absolute stream offset (sheet substreams start there).
    pub(crate) fn goto(&mut self, pointer: usize) {
        self.pointer = pointer;
    }

    fn read_exact(&mut self, length: usize) -> Result<&[u8], MigrationError> {
        let (data, size) = self.read(length);
        if size == length {
            Ok(data)
        } else {
            Err(Biff8Error::NoEnoughDataError(length))?
        }
    }

    /// Reads up to `length` bytes without crossing into the next chunk.
    fn read(&mut self, length: usize) -> (&[u8], usize) {
        if let Some((lower, upper)) = self.chunks.get(self.index).copied() {
            let source = upper.min(lower + self.offset);
            let target = upper.min(source + length);
            if source < upper {
                if target == upper {
                    self.index += 1;
                    self.offset = 0;
                } else {
                    self.offset += target - source;
                }
                return (&self.buffer[source..target], target - source);
            }
        }
        (&[], 0)
    }

    /// Skips `length` bytes, crossing into CONTINUE records when needed.
    pub(crate) fn skip(&mut self, length: usize) -> Result<(), MigrationError> {
        let mut remaining = length;
        while remaining > 0 {
            let (_, size) = self.read(remaining);
            if size == 0 {
                Err(Biff8Error::NoEnoughDataError(remaining))?
            }
            remaining -= size;
        }
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, MigrationError> {
        self.read_exact(1).map(|data| data[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, MigrationError> {
        self.read_exact(2).map(to_u16)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, MigrationError> {
        self.read_exact(4).map(to_u32)
    }

    pub(crate) fn read_usize(&mut self) -> Result<usize, MigrationError> {
        self.read_exact(4).map(to_usize)
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, MigrationError> {
        self.read_exact(8).map(to_u64)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, MigrationError> {
        self.read_exact(8).map(to_f64)
    }

    /// Reads a u16 located `offset` bytes before the end of the current record.
    pub(crate) fn get_u16_back(&self, offset: usize) -> Result<u16, MigrationError> {
        let mut offset = offset;
        for (lower, upper) in self.chunks.iter().rev() {
            if *lower + offset <= *upper {
                return self.get_u16_at(*upper - offset);
            }
            offset -= *upper - *lower;
        }
        Err(Biff8Error::NoEnoughDataError(2))?
    }

    fn get_u16_at(&self, index: usize) -> Result<u16, MigrationError> {
        if index + 2 <= self.buffer.len() {
            Ok(to_u16(&self.buffer[index..index + 2]))
        } else {
            Err(Biff8Error::NoEnoughDataError(2))?
        }
    }

    /// Decodes an RK value: a 30-bit integer or the high bits of a double, optionally divided by 100.
    pub(crate) fn read_rk_number(&mut self) -> Result<String, MigrationError> {
        let value = self.read_u32()?;
        let is_percentage = value & 0x01 != 0;
        let is_integer = value & 0x02 != 0;
        let number = if is_integer {
            ((value as i32) >> 2) as f64
        } else {
            f64::from_bits(((value >> 2) as u64) << 34)
        };
        let number = if is_percentage { number / 100.0 } else { number };
        Ok(if is_integer && !is_percentage {
            (number as i64).to_string()
        } else {
            number.to_string()
        })
    }

    /// ShortXLUnicodeString: 1-byte character count.
    pub(crate) fn read_short_xl_unicode_string(&mut self) -> Result<String, MigrationError> {
        let chars = self.read_u8()? as usize;
        let flag = self.read_u8()?;
        let mut string = String::new();
        self.read_characters_into(chars, flag, &mut string)?;
        Ok(string)
    }

    /// XLUnicodeString: 2-byte character count.
    pub(crate) fn read_xl_unicode_string(&mut self) -> Result<String, MigrationError> {
        let chars = self.read_u16()? as usize;
        let flag = self.read_u8()?;
        let mut string = String::new();
        self.read_characters_into(chars, flag, &mut string)?;
        Ok(string)
    }

    /// XLUnicodeRichExtendedString as stored in the SST.
    ///
    /// The formatting runs and the phonetic block follow the last character, so they
    /// are skipped only once the whole string has been read.
    pub(crate) fn read_xl_unicode_rich_extended_string(&mut self) -> Result<String, MigrationError> {
        let chars = self.read_u16()? as usize;
        let flag = self.read_u8()?;
        let rich_runs = if flag & 0x08 != 0 {
            self.read_u16()? as usize
        } else {
            0
        };
        let phonetic_size = if flag & 0x04 != 0 {
            self.read_usize()?
        } else {
            0
        };
        let mut string = String::new();
        self.read_characters_into(chars, flag, &mut string)?;
        self.skip(4 * rich_runs)?;
        self.skip(phonetic_size)?;
        Ok(string)
    }

    /// Appends `chars` characters. Each CONTINUE record the characters spill into
    /// starts with its own flag byte.
    fn read_characters_into(&mut self, chars: usize, flag: u8, content: &mut String) -> Result<(), MigrationError> {
        let mut remaining = chars - self.read_fragment_into(chars, flag, content);
        while remaining > 0 {
            let flag = self.read_u8()?;
            let read = self.read_fragment_into(remaining, flag, content);
            if read == 0 {
                Err(Biff8Error::NoEnoughDataError(remaining))?
            }
            remaining -= read;
        }
        Ok(())
    }

    /// Appends up to `chars` characters from the current chunk and returns how many it held.
    fn read_fragment_into(&mut self, chars: usize, flag: u8, content: &mut String) -> usize {
        let is_high_byte = flag & 0x01 != 0;
        let expected = if is_high_byte { chars * 2 } else { chars };
        let (bytes, actual) = self.read(expected);
        if is_high_byte {
            let (string, _) = UTF_16LE.decode_without_bom_handling(bytes);
            content.push_str(&string);
            actual / 2
        } else {
            // Compressed strings hold the low byte of each UTF-16 unit.
            content.extend(bytes.iter().map(|byte| *byte as char));
            actual
        }
    }
}

#[macro_export]
macro_rules! match_biff8_record {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(kind) = $reader.next()? {
            match kind {
                $($arms)*
                _ => (),
            }
        }
    };
}
