//! FLV file header parsing and writing.
//!
//! The header is the first 13 bytes of a file: the 9-byte header proper
//! (signature "FLV", version, flags, header length) plus the 4-byte
//! PreviousTagSize0 slot that always follows it. The merger treats the
//! two as one unit and carries everything after the signature verbatim.

use crate::copy::read_full;
use crate::error::{MergeError, Result};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::io::{Read, Write};

/// FLV file signature.
pub const FLV_SIGNATURE: &[u8; 3] = b"FLV";

/// On-disk size of the file header, including the PreviousTagSize0 slot.
pub const FILE_HEADER_SIZE: u64 = 13;

/// Flag bit indicating audio is present.
pub const FLAG_AUDIO: u8 = 0x04;

/// Flag bit indicating video is present.
pub const FLAG_VIDEO: u8 = 0x01;

/// FLV file header.
///
/// Only the signature is validated; version, flags and header length are
/// passed through so the output reproduces the first input's header
/// byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Format version byte.
    pub version: u8,
    /// Audio/video presence flags.
    pub flags: u8,
    /// Declared header length (9 for every known writer).
    pub header_len: u32,
    /// The PreviousTagSize0 slot, carried unmodified.
    pub trailer: [u8; 4],
}

impl FileHeader {
    /// Read and validate a file header.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut raw = [0u8; FILE_HEADER_SIZE as usize];
        let got = read_full(reader, &mut raw)?;
        if got < raw.len() {
            return Err(MergeError::TruncatedFileHeader {
                got,
                expected: raw.len(),
            });
        }

        if &raw[0..3] != FLV_SIGNATURE {
            return Err(MergeError::InvalidSignature(
                String::from_utf8_lossy(&raw[0..3]).into_owned(),
            ));
        }

        let mut trailer = [0u8; 4];
        trailer.copy_from_slice(&raw[9..13]);

        Ok(Self {
            version: raw[3],
            flags: raw[4],
            header_len: BigEndian::read_u32(&raw[5..9]),
            trailer,
        })
    }

    /// Write the file header, returning the byte count.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<u64> {
        writer.write_all(FLV_SIGNATURE)?;
        writer.write_u8(self.version)?;
        writer.write_u8(self.flags)?;
        writer.write_u32::<BigEndian>(self.header_len)?;
        writer.write_all(&self.trailer)?;
        Ok(FILE_HEADER_SIZE)
    }

    /// Whether the flags byte declares audio.
    pub fn has_audio(&self) -> bool {
        self.flags & FLAG_AUDIO != 0
    }

    /// Whether the flags byte declares video.
    pub fn has_video(&self) -> bool {
        self.flags & FLAG_VIDEO != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: [u8; 13] = [
        b'F', b'L', b'V', 1, 0x05, 0, 0, 0, 9, 0, 0, 0, 0,
    ];

    #[test]
    fn test_read_sample() {
        let mut cursor = Cursor::new(&SAMPLE[..]);
        let header = FileHeader::read(&mut cursor).unwrap();

        assert_eq!(header.version, 1);
        assert_eq!(header.flags, 0x05);
        assert_eq!(header.header_len, 9);
        assert_eq!(header.trailer, [0, 0, 0, 0]);
        assert!(header.has_audio());
        assert!(header.has_video());
    }

    #[test]
    fn test_roundtrip() {
        let mut cursor = Cursor::new(&SAMPLE[..]);
        let header = FileHeader::read(&mut cursor).unwrap();

        let mut buffer = Vec::new();
        let written = header.write(&mut buffer).unwrap();

        assert_eq!(written, FILE_HEADER_SIZE);
        assert_eq!(buffer, SAMPLE);
    }

    #[test]
    fn test_nonstandard_fields_pass_through() {
        let raw = [
            b'F', b'L', b'V', 7, 0xFF, 0, 0, 0, 32, 0xDE, 0xAD, 0xBE, 0xEF,
        ];
        let mut cursor = Cursor::new(&raw[..]);
        let header = FileHeader::read(&mut cursor).unwrap();

        assert_eq!(header.version, 7);
        assert_eq!(header.header_len, 32);

        let mut buffer = Vec::new();
        header.write(&mut buffer).unwrap();
        assert_eq!(buffer, raw);
    }

    #[test]
    fn test_invalid_signature() {
        let raw = [b'A', b'B', b'C', 1, 0x05, 0, 0, 0, 9, 0, 0, 0, 0];
        let mut cursor = Cursor::new(&raw[..]);

        let result = FileHeader::read(&mut cursor);
        assert!(matches!(result, Err(MergeError::InvalidSignature(_))));
    }

    #[test]
    fn test_truncated_header() {
        let mut cursor = Cursor::new(&SAMPLE[..7]);

        let result = FileHeader::read(&mut cursor);
        assert!(matches!(
            result,
            Err(MergeError::TruncatedFileHeader { got: 7, expected: 13 })
        ));
    }

    #[test]
    fn test_empty_input_is_truncated() {
        let mut cursor = Cursor::new(&[][..]);

        let result = FileHeader::read(&mut cursor);
        assert!(matches!(
            result,
            Err(MergeError::TruncatedFileHeader { got: 0, .. })
        ));
    }
}
