//! Stream Header for .NET Metadata Streams
//!
//! Stream headers describe the name, offset, and size of each metadata stream. They follow the
//! metadata root and are variable-sized: the name is null-terminated and padded to 4 bytes.
//!
//! # Reference
//! - [ECMA-335 II.24.2.2](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::{read_le, write_le},
    utils::{align_to, pad_to},
    Error::OutOfBounds,
    Result,
};

/// Stream names this crate reads and writes, in the order the emitter lays them out.
pub const STREAM_NAMES: [&str; 5] = ["#~", "#Strings", "#US", "#GUID", "#Blob"];

/// A stream header: position and length of one table stream or heap.
///
/// # Examples
///
/// ```rust
/// use dotemit::metadata::streams::StreamHeader;
///
/// let header = StreamHeader { offset: 0x6C, size: 0x10, name: "#Blob".to_string() };
/// let mut data = Vec::new();
/// header.write_to(&mut data);
/// assert_eq!(data.len() as u64, header.header_size());
///
/// let parsed = StreamHeader::from(&data)?;
/// assert_eq!(parsed, header);
/// # Ok::<(), dotemit::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset of the stream from the start of the metadata root
    pub offset: u32,
    /// Size of this stream in bytes, a multiple of 4
    pub size: u32,
    /// Name of the stream, at most 32 characters
    pub name: String,
}

impl StreamHeader {
    /// Parse a stream header from the start of `data`.
    ///
    /// # Errors
    /// Returns an error if the data is too short or the stream name is unknown
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        if data.len() < 9 {
            return Err(OutOfBounds);
        }

        let name_area = &data[8..std::cmp::min(data.len(), 8 + 32)];
        let Some(name_end) = name_area.iter().position(|&b| b == 0) else {
            return Err(malformed_error!("Unterminated stream header name"));
        };

        let name = String::from_utf8_lossy(&name_area[..name_end]).into_owned();
        if !STREAM_NAMES.iter().any(|valid_name| name == *valid_name) {
            return Err(malformed_error!("Invalid stream header name - {}", name));
        }

        Ok(StreamHeader {
            offset: read_le::<u32>(data)?,
            size: read_le::<u32>(&data[4..])?,
            name,
        })
    }

    /// Bytes this header occupies: two u32 fields plus the padded name.
    #[must_use]
    pub fn header_size(&self) -> u64 {
        Self::size_for_name(&self.name)
    }

    /// Bytes a header for a stream called `name` occupies.
    #[must_use]
    pub fn size_for_name(name: &str) -> u64 {
        8 + align_to(name.len() as u64 + 1, 4)
    }

    /// Append this header to `buffer`.
    pub fn write_to(&self, buffer: &mut Vec<u8>) {
        write_le(buffer, self.offset);
        write_le(buffer, self.size);
        let name_start = buffer.len();
        buffer.extend_from_slice(self.name.as_bytes());
        buffer.push(0);
        while (buffer.len() - name_start) % 4 != 0 {
            buffer.push(0);
        }
    }
}

/// Pad a finished stream to a 4-byte boundary with zero bytes.
pub fn pad_stream(buffer: &mut Vec<u8>) {
    pad_to(buffer, 4, 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let header_bytes = [
            0x6C, 0x00, 0x00, 0x00,
            0xA4, 0x45, 0x00, 0x00,
            0x23, 0x7E, 0x00,
        ];

        let parsed_header = StreamHeader::from(&header_bytes).unwrap();

        assert_eq!(parsed_header.offset, 0x6C);
        assert_eq!(parsed_header.size, 0x45A4);
        assert_eq!(parsed_header.name, "#~");
    }

    #[test]
    fn crafted_invalid() {
        #[rustfmt::skip]
        let header_bytes = [
            0x6C, 0x00, 0x00, 0x00,
            0xA4, 0x45, 0x00, 0x00,
            0x24, 0x7E, 0x00,
        ];

        assert!(StreamHeader::from(&header_bytes).is_err());
    }

    #[test]
    fn padded_names() {
        assert_eq!(StreamHeader::size_for_name("#~"), 12);
        assert_eq!(StreamHeader::size_for_name("#US"), 12);
        assert_eq!(StreamHeader::size_for_name("#GUID"), 16);
        assert_eq!(StreamHeader::size_for_name("#Blob"), 16);
        assert_eq!(StreamHeader::size_for_name("#Strings"), 20);
    }
}
