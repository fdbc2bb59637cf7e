//! Metadata root header and stream directory.
//!
//! The metadata root is the first structure of the metadata blob. It carries the `BSJB`
//! signature, the runtime version string and the directory of stream headers that locate
//! `#~`, `#Strings`, `#US`, `#GUID` and `#Blob`.
//!
//! # Example
//!
//! ```rust
//! use dotemit::metadata::{root::Root, streams::StreamHeader};
//!
//! let root = Root::new(
//!     "v4.0.30319",
//!     vec![StreamHeader { offset: 0x2C, size: 4, name: "#~".to_string() }],
//! );
//! let mut data = Vec::new();
//! root.write_to(&mut data)?;
//! data.extend_from_slice(&[0; 4]);
//! assert_eq!(Root::read(&data)?.version, "v4.0.30319");
//! # Ok::<(), dotemit::Error>(())
//! ```
//!
//! # References
//!
//! - [ECMA-335 II.24.2.1: Metadata root](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::{read_le, read_le_at, write_le},
    metadata::streams::StreamHeader,
    utils::{align_to, to_u32},
    Error::OutOfBounds,
    Result,
};

/// The MAGIC value indicating the CIL header
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// Metadata root major version written by this crate
pub const ROOT_MAJOR_VERSION: u16 = 1;

/// Metadata root minor version written by this crate
pub const ROOT_MINOR_VERSION: u16 = 1;

/// The metadata root: version information and the stream directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    /// Magic signature for physical metadata: 0x424A5342
    pub signature: u32,
    /// `MajorVersion`
    pub major_version: u16,
    /// `MinorVersion`
    pub minor_version: u16,
    /// Always 0
    pub reserved: u32,
    /// Number of bytes allocated to hold the version string, a multiple of 4
    pub length: u32,
    /// The version string, without its null padding
    pub version: String,
    /// Reserved, always 0
    pub flags: u16,
    /// Number of Streams
    pub stream_number: u16,
    /// Streams
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// A root for `version` describing `streams`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // the version field and stream count are tiny
    pub fn new(version: &str, streams: Vec<StreamHeader>) -> Root {
        Root {
            signature: CIL_HEADER_MAGIC,
            major_version: ROOT_MAJOR_VERSION,
            minor_version: ROOT_MINOR_VERSION,
            reserved: 0,
            length: Self::version_length(version) as u32,
            version: version.to_string(),
            flags: 0,
            stream_number: streams.len() as u16,
            stream_headers: streams,
        }
    }

    /// Space reserved for `version`: its bytes plus a terminator, rounded up to 4.
    #[must_use]
    pub fn version_length(version: &str) -> u64 {
        align_to(version.len() as u64 + 1, 4)
    }

    /// Size of a root with this version string and these stream names, in bytes.
    #[must_use]
    pub fn size_for(version: &str, stream_names: &[&str]) -> u64 {
        20 + Self::version_length(version)
            + stream_names
                .iter()
                .map(|name| StreamHeader::size_for_name(name))
                .sum::<u64>()
    }

    /// Size of this root and its stream directory, in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        20 + Self::version_length(&self.version)
            + self
                .stream_headers
                .iter()
                .map(StreamHeader::header_size)
                .sum::<u64>()
    }

    /// Append the root and its stream headers to `buffer`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FormatOverflow`] if the version string is absurdly long.
    pub fn write_to(&self, buffer: &mut Vec<u8>) -> Result<()> {
        write_le(buffer, self.signature);
        write_le(buffer, self.major_version);
        write_le(buffer, self.minor_version);
        write_le(buffer, self.reserved);

        let length = to_u32(self.version.len() + 1)?.next_multiple_of(4);
        write_le(buffer, length);
        let version_start = buffer.len();
        buffer.extend_from_slice(self.version.as_bytes());
        buffer.resize(version_start + length as usize, 0);

        write_le(buffer, self.flags);
        write_le(buffer, self.stream_number);
        for header in &self.stream_headers {
            header.write_to(buffer);
        }

        Ok(())
    }

    /// Reads a [`Root`] metadata header from a byte slice.
    ///
    /// # Errors
    /// Returns an error if the data is too short, the signature is invalid, or the stream
    /// directory is malformed.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 36 {
            return Err(OutOfBounds);
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {}",
                signature
            ));
        }

        let version_string_length = read_le_at::<u32>(data, &mut 12)? as usize;
        let Some(str_end) = version_string_length.checked_add(16) else {
            return Err(malformed_error!(
                "Version string length causing integer overflow - {}",
                version_string_length
            ));
        };
        if str_end + 4 > data.len() {
            return Err(OutOfBounds);
        }

        let version_area = &data[16..str_end];
        let version_end = version_area
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(version_area.len());
        let version = String::from_utf8_lossy(&version_area[..version_end]).into_owned();

        let flags = read_le::<u16>(&data[str_end..])?;
        let stream_count = read_le::<u16>(&data[str_end + 2..])?;
        if stream_count == 0 || stream_count > 5 {
            // Must have streams, no duplicates, no more than 5 possible
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut streams: Vec<StreamHeader> = Vec::with_capacity(stream_count as usize);
        let mut stream_offset = str_end + 4;
        for _ in 0..stream_count {
            if stream_offset > data.len() {
                return Err(OutOfBounds);
            }

            let new_stream = StreamHeader::from(&data[stream_offset..])?;
            match u32::checked_add(new_stream.offset, new_stream.size) {
                Some(range) if range as usize <= data.len() => {}
                Some(_) => return Err(OutOfBounds),
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        new_stream.offset,
                        new_stream.size
                    ))
                }
            }

            if streams.iter().any(|stream| stream.name == new_stream.name) {
                return Err(malformed_error!("Duplicate stream - {}", new_stream.name));
            }

            stream_offset += usize::try_from(new_stream.header_size())
                .map_err(|_| malformed_error!("Stream header too large"))?;
            streams.push(new_stream);
        }

        Ok(Root {
            signature,
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            reserved: read_le::<u32>(&data[8..])?,
            length: to_u32(version_string_length)?,
            version,
            flags,
            stream_number: stream_count,
            stream_headers: streams,
        })
    }

    /// The header of the stream called `name`, if present.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|stream| stream.name == name)
    }
}
