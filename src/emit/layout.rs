//! Stream layout of the metadata image.
//!
//! The image is the metadata root followed by the five streams, packed in the order of
//! [`STREAM_NAMES`]: `#~`, `#Strings`, `#US`, `#GUID`, `#Blob`. Every stream size is a
//! multiple of 4, so every stream offset is too.
//!
//! The size of `#~` is a function of the row counts and the column widths decided in the
//! finalize phase, which is why the layout can only be computed after it.

use strum::IntoEnumIterator;

use crate::{
    metadata::{
        root::Root,
        streams::{StreamHeader, STREAM_NAMES},
        tables::{TableId, TableInfo},
    },
    utils::align_to,
    Error, Result,
};

/// Size of the fixed part of the tables stream header
pub const TABLES_HEADER_SIZE: u64 = 24;

/// Byte size of the `#~` stream for the row counts and widths in `info`, padded to 4.
#[must_use]
pub fn tables_stream_size(info: &TableInfo) -> u64 {
    let mut size = TABLES_HEADER_SIZE;
    for table in TableId::iter() {
        let rows = info.rows(table);
        if rows > 0 {
            size += 4 + u64::from(rows) * u64::from(table.row_size(info));
        }
    }

    align_to(size, 4)
}

fn image_offset(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::FormatOverflow {
        what: "metadata image offset",
        value,
        max: u64::from(u32::MAX),
    })
}

/// Offsets and sizes of the root and every stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataLayout {
    /// Bytes of the metadata root including its stream headers
    pub root_size: u32,
    /// One header per stream, in image order
    pub streams: Vec<StreamHeader>,
    /// Bytes of the whole image
    pub total_size: u32,
}

impl MetadataLayout {
    /// Pack streams of the given sizes behind a root carrying `version`.
    ///
    /// `sizes` follows the order of [`STREAM_NAMES`].
    ///
    /// # Errors
    /// Returns [`crate::Error::FormatOverflow`] if the image exceeds 4 GiB.
    pub fn compute(version: &str, sizes: [u64; 5]) -> Result<Self> {
        let root_size = Root::size_for(version, &STREAM_NAMES);

        let mut offset = root_size;
        let mut streams = Vec::with_capacity(STREAM_NAMES.len());
        for (name, size) in STREAM_NAMES.iter().zip(sizes) {
            streams.push(StreamHeader {
                offset: image_offset(offset)?,
                size: image_offset(size)?,
                name: (*name).to_string(),
            });
            offset += size;
        }

        Ok(MetadataLayout {
            root_size: image_offset(root_size)?,
            streams,
            total_size: image_offset(offset)?,
        })
    }

    /// The header of stream `name`
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.streams.iter().find(|stream| stream.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::HeapSizes;

    #[test]
    fn tables_size() {
        let empty = TableInfo::default();
        assert_eq!(tables_stream_size(&empty), 24);

        // 24 + 2 row counts + Module 10 + TypeDef 2 * 14 = 70, padded
        let info = TableInfo::new(
            [(TableId::Module, 1), (TableId::TypeDef, 2)],
            HeapSizes::empty(),
        );
        assert_eq!(tables_stream_size(&info), 72);

        // Field rows are 6 bytes, 24 + 4 + 6 = 34 pads to 36
        let odd = TableInfo::new([(TableId::Field, 1)], HeapSizes::empty());
        assert_eq!(tables_stream_size(&odd), 36);
    }

    #[test]
    fn packing() {
        let layout = MetadataLayout::compute("v4.0.30319", [64, 16, 4, 16, 8]).unwrap();

        // 20 + version 12 + headers 12 + 20 + 12 + 16 + 16
        assert_eq!(layout.root_size, 108);
        assert_eq!(layout.streams[0].offset, 108);
        assert_eq!(layout.stream("#Strings").unwrap().offset, 172);
        assert_eq!(layout.stream("#US").unwrap().offset, 188);
        assert_eq!(layout.stream("#GUID").unwrap().offset, 192);
        assert_eq!(layout.stream("#Blob").unwrap().offset, 208);
        assert_eq!(layout.total_size, 216);
    }
}
