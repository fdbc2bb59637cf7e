//! Read access to an emitted metadata image.
//!
//! [`MetadataReader`] splits an image at its stream headers and parses the tables stream and
//! the heaps, which is enough to verify what a build produced without a PE container around
//! it.

use crate::{
    metadata::{
        root::Root,
        streams::{Blob, Guid, Strings, TablesHeader, UserStrings},
    },
    Error, Result,
};

/// The parsed streams of a metadata image.
pub struct MetadataReader<'a> {
    /// The metadata root
    pub root: Root,
    /// The tables stream
    pub tables: TablesHeader,
    /// The `#Strings` heap
    pub strings: Strings<'a>,
    /// The `#US` heap
    pub user_strings: UserStrings<'a>,
    /// The `#GUID` heap
    pub guids: Guid<'a>,
    /// The `#Blob` heap
    pub blobs: Blob<'a>,
}

impl<'a> MetadataReader<'a> {
    /// Parse a metadata image that starts with its root.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if a stream lies outside `data`, or [`Error::Malformed`]
    /// if the root or a stream is damaged or one of the five streams is missing.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let root = Root::read(data)?;

        let mut tables = None;
        let mut strings = None;
        let mut user_strings = None;
        let mut guids = None;
        let mut blobs = None;

        for stream in &root.stream_headers {
            let start = stream.offset as usize;
            let Some(stream_data) = data.get(start..start + stream.size as usize) else {
                return Err(Error::OutOfBounds);
            };

            match stream.name.as_str() {
                "#~" | "#-" => tables = Some(TablesHeader::from(stream_data)?),
                "#Strings" => strings = Some(Strings::from(stream_data)?),
                "#US" => user_strings = Some(UserStrings::from(stream_data)?),
                "#GUID" => guids = Some(Guid::from(stream_data)?),
                "#Blob" => blobs = Some(Blob::from(stream_data)?),
                _ => {}
            }
        }

        match (tables, strings, user_strings, guids, blobs) {
            (Some(tables), Some(strings), Some(user_strings), Some(guids), Some(blobs)) => {
                Ok(MetadataReader {
                    root,
                    tables,
                    strings,
                    user_strings,
                    guids,
                    blobs,
                })
            }
            _ => Err(malformed_error!(
                "Metadata image lacks one of the five standard streams"
            )),
        }
    }
}
