//! The result of a build: the metadata image and the method body buffer.
//!
//! The metadata image starts with the root (`BSJB`) and is meant to be placed at the
//! metadata directory of a PE image. Method bodies are a separate buffer whose RVAs were fixed
//! by [`crate::emit::EmitOptions::method_body_rva`].
//!
//! # Atomic Output
//!
//! [`MetadataImage::write_to`] writes to a temporary file in the destination directory and
//! renames it into place, so an interrupted write never leaves a truncated image behind.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    emit::element::ElementId,
    metadata::{
        streams::StreamHeader,
        tables::{TableId, TableInfo},
        token::Token,
    },
    Error, Result,
};

/// A finished metadata image.
#[derive(Debug, Clone)]
pub struct MetadataImage {
    metadata: Vec<u8>,
    streams: Vec<StreamHeader>,
    method_bodies: Vec<u8>,
    tokens: Vec<Token>,
    info: TableInfo,
}

impl MetadataImage {
    pub(crate) fn new(
        metadata: Vec<u8>,
        streams: Vec<StreamHeader>,
        method_bodies: Vec<u8>,
        tokens: Vec<Token>,
        info: TableInfo,
    ) -> Self {
        MetadataImage {
            metadata,
            streams,
            method_bodies,
            tokens,
            info,
        }
    }

    /// The complete metadata image, root first
    #[must_use]
    pub fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    /// Consume the image and return its bytes
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.metadata
    }

    /// Headers of all streams, in image order
    #[must_use]
    pub fn streams(&self) -> &[StreamHeader] {
        &self.streams
    }

    /// The bytes of stream `name`
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&[u8]> {
        let header = self.streams.iter().find(|stream| stream.name == name)?;
        let start = header.offset as usize;
        self.metadata.get(start..start + header.size as usize)
    }

    /// All method bodies, in `MethodDef` row order
    #[must_use]
    pub fn method_bodies(&self) -> &[u8] {
        &self.method_bodies
    }

    /// The final token of a registered element
    #[must_use]
    pub fn token_of(&self, id: ElementId) -> Option<Token> {
        self.tokens.get(id.index()).copied()
    }

    /// Rows in `table`
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.info.rows(table)
    }

    /// The widths every index in the image was written with
    #[must_use]
    pub fn table_info(&self) -> &TableInfo {
        &self.info
    }

    /// Bytes of the metadata image
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.metadata.len() as u64
    }

    /// Write the metadata image to `path`, replacing it atomically.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the temporary file can not be created, written or
    /// moved into place.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut file = tempfile::NamedTempFile::new_in(&directory)?;
        file.write_all(&self.metadata)?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|error| Error::FileError(error.error))?;

        debug!("Wrote {} bytes of metadata to {}", self.metadata.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        emit::{EmitOptions, MetadataBuilder, Value},
        metadata::{root::Root, tables::TableId},
    };

    fn image() -> super::MetadataImage {
        let mut builder = MetadataBuilder::new(EmitOptions::default());
        let name = builder.add_string("Out.dll").unwrap();
        builder
            .register(
                TableId::Module,
                "Out.dll",
                vec![
                    Value::Const(0),
                    Value::Heap(name),
                    Value::Heap(0),
                    Value::Heap(0),
                    Value::Heap(0),
                ],
            )
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn streams() {
        let image = image();
        let root = Root::read(image.metadata()).unwrap();
        assert_eq!(root.stream_headers.len(), 5);

        let strings = image.stream("#Strings").unwrap();
        assert_eq!(&strings[..9], b"\0Out.dll\0");
        assert_eq!(image.stream("#US").unwrap(), &[0, 0, 0, 0]);
        assert!(image.stream("#Missing").is_none());
        assert_eq!(image.row_count(TableId::Module), 1);
    }

    #[test]
    fn atomic_write() {
        let image = image();
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("out.meta");

        std::fs::write(&path, b"stale").unwrap();
        image.write_to(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), image.metadata());
        assert_eq!(std::fs::read_dir(directory.path()).unwrap().count(), 1);
    }
}
