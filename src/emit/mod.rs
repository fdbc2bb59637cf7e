//! Metadata emission.
//!
//! Elements are registered into per-table sequences and referenced through [`ElementId`]s;
//! nothing about the final byte layout is decided until every element is known. The
//! [`MetadataBuilder`] then runs the phases of [`Phase`] in order: it sorts the tables
//! readers binary search, builds signature blobs and method bodies, freezes every index
//! width, lays out the streams and serializes a [`MetadataImage`].
//!
//! # Key Components
//!
//! - [`MetadataBuilder`] - Build state and pipeline driver
//! - [`TableRegistry`] - Per-table element sequences and row assignment
//! - [`HeapStore`] - The `#Strings`, `#Blob`, `#GUID` and `#US` builders
//! - [`MetadataLayout`] - Offsets and sizes of the root and the streams
//! - [`TablesWriter`] - Row resolution and `#~` serialization
//!
//! Most users go through [`crate::model`], which registers a whole assembly description.

mod element;
mod heap;
mod layout;
mod options;
mod output;
mod pipeline;
mod registry;
mod sort;
mod writer;

pub use element::{Element, ElementId, PendingSignature, Value};
pub use heap::{
    BlobHeapBuilder, GuidHeapBuilder, HeapStore, StringHeapBuilder, UserStringHeapBuilder,
    MAX_SMALL_HEAP,
};
pub use layout::{tables_stream_size, MetadataLayout, TABLES_HEADER_SIZE};
pub use options::{EmitOptions, DEFAULT_VERSION};
pub use output::MetadataImage;
pub use pipeline::{MetadataBuilder, Phase, USER_STRING_TOKEN_TABLE};
pub use registry::TableRegistry;
pub use sort::{sort_tables, sorted_mask, SORTED_TABLES};
pub use writer::{list_starts, TablesStreamHeader, TablesWriter};
