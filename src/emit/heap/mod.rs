//! The four metadata heaps of one build.
//!
//! Strings and blobs are interned by content, GUIDs and user strings are appended as given.
//! Every heap starts with its null entry so offset 0 always means "absent". A finished heap is
//! padded to a 4-byte boundary, and it needs 4-byte indices once that padded size passes
//! 65535 bytes.

mod blobs;
mod guids;
mod strings;
mod userstrings;

pub use blobs::BlobHeapBuilder;
pub use guids::GuidHeapBuilder;
pub use strings::StringHeapBuilder;
pub use userstrings::UserStringHeapBuilder;

use crate::{
    emit::EmitOptions,
    metadata::tables::HeapSizes,
    utils::{align_to, pad_to},
};

/// Largest heap that 2-byte indices can address
pub const MAX_SMALL_HEAP: u64 = 0xFFFF;

/// All heaps of one build.
#[derive(Debug, Clone, Default)]
pub struct HeapStore {
    /// `#Strings`
    pub strings: StringHeapBuilder,
    /// `#Blob`
    pub blobs: BlobHeapBuilder,
    /// `#GUID`
    pub guids: GuidHeapBuilder,
    /// `#US`
    pub user_strings: UserStringHeapBuilder,
}

/// A heap closed for writing: its padded bytes.
fn finish(data: &[u8]) -> Vec<u8> {
    let mut bytes = data.to_vec();
    pad_to(&mut bytes, 4, 0);
    bytes
}

/// Padded size of a heap holding `data`
fn padded_size(data: &[u8]) -> u64 {
    align_to(data.len() as u64, 4)
}

impl HeapStore {
    /// Empty heaps
    #[must_use]
    pub fn new() -> Self {
        HeapStore::default()
    }

    /// Padded `#Strings` size
    #[must_use]
    pub fn strings_size(&self) -> u64 {
        padded_size(self.strings.data())
    }

    /// Padded `#Blob` size
    #[must_use]
    pub fn blobs_size(&self) -> u64 {
        padded_size(self.blobs.data())
    }

    /// `#GUID` size, always a multiple of 16
    #[must_use]
    pub fn guids_size(&self) -> u64 {
        self.guids.data().len() as u64
    }

    /// Padded `#US` size
    #[must_use]
    pub fn user_strings_size(&self) -> u64 {
        padded_size(self.user_strings.data())
    }

    /// Which heaps need 4-byte indices, from their sizes and the `force_large_*` options.
    #[must_use]
    pub fn heap_sizes(&self, options: &EmitOptions) -> HeapSizes {
        let mut sizes = HeapSizes::empty();
        if options.force_large_strings || self.strings_size() > MAX_SMALL_HEAP {
            sizes |= HeapSizes::STRINGS;
        }
        if options.force_large_guid || self.guids_size() > MAX_SMALL_HEAP {
            sizes |= HeapSizes::GUID;
        }
        if options.force_large_blob || self.blobs_size() > MAX_SMALL_HEAP {
            sizes |= HeapSizes::BLOB;
        }
        sizes
    }

    /// Padded `#Strings` bytes
    #[must_use]
    pub fn finish_strings(&self) -> Vec<u8> {
        finish(self.strings.data())
    }

    /// Padded `#Blob` bytes
    #[must_use]
    pub fn finish_blobs(&self) -> Vec<u8> {
        finish(self.blobs.data())
    }

    /// `#GUID` bytes
    #[must_use]
    pub fn finish_guids(&self) -> Vec<u8> {
        self.guids.data().to_vec()
    }

    /// Padded `#US` bytes
    #[must_use]
    pub fn finish_user_strings(&self) -> Vec<u8> {
        finish(self.user_strings.data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding() {
        let mut heaps = HeapStore::new();
        heaps.strings.add("abc").unwrap();
        assert_eq!(heaps.strings.data().len(), 5);
        assert_eq!(heaps.strings_size(), 8);
        assert_eq!(heaps.finish_strings(), b"\0abc\0\0\0\0".to_vec());

        assert_eq!(heaps.blobs_size(), 4);
        assert_eq!(heaps.guids_size(), 0);
        assert_eq!(heaps.finish_user_strings(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn large_heaps() {
        let options = EmitOptions::default();
        let mut heaps = HeapStore::new();
        assert_eq!(heaps.heap_sizes(&options), HeapSizes::empty());

        // 1 null byte + 4 bytes of length prefix + 65530 bytes of payload
        heaps.blobs.add(&vec![0x11; 65530]).unwrap();
        assert_eq!(heaps.blobs.data().len(), 65535);
        assert_eq!(heaps.blobs_size(), 65536);
        assert!(heaps.heap_sizes(&options).contains(HeapSizes::BLOB));

        let forced = EmitOptions {
            force_large_strings: true,
            force_large_guid: true,
            ..EmitOptions::default()
        };
        assert_eq!(
            HeapStore::new().heap_sizes(&forced),
            HeapSizes::STRINGS | HeapSizes::GUID
        );
    }
}
