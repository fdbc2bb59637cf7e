//! `#GUID` heap builder.

use crate::{utils::to_u32, Result};

/// Builder for the `#GUID` heap.
///
/// Entries are raw 16-byte GUIDs addressed by 1-based index. They are not deduplicated: the
/// position of a GUID is its identity.
#[derive(Debug, Clone, Default)]
pub struct GuidHeapBuilder {
    data: Vec<u8>,
}

impl GuidHeapBuilder {
    /// An empty heap
    #[must_use]
    pub fn new() -> Self {
        GuidHeapBuilder::default()
    }

    /// Append `guid` and return its 1-based index.
    ///
    /// # Errors
    /// Returns an overflow error once the index leaves the u32 range.
    pub fn add(&mut self, guid: uguid::Guid) -> Result<u32> {
        self.data.extend_from_slice(&guid.to_bytes());
        to_u32(self.data.len() / 16)
    }

    /// Number of GUIDs
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.len() / 16
    }

    /// Heap content so far
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
