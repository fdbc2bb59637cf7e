//! `#Strings` heap builder.

use std::collections::HashMap;

use crate::{utils::to_u32, Result};

/// Builder for the `#Strings` heap.
///
/// Entries are null-terminated UTF-8. Equal strings share one offset, and offset 0 is the
/// empty string that every heap starts with.
#[derive(Debug, Clone)]
pub struct StringHeapBuilder {
    data: Vec<u8>,
    index: HashMap<String, u32>,
}

impl Default for StringHeapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StringHeapBuilder {
    /// A heap holding only the empty string
    #[must_use]
    pub fn new() -> Self {
        StringHeapBuilder {
            data: vec![0],
            index: HashMap::new(),
        }
    }

    /// Add `value` and return its offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `value` contains a NUL character, which the
    /// heap format can not represent, or an overflow error once the heap exceeds 4 GiB.
    pub fn add(&mut self, value: &str) -> Result<u32> {
        if value.is_empty() {
            return Ok(0);
        }
        if let Some(offset) = self.index.get(value) {
            return Ok(*offset);
        }
        if value.contains('\0') {
            return Err(malformed_error!(
                "String {:?} contains a NUL character",
                value
            ));
        }

        let offset = to_u32(self.data.len())?;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        self.index.insert(value.to_string(), offset);
        Ok(offset)
    }

    /// The offset `value` was added at, if it was
    #[must_use]
    pub fn offset_of(&self, value: &str) -> Option<u32> {
        if value.is_empty() {
            return Some(0);
        }
        self.index.get(value).copied()
    }

    /// Number of distinct non-empty strings
    #[must_use]
    pub fn count(&self) -> usize {
        self.index.len()
    }

    /// Heap content so far, unpadded
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup() {
        let mut heap = StringHeapBuilder::new();
        assert_eq!(heap.add("").unwrap(), 0);

        let first = heap.add("Program").unwrap();
        let second = heap.add("Main").unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 9);
        assert_eq!(heap.add("Program").unwrap(), first);
        assert_eq!(heap.count(), 2);
        assert_eq!(heap.data(), b"\0Program\0Main\0");
        assert_eq!(heap.offset_of("Main"), Some(9));
        assert_eq!(heap.offset_of("Other"), None);
    }

    #[test]
    fn interior_nul() {
        let mut heap = StringHeapBuilder::new();
        assert!(heap.add("a\0b").is_err());
        assert_eq!(heap.data(), &[0]);
    }
}
