//! Emission options
//!
//! Settings that shape the metadata image without changing what it describes: the version
//! strings written into the headers, where the PE shell will map method bodies, and overrides
//! that force wide heap indices.

/// Runtime version string written into the metadata root by default
pub const DEFAULT_VERSION: &str = "v4.0.30319";

/// Configuration for one metadata build
///
/// The defaults produce what current compilers emit: a `v4.0.30319` root, tables stream
/// version 2.0, and heap index widths chosen from the actual heap sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct EmitOptions {
    /// Runtime version string of the metadata root
    pub version: String,

    /// Major version of the tables stream schema (default: 2)
    pub tables_major_version: u8,

    /// Minor version of the tables stream schema (default: 0)
    pub tables_minor_version: u8,

    /// RVA the PE shell maps the method body buffer at; `MethodDef.RVA` is this plus the
    /// offset of the body in the buffer (default: 0)
    pub method_body_rva: u32,

    /// Always use 4-byte `#Strings` indices
    pub force_large_strings: bool,

    /// Always use 4-byte `#GUID` indices
    pub force_large_guid: bool,

    /// Always use 4-byte `#Blob` indices
    pub force_large_blob: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            tables_major_version: 2,
            tables_minor_version: 0,
            method_body_rva: 0,
            force_large_strings: false,
            force_large_guid: false,
            force_large_blob: false,
        }
    }
}

impl EmitOptions {
    /// Defaults with every heap index forced to 4 bytes
    ///
    /// Lets a small module exercise the wide row layouts.
    #[must_use]
    pub fn wide_heaps() -> Self {
        Self {
            force_large_strings: true,
            force_large_guid: true,
            force_large_blob: true,
            ..Self::default()
        }
    }

    /// Defaults with method bodies mapped at `rva`
    #[must_use]
    pub fn with_method_body_rva(rva: u32) -> Self {
        Self {
            method_body_rva: rva,
            ..Self::default()
        }
    }
}
