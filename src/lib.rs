// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # dotemit
//!
//! Builds and serializes ECMA-335 metadata for .NET assemblies: the metadata root, the
//! `#~`, `#Strings`, `#US`, `#GUID` and `#Blob` streams, signature blobs and CIL method
//! bodies with their exception sections.
//!
//! Producing metadata is a two-pass problem. Column widths depend on final row counts and heap
//! sizes, and the rows of sorted tables only get their final numbers once everything has been
//! registered. `dotemit` therefore separates *registering* elements from *writing* them:
//!
//! 1. register elements into tables and intern heap entries ([`emit::MetadataBuilder`])
//! 2. sort the tables the format requires to be sorted
//! 3. encode signatures, now that every referenced row is known
//! 4. decide heap index widths and coded index widths
//! 5. compute the stream layout
//! 6. write the metadata image ([`emit::MetadataImage`])
//!
//! On top of the pipeline, [`model`] describes a module with name-keyed types, members and
//! attributes and registers it in one call.
//!
//! ## Features
//!
//! - **Deterministic output** - the same registrations produce byte-identical images
//! - **Deduplicated heaps** - strings, blobs and GUIDs are stored once
//! - **Automatic widths** - 2- or 4-byte heap and coded indices chosen from the final sizes
//! - **Tiny and fat encodings** - method headers and exception sections use the smallest
//!   format that fits
//! - **Read-back** - [`metadata::reader::MetadataReader`] parses emitted images for verification
//!
//! ## Quick Start
//!
//! ```rust
//! use dotemit::prelude::*;
//!
//! let mut module = ModuleDefinition::new("Hello.dll", uguid::guid!("0d9b4d6e-1c1e-4a44-9b8e-6b2f3a1f7c10"));
//! let mut program = TypeDefinition::new("Hello", "Program", 0x0010_0001);
//! program.fields.push(FieldDefinition::new("count", TypeSignature::I4, 0x0011));
//! module.types.push(program);
//!
//! let (image, _) = module.emit(EmitOptions::default())?;
//! let reader = MetadataReader::parse(image.metadata())?;
//! assert_eq!(reader.tables.row_count(TableId::TypeDef), 2);
//! # Ok::<(), dotemit::Error>(())
//! ```
//!
//! ## Module layout
//!
//! - [`emit`] - the element registry, heap builders and the build pipeline
//! - [`model`] - module descriptions and their registration
//! - [`metadata`] - physical formats: root, streams, tables, signatures, method bodies
//! - [`utils`] - the compressed integer codec and alignment helpers

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use dotemit::prelude::*;
///
/// let mut builder = MetadataBuilder::new(EmitOptions::default());
/// let offset = builder.add_string("System")?;
/// assert_eq!(offset, 1);
/// # Ok::<(), dotemit::Error>(())
/// ```
pub mod prelude;

/// The build pipeline
///
/// Elements are registered into tables with column [`emit::Value`]s that may reference other
/// elements. The [`emit::MetadataBuilder`] then runs sort, signature encoding, width decisions,
/// layout and writing, in that order.
pub mod emit;

/// Physical ECMA-335 formats.
///
/// Everything the emitter writes is also readable here, which the tests use to verify output.
pub mod metadata;

/// Module descriptions and their registration into a build
pub mod model;

/// Low-level helpers, most importantly the compressed integer codec of ECMA-335 II.23.2.
pub mod utils;

/// `dotemit` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dotemit` Error type
///
/// Every variant describes one failure kind, and every error aborts
/// the build that produced it.
///
/// # Examples
///
/// ```rust
/// use dotemit::{emit::{EmitOptions, MetadataBuilder}, Error};
///
/// let mut builder = MetadataBuilder::new(EmitOptions::default());
/// match builder.finalize_widths() {
///     Err(Error::PhaseOrder { .. }) => {}
///     _ => unreachable!(),
/// }
/// ```
pub use error::Error;

/// Bounds-checked little-endian reading over a byte slice.
pub use file::Parser;
