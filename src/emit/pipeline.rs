//! The build pipeline: registration, sort, signatures, widths, layout, write.
//!
//! Almost every field width of the metadata format depends on final row counts and heap
//! sizes, and row numbers of sorted tables change after registration. The pipeline therefore
//! runs as a strict sequence of phases; each step checks that the build is in the phase it
//! requires and fails with [`Error::PhaseOrder`] otherwise.
//!
//! | Step                                    | From              | To                |
//! |-----------------------------------------|-------------------|-------------------|
//! | [`MetadataBuilder::sort`]               | `Register`        | `Sorted`          |
//! | [`MetadataBuilder::build_signatures`]   | `Sorted`          | `SignaturesBuilt` |
//! | [`MetadataBuilder::finalize_widths`]    | `SignaturesBuilt` | `WidthsFinalized` |
//! | [`MetadataBuilder::layout`]             | `WidthsFinalized` | `LaidOut`         |
//! | [`MetadataBuilder::write`]              | `LaidOut`         | `Written`         |
//!
//! [`MetadataBuilder::build`] runs whatever steps remain.
//!
//! # Examples
//!
//! ```rust
//! use dotemit::{
//!     emit::{EmitOptions, MetadataBuilder, Value},
//!     metadata::tables::TableId,
//! };
//!
//! let mut builder = MetadataBuilder::new(EmitOptions::default());
//! let name = builder.add_string("Sample.dll")?;
//! let mvid = builder.add_guid(uguid::guid!("d437908e-65e6-487c-9735-7bdff699bea5"))?;
//! let module = builder.register(
//!     TableId::Module,
//!     "Sample.dll",
//!     vec![Value::Const(0), Value::Heap(name), Value::Heap(mvid), Value::Heap(0), Value::Heap(0)],
//! )?;
//!
//! let image = builder.build()?;
//! assert_eq!(image.token_of(module).map(|token| token.value()), Some(0x0000_0001));
//! assert_eq!(image.total_size() % 4, 0);
//! # Ok::<(), dotemit::Error>(())
//! ```

use std::collections::HashMap;

use log::debug;

use crate::{
    emit::{
        element::{Element, ElementId, PendingSignature, Value},
        heap::{BlobHeapBuilder, HeapStore},
        layout::{tables_stream_size, MetadataLayout},
        output::MetadataImage,
        registry::TableRegistry,
        sort::{sort_tables, sorted_mask, SORTED_TABLES},
        writer::{TablesStreamHeader, TablesWriter},
        EmitOptions,
    },
    metadata::{
        method::MethodBody,
        root::Root,
        signatures::{
            encode_field_signature, encode_local_var_signature, encode_method_signature,
            encode_method_spec_signature, encode_property_signature, encode_typespec_signature,
            SignatureLocalVariables,
        },
        tables::{TableId, TableInfo},
        token::{Token, MAX_TOKEN_ROW},
    },
    utils::{pad_to, to_u32},
    Error, Result,
};

/// Table byte of user string tokens
pub const USER_STRING_TOKEN_TABLE: u32 = 0x70;

/// The phases of one build, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
pub enum Phase {
    /// Elements are being registered
    Register,
    /// Sorted tables are ordered; rows are final
    Sorted,
    /// Signatures and method bodies are encoded; heaps are final
    SignaturesBuilt,
    /// Index and heap widths are frozen
    WidthsFinalized,
    /// Stream offsets and sizes are known
    LaidOut,
    /// The image has been produced
    Written,
}

/// A method body attached to a method, and the signature row of its locals
#[derive(Debug, Clone)]
struct BodyEntry {
    body: MethodBody<ElementId>,
    locals: Option<ElementId>,
}

/// Build state of one metadata image.
///
/// Created fresh per output, populated in the `Register` phase and consumed by
/// [`MetadataBuilder::build`].
#[derive(Debug)]
pub struct MetadataBuilder {
    options: EmitOptions,
    phase: Phase,
    registry: TableRegistry,
    heaps: HeapStore,
    bodies: HashMap<ElementId, BodyEntry>,
    body_bytes: Vec<u8>,
    body_rvas: HashMap<ElementId, u32>,
    info: Option<TableInfo>,
    layout: Option<MetadataLayout>,
}

impl Default for MetadataBuilder {
    fn default() -> Self {
        Self::new(EmitOptions::default())
    }
}

impl MetadataBuilder {
    /// An empty build in the `Register` phase
    #[must_use]
    pub fn new(options: EmitOptions) -> Self {
        MetadataBuilder {
            options,
            phase: Phase::Register,
            registry: TableRegistry::new(),
            heaps: HeapStore::new(),
            bodies: HashMap::new(),
            body_bytes: Vec::new(),
            body_rvas: HashMap::new(),
            info: None,
            layout: None,
        }
    }

    /// The phase the build is in
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Options of this build
    #[must_use]
    pub fn options(&self) -> &EmitOptions {
        &self.options
    }

    /// The registry, for inspection
    #[must_use]
    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    /// The heaps, for inspection
    #[must_use]
    pub fn heaps(&self) -> &HeapStore {
        &self.heaps
    }

    /// Width decisions, once finalized
    #[must_use]
    pub fn table_info(&self) -> Option<&TableInfo> {
        self.info.as_ref()
    }

    /// Stream layout, once computed
    #[must_use]
    pub fn stream_layout(&self) -> Option<&MetadataLayout> {
        self.layout.as_ref()
    }

    fn require(&self, expected: Phase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(Error::PhaseOrder {
                expected,
                found: self.phase,
            })
        }
    }

    fn advance(&mut self, to: Phase) {
        debug!("Metadata build: {} -> {}", self.phase, to);
        self.phase = to;
    }

    /// Register an element. See [`TableRegistry::register`].
    ///
    /// # Errors
    /// Returns [`Error::PhaseOrder`] after the `Register` phase, otherwise the errors of
    /// [`TableRegistry::register`].
    pub fn register(
        &mut self,
        table: TableId,
        identity: impl Into<String>,
        values: Vec<Value>,
    ) -> Result<ElementId> {
        self.require(Phase::Register)?;
        self.registry.register(table, identity, values)
    }

    /// Replace a column value of a registered element.
    ///
    /// # Errors
    /// Returns [`Error::PhaseOrder`] after the `Register` phase, or an error for an unknown
    /// element or column.
    pub fn set_value(&mut self, id: ElementId, column: usize, value: Value) -> Result<()> {
        self.require(Phase::Register)?;
        self.registry.set(id, column, value)
    }

    /// The element registered in `table` under `identity`
    #[must_use]
    pub fn find(&self, table: TableId, identity: &str) -> Option<ElementId> {
        self.registry.find(table, identity)
    }

    /// The element behind `id`
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedReference`] for an unknown id.
    pub fn element(&self, id: ElementId) -> Result<&Element> {
        self.registry.get(id)
    }

    /// Intern a string into `#Strings`.
    ///
    /// # Errors
    /// Returns [`Error::PhaseOrder`] after the `Register` phase, or the heap's errors.
    pub fn add_string(&mut self, value: &str) -> Result<u32> {
        self.require(Phase::Register)?;
        self.heaps.strings.add(value)
    }

    /// Intern a payload into `#Blob`.
    ///
    /// # Errors
    /// Returns [`Error::PhaseOrder`] after the `Register` phase, or the heap's errors.
    pub fn add_blob(&mut self, payload: &[u8]) -> Result<u32> {
        self.require(Phase::Register)?;
        self.heaps.blobs.add(payload)
    }

    /// The blob heap, for fixed-width constant values.
    ///
    /// # Errors
    /// Returns [`Error::PhaseOrder`] after the `Register` phase.
    pub fn blobs_mut(&mut self) -> Result<&mut BlobHeapBuilder> {
        self.require(Phase::Register)?;
        Ok(&mut self.heaps.blobs)
    }

    /// Append a GUID and return its 1-based index.
    ///
    /// # Errors
    /// Returns [`Error::PhaseOrder`] after the `Register` phase.
    pub fn add_guid(&mut self, guid: uguid::Guid) -> Result<u32> {
        self.require(Phase::Register)?;
        self.heaps.guids.add(guid)
    }

    /// Append a user string and return the `ldstr` token addressing it.
    ///
    /// # Errors
    /// Returns [`Error::PhaseOrder`] after the `Register` phase, or
    /// [`Error::FormatOverflow`] once `#US` grows beyond what a token can address.
    pub fn add_user_string(&mut self, value: &str) -> Result<Token> {
        self.require(Phase::Register)?;
        let offset = self.heaps.user_strings.add(value)?;
        if offset > MAX_TOKEN_ROW {
            return Err(Error::FormatOverflow {
                what: "user string offset",
                value: u64::from(offset),
                max: u64::from(MAX_TOKEN_ROW),
            });
        }

        Ok(Token::new((USER_STRING_TOKEN_TABLE << 24) | offset))
    }

    /// Attach a body to a `MethodDef` element.
    ///
    /// Locals, when present, get a `StandAloneSig` row whose signature is built in the
    /// signature phase. The method's RVA column is resolved from the body layout.
    ///
    /// # Errors
    /// Returns [`Error::PhaseOrder`] after the `Register` phase, [`Error::Malformed`] if
    /// `method` is not a `MethodDef`, or [`Error::DuplicateElement`] if it already has a body.
    pub fn set_method_body(&mut self, method: ElementId, body: MethodBody<ElementId>) -> Result<()> {
        self.require(Phase::Register)?;

        let element = self.registry.get(method)?;
        if element.table != TableId::MethodDef {
            return Err(malformed_error!(
                "{} can not own a method body",
                self.registry.describe(method)
            ));
        }
        if self.bodies.contains_key(&method) {
            return Err(Error::DuplicateElement {
                table: TableId::MethodDef,
                identity: format!("body of {}", element.identity),
            });
        }

        let locals = if body.locals.is_empty() {
            None
        } else {
            let identity = format!("locals of {}", element.identity);
            let signature = PendingSignature::LocalVariables(SignatureLocalVariables {
                locals: body.locals.clone(),
            });
            Some(self.registry.register(
                TableId::StandAloneSig,
                identity,
                vec![Value::Signature(signature)],
            )?)
        };

        self.registry.set(method, 0, Value::BodyRva)?;
        self.bodies.insert(method, BodyEntry { body, locals });
        Ok(())
    }

    /// The token of `id`.
    ///
    /// # Errors
    /// Returns [`Error::PhaseOrder`] before the sort phase, when rows are not final yet.
    pub fn token_of(&self, id: ElementId) -> Result<Token> {
        if self.phase < Phase::Sorted {
            return Err(Error::PhaseOrder {
                expected: Phase::Sorted,
                found: self.phase,
            });
        }
        self.registry.token_of(id)
    }

    /// The token of `id` while elements are still being registered.
    ///
    /// Rows of tables outside [`SORTED_TABLES`] never move, so their tokens can be embedded
    /// into instruction streams before the build runs.
    ///
    /// # Errors
    /// Returns [`Error::PhaseOrder`] for an element of a sorted table before the sort phase.
    pub fn stable_token_of(&self, id: ElementId) -> Result<Token> {
        let element = self.registry.get(id)?;
        if self.phase < Phase::Sorted
            && SORTED_TABLES.iter().any(|(table, _)| *table == element.table)
        {
            return Err(Error::PhaseOrder {
                expected: Phase::Sorted,
                found: self.phase,
            });
        }
        Token::from_parts(element.table, element.row)
    }

    /// Order the sorted tables and freeze every row number.
    ///
    /// # Errors
    /// Returns [`Error::PhaseOrder`] outside the `Register` phase.
    pub fn sort(&mut self) -> Result<()> {
        self.require(Phase::Register)?;
        sort_tables(&mut self.registry)?;
        debug!("Registered {} elements", self.registry.len());
        self.advance(Phase::Sorted);
        Ok(())
    }

    /// Encode every pending signature into `#Blob` and lay out the method bodies.
    ///
    /// # Errors
    /// Returns [`Error::PhaseOrder`] outside the `Sorted` phase,
    /// [`Error::UnresolvedReference`] for signatures that name unknown elements, and
    /// [`Error::MalformedRegion`] for inconsistent exception regions.
    pub fn build_signatures(&mut self) -> Result<()> {
        self.require(Phase::Sorted)?;

        let pending = self
            .registry
            .iter()
            .flat_map(|(id, element)| {
                element
                    .values
                    .iter()
                    .enumerate()
                    .filter_map(move |(column, value)| match value {
                        Value::Signature(signature) => Some((id, column, signature.clone())),
                        _ => None,
                    })
            })
            .collect::<Vec<_>>();

        for (id, column, signature) in &pending {
            let encoded = self.encode_signature(*id, signature)?;
            let offset = self.heaps.blobs.add(&encoded)?;
            self.registry.set(*id, *column, Value::Heap(offset))?;
        }
        debug!(
            "Built {} signatures into {} distinct blobs",
            pending.len(),
            self.heaps.blobs.count()
        );

        self.layout_bodies()?;
        self.advance(Phase::SignaturesBuilt);
        Ok(())
    }

    fn resolver(&self, from: ElementId) -> impl Fn(&ElementId) -> Result<Token> + '_ {
        move |target: &ElementId| {
            self.registry
                .token_of(*target)
                .map_err(|_| Error::UnresolvedReference {
                    from: self.registry.describe(from),
                    target: target.to_string(),
                })
        }
    }

    fn encode_signature(&self, id: ElementId, signature: &PendingSignature) -> Result<Vec<u8>> {
        let resolve = self.resolver(id);
        match signature {
            PendingSignature::Field(field) => encode_field_signature(field, &resolve),
            PendingSignature::Method(method) => encode_method_signature(method, &resolve),
            PendingSignature::Property(property) => encode_property_signature(property, &resolve),
            PendingSignature::LocalVariables(locals) => {
                encode_local_var_signature(locals, &resolve)
            }
            PendingSignature::TypeSpec(spec) => encode_typespec_signature(spec, &resolve),
            PendingSignature::MethodSpec(spec) => encode_method_spec_signature(spec, &resolve),
        }
    }

    /// Encode bodies in `MethodDef` row order into one buffer, fat bodies 4-byte aligned.
    fn layout_bodies(&mut self) -> Result<()> {
        let mut bytes = Vec::new();
        let mut rvas = HashMap::new();

        for method in self.registry.rows(TableId::MethodDef) {
            let Some(entry) = self.bodies.get(method) else {
                continue;
            };

            let local_sig = match entry.locals {
                Some(locals) => self.registry.token_of(locals)?,
                None => Token::new(0),
            };

            let name = self.registry.describe(*method);
            let encoded = entry.body.encode(&name, local_sig, &self.resolver(*method))?;
            if encoded.is_fat {
                pad_to(&mut bytes, 4, 0);
            }

            let offset = to_u32(bytes.len())?;
            let rva = self
                .options
                .method_body_rva
                .checked_add(offset)
                .ok_or(Error::FormatOverflow {
                    what: "method body RVA",
                    value: u64::from(self.options.method_body_rva) + u64::from(offset),
                    max: u64::from(u32::MAX),
                })?;

            rvas.insert(*method, rva);
            bytes.extend_from_slice(&encoded.bytes);
        }

        debug!("Laid out {} method bodies in {} bytes", rvas.len(), bytes.len());
        self.body_bytes = bytes;
        self.body_rvas = rvas;
        Ok(())
    }

    /// Freeze table index, coded index and heap index widths.
    ///
    /// # Errors
    /// Returns [`Error::PhaseOrder`] outside the `SignaturesBuilt` phase.
    pub fn finalize_widths(&mut self) -> Result<()> {
        self.require(Phase::SignaturesBuilt)?;

        let heap_sizes = self.heaps.heap_sizes(&self.options);
        let info = TableInfo::new(self.registry.row_counts(), heap_sizes);
        debug!("Heap index widths {:?}", heap_sizes);

        self.info = Some(info);
        self.advance(Phase::WidthsFinalized);
        Ok(())
    }

    /// Compute the offset and size of every stream.
    ///
    /// # Errors
    /// Returns [`Error::PhaseOrder`] outside the `WidthsFinalized` phase.
    pub fn layout(&mut self) -> Result<()> {
        self.require(Phase::WidthsFinalized)?;
        let info = self.frozen_info()?;

        let layout = MetadataLayout::compute(
            &self.options.version,
            [
                tables_stream_size(info),
                self.heaps.strings_size(),
                self.heaps.user_strings_size(),
                self.heaps.guids_size(),
                self.heaps.blobs_size(),
            ],
        )?;
        debug!("Metadata image is {} bytes", layout.total_size);

        self.layout = Some(layout);
        self.advance(Phase::LaidOut);
        Ok(())
    }

    fn frozen_info(&self) -> Result<&TableInfo> {
        self.info.as_ref().ok_or(Error::PhaseOrder {
            expected: Phase::WidthsFinalized,
            found: self.phase,
        })
    }

    /// Serialize the root, the tables stream and the heaps.
    ///
    /// # Errors
    /// Returns [`Error::PhaseOrder`] outside the `LaidOut` phase, or an error if a row does not
    /// resolve or a value does not fit its frozen width.
    pub fn write(&mut self) -> Result<MetadataImage> {
        self.require(Phase::LaidOut)?;
        let (Some(info), Some(layout)) = (self.info.as_ref(), self.layout.as_ref()) else {
            return Err(Error::PhaseOrder {
                expected: Phase::LaidOut,
                found: self.phase,
            });
        };

        let tables = TablesWriter::new(&self.registry, info, &self.body_rvas)?.write(
            TablesStreamHeader {
                major_version: self.options.tables_major_version,
                minor_version: self.options.tables_minor_version,
                sorted: sorted_mask(),
            },
        )?;

        let streams = [
            tables,
            self.heaps.finish_strings(),
            self.heaps.finish_user_strings(),
            self.heaps.finish_guids(),
            self.heaps.finish_blobs(),
        ];

        let mut metadata = Vec::with_capacity(layout.total_size as usize);
        Root::new(&self.options.version, layout.streams.clone()).write_to(&mut metadata)?;
        for (stream, header) in streams.iter().zip(&layout.streams) {
            if metadata.len() != header.offset as usize || stream.len() != header.size as usize {
                return Err(malformed_error!(
                    "Stream {} written at {} with {} bytes, laid out at {} with {}",
                    header.name,
                    metadata.len(),
                    stream.len(),
                    header.offset,
                    header.size
                ));
            }
            metadata.extend_from_slice(stream);
        }

        let tokens = self
            .registry
            .iter()
            .map(|(_, element)| Token::from_parts(element.table, element.row))
            .collect::<Result<Vec<_>>>()?;

        let image = MetadataImage::new(
            metadata,
            layout.streams.clone(),
            self.body_bytes.clone(),
            tokens,
            info.clone(),
        );

        self.advance(Phase::Written);
        Ok(image)
    }

    /// Run every remaining step and produce the image.
    ///
    /// # Errors
    /// Returns the first error of any step; the build produces no partial output.
    pub fn build(mut self) -> Result<MetadataImage> {
        if self.phase == Phase::Register {
            self.sort()?;
        }
        if self.phase == Phase::Sorted {
            self.build_signatures()?;
        }
        if self.phase == Phase::SignaturesBuilt {
            self.finalize_widths()?;
        }
        if self.phase == Phase::WidthsFinalized {
            self.layout()?;
        }
        self.write()
    }
}
