use strum::{EnumCount, EnumIter};

/// Identifiers for the metadata tables defined in ECMA-335 Partition II, Section 22.
///
/// The discriminant of every variant is the on-disk table number: it selects the bit in the
/// `valid`/`sorted` vectors of the tables stream, the position of the table's rows in the
/// stream, and the high byte of tokens addressing the table.
///
/// ## Table Categories
///
/// ### Core Type System
/// - **`Module`**, **`TypeRef`**, **`TypeDef`**, **`Field`**, **`MethodDef`**, **`Param`**
///
/// ### Indirection (unoptimized metadata)
/// - **`FieldPtr`**, **`MethodPtr`**, **`ParamPtr`**, **`EventPtr`**, **`PropertyPtr`**
///
/// ### Relationships and attributes
/// - **`InterfaceImpl`**, **`MemberRef`**, **`Constant`**, **`CustomAttribute`**,
///   **`FieldMarshal`**, **`DeclSecurity`**, **`ClassLayout`**, **`FieldLayout`**,
///   **`NestedClass`**, **`MethodSemantics`**, **`MethodImpl`**
///
/// ### Signatures and generics
/// - **`StandAloneSig`**, **`TypeSpec`**, **`MethodSpec`**, **`GenericParam`**,
///   **`GenericParamConstraint`**
///
/// ### Events and properties
/// - **`EventMap`**, **`Event`**, **`PropertyMap`**, **`Property`**
///
/// ### Interop, edit-and-continue and manifest
/// - **`ModuleRef`**, **`ImplMap`**, **`FieldRVA`**, **`EncLog`**, **`EncMap`**,
///   **`Assembly`**, **`AssemblyProcessor`**, **`AssemblyOS`**, **`AssemblyRef`**,
///   **`AssemblyRefProcessor`**, **`AssemblyRefOS`**, **`File`**, **`ExportedType`**,
///   **`ManifestResource`**
///
/// ## Reference
/// * [ECMA-335 Partition II, Section 22](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Metadata Tables
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, EnumIter, EnumCount)]
#[repr(u8)]
pub enum TableId {
    /// `Module` table (0x00) - exactly one row describing the module itself.
    Module = 0x00,
    /// `TypeRef` table (0x01) - references to types defined in other scopes.
    TypeRef = 0x01,
    /// `TypeDef` table (0x02) - types defined in this module, owning runs of fields and methods.
    TypeDef = 0x02,
    /// `FieldPtr` table (0x03) - field indirection for unoptimized metadata.
    FieldPtr = 0x03,
    /// `Field` table (0x04) - field definitions.
    Field = 0x04,
    /// `MethodPtr` table (0x05) - method indirection for unoptimized metadata.
    MethodPtr = 0x05,
    /// `MethodDef` table (0x06) - method definitions, including the RVA of their bodies.
    MethodDef = 0x06,
    /// `ParamPtr` table (0x07) - parameter indirection for unoptimized metadata.
    ParamPtr = 0x07,
    /// `Param` table (0x08) - parameter definitions.
    Param = 0x08,
    /// `InterfaceImpl` table (0x09) - interfaces implemented by types. Sorted by class.
    InterfaceImpl = 0x09,
    /// `MemberRef` table (0x0A) - references to fields and methods of other types.
    MemberRef = 0x0A,
    /// `Constant` table (0x0B) - compile-time constants. Sorted by parent.
    Constant = 0x0B,
    /// `CustomAttribute` table (0x0C) - attribute applications. Sorted by parent.
    CustomAttribute = 0x0C,
    /// `FieldMarshal` table (0x0D) - interop marshalling descriptors. Sorted by parent.
    FieldMarshal = 0x0D,
    /// `DeclSecurity` table (0x0E) - declarative security. Sorted by parent.
    DeclSecurity = 0x0E,
    /// `ClassLayout` table (0x0F) - explicit packing and size. Sorted by parent.
    ClassLayout = 0x0F,
    /// `FieldLayout` table (0x10) - explicit field offsets. Sorted by field.
    FieldLayout = 0x10,
    /// `StandAloneSig` table (0x11) - local variable and call-site signatures.
    StandAloneSig = 0x11,
    /// `EventMap` table (0x12) - maps a type to its run of events.
    EventMap = 0x12,
    /// `EventPtr` table (0x13) - event indirection for unoptimized metadata.
    EventPtr = 0x13,
    /// `Event` table (0x14) - event definitions.
    Event = 0x14,
    /// `PropertyMap` table (0x15) - maps a type to its run of properties.
    PropertyMap = 0x15,
    /// `PropertyPtr` table (0x16) - property indirection for unoptimized metadata.
    PropertyPtr = 0x16,
    /// `Property` table (0x17) - property definitions.
    Property = 0x17,
    /// `MethodSemantics` table (0x18) - accessor roles of methods. Sorted by association.
    MethodSemantics = 0x18,
    /// `MethodImpl` table (0x19) - explicit overrides. Sorted by class.
    MethodImpl = 0x19,
    /// `ModuleRef` table (0x1A) - references to other modules, mostly P/Invoke targets.
    ModuleRef = 0x1A,
    /// `TypeSpec` table (0x1B) - constructed types described by a signature blob.
    TypeSpec = 0x1B,
    /// `ImplMap` table (0x1C) - P/Invoke mappings. Sorted by member forwarded.
    ImplMap = 0x1C,
    /// `FieldRVA` table (0x1D) - initial data of mapped fields. Sorted by field.
    FieldRVA = 0x1D,
    /// `EncLog` table (0x1E) - edit-and-continue log.
    EncLog = 0x1E,
    /// `EncMap` table (0x1F) - edit-and-continue token map.
    EncMap = 0x1F,
    /// `Assembly` table (0x20) - the manifest of the current assembly, at most one row.
    Assembly = 0x20,
    /// `AssemblyProcessor` table (0x21) - unused by current runtimes.
    AssemblyProcessor = 0x21,
    /// `AssemblyOS` table (0x22) - unused by current runtimes.
    AssemblyOS = 0x22,
    /// `AssemblyRef` table (0x23) - referenced assemblies.
    AssemblyRef = 0x23,
    /// `AssemblyRefProcessor` table (0x24) - unused by current runtimes.
    AssemblyRefProcessor = 0x24,
    /// `AssemblyRefOS` table (0x25) - unused by current runtimes.
    AssemblyRefOS = 0x25,
    /// `File` table (0x26) - other files of a multi-file assembly.
    File = 0x26,
    /// `ExportedType` table (0x27) - types exported or forwarded by this assembly.
    ExportedType = 0x27,
    /// `ManifestResource` table (0x28) - embedded or linked resources.
    ManifestResource = 0x28,
    /// `NestedClass` table (0x29) - nesting relationships. Sorted by nested class.
    NestedClass = 0x29,
    /// `GenericParam` table (0x2A) - generic parameters. Sorted by owner, then number.
    GenericParam = 0x2A,
    /// `MethodSpec` table (0x2B) - generic method instantiations.
    MethodSpec = 0x2B,
    /// `GenericParamConstraint` table (0x2C) - constraints of generic parameters. Sorted by owner.
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// Look up the table with on-disk number `id`.
    #[must_use]
    pub fn from_id(id: u8) -> Option<TableId> {
        use strum::IntoEnumIterator;

        TableId::iter().find(|table| *table as u8 == id)
    }

    /// The bit of this table in the `valid` and `sorted` vectors of the tables stream.
    #[must_use]
    pub fn mask(self) -> u64 {
        1u64 << (self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn ids_are_dense() {
        assert_eq!(TableId::COUNT, 0x2D);
        for (expected, table) in TableId::iter().enumerate() {
            assert_eq!(table as usize, expected);
            assert_eq!(TableId::from_id(table as u8), Some(table));
        }
        assert_eq!(TableId::from_id(0x2D), None);
    }

    #[test]
    fn masks() {
        assert_eq!(TableId::Module.mask(), 1);
        assert_eq!(TableId::GenericParamConstraint.mask(), 1 << 0x2C);
    }
}
