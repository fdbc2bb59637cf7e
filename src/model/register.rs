//! Registration of a [`ModuleDefinition`] into a [`MetadataBuilder`].
//!
//! Registration runs in passes so that every list-owning table gets contiguous child runs:
//!
//! 1. `Module`, `Assembly` and every `TypeDef` (`<Module>` first), so that defined types can
//!    be referenced from anywhere afterwards
//! 2. base types
//! 3. fields of every type, in type order
//! 4. methods of every type with their parameters, generic parameters, bodies and imports
//! 5. interfaces, nesting, layout, generic parameters of types, properties, events, constants,
//!    marshalling, explicit overrides
//! 6. custom attributes and security declarations
//! 7. member references used only from instruction streams
//!
//! External types, assemblies, type specs, member refs and method specs are registered on
//! first use and found again by identity afterwards.

use std::collections::HashMap;

use log::debug;

use crate::{
    emit::{EmitOptions, ElementId, MetadataBuilder, MetadataImage, PendingSignature, Value},
    metadata::{
        signatures::{SignatureField, SignatureMethodSpec, SignatureTypeSpec, TypeSignature},
        tables::TableId,
    },
    model::{
        definitions::{
            Accessors, AssemblyReference, GenericParameter, MemberReference, ModuleDefinition,
            ParameterDefinition, TypeDefinition,
        },
        handles::{MethodHandle, TypeHandle, TypeSig},
        values::{ConstantValue, CustomAttribute, SecurityDeclaration},
    },
    Error, Result,
};

/// `TypeDef` flags of the `<Module>` pseudo type
const MODULE_TYPE_FLAGS: u32 = 0;

/// `MethodSemantics` flags
#[allow(non_snake_case, missing_docs)]
pub mod METHOD_SEMANTICS {
    pub const SETTER: u32 = 0x0001;
    pub const GETTER: u32 = 0x0002;
    pub const OTHER: u32 = 0x0004;
    pub const ADD_ON: u32 = 0x0008;
    pub const REMOVE_ON: u32 = 0x0010;
    pub const FIRE: u32 = 0x0020;
}

/// Elements registered for the entities of a module, by name.
///
/// Tokens of these elements are available from the built [`crate::emit::MetadataImage`].
#[derive(Debug, Clone, Default)]
pub struct EntityMap {
    module: Option<ElementId>,
    assembly: Option<ElementId>,
    types: HashMap<String, ElementId>,
    fields: HashMap<(String, String), ElementId>,
    methods: HashMap<(String, String), ElementId>,
    properties: HashMap<(String, String), ElementId>,
    events: HashMap<(String, String), ElementId>,
    references: Vec<ElementId>,
}

impl EntityMap {
    /// The `Module` row
    #[must_use]
    pub fn module(&self) -> Option<ElementId> {
        self.module
    }

    /// The `Assembly` row
    #[must_use]
    pub fn assembly(&self) -> Option<ElementId> {
        self.assembly
    }

    /// The `TypeDef` of `full_name`
    #[must_use]
    pub fn type_def(&self, full_name: &str) -> Option<ElementId> {
        self.types.get(full_name).copied()
    }

    /// The `Field` `name` of type `full_name`
    #[must_use]
    pub fn field(&self, full_name: &str, name: &str) -> Option<ElementId> {
        self.fields
            .get(&(full_name.to_string(), name.to_string()))
            .copied()
    }

    /// The `MethodDef` with `key` of type `full_name`
    #[must_use]
    pub fn method(&self, full_name: &str, key: &str) -> Option<ElementId> {
        self.methods
            .get(&(full_name.to_string(), key.to_string()))
            .copied()
    }

    /// The `Property` `name` of type `full_name`
    #[must_use]
    pub fn property(&self, full_name: &str, name: &str) -> Option<ElementId> {
        self.properties
            .get(&(full_name.to_string(), name.to_string()))
            .copied()
    }

    /// The `Event` `name` of type `full_name`
    #[must_use]
    pub fn event(&self, full_name: &str, name: &str) -> Option<ElementId> {
        self.events
            .get(&(full_name.to_string(), name.to_string()))
            .copied()
    }

    /// The element of [`ModuleDefinition::references`] entry `index`
    #[must_use]
    pub fn reference(&self, index: usize) -> Option<ElementId> {
        self.references.get(index).copied()
    }
}

/// Register `module` and everything it references into `builder`.
///
/// # Errors
/// Returns [`Error::UnresolvedReference`] for a handle naming a type or method the module
/// does not define, [`Error::DuplicateElement`] for two definitions with the same name, and
/// [`Error::PhaseOrder`] if `builder` is past registration.
pub fn register_into(module: &ModuleDefinition, builder: &mut MetadataBuilder) -> Result<EntityMap> {
    let mut registrar = Registrar {
        builder,
        assembly_references: &module.assembly_references,
        map: EntityMap::default(),
    };

    registrar.module(module)?;
    registrar.type_defs(module)?;
    registrar.base_types(module)?;
    registrar.fields(module)?;
    registrar.methods(module)?;
    registrar.relations(module)?;
    registrar.attributes(module)?;
    registrar.references(module)?;

    debug!(
        "Registered module {} with {} types, {} fields, {} methods",
        module.name,
        registrar.map.types.len(),
        registrar.map.fields.len(),
        registrar.map.methods.len()
    );
    Ok(registrar.map)
}

impl ModuleDefinition {
    /// See [`register_into`]
    ///
    /// # Errors
    /// See [`register_into`].
    pub fn register_into(&self, builder: &mut MetadataBuilder) -> Result<EntityMap> {
        register_into(self, builder)
    }

    /// Register this module into a new build with `options` and run the build to completion.
    ///
    /// # Errors
    /// Any error of registration or of the build pipeline.
    pub fn emit(&self, options: EmitOptions) -> Result<(MetadataImage, EntityMap)> {
        let mut builder = MetadataBuilder::new(options);
        let entities = self.register_into(&mut builder)?;
        Ok((builder.build()?, entities))
    }
}

struct Registrar<'a, 'b> {
    builder: &'b mut MetadataBuilder,
    assembly_references: &'a [AssemblyReference],
    map: EntityMap,
}

impl Registrar<'_, '_> {
    fn string(&mut self, value: &str) -> Result<Value> {
        Ok(Value::Heap(self.builder.add_string(value)?))
    }

    fn blob(&mut self, value: &[u8]) -> Result<Value> {
        Ok(Value::Heap(self.builder.add_blob(value)?))
    }

    fn find_or_register(
        &mut self,
        table: TableId,
        identity: String,
        values: impl FnOnce(&mut Self) -> Result<Vec<Value>>,
    ) -> Result<ElementId> {
        if let Some(existing) = self.builder.find(table, &identity) {
            return Ok(existing);
        }
        let values = values(self)?;
        self.builder.register(table, identity, values)
    }

    fn defined_type(&self, full_name: &str, from: &str) -> Result<ElementId> {
        self.map
            .types
            .get(full_name)
            .copied()
            .ok_or_else(|| Error::UnresolvedReference {
                from: from.to_string(),
                target: full_name.to_string(),
            })
    }

    fn defined_method(&self, declaring_type: &str, key: &str, from: &str) -> Result<ElementId> {
        self.map
            .methods
            .get(&(declaring_type.to_string(), key.to_string()))
            .copied()
            .ok_or_else(|| Error::UnresolvedReference {
                from: from.to_string(),
                target: format!("{declaring_type}::{key}"),
            })
    }

    fn assembly_ref(&mut self, name: &str) -> Result<ElementId> {
        let details = self
            .assembly_references
            .iter()
            .find(|reference| reference.name == name)
            .cloned()
            .unwrap_or_else(|| AssemblyReference {
                name: name.to_string(),
                ..Default::default()
            });

        self.find_or_register(TableId::AssemblyRef, name.to_string(), |this| {
            Ok(vec![
                Value::Const(u32::from(details.version[0])),
                Value::Const(u32::from(details.version[1])),
                Value::Const(u32::from(details.version[2])),
                Value::Const(u32::from(details.version[3])),
                Value::Const(details.flags),
                this.blob(&details.public_key_or_token)?,
                this.string(&details.name)?,
                this.string(&details.culture)?,
                Value::Heap(0),
            ])
        })
    }

    /// The `TypeDef`, `TypeRef` or `TypeSpec` element of `handle`
    fn resolve_type(&mut self, handle: &TypeHandle, from: &str) -> Result<ElementId> {
        match handle {
            TypeHandle::Defined(name) => self.defined_type(name, from),
            TypeHandle::External {
                assembly,
                namespace,
                name,
            } => {
                let scope = self.assembly_ref(assembly)?;
                self.find_or_register(TableId::TypeRef, handle.to_string(), |this| {
                    Ok(vec![Value::to(scope), this.string(name)?, this.string(namespace)?])
                })
            }
            TypeHandle::Spec(signature) => {
                let resolved = self.resolve_signature(signature, from)?;
                self.find_or_register(TableId::TypeSpec, format!("{resolved:?}"), |_| {
                    Ok(vec![Value::Signature(PendingSignature::TypeSpec(
                        SignatureTypeSpec { base: resolved },
                    ))])
                })
            }
        }
    }

    fn resolve_signature(
        &mut self,
        signature: &TypeSig,
        from: &str,
    ) -> Result<TypeSignature<ElementId>> {
        signature.try_map(&mut |handle: &TypeHandle| self.resolve_type(handle, from))
    }

    /// The `MethodDef`, `MemberRef` or `MethodSpec` element of `handle`
    fn resolve_method(&mut self, handle: &MethodHandle, from: &str) -> Result<ElementId> {
        match handle {
            MethodHandle::Defined {
                declaring_type,
                key,
            } => self.defined_method(declaring_type, key, from),
            MethodHandle::External {
                parent,
                name,
                signature,
            } => {
                let parent = self.resolve_type(parent, from)?;
                let signature =
                    signature.try_map(&mut |handle: &TypeHandle| self.resolve_type(handle, from))?;
                let identity = format!("{parent}::{name} {signature:?}");
                self.find_or_register(TableId::MemberRef, identity, |this| {
                    Ok(vec![
                        Value::to(parent),
                        this.string(name)?,
                        Value::Signature(PendingSignature::Method(signature)),
                    ])
                })
            }
            MethodHandle::Instantiated { method, args } => {
                let method = self.resolve_method(method, from)?;
                let generic_args = args
                    .iter()
                    .map(|arg| self.resolve_signature(arg, from))
                    .collect::<Result<Vec<_>>>()?;
                let identity = format!("{method}<{generic_args:?}>");
                self.find_or_register(TableId::MethodSpec, identity, |_| {
                    Ok(vec![
                        Value::to(method),
                        Value::Signature(PendingSignature::MethodSpec(SignatureMethodSpec {
                            generic_args,
                        })),
                    ])
                })
            }
        }
    }

    fn module(&mut self, module: &ModuleDefinition) -> Result<()> {
        let name = self.string(&module.name)?;
        let mvid = Value::Heap(self.builder.add_guid(module.mvid)?);
        self.map.module = Some(self.builder.register(
            TableId::Module,
            module.name.clone(),
            vec![Value::Const(0), name, mvid, Value::Heap(0), Value::Heap(0)],
        )?);

        if let Some(assembly) = &module.assembly {
            let values = vec![
                Value::Const(assembly.hash_algorithm),
                Value::Const(u32::from(assembly.version[0])),
                Value::Const(u32::from(assembly.version[1])),
                Value::Const(u32::from(assembly.version[2])),
                Value::Const(u32::from(assembly.version[3])),
                Value::Const(assembly.flags),
                self.blob(&assembly.public_key)?,
                self.string(&assembly.name)?,
                self.string(&assembly.culture)?,
            ];
            self.map.assembly =
                Some(self.builder.register(TableId::Assembly, assembly.name.clone(), values)?);
        }

        Ok(())
    }

    fn type_def(&mut self, ty: &TypeDefinition) -> Result<()> {
        let full_name = ty.full_name();
        let values = vec![
            Value::Const(ty.flags),
            self.string(&ty.name)?,
            self.string(&ty.namespace)?,
            Value::null(),
            Value::List(Vec::new()),
            Value::List(Vec::new()),
        ];
        let id = self
            .builder
            .register(TableId::TypeDef, full_name.clone(), values)?;
        self.map.types.insert(full_name, id);
        Ok(())
    }

    fn type_defs(&mut self, module: &ModuleDefinition) -> Result<()> {
        self.type_def(&TypeDefinition::new("", "<Module>", MODULE_TYPE_FLAGS))?;
        for ty in &module.types {
            self.type_def(ty)?;
        }
        Ok(())
    }

    fn base_types(&mut self, module: &ModuleDefinition) -> Result<()> {
        for ty in &module.types {
            let Some(base) = &ty.extends else {
                continue;
            };
            let full_name = ty.full_name();
            let owner = self.defined_type(&full_name, &full_name)?;
            let base = self.resolve_type(base, &full_name)?;
            self.builder.set_value(owner, 3, Value::to(base))?;
        }
        Ok(())
    }

    fn fields(&mut self, module: &ModuleDefinition) -> Result<()> {
        for ty in &module.types {
            let full_name = ty.full_name();
            let owner = self.defined_type(&full_name, &full_name)?;

            let mut fields = Vec::with_capacity(ty.fields.len());
            for field in &ty.fields {
                let identity = format!("{full_name}::{}", field.name);
                let base = self.resolve_signature(&field.field_type, &identity)?;
                let values = vec![
                    Value::Const(u32::from(field.flags)),
                    self.string(&field.name)?,
                    Value::Signature(PendingSignature::Field(SignatureField::new(base))),
                ];
                let id = self.builder.register(TableId::Field, identity, values)?;
                self.map
                    .fields
                    .insert((full_name.clone(), field.name.clone()), id);
                fields.push(id);
            }

            self.builder.set_value(owner, 4, Value::List(fields))?;
        }
        Ok(())
    }

    fn generic_parameters(
        &mut self,
        owner: ElementId,
        owner_name: &str,
        parameters: &[GenericParameter],
    ) -> Result<()> {
        for (number, parameter) in parameters.iter().enumerate() {
            let identity = format!("{owner_name}`{number}");
            let values = vec![
                Value::Const(crate::utils::to_u32(number)?),
                Value::Const(u32::from(parameter.flags)),
                Value::to(owner),
                self.string(&parameter.name)?,
            ];
            let id = self
                .builder
                .register(TableId::GenericParam, identity.clone(), values)?;

            for constraint in &parameter.constraints {
                let target = self.resolve_type(constraint, &identity)?;
                self.builder.register(
                    TableId::GenericParamConstraint,
                    format!("{identity} : {target}"),
                    vec![Value::to(id), Value::to(target)],
                )?;
            }
        }
        Ok(())
    }

    fn constant(&mut self, owner: ElementId, owner_name: &str, value: &ConstantValue) -> Result<()> {
        let blob = value.intern(self.builder)?;
        self.builder.register(
            TableId::Constant,
            format!("constant of {owner_name}"),
            vec![
                Value::Const(u32::from(value.element_type())),
                Value::to(owner),
                Value::Heap(blob),
            ],
        )?;
        Ok(())
    }

    fn marshal(&mut self, owner: ElementId, owner_name: &str, descriptor: &[u8]) -> Result<()> {
        let blob = self.blob(descriptor)?;
        self.builder.register(
            TableId::FieldMarshal,
            format!("marshal of {owner_name}"),
            vec![Value::to(owner), blob],
        )?;
        Ok(())
    }

    fn parameters(
        &mut self,
        method_name: &str,
        parameters: &[ParameterDefinition],
    ) -> Result<Vec<ElementId>> {
        let mut ids = Vec::with_capacity(parameters.len());
        for (index, parameter) in parameters.iter().enumerate() {
            let sequence = crate::utils::to_u32(index + 1)?;
            let identity = format!("{method_name}#{sequence}");
            let values = vec![
                Value::Const(u32::from(parameter.flags)),
                Value::Const(sequence),
                self.string(&parameter.name)?,
            ];
            let id = self.builder.register(TableId::Param, identity.clone(), values)?;

            if let Some(constant) = &parameter.constant {
                self.constant(id, &identity, constant)?;
            }
            if let Some(marshal) = &parameter.marshal {
                self.marshal(id, &identity, marshal)?;
            }
            ids.push(id);
        }
        Ok(ids)
    }

    fn methods(&mut self, module: &ModuleDefinition) -> Result<()> {
        for ty in &module.types {
            let full_name = ty.full_name();
            let owner = self.defined_type(&full_name, &full_name)?;

            let mut methods = Vec::with_capacity(ty.methods.len());
            for method in &ty.methods {
                let identity = format!("{full_name}::{}", method.key());
                let signature = method
                    .signature
                    .try_map(&mut |handle: &TypeHandle| self.resolve_type(handle, &identity))?;
                let values = vec![
                    Value::Const(0),
                    Value::Const(u32::from(method.impl_flags)),
                    Value::Const(u32::from(method.flags)),
                    self.string(&method.name)?,
                    Value::Signature(PendingSignature::Method(signature)),
                    Value::List(Vec::new()),
                ];
                let id = self
                    .builder
                    .register(TableId::MethodDef, identity.clone(), values)?;
                self.map
                    .methods
                    .insert((full_name.clone(), method.key().to_string()), id);

                let parameters = self.parameters(&identity, &method.parameters)?;
                self.builder.set_value(id, 5, Value::List(parameters))?;
                self.generic_parameters(id, &identity, &method.generic_parameters)?;

                if let Some(body) = &method.body {
                    let body =
                        body.try_map(&mut |handle: &TypeHandle| self.resolve_type(handle, &identity))?;
                    self.builder.set_method_body(id, body)?;
                }

                if let Some(pinvoke) = &method.pinvoke {
                    let scope = self.find_or_register(
                        TableId::ModuleRef,
                        pinvoke.module.clone(),
                        |this| Ok(vec![this.string(&pinvoke.module)?]),
                    )?;
                    let values = vec![
                        Value::Const(u32::from(pinvoke.flags)),
                        Value::to(id),
                        self.string(&pinvoke.entry_point)?,
                        Value::to(scope),
                    ];
                    self.builder
                        .register(TableId::ImplMap, format!("import of {identity}"), values)?;
                }

                methods.push(id);
            }

            self.builder.set_value(owner, 5, Value::List(methods))?;
        }
        Ok(())
    }

    fn semantics(
        &mut self,
        full_name: &str,
        association: ElementId,
        association_name: &str,
        accessors: &Accessors,
        [first, second, fire]: [u32; 3],
    ) -> Result<()> {
        let slots = [
            (accessors.first.as_ref(), first),
            (accessors.second.as_ref(), second),
            (accessors.fire.as_ref(), fire),
        ]
        .into_iter()
        .filter(|(_, semantics)| *semantics != 0)
        .filter_map(|(key, semantics)| key.map(|key| (key, semantics)))
        .chain(
            accessors
                .other
                .iter()
                .map(|key| (key, METHOD_SEMANTICS::OTHER)),
        )
        .collect::<Vec<_>>();

        for (key, semantics) in slots {
            let method = self.defined_method(full_name, key, association_name)?;
            self.builder.register(
                TableId::MethodSemantics,
                format!("{association_name} {semantics:#x} {key}"),
                vec![Value::Const(semantics), Value::to(method), Value::to(association)],
            )?;
        }
        Ok(())
    }

    fn relations(&mut self, module: &ModuleDefinition) -> Result<()> {
        for ty in &module.types {
            let full_name = ty.full_name();
            let owner = self.defined_type(&full_name, &full_name)?;

            for interface in &ty.interfaces {
                let target = self.resolve_type(interface, &full_name)?;
                self.builder.register(
                    TableId::InterfaceImpl,
                    format!("{full_name} : {target}"),
                    vec![Value::to(owner), Value::to(target)],
                )?;
            }

            if let Some(enclosing) = &ty.enclosing {
                let enclosing = self.defined_type(enclosing, &full_name)?;
                self.builder.register(
                    TableId::NestedClass,
                    full_name.clone(),
                    vec![Value::to(owner), Value::to(enclosing)],
                )?;
            }

            if let Some(layout) = &ty.layout {
                self.builder.register(
                    TableId::ClassLayout,
                    full_name.clone(),
                    vec![
                        Value::Const(u32::from(layout.packing_size)),
                        Value::Const(layout.class_size),
                        Value::to(owner),
                    ],
                )?;
            }

            self.generic_parameters(owner, &full_name, &ty.generic_parameters)?;

            for field in &ty.fields {
                let identity = format!("{full_name}::{}", field.name);
                let id = self.builder.find(TableId::Field, &identity);
                let Some(id) = id else {
                    continue;
                };
                if let Some(constant) = &field.constant {
                    self.constant(id, &identity, constant)?;
                }
                if let Some(marshal) = &field.marshal {
                    self.marshal(id, &identity, marshal)?;
                }
                if let Some(offset) = field.offset {
                    self.builder.register(
                        TableId::FieldLayout,
                        identity,
                        vec![Value::Const(offset), Value::to(id)],
                    )?;
                }
            }

            if !ty.properties.is_empty() {
                let mut properties = Vec::with_capacity(ty.properties.len());
                for property in &ty.properties {
                    let identity = format!("{full_name}::{}", property.name);
                    let signature = property
                        .signature
                        .try_map(&mut |handle: &TypeHandle| self.resolve_type(handle, &identity))?;
                    let values = vec![
                        Value::Const(u32::from(property.flags)),
                        self.string(&property.name)?,
                        Value::Signature(PendingSignature::Property(signature)),
                    ];
                    let id = self
                        .builder
                        .register(TableId::Property, identity.clone(), values)?;
                    self.map
                        .properties
                        .insert((full_name.clone(), property.name.clone()), id);

                    if let Some(constant) = &property.constant {
                        self.constant(id, &identity, constant)?;
                    }
                    self.semantics(
                        &full_name,
                        id,
                        &identity,
                        &property.accessors,
                        [METHOD_SEMANTICS::GETTER, METHOD_SEMANTICS::SETTER, 0],
                    )?;
                    properties.push(id);
                }
                self.builder.register(
                    TableId::PropertyMap,
                    full_name.clone(),
                    vec![Value::to(owner), Value::List(properties)],
                )?;
            }

            if !ty.events.is_empty() {
                let mut events = Vec::with_capacity(ty.events.len());
                for event in &ty.events {
                    let identity = format!("{full_name}::{}", event.name);
                    let event_type = self.resolve_type(&event.event_type, &identity)?;
                    let values = vec![
                        Value::Const(u32::from(event.flags)),
                        self.string(&event.name)?,
                        Value::to(event_type),
                    ];
                    let id = self
                        .builder
                        .register(TableId::Event, identity.clone(), values)?;
                    self.map
                        .events
                        .insert((full_name.clone(), event.name.clone()), id);

                    self.semantics(
                        &full_name,
                        id,
                        &identity,
                        &event.accessors,
                        [
                            METHOD_SEMANTICS::ADD_ON,
                            METHOD_SEMANTICS::REMOVE_ON,
                            METHOD_SEMANTICS::FIRE,
                        ],
                    )?;
                    events.push(id);
                }
                self.builder.register(
                    TableId::EventMap,
                    full_name.clone(),
                    vec![Value::to(owner), Value::List(events)],
                )?;
            }

            for method in &ty.methods {
                let identity = format!("{full_name}::{}", method.key());
                let body = self.defined_method(&full_name, method.key(), &identity)?;
                for declaration in &method.overrides {
                    let declaration = self.resolve_method(declaration, &identity)?;
                    self.builder.register(
                        TableId::MethodImpl,
                        format!("{identity} overrides {declaration}"),
                        vec![Value::to(owner), Value::to(body), Value::to(declaration)],
                    )?;
                }
            }
        }
        Ok(())
    }

    fn custom_attributes(
        &mut self,
        owner: ElementId,
        owner_name: &str,
        attributes: &[CustomAttribute],
    ) -> Result<()> {
        for (index, attribute) in attributes.iter().enumerate() {
            let constructor = self.resolve_method(&attribute.constructor, owner_name)?;
            let value = attribute.encode_value()?;
            let blob = self.blob(&value)?;
            self.builder.register(
                TableId::CustomAttribute,
                format!("{owner_name} [{index}] {}", attribute.constructor),
                vec![Value::to(owner), Value::to(constructor), blob],
            )?;
        }
        Ok(())
    }

    fn security(
        &mut self,
        owner: ElementId,
        owner_name: &str,
        declarations: &[SecurityDeclaration],
    ) -> Result<()> {
        for declaration in declarations {
            let blob = self.blob(&declaration.permission_set)?;
            self.builder.register(
                TableId::DeclSecurity,
                format!("{owner_name} action {:#x}", declaration.action),
                vec![
                    Value::Const(u32::from(declaration.action)),
                    Value::to(owner),
                    blob,
                ],
            )?;
        }
        Ok(())
    }

    fn attributes(&mut self, module: &ModuleDefinition) -> Result<()> {
        if let (Some(assembly), Some(id)) = (&module.assembly, self.map.assembly) {
            self.custom_attributes(id, &assembly.name, &assembly.custom_attributes)?;
            self.security(id, &assembly.name, &assembly.security)?;
        }
        if let Some(id) = self.map.module {
            self.custom_attributes(id, &module.name, &module.custom_attributes)?;
        }

        for ty in &module.types {
            let full_name = ty.full_name();
            let owner = self.defined_type(&full_name, &full_name)?;
            self.custom_attributes(owner, &full_name, &ty.custom_attributes)?;
            self.security(owner, &full_name, &ty.security)?;

            for field in &ty.fields {
                if let Some(id) = self
                    .map
                    .fields
                    .get(&(full_name.clone(), field.name.clone()))
                    .copied()
                {
                    let name = format!("{full_name}::{}", field.name);
                    self.custom_attributes(id, &name, &field.custom_attributes)?;
                }
            }

            for method in &ty.methods {
                let name = format!("{full_name}::{}", method.key());
                let id = self.defined_method(&full_name, method.key(), &name)?;
                self.custom_attributes(id, &name, &method.custom_attributes)?;
                self.security(id, &name, &method.security)?;

                for (index, parameter) in method.parameters.iter().enumerate() {
                    let parameter_name = format!("{name}#{}", index + 1);
                    if let Some(id) = self.builder.find(TableId::Param, &parameter_name) {
                        self.custom_attributes(id, &parameter_name, &parameter.custom_attributes)?;
                    }
                }
            }

            for property in &ty.properties {
                if let Some(id) = self
                    .map
                    .properties
                    .get(&(full_name.clone(), property.name.clone()))
                    .copied()
                {
                    let name = format!("{full_name}::{}", property.name);
                    self.custom_attributes(id, &name, &property.custom_attributes)?;
                }
            }

            for event in &ty.events {
                if let Some(id) = self
                    .map
                    .events
                    .get(&(full_name.clone(), event.name.clone()))
                    .copied()
                {
                    let name = format!("{full_name}::{}", event.name);
                    self.custom_attributes(id, &name, &event.custom_attributes)?;
                }
            }
        }
        Ok(())
    }

    fn references(&mut self, module: &ModuleDefinition) -> Result<()> {
        for reference in &module.references {
            let id = match reference {
                MemberReference::Type(handle) => self.resolve_type(handle, &module.name)?,
                MemberReference::Method(handle) => self.resolve_method(handle, &module.name)?,
                MemberReference::Field {
                    parent,
                    name,
                    field_type,
                } => {
                    let parent = self.resolve_type(parent, &module.name)?;
                    let base = self.resolve_signature(field_type, &module.name)?;
                    let identity = format!("{parent}::{name} {base:?}");
                    self.find_or_register(TableId::MemberRef, identity, |this| {
                        Ok(vec![
                            Value::to(parent),
                            this.string(name)?,
                            Value::Signature(PendingSignature::Field(SignatureField::new(base))),
                        ])
                    })?
                }
            };
            self.map.references.push(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::signatures::SignatureMethod,
        model::{FieldDefinition, MethodDefinition},
    };

    fn module() -> ModuleDefinition {
        ModuleDefinition::new("Test.dll", uguid::guid!("11111111-2222-3333-4444-555555555555"))
    }

    #[test]
    fn module_type_comes_first() {
        let mut module = module();
        module.types.push(TypeDefinition::new("App", "Program", 0x0010_0001));

        let mut builder = MetadataBuilder::default();
        let entities = module.register_into(&mut builder).unwrap();

        let rows = builder.registry().rows(TableId::TypeDef);
        assert_eq!(rows.len(), 2);
        assert_eq!(builder.registry().describe(rows[0]), "TypeDef:<Module>");
        assert_eq!(entities.type_def("App.Program"), Some(rows[1]));
        assert!(entities.module().is_some());
        assert!(entities.assembly().is_none());
    }

    #[test]
    fn duplicate_types() {
        let mut module = module();
        module.types.push(TypeDefinition::new("App", "Program", 0));
        module.types.push(TypeDefinition::new("App", "Program", 0));

        let mut builder = MetadataBuilder::default();
        assert!(matches!(
            module.register_into(&mut builder),
            Err(Error::DuplicateElement {
                table: TableId::TypeDef,
                ..
            })
        ));
    }

    #[test]
    fn external_types_registered_once() {
        let object = TypeHandle::external("System.Runtime", "System", "Object");
        let mut module = module();
        for name in ["A", "B"] {
            let mut ty = TypeDefinition::new("App", name, 0).extends(object.clone());
            ty.fields.push(FieldDefinition::new(
                "value",
                TypeSig::Class(object.clone()),
                0x0001,
            ));
            module.types.push(ty);
        }

        let mut builder = MetadataBuilder::default();
        module.register_into(&mut builder).unwrap();
        assert_eq!(builder.registry().row_count(TableId::TypeRef), 1);
        assert_eq!(builder.registry().row_count(TableId::AssemblyRef), 1);
        assert_eq!(builder.registry().row_count(TableId::Field), 2);
    }

    #[test]
    fn overloads_by_key() {
        let mut module = module();
        let mut ty = TypeDefinition::new("App", "Math", 0);
        for (key, parameter) in [("Abs(int)", TypeSig::I4), ("Abs(long)", TypeSig::I8)] {
            let mut method = MethodDefinition::new(
                "Abs",
                SignatureMethod::new(parameter.clone(), vec![parameter]),
                0x0096,
            );
            method.overload = Some(key.to_string());
            ty.methods.push(method);
        }
        module.types.push(ty);

        let mut builder = MetadataBuilder::default();
        let entities = module.register_into(&mut builder).unwrap();
        assert_ne!(
            entities.method("App.Math", "Abs(int)"),
            entities.method("App.Math", "Abs(long)")
        );
        assert!(entities.method("App.Math", "Abs").is_none());
    }

    #[test]
    fn registration_after_sort() {
        let module = module();
        let mut builder = MetadataBuilder::default();
        builder.sort().unwrap();
        assert!(matches!(
            module.register_into(&mut builder),
            Err(Error::PhaseOrder { .. })
        ));
    }
}
