//! Builds metadata through the low-level pipeline and reads it back.

use dotemit::{
    emit::{ElementId, EmitOptions, MetadataBuilder, PendingSignature, Phase, Value},
    metadata::{
        method::{
            CodeRegion, ExceptionHandlerFlags, ExceptionRegion, Handler, HandlerKind, MethodBody,
            RawMethodBody,
        },
        reader::MetadataReader,
        root::Root,
        signatures::{
            parse_field_signature, parse_local_var_signature, resolve_token, SignatureField,
            SignatureLocalVariable, SignatureMethod, TypeSignature,
        },
        streams::STREAM_NAMES,
        tables::{CodedIndexType, HeapSizes, TableId, TableInfo},
        token::Token,
    },
    Error,
};

fn string(builder: &mut MetadataBuilder, value: &str) -> Value {
    Value::Heap(builder.add_string(value).unwrap())
}

fn module(builder: &mut MetadataBuilder, name: &str) -> ElementId {
    let name_value = string(builder, name);
    let mvid = builder
        .add_guid(uguid::guid!("6f0c1b2a-3d4e-4f50-8a61-72839405a6b7"))
        .unwrap();
    builder
        .register(
            TableId::Module,
            name,
            vec![
                Value::Const(0),
                name_value,
                Value::Heap(mvid),
                Value::Heap(0),
                Value::Heap(0),
            ],
        )
        .unwrap()
}

fn type_def(builder: &mut MetadataBuilder, name: &str) -> ElementId {
    let name_value = string(builder, name);
    builder
        .register(
            TableId::TypeDef,
            name,
            vec![
                Value::Const(0x0010_0001),
                name_value,
                Value::Heap(0),
                Value::null(),
                Value::List(Vec::new()),
                Value::List(Vec::new()),
            ],
        )
        .unwrap()
}

fn field(builder: &mut MetadataBuilder, name: &str, field_type: TypeSignature<ElementId>) -> ElementId {
    let name_value = string(builder, name);
    builder
        .register(
            TableId::Field,
            name,
            vec![
                Value::Const(0x0001),
                name_value,
                Value::Signature(PendingSignature::Field(SignatureField::new(field_type))),
            ],
        )
        .unwrap()
}

#[test]
fn class_with_fields_and_method() {
    let mut builder = MetadataBuilder::new(EmitOptions::default());
    module(&mut builder, "E2E.dll");
    let holder = type_def(&mut builder, "Holder");
    let target = type_def(&mut builder, "Target");

    let value = field(&mut builder, "value", TypeSignature::I4);
    let reference = field(&mut builder, "target", TypeSignature::Class(target));

    let run_name = string(&mut builder, "Run");
    let run = builder
        .register(
            TableId::MethodDef,
            "Holder::Run",
            vec![
                Value::Const(0),
                Value::Const(0),
                Value::Const(0x0006),
                run_name,
                Value::Signature(PendingSignature::Method(SignatureMethod::new(
                    TypeSignature::Void,
                    Vec::new(),
                ))),
                Value::List(Vec::new()),
            ],
        )
        .unwrap();

    builder
        .set_value(holder, 4, Value::List(vec![value, reference]))
        .unwrap();
    builder.set_value(holder, 5, Value::List(vec![run])).unwrap();

    // 10 bytes of try, 3 bytes of catch handler
    let mut body = MethodBody::new(vec![0x00; 13], 2);
    body.locals = vec![
        SignatureLocalVariable::new(TypeSignature::I4),
        SignatureLocalVariable::new(TypeSignature::String),
        SignatureLocalVariable::new(TypeSignature::Class(target)),
    ];
    let start = body.label_at(0);
    let handler = body.label_at(10);
    let end = body.label_at(13);
    body.regions.push(ExceptionRegion::new(
        CodeRegion {
            start,
            end: handler,
        },
        Handler {
            kind: HandlerKind::Catch(target),
            body: CodeRegion {
                start: handler,
                end,
            },
        },
    ));
    builder.set_method_body(run, body).unwrap();

    let image = builder.build().unwrap();
    let reader = MetadataReader::parse(image.metadata()).unwrap();

    assert_eq!(reader.tables.row_count(TableId::Field), 2);
    assert_eq!(reader.tables.row_count(TableId::MethodDef), 1);
    assert_eq!(reader.tables.row_count(TableId::StandAloneSig), 1);

    // one field signature per distinct field type
    let mut field_blobs: Vec<u32> = reader
        .tables
        .rows(TableId::Field)
        .iter()
        .map(|row| row.get(2))
        .collect();
    field_blobs.dedup();
    assert_eq!(field_blobs.len(), 2);
    let parsed = parse_field_signature(reader.blobs.get(field_blobs[1] as usize).unwrap()).unwrap();
    assert_eq!(parsed.base, TypeSignature::Class(Token::new(0x0200_0002)));

    // locals round trip with tokens in place of elements
    let locals_row = &reader.tables.rows(TableId::StandAloneSig)[0];
    let locals = parse_local_var_signature(reader.blobs.get(locals_row.get(0) as usize).unwrap())
        .unwrap();
    assert_eq!(locals.locals.len(), 3);
    assert_eq!(
        locals.locals[2].base,
        TypeSignature::Class(Token::new(0x0200_0002))
    );

    // fat header for the locals, tiny exception section for the 10-byte try
    let parsed = RawMethodBody::from(image.method_bodies()).unwrap();
    assert!(parsed.is_fat);
    assert!(!parsed.is_fat_section);
    assert_eq!(parsed.local_var_sig_token, 0x1100_0001);
    assert_eq!(parsed.exception_handlers.len(), 1);
    let clause = &parsed.exception_handlers[0];
    assert_eq!(clause.flags, ExceptionHandlerFlags::EXCEPTION);
    assert_eq!((clause.try_offset, clause.try_length), (0, 10));
    assert_eq!((clause.handler_offset, clause.handler_length), (10, 3));
    assert_eq!(clause.class_token, Token::new(0x0200_0002));

    // Root: 20 fixed + "v4.0.30319" padded to 12 + five stream headers
    let root = Root::size_for("v4.0.30319", &STREAM_NAMES);
    assert_eq!(root, 20 + 12 + 12 + 20 + 12 + 16 + 16);

    // Strings: leading NUL, "E2E.dll", "Holder", "Target", "value", "target", "Run"
    let strings = 1 + 8 + 7 + 7 + 6 + 7 + 4;
    // User strings: a single NUL, padded
    let user_strings = 4;
    // One GUID
    let guids = 16;
    // Blob: leading NUL, I4 field (2), class field (3), void() (3), three locals (6),
    // each with a one-byte length, padded to 4
    let blobs = (1 + 3 + 4 + 4 + 7 + 3) / 4 * 4;
    // Tables: header, five row counts, Module 10, TypeDef 2 x 14, Field 2 x 6,
    // MethodDef 14, StandAloneSig 2, padded to 4
    let tables = (24 + 5 * 4 + 10 + 2 * 14 + 2 * 6 + 14 + 2 + 3) / 4 * 4;

    assert_eq!(
        image.total_size(),
        root + tables + strings + user_strings + guids + blobs
    );
    assert_eq!(image.total_size(), 300);
}

#[test]
fn heap_deduplication() {
    let mut builder = MetadataBuilder::new(EmitOptions::default());

    let first = builder.add_string("System.Object").unwrap();
    assert_eq!(builder.add_string("System.Object").unwrap(), first);
    assert_ne!(builder.add_string("System.String").unwrap(), first);
    assert_eq!(builder.add_string("").unwrap(), 0);

    let blob = builder.add_blob(&[0x06, 0x08]).unwrap();
    assert_eq!(builder.add_blob(&[0x06, 0x08]).unwrap(), blob);
    assert_ne!(builder.add_blob(&[0x06, 0x0E]).unwrap(), blob);
    assert_eq!(builder.add_blob(&[]).unwrap(), 0);
}

#[test]
fn constants_are_sorted_by_parent() {
    let mut builder = MetadataBuilder::new(EmitOptions::default());
    module(&mut builder, "Constants.dll");
    let holder = type_def(&mut builder, "Holder");
    let fields: Vec<ElementId> = (0..4)
        .map(|index| field(&mut builder, &format!("f{index}"), TypeSignature::I4))
        .collect();
    builder
        .set_value(holder, 4, Value::List(fields.clone()))
        .unwrap();

    // registered in reverse field order
    for (index, parent) in fields.iter().enumerate().rev() {
        let blob = builder
            .add_blob(&u32::try_from(index).unwrap().to_le_bytes())
            .unwrap();
        builder
            .register(
                TableId::Constant,
                format!("constant {index}"),
                vec![Value::Const(0x08), Value::to(*parent), Value::Heap(blob)],
            )
            .unwrap();
    }

    let image = builder.build().unwrap();
    let reader = MetadataReader::parse(image.metadata()).unwrap();
    assert!(reader.tables.is_sorted(TableId::Constant));

    let keys: Vec<u32> = reader
        .tables
        .rows(TableId::Constant)
        .iter()
        .map(|row| row.get(1))
        .collect();
    assert!(keys.windows(2).all(|pair| pair[0] <= pair[1]));

    // HasConstant: Field tag 0
    let third = CodedIndexType::HasConstant
        .encode(TableId::Field, 3)
        .unwrap();
    let row = reader
        .tables
        .find_by_key(TableId::Constant, 1, third)
        .unwrap()
        .unwrap();
    assert_eq!(reader.blobs.get(row.get(2) as usize).unwrap(), &2u32.to_le_bytes());
    assert_eq!(
        reader.tables.decode(CodedIndexType::HasConstant, row.get(1)).unwrap(),
        (TableId::Field, 3)
    );

    let missing = CodedIndexType::HasConstant.encode(TableId::Param, 1).unwrap();
    assert!(reader
        .tables
        .find_by_key(TableId::Constant, 1, missing)
        .unwrap()
        .is_none());
}

#[test]
fn coded_index_width_grows_once() {
    let threshold = TableInfo::coded_index_threshold(CodedIndexType::HasConstant);
    assert_eq!(threshold, 0x3FFF);

    let mut previous = 2;
    for rows in [1, threshold - 1, threshold, threshold + 1, 0x10000, 0x20000] {
        for table in [TableId::Field, TableId::Param, TableId::Property] {
            let info = TableInfo::new([(table, rows)], HeapSizes::empty());
            let width = info.coded_index_bytes(CodedIndexType::HasConstant);
            assert_eq!(width, if rows > threshold { 4 } else { 2 });
            if table == TableId::Field {
                assert!(width >= previous);
                previous = width;
            }
        }
    }
}

#[test]
fn region_fatness_boundaries() {
    fn clauses(try_length: u32, handler_length: u32) -> bool {
        let mut body = MethodBody::new(vec![0x00; (try_length + handler_length) as usize], 1);
        let start = body.label_at(0);
        let middle = body.label_at(try_length);
        let end = body.label_at(try_length + handler_length);
        body.regions.push(ExceptionRegion::new(
            CodeRegion { start, end: middle },
            Handler {
                kind: HandlerKind::Finally,
                body: CodeRegion { start: middle, end },
            },
        ));
        let (_, fat) = body.clauses("M", &resolve_token).unwrap();
        fat
    }

    assert!(!clauses(255, 1));
    assert!(clauses(256, 1));
    assert!(clauses(1, 256));
}

#[test]
fn steps_out_of_order() {
    let mut builder = MetadataBuilder::new(EmitOptions::default());
    module(&mut builder, "Phases.dll");

    match builder.layout() {
        Err(Error::PhaseOrder { expected, found }) => {
            assert_eq!(expected, Phase::WidthsFinalized);
            assert_eq!(found, Phase::Register);
        }
        other => panic!("unexpected {other:?}"),
    }

    builder.sort().unwrap();
    assert!(matches!(
        builder.register(TableId::TypeRef, "late", Vec::new()),
        Err(Error::PhaseOrder { .. })
    ));
}

#[test]
fn duplicate_registration() {
    let mut builder = MetadataBuilder::new(EmitOptions::default());
    type_def(&mut builder, "Twice");
    let name = builder.add_string("Twice").unwrap();
    match builder.register(
        TableId::TypeDef,
        "Twice",
        vec![
            Value::Const(0),
            Value::Heap(name),
            Value::Heap(0),
            Value::null(),
            Value::List(Vec::new()),
            Value::List(Vec::new()),
        ],
    ) {
        Err(Error::DuplicateElement { table, identity }) => {
            assert_eq!(table, TableId::TypeDef);
            assert_eq!(identity, "Twice");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn wide_heaps_option() {
    let mut builder = MetadataBuilder::new(EmitOptions::wide_heaps());
    module(&mut builder, "Wide.dll");
    let image = builder.build().unwrap();

    let reader = MetadataReader::parse(image.metadata()).unwrap();
    assert_eq!(reader.tables.heap_sizes, HeapSizes::all());
    // generation, name and three GUID indices
    assert_eq!(TableId::Module.row_size(image.table_info()), 2 + 4 + 3 * 4);
}
