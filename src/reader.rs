//! The `binread` interpreter (spec §4.12): composes every other module into one
//! decoding pass over a [`Reader`].
//!
//! Grounded on `rs-ipfix-rw::parser`'s per-field read order (`Message` → `Set` →
//! `Records`, each field resolved, then validated, then assigned) and instrumented with
//! `tracing` spans the way `submerge-base` wraps fallible parse steps for provenance.

use tracing::trace;

use crate::bitfield;
use crate::codec::Prim;
use crate::condition;
use crate::context::Context;
use crate::controller::{Controller, CountSpec, TargetType, UntilStop};
use crate::cursor::{CursorLike, Reader};
use crate::error::{BinResult, Error};
use crate::expr::Scope;
use crate::meta::{CtxAccessor, Descriptor, FieldDescriptor, Relation};
use crate::prepost;
use crate::transform;
use crate::validate::Validator;
use crate::value::Value;

/// Decode one record of `descriptor` from `reader`.
///
/// `ctor_args` are the constructor arguments passed down from an enclosing `MapTo`
/// controller or a `Relation::Nested` argument resolver; they are exposed to the
/// descriptor's own fields at `_ctx._args`.
pub fn binread(
    reader: &mut Reader,
    descriptor: &Descriptor,
    ctx: Option<&mut Context>,
    ctor_args: &[Value],
) -> BinResult<Value> {
    let mut ctx = ctx;
    binread_inner(reader, descriptor, &mut ctx, ctor_args)
}

fn binread_inner(
    reader: &mut Reader,
    descriptor: &Descriptor,
    ctx: &mut Option<&mut Context>,
    ctor_args: &[Value],
) -> BinResult<Value> {
    if !ctor_args.is_empty() {
        if let Some(c) = ctx.as_deref_mut() {
            c.set("_args", Value::Array(ctor_args.to_vec()));
        }
    }

    let mut endian_restore = None;
    if let Some(endian) = descriptor.default_endian {
        endian_restore = Some(reader.endian());
        reader.set_endian(endian);
    }

    let mut instance = Value::record();
    let class_pre = prepost::run_pre(&descriptor.class_pre, reader, &instance, ctx.as_deref(), false)?;

    let result = if descriptor.is_bitfield {
        read_bitfield_record(reader, descriptor, &mut instance)
    } else {
        read_fields(reader, descriptor, &mut instance, ctx)
    };

    prepost::run_restores(&class_pre.restores, reader);
    let result = result.and_then(|()| {
        let post = prepost::run_pre(&descriptor.class_post, reader, &instance, ctx.as_deref(), false)?;
        prepost::run_restores(&post.restores, reader);
        Ok(())
    });

    if let Some(prior) = endian_restore {
        reader.set_endian(prior);
    }

    result.map(|()| instance)
}

fn read_bitfield_record(reader: &mut Reader, descriptor: &Descriptor, instance: &mut Value) -> BinResult<()> {
    let total = bitfield::total_bits(&descriptor.fields);
    let span = bitfield::span_bytes(total);
    let offset = reader.offset();
    let bytes = reader.read_raw(span).ok_or(Error::Eof {
        field: descriptor.type_tag.clone(),
        offset,
    })?;
    let values = bitfield::read_bitfield(&descriptor.fields, &bytes, reader.endian());
    let snapshot = instance.clone();
    for (field, raw) in descriptor.fields.iter().zip(values) {
        let value = transform::apply_read_chain(&field.transformers, Value::U64(raw), &snapshot)?;
        check_validators(&field.validators, &value, &field.name, offset)?;
        instance
            .as_record_mut()
            .expect("instance is always a Value::Record")
            .insert(field.name.clone(), value);
    }
    Ok(())
}

fn read_fields(
    reader: &mut Reader,
    descriptor: &Descriptor,
    instance: &mut Value,
    ctx: &mut Option<&mut Context>,
) -> BinResult<()> {
    for field in &descriptor.fields {
        let value = read_field(reader, descriptor, field, instance, ctx).map_err(|e| e.nest_path(&field.name))?;
        instance
            .as_record_mut()
            .expect("instance is always a Value::Record")
            .insert(field.name.clone(), value);
    }
    Ok(())
}

fn read_field(
    reader: &mut Reader,
    descriptor: &Descriptor,
    field: &FieldDescriptor,
    instance: &Value,
    ctx: &mut Option<&mut Context>,
) -> BinResult<Value> {
    trace!(field = %field.name, offset = reader.offset(), "reading field");

    let pre = prepost::run_pre(&field.pre, reader, instance, ctx.as_deref(), false)?;

    let value = if let Some(forced) = pre.forced_value {
        forced
    } else if let Some(key) = ctx_get_key(field) {
        let c = ctx
            .as_deref()
            .ok_or_else(|| Error::Reference { path: key.clone() })?;
        c.get(&key).cloned().ok_or(Error::Reference { path: key })?
    } else {
        let relation = resolve_relation(descriptor, field, instance, ctx.as_deref())?;
        match relation {
            None => Value::Unit,
            Some(relation) => read_relation_with_controller(reader, field, &relation, instance, ctx)?,
        }
    };

    let value = transform::apply_read_chain(&field.transformers, value, instance)?;
    check_validators(&field.validators, &value, &field.name, reader.offset())?;

    for accessor in &field.ctx {
        if let CtxAccessor::Set(key) = accessor {
            if let Some(c) = ctx.as_deref_mut() {
                c.set(key, value.clone());
            }
        }
    }

    let post = prepost::run_pre(&field.post, reader, instance, ctx.as_deref(), false)?;
    prepost::run_restores(&post.restores, reader);
    prepost::run_restores(&pre.restores, reader);

    Ok(value)
}

fn ctx_get_key(field: &FieldDescriptor) -> Option<String> {
    field.ctx.iter().find_map(|a| match a {
        CtxAccessor::Get(key) => Some(key.clone()),
        CtxAccessor::Set(_) => None,
    })
}

fn resolve_relation(
    descriptor: &Descriptor,
    field: &FieldDescriptor,
    instance: &Value,
    ctx: Option<&Context>,
) -> BinResult<Option<Relation>> {
    match &field.relation {
        Relation::Unknown => {
            let conditions = field
                .conditions
                .as_ref()
                .ok_or_else(|| Error::UnknownPropertyType { field: field.name.clone() })?;
            condition::resolve(conditions, &field.name, instance, ctx)
        }
        Relation::Nested(nested, _) if nested.type_tag == descriptor.type_tag => {
            Err(Error::SelfReferringField { field: field.name.clone() })
        }
        other => Ok(Some(other.clone())),
    }
}

fn check_validators(validators: &[Validator], value: &Value, field: &str, offset: u64) -> BinResult<()> {
    for v in validators {
        if !v.check(value) {
            return Err(Error::ValidationTestFailed {
                field: field.to_owned(),
                value: format!("{value:?}"),
                offset,
            });
        }
    }
    Ok(())
}

/// Read one primitive or nested relation, consuming a `Value::Eof` as a hard error
/// (the caller — a controller loop, or this function's own single-shot path — decides
/// whether EOF is expected).
fn read_one(
    reader: &mut Reader,
    relation: &Relation,
    instance: &Value,
    ctx: &mut Option<&mut Context>,
) -> BinResult<Value> {
    match relation {
        Relation::Primitive(prim) => Ok(reader.read(*prim)),
        Relation::Nested(desc, args_fn) => {
            // A nested record has no single sentinel read to report exhaustion with, so
            // a controller like `Until(Eof)` over a sequence of records (e.g. a PNG
            // chunk stream) needs this checked up front rather than surfacing as a hard
            // error out of the first field of the next record.
            if reader.offset() >= reader.len() {
                return Ok(Value::Eof);
            }
            let args = match args_fn {
                Some(f) => f(instance, ctx.as_deref())?,
                None => Vec::new(),
            };
            binread_inner(reader, desc, ctx, &args)
        }
        Relation::Unknown => unreachable!("relation must be resolved before read_one"),
    }
}

fn read_relation_with_controller(
    reader: &mut Reader,
    field: &FieldDescriptor,
    relation: &Relation,
    instance: &Value,
    ctx: &mut Option<&mut Context>,
) -> BinResult<Value> {
    let Some((controller, options)) = &field.controller else {
        let start = reader.offset();
        let v = read_one(reader, relation, instance, ctx)?;
        return if v.is_eof() {
            Err(Error::Eof { field: field.name.clone(), offset: start })
        } else {
            Ok(v)
        };
    };

    let start_offset = reader.offset();

    let result = match controller {
        Controller::Count(spec) => {
            let n = {
                let scope = Scope { instance, ctx: ctx.as_deref() };
                count_of(spec, &scope)?
            };
            let mut out = Vec::with_capacity(n as usize);
            for _ in 0..n {
                let v = read_one(reader, relation, instance, ctx)?;
                if v.is_eof() {
                    return Err(Error::Eof { field: field.name.clone(), offset: reader.offset() });
                }
                out.push(v);
            }
            let result = coerce_target(out, options.target_type);
            if let Some(k) = options.alignment {
                align_forward(reader, k);
            }
            result
        }
        Controller::While(pred) => {
            let mut out = Vec::new();
            while pred(instance) {
                let v = read_one(reader, relation, instance, ctx)?;
                if v.is_eof() {
                    return Err(Error::Eof { field: field.name.clone(), offset: reader.offset() });
                }
                out.push(v);
            }
            let result = coerce_target(out, options.target_type);
            if let Some(k) = options.alignment {
                align_forward(reader, k);
            }
            result
        }
        Controller::Until(stop) => {
            let mut out = Vec::new();
            loop {
                let v = read_one(reader, relation, instance, ctx)?;
                if v.is_eof() {
                    if matches!(stop, UntilStop::Eof) {
                        break;
                    }
                    return Err(Error::Eof { field: field.name.clone(), offset: reader.offset() });
                }
                let stop_now = match stop {
                    UntilStop::Eof => false,
                    UntilStop::Value(sentinel) => &v == sentinel,
                    UntilStop::Predicate(p) => p(&v),
                };
                out.push(v);
                if stop_now {
                    break;
                }
            }
            let result = coerce_target(out, options.target_type);
            if let Some(k) = options.alignment {
                align_forward(reader, k);
            }
            result
        }
        Controller::Matrix(cols, rows) => {
            let (cols_n, rows_n) = {
                let scope = Scope { instance, ctx: ctx.as_deref() };
                (count_of(cols, &scope)?, count_of(rows, &scope)?)
            };
            let mut grid = Vec::with_capacity(rows_n as usize);
            for _ in 0..rows_n {
                let mut row = Vec::with_capacity(cols_n as usize);
                for _ in 0..cols_n {
                    let v = read_one(reader, relation, instance, ctx)?;
                    if v.is_eof() {
                        return Err(Error::Eof { field: field.name.clone(), offset: reader.offset() });
                    }
                    row.push(v);
                }
                if let Some(stride) = options.alignment {
                    align_forward(reader, stride);
                }
                grid.push(Value::Array(row));
            }
            Value::Array(grid)
        }
        Controller::MapTo(expr) => {
            let Relation::Nested(desc, _) = relation else {
                return Err(Error::WrongArgumentReturnType { field: field.name.clone() });
            };
            let list = {
                let scope = Scope { instance, ctx: ctx.as_deref() };
                expr.eval(&scope)?
            };
            let items = match list {
                Value::Array(items) => items,
                other => vec![other],
            };
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let args = match item {
                    Value::Array(a) => a,
                    other => vec![other],
                };
                out.push(binread_inner(reader, desc, ctx, &args)?);
            }
            let result = Value::Array(out);
            if let Some(k) = options.alignment {
                align_forward(reader, k);
            }
            result
        }
        Controller::EnsureSize(expr) => {
            let size = {
                let scope = Scope { instance, ctx: ctx.as_deref() };
                expr.eval_i64(&scope)? as u64
            };
            let v = read_one(reader, relation, instance, ctx)?;
            if v.is_eof() {
                return Err(Error::Eof { field: field.name.clone(), offset: reader.offset() });
            }
            let end = start_offset + size;
            if reader.offset() > end {
                return Err(Error::Custom {
                    field: field.name.clone(),
                    message: format!("inner read overran EnsureSize bound ({} > {})", reader.offset(), end),
                });
            }
            reader.seek(end);
            if let Some(k) = options.alignment {
                align_forward(reader, k);
            }
            v
        }
        Controller::Padding(n) => {
            let v = read_one(reader, relation, instance, ctx)?;
            if v.is_eof() {
                return Err(Error::Eof { field: field.name.clone(), offset: reader.offset() });
            }
            align_forward(reader, *n);
            v
        }
        Controller::NullTerminatedString => {
            let mut s = String::new();
            loop {
                let byte = reader.read(Prim::U8);
                if byte.is_eof() {
                    return Err(Error::Eof { field: field.name.clone(), offset: reader.offset() });
                }
                let b = byte.to_u64().unwrap_or(0);
                if b == 0 {
                    break;
                }
                s.push(b as u8 as char);
            }
            if let Some(alignment) = options.alignment {
                align_forward(reader, alignment);
            }
            Value::Str(s)
        }
    };

    if options.peek {
        reader.seek(start_offset);
    }

    Ok(result)
}

fn count_of(spec: &CountSpec, scope: &Scope) -> BinResult<u64> {
    match spec {
        CountSpec::Fixed(n) => Ok(*n),
        CountSpec::Expr(e) => e.eval_i64(scope).map(|n| n.max(0) as u64),
    }
}

fn align_forward(reader: &mut Reader, boundary: u64) {
    if boundary == 0 {
        return;
    }
    let offset = reader.offset();
    let aligned = offset.div_ceil(boundary) * boundary;
    reader.seek(aligned);
}

fn coerce_target(values: Vec<Value>, target: TargetType) -> Value {
    match target {
        TargetType::Array => Value::Array(values),
        TargetType::Str => {
            let mut s = String::new();
            for v in values {
                match v {
                    Value::Str(part) => s.push_str(&part),
                    other => {
                        if let Some(b) = other.to_u64() {
                            if let Some(c) = char::from_u32(b as u32) {
                                s.push(c);
                            }
                        }
                    }
                }
            }
            Value::Str(s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Endian;
    use crate::expr::Expr;
    use crate::meta::{Descriptor, FieldDescriptor, Relation};
    use std::rc::Rc;

    #[test]
    fn two_u8s() {
        let desc = Descriptor::new("Two")
            .field(FieldDescriptor::new("x", Relation::Primitive(Prim::U8)))
            .field(FieldDescriptor::new("y", Relation::Primitive(Prim::U8)))
            .build()
            .unwrap();
        let mut reader = Reader::new(&[0x09, 0x20], Endian::Big);
        let record = binread(&mut reader, &desc, None, &[]).unwrap();
        assert_eq!(record.get_field("x"), Some(&Value::U64(9)));
        assert_eq!(record.get_field("y"), Some(&Value::U64(32)));
    }

    #[test]
    fn length_prefixed_array() {
        let desc = Descriptor::new("Prefixed")
            .field(FieldDescriptor::new("len", Relation::Primitive(Prim::U8)))
            .field(
                FieldDescriptor::new("field", Relation::Primitive(Prim::U8))
                    .controller(Controller::Count(CountSpec::Expr(Expr::parse("len")))),
            )
            .build()
            .unwrap();
        let mut reader = Reader::new(&[0x03, 0x02, 0x03, 0x04], Endian::Big);
        let record = binread(&mut reader, &desc, None, &[]).unwrap();
        assert_eq!(record.get_field("len"), Some(&Value::U64(3)));
        assert_eq!(
            record.get_field("field"),
            Some(&Value::Array(vec![Value::U64(2), Value::U64(3), Value::U64(4)]))
        );
    }

    #[test]
    fn choice_dispatches_and_none_arm_reads_nothing() {
        use crate::condition::{ChoiceKey, ChoiceRelation, Conditions};
        use indexmap::IndexMap;

        let mut table = IndexMap::new();
        table.insert(ChoiceKey::Int(1), ChoiceRelation::Plain(Some(Relation::Primitive(Prim::U8))));
        table.insert(ChoiceKey::Int(2), ChoiceRelation::Plain(Some(Relation::Primitive(Prim::U16))));
        table.insert(ChoiceKey::Int(3), ChoiceRelation::Plain(None));

        let desc = Descriptor::new("Tagged")
            .field(FieldDescriptor::new("type", Relation::Primitive(Prim::U8)))
            .field(
                FieldDescriptor::new("payload", Relation::Unknown).condition(Conditions::Choice {
                    key: Expr::parse("type"),
                    table,
                }),
            )
            .build()
            .unwrap();

        let mut reader = Reader::new(&[0x02, 0x00, 0x01], Endian::Big);
        let record = binread(&mut reader, &desc, None, &[]).unwrap();
        assert_eq!(record.get_field("type"), Some(&Value::U64(2)));
        assert_eq!(record.get_field("payload"), Some(&Value::U64(1)));

        let mut reader = Reader::new(&[0x03, 0xFF], Endian::Big);
        let record = binread(&mut reader, &desc, None, &[]).unwrap();
        assert_eq!(record.get_field("type"), Some(&Value::U64(3)));
        assert_eq!(record.get_field("payload"), Some(&Value::Unit));
    }

    #[test]
    fn peek_restores_cursor_offset() {
        use crate::expr::Expr;
        use crate::prepost::PrePost;
        use crate::scope::HookScope;

        let desc = Descriptor::new("Peeked")
            .field(FieldDescriptor::new("value", Relation::Primitive(Prim::U8)).pre(PrePost::Peek(
                Some(Expr::parse("_ctx.two")),
                HookScope::Read,
            )))
            .build()
            .unwrap();
        let mut ctx = Context::new();
        ctx.set("two", Value::I64(2));
        let mut reader = Reader::new(&[0x01, 0x02, 0x03, 0x04], Endian::Big);
        let record = binread(&mut reader, &desc, Some(&mut ctx), &[]).unwrap();
        assert_eq!(record.get_field("value"), Some(&Value::U64(3)));
        assert_eq!(reader.offset(), 0);
    }

    #[test]
    fn until_eof_absorbs_sentinel() {
        let desc = Descriptor::new("Coords")
            .field(
                FieldDescriptor::new("coords", Relation::Primitive(Prim::U8))
                    .controller(Controller::Until(UntilStop::Eof)),
            )
            .build()
            .unwrap();
        let mut reader = Reader::new(&[0x03, 0x02, 0x03, 0x04], Endian::Big);
        let record = binread(&mut reader, &desc, None, &[]).unwrap();
        assert_eq!(
            record.get_field("coords"),
            Some(&Value::Array(vec![
                Value::U64(3),
                Value::U64(2),
                Value::U64(3),
                Value::U64(4)
            ]))
        );
    }

    #[test]
    fn ctx_set_feeds_sibling_field_count_expr() {
        use crate::meta::CtxAccessor;

        let desc = Descriptor::new("LenPrefixed")
            .field(FieldDescriptor::new("len", Relation::Primitive(Prim::U8)).ctx(CtxAccessor::Set("len".into())))
            .field(
                FieldDescriptor::new("payload", Relation::Primitive(Prim::U8))
                    .controller(Controller::Count(CountSpec::Expr(Expr::parse("_ctx.len")))),
            )
            .build()
            .unwrap();
        let mut ctx = Context::new();
        let mut reader = Reader::new(&[0x02, 0xAA, 0xBB], Endian::Big);
        let record = binread(&mut reader, &desc, Some(&mut ctx), &[]).unwrap();
        assert_eq!(record.get_field("len"), Some(&Value::U64(2)));
        assert_eq!(
            record.get_field("payload"),
            Some(&Value::Array(vec![Value::U64(0xAA), Value::U64(0xBB)]))
        );
        assert_eq!(ctx.get("len"), Some(&Value::U64(2)));
    }

    #[test]
    fn ctx_get_reads_without_consuming_bytes() {
        use crate::meta::CtxAccessor;

        let desc = Descriptor::new("Echo")
            .field(FieldDescriptor::new("len", Relation::Primitive(Prim::U8)).ctx(CtxAccessor::Set("len".into())))
            .field(
                FieldDescriptor::new("len_copy", Relation::Unknown).ctx(CtxAccessor::Get("len".into())),
            )
            .field(FieldDescriptor::new("next", Relation::Primitive(Prim::U8)))
            .build()
            .unwrap();
        let mut ctx = Context::new();
        let mut reader = Reader::new(&[0x07, 0x09], Endian::Big);
        let record = binread(&mut reader, &desc, Some(&mut ctx), &[]).unwrap();
        assert_eq!(record.get_field("len"), Some(&Value::U64(7)));
        assert_eq!(record.get_field("len_copy"), Some(&Value::U64(7)));
        // The Get accessor never touched the cursor: `next` reads the very next byte.
        assert_eq!(record.get_field("next"), Some(&Value::U64(9)));
    }

    #[test]
    fn self_referential_linked_list_via_select_and_type_slot() {
        use crate::condition::{Conditions, SelectFn};
        use crate::meta::TypeSlot;

        let slot = TypeSlot::new();
        let next_field = {
            let slot = slot.clone();
            let select: SelectFn = Rc::new(move |instance: &Value, _ctx| {
                Ok(if instance.get_field("has_next").and_then(|v| v.to_i64()) == Some(1) {
                    Relation::Nested(slot.resolve(), None)
                } else {
                    // A terminal node is marked by a single zero byte rather than by
                    // omitting the field outright: `Select` always yields a relation, it
                    // never means "no bytes".
                    Relation::Primitive(Prim::U8)
                })
            });
            FieldDescriptor::new("next", Relation::Unknown).condition(Conditions::Select(select))
        };
        let list_node = Descriptor::new("ListNode")
            .field(FieldDescriptor::new("value", Relation::Primitive(Prim::U8)))
            .field(FieldDescriptor::new("has_next", Relation::Primitive(Prim::U8)))
            .field(next_field)
            .build()
            .unwrap();
        slot.fill(Rc::clone(&list_node));

        // 10 -> 20 -> 30 -> terminator
        let mut reader = Reader::new(&[10, 1, 20, 1, 30, 0, 0], Endian::Big);
        let head = binread(&mut reader, &list_node, None, &[]).unwrap();
        assert_eq!(head.get_field("value"), Some(&Value::U64(10)));
        let tail = head.get_field("next").unwrap();
        assert_eq!(tail.get_field("value"), Some(&Value::U64(20)));
        let tail2 = tail.get_field("next").unwrap();
        assert_eq!(tail2.get_field("value"), Some(&Value::U64(30)));
        assert_eq!(tail2.get_field("next"), Some(&Value::U64(0)));
    }

    #[test]
    fn direct_self_reference_without_select_is_fatal() {
        let inner = Descriptor::new("Recursive")
            .field(FieldDescriptor::new("value", Relation::Primitive(Prim::U8)))
            .build()
            .unwrap();
        let desc = Descriptor::new("Recursive")
            .field(FieldDescriptor::new("value", Relation::Primitive(Prim::U8)))
            .field(FieldDescriptor::new("bad_next", Relation::Nested(inner, None)))
            .build()
            .unwrap();
        let mut reader = Reader::new(&[1, 2], Endian::Big);
        let err = binread(&mut reader, &desc, None, &[]).unwrap_err();
        assert!(matches!(err, Error::SelfReferringField { .. }));
    }

    #[test]
    fn bitfield_little_endian() {
        let bf = Descriptor::new("Bits")
            .field(FieldDescriptor::new("f1", Relation::Unknown).bitfield(2))
            .field(FieldDescriptor::new("f2", Relation::Unknown).bitfield(10))
            .field(FieldDescriptor::new("f3", Relation::Unknown).bitfield(3))
            .bitfield()
            .build()
            .unwrap();
        let desc = Descriptor::new("Wrapper")
            .endian(Endian::Little)
            .field(FieldDescriptor::new("bf", Relation::Nested(Rc::clone(&bf), None)))
            .field(FieldDescriptor::new("field", Relation::Primitive(Prim::U8)))
            .build()
            .unwrap();
        let mut reader = Reader::new(&[0x30, 0x41, 0x05], Endian::Big);
        let record = binread(&mut reader, &desc, None, &[]).unwrap();
        let bf_value = record.get_field("bf").unwrap();
        assert_eq!(bf_value.get_field("f1"), Some(&Value::U64(1)));
        assert_eq!(bf_value.get_field("f2"), Some(&Value::U64(0b0000010011)));
        assert_eq!(bf_value.get_field("f3"), Some(&Value::U64(0)));
        assert_eq!(record.get_field("field"), Some(&Value::U64(5)));
    }
}
