//! The `binwrite` interpreter (spec §4.13) and `compute_bin_size`.
//!
//! Mirrors `reader.rs`: same field order, same relation/condition resolution (but against
//! an already-fully-built instance instead of one being grown), reversed transformer
//! order, no validators. Grounded the same way as `reader.rs` on `rs-ipfix-rw`'s
//! `#[bw(...)]` side of its fields.

use tracing::trace;

use crate::bitfield;
use crate::codec::Prim;
use crate::condition;
use crate::context::Context;
use crate::controller::{Controller, CountSpec, TargetType};
use crate::cursor::Writer;
use crate::error::{BinResult, Error};
use crate::expr::Scope;
use crate::meta::{CtxAccessor, Descriptor, FieldDescriptor, Relation};
use crate::prepost;
use crate::transform;
use crate::value::Value;

/// Encode `instance` as one record of `descriptor` into `writer`.
pub fn binwrite(writer: &mut Writer, descriptor: &Descriptor, instance: &Value) -> BinResult<()> {
    let mut ctx: Option<&mut Context> = None;
    binwrite_inner(writer, descriptor, instance, &mut ctx)
}

/// Like [`binwrite`], but threads an ambient [`Context`] the way [`binwrite`]'s read-side
/// counterpart does, for descriptors whose fields use `_ctx.`-prefixed expressions.
pub fn binwrite_with_context(
    writer: &mut Writer,
    descriptor: &Descriptor,
    instance: &Value,
    ctx: &mut Context,
) -> BinResult<()> {
    let mut ctx = Some(ctx);
    binwrite_inner(writer, descriptor, instance, &mut ctx)
}

/// Dry-run `binwrite` into a scratch writer and report the byte extent it would occupy.
pub fn compute_bin_size(descriptor: &Descriptor, instance: &Value) -> BinResult<u64> {
    let endian = descriptor.default_endian.unwrap_or(crate::cursor::Endian::Big);
    let mut writer = Writer::new(endian);
    binwrite(&mut writer, descriptor, instance)?;
    Ok(writer.extent())
}

fn binwrite_inner(
    writer: &mut Writer,
    descriptor: &Descriptor,
    instance: &Value,
    ctx: &mut Option<&mut Context>,
) -> BinResult<()> {
    let mut endian_restore = None;
    if let Some(endian) = descriptor.default_endian {
        endian_restore = Some(writer.endian());
        writer.set_endian(endian);
    }

    let class_pre = prepost::run_pre(&descriptor.class_pre, writer, instance, ctx.as_deref(), true)?;

    let result = if descriptor.is_bitfield {
        write_bitfield_record(writer, descriptor, instance)
    } else {
        write_fields(writer, descriptor, instance, ctx)
    };

    prepost::run_restores(&class_pre.restores, writer);
    let result = result.and_then(|()| {
        let post = prepost::run_pre(&descriptor.class_post, writer, instance, ctx.as_deref(), true)?;
        prepost::run_restores(&post.restores, writer);
        Ok(())
    });

    if let Some(prior) = endian_restore {
        writer.set_endian(prior);
    }

    result
}

fn write_bitfield_record(writer: &mut Writer, descriptor: &Descriptor, instance: &Value) -> BinResult<()> {
    let mut raw = Vec::with_capacity(descriptor.fields.len());
    for field in &descriptor.fields {
        let stored = instance.get_field(&field.name).cloned().unwrap_or(Value::U64(0));
        let value = transform::apply_write_chain(&field.transformers, stored, instance)?;
        raw.push(value.to_u64().ok_or_else(|| Error::WrongArgumentReturnType {
            field: field.name.clone(),
        })?);
    }
    let bytes = bitfield::write_bitfield(&descriptor.fields, &raw, writer.endian());
    writer.write_raw(&bytes);
    Ok(())
}

fn write_fields(
    writer: &mut Writer,
    descriptor: &Descriptor,
    instance: &Value,
    ctx: &mut Option<&mut Context>,
) -> BinResult<()> {
    for field in &descriptor.fields {
        write_field(writer, descriptor, field, instance, ctx).map_err(|e| e.nest_path(&field.name))?;
    }
    Ok(())
}

fn write_field(
    writer: &mut Writer,
    descriptor: &Descriptor,
    field: &FieldDescriptor,
    instance: &Value,
    ctx: &mut Option<&mut Context>,
) -> BinResult<()> {
    trace!(field = %field.name, offset = writer.offset(), "writing field");

    let pre = prepost::run_pre(&field.pre, writer, instance, ctx.as_deref(), true)?;

    for accessor in &field.ctx {
        if let CtxAccessor::Set(key) = accessor {
            if let Some(c) = ctx.as_deref_mut() {
                if let Some(v) = instance.get_field(&field.name) {
                    c.set(key, v.clone());
                }
            }
        }
    }

    // ValueSet pre-hooks on write override the emitted value outright (a back-patch
    // style field whose cursor-visible bytes never come from the instance). A CtxGet
    // accessor consumes no bytes on read, so it writes none either.
    if pre.forced_value.is_none() && ctx_get_key(field).is_none() {
        let stored = instance.get_field(&field.name).cloned().unwrap_or(Value::Unit);
        let raw = transform::apply_write_chain(&field.transformers, stored, instance)?;
        let relation = resolve_relation(descriptor, field, instance, ctx.as_deref())?;
        if let Some(relation) = relation {
            write_relation_with_controller(writer, field, &relation, &raw, instance, ctx)?;
        }
    } else if let Some(forced) = pre.forced_value {
        let raw = transform::apply_write_chain(&field.transformers, forced, instance)?;
        let relation = resolve_relation(descriptor, field, instance, ctx.as_deref())?;
        if let Some(relation) = relation {
            write_relation_with_controller(writer, field, &relation, &raw, instance, ctx)?;
        }
    }

    let post = prepost::run_pre(&field.post, writer, instance, ctx.as_deref(), true)?;
    prepost::run_restores(&post.restores, writer);
    prepost::run_restores(&pre.restores, writer);

    Ok(())
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

fn write_one(
    writer: &mut Writer,
    relation: &Relation,
    value: &Value,
    ctx: &mut Option<&mut Context>,
) -> BinResult<()> {
    match relation {
        Relation::Primitive(prim) => writer
            .write(*prim, value)
            .ok_or_else(|| Error::WrongArgumentReturnType { field: String::new() }),
        Relation::Nested(desc, _) => binwrite_inner(writer, desc, value, ctx),
        Relation::Unknown => unreachable!("relation must be resolved before write_one"),
    }
}

fn write_relation_with_controller(
    writer: &mut Writer,
    field: &FieldDescriptor,
    relation: &Relation,
    value: &Value,
    instance: &Value,
    ctx: &mut Option<&mut Context>,
) -> BinResult<()> {
    let Some((controller, options)) = &field.controller else {
        return write_one(writer, relation, value, ctx);
    };

    let start_offset = writer.offset();
    let elements = elements_of(value, options.target_type);

    match controller {
        Controller::Count(_) => {
            for elt in &elements {
                write_one(writer, relation, elt, ctx)?;
            }
            if let Some(k) = options.alignment {
                align_forward(writer, k);
            }
        }
        Controller::While(_) => {
            for elt in &elements {
                write_one(writer, relation, elt, ctx)?;
            }
            if let Some(k) = options.alignment {
                align_forward(writer, k);
            }
        }
        Controller::Until(stop) => {
            for elt in &elements {
                write_one(writer, relation, elt, ctx)?;
            }
            if matches!(stop, crate::controller::UntilStop::Eof) {
                // Nothing further to emit: EOF is a read-side sentinel, not a byte.
            }
            if let Some(k) = options.alignment {
                align_forward(writer, k);
            }
        }
        Controller::Matrix(_, _) => {
            let Value::Array(rows) = value else {
                return Err(Error::WrongArgumentReturnType { field: field.name.clone() });
            };
            for row in rows {
                let Value::Array(cols) = row else {
                    return Err(Error::WrongArgumentReturnType { field: field.name.clone() });
                };
                for elt in cols {
                    write_one(writer, relation, elt, ctx)?;
                }
                if let Some(stride) = options.alignment {
                    align_forward(writer, stride);
                }
            }
        }
        Controller::MapTo(_) => {
            let Relation::Nested(desc, _) = relation else {
                return Err(Error::WrongArgumentReturnType { field: field.name.clone() });
            };
            let Value::Array(items) = value else {
                return Err(Error::WrongArgumentReturnType { field: field.name.clone() });
            };
            for item in items {
                binwrite_inner(writer, desc, item, ctx)?;
            }
            if let Some(k) = options.alignment {
                align_forward(writer, k);
            }
        }
        Controller::EnsureSize(expr) => {
            write_one(writer, relation, value, ctx)?;
            let scope = Scope { instance, ctx: ctx.as_deref() };
            let size = expr.eval_i64(&scope)? as u64;
            let end = start_offset + size;
            if writer.offset() > end {
                return Err(Error::Custom {
                    field: field.name.clone(),
                    message: format!("write overran EnsureSize bound ({} > {})", writer.offset(), end),
                });
            }
            writer.seek(end);
            if let Some(k) = options.alignment {
                align_forward(writer, k);
            }
        }
        Controller::Padding(n) => {
            write_one(writer, relation, value, ctx)?;
            align_forward(writer, *n);
        }
        Controller::NullTerminatedString => {
            let Value::Str(s) = value else {
                return Err(Error::WrongArgumentReturnType { field: field.name.clone() });
            };
            for byte in s.bytes() {
                let _ = writer.write(Prim::U8, &Value::U64(byte as u64));
            }
            let _ = writer.write(Prim::U8, &Value::U64(0));
            if let Some(alignment) = options.alignment {
                align_forward(writer, alignment);
            }
        }
    }

    if options.peek {
        writer.seek(start_offset);
    }

    Ok(())
}

fn elements_of(value: &Value, target: TargetType) -> Vec<Value> {
    match (value, target) {
        (Value::Array(items), _) => items.clone(),
        (Value::Str(s), TargetType::Str) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
        (other, _) => vec![other.clone()],
    }
}

fn align_forward(writer: &mut Writer, boundary: u64) {
    if boundary == 0 {
        return;
    }
    let offset = writer.offset();
    let aligned = offset.div_ceil(boundary) * boundary;
    writer.seek(aligned);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Endian;
    use crate::expr::Expr;
    use crate::meta::{Descriptor, FieldDescriptor, Relation};
    use indexmap::IndexMap;
    use std::rc::Rc;

    fn record(fields: &[(&str, Value)]) -> Value {
        let mut m = IndexMap::new();
        for (k, v) in fields {
            m.insert((*k).to_owned(), v.clone());
        }
        Value::Record(m)
    }

    #[test]
    fn two_u8s_round_trip() {
        let desc = Descriptor::new("Two")
            .field(FieldDescriptor::new("x", Relation::Primitive(Prim::U8)))
            .field(FieldDescriptor::new("y", Relation::Primitive(Prim::U8)))
            .build()
            .unwrap();
        let instance = record(&[("x", Value::U64(9)), ("y", Value::U64(32))]);
        let mut writer = Writer::new(Endian::Big);
        binwrite(&mut writer, &desc, &instance).unwrap();
        assert_eq!(writer.into_buffer(), vec![0x09, 0x20]);
    }

    #[test]
    fn length_prefixed_array_round_trip() {
        let desc = Descriptor::new("Prefixed")
            .field(FieldDescriptor::new("len", Relation::Primitive(Prim::U8)))
            .field(
                FieldDescriptor::new("field", Relation::Primitive(Prim::U8))
                    .controller(Controller::Count(CountSpec::Expr(Expr::parse("len")))),
            )
            .build()
            .unwrap();
        let instance = record(&[
            ("len", Value::U64(3)),
            ("field", Value::Array(vec![Value::U64(2), Value::U64(3), Value::U64(4)])),
        ]);
        let mut writer = Writer::new(Endian::Big);
        binwrite(&mut writer, &desc, &instance).unwrap();
        assert_eq!(writer.into_buffer(), vec![0x03, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn bitfield_little_endian_round_trip() {
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
        let instance = record(&[
            ("bf", record(&[("f1", Value::U64(1)), ("f2", Value::U64(0b0000010011)), ("f3", Value::U64(0))])),
            ("field", Value::U64(5)),
        ]);
        let mut writer = Writer::new(Endian::Big);
        binwrite(&mut writer, &desc, &instance).unwrap();
        assert_eq!(writer.into_buffer(), vec![0x30, 0x41, 0x05]);
    }

    #[test]
    fn compute_bin_size_matches_written_extent() {
        let desc = Descriptor::new("Two")
            .field(FieldDescriptor::new("x", Relation::Primitive(Prim::U8)))
            .field(FieldDescriptor::new("y", Relation::Primitive(Prim::U16)))
            .build()
            .unwrap();
        let instance = record(&[("x", Value::U64(1)), ("y", Value::U64(2))]);
        assert_eq!(compute_bin_size(&desc, &instance).unwrap(), 3);
    }
}
