//! Bidirectional value transformers (spec §4.7).
//!
//! Grounded on `rs-ipfix-rw`'s `#[br(map = |x: Vec<TemplateRecord>| { ...; x })]` fields,
//! which apply a function to a freshly-read value before it is stored. `Scale`/`Offset`
//! are the built-ins named by the spec; `Custom` generalizes `map` to a pair of mutually
//! inverse functions so the same field round-trips on write.

use std::rc::Rc;

use crate::error::BinResult;
use crate::scope::HookScope;
use crate::value::Value;

pub type TransformFn = Rc<dyn Fn(&Value, &Value) -> BinResult<Value>>;

#[derive(Clone)]
pub enum TransformKind {
    /// Multiply by `k` on read, divide by `k` on write.
    Scale(f64),
    /// Add `k` on read, subtract `k` on write.
    Offset(f64),
    /// An arbitrary pair of mutually-inverse functions, each `fn(value, instance)`.
    Custom { forward: TransformFn, backward: TransformFn },
}

#[derive(Clone)]
pub struct Transformer {
    pub kind: TransformKind,
    pub scope: HookScope,
}

impl Transformer {
    pub fn scale(k: f64, scope: HookScope) -> Self {
        Self {
            kind: TransformKind::Scale(k),
            scope,
        }
    }

    pub fn offset(k: f64, scope: HookScope) -> Self {
        Self {
            kind: TransformKind::Offset(k),
            scope,
        }
    }

    pub fn custom(forward: TransformFn, backward: TransformFn, scope: HookScope) -> Self {
        Self {
            kind: TransformKind::Custom { forward, backward },
            scope,
        }
    }

    pub fn apply_read(&self, value: &Value, instance: &Value) -> BinResult<Value> {
        match &self.kind {
            TransformKind::Scale(k) => Ok(numeric_map(value, |v| v * k)),
            TransformKind::Offset(k) => Ok(numeric_map(value, |v| v + k)),
            TransformKind::Custom { forward, .. } => forward(value, instance),
        }
    }

    pub fn apply_write(&self, value: &Value, instance: &Value) -> BinResult<Value> {
        match &self.kind {
            TransformKind::Scale(k) => Ok(numeric_map(value, |v| v / k)),
            TransformKind::Offset(k) => Ok(numeric_map(value, |v| v - k)),
            TransformKind::Custom { backward, .. } => backward(value, instance),
        }
    }
}

fn numeric_map(value: &Value, f: impl Fn(f64) -> f64) -> Value {
    match value.to_f64() {
        Some(n) => {
            let mapped = f(n);
            match value {
                Value::F64(_) => Value::F64(mapped),
                Value::I64(_) => Value::I64(mapped as i64),
                _ => Value::U64(mapped as u64),
            }
        }
        None => value.clone(),
    }
}

/// Apply every read-scope transformer in declaration order.
pub fn apply_read_chain(
    transformers: &[Transformer],
    mut value: Value,
    instance: &Value,
) -> BinResult<Value> {
    for t in transformers.iter().filter(|t| t.scope.applies_on_read()) {
        value = t.apply_read(&value, instance)?;
    }
    Ok(value)
}

/// Apply every write-scope transformer in *reverse* declaration order (spec §4.7).
pub fn apply_write_chain(
    transformers: &[Transformer],
    mut value: Value,
    instance: &Value,
) -> BinResult<Value> {
    for t in transformers.iter().rev().filter(|t| t.scope.applies_on_write()) {
        value = t.apply_write(&value, instance)?;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_round_trips() {
        let t = Transformer::scale(2.0, HookScope::Both);
        let read = t.apply_read(&Value::I64(4), &Value::Unit).unwrap();
        assert_eq!(read, Value::I64(8));
        let written = t.apply_write(&read, &Value::Unit).unwrap();
        assert_eq!(written, Value::I64(4));
    }

    #[test]
    fn chain_order_is_reversed_on_write() {
        let chain = vec![
            Transformer::offset(1.0, HookScope::Both),
            Transformer::scale(2.0, HookScope::Both),
        ];
        // read: (x + 1) * 2 ; write must invert in reverse: (/2) then (-1)
        let read = apply_read_chain(&chain, Value::I64(3), &Value::Unit).unwrap();
        assert_eq!(read, Value::I64(8));
        let written = apply_write_chain(&chain, read, &Value::Unit).unwrap();
        assert_eq!(written, Value::I64(3));
    }
}
