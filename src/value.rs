//! The dynamic value tree that flows through the engine.
//!
//! Because [`crate::meta::Descriptor`]s are built programmatically rather than derived
//! from a concrete Rust struct, a record instance has no compile-time fields the engine
//! could reach by reflection. `Value` is the runtime stand-in: every decoded field, every
//! nested record, and every context entry is one of these.

use indexmap::IndexMap;

/// A decoded or to-be-encoded value.
///
/// [`Value::Eof`] is a distinguished sentinel returned by [`crate::cursor::Reader::read`]
/// on buffer exhaustion; it never appears as the result of a successful, fully-resolved
/// field unless a controller explicitly stores it (which none do).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Cursor exhaustion sentinel. Distinct from every other variant.
    Eof,
    /// The value of a field with no relation (a condition arm or ctx accessor that
    /// consumes no bytes and sets nothing).
    Unit,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    /// An ordered field map, order-preserving so declaration order survives round-trips
    /// and so the expression resolver can do positional reasoning if ever needed.
    Record(IndexMap<String, Value>),
}

impl Value {
    pub fn is_eof(&self) -> bool {
        matches!(self, Value::Eof)
    }

    pub fn record() -> Self {
        Value::Record(IndexMap::new())
    }

    pub fn as_record(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Record(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Record(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a field by name on a `Value::Record`, or `None` for anything else
    /// (including a record missing that field).
    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.as_record().and_then(|m| m.get(name))
    }

    /// Coerce to an integer for arithmetic, counts, and comparisons. Bools coerce to
    /// `0`/`1` the way a packed bitfield flag does.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            Value::U64(v) => i64::try_from(*v).ok(),
            Value::F64(v) => Some(*v as i64),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn to_u64(&self) -> Option<u64> {
        match self {
            Value::U64(v) => Some(*v),
            Value::I64(v) => u64::try_from(*v).ok(),
            Value::F64(v) => Some(*v as u64),
            Value::Bool(b) => Some(*b as u64),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            Value::I64(v) => Some(*v as f64),
            Value::U64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn to_usize(&self) -> Option<usize> {
        self.to_i64().and_then(|v| usize::try_from(v).ok())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_lookup_on_non_record_is_none() {
        assert_eq!(Value::I64(3).get_field("x"), None);
    }

    #[test]
    fn numeric_coercions() {
        assert_eq!(Value::U64(5).to_i64(), Some(5));
        assert_eq!(Value::Bool(true).to_u64(), Some(1));
        assert_eq!(Value::F64(2.5).to_i64(), Some(2));
    }
}
