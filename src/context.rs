//! The ambient key/value tree threaded through a `binread`/`binwrite` call.
//!
//! Grounded on `rs-ipfix-rw`'s `Rc<Formatter>`/`TemplateStore` values, which are threaded
//! through every nested `#[br(import(...))]`/`#[br(args(...))]` as an out-of-band side
//! channel shared by sibling and descendant records. `Context` generalizes that into a
//! single dotted-path tree instead of one bespoke struct per format.

use indexmap::IndexMap;

use crate::value::Value;

/// Ambient storage available to [`crate::expr::Expr`] via its `_ctx.` prefix and to
/// [`crate::meta::CtxAccessor`] hooks.
#[derive(Debug, Default, Clone)]
pub struct Context {
    root: IndexMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a dotted path (`"a.b.c"`), traversing nested records.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for seg in segments {
            current = current.get_field(seg)?;
        }
        Some(current)
    }

    /// Write `value` at a dotted path, creating intermediate `Value::Record` nodes as
    /// needed. Overwrites any non-record node standing in the way of a deeper path.
    pub fn set(&mut self, path: &str, value: Value) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let last = segments.pop().expect("path must have at least one segment");
        let mut map = &mut self.root;
        for seg in segments {
            let entry = map
                .entry(seg.to_owned())
                .or_insert_with(|| Value::Record(IndexMap::new()));
            if !matches!(entry, Value::Record(_)) {
                *entry = Value::Record(IndexMap::new());
            }
            map = entry.as_record_mut().expect("just normalized to a record");
        }
        map.insert(last.to_owned(), value);
    }
}
