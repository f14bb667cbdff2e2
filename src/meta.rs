//! The per-type metadata store: [`Descriptor`] and [`FieldDescriptor`] (spec §3, §4.3).
//!
//! A descriptor is built once, by chaining builder methods, the runtime stand-in for
//! stacking `#[br(...)]` attributes on a derived struct. Grounded on `rs-ipfix-rw`'s
//! `TemplateStorage` trait (a registry keyed by a runtime id rather than a compile-time
//! type) and on `binread::attribute`'s enumeration of per-field aspects and their
//! precedence order.

use std::cell::RefCell;
use std::rc::Rc;

use crate::bitfield;
use crate::codec::Prim;
use crate::condition::Conditions;
use crate::context::Context;
use crate::controller::{Controller, ControllerOptions};
use crate::cursor::Endian;
use crate::error::{BinResult, Error};
use crate::prepost::PrePost;
use crate::scope::HookScope;
use crate::transform::Transformer;
use crate::validate::Validator;
use crate::value::Value;

pub type ArgsFn = Rc<dyn Fn(&Value, Option<&Context>) -> BinResult<Vec<Value>>>;

/// What a field reads: a fixed-width primitive, a nested record type (with optional
/// constructor-argument resolver), or `Unknown` (resolved at read/write time through the
/// field's [`Conditions`]).
#[derive(Clone)]
pub enum Relation {
    Primitive(Prim),
    Nested(Rc<Descriptor>, Option<ArgsFn>),
    Unknown,
}

impl std::fmt::Debug for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relation::Primitive(p) => f.debug_tuple("Primitive").field(p).finish(),
            Relation::Nested(d, args) => f
                .debug_tuple("Nested")
                .field(&d.type_tag)
                .field(&args.is_some())
                .finish(),
            Relation::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Where to read a field with a [`crate::condition::Conditions::Select`] or a lazily-resolved
/// self-reference: a slot that starts empty and is filled in once the recursive
/// descriptor finishes construction.
///
/// ```
/// use std::rc::Rc;
/// use binspector::meta::{Descriptor, FieldDescriptor, Relation, TypeSlot};
/// use binspector::codec::Prim;
/// use binspector::condition::{Conditions, SelectFn};
///
/// let slot = TypeSlot::new();
/// let recurse = {
///     let slot = slot.clone();
///     let select: SelectFn = Rc::new(move |instance, _ctx| {
///         Ok(if instance.get_field("has_next").and_then(|v| v.to_i64()) == Some(1) {
///             Relation::Nested(slot.resolve(), None)
///         } else {
///             Relation::Primitive(Prim::U8) // placeholder, unreachable in this sketch
///         })
///     });
///     FieldDescriptor::new("next", Relation::Unknown)
///         .condition(Conditions::Select(select))
/// };
/// let list_node = Descriptor::new("ListNode")
///     .field(FieldDescriptor::new("value", Relation::Primitive(Prim::U8)))
///     .field(recurse)
///     .build()
///     .unwrap();
/// slot.fill(list_node);
/// ```
#[derive(Clone)]
pub struct TypeSlot(Rc<RefCell<Option<Rc<Descriptor>>>>);

impl TypeSlot {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(None)))
    }

    pub fn fill(&self, descriptor: Rc<Descriptor>) {
        *self.0.borrow_mut() = Some(descriptor);
    }

    /// Resolve the slot. Panics if called before [`TypeSlot::fill`] — a descriptor-build
    /// ordering bug, not a data-dependent runtime failure, so it is not part of
    /// `BinResult`.
    pub fn resolve(&self) -> Rc<Descriptor> {
        self.0
            .borrow()
            .clone()
            .expect("TypeSlot read before the recursive descriptor finished building")
    }
}

impl Default for TypeSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// A context accessor attached to a field (spec §4.11): either pulls the field's value
/// from the ambient [`Context`] instead of the cursor (`Get`), or copies the field's
/// final value into the context after it is read (`Set`).
#[derive(Clone)]
pub enum CtxAccessor {
    Get(String),
    Set(String),
}

/// One field's full aspect chain.
#[derive(Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub relation: Relation,
    pub controller: Option<(Controller, ControllerOptions)>,
    pub conditions: Option<Conditions>,
    pub transformers: Vec<Transformer>,
    pub validators: Vec<Validator>,
    pub pre: Vec<PrePost>,
    pub post: Vec<PrePost>,
    pub bitfield_width: Option<u32>,
    pub ctx: Vec<CtxAccessor>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, relation: Relation) -> Self {
        Self {
            name: name.into(),
            relation,
            controller: None,
            conditions: None,
            transformers: Vec::new(),
            validators: Vec::new(),
            pre: Vec::new(),
            post: Vec::new(),
            bitfield_width: None,
            ctx: Vec::new(),
        }
    }

    pub fn controller(mut self, controller: Controller) -> Self {
        self.controller = Some((controller, ControllerOptions::default()));
        self
    }

    pub fn controller_with_options(mut self, controller: Controller, options: ControllerOptions) -> Self {
        self.controller = Some((controller, options));
        self
    }

    pub fn condition(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub fn transform(mut self, t: Transformer) -> Self {
        self.transformers.push(t);
        self
    }

    pub fn validate(mut self, v: Validator) -> Self {
        self.validators.push(v);
        self
    }

    pub fn pre(mut self, p: PrePost) -> Self {
        self.pre.push(p);
        self
    }

    pub fn post(mut self, p: PrePost) -> Self {
        self.post.push(p);
        self
    }

    pub fn bitfield(mut self, width: u32) -> Self {
        self.bitfield_width = Some(width);
        self
    }

    pub fn ctx(mut self, accessor: CtxAccessor) -> Self {
        self.ctx.push(accessor);
        self
    }

    /// Convenience for the common `#[br(magic = ...)]` case: a validator on a field
    /// whose value is never exposed beyond this check belongs to the caller; this just
    /// attaches the equality validator.
    pub fn magic(self, literal: Value) -> Self {
        self.validate(Validator::Match(literal))
    }
}

/// A record type's ordered field list plus class-level hooks and default endianness.
pub struct Descriptor {
    pub type_tag: String,
    pub default_endian: Option<Endian>,
    pub class_pre: Vec<PrePost>,
    pub class_post: Vec<PrePost>,
    pub fields: Vec<FieldDescriptor>,
    pub is_bitfield: bool,
}

impl std::fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Descriptor")
            .field("type_tag", &self.type_tag)
            .field("is_bitfield", &self.is_bitfield)
            .field("field_count", &self.fields.len())
            .finish()
    }
}

impl Descriptor {
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            default_endian: None,
            class_pre: Vec::new(),
            class_post: Vec::new(),
            fields: Vec::new(),
            is_bitfield: false,
        }
    }

    pub fn endian(mut self, endian: Endian) -> Self {
        self.default_endian = Some(endian);
        self
    }

    pub fn pre(mut self, p: PrePost) -> Self {
        self.class_pre.push(p);
        self
    }

    pub fn post(mut self, p: PrePost) -> Self {
        self.class_post.push(p);
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Mark every field in this descriptor as a packed bitfield group (spec §4.10). All
    /// fields must already carry a `bitfield_width`; [`Descriptor::build`] enforces this.
    pub fn bitfield(mut self) -> Self {
        self.is_bitfield = true;
        self
    }

    /// Validate the invariants in spec §3 and finish construction.
    pub fn build(self) -> BinResult<Rc<Descriptor>> {
        if self.fields.is_empty() {
            return Err(Error::ReferringToEmptyClass {
                type_tag: self.type_tag,
            });
        }
        let any_bitfield = self.fields.iter().any(|f| f.bitfield_width.is_some());
        let all_bitfield = self.fields.iter().all(|f| f.bitfield_width.is_some());
        if self.is_bitfield && !all_bitfield {
            return Err(Error::WrongBitfieldClassImplementation {
                type_tag: self.type_tag,
            });
        }
        if !self.is_bitfield && any_bitfield {
            return Err(Error::WrongBitfieldClassImplementation {
                type_tag: self.type_tag,
            });
        }
        if self.is_bitfield {
            bitfield::total_bits(&self.fields); // panics-free sanity pass
        }
        Ok(Rc::new(self))
    }

    pub(crate) fn field_offset(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}
