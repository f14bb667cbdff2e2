//! A documentation-only module listing the builder-method equivalent of every per-field
//! aspect (spec §4.3).
//!
//! # List of aspects
//!
//! | Aspect | Builder call | Description
//! |--------|--------------|------------
//! | Byteorder | [`Descriptor::endian`](crate::meta::Descriptor::endian) | Set the default endianness for every field in a record
//! | Magic | [`FieldDescriptor::magic`](crate::meta::FieldDescriptor::magic) | Read a value and assert it equals a literal
//! | Assert | [`FieldDescriptor::validate`](crate::meta::FieldDescriptor::validate) | After reading, check a predicate over the value
//! | Controller | [`FieldDescriptor::controller`](crate::meta::FieldDescriptor::controller) | Repeat the relation a `Count`/`While`/`Until`/`Matrix` number of times, or reshape it (`MapTo`, `EnsureSize`, `Padding`, `NullTerminatedString`)
//! | Condition | [`FieldDescriptor::condition`](crate::meta::FieldDescriptor::condition) | Resolve the relation at read/write time from a `Chain`, `Choice`, or `Select`
//! | Transform | [`FieldDescriptor::transform`](crate::meta::FieldDescriptor::transform) | Apply a bidirectional value map (`Scale`, `Offset`, or a custom forward/backward pair)
//! | Pre/Post hook | [`FieldDescriptor::pre`](crate::meta::FieldDescriptor::pre)/[`FieldDescriptor::post`](crate::meta::FieldDescriptor::post) | Jump the cursor, peek, switch endianness, or force a value around a field
//! | Context accessor | [`FieldDescriptor::ctx`](crate::meta::FieldDescriptor::ctx) | Read a field's value from, or copy it into, the ambient [`Context`](crate::context::Context) instead of the cursor
//! | Bitfield width | [`FieldDescriptor::bitfield`](crate::meta::FieldDescriptor::bitfield) | Declare this field as N packed bits within an enclosing bitfield [`Descriptor`](crate::meta::Descriptor)
//!
//! # Byteorder
//!
//! [`Descriptor::endian`](crate::meta::Descriptor::endian) sets the endianness every field
//! reads/writes with for the lifetime of that record, restored once the record finishes.
//! Fields that need a different order wrap themselves in a nested one-field `Descriptor`
//! with its own `.endian(...)`, or use a [`PrePost::Endian`](crate::prepost::PrePost::Endian)
//! hook when the order is only known from a sibling field's value:
//!
//! ```
//! use binspector::meta::{Descriptor, FieldDescriptor, Relation};
//! use binspector::prepost::{EndianSpec, PrePost};
//! use binspector::scope::HookScope;
//! use binspector::codec::Prim;
//! use binspector::cursor::Endian;
//!
//! let desc = Descriptor::new("Mixed")
//!     .endian(Endian::Big)
//!     .field(FieldDescriptor::new("flag", Relation::Primitive(Prim::U8)))
//!     .field(
//!         FieldDescriptor::new("value", Relation::Primitive(Prim::U32)).pre(PrePost::Endian(
//!             EndianSpec::Cond(std::rc::Rc::new(|instance, _ctx| {
//!                 if instance.get_field("flag").and_then(|v| v.to_i64()) == Some(1) {
//!                     Endian::Little
//!                 } else {
//!                     Endian::Big
//!                 }
//!             })),
//!             HookScope::Both,
//!         )),
//!     )
//!     .build();
//! assert!(desc.is_ok());
//! ```
//!
//! # Magic
//!
//! [`FieldDescriptor::magic`](crate::meta::FieldDescriptor::magic) attaches a
//! [`Validator::Match`](crate::validate::Validator::Match) against a literal `Value`, the
//! runtime form of `#[br(magic = b"TEST")]`. Since the field is still an ordinary field, it
//! must be given a relation to actually consume the magic bytes — typically a fixed-size
//! `Bytes` read via a `Count`/`EnsureSize` controller, or a single primitive for a short tag.
//!
//! # Controllers
//!
//! A controller turns one relation read into a sequence. `Count`/`Matrix` take a fixed or
//! expression-derived size; `While`/`Until` stop on a runtime condition instead, the
//! runtime form of binread's `#[br(count = ...)]` versus a manually written loop. See
//! [`Controller`](crate::controller::Controller) for the full set and their semantics.
//!
//! # Conditions
//!
//! A field with [`Relation::Unknown`](crate::meta::Relation::Unknown) is resolved through
//! [`Conditions`](crate::condition::Conditions) at read/write time — the runtime analogue
//! of a derived enum whose variant is picked by a `#[br(pre_assert(...))]`-gated match.
//! `Conditions::Select` is the only sanctioned way to describe a self-referential (tree
//! or linked-list) type; see [`TypeSlot`](crate::meta::TypeSlot) for the construction
//! pattern.
//!
//! # Pre/post hooks
//!
//! [`PrePost`](crate::prepost::PrePost) covers `restore_position` (`Peek`), `seek_before`/
//! `seek_after` (`Offset`), `is_big`/`is_little` (`Endian`), and `calc`/`try_calc`
//! (`ValueSet`) — attached separately to a field's `pre` (before the relation is read or
//! written) and `post` (after) chains, and scoped to read, write, or both via
//! [`HookScope`](crate::scope::HookScope).
//!
//! # Context accessors
//!
//! [`CtxAccessor`](crate::meta::CtxAccessor) is the runtime form of `#[br(import(...))]`/
//! `#[br(args(...))]`: `Get` pulls a value out of the ambient
//! [`Context`](crate::context::Context) instead of the cursor (consuming no bytes either
//! direction); `Set` copies a field's resolved value into the context once read, so a
//! descendant or sibling record's expression can reference it via `_ctx.path`.
//!
//! # Bitfields
//!
//! A [`Descriptor`](crate::meta::Descriptor) built with
//! [`Descriptor::bitfield`](crate::meta::Descriptor::bitfield) treats every one of its
//! fields as a packed bit-group rather than a byte-aligned value; each field declares its
//! width with [`FieldDescriptor::bitfield`](crate::meta::FieldDescriptor::bitfield). See
//! [`crate::bitfield`] for the packing layout.
