//! Controllers: the repetition/shaping strategies a field can apply over its relation
//! (spec §4.5). A controller describes *how many times* (or *until what*) a relation is
//! read/written and what shape the resulting collection takes; the loop itself is driven
//! by [`crate::reader`]/[`crate::writer`] since it needs the cursor, the conditions, and
//! the transformer/validator chain all at once.
//!
//! Grounded on `rs-ipfix-rw`'s `#[br(count = ...)]`, `#[br(until_eof)]` and
//! `#[br(until_limit = ...)]` attributes (count-based and sentinel-based repetition over
//! the same element type) and `binread::attribute`'s `pad_size_to`/`align_after` sections
//! for the padding controller.

use crate::expr::Expr;

/// How many elements a `Count`-controlled field reads, or how the element count of a
/// `While`/`Until` read is exposed once known.
#[derive(Clone)]
pub enum CountSpec {
    /// A fixed literal count, known at descriptor-build time.
    Fixed(u64),
    /// An expression evaluated against the in-flight record (e.g. a previously-read
    /// length field).
    Expr(Expr),
}

/// What `Until` stops on.
#[derive(Clone)]
pub enum UntilStop {
    /// Stop once the cursor is exhausted; the absorbed [`crate::value::Value::Eof`] is
    /// dropped, not appended to the result.
    Eof,
    /// Stop once the most recently read element equals this value.
    Value(crate::value::Value),
    /// Stop once a predicate over the most recently read element returns true.
    Predicate(std::rc::Rc<dyn Fn(&crate::value::Value) -> bool>),
}

/// Where the repeated elements are collected when decoding finishes: a flat `Value::Array`
/// of elements, or — when every element is a one-byte `char` — a single `Value::Str`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Array,
    Str,
}

impl Default for TargetType {
    fn default() -> Self {
        TargetType::Array
    }
}

#[derive(Clone)]
pub enum Controller {
    /// Read the relation exactly `count` times.
    Count(CountSpec),
    /// Read the relation while a predicate over the record built so far holds, checked
    /// *before* each read (so it can read zero elements).
    While(std::rc::Rc<dyn Fn(&crate::value::Value) -> bool>),
    /// Read the relation until a stop condition is met, checked *after* each read.
    Until(UntilStop),
    /// A two-dimensional `Count` x `Count` repetition, flattened into nested
    /// `Value::Array`s (outer length first).
    Matrix(CountSpec, CountSpec),
    /// One element per item of the list `expr` evaluates to; each item is passed as the
    /// nested relation's constructor arguments (a `Value::Array` item is spread, a scalar
    /// item is wrapped as a single-element argument list).
    MapTo(Expr),
    /// Consume/produce exactly `size` bytes regardless of how many elements fit,
    /// discarding (read) or zero-padding (write) the remainder.
    EnsureSize(Expr),
    /// Align the cursor to the next multiple of `boundary` bytes after this field,
    /// writing zero padding.
    Padding(u64),
    /// Read one byte at a time until a NUL, excluding it from the resulting string; on
    /// write, append a single NUL after the string's bytes.
    NullTerminatedString,
}

/// Per-controller knobs that apply independently of which `Controller` variant is in use.
#[derive(Clone, Default)]
pub struct ControllerOptions {
    /// Round the element count/size up to this byte boundary before stopping.
    pub alignment: Option<u64>,
    /// Check the stop/count condition without consuming the triggering read (peek ahead
    /// rather than commit).
    pub peek: bool,
    /// Validate that the relation's width divides evenly into the target size (used by
    /// `EnsureSize` to catch calling conventions where padding is an error, not a fill).
    pub primitive_check: bool,
    pub target_type: TargetType,
}
