//! Pre/post hooks that mutate the cursor around a field (spec §4.9).
//!
//! Grounded on `binread::attribute`'s "Restore Position"/"Offset" sections and on
//! `rs-ipfix-rw`'s `#[bw(restore_position, try_calc = write_position_at(s, length, 0))]`
//! back-patch pattern, where a field jumps the cursor, writes a previously-unknown value,
//! then snaps the cursor back so subsequent fields are unaffected.

use std::rc::Rc;

use crate::context::Context;
use crate::cursor::{CursorLike, Endian};
use crate::error::BinResult;
use crate::expr::{Expr, Scope};
use crate::scope::HookScope;
use crate::value::Value;

pub type ValueFn = Rc<dyn Fn(&Value, Option<&Context>) -> BinResult<Value>>;
pub type EndianFn = Rc<dyn Fn(&Value, Option<&Context>) -> Endian>;

#[derive(Clone)]
pub enum EndianSpec {
    Fixed(Endian),
    Cond(EndianFn),
}

#[derive(Clone)]
pub enum PrePost {
    /// Seek to `addr` before reading/writing. Never auto-restores: subsequent fields
    /// continue from the jumped position.
    Offset(Expr, HookScope),
    /// Like `Offset`, but always restores the prior cursor offset once this field is
    /// done. `Peek(None)` restores after a single primitive read at the current
    /// position (used by the `restore_position` attribute).
    Peek(Option<Expr>, HookScope),
    /// Sets the cursor's endianness for the duration of this field, then always
    /// restores the prior endianness.
    Endian(EndianSpec, HookScope),
    /// Supplies the field's value directly from `fn(instance, ctx)`. On read this
    /// consumes no bytes at all. On write it overrides the value the relation/controller
    /// pipeline will emit, the way `try_calc` recomputes a back-patched length.
    ValueSet(ValueFn, HookScope),
}

impl PrePost {
    pub fn scope(&self) -> HookScope {
        match self {
            PrePost::Offset(_, s)
            | PrePost::Peek(_, s)
            | PrePost::Endian(_, s)
            | PrePost::ValueSet(_, s) => *s,
        }
    }
}

/// What a pre-hook needs undone once the field is fully processed.
pub enum Restore {
    Offset(u64),
    Endian(Endian),
}

pub fn undo<C: CursorLike>(restore: &Restore, cursor: &mut C) {
    match restore {
        Restore::Offset(o) => cursor.seek(*o),
        Restore::Endian(e) => cursor.set_endian(*e),
    }
}

/// The outcome of running a field's pre-hooks: cursor-restore actions to run once the
/// field's value is fully read/written, plus an optional forced value from `ValueSet`.
pub struct PreOutcome {
    pub restores: Vec<Restore>,
    pub forced_value: Option<Value>,
}

/// Run every hook in `hooks` whose scope matches `on_write` (false = read direction),
/// in declaration order, against `cursor`.
pub fn run_pre<C: CursorLike>(
    hooks: &[PrePost],
    cursor: &mut C,
    instance: &Value,
    ctx: Option<&Context>,
    on_write: bool,
) -> BinResult<PreOutcome> {
    let mut restores = Vec::new();
    let mut forced_value = None;
    let scope = Scope { instance, ctx };

    for hook in hooks {
        let applies = if on_write {
            hook.scope().applies_on_write()
        } else {
            hook.scope().applies_on_read()
        };
        if !applies {
            continue;
        }
        match hook {
            PrePost::Offset(expr, _) => {
                let addr = expr.eval_i64(&scope)? as u64;
                cursor.seek(addr);
            }
            PrePost::Peek(addr, _) => {
                let prior = cursor.offset();
                if let Some(addr) = addr {
                    cursor.seek(addr.eval_i64(&scope)? as u64);
                }
                restores.push(Restore::Offset(prior));
            }
            PrePost::Endian(spec, _) => {
                let prior = cursor.endian();
                let new_endian = match spec {
                    EndianSpec::Fixed(e) => *e,
                    EndianSpec::Cond(f) => f(instance, ctx),
                };
                cursor.set_endian(new_endian);
                restores.push(Restore::Endian(prior));
            }
            PrePost::ValueSet(f, _) => {
                forced_value = Some(f(instance, ctx)?);
            }
        }
    }

    Ok(PreOutcome {
        restores,
        forced_value,
    })
}

/// Undo every restore collected by [`run_pre`], in reverse (LIFO) order.
pub fn run_restores<C: CursorLike>(restores: &[Restore], cursor: &mut C) {
    for r in restores.iter().rev() {
        undo(r, cursor);
    }
}
