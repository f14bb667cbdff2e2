//! Read-time validators (spec §4.8).
//!
//! Grounded on `rs-ipfix-rw`'s `#[br(assert(...))]` fields (e.g. `TemplateRecord`'s
//! `template_id > 255` check), which fail the whole parse with context about what was
//! being validated.

use std::rc::Rc;

use crate::value::Value;

pub type ValidatorFn = Rc<dyn Fn(&Value) -> bool>;

#[derive(Clone)]
pub enum Validator {
    /// Deep-equality comparison against a literal, including arrays.
    Match(Value),
    /// An arbitrary predicate, with an optional name surfaced in the error.
    Validate(ValidatorFn, Option<&'static str>),
}

impl Validator {
    pub fn check(&self, value: &Value) -> bool {
        match self {
            Validator::Match(expected) => expected == value,
            Validator::Validate(pred, _) => pred(value),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Validator::Match(_) => "match",
            Validator::Validate(_, Some(name)) => name,
            Validator::Validate(_, None) => "validate",
        }
    }
}
