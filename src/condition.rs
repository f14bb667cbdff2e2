//! Runtime selection among candidate relations for an otherwise-`Unknown` field
//! (spec §4.6).
//!
//! Grounded on `rs-ipfix-rw`'s `#[br(pre_assert(set_id == N))]`-gated enum variants
//! (`Records::Template`/`OptionsTemplate`/`Data`), which dispatch on a sibling field the
//! way [`Conditions::Choice`] dispatches on a resolved key, and on `binread::attribute`'s
//! discussion of `Select`-style indirection for recursive types.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::context::Context;
use crate::error::{BinResult, Error};
use crate::expr::{Expr, Scope};
use crate::meta::{ArgsFn, Relation};
use crate::value::Value;

pub type PredicateFn = Rc<dyn Fn(&Value, Option<&Context>) -> bool>;
/// A late-bound relation lookup, invoked at read/write time rather than at descriptor
/// build time. This is the only sanctioned way to describe a recursive type: the closure
/// may look up a [`crate::meta::Descriptor`] that is still under construction via a
/// [`crate::meta::TypeSlot`].
pub type SelectFn = Rc<dyn Fn(&Value, Option<&Context>) -> BinResult<Relation>>;

#[derive(Clone)]
pub struct ConditionArm {
    pub predicate: PredicateFn,
    /// `None` means "this arm contributes no bytes".
    pub relation: Option<Relation>,
}

impl ConditionArm {
    pub fn new(predicate: PredicateFn, relation: Option<Relation>) -> Self {
        Self { predicate, relation }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ChoiceKey {
    Int(i64),
    Str(String),
}

impl ChoiceKey {
    pub fn from_value(value: &Value) -> Option<ChoiceKey> {
        match value {
            Value::Str(s) => Some(ChoiceKey::Str(s.clone())),
            other => other.to_i64().map(ChoiceKey::Int),
        }
    }
}

#[derive(Clone)]
pub enum ChoiceRelation {
    Plain(Option<Relation>),
    /// A relation plus an expression evaluated to build the nested type's constructor
    /// arguments, mirroring the spec's `[relation, argsExpr]` table entries.
    WithArgs(Relation, Expr),
}

/// The three ways spec §4.6 lets a field's relation be resolved at runtime.
#[derive(Clone)]
pub enum Conditions {
    /// `IfThen`/`Else` chain: first matching predicate wins; `default` is the `Else`
    /// arm, if any.
    Chain {
        arms: Vec<ConditionArm>,
        default: Option<Option<Relation>>,
    },
    /// Switch on a resolved key.
    Choice {
        key: Expr,
        table: IndexMap<ChoiceKey, ChoiceRelation>,
    },
    Select(SelectFn),
}

/// Resolve `conditions` against the in-flight `instance`, returning the relation to use
/// (`None` meaning "no bytes for this field") or a fatal error.
pub fn resolve(
    conditions: &Conditions,
    field: &str,
    instance: &Value,
    ctx: Option<&Context>,
) -> BinResult<Option<Relation>> {
    match conditions {
        Conditions::Chain { arms, default } => {
            for arm in arms {
                if (arm.predicate)(instance, ctx) {
                    return Ok(arm.relation.clone());
                }
            }
            default
                .clone()
                .ok_or_else(|| Error::NoConditionMatched { field: field.to_owned() })
        }
        Conditions::Choice { key, table } => {
            let scope = Scope { instance, ctx };
            let key_value = key.eval(&scope)?;
            let choice_key = ChoiceKey::from_value(&key_value)
                .ok_or_else(|| Error::NoConditionMatched { field: field.to_owned() })?;
            match table.get(&choice_key) {
                Some(ChoiceRelation::Plain(r)) => Ok(r.clone()),
                Some(ChoiceRelation::WithArgs(relation, args_expr)) => {
                    Ok(Some(inject_args(relation.clone(), args_expr.clone())))
                }
                None => Err(Error::NoConditionMatched { field: field.to_owned() }),
            }
        }
        Conditions::Select(select) => select(instance, ctx).map(Some),
    }
}

fn inject_args(relation: Relation, args_expr: Expr) -> Relation {
    match relation {
        Relation::Nested(desc, _) => {
            let args_fn: ArgsFn = Rc::new(move |instance: &Value, ctx: Option<&Context>| {
                let scope = Scope { instance, ctx };
                let value = args_expr.eval(&scope)?;
                Ok(match value {
                    Value::Array(items) => items,
                    other => vec![other],
                })
            });
            Relation::Nested(desc, Some(args_fn))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Prim;
    use indexmap::IndexMap;

    #[test]
    fn choice_dispatches_on_key() {
        let mut table = IndexMap::new();
        table.insert(ChoiceKey::Int(1), ChoiceRelation::Plain(Some(Relation::Primitive(Prim::U8))));
        table.insert(ChoiceKey::Int(2), ChoiceRelation::Plain(Some(Relation::Primitive(Prim::U16))));
        table.insert(ChoiceKey::Int(3), ChoiceRelation::Plain(None));
        let conditions = Conditions::Choice {
            key: Expr::parse("type"),
            table,
        };

        let mut m = IndexMap::new();
        m.insert("type".to_owned(), Value::I64(2));
        let instance = Value::Record(m);
        let resolved = resolve(&conditions, "payload", &instance, None).unwrap();
        assert!(matches!(resolved, Some(Relation::Primitive(Prim::U16))));
    }

    #[test]
    fn choice_outside_table_is_fatal() {
        let table: IndexMap<ChoiceKey, ChoiceRelation> = IndexMap::new();
        let conditions = Conditions::Choice {
            key: Expr::parse("type"),
            table,
        };
        let mut m = IndexMap::new();
        m.insert("type".to_owned(), Value::I64(9));
        let instance = Value::Record(m);
        let err = resolve(&conditions, "payload", &instance, None).unwrap_err();
        assert!(matches!(err, Error::NoConditionMatched { .. }));
    }

    #[test]
    fn chain_first_matching_arm_wins() {
        let conditions = Conditions::Chain {
            arms: vec![
                ConditionArm::new(Rc::new(|v: &Value, _ctx| v.get_field("flag").and_then(Value::to_i64) == Some(1)), Some(Relation::Primitive(Prim::U8))),
                ConditionArm::new(Rc::new(|_v: &Value, _ctx| true), Some(Relation::Primitive(Prim::U16))),
            ],
            default: None,
        };

        let mut m = IndexMap::new();
        m.insert("flag".to_owned(), Value::I64(1));
        let instance = Value::Record(m);
        let resolved = resolve(&conditions, "payload", &instance, None).unwrap();
        assert!(matches!(resolved, Some(Relation::Primitive(Prim::U8))));
    }

    #[test]
    fn chain_falls_through_to_default() {
        let conditions = Conditions::Chain {
            arms: vec![ConditionArm::new(Rc::new(|_v: &Value, _ctx| false), Some(Relation::Primitive(Prim::U8)))],
            default: Some(Some(Relation::Primitive(Prim::U16))),
        };

        let instance = Value::Record(IndexMap::new());
        let resolved = resolve(&conditions, "payload", &instance, None).unwrap();
        assert!(matches!(resolved, Some(Relation::Primitive(Prim::U16))));
    }

    #[test]
    fn chain_no_match_and_no_default_is_fatal() {
        let conditions = Conditions::Chain {
            arms: vec![ConditionArm::new(Rc::new(|_v: &Value, _ctx| false), Some(Relation::Primitive(Prim::U8)))],
            default: None,
        };

        let instance = Value::Record(IndexMap::new());
        let err = resolve(&conditions, "payload", &instance, None).unwrap_err();
        assert!(matches!(err, Error::NoConditionMatched { .. }));
    }
}
