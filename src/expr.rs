//! A tiny expression language for cross-field lookups, parsed once at descriptor-build
//! time and evaluated against the in-flight record instance plus the ambient [`Context`].
//!
//! Syntax (spec §4.4): a dotted path (`a.b.c`), an optional leading `_ctx.` to read from
//! the context instead of the instance, comma-separated paths (evaluated to a list, used
//! to build nested constructor argument tuples), and a single `path (+|-|*|/) integer`
//! arithmetic term.

use crate::context::Context;
use crate::error::{BinResult, Error};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone)]
enum Term {
    Path { ctx: bool, segments: Vec<String> },
    Arith { ctx: bool, segments: Vec<String>, op: ArithOp, literal: i64 },
}

/// A parsed expression. Build once with [`Expr::parse`], evaluate many times with
/// [`Expr::eval`].
#[derive(Debug, Clone)]
pub struct Expr {
    terms: Vec<Term>,
}

/// The scope an expression resolves against: the partially- or fully-built record
/// instance, and the ambient context (absent for expressions that cannot reference it,
/// e.g. when no `Context` was passed to `binread`/`binwrite`).
pub struct Scope<'a> {
    pub instance: &'a Value,
    pub ctx: Option<&'a Context>,
}

impl Expr {
    pub fn parse(source: &str) -> Expr {
        let terms = source.split(',').map(|part| parse_term(part.trim())).collect();
        Expr { terms }
    }

    /// Evaluate every comma-separated term, returning a single `Value` for a one-term
    /// expression or a `Value::Array` for a multi-term list.
    pub fn eval(&self, scope: &Scope) -> BinResult<Value> {
        if self.terms.len() == 1 {
            eval_term(&self.terms[0], scope)
        } else {
            let values = self
                .terms
                .iter()
                .map(|t| eval_term(t, scope))
                .collect::<BinResult<Vec<_>>>()?;
            Ok(Value::Array(values))
        }
    }

    /// Evaluate and coerce to an integer, for the common case of counts, offsets, and
    /// sizes.
    pub fn eval_i64(&self, scope: &Scope) -> BinResult<i64> {
        let value = self.eval(scope)?;
        value
            .to_i64()
            .ok_or_else(|| Error::WrongArgumentReturnType {
                field: source_hint(self),
            })
    }
}

fn source_hint(expr: &Expr) -> String {
    format!("{expr:?}")
}

fn parse_term(part: &str) -> Term {
    let (ctx, rest) = match part.strip_prefix("_ctx.") {
        Some(rest) => (true, rest),
        None => (false, part),
    };

    for op in [
        (" + ", ArithOp::Add),
        (" - ", ArithOp::Sub),
        (" * ", ArithOp::Mul),
        (" / ", ArithOp::Div),
        ("+", ArithOp::Add),
        ("-", ArithOp::Sub),
        ("*", ArithOp::Mul),
        ("/", ArithOp::Div),
    ] {
        if let Some(idx) = rest.find(op.0) {
            let (path, literal) = rest.split_at(idx);
            let literal = literal[op.0.len()..].trim();
            if let Ok(literal) = literal.parse::<i64>() {
                return Term::Arith {
                    ctx,
                    segments: split_path(path.trim()),
                    op: op.1,
                    literal,
                };
            }
        }
    }

    Term::Path {
        ctx,
        segments: split_path(rest),
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('.').map(|s| s.to_owned()).collect()
}

fn resolve_path(ctx_flag: bool, segments: &[String], scope: &Scope) -> BinResult<Value> {
    let root = if ctx_flag {
        scope
            .ctx
            .ok_or_else(|| Error::Reference {
                path: segments.join("."),
            })?
            .get(&segments.join("."))
            .cloned()
            .ok_or_else(|| Error::Reference {
                path: segments.join("."),
            })?
    } else {
        let mut current = scope.instance.clone();
        for seg in segments {
            current = current
                .get_field(seg)
                .cloned()
                .ok_or_else(|| Error::Reference { path: seg.clone() })?;
        }
        current
    };
    Ok(root)
}

fn eval_term(term: &Term, scope: &Scope) -> BinResult<Value> {
    match term {
        Term::Path { ctx, segments } => resolve_path(*ctx, segments, scope),
        Term::Arith {
            ctx,
            segments,
            op,
            literal,
        } => {
            let base = resolve_path(*ctx, segments, scope)?;
            let base = base.to_i64().ok_or_else(|| Error::WrongArgumentReturnType {
                field: segments.join("."),
            })?;
            let result = match op {
                ArithOp::Add => base + literal,
                ArithOp::Sub => base - literal,
                ArithOp::Mul => base * literal,
                ArithOp::Div => base / literal,
            };
            Ok(Value::I64(result))
        }
    }
}
