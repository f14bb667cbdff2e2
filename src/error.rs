//! The public error taxonomy.
//!
//! Every fallible entry point returns [`BinResult<T>`]. Errors carry a dotted field-name
//! path and a cursor offset where one was available at the point of failure, the runtime
//! analogue of `rs-ipfix-rw`'s `IpfixError::into_binrw_error(self, pos: u64)`.

use thiserror::Error;

pub type BinResult<T> = Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("unexpected end of buffer at `{field}` (offset {offset:#x})")]
    Eof { field: String, offset: u64 },

    #[error("`{field}` nests its own enclosing type without an indirection")]
    SelfReferringField { field: String },

    #[error("`{field}` has no primitive, nested, or condition-resolved relation")]
    UnknownPropertyType { field: String },

    #[error("no condition matched for `{field}` and no default was given")]
    NoConditionMatched { field: String },

    #[error("relation for `{field}` was never defined")]
    RelationNotDefined { field: String },

    #[error("relation for `{field}` was already defined")]
    RelationAlreadyDefined { field: String },

    #[error("nested type `{type_tag}` has no fields")]
    ReferringToEmptyClass { type_tag: String },

    #[error("argument resolver for `{field}` did not return an array")]
    WrongArgumentReturnType { field: String },

    #[error("validation failed for `{field}` = {value} (offset {offset:#x})")]
    ValidationTestFailed {
        field: String,
        value: String,
        offset: u64,
    },

    #[error("reference error: `{path}` not found")]
    Reference { path: String },

    #[error("`{type_tag}` mixes bitfield and non-bitfield fields")]
    WrongBitfieldClassImplementation { type_tag: String },

    #[error("a user error occurred at `{field}`: {message}")]
    Custom { field: String, message: String },
}

impl Error {
    /// Prefix the field path carried by this error with an enclosing field name, so a
    /// failure inside a nested record reads as `outer.inner` by the time it reaches the
    /// top-level `binread`/`binwrite` call.
    pub fn nest_path(self, outer: &str) -> Error {
        fn prefix(field: String, outer: &str) -> String {
            if field.is_empty() {
                outer.to_owned()
            } else {
                format!("{outer}.{field}")
            }
        }
        match self {
            Error::Eof { field, offset } => Error::Eof {
                field: prefix(field, outer),
                offset,
            },
            Error::SelfReferringField { field } => Error::SelfReferringField {
                field: prefix(field, outer),
            },
            Error::UnknownPropertyType { field } => Error::UnknownPropertyType {
                field: prefix(field, outer),
            },
            Error::NoConditionMatched { field } => Error::NoConditionMatched {
                field: prefix(field, outer),
            },
            Error::RelationNotDefined { field } => Error::RelationNotDefined {
                field: prefix(field, outer),
            },
            Error::RelationAlreadyDefined { field } => Error::RelationAlreadyDefined {
                field: prefix(field, outer),
            },
            Error::WrongArgumentReturnType { field } => Error::WrongArgumentReturnType {
                field: prefix(field, outer),
            },
            Error::ValidationTestFailed {
                field,
                value,
                offset,
            } => Error::ValidationTestFailed {
                field: prefix(field, outer),
                value,
                offset,
            },
            Error::Custom { field, message } => Error::Custom {
                field: prefix(field, outer),
                message,
            },
            other => other,
        }
    }
}
