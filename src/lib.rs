//! Binspector: a declarative engine for reading and writing binary file formats.
//!
//! A format is described by building a [`meta::Descriptor`] out of
//! [`meta::FieldDescriptor`]s at runtime — no derive macro, no compile-time struct — and
//! then handed to [`binread`]/[`binwrite`] against a byte slice. This trades the
//! zero-cost, compile-time-checked layout of a `#[derive(BinRead)]` struct for the
//! ability to build a layout from data the program only learns at runtime (a format
//! registry loaded from a config file, a protocol negotiated at connect time, and so on).
//!
//! ```
//! use binspector::codec::Prim;
//! use binspector::cursor::{Endian, Reader};
//! use binspector::meta::{Descriptor, FieldDescriptor, Relation};
//!
//! let desc = Descriptor::new("Point")
//!     .field(FieldDescriptor::new("x", Relation::Primitive(Prim::U16)))
//!     .field(FieldDescriptor::new("y", Relation::Primitive(Prim::U16)))
//!     .build()
//!     .unwrap();
//!
//! let mut reader = Reader::new(&[0x00, 0x01, 0x00, 0x02], Endian::Big);
//! let point = binspector::binread(&mut reader, &desc, None, &[]).unwrap();
//! assert_eq!(point.get_field("x"), Some(&binspector::value::Value::U64(1)));
//! ```

pub mod attribute;
pub mod bitfield;
pub mod codec;
pub mod condition;
pub mod context;
pub mod controller;
pub mod cursor;
pub mod error;
pub mod expr;
pub mod meta;
pub mod prepost;
pub mod reader;
pub mod scope;
pub mod transform;
pub mod validate;
pub mod value;
pub mod writer;

pub use context::Context;
pub use cursor::{Endian, Reader, Writer};
pub use error::{BinResult, Error};
pub use meta::{Descriptor, FieldDescriptor};
pub use reader::binread;
pub use value::Value;
pub use writer::{binwrite, binwrite_with_context, compute_bin_size};
