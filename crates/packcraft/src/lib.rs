//! # packcraft
//!
//! Resolves declarative packet field schemas into zero-copy byte layouts.
//!
//! Describe a packet as an ordered list of fields with optional explicit
//! positions, sizes, bit widths and union alternates. Resolution computes every
//! field's offset and size (as static values or buffer-dependent expressions),
//! picks a read/write strategy per field, validates the layout as a whole and
//! returns an immutable [plan::LayoutPlan]. The plan is then used to read and
//! write concrete buffers in place.
//!
//! ## Example
//!
//! ```
//! use packcraft::field::FieldDescriptor;
//! use packcraft::schema::Schema;
//! use packcraft::types::{DeclaredType, Primitive};
//! use packcraft::view::Value;
//!
//! let plan = Schema::new("IcmpEcho")
//!     .field(FieldDescriptor::new("Type", Primitive::U8))
//!     .field(FieldDescriptor::new("Code", Primitive::U8))
//!     .field(FieldDescriptor::new("Checksum", Primitive::U16))
//!     .field(FieldDescriptor::new("Identifier", Primitive::U16))
//!     .field(FieldDescriptor::new("Sequence", Primitive::U16))
//!     .field(FieldDescriptor::new("Data", DeclaredType::Bytes))
//!     .resolve()
//!     .unwrap();
//! assert_eq!(plan.minimum_size(), 8);
//!
//! let packet = [8, 0, 0xf7, 0xfd, 0, 1, 0, 1, 0xde, 0xad];
//! let view = plan.view(&packet).unwrap();
//! assert_eq!(view.get("Sequence").unwrap(), Value::Unsigned(1));
//! assert_eq!(view.to_string(), "Type: 8; Code: 0; Checksum: 63485; Identifier: 1; Sequence: 1; Data: 2 bytes");
//! ```

pub mod bits;
pub mod capability;
pub mod config;
pub mod errors;
pub mod expr;
pub mod field;
pub mod plan;
pub mod position;
pub mod schema;
#[cfg(feature = "serde")]
pub mod serde;
pub mod size;
pub mod types;
pub mod value;
pub mod view;

mod union;
mod validate;
