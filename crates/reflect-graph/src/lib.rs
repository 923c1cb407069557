//! Runtime type reflection and object-graph serialization.
//!
//! Types register a [`TypeDescriptor`] describing their name, byte layout,
//! parent and members; live instances are then serialized to a textual
//! stream and reconstructed into fresh allocations, preserving the full
//! object graph including sub-objects shared through pointers.

// crate-specific lint exceptions:
#![allow(unsafe_code, clippy::missing_errors_doc)]
#![warn(missing_docs)]

mod error;
pub use error::*;

mod stream;
pub use stream::*;

mod descriptor;
pub use descriptor::*;

mod registry;
pub use registry::*;

mod value;
pub use value::*;

mod pointer_table;
pub use pointer_table::*;

mod walker;

mod primitives;

/// Top-level serialize/deserialize entry points.
pub mod utils;
pub use utils::{deserialize, serialize, serialize_to_string};
