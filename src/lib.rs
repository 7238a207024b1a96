//! Loading and saving of PLY ("Stanford Polygon") files.
//!
//! A PLY file has an ASCII header declaring *elements* (e.g. `vertex` or
//! `face`), each with a number of rows and an ordered list of *properties*.
//! A property is either a scalar or a list of scalars with a per-row length.
//! The header is followed by the rows, encoded as ASCII text or as packed
//! little/big endian binary.
//!
//! [`load`] parses a complete file into a [`Scene`]. All rows of all elements
//! end up in one contiguous buffer; each element carries offset tables that
//! locate every value in it. Values are read through [`ElementView`]:
//!
//! ```
//! use plyio::{LoadOptions, ScalarValue};
//!
//! # fn main() -> Result<(), plyio::Error> {
//! let file = b"ply\n\
//!     format ascii 1.0\n\
//!     element vertex 2\n\
//!     property float x\n\
//!     property float y\n\
//!     element face 1\n\
//!     property list uchar int vertex_indices\n\
//!     end_header\n\
//!     0 0\n\
//!     1 0.5\n\
//!     2 0 1\n";
//!
//! let scene = plyio::load(file, &LoadOptions::new())?;
//! let vertices = scene.element("vertex").unwrap();
//! assert_eq!(vertices.scalar(1, 1)?, ScalarValue::Float(0.5));
//!
//! let faces = scene.element("face").unwrap();
//! assert_eq!(faces.list(0, 0)?.to_f64_vec(), [0.0, 1.0]);
//! # Ok(())
//! # }
//! ```
//!
//! To write a file, build elements with [`ElementBuilder`], add them to a
//! scene and [`serialize`] it (or use [`save_to_vec`] or [`save_to_file`]).
//!
//! Every buffer is obtained through an [`Allocator`] that can be passed to
//! the `*_with` variants of the entry points. The plain variants use the
//! global heap.

use static_assertions::const_assert;

#[macro_use]
mod error;

pub mod alloc;
mod read;
mod scalar;
mod scene;
pub mod util;
mod write;

pub use self::{
    alloc::{Allocator, Budget, Heap},
    error::{Error, ErrorKind, Result},
    read::{load, load_file, load_with, LoadOptions},
    scalar::{Scalar, ScalarType, ScalarTypeParseError, ScalarValue},
    scene::{
        DataType, Element, ElementView, Format, ListValue, ObjectInfo, Property, PropertyType,
        Scene, Value,
    },
    write::{
        save_to_file, save_to_vec, save_to_vec_with, serialize, write_to, ElementBuilder,
        SaveOptions,
    },
};


/// Maximum length of element, property and `obj_info` names in bytes.
pub const MAX_NAME_LEN: usize = 127;

/// Maximum length of a single header line in bytes.
pub const MAX_HEADER_LINE_LEN: usize = 200_000;

const_assert!(MAX_NAME_LEN < MAX_HEADER_LINE_LEN);

// In-row offsets are `u32`, row starts are `u64`.
const_assert!(std::mem::size_of::<usize>() >= std::mem::size_of::<u32>());

/// Checks that `name` can be written into a header line: not empty, at most
/// `MAX_NAME_LEN` bytes and free of whitespace.
pub(crate) fn check_name(name: &str, what: &str) -> Result<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(err!(
            BoundsExceeded,
            "{} name '{}' is longer than {} bytes",
            what,
            name,
            MAX_NAME_LEN,
        ));
    }
    if name.is_empty() || name.bytes().any(|b| util::is_blank(b) || util::is_line_end(b)) {
        return Err(err!(Generic, "invalid {} name {:?}", what, name));
    }

    Ok(())
}
