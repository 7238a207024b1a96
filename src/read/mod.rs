//! Everything related to reading a PLY file.
//!
//! Loading happens in three steps. First the header is parsed into a
//! skeleton of elements and properties. Then the data section is walked once
//! to find out how many bytes every row needs and where each value will be
//! placed. After a single allocation for the rows of all elements, the data
//! section is walked a second time and every value is decoded into its place.
//!
//! Some notes on what is accepted:
//!
//! - Header lines may be terminated by `'\n'`, `"\r\n"`, `'\r'` or `'\0'`.
//!   Blank lines and surrounding whitespace are ignored.
//! - `end_header` followed by `"\r\n"` consumes both bytes only if the `ply`
//!   line also ends in `"\r\n"`. Otherwise the `'\n'` is the first body byte.
//! - Comment text is kept verbatim after the single separator that follows
//!   `comment`, including further whitespace.
//! - Element, property and `obj_info` names must be valid UTF-8.
//! - Unknown header keywords are ignored.
//! - Besides the canonical type names, the sized aliases `int8`, `uint8`,
//!   `int16`, `uint16`, `int32`, `uint32`, `float32` and `float64` are
//!   accepted.
//! - Bytes after the last row of the last element are ignored.

use std::{fs, path::Path};

use log::debug;

use crate::{
    alloc::{Allocator, Heap},
    error::{Error, Result},
    scene::{Format, Scene},
};

mod ascii;
mod binary;
mod header;
mod layout;
#[cfg(test)]
mod tests;


/// Options for loading a scene.
///
/// ```
/// use plyio::LoadOptions;
///
/// let opts = LoadOptions::new()
///     .only_elements(&["vertex"])
///     .save_comments(true);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub(crate) elements: Option<Vec<String>>,
    pub(crate) save_comments: bool,
    pub(crate) allow_any_version: bool,
}

impl LoadOptions {
    /// Loads all elements, drops comments and only accepts version 1.0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts loading to the elements with the given names. The rows of
    /// all other elements are skipped and those elements do not appear in
    /// the scene at all.
    pub fn only_elements<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.elements = Some(names.iter().map(|s| s.as_ref().to_owned()).collect());
        self
    }

    /// Whether to keep the `comment` lines of the header.
    pub fn save_comments(mut self, save: bool) -> Self {
        self.save_comments = save;
        self
    }

    /// Whether to accept `format` lines with a version other than `1.0`.
    pub fn allow_any_version(mut self, allow: bool) -> Self {
        self.allow_any_version = allow;
        self
    }

    pub(crate) fn wants_element(&self, name: &str) -> bool {
        match &self.elements {
            None => true,
            Some(names) => names.iter().any(|n| n == name),
        }
    }
}

/// Loads a scene from the complete contents of a PLY file.
pub fn load(data: &[u8], opts: &LoadOptions) -> Result<Scene> {
    load_with(data, opts, &Heap)
}

/// Like [`load`], but every buffer of the scene is allocated with `alloc`.
pub fn load_with<A: Allocator>(data: &[u8], opts: &LoadOptions, alloc: &A) -> Result<Scene> {
    debug!("loading PLY scene from {} bytes", data.len());

    let header = header::parse(data, opts)?;
    debug!(
        "parsed header: format {} {}, {} elements, data starts at byte {}",
        header.format,
        header.version,
        header.elements.len(),
        header.data_start,
    );

    let body = &data[header.data_start..];
    let (elements, rows) = match header.format {
        Format::Ascii => layout::plan::<ascii::AsciiCodec, _>(body, header.format, header.elements, alloc)?,
        _ => layout::plan::<binary::BinaryCodec, _>(body, header.format, header.elements, alloc)?,
    };

    let scene = Scene {
        format: header.format,
        version: header.version,
        elements,
        object_infos: header.object_infos,
        comments: header.comments,
        data: rows,
    };
    debug!("loaded {} elements with {} bytes of row data", scene.elements.len(), scene.data.len());

    Ok(scene)
}

/// Reads the file at `path` and loads it with [`load`].
pub fn load_file(path: impl AsRef<Path>, opts: &LoadOptions) -> Result<Scene> {
    let path = path.as_ref();
    debug!("reading '{}'", path.display());

    let data = fs::read(path).map_err(Error::FileRead)?;
    load(&data, opts)
}
