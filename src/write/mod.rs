//! Everything related to writing a PLY file.
//!
//! Saving follows a measure-then-write protocol: [`serialize`] called without
//! a destination only computes the exact number of bytes the file will have.
//! Called again with a buffer of (at least) that size, it writes the file
//! into the buffer. [`save_to_vec`], [`write_to`] and [`save_to_file`] are
//! built on the same rendering code.
//!
//! Some notes on the output:
//!
//! - The header is always terminated by `'\n'` line breaks, as done by
//!   basically every PLY file in the wild.
//! - The version is always written as `1.0`.
//! - In ASCII, floating point values are written with a fixed number of
//!   decimals (configured in [`SaveOptions`]) and then trailing zeros are
//!   removed.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use byteorder::{BigEndian, LittleEndian, NativeEndian};
use log::debug;

use crate::{
    alloc::{Allocator, Heap},
    error::{Error, Result},
    scalar::{format_decimal, ScalarType, ScalarValue},
    scene::{Element, Format, PropertyType, Scene},
};

mod builder;

pub use self::builder::ElementBuilder;


// ===============================================================================================
// ===== Save options
// ===============================================================================================

/// Options for saving a scene.
///
/// ```
/// use plyio::SaveOptions;
///
/// let opts = SaveOptions::new().float_decimals(6).double_decimals(15);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    float_decimals: u8,
    double_decimals: u16,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveOptions {
    /// Creates options with 10 decimals for `float` and 50 for `double`
    /// values, which is enough for every value to survive a round trip
    /// through ASCII.
    pub fn new() -> Self {
        Self {
            float_decimals: 10,
            double_decimals: 50,
        }
    }

    /// Sets the number of decimals for `float` values in ASCII files.
    pub fn float_decimals(mut self, decimals: u8) -> Self {
        self.float_decimals = decimals;
        self
    }

    /// Sets the number of decimals for `double` values (data and `obj_info`)
    /// in ASCII files.
    pub fn double_decimals(mut self, decimals: u16) -> Self {
        self.double_decimals = decimals;
        self
    }

    fn format(&self, v: ScalarValue) -> String {
        v.format(self.float_decimals, self.double_decimals)
    }
}


// ===============================================================================================
// ===== Entry points
// ===============================================================================================

/// Renders `scene` into `dst`, or only measures it if `dst` is `None`.
///
/// Returns the number of bytes the file has. When a destination is given
/// that is too small, nothing is written and `BoundsExceeded` is returned.
/// Bytes beyond the returned length are left untouched.
pub fn serialize(scene: &Scene, dst: Option<&mut [u8]>, opts: &SaveOptions) -> Result<usize> {
    let len = measure(scene, opts)?;

    let dst = match dst {
        None => return Ok(len),
        Some(dst) => dst,
    };
    if dst.len() < len {
        return Err(err!(
            BoundsExceeded,
            "destination holds {} bytes, but {} are needed",
            dst.len(),
            len,
        ));
    }

    let mut cursor = &mut dst[..len];
    render(scene, &mut cursor, opts)
        .map_err(|e| err!(BoundsExceeded, "writing into the destination failed: {}", e))?;
    debug!("serialized {} elements into {} bytes ({})", scene.elements.len(), len, scene.format);

    Ok(len)
}

/// Renders `scene` into a new vector of exactly the right size.
pub fn save_to_vec(scene: &Scene, opts: &SaveOptions) -> Result<Vec<u8>> {
    save_to_vec_with(scene, opts, &Heap)
}

/// Like [`save_to_vec`], but the output buffer is allocated with `alloc`.
pub fn save_to_vec_with<A: Allocator>(scene: &Scene, opts: &SaveOptions, alloc: &A) -> Result<Vec<u8>> {
    let len = measure(scene, opts)?;
    let mut out = Vec::new();
    alloc.reserve(&mut out, len)?;

    render(scene, &mut out, opts).map_err(Error::FileWrite)?;
    Ok(out)
}

/// Renders `scene` into the given writer.
pub fn write_to(scene: &Scene, mut w: impl Write, opts: &SaveOptions) -> Result<()> {
    render(scene, &mut w, opts).map_err(Error::FileWrite)?;
    w.flush().map_err(Error::FileWrite)
}

/// Writes `scene` to the file at `path`, replacing it if it exists.
pub fn save_to_file(path: impl AsRef<Path>, scene: &Scene, opts: &SaveOptions) -> Result<()> {
    let path = path.as_ref();
    debug!("saving scene to '{}'", path.display());

    let file = File::create(path).map_err(Error::FileWrite)?;
    write_to(scene, BufWriter::new(file), opts)
}

fn measure(scene: &Scene, opts: &SaveOptions) -> Result<usize> {
    let mut counter = CountingWriter(0);
    render(scene, &mut counter, opts)
        .map_err(|e| err!(Generic, "failed to measure output: {}", e))?;
    Ok(counter.0)
}

/// A sink that only counts the bytes written to it.
struct CountingWriter(usize);

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 = self.0.checked_add(buf.len()).ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "output size exceeds the address space")
        })?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}


// ===============================================================================================
// ===== Rendering
// ===============================================================================================

fn render(scene: &Scene, w: &mut impl Write, opts: &SaveOptions) -> io::Result<()> {
    // `BinaryMatchSystem` never shows up in a file.
    let format = scene.format.resolve();

    render_header(scene, format, w, opts)?;

    for element in &scene.elements {
        let data = scene.element_data(element);
        match format {
            Format::Ascii => render_ascii(element, data, w, opts)?,
            f if !f.needs_swap() => w.write_all(data)?,
            _ => render_swapped(element, data, w)?,
        }
    }

    Ok(())
}

fn render_header(scene: &Scene, format: Format, w: &mut impl Write, opts: &SaveOptions) -> io::Result<()> {
    w.write_all(b"ply\n")?;
    writeln!(w, "format {} 1.0", format.keyword())?;

    for comment in &scene.comments {
        if comment.is_empty() {
            w.write_all(b"comment\n")?;
        } else {
            writeln!(w, "comment {}", comment)?;
        }
    }
    for info in &scene.object_infos {
        let value = format_decimal(info.value, opts.double_decimals.into());
        writeln!(w, "obj_info {} {}", info.name, value)?;
    }

    for element in &scene.elements {
        writeln!(w, "element {} {}", element.name, element.row_count)?;
        for prop in &element.properties {
            writeln!(w, "property {} {}", prop.ty, prop.name)?;
        }
    }

    w.write_all(b"end_header\n")
}

/// Calls `f` with the type and the bytes of every value (list counts and
/// list items count as separate values) of `row`, in file order.
fn for_each_value(
    element: &Element,
    data: &[u8],
    row: usize,
    mut f: impl FnMut(ScalarType, &[u8]) -> io::Result<()>,
) -> io::Result<()> {
    let row_begin = element.row_begins[row] as usize;
    for prop in &element.properties {
        let mut pos = row_begin + prop.row_offsets[row] as usize;
        match prop.ty {
            PropertyType::Scalar(ty) => f(ty, &data[pos..pos + ty.size()])?,
            PropertyType::List { len_type, scalar_type } => {
                let count_bytes = &data[pos..pos + len_type.size()];
                let count = ScalarValue::read::<NativeEndian>(len_type, count_bytes).to_u64();
                f(len_type, count_bytes)?;
                pos += len_type.size();

                for _ in 0..count {
                    f(scalar_type, &data[pos..pos + scalar_type.size()])?;
                    pos += scalar_type.size();
                }
            }
        }
    }

    Ok(())
}

fn render_ascii(element: &Element, data: &[u8], w: &mut impl Write, opts: &SaveOptions) -> io::Result<()> {
    if element.properties.is_empty() {
        return Ok(());
    }

    for row in 0..element.row_count as usize {
        let mut first = true;
        for_each_value(element, data, row, |ty, bytes| {
            if !first {
                w.write_all(b" ")?;
            }
            first = false;

            let v = ScalarValue::read::<NativeEndian>(ty, bytes);
            w.write_all(opts.format(v).as_bytes())
        })?;
        w.write_all(b"\n")?;
    }

    Ok(())
}

/// Writes the rows of `element` in the non-host byte order.
fn render_swapped(element: &Element, data: &[u8], w: &mut impl Write) -> io::Result<()> {
    if element.properties.is_empty() {
        return Ok(());
    }

    let mut buf = [0u8; 8];
    for row in 0..element.row_count as usize {
        for_each_value(element, data, row, |ty, bytes| {
            let v = ScalarValue::read::<NativeEndian>(ty, bytes);
            let out = &mut buf[..ty.size()];
            if cfg!(target_endian = "little") {
                v.write::<BigEndian>(out);
            } else {
                v.write::<LittleEndian>(out);
            }
            w.write_all(out)
        })?;
    }

    Ok(())
}
