//! The two-pass planner that turns the data section into packed rows.
//!
//! The size of a row is not known before reading it (lists have a runtime
//! length), so the data section is walked twice. The first walk measures
//! every row and records where each value will live. Then one buffer for the
//! rows of all elements is allocated, and the second walk decodes every
//! value into it. Both walks are driven by the same [`Codec`], which
//! guarantees they agree on every row and token boundary.

use std::convert::TryFrom;

use log::trace;

use crate::{
    alloc::Allocator,
    error::Result,
    scalar::ScalarType,
    scene::{Element, Format, PropertyType},
};
use super::header::ElementDecl;


/// Where a value appears in a row. Running out of input means something
/// different depending on that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Scalar,
    ListItem,
}

/// Decoding of the data section in one encoding.
pub(crate) trait Codec<'a>: Sized {
    fn new(data: &'a [u8], format: Format) -> Self;

    /// Number of input bytes not consumed yet.
    fn remaining(&self) -> usize;

    fn begin_row(&mut self) -> Result<()>;

    /// Consumes one value of type `ty`. If `dst` is given, the value is
    /// written into it in host byte order.
    fn value(&mut self, ty: ScalarType, slot: Slot, dst: Option<&mut [u8]>) -> Result<()>;

    /// Consumes a list count of type `ty` and returns it. If `dst` is given,
    /// the count is written into it in host byte order.
    fn count(&mut self, ty: ScalarType, dst: Option<&mut [u8]>) -> Result<u64>;

    /// Consumes `count` list items without decoding them anywhere.
    fn skip_items(&mut self, ty: ScalarType, count: u64) -> Result<()> {
        for _ in 0..count {
            self.value(ty, Slot::ListItem, None)?;
        }
        Ok(())
    }

    fn end_row(&mut self) -> Result<()>;
}

/// Decodes the rows of all declared elements from `data`.
///
/// Returns the kept elements with complete offset tables and the buffer
/// holding their rows.
pub(crate) fn plan<'a, C, A>(
    data: &'a [u8],
    format: Format,
    mut decls: Vec<ElementDecl>,
    alloc: &A,
) -> Result<(Vec<Element>, Vec<u8>)>
where
    C: Codec<'a>,
    A: Allocator,
{
    // ===== Pass 1: measure
    let mut codec = C::new(data, format);
    let mut total = 0u64;
    for decl in &mut decls {
        measure_element(&mut codec, decl, alloc)?;

        let element = &mut decl.element;
        trace!(
            "element '{}': {} rows, {} bytes{}",
            element.name,
            element.row_count,
            element.data_size,
            if decl.keep { "" } else { " (skipped)" },
        );

        if decl.keep {
            element.data_start = total;
            total = total.checked_add(element.data_size)
                .ok_or_else(|| err!(BoundsExceeded, "total data size exceeds 2^64 bytes"))?;
        }
    }

    // ===== One allocation for all rows
    let total = usize::try_from(total)
        .map_err(|_| err!(BoundsExceeded, "{} bytes of row data exceed the address space", total))?;
    let mut rows = alloc.zeroed::<u8>(total)?;

    // ===== Pass 2: materialize
    let mut codec = C::new(data, format);
    for decl in &decls {
        fill_element(&mut codec, decl, &mut rows)?;
    }

    let elements = decls.into_iter()
        .filter(|decl| decl.keep)
        .map(|decl| decl.element)
        .collect();

    Ok((elements, rows))
}

/// Adds `bytes` to the size of a row, which has to stay addressable by the
/// `u32` in-row offsets.
fn grow_row(row_size: u64, bytes: u64, element: &str) -> Result<u64> {
    row_size.checked_add(bytes)
        .filter(|&s| s <= u64::from(u32::max_value()))
        .ok_or_else(|| err!(BoundsExceeded, "a row of element '{}' exceeds 4 GiB", element))
}

fn measure_element<'a, C: Codec<'a>, A: Allocator>(
    codec: &mut C,
    decl: &mut ElementDecl,
    alloc: &A,
) -> Result<()> {
    let keep = decl.keep;
    let element = &mut decl.element;

    // Rows without properties hold no data and consume no input.
    if element.properties.is_empty() {
        return Ok(());
    }

    // Every row consumes at least one byte. Checking this first means a
    // tiny file cannot make us allocate huge offset tables.
    let rows = element.row_count as usize;
    if rows > codec.remaining() {
        return Err(err!(
            MalformedData,
            "element '{}' declares {} rows, but only {} bytes of data are left",
            element.name,
            rows,
            codec.remaining(),
        ));
    }

    if keep {
        element.row_begins = alloc.zeroed(rows)?;
        for prop in &mut element.properties {
            prop.row_offsets = alloc.zeroed(rows)?;
        }
    }

    let mut size = 0u64;
    for row in 0..rows {
        codec.begin_row()?;

        let mut row_size = 0u64;
        for prop in &mut element.properties {
            if keep {
                prop.row_offsets[row] = row_size as u32;
            }

            row_size = match prop.ty {
                PropertyType::Scalar(ty) => {
                    let new_size = grow_row(row_size, ty.size() as u64, &element.name)?;
                    codec.value(ty, Slot::Scalar, None)?;
                    new_size
                }
                PropertyType::List { len_type, scalar_type } => {
                    let count = codec.count(len_type, None)?;
                    let bytes = count.checked_mul(scalar_type.size() as u64)
                        .and_then(|b| b.checked_add(len_type.size() as u64))
                        .ok_or_else(|| err!(
                            BoundsExceeded,
                            "list of {} items in property '{}' is too large",
                            count,
                            prop.name,
                        ))?;
                    let new_size = grow_row(row_size, bytes, &element.name)?;
                    codec.skip_items(scalar_type, count)?;
                    new_size
                }
            };
        }

        codec.end_row()?;
        if keep {
            element.row_begins[row] = size;
        }
        size = size.checked_add(row_size)
            .ok_or_else(|| err!(BoundsExceeded, "size of element '{}' overflows", element.name))?;
    }

    element.data_size = size;
    Ok(())
}

fn fill_element<'a, C: Codec<'a>>(codec: &mut C, decl: &ElementDecl, rows: &mut [u8]) -> Result<()> {
    let element = &decl.element;
    if element.properties.is_empty() {
        return Ok(());
    }

    for row in 0..element.row_count as usize {
        codec.begin_row()?;

        for prop in &element.properties {
            let dst = if decl.keep {
                Some(
                    element.data_start as usize
                        + element.row_begins[row] as usize
                        + prop.row_offsets[row] as usize
                )
            } else {
                None
            };

            match prop.ty {
                PropertyType::Scalar(ty) => {
                    codec.value(ty, Slot::Scalar, dst_slice(rows, dst, ty.size()))?;
                }
                PropertyType::List { len_type, scalar_type } => {
                    let count = codec.count(len_type, dst_slice(rows, dst, len_type.size()))?;
                    match dst {
                        None => codec.skip_items(scalar_type, count)?,
                        Some(pos) => {
                            let size = scalar_type.size();
                            let mut pos = pos + len_type.size();
                            for _ in 0..count {
                                codec.value(scalar_type, Slot::ListItem, dst_slice(rows, Some(pos), size))?;
                                pos += size;
                            }
                        }
                    }
                }
            }
        }

        codec.end_row()?;
    }

    Ok(())
}

/// The `len` bytes at `pos` in `rows`, if the value is kept at all.
fn dst_slice(rows: &mut [u8], pos: Option<usize>, len: usize) -> Option<&mut [u8]> {
    match pos {
        Some(pos) => Some(&mut rows[pos..pos + len]),
        None => None,
    }
}
