//! Incremental construction of elements for saving.

use std::convert::TryFrom;

use byteorder::NativeEndian;

use crate::{
    alloc::{Allocator, Heap},
    error::Result,
    scalar::{ScalarType, ScalarValue},
    scene::{DataType, Element, Property},
};


/// Builds one element row by row.
///
/// First all properties are declared with [`add_property`], then the number
/// of rows is fixed with [`allocate_rows`]. After that, values are written in
/// row-major order: all properties of row 0 in declaration order, then all of
/// row 1 and so on. Each write appends exactly the bytes of that value to the
/// element's buffer and records its offset, so writing in any other order is
/// rejected with [`Error::Generic`][crate::Error::Generic].
///
/// The finished element is moved into a scene with [`Scene::add_element`].
///
/// ```
/// use plyio::{ElementBuilder, Format, Property, ScalarType, Scene};
///
/// # fn main() -> Result<(), plyio::Error> {
/// let mut face = ElementBuilder::new("face")?;
/// face.add_property(Property::list("vertex_indices", ScalarType::UChar, ScalarType::Int))?;
/// face.allocate_rows(1)?;
/// face.write_list(0, 0, &[0i32, 1, 2])?;
///
/// let mut scene = Scene::new(Format::Ascii);
/// scene.add_element(face)?;
/// # Ok(())
/// # }
/// ```
///
/// [`add_property`]: ElementBuilder::add_property
/// [`allocate_rows`]: ElementBuilder::allocate_rows
/// [`Scene::add_element`]: crate::Scene::add_element
#[derive(Debug)]
pub struct ElementBuilder<'a, A: Allocator = Heap> {
    alloc: &'a A,
    element: Element,
    rows_allocated: bool,
    data: Vec<u8>,

    // Position of the next value to be written.
    next_row: usize,
    next_prop: usize,
}

impl ElementBuilder<'static, Heap> {
    /// Creates an empty element that grows its buffers on the heap.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::with_allocator(name, &Heap)
    }
}

impl<'a, A: Allocator> ElementBuilder<'a, A> {
    /// Creates an empty element whose buffers are grown with `alloc`.
    pub fn with_allocator(name: impl Into<String>, alloc: &'a A) -> Result<Self> {
        let name = name.into();
        crate::check_name(&name, "element")?;

        Ok(Self {
            alloc,
            element: Element::new(name, 0),
            rows_allocated: false,
            data: Vec::new(),
            next_row: 0,
            next_prop: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.element.name
    }

    pub fn properties(&self) -> &[Property] {
        &self.element.properties
    }

    pub fn row_count(&self) -> u32 {
        self.element.row_count
    }

    /// Appends a property. Properties can only be added before rows are
    /// allocated.
    pub fn add_property(&mut self, mut prop: Property) -> Result<()> {
        if self.rows_allocated {
            return Err(err!(
                Generic,
                "cannot add property '{}' to element '{}' after rows were allocated",
                prop.name,
                self.element.name,
            ));
        }

        crate::check_name(&prop.name, "property")?;
        if self.element.property_index_by_name(&prop.name).is_some() {
            return Err(err!(
                MalformedHeader,
                "element '{}' already has a property called '{}'",
                self.element.name,
                prop.name,
            ));
        }
        if let Some(len_type) = prop.list_count_type() {
            if !len_type.is_integer() {
                return Err(err!(
                    MalformedHeader,
                    "list count type of '{}' must be an integer type, not {}",
                    prop.name,
                    len_type,
                ));
            }
        }

        prop.row_offsets = Vec::new();
        self.element.properties.push(prop);
        Ok(())
    }

    /// Sets the number of rows and allocates the (zeroed) offset tables for
    /// them. Can only be called once.
    pub fn allocate_rows(&mut self, count: u32) -> Result<()> {
        if self.rows_allocated {
            return Err(err!(Generic, "rows of element '{}' were already allocated", self.element.name));
        }

        let len = count as usize;
        if !self.element.properties.is_empty() {
            self.element.row_begins = self.alloc.zeroed(len)?;
            for prop in &mut self.element.properties {
                prop.row_offsets = self.alloc.zeroed(len)?;
            }
        }

        self.element.row_count = count;
        self.rows_allocated = true;
        Ok(())
    }

    /// Returns `true` once every value of every row has been written.
    pub fn is_complete(&self) -> bool {
        self.element.properties.is_empty() || self.next_row >= self.element.row_count as usize
    }

    /// Writes the value of a scalar property. The value is converted to the
    /// property's type with `as` semantics.
    pub fn write_scalar(&mut self, row: usize, prop: usize, value: impl Into<ScalarValue>) -> Result<()> {
        let ty = self.check_slot(row, prop, DataType::Scalar)?.scalar_type();
        let value = value.into().cast(ty);

        self.append(row, ty.size(), |dst| value.write::<NativeEndian>(dst))
    }

    /// Writes the value of a list property. Items are converted to the
    /// property's item type with `as` semantics; the number of items must be
    /// representable in the list count type.
    pub fn write_list<T>(&mut self, row: usize, prop: usize, values: &[T]) -> Result<()>
    where
        T: Copy + Into<ScalarValue>,
    {
        let p = self.check_slot(row, prop, DataType::List)?;
        let item_type = p.scalar_type();
        let len_type = match p.list_count_type() {
            Some(ty) => ty,
            None => return Err(err!(DataTypeMismatch, "property '{}' is not a list", p.name)),
        };

        let count = values.len() as u64;
        if count > max_count(len_type) {
            return Err(err!(
                BoundsExceeded,
                "list of {} items does not fit count type {} of property '{}'",
                count,
                len_type,
                p.name,
            ));
        }

        let size = count.checked_mul(item_type.size() as u64)
            .and_then(|s| s.checked_add(len_type.size() as u64))
            .and_then(|s| usize::try_from(s).ok())
            .ok_or_else(|| err!(BoundsExceeded, "list of {} items is too large", count))?;

        self.append(row, size, |dst| {
            let (head, items) = dst.split_at_mut(len_type.size());
            ScalarValue::UInt(count as u32).cast(len_type).write::<NativeEndian>(head);
            for (chunk, v) in items.chunks_exact_mut(item_type.size()).zip(values) {
                (*v).into().cast(item_type).write::<NativeEndian>(chunk);
            }
        })
    }

    fn check_slot(&self, row: usize, prop: usize, expected: DataType) -> Result<&Property> {
        let name = &self.element.name;
        if self.element.properties.is_empty() {
            return Err(err!(Generic, "element '{}' has no properties to write", name));
        }
        if !self.rows_allocated {
            return Err(err!(Generic, "rows of element '{}' were not allocated", name));
        }
        if row >= self.element.row_count as usize {
            return Err(err!(
                BoundsExceeded,
                "row {} out of range for element '{}' with {} rows",
                row,
                name,
                self.element.row_count,
            ));
        }

        let p = self.element.properties.get(prop).ok_or_else(|| err!(
            BoundsExceeded,
            "property {} out of range for element '{}'",
            prop,
            name,
        ))?;
        if p.data_type() != expected {
            return Err(err!(
                DataTypeMismatch,
                "cannot write a {} value to {} property '{}'",
                expected,
                p.data_type(),
                p.name,
            ));
        }

        if (row, prop) != (self.next_row, self.next_prop) {
            return Err(err!(
                Generic,
                "out of order write to row {} property {} of '{}', expected row {} property {}",
                row,
                prop,
                name,
                self.next_row,
                self.next_prop,
            ));
        }

        Ok(p)
    }

    /// Appends `size` bytes for the value at the write cursor, lets `fill`
    /// write them and advances the cursor.
    fn append(&mut self, row: usize, size: usize, fill: impl FnOnce(&mut [u8])) -> Result<()> {
        let old_len = self.data.len();
        let new_len = old_len.checked_add(size)
            .ok_or_else(|| err!(BoundsExceeded, "element '{}' exceeds the address space", self.element.name))?;

        if self.next_prop == 0 {
            self.element.row_begins[row] = old_len as u64;
        }
        let offset = u32::try_from(old_len as u64 - self.element.row_begins[row])
            .map_err(|_| err!(BoundsExceeded, "row {} of '{}' exceeds 4 GiB", row, self.element.name))?;

        if self.data.capacity() - old_len < size {
            // Grow geometrically so that appending single values stays cheap.
            self.alloc.reserve(&mut self.data, size.max(old_len))?;
        }
        self.data.resize(new_len, 0);
        fill(&mut self.data[old_len..]);

        self.element.properties[self.next_prop].row_offsets[row] = offset;
        self.next_prop += 1;
        if self.next_prop == self.element.properties.len() {
            self.next_prop = 0;
            self.next_row += 1;
        }

        Ok(())
    }

    /// Returns the finished element and its packed rows.
    pub(crate) fn finish(mut self) -> Result<(Element, Vec<u8>)> {
        if !self.is_complete() {
            return Err(err!(
                Generic,
                "element '{}' is incomplete: {} of {} rows written",
                self.element.name,
                self.next_row,
                self.element.row_count,
            ));
        }

        self.element.data_size = self.data.len() as u64;
        Ok((self.element, self.data))
    }
}

/// The largest list length the given count type can hold.
fn max_count(ty: ScalarType) -> u64 {
    match ty {
        ScalarType::Char => i8::max_value() as u64,
        ScalarType::UChar => u8::max_value() as u64,
        ScalarType::Short => i16::max_value() as u64,
        ScalarType::UShort => u16::max_value() as u64,
        ScalarType::Int => i32::max_value() as u64,
        ScalarType::UInt => u32::max_value() as u64,
        ScalarType::Float | ScalarType::Double => 0,
    }
}
