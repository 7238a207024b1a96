//! The in-memory representation of a PLY file.
//!
//! A [`Scene`] owns one contiguous byte buffer. Each [`Element`] describes a
//! sub-range of that buffer plus the offset tables needed to find every value
//! in it without scanning: the start of each row relative to the element's
//! region and, per property, the offset of its value relative to the row
//! start. Values are always stored in host byte order, whatever format the
//! scene is later saved in.

use std::fmt;

use byteorder::NativeEndian;
use derive_more::{Deref, From, IntoIterator};
use smallvec::SmallVec;

use crate::{
    alloc::{Allocator, Heap},
    error::Result,
    scalar::{ScalarType, ScalarValue},
    write::ElementBuilder,
};


/// The encoding of the data section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Ascii,
    BinaryBigEndian,
    BinaryLittleEndian,

    /// Binary in whatever byte order the host uses. Only meaningful for
    /// saving; it is resolved to one of the concrete binary formats before
    /// anything is written and never appears in a header.
    BinaryMatchSystem,
}

impl Format {
    /// Returns the binary format matching the host's byte order.
    pub fn host_binary() -> Self {
        #[cfg(target_endian = "big")]
        { Format::BinaryBigEndian }

        #[cfg(target_endian = "little")]
        { Format::BinaryLittleEndian }
    }

    /// Replaces `BinaryMatchSystem` by the concrete host format.
    pub fn resolve(self) -> Self {
        match self {
            Format::BinaryMatchSystem => Self::host_binary(),
            other => other,
        }
    }

    pub fn is_binary(&self) -> bool {
        *self != Format::Ascii
    }

    /// Returns `true` if data in this format has to be byte swapped to get
    /// host order.
    pub fn needs_swap(&self) -> bool {
        self.is_binary() && self.resolve() != Self::host_binary()
    }

    /// The keyword used in the `format` header line.
    pub fn keyword(&self) -> &'static str {
        match self.resolve() {
            Format::Ascii => "ascii",
            Format::BinaryBigEndian => "binary_big_endian",
            Format::BinaryLittleEndian => "binary_little_endian",
            Format::BinaryMatchSystem => unreachable!(),
        }
    }

    pub(crate) fn from_keyword(word: &[u8]) -> Option<Self> {
        match word {
            b"ascii" => Some(Format::Ascii),
            b"binary_big_endian" => Some(Format::BinaryBigEndian),
            b"binary_little_endian" => Some(Format::BinaryLittleEndian),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Format::BinaryMatchSystem => "binary_match_system".fmt(f),
            other => other.keyword().fmt(f),
        }
    }
}


// ===========================================================================
// ===== Schema
// ===========================================================================

/// Whether a property holds one value per row or a variable length list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Scalar,
    List,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataType::Scalar => "scalar",
            DataType::List => "list",
        }.fmt(f)
    }
}

/// The type of a property as declared in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Scalar(ScalarType),
    List {
        len_type: ScalarType,
        scalar_type: ScalarType,
    },
}

impl PropertyType {
    pub fn data_type(&self) -> DataType {
        match self {
            PropertyType::Scalar(_) => DataType::Scalar,
            PropertyType::List { .. } => DataType::List,
        }
    }

    /// The value type; for lists, the type of each item.
    pub fn scalar_type(&self) -> ScalarType {
        match *self {
            PropertyType::Scalar(ty) => ty,
            PropertyType::List { scalar_type, .. } => scalar_type,
        }
    }

    pub fn list_count_type(&self) -> Option<ScalarType> {
        match *self {
            PropertyType::Scalar(_) => None,
            PropertyType::List { len_type, .. } => Some(len_type),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PropertyType::Scalar(ty) => ty.fmt(f),
            PropertyType::List { len_type, scalar_type } => {
                write!(f, "list {} {}", len_type, scalar_type)
            }
        }
    }
}

/// A named column of an element.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub(crate) name: String,
    pub(crate) ty: PropertyType,

    /// Per row, the offset of this property's value relative to the row
    /// start.
    pub(crate) row_offsets: Vec<u32>,
}

impl Property {
    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::new(name, PropertyType::Scalar(ty))
    }

    pub fn list(name: impl Into<String>, len_type: ScalarType, scalar_type: ScalarType) -> Self {
        Self::new(name, PropertyType::List { len_type, scalar_type })
    }

    pub fn new(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            ty,
            row_offsets: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> PropertyType {
        self.ty
    }

    pub fn data_type(&self) -> DataType {
        self.ty.data_type()
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.ty.scalar_type()
    }

    pub fn list_count_type(&self) -> Option<ScalarType> {
        self.ty.list_count_type()
    }

    pub fn row_offsets(&self) -> &[u32] {
        &self.row_offsets
    }
}

/// A named table of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub(crate) name: String,
    pub(crate) properties: Vec<Property>,
    pub(crate) row_count: u32,

    /// Start of this element's region within the scene's data buffer.
    pub(crate) data_start: u64,
    pub(crate) data_size: u64,

    /// Per row, the offset of the row start relative to `data_start`. Empty
    /// for elements without properties, whose rows hold no data.
    pub(crate) row_begins: Vec<u64>,
}

impl Element {
    pub(crate) fn new(name: String, row_count: u32) -> Self {
        Self {
            name,
            properties: Vec::new(),
            row_count,
            data_start: 0,
            data_size: 0,
            row_begins: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Total number of packed bytes of all rows.
    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    pub fn row_begins(&self) -> &[u64] {
        &self.row_begins
    }

    /// Returns the index of the given property if it belongs to this element
    /// (compared by identity, not by value).
    pub fn property_index(&self, prop: &Property) -> Option<usize> {
        self.properties.iter().position(|p| std::ptr::eq(p, prop))
    }

    pub fn property_index_by_name(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Free-form `obj_info` metadata of a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub name: String,
    pub value: f64,
}


// ===========================================================================
// ===== Values
// ===========================================================================

/// The items of one list value.
#[derive(Debug, Clone, PartialEq, Deref, From, IntoIterator)]
pub struct ListValue(SmallVec<[ScalarValue; 4]>);

impl ListValue {
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.0.iter().map(|v| v.to_f64()).collect()
    }
}

/// A value of one property in one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(ScalarValue),
    List(ListValue),
}

impl Value {
    pub fn as_scalar(&self) -> Option<ScalarValue> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListValue> {
        match self {
            Value::Scalar(_) => None,
            Value::List(l) => Some(l),
        }
    }
}

/// Read access to one element's values, borrowed from its scene.
#[derive(Debug, Clone, Copy)]
pub struct ElementView<'a> {
    element: &'a Element,
    data: &'a [u8],
}

impl<'a> ElementView<'a> {
    pub fn element(&self) -> &'a Element {
        self.element
    }

    pub fn name(&self) -> &'a str {
        &self.element.name
    }

    pub fn properties(&self) -> &'a [Property] {
        &self.element.properties
    }

    pub fn row_count(&self) -> u32 {
        self.element.row_count
    }

    /// The packed bytes of all rows of this element.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The packed bytes of one row.
    pub fn row(&self, row: usize) -> Result<&'a [u8]> {
        self.check_row(row)?;
        if self.element.properties.is_empty() {
            return Ok(&[]);
        }

        let begin = self.element.row_begins.get(row).copied().unwrap_or(0);
        let end = self.element.row_begins.get(row + 1)
            .copied()
            .unwrap_or(self.element.data_size);
        self.slice(begin, end.saturating_sub(begin))
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.element.row_count as usize {
            return Err(err!(
                BoundsExceeded,
                "row {} out of range for element '{}' with {} rows",
                row,
                self.element.name,
                self.element.row_count,
            ));
        }
        Ok(())
    }

    fn property_at(&self, prop: usize) -> Result<&'a Property> {
        self.element.properties.get(prop).ok_or_else(|| err!(
            BoundsExceeded,
            "property {} out of range for element '{}' with {} properties",
            prop,
            self.element.name,
            self.element.properties.len(),
        ))
    }

    fn slice(&self, offset: u64, len: u64) -> Result<&'a [u8]> {
        offset.checked_add(len)
            .filter(|&end| end <= self.data.len() as u64)
            .map(|end| &self.data[offset as usize..end as usize])
            .ok_or_else(|| err!(
                BoundsExceeded,
                "value at {}..+{} outside of element '{}'",
                offset,
                len,
                self.element.name,
            ))
    }

    /// Returns the property and the offset of its value in `row` relative to
    /// the element's region.
    fn locate(&self, row: usize, prop: usize) -> Result<(&'a Property, u64)> {
        self.check_row(row)?;
        let p = self.property_at(prop)?;
        match (self.element.row_begins.get(row), p.row_offsets.get(row)) {
            (Some(&begin), Some(&offset)) => Ok((p, begin + u64::from(offset))),
            _ => Err(err!(BoundsExceeded, "no offsets recorded for row {} of '{}'", row, p.name)),
        }
    }

    fn read(&self, ty: ScalarType, offset: u64) -> Result<ScalarValue> {
        let bytes = self.slice(offset, ty.size() as u64)?;
        Ok(ScalarValue::read::<NativeEndian>(ty, bytes))
    }

    /// Returns the value of a scalar property.
    pub fn scalar(&self, row: usize, prop: usize) -> Result<ScalarValue> {
        let (p, offset) = self.locate(row, prop)?;
        match p.ty {
            PropertyType::Scalar(ty) => self.read(ty, offset),
            PropertyType::List { .. } => Err(err!(
                DataTypeMismatch,
                "property '{}' is a list, not a scalar",
                p.name,
            )),
        }
    }

    /// Returns the items of a list property.
    pub fn list(&self, row: usize, prop: usize) -> Result<ListValue> {
        let (p, offset) = self.locate(row, prop)?;
        let (len_type, scalar_type) = match p.ty {
            PropertyType::List { len_type, scalar_type } => (len_type, scalar_type),
            PropertyType::Scalar(_) => return Err(err!(
                DataTypeMismatch,
                "property '{}' is a scalar, not a list",
                p.name,
            )),
        };

        let count = self.read(len_type, offset)?.to_u64();
        let size = scalar_type.size() as u64;
        let start = offset + len_type.size() as u64;
        let items = self.slice(start, count.saturating_mul(size))?;

        let list = items.chunks_exact(size as usize)
            .map(|chunk| ScalarValue::read::<NativeEndian>(scalar_type, chunk))
            .collect::<SmallVec<_>>();
        Ok(ListValue(list))
    }

    /// Returns the value of any property.
    pub fn value(&self, row: usize, prop: usize) -> Result<Value> {
        match self.property_at(prop)?.data_type() {
            DataType::Scalar => self.scalar(row, prop).map(Value::Scalar),
            DataType::List => self.list(row, prop).map(Value::List),
        }
    }

    /// Returns the value of a scalar property widened to `f64`.
    pub fn scalar_f64(&self, row: usize, prop: usize) -> Result<f64> {
        self.scalar(row, prop).map(|v| v.to_f64())
    }

    /// Looks up the property by name and returns its value.
    pub fn value_by_name(&self, row: usize, name: &str) -> Result<Value> {
        let prop = self.element.property_index_by_name(name).ok_or_else(|| err!(
            BoundsExceeded,
            "element '{}' has no property '{}'",
            self.element.name,
            name,
        ))?;
        self.value(row, prop)
    }
}


// ===========================================================================
// ===== Scene
// ===========================================================================

/// A complete PLY file: schema, metadata and packed row data.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub(crate) format: Format,
    pub(crate) version: f32,
    pub(crate) elements: Vec<Element>,
    pub(crate) object_infos: Vec<ObjectInfo>,
    pub(crate) comments: Vec<String>,
    pub(crate) data: Vec<u8>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(Format::Ascii)
    }
}

impl Scene {
    /// Creates an empty scene that will be saved in the given format.
    pub fn new(format: Format) -> Self {
        Self {
            format,
            version: 1.0,
            elements: Vec::new(),
            object_infos: Vec::new(),
            comments: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn set_format(&mut self, format: Format) {
        self.format = format;
    }

    pub fn version(&self) -> f32 {
        self.version
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn object_infos(&self) -> &[ObjectInfo] {
        &self.object_infos
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// The shared buffer holding the rows of all elements.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the packed bytes of the given element, which must belong to
    /// this scene.
    pub fn element_data(&self, element: &Element) -> &[u8] {
        let start = element.data_start as usize;
        self.data.get(start..start + element.data_size as usize).unwrap_or(&[])
    }

    /// Returns a view of the element at position `index`.
    pub fn view(&self, index: usize) -> Option<ElementView<'_>> {
        self.elements.get(index).map(|element| ElementView {
            element,
            data: self.element_data(element),
        })
    }

    /// Returns a view of the element called `name`.
    pub fn element(&self, name: &str) -> Option<ElementView<'_>> {
        self.elements.iter()
            .position(|e| e.name == name)
            .and_then(|i| self.view(i))
    }

    pub fn views(&self) -> impl Iterator<Item = ElementView<'_>> {
        (0..self.elements.len()).filter_map(move |i| self.view(i))
    }

    /// Adds a comment line. Comments cannot contain line breaks. Surrounding
    /// whitespace is kept and survives a save and load.
    pub fn add_comment(&mut self, comment: impl Into<String>) -> Result<()> {
        let comment = comment.into();
        if comment.contains(|c: char| c == '\n' || c == '\r' || c == '\0') {
            return Err(err!(Generic, "comment {:?} contains a line break", comment));
        }

        self.comments.push(comment);
        Ok(())
    }

    pub fn add_object_info(&mut self, name: impl Into<String>, value: f64) -> Result<()> {
        let name = name.into();
        crate::check_name(&name, "object info")?;
        self.object_infos.push(ObjectInfo { name, value });
        Ok(())
    }

    /// Moves a completely written element into the scene, appending its rows
    /// to the shared buffer.
    pub fn add_element<A: Allocator>(&mut self, builder: ElementBuilder<'_, A>) -> Result<()> {
        self.add_element_with(builder, &Heap)
    }

    /// Like [`Scene::add_element`], but grows the shared buffer with `alloc`.
    pub fn add_element_with<A: Allocator, B: Allocator>(
        &mut self,
        builder: ElementBuilder<'_, A>,
        alloc: &B,
    ) -> Result<()> {
        if self.elements.iter().any(|e| e.name == builder.name()) {
            return Err(err!(
                MalformedHeader,
                "scene already contains an element called '{}'",
                builder.name(),
            ));
        }

        let (mut element, rows) = builder.finish()?;
        alloc.reserve(&mut self.data, rows.len())?;
        element.data_start = self.data.len() as u64;
        self.data.extend_from_slice(&rows);
        self.elements.push(element);

        Ok(())
    }

    /// Releases everything the scene owns and leaves it empty. Calling this
    /// any number of times is fine; dropping the scene does the same.
    pub fn clear(&mut self) {
        self.elements = Vec::new();
        self.object_infos = Vec::new();
        self.comments = Vec::new();
        self.data = Vec::new();
    }
}
