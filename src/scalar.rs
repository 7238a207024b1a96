//! The eight PLY scalar types and dynamically typed scalar values.
//!
//! ```text
//! name        type                        number of bytes
//! -------------------------------------------------------
//! char       character                    1
//! uchar      unsigned character           1
//! short      short integer                2
//! ushort     unsigned short integer       2
//! int        integer                      4
//! uint       unsigned integer             4
//! float      single-precision float       4
//! double     double-precision float       8
//! ```

use std::{
    fmt,
    str::FromStr,
};

use byteorder::{ByteOrder, NativeEndian};


/// A primitive PLY type. There are 8 in total, 2 floating point types, 3
/// signed and 3 unsigned integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

/// Header spellings, canonical names first. The sized aliases are written by
/// a number of third-party exporters and are accepted when reading.
const KEYWORDS: &[(&str, ScalarType)] = &[
    ("char", ScalarType::Char),
    ("uchar", ScalarType::UChar),
    ("short", ScalarType::Short),
    ("ushort", ScalarType::UShort),
    ("int", ScalarType::Int),
    ("uint", ScalarType::UInt),
    ("float", ScalarType::Float),
    ("double", ScalarType::Double),
    ("int8", ScalarType::Char),
    ("uint8", ScalarType::UChar),
    ("int16", ScalarType::Short),
    ("uint16", ScalarType::UShort),
    ("int32", ScalarType::Int),
    ("uint32", ScalarType::UInt),
    ("float32", ScalarType::Float),
    ("float64", ScalarType::Double),
];

impl ScalarType {
    pub const ALL: [ScalarType; 8] = [
        ScalarType::Char,
        ScalarType::UChar,
        ScalarType::Short,
        ScalarType::UShort,
        ScalarType::Int,
        ScalarType::UInt,
        ScalarType::Float,
        ScalarType::Double,
    ];

    /// Returns the number of bytes this type occupies.
    pub fn size(&self) -> usize {
        match self {
            ScalarType::Char | ScalarType::UChar => 1,
            ScalarType::Short | ScalarType::UShort => 2,
            ScalarType::Int | ScalarType::UInt | ScalarType::Float => 4,
            ScalarType::Double => 8,
        }
    }

    /// Returns the type name used in the header (e.g. `short` for `i16`).
    pub fn ply_type_name(&self) -> &'static str {
        match self {
            ScalarType::Char => "char",
            ScalarType::UChar => "uchar",
            ScalarType::Short => "short",
            ScalarType::UShort => "ushort",
            ScalarType::Int => "int",
            ScalarType::UInt => "uint",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
        }
    }

    /// Looks up a header keyword. Matching is case-sensitive and exact.
    pub fn from_keyword(word: &[u8]) -> Option<Self> {
        KEYWORDS.iter()
            .find(|(kw, _)| crate::util::string_equals(kw.as_bytes(), word))
            .map(|&(_, ty)| ty)
    }

    /// Returns `true` if and only if the type is either `float` or `double`.
    pub fn is_floating_point(&self) -> bool {
        *self == ScalarType::Float || *self == ScalarType::Double
    }

    pub fn is_integer(&self) -> bool {
        !self.is_floating_point()
    }

    /// Reverses the byte order of the first `self.size()` bytes of `bytes`.
    /// Panics if `bytes` is shorter than that.
    pub fn swap_bytes(&self, bytes: &mut [u8]) {
        bytes[..self.size()].reverse();
    }

    /// Interprets the first `self.size()` bytes of `data` (in host byte
    /// order) as this type and widens the value to `f64`.
    pub fn decode_f64(&self, data: &[u8]) -> f64 {
        ScalarValue::read::<NativeEndian>(*self, data).to_f64()
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.ply_type_name().fmt(f)
    }
}

/// The error emitted when the `FromStr` implementation for `ScalarType` cannot
/// parse the given string.
pub struct ScalarTypeParseError(String);

impl fmt::Display for ScalarTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\" is not a valid PLY scalar type", self.0)
    }
}

impl fmt::Debug for ScalarTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for ScalarType {
    type Err = ScalarTypeParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_keyword(s.as_bytes()).ok_or_else(|| ScalarTypeParseError(s.to_string()))
    }
}


// ===========================================================================
// ===== Values
// ===========================================================================

/// One scalar value of some PLY type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    Char(i8),
    UChar(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Float(f32),
    Double(f64),
}

impl ScalarValue {
    /// Returns the type of this value.
    pub fn ty(&self) -> ScalarType {
        match self {
            ScalarValue::Char(_) => ScalarType::Char,
            ScalarValue::UChar(_) => ScalarType::UChar,
            ScalarValue::Short(_) => ScalarType::Short,
            ScalarValue::UShort(_) => ScalarType::UShort,
            ScalarValue::Int(_) => ScalarType::Int,
            ScalarValue::UInt(_) => ScalarType::UInt,
            ScalarValue::Float(_) => ScalarType::Float,
            ScalarValue::Double(_) => ScalarType::Double,
        }
    }

    /// Widens the value to `f64`. This is lossless for every PLY type.
    pub fn to_f64(&self) -> f64 {
        match *self {
            ScalarValue::Char(v) => v.into(),
            ScalarValue::UChar(v) => v.into(),
            ScalarValue::Short(v) => v.into(),
            ScalarValue::UShort(v) => v.into(),
            ScalarValue::Int(v) => v.into(),
            ScalarValue::UInt(v) => v.into(),
            ScalarValue::Float(v) => v.into(),
            ScalarValue::Double(v) => v,
        }
    }

    pub fn to_f32(&self) -> f32 {
        match *self {
            ScalarValue::Float(v) => v,
            other => other.to_f64() as f32,
        }
    }

    /// Converts with `as` semantics: floats are truncated and saturated,
    /// negative integers wrap.
    pub fn to_u32(&self) -> u32 {
        match *self {
            ScalarValue::Char(v) => v as u32,
            ScalarValue::Short(v) => v as u32,
            ScalarValue::Int(v) => v as u32,
            other => other.to_f64() as u32,
        }
    }

    /// Converts with `as` semantics, see [`ScalarValue::to_u32`].
    pub fn to_i32(&self) -> i32 {
        match *self {
            ScalarValue::UInt(v) => v as i32,
            other => other.to_f64() as i32,
        }
    }

    /// Converts with `as` semantics, see [`ScalarValue::to_u32`].
    pub fn to_u64(&self) -> u64 {
        match *self {
            ScalarValue::Char(v) => v as u64,
            ScalarValue::Short(v) => v as u64,
            ScalarValue::Int(v) => v as u64,
            other => other.to_f64() as u64,
        }
    }

    /// Returns the value as a non-negative integer, or `None` if it is
    /// negative, fractional or not finite. Used to interpret list counts.
    pub fn as_count(&self) -> Option<u64> {
        let v = self.to_f64();
        if v >= 0.0 && v.fract() == 0.0 && v <= u64::max_value() as f64 {
            Some(v as u64)
        } else {
            None
        }
    }

    /// Converts the value to the given type with `as` semantics: integers
    /// wrap, floats are truncated and saturated.
    pub fn cast(&self, ty: ScalarType) -> ScalarValue {
        if self.ty() == ty {
            return *self;
        }

        let v = self.to_f64();
        if self.ty().is_integer() {
            // Exact, every PLY integer fits into `i64`.
            let i = v as i64;
            match ty {
                ScalarType::Char => return ScalarValue::Char(i as i8),
                ScalarType::UChar => return ScalarValue::UChar(i as u8),
                ScalarType::Short => return ScalarValue::Short(i as i16),
                ScalarType::UShort => return ScalarValue::UShort(i as u16),
                ScalarType::Int => return ScalarValue::Int(i as i32),
                ScalarType::UInt => return ScalarValue::UInt(i as u32),
                ScalarType::Float | ScalarType::Double => {}
            }
        }

        match ty {
            ScalarType::Char => ScalarValue::Char(v as i8),
            ScalarType::UChar => ScalarValue::UChar(v as u8),
            ScalarType::Short => ScalarValue::Short(v as i16),
            ScalarType::UShort => ScalarValue::UShort(v as u16),
            ScalarType::Int => ScalarValue::Int(v as i32),
            ScalarType::UInt => ScalarValue::UInt(v as u32),
            ScalarType::Float => ScalarValue::Float(v as f32),
            ScalarType::Double => ScalarValue::Double(v),
        }
    }

    /// Reads a value of type `ty` from the start of `buf`, which is encoded
    /// in byte order `B`. Panics if `buf` is too short.
    pub fn read<B: ByteOrder>(ty: ScalarType, buf: &[u8]) -> ScalarValue {
        match ty {
            ScalarType::Char => ScalarValue::Char(buf[0] as i8),
            ScalarType::UChar => ScalarValue::UChar(buf[0]),
            ScalarType::Short => ScalarValue::Short(B::read_i16(buf)),
            ScalarType::UShort => ScalarValue::UShort(B::read_u16(buf)),
            ScalarType::Int => ScalarValue::Int(B::read_i32(buf)),
            ScalarType::UInt => ScalarValue::UInt(B::read_u32(buf)),
            ScalarType::Float => ScalarValue::Float(B::read_f32(buf)),
            ScalarType::Double => ScalarValue::Double(B::read_f64(buf)),
        }
    }

    /// Writes the value into the start of `buf` in byte order `B`. Panics if
    /// `buf` is shorter than `self.ty().size()`.
    pub fn write<B: ByteOrder>(&self, buf: &mut [u8]) {
        match *self {
            ScalarValue::Char(v) => buf[0] = v as u8,
            ScalarValue::UChar(v) => buf[0] = v,
            ScalarValue::Short(v) => B::write_i16(buf, v),
            ScalarValue::UShort(v) => B::write_u16(buf, v),
            ScalarValue::Int(v) => B::write_i32(buf, v),
            ScalarValue::UInt(v) => B::write_u32(buf, v),
            ScalarValue::Float(v) => B::write_f32(buf, v),
            ScalarValue::Double(v) => B::write_f64(buf, v),
        }
    }

    /// Parses an ASCII token as a value of type `ty`. Returns `None` if the
    /// token is not a valid literal of that type (including out of range
    /// integers).
    pub fn parse(ty: ScalarType, token: &[u8]) -> Option<ScalarValue> {
        let s = std::str::from_utf8(token).ok()?;
        let v = match ty {
            ScalarType::Char => ScalarValue::Char(s.parse().ok()?),
            ScalarType::UChar => ScalarValue::UChar(s.parse().ok()?),
            ScalarType::Short => ScalarValue::Short(s.parse().ok()?),
            ScalarType::UShort => ScalarValue::UShort(s.parse().ok()?),
            ScalarType::Int => ScalarValue::Int(s.parse().ok()?),
            ScalarType::UInt => ScalarValue::UInt(s.parse().ok()?),
            ScalarType::Float => ScalarValue::Float(s.parse().ok()?),
            ScalarType::Double => ScalarValue::Double(s.parse().ok()?),
        };

        Some(v)
    }

    /// Formats the value as ASCII text. Floating point values are printed
    /// with the given number of decimals, after which trailing fractional
    /// zeros (and a then trailing `.`) are removed.
    pub fn format(&self, float_decimals: u8, double_decimals: u16) -> String {
        match *self {
            ScalarValue::Char(v) => v.to_string(),
            ScalarValue::UChar(v) => v.to_string(),
            ScalarValue::Short(v) => v.to_string(),
            ScalarValue::UShort(v) => v.to_string(),
            ScalarValue::Int(v) => v.to_string(),
            ScalarValue::UInt(v) => v.to_string(),
            ScalarValue::Float(v) => format_decimal(v.into(), float_decimals.into()),
            ScalarValue::Double(v) => format_decimal(v, double_decimals.into()),
        }
    }
}

/// Formats `v` with `decimals` fractional digits and trims the result.
pub(crate) fn format_decimal(v: f64, decimals: usize) -> String {
    let mut s = format!("{:.*}", decimals, v);
    if v.is_finite() && s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    s
}

/// Rust primitive types that correspond to a PLY scalar type.
pub trait Scalar: Copy + Into<ScalarValue> {
    const TYPE: ScalarType;
}

macro_rules! impl_scalar {
    ($ty:ident, $variant:ident) => {
        impl Scalar for $ty {
            const TYPE: ScalarType = ScalarType::$variant;
        }

        impl From<$ty> for ScalarValue {
            fn from(src: $ty) -> Self {
                ScalarValue::$variant(src)
            }
        }
    }
}

impl_scalar!(i8,  Char);
impl_scalar!(u8,  UChar);
impl_scalar!(i16, Short);
impl_scalar!(u16, UShort);
impl_scalar!(i32, Int);
impl_scalar!(u32, UInt);
impl_scalar!(f32, Float);
impl_scalar!(f64, Double);
