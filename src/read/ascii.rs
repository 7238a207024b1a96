//! The ASCII data encoding: one row per line, values separated by
//! whitespace.

use byteorder::NativeEndian;

use crate::{
    error::Result,
    scalar::{ScalarType, ScalarValue},
    scene::Format,
    util::{self, Lines},
};
use super::layout::{Codec, Slot};


#[derive(Debug)]
pub(crate) struct AsciiCodec<'a> {
    data: &'a [u8],
    lines: Lines<'a>,

    /// The unconsumed rest of the current row.
    row: &'a [u8],
}

impl<'a> AsciiCodec<'a> {
    fn next_token(&mut self) -> Option<&'a [u8]> {
        let rest = util::trim(self.row);
        if rest.is_empty() {
            self.row = rest;
            return None;
        }

        let end = rest.iter().position(|&b| util::is_blank(b)).unwrap_or(rest.len());
        self.row = &rest[end..];
        Some(&rest[..end])
    }

    fn parse(token: &[u8], ty: ScalarType) -> Result<ScalarValue> {
        ScalarValue::parse(ty, token).ok_or_else(|| err!(
            DataTypeMismatch,
            "{} is not a valid '{}' value",
            util::debug_fmt_bytes(token, 30),
            ty,
        ))
    }
}

impl<'a> Codec<'a> for AsciiCodec<'a> {
    fn new(data: &'a [u8], _: Format) -> Self {
        Self {
            data,
            lines: Lines::new(data),
            row: &[],
        }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.lines.pos()
    }

    fn begin_row(&mut self) -> Result<()> {
        self.row = self.lines.next()
            .ok_or_else(|| err!(MalformedData, "unexpected end of data: more rows expected"))?;
        Ok(())
    }

    fn value(&mut self, ty: ScalarType, slot: Slot, dst: Option<&mut [u8]>) -> Result<()> {
        let token = match (self.next_token(), slot) {
            (Some(token), _) => token,
            (None, Slot::Scalar) => return Err(err!(MalformedData, "row ends before all values were read")),
            (None, Slot::ListItem) => {
                return Err(err!(ListCountMismatch, "row ends before all list items were read"));
            }
        };

        let v = Self::parse(token, ty)?;
        if let Some(dst) = dst {
            v.write::<NativeEndian>(dst);
        }
        Ok(())
    }

    fn count(&mut self, ty: ScalarType, dst: Option<&mut [u8]>) -> Result<u64> {
        let token = self.next_token()
            .ok_or_else(|| err!(MalformedData, "row ends before all values were read"))?;

        let v = Self::parse(token, ty)?;
        let count = v.as_count()
            .ok_or_else(|| err!(MalformedData, "invalid list count {}", v.to_f64()))?;
        if let Some(dst) = dst {
            v.write::<NativeEndian>(dst);
        }
        Ok(count)
    }

    fn end_row(&mut self) -> Result<()> {
        match self.next_token() {
            None => Ok(()),
            Some(token) => Err(err!(
                MalformedData,
                "unexpected value {} after the last property of a row",
                util::debug_fmt_bytes(token, 30),
            )),
        }
    }
}
