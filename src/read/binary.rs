//! The two binary data encodings: rows are packed back to back, each value
//! in the byte order the header declares.

use std::convert::TryFrom;

use byteorder::{BigEndian, LittleEndian};

use crate::{
    error::Result,
    scalar::{ScalarType, ScalarValue},
    scene::Format,
};
use super::layout::{Codec, Slot};


#[derive(Debug)]
pub(crate) struct BinaryCodec<'a> {
    data: &'a [u8],
    pos: usize,
    big_endian: bool,
    swap: bool,
}

impl<'a> BinaryCodec<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| err!(
                MalformedData,
                "unexpected end of data: {} more bytes needed at offset {}, but only {} left",
                len,
                self.pos,
                self.remaining(),
            ))?;

        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }
}

impl<'a> Codec<'a> for BinaryCodec<'a> {
    fn new(data: &'a [u8], format: Format) -> Self {
        Self {
            data,
            pos: 0,
            big_endian: format.resolve() == Format::BinaryBigEndian,
            swap: format.needs_swap(),
        }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn begin_row(&mut self) -> Result<()> {
        Ok(())
    }

    fn value(&mut self, ty: ScalarType, _: Slot, dst: Option<&mut [u8]>) -> Result<()> {
        let src = self.take(ty.size())?;
        if let Some(dst) = dst {
            dst.copy_from_slice(src);
            if self.swap {
                ty.swap_bytes(dst);
            }
        }
        Ok(())
    }

    fn count(&mut self, ty: ScalarType, dst: Option<&mut [u8]>) -> Result<u64> {
        let src = self.take(ty.size())?;
        let v = if self.big_endian {
            ScalarValue::read::<BigEndian>(ty, src)
        } else {
            ScalarValue::read::<LittleEndian>(ty, src)
        };

        let count = v.as_count()
            .ok_or_else(|| err!(MalformedData, "invalid list count {}", v.to_f64()))?;
        if let Some(dst) = dst {
            dst.copy_from_slice(src);
            if self.swap {
                ty.swap_bytes(dst);
            }
        }
        Ok(count)
    }

    fn skip_items(&mut self, ty: ScalarType, count: u64) -> Result<()> {
        let len = count.checked_mul(ty.size() as u64)
            .and_then(|len| usize::try_from(len).ok())
            .ok_or_else(|| err!(BoundsExceeded, "list of {} items is too large", count))?;
        self.take(len).map(|_| ())
    }

    fn end_row(&mut self) -> Result<()> {
        Ok(())
    }
}
