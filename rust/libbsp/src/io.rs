use crate::error::{BspError, BspResult};
use bytes::{Buf, BufMut};
use cgmath::{Vector3, Vector4};
use std::mem::size_of;

pub trait Readable: Sized {
    fn read(from: &mut dyn Buf) -> BspResult<Self>;
}

pub trait Writable {
    fn write(&self, to: &mut dyn BufMut) -> BspResult<()>;
}

/// A fixed-size record, stored back to back in a lump.
pub trait Record: Readable + Writable {
    const SIZE: usize;
}

/// Reads `count` records from the start of `data`.
pub fn read_records<T: Record>(data: &[u8], count: usize) -> BspResult<Vec<T>> {
    let mut from = data;
    let mut result: Vec<T> = Vec::with_capacity(count);

    for _ in 0..count {
        result.push(T::read(&mut from)?);
    }

    Ok(result)
}

pub fn write_records<T: Writable>(records: &[T], to: &mut dyn BufMut) -> BspResult<()> {
    for record in records {
        record.write(to)?;
    }
    Ok(())
}

/// Zero-fills `to` up to the next multiple of `alignment`.
pub fn pad_to(to: &mut Vec<u8>, alignment: usize) {
    let padded = align_up(to.len(), alignment);
    to.resize(padded, 0);
}

pub fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) / alignment * alignment
}

macro_rules! primitive_readable {
    ($ty: ty, $read_fn: ident) => {
        impl Readable for $ty {
            fn read(from: &mut dyn Buf) -> BspResult<Self> {
                if from.remaining() < size_of::<Self>() {
                    return Err(BspError::UnexpectedEof {
                        needed: size_of::<Self>(),
                        remaining: from.remaining(),
                    });
                }
                Ok(from.$read_fn())
            }
        }
    };
}

macro_rules! primitive_writable {
    ($ty: ty, $write_fn: ident) => {
        impl Writable for $ty {
            fn write(&self, to: &mut dyn BufMut) -> BspResult<()> {
                to.$write_fn(*self);
                Ok(())
            }
        }

        impl Record for $ty {
            const SIZE: usize = size_of::<$ty>();
        }
    };
}

primitive_readable!(u8, get_u8);
primitive_readable!(u16, get_u16_le);
primitive_readable!(u32, get_u32_le);

primitive_readable!(i8, get_i8);
primitive_readable!(i16, get_i16_le);
primitive_readable!(i32, get_i32_le);

primitive_readable!(f32, get_f32_le);

primitive_writable!(u8, put_u8);
primitive_writable!(u16, put_u16_le);
primitive_writable!(u32, put_u32_le);

primitive_writable!(i8, put_i8);
primitive_writable!(i16, put_i16_le);
primitive_writable!(i32, put_i32_le);

primitive_writable!(f32, put_f32_le);

impl<T, const N: usize> Readable for [T; N]
where
    T: Readable + Default + Copy,
{
    fn read(from: &mut dyn Buf) -> BspResult<Self> {
        let mut result = [T::default(); N];
        for item in result.iter_mut() {
            *item = T::read(from)?;
        }
        Ok(result)
    }
}

impl<T: Writable, const N: usize> Writable for [T; N] {
    fn write(&self, to: &mut dyn BufMut) -> BspResult<()> {
        for item in self {
            item.write(to)?;
        }
        Ok(())
    }
}

impl Readable for Vector3<f32> {
    fn read(from: &mut dyn Buf) -> BspResult<Self> {
        Ok(Vector3 {
            x: f32::read(from)?,
            y: f32::read(from)?,
            z: f32::read(from)?,
        })
    }
}

impl Writable for Vector3<f32> {
    fn write(&self, to: &mut dyn BufMut) -> BspResult<()> {
        self.x.write(to)?;
        self.y.write(to)?;
        self.z.write(to)?;
        Ok(())
    }
}

impl Record for Vector3<f32> {
    const SIZE: usize = 12;
}

impl Readable for Vector4<f32> {
    fn read(from: &mut dyn Buf) -> BspResult<Self> {
        Ok(Vector4 {
            x: f32::read(from)?,
            y: f32::read(from)?,
            z: f32::read(from)?,
            w: f32::read(from)?,
        })
    }
}

impl Writable for Vector4<f32> {
    fn write(&self, to: &mut dyn BufMut) -> BspResult<()> {
        self.x.write(to)?;
        self.y.write(to)?;
        self.z.write(to)?;
        self.w.write(to)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_reads_report_eof() {
        let mut from: &[u8] = &[1, 2, 3];
        match u32::read(&mut from) {
            Err(BspError::UnexpectedEof { needed, remaining }) => {
                assert_eq!(needed, 4);
                assert_eq!(remaining, 3);
            }
            other => panic!("expected EOF, got {:?}", other),
        }
    }

    #[test]
    fn arrays_and_vectors_are_little_endian() {
        let mut out = Vec::new();
        [1i16, -1].write(&mut out).unwrap();
        Vector3::new(1.0f32, 0.0, -2.0).write(&mut out).unwrap();
        assert_eq!(&out[..4], &[1, 0, 0xff, 0xff]);

        let mut from = &out[..];
        assert_eq!(<[i16; 2]>::read(&mut from).unwrap(), [1, -1]);
        assert_eq!(
            Vector3::<f32>::read(&mut from).unwrap(),
            Vector3::new(1.0, 0.0, -2.0)
        );
        assert_eq!(from.remaining(), 0);
    }

    #[test]
    fn padding_is_zeroed() {
        let mut out = vec![7u8; 5];
        pad_to(&mut out, 16);
        assert_eq!(out.len(), 16);
        assert!(out[5..].iter().all(|b| *b == 0));
        pad_to(&mut out, 16);
        assert_eq!(out.len(), 16);
    }
}
