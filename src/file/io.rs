//! Low-level byte order and safe reading/writing utilities for metadata structures.
//!
//! All metadata is little-endian. Reading is bounds-checked against the source slice and
//! returns [`crate::Error::OutOfBounds`] instead of panicking. Writing appends to a growing
//! `Vec<u8>`, because every stream this crate produces is assembled in memory before it is
//! handed to the caller.
//!
//! The `*_dyn` variants handle the metadata columns whose width is only known after the
//! table and heap sizes have been finalized: they read or write either 2 or 4 bytes.

use crate::{Error, Error::OutOfBounds, Result};

/// Trait for fixed-size numeric types that can be read from and written to little-endian bytes.
pub trait CilIO: Sized + Copy {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_cil_io {
    ($($ty:ty),*) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_cil_io!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Safely reads a value of type `T` in little-endian byte order from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` at `offset` and advances `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let end = offset.checked_add(type_len).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Dynamically reads either a 2-byte or 4-byte value in little-endian byte order.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    let res = if is_large {
        read_le_at::<u32>(data, offset)?
    } else {
        u32::from(read_le_at::<u16>(data, offset)?)
    };

    Ok(res)
}

/// Appends `value` to `buffer` in little-endian byte order.
pub fn write_le<T: CilIO>(buffer: &mut Vec<u8>, value: T) {
    buffer.extend_from_slice(value.to_le_bytes().as_ref());
}

/// Appends `value` as either 2 or 4 little-endian bytes.
///
/// # Errors
/// Returns [`crate::Error::FormatOverflow`] if `is_large` is `false` and `value` does not fit
/// into 16 bits. Silent truncation would corrupt the column without any reader noticing.
pub fn write_le_dyn(buffer: &mut Vec<u8>, value: u32, is_large: bool) -> Result<()> {
    if is_large {
        write_le::<u32>(buffer, value);
    } else {
        let narrow = u16::try_from(value).map_err(|_| Error::FormatOverflow {
            what: "2-byte index column",
            value: u64::from(value),
            max: u64::from(u16::MAX),
        })?;
        write_le::<u16>(buffer, narrow);
    }

    Ok(())
}

/// Appends `value` using exactly `width` little-endian bytes (1, 2 or 4).
///
/// # Errors
/// Returns [`crate::Error::FormatOverflow`] if `value` does not fit into `width` bytes.
pub fn write_le_width(buffer: &mut Vec<u8>, value: u32, width: u8) -> Result<()> {
    match width {
        1 => {
            let narrow = u8::try_from(value).map_err(|_| Error::FormatOverflow {
                what: "1-byte column",
                value: u64::from(value),
                max: u64::from(u8::MAX),
            })?;
            write_le::<u8>(buffer, narrow);
            Ok(())
        }
        2 => write_le_dyn(buffer, value, false),
        4 => write_le_dyn(buffer, value, true),
        _ => Err(malformed_error!("Unsupported column width - {}", width)),
    }
}

/// Reads exactly `width` little-endian bytes (1, 2 or 4) as a `u32`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le_at_width(data: &[u8], offset: &mut usize, width: u8) -> Result<u32> {
    match width {
        1 => Ok(u32::from(read_le_at::<u8>(data, offset)?)),
        2 => read_le_at_dyn(data, offset, false),
        4 => read_le_at_dyn(data, offset, true),
        _ => Err(malformed_error!("Unsupported column width - {}", width)),
    }
}
