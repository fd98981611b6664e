//! Mask payload decoding.
//!
//! Backend mask payloads arrive as shape-tagged byte sequences written in the
//! producer's native byte order. The header carries a known sentinel value;
//! decode compares it against both byte orders to detect which one the
//! producer used. Payloads carrying the NumPy magic are accepted as an
//! alternate wire format.
//!
//! Decoding is a pure function with no side effects, safe to call from any
//! thread.

use std::io::Cursor;

use ndarray::{Array2, ArrayD, Ix2};
use ndarray_npy::ReadNpyExt;
use thiserror::Error;

/// Magic bytes of the shape-tagged wire format.
pub const MAGIC: [u8; 2] = [0x9D, 0x56];

/// NumPy magic bytes: \x93NUMPY
const NPY_MAGIC: &[u8] = &[0x93, b'N', b'U', b'M', b'P', b'Y'];

/// Wire format version this decoder understands.
const VERSION: u8 = 1;

/// Known sentinel value written in the producer's byte order.
const SENTINEL: u32 = 0x0001_0203;

/// Header size in bytes: magic + version + dtype + sentinel + rows + cols.
const HEADER_SIZE: usize = 16;

/// Errors raised while decoding a mask payload.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("mask payload truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unrecognized mask payload header")]
    UnknownFormat,

    #[error("unsupported mask format version {0}")]
    UnsupportedVersion(u8),

    #[error("unsupported mask element type code {0}")]
    UnsupportedDtype(u8),

    #[error("byte-order sentinel matches neither little nor big endian")]
    ByteOrder,

    #[error("shape {rows}x{cols} inconsistent with {actual} data bytes")]
    Shape {
        rows: usize,
        cols: usize,
        actual: usize,
    },

    #[error("failed to read NumPy payload: {0}")]
    Npy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn read_u32(self, bytes: &[u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(*bytes),
            ByteOrder::Big => u32::from_be_bytes(*bytes),
        }
    }
}

/// Typed element storage of a decoded mask.
#[derive(Debug, Clone, PartialEq)]
pub enum MaskData {
    U8(Array2<u8>),
    U16(Array2<u16>),
    I32(Array2<i32>),
    F32(Array2<f32>),
}

/// A decoded 2-D mask buffer with `[height, width]` shape.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskBuffer {
    data: MaskData,
}

impl MaskBuffer {
    pub fn new(data: MaskData) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &MaskData {
        &self.data
    }

    /// `[height, width]`.
    pub fn shape(&self) -> [usize; 2] {
        let dim = match &self.data {
            MaskData::U8(a) => a.dim(),
            MaskData::U16(a) => a.dim(),
            MaskData::I32(a) => a.dim(),
            MaskData::F32(a) => a.dim(),
        };
        [dim.0, dim.1]
    }

    pub fn height(&self) -> usize {
        self.shape()[0]
    }

    pub fn width(&self) -> usize {
        self.shape()[1]
    }

    /// Uniform numeric read, for hit-testing and tint lookups.
    /// Out-of-range coordinates read as 0.
    pub fn value_at(&self, row: usize, col: usize) -> f64 {
        if row >= self.height() || col >= self.width() {
            return 0.0;
        }
        match &self.data {
            MaskData::U8(a) => f64::from(a[[row, col]]),
            MaskData::U16(a) => f64::from(a[[row, col]]),
            MaskData::I32(a) => f64::from(a[[row, col]]),
            MaskData::F32(a) => f64::from(a[[row, col]]),
        }
    }

    /// Whether the pixel is part of the mask foreground (nonzero).
    pub fn is_foreground(&self, row: usize, col: usize) -> bool {
        self.value_at(row, col) != 0.0
    }

    /// Resident size of the element buffer.
    pub fn size_bytes(&self) -> usize {
        let [h, w] = self.shape();
        h * w * self.element_size()
    }

    fn element_size(&self) -> usize {
        match &self.data {
            MaskData::U8(_) => 1,
            MaskData::U16(_) => 2,
            MaskData::I32(_) => 4,
            MaskData::F32(_) => 4,
        }
    }

    fn dtype_code(&self) -> u8 {
        match &self.data {
            MaskData::U8(_) => 1,
            MaskData::U16(_) => 2,
            MaskData::I32(_) => 3,
            MaskData::F32(_) => 4,
        }
    }
}

/// Decode a mask payload, auto-detecting byte order from the sentinel.
pub fn decode(bytes: &[u8]) -> Result<MaskBuffer, DecodeError> {
    if bytes.starts_with(NPY_MAGIC) {
        return decode_npy(bytes);
    }

    if bytes.len() < HEADER_SIZE {
        // Too short to even say which format it is
        if bytes.len() >= MAGIC.len() && bytes[..2] != MAGIC {
            return Err(DecodeError::UnknownFormat);
        }
        return Err(DecodeError::Truncated {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    if bytes[..2] != MAGIC {
        return Err(DecodeError::UnknownFormat);
    }

    let version = bytes[2];
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let dtype = bytes[3];

    let sentinel_bytes: [u8; 4] = bytes[4..8].try_into().expect("4-byte slice");
    let order = if u32::from_le_bytes(sentinel_bytes) == SENTINEL {
        ByteOrder::Little
    } else if u32::from_be_bytes(sentinel_bytes) == SENTINEL {
        ByteOrder::Big
    } else {
        return Err(DecodeError::ByteOrder);
    };

    let rows = order.read_u32(&bytes[8..12].try_into().expect("4-byte slice")) as usize;
    let cols = order.read_u32(&bytes[12..16].try_into().expect("4-byte slice")) as usize;

    let element_size = match dtype {
        1 => 1,
        2 => 2,
        3 | 4 => 4,
        other => return Err(DecodeError::UnsupportedDtype(other)),
    };

    let data = &bytes[HEADER_SIZE..];
    let expected = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(element_size))
        .ok_or(DecodeError::Shape {
            rows,
            cols,
            actual: data.len(),
        })?;

    if data.len() < expected {
        return Err(DecodeError::Truncated {
            expected: expected + HEADER_SIZE,
            actual: bytes.len(),
        });
    }
    if data.len() > expected {
        return Err(DecodeError::Shape {
            rows,
            cols,
            actual: data.len(),
        });
    }

    let shape_err = |_| DecodeError::Shape {
        rows,
        cols,
        actual: data.len(),
    };

    let mask = match dtype {
        1 => MaskData::U8(Array2::from_shape_vec((rows, cols), data.to_vec()).map_err(shape_err)?),
        2 => {
            let values = data
                .chunks_exact(2)
                .map(|c| {
                    let b: [u8; 2] = c.try_into().expect("2-byte chunk");
                    match order {
                        ByteOrder::Little => u16::from_le_bytes(b),
                        ByteOrder::Big => u16::from_be_bytes(b),
                    }
                })
                .collect();
            MaskData::U16(Array2::from_shape_vec((rows, cols), values).map_err(shape_err)?)
        }
        3 => {
            let values = data
                .chunks_exact(4)
                .map(|c| {
                    let b: [u8; 4] = c.try_into().expect("4-byte chunk");
                    match order {
                        ByteOrder::Little => i32::from_le_bytes(b),
                        ByteOrder::Big => i32::from_be_bytes(b),
                    }
                })
                .collect();
            MaskData::I32(Array2::from_shape_vec((rows, cols), values).map_err(shape_err)?)
        }
        4 => {
            let values = data
                .chunks_exact(4)
                .map(|c| {
                    let b: [u8; 4] = c.try_into().expect("4-byte chunk");
                    match order {
                        ByteOrder::Little => f32::from_le_bytes(b),
                        ByteOrder::Big => f32::from_be_bytes(b),
                    }
                })
                .collect();
            MaskData::F32(Array2::from_shape_vec((rows, cols), values).map_err(shape_err)?)
        }
        _ => unreachable!("dtype validated above"),
    };

    Ok(MaskBuffer::new(mask))
}

/// Encode a mask buffer in the shape-tagged format, native byte order.
///
/// `decode(encode(m))` preserves every element value exactly.
pub fn encode(mask: &MaskBuffer) -> Vec<u8> {
    let [rows, cols] = mask.shape();
    let mut out = Vec::with_capacity(HEADER_SIZE + mask.size_bytes());

    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    out.push(mask.dtype_code());
    out.extend_from_slice(&SENTINEL.to_ne_bytes());
    out.extend_from_slice(&(rows as u32).to_ne_bytes());
    out.extend_from_slice(&(cols as u32).to_ne_bytes());

    match mask.data() {
        MaskData::U8(a) => {
            for &v in a.iter() {
                out.push(v);
            }
        }
        MaskData::U16(a) => {
            for &v in a.iter() {
                out.extend_from_slice(&v.to_ne_bytes());
            }
        }
        MaskData::I32(a) => {
            for &v in a.iter() {
                out.extend_from_slice(&v.to_ne_bytes());
            }
        }
        MaskData::F32(a) => {
            for &v in a.iter() {
                out.extend_from_slice(&v.to_ne_bytes());
            }
        }
    }

    out
}

/// Decode a NumPy-format payload. Tries element types in order of
/// likelihood, most common first.
fn decode_npy(bytes: &[u8]) -> Result<MaskBuffer, DecodeError> {
    fn to_2d<T>(array: ArrayD<T>) -> Option<Array2<T>> {
        array.into_dimensionality::<Ix2>().ok()
    }

    if let Ok(array) = ArrayD::<u8>::read_npy(Cursor::new(bytes)) {
        if let Some(a) = to_2d(array) {
            return Ok(MaskBuffer::new(MaskData::U8(a)));
        }
        return Err(DecodeError::Npy("expected a 2-D array".into()));
    }
    if let Ok(array) = ArrayD::<u16>::read_npy(Cursor::new(bytes)) {
        if let Some(a) = to_2d(array) {
            return Ok(MaskBuffer::new(MaskData::U16(a)));
        }
        return Err(DecodeError::Npy("expected a 2-D array".into()));
    }
    if let Ok(array) = ArrayD::<i32>::read_npy(Cursor::new(bytes)) {
        if let Some(a) = to_2d(array) {
            return Ok(MaskBuffer::new(MaskData::I32(a)));
        }
        return Err(DecodeError::Npy("expected a 2-D array".into()));
    }
    if let Ok(array) = ArrayD::<f32>::read_npy(Cursor::new(bytes)) {
        if let Some(a) = to_2d(array) {
            return Ok(MaskBuffer::new(MaskData::F32(a)));
        }
        return Err(DecodeError::Npy("expected a 2-D array".into()));
    }

    Err(DecodeError::Npy(
        "unsupported dtype or invalid format".into(),
    ))
}
