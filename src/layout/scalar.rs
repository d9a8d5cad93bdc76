//! Scalar codecs for the native C arithmetic types. Values are read and written in host byte
//! order; no byte swapping is ever performed.

use std::ffi::{
    c_char, c_double, c_float, c_int, c_long, c_longlong, c_schar, c_short, c_uchar, c_uint,
    c_ulong, c_ulonglong, c_ushort,
};
use std::mem::{align_of, size_of};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarEncoding {
    Unsigned,
    Signed,
    Floating,
}

/// A decoded scalar, widened to 64 bits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScalarValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl ScalarValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ScalarValue::Signed(_) => "signed integer",
            ScalarValue::Unsigned(_) => "unsigned integer",
            ScalarValue::Float(_) => "float",
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            ScalarValue::Signed(value) => value,
            ScalarValue::Unsigned(value) => value as i64,
            ScalarValue::Float(value) => value as i64,
        }
    }

    pub fn as_u64(self) -> u64 {
        match self {
            ScalarValue::Signed(value) => value as u64,
            ScalarValue::Unsigned(value) => value,
            ScalarValue::Float(value) => value as u64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            ScalarValue::Signed(value) => value as f64,
            ScalarValue::Unsigned(value) => value as f64,
            ScalarValue::Float(value) => value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScalarType {
    pub encoding: ScalarEncoding,
    pub byte_size: usize,
    storage: ScalarStorage,
}

impl ScalarType {
    /// Returns `None` for widths that have no native storage (and for floats other than 4 or 8
    /// bytes).
    pub fn new(encoding: ScalarEncoding, byte_size: usize) -> Option<Self> {
        let storage = ScalarStorage::for_bytes(byte_size)?;
        if encoding == ScalarEncoding::Floating
            && !matches!(storage, ScalarStorage::U32 | ScalarStorage::U64)
        {
            return None;
        }
        Some(Self {
            encoding,
            byte_size,
            storage,
        })
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.encoding, ScalarEncoding::Signed)
    }

    /// Decodes exactly `byte_size` bytes.
    pub fn decode(&self, bytes: &[u8]) -> ScalarValue {
        let raw = self.storage.read(bytes);
        match self.encoding {
            ScalarEncoding::Unsigned => ScalarValue::Unsigned(raw),
            ScalarEncoding::Signed => {
                let shift = 64 - self.storage.bit_size();
                ScalarValue::Signed(((raw << shift) as i64) >> shift)
            }
            ScalarEncoding::Floating => match self.storage {
                ScalarStorage::U32 => ScalarValue::Float(f32::from_bits(raw as u32) as f64),
                _ => ScalarValue::Float(f64::from_bits(raw)),
            },
        }
    }

    /// Encodes `value` into exactly `byte_size` bytes, truncating integers the way a C
    /// assignment would. Integer slots refuse floating point values and report `false`.
    pub fn encode(&self, value: ScalarValue, out: &mut [u8]) -> bool {
        let raw = match (self.encoding, value) {
            (ScalarEncoding::Floating, value) => match self.storage {
                ScalarStorage::U32 => (value.as_f64() as f32).to_bits() as u64,
                _ => value.as_f64().to_bits(),
            },
            (_, ScalarValue::Float(_)) => return false,
            (_, ScalarValue::Signed(value)) => value as u64,
            (_, ScalarValue::Unsigned(value)) => value,
        };
        self.storage.write(out, raw);
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScalarStorage {
    U8,
    U16,
    U32,
    U64,
}

impl ScalarStorage {
    fn for_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(ScalarStorage::U8),
            2 => Some(ScalarStorage::U16),
            4 => Some(ScalarStorage::U32),
            8 => Some(ScalarStorage::U64),
            _ => None,
        }
    }

    fn bit_size(self) -> u32 {
        match self {
            ScalarStorage::U8 => 8,
            ScalarStorage::U16 => 16,
            ScalarStorage::U32 => 32,
            ScalarStorage::U64 => 64,
        }
    }

    fn read(self, bytes: &[u8]) -> u64 {
        match self {
            ScalarStorage::U8 => bytes[0] as u64,
            ScalarStorage::U16 => u16::from_ne_bytes([bytes[0], bytes[1]]) as u64,
            ScalarStorage::U32 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&bytes[..4]);
                u32::from_ne_bytes(buf) as u64
            }
            ScalarStorage::U64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes[..8]);
                u64::from_ne_bytes(buf)
            }
        }
    }

    fn write(self, out: &mut [u8], value: u64) {
        match self {
            ScalarStorage::U8 => out[0] = value as u8,
            ScalarStorage::U16 => out[..2].copy_from_slice(&(value as u16).to_ne_bytes()),
            ScalarStorage::U32 => out[..4].copy_from_slice(&(value as u32).to_ne_bytes()),
            ScalarStorage::U64 => out[..8].copy_from_slice(&value.to_ne_bytes()),
        }
    }
}

pub(crate) struct NativeScalar {
    pub name: &'static str,
    pub scalar: ScalarType,
    pub alignment: usize,
}

macro_rules! native {
    ($name:literal, $ty:ty, $encoding:expr) => {
        ($name, $encoding, size_of::<$ty>(), align_of::<$ty>())
    };
}

/// The C arithmetic types with the host's sizes and alignments.
pub(crate) fn native_scalars() -> impl Iterator<Item = NativeScalar> {
    use ScalarEncoding::{Floating, Signed, Unsigned};

    let char_encoding = if c_char::MIN == 0 { Unsigned } else { Signed };
    [
        native!("char", c_char, char_encoding),
        native!("signed_char", c_schar, Signed),
        native!("unsigned_char", c_uchar, Unsigned),
        native!("int8_t", i8, Signed),
        native!("uint8_t", u8, Unsigned),
        native!("short", c_short, Signed),
        native!("unsigned_short", c_ushort, Unsigned),
        native!("int16_t", i16, Signed),
        native!("uint16_t", u16, Unsigned),
        native!("int", c_int, Signed),
        native!("unsigned_int", c_uint, Unsigned),
        native!("int32_t", i32, Signed),
        native!("uint32_t", u32, Unsigned),
        native!("long", c_long, Signed),
        native!("unsigned_long", c_ulong, Unsigned),
        native!("long_long", c_longlong, Signed),
        native!("unsigned_long_long", c_ulonglong, Unsigned),
        native!("int64_t", i64, Signed),
        native!("uint64_t", u64, Unsigned),
        native!("float", c_float, Floating),
        native!("double", c_double, Floating),
        native!("size_t", usize, Unsigned),
        native!("ptrdiff_t", isize, Signed),
        native!("intptr_t", isize, Signed),
        native!("uintptr_t", usize, Unsigned),
    ]
    .into_iter()
    .filter_map(|(name, encoding, size, alignment)| {
        ScalarType::new(encoding, size).map(|scalar| NativeScalar {
            name,
            scalar,
            alignment,
        })
    })
}

/// Short spellings accepted anywhere a native type name is.
pub(crate) const SHORT_NAMES: &[(&str, &str)] = &[
    ("c", "char"),
    ("sc", "signed_char"),
    ("uc", "unsigned_char"),
    ("ui8", "uint8_t"),
    ("i8", "int8_t"),
    ("s", "short"),
    ("us", "unsigned_short"),
    ("ui16", "uint16_t"),
    ("i16", "int16_t"),
    ("i32", "int32_t"),
    ("ui32", "uint32_t"),
    ("ui64", "uint64_t"),
    ("i64", "int64_t"),
    ("ul", "unsigned_long"),
    ("ull", "unsigned_long_long"),
    ("l", "long"),
    ("ll", "long_long"),
    ("i", "int"),
    ("ui", "unsigned_int"),
    ("f", "float"),
    ("d", "double"),
    ("zu", "size_t"),
    ("td", "ptrdiff_t"),
    ("ip", "intptr_t"),
    ("uip", "uintptr_t"),
    ("*", "intptr_t"),
];

#[cfg(test)]
mod tests {
    //! Scalar codecs must agree with the host's own integer and float representations.
    use super::*;

    #[test]
    fn signed_values_sign_extend_on_decode() {
        // a 16-bit -2 must come back as -2, not 65534
        let scalar = ScalarType::new(ScalarEncoding::Signed, 2).unwrap();
        let bytes = (-2i16).to_ne_bytes();
        assert_eq!(scalar.decode(&bytes), ScalarValue::Signed(-2));
    }

    #[test]
    fn encode_truncates_wide_integers() {
        let scalar = ScalarType::new(ScalarEncoding::Unsigned, 1).unwrap();
        let mut out = [0u8; 1];
        assert!(scalar.encode(ScalarValue::Unsigned(0x1FF), &mut out));
        assert_eq!(out, [0xFF], "only the low byte should be stored");
    }

    #[test]
    fn floats_round_trip_through_native_bits() {
        let scalar = ScalarType::new(ScalarEncoding::Floating, 4).unwrap();
        let mut out = [0u8; 4];
        assert!(scalar.encode(ScalarValue::Float(1.5), &mut out));
        assert_eq!(out, 1.5f32.to_ne_bytes());
        assert_eq!(scalar.decode(&out), ScalarValue::Float(1.5));
    }

    #[test]
    fn integer_slots_reject_floats() {
        let scalar = ScalarType::new(ScalarEncoding::Signed, 4).unwrap();
        let mut out = [0u8; 4];
        assert!(
            !scalar.encode(ScalarValue::Float(2.0), &mut out),
            "float into int slot should be refused"
        );
    }

    #[test]
    fn unsupported_widths_have_no_storage() {
        assert!(ScalarType::new(ScalarEncoding::Unsigned, 3).is_none());
        assert!(ScalarType::new(ScalarEncoding::Floating, 2).is_none());
    }

    #[test]
    fn native_table_matches_host_layout() {
        let double = native_scalars()
            .find(|entry| entry.name == "double")
            .expect("double is always present");
        assert_eq!(double.scalar.byte_size, size_of::<f64>());
        assert_eq!(double.alignment, align_of::<f64>());
        assert_eq!(native_scalars().count(), 25, "every C scalar should have storage");
    }
}
