//! Values moved in and out of typed views.

use std::fmt;

use crate::layout::ScalarValue;

use super::structure::StructView;

/// A member element as read from, or written into, a view.
///
/// Composite members come back as [`Value::View`], a borrowed projection over the same
/// memory, so writes through it land in the parent's block.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Scalar(ScalarValue),
    Bytes(Vec<u8>),
    View(StructView),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Scalar(value) => value.kind_name(),
            Value::Bytes(_) => "bytes",
            Value::View(_) => "struct view",
        }
    }

    pub fn as_scalar(&self) -> Option<ScalarValue> {
        if let Value::Scalar(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_scalar().map(ScalarValue::as_i64)
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_scalar().map(ScalarValue::as_u64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_scalar().map(ScalarValue::as_f64)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let Value::Bytes(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    pub fn as_view(&self) -> Option<&StructView> {
        if let Value::View(view) = self {
            Some(view)
        } else {
            None
        }
    }

    pub fn into_view(self) -> Option<StructView> {
        if let Value::View(view) = self {
            Some(view)
        } else {
            None
        }
    }
}

macro_rules! impl_from_scalar {
    ($variant:ident, $wide:ty: $($ty:ty),+) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Scalar(ScalarValue::$variant(value as $wide))
                }
            }
        )+
    };
}

impl_from_scalar!(Signed, i64: i8, i16, i32, i64, isize);
impl_from_scalar!(Unsigned, u64: u8, u16, u32, u64, usize);
impl_from_scalar!(Float, f64: f32, f64);

impl From<ScalarValue> for Value {
    fn from(value: ScalarValue) -> Self {
        Value::Scalar(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<StructView> for Value {
    fn from(value: StructView) -> Self {
        Value::View(value)
    }
}

impl From<&StructView> for Value {
    fn from(value: &StructView) -> Self {
        Value::View(value.clone())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(ScalarValue::Signed(value)) => write!(f, "{value}"),
            Value::Scalar(ScalarValue::Unsigned(value)) => write!(f, "{value}"),
            Value::Scalar(ScalarValue::Float(value)) => write!(f, "{value}"),
            Value::Bytes(bytes) => {
                f.write_str("0x")?;
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::View(view) => fmt::Display::fmt(view, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_conversions_pick_the_matching_scalar_kind() {
        assert_eq!(Value::from(-3i16), Value::Scalar(ScalarValue::Signed(-3)));
        assert_eq!(Value::from(7u8), Value::Scalar(ScalarValue::Unsigned(7)));
        assert_eq!(Value::from(1.5f32).as_f64(), Some(1.5));
        assert_eq!(Value::from(vec![1u8, 2]).as_bytes(), Some(&[1u8, 2][..]));
    }

    #[test]
    fn display_renders_bytes_as_hex() {
        assert_eq!(Value::from(&[0xde, 0xad][..]).to_string(), "0xdead");
        assert_eq!(Value::from(-1i32).to_string(), "-1");
    }
}
