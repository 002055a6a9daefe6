//! Scalar kinds a search can run over, and the tagged union used to pass
//! their values across the kind-erased session boundary.

use std::{fmt, str::FromStr};

use cubium_core::memory::{AddressSpace, MemoryAccess, ReadResult};

/// Scalar kind backing a search session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    U8,
    U16,
    U32,
    U64,
    S8,
    S16,
    S32,
    S64,
    F32,
    F64,
}

impl DataType {
    pub const ALL: [DataType; 10] = [
        DataType::U8,
        DataType::U16,
        DataType::U32,
        DataType::U64,
        DataType::S8,
        DataType::S16,
        DataType::S32,
        DataType::S64,
        DataType::F32,
        DataType::F64,
    ];

    /// Width of one value in emulated memory.
    pub fn size(self) -> usize {
        match self {
            DataType::U8 | DataType::S8 => 1,
            DataType::U16 | DataType::S16 => 2,
            DataType::U32 | DataType::S32 | DataType::F32 => 4,
            DataType::U64 | DataType::S64 | DataType::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::U8 => "u8",
            DataType::U16 => "u16",
            DataType::U32 => "u32",
            DataType::U64 => "u64",
            DataType::S8 => "s8",
            DataType::S16 => "s16",
            DataType::S32 => "s32",
            DataType::S64 => "s64",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        DataType::ALL
            .into_iter()
            .find(|ty| ty.name() == lowered)
            .ok_or_else(|| format!("unknown data type: {s}"))
    }
}

/// A value of any supported scalar kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    S8(i8),
    S16(i16),
    S32(i32),
    S64(i64),
    F32(f32),
    F64(f64),
}

impl SearchValue {
    pub fn data_type(&self) -> DataType {
        match self {
            SearchValue::U8(_) => DataType::U8,
            SearchValue::U16(_) => DataType::U16,
            SearchValue::U32(_) => DataType::U32,
            SearchValue::U64(_) => DataType::U64,
            SearchValue::S8(_) => DataType::S8,
            SearchValue::S16(_) => DataType::S16,
            SearchValue::S32(_) => DataType::S32,
            SearchValue::S64(_) => DataType::S64,
            SearchValue::F32(_) => DataType::F32,
            SearchValue::F64(_) => DataType::F64,
        }
    }

    /// Big-endian byte form, as the value would appear in emulated memory.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        match *self {
            SearchValue::U8(v) => v.to_be_bytes().to_vec(),
            SearchValue::U16(v) => v.to_be_bytes().to_vec(),
            SearchValue::U32(v) => v.to_be_bytes().to_vec(),
            SearchValue::U64(v) => v.to_be_bytes().to_vec(),
            SearchValue::S8(v) => v.to_be_bytes().to_vec(),
            SearchValue::S16(v) => v.to_be_bytes().to_vec(),
            SearchValue::S32(v) => v.to_be_bytes().to_vec(),
            SearchValue::S64(v) => v.to_be_bytes().to_vec(),
            SearchValue::F32(v) => v.to_bits().to_be_bytes().to_vec(),
            SearchValue::F64(v) => v.to_bits().to_be_bytes().to_vec(),
        }
    }
}

pub fn get_data_type(value: &SearchValue) -> DataType {
    value.data_type()
}

pub fn get_value_as_byte_vector(value: &SearchValue) -> Vec<u8> {
    value.to_be_bytes()
}

mod sealed {
    pub trait Sealed {}
}

/// Scalar types a [`super::CheatSearchSession`] can be instantiated with.
///
/// Comparisons use `PartialOrd`, so float kinds follow IEEE 754 (every
/// ordered comparison against NaN is false, `NaN != NaN` is true).
pub trait SearchScalar:
    sealed::Sealed + Copy + PartialOrd + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    const DATA_TYPE: DataType;

    fn try_read(mem: &dyn MemoryAccess, addr: u32, space: AddressSpace)
    -> Option<ReadResult<Self>>;

    /// Parses a user-typed literal. Empty or malformed input yields `None`.
    fn parse_literal(text: &str) -> Option<Self>;

    fn into_search_value(self) -> SearchValue;

    /// Zero-padded hex of the raw bit pattern.
    fn to_hex_string(self) -> String;
}

fn parse_magnitude(text: &str) -> Option<u64> {
    if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        if hex.is_empty() || hex.starts_with(['+', '-']) {
            return None;
        }
        return u64::from_str_radix(hex, 16).ok();
    }
    if text.starts_with(['+', '-']) {
        return None;
    }
    text.parse().ok()
}

fn parse_integer_literal(text: &str) -> Option<i128> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let magnitude = i128::from(parse_magnitude(body)?);
    Some(if negative { -magnitude } else { magnitude })
}

macro_rules! impl_integer_scalar {
    ($ty:ty, $bits:ty, $kind:ident, $read:ident) => {
        impl sealed::Sealed for $ty {}

        impl SearchScalar for $ty {
            const DATA_TYPE: DataType = DataType::$kind;

            fn try_read(
                mem: &dyn MemoryAccess,
                addr: u32,
                space: AddressSpace,
            ) -> Option<ReadResult<Self>> {
                mem.$read(addr, space)
                    .map(|r| r.map(|raw| <$ty>::from_be_bytes(raw.to_be_bytes())))
            }

            fn parse_literal(text: &str) -> Option<Self> {
                <$ty>::try_from(parse_integer_literal(text)?).ok()
            }

            fn into_search_value(self) -> SearchValue {
                SearchValue::$kind(self)
            }

            fn to_hex_string(self) -> String {
                let raw = <$bits>::from_be_bytes(self.to_be_bytes());
                format!("0x{:0width$x}", raw, width = size_of::<$ty>() * 2)
            }
        }
    };
}

impl_integer_scalar!(u8, u8, U8, try_read_u8);
impl_integer_scalar!(u16, u16, U16, try_read_u16);
impl_integer_scalar!(u32, u32, U32, try_read_u32);
impl_integer_scalar!(u64, u64, U64, try_read_u64);
impl_integer_scalar!(i8, u8, S8, try_read_u8);
impl_integer_scalar!(i16, u16, S16, try_read_u16);
impl_integer_scalar!(i32, u32, S32, try_read_u32);
impl_integer_scalar!(i64, u64, S64, try_read_u64);

macro_rules! impl_float_scalar {
    ($ty:ty, $kind:ident, $read:ident, $width:literal) => {
        impl sealed::Sealed for $ty {}

        impl SearchScalar for $ty {
            const DATA_TYPE: DataType = DataType::$kind;

            fn try_read(
                mem: &dyn MemoryAccess,
                addr: u32,
                space: AddressSpace,
            ) -> Option<ReadResult<Self>> {
                mem.$read(addr, space)
            }

            fn parse_literal(text: &str) -> Option<Self> {
                let text = text.trim();
                if text.is_empty() {
                    return None;
                }
                text.parse().ok()
            }

            fn into_search_value(self) -> SearchValue {
                SearchValue::$kind(self)
            }

            fn to_hex_string(self) -> String {
                format!("0x{:0width$x}", self.to_bits(), width = $width)
            }
        }
    };
}

impl_float_scalar!(f32, F32, try_read_f32, 8);
impl_float_scalar!(f64, F64, try_read_f64, 16);
