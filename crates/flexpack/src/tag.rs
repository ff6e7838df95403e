//! Tag byte: 5-bit kind code in the low bits, 3-bit inline data in the high
//! bits. See `spec.md` §4.1.

/// Identifies the on-wire shape of a value. Stable across versions: codes are
/// assigned once and never reused. An unassigned code (26..=31) is not a
/// reserved placeholder. It is simply invalid, and decoding one is always
/// `ReaderError::InvalidTag`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Object = 0,
    Array = 1,
    ContainerEnd = 2,

    Null = 3,
    Bool = 4,

    U8 = 5,
    U16 = 6,
    U32 = 7,
    U64 = 8,
    I8 = 9,
    I16 = 10,
    I32 = 11,
    I64 = 12,

    F16 = 13,
    F32 = 14,
    F64 = 15,

    SmallUint = 16,
    SmallIntPositive = 17,
    SmallIntNegative = 18,

    VarIntUnsigned = 19,
    VarIntSignedPositive = 20,
    VarIntSignedNegative = 21,

    Bytes = 22,
    VarIntBytes = 23,
    SmallBytes = 24,

    TypedArray = 25,
}

impl Kind {
    /// Returns the `Kind` for a 5-bit code, or `None` if unassigned.
    #[inline]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Object,
            1 => Self::Array,
            2 => Self::ContainerEnd,
            3 => Self::Null,
            4 => Self::Bool,
            5 => Self::U8,
            6 => Self::U16,
            7 => Self::U32,
            8 => Self::U64,
            9 => Self::I8,
            10 => Self::I16,
            11 => Self::I32,
            12 => Self::I64,
            13 => Self::F16,
            14 => Self::F32,
            15 => Self::F64,
            16 => Self::SmallUint,
            17 => Self::SmallIntPositive,
            18 => Self::SmallIntNegative,
            19 => Self::VarIntUnsigned,
            20 => Self::VarIntSignedPositive,
            21 => Self::VarIntSignedNegative,
            22 => Self::Bytes,
            23 => Self::VarIntBytes,
            24 => Self::SmallBytes,
            25 => Self::TypedArray,
            _ => return None,
        })
    }

    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Packs a kind and its 3-bit inline data into one tag byte. Branchless.
#[inline(always)]
pub const fn encode_tag(kind: Kind, data: u8) -> u8 {
    debug_assert!(data <= 0b111);
    kind.code() | (data << 5)
}

/// Splits a tag byte into its kind code and 3-bit inline data. The kind code
/// is returned unvalidated (0..=31); callers resolve it via `Kind::from_code`.
#[inline(always)]
pub const fn decode_tag(byte: u8) -> (u8, u8) {
    (byte & 0b0001_1111, byte >> 5)
}

/// Element type code for `Kind::TypedArray` payloads. A single byte follows
/// the tag to identify the packed element layout.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemType {
    U8 = 0,
    I8 = 1,
    U16 = 2,
    I16 = 3,
    U32 = 4,
    I32 = 5,
    U64 = 6,
    I64 = 7,
    F16 = 8,
    F32 = 9,
    F64 = 10,
}

impl ElemType {
    #[inline]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::U8,
            1 => Self::I8,
            2 => Self::U16,
            3 => Self::I16,
            4 => Self::U32,
            5 => Self::I32,
            6 => Self::U64,
            7 => Self::I64,
            8 => Self::F16,
            9 => Self::F32,
            10 => Self::F64,
            _ => return None,
        })
    }

    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Byte width of one packed element.
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 | Self::F16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip() {
        for code in 0u8..26 {
            let kind = Kind::from_code(code).unwrap();
            for data in 0u8..8 {
                let byte = encode_tag(kind, data);
                let (got_code, got_data) = decode_tag(byte);
                assert_eq!(got_code, code);
                assert_eq!(got_data, data);
            }
        }
    }

    #[test]
    fn unassigned_codes_are_none() {
        for code in 26u8..32 {
            assert!(Kind::from_code(code).is_none());
        }
        for code in 32u8..=u8::MAX {
            let (low, _) = decode_tag(code);
            assert!(low < 32);
        }
    }

    #[test]
    fn elem_type_roundtrip() {
        let all = [
            ElemType::U8, ElemType::I8, ElemType::U16, ElemType::I16,
            ElemType::U32, ElemType::I32, ElemType::U64, ElemType::I64,
            ElemType::F16, ElemType::F32, ElemType::F64,
        ];
        for e in all {
            assert_eq!(ElemType::from_code(e.code()), Some(e));
        }
    }
}
