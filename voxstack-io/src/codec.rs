//! Little-endian element encoding.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use voxstack_core::ElementType;

/// Decodes one element; `bytes` must be exactly `ty.size()` long.
#[inline]
pub(crate) fn decode(ty: ElementType, bytes: &[u8]) -> f64 {
    macro_rules! le {
        ($t:ty) => {{
            let mut buf = [0u8; std::mem::size_of::<$t>()];
            buf.copy_from_slice(bytes);
            <$t>::from_le_bytes(buf)
        }};
    }
    match ty {
        ElementType::U8 => f64::from(bytes[0]),
        ElementType::I8 => f64::from(bytes[0] as i8),
        ElementType::U16 => f64::from(le!(u16)),
        ElementType::I16 => f64::from(le!(i16)),
        ElementType::U32 => f64::from(le!(u32)),
        ElementType::I32 => f64::from(le!(i32)),
        ElementType::U64 => le!(u64) as f64,
        ElementType::I64 => le!(i64) as f64,
        ElementType::F32 => f64::from(le!(f32)),
        ElementType::F64 => le!(f64),
    }
}

/// Encodes one value, rounding and saturating for integer types.
pub(crate) fn encode(ty: ElementType, value: f64, out: &mut Vec<u8>) {
    let int = |v: f64| v.round();
    match ty {
        ElementType::U8 => out.push(int(value).clamp(0.0, f64::from(u8::MAX)) as u8),
        ElementType::I8 => out.extend_from_slice(
            &(int(value).clamp(f64::from(i8::MIN), f64::from(i8::MAX)) as i8).to_le_bytes(),
        ),
        ElementType::U16 => out.extend_from_slice(
            &(int(value).clamp(0.0, f64::from(u16::MAX)) as u16).to_le_bytes(),
        ),
        ElementType::I16 => out.extend_from_slice(
            &(int(value).clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16).to_le_bytes(),
        ),
        ElementType::U32 => out.extend_from_slice(
            &(int(value).clamp(0.0, f64::from(u32::MAX)) as u32).to_le_bytes(),
        ),
        ElementType::I32 => out.extend_from_slice(
            &(int(value).clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32).to_le_bytes(),
        ),
        // Float-to-int `as` casts saturate.
        ElementType::U64 => out.extend_from_slice(&(int(value) as u64).to_le_bytes()),
        ElementType::I64 => out.extend_from_slice(&(int(value) as i64).to_le_bytes()),
        ElementType::F32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
        ElementType::F64 => out.extend_from_slice(&value.to_le_bytes()),
    }
}
