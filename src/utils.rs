pub trait BitExtract {
    fn bit(&self, bit: u8) -> bool;
}

macro_rules! impl_bit_extract {
    ($type:ty) => {
        impl BitExtract for $type {
            fn bit(&self, bit: u8) -> bool {
                *self & (1 << bit) != 0
            }
        }
    };
}

impl_bit_extract!(u8);
impl_bit_extract!(u16);

/// Packs a binary value in `0..=99` into two BCD nibbles.
pub fn to_bcd(val: u8) -> u8 {
    ((val / 10) << 4) | (val % 10)
}

pub fn from_bcd(val: u8) -> u8 {
    (val >> 4) * 10 + (val & 0x0f)
}

/// Emits `val` as BCD or binary, the way every calendar getter does.
pub fn encode(val: u8, bcd: bool) -> u8 {
    if bcd {
        to_bcd(val)
    } else {
        val
    }
}

pub fn decode(val: u8, bcd: bool) -> u8 {
    if bcd {
        from_bcd(val)
    } else {
        val
    }
}
