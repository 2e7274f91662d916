//! Little-endian primitive marshal/unmarshal helpers.
//!
//! These are the leaves everything else is built on: record fields, packet
//! headers, and CRC bytes are all little-endian on the wire. Unmarshal
//! functions take a byte slice of exactly the expected width; a short slice
//! is a caller bug; callers slice from an already-length-checked buffer
//! (the packet and page layers validate lengths before calling down here).

pub fn unmarshal_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

pub fn unmarshal_i16(b: &[u8]) -> i16 {
    i16::from_le_bytes([b[0], b[1]])
}

pub fn unmarshal_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

pub fn unmarshal_i32(b: &[u8]) -> i32 {
    i32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

pub fn unmarshal_u64(b: &[u8]) -> u64 {
    u64::from_le_bytes([
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
    ])
}

pub fn unmarshal_f64(b: &[u8]) -> f64 {
    f64::from_bits(unmarshal_u64(b))
}

pub fn marshal_u16(x: u16) -> [u8; 2] {
    x.to_le_bytes()
}

pub fn marshal_i16(x: i16) -> [u8; 2] {
    x.to_le_bytes()
}

pub fn marshal_u32(x: u32) -> [u8; 4] {
    x.to_le_bytes()
}

pub fn marshal_i32(x: i32) -> [u8; 4] {
    x.to_le_bytes()
}

pub fn marshal_u64(x: u64) -> [u8; 8] {
    x.to_le_bytes()
}

pub fn marshal_f64(x: f64) -> [u8; 8] {
    marshal_u64(x.to_bits())
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn roundtrip_u16(x: u16) -> bool {
        unmarshal_u16(&marshal_u16(x)) == x
    }

    #[quickcheck]
    fn roundtrip_i16(x: i16) -> bool {
        unmarshal_i16(&marshal_i16(x)) == x
    }

    #[quickcheck]
    fn roundtrip_u32(x: u32) -> bool {
        unmarshal_u32(&marshal_u32(x)) == x
    }

    #[quickcheck]
    fn roundtrip_i32(x: i32) -> bool {
        unmarshal_i32(&marshal_i32(x)) == x
    }

    #[quickcheck]
    fn roundtrip_f64_bits(x: u64) -> bool {
        unmarshal_f64(&marshal_f64(f64::from_bits(x))).to_bits() == x
    }
}
