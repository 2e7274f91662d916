//! CRC-16 used for packet, page, and record integrity checks.
//!
//! The receiver's checksum is CRC-16/XMODEM: polynomial `0x1021`, initial
//! register `0`, no input/output reflection, no final XOR. That is bit for
//! bit the `crc` crate's [`crc::CRC_16_XMODEM`] algorithm, so the digest
//! itself is a thin wrapper rather than a hand-rolled table.

/// A running CRC-16 computation.
#[derive(Clone)]
pub struct Crc16Digest<'a>(crc::Digest<'a, u16, crc::Table<1>>);

impl<'a> Crc16Digest<'a> {
    pub fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes)
    }

    pub fn finalize(self) -> u16 {
        self.0.finalize()
    }
}

static CRC16: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_XMODEM);

/// Starts a new CRC-16 digest.
pub fn digest() -> Crc16Digest<'static> {
    Crc16Digest(CRC16.digest())
}

/// Computes the CRC-16 of a single byte slice.
pub fn crc16(bytes: &[u8]) -> u16 {
    let mut d = digest();
    d.update(bytes);
    d.finalize()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_vectors() {
        assert_eq!(crc16(b"0123456789"), 0x9C58);
        assert_eq!(crc16(&[0x01, 0x07, 0x00, 0x10, 0x04]), 0xB88B);
        assert_eq!(crc16(&[0xFF, 0xFF, 0xFF, 0xFF]), 0x99CF);
        assert_eq!(crc16(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]), 0x2378);
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let whole = crc16(b"0123456789");
        let mut d = digest();
        d.update(b"01234");
        d.update(b"56789");
        assert_eq!(d.finalize(), whole);
    }
}
