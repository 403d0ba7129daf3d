use super::error::{Error, Result};
use byteorder::{ByteOrder, LE};

/// Size of a serialized control entry.
pub const CONTROL_ENTRY_SIZE: usize = 24;

/// Single bsdiff control instruction.
///
/// Applying it adds `diff_size` bytes of the diff stream onto the old file,
/// copies `extra_size` bytes of the extra stream verbatim, then moves the old
/// file cursor by `offset_increment`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct ControlEntry {
    pub diff_size: u64,
    pub extra_size: u64,
    pub offset_increment: i64,
}

impl ControlEntry {
    pub fn new(diff_size: u64, extra_size: u64, offset_increment: i64) -> Self {
        ControlEntry {
            diff_size,
            extra_size,
            offset_increment,
        }
    }

    /// Bytes of new file produced by this entry.
    #[inline]
    pub fn output_size(&self) -> u64 {
        self.diff_size.saturating_add(self.extra_size)
    }

    /// Serializes the entry (diff size, extra size, offset increment).
    ///
    /// Sizes not representable as non-negative signed integers are rejected.
    pub fn encode(&self) -> Result<[u8; CONTROL_ENTRY_SIZE]> {
        if self.diff_size > i64::MAX as u64 || self.extra_size > i64::MAX as u64 {
            return Err(Error::sequence(format!(
                "control entry sizes out of range: {:?}",
                self
            )));
        }
        let mut b = [0; CONTROL_ENTRY_SIZE];
        encode_int(self.diff_size as i64, &mut b[0..8]);
        encode_int(self.extra_size as i64, &mut b[8..16]);
        encode_int(self.offset_increment, &mut b[16..24]);
        Ok(b)
    }

    /// Deserializes an entry, rejecting negative sizes.
    pub fn decode(b: &[u8; CONTROL_ENTRY_SIZE]) -> Result<Self> {
        let diff_size = decode_int(&b[0..8]);
        let extra_size = decode_int(&b[8..16]);
        let offset_increment = decode_int(&b[16..24]);
        if diff_size < 0 || extra_size < 0 {
            return Err(Error::format(format!(
                "negative sizes in control entry (diff {}, extra {})",
                diff_size, extra_size
            )));
        }
        Ok(ControlEntry {
            diff_size: diff_size as u64,
            extra_size: extra_size as u64,
            offset_increment,
        })
    }
}

/// Decodes integer.
#[inline]
pub fn decode_int(b: &[u8]) -> i64 {
    let x = LE::read_u64(b);
    if x >> 63 == 0 || x == 0x8000000000000000 {
        x as i64
    } else {
        ((x & 0x7fffffffffffffff) as i64).wrapping_neg()
    }
}

/// Encodes integer.
#[inline]
pub fn encode_int(x: i64, b: &mut [u8]) {
    if x < 0 {
        LE::write_u64(b, x.wrapping_neg() as u64 | 0x8000000000000000);
    } else {
        LE::write_u64(b, x as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn int_identity(x: i64) -> bool {
        let mut b = [0; 8];
        encode_int(x, &mut b);
        decode_int(&b) == x
    }

    #[test]
    fn int_layout() {
        let cases: [(i64, [u8; 8]); 5] = [
            (0, [0, 0, 0, 0, 0, 0, 0, 0]),
            (42, [42, 0, 0, 0, 0, 0, 0, 0]),
            (-42, [42, 0, 0, 0, 0, 0, 0, 0x80]),
            (-2, [2, 0, 0, 0, 0, 0, 0, 0x80]),
            (
                i64::MIN + 1,
                [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
            ),
        ];
        for &(x, expected) in cases.iter() {
            let mut b = [0; 8];
            encode_int(x, &mut b);
            assert_eq!(b, expected, "encoding {}", x);
            assert_eq!(decode_int(&b), x);
        }
    }

    #[test]
    fn control_entry_layout() {
        let entry = ControlEntry::new(5, 7, -2);
        let b = entry.encode().unwrap();
        assert_eq!(&b[0..8], &[5, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&b[8..16], &[7, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&b[16..24], &[2, 0, 0, 0, 0, 0, 0, 0x80]);
        assert_eq!(ControlEntry::decode(&b).unwrap(), entry);
    }

    #[test]
    fn control_entry_rejects_negative_sizes() {
        let mut b = [0; CONTROL_ENTRY_SIZE];
        encode_int(-1, &mut b[0..8]);
        assert!(ControlEntry::decode(&b).is_err());

        let mut b = [0; CONTROL_ENTRY_SIZE];
        encode_int(-7, &mut b[8..16]);
        assert!(ControlEntry::decode(&b).is_err());

        let mut b = [0; CONTROL_ENTRY_SIZE];
        b[7] = 0x80;
        assert_eq!(decode_int(&b[0..8]), i64::MIN);
        assert!(ControlEntry::decode(&b).is_err());
    }

    #[test]
    fn control_entry_rejects_oversized() {
        assert!(ControlEntry::new(u64::MAX, 0, 0).encode().is_err());
        assert!(ControlEntry::new(0, 1 << 63, 0).encode().is_err());
        assert!(ControlEntry::new(i64::MAX as u64, 0, i64::MIN).encode().is_ok());
    }
}
