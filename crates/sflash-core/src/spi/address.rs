//! Address phase sizes

/// Number of bytes clocked out in an address phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressSize {
    /// 8-bit address (register select bytes)
    OneByte,
    /// 16-bit address (NAND column address)
    TwoByte,
    /// 24-bit address - supports up to 16 MiB
    #[default]
    ThreeByte,
    /// 32-bit address - supports up to 4 GiB
    FourByte,
}

impl AddressSize {
    /// Returns the number of address bytes
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::OneByte => 1,
            Self::TwoByte => 2,
            Self::ThreeByte => 3,
            Self::FourByte => 4,
        }
    }

    /// Build from a raw byte count
    pub const fn from_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            1 => Some(Self::OneByte),
            2 => Some(Self::TwoByte),
            3 => Some(Self::ThreeByte),
            4 => Some(Self::FourByte),
            _ => None,
        }
    }

    /// Largest address this size can carry
    pub const fn max_address(&self) -> u32 {
        match self {
            Self::OneByte => 0xFF,
            Self::TwoByte => 0xFFFF,
            Self::ThreeByte => 0xFF_FFFF,
            Self::FourByte => u32::MAX,
        }
    }

    /// Encode an address MSB-first into `buf`, returning the used prefix
    pub fn encode<'b>(&self, address: u32, buf: &'b mut [u8; 4]) -> &'b [u8] {
        let n = self.bytes() as usize;
        *buf = address.to_be_bytes();
        &buf[4 - n..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_msb_first() {
        let mut buf = [0u8; 4];
        assert_eq!(
            AddressSize::ThreeByte.encode(0x123456, &mut buf),
            &[0x12, 0x34, 0x56]
        );
        assert_eq!(AddressSize::TwoByte.encode(0x0840, &mut buf), &[0x08, 0x40]);
        assert_eq!(AddressSize::OneByte.encode(0xC0, &mut buf), &[0xC0]);
        assert_eq!(
            AddressSize::FourByte.encode(0x0100_0000, &mut buf),
            &[0x01, 0x00, 0x00, 0x00]
        );
    }
}
