//! Node addresses

use core::fmt;

/// Width of a node address on the wire.
pub const ADDR_LEN: usize = 2;

/// Fixed-width link-layer address of a node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; ADDR_LEN]);

impl Address {
    /// The all-zero sentinel every node accepts.
    pub const BROADCAST: Address = Address([0; ADDR_LEN]);

    #[inline]
    pub const fn new(lo: u8, hi: u8) -> Self {
        Address([lo, hi])
    }

    #[inline]
    pub const fn from_u16(addr: u16) -> Self {
        Address(addr.to_le_bytes())
    }

    #[inline]
    pub const fn as_u16(&self) -> u16 {
        u16::from_le_bytes(self.0)
    }

    #[inline]
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Least significant address byte. Selects the wake-up slot when
    /// slotting is enabled.
    #[inline]
    pub const fn low_byte(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; ADDR_LEN] {
        &self.0
    }

    /// Node address taken from the two last bytes of the factory IEEE
    /// address.
    #[cfg(target_arch = "arm")]
    pub fn from_ieee() -> Self {
        let ieee = ieee_address();
        Address::new(ieee[7], ieee[6])
    }
}

/// Read the 64-bit IEEE address from the info page, most significant byte
/// first.
#[cfg(target_arch = "arm")]
pub fn ieee_address() -> [u8; 8] {
    const TI_OUI: [u8; 3] = [0x00, 0x12, 0x4b];
    const ADDR_LOCATION: u32 = 0x0028_0028;

    let byte = |offset: u32| unsafe {
        core::ptr::read_volatile((ADDR_LOCATION + offset) as *const u32) as u8
    };

    let mut addr = [0; 8];
    if byte(3) == TI_OUI[0] && byte(2) == TI_OUI[1] && byte(1) == TI_OUI[2] {
        // TI programs the two words swapped.
        for (i, b) in addr.iter_mut().rev().enumerate() {
            let i = i as u32;
            *b = byte(if i < 4 { i + 4 } else { i - 4 });
        }
    } else {
        for (i, b) in addr.iter_mut().enumerate() {
            *b = byte(7 - i as u32);
        }
    }
    addr
}

impl From<u16> for Address {
    fn from(addr: u16) -> Self {
        Address::from_u16(addr)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0[0], self.0[1])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
