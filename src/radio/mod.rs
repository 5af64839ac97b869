//! The radio transceiver seen by the MAC layer

#[cfg(target_arch = "arm")]
pub mod cc2538;

pub(crate) const CHECKSUM_LEN: usize = 2;
pub(crate) const MAX_PACKET_LEN: usize = 127;

/// Largest frame the MAC hands to the radio, checksum excluded.
pub const MAX_FRAME_LEN: usize = MAX_PACKET_LEN - CHECKSUM_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    PayloadTooBig,
    UnableToStartTx,
    Collision,
    IncorrectFrame,
    /// The driver is between power states.
    Unavailable,
}

/// A packet radio that X-MAC can power cycle.
///
/// `on`/`off` switch the receiver. `send` transmits one frame and returns
/// once it is on air. `read` never blocks: without a pending frame it
/// returns `WouldBlock`.
pub trait RadioDriver {
    type Error: core::fmt::Debug;

    fn on(&mut self) -> Result<(), Self::Error>;

    fn off(&mut self) -> Result<(), Self::Error>;

    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Copy the next received frame into `buf` and return its length.
    fn read(&mut self, buf: &mut [u8]) -> nb::Result<usize, Self::Error>;

    /// Function the driver calls from its receive interrupt.
    fn set_receive_function(&mut self, callback: fn());

    /// Clear channel assessment. Radios without CCA report a clear channel.
    fn channel_clear(&mut self) -> bool {
        true
    }
}
