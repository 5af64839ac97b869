//! LED indication of radio activity

use embedded_hal::digital::OutputPin;

/// Indication sink. Called with the MAC's shared state locked, so
/// implementations must not block.
pub trait Leds {
    /// The radio receiver was switched.
    fn radio(&mut self, on: bool);

    /// A strobe train started or ended.
    fn sending(&mut self, on: bool);
}

/// No indication.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLeds;

impl Leds for NoLeds {
    fn radio(&mut self, _on: bool) {}

    fn sending(&mut self, _on: bool) {}
}

/// Two GPIO driven LEDs, one for the receiver and one for strobing.
pub struct PinLeds<RX, TX> {
    rx: RX,
    tx: TX,
}

impl<RX: OutputPin, TX: OutputPin> PinLeds<RX, TX> {
    pub fn new(rx: RX, tx: TX) -> Self {
        Self { rx, tx }
    }

    pub fn free(self) -> (RX, TX) {
        (self.rx, self.tx)
    }
}

fn drive<P: OutputPin>(pin: &mut P, on: bool) {
    // Indication is best effort.
    let _ = if on { pin.set_high() } else { pin.set_low() };
}

impl<RX: OutputPin, TX: OutputPin> Leds for PinLeds<RX, TX> {
    fn radio(&mut self, on: bool) {
        drive(&mut self.rx, on);
    }

    fn sending(&mut self, on: bool) {
        drive(&mut self.tx, on);
    }
}
