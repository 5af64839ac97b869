//! The power cycle
//!
//! A two-phase state machine run from the real-time timer interrupt. Each
//! firing handles one phase and arms the timer for the next:
//!
//! ```text
//!          off_time                 on_time
//!   Off ------------------> On ------------------> Off ...
//!   radio off (unless held)  radio on (unless held)
//! ```
//!
//! With `off_time == 0` the radio is never slept and the timer keeps firing
//! every `on_time` to age the neighbour activity.

use crate::config::{MAX_WAIT_CYCLES, NUM_SLOTS};
use crate::leds::Leds;
use crate::radio::RadioDriver;
use crate::time::{RTimer, Ticks};
use crate::xmac::XMac;

/// The phase the next timer firing runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// End of a listening window.
    Off,
    /// End of a sleep.
    On,
}

impl<R: RadioDriver, T: RTimer, L: Leds> XMac<R, T, L> {
    /// Timer interrupt entry point.
    pub fn powercycle(&self) {
        let timing = self.config.timing;
        let phase = critical_section::with(|cs| self.phase.borrow(cs).get());

        let next = match phase {
            Phase::Off => {
                self.flags.age_someone_is_sending();

                if timing.is_always_on() {
                    self.listen();
                    self.schedule(timing.on_time);
                    Phase::Off
                } else {
                    self.sleep();
                    self.schedule(self.sleep_ticks());
                    Phase::On
                }
            }
            Phase::On => {
                self.listen();
                self.schedule(timing.on_time);
                Phase::Off
            }
        };

        critical_section::with(|cs| self.phase.borrow(cs).set(next));
    }

    pub fn phase(&self) -> Phase {
        critical_section::with(|cs| self.phase.borrow(cs).get())
    }

    fn sleep(&self) {
        critical_section::with(|_| {
            if self.flags.waiting_for_packet() == 0 {
                if !self.flags.we_are_sending() {
                    self.radio_off();
                }
                return;
            }

            if self.flags.bump_waiting_for_packet() > MAX_WAIT_CYCLES {
                log!("xmac: gave up waiting for data frame");
                self.flags.stop_waiting_for_packet();
                if !self.flags.we_are_sending() {
                    self.radio_off();
                }
            }
        });
    }

    fn listen(&self) {
        critical_section::with(|_| {
            if self.radio_state.duty_cycling()
                && !self.flags.we_are_sending()
                && self.flags.waiting_for_packet() == 0
            {
                self.radio_on();
            }
        });
    }

    /// Length of the coming sleep. With slotting it ends at the start of this
    /// node's wake-up slot in network time.
    fn sleep_ticks(&self) -> Ticks {
        let timing = self.config.timing;
        if !self.config.slotting {
            return timing.off_time;
        }

        slot_delay(
            self.rtimer.now().wrapping_add(self.rtimer.synchronized_offset()),
            timing.period(),
            u32::from(self.local.low_byte()),
        )
    }

    pub(crate) fn schedule(&self, delay: Ticks) {
        let at = self.rtimer.now().wrapping_add(delay.max(1));
        if let Err(e) = self.rtimer.set(at) {
            self.stats.add_schedule_failures();
            log!("xmac: could not arm power cycle at {}: {:?}", at, e);
        }
    }
}

/// Ticks from `network_now` to the start of the next wake-up slot of a node
/// whose address ends in `low_byte`.
fn slot_delay(network_now: Ticks, period: Ticks, low_byte: Ticks) -> Ticks {
    let slot_start = (low_byte % NUM_SLOTS) * (period / NUM_SLOTS);
    let offset = network_now % period;
    match (slot_start + period - offset) % period {
        0 => period,
        delay => delay,
    }
}
