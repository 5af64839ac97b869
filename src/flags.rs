//! State shared by the timer interrupt, the radio interrupt and the sender
//!
//! Each flag is a single atomic word. Updates that must see several flags
//! at once happen inside a critical section in [`XMac`](crate::XMac).

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Short-lived activity observed on the channel and by this node.
#[derive(Debug, Default)]
pub struct ActivityFlags {
    /// Cycles left during which a neighbour's exchange is assumed ongoing.
    someone_is_sending: AtomicU8,
    /// A strobe train or data frame of ours is in flight.
    we_are_sending: AtomicBool,
    /// Non-zero while the radio is kept on for an announced data frame.
    /// Counts the power cycles spent waiting.
    waiting_for_packet: AtomicU8,
}

impl ActivityFlags {
    pub const fn new() -> Self {
        Self {
            someone_is_sending: AtomicU8::new(0),
            we_are_sending: AtomicBool::new(false),
            waiting_for_packet: AtomicU8::new(0),
        }
    }

    #[inline]
    pub fn someone_is_sending(&self) -> u8 {
        self.someone_is_sending.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_someone_is_sending(&self, cycles: u8) {
        self.someone_is_sending.store(cycles, Ordering::Release);
    }

    /// Age the neighbour activity by one cycle.
    #[inline]
    pub fn age_someone_is_sending(&self) {
        let _ = self
            .someone_is_sending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    #[inline]
    pub fn we_are_sending(&self) -> bool {
        self.we_are_sending.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_we_are_sending(&self, sending: bool) {
        self.we_are_sending.store(sending, Ordering::Release);
    }

    #[inline]
    pub fn waiting_for_packet(&self) -> u8 {
        self.waiting_for_packet.load(Ordering::Acquire)
    }

    #[inline]
    pub fn start_waiting_for_packet(&self) {
        self.waiting_for_packet.store(1, Ordering::Release);
    }

    #[inline]
    pub fn stop_waiting_for_packet(&self) {
        self.waiting_for_packet.store(0, Ordering::Release);
    }

    /// Count one more cycle spent waiting and return the new count. Stays at
    /// zero when nothing is expected.
    #[inline]
    pub fn bump_waiting_for_packet(&self) -> u8 {
        match self
            .waiting_for_packet
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                if n == 0 {
                    None
                } else {
                    Some(n.saturating_add(1))
                }
            }) {
            Ok(prev) => prev.saturating_add(1),
            Err(_) => 0,
        }
    }
}

/// Power state of the radio as last commanded by the MAC.
#[derive(Debug)]
pub struct RadioState {
    is_on: AtomicBool,
    duty_cycling: AtomicBool,
    /// Power state to return to while duty cycling is disabled.
    keep_on: AtomicBool,
}

impl RadioState {
    pub const fn new() -> Self {
        Self {
            is_on: AtomicBool::new(false),
            duty_cycling: AtomicBool::new(false),
            keep_on: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn is_on(&self) -> bool {
        self.is_on.load(Ordering::Acquire)
    }

    /// Record the new power state. Returns `false` if it was already set.
    #[inline]
    pub fn switch(&self, on: bool) -> bool {
        self.is_on.swap(on, Ordering::AcqRel) != on
    }

    #[inline]
    pub fn duty_cycling(&self) -> bool {
        self.duty_cycling.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_duty_cycling(&self, enable: bool) {
        self.duty_cycling.store(enable, Ordering::Release);
    }

    #[inline]
    pub fn keep_on(&self) -> bool {
        self.keep_on.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_keep_on(&self, on: bool) {
        self.keep_on.store(on, Ordering::Release);
    }
}

impl Default for RadioState {
    fn default() -> Self {
        Self::new()
    }
}
