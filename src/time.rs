//! Hardware clock ticks and the real-time timer seam

use crate::error::ScheduleError;

/// A count of real-time clock ticks. Wraps around.
pub type Ticks = u32;

/// Tick rate of the CC2538 sleep timer.
pub const RTIMER_SECOND: Ticks = 32_768;

/// `a` lies before `b`, taking wrap-around into account.
#[inline]
pub const fn clock_lt(a: Ticks, b: Ticks) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

/// The real-time timer that drives the power cycle.
///
/// `set` arms a single one-shot compare at an absolute tick. When it fires
/// the board calls [`XMac::powercycle`](crate::XMac::powercycle) from the
/// interrupt. Arming again replaces the previous compare.
pub trait RTimer {
    /// Current value of the free-running clock.
    fn now(&self) -> Ticks;

    /// Fire at `at`. Fails if the clock is already past it.
    fn set(&self, at: Ticks) -> Result<(), ScheduleError>;

    /// Offset from the local clock to network time, as provided by a time
    /// synchronization service. Only used to align wake-up slots.
    fn synchronized_offset(&self) -> Ticks {
        0
    }
}

impl<T: RTimer + ?Sized> RTimer for &T {
    fn now(&self) -> Ticks {
        (**self).now()
    }

    fn set(&self, at: Ticks) -> Result<(), ScheduleError> {
        (**self).set(at)
    }

    fn synchronized_offset(&self) -> Ticks {
        (**self).synchronized_offset()
    }
}

/// A point in time measured on an [`RTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instant {
    at: Ticks,
}

impl Instant {
    #[inline]
    pub fn now<T: RTimer + ?Sized>(timer: &T) -> Self {
        Self { at: timer.now() }
    }

    /// The deadline `budget` ticks after this instant.
    #[inline]
    pub const fn deadline(self, budget: Ticks) -> Deadline {
        Deadline {
            end: self.at.wrapping_add(budget),
        }
    }
}

/// Bounds the busy-wait loops of the send path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    end: Ticks,
}

impl Deadline {
    #[inline]
    pub fn after<T: RTimer + ?Sized>(timer: &T, budget: Ticks) -> Self {
        Instant::now(timer).deadline(budget)
    }

    #[inline]
    pub fn expired<T: RTimer + ?Sized>(&self, timer: &T) -> bool {
        !clock_lt(timer.now(), self.end)
    }

    #[inline]
    pub const fn end(&self) -> Ticks {
        self.end
    }
}
