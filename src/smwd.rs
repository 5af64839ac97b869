//! Sleep timer as the X-MAC real-time timer
//!
//! The sleep timer runs from the 32 kHz oscillator in every power mode,
//! which makes it the natural clock for the power cycle. Its compare
//! interrupt is `SM_TIMER`; the board forwards it to
//! [`XMac::powercycle`](crate::XMac::powercycle).

use cc2538_pac::{Interrupt, NVIC, SMWDTHROSC};

use crate::error::ScheduleError;
use crate::time::{clock_lt, RTimer, Ticks};

/// Ticks the hardware needs between loading a compare value and the match.
const GUARD_TICKS: Ticks = 2;

pub trait SleepTimerExt {
    type Parts;

    fn split(self) -> Self::Parts;
}

#[derive(Debug)]
pub struct SleepTimer {
    smwdthrosc: SMWDTHROSC,
}

impl SleepTimerExt for SMWDTHROSC {
    type Parts = SleepTimer;

    fn split(self) -> Self::Parts {
        SleepTimer { smwdthrosc: self }
    }
}

impl SleepTimer {
    /// Get the current value of the sleep timer.
    #[inline]
    pub fn now(&self) -> Ticks {
        // ST0 must be read first, it latches the upper bytes.
        let mut val = self.smwdthrosc.st0.read().st0().bits() as u32;
        val |= (self.smwdthrosc.st1.read().st1().bits() as u32) << 8;
        val |= (self.smwdthrosc.st2.read().st2().bits() as u32) << 16;
        val |= (self.smwdthrosc.st3.read().st3().bits() as u32) << 24;
        val
    }

    fn load_compare(&self, t: Ticks) {
        while self.smwdthrosc.stload.read().stload().bit_is_clear() {}

        // ST0 must be written last, it commits the compare value.
        unsafe {
            self.smwdthrosc
                .st3
                .write(|w| w.st3().bits(((t >> 24) & 0xff) as u8));
            self.smwdthrosc
                .st2
                .write(|w| w.st2().bits(((t >> 16) & 0xff) as u8));
            self.smwdthrosc
                .st1
                .write(|w| w.st1().bits(((t >> 8) & 0xff) as u8));
            self.smwdthrosc
                .st0
                .write(|w| w.st0().bits((t & 0xff) as u8));
        }
    }
}

impl RTimer for SleepTimer {
    fn now(&self) -> Ticks {
        SleepTimer::now(self)
    }

    fn set(&self, at: Ticks) -> Result<(), ScheduleError> {
        critical_section::with(|_| {
            if clock_lt(at, self.now().wrapping_add(GUARD_TICKS)) {
                return Err(ScheduleError::InPast);
            }

            self.load_compare(at);
            unsafe { NVIC::unmask(Interrupt::SM_TIMER) };
            Ok(())
        })
    }
}
