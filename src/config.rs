//! Duty-cycle timing and feature switches
//!
//! Everything here is meant to be fixed when the firmware is built:
//!
//! ```
//! use cc2538_xmac::{DutyCycleConfig, XMacConfig};
//!
//! const XMAC: XMacConfig = XMacConfig::new(DutyCycleConfig::new(200, 3900))
//!     .with_queueing(true);
//! assert!(XMAC.validate().is_ok());
//! ```

use crate::error::ConfigError;
use crate::time::{Ticks, RTIMER_SECOND};

/// Rate at which a sleeping node checks the channel.
pub const CHANNEL_CHECK_RATE: Ticks = 8;

pub const DEFAULT_ON_TIME: Ticks = RTIMER_SECOND / 160;
pub const DEFAULT_OFF_TIME: Ticks = RTIMER_SECOND / CHANNEL_CHECK_RATE - DEFAULT_ON_TIME;

/// Number of wake-up slots a period is split into when slotting.
pub const NUM_SLOTS: Ticks = 16;

/// Cycles a node stays awake after a strobe without hearing the data frame.
pub const MAX_WAIT_CYCLES: u8 = 2;

/// Neighbours whose wake-up time is remembered.
pub const MAX_ENCOUNTERS: usize = 4;

/// Radio timing, in real-time clock ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCycleConfig {
    /// Listening window at the start of every cycle.
    pub on_time: Ticks,
    /// Sleep between listening windows. Zero keeps the radio on.
    pub off_time: Ticks,
    /// Length of a strobe train.
    pub strobe_time: Ticks,
    /// Time spent listening for a strobe-ACK after each strobe.
    pub strobe_wait_time: Ticks,
}

impl DutyCycleConfig {
    /// Timing with the strobe train covering two full cycles and the ACK wait
    /// at half a listening window.
    pub const fn new(on_time: Ticks, off_time: Ticks) -> Self {
        Self {
            on_time,
            off_time,
            strobe_time: 2 * on_time + off_time,
            strobe_wait_time: on_time / 2,
        }
    }

    /// Never sleep the radio.
    pub const fn always_on() -> Self {
        Self {
            on_time: DEFAULT_ON_TIME,
            off_time: 0,
            strobe_time: 2 * DEFAULT_ON_TIME,
            strobe_wait_time: DEFAULT_ON_TIME / 2,
        }
    }

    pub const fn with_strobe_time(mut self, strobe_time: Ticks) -> Self {
        self.strobe_time = strobe_time;
        self
    }

    pub const fn with_strobe_wait_time(mut self, strobe_wait_time: Ticks) -> Self {
        self.strobe_wait_time = strobe_wait_time;
        self
    }

    #[inline]
    pub const fn period(&self) -> Ticks {
        self.on_time + self.off_time
    }

    #[inline]
    pub const fn is_always_on(&self) -> bool {
        self.off_time == 0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.on_time == 0 {
            return Err(ConfigError::ZeroOnTime);
        }
        if self.strobe_time < 2 * self.on_time + self.off_time {
            return Err(ConfigError::StrobeTimeTooShort);
        }
        if self.strobe_wait_time == 0 {
            return Err(ConfigError::ZeroStrobeWait);
        }
        Ok(())
    }
}

impl Default for DutyCycleConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ON_TIME, DEFAULT_OFF_TIME)
    }
}

/// Timing plus the optional protocol features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XMacConfig {
    pub timing: DutyCycleConfig,
    /// Park one packet instead of dropping it when the channel is busy.
    pub queueing: bool,
    /// Spread wake-ups over [`NUM_SLOTS`] slots keyed by the local address.
    /// Needs a synchronized clock.
    pub slotting: bool,
    /// Listen for one ACK-wait window before strobing and back off if
    /// anything is heard.
    ///
    /// Experimental. It cannot tell a neighbour's strobe train from a single
    /// stray frame and reduces throughput when traffic is light.
    pub channel_check: bool,
    /// Remember when each recent receiver acknowledged and hold the next
    /// strobe train to it until just before its predicted wake-up.
    pub encounters: bool,
}

impl XMacConfig {
    pub const fn new(timing: DutyCycleConfig) -> Self {
        Self {
            timing,
            queueing: false,
            slotting: false,
            channel_check: false,
            encounters: true,
        }
    }

    pub const fn with_queueing(mut self, enable: bool) -> Self {
        self.queueing = enable;
        self
    }

    pub const fn with_slotting(mut self, enable: bool) -> Self {
        self.slotting = enable;
        self
    }

    pub const fn with_channel_check(mut self, enable: bool) -> Self {
        self.channel_check = enable;
        self
    }

    pub const fn with_encounters(mut self, enable: bool) -> Self {
        self.encounters = enable;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timing.validate()
    }
}

impl Default for XMacConfig {
    fn default() -> Self {
        Self::new(DutyCycleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_satisfy_invariants() {
        let cfg = DutyCycleConfig::default();
        assert_eq!(cfg.on_time, 204);
        assert_eq!(cfg.period(), RTIMER_SECOND / CHANNEL_CHECK_RATE);
        assert!(cfg.strobe_time >= 2 * cfg.on_time + cfg.off_time);
        assert_eq!(cfg.strobe_wait_time, cfg.on_time / 2);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn short_strobe_train_is_rejected() {
        let cfg = DutyCycleConfig::new(100, 900).with_strobe_time(1000);
        assert_eq!(cfg.validate(), Err(ConfigError::StrobeTimeTooShort));
    }

    #[test]
    fn zero_on_time_is_rejected() {
        let cfg = DutyCycleConfig::new(0, 900).with_strobe_wait_time(1);
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroOnTime));
    }

    #[test]
    fn zero_wait_is_rejected() {
        let cfg = DutyCycleConfig::new(1, 100);
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroStrobeWait));
    }

    #[test]
    fn always_on_has_no_sleep() {
        let cfg = DutyCycleConfig::always_on();
        assert!(cfg.is_always_on());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn only_encounters_default_on() {
        let cfg = XMacConfig::default();
        assert!(!cfg.queueing && !cfg.slotting && !cfg.channel_check);
        assert!(cfg.encounters);
        let cfg = cfg
            .with_slotting(true)
            .with_channel_check(true)
            .with_encounters(false);
        assert!(cfg.slotting && cfg.channel_check && !cfg.encounters);
    }
}
