//! X-MAC duty-cycling link layer for the CC2538.
//!
//! The radio sleeps for most of every duty cycle. A sender wakes its
//! neighbour by repeating a short strobe frame until the addressed node
//! answers with a strobe-ACK, and only then transmits the data frame.
//! Broadcasts strobe for the whole strobe window and are sent without an
//! acknowledgment.
//!
//! [`XMac`] is driven from three contexts: the power-cycle timer interrupt
//! calls [`XMac::powercycle`], the radio receive interrupt calls
//! [`XMac::input`], and upper layers call [`XMac::send`]. The radio and the
//! real-time timer are reached through the [`RadioDriver`] and [`RTimer`]
//! traits; CC2538 implementations are provided on ARM targets.

#![cfg_attr(not(test), no_std)]

#[cfg(any(test, feature = "alloc"))]
extern crate alloc;

#[macro_use]
mod log;

pub mod address;
pub mod config;
pub mod encounter;
pub mod error;
pub mod flags;
pub mod frame;
pub mod leds;
mod powercycle;
pub mod radio;
pub mod stats;
pub mod time;
#[cfg(any(test, feature = "alloc"))]
pub mod trace;
pub mod xmac;

#[cfg(target_arch = "arm")]
pub mod smwd;

pub use address::Address;
pub use config::{DutyCycleConfig, XMacConfig};
pub use error::{ConfigError, MacError, ScheduleError, TxStatus};
pub use frame::{FrameKind, Header};
pub use leds::{Leds, NoLeds};
pub use powercycle::Phase;
pub use radio::RadioDriver;
pub use time::{RTimer, Ticks};
pub use xmac::{MacDriver, Packet, XMac};
