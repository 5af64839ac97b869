//! Device logging.
//!
//! On the CC2538 everything goes out over RTT. Host builds have no RTT
//! channel, so the arguments are type-checked and dropped.

macro_rules! log {
    ($($arg:tt)*) => {{
        #[cfg(target_arch = "arm")]
        rtt_target::rprintln!($($arg)*);

        #[cfg(not(target_arch = "arm"))]
        {
            fn discard(_: core::fmt::Arguments<'_>) {}
            discard(format_args!($($arg)*));
        }
    }};
}
