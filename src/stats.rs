//! Link-layer statistics

use core::sync::atomic::{AtomicU32, Ordering};

use paste::paste;

macro_rules! link_stats {
    ($($(#[$doc:meta])* $name:ident),+ $(,)?) => {
        paste! {
            /// Event counters, safe to bump from any context.
            #[derive(Debug, Default)]
            pub struct LinkStats {
                $($name: AtomicU32,)+
            }

            /// A copy of the counters at one point in time.
            #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
            pub struct Counters {
                $($(#[$doc])* pub $name: u32,)+
            }

            impl LinkStats {
                pub const fn new() -> Self {
                    Self {
                        $($name: AtomicU32::new(0),)+
                    }
                }

                $(
                #[inline]
                pub(crate) fn [<add_ $name>](&self) {
                    self.$name.fetch_add(1, Ordering::Relaxed);
                }
                )+

                pub fn snapshot(&self) -> Counters {
                    Counters {
                        $($name: self.$name.load(Ordering::Relaxed),)+
                    }
                }

                pub fn reset(&self) {
                    $(self.$name.store(0, Ordering::Relaxed);)+
                }
            }
        }
    };
}

link_stats!(
    /// Unicast frames sent after a strobe-ACK.
    tx_acked,
    /// Unicast strobe trains that ran out without an ACK.
    tx_noack,
    /// Broadcast frames sent.
    tx_broadcast,
    /// Sends aborted because a neighbour was heard on the channel.
    tx_collision,
    /// Packets dropped because the channel was busy and no slot was free.
    sending_drop,
    /// Packets parked in the queue slot.
    queued,
    /// Strobe frames transmitted.
    strobes,
    /// Strobe-ACKs transmitted.
    strobe_acks,
    /// Data frames delivered upwards.
    rx_data,
    /// Strobes received, for us or not.
    rx_strobes,
    /// Data frames addressed to another node.
    rx_not_for_us,
    /// Reads shorter than a header, or rejected by the radio.
    short_reads,
    /// Power-cycle firings the timer could not arm.
    schedule_failures,
    /// Strobe trains held back until a receiver's predicted wake-up.
    encounter_waits,
);
