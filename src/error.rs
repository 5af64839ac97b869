//! Error and outcome types

/// Successful transmit outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// The receiver acknowledged a strobe and the data frame went out.
    Acked,
    /// The broadcast strobe train finished and the data frame went out.
    Broadcast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacError {
    /// The strobe train ran out without a strobe-ACK. The data frame was
    /// not transmitted.
    NoAck,
    /// Another exchange is in progress on the channel. The packet was
    /// dropped.
    Collision,
    /// Another exchange is in progress on the channel. The packet was parked
    /// in the queue slot and goes out with [`XMac::flush_queue`].
    ///
    /// [`XMac::flush_queue`]: crate::XMac::flush_queue
    Queued,
    /// Header and payload do not fit in a radio frame.
    TooLarge,
    /// [`XMac::cancel`](crate::XMac::cancel) stopped the strobe train.
    Cancelled,
    /// The radio driver refused an operation.
    Radio,
    /// The configuration or the local address cannot be used.
    Config(ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The strobe train does not cover two full duty cycles.
    StrobeTimeTooShort,
    /// A duty-cycling configuration needs a non-zero ACK wait.
    ZeroStrobeWait,
    /// The radio must be on for part of every cycle.
    ZeroOnTime,
    /// The local address is the broadcast address.
    BroadcastAddress,
}

/// Failure of the real-time timer to arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// The clock already passed the requested tick.
    InPast,
}

impl From<ConfigError> for MacError {
    fn from(e: ConfigError) -> Self {
        MacError::Config(e)
    }
}
