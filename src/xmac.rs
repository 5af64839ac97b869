//! The X-MAC driver
//!
//! Sending a unicast packet:
//!
//! 1. Refuse (or park in the queue slot) while a neighbour's exchange is in
//!    progress.
//! 2. Switch the radio on and repeat a header-only strobe addressed to the
//!    receiver, listening for `strobe_wait_time` after each one.
//! 3. On a strobe-ACK, send the data frame. If the strobe train runs out,
//!    report [`MacError::NoAck`] and do not send the data frame.
//!
//! Broadcasts strobe for the whole train and are always sent. A receiver
//! that acknowledged before is strobed only from just before its next
//! predicted wake-up (see [`crate::encounter`]).
//!
//! Receiving: a strobe addressed to us is answered with a strobe-ACK and the
//! radio is held on until the data frame arrives, or for at most
//! [`MAX_WAIT_CYCLES`](crate::config::MAX_WAIT_CYCLES) power cycles.

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;

use crate::address::Address;
use crate::config::XMacConfig;
use crate::encounter::{self, Encounters};
use crate::error::{ConfigError, MacError, TxStatus};
use crate::flags::{ActivityFlags, RadioState};
use crate::frame::{self, Frame, FrameKind, Header, HEADER_LEN, MAX_PAYLOAD_LEN};
use crate::leds::{Leds, NoLeds};
use crate::powercycle::Phase;
use crate::radio::{RadioDriver, MAX_FRAME_LEN};
use crate::stats::{Counters, LinkStats};
use crate::time::{Deadline, RTimer, Ticks};
#[cfg(any(test, feature = "alloc"))]
use crate::trace::{Trace, TraceKind};

/// Power cycles a heard strobe keeps the channel marked busy.
pub const NEIGHBOUR_ACTIVITY_CYCLES: u8 = 2;

/// Called with the sender and payload of every data frame for this node.
pub type ReceiveCallback = fn(Address, &[u8]);

/// An outgoing packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    pub receiver: Address,
    pub payload: &'a [u8],
    /// The upper layer expects an answer. After an acknowledged send the
    /// radio stays on to hear it.
    pub reliable: bool,
}

impl<'a> Packet<'a> {
    pub const fn unicast(receiver: Address, payload: &'a [u8]) -> Self {
        Self {
            receiver,
            payload,
            reliable: false,
        }
    }

    pub const fn broadcast(payload: &'a [u8]) -> Self {
        Self::unicast(Address::BROADCAST, payload)
    }

    pub const fn reliable(mut self) -> Self {
        self.reliable = true;
        self
    }
}

/// The single packet parked while the channel is busy.
struct QueuedPacket {
    receiver: Address,
    reliable: bool,
    len: usize,
    data: [u8; MAX_PAYLOAD_LEN],
}

impl QueuedPacket {
    fn new(packet: &Packet<'_>) -> Self {
        let mut data = [0; MAX_PAYLOAD_LEN];
        data[..packet.payload.len()].copy_from_slice(packet.payload);
        Self {
            receiver: packet.receiver,
            reliable: packet.reliable,
            len: packet.payload.len(),
            data,
        }
    }

    fn as_packet(&self) -> Packet<'_> {
        Packet {
            receiver: self.receiver,
            payload: &self.data[..self.len],
            reliable: self.reliable,
        }
    }
}

pub(crate) struct Hardware<R, L> {
    pub(crate) radio: R,
    pub(crate) leds: L,
    #[cfg(any(test, feature = "alloc"))]
    pub(crate) trace: Trace,
}

/// The operations X-MAC offers to the layer above it.
pub trait MacDriver {
    fn send(&self, packet: &Packet<'_>) -> Result<TxStatus, MacError>;

    /// Process a frame signalled by the radio. Returns the payload length
    /// of a delivered data frame, 0 otherwise.
    fn input(&self) -> usize;

    fn set_receive_callback(&self, callback: ReceiveCallback);

    /// Allow the power cycle to sleep the radio.
    fn turn_on(&self);

    /// Stop sleeping the radio and leave it on or off.
    fn turn_off(&self, keep_radio_on: bool);

    /// Time between two listening windows.
    fn channel_check_interval(&self) -> Ticks;
}

pub struct XMac<R, T, L = NoLeds> {
    pub(crate) hw: Mutex<RefCell<Hardware<R, L>>>,
    pub(crate) rtimer: T,
    pub(crate) config: XMacConfig,
    pub(crate) local: Address,
    pub(crate) flags: ActivityFlags,
    pub(crate) radio_state: RadioState,
    pub(crate) phase: Mutex<Cell<Phase>>,
    cancel: AtomicBool,
    queue: Mutex<RefCell<Option<QueuedPacket>>>,
    encounters: Mutex<RefCell<Encounters>>,
    receive_callback: Mutex<Cell<Option<ReceiveCallback>>>,
    pub(crate) stats: LinkStats,
}

impl<R: RadioDriver, T: RTimer, L: Leds> XMac<R, T, L> {
    pub fn new(radio: R, rtimer: T, leds: L, local: Address, config: XMacConfig) -> Self {
        Self {
            hw: Mutex::new(RefCell::new(Hardware {
                radio,
                leds,
                #[cfg(any(test, feature = "alloc"))]
                trace: Trace::new(),
            })),
            rtimer,
            config,
            local,
            flags: ActivityFlags::new(),
            radio_state: RadioState::new(),
            phase: Mutex::new(Cell::new(Phase::Off)),
            cancel: AtomicBool::new(false),
            queue: Mutex::new(RefCell::new(None)),
            encounters: Mutex::new(RefCell::new(Encounters::new())),
            receive_callback: Mutex::new(Cell::new(None)),
            stats: LinkStats::new(),
        }
    }

    /// Hook the driver up to the radio and start the power cycle.
    ///
    /// `on_receive` is installed as the radio's receive interrupt function
    /// and is expected to call [`XMac::input`].
    pub fn init(&self, on_receive: fn()) -> Result<(), MacError> {
        self.config.validate()?;
        if self.local.is_broadcast() {
            return Err(ConfigError::BroadcastAddress.into());
        }

        self.with_hw(|hw| hw.radio.set_receive_function(on_receive));

        self.flags.set_someone_is_sending(0);
        self.flags.set_we_are_sending(false);
        self.flags.stop_waiting_for_packet();
        critical_section::with(|cs| self.phase.borrow(cs).set(Phase::Off));
        self.radio_state.set_duty_cycling(true);

        let timing = self.config.timing;
        if timing.is_always_on() {
            self.switch_radio(true);
            self.schedule(timing.on_time);
        } else {
            self.schedule(timing.off_time);
        }

        Ok(())
    }

    pub fn local_address(&self) -> Address {
        self.local
    }

    pub fn rtimer(&self) -> &T {
        &self.rtimer
    }

    pub fn config(&self) -> &XMacConfig {
        &self.config
    }

    pub fn flags(&self) -> &ActivityFlags {
        &self.flags
    }

    pub fn is_radio_on(&self) -> bool {
        self.radio_state.is_on()
    }

    pub fn is_duty_cycling(&self) -> bool {
        self.radio_state.duty_cycling()
    }

    pub fn stats(&self) -> Counters {
        self.stats.snapshot()
    }

    pub fn link_stats(&self) -> &LinkStats {
        &self.stats
    }

    /// A packet is parked in the queue slot.
    pub fn has_queued(&self) -> bool {
        critical_section::with(|cs| self.queue.borrow_ref(cs).is_some())
    }

    /// Tick of the last strobe-ACK heard from `neighbor`.
    pub fn last_encounter(&self, neighbor: Address) -> Option<Ticks> {
        critical_section::with(|cs| self.encounters.borrow_ref(cs).last_seen(neighbor))
    }

    /// Run `f` on the radio, e.g. to reconfigure it.
    pub fn with_radio<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(&mut R) -> Ret,
    {
        self.with_hw(|hw| f(&mut hw.radio))
    }

    #[cfg(any(test, feature = "alloc"))]
    pub fn with_trace<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(&mut Trace) -> Ret,
    {
        self.with_hw(|hw| f(&mut hw.trace))
    }

    pub fn set_receive_callback(&self, callback: ReceiveCallback) {
        critical_section::with(|cs| self.receive_callback.borrow(cs).set(Some(callback)));
    }

    pub fn turn_on(&self) {
        self.radio_state.set_duty_cycling(true);
    }

    pub fn turn_off(&self, keep_radio_on: bool) {
        self.radio_state.set_keep_on(keep_radio_on);
        self.radio_state.set_duty_cycling(false);
        self.switch_radio(keep_radio_on);
    }

    pub fn channel_check_interval(&self) -> Ticks {
        self.config.timing.period()
    }

    /// Abort the strobe train in flight, if any.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub(crate) fn with_hw<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(&mut Hardware<R, L>) -> Ret,
    {
        critical_section::with(|cs| f(&mut self.hw.borrow_ref_mut(cs)))
    }

    /// Put the radio in the requested state. Does nothing if it is already
    /// there.
    pub(crate) fn switch_radio(&self, on: bool) {
        critical_section::with(|cs| {
            if !self.radio_state.switch(on) {
                return;
            }

            let mut hw = self.hw.borrow_ref_mut(cs);
            let result = if on { hw.radio.on() } else { hw.radio.off() };
            if let Err(e) = result {
                log!("xmac: radio {} failed: {:?}", if on { "on" } else { "off" }, e);
            }
            hw.leds.radio(on);

            #[cfg(any(test, feature = "alloc"))]
            {
                let kind = if on {
                    TraceKind::RadioOn
                } else {
                    TraceKind::RadioOff
                };
                let at = self.rtimer.now();
                hw.trace.record(at, kind);
            }
        });
    }

    #[inline]
    pub(crate) fn radio_on(&self) {
        self.switch_radio(true);
    }

    /// Sleep the radio. While duty cycling is turned off, return it to the
    /// state requested in [`XMac::turn_off`] instead.
    #[inline]
    pub(crate) fn radio_off(&self) {
        if !self.radio_state.duty_cycling() {
            self.switch_radio(self.radio_state.keep_on());
        } else if !self.config.timing.is_always_on() {
            self.switch_radio(false);
        }
    }

    /// Keep the radio on for an announced data frame. Leaves a radio turned
    /// off by [`XMac::turn_off`] alone.
    #[inline]
    fn hold_radio(&self) {
        if self.radio_state.duty_cycling() || self.radio_state.keep_on() {
            self.radio_on();
        }
    }

    fn radio_send(&self, frame: &[u8]) -> Result<(), MacError> {
        self.with_hw(|hw| hw.radio.send(frame)).map_err(|e| {
            log!("xmac: radio send failed: {:?}", e);
            MacError::Radio
        })
    }

    fn radio_read(&self, buf: &mut [u8]) -> Option<usize> {
        match self.with_hw(|hw| hw.radio.read(buf)) {
            Ok(len) => Some(len),
            Err(nb::Error::WouldBlock) => None,
            Err(nb::Error::Other(e)) => {
                self.stats.add_short_reads();
                log!("xmac: read failed: {:?}", e);
                None
            }
        }
    }

    /// Send `packet`, waking the receiver with a strobe train first.
    pub fn send(&self, packet: &Packet<'_>) -> Result<TxStatus, MacError> {
        if packet.payload.len() > MAX_PAYLOAD_LEN {
            return Err(MacError::TooLarge);
        }

        if self.flags.someone_is_sending() > 0 {
            return self.defer(packet);
        }

        self.transmit(packet)
    }

    /// Send the parked packet once the channel is free again.
    ///
    /// Returns `None` while the channel is busy or the slot is empty.
    pub fn flush_queue(&self) -> Option<Result<TxStatus, MacError>> {
        if self.flags.someone_is_sending() > 0 || self.flags.we_are_sending() {
            return None;
        }

        let queued = critical_section::with(|cs| self.queue.borrow_ref_mut(cs).take())?;
        Some(self.transmit(&queued.as_packet()))
    }

    fn defer(&self, packet: &Packet<'_>) -> Result<TxStatus, MacError> {
        if self.config.queueing {
            let parked = critical_section::with(|cs| {
                let mut slot = self.queue.borrow_ref_mut(cs);
                if slot.is_some() {
                    return false;
                }
                *slot = Some(QueuedPacket::new(packet));
                true
            });

            if parked {
                self.stats.add_queued();
                log!("xmac: channel busy, queued packet to {}", packet.receiver);
                return Err(MacError::Queued);
            }
        }

        self.stats.add_sending_drop();
        log!(
            "xmac: channel busy, dropping packet to {} (someone_is_sending={})",
            packet.receiver,
            self.flags.someone_is_sending()
        );
        Err(MacError::Collision)
    }

    fn transmit(&self, packet: &Packet<'_>) -> Result<TxStatus, MacError> {
        let header = Header::new(self.local, packet.receiver);

        let mut data = [0; MAX_FRAME_LEN];
        let len =
            frame::encode_data(&header, packet.payload, &mut data).ok_or(MacError::TooLarge)?;

        let mut strobe = [0; HEADER_LEN];
        header.encode(&mut strobe).ok_or(MacError::TooLarge)?;

        self.cancel.store(false, Ordering::Release);
        self.wait_for_encounter(packet.receiver);

        // From here on the power cycle leaves the radio alone.
        self.flags.set_we_are_sending(true);
        self.with_hw(|hw| hw.leds.sending(true));

        let result = self.strobe_and_send(&header, &strobe, &data[..len]);

        if packet.reliable && result == Ok(TxStatus::Acked) {
            // Stay awake for the upper-layer answer.
            self.flags.start_waiting_for_packet();
        } else {
            self.radio_off();
        }

        self.with_hw(|hw| hw.leds.sending(false));
        self.flags.set_we_are_sending(false);

        match result {
            Ok(TxStatus::Acked) => self.stats.add_tx_acked(),
            Ok(TxStatus::Broadcast) => self.stats.add_tx_broadcast(),
            Err(MacError::NoAck) => {
                self.stats.add_tx_noack();
                log!("xmac: no strobe-ack from {}", packet.receiver);
            }
            Err(MacError::Collision) => {
                self.stats.add_tx_collision();
                log!("xmac: channel busy before strobing to {}", packet.receiver);
            }
            Err(_) => {}
        }

        result
    }

    /// Busy-wait until shortly before `receiver` is expected to wake up, if
    /// it acknowledged us before.
    fn wait_for_encounter(&self, receiver: Address) {
        if !self.config.encounters || receiver.is_broadcast() {
            return;
        }
        let seen = match self.last_encounter(receiver) {
            Some(seen) => seen,
            None => return,
        };

        let timing = self.config.timing;
        let delay = encounter::hold_off(
            seen,
            self.rtimer.now(),
            timing.period(),
            2 * timing.on_time,
        );
        if delay == 0 {
            return;
        }

        self.stats.add_encounter_waits();
        let wake_up = Deadline::after(&self.rtimer, delay);
        while !wake_up.expired(&self.rtimer) {
            if self.cancel.load(Ordering::Acquire) {
                break;
            }
        }
    }

    fn strobe_and_send(
        &self,
        header: &Header,
        strobe: &[u8],
        data: &[u8],
    ) -> Result<TxStatus, MacError> {
        let timing = self.config.timing;
        let is_broadcast = header.receiver.is_broadcast();
        let ack = Header::strobe_ack(self.local);
        let mut rx = [0; MAX_FRAME_LEN];

        self.radio_on();

        if self.config.channel_check && self.channel_busy(&mut rx) {
            self.flags.set_someone_is_sending(NEIGHBOUR_ACTIVITY_CYCLES);
            return Err(MacError::Collision);
        }

        let mut got_ack = false;
        let mut acked_at: Ticks = 0;
        let mut strobes: u32 = 0;
        let train = Deadline::after(&self.rtimer, timing.strobe_time);

        'train: while !train.expired(&self.rtimer) {
            if self.cancel.load(Ordering::Acquire) {
                break;
            }

            self.radio_send(strobe)?;
            self.stats.add_strobes();
            strobes += 1;

            let wait = Deadline::after(&self.rtimer, timing.strobe_wait_time);
            while !wait.expired(&self.rtimer) {
                if self.cancel.load(Ordering::Acquire) {
                    break 'train;
                }

                let len = match self.radio_read(&mut rx) {
                    Some(len) => len,
                    None => continue,
                };

                match Frame::parse(&rx[..len]) {
                    Some(frame) if !is_broadcast && frame.kind() == FrameKind::StrobeAck => {
                        if frame.header == ack {
                            got_ack = true;
                            acked_at = self.rtimer.now();
                            break 'train;
                        }
                    }
                    Some(_) => {}
                    None => self.stats.add_short_reads(),
                }
            }
        }

        if self.cancel.swap(false, Ordering::AcqRel) {
            log!("xmac: strobe train to {} cancelled", header.receiver);
            return Err(MacError::Cancelled);
        }

        if !got_ack && !is_broadcast {
            return Err(MacError::NoAck);
        }

        self.radio_send(data)?;
        log!(
            "xmac: sent {} bytes to {} after {} strobes",
            data.len(),
            header.receiver,
            strobes
        );

        if got_ack && self.config.encounters {
            let kept = critical_section::with(|cs| {
                self.encounters
                    .borrow_ref_mut(cs)
                    .register(header.receiver, acked_at)
            });
            if !kept {
                log!("xmac: encounter table full, {} not remembered", header.receiver);
            }
        }

        Ok(if got_ack {
            TxStatus::Acked
        } else {
            TxStatus::Broadcast
        })
    }

    /// Listen for one ACK-wait window. Anything heard means the channel is
    /// in use.
    fn channel_busy(&self, rx: &mut [u8]) -> bool {
        let window = Deadline::after(&self.rtimer, self.config.timing.strobe_wait_time);
        while !window.expired(&self.rtimer) {
            if !self.with_hw(|hw| hw.radio.channel_clear()) {
                return true;
            }
            if self.radio_read(rx).is_some() {
                return true;
            }
        }
        false
    }

    /// Receive-interrupt entry point.
    ///
    /// Strobes are answered here and never reach the upper layer. While our
    /// own strobe train is in flight the send loop reads the radio, so
    /// nothing is consumed.
    pub fn input(&self) -> usize {
        if self.flags.we_are_sending() {
            return 0;
        }

        let mut buf = [0; MAX_FRAME_LEN];
        let len = match self.radio_read(&mut buf) {
            Some(len) => len,
            None => return 0,
        };

        let frame = match Frame::parse(&buf[..len]) {
            Some(frame) => frame,
            None => {
                self.stats.add_short_reads();
                log!("xmac: short read ({} bytes)", len);
                return 0;
            }
        };

        match frame.kind() {
            FrameKind::Data => self.input_data(&frame),
            FrameKind::Strobe | FrameKind::StrobeAck => {
                self.input_strobe(&frame.header);
                0
            }
        }
    }

    fn input_strobe(&self, header: &Header) {
        self.stats.add_rx_strobes();

        if header.sender == self.local {
            // Our own strobe-ACK, heard after the exchange finished.
            log!("xmac: stray strobe-ack");
            self.flags.set_someone_is_sending(0);
        } else if header.receiver == self.local {
            let ack = Header::strobe_ack(header.sender);
            let mut buf = [0; HEADER_LEN];
            if ack.encode(&mut buf).is_none() {
                return;
            }

            self.flags.start_waiting_for_packet();
            self.hold_radio();

            if self.radio_send(&buf).is_ok() {
                self.stats.add_strobe_acks();
            }
        } else if header.receiver.is_broadcast() {
            self.flags.start_waiting_for_packet();
            self.hold_radio();
        } else {
            self.flags.set_someone_is_sending(NEIGHBOUR_ACTIVITY_CYCLES);
        }
    }

    fn input_data(&self, frame: &Frame<'_>) -> usize {
        self.flags.set_someone_is_sending(0);

        let receiver = frame.header.receiver;
        if receiver != self.local && !receiver.is_broadcast() {
            self.stats.add_rx_not_for_us();
            return 0;
        }

        // Exchange complete.
        self.radio_off();
        self.flags.stop_waiting_for_packet();

        if critical_section::with(|cs| self.queue.borrow_ref_mut(cs).take()).is_some() {
            self.stats.add_sending_drop();
            log!("xmac: queued packet superseded");
        }

        self.stats.add_rx_data();
        if let Some(callback) = critical_section::with(|cs| self.receive_callback.borrow(cs).get())
        {
            callback(frame.header.sender, frame.payload);
        }

        frame.payload.len()
    }
}

impl<R: RadioDriver, T: RTimer, L: Leds> MacDriver for XMac<R, T, L> {
    fn send(&self, packet: &Packet<'_>) -> Result<TxStatus, MacError> {
        XMac::send(self, packet)
    }

    fn input(&self) -> usize {
        XMac::input(self)
    }

    fn set_receive_callback(&self, callback: ReceiveCallback) {
        XMac::set_receive_callback(self, callback)
    }

    fn turn_on(&self) {
        XMac::turn_on(self)
    }

    fn turn_off(&self, keep_radio_on: bool) {
        XMac::turn_off(self, keep_radio_on)
    }

    fn channel_check_interval(&self) -> Ticks {
        XMac::channel_check_interval(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DutyCycleConfig;
    use crate::error::ScheduleError;
    use alloc::vec::Vec;

    #[derive(Default)]
    struct Quiet {
        on: bool,
    }

    impl RadioDriver for Quiet {
        type Error = ();

        fn on(&mut self) -> Result<(), ()> {
            self.on = true;
            Ok(())
        }

        fn off(&mut self) -> Result<(), ()> {
            self.on = false;
            Ok(())
        }

        fn send(&mut self, _frame: &[u8]) -> Result<(), ()> {
            Ok(())
        }

        fn read(&mut self, _buf: &mut [u8]) -> nb::Result<usize, ()> {
            Err(nb::Error::WouldBlock)
        }

        fn set_receive_function(&mut self, _callback: fn()) {}
    }

    struct Ticking(Cell<Ticks>);

    impl RTimer for Ticking {
        fn now(&self) -> Ticks {
            let now = self.0.get();
            self.0.set(now + 1);
            now
        }

        fn set(&self, _at: Ticks) -> Result<(), ScheduleError> {
            Ok(())
        }
    }

    fn mac() -> XMac<Quiet, Ticking> {
        let config = XMacConfig::new(DutyCycleConfig::new(10, 90));
        XMac::new(
            Quiet::default(),
            Ticking(Cell::new(0)),
            NoLeds,
            Address::new(1, 0),
            config,
        )
    }

    #[test]
    fn trace_records_power_transitions() {
        let mac = mac();
        mac.init(|| {}).unwrap();

        mac.powercycle();
        mac.powercycle();
        mac.powercycle();
        mac.turn_off(true);

        let kinds: Vec<_> = mac.with_trace(|t| t.events().map(|e| e.kind).collect());
        assert_eq!(
            kinds,
            [TraceKind::RadioOn, TraceKind::RadioOff, TraceKind::RadioOn]
        );

        let at: Vec<_> = mac.with_trace(|t| t.events().map(|e| e.at).collect());
        assert!(at.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn noack_leaves_radio_asleep() {
        let mac = mac();
        mac.init(|| {}).unwrap();

        let packet = Packet::unicast(Address::new(2, 0), b"x").reliable();
        assert_eq!(mac.send(&packet), Err(MacError::NoAck));
        assert!(!mac.is_radio_on());
        assert!(!mac.with_radio(|r| r.on));
        assert_eq!(mac.flags().waiting_for_packet(), 0);
    }

    #[test]
    fn queued_packet_keeps_its_payload() {
        let packet = Packet::unicast(Address::new(2, 0), b"abc").reliable();
        let queued = QueuedPacket::new(&packet);
        assert_eq!(queued.as_packet(), packet);
    }
}
