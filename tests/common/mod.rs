//! Host doubles for the radio and the real-time timer.
//!
//! Nodes share an [`Ether`]: a frame sent by one radio lands in the inbox of
//! every other radio that is switched on, and that node's receive interrupt
//! runs right away.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use cc2538_xmac::{
    Address, DutyCycleConfig, Leds, NoLeds, RTimer, RadioDriver, ScheduleError, Ticks, XMac, XMacConfig,
};

pub const ON_TIME: Ticks = 20;
pub const OFF_TIME: Ticks = 200;

pub fn timing() -> DutyCycleConfig {
    DutyCycleConfig::new(ON_TIME, OFF_TIME)
}

pub fn config() -> XMacConfig {
    XMacConfig::new(timing())
}

/// A clock that advances one tick every time it is read.
#[derive(Default)]
pub struct ClockState {
    now: Cell<Ticks>,
    pub armed: RefCell<Vec<(Ticks, Ticks)>>,
    pub refuse: Cell<bool>,
    pub offset: Cell<Ticks>,
}

#[derive(Clone, Default)]
pub struct Clock(pub Rc<ClockState>);

impl Clock {
    pub fn set_now(&self, now: Ticks) {
        self.0.now.set(now);
    }

    pub fn peek(&self) -> Ticks {
        self.0.now.get()
    }

    /// Delays requested through `set`, relative to the time of the call.
    pub fn delays(&self) -> Vec<Ticks> {
        self.0
            .armed
            .borrow()
            .iter()
            .map(|&(asked_at, at)| at.wrapping_sub(asked_at))
            .collect()
    }
}

impl RTimer for Clock {
    fn now(&self) -> Ticks {
        let now = self.0.now.get();
        self.0.now.set(now.wrapping_add(1));
        now
    }

    fn set(&self, at: Ticks) -> Result<(), ScheduleError> {
        if self.0.refuse.get() {
            return Err(ScheduleError::InPast);
        }
        // `now` already moved past the read that computed `at`.
        let asked_at = self.0.now.get().wrapping_sub(1);
        self.0.armed.borrow_mut().push((asked_at, at));
        Ok(())
    }

    fn synchronized_offset(&self) -> Ticks {
        self.0.offset.get()
    }
}

/// Called by the ether when a frame arrives for a switched-on radio.
pub trait Station {
    fn radio_interrupt(&self);
}

impl<R: RadioDriver, T: RTimer, L: Leds> Station for XMac<R, T, L> {
    fn radio_interrupt(&self) {
        self.input();
    }
}

#[derive(Default)]
pub struct RadioState {
    pub on: Cell<bool>,
    pub on_calls: Cell<usize>,
    pub off_calls: Cell<usize>,
    pub sent: RefCell<Vec<Vec<u8>>>,
    pub inbox: RefCell<VecDeque<Vec<u8>>>,
    pub receive_fn: Cell<Option<fn()>>,
    pub busy_channel: Cell<bool>,
}

impl RadioState {
    pub fn inject(&self, frame: &[u8]) {
        self.inbox.borrow_mut().push_back(frame.to_vec());
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.borrow().clone()
    }

    /// Frames longer than a header.
    pub fn data_frames(&self) -> Vec<Vec<u8>> {
        self.sent
            .borrow()
            .iter()
            .filter(|f| f.len() > 4)
            .cloned()
            .collect()
    }

    pub fn strobes(&self) -> usize {
        self.sent.borrow().iter().filter(|f| f.len() == 4).count()
    }
}

struct Port {
    id: usize,
    radio: Rc<RadioState>,
    station: Option<Weak<dyn Station>>,
}

#[derive(Clone, Default)]
pub struct Ether {
    ports: Rc<RefCell<Vec<Port>>>,
}

impl Ether {
    pub fn radio(&self) -> MockRadio {
        let state = Rc::new(RadioState::default());
        let mut ports = self.ports.borrow_mut();
        let id = ports.len();
        ports.push(Port {
            id,
            radio: state.clone(),
            station: None,
        });

        MockRadio {
            id,
            state,
            ether: self.clone(),
        }
    }

    pub fn attach(&self, id: usize, station: Weak<dyn Station>) {
        let mut ports = self.ports.borrow_mut();
        if let Some(port) = ports.iter_mut().find(|p| p.id == id) {
            port.station = Some(station);
        }
    }

    fn transmit(&self, from: usize, frame: &[u8]) {
        let listeners: Vec<_> = self
            .ports
            .borrow()
            .iter()
            .filter(|p| p.id != from && p.radio.on.get())
            .map(|p| (p.radio.clone(), p.station.clone()))
            .collect();

        for (radio, station) in listeners {
            radio.inject(frame);
            if let Some(station) = station.and_then(|s| s.upgrade()) {
                station.radio_interrupt();
            }
        }
    }
}

pub struct MockRadio {
    id: usize,
    pub state: Rc<RadioState>,
    ether: Ether,
}

impl MockRadio {
    /// A radio nobody else hears.
    pub fn alone() -> Self {
        Ether::default().radio()
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

#[derive(Debug)]
pub struct MockError;

impl RadioDriver for MockRadio {
    type Error = MockError;

    fn on(&mut self) -> Result<(), MockError> {
        self.state.on.set(true);
        self.state.on_calls.set(self.state.on_calls.get() + 1);
        Ok(())
    }

    fn off(&mut self) -> Result<(), MockError> {
        self.state.on.set(false);
        self.state.off_calls.set(self.state.off_calls.get() + 1);
        Ok(())
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), MockError> {
        self.state.sent.borrow_mut().push(frame.to_vec());
        self.ether.transmit(self.id, frame);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> nb::Result<usize, MockError> {
        let frame = self
            .state
            .inbox
            .borrow_mut()
            .pop_front()
            .ok_or(nb::Error::WouldBlock)?;
        buf[..frame.len()].copy_from_slice(&frame);
        Ok(frame.len())
    }

    fn set_receive_function(&mut self, callback: fn()) {
        self.state.receive_fn.set(Some(callback));
    }

    fn channel_clear(&mut self) -> bool {
        !self.state.busy_channel.get()
    }
}

pub type Node = XMac<MockRadio, Clock>;

/// A node on `ether` with its receive interrupt wired up.
pub fn node(
    ether: &Ether,
    clock: &Clock,
    addr: Address,
    config: XMacConfig,
) -> (Rc<Node>, Rc<RadioState>) {
    let radio = ether.radio();
    let state = radio.state.clone();
    let id = radio.id;

    let mac = Rc::new(XMac::new(radio, clock.clone(), NoLeds, addr, config));
    let station: Rc<dyn Station> = mac.clone();
    ether.attach(id, Rc::downgrade(&station));

    (mac, state)
}

/// Run power-cycle firings until the radio is listening.
pub fn wake(mac: &Node) {
    for _ in 0..2 {
        if mac.is_radio_on() {
            return;
        }
        mac.powercycle();
    }
}

pub fn noop() {}

pub fn frame(sender: Address, receiver: Address, payload: &[u8]) -> Vec<u8> {
    let mut f = Vec::with_capacity(4 + payload.len());
    f.extend_from_slice(sender.as_bytes());
    f.extend_from_slice(receiver.as_bytes());
    f.extend_from_slice(payload);
    f
}
