//! CC2538 RF core
//!
//! The RF core is driven through its command strobe processor with the RX
//! FIFO read byte by byte. [`Radio`] wraps the typestate driver so the MAC
//! can switch it on and off through [`RadioDriver`].

use core::cell::Cell;
use core::marker::PhantomData;
use core::mem;

use cc2538_pac as pac;
use critical_section::Mutex;
use pac::{
    ana_regs, rfcore_ffsm, rfcore_sfr, rfcore_xreg, Interrupt, ANA_REGS, NVIC, RFCORE_FFSM,
    RFCORE_SFR, RFCORE_XREG,
};

use super::{RadioDriver as Driver, RadioError, CHECKSUM_LEN, MAX_FRAME_LEN, MAX_PACKET_LEN};

const CCA_THRES: u8 = 0xF8;
const MIN_PACKET_LEN: u32 = 4;
const RSSI_OFFSET: i32 = 73;

static RECEIVE_FN: Mutex<Cell<Option<fn()>>> = Mutex::new(Cell::new(None));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    TxDone,
    Fifop,
    All,
}

impl Event {
    #[inline]
    const fn mask(&self) -> u32 {
        match self {
            Event::TxDone => 0b10,
            Event::Fifop => 0b100,
            Event::All => !0u32,
        }
    }
}

/// Radio configuration
#[derive(Debug, Copy, Clone)]
pub struct RadioConfig {
    pub channel: Channel,
    pub pan_id: u16,
    pub short_addr: u16,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            channel: Channel::Channel26,
            pan_id: 0xabcd,
            short_addr: 0,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Channel11 = 11,
    Channel12,
    Channel13,
    Channel14,
    Channel15,
    Channel16,
    Channel17,
    Channel18,
    Channel19,
    Channel20,
    Channel21,
    Channel22,
    Channel23,
    Channel24,
    Channel25,
    Channel26,
}

#[inline]
const fn channel_freq_reg_val(channel: Channel) -> u32 {
    11 + 5 * (channel as u32 - 11)
}

/// Command strobe processor instructions used by the driver.
#[repr(u8)]
#[derive(Debug, Copy, Clone)]
enum CspOpCode {
    /// Immediate enable and calibrate frequency synthesizer for RX
    IsRXon = 0xE3,
    /// Immediate enable TX after calibration
    IsTXOn = 0xE9,
    /// Immediate disable RX or TX and the frequency synthesizer
    IsRFOff = 0xEF,
    /// Immediate flush RX FIFO buffer and reset demodulator
    IsFlushRx = 0xED,
    /// Immediate flush TX FIFO
    IsFlushTX = 0xEE,
}

pub struct RadioOn;
pub struct RadioOff;

pub struct RfCore<'p, State> {
    _ffsm: PhantomData<&'p mut RFCORE_FFSM>,
    _xreg: PhantomData<&'p mut RFCORE_XREG>,
    _sfr: PhantomData<&'p mut RFCORE_SFR>,
    _ana: PhantomData<&'p mut ANA_REGS>,
    _state: PhantomData<State>,
}

impl<'p, State> RfCore<'p, State> {
    #[inline]
    fn ffsm_regs() -> &'static rfcore_ffsm::RegisterBlock {
        unsafe { &*RFCORE_FFSM::ptr() }
    }

    #[inline]
    fn xreg_regs() -> &'static rfcore_xreg::RegisterBlock {
        unsafe { &*RFCORE_XREG::ptr() }
    }

    #[inline]
    fn sfr_regs() -> &'static rfcore_sfr::RegisterBlock {
        unsafe { &*RFCORE_SFR::ptr() }
    }

    #[inline]
    fn ana_regs() -> &'static ana_regs::RegisterBlock {
        unsafe { &*ANA_REGS::ptr() }
    }

    #[inline]
    const fn into_state<S>(self) -> RfCore<'p, S> {
        RfCore {
            _ffsm: PhantomData,
            _xreg: PhantomData,
            _sfr: PhantomData,
            _ana: PhantomData,
            _state: PhantomData,
        }
    }

    #[inline]
    fn send_csp_op_code(&self, op_code: CspOpCode) {
        Self::sfr_regs()
            .rfst
            .modify(|_, w| unsafe { w.instr().bits(op_code as u8) });
    }

    /// Set the PAN ID to use by the radio
    #[inline]
    pub fn set_pan_id(&mut self, id: u16) {
        Self::ffsm_regs()
            .pan_id0
            .modify(|_, w| unsafe { w.bits(id as u32 & 0xFF) });
        Self::ffsm_regs()
            .pan_id1
            .modify(|_, w| unsafe { w.bits(id as u32 >> 8) });
    }

    /// Set the short address
    #[inline]
    pub fn set_short_address(&mut self, addr: u16) {
        Self::ffsm_regs()
            .short_addr0
            .modify(|_, w| unsafe { w.bits(addr as u32 & 0xFF) });
        Self::ffsm_regs()
            .short_addr1
            .modify(|_, w| unsafe { w.bits(addr as u32 >> 8) });
    }

    /// Set the channel
    #[inline]
    pub fn set_channel(&mut self, channel: Channel) {
        Self::xreg_regs()
            .freqctrl
            .modify(|_, w| unsafe { w.bits(channel_freq_reg_val(channel)) });
    }

    #[inline]
    fn listen(&mut self, event: Event) {
        match event {
            Event::Fifop => Self::xreg_regs()
                .rfirqm0
                .modify(|r, w| unsafe { w.bits(r.bits() | event.mask()) }),
            Event::TxDone => Self::xreg_regs()
                .rfirqm1
                .modify(|r, w| unsafe { w.bits(r.bits() | event.mask()) }),
            Event::All => {
                Self::xreg_regs()
                    .rfirqm0
                    .write(|w| unsafe { w.bits(event.mask()) });
                Self::xreg_regs()
                    .rfirqm1
                    .write(|w| unsafe { w.bits(event.mask()) });
            }
        }
    }

    #[inline]
    fn clear_event(&mut self, event: Event) {
        match event {
            Event::Fifop => Self::sfr_regs()
                .rfirqf0
                .modify(|r, w| unsafe { w.bits(r.bits() & !event.mask()) }),
            Event::TxDone => Self::sfr_regs()
                .rfirqf1
                .modify(|r, w| unsafe { w.bits(r.bits() & !event.mask()) }),
            Event::All => {
                Self::sfr_regs().rfirqf0.write(|w| unsafe { w.bits(0) });
                Self::sfr_regs().rfirqf1.write(|w| unsafe { w.bits(0) });
            }
        }
    }
}

impl<'p> RfCore<'p, RadioOff> {
    pub fn new(
        #[allow(unused_variables)] rfcore_ffsm: &'p mut RFCORE_FFSM,
        #[allow(unused_variables)] rfcore_xreg: &'p mut RFCORE_XREG,
        #[allow(unused_variables)] rfcore_sfr: &'p mut RFCORE_SFR,
        #[allow(unused_variables)] ana_regs: &'p mut ANA_REGS,
    ) -> Self {
        RfCore {
            _ffsm: PhantomData,
            _xreg: PhantomData,
            _sfr: PhantomData,
            _ana: PhantomData,
            _state: PhantomData,
        }
    }

    /// Apply the configuration and tuning values. The receiver stays off.
    pub fn configure(&mut self, config: RadioConfig) {
        let xreg = Self::xreg_regs();
        let ana = Self::ana_regs();

        xreg.ccactrl0
            .modify(|_, w| unsafe { w.cca_thr().bits(CCA_THRES) });

        self.set_pan_id(config.pan_id);
        self.set_short_address(config.short_addr);

        // Changes from the reset values (following contiki-ng)
        xreg.txfiltcfg.modify(|_, w| unsafe { w.bits(0x09) }); // TX anti-aliasing filter bandwidth
        xreg.agcctrl1.modify(|_, w| unsafe { w.bits(0x15) }); // AGC target value
        ana.ivctrl.modify(|_, w| unsafe { w.bits(0x0B) }); // ANA bias current
        xreg.fscal1.modify(|_, w| unsafe { w.bits(0x01) }); // Tune frequency calibration

        // X-MAC frames are not 802.15.4 frames: no filtering, no hardware ACK.
        xreg.frmfilt0
            .modify(|_, w| w.frame_filter_en().clear_bit());
        xreg.frmctrl0
            .modify(|_, w| w.autocrc().set_bit().autoack().clear_bit());
        xreg.srcmatch.modify(|_, w| unsafe { w.bits(0) });

        xreg.fifopctrl
            .modify(|_, w| unsafe { w.fifop_thr().bits(MAX_PACKET_LEN as u8) });
        xreg.txpower.modify(|_, w| unsafe { w.bits(0xD5) });

        self.set_channel(config.channel);

        self.clear_event(Event::All);
        self.listen(Event::Fifop);
        self.listen(Event::TxDone);

        unsafe { NVIC::unmask(Interrupt::RF_TXRX) };
    }

    /// Enable RX
    #[inline]
    pub fn enable_rx(self) -> RfCore<'p, RadioOn> {
        self.send_csp_op_code(CspOpCode::IsFlushRx);
        self.send_csp_op_code(CspOpCode::IsRXon);
        self.into_state()
    }
}

impl<'p> RfCore<'p, RadioOn> {
    /// Disable RX once an ongoing transmission has left the FIFO.
    pub fn disable_rx(self) -> RfCore<'p, RadioOff> {
        while Self::xreg_regs().fsmstat1.read().tx_active().bit_is_set() {}

        if Self::xreg_regs().fsmstat1.read().fifop().bit_is_set() {
            self.send_csp_op_code(CspOpCode::IsFlushRx);
        }

        self.send_csp_op_code(CspOpCode::IsRFOff);
        self.into_state()
    }

    /// Load a frame into the TX FIFO
    #[inline]
    fn prepare(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        if frame.len() > MAX_FRAME_LEN {
            return Err(RadioError::PayloadTooBig);
        }

        while Self::xreg_regs().fsmstat1.read().tx_active().bit() {}

        self.send_csp_op_code(CspOpCode::IsFlushTX);

        // The length byte counts the checksum appended by the hardware.
        Self::sfr_regs()
            .rfdata
            .write(|w| unsafe { w.bits((frame.len() + CHECKSUM_LEN) as u32) });

        for b in frame.iter() {
            Self::sfr_regs()
                .rfdata
                .write(|w| unsafe { w.bits((*b) as u32) });
        }

        Ok(())
    }

    /// Send the frame that has previously been prepared
    #[inline]
    fn transmit(&mut self) -> Result<(), RadioError> {
        if !self.is_channel_clear() || self.receiving_packet() {
            self.send_csp_op_code(CspOpCode::IsFlushTX);
            return Err(RadioError::Collision);
        }

        // Only enable TX after checking the channel, otherwise TX won't start.
        self.send_csp_op_code(CspOpCode::IsTXOn);

        let mut counter = 0;
        while Self::xreg_regs().fsmstat1.read().tx_active().bit_is_clear() && counter < 3 {
            counter += 1;
        }

        if Self::xreg_regs().fsmstat1.read().tx_active().bit_is_clear() {
            self.send_csp_op_code(CspOpCode::IsFlushTX);
            return Err(RadioError::UnableToStartTx);
        }

        while Self::xreg_regs().fsmstat1.read().tx_active().bit_is_set() {}

        Ok(())
    }

    /// Prepare and transmit a frame
    #[inline]
    pub fn send(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        self.prepare(frame)?;
        self.transmit()
    }

    /// Read a received frame into `buffer`, dropping the RSSI/CRC footer.
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<usize, RadioError> {
        let len = Self::sfr_regs().rfdata.read().bits();

        if len as usize > MAX_PACKET_LEN
            || len <= MIN_PACKET_LEN
            || len as usize - CHECKSUM_LEN > buffer.len()
        {
            self.send_csp_op_code(CspOpCode::IsFlushRx);
            return Err(RadioError::IncorrectFrame);
        }

        let len = len as usize - CHECKSUM_LEN;
        for b in buffer[..len].iter_mut() {
            *b = Self::sfr_regs().rfdata.read().bits() as u8;
        }

        let _rssi = Self::sfr_regs().rfdata.read().bits() as i32 - RSSI_OFFSET;
        let crc_corr = Self::sfr_regs().rfdata.read().bits();

        if Self::xreg_regs().fsmstat1.read().fifop().bit_is_set() {
            if Self::xreg_regs().fsmstat1.read().fifo().bit_is_set() {
                cortex_m::asm::sev();
            } else {
                self.send_csp_op_code(CspOpCode::IsFlushRx);
            }
        }

        if crc_corr & 0x80 == 0 {
            return Err(RadioError::IncorrectFrame);
        }

        Ok(len)
    }

    /// Check if the radio is currently receiving a frame
    #[inline]
    pub fn receiving_packet(&self) -> bool {
        // SFD is high when transmitting and receiving, TX_ACTIVE only when
        // transmitting.
        let fsmstat1 = Self::xreg_regs().fsmstat1.read();
        fsmstat1.sfd().bit() && !fsmstat1.tx_active().bit()
    }

    /// Check if a complete frame is waiting in the RX FIFO
    #[inline]
    pub fn received_packet(&self) -> bool {
        Self::xreg_regs().fsmstat1.read().fifop().bit()
    }

    #[inline]
    pub fn is_rssi_valid(&self) -> bool {
        Self::xreg_regs().rssistat.read().rssi_valid().bit_is_set()
    }

    /// Perform a clear channel assessment
    #[inline]
    pub fn is_channel_clear(&self) -> bool {
        while !self.is_rssi_valid() {}

        Self::xreg_regs().fsmstat1.read().cca().bit_is_set()
    }
}

/// The RF core in whichever power state the MAC left it.
pub enum Radio<'p> {
    Off(RfCore<'p, RadioOff>),
    On(RfCore<'p, RadioOn>),
    Undefined,
}

impl<'p> Radio<'p> {
    pub fn new(mut core: RfCore<'p, RadioOff>, config: RadioConfig) -> Self {
        core.configure(config);
        Radio::Off(core)
    }

    /// Body of the `RF_TXRX` interrupt handler.
    pub fn handle_interrupt() {
        let sfr = RfCore::<RadioOn>::sfr_regs();
        let fifop = sfr.rfirqf0.read().bits() & Event::Fifop.mask() != 0;
        sfr.rfirqf0.write(|w| unsafe { w.bits(0) });
        sfr.rfirqf1.write(|w| unsafe { w.bits(0) });

        if fifop {
            if let Some(callback) = critical_section::with(|cs| RECEIVE_FN.borrow(cs).get()) {
                callback();
            }
        }
    }
}

impl<'p> Driver for Radio<'p> {
    type Error = RadioError;

    fn on(&mut self) -> Result<(), RadioError> {
        match mem::replace(self, Radio::Undefined) {
            Radio::Off(core) => *self = Radio::On(core.enable_rx()),
            Radio::On(core) => *self = Radio::On(core),
            Radio::Undefined => return Err(RadioError::Unavailable),
        }
        Ok(())
    }

    fn off(&mut self) -> Result<(), RadioError> {
        match mem::replace(self, Radio::Undefined) {
            Radio::On(core) => *self = Radio::Off(core.disable_rx()),
            Radio::Off(core) => *self = Radio::Off(core),
            Radio::Undefined => return Err(RadioError::Unavailable),
        }
        Ok(())
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        match self {
            Radio::On(core) => core.send(frame),
            Radio::Off(_) => {
                // TX needs RX running for the CCA.
                self.on()?;
                let result = match self {
                    Radio::On(core) => core.send(frame),
                    _ => Err(RadioError::Unavailable),
                };
                self.off()?;
                result
            }
            Radio::Undefined => Err(RadioError::Unavailable),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> nb::Result<usize, RadioError> {
        match self {
            Radio::On(core) if core.received_packet() => {
                core.read(buf).map_err(nb::Error::Other)
            }
            Radio::On(_) | Radio::Off(_) => Err(nb::Error::WouldBlock),
            Radio::Undefined => Err(nb::Error::Other(RadioError::Unavailable)),
        }
    }

    fn set_receive_function(&mut self, callback: fn()) {
        critical_section::with(|cs| RECEIVE_FN.borrow(cs).set(Some(callback)));
    }

    fn channel_clear(&mut self) -> bool {
        match self {
            Radio::On(core) => core.is_channel_clear(),
            _ => true,
        }
    }
}
