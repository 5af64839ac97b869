#![no_main]
#![no_std]

use core::cell::Cell;

use cortex_m_rt as rt;
use rt::entry;

use panic_rtt_target as _;

extern crate alloc;
use alloc::boxed::Box;
use alloc_cortex_m::CortexMHeap;

#[global_allocator]
static ALLOCATOR: CortexMHeap = CortexMHeap::empty();

use critical_section::Mutex;
use rtt_target::{rprintln, rtt_init_print};

use cc2538_pac as pac;
use pac::interrupt;

use cc2538_xmac::config::{DEFAULT_OFF_TIME, DEFAULT_ON_TIME};
use cc2538_xmac::radio::cc2538::{Radio, RadioConfig, RfCore};
use cc2538_xmac::smwd::{SleepTimer, SleepTimerExt};
use cc2538_xmac::time::{clock_lt, RTIMER_SECOND};
use cc2538_xmac::{Address, DutyCycleConfig, NoLeds, Packet, XMac, XMacConfig};

type Node = XMac<Radio<'static>, SleepTimer>;

const XMAC: XMacConfig =
    XMacConfig::new(DutyCycleConfig::new(DEFAULT_ON_TIME, DEFAULT_OFF_TIME)).with_queueing(true);

const BROADCAST_INTERVAL: u32 = 4 * RTIMER_SECOND;

static NODE: Mutex<Cell<Option<&'static Node>>> = Mutex::new(Cell::new(None));

fn node() -> Option<&'static Node> {
    critical_section::with(|cs| NODE.borrow(cs).get())
}

fn on_receive() {
    if let Some(node) = node() {
        node.input();
    }
}

fn delivered(sender: Address, payload: &[u8]) {
    rprintln!("{} bytes from {}: {:x?}", payload.len(), sender, payload);
}

#[interrupt]
fn SM_TIMER() {
    if let Some(node) = node() {
        node.powercycle();
    }
}

#[interrupt]
fn RF_TXRX() {
    Radio::handle_interrupt();
}

#[entry]
fn main() -> ! {
    rtt_init_print!();

    // Setup the allocator
    let start = cortex_m_rt::heap_start() as usize;
    let size = 4048;
    unsafe { ALLOCATOR.init(start, size) };

    match inner_main() {
        Ok(()) => cortex_m::peripheral::SCB::sys_reset(),
        Err(e) => panic!("{}", e),
    }
}

fn inner_main() -> Result<(), &'static str> {
    let _core_periph = cortex_m::Peripherals::take().ok_or("unable to get core peripherals")?;
    let periph = pac::Peripherals::take().ok_or("unable to get peripherals")?;

    // 32 MHz crystal for the system and IO clocks, RF core clocked in every
    // power mode.
    let sys_ctrl = &periph.SYS_CTRL;
    sys_ctrl.clock_ctrl().modify(|_, w| unsafe {
        w.amp_det().set_bit().osc().clear_bit().sys_div().bits(0)
    });
    sys_ctrl
        .clock_ctrl()
        .modify(|_, w| unsafe { w.io_div().bits(0) });
    while sys_ctrl.clock_sta().read().osc().bit_is_set() {}
    sys_ctrl.rcgcrfc().modify(|_, w| w.rfc0().set_bit());
    sys_ctrl.scgcrfc().modify(|_, w| w.rfc0().set_bit());
    sys_ctrl.dcgcrfc().modify(|_, w| w.rfc0().set_bit());

    let addr = Address::from_ieee();
    rprintln!("node {}", addr);

    let core = RfCore::new(
        Box::leak(Box::new(periph.RFCORE_FFSM)),
        Box::leak(Box::new(periph.RFCORE_XREG)),
        Box::leak(Box::new(periph.RFCORE_SFR)),
        Box::leak(Box::new(periph.ANA_REGS)),
    );
    let radio = Radio::new(
        core,
        RadioConfig {
            short_addr: addr.as_u16(),
            ..RadioConfig::default()
        },
    );
    let timer = periph.SMWDTHROSC.split();

    let node: &'static Node = Box::leak(Box::new(XMac::new(radio, timer, NoLeds, addr, XMAC)));
    critical_section::with(|cs| NODE.borrow(cs).set(Some(node)));

    node.set_receive_callback(delivered);
    node.init(on_receive)
        .map_err(|_| "invalid X-MAC configuration")?;

    unsafe {
        cortex_m::interrupt::enable();
    }

    let mut seq: u32 = 0;
    let mut next = node.rtimer().now().wrapping_add(BROADCAST_INTERVAL);
    loop {
        if let Some(result) = node.flush_queue() {
            rprintln!("queued packet: {:?}", result);
        }

        if !clock_lt(node.rtimer().now(), next) {
            let payload = seq.to_le_bytes();
            match node.send(&Packet::broadcast(&payload)) {
                Ok(status) => rprintln!("broadcast {}: {:?}", seq, status),
                Err(e) => rprintln!("broadcast {} failed: {:?}", seq, e),
            }
            seq = seq.wrapping_add(1);
            next = next.wrapping_add(BROADCAST_INTERVAL);

            let stats = node.stats();
            rprintln!(
                "tx {}/{} rx {} strobes {}",
                stats.tx_broadcast + stats.tx_acked,
                stats.tx_noack,
                stats.rx_data,
                stats.strobes
            );
        }

        cortex_m::asm::wfi();
    }
}
