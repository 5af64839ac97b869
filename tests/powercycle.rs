mod common;

use cc2538_xmac::{
    Address, ConfigError, DutyCycleConfig, MacError, Packet, Phase, TxStatus, XMacConfig,
};

use common::*;

const A: Address = Address::new(1, 0);
const B: Address = Address::new(2, 0);

#[test]
fn radio_follows_duty_cycle() {
    let ether = Ether::default();
    let clock = Clock::default();
    let (a, radio) = node(&ether, &clock, A, config());

    a.init(noop).unwrap();
    assert!(radio.receive_fn.get().is_some());
    assert!(a.is_duty_cycling());
    assert!(!a.is_radio_on());

    a.powercycle();
    assert_eq!(a.phase(), Phase::On);
    assert!(!radio.on.get());

    a.powercycle();
    assert_eq!(a.phase(), Phase::Off);
    assert!(radio.on.get());

    a.powercycle();
    assert!(!radio.on.get());

    a.powercycle();
    assert!(radio.on.get());

    assert_eq!(
        clock.delays(),
        [OFF_TIME, OFF_TIME, ON_TIME, OFF_TIME, ON_TIME]
    );
    // Already off at the first sleep, so no hardware call.
    assert_eq!(radio.on_calls.get(), 2);
    assert_eq!(radio.off_calls.get(), 1);
}

#[test]
fn always_on_never_sleeps() {
    let ether = Ether::default();
    let clock = Clock::default();
    let cfg = XMacConfig::new(DutyCycleConfig::always_on());
    let (a, radio) = node(&ether, &clock, A, cfg);

    a.init(noop).unwrap();
    assert!(radio.on.get());

    for _ in 0..4 {
        a.powercycle();
        assert!(radio.on.get());
        assert_eq!(a.phase(), Phase::Off);
    }

    // A data frame for us does not sleep the radio either.
    radio.inject(&frame(B, A, b"hi"));
    assert_eq!(a.input(), 2);
    assert!(radio.on.get());

    assert_eq!(radio.off_calls.get(), 0);
    let on_time = DutyCycleConfig::always_on().on_time;
    assert!(clock.delays().iter().all(|&d| d == on_time));
}

#[test]
fn neighbour_activity_ages_every_cycle() {
    let ether = Ether::default();
    let clock = Clock::default();
    let (a, radio) = node(&ether, &clock, A, config());
    a.init(noop).unwrap();

    radio.inject(&frame(B, Address::new(9, 0), &[]));
    a.input();
    assert_eq!(a.flags().someone_is_sending(), 2);

    a.powercycle();
    assert_eq!(a.flags().someone_is_sending(), 1);
    a.powercycle();
    assert_eq!(a.flags().someone_is_sending(), 1);
    a.powercycle();
    assert_eq!(a.flags().someone_is_sending(), 0);
}

#[test]
fn waiting_for_data_is_bounded() {
    let ether = Ether::default();
    let clock = Clock::default();
    let (b, radio) = node(&ether, &clock, B, config());
    b.init(noop).unwrap();
    wake(&b);
    assert_eq!(b.phase(), Phase::Off);

    radio.inject(&frame(A, B, &[]));
    assert_eq!(b.input(), 0);
    assert_eq!(b.flags().waiting_for_packet(), 1);

    b.powercycle();
    assert!(radio.on.get());
    b.powercycle();
    assert!(radio.on.get());
    b.powercycle();
    assert!(!radio.on.get());
    assert_eq!(b.flags().waiting_for_packet(), 0);
}

#[test]
fn turn_off_overrides_duty_cycle() {
    let ether = Ether::default();
    let clock = Clock::default();
    let (a, radio) = node(&ether, &clock, A, config());
    a.init(noop).unwrap();

    a.turn_off(true);
    assert!(!a.is_duty_cycling());
    assert!(radio.on.get());
    for _ in 0..3 {
        a.powercycle();
        assert!(radio.on.get());
    }

    a.turn_on();
    while a.phase() != Phase::Off {
        a.powercycle();
    }
    a.powercycle();
    assert!(!radio.on.get());

    a.turn_off(false);
    for _ in 0..3 {
        a.powercycle();
        assert!(!radio.on.get());
    }
}

#[test]
fn turn_off_survives_sends_and_strobes() {
    let ether = Ether::default();
    let clock = Clock::default();
    let (a, radio) = node(&ether, &clock, A, config());
    a.init(noop).unwrap();

    a.turn_off(false);
    assert_eq!(a.send(&Packet::broadcast(b"x")), Ok(TxStatus::Broadcast));
    assert!(!radio.on.get());
    for _ in 0..4 {
        a.powercycle();
        assert!(!radio.on.get());
    }

    // A strobe for us is still answered but does not wake the radio.
    radio.inject(&frame(B, A, &[]));
    a.input();
    assert_eq!(radio.sent().last(), Some(&frame(B, B, &[])));
    assert!(!radio.on.get());
    for _ in 0..4 {
        a.powercycle();
        assert!(!radio.on.get());
    }

    a.turn_off(true);
    assert_eq!(a.send(&Packet::broadcast(b"y")), Ok(TxStatus::Broadcast));
    for _ in 0..4 {
        a.powercycle();
        assert!(radio.on.get());
    }
}

#[test]
fn on_off_are_idempotent() {
    let ether = Ether::default();
    let clock = Clock::default();
    let (a, radio) = node(&ether, &clock, A, config());

    a.turn_off(true);
    a.turn_off(true);
    assert_eq!(radio.on_calls.get(), 1);

    a.turn_off(false);
    a.turn_off(false);
    assert_eq!(radio.off_calls.get(), 1);
}

#[test]
fn schedule_failure_is_counted_not_fatal() {
    let ether = Ether::default();
    let clock = Clock::default();
    let (a, _radio) = node(&ether, &clock, A, config());

    clock.0.refuse.set(true);
    a.init(noop).unwrap();
    a.powercycle();

    assert_eq!(a.stats().schedule_failures, 2);
    assert_eq!(a.phase(), Phase::On);
}

#[test]
fn invalid_timing_is_refused() {
    let ether = Ether::default();
    let clock = Clock::default();
    let cfg = XMacConfig::new(timing().with_strobe_time(ON_TIME));
    let (a, radio) = node(&ether, &clock, A, cfg);

    assert!(a.init(noop).is_err());
    assert!(radio.receive_fn.get().is_none());
    assert!(clock.delays().is_empty());
}

#[test]
fn broadcast_local_address_is_refused() {
    let ether = Ether::default();
    let clock = Clock::default();
    let (a, radio) = node(&ether, &clock, Address::BROADCAST, config());

    assert_eq!(
        a.init(noop),
        Err(MacError::Config(ConfigError::BroadcastAddress))
    );
    assert!(radio.receive_fn.get().is_none());
    assert!(clock.delays().is_empty());
}

#[test]
fn slotting_aligns_wake_up_to_address() {
    let ether = Ether::default();
    let clock = Clock::default();
    let (a, _radio) = node(&ether, &clock, Address::new(3, 0), config().with_slotting(true));
    a.init(noop).unwrap();

    clock.set_now(12_345);
    clock.0.offset.set(1_000);
    a.powercycle();

    // 16 slots of 13 ticks in a 220 tick period; slot 3 starts at 39.
    let (_, at) = *clock.0.armed.borrow().last().unwrap();
    assert_eq!(at.wrapping_sub(1).wrapping_add(1_000) % 220, 39);
}

#[test]
fn channel_check_interval_is_one_period() {
    let ether = Ether::default();
    let clock = Clock::default();
    let (a, _radio) = node(&ether, &clock, A, config());

    assert_eq!(a.channel_check_interval(), ON_TIME + OFF_TIME);
}
