//! When recent unicast receivers were last heard awake
//!
//! A receiver wakes once per period, so the tick of its last strobe-ACK
//! predicts the next wake-up. The sender holds its strobe train until just
//! before that and saves most of the train.

use crate::address::Address;
use crate::config::MAX_ENCOUNTERS;
use crate::time::Ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Encounter {
    neighbor: Address,
    time: Ticks,
}

/// Fixed table of the last strobe-ACK tick per neighbour.
#[derive(Debug, Default)]
pub struct Encounters {
    table: [Option<Encounter>; MAX_ENCOUNTERS],
}

impl Encounters {
    pub const fn new() -> Self {
        Self {
            table: [None; MAX_ENCOUNTERS],
        }
    }

    /// Renew the entry of `neighbor` or take a free one. When the table is
    /// full the encounter is dropped and `false` returned.
    pub fn register(&mut self, neighbor: Address, time: Ticks) -> bool {
        if let Some(e) = self
            .table
            .iter_mut()
            .flatten()
            .find(|e| e.neighbor == neighbor)
        {
            e.time = time;
            return true;
        }

        match self.table.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(Encounter { neighbor, time });
                true
            }
            None => false,
        }
    }

    pub fn last_seen(&self, neighbor: Address) -> Option<Ticks> {
        self.table
            .iter()
            .flatten()
            .find(|e| e.neighbor == neighbor)
            .map(|e| e.time)
    }
}

/// Ticks to wait at `now` so that strobing starts `lead` ticks before the
/// next wake-up of a neighbour seen awake at `seen`.
pub fn hold_off(seen: Ticks, now: Ticks, period: Ticks, lead: Ticks) -> Ticks {
    if period == 0 {
        return 0;
    }
    let since = now.wrapping_sub(seen) % period;
    ((period - since) % period).saturating_sub(lead)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_renews_then_drops_when_full() {
        let mut encounters = Encounters::new();
        assert!(encounters.register(Address::new(1, 0), 10));
        assert!(encounters.register(Address::new(1, 0), 30));
        assert_eq!(encounters.last_seen(Address::new(1, 0)), Some(30));

        for lo in 2..=MAX_ENCOUNTERS as u8 {
            assert!(encounters.register(Address::new(lo, 0), u32::from(lo)));
        }
        assert!(!encounters.register(Address::new(9, 0), 99));
        assert_eq!(encounters.last_seen(Address::new(9, 0)), None);
        assert_eq!(encounters.last_seen(Address::new(4, 0)), Some(4));
    }

    #[test]
    fn hold_off_targets_next_wake_up() {
        // period 220, strobing 40 ticks early
        assert_eq!(hold_off(1000, 1010, 220, 40), 170);
        assert_eq!(hold_off(1000, 1000 + 3 * 220 + 10, 220, 40), 170);
        // Too close to the wake-up to wait.
        assert_eq!(hold_off(1000, 1200, 220, 40), 0);
        assert_eq!(hold_off(1000, 1220, 220, 40), 0);
        assert_eq!(hold_off(u32::MAX - 5, 4, 220, 40), 170);
    }
}
