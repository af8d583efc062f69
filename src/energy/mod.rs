//! Energy model plug-in.
//!
//! Transmissions debit `power × air-time`; flight debits accrue on the
//! position-update tick. A drained node goes send-mute but keeps receiving.

use crate::sim::SimTime;

pub trait EnergyModel: Send {
    fn debit_transmit(&mut self, bits: u64, power_w: f64, duration: SimTime);
    fn debit_flight(&mut self, dt: SimTime);
    fn remaining(&self) -> f64;
    fn consumed(&self) -> f64;
}

/// Linear battery: fixed flight power draw, transmit energy = P·t.
pub struct LinearEnergy {
    remaining_j: f64,
    consumed_j: f64,
    flight_power_w: f64,
}

impl LinearEnergy {
    pub fn new(initial_j: f64, flight_power_w: f64) -> Self {
        Self {
            remaining_j: initial_j,
            consumed_j: 0.0,
            flight_power_w,
        }
    }

    fn debit(&mut self, joules: f64) {
        let j = joules.min(self.remaining_j);
        self.remaining_j -= j;
        self.consumed_j += j;
    }
}

impl EnergyModel for LinearEnergy {
    fn debit_transmit(&mut self, _bits: u64, power_w: f64, duration: SimTime) {
        self.debit(power_w * duration.as_secs_f64());
    }

    fn debit_flight(&mut self, dt: SimTime) {
        self.debit(self.flight_power_w * dt.as_secs_f64());
    }

    fn remaining(&self) -> f64 {
        self.remaining_j
    }

    fn consumed(&self) -> f64 {
        self.consumed_j
    }
}
