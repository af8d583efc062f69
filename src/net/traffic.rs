//! Application-layer traffic generation.
//!
//! Each session emits a fixed number of data packets from `src` to `dst`
//! with fixed, uniform, or Poisson (exponential gap) inter-arrival times,
//! drawn from the session's own seeded stream. Arrival events re-schedule
//! themselves until the session has emitted its last packet.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};

use super::id::NodeId;
use super::world::UavWorld;
use crate::sim::{Event, SimTime, Simulator, World};

#[derive(Debug, Clone)]
pub enum InterArrival {
    Fixed(SimTime),
    Uniform { lo: SimTime, hi: SimTime },
    Poisson { mean: SimTime },
}

pub struct TrafficSession {
    pub flow_id: u64,
    pub src: NodeId,
    pub dst: NodeId,
    pub size_bits: u64,
    pub remaining: u32,
    pub iat: InterArrival,
    pub(crate) next_seq: u64,
    rng: StdRng,
}

impl TrafficSession {
    pub fn new(
        flow_id: u64,
        src: NodeId,
        dst: NodeId,
        size_bits: u64,
        packets: u32,
        iat: InterArrival,
        seed: u64,
    ) -> Self {
        Self {
            flow_id,
            src,
            dst,
            size_bits,
            remaining: packets,
            iat,
            next_seq: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub(crate) fn sample_gap(&mut self) -> SimTime {
        match &self.iat {
            InterArrival::Fixed(gap) => *gap,
            InterArrival::Uniform { lo, hi } => {
                if hi.0 <= lo.0 {
                    return *lo;
                }
                SimTime(self.rng.gen_range(lo.0..=hi.0))
            }
            InterArrival::Poisson { mean } => {
                let mean_ns = (mean.0 as f64).max(1.0);
                let exp = Exp::new(1.0 / mean_ns).expect("exp rate");
                SimTime(exp.sample(&mut self.rng).round() as u64)
            }
        }
    }
}

/// 事件：某会话的下一次到达。
#[derive(Debug)]
pub struct TrafficArrival {
    pub session: usize,
}

impl Event for TrafficArrival {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let TrafficArrival { session } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<UavWorld>()
            .expect("world must be UavWorld");
        w.net.traffic_arrival(sim, session);
    }
}
