//! Shared helpers for the unit and scenario tests: a manually assembled
//! world with test-local routing plug-ins, plus events to drive the network
//! without the full harness.

use crate::config::SimConfig;
use crate::energy::LinearEnergy;
use crate::mac::MacKind;
use crate::mobility::{Pos, StaticMobility};
use crate::net::{
    Drone, MetricKind, MetricRecord, NodeId, Packet, UavNet, UavWorld,
};
use crate::phy::{Channel, Recipients, TxInfo};
use crate::routing::{NodeView, Routing};
use crate::sim::{Event, SimTime, Simulator, World};

/// Routing that always points straight at the packet's destination.
pub struct DirectRouting;

impl Routing for DirectRouting {
    fn next_hop(&mut self, pkt: &Packet, _now: SimTime, _view: &NodeView) -> Option<NodeId> {
        pkt.data().map(|h| h.dst)
    }
}

/// Routing that forwards along the node-id chain: n -> n + 1.
pub struct ChainRouting {
    pub me: NodeId,
}

impl Routing for ChainRouting {
    fn next_hop(&mut self, pkt: &Packet, _now: SimTime, _view: &NodeView) -> Option<NodeId> {
        let h = pkt.data()?;
        if h.dst == self.me {
            return Some(self.me);
        }
        Some(NodeId(self.me.0 + 1))
    }
}

/// Routing that knows nothing until `reveal_at`, then routes directly.
pub struct ScriptedRouting {
    pub reveal_at: SimTime,
}

impl Routing for ScriptedRouting {
    fn next_hop(&mut self, pkt: &Packet, now: SimTime, _view: &NodeView) -> Option<NodeId> {
        if now >= self.reveal_at {
            pkt.data().map(|h| h.dst)
        } else {
            None
        }
    }
}

pub fn make_drone(
    id: usize,
    pos: (f64, f64, f64),
    mac: MacKind,
    routing: Box<dyn Routing>,
    cfg: &SimConfig,
) -> Drone {
    Drone::new(
        NodeId(id),
        Pos::new(pos.0, pos.1, pos.2),
        mac,
        routing,
        Box::new(StaticMobility::new(Pos::new(pos.0, pos.1, pos.2))),
        Box::new(LinearEnergy::new(cfg.initial_energy_j, cfg.flight_power_w)),
        0xDEAD_0000 + id as u64,
    )
}

/// Static world with `DirectRouting` everywhere.
pub fn direct_world(
    positions: &[(f64, f64, f64)],
    mac: MacKind,
    channel: Box<dyn Channel>,
    cfg: SimConfig,
) -> UavWorld {
    let mut net = UavNet::new(cfg.clone(), channel);
    for (i, &pos) in positions.iter().enumerate() {
        net.add_drone(make_drone(i, pos, mac, Box::new(DirectRouting), &cfg));
    }
    UavWorld::new(net)
}

/// Event: enqueue a pre-built packet at a node, optionally registering it
/// with the metrics sink as application-generated.
pub struct EnqueuePacket {
    pub node: NodeId,
    pub pkt: Packet,
    pub register: bool,
}

impl Event for EnqueuePacket {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let EnqueuePacket {
            node,
            pkt,
            register,
        } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<UavWorld>()
            .expect("world must be UavWorld");
        if register {
            let flow = pkt.flow_id().unwrap_or(0);
            w.net.metrics.on_generated(pkt.id, flow, sim.now());
        }
        w.net.enqueue(sim, node, pkt);
    }
}

/// Event: put a transmission on the air directly, bypassing the sender's
/// MAC (used to stage busy mediums and hand-crafted receptions).
pub struct ManualTx {
    pub sender: NodeId,
    pub pkt: Packet,
    pub recipients: Recipients,
    pub air: SimTime,
    pub register: bool,
}

impl Event for ManualTx {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let ManualTx {
            sender,
            pkt,
            recipients,
            air,
            register,
        } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<UavWorld>()
            .expect("world must be UavWorld");
        let now = sim.now();
        if register {
            let flow = pkt.flow_id().unwrap_or(0);
            w.net.metrics.on_generated(pkt.id, flow, now);
        }
        let tx = TxInfo {
            pkt,
            sender,
            sender_pos: w.net.drone(sender).pos,
            power_w: w.net.cfg().transmit_power_w,
            start: now,
            end: now.saturating_add(air),
        };
        w.net.broadcast_put(sim, tx, recipients);
    }
}

pub fn records_of_kind(world: &UavWorld, kind: MetricKind) -> Vec<&MetricRecord> {
    world
        .net
        .metrics
        .records
        .iter()
        .filter(|r| r.kind == kind)
        .collect()
}

/// generated = delivered + dropped_ttl + dropped_mac + dropped_phy, and
/// every generated packet id has exactly one terminal record.
pub fn assert_conservation(world: &UavWorld) {
    let s = &world.net.metrics.stats;
    assert_eq!(
        s.generated_pkts,
        s.delivered_pkts + s.dropped_ttl + s.dropped_mac + s.dropped_phy,
        "packet conservation violated"
    );
    for gen in records_of_kind(world, MetricKind::Generated) {
        let terminals = world
            .net
            .metrics
            .records
            .iter()
            .filter(|r| {
                r.pkt_id == gen.pkt_id
                    && matches!(
                        r.kind,
                        MetricKind::Delivered
                            | MetricKind::DroppedTtl
                            | MetricKind::DroppedMac
                            | MetricKind::DroppedPhy
                    )
            })
            .count();
        assert_eq!(terminals, 1, "packet {} has {terminals} terminal records", gen.pkt_id);
    }
}
