use crate::config::{
    ChannelSpec, IntervalSpec, MacSpec, ScenarioSpec, SessionSpec, SimConfig, DroneSpec,
    SCHEMA_VERSION,
};
use crate::mac::MacKind;
use crate::net::{
    InjectData, MetricExtra, MetricKind, NodeId, Packet, RoutingChanged, TxMode, UavNet, UavWorld,
};
use crate::phy::{LosChannel, Recipients};
use crate::scenario;
use crate::sim::{SimTime, Simulator};
use crate::test::util::{
    assert_conservation, direct_world, make_drone, records_of_kind, ChainRouting, DirectRouting,
    EnqueuePacket, ManualTx, ScriptedRouting,
};

#[test]
fn unrouteable_packet_parks_then_migrates_on_routing_change() {
    let cfg = SimConfig::default();
    let reveal_at = SimTime::from_millis(50);
    let mut net = UavNet::new(cfg.clone(), Box::new(LosChannel));
    net.add_drone(make_drone(
        0,
        (0.0, 0.0, 10.0),
        MacKind::CsmaCa,
        Box::new(ScriptedRouting { reveal_at }),
        &cfg,
    ));
    net.add_drone(make_drone(
        1,
        (100.0, 0.0, 10.0),
        MacKind::CsmaCa,
        Box::new(DirectRouting),
        &cfg,
    ));
    let mut world = UavWorld::new(net);

    let mut sim = Simulator::default();
    sim.schedule(
        SimTime::ZERO,
        InjectData {
            src: NodeId(0),
            dst: NodeId(1),
            flow_id: 1,
            seq: 0,
            size_bits: 1000,
        },
    );
    // Routing publishes the route at t = 50ms.
    sim.schedule(reveal_at, RoutingChanged { node: NodeId(0) });

    sim.run_until(SimTime::from_millis(49), &mut world);
    assert_eq!(world.net.drone(NodeId(0)).waiting.len(), 1);
    assert!(world.net.drone(NodeId(0)).queue.is_empty());
    assert_eq!(world.net.metrics.stats.delivered_pkts, 0);

    sim.run(&mut world);
    let s = &world.net.metrics.stats;
    assert_eq!(s.delivered_pkts, 1);
    assert_eq!(s.dropped_mac + s.dropped_ttl + s.dropped_phy, 0);
    assert!(world.net.drone(NodeId(0)).waiting.is_empty());

    // Delivery happens a normal pipeline delay after the notification.
    let cfg = world.net.cfg();
    let t_d = records_of_kind(&world, MetricKind::Delivered)[0].at;
    let base = reveal_at
        .saturating_add(cfg.difs)
        .saturating_add(cfg.air_time(1000));
    let backoff = t_d.saturating_sub(base);
    assert!(t_d >= base);
    assert_eq!(backoff.0 % cfg.slot_time.0, 0);
    assert!((backoff.0 / cfg.slot_time.0) < cfg.cw_min as u64);
    assert_conservation(&world);
}

#[test]
fn multi_hop_chain_forwards_and_counts_hops() {
    let spec = ScenarioSpec {
        schema_version: SCHEMA_VERSION,
        seed: Some(7),
        duration_ms: 200,
        channel: ChannelSpec::Range {
            prob_los: false,
            sensitivity_w: None,
        },
        mac: MacSpec::CsmaCa,
        profile: None,
        mcs_index: None,
        hello_interval_ms: None,
        ttl: None,
        drones: vec![
            DroneSpec {
                id: 0,
                pos: [0.0, 0.0, 10.0],
                vel: None,
            },
            DroneSpec {
                id: 1,
                pos: [2000.0, 0.0, 10.0],
                vel: None,
            },
            DroneSpec {
                id: 2,
                pos: [4000.0, 0.0, 10.0],
                vel: None,
            },
        ],
        sessions: vec![SessionSpec {
            src: 0,
            dst: 2,
            packets: 1,
            size_bits: Some(1000),
            interval: IntervalSpec::Fixed { gap_us: 1000 },
            start_us: None,
        }],
    };

    let (mut sim, mut world, until) = scenario::build(&spec, None, None).expect("build");
    let summary = scenario::run(&mut sim, &mut world, until);

    // 0 and 2 are out of direct range; the shortest-path table relays via 1.
    assert_eq!(summary.delivered, 1);
    assert_eq!(summary.dropped_mac + summary.dropped_ttl + summary.dropped_phy, 0);
    assert_eq!(records_of_kind(&world, MetricKind::Hop).len(), 1);
    assert!((summary.avg_hops - 2.0).abs() < 1e-9);
    assert!(summary.energy_consumed_j > 0.0);
    assert_conservation(&world);
}

#[test]
fn ttl_expiry_drops_at_the_forwarding_node() {
    let mut cfg = SimConfig::default();
    cfg.ttl = 1;
    let mut net = UavNet::new(cfg.clone(), Box::new(LosChannel));
    for (i, pos) in [(0usize, 0.0), (1, 100.0), (2, 200.0)] {
        net.add_drone(make_drone(
            i,
            (pos, 0.0, 10.0),
            MacKind::CsmaCa,
            Box::new(ChainRouting { me: NodeId(i) }),
            &cfg,
        ));
    }
    let mut world = UavWorld::new(net);

    let mut sim = Simulator::default();
    sim.schedule(
        SimTime::ZERO,
        InjectData {
            src: NodeId(0),
            dst: NodeId(2),
            flow_id: 1,
            seq: 0,
            size_bits: 1000,
        },
    );
    sim.run(&mut world);

    let s = &world.net.metrics.stats;
    assert_eq!(s.delivered_pkts, 0);
    assert_eq!(s.dropped_ttl, 1);
    assert!(records_of_kind(&world, MetricKind::Hop).is_empty());
    let drops = records_of_kind(&world, MetricKind::DroppedTtl);
    assert_eq!(drops[0].extra, MetricExtra::Reason("ttl"));
    assert_conservation(&world);
}

#[test]
fn duplicate_data_is_reacked_but_delivered_once() {
    let cfg = SimConfig::default();
    let mut world = direct_world(
        &[(0.0, 0.0, 10.0), (100.0, 0.0, 10.0)],
        MacKind::CsmaCa,
        Box::new(LosChannel),
        cfg.clone(),
    );
    let mut sim = Simulator::default();

    let air = cfg.air_time(1000);
    let pkt = Packet::new_data(77, NodeId(0), NodeId(1), 1, 0, 1000, 15, SimTime::ZERO);
    sim.schedule(
        SimTime::ZERO,
        ManualTx {
            sender: NodeId(0),
            pkt: pkt.clone(),
            recipients: Recipients::One(NodeId(1)),
            air,
            register: true,
        },
    );
    // The same frame again, as after a lost ACK and a sender retry.
    sim.schedule(
        SimTime::from_millis(1),
        ManualTx {
            sender: NodeId(0),
            pkt,
            recipients: Recipients::One(NodeId(1)),
            air,
            register: false,
        },
    );
    sim.run(&mut world);

    let s = &world.net.metrics.stats;
    assert_eq!(s.delivered_pkts, 1, "duplicate must not deliver twice");
    assert_eq!(s.acks_sent, 2, "duplicate still triggers an ACK");
    assert_eq!(records_of_kind(&world, MetricKind::Delivered).len(), 1);
    assert_conservation(&world);
}

#[test]
fn multicast_reaches_exactly_the_listed_group() {
    let cfg = SimConfig::default();
    let mut world = direct_world(
        &[
            (0.0, 0.0, 10.0),
            (100.0, 0.0, 10.0),
            (200.0, 0.0, 10.0),
            (300.0, 0.0, 10.0),
        ],
        MacKind::Aloha,
        Box::new(LosChannel),
        cfg.clone(),
    );
    let mut sim = Simulator::default();

    let mut pkt = Packet::new_data(42, NodeId(0), NodeId(1), 1, 0, 1000, 15, SimTime::ZERO);
    pkt.mode = TxMode::Multicast(vec![NodeId(1), NodeId(2)]);
    sim.schedule(
        SimTime::ZERO,
        EnqueuePacket {
            node: NodeId(0),
            pkt,
            register: true,
        },
    );
    sim.run(&mut world);

    let s = &world.net.metrics.stats;
    assert_eq!(s.delivered_pkts, 1, "only the addressed destination delivers");
    assert_eq!(s.acks_sent, 0, "multicast data is not acknowledged");
    assert_eq!(s.hops, 0, "non-destination group members do not forward");
    assert_eq!(world.net.drone(NodeId(1)).inbox.len(), 1);
    assert_eq!(world.net.drone(NodeId(2)).inbox.len(), 1);
    assert!(world.net.drone(NodeId(3)).inbox.is_empty(), "node outside the group hears nothing");
    assert_conservation(&world);
}

#[test]
fn overlapping_broadcasts_corrupt_per_receiver_independently() {
    let cfg = SimConfig::default();
    // C sits between A and B (equal-ish powers -> both corrupted there);
    // D sits next to B (B's frame survives, A's is drowned out).
    let mut world = direct_world(
        &[
            (0.0, 0.0, 10.0),   // A
            (300.0, 0.0, 10.0), // B
            (100.0, 0.0, 10.0), // C
            (290.0, 0.0, 10.0), // D
        ],
        MacKind::Aloha,
        Box::new(LosChannel),
        cfg.clone(),
    );
    let mut sim = Simulator::default();

    let mut pkt_a = Packet::new_data(500, NodeId(0), NodeId(2), 1, 0, 1000, 15, SimTime::ZERO);
    pkt_a.mode = TxMode::Broadcast;
    let mut pkt_b = Packet::new_data(501, NodeId(1), NodeId(3), 2, 0, 1000, 15, SimTime::ZERO);
    pkt_b.mode = TxMode::Broadcast;

    sim.schedule(
        SimTime::ZERO,
        EnqueuePacket {
            node: NodeId(0),
            pkt: pkt_a,
            register: true,
        },
    );
    sim.schedule(
        SimTime::ZERO,
        EnqueuePacket {
            node: NodeId(1),
            pkt: pkt_b,
            register: true,
        },
    );
    sim.run(&mut world);
    let now = sim.now();
    world.net.finalize(now);

    let s = &world.net.metrics.stats;
    // Corrupted: both frames at C, A's frame at D. Clean: B's frame at D,
    // plus each sender hearing the other unopposed.
    assert_eq!(s.collisions, 3);
    assert_eq!(s.delivered_pkts, 1, "B's frame reaches D despite C's collision");
    assert_eq!(s.acks_sent, 0, "broadcast data is not acknowledged");
    assert_eq!(s.dropped_phy, 1, "A's frame never terminates and is closed in-air");
    assert_conservation(&world);
}
