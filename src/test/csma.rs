use crate::config::SimConfig;
use crate::mac::MacKind;
use crate::net::{InjectData, MetricExtra, MetricKind, NodeId, Packet};
use crate::phy::{LosChannel, ProbChannel, RangeChannel, Recipients};
use crate::sim::{SimTime, Simulator};
use crate::test::util::{assert_conservation, direct_world, records_of_kind, ManualTx};

#[test]
fn single_packet_round_trip_over_los() {
    let cfg = SimConfig::default();
    let mut world = direct_world(
        &[(0.0, 0.0, 10.0), (100.0, 0.0, 10.0)],
        MacKind::CsmaCa,
        Box::new(LosChannel),
        cfg.clone(),
    );
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
    sim.run(&mut world);

    let s = &world.net.metrics.stats;
    assert_eq!(s.generated_pkts, 1);
    assert_eq!(s.delivered_pkts, 1);
    assert_eq!(s.acks_sent, 1);
    assert_eq!(s.acks_received, 1, "sender observes the ACK exactly once");
    assert_eq!(s.dropped_mac + s.dropped_ttl + s.dropped_phy, 0);
    assert_eq!(s.collisions, 0);

    // Delivery instant = DIFS + backoff + air-time, with backoff a whole
    // number of slots inside the initial contention window.
    let delivered = records_of_kind(&world, MetricKind::Delivered);
    assert_eq!(delivered.len(), 1);
    let t_d = delivered[0].at;
    let air = cfg.air_time(1000);
    let base = cfg.difs.saturating_add(air);
    let backoff = t_d.saturating_sub(base);
    assert!(t_d >= base);
    assert_eq!(backoff.0 % cfg.slot_time.0, 0);
    assert!((backoff.0 / cfg.slot_time.0) < cfg.cw_min as u64);

    match &delivered[0].extra {
        MetricExtra::Delivery { e2e, hops } => {
            assert_eq!(*e2e, t_d);
            assert_eq!(*hops, 1);
        }
        other => panic!("unexpected delivery extra: {other:?}"),
    }

    // The sender sees the ACK one SIFS plus ACK air-time after delivery.
    let ack_at = s.last_ack_at.expect("ack observed");
    assert_eq!(
        ack_at,
        t_d.saturating_add(cfg.sifs).saturating_add(cfg.ack_air_time())
    );

    assert_conservation(&world);
}

#[test]
fn countdown_freezes_and_resumes_with_remainder() {
    let cfg = SimConfig::default();
    let mut world = direct_world(
        &[(0.0, 0.0, 10.0), (100.0, 0.0, 10.0)],
        MacKind::CsmaCa,
        Box::new(LosChannel),
        cfg.clone(),
    );
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
    // A foreign transmission lands mid-countdown (DIFS is 34us, so at 10us
    // node 0 is always still counting down) and occupies the air.
    let t_block = SimTime::from_micros(10);
    let blocker_air = cfg.air_time(1000);
    sim.schedule(
        t_block,
        ManualTx {
            sender: NodeId(1),
            pkt: Packet::new_hello(999, NodeId(1), 1000, t_block),
            recipients: Recipients::One(NodeId(0)),
            air: blocker_air,
            register: false,
        },
    );
    sim.run(&mut world);

    let delivered = records_of_kind(&world, MetricKind::Delivered);
    assert_eq!(delivered.len(), 1);
    let t_d = delivered[0].at;
    let air = cfg.air_time(1000);
    let busy_end = t_block.saturating_add(blocker_air);

    // Never on air while the medium was busy.
    assert!(t_d.saturating_sub(air) >= busy_end);

    // t_d = busy_end + remainder + air with
    // remainder = (DIFS - 10us) + b*slot for the originally drawn b.
    let remainder = t_d.saturating_sub(busy_end).saturating_sub(air);
    let b_part = remainder.saturating_sub(cfg.difs.saturating_sub(t_block));
    assert_eq!(
        b_part.0 % cfg.slot_time.0,
        0,
        "resumed countdown must equal the frozen remainder (no redraw)"
    );
    assert!((b_part.0 / cfg.slot_time.0) < cfg.cw_min as u64);

    assert_conservation(&world);
}

#[test]
fn out_of_range_exhausts_retries_and_drops_at_mac() {
    let cfg = SimConfig::default();
    let channel = RangeChannel::new(1e-12, false, cfg.clone());
    let mut world = direct_world(
        &[(0.0, 0.0, 10.0), (5000.0, 0.0, 10.0)],
        MacKind::CsmaCa,
        Box::new(channel),
        cfg.clone(),
    );
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
    sim.run(&mut world);

    let s = &world.net.metrics.stats;
    assert_eq!(s.delivered_pkts, 0);
    assert_eq!(s.dropped_mac, 1);
    // Initial transmission plus max_retries, all suppressed by the channel.
    assert_eq!(s.phy_rejects, (cfg.max_retries + 1) as u64);
    assert!(world.net.drone(NodeId(1)).inbox.is_empty());

    let drops = records_of_kind(&world, MetricKind::DroppedMac);
    assert_eq!(drops.len(), 1);
    assert_eq!(drops[0].extra, MetricExtra::Reason("retry_cap"));
    assert_conservation(&world);
}

#[test]
fn full_loss_probability_never_inserts_records() {
    let cfg = SimConfig::default();
    let channel = ProbChannel::new(1.0, 7);
    let mut world = direct_world(
        &[(0.0, 0.0, 10.0), (100.0, 0.0, 10.0)],
        MacKind::CsmaCa,
        Box::new(channel),
        cfg.clone(),
    );
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
    sim.run(&mut world);

    let s = &world.net.metrics.stats;
    assert_eq!(s.delivered_pkts, 0);
    assert_eq!(s.dropped_mac, 1);
    assert_eq!(s.phy_rejects, (cfg.max_retries + 1) as u64);
    assert!(world.net.drone(NodeId(1)).inbox.is_empty());
    assert_conservation(&world);
}

#[test]
fn drained_battery_makes_the_node_send_mute() {
    let mut cfg = SimConfig::default();
    cfg.initial_energy_j = 0.0;
    let mut world = direct_world(
        &[(0.0, 0.0, 10.0), (100.0, 0.0, 10.0)],
        MacKind::CsmaCa,
        Box::new(LosChannel),
        cfg.clone(),
    );
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
    sim.run(&mut world);

    let s = &world.net.metrics.stats;
    assert_eq!(s.delivered_pkts, 0);
    assert_eq!(s.dropped_mac, 1);
    assert_eq!(s.acks_sent, 0);
    assert_eq!(s.phy_rejects, 0, "a mute node never reaches the channel");

    let drops = records_of_kind(&world, MetricKind::DroppedMac);
    assert_eq!(drops[0].extra, MetricExtra::Reason("energy"));
    assert_conservation(&world);
}
