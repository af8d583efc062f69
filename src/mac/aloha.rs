//! 纯 ALOHA
//!
//! 不侦听、不退避：拿到作业立即发送。ACK 超时后在随机区间
//! [0, k·attempts·slot) 内等待再重发，区间随尝试次数线性增长；
//! 重传上限与 CSMA/CA 相同。

use tracing::{debug, trace};

use super::{MacOutcome, MacPhase, MacTimer};
use crate::net::{NodeId, UavNet};
use crate::sim::Simulator;

/// 缓冲槽刚授予一个作业：立即发送。
pub(crate) fn start(net: &mut UavNet, sim: &mut Simulator, node: NodeId) {
    let d = net.drone_mut(node);
    d.mac.attempts = 0;
    transmit(net, sim, node);
}

/// 定时器到期（令牌已由网络层校验）。
pub(crate) fn on_timer(net: &mut UavNet, sim: &mut Simulator, node: NodeId) {
    let phase = net.drone(node).mac.phase;
    match phase {
        MacPhase::AlohaWait { .. } => transmit(net, sim, node),
        MacPhase::Tx { .. } => net.mac_finish(sim, node, MacOutcome::Success),
        MacPhase::AwaitAck { pkt_id, .. } => on_ack_timeout(net, sim, node, pkt_id),
        MacPhase::Idle | MacPhase::Sensing | MacPhase::Waiting { .. } => {}
    }
}

fn transmit(net: &mut UavNet, sim: &mut Simulator, node: NodeId) {
    if net.drone(node).send_mute() {
        net.mac_finish(sim, node, MacOutcome::Failure("energy"));
        return;
    }
    let air = net.begin_airtime(sim, node);
    if air.awaits_ack {
        let deadline = air.end.saturating_add(net.cfg().ack_timeout());
        let d = net.drone_mut(node);
        d.mac.phase = MacPhase::AwaitAck {
            pkt_id: air.pkt_id,
            deadline,
        };
        let token = d.mac.bump();
        sim.schedule(deadline, MacTimer { node, token });
    } else {
        let d = net.drone_mut(node);
        d.mac.phase = MacPhase::Tx { ends: air.end };
        let token = d.mac.bump();
        sim.schedule(air.end, MacTimer { node, token });
    }
}

/// ACK 超时：随机等待后重发，或达到上限后终局失败。
fn on_ack_timeout(net: &mut UavNet, sim: &mut Simulator, node: NodeId, pkt_id: u64) {
    let now = sim.now();
    let (max_retries, k, slot) = {
        let cfg = net.cfg();
        (cfg.max_retries, cfg.aloha_retry_slots, cfg.slot_time)
    };
    let d = net.drone_mut(node);
    d.routing.on_ack_timeout(pkt_id, now);
    d.mac.attempts += 1;
    if let Some(job) = d.buffer.holder_mut() {
        job.pkt.retries += 1;
    }
    let attempts = d.mac.attempts;
    debug!(node = node.0, pkt_id, attempts, "ACK 超时");

    if attempts > max_retries {
        net.mac_finish(sim, node, MacOutcome::Failure("retry_cap"));
        return;
    }

    // 窗口随尝试次数线性增长的随机回退。
    let span_slots = k.saturating_mul(attempts as u64);
    let d = net.drone_mut(node);
    let wait_slots = d.mac_rng_range_u64(span_slots.max(1));
    let wait = slot.saturating_mul(wait_slots);
    let expires = now.saturating_add(wait);
    d.mac.phase = MacPhase::AlohaWait { expires };
    let token = d.mac.bump();
    trace!(node = node.0, wait = ?wait, "ALOHA 随机重试等待");
    sim.schedule(expires, MacTimer { node, token });
}

/// 判决器送达了一个 ACK。
pub(crate) fn on_ack(net: &mut UavNet, sim: &mut Simulator, node: NodeId, acked: u64) {
    let now = sim.now();
    let d = net.drone_mut(node);
    let MacPhase::AwaitAck { pkt_id, .. } = d.mac.phase else {
        return;
    };
    if pkt_id != acked {
        return;
    }
    d.routing.on_ack(acked, now);
    net.note_ack_received(now);
    net.mac_finish(sim, node, MacOutcome::Success);
}

/// ALOHA 不做载波侦听：介质转忙不影响状态机。
pub(crate) fn on_medium_busy(_net: &mut UavNet, _sim: &mut Simulator, _node: NodeId) {}
