//! CSMA/CA（无 RTS/CTS）
//!
//! 相位推进：IDLE → SENSING → WAITING(DIFS+退避) → TX → AWAIT_ACK
//! → DONE|RETRY。载波侦听以本节点收件箱为准：存在 start ≤ now < end
//! 的记录即为忙。倒计时期间介质转忙则冻结余量，重新等空闲后续接
//! 余量，不重抽退避。数据单播等待 ACK；控制/广播发完即成功。

use tracing::{debug, trace};

use super::{MacOutcome, MacPhase, MacTimer};
use crate::net::{NodeId, UavNet};
use crate::sim::Simulator;

/// 缓冲槽刚授予一个作业：从头开始竞争。
pub(crate) fn start(net: &mut UavNet, sim: &mut Simulator, node: NodeId) {
    let d = net.drone_mut(node);
    d.mac.attempts = 0;
    d.mac.backoff_left = None;
    sense(net, sim, node);
}

/// 进入侦听：介质空闲则开始倒计时，否则在忙结束时刻再醒来。
fn sense(net: &mut UavNet, sim: &mut Simulator, node: NodeId) {
    let now = sim.now();
    if net.drone(node).send_mute() {
        net.mac_finish(sim, node, MacOutcome::Failure("energy"));
        return;
    }

    match net.drone(node).inbox.busy_until(now) {
        None => begin_countdown(net, sim, node),
        Some(until) => {
            let d = net.drone_mut(node);
            d.mac.phase = MacPhase::Sensing;
            let token = d.mac.bump();
            trace!(node = node.0, until = ?until, "介质忙，挂起侦听");
            sim.schedule(until, MacTimer { node, token });
        }
    }
}

/// 开始（或续接）DIFS + 退避倒计时。
fn begin_countdown(net: &mut UavNet, sim: &mut Simulator, node: NodeId) {
    let now = sim.now();
    let (difs, slot) = {
        let cfg = net.cfg();
        (cfg.difs, cfg.slot_time)
    };
    let cw = net.cfg().contention_window(net.drone(node).mac.attempts);

    let d = net.drone_mut(node);
    let wait = match d.mac.backoff_left {
        // 冻结余量：续接，不重抽。
        Some(rem) => rem,
        None => {
            let b = d.mac_rng_range(cw) as u64;
            trace!(node = node.0, backoff_slots = b, cw, "抽取退避");
            difs.saturating_add(slot.saturating_mul(b))
        }
    };
    d.mac.backoff_left = Some(wait);
    let expires = now.saturating_add(wait);
    d.mac.phase = MacPhase::Waiting { expires };
    let token = d.mac.bump();
    sim.schedule(expires, MacTimer { node, token });
}

/// 倒计时期间介质转忙：冻结余量，回到侦听。
pub(crate) fn on_medium_busy(net: &mut UavNet, sim: &mut Simulator, node: NodeId) {
    let now = sim.now();
    let d = net.drone_mut(node);
    match d.mac.phase {
        MacPhase::Sensing => {
            // 新记录可能延长忙区间：按最新的忙结束时刻重新挂起。
            if let Some(until) = d.inbox.busy_until(now) {
                let token = d.mac.bump();
                sim.schedule(until, MacTimer { node, token });
            }
        }
        MacPhase::Waiting { expires } => {
            let rem = expires.saturating_sub(now);
            d.mac.backoff_left = Some(rem);
            d.mac.bump();
            debug!(node = node.0, remainder = ?rem, "倒计时冻结");
            sense(net, sim, node);
        }
        _ => {}
    }
}

/// 定时器到期（令牌已由网络层校验）。
pub(crate) fn on_timer(net: &mut UavNet, sim: &mut Simulator, node: NodeId) {
    let phase = net.drone(node).mac.phase;
    match phase {
        MacPhase::Sensing => sense(net, sim, node),
        MacPhase::Waiting { .. } => {
            net.drone_mut(node).mac.backoff_left = None;
            transmit(net, sim, node);
        }
        MacPhase::Tx { .. } => {
            // 控制/广播发完即成功。
            net.mac_finish(sim, node, MacOutcome::Success);
        }
        MacPhase::AwaitAck { pkt_id, .. } => on_ack_timeout(net, sim, node, pkt_id),
        MacPhase::Idle | MacPhase::AlohaWait { .. } => {}
    }
}

/// 占用空口发送当前作业。
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

/// ACK 超时：反馈路由，重传或终局失败。
fn on_ack_timeout(net: &mut UavNet, sim: &mut Simulator, node: NodeId, pkt_id: u64) {
    let now = sim.now();
    let max_retries = net.cfg().max_retries;
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
    } else {
        let d = net.drone_mut(node);
        d.mac.backoff_left = None; // 重传重抽退避，CW 随 attempts 翻倍
        sense(net, sim, node);
    }
}

/// 判决器送达了一个 ACK。
pub(crate) fn on_ack(net: &mut UavNet, sim: &mut Simulator, node: NodeId, acked: u64) {
    let now = sim.now();
    let d = net.drone_mut(node);
    let MacPhase::AwaitAck { pkt_id, .. } = d.mac.phase else {
        return; // 迟到的重复 ACK
    };
    if pkt_id != acked {
        return;
    }
    d.routing.on_ack(acked, now);
    net.note_ack_received(now);
    net.mac_finish(sim, node, MacOutcome::Success);
}
