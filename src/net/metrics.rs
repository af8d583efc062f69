//! 统计信息
//!
//! 度量汇是追加式的记录流（应用层包的生命周期事件）加聚合计数。
//! 同一包 id 只允许一条终局记录：先到的生效，后到的忽略，
//! 保证"生成 = 送达 + 各类丢弃"的守恒不被 ARQ 歧义破坏。

use std::collections::HashMap;

use serde::Serialize;

use super::id::NodeId;
use crate::sim::SimTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Generated,
    Delivered,
    DroppedTtl,
    DroppedMac,
    DroppedPhy,
    Hop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricExtra {
    None,
    Delivery { e2e: SimTime, hops: u32 },
    Hop { from: NodeId, to: NodeId },
    Reason(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub kind: MetricKind,
    pub pkt_id: u64,
    pub flow_id: Option<u64>,
    pub at: SimTime,
    pub extra: MetricExtra,
}

/// 聚合计数（含不进记录流的诊断量：碰撞、信道抑制、ACK 收发）。
#[derive(Debug, Default)]
pub struct Stats {
    pub generated_pkts: u64,
    pub delivered_pkts: u64,
    pub delivered_bits: u64,
    pub dropped_ttl: u64,
    pub dropped_mac: u64,
    pub dropped_phy: u64,
    pub hops: u64,
    pub collisions: u64,
    pub phy_rejects: u64,
    pub acks_sent: u64,
    pub acks_received: u64,
    pub last_ack_at: Option<SimTime>,
    pub total_delay: SimTime,
    pub total_hops_delivered: u64,
}

#[derive(Debug, Default)]
pub struct MetricsSink {
    pub records: Vec<MetricRecord>,
    pub stats: Stats,
    /// 尚无终局的应用层包：id -> (flow, 创建时间)。
    open: HashMap<u64, (u64, SimTime)>,
}

impl MetricsSink {
    pub fn on_generated(&mut self, pkt_id: u64, flow_id: u64, now: SimTime) {
        self.stats.generated_pkts += 1;
        self.open.insert(pkt_id, (flow_id, now));
        self.records.push(MetricRecord {
            kind: MetricKind::Generated,
            pkt_id,
            flow_id: Some(flow_id),
            at: now,
            extra: MetricExtra::None,
        });
    }

    pub fn on_hop(&mut self, pkt_id: u64, flow_id: u64, from: NodeId, to: NodeId, now: SimTime) {
        self.stats.hops += 1;
        self.records.push(MetricRecord {
            kind: MetricKind::Hop,
            pkt_id,
            flow_id: Some(flow_id),
            at: now,
            extra: MetricExtra::Hop { from, to },
        });
    }

    pub fn on_delivered(
        &mut self,
        pkt_id: u64,
        flow_id: u64,
        created_at: SimTime,
        hops: u32,
        size_bits: u64,
        now: SimTime,
    ) {
        if self.open.remove(&pkt_id).is_none() {
            return;
        }
        let e2e = now.saturating_sub(created_at);
        self.stats.delivered_pkts += 1;
        self.stats.delivered_bits += size_bits;
        self.stats.total_delay = self.stats.total_delay.saturating_add(e2e);
        self.stats.total_hops_delivered += hops as u64;
        self.records.push(MetricRecord {
            kind: MetricKind::Delivered,
            pkt_id,
            flow_id: Some(flow_id),
            at: now,
            extra: MetricExtra::Delivery { e2e, hops },
        });
    }

    pub fn on_dropped(
        &mut self,
        kind: MetricKind,
        pkt_id: u64,
        reason: &'static str,
        now: SimTime,
    ) {
        let Some((flow_id, _)) = self.open.remove(&pkt_id) else {
            return;
        };
        match kind {
            MetricKind::DroppedTtl => self.stats.dropped_ttl += 1,
            MetricKind::DroppedMac => self.stats.dropped_mac += 1,
            MetricKind::DroppedPhy => self.stats.dropped_phy += 1,
            _ => unreachable!("on_dropped called with non-drop kind"),
        }
        self.records.push(MetricRecord {
            kind,
            pkt_id,
            flow_id: Some(flow_id),
            at: now,
            extra: MetricExtra::Reason(reason),
        });
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// 仿真结束：仍在途/在管线中的包计为 in-air 丢弃。
    pub fn finalize(&mut self, now: SimTime) {
        let mut pending: Vec<u64> = self.open.keys().copied().collect();
        pending.sort_unstable();
        for id in pending {
            self.on_dropped(MetricKind::DroppedPhy, id, "in_flight", now);
        }
    }

    pub fn summary(&self, elapsed: SimTime, energy_consumed_j: f64) -> Summary {
        let s = &self.stats;
        let pdr = if s.generated_pkts > 0 {
            s.delivered_pkts as f64 / s.generated_pkts as f64
        } else {
            0.0
        };
        let avg_delay_us = if s.delivered_pkts > 0 {
            s.total_delay.0 as f64 / 1e3 / s.delivered_pkts as f64
        } else {
            0.0
        };
        let avg_hops = if s.delivered_pkts > 0 {
            s.total_hops_delivered as f64 / s.delivered_pkts as f64
        } else {
            0.0
        };
        let secs = elapsed.as_secs_f64();
        let throughput_bps = if secs > 0.0 {
            s.delivered_bits as f64 / secs
        } else {
            0.0
        };
        Summary {
            generated: s.generated_pkts,
            delivered: s.delivered_pkts,
            dropped_ttl: s.dropped_ttl,
            dropped_mac: s.dropped_mac,
            dropped_phy: s.dropped_phy,
            collisions: s.collisions,
            pdr,
            avg_delay_us,
            avg_hops,
            throughput_bps,
            energy_consumed_j,
        }
    }
}

/// 面向 CLI 输出的汇总指标。
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub generated: u64,
    pub delivered: u64,
    pub dropped_ttl: u64,
    pub dropped_mac: u64,
    pub dropped_phy: u64,
    pub collisions: u64,
    pub pdr: f64,
    pub avg_delay_us: f64,
    pub avg_hops: f64,
    pub throughput_bps: f64,
    pub energy_consumed_j: f64,
}
