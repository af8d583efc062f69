//! 接收方收件箱
//!
//! 每节点一份"在途传输记录"日志：信道在发送开始时写入，判决器
//! 读取并裁剪。记录在 end 之后仍保留至少 2 倍最大占空时间，
//! 保证重叠查询对迟到的判决仍然正确。

use super::channel::TxInfo;
use crate::mobility::Pos;
use crate::net::{NodeId, Packet};
use crate::sim::SimTime;

/// 在途传输记录（收件箱条目）。
#[derive(Debug, Clone)]
pub struct TransmissionRecord {
    pub pkt: Packet,
    pub sender: NodeId,
    pub power_w: f64,
    pub start: SimTime,
    pub end: SimTime,
    /// 发送开始时刻的发送方位置快照。
    pub sender_pos: Pos,
    /// 判决器是否已评估过该记录。
    pub resolved: bool,
}

impl TransmissionRecord {
    pub fn from_tx(tx: &TxInfo) -> Self {
        Self {
            pkt: tx.pkt.clone(),
            sender: tx.sender,
            power_w: tx.power_w,
            start: tx.start,
            end: tx.end,
            sender_pos: tx.sender_pos,
            resolved: false,
        }
    }

    /// 闭区间相交：共享至少一个瞬间即互为干扰。
    pub fn overlaps(&self, other: &TransmissionRecord) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

#[derive(Debug, Default)]
pub struct Inbox {
    records: Vec<TransmissionRecord>,
}

impl Inbox {
    pub fn push(&mut self, rec: TransmissionRecord) {
        self.records.push(rec);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 载波侦听：当前时刻存在 start ≤ now < end 的记录即为忙。
    pub fn busy_at(&self, now: SimTime) -> bool {
        self.records
            .iter()
            .any(|r| r.start <= now && now < r.end)
    }

    /// 当前覆盖 now 的记录中最晚的结束时刻（介质转为空闲的最早时间）。
    pub fn busy_until(&self, now: SimTime) -> Option<SimTime> {
        self.records
            .iter()
            .filter(|r| r.start <= now && now < r.end)
            .map(|r| r.end)
            .max()
    }

    /// 裁剪 end 早于 now − horizon 的记录。
    pub fn prune(&mut self, now: SimTime, horizon: SimTime) {
        self.records
            .retain(|r| r.end.saturating_add(horizon) >= now);
    }

    /// 新完成（end ≤ now）且尚未评估的记录下标。
    pub fn completed_unresolved(&self, now: SimTime) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.resolved && r.end <= now)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn record(&self, idx: usize) -> &TransmissionRecord {
        &self.records[idx]
    }

    pub fn mark_resolved(&mut self, idx: usize) {
        self.records[idx].resolved = true;
    }

    /// 与下标 `idx` 记录空中时间相交的其他记录（含尚未完成的）。
    pub fn overlapping(&self, idx: usize) -> Vec<usize> {
        let target = &self.records[idx];
        self.records
            .iter()
            .enumerate()
            .filter(|(i, r)| *i != idx && r.overlaps(target))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn records(&self) -> &[TransmissionRecord] {
        &self.records
    }
}
