//! 数据包类型
//!
//! 定义数据/控制/ACK 三类包及其公共属性（标识、TTL、重传计数、
//! 发送模式、创建时间等）。包在节点间克隆传递；重传共享同一 id。

use super::id::NodeId;
use crate::sim::SimTime;

/// 发送模式。多播携带目的集合。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxMode {
    Unicast,
    Multicast(Vec<NodeId>),
    Broadcast,
}

/// 数据包头：端到端目的地、流标识与端到端序号。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    pub dst: NodeId,
    pub flow_id: u64,
    pub seq: u64,
}

/// 控制包种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Hello,
}

/// ACK 头：被确认的数据包 id 与确认目标。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckHeader {
    pub acked: u64,
    pub target: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body {
    Data(DataHeader),
    Control(ControlKind),
    Ack(AckHeader),
}

/// 网络数据包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: u64,
    pub src: NodeId,
    /// 当前持有该包的跳（随转发更新）。
    pub cur_hop: NodeId,
    pub created_at: SimTime,
    pub size_bits: u64,
    /// 剩余允许转发跳数。
    pub ttl: u8,
    /// 当前跳的 MAC 重传次数。
    pub retries: u32,
    pub mode: TxMode,
    pub body: Body,
}

impl Packet {
    pub fn new_data(
        id: u64,
        src: NodeId,
        dst: NodeId,
        flow_id: u64,
        seq: u64,
        size_bits: u64,
        ttl: u8,
        created_at: SimTime,
    ) -> Self {
        Self {
            id,
            src,
            cur_hop: src,
            created_at,
            size_bits,
            ttl,
            retries: 0,
            mode: TxMode::Unicast,
            body: Body::Data(DataHeader { dst, flow_id, seq }),
        }
    }

    pub fn new_hello(id: u64, src: NodeId, size_bits: u64, created_at: SimTime) -> Self {
        Self {
            id,
            src,
            cur_hop: src,
            created_at,
            size_bits,
            ttl: 1,
            retries: 0,
            mode: TxMode::Broadcast,
            body: Body::Control(ControlKind::Hello),
        }
    }

    pub fn new_ack(
        id: u64,
        src: NodeId,
        acked: u64,
        target: NodeId,
        size_bits: u64,
        created_at: SimTime,
    ) -> Self {
        Self {
            id,
            src,
            cur_hop: src,
            created_at,
            size_bits,
            ttl: 1,
            retries: 0,
            mode: TxMode::Unicast,
            body: Body::Ack(AckHeader { acked, target }),
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self.body, Body::Data(_))
    }

    pub fn is_ack(&self) -> bool {
        matches!(self.body, Body::Ack(_))
    }

    pub fn is_control(&self) -> bool {
        matches!(self.body, Body::Control(_))
    }

    pub fn data(&self) -> Option<&DataHeader> {
        match &self.body {
            Body::Data(h) => Some(h),
            _ => None,
        }
    }

    pub fn ack(&self) -> Option<&AckHeader> {
        match &self.body {
            Body::Ack(h) => Some(h),
            _ => None,
        }
    }

    pub fn flow_id(&self) -> Option<u64> {
        self.data().map(|h| h.flow_id)
    }
}
