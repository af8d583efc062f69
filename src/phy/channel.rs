//! 无线信道
//!
//! 信道是系统的广播原语：发送方开始占用空口时，网络把传输记录
//! 扇出到接收集合中每个节点的收件箱。信道插件只决定"是否插入"
//! （视距恒通、概率丢弃、路损低于灵敏度则抑制）；碰撞从不在这里
//! 判定，那是判决器的职责。

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::fading;
use crate::config::SimConfig;
use crate::mobility::Pos;
use crate::net::{NodeId, Packet};
use crate::sim::SimTime;

/// 一次空口发送的描述。
#[derive(Debug, Clone)]
pub struct TxInfo {
    pub pkt: Packet,
    pub sender: NodeId,
    pub sender_pos: Pos,
    pub power_w: f64,
    pub start: SimTime,
    pub end: SimTime,
}

/// 接收集合：广播给所有节点，或单播/多播指定的节点。
#[derive(Debug, Clone)]
pub enum Recipients {
    Broadcast,
    One(NodeId),
    Many(Vec<NodeId>),
}

/// 信道插件：逐接收方决定本次传输是否进入其收件箱。
pub trait Channel: Send {
    fn admit(&mut self, tx: &TxInfo, receiver: NodeId, receiver_pos: Pos) -> bool;
}

/// 视距信道：插入无条件。
pub struct LosChannel;

impl Channel for LosChannel {
    fn admit(&mut self, _tx: &TxInfo, _receiver: NodeId, _receiver_pos: Pos) -> bool {
        true
    }
}

/// 概率信道：逐接收方独立 Bernoulli 丢弃后再插入。
pub struct ProbChannel {
    loss_prob: f64,
    rng: StdRng,
}

impl ProbChannel {
    pub fn new(loss_prob: f64, seed: u64) -> Self {
        Self {
            loss_prob,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Channel for ProbChannel {
    fn admit(&mut self, _tx: &TxInfo, _receiver: NodeId, _receiver_pos: Pos) -> bool {
        !self.rng.gen_bool(self.loss_prob)
    }
}

/// 距离/路损信道：按发送方位置快照计算大尺度衰落，接收功率低于
/// 灵敏度则抑制插入。
pub struct RangeChannel {
    sensitivity_w: f64,
    prob_los: bool,
    cfg: SimConfig,
}

impl RangeChannel {
    pub fn new(sensitivity_w: f64, prob_los: bool, cfg: SimConfig) -> Self {
        Self {
            sensitivity_w,
            prob_los,
            cfg,
        }
    }
}

impl Channel for RangeChannel {
    fn admit(&mut self, tx: &TxInfo, _receiver: NodeId, receiver_pos: Pos) -> bool {
        let rx_power = fading::received_power_w(
            tx.sender_pos,
            receiver_pos,
            tx.power_w,
            &self.cfg,
            self.prob_los,
        );
        rx_power >= self.sensitivity_w
    }
}
