//! MAC 状态机
//!
//! 缓冲槽持有者驱动 MAC 竞争空口。状态机不自旋：每次状态迁移
//! 只调度一个带令牌的定时器事件，令牌失配的旧定时器视为已取消
//! （同一思路见发送完成与重传竞态的处理）。两种协议：CSMA/CA
//! 与纯 ALOHA，按构造时的标签在调用点派发。

pub mod aloha;
pub mod csma_ca;

use crate::net::{NodeId, UavWorld};
use crate::sim::{Event, SimTime, Simulator, World};

/// MAC 协议标签。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacKind {
    CsmaCa,
    Aloha,
}

/// MAC 状态机相位。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacPhase {
    Idle,
    /// 等待介质空闲（仅 CSMA/CA）。
    Sensing,
    /// DIFS + 退避倒计时进行中（仅 CSMA/CA）。
    Waiting { expires: SimTime },
    /// 随机重试等待（仅 ALOHA）。
    AlohaWait { expires: SimTime },
    /// 正在占用空口（无需 ACK 的作业）。
    Tx { ends: SimTime },
    /// 等待 ACK。
    AwaitAck { pkt_id: u64, deadline: SimTime },
}

#[derive(Debug)]
pub struct MacState {
    pub kind: MacKind,
    pub phase: MacPhase,
    /// 本作业已发生的 ACK 超时次数。
    pub attempts: u32,
    /// 冻结的倒计时余量；None 表示下次重新抽取退避。
    pub backoff_left: Option<SimTime>,
    token: u64,
}

impl MacState {
    pub fn new(kind: MacKind) -> Self {
        Self {
            kind,
            phase: MacPhase::Idle,
            attempts: 0,
            backoff_left: None,
            token: 0,
        }
    }

    /// 使所有在途定时器失效并返回新令牌。
    pub fn bump(&mut self) -> u64 {
        self.token = self.token.wrapping_add(1);
        self.token
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// 作业结束（成功或终局失败）后的复位。
    pub fn reset(&mut self) {
        self.phase = MacPhase::Idle;
        self.attempts = 0;
        self.backoff_left = None;
        self.bump();
    }
}

/// MAC 作业终局。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacOutcome {
    Success,
    Failure(&'static str),
}

/// 事件：MAC 定时器到期（统一入口，按相位分派）。
#[derive(Debug)]
pub struct MacTimer {
    pub node: NodeId,
    pub token: u64,
}

impl Event for MacTimer {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let MacTimer { node, token } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<UavWorld>()
            .expect("world must be UavWorld");
        w.net.mac_timer(sim, node, token);
    }
}

/// 事件：SIFS 之后经快速通道发送 ACK（绕过队列与退避）。
#[derive(Debug)]
pub struct AckSend {
    pub node: NodeId,
    pub acked: u64,
    pub target: NodeId,
}

impl Event for AckSend {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let AckSend {
            node,
            acked,
            target,
        } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<UavWorld>()
            .expect("world must be UavWorld");
        w.net.send_ack(sim, node, acked, target);
    }
}
