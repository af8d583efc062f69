//! 无人机节点
//!
//! 组合发送流水线状态（发送队列、等待列表、缓冲槽、收件箱、MAC
//! 状态机）与可插拔组件（路由、移动、能耗）。节点独占自身状态；
//! 插件在每次调用时收到只读节点视图，而不持有对节点的回引用。

use std::collections::{BTreeMap, HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::buffer::BufferSlot;
use super::id::NodeId;
use super::packet::Packet;
use crate::energy::EnergyModel;
use crate::mac::{MacKind, MacState};
use crate::mobility::{Mobility, Pos};
use crate::phy::inbox::Inbox;
use crate::routing::{NodeView, Routing};

pub struct Drone {
    pub id: NodeId,
    pub pos: Pos,
    /// 发送队列：等待获取缓冲槽的包，FIFO、无界。
    pub queue: VecDeque<Packet>,
    /// 等待列表：下一跳未知的数据包，按包 id 有序（确定性迁移）。
    pub waiting: BTreeMap<u64, Packet>,
    pub buffer: BufferSlot,
    pub inbox: Inbox,
    pub mac: MacState,
    pub routing: Box<dyn Routing>,
    pub mobility: Box<dyn Mobility>,
    pub energy: Box<dyn EnergyModel>,
    /// 已见过的数据包 id（环路/重复检测）。
    pub seen: HashSet<u64>,
    pub(crate) mac_rng: StdRng,
    pub(crate) feed_scheduled: bool,
}

impl Drone {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: NodeId,
        pos: Pos,
        mac_kind: MacKind,
        routing: Box<dyn Routing>,
        mobility: Box<dyn Mobility>,
        energy: Box<dyn EnergyModel>,
        mac_seed: u64,
    ) -> Self {
        Self {
            id,
            pos,
            queue: VecDeque::new(),
            waiting: BTreeMap::new(),
            buffer: BufferSlot::default(),
            inbox: Inbox::default(),
            mac: MacState::new(mac_kind),
            routing,
            mobility,
            energy,
            seen: HashSet::new(),
            mac_rng: StdRng::seed_from_u64(mac_seed),
            feed_scheduled: false,
        }
    }

    /// 能量耗尽的节点静默停发（仍然接收）。
    pub fn send_mute(&self) -> bool {
        self.energy.remaining() <= 0.0
    }

    pub fn view(&self) -> NodeView {
        NodeView {
            id: self.id,
            pos: self.pos,
            energy_j: self.energy.remaining(),
        }
    }

    /// 退避槽数：在 [0, cw) 内均匀抽取。
    pub fn mac_rng_range(&mut self, cw: u32) -> u32 {
        self.mac_rng.gen_range(0..cw.max(1))
    }

    pub fn mac_rng_range_u64(&mut self, span: u64) -> u64 {
        self.mac_rng.gen_range(0..span.max(1))
    }
}
