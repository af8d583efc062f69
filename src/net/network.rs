//! 无人机网络
//!
//! 持有全部节点、信道插件、业务会话与度量汇，并承载跨层编排：
//! 馈送循环、缓冲槽授予、MAC 派发、空口扇出（broadcast_put）、
//! 判决后的接收处理（ACK 快速通道 / 送达 / 转发）与等待列表迁移。
//! 扇出期间信道以"取出-放回"方式临时脱离网络，避免 &mut self
//! 与 &mut channel 的重叠借用。

use tracing::{debug, info, trace};

use super::buffer::MacJob;
use super::drone::Drone;
use super::events::FeedTick;
use super::id::NodeId;
use super::metrics::{MetricKind, MetricsSink};
use super::packet::{Body, Packet, TxMode};
use super::traffic::{TrafficArrival, TrafficSession};
use crate::config::SimConfig;
use crate::mac::{aloha, csma_ca, AckSend, MacKind, MacOutcome};
use crate::mobility::Pos;
use crate::phy::channel::{Channel, Recipients, TxInfo};
use crate::phy::fading;
use crate::phy::inbox::TransmissionRecord;
use crate::phy::resolver::ResolverTick;
use crate::routing::NodeView;
use crate::sim::{SimTime, Simulator};

/// Hello 控制包长度（比特）。
pub const HELLO_BITS: u64 = 256;

/// 一次空口占用的起始信息（MAC 发送路径的返回值）。
#[derive(Debug, Clone, Copy)]
pub struct AirtimeStart {
    pub end: SimTime,
    pub pkt_id: u64,
    pub awaits_ack: bool,
}

pub struct UavNet {
    cfg: SimConfig,
    drones: Vec<Option<Drone>>,
    channel: Option<Box<dyn Channel>>,
    pub metrics: MetricsSink,
    pub(crate) traffic: Vec<TrafficSession>,
    next_pkt_id: u64,
    /// 判决器的接收功率模型是否用概率视距（与 Range 信道一致）。
    prob_los: bool,
}

impl UavNet {
    pub fn new(cfg: SimConfig, channel: Box<dyn Channel>) -> Self {
        Self {
            cfg,
            drones: Vec::new(),
            channel: Some(channel),
            metrics: MetricsSink::default(),
            traffic: Vec::new(),
            next_pkt_id: 0,
            prob_los: false,
        }
    }

    pub fn set_prob_los(&mut self, prob_los: bool) {
        self.prob_los = prob_los;
    }

    pub fn cfg(&self) -> &SimConfig {
        &self.cfg
    }

    pub fn num_drones(&self) -> usize {
        self.drones.len()
    }

    pub fn add_drone(&mut self, drone: Drone) -> NodeId {
        let id = NodeId(self.drones.len());
        debug_assert_eq!(drone.id, id, "drone ids must be dense and ordered");
        self.drones.push(Some(drone));
        id
    }

    pub fn drone(&self, id: NodeId) -> &Drone {
        self.drones[id.0].as_ref().expect("drone exists")
    }

    pub fn drone_mut(&mut self, id: NodeId) -> &mut Drone {
        self.drones[id.0].as_mut().expect("drone exists")
    }

    pub fn add_session(&mut self, session: TrafficSession) -> usize {
        self.traffic.push(session);
        self.traffic.len() - 1
    }

    pub fn alloc_pkt_id(&mut self) -> u64 {
        let id = self.next_pkt_id;
        self.next_pkt_id = self.next_pkt_id.wrapping_add(1);
        id
    }

    // -----------------------------------------------------------------------
    // 应用层
    // -----------------------------------------------------------------------

    /// 应用层注入：登记生成记录并进入源节点发送队列。
    #[tracing::instrument(skip_all, fields(src = src.0, dst = dst.0, flow_id))]
    pub fn inject_data(
        &mut self,
        sim: &mut Simulator,
        src: NodeId,
        dst: NodeId,
        flow_id: u64,
        seq: u64,
        size_bits: u64,
    ) -> u64 {
        let now = sim.now();
        let id = self.alloc_pkt_id();
        let ttl = self.cfg.ttl;
        let pkt = Packet::new_data(id, src, dst, flow_id, seq, size_bits, ttl, now);
        debug!(pkt_id = id, "📦 应用层注入数据包");
        self.metrics.on_generated(id, flow_id, now);
        self.drone_mut(src).seen.insert(id);
        self.enqueue(sim, src, pkt);
        id
    }

    /// 周期性 Hello：广播控制包，走常规控制包管线。
    pub fn emit_hello(&mut self, sim: &mut Simulator, node: NodeId) {
        let now = sim.now();
        let id = self.alloc_pkt_id();
        let pkt = Packet::new_hello(id, node, HELLO_BITS, now);
        self.enqueue(sim, node, pkt);
    }

    /// 入队并唤醒馈送循环。
    pub fn enqueue(&mut self, sim: &mut Simulator, node: NodeId, pkt: Packet) {
        self.drone_mut(node).queue.push_back(pkt);
        self.kick_feed(sim, node);
    }

    pub(crate) fn kick_feed(&mut self, sim: &mut Simulator, node: NodeId) {
        let now = sim.now();
        let d = self.drone_mut(node);
        if d.feed_scheduled || d.queue.is_empty() {
            return;
        }
        d.feed_scheduled = true;
        sim.schedule(now, FeedTick { node });
    }

    // -----------------------------------------------------------------------
    // 馈送循环
    // -----------------------------------------------------------------------

    /// 馈送循环一次迭代：检查队头，控制包直接出队；数据包查路由，
    /// 有下一跳则出队占槽，否则移入等待列表继续看下一个队头。
    /// 槽被占用时不出队（等释放再踢）。
    pub(crate) fn feed(&mut self, sim: &mut Simulator, node: NodeId) {
        let now = sim.now();
        self.drone_mut(node).feed_scheduled = false;

        loop {
            if !self.drone(node).buffer.is_free() {
                break;
            }
            let job = {
                let d = self.drone_mut(node);
                let Some(head) = d.queue.front() else {
                    break;
                };
                match &head.body {
                    Body::Control(_) => {
                        let pkt = d.queue.pop_front().expect("checked front");
                        Some(MacJob {
                            pkt,
                            next_hop: None,
                        })
                    }
                    Body::Data(_) => {
                        let view = NodeView {
                            id: d.id,
                            pos: d.pos,
                            energy_j: d.energy.remaining(),
                        };
                        let nh = d.routing.next_hop(head, now, &view);
                        match nh {
                            Some(nh) => {
                                let pkt = d.queue.pop_front().expect("checked front");
                                Some(MacJob {
                                    pkt,
                                    next_hop: Some(nh),
                                })
                            }
                            None => {
                                // 路由未知：移入等待列表，接着看下一个队头。
                                let pkt = d.queue.pop_front().expect("checked front");
                                trace!(node = node.0, pkt_id = pkt.id, "下一跳未知，进入等待列表");
                                d.waiting.insert(pkt.id, pkt);
                                None
                            }
                        }
                    }
                    // ACK 不经过发送队列（快速通道直接发送）。
                    Body::Ack(_) => {
                        let pkt = d.queue.pop_front().expect("checked front");
                        debug_assert!(false, "ack in transmitting queue: {:?}", pkt.id);
                        None
                    }
                }
            };
            if let Some(job) = job {
                self.drone_mut(node).buffer.acquire(job);
                self.mac_start(sim, node);
            }
        }

        // 按配置间隔再巡检，避免虚拟时间忙等。
        let interval = self.cfg.feed_interval;
        let d = self.drone_mut(node);
        if !d.queue.is_empty() && !d.feed_scheduled {
            d.feed_scheduled = true;
            sim.schedule(now.saturating_add(interval), FeedTick { node });
        }
    }

    /// 路由宣布新信息：把"下一跳已知"的等待列表条目迁回队尾。
    pub(crate) fn routing_changed(&mut self, sim: &mut Simulator, node: NodeId) {
        let now = sim.now();
        let movable: Vec<u64> = {
            let d = self.drone_mut(node);
            let ids: Vec<u64> = d.waiting.keys().copied().collect();
            let mut movable = Vec::new();
            for id in ids {
                let view = NodeView {
                    id: d.id,
                    pos: d.pos,
                    energy_j: d.energy.remaining(),
                };
                let pkt = d.waiting.get(&id).expect("key from iteration");
                if d.routing.next_hop(pkt, now, &view).is_some() {
                    movable.push(id);
                }
            }
            movable
        };
        for id in movable {
            let pkt = self
                .drone_mut(node)
                .waiting
                .remove(&id)
                .expect("movable id present");
            debug!(node = node.0, pkt_id = id, "等待列表迁回发送队列");
            self.enqueue(sim, node, pkt);
        }
    }

    fn poll_routing_changed(&mut self, sim: &mut Simulator, node: NodeId) {
        if self.drone_mut(node).routing.take_changed() {
            self.routing_changed(sim, node);
        }
    }

    // -----------------------------------------------------------------------
    // MAC 派发
    // -----------------------------------------------------------------------

    pub(crate) fn mac_start(&mut self, sim: &mut Simulator, node: NodeId) {
        match self.drone(node).mac.kind {
            MacKind::CsmaCa => csma_ca::start(self, sim, node),
            MacKind::Aloha => aloha::start(self, sim, node),
        }
    }

    pub(crate) fn mac_timer(&mut self, sim: &mut Simulator, node: NodeId, token: u64) {
        // 令牌失配说明该定时器已被后续状态迁移取消。
        if token != self.drone(node).mac.token() {
            return;
        }
        match self.drone(node).mac.kind {
            MacKind::CsmaCa => csma_ca::on_timer(self, sim, node),
            MacKind::Aloha => aloha::on_timer(self, sim, node),
        }
    }

    pub(crate) fn mac_on_medium_busy(&mut self, sim: &mut Simulator, node: NodeId) {
        match self.drone(node).mac.kind {
            MacKind::CsmaCa => csma_ca::on_medium_busy(self, sim, node),
            MacKind::Aloha => aloha::on_medium_busy(self, sim, node),
        }
    }

    /// MAC 作业终局：释放缓冲槽，失败的数据包计入 MAC 丢弃。
    pub(crate) fn mac_finish(&mut self, sim: &mut Simulator, node: NodeId, outcome: MacOutcome) {
        let now = sim.now();
        let job = {
            let d = self.drone_mut(node);
            let job = d.buffer.release().expect("mac finish without job");
            d.mac.reset();
            job
        };
        match outcome {
            MacOutcome::Success => {
                trace!(node = node.0, pkt_id = job.pkt.id, "MAC 作业完成");
            }
            MacOutcome::Failure(reason) => {
                debug!(node = node.0, pkt_id = job.pkt.id, reason, "MAC 终局失败");
                if job.pkt.is_data() {
                    self.metrics
                        .on_dropped(MetricKind::DroppedMac, job.pkt.id, reason, now);
                }
            }
        }
        self.kick_feed(sim, node);
    }

    pub(crate) fn note_ack_received(&mut self, now: SimTime) {
        self.metrics.stats.acks_received += 1;
        self.metrics.stats.last_ack_at = Some(now);
    }

    /// 开始占用空口：扣发送能耗、构造传输描述并扇出。
    pub(crate) fn begin_airtime(&mut self, sim: &mut Simulator, node: NodeId) -> AirtimeStart {
        let now = sim.now();
        let bits = {
            let job = self.drone(node).buffer.holder().expect("airtime without job");
            job.pkt.size_bits
        };
        let air = self.cfg.air_time(bits);
        let power = self.cfg.transmit_power_w;
        let end = now.saturating_add(air);

        let (tx, recipients, awaits_ack) = {
            let d = self.drone_mut(node);
            d.energy.debit_transmit(bits, power, air);
            let job = d.buffer.holder().expect("airtime without job");
            let pkt = job.pkt.clone();
            let recipients = match (&pkt.mode, &pkt.body) {
                (TxMode::Broadcast, _) => Recipients::Broadcast,
                (TxMode::Multicast(group), _) => Recipients::Many(group.clone()),
                (TxMode::Unicast, Body::Data(_)) => {
                    Recipients::One(job.next_hop.expect("unicast data without next hop"))
                }
                (TxMode::Unicast, Body::Ack(h)) => Recipients::One(h.target),
                (TxMode::Unicast, Body::Control(_)) => match job.next_hop {
                    Some(nh) => Recipients::One(nh),
                    None => Recipients::Broadcast,
                },
            };
            let awaits_ack = matches!((&pkt.mode, &pkt.body), (TxMode::Unicast, Body::Data(_)));
            let tx = TxInfo {
                pkt,
                sender: node,
                sender_pos: d.pos,
                power_w: power,
                start: now,
                end,
            };
            (tx, recipients, awaits_ack)
        };
        let pkt_id = tx.pkt.id;
        trace!(node = node.0, pkt_id, end = ?end, "开始占用空口");
        self.broadcast_put(sim, tx, recipients);
        AirtimeStart {
            end,
            pkt_id,
            awaits_ack,
        }
    }

    // -----------------------------------------------------------------------
    // 信道扇出
    // -----------------------------------------------------------------------

    /// 系统的广播原语：把传输记录写入接收集合中每个节点的收件箱
    /// （经信道插件裁决），并在记录结束时刻调度判决。
    pub fn broadcast_put(&mut self, sim: &mut Simulator, tx: TxInfo, recipients: Recipients) {
        let mut channel = self.channel.take().expect("channel installed");
        let targets: Vec<NodeId> = match recipients {
            Recipients::Broadcast => (0..self.drones.len())
                .map(NodeId)
                .filter(|&n| n != tx.sender)
                .collect(),
            Recipients::One(n) => vec![n],
            Recipients::Many(v) => v,
        };

        for n in targets {
            if n == tx.sender || n.0 >= self.drones.len() {
                continue;
            }
            let admitted = {
                let Some(d) = self.drones[n.0].as_ref() else {
                    continue;
                };
                channel.admit(&tx, n, d.pos)
            };
            if admitted {
                self.drones[n.0]
                    .as_mut()
                    .expect("drone exists")
                    .inbox
                    .push(TransmissionRecord::from_tx(&tx));
                sim.schedule(tx.end, ResolverTick { node: n });
                self.mac_on_medium_busy(sim, n);
            } else {
                self.metrics.stats.phy_rejects += 1;
            }
        }
        self.channel = Some(channel);
    }

    /// ACK 快速通道：接收后 SIFS 触发，绕过队列、缓冲槽与退避。
    /// 静默节点（能量耗尽）不回 ACK。
    pub(crate) fn send_ack(&mut self, sim: &mut Simulator, node: NodeId, acked: u64, target: NodeId) {
        let now = sim.now();
        if self.drone(node).send_mute() {
            return;
        }
        let id = self.alloc_pkt_id();
        let bits = self.cfg.ack_size_bits;
        let air = self.cfg.ack_air_time();
        let power = self.cfg.transmit_power_w;
        let end = now.saturating_add(air);
        let pkt = Packet::new_ack(id, node, acked, target, bits, now);

        let tx = {
            let d = self.drone_mut(node);
            d.energy.debit_transmit(bits, power, air);
            TxInfo {
                pkt,
                sender: node,
                sender_pos: d.pos,
                power_w: power,
                start: now,
                end,
            }
        };
        self.metrics.stats.acks_sent += 1;
        trace!(node = node.0, acked, target = target.0, "SIFS 快速通道回 ACK");
        self.broadcast_put(sim, tx, Recipients::One(target));
    }

    // -----------------------------------------------------------------------
    // 判决与接收
    // -----------------------------------------------------------------------

    /// 判决一个节点的收件箱：裁剪、评估新完成的记录、投递通过者。
    pub(crate) fn resolve_inbox(&mut self, sim: &mut Simulator, node: NodeId) {
        let now = sim.now();
        let horizon = self.cfg.max_air_time().saturating_mul(2);
        let noise = self.cfg.noise_power_w;
        let threshold_db = self.cfg.sinr_threshold_db();
        let cfg = self.cfg.clone();
        let prob_los = self.prob_los;

        let mut delivered: Vec<(Packet, NodeId, f64)> = Vec::new();
        let mut collided: u64 = 0;
        {
            let d = self.drones[node.0].as_mut().expect("drone exists");
            let rx_pos = d.pos;
            for idx in d.inbox.completed_unresolved(now) {
                let overlaps = d.inbox.overlapping(idx);
                let rec = d.inbox.record(idx);
                let signal =
                    fading::received_power_w(rec.sender_pos, rx_pos, rec.power_w, &cfg, prob_los);
                let mut interference = 0.0;
                for &j in &overlaps {
                    let o = d.inbox.record(j);
                    interference +=
                        fading::received_power_w(o.sender_pos, rx_pos, o.power_w, &cfg, prob_los);
                }
                let sinr_db = fading::to_db(signal / (noise + interference));
                let pkt = rec.pkt.clone();
                let sender = rec.sender;
                d.inbox.mark_resolved(idx);
                if sinr_db >= threshold_db {
                    trace!(node = node.0, pkt_id = pkt.id, sinr_db, "SINR 通过，投递上层");
                    delivered.push((pkt, sender, signal));
                } else {
                    debug!(node = node.0, pkt_id = pkt.id, sinr_db, "SINR 低于门限，碰撞丢弃");
                    collided += 1;
                }
            }
            d.inbox.prune(now, horizon);
        }
        self.metrics.stats.collisions += collided;

        for (pkt, sender, rx_power) in delivered {
            self.on_received(sim, node, pkt, sender, rx_power);
        }
    }

    /// 判决通过后的接收处理。
    fn on_received(
        &mut self,
        sim: &mut Simulator,
        node: NodeId,
        pkt: Packet,
        sender: NodeId,
        rx_power: f64,
    ) {
        let now = sim.now();
        self.drone_mut(node)
            .routing
            .on_neighbor_heard(sender, rx_power, now);

        match pkt.body {
            Body::Ack(h) => {
                if h.target == node {
                    match self.drone(node).mac.kind {
                        MacKind::CsmaCa => csma_ca::on_ack(self, sim, node, h.acked),
                        MacKind::Aloha => aloha::on_ack(self, sim, node, h.acked),
                    }
                }
            }
            Body::Control(_) => {
                // Hello 只用于邻居感知，已在上面反馈给路由。
            }
            Body::Data(h) => {
                let dst = h.dst;
                let is_unicast = matches!(pkt.mode, TxMode::Unicast);
                if is_unicast {
                    // 本节点是该跳接收方：SIFS 后经快速通道回 ACK。
                    // 重复包同样补 ACK（首个 ACK 可能已丢失）。
                    sim.schedule(
                        now.saturating_add(self.cfg.sifs),
                        AckSend {
                            node,
                            acked: pkt.id,
                            target: sender,
                        },
                    );
                }
                let duplicate = !self.drone_mut(node).seen.insert(pkt.id);
                if duplicate {
                    trace!(node = node.0, pkt_id = pkt.id, "重复数据包，仅补 ACK");
                } else if dst == node {
                    self.on_delivered(node, pkt, now);
                } else if is_unicast {
                    self.on_forward(sim, node, pkt, sender);
                }
            }
        }

        self.poll_routing_changed(sim, node);
    }

    /// 终点接收：登记端到端度量，包生命周期结束。
    fn on_delivered(&mut self, node: NodeId, pkt: Packet, now: SimTime) {
        let h = pkt.data().expect("delivered packet is data");
        let hops = (self.cfg.ttl.saturating_sub(pkt.ttl)) as u32 + 1;
        info!(node = node.0, pkt_id = pkt.id, flow_id = h.flow_id, "✅ 数据包送达目的地");
        self.metrics.on_delivered(
            pkt.id,
            h.flow_id,
            pkt.created_at,
            hops,
            pkt.size_bits,
            now,
        );
    }

    /// 中间接收：TTL 递减、登记一跳，再入本节点发送队列。
    fn on_forward(&mut self, sim: &mut Simulator, node: NodeId, mut pkt: Packet, from: NodeId) {
        let now = sim.now();
        let flow_id = pkt.flow_id().expect("forwarded packet is data");
        pkt.ttl = pkt.ttl.saturating_sub(1);
        if pkt.ttl == 0 {
            debug!(node = node.0, pkt_id = pkt.id, "TTL 耗尽丢弃");
            self.metrics
                .on_dropped(MetricKind::DroppedTtl, pkt.id, "ttl", now);
            return;
        }
        pkt.cur_hop = node;
        pkt.retries = 0;
        self.metrics.on_hop(pkt.id, flow_id, from, node, now);
        self.enqueue(sim, node, pkt);
    }

    // -----------------------------------------------------------------------
    // 移动与业务
    // -----------------------------------------------------------------------

    /// 位置更新节拍：读移动模型、扣飞行能耗、重建邻接并推送路由。
    pub fn position_tick(&mut self, sim: &mut Simulator, dt: SimTime) {
        let now = sim.now();
        for i in 0..self.drones.len() {
            let d = self.drones[i].as_mut().expect("drone exists");
            d.pos = d.mobility.position(NodeId(i), now);
            d.energy.debit_flight(dt);
        }
        self.push_topology(sim);
    }

    /// 由当前位置与最大通信距离重建邻接，推送给各节点路由插件。
    pub fn push_topology(&mut self, sim: &mut Simulator) {
        let now = sim.now();
        let range = fading::maximum_communication_range(&self.cfg);
        let positions: Vec<Pos> = self
            .drones
            .iter()
            .map(|d| d.as_ref().expect("drone exists").pos)
            .collect();
        let n = positions.len();
        let mut adj: Vec<Vec<NodeId>> = vec![Vec::new(); n];
        for i in 0..n {
            for j in 0..n {
                if i != j && positions[i].dist(positions[j]) <= range {
                    adj[i].push(NodeId(j));
                }
            }
        }
        for i in 0..n {
            self.drones[i]
                .as_mut()
                .expect("drone exists")
                .routing
                .on_topology(&adj, now);
        }
        for i in 0..n {
            self.poll_routing_changed(sim, NodeId(i));
        }
    }

    /// 某会话的一次到达：注入一包，按间隔分布调度下一次。
    pub(crate) fn traffic_arrival(&mut self, sim: &mut Simulator, idx: usize) {
        let now = sim.now();
        let Some((src, dst, flow_id, seq, size_bits, next_gap)) = ({
            let s = &mut self.traffic[idx];
            if s.remaining == 0 {
                None
            } else {
                s.remaining -= 1;
                let seq = s.next_seq;
                s.next_seq += 1;
                let gap = if s.remaining > 0 {
                    Some(s.sample_gap())
                } else {
                    None
                };
                Some((s.src, s.dst, s.flow_id, seq, s.size_bits, gap))
            }
        }) else {
            return;
        };
        self.inject_data(sim, src, dst, flow_id, seq, size_bits);
        if let Some(gap) = next_gap {
            sim.schedule(now.saturating_add(gap), TrafficArrival { session: idx });
        }
    }

    // -----------------------------------------------------------------------
    // 结束与汇总
    // -----------------------------------------------------------------------

    /// 所有会话都已发完且每个应用层包都有终局。
    pub fn all_terminal(&self) -> bool {
        !self.traffic.is_empty()
            && self.traffic.iter().all(|s| s.remaining == 0)
            && self.metrics.open_count() == 0
    }

    /// 仿真结束：仍在途/管线中的包计为 in-air 丢弃。
    pub fn finalize(&mut self, now: SimTime) {
        self.metrics.finalize(now);
    }

    pub fn energy_consumed(&self) -> f64 {
        self.drones
            .iter()
            .map(|d| d.as_ref().expect("drone exists").energy.consumed())
            .sum()
    }

    pub fn summary(&self, elapsed: SimTime) -> super::metrics::Summary {
        self.metrics.summary(elapsed, self.energy_consumed())
    }
}
