//! 最短路路由表（内置默认路由）
//!
//! 在由通信距离导出的邻接图上按"最短跳数"预计算下一跳候选集：
//! 对每个目的地在反向图上做 BFS 得到各节点到目的地的跳数距离，
//! 本节点的候选下一跳是距离恰好小一的出边邻居。候选间用带盐的
//! 确定性散列选择，保证每次运行可复现。拓扑推送（位置更新）会
//! 置脏并发布路由变更通知。

use std::collections::{HashMap, VecDeque};

use super::{NodeView, Routing};
use crate::config::mix64;
use crate::net::{NodeId, Packet};
use crate::sim::SimTime;

pub struct ShortestPathRouting {
    me: NodeId,
    adj: Vec<Vec<NodeId>>,
    rev_adj: Vec<Vec<NodeId>>,
    /// dst -> 等价最短路径下一跳候选
    next_hops: HashMap<NodeId, Vec<NodeId>>,
    changed: bool,
    hash_salt: u64,
}

impl ShortestPathRouting {
    pub fn new(me: NodeId, hash_salt: u64) -> Self {
        Self {
            me,
            adj: Vec::new(),
            rev_adj: Vec::new(),
            next_hops: HashMap::new(),
            changed: false,
            hash_salt,
        }
    }

    pub fn with_topology(me: NodeId, adj: Vec<Vec<NodeId>>, hash_salt: u64) -> Self {
        let mut r = Self::new(me, hash_salt);
        r.install(adj);
        r
    }

    fn install(&mut self, adj: Vec<Vec<NodeId>>) {
        let n = adj.len();
        let mut rev = vec![Vec::new(); n];
        for (from, outs) in adj.iter().enumerate() {
            for &to in outs {
                rev[to.0].push(NodeId(from));
            }
        }
        self.adj = adj;
        self.rev_adj = rev;
        self.next_hops.clear();
    }

    /// 确保 `dst` 的候选集基于当前拓扑是最新的。
    fn ensure_built(&mut self, dst: NodeId) {
        if self.next_hops.contains_key(&dst) {
            return;
        }
        let n = self.adj.len();
        if dst.0 >= n || self.me.0 >= n {
            return;
        }

        // 对 dst 在反向图上 BFS，得到到 dst 的最短跳数距离。
        let mut dist: Vec<i32> = vec![i32::MAX; n];
        let mut q: VecDeque<NodeId> = VecDeque::new();
        dist[dst.0] = 0;
        q.push_back(dst);
        while let Some(v) = q.pop_front() {
            let dv = dist[v.0];
            for &pred in &self.rev_adj[v.0] {
                if dist[pred.0] == i32::MAX {
                    dist[pred.0] = dv.saturating_add(1);
                    q.push_back(pred);
                }
            }
        }

        let df = dist[self.me.0];
        if df == i32::MAX {
            return; // unreachable：候选集留空
        }
        let mut cands = Vec::new();
        for &nh in &self.adj[self.me.0] {
            if dist[nh.0] == df - 1 {
                cands.push(nh);
            }
        }
        if !cands.is_empty() {
            self.next_hops.insert(dst, cands);
        }
    }

    /// 基于 flow_id 的稳定候选选择（盐固定，跨运行可复现）。
    fn pick(&self, dst: NodeId, key: u64, cands: &[NodeId]) -> NodeId {
        debug_assert!(!cands.is_empty());
        let h = mix64(
            key ^ (self.me.0 as u64).wrapping_mul(0x9E3779B97F4A7C15)
                ^ (dst.0 as u64)
                ^ self.hash_salt,
        );
        cands[(h as usize) % cands.len()]
    }
}

impl Routing for ShortestPathRouting {
    fn next_hop(&mut self, pkt: &Packet, _now: SimTime, _view: &NodeView) -> Option<NodeId> {
        let h = pkt.data()?;
        if h.dst == self.me {
            return Some(self.me);
        }
        self.ensure_built(h.dst);
        let cands = self.next_hops.get(&h.dst)?;
        Some(self.pick(h.dst, h.flow_id, cands))
    }

    fn on_topology(&mut self, adj: &[Vec<NodeId>], _now: SimTime) {
        if self.adj == adj {
            return;
        }
        self.install(adj.to_vec());
        self.changed = true;
    }

    fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}
