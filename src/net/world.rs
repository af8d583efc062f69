//! 网络世界实现
//!
//! 仿真世界（World）实现，持有无人机网络。每个事件之后做一次
//! 廉价的管线不变量断言（仅调试构建）：缓冲槽持有者不得同时出现
//! 在发送队列或等待列表中。

use super::network::UavNet;
use crate::sim::World;
use std::any::Any;

pub struct UavWorld {
    pub net: UavNet,
}

impl UavWorld {
    pub fn new(net: UavNet) -> Self {
        Self { net }
    }
}

impl World for UavWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn on_tick(&mut self, _sim: &mut crate::sim::Simulator) {
        #[cfg(debug_assertions)]
        {
            for i in 0..self.net.num_drones() {
                let d = self.net.drone(super::id::NodeId(i));
                if let Some(job) = d.buffer.holder() {
                    let id = job.pkt.id;
                    debug_assert!(
                        !d.queue.iter().any(|p| p.id == id),
                        "packet {id} both buffer-held and queued"
                    );
                    debug_assert!(
                        !d.waiting.contains_key(&id),
                        "packet {id} both buffer-held and waiting"
                    );
                }
            }
        }
    }

    fn done(&self) -> bool {
        self.net.all_terminal()
    }
}
