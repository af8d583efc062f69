//! 收件箱判决器
//!
//! 对每个节点：裁剪超过垃圾回收界限的旧记录，评估"新完成"的
//! 记录——以该记录为信号、空中时间相交的其余记录为干扰计算
//! SINR，达到当前 MCS 门限则投递给上层，否则静默作碰撞丢弃。
//! 同一节拍内完成的多条记录各自独立对照完整重叠集，互不偏袒。
//!
//! 判决节拍有两类来源：信道在每条记录插入时按其结束时刻调度一次
//! （投递时间精确），另有周期性巡检节拍兜底并驱动裁剪。评估是
//! 幂等的，多余的节拍无害。

use crate::net::{NodeId, UavWorld};
use crate::sim::{Event, SimTime, Simulator, World};

/// 事件：评估一个节点的收件箱。
#[derive(Debug)]
pub struct ResolverTick {
    pub node: NodeId,
}

impl Event for ResolverTick {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let ResolverTick { node } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<UavWorld>()
            .expect("world must be UavWorld");
        w.net.resolve_inbox(sim, node);
    }
}

/// 事件：周期性全网巡检（兜底评估 + 裁剪），按配置间隔自续。
#[derive(Debug)]
pub struct ResolverSweep {
    pub interval: SimTime,
}

impl Event for ResolverSweep {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let ResolverSweep { interval } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<UavWorld>()
            .expect("world must be UavWorld");
        for i in 0..w.net.num_drones() {
            w.net.resolve_inbox(sim, NodeId(i));
        }
        sim.schedule_in(interval, ResolverSweep { interval });
    }
}
