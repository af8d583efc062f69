//! 网络层事件
//!
//! 馈送循环迭代、路由变更通知、位置更新节拍、Hello 广播与
//! 应用层注入。事件向下转型取得 `UavWorld` 后调用对应网络方法。

use super::id::NodeId;
use super::world::UavWorld;
use crate::sim::{Event, SimTime, Simulator, World};

/// 事件：馈送循环的一次迭代。
#[derive(Debug)]
pub struct FeedTick {
    pub node: NodeId,
}

impl Event for FeedTick {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let FeedTick { node } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<UavWorld>()
            .expect("world must be UavWorld");
        w.net.feed(sim, node);
    }
}

/// 事件：路由宣布有新信息（等待列表迁移回发送队列）。
#[derive(Debug)]
pub struct RoutingChanged {
    pub node: NodeId,
}

impl Event for RoutingChanged {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let RoutingChanged { node } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<UavWorld>()
            .expect("world must be UavWorld");
        w.net.routing_changed(sim, node);
    }
}

/// 事件：位置更新节拍。按配置间隔自续：读移动模型、扣飞行能耗、
/// 重建邻接并推送给路由。
#[derive(Debug)]
pub struct PositionTick {
    pub interval: SimTime,
}

impl Event for PositionTick {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let PositionTick { interval } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<UavWorld>()
            .expect("world must be UavWorld");
        w.net.position_tick(sim, interval);
        sim.schedule_in(interval, PositionTick { interval });
    }
}

/// 事件：周期性 Hello 广播（邻居感知用的控制流量）。
#[derive(Debug)]
pub struct HelloTick {
    pub node: NodeId,
    pub interval: SimTime,
}

impl Event for HelloTick {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let HelloTick { node, interval } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<UavWorld>()
            .expect("world must be UavWorld");
        w.net.emit_hello(sim, node);
        sim.schedule_in(interval, HelloTick { node, interval });
    }
}

/// 事件：应用层注入一个数据包（测试与业务发生器共用）。
#[derive(Debug)]
pub struct InjectData {
    pub src: NodeId,
    pub dst: NodeId,
    pub flow_id: u64,
    pub seq: u64,
    pub size_bits: u64,
}

impl Event for InjectData {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let InjectData {
            src,
            dst,
            flow_id,
            seq,
            size_bits,
        } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<UavWorld>()
            .expect("world must be UavWorld");
        w.net.inject_data(sim, src, dst, flow_id, seq, size_bits);
    }
}
