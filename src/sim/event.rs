//! 事件 trait
//!
//! 仿真中一切活动（馈送循环迭代、MAC 定时器、收件箱判决、位置更新等）
//! 都实现此接口，由调度器按虚拟时间驱动。

use super::simulator::Simulator;
use super::world::World;

/// 事件：可被调度执行。使用 `self: Box<Self>` 以支持 move/所有权转移。
pub trait Event: Send + 'static {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World);
}
