//! 缓冲槽
//!
//! 每节点一个容量为 1 的发送资源：只有持有者才能发起 MAC 竞争。
//! 馈送循环在槽被占用时不出队，等释放后再继续，因此不需要等待队列。

use super::id::NodeId;
use super::packet::Packet;

/// 一次 MAC 作业：包与本跳选定的下一跳（广播/控制为 None）。
#[derive(Debug, Clone)]
pub struct MacJob {
    pub pkt: Packet,
    pub next_hop: Option<NodeId>,
}

#[derive(Debug, Default)]
pub struct BufferSlot {
    holder: Option<MacJob>,
}

impl BufferSlot {
    pub fn is_free(&self) -> bool {
        self.holder.is_none()
    }

    /// 占用缓冲槽。调用方必须先检查 `is_free`。
    pub fn acquire(&mut self, job: MacJob) {
        debug_assert!(self.holder.is_none(), "buffer slot double acquire");
        self.holder = Some(job);
    }

    pub fn release(&mut self) -> Option<MacJob> {
        self.holder.take()
    }

    pub fn holder(&self) -> Option<&MacJob> {
        self.holder.as_ref()
    }

    pub fn holder_mut(&mut self) -> Option<&mut MacJob> {
        self.holder.as_mut()
    }
}
