//! 网络模块
//!
//! 此模块包含无人机网络的核心组件：节点、数据包、发送流水线、
//! 业务发生器、度量与网络编排。

mod buffer;
mod drone;
mod events;
mod id;
mod metrics;
mod network;
mod packet;
mod traffic;
mod world;

pub use buffer::{BufferSlot, MacJob};
pub use drone::Drone;
pub use events::{FeedTick, HelloTick, InjectData, PositionTick, RoutingChanged};
pub use id::NodeId;
pub use metrics::{MetricExtra, MetricKind, MetricRecord, MetricsSink, Stats, Summary};
pub use network::{AirtimeStart, UavNet, HELLO_BITS};
pub use packet::{AckHeader, Body, ControlKind, DataHeader, Packet, TxMode};
pub use traffic::{InterArrival, TrafficArrival, TrafficSession};
pub use world::UavWorld;
