//! 物理层模块
//!
//! 大尺度衰落、技术档案（MCS 表）、信道插件、在途传输记录与
//! 收件箱判决器。

pub mod channel;
pub mod fading;
pub mod inbox;
pub mod profile;
pub mod resolver;

pub use channel::{Channel, LosChannel, ProbChannel, RangeChannel, Recipients, TxInfo};
pub use inbox::{Inbox, TransmissionRecord};
pub use profile::{Mcs, TechProfile};
pub use resolver::{ResolverSweep, ResolverTick};
