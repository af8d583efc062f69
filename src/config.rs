//! 配置
//!
//! `SimConfig` 是仿真启动时构造一次的值对象，按引用传给各组件，
//! 之后不再修改。`ScenarioSpec` 是场景文件（JSON）的 serde 模型，
//! 校验通过后折算成 `SimConfig` 与拓扑/业务描述。

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::phy::profile::{self, TechProfile};
use crate::sim::SimTime;

/// 配置错误：致命，仿真开始前报告。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("scenario parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported schema_version {0}")]
    SchemaVersion(u32),
    #[error("unknown tech profile `{0}`")]
    UnknownProfile(String),
    #[error("session references unknown drone {0}")]
    UnknownNode(usize),
    #[error("invalid scenario: {0}")]
    Invalid(String),
}

/// 仿真参数值对象。MAC 常数取 802.11 风格默认值，可由场景文件覆盖。
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub profile: &'static TechProfile,
    pub mcs_index: usize,

    // PHY
    pub transmit_power_w: f64,
    pub noise_power_w: f64,
    pub carrier_frequency_hz: f64,
    pub path_loss_exponent: f64,

    // MAC
    pub sifs: SimTime,
    pub difs: SimTime,
    pub slot_time: SimTime,
    pub cw_min: u32,
    pub cw_max: u32,
    pub max_retries: u32,
    pub ack_size_bits: u64,
    pub ack_slack: SimTime,
    /// 纯 ALOHA 重试窗口系数：第 n 次重试在 [0, k·n·slot) 内均匀取值。
    pub aloha_retry_slots: u64,

    // 流水线
    pub feed_interval: SimTime,
    pub resolver_interval: SimTime,
    pub position_update_interval: SimTime,
    pub ttl: u8,

    // 能耗
    pub initial_energy_j: f64,
    pub flight_power_w: f64,

    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            profile: profile::wifi_11n(),
            mcs_index: 0,
            transmit_power_w: 0.1,
            noise_power_w: 1e-13,
            carrier_frequency_hz: 2.4e9,
            path_loss_exponent: 2.0,
            sifs: SimTime::from_micros(16),
            difs: SimTime::from_micros(34),
            slot_time: SimTime::from_micros(9),
            cw_min: 16,
            cw_max: 1024,
            max_retries: 4,
            ack_size_bits: 112,
            ack_slack: SimTime::from_micros(9),
            aloha_retry_slots: 64,
            feed_interval: SimTime::from_micros(50),
            resolver_interval: SimTime::from_micros(100),
            position_update_interval: SimTime::from_millis(100),
            ttl: 15,
            initial_energy_j: 1e4,
            flight_power_w: 5.0,
            seed: 2025,
        }
    }
}

impl SimConfig {
    /// 指定比特数在当前 MCS 速率下的占空时间（向上取整到纳秒）。
    pub fn air_time(&self, bits: u64) -> SimTime {
        self.profile.air_time(bits, self.mcs_index)
    }

    pub fn ack_air_time(&self) -> SimTime {
        self.air_time(self.ack_size_bits)
    }

    /// ACK 等待超时：SIFS + ACK 占空 + 裕量。
    pub fn ack_timeout(&self) -> SimTime {
        self.sifs
            .saturating_add(self.ack_air_time())
            .saturating_add(self.ack_slack)
    }

    /// 单包最大占空时间（最大包长按最慢 MCS 计），用于收件箱垃圾回收界限。
    pub fn max_air_time(&self) -> SimTime {
        self.profile.max_air_time()
    }

    pub fn sinr_threshold_db(&self) -> f64 {
        self.profile.sinr_threshold_db(self.mcs_index)
    }

    /// 第 `attempts` 次尝试的竞争窗口：min(CW_min · 2^attempts, CW_max)。
    pub fn contention_window(&self, attempts: u32) -> u32 {
        let shifted = self
            .cw_min
            .checked_shl(attempts)
            .unwrap_or(self.cw_max)
            .max(1);
        shifted.min(self.cw_max)
    }
}

// ---------------------------------------------------------------------------
// 场景文件模型
// ---------------------------------------------------------------------------

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub schema_version: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    pub duration_ms: u64,
    pub channel: ChannelSpec,
    #[serde(default)]
    pub mac: MacSpec,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub mcs_index: Option<usize>,
    #[serde(default)]
    pub hello_interval_ms: Option<u64>,
    #[serde(default)]
    pub ttl: Option<u8>,
    pub drones: Vec<DroneSpec>,
    pub sessions: Vec<SessionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelSpec {
    /// 视距信道：插入无条件。
    Los,
    /// 概率信道：逐接收方独立的 Bernoulli 丢弃。
    Prob { loss_prob: f64 },
    /// 距离/路损信道：接收功率低于灵敏度则抑制插入。
    Range {
        #[serde(default)]
        prob_los: bool,
        #[serde(default)]
        sensitivity_w: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacSpec {
    #[default]
    CsmaCa,
    Aloha,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroneSpec {
    pub id: usize,
    pub pos: [f64; 3],
    /// 匀速直线运动速度（米/秒）；缺省为静止。
    #[serde(default)]
    pub vel: Option<[f64; 3]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSpec {
    pub src: usize,
    pub dst: usize,
    pub packets: u32,
    #[serde(default)]
    pub size_bits: Option<u64>,
    pub interval: IntervalSpec,
    #[serde(default)]
    pub start_us: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntervalSpec {
    Fixed { gap_us: u64 },
    Uniform { lo_us: u64, hi_us: u64 },
    Poisson { mean_us: u64 },
}

impl ScenarioSpec {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let spec: ScenarioSpec = serde_json::from_str(&raw)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ConfigError::SchemaVersion(self.schema_version));
        }
        if self.duration_ms == 0 {
            return Err(ConfigError::Invalid("duration_ms must be > 0".into()));
        }
        if self.drones.is_empty() {
            return Err(ConfigError::Invalid("at least one drone required".into()));
        }
        let n = self.drones.len();
        for (i, d) in self.drones.iter().enumerate() {
            if d.id != i {
                return Err(ConfigError::Invalid(format!(
                    "drone ids must be dense and ordered: index {i} has id {}",
                    d.id
                )));
            }
        }
        if let Some(name) = &self.profile {
            if profile::by_name(name).is_none() {
                return Err(ConfigError::UnknownProfile(name.clone()));
            }
        }
        if let ChannelSpec::Prob { loss_prob } = self.channel {
            if !(0.0..=1.0).contains(&loss_prob) {
                return Err(ConfigError::Invalid(format!(
                    "loss_prob {loss_prob} outside [0, 1]"
                )));
            }
        }
        for s in &self.sessions {
            if s.src >= n {
                return Err(ConfigError::UnknownNode(s.src));
            }
            if s.dst >= n {
                return Err(ConfigError::UnknownNode(s.dst));
            }
            if s.src == s.dst {
                return Err(ConfigError::Invalid(format!(
                    "session src == dst ({})",
                    s.src
                )));
            }
            if s.packets == 0 {
                return Err(ConfigError::Invalid("session packets must be > 0".into()));
            }
            if let IntervalSpec::Uniform { lo_us, hi_us } = s.interval {
                if lo_us > hi_us {
                    return Err(ConfigError::Invalid(format!(
                        "uniform interval lo_us {lo_us} > hi_us {hi_us}"
                    )));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 随机流
// ---------------------------------------------------------------------------

/// 一个简单、确定性的 64-bit mixing（splitmix64），用于派生子种子。
pub(crate) fn mix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// 从主种子派生"每插件类型、每节点"一条的随机流种子。
/// 标签用 FNV-1a 折叠（不用 `DefaultHasher`，其内部盐随进程变化）。
pub fn stream_seed(master: u64, node: usize, stream: &str) -> u64 {
    let mut h: u64 = 0xCBF2_9CE4_8422_2325;
    for b in stream.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01B3);
    }
    mix64(master ^ h ^ (node as u64).wrapping_mul(0x9E3779B97F4A7C15))
}
