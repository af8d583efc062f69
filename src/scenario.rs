//! 场景装配与运行
//!
//! 把校验过的场景文件折算成配置好的世界：实例化各节点与插件、
//! 登记业务会话、调度基础节拍（判决巡检、位置更新、Hello），
//! 然后跑到虚拟截止时间或所有会话报告终局为止。

use tracing::info;

use crate::config::{
    stream_seed, ChannelSpec, ConfigError, IntervalSpec, MacSpec, ScenarioSpec, SimConfig,
};
use crate::energy::LinearEnergy;
use crate::mac::MacKind;
use crate::mobility::{LinearMobility, Pos, StaticMobility};
use crate::net::{
    Drone, InterArrival, NodeId, Summary, TrafficArrival, TrafficSession, UavNet, UavWorld,
};
use crate::phy::profile;
use crate::phy::{LosChannel, ProbChannel, RangeChannel, ResolverSweep};
use crate::net::{HelloTick, PositionTick};
use crate::routing::ShortestPathRouting;
use crate::sim::{SimTime, Simulator};

/// 默认接收灵敏度（瓦）：噪声功率 × 10 dB。
const DEFAULT_SENSITIVITY_W: f64 = 1e-12;

/// 由场景描述构造仿真器与世界。`seed`/`duration` 可被 CLI 覆盖。
pub fn build(
    spec: &ScenarioSpec,
    seed_override: Option<u64>,
    duration_override_ms: Option<u64>,
) -> Result<(Simulator, UavWorld, SimTime), ConfigError> {
    spec.validate()?;

    let mut cfg = SimConfig::default();
    if let Some(seed) = seed_override.or(spec.seed) {
        cfg.seed = seed;
    }
    if let Some(name) = &spec.profile {
        cfg.profile = profile::by_name(name).ok_or_else(|| ConfigError::UnknownProfile(name.clone()))?;
    }
    if let Some(idx) = spec.mcs_index {
        cfg.mcs_index = idx;
    }
    if let Some(ttl) = spec.ttl {
        cfg.ttl = ttl;
    }
    let duration_ms = duration_override_ms.unwrap_or(spec.duration_ms);
    if duration_ms == 0 {
        return Err(ConfigError::Invalid("duration_ms must be > 0".into()));
    }
    let until = SimTime::from_millis(duration_ms);
    let seed = cfg.seed;

    let mac_kind = match spec.mac {
        MacSpec::CsmaCa => MacKind::CsmaCa,
        MacSpec::Aloha => MacKind::Aloha,
    };

    let (channel, prob_los): (Box<dyn crate::phy::Channel>, bool) = match &spec.channel {
        ChannelSpec::Los => (Box::new(LosChannel), false),
        ChannelSpec::Prob { loss_prob } => (
            Box::new(ProbChannel::new(
                *loss_prob,
                stream_seed(seed, 0, "channel"),
            )),
            false,
        ),
        ChannelSpec::Range {
            prob_los,
            sensitivity_w,
        } => (
            Box::new(RangeChannel::new(
                sensitivity_w.unwrap_or(DEFAULT_SENSITIVITY_W),
                *prob_los,
                cfg.clone(),
            )),
            *prob_los,
        ),
    };

    let mut net = UavNet::new(cfg.clone(), channel);
    net.set_prob_los(prob_los);

    for d in &spec.drones {
        let pos = Pos::new(d.pos[0], d.pos[1], d.pos[2]);
        let mobility: Box<dyn crate::mobility::Mobility> = match d.vel {
            Some(vel) if vel != [0.0; 3] => Box::new(LinearMobility::new(pos, vel)),
            _ => Box::new(StaticMobility::new(pos)),
        };
        let routing = Box::new(ShortestPathRouting::new(
            NodeId(d.id),
            stream_seed(seed, d.id, "routing"),
        ));
        let energy = Box::new(LinearEnergy::new(cfg.initial_energy_j, cfg.flight_power_w));
        net.add_drone(Drone::new(
            NodeId(d.id),
            pos,
            mac_kind,
            routing,
            mobility,
            energy,
            stream_seed(seed, d.id, "mac"),
        ));
    }

    let mut sim = Simulator::default();
    net.push_topology(&mut sim);

    for (idx, s) in spec.sessions.iter().enumerate() {
        let iat = match &s.interval {
            IntervalSpec::Fixed { gap_us } => InterArrival::Fixed(SimTime::from_micros(*gap_us)),
            IntervalSpec::Uniform { lo_us, hi_us } => InterArrival::Uniform {
                lo: SimTime::from_micros(*lo_us),
                hi: SimTime::from_micros(*hi_us),
            },
            IntervalSpec::Poisson { mean_us } => InterArrival::Poisson {
                mean: SimTime::from_micros(*mean_us),
            },
        };
        net.add_session(TrafficSession::new(
            idx as u64,
            NodeId(s.src),
            NodeId(s.dst),
            s.size_bits.unwrap_or(8 * 1024),
            s.packets,
            iat,
            stream_seed(seed, idx, "traffic"),
        ));
        let start = SimTime::from_micros(s.start_us.unwrap_or(0));
        sim.schedule(start, TrafficArrival { session: idx });
    }

    sim.schedule(
        cfg.resolver_interval,
        ResolverSweep {
            interval: cfg.resolver_interval,
        },
    );
    sim.schedule(
        cfg.position_update_interval,
        PositionTick {
            interval: cfg.position_update_interval,
        },
    );
    if let Some(ms) = spec.hello_interval_ms {
        let interval = SimTime::from_millis(ms.max(1));
        for i in 0..spec.drones.len() {
            sim.schedule(
                interval,
                HelloTick {
                    node: NodeId(i),
                    interval,
                },
            );
        }
    }

    info!(
        drones = spec.drones.len(),
        sessions = spec.sessions.len(),
        duration_ms,
        seed,
        "场景装配完成"
    );
    Ok((sim, UavWorld::new(net), until))
}

/// 跑到截止时间（或全部终局），结清在途包并给出汇总。
pub fn run(sim: &mut Simulator, world: &mut UavWorld, until: SimTime) -> Summary {
    sim.run_until(until, world);
    let now = sim.now();
    world.net.finalize(now);
    world.net.summary(now)
}
