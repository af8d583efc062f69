//! 无人机网络仿真 CLI
//!
//! 读取场景文件，跑到虚拟截止时间，输出指标汇总。
//! 种子与时长可用命令行参数或环境变量覆盖。
//! 退出码：0 正常结束；2 配置错误。

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use uavnet_rs::config::ScenarioSpec;
use uavnet_rs::scenario;

#[derive(Debug, Parser)]
#[command(name = "uavnet-sim", about = "Run a scenario file on the uavnet-rs simulator")]
struct Args {
    /// Path to scenario.json
    config: PathBuf,

    /// Random seed override
    #[arg(long, env = "UAVNET_SEED")]
    seed: Option<u64>,

    /// Run duration override (virtual milliseconds)
    #[arg(long, env = "UAVNET_UNTIL_MS")]
    until_ms: Option<u64>,

    /// Write the summary as JSON to this path
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();

    let spec = match ScenarioSpec::load(&args.config) {
        Ok(spec) => spec,
        Err(e) => {
            eprintln!("config error: {e}");
            return ExitCode::from(2);
        }
    };

    let (mut sim, mut world, until) = match scenario::build(&spec, args.seed, args.until_ms) {
        Ok(built) => built,
        Err(e) => {
            eprintln!("config error: {e}");
            return ExitCode::from(2);
        }
    };

    info!(config = %args.config.display(), "🚁 开始无人机网络仿真");
    let summary = scenario::run(&mut sim, &mut world, until);

    println!(
        "done @ {:?}, generated={} delivered={} dropped_mac={} dropped_ttl={} dropped_phy={} \
         collisions={} pdr={:.4} avg_delay_us={:.1} avg_hops={:.2} throughput_bps={:.0} energy_j={:.3}",
        sim.now(),
        summary.generated,
        summary.delivered,
        summary.dropped_mac,
        summary.dropped_ttl,
        summary.dropped_phy,
        summary.collisions,
        summary.pdr,
        summary.avg_delay_us,
        summary.avg_hops,
        summary.throughput_bps,
        summary.energy_consumed_j,
    );

    if let Some(path) = &args.summary_json {
        let json = serde_json::to_string_pretty(&summary).expect("summary serializes");
        if let Err(e) = std::fs::write(path, json) {
            eprintln!("write summary: {e}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
