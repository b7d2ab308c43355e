//! # folio-host
//!
//! ## 用法
//!
//! ```bash
//! folio-host config --init
//! folio-host simulate --trace traces/scroll.json
//! folio-host simulate --trace traces/scroll.json --json
//! folio-host contributions
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use folio_host::config::{AppConfig, DEFAULT_CONFIG_PATH};
use folio_host::contributions::{self, ContributionGrid};
use folio_host::trace::{self, InputTrace};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "folio-host")]
#[command(about = "个人站点动效层的 headless 宿主")]
#[command(version)]
struct Cli {
    /// 配置文件
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 回放输入轨迹
    Simulate {
        /// 轨迹文件（JSON）
        #[arg(short, long)]
        trace: PathBuf,

        /// 以 JSON 输出完整报告
        #[arg(long)]
        json: bool,
    },

    /// 拉取贡献日历并打印网格
    Contributions,

    /// 配置文件操作
    Config {
        /// 写入默认配置
        #[arg(long)]
        init: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { trace: path, json } => {
            let config = load_config(&cli.config)?;
            let input = InputTrace::load(&path)?;
            let report = trace::simulate(&config, &input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.transcript());
            }
        }
        Commands::Contributions => {
            let config = load_config(&cli.config)?;
            let calendar = contributions::load_or_empty(&config);
            if calendar.is_empty() {
                println!("No contribution data found.");
                return Ok(());
            }
            let grid = ContributionGrid::layout(&calendar);
            println!("{}", grid.to_ascii());
            println!(
                "{} contributions on {} days ({}x{} px)",
                calendar.total(),
                calendar.active_days(),
                grid.width,
                grid.height
            );
        }
        Commands::Config { init } => {
            if init {
                AppConfig::default()
                    .save(&cli.config)
                    .with_context(|| format!("写入 {} 失败", cli.config.display()))?;
                info!(path = %cli.config.display(), "已写入默认配置");
            } else {
                let config = AppConfig::load(&cli.config);
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let config = AppConfig::load(path);
    config.validate().context("配置无效")?;
    Ok(config)
}
