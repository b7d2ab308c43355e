//! # xtask - 开发辅助工具
//!
//! 提供本地质量门禁与开发辅助命令。
//!
//! ## 命令
//!
//! - `check-all`: 运行 fmt、clippy、test
//! - `cov-runtime`: 运行 folio-runtime 覆盖率
//! - `cov-workspace`: 运行 workspace 覆盖率
//! - `trace-check`: 检查输入轨迹文件（格式、时间顺序、能否完整回放）

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use folio_host::session::SessionEvent;
use folio_host::{AppConfig, InputTrace, simulate};
use walkdir::WalkDir;

fn run(step: &str, cmd: &mut Command) -> anyhow::Result<()> {
    eprintln!("\n==> {step}");
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("{step} failed with {status}");
    }
    Ok(())
}

fn ensure_cargo_llvm_cov_available() -> anyhow::Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.args(["llvm-cov", "--version"]);
    let status = cmd.status();
    match status {
        Ok(s) if s.success() => Ok(()),
        _ => anyhow::bail!(
            "cargo llvm-cov 不可用。\n\
请先安装：\n\
  - cargo install cargo-llvm-cov\n\
  - rustup component add llvm-tools-preview\n\
然后重试。"
        ),
    }
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("xtask error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let sub = args.next().unwrap_or_else(|| "help".to_string());

    match sub.as_str() {
        "check-all" => {
            let mut fmt = Command::new("cargo");
            fmt.args(["fmt", "--all", "--", "--check"]);
            run("cargo fmt --all -- --check", &mut fmt)?;

            let mut clippy = Command::new("cargo");
            clippy.args(["clippy", "--workspace", "--all-targets"]);
            run("cargo clippy --workspace --all-targets", &mut clippy)?;

            let mut test = Command::new("cargo");
            test.args(["test", "--workspace"]);
            run("cargo test --workspace", &mut test)?;
        }
        "cov-runtime" => {
            ensure_cargo_llvm_cov_available()?;

            let mut cov = Command::new("cargo");
            cov.args(["llvm-cov", "-p", "folio-runtime", "--all-features", "--html"]);
            run(
                "cargo llvm-cov -p folio-runtime --all-features --html",
                &mut cov,
            )?;

            eprintln!("\nCoverage HTML: target/llvm-cov/html/index.html");
        }
        "cov-workspace" => {
            ensure_cargo_llvm_cov_available()?;

            // workspace 覆盖率只用于观察趋势，排除 xtask 以免稀释信号
            let mut cov = Command::new("cargo");
            cov.args([
                "llvm-cov",
                "--workspace",
                "--exclude",
                "xtask",
                "--all-features",
                "--html",
            ]);
            run(
                "cargo llvm-cov --workspace --exclude xtask --all-features --html",
                &mut cov,
            )?;

            eprintln!("\nCoverage HTML: target/llvm-cov/html/index.html");
        }
        "trace-check" => {
            let path = args.next();
            trace_check(path.as_deref())?;
        }
        "help" | "-h" | "--help" => {
            print_help();
        }
        other => anyhow::bail!("unknown xtask subcommand: {other}"),
    }

    Ok(())
}

fn print_help() {
    eprintln!(
        r#"xtask - 开发辅助工具

USAGE:
  cargo xtask <command>

COMMANDS:
  check-all       运行 fmt、clippy、test 门禁检查
  cov-runtime     运行 folio-runtime 覆盖率报告
  cov-workspace   运行 workspace 覆盖率报告
  trace-check     检查输入轨迹文件

TRACE-CHECK:
  cargo xtask trace-check [path]

  不带参数：检查 traces/ 下所有 .json 文件
  带路径参数：检查指定文件或目录

  检查内容：
    - JSON 格式与事件类型
    - 事件时间戳单调不减
    - 使用默认配置完整回放，且加载界面能走到完成

ALIASES (in .cargo/config.toml):
  cargo check-all     -> cargo xtask check-all
  cargo cov-runtime   -> cargo xtask cov-runtime
  cargo cov-workspace -> cargo xtask cov-workspace
  cargo trace-check   -> cargo xtask trace-check
"#
    );
}

//=============================================================================
// trace-check 命令实现
//=============================================================================

/// 默认轨迹目录（相对于 workspace root）
const DEFAULT_TRACES_DIR: &str = "traces";

/// 单个文件的检查结果
enum TraceStatus {
    Ok { events: usize, revealed: bool },
    Failed(String),
}

/// 执行轨迹检查
fn trace_check(path: Option<&str>) -> anyhow::Result<()> {
    let root = PathBuf::from(path.unwrap_or(DEFAULT_TRACES_DIR));
    if !root.exists() {
        anyhow::bail!(
            "路径不存在: {}\n请在 workspace 根目录运行，或指定轨迹路径",
            root.display()
        );
    }

    let files = collect_trace_files(&root);
    if files.is_empty() {
        eprintln!("未找到轨迹文件（.json）");
        return Ok(());
    }

    eprintln!("==> 检查 {} 个轨迹文件...\n", files.len());

    let config = AppConfig::default();
    let mut failed = 0;
    let mut not_revealed = 0;
    for file in &files {
        match check_trace_file(file, &config) {
            TraceStatus::Ok { events, revealed } => {
                if revealed {
                    eprintln!("[OK]   {}: {} 条输出事件", file.display(), events);
                } else {
                    not_revealed += 1;
                    eprintln!("[WARN] {}: 回放结束时仍在加载", file.display());
                }
            }
            TraceStatus::Failed(message) => {
                failed += 1;
                eprintln!("[ERROR] {}: {}", file.display(), message);
            }
        }
    }

    eprintln!("─────────────────────────────────────────────────────");
    if failed > 0 {
        eprintln!("❌ {} 个错误, {} 个警告", failed, not_revealed);
        anyhow::bail!("轨迹检查发现错误");
    } else if not_revealed > 0 {
        eprintln!("⚠️  0 个错误, {} 个警告", not_revealed);
    } else {
        eprintln!("✅ 检查通过，无错误");
    }
    Ok(())
}

/// 收集目录下的所有轨迹文件
fn collect_trace_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}

/// 检查单个轨迹文件
fn check_trace_file(file: &Path, config: &AppConfig) -> TraceStatus {
    let trace = match InputTrace::load(file) {
        Ok(trace) => trace,
        Err(e) => return TraceStatus::Failed(e.to_string()),
    };
    match simulate(config, &trace) {
        Ok(report) => TraceStatus::Ok {
            events: report.events.len(),
            revealed: report
                .events
                .iter()
                .any(|e| matches!(e, SessionEvent::Revealed { .. })),
        },
        Err(e) => TraceStatus::Failed(e.to_string()),
    }
}
