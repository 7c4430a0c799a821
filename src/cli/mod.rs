//! # CLI 模块
//!
//! 使用 `clap` builder API 按运行环境构建命令行参数。
//!
//! 可用选项随运行环境变化（不仅是默认值）：
//! - 通用 Slurm: `--example` 必填
//! - Andes / Perlmutter: `--example` 有站点默认值，额外提供 `--suchyta`
//! - Perlmutter: 额外提供 `--qos` / `--constraint`
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 使用 `models/runner.rs`
//! - 解析结果传递给 `commands/submit.rs`

use crate::error::{XcsubError, Result};
use crate::models::{Runner, Scheduler};

use clap::builder::PossibleValuesParser;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// 未知站点时的每节点进程数
pub const DEFAULT_RANKS_PER_NODE: u32 = 32;
pub const DEFAULT_WALLTIME: &str = "00:15:00";
pub const DEFAULT_QOS: &str = "regular";
pub const DEFAULT_CONSTRAINT: &str = "cpu";

/// Perlmutter 分区选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionOptions {
    pub qos: String,
    /// `cpu` or `gpu`
    pub constraint: String,
}

/// 解析后的命令行参数
#[derive(Debug, Clone)]
pub struct CliOptions {
    pub outdir: PathBuf,
    pub example: PathBuf,
    pub charge: String,
    pub nodes: u32,
    pub walltime: String,
    pub ranks_per_node: u32,
    /// 仅已知站点可为 true
    pub use_site_stack: bool,
    /// 仅 Perlmutter 为 Some
    pub partition: Option<PartitionOptions>,
    pub dry_run: bool,
}

/// 按运行环境构建命令
pub fn build_command(runner: Runner) -> Result<Command> {
    if runner.scheduler() != Scheduler::Slurm {
        return Err(XcsubError::UnsupportedScheduler {
            runner: runner.to_string(),
            scheduler: runner.scheduler().to_string(),
        });
    }
    let profile = runner.site_profile();

    let mut cmd = Command::new("xcsub")
        .author("Changjiang Wu")
        .version(env!("CARGO_PKG_VERSION"))
        .about(format!(
            "Prepare and submit an Xcompact3d batch job (detected runner: {})",
            runner
        ));

    // ─────────────────────────────────────────────────────────────
    // Run configuration
    // ─────────────────────────────────────────────────────────────
    cmd = cmd.arg(
        Arg::new("outdir")
            .short('o')
            .long("outdir")
            .help("Path to run directory")
            .value_parser(value_parser!(PathBuf))
            .required(true),
    );

    let example = Arg::new("example")
        .short('e')
        .long("example")
        .help("Which example to run")
        .value_parser(value_parser!(PathBuf));
    cmd = match profile {
        Some(profile) => cmd
            .arg(
                example
                    .required(false)
                    .default_value(profile.default_example().display().to_string()),
            )
            .arg(
                Arg::new("suchyta")
                    .short('s')
                    .long("suchyta")
                    .help("Use Eric Suchyta's software")
                    .action(ArgAction::SetTrue),
            ),
        None => cmd.arg(example.required(true)),
    };

    // ─────────────────────────────────────────────────────────────
    // Scheduler properties
    // ─────────────────────────────────────────────────────────────
    cmd = cmd
        .arg(
            Arg::new("charge")
                .short('c')
                .long("charge")
                .help("Account to charge")
                .required(true),
        )
        .arg(
            Arg::new("nodes")
                .short('n')
                .long("nodes")
                .help("Number of nodes to use")
                .value_parser(value_parser!(u32).range(1..))
                .default_value("1"),
        )
        .arg(
            Arg::new("walltime")
                .short('w')
                .long("walltime")
                .help("Wall time to request")
                .default_value(DEFAULT_WALLTIME),
        );

    if runner.has_partition_options() {
        cmd = cmd
            .arg(
                Arg::new("qos")
                    .short('q')
                    .long("qos")
                    .help("QOS")
                    .default_value(DEFAULT_QOS),
            )
            .arg(
                Arg::new("constraint")
                    .short('k')
                    .long("constraint")
                    .help("cpu or gpu")
                    .value_parser(PossibleValuesParser::new(["cpu", "gpu"]))
                    .default_value(DEFAULT_CONSTRAINT),
            );
    }

    // ─────────────────────────────────────────────────────────────
    // MPI properties
    // ─────────────────────────────────────────────────────────────
    let ranks_default = profile.map_or(DEFAULT_RANKS_PER_NODE, |p| p.cores_per_node);
    cmd = cmd.arg(
        Arg::new("RanksPerNode")
            .short('r')
            .long("RanksPerNode")
            .help("Ranks per node to use")
            .value_parser(value_parser!(u32).range(1..))
            .default_value(ranks_default.to_string()),
    );

    // ─────────────────────────────────────────────────────────────
    // Execution control
    // ─────────────────────────────────────────────────────────────
    cmd = cmd.arg(
        Arg::new("dry_run")
            .long("dry-run")
            .help("Create the run directory and job script, but do not submit")
            .action(ArgAction::SetTrue),
    );

    Ok(cmd)
}

impl CliOptions {
    /// 从 clap 匹配结果提取参数
    pub fn from_matches(matches: &ArgMatches, runner: Runner) -> Result<Self> {
        let partition = if runner.has_partition_options() {
            Some(PartitionOptions {
                qos: required::<String>(matches, "qos")?,
                constraint: required::<String>(matches, "constraint")?,
            })
        } else {
            None
        };

        let use_site_stack =
            runner.site_profile().is_some() && matches.get_flag("suchyta");

        Ok(Self {
            outdir: required(matches, "outdir")?,
            example: required(matches, "example")?,
            charge: required(matches, "charge")?,
            nodes: required(matches, "nodes")?,
            walltime: required(matches, "walltime")?,
            ranks_per_node: required(matches, "RanksPerNode")?,
            use_site_stack,
            partition,
            dry_run: matches.get_flag("dry_run"),
        })
    }
}

fn required<T>(matches: &ArgMatches, id: &str) -> Result<T>
where
    T: Clone + Send + Sync + 'static,
{
    matches
        .get_one::<T>(id)
        .cloned()
        .ok_or_else(|| XcsubError::InvalidArgument(format!("missing value for '{}'", id)))
}
