//! # 命令执行模块
//!
//! 检测运行环境 -> 构建并解析命令行 -> 执行提交。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `models/`, `utils/`
//! - 子模块: submit

pub mod submit;

use crate::cli::{self, CliOptions};
use crate::error::Result;
use crate::models::runner;
use crate::utils::environment::HostEnv;

/// 执行命令
pub fn run() -> Result<()> {
    let host = HostEnv::capture();
    let runner = runner::detect(&host)?;

    // 参数错误由 clap 直接报告并退出
    let matches = cli::build_command(runner)?.get_matches();
    let opts = CliOptions::from_matches(&matches, runner)?;

    submit::execute(runner, opts, &host)
}
